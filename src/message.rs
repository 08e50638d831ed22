use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chat message. Serializes to `{role, content, name}` with empty or
/// absent fields left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(
        default,
        skip_serializing_if = "name_is_blank",
        serialize_with = "serialize_name"
    )]
    pub name: Option<String>,
}

fn name_is_blank(name: &Option<String>) -> bool {
    name.as_deref().map_or(true, str::is_empty)
}

fn serialize_name<S: Serializer>(name: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(name.as_deref().unwrap_or_default())
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The ChatML block this message contributes to a token count:
    /// start marker, content, end marker on separate lines.
    pub fn frame(&self) -> String {
        let header = match self.role {
            Role::System => "system".to_string(),
            role => format!("{} name={}", role, self.name.as_deref().unwrap_or("")),
        };
        format!("<|im_start|>{}\n{}\n<|im_end|>", header, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_all_fields() {
        let msg = ChatMessage::user("the message").with_name("username");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"the message","name":"username"}"#
        );
    }

    #[test]
    fn test_serialize_omits_empty_fields() {
        let msg = ChatMessage::assistant("");
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"role":"assistant"}"#);
        let msg = ChatMessage::system("hi").with_name("");
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"role":"system","content":"hi"}"#);
    }

    #[test]
    fn test_deserialize_without_name() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"x"}"#).unwrap();
        assert_eq!(msg, ChatMessage::user("x"));
    }

    #[test]
    fn test_frame() {
        assert_eq!(
            ChatMessage::system("system message").with_name("system").frame(),
            "<|im_start|>system\nsystem message\n<|im_end|>"
        );
        assert_eq!(
            ChatMessage::user("user message").with_name("TheUser").frame(),
            "<|im_start|>user name=TheUser\nuser message\n<|im_end|>"
        );
        assert_eq!(
            ChatMessage::assistant("hi").frame(),
            "<|im_start|>assistant name=\nhi\n<|im_end|>"
        );
    }
}
