//! Chat completion front door: fit the conversation to the model, then hand
//! the request to whatever client actually talks to the API.

use serde::Serialize;
use thiserror::Error;

use crate::budget::{BudgetError, Pruned, Pruner, DEFAULT_MAX_ITERATIONS};
use crate::limits::ModelLimits;
use crate::message::ChatMessage;
use crate::tokenizer::TokenCounter;

pub type ClientError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error("Failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Completion client error: {0}")]
    Client(#[source] ClientError),
}

/// Submits a chat completion payload and returns the decoded response.
pub trait CompletionClient {
    fn create_chat(&self, payload: serde_json::Value) -> Result<serde_json::Value, ClientError>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for &C {
    fn create_chat(&self, payload: serde_json::Value) -> Result<serde_json::Value, ClientError> {
        (**self).create_chat(payload)
    }
}

/// A chat completion request. Defaults mirror the API's own defaults.
///
/// Serializes to the API payload; `false`, zero, empty and absent optional
/// fields are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub n: u32,
    #[serde(skip_serializing_if = "is_false")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "is_zero")]
    pub presence_penalty: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub frequency_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<serde_json::Value>,
    pub messages: Vec<ChatMessage>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        ChatRequest {
            model: model.into(),
            temperature: 1.0,
            top_p: 1.0,
            n: 1,
            stream: false,
            stop: None,
            max_tokens: None,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            user: None,
            functions: Vec::new(),
            messages,
        }
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = n;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn presence_penalty(mut self, penalty: f64) -> Self {
        self.presence_penalty = penalty;
        self
    }

    pub fn frequency_penalty(mut self, penalty: f64) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn functions(mut self, functions: Vec<serde_json::Value>) -> Self {
        self.functions = functions;
        self
    }
}

pub struct ChatService<T, C> {
    counter: T,
    client: C,
    limits: ModelLimits,
    max_iterations: usize,
}

impl<T: TokenCounter, C: CompletionClient> ChatService<T, C> {
    pub fn new(counter: T, client: C) -> Self {
        ChatService {
            counter,
            client,
            limits: ModelLimits::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_limits(mut self, limits: ModelLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Prune the oldest messages until the request fits, then send it.
    pub fn create_chat(&self, request: ChatRequest) -> Result<serde_json::Value, ServiceError> {
        self.create(request, false)
    }

    /// Like [`create_chat`](Self::create_chat) but the first message (the
    /// initial prompt) always survives pruning.
    pub fn create_chat_retain_initial_prompt(
        &self,
        request: ChatRequest,
    ) -> Result<serde_json::Value, ServiceError> {
        self.create(request, true)
    }

    /// Fit `messages` to `model` without sending anything.
    pub fn fit(
        &self,
        model: &str,
        messages: &[ChatMessage],
        pin_first: bool,
    ) -> Result<Pruned, BudgetError> {
        Pruner::new(&self.counter, &self.limits)
            .pin_first(pin_first)
            .max_iterations(self.max_iterations)
            .prune(model, messages)
    }

    fn create(
        &self,
        mut request: ChatRequest,
        pin_first: bool,
    ) -> Result<serde_json::Value, ServiceError> {
        let pruned = self.fit(&request.model, &request.messages, pin_first)?;
        if !pruned.steps.is_empty() {
            tracing::info!(
                model = %request.model,
                before = request.messages.len(),
                after = pruned.messages.len(),
                steps = pruned.steps.len(),
                "conversation pruned to fit context window"
            );
        }
        request.messages = pruned.messages;

        let payload = serde_json::to_value(&request)?;
        self.client.create_chat(payload).map_err(ServiceError::Client)
    }
}
