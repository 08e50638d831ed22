use std::env;
use std::fs;
use std::path::Path;

const ASSETS: &[(&str, &str)] = &[
    ("CHARACTERS", "characters.json"),
    ("ENCODER", "encoder.json"),
    ("MERGES", "vocab.bpe"),
];

fn main() {
    println!("cargo:rerun-if-env-changed=GPT_TOKENIZER_ASSETS");

    let out_dir = env::var("OUT_DIR").unwrap();
    let assets_dir = env::var("GPT_TOKENIZER_ASSETS").ok();

    let mut codegen = String::new();
    match assets_dir {
        Some(ref dir) if all_assets_present(Path::new(dir)) => {
            let dir = Path::new(dir);
            for &(const_name, file) in ASSETS {
                let path = dir.join(file);
                println!("cargo:rerun-if-changed={}", path.display());
                if file.ends_with(".json") {
                    validate_json(&path);
                }
                let abs = fs::canonicalize(&path)
                    .unwrap_or_else(|e| panic!("cannot resolve {}: {}", path.display(), e));
                codegen.push_str(&format!(
                    "pub const {}: Option<&[u8]> = Some(include_bytes!({:?}));\n",
                    const_name,
                    abs.display().to_string()
                ));
            }
        }
        Some(ref dir) => {
            println!(
                "cargo:warning=GPT_TOKENIZER_ASSETS={} is missing characters.json, encoder.json or vocab.bpe; nothing embedded",
                dir
            );
            push_none(&mut codegen);
        }
        None => push_none(&mut codegen),
    }

    let dest = Path::new(&out_dir).join("embedded_vocab.rs");
    fs::write(&dest, &codegen).expect("Failed to write embedded_vocab.rs");
}

fn all_assets_present(dir: &Path) -> bool {
    ASSETS.iter().all(|&(_, file)| dir.join(file).is_file())
}

fn push_none(codegen: &mut String) {
    for &(const_name, _) in ASSETS {
        codegen.push_str(&format!("pub const {}: Option<&[u8]> = None;\n", const_name));
    }
}

fn validate_json(path: &Path) {
    let data = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    let _: serde_json::Value = serde_json::from_str(&data)
        .unwrap_or_else(|e| panic!("invalid JSON in {}: {e}", path.display()));
}
