use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use rayon::prelude::*;

use gptbudget::{ChatMessage, Config, ModelLimits, Pruner, Tokenizer};

#[derive(Parser)]
#[command(
    name = "gptbudget",
    version,
    about = "Count GPT-3 tokens and fit conversations to a model's context window"
)]
struct Cli {
    /// Check counts against this model's context window
    #[arg(short, long)]
    model: Option<String>,

    /// Directory with characters.json, encoder.json and vocab.bpe
    /// (default: $GPT_TOKENIZER_ASSETS, then the embedded assets)
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Prune a JSON array of chat messages to fit --model and print the result
    #[arg(long, value_name = "FILE")]
    messages: Option<PathBuf>,

    /// With --messages, always keep the first message
    #[arg(long)]
    pin_first: bool,

    /// Print token ids instead of counts
    #[arg(long)]
    ids: bool,

    /// Files to count (reads stdin when empty)
    paths: Vec<PathBuf>,
}

struct Input {
    name: Option<String>,
    text: String,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}

fn format_line(count: &str, label: &str) -> String {
    format!("{:>8} {}\n", count, label)
}

fn read_inputs(paths: &[PathBuf]) -> Vec<Input> {
    if paths.is_empty() {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fail(format!("reading stdin: {}", e)));
        return vec![Input { name: None, text: buf }];
    }
    paths
        .iter()
        .map(|p| {
            let text = fs::read_to_string(p)
                .unwrap_or_else(|e| fail(format!("reading {}: {}", p.display(), e)));
            Input {
                name: Some(p.display().to_string()),
                text,
            }
        })
        .collect()
}

fn prune_conversation(cli: &Cli, tokenizer: &Tokenizer, config: &Config, file: &Path) {
    let Some(model) = cli.model.as_deref() else {
        fail("--messages requires --model");
    };
    let data =
        fs::read(file).unwrap_or_else(|e| fail(format!("reading {}: {}", file.display(), e)));
    let messages: Vec<ChatMessage> = serde_json::from_slice(&data)
        .unwrap_or_else(|e| fail(format!("parsing {}: {}", file.display(), e)));

    let limits = ModelLimits::default();
    let pruned = Pruner::new(tokenizer, &limits)
        .pin_first(cli.pin_first)
        .max_iterations(config.max_iterations)
        .prune(model, &messages)
        .unwrap_or_else(|e| fail(e));

    eprintln!(
        "{} -> {} messages ({} tokens)",
        messages.len(),
        pruned.messages.len(),
        pruned
            .token_count
            .map_or_else(|| "unlimited".to_string(), |c| c.to_string())
    );
    let out = serde_json::to_string_pretty(&pruned.messages).unwrap_or_else(|e| fail(e));
    println!("{}", out);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gptbudget=info".parse().expect("static directive")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().unwrap_or_else(|e| fail(e));
    if let Some(dir) = &cli.assets {
        config.assets_dir = Some(dir.clone());
    }
    let tokenizer = config.tokenizer().unwrap_or_else(|e| fail(e));

    if let Some(file) = &cli.messages {
        prune_conversation(&cli, &tokenizer, &config, file);
        return;
    }

    let inputs = read_inputs(&cli.paths);
    let label = |input: &Input| input.name.clone().unwrap_or_else(|| "stdin".to_string());

    if cli.ids {
        for input in &inputs {
            let seq = tokenizer.tokenize(&input.text).unwrap_or_else(|e| fail(e));
            let ids: Vec<String> = seq.ids().iter().map(u32::to_string).collect();
            println!("{}", ids.join(" "));
        }
        return;
    }

    let count_one = |input: &Input| tokenizer.count_tokens(&input.text);
    let counts: Vec<usize> = if inputs.len() > 1 {
        inputs.par_iter().map(count_one).collect::<Result<Vec<usize>, _>>()
    } else {
        inputs.iter().map(count_one).collect::<Result<Vec<usize>, _>>()
    }
    .unwrap_or_else(|e| fail(e));

    let limit = cli
        .model
        .as_deref()
        .and_then(|m| ModelLimits::default().max_tokens(m));

    let mut over = false;
    for (input, count) in inputs.iter().zip(counts.iter()) {
        let mut line = label(input);
        if let Some(max) = limit {
            if *count >= max {
                over = true;
                line.push_str(&format!(" (exceeds {})", max));
            }
        }
        print!("{}", format_line(&count.to_string(), &line));
    }
    if inputs.len() > 1 {
        let total: usize = counts.iter().sum();
        print!("{}", format_line(&total.to_string(), "total"));
    }
    if over {
        std::process::exit(2);
    }
}
