//! woodshed: stream answers from the music practice assistant in a terminal.
//!
//! Usage:
//!   woodshed "Give me a ii-V-I in Bb"
//!   woodshed --creativity creative --show-reasoning
//!
//! Without a message the client reads one prompt per line from stdin.
//! `/reset` starts a new conversation and `/quit` exits. Ctrl-C cancels the
//! answer currently streaming.

mod render;

use std::io::Write as _;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use woodshed_stream::prelude::*;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CreativityArg {
    Precise,
    Balanced,
    Creative,
}

impl From<CreativityArg> for Creativity {
    fn from(value: CreativityArg) -> Self {
        match value {
            CreativityArg::Precise => Creativity::Precise,
            CreativityArg::Balanced => Creativity::Balanced,
            CreativityArg::Creative => Creativity::Creative,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "woodshed",
    about = "Chat with the music practice assistant and stream its answers."
)]
struct Cli {
    /// Message to send. Omit to read prompts from stdin.
    message: Option<String>,

    /// How adventurous the answer should be.
    #[arg(long, value_enum, default_value = "balanced")]
    creativity: CreativityArg,

    /// Backend base URL (overrides $WOODSHED_API_URL).
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Print the model's reasoning trace after each answer.
    #[arg(long)]
    show_reasoning: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    woodshed_stream::init_observability();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config = config.base_url(url);
    }
    tracing::debug!(base_url = %config.base_url, "client configured");

    let mut conversation = Conversation::http(config.clone())?;
    conversation.set_creativity(cli.creativity.into());

    if let Some(message) = cli.message {
        let doc = run_turn(&mut conversation, &message).await?;
        print_summary(&doc, &config, cli.show_reasoning);
        if doc.state == StreamState::Errored {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" | "/exit" => break,
            "/reset" => {
                conversation.reset();
                eprintln!("(new conversation {})", conversation.id());
            }
            message => {
                let doc = run_turn(&mut conversation, message).await?;
                print_summary(&doc, &config, cli.show_reasoning);
            }
        }
        eprint!("> ");
    }
    Ok(())
}

async fn run_turn(conversation: &mut Conversation, message: &str) -> anyhow::Result<Document> {
    let callbacks = FnCallbacks::new()
        .on_token(|text| {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        })
        .on_status(|step, detail| match detail {
            Some(detail) => eprintln!("\n[{step}] {detail}"),
            None => eprintln!("\n[{step}]"),
        });

    let handle = conversation.send(message, callbacks)?;
    let abort = handle.abort_handle();
    let finish = handle.finish();
    tokio::pin!(finish);

    let doc = tokio::select! {
        doc = &mut finish => doc?,
        _ = tokio::signal::ctrl_c() => {
            abort.abort();
            finish.await?
        }
    };
    println!();
    Ok(doc)
}

fn print_summary(doc: &Document, config: &ClientConfig, show_reasoning: bool) {
    for line in render::summary_lines(doc, config, show_reasoning) {
        println!("{line}");
    }
}
