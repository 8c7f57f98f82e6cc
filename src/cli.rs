//! Command-line interface.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::engine::{ChatEngine, ChatRequest, EngineConfig};
use crate::render;
use crate::store::{JsonFileStore, default_data_file};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

#[derive(Parser, Debug)]
#[command(
    name = "safewatch",
    version,
    about = "Conversational adverse-event reporting and lookup"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat loop on stdin/stdout
    Chat,
    /// Run a single chat turn and print the reply
    Ask {
        /// The message to send, e.g. "I took aspirin and felt dizzy"
        message: String,
        /// Session to accumulate report fields under
        #[arg(long, default_value = crate::engine::DEFAULT_SESSION)]
        session: String,
        /// Print the full response as JSON instead of just the reply text
        #[arg(long)]
        json: bool,
    },
    /// Serve the chat API over HTTP
    Serve {
        /// Address to bind, e.g. 127.0.0.1:8000
        #[arg(long, env = "SAFEWATCH_ADDR", default_value = DEFAULT_ADDR)]
        addr: String,
    },
}

/// Builds an engine backed by the JSON file store.
///
/// `SAFEWATCH_DATA_FILE` overrides the platform data-directory default.
pub fn build_engine() -> anyhow::Result<Arc<ChatEngine>> {
    let path = std::env::var("SAFEWATCH_DATA_FILE")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(default_data_file);

    let store = Arc::new(JsonFileStore::new(path));
    let engine = ChatEngine::new(store, EngineConfig::from_env())?;
    Ok(Arc::new(engine))
}

/// Runs a one-shot command and returns the text to print.
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    match cli.command {
        Commands::Ask {
            message,
            session,
            json,
        } => {
            let engine = build_engine()?;
            let response = engine
                .handle_turn(&ChatRequest {
                    message,
                    session_id: Some(session),
                })
                .await;
            if json {
                Ok(render::to_pretty(&response)?)
            } else {
                let mut out = response.response;
                if let Some(data) = response.data {
                    for line in data {
                        out.push('\n');
                        out.push_str(&line);
                    }
                }
                Ok(out)
            }
        }
        Commands::Chat | Commands::Serve { .. } => {
            // Long-running modes are dispatched in main, not here.
            Err(anyhow::anyhow!("Not a one-shot command"))
        }
    }
}
