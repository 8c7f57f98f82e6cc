use std::io::{BufRead, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use safewatch::cli::{Cli, Commands};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { ref addr } => {
            let result = match safewatch::cli::build_engine() {
                Ok(engine) => safewatch::server::serve(engine, addr).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => std::process::ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("Error: {err}");
                    std::process::ExitCode::from(1)
                }
            }
        }
        Commands::Chat => match chat_loop().await {
            Ok(()) => std::process::ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err}");
                std::process::ExitCode::from(1)
            }
        },
        _ => match safewatch::cli::run(cli).await {
            Ok(output) => {
                println!("{output}");
                std::process::ExitCode::SUCCESS
            }
            Err(err) => {
                if let Some(sw_err) = err.downcast_ref::<safewatch::error::SafeWatchError>() {
                    eprintln!("Error: {sw_err}");
                } else {
                    eprintln!("Error: {err}");
                }
                std::process::ExitCode::from(1)
            }
        },
    }
}

/// Interactive loop: one engine, one session, until "exit" or EOF.
async fn chat_loop() -> anyhow::Result<()> {
    let engine = safewatch::cli::build_engine()?;

    println!("FDA Adverse Event Chatbot (type 'exit' to quit)");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("You: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            println!("Chatbot: Goodbye!");
            break;
        }

        let response = engine
            .handle_turn(&safewatch::engine::ChatRequest {
                message: message.to_string(),
                session_id: None,
            })
            .await;
        println!("Chatbot: {}", response.response);
        if let Some(data) = response.data {
            for entry in data {
                println!("  - {entry}");
            }
        }
    }

    Ok(())
}
