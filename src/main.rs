use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fuelbot::location;
use fuelbot::{BubbleBody, ChatClient, ChatLog, Config, Exchange, LocationCell, SubmissionState};
use tracing::{info, warn};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{AppEvent, EventHandler};

#[derive(Parser)]
#[command(name = "fuelbot")]
#[command(about = "Chat with the FuelBot assistant about fuel prices and parkings", version)]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, env = "FUELBOT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Config file to use instead of the default one
    #[arg(long, env = "FUELBOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask {
        /// Your question
        message: String,
        /// Print the classified reply as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check that the backend is up
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }

    match cli.command {
        None => run_interactive(&config).await,
        Some(Commands::Ask { message, json }) => {
            fuelbot::logging::init_stderr();
            ask(&config, &message, json).await
        }
        Some(Commands::Health) => {
            fuelbot::logging::init_stderr();
            health(&config).await
        }
    }
}

fn build_exchange(config: &Config) -> Result<Exchange> {
    let client = ChatClient::with_timeout(&config.backend_url, config.request_timeout())
        .context("Could not build HTTP client")?;
    Ok(Exchange::new(client, LocationCell::new(), config.send_history))
}

async fn run_interactive(config: &Config) -> Result<()> {
    let log_path = fuelbot::logging::init_file()?;
    info!(backend = %config.backend_url, log = %log_path.display(), "starting interactive session");

    let exchange = build_exchange(config)?;
    let mut events = EventHandler::new();
    let tx = events.sender();

    // Locate once in the background; the header updates when it settles
    {
        let source = config.location_source();
        let client = exchange.client().http().clone();
        let cell = exchange.location().clone();
        let timeout = config.geolocation_timeout();
        let fallback = config.fallback_location;
        let tx = tx.clone();
        tokio::spawn(async move {
            let location = location::acquire(&source, &client, timeout, fallback, &cell).await;
            let _ = tx.send(AppEvent::Located(location));
        });
    }

    {
        let client = exchange.client().clone();
        tokio::spawn(async move {
            match client.health().await {
                Ok(status) => {
                    info!(status = %status.status, model = ?status.model, "backend reachable")
                }
                Err(e) => warn!(error = %e, "backend health check failed"),
            }
        });
    }

    let mut app = App::new(config, exchange);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event, &tx),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("session ended");
    result
}

async fn ask(config: &Config, message: &str, json: bool) -> Result<()> {
    let exchange = build_exchange(config)?;

    location::acquire(
        &config.location_source(),
        exchange.client().http(),
        config.geolocation_timeout(),
        config.fallback_location,
        exchange.location(),
    )
    .await;

    let mut log = ChatLog::new();
    let state = exchange.submit(&mut log, message).await;
    if state == SubmissionState::Idle {
        anyhow::bail!("Nothing to send: the message is empty");
    }

    let reply = log
        .bubbles()
        .last()
        .map(|bubble| bubble.body.clone())
        .unwrap_or(BubbleBody::Typing);

    if json {
        println!("{}", serde_json::to_string_pretty(&reply_json(&reply))?);
    } else {
        for line in reply.plain_lines() {
            println!("{line}");
        }
    }

    // The error bubble is already printed; a failed request still exits non-zero
    if state == SubmissionState::Errored {
        anyhow::bail!("{} did not answer the question", config.backend_url);
    }
    Ok(())
}

fn reply_json(body: &BubbleBody) -> serde_json::Value {
    match body {
        BubbleBody::Text(text) => serde_json::json!({"type": "text", "text": text}),
        BubbleBody::Stations(stations) => {
            serde_json::json!({"type": "stations", "stations": stations})
        }
        BubbleBody::Parkings(parkings) => {
            serde_json::json!({"type": "parkings", "parkings": parkings})
        }
        BubbleBody::Typing => serde_json::Value::Null,
    }
}

async fn health(config: &Config) -> Result<()> {
    let client = ChatClient::with_timeout(&config.backend_url, config.request_timeout())?;

    match client.health().await {
        Ok(status) => {
            println!("{} is {}", config.backend_url, status.status);
            if let Some(api) = status.api {
                println!("  api:   {api}");
            }
            if let Some(model) = status.model {
                println!("  model: {model}");
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("{}: {}", config.backend_url, e.user_message())),
    }
}
