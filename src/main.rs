use std::process::ExitCode;
use std::sync::Arc;

use serenity::Client;
use tracing::{error, info};

use hubrelay::{Application, Config, DiscordHandler, DiscordSink};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = hubrelay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        hubrelay::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    info!("hubrelay - WebSub to Discord relay");
    info!(
        "Webhook server configured on {}:{}",
        config.server.host, config.server.port
    );

    let token = config.discord.token.clone();
    let sink = Arc::new(DiscordSink::new(&token));
    let app = match Application::build(config, sink).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match app.web_server() {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create webhook server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut client = match Client::builder(&token, DiscordHandler::intents())
        .event_handler(DiscordHandler::new(app.commands().clone()))
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Discord client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = server.run() => {
            match result {
                Ok(()) => error!("Webhook server stopped"),
                Err(e) => error!("Webhook server error: {}", e),
            }
        }
        result = client.start() => {
            match result {
                Ok(()) => error!("Discord client stopped"),
                Err(e) => error!("Discord client error: {}", e),
            }
        }
    }

    ExitCode::FAILURE
}
