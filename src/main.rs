use std::sync::Arc;

use hitpoints_bot::api::{self, AppState};
use hitpoints_bot::commands::{self, Dispatcher};
use hitpoints_bot::config::Config;
use hitpoints_bot::db::Database;
use hitpoints_bot::discord::client::DiscordClient;
use hitpoints_bot::discord::verify::InteractionVerifier;
use hitpoints_bot::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // A missing .env is fine; the variables may come from the process environment.
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    let verifier = match InteractionVerifier::from_hex(&config.public_key) {
        Ok(v) => Arc::new(v),
        Err(e) => {
            tracing::error!("DISCORD_PUBLIC_KEY: {e}");
            std::process::exit(1);
        }
    };

    metrics::register_metrics();

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    let client = Arc::new(DiscordClient::new(
        config.discord_token.clone(),
        config.application_id,
    ));

    if !config.skip_register {
        match client.register_commands(&commands::definitions()).await {
            Ok(()) => tracing::info!("Registered slash commands"),
            Err(e) => tracing::warn!("Failed to register slash commands: {e}"),
        }
    }

    let dispatcher = Dispatcher::new(db, client.clone(), config.access.clone())
        .with_max_hearts(config.max_hearts);

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        outbox: client,
        verifier,
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {}: {e}", config.port));

    tracing::info!("HP bot listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
