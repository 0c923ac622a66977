use std::time::Duration;

mod app;
mod auth;
mod clock;
mod config;
mod db;
mod error;
mod extract;
mod generation;
mod mailer;
mod state;
mod vocabulary;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "lex=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    auth::reset::spawn_expired_sweep(
        app_state.users.clone(),
        app_state.clock.clone(),
        Duration::from_secs(app_state.config.reset_sweep_seconds.max(1)),
    );

    app::serve(app::build_app(app_state)).await
}
