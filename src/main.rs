use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shopsite::api::create_app;
use shopsite::commands::{self, Cli, Command};
use shopsite::config::Config;
use shopsite::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shopsite=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let state = AppState::init(config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = state.config.bind_addr;
            let app = create_app(state);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "Listening");
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
        }
        command => commands::run(&state, command).await?,
    }
    Ok(())
}
