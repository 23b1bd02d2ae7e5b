use clap::Parser;
use json_mock_server::{
    cli::Cli,
    config::{load_config_file, ServerConfig},
    persistence::Source,
    ServerBuilder, SnapshotService, StartupError, Store,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("json_mock_server=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "cannot start");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path).await?,
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);
    let source = Source::resolve(&cli.source);

    let server = ServerBuilder::new(config, source).build().await?;
    let listener = TcpListener::bind(server.address()).await?;
    let base = format!("http://{}", server.address());
    for name in server.state().store.snapshot().names() {
        tracing::info!("resource {}/{}", base, name);
    }
    tracing::info!(read_only = server.config().read_only, watch = server.config().watch, "listening on {}", base);
    tracing::info!("type s + enter to save a snapshot of the database");

    tokio::spawn(snapshot_on_stdin(server.state().store.clone(), server.snapshots().clone()));
    server.serve(listener, shutdown_signal()).await
}

/// Each `s` line on stdin writes a snapshot. Failures are logged; serving continues.
async fn snapshot_on_stdin(store: Arc<Store>, snapshots: SnapshotService) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim() != "s" {
            continue;
        }
        match snapshots.save(&store.snapshot()).await {
            Ok(path) => tracing::info!(path = %path.display(), "snapshot saved"),
            Err(e) => tracing::error!(error = %e, "snapshot failed"),
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}
