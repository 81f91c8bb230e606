use anyhow::{Context, bail};
use clap::Parser;
use log::{LevelFilter, info};
use minidrive::args::ServerArgs;
use minidrive::server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = ServerArgs::parse();

    if !args.root.exists() {
        bail!("Root directory {:?} does not exist", args.root);
    }
    if !args.root.is_dir() {
        bail!("Root directory {:?} is not a directory", args.root);
    }
    let root_dir = args
        .root
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize root directory {:?}", args.root))?;

    info!("Storage root: {:?}", root_dir);

    let server = Server::new(ServerConfig {
        host: args.host,
        port: args.port,
        root_dir,
    })
    .context("Failed to set up storage root")?;

    let listener = server
        .bind()
        .await
        .with_context(|| format!("Failed to bind {}:{}", server.config.host, server.config.port))?;
    info!("Listening on {}", listener.local_addr()?);

    server.run(listener, shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
