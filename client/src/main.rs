use clap::Parser;
use client::console::StdoutConsole;
use client::network::ClientSettings;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with the server address (`servidor`, `puerto`)
    #[arg(short, long)]
    config: PathBuf,

    /// Player name announced to the server
    #[arg(short, long)]
    name: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = client::load_config(&args.config)?;
    info!("Starting client as {}", args.name);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let shutdown = CancellationToken::new();
        let ctrl_c = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down...");
                    shutdown.cancel();
                }
            })
        };

        let result = client::play(
            config,
            args.name,
            ClientSettings::default(),
            Arc::new(StdoutConsole),
            tokio::io::stdin(),
            shutdown,
        )
        .await;
        ctrl_c.abort();
        result
    });

    // A pending stdin read blocks a runtime thread that cannot be interrupted
    runtime.shutdown_background();

    if let Err(e) = result {
        error!("{}", e);
    }
    Ok(())
}
