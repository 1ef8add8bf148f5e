use clap::Parser;
use log::{error, info};
use server::config::GameSettings;
use server::events::{spawn_event_writer, EventLog};
use server::network::Server;
use shared::{QuestionBank, DEFAULT_PORT};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with the question bank
    questions: PathBuf,

    /// Questions asked per round
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    num_questions: u32,

    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// File the game events are appended to
    #[arg(short, long, default_value = "logs/game_events.log")]
    event_log: PathBuf,

    /// Seconds each player has to answer a question
    #[arg(short, long, default_value = "10")]
    answer_timeout: u64,
}

impl Args {
    fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let questions = QuestionBank::load(&args.questions)?;
    info!(
        "Loaded {} questions from {}",
        questions.len(),
        args.questions.display()
    );

    let (events, receiver) = EventLog::channel();
    let writer = spawn_event_writer(&args.event_log, receiver).await?;

    let settings = GameSettings {
        answer_timeout: Duration::from_secs(args.answer_timeout),
        ..GameSettings::default()
    };
    let address = args.bind_address();
    let server = Server::new(&address.to_string(), questions, args.num_questions, settings, events).await?;
    println!("Servidor escuchando en {}", address);

    let shutdown = CancellationToken::new();
    let mut server_handle = tokio::spawn(server.run(shutdown.clone()));

    let result = tokio::select! {
        result = &mut server_handle => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.cancel();
            server_handle.await
        }
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Server stopped with error: {}", e),
        Err(e) => error!("Server task panicked: {}", e),
    }

    // Every EventLog handle is gone with the server, so the writer drains and exits
    if let Err(e) = writer.await {
        error!("Event writer task panicked: {}", e);
    }

    println!("Servidor detenido por el usuario");
    Ok(())
}
