use clap::Parser;
use latlab_server::{Server, ServerConfig};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "latlab-server", about = "Append-only performance log store")]
struct Args {
    /// Address to bind, e.g. 127.0.0.1:4100. Port 0 picks a free port.
    #[arg(long, default_value = "127.0.0.1:4100")]
    address: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    // Print "Listening on <addr>" once the server signals it is bound.
    tokio::spawn(async move {
        if let Ok(addr) = ready_rx.await {
            println!("Listening on {}", addr);
        }
    });

    Server::new(ServerConfig { address: args.address }).run(ready_tx).await?;
    Ok(())
}
