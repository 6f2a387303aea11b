use clap::Parser;
use latlab_client::{Client, ClientConfig};
use latlab_loadtest::report::{render_report, RunSummary};
use latlab_loadtest::simulator::LoadTestController;
use std::io::Write;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "latlab-loadtest",
    about = "Simulated before/after load test for the latency dashboard"
)]
struct Args {
    /// Base URL of the performance log store, e.g. http://127.0.0.1:4100.
    /// Omit to run without persistence.
    #[arg(long)]
    store_url: Option<String>,

    /// Emit the run summary as JSON instead of the text report.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let client = args
        .store_url
        .map(|base_url| Client::new(ClientConfig { base_url }));

    // Prior results are a convenience; a dead store degrades to running
    // without them, loudly.
    if let Some(client) = &client {
        match client.load_latest().await {
            Ok(Some(pair)) => println!(
                "Previous run: baseline {:.0} ms, optimized {:.0} ms, improvement {}%",
                pair.baseline_ms, pair.optimized_ms, pair.improvement_pct
            ),
            Ok(None) => println!("No complete prior run in the store"),
            Err(e) => tracing::warn!(
                "Store unreachable, continuing without prior results: {e}"
            ),
        }
    }

    let controller = Arc::new(LoadTestController::new());

    let mut progress_rx = controller.subscribe();
    let progress_handle = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let progress = *progress_rx.borrow_and_update();
            print!("\r{progress:>3}% complete");
            std::io::stdout().flush().ok();
            if progress == 100 {
                break;
            }
        }
        println!();
    });

    let pair = match controller.clone().start().await {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    };
    progress_handle.await.ok();

    let summary = RunSummary::from_pair(&pair);
    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize summary: {e}");
                process::exit(2);
            }
        }
    } else {
        println!("{}", render_report(&summary));
    }

    // Write failure is surfaced but non-fatal: the results above were
    // already shown and are not rolled back.
    if let Some(client) = &client {
        match client.save(&pair).await {
            Ok(()) => println!("Results saved to store"),
            Err(e) => eprintln!("Failed to save results: {e}"),
        }
    }
}
