use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hsit::api::{CalculateArgs, ServeArgs, calculate_from_args, run_http_server};

#[derive(Parser, Debug)]
#[command(
    name = "hsit",
    about = "Healthcare savings estimator for HSIT plan holders (premium inflation + out-of-pocket exposure to age 75)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the calculator JSON API.
    Serve(ServeArgs),
    /// Run one calculation and print the result as JSON.
    Calculate(CalculateArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => {
            if let Err(e) = run_http_server(args).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Calculate(args) => {
            let result = match calculate_from_args(args) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(2);
                }
            };
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Failed to encode result: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
