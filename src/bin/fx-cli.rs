use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fx-cli")]
#[command(about = "Command-line client for the fx-gateway currency API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,
    /// List supported currencies
    Currencies,
    /// Convert an amount between USD and another currency
    Convert {
        amount: String,
        from: String,
        to: String,
    },
    /// Fetch the greeting endpoint
    Hello,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match &cli.command {
        Commands::Health => client.get(format!("{base}/health")),
        Commands::Currencies => client.get(format!("{base}/currencies")),
        Commands::Hello => client.get(format!("{base}/hello")),
        Commands::Convert { amount, from, to } => client
            .get(format!("{base}/convert"))
            .query(&[("amount", amount), ("from", from), ("to", to)]),
    };

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
