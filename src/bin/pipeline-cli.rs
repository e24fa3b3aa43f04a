use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "pipeline-cli")]
#[command(about = "Management CLI for the resilience pipeline service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin bearer token, if the service requires one.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status and configured pipelines
    Status,
    /// Show call statistics for every pipeline
    Dashboard,
    /// Show stats and circuit state of one pipeline
    Pipeline { name: String },
    /// Force one circuit breaker closed
    Reset { name: String },
    /// Force every circuit breaker closed
    ResetAll,
    /// Invoke a pipeline against its downstream
    Call {
        name: String,
        /// Number of sequential calls
        #[arg(short, long, default_value_t = 1)]
        times: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url)).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Dashboard => {
            let res = client.get(format!("{}/api/dashboard", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Pipeline { name } => {
            let res = client.get(format!("{}/api/pipelines/{}", cli.url, name)).send().await?;
            print_response(res).await?;
        }
        Commands::Reset { name } => {
            let res = client.get(format!("{}/api/pipelines/{}/reset", cli.url, name)).send().await?;
            print_response(res).await?;
        }
        Commands::ResetAll => {
            let res = client.get(format!("{}/api/reset-all", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Call { name, times } => {
            for _ in 0..times {
                let res = client.get(format!("{}/api/call/{}", cli.url, name)).send().await?;
                print_response(res).await?;
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
