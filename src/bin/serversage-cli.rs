use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Method, Response};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "serversage-cli")]
#[command(about = "Management CLI for ServerSage", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service and database health
    Health,
    /// Show entity counts
    Dashboard,
    /// Show mapped errors by code and exception type
    Errors,
    /// Inspect or clear the alert history
    Alerts {
        #[command(subcommand)]
        command: AlertCommands,
    },
    /// Post an alert to the service
    SendAlert {
        level: Level,
        message: String,
        #[arg(short, long, default_value = "CLI alert")]
        title: String,
    },
}

#[derive(Subcommand)]
enum AlertCommands {
    /// Alert counts per type
    Status,
    /// Stored alerts, optionally for one type
    History {
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
    },
    /// Drop every stored alert
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    General,
    Critical,
    Warning,
}

impl Level {
    fn path(self) -> &'static str {
        match self {
            Level::General => "api/alerts/webhook",
            Level::Critical => "api/alerts/critical",
            Level::Warning => "api/alerts/warning",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (method, path, body) = match cli.command {
        Commands::Health => (Method::GET, "health".to_string(), None),
        Commands::Dashboard => (Method::GET, "api/analytics/dashboard".to_string(), None),
        Commands::Errors => (Method::GET, "api/analytics/errors/summary".to_string(), None),
        Commands::Alerts { command } => match command {
            AlertCommands::Status => (Method::GET, "api/alerts/status".to_string(), None),
            AlertCommands::History { kind: Some(kind) } => {
                (Method::GET, format!("api/alerts/history/{}", kind), None)
            }
            AlertCommands::History { kind: None } => (Method::GET, "api/alerts/history".to_string(), None),
            AlertCommands::Clear => (Method::DELETE, "api/alerts/history".to_string(), None),
        },
        Commands::SendAlert { level, message, title } => (
            Method::POST,
            level.path().to_string(),
            Some(json!({ "title": title, "message": message })),
        ),
    };

    let mut request = client.request(method, cli.url.join(&path)?);
    if let Some(body) = body {
        request = request.json(&body);
    }
    print_response(request.send().await?).await?;

    Ok(())
}

async fn print_response(res: Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: ServerSage returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
