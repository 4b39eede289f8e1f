use clap::{Parser, Subcommand};
use serde_json::Value;

use erp_gateway::config::ClientConfig;
use erp_gateway::{ApiClient, ClientError};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command line client for the ERP gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000", env = "GATEWAY_URL")]
    url: String,

    /// Log in before running the command.
    #[arg(long, env = "GATEWAY_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "GATEWAY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the session payload
    Login,
    /// Show the current user
    Me,
    /// Modules the current user may open
    Modules,
    /// GET a backend path, e.g. /cadastro/clientes/
    Get { path: String },
    /// DELETE a backend path
    Delete { path: String },
    /// POST a JSON body to a backend path
    Post {
        path: String,
        /// JSON document, e.g. '{"nome":"ACME"}'
        body: String,
    },
    /// End the session
    Logout,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url, &ClientConfig::default())?;

    let session = match (&cli.username, &cli.password) {
        (Some(username), Some(password)) => Some(client.login(username, password).await?),
        _ => None,
    };

    let result = match cli.command {
        Commands::Login => match session {
            Some(payload) => Ok(Some(payload)),
            None => {
                eprintln!("Error: login requires --username and --password");
                std::process::exit(2);
            }
        },
        Commands::Me => match client.me().await {
            Ok(None) => Err(ClientError::NotAuthenticated),
            other => other,
        },
        Commands::Modules => client.modules().await,
        Commands::Get { path } => client.get(&path).await,
        Commands::Delete { path } => client.delete(&path).await,
        Commands::Post { path, body } => {
            let body: Value = serde_json::from_str(&body)?;
            client.post_json(&path, &body).await
        }
        Commands::Logout => client.logout().await.map(|_| None),
    };

    print_result(result)
}

fn print_result(result: Result<Option<Value>, ClientError>) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(Some(value)) => println!("{}", serde_json::to_string_pretty(&value)?),
        Ok(None) => println!("OK"),
        Err(ClientError::Status { status, body }) => {
            eprintln!("Error: gateway returned status {}", status);
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
