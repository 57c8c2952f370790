use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::multipart;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "huddle-admin")]
#[command(about = "Management CLI for the Huddle chat backend", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000", env = "HUDDLE_URL")]
    url: String,

    /// Username or email to log in with
    #[arg(short, long, env = "HUDDLE_IDENTIFIER")]
    identifier: Option<String>,

    /// Shared password
    #[arg(short, long, env = "HUDDLE_PASSWORD")]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,
    /// Show the logged-in account
    Me,
    /// List all accounts (admin)
    Users,
    /// Create a member account (admin)
    CreateUser {
        username: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Upload an image as chat media
    Upload { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().cookie_store(true).build()?;
    let base = cli.url.trim_end_matches('/').to_string();

    if !matches!(cli.command, Commands::Health) {
        login(&client, &base, cli.identifier.as_deref(), cli.password.as_deref()).await?;
    }
    let res = send(&client, &base, cli.command).await?;
    print_response(res).await
}

async fn login(
    client: &reqwest::Client,
    base: &str,
    identifier: Option<&str>,
    password: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(identifier), Some(password)) = (identifier, password) else {
        return Err("--identifier and --password are required for this command".into());
    };
    let res = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "identifier": identifier, "password": password }))
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(format!("login failed with status {status}: {text}").into());
    }
    Ok(())
}

async fn send(
    client: &reqwest::Client,
    base: &str,
    command: Commands,
) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    let res = match command {
        Commands::Health => client.get(format!("{base}/api/health")).send().await?,
        Commands::Me => client.get(format!("{base}/api/me")).send().await?,
        Commands::Users => client.get(format!("{base}/api/admin/users")).send().await?,
        Commands::CreateUser {
            username,
            display_name,
            email,
        } => {
            client
                .post(format!("{base}/api/admin/users"))
                .json(&json!({
                    "username": username,
                    "displayName": display_name,
                    "email": email,
                }))
                .send()
                .await?
        }
        Commands::Upload { file } => {
            let bytes = tokio::fs::read(&file).await?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(name));
            client
                .post(format!("{base}/api/media/upload"))
                .multipart(form)
                .send()
                .await?
        }
    };
    Ok(res)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
