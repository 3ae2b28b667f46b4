use anyhow::{Context, Result};
use base64::Engine as _;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "comanda", about = "Comanda kitchen inventory CLI")]
struct Cli {
    /// Base URL of the comandad service.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a chef's face from an image file
    RegisterFace {
        /// Path to the photo (png or jpeg)
        image: PathBuf,
        /// Chef display name
        #[arg(short, long)]
        name: String,
        /// Collaborator id
        #[arg(short, long)]
        id: i32,
        /// Credential secret (stored hashed server-side)
        #[arg(short, long)]
        secret: String,
    },
    /// Test a face login from an image file
    LoginFace {
        /// Path to the photo (png or jpeg)
        image: PathBuf,
    },
    /// Search the item catalog
    Items {
        term: String,
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// List the chef roster
    Chefs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::RegisterFace {
            image,
            name,
            id,
            secret,
        } => {
            let payload = image_payload(&image)?;
            let response = client
                .post(format!("{}/faces/register", cli.server))
                .json(&serde_json::json!({
                    "image_base64": payload,
                    "display_name": name,
                    "secret": secret,
                    "collaborator_id": id,
                }))
                .send()
                .await?;
            print_response(response).await
        }
        Commands::LoginFace { image } => {
            let payload = image_payload(&image)?;
            let response = client
                .post(format!("{}/faces/login", cli.server))
                .json(&serde_json::json!({ "image_base64": payload }))
                .send()
                .await?;
            print_response(response).await
        }
        Commands::Items { term, limit } => {
            let response = client
                .get(format!("{}/items", cli.server))
                .query(&[("search_term", term.as_str()), ("limit", &limit.to_string())])
                .send()
                .await?;
            print_response(response).await
        }
        Commands::Chefs => {
            let response = client.get(format!("{}/chefs", cli.server)).send().await?;
            print_response(response).await
        }
    }
}

/// Build the data-URI payload the service expects from an image file.
fn image_payload(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let media_type = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    };
    Ok(format!(
        "data:{media_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
    println!("{status}");
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
