use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use callback_relay::crypto::{KeyMaterial, KeyRing, LegacyVerifier};

#[derive(Parser)]
#[command(name = "callback-cli")]
#[command(about = "Key and token tooling for the callback relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh encryption key
    Keygen,
    /// Encrypt a bearer token under the current (first) key
    Encrypt {
        /// Bearer token to encrypt
        token: String,
        /// Encryption key; repeat for a rotated list, current key first
        #[arg(short, long = "key", required = true)]
        keys: Vec<String>,
    },
    /// Produce a legacy signed token
    SignLegacy {
        /// Bearer token to sign
        token: String,
        #[arg(long)]
        secret: String,
        #[arg(long)]
        salt: Option<String>,
    },
    /// Submit a callback to a running relay
    Send {
        #[arg(long, default_value = "http://localhost:5309")]
        relay: String,
        /// Destination callback URL (https)
        #[arg(long)]
        url: String,
        /// Encrypted or legacy-signed token
        #[arg(long)]
        token: String,
        /// Path to a JSON file holding the notification payload
        #[arg(long)]
        payload: PathBuf,
        #[arg(long)]
        legacy: bool,
        #[arg(long)]
        salt: Option<String>,
    },
    /// Query relay health
    Health {
        #[arg(long, default_value = "http://localhost:5309")]
        relay: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            println!("{}", KeyMaterial::generate());
        }
        Commands::Encrypt { token, keys } => {
            let ring = KeyRing::from_keys(&keys)?;
            println!("{}", ring.encrypt(&token)?);
        }
        Commands::SignLegacy { token, secret, salt } => {
            let verifier = LegacyVerifier::from_secret(&secret, salt.as_deref())?;
            println!("{}", verifier.sign(&token, None)?);
        }
        Commands::Send {
            relay,
            url,
            token,
            payload,
            legacy,
            salt,
        } => {
            let payload: Value = serde_json::from_str(&std::fs::read_to_string(&payload)?)?;
            let body = serde_json::json!({
                "url": url,
                "encrypted_token": token,
                "payload": payload,
                "legacy": legacy,
                "salt": salt,
            });
            let res = reqwest::Client::new()
                .post(format!("{}/callback/send", relay.trim_end_matches('/')))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health { relay } => {
            let res = reqwest::get(format!("{}/health", relay.trim_end_matches('/'))).await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
