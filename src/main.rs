//! Lexicon inspector
//!
//! Prints the merged lexicon visible in a scope as JSON.
//!
//! ```text
//! lexicon-inspect [scope] [--entries]
//! ```

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocr_corrections::{Config, CorrectionService, Scope};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocr_corrections=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let mut scope = Scope::Global;
    let mut entries = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--entries" => entries = true,
            other => scope = Scope::for_type(other),
        }
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Reading lexicon from {}", config.database.url);

    let service = CorrectionService::connect(config)
        .await
        .context("Failed to open correction database")?;

    let output = if entries {
        serde_json::to_string_pretty(&service.lexicon_entries(&scope).await?)?
    } else {
        serde_json::to_string_pretty(&service.get_lexicon_snapshot(&scope).await?)?
    };
    println!("{}", output);

    Ok(())
}
