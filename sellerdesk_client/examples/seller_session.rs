use std::sync::Arc;

use clap::Parser;
use sellerdesk_client::{ApiClient, ApiRequest, ClientConfig};
use sellerdesk_tokens::{store::FileCredentialStore, LanguageCode};

#[derive(Debug, Parser)]
struct Opts {
    /// Base URL of the API backend
    #[arg(short, long, env = "SELLERDESK_API_URL")]
    api_url: url::Url,

    /// The local file used to cache the bearer token and preferences
    #[arg(
        short = 'f',
        long,
        env = "SELLERDESK_CREDENTIALS_FILE",
        default_value = ".sellerdesk-credentials.json"
    )]
    credentials_file: std::path::PathBuf,

    /// Language to request content in when no preference is stored
    #[arg(short, long, env = "SELLERDESK_LANGUAGE", default_value = "en")]
    language: String,

    /// Path to request, relative to the base URL
    #[arg(short, long, default_value = "profile")]
    path: String,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let store = Arc::new(FileCredentialStore::new(opts.credentials_file));

    let config = ClientConfig::new(opts.api_url, store)
        .with_default_language(LanguageCode::new(opts.language));
    let client = ApiClient::new(config);

    let body: serde_json::Value = client.request(ApiRequest::get(opts.path.as_str())).await?;

    tracing::info!(%body, "request succeeded");

    Ok(())
}
