//! Command-line client for resilient transfers against the app distribution API.

mod api_client;
mod config;

use anyhow::{Context, Result};
use api_client::ApiClient;
use clap::{Args, Parser, Subcommand};
use config::{ClientConfig, client_config_path, load_client_config};
use launchpad_core::{
    Checksum, ChecksumAlgorithm, Checksums, NotarySubmissionRequest, RetryPolicy,
    UploadOperation, resolve_timeout,
};
use launchpad_signer::TokenCache;
use launchpad_transfer::{
    BearerAuthenticator, S3Uploader, UploadExecutor, build_http_client, compute_file_checksum,
    compute_file_checksums, compute_file_sha256, verify_file_checksums, with_retry,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser)]
#[command(name = "launchpad")]
#[command(about = "Resilient uploads and notarization for the app distribution API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ClientConfigArgs {
    /// Client config file path
    #[arg(long, env = "LAUNCHPAD_CLIENT_CONFIG")]
    client_config: Option<String>,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Notary API base URL (overrides client config)
    #[arg(long)]
    notary_url: Option<String>,

    #[command(flatten)]
    client: ClientConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a short-lived API token and print it
    Token {
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Print the digest of a file
    Checksum {
        file: PathBuf,
        /// Digest algorithm (md5 or sha256)
        #[arg(long, default_value = "sha256")]
        algorithm: ChecksumAlgorithm,
    },
    /// Check a file against an expected digest
    Verify {
        file: PathBuf,
        /// Expected SHA-256 (hex)
        #[arg(long, conflicts_with = "md5", required_unless_present = "md5")]
        sha256: Option<String>,
        /// Expected MD5 (hex)
        #[arg(long)]
        md5: Option<String>,
    },
    /// Upload a file using the operations issued by the API
    Upload {
        file: PathBuf,
        /// JSON file holding the upload operations array
        #[arg(long)]
        operations: PathBuf,
        /// Operations in flight at once (overrides client config)
        #[arg(long)]
        concurrency: Option<usize>,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
    /// Notarization submissions
    Notary {
        #[command(subcommand)]
        command: NotaryCommands,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Show the resolved client configuration
    Config {
        #[command(flatten)]
        client: ClientConfigArgs,
    },
}

#[derive(Subcommand)]
enum NotaryCommands {
    /// Submit an archive for notarization
    Submit {
        file: PathBuf,
        /// Submission name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Path-style object storage endpoint, for testing
        #[arg(long, hide = true)]
        s3_endpoint: Option<String>,
    },
    /// Show the status of a submission
    Status { id: String },
    /// Show the developer log URL of a submission
    Logs { id: String },
    /// List recent submissions
    List,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let Cli { command } = Cli::parse();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling in-flight transfers");
            trigger.cancel();
        }
    });

    let result = match command {
        Commands::Token { client } => handle_token_command(&client).await,
        Commands::Checksum { file, algorithm } => handle_checksum_command(&file, algorithm).await,
        Commands::Verify { file, sha256, md5 } => handle_verify_command(&file, sha256, md5).await,
        Commands::Upload {
            file,
            operations,
            concurrency,
            client,
        } => handle_upload_command(&file, &operations, concurrency, &client, cancel).await,
        Commands::Notary { command, api } => handle_notary_command(command, &api, cancel).await,
        Commands::Config { client } => handle_config_command(&client).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_config(args: &ClientConfigArgs) -> Result<ClientConfig> {
    let path = client_config_path(args.client_config.as_deref())?;
    load_client_config(&path)
}

fn http_client() -> Result<reqwest::Client> {
    build_http_client(resolve_timeout()).context("failed to build HTTP client")
}

async fn handle_token_command(args: &ClientConfigArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let token = config.token_minter()?.mint().context("failed to mint token")?;
    println!("{}", token.as_str());
    Ok(())
}

async fn handle_checksum_command(file: &Path, algorithm: ChecksumAlgorithm) -> Result<()> {
    let checksum = compute_file_checksum(file, algorithm)
        .await
        .with_context(|| format!("failed to digest {}", file.display()))?;
    println!("{}  {}", checksum.hash, file.display());
    Ok(())
}

async fn handle_verify_command(
    file: &Path,
    sha256: Option<String>,
    md5: Option<String>,
) -> Result<()> {
    let expected = match (sha256, md5) {
        (Some(hash), _) => Checksum::parse(ChecksumAlgorithm::Sha256, &hash)?,
        (None, Some(hash)) => Checksum::parse(ChecksumAlgorithm::Md5, &hash)?,
        (None, None) => anyhow::bail!("one of --sha256 or --md5 is required"),
    };
    let expected = Checksums {
        file: Some(expected),
    };

    verify_file_checksums(file, &expected)
        .await
        .with_context(|| format!("verification failed for {}", file.display()))?;
    println!("OK  {}", file.display());
    Ok(())
}

async fn handle_upload_command(
    file: &Path,
    operations_path: &Path,
    concurrency: Option<usize>,
    args: &ClientConfigArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let config = resolve_config(args)?;
    let raw = tokio::fs::read(operations_path)
        .await
        .with_context(|| format!("failed to read {}", operations_path.display()))?;
    let operations: Vec<UploadOperation> =
        serde_json::from_slice(&raw).context("operations file is not a valid operations array")?;

    // The API expects the file MD5 alongside the upload commit.
    let digests = compute_file_checksums(file, &[ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha256])
        .await
        .with_context(|| format!("failed to digest {}", file.display()))?;

    let concurrency = concurrency
        .or(config.upload_concurrency)
        .unwrap_or(launchpad_transfer::upload::DEFAULT_UPLOAD_CONCURRENCY);
    let report = UploadExecutor::new(http_client()?)
        .with_concurrency(concurrency)
        .with_retry(RetryPolicy::from_env())
        .with_cancellation(cancel)
        .execute(file, &operations)
        .await
        .context("upload failed")?;

    let output = json!({
        "operations": report.operations,
        "bytesSent": report.bytes_sent,
        "md5": digests[0].hash,
        "sha256": digests[1].hash,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn notary_client(
    config: &ClientConfig,
    args: &ApiArgs,
    http: reqwest::Client,
    cancel: CancellationToken,
) -> Result<ApiClient> {
    let tokens = Arc::new(TokenCache::new(config.token_minter()?));
    let base_url = args
        .notary_url
        .as_deref()
        .unwrap_or_else(|| config.notary_base_url());
    Ok(ApiClient::new(http, base_url, BearerAuthenticator::new(tokens))?
        .with_retry(RetryPolicy::from_env())
        .with_cancellation(cancel))
}

async fn handle_notary_command(
    command: NotaryCommands,
    args: &ApiArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let config = resolve_config(&args.client)?;
    let http = http_client()?;
    let client = notary_client(&config, args, http.clone(), cancel.clone())?;

    let output = match command {
        NotaryCommands::Submit {
            file,
            name,
            s3_endpoint,
        } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("cannot derive a submission name; pass --name")?,
            };
            let sha256 = compute_file_sha256(&file)
                .await
                .with_context(|| format!("failed to digest {}", file.display()))?;

            let submission = client
                .submit_notarization(&NotarySubmissionRequest::new(&sha256, &name))
                .await?;
            let credentials = submission.data.attributes.credentials();

            let mut uploader = S3Uploader::new(http);
            if let Some(endpoint) = s3_endpoint {
                uploader =
                    uploader.with_endpoint(Url::parse(&endpoint).context("invalid --s3-endpoint")?);
            }
            let policy = RetryPolicy::from_env();
            with_retry(&policy, &cancel, || uploader.upload_file(&credentials, &file))
                .await
                .context("failed to upload submission")?;
            tracing::info!(id = %submission.data.id, "submission uploaded");

            json!({
                "id": submission.data.id,
                "name": name,
                "sha256": sha256,
            })
        }
        NotaryCommands::Status { id } => {
            let response = client.notarization_status(&id).await?;
            let data = response.data;
            json!({
                "id": data.id,
                "status": data.attributes.status.to_string(),
                "name": data.attributes.name,
                "createdDate": data.attributes.created_date,
            })
        }
        NotaryCommands::Logs { id } => {
            let response = client.notarization_logs(&id).await?;
            json!({
                "id": response.data.id,
                "developerLogUrl": response.data.attributes.developer_log_url,
            })
        }
        NotaryCommands::List => {
            let response = client.list_notarizations().await?;
            let submissions: Vec<_> = response
                .data
                .into_iter()
                .map(|data| {
                    json!({
                        "id": data.id,
                        "status": data.attributes.status.to_string(),
                        "name": data.attributes.name,
                        "createdDate": data.attributes.created_date,
                    })
                })
                .collect();
            json!(submissions)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn handle_config_command(args: &ClientConfigArgs) -> Result<()> {
    let path = client_config_path(args.client_config.as_deref())?;
    let mut config = load_client_config(&path)?.redacted();
    config.api_base_url = Some(config.api_base_url().to_string());
    config.notary_base_url = Some(config.notary_base_url().to_string());
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
