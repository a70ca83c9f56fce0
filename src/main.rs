/*!
 * Orbit S3 Router CLI
 *
 * Inspect buckets across regions from the command line.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orbit_s3_router::{
    config::{LogLevel, RouterConfig},
    logging,
    protocol::s3::{BucketRegion, MultiRegionClient, PlaintextSecrets, DEFAULT_PRESIGN_EXPIRY},
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FATAL: i32 = 1;

#[derive(Parser)]
#[command(name = "orbit-s3-router")]
#[command(version, about = "Multi-region S3 access without knowing bucket locations", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override the default region
    #[arg(long, global = true)]
    region: Option<String>,

    /// Override the log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the region hosting a bucket
    Region { bucket: String },

    /// List buckets (requires s3:ListAllMyBuckets)
    Buckets,

    /// List objects under a prefix
    Ls {
        bucket: String,
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Show object metadata
    Stat { bucket: String, key: String },

    /// Presign a GET (or PUT) of an object
    Presign {
        bucket: String,
        key: String,
        /// Expiry in seconds
        #[arg(long)]
        expires: Option<u64>,
        /// Presign an upload instead of a download
        #[arg(long)]
        put: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => RouterConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => RouterConfig::default(),
    };
    if let Some(region) = cli.region.clone() {
        config.connection.region = region;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level.into();
    }

    logging::init_logging(&config.logging)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(execute(cli.command, config, cli.json))
}

async fn execute(command: Commands, config: RouterConfig, as_json: bool) -> Result<()> {
    let client = MultiRegionClient::connect(config.connection, Arc::new(PlaintextSecrets)).await?;
    let result = dispatch(&client, command, as_json).await;
    client.close();
    result
}

async fn dispatch(client: &MultiRegionClient, command: Commands, as_json: bool) -> Result<()> {
    match command {
        Commands::Region { bucket } => {
            let region = client.region_for(&bucket).await?;
            let name = match &region {
                BucketRegion::Located(region) => Some(region.as_ref().to_string()),
                BucketRegion::Missing => None,
            };
            if as_json {
                println!("{}", json!({ "bucket": bucket, "region": name }));
            } else {
                println!("{}", name.as_deref().unwrap_or("(bucket does not exist)"));
            }
        }
        Commands::Buckets => {
            if !client.has_list_buckets_permission() {
                anyhow::bail!("Credentials lack s3:ListAllMyBuckets");
            }
            for bucket in client.list_buckets().await? {
                if as_json {
                    println!("{}", serde_json::to_string(&bucket)?);
                } else {
                    println!("{}", bucket.name);
                }
            }
        }
        Commands::Ls { bucket, prefix } => {
            let listing = client
                .list_all_objects(&bucket, prefix.as_deref(), None)
                .await?;
            for object in listing.objects {
                if as_json {
                    println!("{}", serde_json::to_string(&object)?);
                } else {
                    println!("{:>12}  {}", object.size, object.key);
                }
            }
        }
        Commands::Stat { bucket, key } => match client.head_object(&bucket, &key).await? {
            Some(metadata) if as_json => println!("{}", serde_json::to_string_pretty(&metadata)?),
            Some(metadata) => {
                println!("key:          {}", metadata.key);
                println!("size:         {}", metadata.size);
                println!("etag:         {}", metadata.etag.as_deref().unwrap_or("-"));
                println!(
                    "content-type: {}",
                    metadata.content_type.as_deref().unwrap_or("-")
                );
            }
            None => anyhow::bail!("s3://{}/{} does not exist", bucket, key),
        },
        Commands::Presign {
            bucket,
            key,
            expires,
            put,
        } => {
            let expires_in = expires
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_PRESIGN_EXPIRY);
            let presigner = client.presigner(&bucket).await?;
            let url = if put {
                presigner.presign_put(&key, expires_in).await?
            } else {
                presigner.presign_get(&key, expires_in).await?
            };
            if as_json {
                println!(
                    "{}",
                    json!({ "url": url.url, "method": url.method, "headers": url.headers })
                );
            } else {
                println!("{}", url.url);
            }
        }
    }
    Ok(())
}
