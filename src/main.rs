use anyhow::{Context, Result, bail};
use clap::Parser;
use fetch_helper::http::{Flow, ProgressCallback, RequestDescriptor};
use fetch_helper::{ClientConfig, DirectorySaver, FetchResponse, RequestClient};
use log::{debug, info};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use std::path::PathBuf;
use std::sync::Arc;

/// fetch-helper - HTTP requests with default headers, retry and `[data, status]` results
///
/// Prints every result as a JSON array `[data, status]`. A status of -1 means
/// no response was received.
///
/// Examples:
///   fetch-helper get https://api.example.com/items
///   fetch-helper -H 'Authorization: Bearer xyz' request -X POST -d '{"a":1}' https://api.example.com/items
#[derive(Parser, Debug)]
#[command(author, version = env!("FETCH_HELPER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (JSON; also via FETCH_HELPER_CONFIG)
    #[arg(
        long = "config",
        short = 'c',
        env = "FETCH_HELPER_CONFIG",
        value_name = "PATH",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Extra default header, repeatable
    #[arg(long = "header", short = 'H', value_name = "NAME: VALUE", global = true)]
    pub headers: Vec<String>,

    /// Never retry, not even GET requests
    #[arg(long = "no-retry", global = true)]
    pub no_retry: bool,

    /// Log debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a GET request
    Get(GetArgs),

    /// Send a request with any method
    Request(RequestArgs),

    /// Upload a file as the request body
    Upload(UploadArgs),

    /// Download a response body into a directory
    Download(DownloadArgs),
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    #[arg(value_name = "URL")]
    pub url: String,
}

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(long = "method", short = 'X', default_value = "GET")]
    pub method: String,

    /// Request body
    #[arg(long = "data", short = 'd')]
    pub data: Option<String>,

    #[arg(value_name = "URL")]
    pub url: String,
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    /// HTTP method (defaults to POST)
    #[arg(long = "method", short = 'X')]
    pub method: Option<String>,

    #[arg(value_name = "URL")]
    pub url: String,

    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    #[arg(value_name = "URL")]
    pub url: String,

    /// Filename prefix, followed by a YYYYMMDDHHMMSS timestamp
    #[arg(long = "prefix", default_value = "download_")]
    pub prefix: String,

    /// Target directory (defaults to the user's download directory)
    #[arg(long = "dir", value_name = "PATH")]
    pub dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let client = Arc::new(build_client(&cli)?);
    let response = run(&client, cli.command).await?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

fn build_client(cli: &Cli) -> Result<RequestClient> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if cli.no_retry {
        config.retry.enabled = false;
    }

    let client = RequestClient::from_config(&config)?;
    for header in &cli.headers {
        let (name, value) = parse_header(header)?;
        client.add_default_header(name, value);
    }

    client.add_after_response_interceptor(|event, request| {
        debug!("{} -> {}", request.target, event.status());
        Ok(Flow::Continue)
    });

    Ok(client)
}

async fn run(client: &RequestClient, command: Commands) -> Result<FetchResponse> {
    let response = match command {
        Commands::Get(args) => client.fetch(RequestDescriptor::get(args.url)).await?,
        Commands::Request(args) => {
            let mut request = RequestDescriptor::new(args.url).method(parse_method(&args.method)?);
            if let Some(data) = args.data {
                request = request.body(data);
            }
            client.fetch(request).await?
        }
        Commands::Upload(args) => {
            let body = std::fs::read(&args.file)
                .with_context(|| format!("Failed to read {:?}", args.file))?;
            let mut request = RequestDescriptor::new(args.url).body(body);
            if let Some(method) = &args.method {
                request = request.method(parse_method(method)?);
            }
            let progress: ProgressCallback = Arc::new(|sent: u64, total: Option<u64>| match total {
                Some(total) => info!("Uploaded {}/{} bytes", sent, total),
                None => info!("Uploaded {} bytes", sent),
            });
            client.upload_file(request, Some(progress)).await?
        }
        Commands::Download(args) => {
            let saver = match args.dir {
                Some(dir) => DirectorySaver::new(dir),
                None => DirectorySaver::downloads()
                    .context("No download directory available; pass --dir")?,
            };
            client
                .fetch_file(RequestDescriptor::get(args.url), &args.prefix, Arc::new(saver))
                .await?
        }
    };
    Ok(response)
}

/// Parses `Name: Value`.
fn parse_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = header.split_once(':') else {
        bail!("Invalid header {:?}, expected \"Name: Value\"", header);
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name in {:?}", header))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value in {:?}", header))?;
    Ok((name, value))
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method {:?}", method))
}
