mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{debug, warn, Level};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use dropwatch::core::{Config, DigitalOceanClient, MonitoringApi, Poller};
use dropwatch::screens::{render_table, TableRenderer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Before logging starts so RUST_LOG can come from the .env file
    let env_loaded = load_env(cli.env_file.as_deref());
    init_tracing(cli.verbose);
    if let Err(e) = env_loaded {
        warn!("{:#}", e);
    }

    let color = !cli.no_color && std::env::var_os("NO_COLOR").is_none();
    let config = Config::load(&cli.overrides()).context("Invalid configuration")?;
    debug!(?config, "configuration resolved");

    match cli.command.clone().unwrap_or(Commands::Watch) {
        Commands::Watch => handle_watch(&config, color).await?,
        Commands::Once => handle_once(&config, color).await?,
        Commands::Hosts => handle_hosts(&config).await?,
        Commands::Show { host } => handle_show(&config, host, color).await?,
        Commands::Config => handle_config(&config),
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dropwatch={}", level)));

    // stderr keeps stdout for the table
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load variables from an explicit env file, or ./.env when present
fn load_env(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    Ok(())
}

fn poller(config: &Config) -> Result<Poller<DigitalOceanClient>> {
    let client = DigitalOceanClient::from_config(config).context("Failed to create API client")?;
    Ok(Poller::new(client, config))
}

async fn handle_watch(config: &Config, color: bool) -> Result<()> {
    let poller = poller(config)?;
    let mut renderer = TableRenderer::stdout(config.clear_screen, color);
    poller.run(&mut renderer).await
}

async fn handle_once(config: &Config, color: bool) -> Result<()> {
    let poller = poller(config)?;
    let mut renderer = TableRenderer::stdout(false, color);
    poller.run_cycle(&mut renderer).await
}

async fn handle_hosts(config: &Config) -> Result<()> {
    let client = DigitalOceanClient::from_config(config).context("Failed to create API client")?;
    let hosts = client.list_hosts().await.context("Failed to list droplets")?;

    println!("{:<12} {:<30} {:<20}", "ID", "Name", "Size");
    println!("{}", "-".repeat(62));

    for host in &hosts {
        println!("{:<12} {:<30} {:<20}", host.id, host.name, host.size);
    }

    println!("\n{} droplet(s)", hosts.len());
    Ok(())
}

async fn handle_show(config: &Config, host: Option<u64>, color: bool) -> Result<()> {
    let host_id = host
        .or(config.host_id)
        .ok_or_else(|| anyhow!("No droplet given: pass --host or set DROPLET_ID"))?;

    let snapshot = poller(config)?.collect_one(host_id).await?;
    print!("{}", render_table(&[snapshot], color));
    Ok(())
}

fn handle_config(config: &Config) {
    println!("Configuration:\n");
    for (key, value) in config.display_entries() {
        println!("{:<16} {}", key, value);
    }
}
