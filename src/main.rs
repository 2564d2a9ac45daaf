use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::DateTime;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use eculease::{Config, LeaseManager, LeaseServer, Result};

#[derive(Parser)]
#[command(name = "eculease")]
#[command(author, version, about = "Sticky-lease DHCP lease manager for ECU diagnostics", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Network interface to report in the configuration.
    #[arg(short, long)]
    interface: Option<String>,

    /// Server address.
    #[arg(short = 'a', long)]
    ip: Option<Ipv4Addr>,

    /// Subnet mask.
    #[arg(short, long)]
    subnet: Option<Ipv4Addr>,

    /// First address of the allocation pool (inclusive).
    #[arg(long)]
    range_start: Option<Ipv4Addr>,

    /// Last address of the allocation pool (inclusive).
    #[arg(long)]
    range_end: Option<Ipv4Addr>,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    ShowConfig,
    ListLeases,
    CleanupLeases,
}

impl Cli {
    /// Flags override the config file; everything is re-validated after.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(ip) = self.ip {
            config.server_ip = ip;
        }
        if let Some(subnet) = self.subnet {
            config.subnet_mask = subnet;
        }
        if let Some(start) = self.range_start {
            config.pool_start = start;
        }
        if let Some(end) = self.range_end {
            config.pool_end = end;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries engine responses and the ECU notification; logs go to
    // stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = Config::load_or_create(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Starting lease server with config: {:?}", cli.config);
            let server = LeaseServer::new(config).await?;

            tokio::select! {
                result = server.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server...");
                }
            }

            // Final flush so a restart can recover every current binding.
            server.save_leases().await
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::ListLeases => {
            let manager = LeaseManager::bootstrap(Arc::new(config)).await?;
            if manager.store().is_empty() {
                println!("No active leases.");
                return Ok(());
            }

            println!(
                "{:<20} {:<16} {:<24} {:<8}",
                "MAC", "IP Address", "Expires At", "State"
            );
            println!("{}", "-".repeat(70));
            for (hw_addr, lease) in manager.store().all() {
                let expires = DateTime::from_timestamp_millis(lease.expires_at)
                    .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| lease.expires_at.to_string());
                println!(
                    "{:<20} {:<16} {:<24} {:<8}",
                    hw_addr,
                    lease.address.to_string(),
                    expires,
                    "BOUND"
                );
            }
            Ok(())
        }
        Commands::CleanupLeases => {
            let mut manager = LeaseManager::bootstrap(Arc::new(config)).await?;
            let count = manager.sweep();
            manager.save_now().await?;
            println!("Cleaned up {} expired lease(s).", count);
            Ok(())
        }
    }
}
