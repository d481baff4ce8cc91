//! Artie Sensor Control Tool
//!
//! CLI for registering sensors with the Artie sensor daemon and inspecting it.

use anyhow::{Context, Result};
use artie_sensor_client::{SensorClient, DEFAULT_URL};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "artiectl")]
#[command(about = "Control tool for the Artie sensor daemon")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Daemon control API address
    #[arg(long, env = "ARTIE_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a sensor executable
    Add {
        /// Path to the sensor executable (e.g., /opt/sensors/temperature-1.2.3.jar)
        path: String,
    },
    /// List registered sensors
    List,
    /// Show readiness and active sensors
    Status,
    /// Request daemon shutdown (stops every active sensor)
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = SensorClient::new(&cli.url).context("Failed to create daemon client")?;
    debug!("Using daemon at {}", client.base_url());

    match cli.command {
        Commands::Add { path } => handle_add(&path, &client, cli.json).await,
        Commands::List => handle_list(&client, cli.json).await,
        Commands::Status => handle_status(&client, cli.json).await,
        Commands::Shutdown => handle_shutdown(&client).await,
    }
}

async fn handle_add(path: &str, client: &SensorClient, json: bool) -> Result<()> {
    let sensor = client.add_sensor(path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sensor)?);
    } else {
        println!(
            "Added sensor: {} (port {}, management port {})",
            sensor.sensor_name, sensor.sensor_port, sensor.management_port
        );
    }
    Ok(())
}

async fn handle_list(client: &SensorClient, json: bool) -> Result<()> {
    let sensors = client.list_sensors().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sensors)?);
        return Ok(());
    }

    println!("Registered sensors:");
    if sensors.is_empty() {
        println!("  (none)");
    }
    for sensor in sensors {
        println!(
            "  {:>3}  {:<16} {:>5}/{:<5}  {}",
            sensor.id,
            sensor.sensor_name,
            sensor.sensor_port,
            sensor.management_port,
            sensor.executable_path
        );
    }
    Ok(())
}

async fn handle_status(client: &SensorClient, json: bool) -> Result<()> {
    let status = client.status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Daemon: running at {}", client.base_url());
    println!("Ready: {}", if status.ready { "yes" } else { "no" });
    println!("Active sensors:");
    if status.active.is_empty() {
        println!("  (none)");
    }
    for sensor in status.active {
        println!(
            "  {:<16} {:>5}  {}",
            sensor.sensor_name, sensor.sensor_port, sensor.state
        );
    }
    Ok(())
}

async fn handle_shutdown(client: &SensorClient) -> Result<()> {
    client.shutdown().await?;
    println!("Shutdown request sent to daemon");
    Ok(())
}
