use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portgate::config::{Config, ConfigError, TierConfig};
use portgate::modes::{GatewayClient, InteractiveShell, LoadGenerator};
use portgate::Portgate;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portgate")]
#[command(about = "Two-tier gateway for mobile number portability lookups")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Portgate Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one portgate tier
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/gateway.toml")]
        config: PathBuf,
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the bind port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate example configuration files
    Config {
        /// Tier to generate a config for (gateway, router or store)
        #[arg(short, long)]
        mode: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Drive a running gateway with concurrent random callers
    Load {
        /// Gateway base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        gateway: String,
        /// Number of concurrent caller sessions
        #[arg(short, long, default_value_t = 1)]
        sessions: usize,
        /// Delay between operations of one caller
        #[arg(long, default_value_t = 2000)]
        interval_ms: u64,
        /// Operations per caller; runs until interrupted when omitted
        #[arg(long)]
        iterations: Option<u64>,
    },
    /// Issue gateway calls by hand from a numbered prompt
    Shell {
        /// Gateway base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        gateway: String,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, host, port } => {
            run_portgate(config, host, port).await?;
        }
        Commands::Config { mode, output } => {
            generate_config(mode, output)?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Load {
            gateway,
            sessions,
            interval_ms,
            iterations,
        } => {
            run_load(gateway, sessions, interval_ms, iterations).await?;
        }
        Commands::Shell { gateway } => {
            run_shell(gateway).await?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

async fn run_portgate(config_path: PathBuf, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = Config::load_from_file(&config_path)
        .and_then(|config| config.with_overrides(host, port))
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = config.tier.mode_name(),
        "starting portgate"
    );
    info!("Configuration loaded from: {:?}", config_path);
    info!("Listening on: {}", config.server.bind_addr());
    if let Some((min, max)) = config.server.latency_bounds() {
        info!(min_ms = min, max_ms = max, "login latency injection enabled");
    }

    let portgate = Portgate::new(config)?;
    portgate.run().await.context("Failed to run portgate")?;

    Ok(())
}

fn generate_config(mode: String, output: PathBuf) -> Result<()> {
    println!("Generating {} configuration file: {:?}", mode, output);

    Config::create_example_config(&output, &mode).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  portgate run --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!("  Tier: {}", config.tier.mode_name());
            println!("  Listen address: {}", config.server.bind_addr());

            match &config.tier {
                TierConfig::Gateway { routers } => {
                    println!("  Routers: {} instances", routers.len());
                    for (i, endpoint) in routers.iter().enumerate() {
                        println!("    {}: {}", i + 1, endpoint);
                    }
                }
                TierConfig::Router { primary, replicas } => {
                    println!("  Primary store: {}", primary);
                    println!("  Read replicas: {} instances", replicas.len());
                    for (i, endpoint) in replicas.iter().enumerate() {
                        println!("    {}: {}", i + 1, endpoint);
                    }
                }
                TierConfig::Store {} => {
                    println!("  In-memory mock store");
                }
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

async fn run_load(gateway: String, sessions: usize, interval_ms: u64, iterations: Option<u64>) -> Result<()> {
    init_logging(&Config::default())?;

    let mut generator = LoadGenerator::new(gateway);
    generator.sessions = sessions;
    generator.interval = Duration::from_millis(interval_ms);
    generator.iterations = iterations;

    info!(
        gateway = %generator.gateway_url,
        sessions,
        interval_ms,
        "starting load generator"
    );
    let failures = generator.run().await.context("Load generator failed")?;
    info!(failures, "load generator finished");

    Ok(())
}

async fn run_shell(gateway: String) -> Result<()> {
    // no tracing here: prompts and responses own the terminal
    let client = GatewayClient::new(gateway)?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    InteractiveShell::new(client)
        .run(stdin, tokio::io::stdout())
        .await
        .context("Shell failed")?;
    Ok(())
}

fn show_version() {
    println!("portgate v{}", env!("CARGO_PKG_VERSION"));
    println!("Two-tier gateway for mobile number portability lookups");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Tiers:");
    println!("  • gateway: cookie sessions and round-robin forwarding to routers");
    println!("  • router: read/write splitting over store replicas");
    println!("  • store: in-memory mock of the statement executor");
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    let file = match &config.logging.file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?,
        ),
        None => None,
    };

    let writer = match (config.logging.stdout, file) {
        (true, Some(file)) => BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))),
        (false, Some(file)) => BoxMakeWriter::new(Mutex::new(file)),
        (_, None) => BoxMakeWriter::new(std::io::stdout),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    info!(level = %config.logging.level, format = %config.logging.format, "logging initialized");
    Ok(())
}
