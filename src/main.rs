use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use color_eyre::eyre::Result;
use playbulb_candle::*;
use tokio::time::Duration;
use tracing::{debug, error, instrument};
use tracing_subscriber::EnvFilter;

/// Exit status for invalid input
const EXIT_INVALID_INPUT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "candle", author, version, about, long_about = None)]
struct Cli {
    /// [flash|pulse|rainbow|fade|candle|solid], defaults to solid
    #[arg(short, long)]
    effect: Option<String>,

    /// 6 or 8 character hex code. If 8 characters, the first byte is the
    /// brightness, with 0 being off. Defaults to 00FF0000
    #[arg(short, long, visible_alias = "color")]
    colour: Option<String>,

    /// A value from 0 - 255
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    speed: i64,

    /// Time to let the effect write flush before disconnecting, in milliseconds
    #[arg(long, default_value_t = 1000)]
    flush_ms: u64,

    /// How long to scan for each candle, in seconds
    #[arg(long, default_value_t = 10)]
    scan_timeout: u64,

    /// How long to wait for each connection, in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Ask the candle to acknowledge the effect write
    #[arg(long)]
    confirm_writes: bool,

    /// Candle IDs (BLE address or platform identifier)
    #[arg(value_name = "CANDLE_ID")]
    candle_ids: Vec<String>,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            effect: self.effect.clone().unwrap_or_default(),
            colour: self.colour.clone().unwrap_or_default(),
            speed: self.speed,
            targets: self.candle_ids.clone(),
            flush_interval: Duration::from_millis(self.flush_ms),
        }
    }

    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            scan_timeout: Duration::from_secs(self.scan_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            confirm_writes: self.confirm_writes,
        }
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("playbulb_candle=info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    color_eyre::install()?;

    let cli = Cli::parse();
    debug!("Parsed command line arguments: {:?}", cli);

    // Nothing to do without a colour or an effect
    if cli.colour.is_none() && cli.effect.is_none() {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let plan = match cli.config().validate() {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
    };

    let transport = Arc::new(BleTransport::new(cli.transport_config()).await?);

    if let Err(e) = plan.execute(transport).await {
        error!("{}", e);
        eprintln!("Error: {e}");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
