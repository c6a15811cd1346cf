//! Depth mirror entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depth_mirror::config::Config;
use depth_mirror::metrics;
use depth_mirror::orderbook::MarketMirror;
use depth_mirror::seed::SeedClient;
use depth_mirror::stream::{ConnectionConfig, ConnectionManager, WsConnector};

/// Mirror one market's order book and ticker from the exchange stream.
#[derive(Parser, Debug)]
#[command(name = "depth-mirror")]
#[command(about = "Client-side order book and ticker mirror")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Market to mirror (overrides MIRROR_MARKET).
    #[arg(short, long, global = true)]
    market: Option<String>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror the market and log top of book until interrupted (default).
    Watch,

    /// Check configuration validity.
    CheckConfig,

    /// Fetch and print the seed endpoints once.
    Seed {
        /// Candle interval.
        #[arg(long, default_value = "1m")]
        interval: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(market) = args.market.clone() {
        config.mirror_market = market;
    }

    let filter = if args.verbose || config.verbose {
        EnvFilter::new("depth_mirror=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.rust_log))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Some(port) = args.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Metrics endpoint listening");
    }
    metrics::init_metrics();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(&config),
        Some(Command::Seed { interval }) => cmd_seed(&config, &interval).await,
        Some(Command::Watch) | None => cmd_watch(config).await,
    }
}

/// Check configuration validity.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("DEPTH MIRROR - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("\nConfiguration:");
    println!("  Stream URL:           {}", config.mirror_ws_url);
    println!("  Seed URL:             {}", config.mirror_http_url);
    println!("  Market:               {}", config.mirror_market);
    println!("  Reconnect delay:      {}ms", config.reconnect_delay_ms);
    println!("  Re-subscribe every:   {}ms", config.resubscribe_interval_ms);
    println!("  HTTP timeout:         {}ms", config.http_timeout_ms);
    println!("  Seed buffer limit:    {}", config.seed_buffer_limit);

    Ok(())
}

/// Fetch every seed endpoint once and print a summary.
async fn cmd_seed(config: &Config, interval: &str) -> anyhow::Result<()> {
    config.validate()?;
    let client = SeedClient::from_config(config)?;

    let depth = client.depth().await?;
    println!(
        "Depth: {} bids, {} asks, best bid {:?}, best ask {:?}",
        depth.bids.len(),
        depth.asks.len(),
        depth.best_bid(),
        depth.best_ask()
    );

    let price = client.latest_price().await?;
    println!("Latest price: {} ({})", price.price, price.time.unwrap_or_default());

    let trades = client.trades().await?;
    println!("Trades: {}", trades.len());
    for trade in trades.iter().take(5) {
        println!(
            "  {} x {}",
            trade.price,
            trade.quantity.map(|q| q.to_string()).unwrap_or_default()
        );
    }

    let klines = client.klines(interval).await?;
    println!("Klines ({interval}): {}", klines.len());
    if let Some(last) = klines.last() {
        println!("  last close {}", last.close);
    }

    Ok(())
}

/// Mirror the configured market until Ctrl-C.
async fn cmd_watch(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let manager = Arc::new(ConnectionManager::with_config(ConnectionConfig::from_config(
        &config,
    )));
    let seed = SeedClient::from_config(&config)?;

    let mirror = MarketMirror::open(&manager, &config.mirror_market, config.seed_buffer_limit);
    manager.start(WsConnector::new(config.mirror_ws_url.clone()));

    if let Err(e) = mirror.reseed(&seed).await {
        warn!(error = %e, "Initial seed failed, will retry");
    }

    let mut updates = mirror.watch();
    let mut seed_retry = tokio::time::interval(Duration::from_secs(5));
    let mut seen_connections = manager.connection_count();

    info!(market = %config.mirror_market, "Mirroring, press Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                info!(
                    best_bid = ?snapshot.best_bid(),
                    best_ask = ?snapshot.best_ask(),
                    last_price = ?snapshot.last_price,
                    bids = snapshot.bids.len(),
                    asks = snapshot.asks.len(),
                    "Book updated"
                );
            }
            _ = seed_retry.tick() => {
                // A reconnect may have skipped diffs; take a fresh snapshot.
                let connections = manager.connection_count();
                if !mirror.is_seeded() || connections != seen_connections {
                    seen_connections = connections;
                    if let Err(e) = mirror.reseed(&seed).await {
                        warn!(error = %e, "Seed retry failed");
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown signal received");
                break;
            }
        }
    }

    mirror.close();
    manager.shutdown().await;
    Ok(())
}
