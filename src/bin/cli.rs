//! shiptrack CLI
//!
//! Local entry point over the JSON storage directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shiptrack::{
    Engine,
    config,
    error::{AppError, Result},
    models::{GeoPoint, ShipmentStatus},
    pipeline::{self, AbortHandle},
    services::{ManualUpdate, UpdateContext},
    utils,
};
use tokio::io::AsyncReadExt;

/// shiptrack - Shipment status reconciliation
#[derive(Parser, Debug)]
#[command(
    name = "shiptrack",
    version,
    about = "Courier shipment status reconciliation and bulk update engine"
)]
struct Cli {
    /// Path to storage directory containing config and tables
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign a pasted list of AWBs to a courier
    Bulk {
        /// Courier taking the parcels
        #[arg(short, long)]
        courier: String,

        /// File with AWBs separated by newlines, commas or spaces
        #[arg(short, long, conflicts_with = "awbs")]
        file: Option<PathBuf>,

        /// AWBs inline; reads stdin when neither this nor --file is given
        #[arg(short, long)]
        awbs: Option<String>,

        /// Status to apply (default from config)
        #[arg(long)]
        status: Option<ShipmentStatus>,

        /// Location recorded in history (default from config)
        #[arg(long)]
        location: Option<String>,
    },

    /// Continuous scan: one AWB per stdin line
    Scan {
        #[arg(short, long)]
        courier: String,

        #[arg(long)]
        status: Option<ShipmentStatus>,

        #[arg(long)]
        location: Option<String>,
    },

    /// Manual single update with optional evidence
    Update {
        awb: String,
        status: ShipmentStatus,

        #[arg(short, long)]
        courier: Option<String>,

        #[arg(long, default_value = "")]
        location: String,

        #[arg(long, default_value = "")]
        notes: String,

        #[arg(long, requires = "lng")]
        lat: Option<f64>,

        #[arg(long, requires = "lat")]
        lng: Option<f64>,

        /// Reference to an uploaded proof-of-delivery photo
        #[arg(long)]
        photo: Option<String>,

        /// Operator making the update
        #[arg(long = "by")]
        updated_by: Option<String>,
    },

    /// Show a shipment with its history
    Show { awb: String },

    /// Delete a shipment and its history
    Delete { awb: String },

    /// Validate configuration files
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    utils::console::init(level);
}

async fn read_awb_text(file: Option<PathBuf>, awbs: Option<String>) -> Result<String> {
    if let Some(text) = awbs {
        return Ok(text);
    }
    if let Some(path) = file {
        return Ok(tokio::fs::read_to_string(&path).await?);
    }
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    Ok(text)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_all(&cli.storage_dir);
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        let config = config.inspect_err(|e| log::error!("Config validation failed: {}", e))?;
        log::info!(
            "✓ Config OK (prefixes {:?}, partner prefixes {:?})",
            config.carrier.prefixes,
            config.carrier.partner_prefixes
        );
        return Ok(());
    }

    let config = config?;
    log::info!("Using storage directory {}", cli.storage_dir.display());
    let engine = Engine::open_local(config, &cli.storage_dir).await?;

    match cli.command {
        Command::Bulk {
            courier,
            file,
            awbs,
            status,
            location,
        } => {
            let text = read_awb_text(file, awbs).await?;
            let mut ctx = engine.batch().default_context(&courier);
            if let Some(status) = status {
                ctx.status = status;
            }
            if let Some(location) = location {
                ctx.location = location;
            }

            let abort = AbortHandle::new();
            let on_signal = abort.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received; finishing the current group");
                    on_signal.abort();
                }
            });

            let report = pipeline::run_bulk(engine.batch(), &text, &ctx, &abort).await;
            if report.recap.aborted {
                return Err(AppError::validation("bulk update aborted"));
            }
        }

        Command::Scan {
            courier,
            status,
            location,
        } => {
            let scan = &engine.config().scan;
            let ctx = UpdateContext::new(
                status.unwrap_or(scan.status),
                Some(courier),
                location.unwrap_or_else(|| scan.location.clone()),
            );
            pipeline::run_scan(engine.start_scan_with(ctx)).await?;
        }

        Command::Update {
            awb,
            status,
            courier,
            location,
            notes,
            lat,
            lng,
            photo,
            updated_by,
        } => {
            let update = ManualUpdate {
                context: UpdateContext {
                    notes,
                    ..UpdateContext::new(status, courier, location)
                },
                gps: lat.zip(lng).map(|(lat, lng)| GeoPoint { lat, lng }),
                photo_ref: photo,
                updated_by,
            };
            let result = engine.update(&awb, &update).await?;
            if result.success {
                log::info!("{}", result.message);
            } else {
                log::error!("{}", result.message);
            }
        }

        Command::Show { awb } => match engine.track(&awb).await? {
            Some(view) => {
                let s = &view.shipment;
                log::info!("AWB: {}", s.awb);
                log::info!("Status: {}", s.current_status);
                log::info!(
                    "Courier: {}",
                    view.courier_name
                        .as_deref()
                        .or(s.courier_id.as_deref())
                        .unwrap_or("-")
                );
                log::info!("Sender: {} ({})", s.sender.name, s.sender.address);
                log::info!("Receiver: {} ({})", s.receiver.name, s.receiver.address);
                if let Some(source) = s.manifest_source {
                    log::info!("Manifest source: {}", source);
                }
                for entry in &view.history {
                    log::info!(
                        "  {} {} @ {} {}",
                        entry.created_at.format("%Y-%m-%d %H:%M:%S%.3f"),
                        entry.status,
                        entry.location,
                        entry.notes
                    );
                }
            }
            None => log::warn!("No shipment found for {}", awb),
        },

        Command::Delete { awb } => {
            if engine.delete(&awb).await? {
                log::info!("Deleted {}", awb);
            } else {
                log::warn!("No shipment found for {}", awb);
            }
        }

        Command::Validate => {}
    }

    log::info!("Done!");

    Ok(())
}
