use anyhow::Context;
use clap::Parser;

use metareserve::{ReservationInterface, load_simulated_setup, logger};

/// Reserve nodes from a simulated backend described by a JSON config.
#[derive(Debug, Parser)]
#[command(name = "metareserve", version, about)]
struct Args {
    /// Path to the reservation config (backend, request, wait settings).
    #[arg(short, long)]
    config: String,

    /// Print the reservation as JSON instead of node lines.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init();

    log::info!("Logger initialized. Loading config from '{}'.", args.config);
    let (backend, request, wait_settings) = load_simulated_setup(&args.config).with_context(|| format!("loading config '{}'", args.config))?;

    let wait = backend.reserve(request).context("submitting reservation request")?;
    let outcome = wait.get_with_settings(&wait_settings);
    wait.shutdown();

    let Some(reservation) = outcome.context("waiting for reservation")? else {
        log::error!("No reservation within {} s.", wait_settings.timeout_seconds);
        anyhow::bail!("reservation timed out after {} s", wait_settings.timeout_seconds);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(reservation.as_ref())?);
    } else {
        println!("{}", reservation);
    }

    backend.stop_reservation(&reservation).context("stopping reservation")?;

    Ok(())
}
