//! laserdaq — console recorder for laser-profiling sensors.
//!
//! Authenticates to the sensor, applies the configured trigger strategy
//! and filters, then streams range profiles to a CSV file until the
//! operator presses Enter.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use laserdaq::acquisition::{Recorder, RecordingOptions};
use laserdaq::config::Settings;
use laserdaq::driver::mock::MockSensor;
use laserdaq::driver::UserRole;
use laserdaq::session::Session;

#[derive(Parser)]
#[command(name = "laserdaq", version, about = "Laser profiler recorder: streams X,Y,Z range profiles to CSV")]
struct Cli {
    /// Output file for profile data
    #[arg(short, long, default_value = "profile.csv")]
    output: PathBuf,

    /// Configuration file
    #[arg(short, long, default_value = "laserdaq.cfg")]
    config: PathBuf,

    /// Display additional messages
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    println!("laserdaq profile recorder");

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading configuration from '{}'", cli.config.display()))?;
    let encoder = settings.encoder()?;
    let trigger = settings.trigger();
    let filter = settings.filter();
    let network = settings.network()?;

    // TODO: swap in the vendor SDK backend once the -sys bindings crate
    // lands; until then runs are simulated.
    let sensor = MockSensor::synthetic(settings.device_id(), network.address.clone(), 50, 128, 40);
    let mut session = Session::initialize_at_address(
        Box::new(sensor),
        settings.device_id(),
        &network,
        settings.credential(),
        UserRole::Admin,
    )?;

    trigger.activate(&mut session, &encoder)?;
    filter.apply(&mut session)?;
    info!("Using {}", encoder.describe());
    info!("Trigger: {}", trigger.describe());

    let mut options = RecordingOptions::new(&cli.output);
    if let Some(comment) = &settings.output.comment {
        options = options.with_comment(comment.clone());
    }

    println!("Connected to sensor, monitoring encoder...");
    let handle = Recorder::new(session, encoder, options).spawn()?;

    println!("Press Enter to stop recording.");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);

    handle.cancel();
    match handle.join() {
        Ok((mut session, outcome)) => {
            let stats = outcome?;
            info!(
                "Recorded {} records: {} samples written, {} invalid samples skipped",
                stats.records, stats.samples_written, stats.samples_skipped
            );
            session.teardown();
        }
        Err(_) => bail!("acquisition worker panicked"),
    }
    Ok(())
}
