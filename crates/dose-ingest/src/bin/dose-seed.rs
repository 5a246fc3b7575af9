//! Seed a local dashboard database with a synthetic cohort.
//!
//! ```text
//! dose-seed --db dose.db --subjects 20 --days 30
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dose_core::db::Database;
use dose_ingest::CohortGenerator;

#[derive(Parser, Debug)]
#[command(name = "dose-seed")]
#[command(about = "Write synthetic subjects and bottle events into a SQLite database")]
struct Args {
    /// Database file, created when missing
    #[arg(long)]
    db: PathBuf,

    /// Number of subjects to generate
    #[arg(long, default_value_t = 20)]
    subjects: usize,

    /// Days of events per subject
    #[arg(long, default_value_t = 30)]
    days: u32,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// First day of events (YYYY-MM-DD); defaults to `days` before today
    #[arg(long)]
    start: Option<NaiveDate>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let start = match args.start {
        Some(start) => start,
        None => Local::now()
            .date_naive()
            .checked_sub_days(Days::new(u64::from(args.days)))
            .context("start date out of range")?,
    };

    let db = Database::open(&args.db)
        .with_context(|| format!("opening {}", args.db.display()))?;

    info!(db = %args.db.display(), seed = args.seed, %start, "seeding cohort");
    let summary = CohortGenerator::seeded(args.seed)
        .populate(&db, args.subjects, start, args.days)
        .context("writing cohort")?;

    println!(
        "Wrote {} subjects and {} events to {}",
        summary.subjects,
        summary.events,
        args.db.display()
    );
    Ok(())
}
