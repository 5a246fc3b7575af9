//! Accept scale link connections and record their readings.
//!
//! ```text
//! dose-listen --db dose.db --subject 1001
//! ```

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dose_core::db::Database;
use dose_ingest::{
    drain_connection, ReadingRecorder, DEFAULT_LINK_ADDR, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_TARE_GRAMS,
};

#[derive(Parser, Debug)]
#[command(name = "dose-listen")]
#[command(about = "Record pill bottle scale readings sent over TCP")]
struct Args {
    /// Database file, created when missing
    #[arg(long)]
    db: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = DEFAULT_LINK_ADDR)]
    bind: String,

    /// Subject the connected bottle belongs to
    #[arg(long)]
    subject: String,

    /// Close a connection after this many idle seconds
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Empty bottle weight in grams
    #[arg(long, default_value_t = DEFAULT_TARE_GRAMS)]
    tare: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let db = Database::open(&args.db)
        .with_context(|| format!("opening {}", args.db.display()))?;
    let listener =
        TcpListener::bind(&args.bind).with_context(|| format!("binding {}", args.bind))?;
    let timeout = Duration::from_secs(args.timeout_secs.max(1));

    info!(bind = %args.bind, subject_id = %args.subject, "waiting for scale link");
    let mut recorder = ReadingRecorder::new(&db);

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        if let Err(e) = stream.set_read_timeout(Some(timeout)) {
            warn!(%peer, error = %e, "failed to set read timeout");
            continue;
        }
        info!(%peer, "scale link connected");

        match drain_connection(
            &mut stream,
            &mut recorder,
            &args.subject,
            args.tare,
            || Local::now().naive_local(),
        ) {
            Ok(summary) => info!(
                %peer,
                recorded = summary.recorded,
                rejected = summary.rejected,
                "scale link finished"
            ),
            Err(e) => warn!(%peer, error = %e, "scale link dropped"),
        }
    }

    Ok(())
}
