//! Command-line front end for the shared reservation document.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reservations_client::{ClientConfig, HttpReservationsApi, LoadOutcome, ReservationSync};
use reservations_core::{Reservation, MAX_SEATS};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reservations-cli")]
#[command(about = "List and edit table reservations")]
struct Cli {
    /// Reservations server base URL
    #[arg(long, default_value = "http://localhost:8080", env = "RESERVATIONS_URL")]
    url: String,

    /// Request timeout in seconds (none by default)
    #[arg(long, env = "RESERVATIONS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show reservations
    List {
        /// Only reservations scheduled in the future
        #[arg(long)]
        upcoming: bool,
    },
    /// Book a table
    Reserve {
        #[arg(long)]
        table: u32,
        #[arg(long)]
        by: String,
        /// ISO-8601 date and time, e.g. 2025-01-01T20:00:00Z
        #[arg(long)]
        date: String,
    },
    /// Seat a guest on a reservation
    Seat { id: String, guest: String },
    /// Cancel a reservation
    Cancel { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::new(cli.url);
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    let api = Arc::new(HttpReservationsApi::new(&config)?);
    let sync = ReservationSync::new(api);

    let outcome = sync.load().await;
    let mutating = !matches!(cli.command, Command::List { .. });
    if mutating && outcome == LoadOutcome::Failed {
        anyhow::bail!("Could not load reservations from {}, not overwriting them", config.base_url);
    }

    match cli.command {
        Command::List { upcoming } => {
            let reservations = if upcoming {
                sync.upcoming(chrono::Utc::now())
            } else {
                sync.reservations()
            };
            if reservations.is_empty() {
                println!("No reservations");
            }
            for reservation in &reservations {
                print_reservation(reservation);
            }
        }
        Command::Reserve { table, by, date } => {
            let (reservation, _) = sync.reserve(table, &by, &date)?;
            println!("Table {} reserved", reservation.table_number);
            print_reservation(&reservation);
        }
        Command::Seat { id, guest } => {
            sync.add_seat(&id, &guest)?;
            println!("{} seated on {}", guest.trim(), id);
        }
        Command::Cancel { id } => {
            let (reservation, _) = sync.cancel(&id)?;
            println!("Cancelled reservation for table {}", reservation.table_number);
        }
    }

    sync.flush().await;
    Ok(())
}

fn print_reservation(reservation: &Reservation) {
    println!(
        "{}  table {:>3}  {}  by {}  [{}/{}] {}",
        reservation.id,
        reservation.table_number,
        reservation.date,
        reservation.reserved_by,
        reservation.seats.len(),
        MAX_SEATS,
        reservation.seats.join(", ")
    );
}
