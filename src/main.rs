use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use serde_json::json;
use slotpay::application::Engine;
use slotpay::config::Config;
use slotpay::domain::clock::SystemClock;
use slotpay::domain::ports::Backend;
use slotpay::infrastructure::gateway::LocalGateway;
use slotpay::infrastructure::in_memory::InMemoryStore;
use slotpay::interfaces::csv::rule_reader::RuleReader;
use slotpay::interfaces::csv::slot_writer::SlotWriter;
use slotpay::interfaces::seed::Seed;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Mentor booking and payment engine.
///
/// Secrets come from SLOTPAY_JWT_SECRET and SLOTPAY_GATEWAY_SECRET. Results
/// are printed to stdout as JSON; logs go to stderr.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "SLOTPAY_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// JSON seed file loaded before the command runs.
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Free slots of an offering on a date.
    Slots {
        #[arg(long)]
        mentor: String,
        #[arg(long)]
        service: Uuid,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Print `start,end` CSV instead of JSON.
        #[arg(long)]
        csv: bool,
    },
    /// Book a slot for a mentee.
    Book {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        service: Uuid,
        #[arg(long)]
        date: String,
        /// HH:MM
        #[arg(long)]
        start: String,
    },
    /// List a mentee's bookings, or a mentor's confirmed sessions.
    Bookings(BookingsArgs),
    #[command(subcommand)]
    Rules(RulesCommand),
    #[command(subcommand)]
    Payment(PaymentCommand),
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct BookingsArgs {
    #[arg(long)]
    user: Option<Uuid>,
    #[arg(long)]
    mentor: Option<String>,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Import weekly rules from a `mentor,day_of_week,start,end` CSV.
    Import { input: PathBuf },
    /// List a mentor's weekly rules.
    List {
        #[arg(long)]
        mentor: String,
    },
}

#[derive(Subcommand)]
enum PaymentCommand {
    /// Open a gateway order for a pending booking.
    Create {
        #[arg(long)]
        booking: Uuid,
        #[arg(long)]
        user: Uuid,
    },
    /// Apply a client-side checkout confirmation.
    Verify {
        #[arg(long)]
        payment: Uuid,
        #[arg(long)]
        gateway_payment_id: String,
        #[arg(long)]
        signature: String,
    },
    /// Deliver a raw gateway webhook body.
    Webhook {
        /// File holding the exact request body.
        #[arg(long)]
        body: PathBuf,
        /// Value of the X-Razorpay-Signature header.
        #[arg(long)]
        signature: String,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    Issue {
        #[arg(long)]
        user: Uuid,
    },
    Rotate {
        #[arg(long)]
        token: String,
    },
    RevokeAll {
        #[arg(long)]
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slotpay=info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().into_diagnostic()?;

    match cli.db_path.clone() {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = slotpay::infrastructure::rocksdb::RocksDBStore::open(db_path)
                .into_diagnostic()?;
            run(Arc::new(store), &config, cli).await
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            run(Arc::new(InMemoryStore::new()), &config, cli).await
        }
        None => run(Arc::new(InMemoryStore::new()), &config, cli).await,
    }
}

async fn run<B: Backend + 'static>(store: Arc<B>, config: &Config, cli: Cli) -> Result<()> {
    if let Some(path) = &cli.seed {
        let file = File::open(path).into_diagnostic()?;
        Seed::from_reader(file)
            .into_diagnostic()?
            .apply(store.as_ref())
            .await
            .into_diagnostic()?;
    }

    let engine = Engine::new(
        store,
        Arc::new(LocalGateway::new()),
        config,
        Arc::new(SystemClock),
    )
    .into_diagnostic()?;

    match cli.command {
        Command::Slots {
            mentor,
            service,
            date,
            csv,
        } => {
            let schedule = engine
                .slots
                .compute_slots(&mentor, service, &date)
                .await
                .into_diagnostic()?;
            if csv {
                let stdout = io::stdout();
                SlotWriter::new(stdout.lock())
                    .write_slots(&schedule.slots)
                    .into_diagnostic()?;
            } else {
                print_json(&schedule)?;
            }
        }
        Command::Book {
            user,
            service,
            date,
            start,
        } => {
            let receipt = engine
                .bookings
                .create_booking(user, service, &date, &start)
                .await
                .into_diagnostic()?;
            print_json(&receipt)?;
        }
        Command::Bookings(BookingsArgs { user, mentor }) => {
            if let Some(user) = user {
                print_json(&engine.bookings.bookings_for_user(user).await.into_diagnostic()?)?;
            } else if let Some(mentor) = mentor {
                let sessions = engine
                    .bookings
                    .confirmed_sessions_for_mentor(&mentor)
                    .await
                    .into_diagnostic()?;
                print_json(&sessions)?;
            }
        }
        Command::Rules(RulesCommand::Import { input }) => {
            let file = File::open(input).into_diagnostic()?;
            let (mut added, mut rejected) = (0usize, 0usize);
            for row in RuleReader::new(file).rules() {
                let outcome = match row {
                    Ok(row) => engine
                        .slots
                        .add_rule(&row.mentor, row.day_of_week, &row.start, &row.end)
                        .await
                        .map(|_| ()),
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(()) => added += 1,
                    Err(e) => {
                        warn!(error = %e, "rule rejected");
                        rejected += 1;
                    }
                }
            }
            print_json(&json!({ "added": added, "rejected": rejected }))?;
        }
        Command::Rules(RulesCommand::List { mentor }) => {
            print_json(&engine.slots.rules_for(&mentor).await.into_diagnostic()?)?;
        }
        Command::Payment(PaymentCommand::Create { booking, user }) => {
            let intent = engine
                .payments
                .create_payment(booking, user)
                .await
                .into_diagnostic()?;
            print_json(&intent)?;
        }
        Command::Payment(PaymentCommand::Verify {
            payment,
            gateway_payment_id,
            signature,
        }) => {
            let settlement = engine
                .payments
                .verify_payment(payment, &gateway_payment_id, &signature)
                .await
                .into_diagnostic()?;
            print_json(&json!({ "settlement": settlement }))?;
        }
        Command::Payment(PaymentCommand::Webhook { body, signature }) => {
            let raw = std::fs::read(body).into_diagnostic()?;
            let outcome = engine
                .payments
                .handle_webhook(&raw, &signature)
                .await
                .into_diagnostic()?;
            print_json(&outcome)?;
        }
        Command::Session(SessionCommand::Issue { user }) => {
            print_json(&engine.sessions.issue_session(user).await.into_diagnostic()?)?;
        }
        Command::Session(SessionCommand::Rotate { token }) => {
            print_json(&engine.sessions.rotate(&token).await.into_diagnostic()?)?;
        }
        Command::Session(SessionCommand::RevokeAll { user }) => {
            let revoked = engine.sessions.revoke_all(user).await.into_diagnostic()?;
            print_json(&json!({ "revoked": revoked }))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{rendered}");
    Ok(())
}
