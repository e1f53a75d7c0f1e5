/*!
 * Custodia CLI - Command Line Interface
 *
 * Inspection and compliance tooling over the traceability ledgers:
 * recording mutations, browsing events, reconstructing timelines, and
 * running integrity verifications.
 */

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use custodia::{
    commands, logging, Action, Auditor, CancelToken, CoreConfig, CountByKey, CustodiaError,
    EventLedger, HashIndex, LogLevel, Mutation, MutationRecorder, Result, Statistics, Store,
    Timeline, Verdict, Verifier, EXIT_FATAL, EXIT_INTEGRITY, EXIT_SUCCESS,
};
use custodia_core_canonical::Payload;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "custodia")]
#[command(version, about = "Tamper-evident traceability ledger with dual-witness integrity verification", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Path to the ledger database (overrides config)
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write logs to a file (JSON lines) instead of stdout
    #[arg(long, value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug-level logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the ledger database (and optionally a config file)
    Init {
        /// Also write a configuration template to this path
        #[arg(long, value_name = "FILE")]
        write_config: Option<PathBuf>,
    },

    /// Record a mutation in both ledgers atomically
    Record {
        /// Entity type / origin table (e.g. invoices)
        #[arg(long = "type", value_name = "NAME")]
        entity_type: String,

        /// Entity id within its table
        #[arg(long)]
        id: i64,

        /// Action label (create, update, delete, or a custom label)
        #[arg(long, default_value = "update")]
        action: String,

        /// New values as a JSON object
        #[arg(long, value_name = "JSON")]
        values: String,

        /// Previous values as a JSON object
        #[arg(long, value_name = "JSON")]
        previous: Option<String>,

        /// Acting user (overrides config)
        #[arg(long)]
        actor: Option<String>,
    },

    /// List recent events, newest first
    Events {
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,

        /// Only events for this entity type
        #[arg(long = "type", value_name = "NAME")]
        entity_type: Option<String>,
    },

    /// Search events by entity type, actor or action
    Search {
        /// Substring to look for (case-insensitive)
        text: String,

        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show full detail for one event
    Show {
        /// Event id
        event_id: i64,
    },

    /// Reconstruct the timeline of one entity
    Timeline {
        /// Entity type / origin table
        #[arg(long = "type", value_name = "NAME")]
        entity_type: String,

        /// Entity id
        #[arg(long)]
        id: i64,
    },

    /// List recent hash-index versions, newest first
    Hashes {
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,

        /// Only versions from this origin table
        #[arg(long = "table", value_name = "NAME")]
        origin_table: Option<String>,
    },

    /// Cross-verify the two ledgers for one record
    Verify {
        /// Origin table
        #[arg(long = "table", value_name = "NAME")]
        origin_table: String,

        /// Record id
        #[arg(long)]
        id: i64,

        /// Ground-truth values as a JSON object; switches to strong
        /// re-verification against the stored digest
        #[arg(long, value_name = "JSON")]
        values: Option<String>,

        /// Action label for strong re-verification
        #[arg(long)]
        action: Option<String>,

        /// Actor for strong re-verification
        #[arg(long)]
        actor: Option<String>,

        /// Timestamp for strong re-verification; when omitted, action,
        /// actor and timestamp are taken from the latest recorded event
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Cross-verify every record the hash index knows about
    Audit,

    /// Show ledger statistics
    Stats,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => CoreConfig::from_file(path)?,
        None => CoreConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    config.log_file = cli.log;
    config.verbose = cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    if let Commands::Init { write_config } = &cli.command {
        commands::init::run_init(&config, write_config.as_deref())?;
        return Ok(EXIT_SUCCESS);
    }

    let store = Arc::new(Store::open(&config.db_path, config.busy_timeout_ms)?);
    let list_limit = config.list_limit;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Record {
            entity_type,
            id,
            action,
            values,
            previous,
            actor,
        } => {
            let mut mutation = Mutation::new(
                entity_type,
                id,
                parse_action(&action),
                parse_payload_arg(&values)?,
            )
            .actor(actor.unwrap_or(config.actor));
            if let Some(previous) = previous {
                mutation = mutation.previous_value(parse_payload_arg(&previous)?);
            }

            let recorded = MutationRecorder::new(store).record(&mutation)?;
            println!(
                "Recorded event {} (hash version {})",
                recorded.event_id, recorded.hash_record_id
            );
            println!("Digest: {}", recorded.digest);
            Ok(EXIT_SUCCESS)
        }

        Commands::Events { limit, entity_type } => {
            let events = EventLedger::new(store)
                .list_recent(limit.unwrap_or(list_limit), entity_type.as_deref())?;
            if events.is_empty() {
                println!("No events recorded.");
            }
            for e in events {
                println!(
                    "{:>6}  {}  {:<10} {:<12} #{:<8} {:<12} {}",
                    e.id, e.timestamp, e.action, e.entity_type, e.entity_id, e.actor,
                    e.short_digest
                );
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Search { text, limit } => {
            let events = EventLedger::new(store).search(&text, limit.unwrap_or(list_limit))?;
            if events.is_empty() {
                println!("No events match {:?}.", text);
            }
            for e in events {
                println!(
                    "{:>6}  {}  {:<10} {:<12} #{:<8} {:<12} {}",
                    e.id, e.timestamp, e.action, e.entity_type, e.entity_id, e.actor,
                    e.short_digest
                );
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Show { event_id } => {
            let detail = Timeline::new(store).detail(event_id)?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
            Ok(EXIT_SUCCESS)
        }

        Commands::Timeline { entity_type, id } => {
            let entries = Timeline::new(store).timeline(&entity_type, id)?;
            if entries.is_empty() {
                println!("No history for {} #{}.", entity_type, id);
                return Ok(EXIT_SUCCESS);
            }
            for entry in entries {
                println!(
                    "{:>6}  {}  {:<10} {:<12} {}",
                    entry.event_id,
                    entry.timestamp,
                    entry.action,
                    entry.actor,
                    entry.short_digest
                );
                for (field, change) in &entry.changed {
                    println!("        {}: {} -> {}", field, change.before, change.after);
                }
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Hashes {
            limit,
            origin_table,
        } => {
            let rows = HashIndex::new(store)
                .list_recent(limit.unwrap_or(list_limit), origin_table.as_deref())?;
            if rows.is_empty() {
                println!("No hash versions recorded.");
            }
            for r in rows {
                println!(
                    "{:>6}  {}  {:<12} #{:<8} {}",
                    r.id, r.timestamp, r.origin_table, r.record_id, r.short_digest
                );
            }
            Ok(EXIT_SUCCESS)
        }

        Commands::Verify {
            origin_table,
            id,
            values,
            action,
            actor,
            timestamp,
        } => {
            let verifier = Verifier::new(store);
            let verdict = match values {
                Some(values) => {
                    let values = parse_payload_arg(&values)?;
                    // With a pinned timestamp the caller supplies the full
                    // recording context; otherwise it comes from the
                    // latest event row
                    let check = match timestamp {
                        Some(timestamp) => verifier.verify_record(
                            &origin_table,
                            id,
                            &values,
                            &parse_action(&action.unwrap_or_else(|| "update".to_string())),
                            actor.as_deref().unwrap_or(&config.actor),
                            &timestamp,
                        )?,
                        None => verifier.verify_record_latest(&origin_table, id, &values)?,
                    };
                    println!(
                        "Computed: {}",
                        check.computed_digest.as_deref().unwrap_or("(none)")
                    );
                    println!(
                        "Stored:   {}",
                        check.stored_digest.as_deref().unwrap_or("(none)")
                    );
                    check.verdict
                }
                None => {
                    let check = verifier.verify_cross(&origin_table, id)?;
                    println!(
                        "Event:  {}",
                        check.digest_from_event.as_deref().unwrap_or("(none)")
                    );
                    println!(
                        "Index:  {}",
                        check.digest_from_index.as_deref().unwrap_or("(none)")
                    );
                    check.verdict
                }
            };
            println!("Verdict: {}", verdict.as_str());
            Ok(match verdict {
                Verdict::Ok => EXIT_SUCCESS,
                Verdict::Mismatch => EXIT_INTEGRITY,
                Verdict::NoData => EXIT_FATAL,
            })
        }

        Commands::Audit => {
            let auditor = Auditor::new(store, config.audit_detail_limit);
            let report = auditor.run_full_audit(&CancelToken::new())?;

            println!("Checked:   {}", report.total_checked);
            println!("Ok:        {}", report.ok_count);
            println!("Mismatch:  {}", report.mismatch_count);
            println!("No data:   {}", report.no_data_count);
            if report.cancelled {
                println!("(audit was cancelled before completion)");
            }
            for m in &report.mismatches {
                println!(
                    "  {} #{}: event={} index={}",
                    m.origin_table,
                    m.record_id,
                    m.digest_from_event.as_deref().unwrap_or("(none)"),
                    m.digest_from_index.as_deref().unwrap_or("(none)")
                );
            }
            Ok(if report.mismatch_count > 0 {
                EXIT_INTEGRITY
            } else {
                EXIT_SUCCESS
            })
        }

        Commands::Stats => {
            let stats = Statistics::new(store).stats()?;
            println!("Events:       {}", stats.total_events);
            println!("Hash records: {}", stats.total_hashes);
            print_group("By entity type", &stats.by_entity_type);
            print_group("By action", &stats.by_action);
            print_group("Top actors", &stats.top_actors);
            print_group("By origin table", &stats.by_origin_table);
            Ok(EXIT_SUCCESS)
        }
    }
}

/// Map a CLI action label onto the action enum; unknown labels become
/// custom actions, uppercased by convention.
fn parse_action(label: &str) -> Action {
    match label.to_ascii_uppercase().as_str() {
        "CREATE" => Action::Create,
        "UPDATE" => Action::Update,
        "DELETE" => Action::Delete,
        other => Action::Custom(other.to_string()),
    }
}

/// Render one grouped-count section of the stats output.
fn render_group(title: &str, rows: &[CountByKey]) -> String {
    let mut out = format!("\n{}:\n", title);
    if rows.is_empty() {
        out.push_str("  (none)\n");
    }
    for row in rows {
        out.push_str(&format!("  {:<20} {}\n", row.key, row.count));
    }
    out
}

fn print_group(title: &str, rows: &[CountByKey]) {
    print!("{}", render_group(title, rows));
}

fn parse_payload_arg(text: &str) -> Result<Payload> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CustodiaError::Config(
            "payload must be a JSON object".to_string(),
        )),
        Err(e) => Err(CustodiaError::Config(format!("invalid JSON payload: {}", e))),
    }
}
