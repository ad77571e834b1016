mod report;
mod store;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::rc::Rc;

use report::{
    KeyUsage, MigrationSummary, Report, ReportFormat, StatsReport, TransferSummary, UsageReport,
    city_lines, write_report,
};
use store::FileStore;
use travelog_core::export::{export_file_name, parse_snapshot};
use travelog_core::{
    Clock, ErrorHandler, Identity, KeyValueStore, Persistence, Platform, Snapshot, StorageKeys,
    TravelLogConfig, migrate_entries, stats,
};

#[derive(Debug, Parser)]
#[command(name = "travelog", version)]
#[command(about = "Inspect, migrate and back up Travelog storage dumps")]
struct Args {
    /// Storage dump: a JSON object of localStorage keys to string values
    #[arg(long, global = true, default_value = "travelog-storage.json")]
    store: PathBuf,

    /// Operate on this user's namespace (default: the saved current user,
    /// else the anonymous namespace)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Optional JSON file with configuration overrides
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Print the error log after the command
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Overview, per-country and per-city statistics
    Stats,
    /// Run the migration pass and write the normalized list back
    Migrate {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a snapshot backup (travel_data_<date>.json) into a directory
    Export {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Replace the namespace's entries and residence with a snapshot's
    Import { file: PathBuf },
    /// Per-key storage usage and availability
    Usage,
}

/// One namespace of one storage dump.
struct Session {
    store: Rc<FileStore>,
    persistence: Persistence<Rc<FileStore>>,
    errors: ErrorHandler,
    clock: Rc<dyn Clock>,
    identity: Identity,
    keys: StorageKeys,
}

impl Session {
    fn open(args: &Args) -> Result<Self> {
        let config = match &args.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                TravelLogConfig::from_json(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => TravelLogConfig::default(),
        };
        let platform = Platform::headless();
        let clock = Rc::clone(&platform.clock);
        let errors = ErrorHandler::new(platform, &config);
        let store = Rc::new(FileStore::open(&args.store)?);
        let persistence = Persistence::new(
            Rc::clone(&store),
            errors.clone(),
            Rc::clone(&clock),
            &config,
        );
        let identity = match &args.user {
            Some(id) if id.trim().is_empty() => bail!("--user needs a non-blank id"),
            Some(id) => Identity::logged_in(id.clone(), id.clone()),
            None => persistence.load_identity(),
        };
        let keys = StorageKeys::for_identity(&identity);
        log::debug!("using namespace {}", keys.entries);
        Ok(Self {
            store,
            persistence,
            errors,
            clock,
            identity,
            keys,
        })
    }

    fn namespace(&self) -> String {
        if self.identity.is_logged_in {
            format!("user {}", self.identity.id)
        } else {
            "anonymous".to_string()
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.report == ReportFormat::Console && args.output.is_none() {
        announce_banner();
    }

    let session = Session::open(&args)?;
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match &args.command {
        Command::Stats => emit(&args, &mut output_target, &run_stats(&session))?,
        Command::Migrate { dry_run } => {
            emit(&args, &mut output_target, &run_migrate(&session, *dry_run)?)?;
        }
        Command::Export { dir } => emit(&args, &mut output_target, &run_export(&session, dir)?)?,
        Command::Import { file } => {
            emit(&args, &mut output_target, &run_import(&session, file)?)?;
        }
        Command::Usage => emit(&args, &mut output_target, &run_usage(&session)?)?,
    }
    output_target.flush_inner()?;

    if args.verbose {
        for record in session.errors.get_error_log() {
            eprintln!(
                "{} [{}] {}: {}",
                "error-log".yellow(),
                record.severity,
                record.kind,
                record.message
            );
        }
    }
    Ok(())
}

fn announce_banner() {
    println!("{}", "🧳 Travelog Storage Tool".bright_cyan().bold());
    println!("{}", "========================".cyan());
}

fn emit<R: Report>(args: &Args, out: &mut OutputTarget, report: &R) -> Result<()> {
    write_report(args.report, report, out.writer()).context("failed to write report")
}

fn run_stats(session: &Session) -> StatsReport {
    let entries = session.persistence.load_entries(&session.keys);
    let residence = session.persistence.load_residence(&session.keys);
    StatsReport {
        namespace: session.namespace(),
        residence: residence.home_country_code().map(str::to_string),
        overview: stats::overview(&entries, Some(&residence)),
        countries: stats::country_summaries(&entries),
        cities: city_lines(&entries),
    }
}

fn run_migrate(session: &Session, dry_run: bool) -> Result<MigrationSummary> {
    let key = &session.keys.entries;
    let Some(text) = session.persistence.storage().try_get_item(key)? else {
        return Ok(MigrationSummary::new(key, &Default::default(), false));
    };
    let document: Value = session
        .persistence
        .json()
        .try_parse(&text)
        .with_context(|| format!("{key} is not valid JSON"))?;
    let Value::Array(items) = document else {
        bail!("{key} does not hold a list of entries");
    };

    let migration = migrate_entries(items, session.clock.now_millis());
    let write = migration.needs_save() && !dry_run;
    if write {
        session
            .persistence
            .save_entries(&session.keys, &migration.entries)?;
        session.store.persist()?;
        log::info!("rewrote {} in {}", key, session.store.path().display());
    }
    Ok(MigrationSummary::new(key, &migration, write))
}

fn run_export(session: &Session, dir: &std::path::Path) -> Result<TransferSummary> {
    let entries = session.persistence.load_entries(&session.keys);
    let residence = session.persistence.load_residence(&session.keys);
    let now = session.clock.now();
    let snapshot = Snapshot {
        user: session.identity.clone(),
        entries,
        residence,
        export_date: now.to_rfc3339(),
    };
    let path = dir.join(export_file_name(now.date_naive()));
    let text = serde_json::to_string_pretty(&snapshot)?;
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(TransferSummary {
        namespace: session.namespace(),
        path: path.display().to_string(),
        entries: snapshot.entries.len(),
    })
}

fn run_import(session: &Session, file: &std::path::Path) -> Result<TransferSummary> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    let imported = parse_snapshot(document, session.clock.now_millis())
        .with_context(|| format!("{} is not a snapshot", file.display()))?;

    session
        .persistence
        .save_entries(&session.keys, &imported.migration.entries)?;
    session
        .persistence
        .save_residence(&session.keys, &imported.residence)?;
    session.store.persist()?;
    Ok(TransferSummary {
        namespace: session.namespace(),
        path: file.display().to_string(),
        entries: imported.migration.entries.len(),
    })
}

fn run_usage(session: &Session) -> Result<UsageReport> {
    let storage = session.persistence.storage();
    let available = storage.is_storage_available();
    let mut keys = Vec::new();
    for key in session.store.keys()? {
        let value = session.store.get(&key)?.unwrap_or_default();
        keys.push(KeyUsage {
            bytes: key.encode_utf16().count() + value.encode_utf16().count(),
            key,
        });
    }
    keys.sort_by(|a, b| b.bytes.cmp(&a.bytes));
    Ok(UsageReport {
        available,
        total_bytes: storage.get_storage_usage(),
        keys,
        errors: session.errors.error_counts(),
    })
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "travelog", "migrate", "--dry-run", "--store", "dump.json", "--user", "42",
            "--report", "json",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Migrate { dry_run: true }));
        assert_eq!(args.store, PathBuf::from("dump.json"));
        assert_eq!(args.user.as_deref(), Some("42"));
        assert_eq!(args.report, ReportFormat::Json);
    }

    #[test]
    fn import_requires_a_file() {
        assert!(Args::try_parse_from(["travelog", "import"]).is_err());
    }
}
