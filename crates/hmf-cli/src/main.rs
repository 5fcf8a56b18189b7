//! hmf CLI
//!
//! Command-line interface for:
//! - Checking and completing Galois conjugates of stored Hilbert newforms
//! - Auditing multiplicity one and prime lists
//! - One-off repairs of stored labels and data fields
//! - Importing staged upload files into the store

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use hmf_conjugates::{
    add_numeric_label_suffixes, automorphism_count, check_multiplicity_one, check_primes,
    fix_data_fields, fix_labels, run_fields_parallel, FieldAdapter, FieldStatus,
    MaintenanceReport, RunSummary, StoredFieldAdapter,
};
use hmf_store::{read_upload_file, FormFilter, FormStore, JsonStore, NormRange};
use tracing_subscriber::EnvFilter;

mod config;

use config::HmfConfig;

#[derive(Parser)]
#[command(name = "hmf")]
#[command(
    author,
    version,
    about = "Hilbert modular form data: conjugate completion and maintenance"
)]
struct Cli {
    /// Store directory (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find (and add) missing Galois conjugates.
    Conjugates {
        #[command(subcommand)]
        command: ConjugateCommands,
    },

    /// Read-only consistency checks.
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },

    /// Show per-field data.
    Fields {
        #[command(subcommand)]
        command: FieldsCommands,
    },

    /// One-off repairs of stored forms (dry run unless --apply).
    Fix {
        #[command(subcommand)]
        command: FixCommands,
    },

    /// Store import.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Args, Clone, Copy)]
struct NormArgs {
    /// Smallest level norm to examine
    #[arg(long)]
    min_norm: Option<u64>,
    /// Largest level norm to examine (inclusive)
    #[arg(long)]
    max_norm: Option<u64>,
}

#[derive(Subcommand)]
enum ConjugateCommands {
    /// Count missing conjugates.
    Check {
        #[arg(required = true)]
        fields: Vec<String>,
        #[command(flatten)]
        norms: NormArgs,
        /// Worker threads (0: one per core)
        #[arg(long)]
        jobs: Option<usize>,
    },

    /// Build missing conjugates and insert them (or stage them with --stage).
    Add {
        #[arg(required = true)]
        fields: Vec<String>,
        #[command(flatten)]
        norms: NormArgs,
        #[arg(long)]
        jobs: Option<usize>,
        /// Do not synthesize conjugates of base-change forms
        #[arg(long)]
        skip_base_change: bool,
        /// Write conjugates to this upload file instead of the store
        #[arg(long)]
        stage: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Report forms of one level with equal Hecke eigenvalues.
    MultiplicityOne {
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Report primes whose label names a different ideal.
    Primes { field: String },
}

#[derive(Subcommand)]
enum FieldsCommands {
    /// Automorphisms and list sizes of a field.
    Info { field: String },
}

#[derive(Subcommand)]
enum FixCommands {
    /// Set deg/disc from the field label; "yes?" flags become "yes".
    DataFields {
        #[command(flatten)]
        norms: NormArgs,
        #[arg(long)]
        apply: bool,
    },

    /// Shift two-letter label suffixes (aa -> ba, or back with --reverse).
    Labels {
        #[command(flatten)]
        norms: NormArgs,
        #[arg(long)]
        reverse: bool,
        #[arg(long)]
        apply: bool,
    },

    /// Set label_nsuffix from the letter suffix.
    NumericSuffixes {
        #[command(flatten)]
        norms: NormArgs,
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Insert the rows of an upload file; labels already stored are skipped.
    Import { file: PathBuf },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => HmfConfig::load(path)?,
        None => HmfConfig::default(),
    };
    if let Some(dir) = cli.store {
        config.store_dir = dir;
    }

    let store = JsonStore::open(&config.store_dir)
        .with_context(|| format!("opening store {}", config.store_dir.display()))?;
    let result = match cli.command {
        Commands::Conjugates { command } => cmd_conjugates(command, &store, &config),
        Commands::Audit { command } => cmd_audit(command, &store),
        Commands::Fields { command } => cmd_fields(command, &store),
        Commands::Fix { command } => cmd_fix(command, &store, &config),
        Commands::Db { command } => cmd_db(command, &store),
    };
    let closed = store.close().context("flushing store");
    result?;
    closed
}

// ============================================================================
// conjugates
// ============================================================================

fn cmd_conjugates(command: ConjugateCommands, store: &JsonStore, config: &HmfConfig) -> Result<()> {
    let adapter = StoredFieldAdapter::new(store);
    let (fields, options, jobs) = match command {
        ConjugateCommands::Check {
            fields,
            norms,
            jobs,
        } => (
            fields,
            config.completion_options(norms.min_norm, norms.max_norm),
            jobs,
        ),
        ConjugateCommands::Add {
            fields,
            norms,
            jobs,
            skip_base_change,
            stage,
        } => {
            let mut options = config.completion_options(norms.min_norm, norms.max_norm);
            options.build_forms = true;
            options.insert = stage.is_none();
            options.skip_base_change |= skip_base_change;
            options.stage = stage;
            (fields, options, jobs)
        }
    };
    let summary = run_fields_parallel(
        store,
        &adapter,
        &fields,
        &options,
        jobs.unwrap_or(config.jobs),
    )?;
    print_summary(&summary);
    if let Some(path) = &options.stage {
        eprintln!(
            "{} staged {} conjugates → {}",
            "ok".green().bold(),
            summary.staged_rows,
            path.display()
        );
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.fields {
        let status = match &report.status {
            FieldStatus::Completed => "done".green().bold(),
            FieldStatus::Skipped(_) => "skipped".yellow().bold(),
            FieldStatus::Failed(_) => "failed".red().bold(),
        };
        println!(
            "{} {}: examined {}, missing {}, added {}, staged {}, truncated {}, failed {}",
            status,
            report.field_label.bold(),
            report.forms_examined,
            report.missing,
            report.added,
            report.staged,
            report.truncated,
            report.failed
        );
        if let FieldStatus::Skipped(reason) | FieldStatus::Failed(reason) = &report.status {
            println!("  {} {}", "→".yellow(), reason);
        }
    }
    println!(
        "{} {} forms examined, {} conjugates missing (counted once per automorphism), {} added",
        "summary".cyan().bold(),
        summary.forms_examined(),
        summary.missing(),
        summary.added()
    );
    if summary.truncated() > 0 || summary.failed() > 0 {
        println!(
            "  {} {} truncated Hecke sequences, {} conjugates skipped on errors",
            "→".yellow(),
            summary.truncated(),
            summary.failed()
        );
    }
}

// ============================================================================
// audit / fields
// ============================================================================

fn cmd_audit(command: AuditCommands, store: &JsonStore) -> Result<()> {
    match command {
        AuditCommands::MultiplicityOne { fields } => {
            let mut total = 0;
            for field in &fields {
                let pairs = check_multiplicity_one(store, field)?;
                for pair in &pairs {
                    println!(
                        "{} {} and {} (agree on {} eigenvalues)",
                        "duplicates:".red().bold(),
                        pair.first,
                        pair.second,
                        pair.compared
                    );
                }
                total += pairs.len();
            }
            println!("{} found {} duplicate forms", "summary".cyan().bold(), total);
        }
        AuditCommands::Primes { field } => {
            let data = StoredFieldAdapter::new(store).load(&field)?;
            let bad = check_primes(&data);
            if bad.is_empty() {
                println!("{} {} primes agree with the ideal list", "ok".green().bold(), data.primes.len());
            } else {
                for label in &bad {
                    println!("{} prime {}", "mismatch".red().bold(), label);
                }
            }
        }
    }
    Ok(())
}

fn cmd_fields(command: FieldsCommands, store: &JsonStore) -> Result<()> {
    match command {
        FieldsCommands::Info { field } => {
            let data = StoredFieldAdapter::new(store).load(&field)?;
            println!("{} {}", "field".cyan().bold(), data.label().bold());
            println!("  degree        {}", data.field.degree());
            println!("  automorphisms {}", automorphism_count(&data));
            for g in data.nontrivial_automorphisms() {
                println!(
                    "    {} {} ↦ {}",
                    g.index(),
                    data.field.gen_name(),
                    data.field.format_element(g.image())
                );
            }
            println!("  ideals        {}", data.ideals.len());
            println!("  primes        {}", data.primes.len());
            println!(
                "  forms         {}",
                store.count(&FormFilter::by_field(&field))?
            );
        }
    }
    Ok(())
}

// ============================================================================
// fix / db
// ============================================================================

fn norm_range(norms: NormArgs, config: &HmfConfig) -> NormRange {
    NormRange::new(
        norms.min_norm.unwrap_or(config.min_level_norm),
        norms.max_norm.or(config.max_level_norm),
    )
}

fn cmd_fix(command: FixCommands, store: &JsonStore, config: &HmfConfig) -> Result<()> {
    let report = match command {
        FixCommands::DataFields { norms, apply } => {
            fix_data_fields(store, norm_range(norms, config), apply)?
        }
        FixCommands::Labels {
            norms,
            reverse,
            apply,
        } => fix_labels(store, norm_range(norms, config), reverse, apply)?,
        FixCommands::NumericSuffixes { norms, apply } => {
            add_numeric_label_suffixes(store, norm_range(norms, config), apply)?
        }
    };
    print_maintenance(&report);
    Ok(())
}

fn print_maintenance(report: &MaintenanceReport) {
    let verb = if report.applied { "fixed" } else { "would fix" };
    println!(
        "{} examined {}, {} {}, skipped {}",
        "summary".cyan().bold(),
        report.examined,
        verb,
        report.changed,
        report.skipped
    );
    if let Some(label) = &report.stopped_at {
        println!("  {} stopped at {}", "→".red(), label);
    }
    if !report.applied && report.changed > 0 {
        println!("  {} rerun with --apply to write", "info:".yellow().bold());
    }
}

fn cmd_db(command: DbCommands, store: &JsonStore) -> Result<()> {
    match command {
        DbCommands::Import { file } => {
            let table = read_upload_file(&file)?;
            if !table.columns.iter().any(|c| c == "label") {
                bail!("{} has no label column", file.display());
            }
            let mut inserted = 0;
            let mut present = 0;
            for form in table.records()? {
                if store.find_one(&FormFilter::by_label(&form.label))?.is_some() {
                    tracing::info!(label = %form.label, "already stored");
                    present += 1;
                    continue;
                }
                store.insert(form)?;
                inserted += 1;
            }
            eprintln!(
                "{} imported {} rows from {} ({} already present)",
                "ok".green().bold(),
                inserted,
                file.display(),
                present
            );
        }
    }
    Ok(())
}
