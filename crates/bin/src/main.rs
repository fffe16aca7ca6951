//! Tidysort CLI binary.
//!
//! Runs portfolio sorts and Fama-French replications on a tidy finance
//! SQLite database.

mod integration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use integration::config::RunConfig;
use integration::database::{open_database, resolve_database_path};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration as StdDuration;
use tidysort::study::{breakpoints_at, compare_with_published, published_series};
use tidysort::{SortKind, replicate_ff3, replicate_ff5, value_premium};
use tidysort_data::calendar::month_start;
use tidysort_data::{Compustat, CrspMonthly, FactorTable, TidyFinanceDb, build_monthly_panel};
use tidysort_output::{
    AssignmentExport, BreakpointExport, ExportFormat, Exporter, FactorReturnExport,
    FactorSummary, FactorTableExport, PortfolioReturnExport, ReportBuilder,
};
use tidysort_sorts::{Assignment, FactorSeries, Observation, SortingVariable, get_factor_info};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "tidysort")]
#[command(about = "Tidysort: portfolio sorts and Fama-French factor replication", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the tidy finance SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON run configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables of the database
    Inspect {
        /// Compact the database file afterwards
        #[arg(long)]
        vacuum: bool,
    },

    /// Count securities in the CRSP sample
    Permnos {
        /// First month included
        #[arg(long, default_value = "2014-01-01")]
        start: NaiveDate,

        /// Last month included
        #[arg(long, default_value = "2024-06-30")]
        end: NaiveDate,
    },

    /// Show breakpoints of one variable at one month
    Breakpoints {
        /// Sorting variable (me, bm)
        #[arg(long, default_value = "me")]
        variable: SortingVariable,

        /// Month of the cross-section, e.g. 2020-06-01
        #[arg(long)]
        date: NaiveDate,

        /// Number of portfolios
        #[arg(long)]
        portfolios: Option<u32>,

        /// Write the breakpoints to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format (csv, json, pretty)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
    },

    /// Bivariate size and book-to-market sort
    Bivariate {
        /// Sort method (independent or dependent)
        #[arg(long)]
        method: Option<SortKind>,

        /// Portfolios per variable
        #[arg(long)]
        portfolios: Option<u32>,

        /// Write the value premium series to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the portfolio returns to this file
        #[arg(long)]
        portfolio_output: Option<PathBuf>,

        /// Write one row per date and factor instead of one column per factor
        #[arg(long)]
        long: bool,

        /// Write the portfolio label of every stock and period to this file
        #[arg(long)]
        assignments_output: Option<PathBuf>,

        /// Output format (csv, json, pretty)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Replicate the Fama-French three factors
    Ff3 {
        /// Write the replicated factors to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write one row per date and factor instead of one column per factor
        #[arg(long)]
        long: bool,

        /// Write the portfolio label of every stock and period to this file
        #[arg(long)]
        assignments_output: Option<PathBuf>,

        /// Output format (csv, json, pretty)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Replicate the Fama-French five factors
    Ff5 {
        /// Write the replicated factors to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write one row per date and factor instead of one column per factor
        #[arg(long)]
        long: bool,

        /// Write the portfolio label of every stock and period to this file
        #[arg(long)]
        assignments_output: Option<PathBuf>,

        /// Output format (csv, json, pretty)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Model behind the `ff3` and `ff5` commands.
#[derive(Debug, Clone, Copy)]
enum FamaFrenchModel {
    ThreeFactor,
    FiveFactor,
}

impl FamaFrenchModel {
    const fn study(self) -> &'static str {
        match self {
            Self::ThreeFactor => "ff3",
            Self::FiveFactor => "ff5",
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::ThreeFactor => "Fama-French 3",
            Self::FiveFactor => "Fama-French 5",
        }
    }

    const fn table(self) -> FactorTable {
        match self {
            Self::ThreeFactor => FactorTable::Ff3Monthly,
            Self::FiveFactor => FactorTable::Ff5Monthly,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RunConfig::load_or_default(cli.config.as_deref())?;
    let db_path = resolve_database_path(cli.db.as_deref(), &config);
    let db = open_database(&db_path)?;

    match cli.command {
        Commands::Inspect { vacuum } => {
            inspect(&db, &db_path, vacuum)?;
        }
        Commands::Permnos { start, end } => {
            count_permnos(&db, start, end)?;
        }
        Commands::Breakpoints {
            variable,
            date,
            portfolios,
            output,
            format,
        } => {
            let n_portfolios = portfolios.unwrap_or(config.bivariate.n_portfolios);
            show_breakpoints(
                &db,
                &config,
                variable,
                date,
                n_portfolios,
                output.as_deref(),
                format,
            )?;
        }
        Commands::Bivariate {
            method,
            portfolios,
            output,
            portfolio_output,
            long,
            assignments_output,
            format,
            report,
        } => {
            let mut config = config;
            if let Some(method) = method {
                config.bivariate.method = method;
            }
            if let Some(n) = portfolios {
                config.bivariate.n_portfolios = n;
            }
            let outputs = Outputs {
                series: output.as_deref(),
                portfolios: portfolio_output.as_deref(),
                assignments: assignments_output.as_deref(),
                report: report.as_deref(),
                format,
                long,
            };
            run_bivariate(&db, &config, &outputs)?;
        }
        Commands::Ff3 {
            output,
            long,
            assignments_output,
            format,
            report,
        } => {
            let outputs = Outputs {
                series: output.as_deref(),
                portfolios: None,
                assignments: assignments_output.as_deref(),
                report: report.as_deref(),
                format,
                long,
            };
            run_fama_french(&db, &config, FamaFrenchModel::ThreeFactor, &outputs)?;
        }
        Commands::Ff5 {
            output,
            long,
            assignments_output,
            format,
            report,
        } => {
            let outputs = Outputs {
                series: output.as_deref(),
                portfolios: None,
                assignments: assignments_output.as_deref(),
                report: report.as_deref(),
                format,
                long,
            };
            run_fama_french(&db, &config, FamaFrenchModel::FiveFactor, &outputs)?;
        }
    }

    Ok(())
}

/// Files a study command writes besides its terminal output.
struct Outputs<'a> {
    series: Option<&'a Path>,
    portfolios: Option<&'a Path>,
    assignments: Option<&'a Path>,
    report: Option<&'a Path>,
    format: ExportFormat,
    /// Series in long format
    long: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_header(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

fn spinner(message: &str) -> CliResult<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(StdDuration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}

fn load_tables(db: &TidyFinanceDb) -> CliResult<(Vec<CrspMonthly>, Vec<Compustat>)> {
    let pb = spinner("Loading CRSP and Compustat...")?;
    let loaded = db
        .load_crsp_monthly()
        .and_then(|crsp| db.load_compustat().map(|compustat| (crsp, compustat)));
    match loaded {
        Ok((crsp, compustat)) => {
            pb.finish_with_message(format!(
                "Loaded {} CRSP rows and {} Compustat rows",
                crsp.len(),
                compustat.len()
            ));
            Ok((crsp, compustat))
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            Err(format!("Failed to load data: {}", e).into())
        }
    }
}

fn load_monthly_panel(db: &TidyFinanceDb, config: &RunConfig) -> CliResult<Vec<Observation>> {
    let (crsp, compustat) = load_tables(db)?;

    print!("Building monthly panel...");
    std::io::stdout().flush()?;
    let panel = build_monthly_panel(&crsp, &compustat, &config.monthly_panel)?;
    println!(" ✓ ({} observations)", panel.len());
    Ok(panel)
}

fn export_series(
    series: &[FactorSeries],
    path: &Path,
    format: ExportFormat,
    long: bool,
) -> CliResult<()> {
    if long {
        FactorReturnExport::from_series(series).export_to_file(path, format)?;
    } else {
        FactorTableExport::from_series(series).export_to_file(path, format)?;
    }
    println!("Wrote {}", path.display());
    Ok(())
}

fn export_assignments(
    assignments: &[Assignment],
    path: &Path,
    format: ExportFormat,
) -> CliResult<()> {
    let records: Vec<AssignmentExport> = assignments.iter().map(AssignmentExport::from).collect();
    records.export_to_file(path, format)?;
    println!("Wrote {} ({} assignments)", path.display(), records.len());
    Ok(())
}

fn inspect(db: &TidyFinanceDb, path: &Path, vacuum: bool) -> CliResult<()> {
    print_header("DATABASE INVENTORY");
    println!("Database: {}\n", path.display());

    let tables = db.table_info()?;
    println!(
        "{:<28} {:>12} {:>8} {:>6} {:>12}",
        "Table", "Rows", "Columns", "PK", "Size (MB)"
    );
    println!("{}", "-".repeat(70));
    for table in &tables {
        println!(
            "{:<28} {:>12} {:>8} {:>6} {:>12.2}",
            table.name,
            table.n_rows,
            table.columns.len(),
            if table.has_primary_key { "yes" } else { "no" },
            table.estimated_size_bytes as f64 / (1024.0 * 1024.0)
        );
    }

    println!();
    for table in &tables {
        println!("  {}: {}", table.name, table.columns.join(", "));
    }

    if vacuum {
        print!("\nVacuuming database...");
        std::io::stdout().flush()?;
        db.vacuum()?;
        println!(" ✓");
    }

    Ok(())
}

fn count_permnos(db: &TidyFinanceDb, start: NaiveDate, end: NaiveDate) -> CliResult<()> {
    let count = db.count_permnos(start, end)?;

    println!("CRSP sample from {} to {}", start, end);
    println!("  Unique PERMNOs:        {}", count.unique_permnos);
    println!("  Unique PERMNO-months:  {}", count.unique_permno_dates);
    Ok(())
}

fn show_breakpoints(
    db: &TidyFinanceDb,
    config: &RunConfig,
    variable: SortingVariable,
    date: NaiveDate,
    n_portfolios: u32,
    output: Option<&Path>,
    format: ExportFormat,
) -> CliResult<()> {
    print_header(&format!("BREAKPOINTS: {}", variable));

    let panel = load_monthly_panel(db, config)?;
    let period = month_start(date);
    let breakpoints = breakpoints_at(
        &panel,
        variable,
        period,
        n_portfolios,
        config.bivariate.reference.clone(),
    )?;

    println!(
        "\n{} portfolios of {} at {} ({} reference)\n",
        breakpoints.n_portfolios(),
        variable,
        period,
        config.bivariate.reference
    );
    let records = BreakpointExport::from_breakpoints(period, variable, &breakpoints);
    let bound = |b: Option<f64>, open: &str| {
        b.map_or_else(|| open.to_string(), |v| format!("{:.4}", v))
    };
    for record in &records {
        println!(
            "  {:>3}  [{:>14}, {:>14})",
            record.portfolio,
            bound(record.lower, "-inf"),
            bound(record.upper, "inf")
        );
    }

    if let Some(path) = output {
        records.export_to_file(path, format)?;
        println!("\nWrote {}", path.display());
    }

    Ok(())
}

fn run_bivariate(db: &TidyFinanceDb, config: &RunConfig, outputs: &Outputs<'_>) -> CliResult<()> {
    print_header(&format!("BIVARIATE SORT: {}", config.bivariate.method));

    let panel = load_monthly_panel(db, config)?;

    print!(
        "Sorting into {0}x{0} portfolios...",
        config.bivariate.n_portfolios
    );
    std::io::stdout().flush()?;
    let result = match value_premium(&panel, &config.bivariate) {
        Ok(result) => {
            println!(" ✓ ({} portfolio-months)", result.portfolio_returns.len());
            result
        }
        Err(e) => {
            println!(" ✗");
            return Err(format!("Bivariate sort failed: {}", e).into());
        }
    };

    println!();
    let summary = FactorSummary::from_series(&result.premium);
    print!("{}", FactorSummary::table_to_ascii(std::slice::from_ref(&summary)));

    if let Some(path) = outputs.series {
        export_series(
            std::slice::from_ref(&result.premium),
            path,
            outputs.format,
            outputs.long,
        )?;
    }
    if let Some(path) = outputs.assignments {
        export_assignments(&result.assignments, path, outputs.format)?;
    }
    if let Some(path) = outputs.portfolios {
        let records: Vec<PortfolioReturnExport> = result
            .portfolio_returns
            .iter()
            .map(PortfolioReturnExport::from)
            .collect();
        records.export_to_file(path, outputs.format)?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = outputs.report {
        ReportBuilder::new()
            .study("bivariate")
            .config(&config.bivariate)?
            .contents(&summary)?
            .build()?
            .write_to(path)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

fn run_fama_french(
    db: &TidyFinanceDb,
    config: &RunConfig,
    model: FamaFrenchModel,
    outputs: &Outputs<'_>,
) -> CliResult<()> {
    print_header(&format!("{} REPLICATION", model.title().to_uppercase()));

    let (crsp, compustat) = load_tables(db)?;

    print!("Loading published factors...");
    std::io::stdout().flush()?;
    let published = db.load_factors(model.table())?;
    println!(" ✓ ({} months)", published.len());

    let pb = spinner("Forming July portfolios...")?;
    let replicated = match model {
        FamaFrenchModel::ThreeFactor => replicate_ff3(&crsp, &compustat, &config.fama_french),
        FamaFrenchModel::FiveFactor => replicate_ff5(&crsp, &compustat, &config.fama_french),
    };
    let replication = match replicated {
        Ok(replication) => {
            pb.finish_with_message(format!(
                "Replicated {} factors from {} assignments",
                replication.factors.len(),
                replication.assignments.len()
            ));
            replication
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(format!("Replication failed: {}", e).into());
        }
    };

    let factors = &replication.factors;
    println!();
    for factor in factors {
        if let Some(info) = get_factor_info(&factor.name) {
            println!("  {:<4} {}", factor.name.to_uppercase(), info.description);
        }
    }

    println!("\nReplicated factors");
    let summaries: Vec<FactorSummary> = factors.iter().map(FactorSummary::from_series).collect();
    print!("{}", FactorSummary::table_to_ascii(&summaries));

    println!("\nPublished factors");
    let reference: Vec<FactorSummary> = factors
        .iter()
        .map(|f| FactorSummary::from_series(&published_series(&published, &f.name)))
        .collect();
    print!("{}", FactorSummary::table_to_ascii(&reference));

    let comparison = compare_with_published(
        model.title(),
        factors,
        &published,
        config.fama_french.comparison_decimals,
    );
    print!("{}", comparison.to_ascii_table());

    if let Some(path) = outputs.series {
        export_series(factors, path, outputs.format, outputs.long)?;
    }
    if let Some(path) = outputs.assignments {
        export_assignments(&replication.assignments, path, outputs.format)?;
    }
    if let Some(path) = outputs.report {
        ReportBuilder::new()
            .study(model.study())
            .config(&config.fama_french)?
            .contents(&serde_json::json!({
                "factors": summaries,
                "comparison": comparison,
            }))?
            .build()?
            .write_to(path)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}
