//! Spreadsheet-to-SICAL data entry robot.
//!
//! Loads a workbook, waits for the operator to bring SICAL to the front and
//! then enters every row through the desktop, stopping at the first problem.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use sical_rpa::cancel::CancelToken;
use sical_rpa::core::cell::normalize;
use sical_rpa::core::columns::{guess_amount_column, guess_operation_column};
use sical_rpa::driver::{RunRequest, RunStop, run_rows};
use sical_rpa::exit_codes;
use sical_rpa::io::assets::AssetSet;
use sical_rpa::io::clock::SystemClock;
use sical_rpa::io::config::{
    DEFAULT_CONFIG_FILE, RpaConfig, load_config, parse_seconds_ms, write_config,
};
use sical_rpa::io::desktop::Desktop;
use sical_rpa::io::sheet::load_sheet;
use sical_rpa::logging;
use sical_rpa::progress::ConsoleSink;
use sical_rpa::session::Session;

#[derive(Parser)]
#[command(
    name = "sical-rpa",
    version,
    about = "Enter spreadsheet rows into SICAL by driving the desktop"
)]
struct Cli {
    /// Show informational diagnostics on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config and report missing reference images.
    Check {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Print columns, guessed roles and the first rows of a workbook.
    Preview {
        file: PathBuf,
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
    /// Enter every row of a workbook into SICAL.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    file: PathBuf,

    /// Column holding the amount; guessed from the header when omitted.
    #[arg(long)]
    amount_column: Option<String>,

    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Image recognition confidence (0.50 to 0.99).
    #[arg(long)]
    confidence: Option<f32>,

    /// Seconds to wait after each tab (accepts `0,4`).
    #[arg(long)]
    tab_delay: Option<String>,

    /// Seconds to wait after each click (accepts `0,6`).
    #[arg(long)]
    click_delay: Option<String>,

    /// Start without asking for confirmation.
    #[arg(short, long)]
    yes: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { config, force } => cmd_init(&config, force),
        Command::Check { config } => cmd_check(&config),
        Command::Preview { file, rows } => cmd_preview(&file, rows),
        Command::Run(args) => cmd_run(&args),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &RpaConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_check(path: &Path) -> Result<i32> {
    let config = load_config(path)?;
    let assets = AssetSet::resolve(config_dir(path), &config.assets);
    let missing = assets.missing();
    for (reference, image) in &missing {
        println!("missing: {} ({})", image.display(), reference.label());
    }
    if missing.is_empty() {
        println!("config ok, all reference images present");
        return Ok(exit_codes::OK);
    }
    Ok(exit_codes::INVALID)
}

fn cmd_preview(file: &Path, limit: usize) -> Result<i32> {
    let sheet = load_sheet(file)?;
    println!("columns: {}", sheet.columns.join(", "));
    println!(
        "amount column: {}",
        guess_amount_column(&sheet.columns).unwrap_or("-")
    );
    println!(
        "operation column: {}",
        guess_operation_column(&sheet.columns).unwrap_or("-")
    );
    println!("rows: {}", sheet.rows.len());
    for (index, row) in sheet.rows.iter().take(limit).enumerate() {
        let cells: Vec<String> = row
            .cells()
            .iter()
            .map(|(column, value)| format!("{column}={}", normalize(value)))
            .collect();
        println!("{:>4}: {}", index + 1, cells.join(" | "));
    }
    Ok(exit_codes::OK)
}

fn cmd_run(args: &RunArgs) -> Result<i32> {
    let config = configure(args)?;
    let assets = AssetSet::resolve(config_dir(&args.config), &config.assets);
    let sheet = load_sheet(&args.file)?;
    let amount_column = match &args.amount_column {
        Some(column) => column.clone(),
        None => guess_amount_column(&sheet.columns)
            .map(str::to_string)
            .unwrap_or_default(),
    };

    println!(
        "{}: {} rows, amount column '{}'",
        args.file.display(),
        sheet.rows.len(),
        amount_column
    );
    if !args.yes && !confirm("Start entering rows into SICAL?")? {
        println!("cancelled");
        return Ok(exit_codes::OK);
    }

    let desktop = Desktop::new()?;
    let cancel = CancelToken::new();
    let session = Session {
        host: &desktop,
        clock: &SystemClock,
        config: &config,
        assets: &assets,
        cancel: &cancel,
        sink: &ConsoleSink,
    };
    let outcome = run_rows(
        &session,
        &RunRequest {
            columns: &sheet.columns,
            rows: &sheet.rows,
            amount_column: &amount_column,
        },
    );

    println!(
        "{} of {} rows completed",
        outcome.rows_completed, outcome.total_rows
    );
    if let RunStop::Failed { message, .. } | RunStop::Invalid { message } = &outcome.stop {
        eprintln!("{message}");
    }
    Ok(exit_codes::for_stop(&outcome.stop))
}

/// Config file values with command-line overrides applied.
fn configure(args: &RunArgs) -> Result<RpaConfig> {
    let mut config = load_config(&args.config)?;
    if let Some(confidence) = args.confidence {
        config.confidence = confidence;
    }
    if let Some(raw) = &args.tab_delay {
        config.tab_delay_ms = parse_seconds_ms(raw).context("--tab-delay")?;
    }
    if let Some(raw) = &args.click_delay {
        config.click_delay_ms = parse_seconds_ms(raw).context("--click-delay")?;
    }
    config.validate()?;
    Ok(config)
}

fn config_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush().context("flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "s" | "si" | "sí"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["sical-rpa", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false, .. }));
    }

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "sical-rpa",
            "run",
            "rows.xlsx",
            "--amount-column",
            "Importe",
            "--tab-delay",
            "0,5",
            "--yes",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.file, PathBuf::from("rows.xlsx"));
        assert_eq!(args.amount_column.as_deref(), Some("Importe"));
        assert!(args.yes);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn overrides_replace_file_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cli = Cli::parse_from([
            "sical-rpa",
            "run",
            "rows.xlsx",
            "--config",
            temp.path().join("missing.toml").to_str().expect("utf8 path"),
            "--confidence",
            "0.9",
            "--tab-delay",
            "0,5",
            "--click-delay",
            "1.2",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };

        let config = configure(&args).expect("configure");
        assert_eq!(config.confidence, 0.9);
        assert_eq!(config.tab_delay_ms, 500);
        assert_eq!(config.click_delay_ms, 1200);
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cli = Cli::parse_from([
            "sical-rpa",
            "run",
            "rows.xlsx",
            "--config",
            temp.path().join("missing.toml").to_str().expect("utf8 path"),
            "--confidence",
            "1.5",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(configure(&args).is_err());
    }

    #[test]
    fn config_dir_defaults_to_cwd() {
        assert_eq!(config_dir(Path::new("sical-rpa.toml")), Path::new("."));
        assert_eq!(config_dir(Path::new("conf/x.toml")), Path::new("conf"));
    }
}
