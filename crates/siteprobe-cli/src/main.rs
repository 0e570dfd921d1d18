//! Siteprobe CLI: run browser regression suites
//!
//! ## Usage
//!
//! ```bash
//! siteprobe run --suite home          # One suite
//! siteprobe run --all --shared-browser # Every suite on one browser
//! siteprobe list                       # Suites in the default file
//! siteprobe validate -f suites/x.yaml  # Check a suite file
//! ```

use clap::Parser;
use siteprobe::{BrowserConfig, SuiteFile, SuiteRunner};
use siteprobe_cli::{
    launch_session, logging, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands,
    FileArgs, OutputFormat, ProgressReporter, RunArgs, RunPlan, Verbosity,
};
use std::path::Path;
use std::process::ExitCode;
use tracing::info;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(&config);

    match cli.command {
        Commands::Run(args) => run_suites(config, &args),
        Commands::List(args) => run_list(&args),
        Commands::Validate(args) => run_validate(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn load(path: &Path) -> CliResult<SuiteFile> {
    SuiteFile::load(path).map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

fn run_suites(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let config = CliConfig {
        logs_dir: args.logs.clone(),
        screenshots_dir: args.screenshots.clone(),
        headless: args.headless_override(),
        chromium_path: args.chromium.clone(),
        no_sandbox: args.no_sandbox,
        shared_browser: args.shared_browser,
        format: args.format.into(),
        ..config.with_suite_file(&args.file.file)
    };

    let file = load(&config.suite_file)?;
    let suites = file
        .select(args.selected_keys())
        .map_err(|e| CliError::invalid_argument(e.to_string()))?;
    let browser = config.apply_browser(file.settings.apply_browser(BrowserConfig::default()));

    let plan = RunPlan {
        suites,
        runner: SuiteRunner::new(&config.screenshots_dir).with_log_dir(&config.logs_dir),
        waits: file.settings.wait_policy(),
        shared: config.shared_browser,
    };
    info!(
        suites = plan.suites.len(),
        shared = plan.shared,
        headless = browser.headless,
        "starting run"
    );

    let mut reporter = ProgressReporter::new(
        config.color.should_color(),
        config.verbosity.is_quiet(),
    );
    reporter.start_progress(plan.suites.len() as u64, "suites");

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(plan.execute(|| launch_session(browser.clone()), &reporter));
    reporter.finish();
    let summary = summary?;

    match config.format {
        OutputFormat::Text => reporter.summary(&summary.reports, summary.duration()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

fn run_list(args: &FileArgs) -> CliResult<()> {
    let file = load(&args.file)?;
    println!("{:<14} {:<28} {:>9} {:>6}  START", "KEY", "NAME", "SCENARIOS", "SWEEPS");
    for suite in &file.suites {
        println!(
            "{:<14} {:<28} {:>9} {:>6}  {}",
            suite.key,
            suite.name,
            suite.scenario_count(),
            suite.sweeps.len(),
            suite.start_url
        );
    }
    Ok(())
}

fn run_validate(args: &FileArgs) -> CliResult<()> {
    let file = load(&args.file)?;
    let scenarios: usize = file.suites.iter().map(|s| s.scenario_count()).sum();
    let sweeps: usize = file.suites.iter().map(|s| s.sweeps.len()).sum();
    println!(
        "{}: OK ({} suites, {scenarios} scenarios, {sweeps} sweeps)",
        args.file.display(),
        file.suites.len()
    );
    Ok(())
}
