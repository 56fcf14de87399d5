//! Domain Watch CLI Application
//!
//! A command-line interface for watching domain registration status using
//! RDAP and WHOIS. Runs either a single batch check (`--once`) or a
//! long-lived monitor that notifies on status changes.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use console::Term;
use domain_watch_lib::{
    load_domains_file, load_env_config, parse_duration_string, validate_monitor_config,
    CommandNotifier, ConfigManager, DomainChecker, DomainInfo, EnvConfig, FileConfig, LogNotifier,
    Monitor, MonitorConfig, NotificationManager, StaticTldRegistry,
};
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-watch
#[derive(Parser, Debug)]
#[command(name = "domain-watch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Watch domain registration status using RDAP with WHOIS fallback")]
#[command(
    long_about = "Watch domain registration status using RDAP with automatic WHOIS fallback.\n\nRuns a periodic monitor that reports status changes (available, redemption, pending delete, ...) through notifiers, or a single check with --once."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domain names to watch (fully qualified, e.g. example.com)
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line, # comments allowed)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Check every domain once, print the results and exit
    #[arg(long = "once", help_heading = "Mode")]
    pub once: bool,

    /// Output results in JSON format (with --once)
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Show registrar and dates for each result
    #[arg(short = 'i', long = "info", help_heading = "Output Format")]
    pub info: bool,

    /// Time between check cycles, e.g. "5m" (minimum 1m)
    #[arg(long = "interval", value_name = "DURATION", help_heading = "Monitoring")]
    pub interval: Option<String>,

    /// Max concurrent domain checks (default: 50, max: 200)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Monitoring"
    )]
    pub concurrency: Option<usize>,

    /// Per-request timeout, e.g. "30s"
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Monitoring")]
    pub timeout: Option<String>,

    /// Shell command run on every notification ($DW_SUBJECT, $DW_MESSAGE)
    #[arg(
        long = "notify-command",
        value_name = "COMMAND",
        help_heading = "Notifications"
    )]
    pub notify_command: Option<String>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Everything resolved from CLI, environment and config files.
struct Settings {
    monitor: MonitorConfig,
    registry: StaticTldRegistry,
    domains: Vec<String>,
    notify_command: Option<String>,
    notifications_enabled: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the `tracing` subscriber; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.json && !args.once {
        return Err("--json is only supported together with --once".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 200 {
            return Err("Concurrency must be between 1 and 200".to_string());
        }
    }

    if let Some(interval) = &args.interval {
        if parse_duration_string(interval).is_none() {
            return Err(format!(
                "Invalid interval '{}'. Use a format like '30s', '5m', '1h'",
                interval
            ));
        }
    }

    if let Some(timeout) = &args.timeout {
        if parse_duration_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use a format like '5s', '30s', '2m'",
                timeout
            ));
        }
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;

    if args.once {
        run_once(settings, &args).await
    } else {
        run_monitor(settings).await
    }
}

/// Resolve settings with precedence CLI > environment > config file > defaults.
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let file_config = load_file_config(args, &env_config)?;

    // Step 1: config file over defaults, then environment
    let monitor = file_config.apply_monitor(MonitorConfig::default());
    let monitor = env_config.apply_monitor(monitor);

    // Step 2: CLI arguments (highest precedence)
    let monitor = apply_cli_args_to_config(monitor, args);
    validate_monitor_config(&monitor)?;

    let mut registry = StaticTldRegistry::builtin();
    file_config.apply_servers(&mut registry);

    let domains = resolve_domains(args, &env_config, &file_config)?;
    if domains.is_empty() {
        return Err(
            "You must specify domain names, a file with --file, or a [domains] section in the config file"
                .into(),
        );
    }

    let notify_command = args
        .notify_command
        .clone()
        .or_else(|| env_config.notify_command.clone())
        .or_else(|| file_config.notify_command().map(str::to_string));

    Ok(Settings {
        monitor,
        registry,
        domains,
        notify_command,
        notifications_enabled: file_config.notifications_enabled(),
    })
}

fn load_file_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    // CLI --config wins over DW_CONFIG; both skip discovery
    if let Some(path) = args.config.as_ref().or(env_config.config.as_ref()) {
        debug!(path = %path, "using explicit config file");
        let file_config = config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;
        return Ok(file_config);
    }

    match config_manager.discover_and_load() {
        Ok(file_config) => Ok(file_config),
        Err(e) => {
            warn!(error = %e, "config discovery failed, using defaults");
            Ok(FileConfig::default())
        }
    }
}

fn apply_cli_args_to_config(mut config: MonitorConfig, args: &Args) -> MonitorConfig {
    if let Some(interval) = args.interval.as_deref().and_then(parse_duration_string) {
        config.check_interval = interval;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrent_limit = concurrency;
    }
    if let Some(timeout) = args.timeout.as_deref().and_then(parse_duration_string) {
        config.timeout = timeout;
    }
    config
}

/// Collect domains from the highest-precedence source that provides any.
fn resolve_domains(
    args: &Args,
    env_config: &EnvConfig,
    file_config: &FileConfig,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if !args.domains.is_empty() || args.file.is_some() {
        let mut domains = args.domains.clone();
        if let Some(path) = &args.file {
            domains.extend(load_domains_file(path)?);
        }
        return Ok(domains);
    }

    if let Some(path) = &env_config.file {
        return Ok(load_domains_file(path)?);
    }

    let mut domains = file_config.domain_list();
    if let Some(path) = file_config.domain_file() {
        domains.extend(load_domains_file(path)?);
    }
    Ok(domains)
}

async fn run_once(settings: Settings, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let checker = DomainChecker::new(settings.monitor.check_config(), Arc::new(settings.registry))?;

    let spinner = if !args.json && Term::stderr().is_term() {
        Some(ui::Spinner::start(format!(
            "Checking {} domain{}...",
            settings.domains.len(),
            if settings.domains.len() == 1 { "" } else { "s" }
        )))
    } else {
        None
    };

    let started = Instant::now();
    let results = checker.check_domains(&settings.domains).await;
    let duration = started.elapsed();

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }

    display_results(&results, args, duration)
}

fn display_results(
    results: &[DomainInfo],
    args: &Args,
    duration: std::time::Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.json {
        let json = serde_json::to_string_pretty(results)?;
        println!("{}", json);
        return Ok(());
    }

    for info in results {
        ui::print_result(info, args.info);
    }
    if results.len() > 1 {
        println!();
        ui::print_summary(results, duration);
    }
    Ok(())
}

async fn run_monitor(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = Arc::new(Monitor::new(
        settings.monitor.clone(),
        Arc::new(settings.registry),
    )?);

    let accepted = monitor.set_domains(&settings.domains);
    if accepted == 0 {
        return Err("None of the given domains are valid".into());
    }

    let manager = Arc::new(NotificationManager::new());
    if settings.notifications_enabled {
        manager.add_notifier(Arc::new(LogNotifier::new()));
        if let Some(command) = &settings.notify_command {
            manager.add_notifier(Arc::new(CommandNotifier::new(command.clone())));
        }
    }
    manager.start()?;

    let events = monitor
        .take_events()
        .ok_or("monitor event stream already taken")?;
    let forwarder = manager.spawn_forwarder(events);

    ui::print_monitor_header(accepted, &settings.monitor, &manager.enabled_notifiers());
    monitor.start()?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    monitor.stop();
    forwarder.abort();
    manager.shutdown().await;

    ui::print_shutdown_summary(&monitor.stats(), &manager.stats());
    Ok(())
}
