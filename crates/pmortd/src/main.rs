//! pmortd - adaptive post-mortem collection daemon.
//!
//! Runs the configured collectors into timestamped run directories, polling
//! faster and in parallel as the host's load approaches its learned maximum.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Releases unused memory back to the operating system.
/// Parallel iterations leave per-thread arenas behind; purging keeps RSS flat.
#[cfg(not(target_env = "msvc"))]
fn release_memory_to_os() {
    // SAFETY: We're calling jemalloc's mallctl with valid arguments.
    // arena.0.purge tells jemalloc to return unused pages to the OS.
    unsafe {
        tikv_jemalloc_sys::mallctl(
            c"arena.0.purge".as_ptr().cast(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            0,
        );
    }
}

#[cfg(target_env = "msvc")]
fn release_memory_to_os() {}

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pmort_core::collector::{
    CollectorSet, FileSystem, LoadAverageCollector, ProcLoadSource, RealFs, ShellCollector,
    discover_scripts,
};
use pmort_core::config::{
    Config, DEFAULT_CACHE_DIR, DEFAULT_COLLECTORS_DIR, DEFAULT_OUTPUT_DIR, DEFAULT_PROC_PATH,
};
use pmort_core::learner::{DEFAULT_LOAD_THRESHOLD, FactLayout};
use pmort_core::output::OutputTarget;
use pmort_core::scheduler::{
    ExecutionMode, IterationReport, Scheduler, Shutdown, SleepTimer, TaskOutcome,
};

/// On-disk layout of the learned maximum load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    /// <cache-dir>/load_threshold
    Threshold,
    /// <cache-dir>/learned/maximum_one_minute_load.txt
    Learned,
}

impl From<LayoutArg> for FactLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Threshold => FactLayout::Threshold,
            LayoutArg::Learned => FactLayout::Learned,
        }
    }
}

/// Adaptive post-mortem collection daemon.
#[derive(Parser, Debug)]
#[command(name = "pmortd", about = "Adaptive post-mortem collection daemon", version)]
struct Args {
    /// Shortest wait between iterations, in seconds (used under peak load).
    #[arg(short = 'm', long, default_value = "1")]
    minimum_interval: f64,

    /// Longest wait between iterations, in seconds (used when idle).
    #[arg(short = 'M', long, default_value = "600")]
    maximum_interval: f64,

    /// Learned maximum load assumed until a higher one has been observed.
    #[arg(long, default_value_t = DEFAULT_LOAD_THRESHOLD)]
    load_threshold: f64,

    /// Directory holding learned facts.
    #[arg(short, long, default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Directory for run directories, or "-" to write to stdout.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Directory scanned recursively for executable collector scripts.
    #[arg(short = 'd', long, default_value = DEFAULT_COLLECTORS_DIR)]
    collectors_dir: PathBuf,

    /// Shell collector as NAME=COMMAND. May be repeated.
    #[arg(long = "shell", value_name = "NAME=COMMAND", value_parser = ShellCollector::parse_spec)]
    shells: Vec<ShellCollector>,

    /// File layout of the learned maximum load.
    #[arg(long, value_enum, default_value_t = LayoutArg::Threshold)]
    fact_layout: LayoutArg,

    /// Root of the proc filesystem that load is sampled from.
    #[arg(long, default_value = DEFAULT_PROC_PATH)]
    proc_path: PathBuf,

    /// Run a single iteration and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,

    /// Append daemon logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            minimum_interval: self.minimum_interval,
            maximum_interval: self.maximum_interval,
            load_threshold_default: self.load_threshold,
            cache_dir: self.cache_dir.clone(),
            fact_layout: self.fact_layout.into(),
            output: OutputTarget::from_path(&self.output_dir),
            collectors_dir: self.collectors_dir.clone(),
            proc_path: self.proc_path.clone(),
        }
    }
}

/// Maps -v/-q to a level. Default is INFO; -q wins over -v.
fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Initializes the tracing subscriber, optionally writing to `log_file`.
fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> io::Result<()> {
    let level = log_level(verbose, quiet);

    let mut filter = EnvFilter::from_default_env();
    for target in ["pmortd", "pmort_core"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Invalid log directive for {}: {}", target, e),
        }
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

/// Builds the collector set: load average, then discovered scripts, then
/// shell snippets.
fn build_collectors<F: FileSystem + Clone + 'static>(
    fs: F,
    config: &Config,
    shells: Vec<ShellCollector>,
) -> CollectorSet {
    let mut set = CollectorSet::new();
    set.register(LoadAverageCollector::new(ProcLoadSource::new(
        fs.clone(),
        &config.proc_path,
    )));

    let scripts = discover_scripts(&fs, &config.collectors_dir);
    info!(
        "Discovered {} collector scripts in {}",
        scripts.len(),
        config.collectors_dir.display()
    );
    set.extend(scripts);
    set.extend(shells);
    set
}

fn describe_report(report: &IterationReport) -> String {
    let failed: Vec<&str> = report
        .collectors
        .iter()
        .filter(|c| !matches!(c.outcome, TaskOutcome::Recorded { .. }))
        .map(|c| c.name.as_str())
        .collect();

    let mut desc = format!(
        "load {:.2}, {} run, {}/{} recorded",
        report.load,
        report.mode,
        report.recorded(),
        report.collectors.len()
    );
    if !failed.is_empty() {
        desc.push_str(&format!(", failed: {}", failed.join(", ")));
    }
    desc
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.quiet, args.log_file.as_deref()) {
        eprintln!("Failed to open log file: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "pmortd {} ({}) starting",
        env!("CARGO_PKG_VERSION"),
        pmort_core::GIT_SHA
    );

    let config = args.config();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }
    info!(
        "Config: interval={}..{}s, cache={}, output={}, proc={}",
        config.minimum_interval,
        config.maximum_interval,
        config.cache_dir.display(),
        config.output,
        config.proc_path.display()
    );

    let sink = match config.output.open() {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to open output {}: {}", config.output, e);
            return ExitCode::FAILURE;
        }
    };

    let fs = RealFs::new();
    let collectors = build_collectors(fs, &config, args.shells.clone());
    if collectors.is_empty() {
        warn!("No collectors configured");
    }
    info!("Collectors: {}", collectors.names().join(", "));

    // Ctrl-C stops the loop at its next wait.
    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handler_shutdown.request();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let load = ProcLoadSource::new(fs, &config.proc_path);
    let mut scheduler = Scheduler::new(&config, load, collectors, sink, SleepTimer, shutdown);
    info!(
        "Learned maximum load: {} ({})",
        scheduler.learner().learned_maximum(),
        scheduler
            .learner()
            .store()
            .path(scheduler.learner().fact())
            .display()
    );

    if args.once {
        let report = scheduler.run_iteration();
        info!("Single iteration: {}", describe_report(&report));
        return ExitCode::SUCCESS;
    }

    info!("Starting collection loop");
    scheduler.run_with(|report| {
        if report.failed() > 0 {
            warn!("Iteration: {}", describe_report(report));
        } else {
            debug!("Iteration: {}", describe_report(report));
        }
        if report.mode == ExecutionMode::Parallel {
            release_memory_to_os();
            debug!("Memory released after parallel iteration");
        }
    });

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmort_core::collector::MockFs;
    use pmort_core::scheduler::CollectorReport;
    use std::time::Duration;

    #[test]
    fn log_level_from_flags() {
        assert_eq!(log_level(0, false), Level::INFO);
        assert_eq!(log_level(1, false), Level::DEBUG);
        assert_eq!(log_level(3, false), Level::TRACE);
        assert_eq!(log_level(2, true), Level::ERROR);
    }

    #[test]
    fn args_defaults_map_to_default_config() {
        let args = Args::try_parse_from(["pmortd"]).unwrap();
        assert_eq!(args.config(), Config::default());
        assert!(!args.once);
        assert!(args.shells.is_empty());
    }

    #[test]
    fn args_map_to_config() {
        let args = Args::try_parse_from([
            "pmortd",
            "-m",
            "5",
            "-M",
            "120",
            "--load-threshold",
            "0.5",
            "-c",
            "/tmp/cache",
            "-o",
            "-",
            "--fact-layout",
            "learned",
            "--shell",
            "uptime=uptime -p",
            "--shell",
            "df=df -h",
            "--once",
        ])
        .unwrap();

        let config = args.config();
        assert_eq!(config.minimum_interval, 5.0);
        assert_eq!(config.maximum_interval, 120.0);
        assert_eq!(config.load_threshold_default, 0.5);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.output, OutputTarget::Stdout);
        assert_eq!(config.fact_layout, FactLayout::Learned);
        assert!(args.once);

        let commands: Vec<&str> = args.shells.iter().map(|s| s.command()).collect();
        assert_eq!(commands, vec!["uptime -p", "df -h"]);
    }

    #[test]
    fn args_proc_path_and_oversized_interval() {
        let args =
            Args::try_parse_from(["pmortd", "--proc-path", "/host/proc", "-M", "1e20"]).unwrap();
        let config = args.config();
        assert_eq!(config.proc_path, PathBuf::from("/host/proc"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn args_reject_bad_shell_spec() {
        assert!(Args::try_parse_from(["pmortd", "--shell", "no-equals"]).is_err());
        assert!(Args::try_parse_from(["pmortd", "--shell", "=cmd"]).is_err());
    }

    #[test]
    fn build_collectors_orders_builtin_scripts_shells() {
        let config = Config::default();
        let shells = vec![ShellCollector::parse_spec("uptime=uptime").unwrap()];
        let set = build_collectors(MockFs::busy_system(), &config, shells);

        assert_eq!(
            set.names(),
            vec!["load_average", "net.sockets", "processes.sh", "uptime"]
        );
    }

    #[test]
    fn build_collectors_without_scripts_dir() {
        let set = build_collectors(MockFs::idle_system(), &Config::default(), Vec::new());
        assert_eq!(set.names(), vec!["load_average"]);
    }

    #[test]
    fn describe_report_lists_failures() {
        let report = IterationReport {
            started: chrono::Local::now(),
            load: 4.5,
            mode: ExecutionMode::Parallel,
            collectors: vec![
                CollectorReport {
                    name: "load_average".to_string(),
                    outcome: TaskOutcome::Recorded { bytes: 14 },
                    elapsed: Duration::ZERO,
                },
                CollectorReport {
                    name: "net.sockets".to_string(),
                    outcome: TaskOutcome::Failed {
                        error: "exited with exit status: 1".to_string(),
                    },
                    elapsed: Duration::ZERO,
                },
            ],
            learned_updated: true,
            learned_max: 4.5,
            next_interval: Duration::from_secs(1),
        };

        assert_eq!(
            describe_report(&report),
            "load 4.50, parallel run, 1/2 recorded, failed: net.sockets"
        );
    }
}
