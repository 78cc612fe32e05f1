use clap::{Parser, Subcommand};
use fastlane::config;
use fastlane::dataplane::Supervisor;
use fastlane::telemetry::{init_logging, LogConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Process-wide stop flag, raised by SIGINT/SIGTERM. Workers check it once
/// per loop iteration; the watchdog on each tick.
static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn signal_handler(_sig: libc::c_int) {
    STOP.store(true, Ordering::Relaxed);
}

#[derive(Parser)]
#[command(name = "fastlane")]
#[command(about = "Inline two-port bridge that keeps gaming and DNS fast under load")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge
    Run {
        /// Path to the config file (built-in defaults if absent)
        #[arg(short, long, default_value = "fastlane.toml")]
        config: PathBuf,
    },
    /// Validate a config file without starting the bridge
    Check {
        /// Path to the config file
        #[arg(short, long, default_value = "fastlane.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Check { config }) => cmd_check(&config),
        Some(Commands::Run { config }) => cmd_run(&config),
        None => cmd_run(&PathBuf::from("fastlane.toml")),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(config_path: &PathBuf) -> Result<(), String> {
    let cfg = config::load_or_default(config_path).map_err(|e| e.to_string())?;

    init_logging(Some(&LogConfig {
        level: cfg.log.level.clone(),
        format: cfg.log.format.clone(),
    }));

    let validation = config::validate(&cfg);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err("configuration invalid".to_string());
    }

    // Non-blocking sends to a downed peer may raise SIGPIPE; dying over it
    // would defeat the whole drop-and-continue error model.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        libc::signal(libc::SIGINT, signal_handler as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as *const () as libc::sighandler_t);
    }

    info!("fastlane starting...");

    Supervisor::new(cfg)
        .run(&STOP)
        .map_err(|e| format!("{}. Run with root privileges.", e))
}

fn cmd_check(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| e.to_string())?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}
