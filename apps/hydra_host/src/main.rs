use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{Level, debug, error, info, warn};

use hydra_bridge::{Session, WithTimeout};
use hydra_log::{LogConfig, init_logging, parse_level};

mod config;
use config::Config;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix that sends a REPL line to the engine as raw JavaScript
const SCRIPT_PREFIX: &str = "js:";

/// Get default config path based on executable location
fn default_config_path() -> Option<PathBuf> {
    env::current_exe().ok().and_then(|exe_path| {
        let stem = exe_path.file_stem()?;
        let parent = exe_path.parent()?;
        Some(parent.join(stem).with_extension("json"))
    })
}

/// Hydra Host - headless GeoGebra applet runner
#[derive(Parser, Debug)]
#[command(name = "hydra_host")]
#[command(version = VERSION)]
#[command(about = "Runs a GeoGebra applet in an embedded JavaScript engine and evaluates commands against it", long_about = None)]
struct Args {
    /// Path to configuration file (JSON)
    #[arg(short, long, env = "HYDRA_CONFIG")]
    config: Option<String>,

    /// Applet script to load (overrides the configuration file)
    #[arg(long, env = "HYDRA_APPLET")]
    applet: Option<PathBuf>,

    /// Enable logging to file (hydra_host.log in current directory)
    #[arg(long, env = "HYDRA_LOG_FILE")]
    log_file: bool,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    print_schema: bool,
}

/// Resolve the configuration: explicit path, then file next to the executable, then defaults
fn load_config(args: &Args) -> Result<Config, String> {
    if let Some(path) = &args.config {
        return Config::from_json_file(path)
            .map_err(|e| format!("Failed to load config from '{}': {}", path, e));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let path = path.display().to_string();
            Config::from_json_file(&path)
                .map_err(|e| format!("Failed to load config from '{}': {}", path, e))
        }
        _ => Ok(Config::default()),
    }
}

fn setup_logging(config: &Config, log_file: bool) -> Result<(), String> {
    let log_level = parse_level(&config.log_level).unwrap_or_else(|| {
        eprintln!("Warning: Invalid log level '{}', using INFO", config.log_level);
        Level::INFO
    });

    let log_config = if log_file {
        let file = std::fs::File::create("hydra_host.log")
            .map_err(|e| format!("Unable to create hydra_host.log: {}", e))?;
        LogConfig::new("hydra_host::")
            .with_level(log_level)
            .with_log_file(file)
    } else {
        LogConfig::<std::fs::File>::new("hydra_host::").with_level(log_level)
    };

    init_logging(log_config).map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Start the engine and wait for the applet
async fn start_session(config: &Config) -> Result<Session, hydra_bridge::Error> {
    let session = Session::launch(config.engine_config()).await?;
    info!("Page loaded, waiting for the applet...");

    let waiter = session.clone();
    async move { waiter.wait_loaded().await }
        .with_timeout(config.load_timeout())
        .await?;

    info!("Applet ready");
    Ok(session)
}

/// Evaluate one REPL line and render its result
async fn run_line(session: &Session, line: &str) -> Result<String, hydra_bridge::Error> {
    if let Some(script) = line.strip_prefix(SCRIPT_PREFIX) {
        let value = session.evaluate(script.trim()).await?;
        return Ok(value.to_string());
    }

    let labels = session.eval_command(line).await?;
    Ok(if labels.is_empty() {
        "(no objects)".to_string()
    } else {
        labels.join(", ")
    })
}

async fn run_repl(session: &Session) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("End of input");
                break;
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":quit" {
            break;
        }

        match run_line(session, line).await {
            Ok(output) => {
                let written = stdout.write_all(format!("{}\n", output).as_bytes()).await;
                if let Err(e) = written.and(stdout.flush().await) {
                    error!("Failed to write output: {}", e);
                    break;
                }
            }
            Err(e) => warn!("{}: {}", line, e),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_schema {
        return match serde_json::to_string_pretty(&Config::schema()) {
            Ok(schema) => {
                println!("{}", schema);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to render schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // We can't log errors yet, so we use eprintln! for early failures
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(applet) = args.applet.clone() {
        config.applet = Some(applet);
    }

    if let Err(e) = setup_logging(&config, args.log_file) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    info!("Hydra Host v{}", VERSION);
    debug!("Settings:");
    debug!(
        "  Applet: {}",
        config
            .applet
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "bundled".to_string())
    );
    debug!("  Load Timeout: {} ms", config.load_timeout_ms);
    debug!("  Frame Interval: {} ms", config.frame_interval_ms);
    debug!("  Log Level: {}", config.log_level);

    let session = match start_session(&config).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start the applet: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for command in &config.startup_commands {
        match session.eval_command(command).await {
            Ok(labels) => info!("{} -> [{}]", command, labels.join(", ")),
            Err(e) => warn!("Startup command '{}' failed: {}", command, e),
        }
    }

    info!("Entering command loop. Enter GeoGebra commands, '{}<script>' for JavaScript, ':quit' to exit", SCRIPT_PREFIX);
    run_repl(&session).await;

    info!("Shutdown complete ({} objects tracked)", session.registry().len());
    ExitCode::SUCCESS
}
