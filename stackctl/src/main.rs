//! stackctl - Entry Point
//!
//! Activates compose descriptors against a docker engine, either once from the
//! command line or on demand through a small HTTP API.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::exit;

use stackctl::app::options::AppOptions;
use stackctl::app::run::run;
use stackctl::app::state::AppState;
use stackctl::filesys::file::File;
use stackctl::logs::{init_logging, LogOptions};
use stackctl::storage::layout::StorageLayout;
use stackctl::storage::settings::{load_settings, Settings};
use stackctl::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version info: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let settings_file = match cli_args.get("config") {
        Some(path) => File::new(path),
        None => StorageLayout::default().settings_file(),
    };
    let mut settings = match load_settings(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {e}",
                settings_file.path().display()
            );
            exit(2);
        }
    };
    if let Err(e) = settings.apply_env().and_then(|_| apply_cli(&mut settings, &cli_args)) {
        eprintln!("{e}");
        exit(2);
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let options = AppOptions::from_settings(&settings);
    let project = cli_args.get("project").map(String::as_str);

    if let Some(path) = cli_args.get("up") {
        let state = AppState::init(&options);
        let descriptor = read_descriptor(path).await;
        finish(state.activator.activate(&descriptor, project).await);
    }

    if let Some(path) = cli_args.get("down") {
        let state = AppState::init(&options);
        let descriptor = read_descriptor(path).await;
        finish(state.activator.deactivate(&descriptor, project).await);
    }

    // Run the server
    info!("Running stackctl with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run stackctl: {e}");
        exit(1);
    }
}

/// Overrides from `--key=value` arguments; these win over the settings file and environment
fn apply_cli(settings: &mut Settings, cli_args: &HashMap<String, String>) -> Result<(), String> {
    if let Some(level) = cli_args.get("log-level") {
        settings.log_level = level.parse()?;
    }
    if let Some(port) = cli_args.get("port") {
        settings.server.port = port
            .parse()
            .map_err(|_| format!("Invalid --port: {}", port))?;
    }
    if let Some(binary) = cli_args.get("engine") {
        settings.engine.binary = binary.clone();
    }
    if let Some(path) = cli_args.get("secrets") {
        settings.secrets_file = Some(PathBuf::from(path));
    }
    if cli_args.contains_key("strict-labels") {
        settings.strict_labels = true;
    }
    Ok(())
}

/// Read a descriptor from a path, `-` meaning stdin
async fn read_descriptor(path: &str) -> String {
    let result = if path == "-" {
        use tokio::io::AsyncReadExt;
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await.map(|_| text)
    } else {
        tokio::fs::read_to_string(path).await
    };

    match result {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Unable to read descriptor {path}: {e}");
            exit(2);
        }
    }
}

/// Print the engine output and exit: 0 on success, 2 for descriptor errors, 1 otherwise
fn finish(result: Result<String, stackctl::errors::StackError>) -> ! {
    match result {
        Ok(output) => {
            print!("{output}");
            exit(0);
        }
        Err(e) => {
            eprintln!("{e}");
            exit(if e.is_validation() { 2 } else { 1 });
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Unable to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
