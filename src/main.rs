// LogPilot - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation (debug mode support)
// 3. Search session creation
// 4. eframe GUI launch

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod gui;

// Re-export modules from the library crate so that `gui.rs` and other
// binary-side code can use `crate::app::...`, `crate::core::...` etc.
pub use logpilot::app;

pub use logpilot::core;
pub use logpilot::platform;
pub use logpilot::ui;
pub use logpilot::util;

use clap::Parser;
use std::path::PathBuf;

/// LogPilot - search and follow journald logs across many hosts.
///
/// Pick hosts from the log server's directory, give each its own time range,
/// level and service filter, and watch the results side by side.
#[derive(Parser, Debug)]
#[command(name = "LogPilot", version, about)]
struct Cli {
    /// Log server base URL (overrides [server] base_url).
    #[arg(short = 's', long = "server")]
    server: Option<String>,

    /// Replay log frames from a newline-delimited JSON capture file instead
    /// of streaming from the server's websocket proxy.
    #[arg(short = 'r', long = "replay")]
    replay: Option<PathBuf>,

    /// Directory holding config.toml (defaults to the platform config dir).
    #[arg(short = 'c', long = "config-dir")]
    config_dir: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    // Config first: it names the log level and log file.
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| platform::config::PlatformPaths::resolve().config_dir);
    let (config, config_warnings) = platform::config::load_config(&config_dir);

    util::logging::init(
        cli.debug,
        config.log_level.as_deref(),
        config.log_file.as_deref(),
    );

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        config_dir = %config_dir.display(),
        "LogPilot starting"
    );
    for w in &config_warnings {
        tracing::warn!(warning = %w, "Config warning");
    }

    let session = match core::session::SearchSession::create(
        &mut core::session::RandomIdentity::new(config.client_id_max),
    ) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start search session");
            eprintln!("Error: {}", util::error::LogPilotError::from(e));
            std::process::exit(1);
        }
    };

    let mut state = app::state::AppState::new(session, config.max_records_per_host, cli.debug);
    state.dark_mode = config.dark_mode;
    state.font_size = config.font_size;
    for w in config_warnings {
        state.add_warning(w);
    }

    let server_url = cli.server.clone().unwrap_or_else(|| config.server_url.clone());
    let host_manager = match app::hosts::HostDirectory::new(&server_url, config.request_timeout) {
        Ok(directory) => Some(app::hosts::HostListManager::new(directory)),
        Err(e) => {
            tracing::error!(error = %e, "Host directory client unavailable");
            state.add_warning(util::error::LogPilotError::from(e).to_string());
            None
        }
    };

    let transport: Box<dyn app::transport::LogTransport> = match cli.replay {
        Some(path) => {
            tracing::info!(source = %path.display(), "Using replay transport");
            Box::new(app::replay::ReplayTransport::new(path))
        }
        None => match app::websocket::WebSocketTransport::new(&server_url, config.request_timeout) {
            Ok(t) => {
                tracing::info!(url = t.proxy_url(), "Using websocket transport");
                Box::new(t)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Streaming unavailable");
                state.add_warning(format!("Streaming unavailable: {e}"));
                Box::new(app::transport::UnconfiguredTransport)
            }
        },
    };

    let font_size = state.font_size;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!(
                "{} v{}",
                util::constants::APP_NAME,
                util::constants::APP_VERSION
            ))
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    let result = eframe::run_native(
        util::constants::APP_NAME,
        native_options,
        Box::new(move |cc| {
            apply_font_size(&cc.egui_ctx, font_size);
            Ok(Box::new(gui::LogPilotApp::new(state, transport, host_manager)))
        }),
    );

    if let Err(e) = result {
        tracing::error!(error = %e, "Failed to launch GUI");
        eprintln!("Error: Failed to launch LogPilot GUI: {e}");
        std::process::exit(1);
    }
}

/// Scale body and button text to the configured size.
fn apply_font_size(ctx: &egui::Context, size: f32) {
    ctx.style_mut(|style| {
        for (text_style, font) in style.text_styles.iter_mut() {
            match text_style {
                egui::TextStyle::Body | egui::TextStyle::Button => font.size = size,
                egui::TextStyle::Heading => font.size = size * 1.3,
                _ => {}
            }
        }
    });
}
