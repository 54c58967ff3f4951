//! pvwatts-sim entry point: CLI wiring, engine loading and the API server.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use pvwatts_sim::api::{self, AppState};
use pvwatts_sim::config::AppConfig;
use pvwatts_sim::pvwatts::PvWattsService;
use pvwatts_sim::ssc::native::NativeSsc;
use pvwatts_sim::ssc::{SscApi, SscInfo};
use pvwatts_sim::weather::WeatherCatalog;

/// PVWatts simulations over the SSC engine, served as a REST API.
#[derive(Parser)]
#[command(name = "pvwatts-sim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PVWatts simulation server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Weather root directory, overrides `weather.directory`
    #[arg(long)]
    weather_dir: Option<PathBuf>,

    /// SSC shared library, overrides `ssc.library`
    #[arg(long)]
    ssc_library: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn load_config(cli: &Cli) -> AppConfig {
    let mut config = match cli.config {
        Some(ref path) => AppConfig::from_toml_file(path).unwrap_or_else(|e| fail(e)),
        None => AppConfig::default(),
    };

    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(ref dir) = cli.weather_dir {
        config.weather.directory = dir.clone();
    }
    if let Some(ref library) = cli.ssc_library {
        config.ssc.library = library.clone();
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        fail(e);
    }

    let config = load_config(&cli);
    let addr = config.bind_addr().unwrap_or_else(|e| fail(e));

    let engine = NativeSsc::load(&config.ssc.library).unwrap_or_else(|e| {
        fail(format_args!(
            "cannot load SSC from \"{}\": {e}",
            config.ssc.library.display()
        ))
    });
    let api: Arc<dyn SscApi> = Arc::new(engine);
    let ssc = SscInfo::query(api.as_ref());
    info!(version = ssc.version, build = %ssc.build, "SSC loaded");

    let catalog = WeatherCatalog::from_config(&config.weather).unwrap_or_else(|e| fail(e));
    let pvwatts = PvWattsService::new(Arc::clone(&api), Arc::new(catalog), config.pvwatts.clone());
    let state = Arc::new(AppState::new(api, pvwatts));

    let rt = tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| fail(format_args!("failed to create tokio runtime: {e}")));
    if let Err(e) = rt.block_on(api::serve(state, addr)) {
        fail(format_args!("server error on {addr}: {e}"));
    }
}
