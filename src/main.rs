use std::{collections::BTreeSet, process, sync::OnceLock};

use breezebee::{
    config::Config,
    core::{
        connectivity::HttpProbe,
        indicator::IndicatorController,
        plugins::{
            loader::PluginLoader, registry::PluginRegistry, types::PluginKind,
        },
        scheduler::SamplingScheduler,
        service::ServiceContext,
    },
    logger::LoggerManager,
    print_error, print_info,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

/// Logs every implementation of `kind` next to the ones the configuration uses.
fn log_plugins_table(kind: PluginKind, loaded: Vec<&str>, available: Vec<&'static str>) {
    let loaded: BTreeSet<&str> = loaded.into_iter().collect();
    let available: BTreeSet<&str> = available.into_iter().collect();

    let width = loaded
        .iter()
        .chain(available.iter())
        .map(|s| s.len())
        .max()
        .unwrap_or(0)
        .max(kind.as_str().len() + 1);

    let title = format!("{}s", kind);
    info!("{:<width$} | Status", title, width = width);
    info!("{}-+-{}", "-".repeat(width), "-".repeat(12));
    for name in &loaded {
        info!("{:<width$} | LOADED", name, width = width);
    }
    for name in available.iter().filter(|n| !loaded.contains(*n)) {
        info!("{:<width$} | AVAILABLE", name, width = width);
    }
}

fn fatal(message: impl std::fmt::Display) -> ! {
    print_error!("{}", message);
    error!("{}", message);
    process::exit(1);
}

#[tokio::main]
async fn main() {
    let cfg = config();
    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting breezebee version {}...", env!("CARGO_PKG_VERSION"));
    if !cfg.main.operator.is_empty() {
        print_info!("Operated by {}", cfg.main.operator);
    }
    debug!("{:#?}", cfg.main);
    info!("Log level: {}", cfg.logger.level);

    let probe = HttpProbe::new(cfg.main.connectivity_url.as_str())
        .unwrap_or_else(|e| fatal(format!("Failed to build connectivity probe: {}", e)));
    let registry = PluginRegistry::global();
    let loader = PluginLoader::new(registry, &probe, &cfg.source, &cfg.notification_common);

    let sensors = loader
        .load_sensors(&cfg.sensors)
        .await
        .unwrap_or_else(|e| fatal(e));
    let outputs = loader
        .load_outputs(&cfg.outputs)
        .await
        .unwrap_or_else(|e| fatal(e));
    let notifications = loader
        .load_notifications(&cfg.notifications)
        .await
        .unwrap_or_else(|e| fatal(e));

    log_plugins_table(
        PluginKind::Sensor,
        sensors.names(),
        registry.list(PluginKind::Sensor),
    );
    log_plugins_table(
        PluginKind::Output,
        outputs.set.names(),
        registry.list(PluginKind::Output),
    );
    log_plugins_table(
        PluginKind::Notification,
        notifications.names(),
        registry.list(PluginKind::Notification),
    );

    for text in &outputs.metadata {
        print_info!("{}", text);
        info!("{}", text);
    }

    let indicators = IndicatorController::from_config(&cfg.main)
        .await
        .unwrap_or_else(|e| fatal(format!("Failed to set up indicator lights: {}", e)));

    let mut context = ServiceContext::new(
        sensors,
        outputs.set,
        notifications,
        indicators,
        cfg.main.print_errors,
    );

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        signal.cancel();
    });

    let mut scheduler = SamplingScheduler::new(cfg.main.interval());
    print_info!(
        "Sampling every {:.2}s, press Ctrl+C to stop",
        scheduler.interval().as_secs_f64()
    );
    scheduler.run(&mut context, &cancel).await;

    context.shutdown().await;
    print_info!("Stopping sampling as requested...");
    info!("Shutdown complete");
    process::exit(1);
}
