use std::{sync::Arc, time::Duration};

use log::info;
use reelqueue::{
    app_bootstrap::services::{spawn_background_services, BackgroundServicesConfig},
    app_runtime::AppRuntime,
    collection::HttpCollectionSource,
    config_persistence::{default_config_path, load_or_create_config},
    host_bridge::LocalHostBridge,
    host_ipc::StdioHostLink,
};
use tokio::sync::broadcast;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Debug);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_file = default_config_path()?;
    let config = load_or_create_config(&config_file)?;
    info!("Loaded config from {}", config_file.display());

    // Bus for communication between components
    let (bus_sender, runtime_bus_receiver) = broadcast::channel(1024);

    let bridge = LocalHostBridge::new(StdioHostLink::request_sink());
    let collection_source = Arc::new(HttpCollectionSource::new(
        config.collection.base_url.clone(),
        Duration::from_millis(u64::from(config.collection.request_timeout_ms)),
    ));

    let tokio_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    tokio_runtime.block_on(async move {
        let mut app_runtime = AppRuntime::new(
            &config,
            runtime_bus_receiver,
            bus_sender.clone(),
            Arc::new(bridge.clone()),
            collection_source,
        );
        spawn_background_services(BackgroundServicesConfig {
            bus_sender,
            bridge,
            startup_season_id: config.collection.startup_season_id,
        });
        app_runtime.run().await;
    });
    Ok(())
}
