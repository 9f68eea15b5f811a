use clap::Parser;
use dockside::configuration::{Args, Config};
use dockside::container_management::ContainerManager;
use dockside::error_handling::types::ConfigError;
use dockside::preset_management::{Context, Registry};
use dockside::presets;
use log::{error, info, warn};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let registry = Registry::new();
    presets::register_all(&registry);

    if args.list {
        for name in registry.names() {
            println!("{}", name);
        }
        return;
    }

    info!("Importing configuration");
    let config = Config::load(&args).unwrap_or_else(|e| {
        error!("Unable to import configuration: {}", e);
        std::process::exit(1);
    });

    let name = config.preset_name().unwrap_or_else(|e| {
        error!("{}, pass one of: {}", e, registry.names().join(", "));
        std::process::exit(2);
    });
    let mut preset = registry.create(name).unwrap_or_else(|| {
        error!("{}", ConfigError::UnknownPreset(name.to_string()));
        std::process::exit(2);
    });
    preset.apply(config.preset_options());

    let manager = ContainerManager::with_docker(&config.orchestrator).unwrap_or_else(|e| {
        error!("Unable to create a container manager: {}, exiting...", e);
        std::process::exit(1);
    });

    let (ctx, cancel) = Context::with_cancel();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted while starting, cancelling");
            cancel.cancel();
        }
    });

    let container = match manager.start(preset.as_mut(), &ctx).await {
        Ok(container) => container,
        Err(e) => {
            error!("Unable to start preset {}: {}", name, e);
            std::process::exit(if e.is_timeout() { 3 } else { 1 });
        }
    };
    interrupt.abort();

    println!("{} ({}) is ready", container.id, container.image);
    for port in container.ports.keys() {
        if let Ok(addr) = container.address(port) {
            println!("  {}: {}", port, addr);
        }
    }

    info!("Press Ctrl+C to stop the container");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", e);
    }

    if let Err(e) = manager.stop(&container).await {
        error!("Unable to stop container {}: {}", container.id, e);
        std::process::exit(1);
    }
    info!("Shutdown complete");
}
