use std::{process, sync::OnceLock};

use otgw_bridge::{
    config::Config,
    core::{
        model::BridgeState, platform::HostPlatform, store::FileSettingsStore,
        topic::TopicResolver, RunExit, Supervisor,
    },
    logger::LoggerManager,
    print_error,
};
use otgw_mqtt::MqttSession;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

/// Replaces the current process image with a fresh copy of itself.
#[cfg(unix)]
fn restart() -> ! {
    use std::os::unix::process::CommandExt;

    match std::env::current_exe() {
        Ok(exe) => {
            let err = process::Command::new(exe)
                .args(std::env::args_os().skip(1))
                .exec();
            error!("Failed to re-execute: {}", err);
        }
        Err(e) => error!("Failed to locate own executable: {}", e),
    }
    process::exit(1);
}

/// Without `exec`, leave the restart to the service manager.
#[cfg(not(unix))]
fn restart() -> ! {
    warn!("Re-execution unsupported on this platform, exiting");
    process::exit(0);
}

#[tokio::main(flavor = "current_thread")]
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
    info!("Starting otgw-bridge version {}...", env!("CARGO_PKG_VERSION"));
    debug!("{:#?}", cfg.transport);
    info!("Log level: {}", cfg.logger.level);

    let store = FileSettingsStore::new(&cfg.bridge.settings_path);
    let settings = store.load_or_default().await;
    info!(
        "Settings loaded from {} (publish interval {} ms)",
        store.path().display(),
        settings.mqtt.interval
    );

    let session = MqttSession::new(&cfg.transport).unwrap_or_else(|e| {
        error!("Failed to create MQTT session: {}", e);
        process::exit(1);
    });
    info!(
        "Broker {}:{} (tls: {})",
        cfg.transport.host,
        cfg.transport.port,
        cfg.transport.uses_tls()
    );

    let platform = HostPlatform::new(&cfg.bridge.presence);
    if !platform.enabled() {
        debug!("No presence command configured");
    }

    let topics = TopicResolver::new(cfg.transport.base_topic.as_str());
    info!("Topic root: {}", topics.root());

    let mut supervisor = Supervisor::new(
        session,
        store,
        platform,
        BridgeState::new(settings),
        topics,
        &cfg.bridge,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down");
                    cancel.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }

    match supervisor.run(cfg.bridge.tick_interval(), cancel).await {
        RunExit::Cancelled => info!("Shutdown complete"),
        RunExit::RestartRequested => {
            info!("Restarting...");
            restart();
        }
    }
}
