//! Hub binary: wires the registry, receiver, rescan task, and main loop.
//!
//! Startup order matters: the display Pi is mandatory, so the hub waits for
//! it (discovery plus manual config fallback) and exits with a clear
//! message if it never appears, the only fatal path. Everything after that
//! degrades per-request.

use anyhow::Context;
use iris_hub::audio::QueueAudioSource;
use iris_hub::config::HubConfig;
use iris_hub::display::ConsoleDisplay;
use iris_hub::hub::Orchestrator;
use iris_hub::interrupt::InterruptChannel;
use iris_hub::iot::IoTClient;
use iris_hub::registry::{DeviceRegistry, DeviceType, spawn_rescan};
use iris_hub::todo::TodoStore;
use iris_hub::translate::{HttpTranslator, OfflineTranslator, Translator};
use iris_hub::weather::{OpenWeather, StaticWeather, WeatherProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Console plus a rolling log file, since the hub usually runs headless
    // on the laptop half of the glasses.
    let log_dir = dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("iris-hub");
    std::fs::create_dir_all(&log_dir).context("creating log directory")?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "iris-hub.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    let config_path = HubConfig::default_path();
    let config = HubConfig::load(&config_path).context("loading configuration")?;
    tracing::info!("iris-hub starting (config: {})", config_path.display());

    let registry = Arc::new(DeviceRegistry::new(Duration::from_secs(
        config.discovery.stale_window_secs,
    )));
    registry.load_manual_devices(&config.discovery);

    let cancel = CancellationToken::new();

    // Interrupt receiver: hardware posts motion alerts and status changes
    // here; the bounded channel carries them into the main loop.
    let interrupts = InterruptChannel::new(config.receiver.queue_capacity);
    let receiver_handle = tokio::spawn({
        let channel = interrupts.clone();
        let cancel = cancel.clone();
        let host = config.receiver.host.clone();
        let port = config.receiver.port;
        async move {
            if let Err(e) = iris_hub::receiver::run_receiver(&host, port, channel, cancel).await {
                tracing::error!("interrupt receiver failed: {e}");
            }
        }
    });

    let rescan_handle = spawn_rescan(
        Arc::clone(&registry),
        None,
        Duration::from_secs(config.discovery.rescan_interval_secs),
        cancel.clone(),
    );

    // The display Pi is mandatory: without it the glasses are blind.
    let display_wait = Duration::from_secs(config.discovery.display_wait_secs);
    match registry.wait_for(DeviceType::Pi, display_wait).await {
        Ok(device) => tracing::info!("display found at {}", device.address()),
        Err(e) => {
            cancel.cancel();
            let _ = tokio::join!(receiver_handle, rescan_handle);
            anyhow::bail!("display is required but {e}");
        }
    }

    let iot = IoTClient::new(Arc::clone(&registry), Duration::from_secs(3))
        .context("building IoT client")?;
    let todos = TodoStore::open(&config.todo_store_path()).context("opening todo store")?;

    let translator: Box<dyn Translator> =
        match HttpTranslator::from_env(&config.translation.source_lang, &config.translation.target_lang) {
            Some(t) => Box::new(t),
            None => {
                tracing::info!("no translation API key, using the offline translator");
                Box::new(OfflineTranslator::new(&config.translation.target_lang))
            }
        };
    let weather: Box<dyn WeatherProvider> = match OpenWeather::from_env(&config.weather) {
        Some(w) => Box::new(w),
        None => {
            tracing::info!("no weather API key, using static weather");
            Box::new(StaticWeather)
        }
    };

    // The microphone/STT side pushes finished transcripts into this queue.
    // Holding the sender open keeps the loop listening even before any
    // audio frontend attaches.
    let (_transcript_tx, audio) = QueueAudioSource::new(16);

    let mut orchestrator = Orchestrator::new(
        &config,
        Arc::clone(&registry),
        interrupts,
        Box::new(ConsoleDisplay),
        Box::new(audio),
        iot,
        todos,
        translator,
        weather,
        cancel.clone(),
    );

    // Ctrl-C is the explicit shutdown signal.
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                cancel.cancel();
            }
        }
    });

    orchestrator.run().await;

    let (receiver_result, rescan_result) = tokio::join!(receiver_handle, rescan_handle);
    if let Err(e) = receiver_result {
        tracing::warn!("receiver task panicked: {e}");
    }
    if let Err(e) = rescan_result {
        tracing::warn!("rescan task panicked: {e}");
    }

    tracing::info!("iris-hub shut down cleanly");
    Ok(())
}
