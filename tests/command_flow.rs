//! End-to-end command flow tests: scripted transcripts through the full
//! orchestrator loop, observed through a recording display.

use iris_hub::audio::QueueAudioSource;
use iris_hub::config::HubConfig;
use iris_hub::display::RecordingDisplay;
use iris_hub::hub::Orchestrator;
use iris_hub::interrupt::{Interrupt, InterruptChannel, InterruptKind};
use iris_hub::iot::IoTClient;
use iris_hub::registry::{DeviceRegistry, DeviceType};
use iris_hub::todo::TodoStore;
use iris_hub::translate::OfflineTranslator;
use iris_hub::weather::StaticWeather;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestHub {
    tx: mpsc::Sender<String>,
    display: RecordingDisplay,
    interrupts: InterruptChannel,
    registry: Arc<DeviceRegistry>,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestHub {
    fn start(timeout_seconds: f64) -> Self {
        let mut config = HubConfig::default();
        config.voice.timeout_seconds = timeout_seconds;
        config.voice.listen_timeout_ms = 20;
        config.voice.unrecognized_flash_ms = 10;
        config.receiver.motion_overlay_secs = 0;

        let dir = tempfile::tempdir().expect("tempdir");
        let registry = Arc::new(DeviceRegistry::new(Duration::from_secs(120)));
        let interrupts = InterruptChannel::new(config.receiver.queue_capacity);
        let display = RecordingDisplay::default();
        let (tx, audio) = QueueAudioSource::new(32);
        let cancel = CancellationToken::new();

        let iot = IoTClient::new(Arc::clone(&registry), Duration::from_millis(300))
            .expect("iot client");
        let todos = TodoStore::open(&dir.path().join("todos.json")).expect("todo store");

        let mut orchestrator = Orchestrator::new(
            &config,
            Arc::clone(&registry),
            interrupts.clone(),
            Box::new(display.clone()),
            Box::new(audio),
            iot,
            todos,
            Box::new(OfflineTranslator::new("fr")),
            Box::new(StaticWeather),
            cancel.clone(),
        );
        let handle = tokio::spawn(async move { orchestrator.run().await });

        Self {
            tx,
            display,
            interrupts,
            registry,
            cancel,
            handle,
            _dir: dir,
        }
    }

    async fn say(&self, transcript: &str) {
        self.tx.send(transcript.to_owned()).await.expect("send transcript");
    }

    /// Poll until some rendered frame contains `needle`.
    async fn wait_for(&self, needle: &str) {
        for _ in 0..200 {
            if self.display.saw(needle) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "never saw '{needle}' in frames: {:?}",
            self.display.frames()
        );
    }

    /// Poll until the most recent frame contains `needle`.
    async fn wait_for_last(&self, needle: &str) {
        for _ in 0..200 {
            if self
                .display
                .last()
                .is_some_and(|frame| frame.iter().any(|line| line.contains(needle)))
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "last frame never contained '{needle}': {:?}",
            self.display.last()
        );
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.handle.await.expect("orchestrator task");
        assert!(self.display.clears() > 0, "teardown must clear the display");
    }
}

#[tokio::test]
async fn wake_phrase_brings_up_the_main_menu() {
    let hub = TestHub::start(600.0);
    hub.wait_for("Say 'hey iris'").await;
    hub.say("hey iris").await;
    hub.wait_for("Main Menu").await;
    hub.stop().await;
}

#[tokio::test]
async fn unrecognized_speech_flashes_and_restores() {
    let hub = TestHub::start(600.0);
    hub.say("hey iris").await;
    hub.wait_for("Main Menu").await;
    hub.say("flibbertigibbet").await;
    hub.wait_for("Not recognized").await;
    hub.wait_for_last("Main Menu").await;
    hub.stop().await;
}

#[tokio::test]
async fn dictated_todo_lands_in_the_list() {
    let hub = TestHub::start(600.0);
    hub.say("hey iris").await;
    hub.say("todo").await;
    hub.wait_for("1. List").await;
    hub.say("add").await;
    hub.wait_for("New todo:").await;
    hub.say("buy milk").await;
    hub.wait_for("buy milk").await;
    hub.say("confirm").await;
    hub.wait_for_last("Todo List (1)").await;
    assert!(hub.display.saw(">[ ] buy milk"));
    hub.stop().await;
}

#[tokio::test]
async fn translation_streams_speech_through() {
    let hub = TestHub::start(600.0);
    hub.say("hey iris").await;
    hub.say("translation").await;
    hub.wait_for("listening...").await;
    hub.say("hello my friend").await;
    hub.wait_for("[FR] bonjour").await;
    hub.say("end").await;
    hub.wait_for_last("Main Menu").await;
    hub.stop().await;
}

#[tokio::test]
async fn connect_and_drive_the_light() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "off"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/on"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "on"})))
        .mount(&server)
        .await;

    let hub = TestHub::start(600.0);
    let addr = server.address();
    hub.registry
        .record_sighting(DeviceType::Light, &addr.ip().to_string(), addr.port(), "");

    hub.say("hey iris").await;
    hub.say("connect").await;
    hub.wait_for("1. Lights On").await;
    hub.say("connect light").await;
    hub.wait_for("Status: off").await;
    hub.say("on").await;
    hub.wait_for("Status: on").await;
    hub.say("back").await;
    hub.wait_for_last("Devices").await;
    hub.stop().await;
}

#[tokio::test]
async fn numbered_connect_uses_displayed_order() {
    let hub = TestHub::start(600.0);
    hub.registry.record_sighting(DeviceType::Light, "127.0.0.1", 9, "");
    hub.registry.record_sighting(DeviceType::Fan, "127.0.0.1", 9, "");

    hub.say("hey iris").await;
    hub.say("connect").await;
    hub.wait_for("2. Smart Fan").await;
    // Position 2 in the displayed list is the fan.
    hub.say("2").await;
    hub.wait_for("Smart Fan").await;
    hub.wait_for_last("on off low high back").await;
    hub.stop().await;
}

#[tokio::test]
async fn connecting_to_an_offline_device_shows_the_error_screen() {
    let hub = TestHub::start(600.0);
    hub.registry.record_sighting(DeviceType::Light, "192.168.1.40", 80, "");
    hub.registry.mark_offline(DeviceType::Light);

    hub.say("hey iris").await;
    hub.say("connect").await;
    hub.wait_for("1. Lights Off").await;
    hub.say("connect light").await;
    hub.wait_for("Connection failed").await;
    hub.stop().await;
}

#[tokio::test]
async fn motion_interrupt_overlays_and_restores() {
    let hub = TestHub::start(600.0);
    hub.say("hey iris").await;
    hub.wait_for("Main Menu").await;

    hub.interrupts.push(Interrupt::new(
        InterruptKind::Motion,
        HashMap::new(),
        None,
    ));
    hub.wait_for("!! Motion detected").await;
    hub.wait_for_last("Main Menu").await;
    hub.stop().await;
}

#[tokio::test]
async fn device_offline_interrupt_updates_the_registry() {
    let hub = TestHub::start(600.0);
    hub.registry.record_sighting(DeviceType::Light, "192.168.1.40", 80, "");

    let mut payload = HashMap::new();
    payload.insert("type".to_owned(), "light".to_owned());
    hub.interrupts.push(Interrupt::new(
        InterruptKind::DeviceOffline,
        payload,
        None,
    ));

    for _ in 0..200 {
        if !hub.registry.is_online(DeviceType::Light) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!hub.registry.is_online(DeviceType::Light));
    hub.stop().await;
}

#[tokio::test]
async fn menu_times_out_back_to_idle() {
    let hub = TestHub::start(0.1);
    hub.say("hey iris").await;
    hub.wait_for("Main Menu").await;
    // No further speech: the menu must fall back to the idle screen.
    hub.wait_for_last("Say 'hey iris'").await;
    hub.stop().await;
}
