//! The orchestrator: the hub's single cooperative main loop.
//!
//! One iteration: drain an interrupt if one is pending (interrupts pre-empt
//! everything), check the idle timeout, then listen briefly for a
//! transcript and run it through the state machine. Parsing and rendering
//! are strictly sequential here: the display has exactly one writer by
//! construction, because no other component is ever handed the display.
//!
//! Every collaborator failure is isolated to its own iteration: device
//! errors become the connection-error screen, unrecognized speech becomes a
//! transient overlay, unknown payloads are logged and ignored. The loop
//! only exits on cancellation.

use crate::audio::AudioSource;
use crate::config::HubConfig;
use crate::display::Display;
use crate::error::HubError;
use crate::interrupt::{Interrupt, InterruptChannel, InterruptKind};
use crate::iot::IoTClient;
use crate::parser::{Action, CommandParser, ParseResult, State, device_alias};
use crate::registry::{DeviceRegistry, DeviceType, DiscoveredDevice};
use crate::screens;
use crate::todo::TodoStore;
use crate::translate::Translator;
use crate::weather::WeatherProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Items shown at once in the todo window (display rows minus the header).
const TODO_WINDOW: usize = 3;

/// The hub's main loop, wired to all external collaborators.
///
/// Explicitly constructed and explicitly passed everything it needs. The
/// registry handle it shares with the rescan task and the receiver is the
/// only cross-task state.
pub struct Orchestrator {
    parser: CommandParser,
    registry: Arc<DeviceRegistry>,
    interrupts: InterruptChannel,
    display: Box<dyn Display>,
    audio: Box<dyn AudioSource>,
    iot: IoTClient,
    todos: TodoStore,
    translator: Box<dyn Translator>,
    weather: Box<dyn WeatherProvider>,
    cancel: CancellationToken,
    listen_timeout: Duration,
    flash_duration: Duration,
    overlay_duration: Duration,
    /// Cursor into the device list screen.
    device_cursor: usize,
    /// Snapshot of the device list as last rendered; numbered connects
    /// resolve against what the operator was actually shown.
    devices_shown: Vec<DiscoveredDevice>,
    /// Last original/translated pair for the translation screen.
    last_translation: Option<(String, String)>,
}

#[allow(clippy::too_many_arguments)]
impl Orchestrator {
    /// Wire up the loop. `cancel` is shared with the rescan task and the
    /// receiver so one signal tears the whole hub down.
    pub fn new(
        config: &HubConfig,
        registry: Arc<DeviceRegistry>,
        interrupts: InterruptChannel,
        display: Box<dyn Display>,
        audio: Box<dyn AudioSource>,
        iot: IoTClient,
        todos: TodoStore,
        translator: Box<dyn Translator>,
        weather: Box<dyn WeatherProvider>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            parser: CommandParser::new(Duration::from_secs_f64(config.voice.timeout_seconds)),
            registry,
            interrupts,
            display,
            audio,
            iot,
            todos,
            translator,
            weather,
            cancel,
            listen_timeout: Duration::from_millis(config.voice.listen_timeout_ms),
            flash_duration: Duration::from_millis(config.voice.unrecognized_flash_ms),
            overlay_duration: Duration::from_secs(config.receiver.motion_overlay_secs),
            device_cursor: 0,
            devices_shown: Vec::new(),
            last_translation: None,
        }
    }

    /// Run until cancelled, then perform the fixed teardown.
    pub async fn run(&mut self) {
        info!("hub main loop started");
        self.render_current().await;
        let cancel = self.cancel.clone();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Interrupts first: they pre-empt command processing, and all
            // pending ones are handled before the next transcript.
            if let Some(interrupt) = self.interrupts.poll() {
                self.handle_interrupt(interrupt).await;
                continue;
            }

            if self.parser.check_timeout().is_some() {
                self.render_current().await;
            }

            // The loop's only suspension point, bounded so interrupts and
            // timeouts stay responsive.
            let transcript = tokio::select! {
                () = cancel.cancelled() => break,
                t = self.audio.listen(self.listen_timeout) => t,
            };

            if let Some(transcript) = transcript {
                self.handle_transcript(&transcript).await;
            }
        }

        self.teardown().await;
    }

    async fn handle_transcript(&mut self, transcript: &str) {
        let result = self.parser.parse(transcript);
        match result {
            ParseResult { new_state: None, action: None } => {
                debug!("not recognized: '{transcript}'");
                self.flash(screens::not_recognized()).await;
            }
            ParseResult { new_state, action } => {
                if let Some(action) = action {
                    self.execute_action(action).await;
                }
                if new_state.is_some() {
                    self.render_current().await;
                }
            }
        }
    }

    async fn execute_action(&mut self, action: Action) {
        debug!("executing action {}", action.name());
        match action {
            Action::ScrollUp | Action::ScrollDown => {
                let up = action == Action::ScrollUp;
                self.scroll(up).await;
            }
            Action::MarkDone => {
                if let Err(e) = self.todos.cross() {
                    warn!("cannot mark todo done: {e}");
                }
                self.render_current().await;
            }
            Action::MarkUndone => {
                if let Err(e) = self.todos.uncross() {
                    warn!("cannot unmark todo: {e}");
                }
                self.render_current().await;
            }
            Action::CaptureTodoText { text } => {
                self.show(screens::todo_add(Some(&text))).await;
            }
            Action::AddTodo { text } => {
                if let Err(e) = self.todos.add(&text) {
                    warn!("cannot add todo: {e}");
                }
                // The paired transition to TodoList renders the list.
            }
            Action::Translate { text } => {
                let translated = self.translator.translate(&text).await.unwrap_or_default();
                self.last_translation = Some((text, translated));
                self.render_current().await;
            }
            Action::ConnectCurrent => {
                self.connect_numbered(self.device_cursor).await;
            }
            Action::ConnectNumbered { index } => {
                self.connect_numbered(index).await;
            }
            Action::ConnectNamed { name } => match device_alias(&name) {
                Some(device_type) => self.connect_to(device_type).await,
                None => {
                    debug!("unknown device name '{name}'");
                    self.flash(screens::not_recognized()).await;
                }
            },
            Action::LightOn => self.device_command(DeviceType::Light, "on").await,
            Action::LightOff => self.device_command(DeviceType::Light, "off").await,
            Action::FanOn => self.device_command(DeviceType::Fan, "on").await,
            Action::FanOff => self.device_command(DeviceType::Fan, "off").await,
            Action::FanLow => self.device_command(DeviceType::Fan, "low").await,
            Action::FanHigh => self.device_command(DeviceType::Fan, "high").await,
            Action::MotionOn => self.device_command(DeviceType::Motion, "on").await,
            Action::MotionOff => self.device_command(DeviceType::Motion, "off").await,
            Action::SendMessage { message } => {
                let frame = screens::wrap_text(&message);
                if self.iot.send_to_glasses(&frame).await {
                    self.show(screens::connected_glasses()).await;
                } else {
                    self.show(screens::connection_error(DeviceType::Glasses.display_name()))
                        .await;
                }
            }
        }
    }

    /// Scroll whichever list the operator is looking at.
    async fn scroll(&mut self, up: bool) {
        match self.parser.current_state() {
            State::TodoList => {
                if up {
                    self.todos.scroll_up();
                } else {
                    self.todos.scroll_down();
                }
            }
            State::DeviceList => {
                if up {
                    self.device_cursor = self.device_cursor.saturating_sub(1);
                } else if self.device_cursor + 1 < self.devices_shown.len() {
                    self.device_cursor += 1;
                }
            }
            state => debug!("scroll ignored in state {state}"),
        }
        self.render_current().await;
    }

    /// Connect by position in the list as last shown to the operator.
    async fn connect_numbered(&mut self, index: usize) {
        let target = self.devices_shown.get(index).map(|d| d.device_type);
        match target {
            Some(device_type) => self.connect_to(device_type).await,
            None => {
                debug!("no device at position {}", index + 1);
                self.flash(screens::not_recognized()).await;
            }
        }
    }

    /// Connect to a device: verify it is online, move the state machine to
    /// its connected screen, and render the live status.
    async fn connect_to(&mut self, device_type: DeviceType) {
        let online = self.registry.get(device_type).is_some_and(|d| d.online);
        if !online {
            info!("connect refused, {device_type} is offline");
            self.show(screens::connection_error(device_type.display_name())).await;
            return;
        }
        let target = State::connected_for(device_type);
        if target == State::DeviceList {
            // The Pi has no connected mode.
            self.render_current().await;
            return;
        }
        self.parser.transition_to(target);
        self.render_current().await;
    }

    /// Send a verb ("on", "off", "low", "high") to a connected device and
    /// re-render its screen; failures fall back to the connection-error
    /// screen without leaving the state.
    async fn device_command(&mut self, device_type: DeviceType, command: &str) {
        match self.iot.send_command(device_type, command).await {
            Ok(_) => self.render_current().await,
            Err(HubError::DeviceOffline(reason)) => {
                warn!("{reason}");
                self.show(screens::connection_error(device_type.display_name())).await;
            }
            Err(e) => {
                warn!("command '{command}' to {device_type} failed: {e}");
                self.render_current().await;
            }
        }
    }

    async fn handle_interrupt(&mut self, interrupt: Interrupt) {
        info!("handling {} interrupt", interrupt.kind);
        match interrupt.kind {
            InterruptKind::Motion => {
                self.show(screens::motion_interrupt()).await;
                tokio::time::sleep(self.overlay_duration).await;
                self.render_current().await;
            }
            InterruptKind::DeviceOffline => {
                if let Some(device_type) = interrupt
                    .payload
                    .get("type")
                    .and_then(|name| DeviceType::from_name(name))
                {
                    self.registry.mark_offline(device_type);
                } else {
                    warn!("device_offline interrupt without a known type");
                }
                self.rerender_if_device_list().await;
            }
            InterruptKind::DeviceOnline => {
                self.handle_device_online(&interrupt);
                self.rerender_if_device_list().await;
            }
            InterruptKind::SystemError => {
                warn!(
                    "system error reported from {:?}: {:?}",
                    interrupt.source, interrupt.payload
                );
            }
        }
    }

    /// A device_online interrupt can carry the sender's address; without a
    /// usable one there is nothing to record and the sighting is left to
    /// discovery.
    fn handle_device_online(&mut self, interrupt: &Interrupt) {
        let Some(device_type) = interrupt
            .payload
            .get("type")
            .and_then(|name| DeviceType::from_name(name))
        else {
            warn!("device_online interrupt without a known type");
            return;
        };
        let host = interrupt
            .payload
            .get("host")
            .cloned()
            .or_else(|| interrupt.source.map(|addr| addr.ip().to_string()));
        match host {
            Some(host) if crate::registry::is_valid_ipv4(&host) => {
                let port = interrupt
                    .payload
                    .get("port")
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(80);
                self.registry.record_sighting(device_type, &host, port, "");
            }
            _ => debug!("device_online for {device_type} without a usable address"),
        }
    }

    async fn rerender_if_device_list(&mut self) {
        if self.parser.current_state() == State::DeviceList {
            self.render_current().await;
        }
    }

    /// Render the screen for the current state.
    async fn render_current(&mut self) {
        let frame = match self.parser.current_state() {
            State::Idle => match self.weather.current().await {
                Some(report) => screens::idle(&report),
                None => screens::idle_plain(),
            },
            State::MainMenu => screens::main_menu(),
            State::TodoMenu => screens::todo_menu(),
            State::TodoInstructions => screens::todo_instructions(),
            State::TodoList => {
                screens::todo_list(&self.todos.get_visible(TODO_WINDOW), self.todos.len())
            }
            State::TodoAdd => screens::todo_add(self.parser.state_data("captured_text")),
            State::Translation => match &self.last_translation {
                Some((original, translated)) => screens::translation(original, translated),
                None => screens::translation_waiting(),
            },
            State::DeviceList => {
                self.devices_shown = self.registry.display_order();
                if self.device_cursor >= self.devices_shown.len() {
                    self.device_cursor = self.devices_shown.len().saturating_sub(1);
                }
                screens::device_list(&self.devices_shown, self.device_cursor)
            }
            State::ConnectedLight => {
                let is_on = self
                    .iot
                    .get_device_status(DeviceType::Light)
                    .await
                    .ok()
                    .and_then(|s| s.get("status").and_then(serde_json::Value::as_str).map(|v| v == "on"))
                    .unwrap_or(false);
                screens::connected_light(is_on)
            }
            State::ConnectedFan => {
                let status = self.iot.get_device_status(DeviceType::Fan).await.ok();
                let field = |key: &str| {
                    status
                        .as_ref()
                        .and_then(|s| s.get(key))
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("off")
                        .to_owned()
                };
                screens::connected_fan(&field("status"), &field("speed"))
            }
            State::ConnectedMotion => {
                let enabled = self
                    .iot
                    .get_device_status(DeviceType::Motion)
                    .await
                    .ok()
                    .and_then(|s| {
                        s.get("alerts").and_then(serde_json::Value::as_str).map(|v| v == "enabled")
                    })
                    .unwrap_or(false);
                screens::connected_motion(enabled)
            }
            State::ConnectedDistance => {
                screens::connected_distance(self.iot.get_distance_reading().await)
            }
            State::ConnectedGlasses => screens::connected_glasses(),
        };
        self.show(frame).await;
    }

    /// Show a frame briefly, then restore the current screen.
    async fn flash(&mut self, frame: screens::Frame) {
        self.show(frame).await;
        tokio::time::sleep(self.flash_duration).await;
        self.render_current().await;
    }

    async fn show(&mut self, frame: screens::Frame) {
        if !self.display.show_lines(&frame).await {
            warn!("display rejected frame");
        }
    }

    /// Fixed teardown: blank the display and drain the interrupt queue.
    /// The rescan task and receiver stop on the shared token; the binary
    /// joins them.
    async fn teardown(&mut self) {
        self.display.clear().await;
        let dropped = self.interrupts.drain();
        if dropped > 0 {
            info!("dropped {dropped} pending interrupts at shutdown");
        }
        info!("hub main loop stopped");
    }
}
