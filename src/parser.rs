//! Voice command state machine.
//!
//! Holds the UI focus of the operator as one of thirteen flat states,
//! turns cleaned transcripts into state transitions and actions, and owns
//! the per-state idle-timeout policy. Parsing is pure routing: every state
//! has its own handler, and the only mutable state besides the current
//! screen is a scratch key-value map that is cleared on every transition.
//!
//! # Command routing
//!
//! | State | Recognized input |
//! |-------|------------------|
//! | Idle | "hey iris" anywhere in the transcript |
//! | MainMenu | "todo"/"1", "weather"/"translation"/"2", "connect"/"3", "back" |
//! | TodoMenu | "list"/"1", "add"/"2", "instructions"/"3" |
//! | TodoList | "up", "down", "cross", "uncross", "add", "back" |
//! | TodoAdd | free text capture; "confirm", "cancel" |
//! | Translation | "end" / "iris end"; everything else passes through |
//! | DeviceList | "up", "down", "connect", "connect <name>", digits 1-9, "back" |
//! | Connected* | device verbs ("on", "off", ...), "back" |

use crate::registry::DeviceType;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The fixed wake phrase. Survives prefix stripping so the idle matcher can
/// find it.
pub const WAKE_PHRASE: &str = "hey iris";

/// UI states. Flat, no hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Resting state: weather/time display.
    Idle,
    /// 1.Todo 2.Translation 3.Connect
    MainMenu,
    /// Todo options: 1.List 2.Add 3.Instructions
    TodoMenu,
    /// Scrollable todo list.
    TodoList,
    /// Dictating a new todo item.
    TodoAdd,
    /// Todo usage instructions.
    TodoInstructions,
    /// Live translation feed.
    Translation,
    /// Dynamic list of IoT devices.
    DeviceList,
    ConnectedLight,
    ConnectedFan,
    ConnectedMotion,
    ConnectedDistance,
    ConnectedGlasses,
}

impl State {
    /// Stable lowercase name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::MainMenu => "main_menu",
            State::TodoMenu => "todo_menu",
            State::TodoList => "todo_list",
            State::TodoAdd => "todo_add",
            State::TodoInstructions => "todo_instructions",
            State::Translation => "translation",
            State::DeviceList => "device_list",
            State::ConnectedLight => "connected_light",
            State::ConnectedFan => "connected_fan",
            State::ConnectedMotion => "connected_motion",
            State::ConnectedDistance => "connected_distance",
            State::ConnectedGlasses => "connected_glasses",
        }
    }

    /// Where this state goes when it idles out, or `None` for states that
    /// only exit on an explicit command.
    ///
    /// The match is exhaustive on purpose: a new state cannot compile
    /// without being classified, so nothing inherits a timeout policy by
    /// omission. Idle, the live-stream states (Translation, the Connected
    /// family), and the instruction screens never expire; the menu states
    /// fall back to Idle; an abandoned TodoAdd is an implicit cancel back
    /// to the list.
    #[must_use]
    pub fn timeout_target(self) -> Option<State> {
        match self {
            State::MainMenu | State::TodoList | State::DeviceList => Some(State::Idle),
            State::TodoAdd => Some(State::TodoList),
            State::Idle
            | State::TodoMenu
            | State::TodoInstructions
            | State::Translation
            | State::ConnectedLight
            | State::ConnectedFan
            | State::ConnectedMotion
            | State::ConnectedDistance
            | State::ConnectedGlasses => None,
        }
    }

    /// The connected-mode state for a device type. The Pi display has no
    /// connected mode, so it resolves back to the device list.
    #[must_use]
    pub fn connected_for(device_type: DeviceType) -> State {
        match device_type {
            DeviceType::Light => State::ConnectedLight,
            DeviceType::Fan => State::ConnectedFan,
            DeviceType::Motion => State::ConnectedMotion,
            DeviceType::Distance => State::ConnectedDistance,
            DeviceType::Glasses => State::ConnectedGlasses,
            DeviceType::Pi => State::DeviceList,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action the orchestrator should execute against a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Scroll the current list up.
    ScrollUp,
    /// Scroll the current list down.
    ScrollDown,
    /// Mark the highlighted todo done.
    MarkDone,
    /// Mark the highlighted todo not done.
    MarkUndone,
    /// Echo in-progress dictation on the display.
    CaptureTodoText { text: String },
    /// Commit a dictated todo item.
    AddTodo { text: String },
    /// Forward live speech to the translator.
    Translate { text: String },
    /// Connect to the highlighted device.
    ConnectCurrent,
    /// Connect to a device by spoken name.
    ConnectNamed { name: String },
    /// Connect by 1-based position in the displayed list (stored 0-based).
    ConnectNumbered { index: usize },
    LightOn,
    LightOff,
    FanOn,
    FanOff,
    FanLow,
    FanHigh,
    MotionOn,
    MotionOff,
    /// Push a message to the second glasses unit.
    SendMessage { message: String },
}

impl Action {
    /// Stable snake_case name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Action::ScrollUp => "scroll_up",
            Action::ScrollDown => "scroll_down",
            Action::MarkDone => "mark_done",
            Action::MarkUndone => "mark_undone",
            Action::CaptureTodoText { .. } => "capture_todo_text",
            Action::AddTodo { .. } => "add_todo",
            Action::Translate { .. } => "translate",
            Action::ConnectCurrent => "connect_current",
            Action::ConnectNamed { .. } => "connect_named",
            Action::ConnectNumbered { .. } => "connect_numbered",
            Action::LightOn => "light_on",
            Action::LightOff => "light_off",
            Action::FanOn => "fan_on",
            Action::FanOff => "fan_off",
            Action::FanLow => "fan_low",
            Action::FanHigh => "fan_high",
            Action::MotionOn => "motion_on",
            Action::MotionOff => "motion_off",
            Action::SendMessage { .. } => "send_message",
        }
    }
}

/// Result of parsing one transcript. Both fields may be present at once
/// (e.g. confirming a todo both commits the item and leaves the dictation
/// screen); both absent means the input was not recognized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// State to transition to, already applied by the parser.
    pub new_state: Option<State>,
    /// Action for the orchestrator to execute.
    pub action: Option<Action>,
}

impl ParseResult {
    fn state(state: State) -> Self {
        Self { new_state: Some(state), action: None }
    }

    fn action(action: Action) -> Self {
        Self { new_state: None, action: Some(action) }
    }

    /// Whether the transcript produced neither a transition nor an action.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_state.is_none() && self.action.is_none()
    }
}

/// Spoken device names accepted by "connect <name>".
#[must_use]
pub fn device_alias(name: &str) -> Option<DeviceType> {
    match name {
        "light" | "smart light" => Some(DeviceType::Light),
        "fan" | "smart fan" => Some(DeviceType::Fan),
        "motion" | "motion sensor" => Some(DeviceType::Motion),
        "distance" | "distance sensor" => Some(DeviceType::Distance),
        "glasses" | "glasses 2" | "glasses two" => Some(DeviceType::Glasses),
        _ => None,
    }
}

/// The voice command state machine. One instance per running session: it
/// represents the UI focus of the human operator, not any one device.
pub struct CommandParser {
    current_state: State,
    timeout: Duration,
    last_command: Instant,
    state_data: HashMap<String, String>,
}

impl CommandParser {
    /// Create a parser in the Idle state with the given menu timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        info!("command parser initialized in idle state");
        Self {
            current_state: State::Idle,
            timeout,
            last_command: Instant::now(),
            state_data: HashMap::new(),
        }
    }

    /// Current UI state.
    #[must_use]
    pub fn current_state(&self) -> State {
        self.current_state
    }

    /// Parse a transcript against the current state.
    ///
    /// The transcript arrives lowercased and trimmed from the audio layer.
    /// Any non-empty transcript refreshes the activity timestamp, even when
    /// nothing is recognized: speech means the operator is still present.
    /// A returned `new_state` has already been applied.
    pub fn parse(&mut self, transcript: &str) -> ParseResult {
        if transcript.is_empty() {
            return ParseResult::default();
        }

        let cleaned = strip_iris_prefix(transcript);
        self.last_command = Instant::now();
        debug!("parsing '{cleaned}' in state {}", self.current_state);

        let result = match self.current_state {
            State::Idle => Self::parse_idle(cleaned),
            State::MainMenu => Self::parse_main_menu(cleaned),
            State::TodoMenu => Self::parse_todo_menu(cleaned),
            State::TodoInstructions => Self::parse_todo_instructions(cleaned),
            State::TodoList => Self::parse_todo_list(cleaned),
            State::TodoAdd => self.parse_todo_add(cleaned),
            State::Translation => Self::parse_translation(cleaned),
            State::DeviceList => Self::parse_device_list(cleaned),
            State::ConnectedLight => Self::parse_connected_light(cleaned),
            State::ConnectedFan => Self::parse_connected_fan(cleaned),
            State::ConnectedMotion => Self::parse_connected_motion(cleaned),
            State::ConnectedDistance => Self::parse_connected_distance(cleaned),
            State::ConnectedGlasses => Self::parse_connected_glasses(cleaned),
        };

        if let Some(new_state) = result.new_state {
            self.transition_to(new_state);
        }

        result
    }

    /// Check whether the current state has idled out, applying the
    /// transition if so. Called every loop tick; because firing resets the
    /// activity timestamp, it returns a transition at most once per timeout
    /// period.
    pub fn check_timeout(&mut self) -> Option<State> {
        if self.last_command.elapsed() < self.timeout {
            return None;
        }
        let target = self.current_state.timeout_target()?;
        info!("state {} timed out, going to {target}", self.current_state);
        self.transition_to(target);
        Some(target)
    }

    /// Force a transition. Used by the orchestrator when an action resolves
    /// to a screen change (e.g. a successful device connect).
    pub fn transition_to(&mut self, new_state: State) {
        let old_state = self.current_state;
        self.current_state = new_state;
        self.last_command = Instant::now();
        if old_state != new_state {
            self.state_data.clear();
        }
        debug!("state transition: {old_state} -> {new_state}");
    }

    /// Store a scratch value scoped to the current state.
    pub fn set_state_data(&mut self, key: &str, value: &str) {
        self.state_data.insert(key.to_owned(), value.to_owned());
    }

    /// Read a scratch value scoped to the current state.
    #[must_use]
    pub fn state_data(&self, key: &str) -> Option<&str> {
        self.state_data.get(key).map(String::as_str)
    }

    // Per-state handlers. Pure functions of the cleaned transcript plus,
    // for TodoAdd, the scratch data.

    fn parse_idle(transcript: &str) -> ParseResult {
        if transcript.contains(WAKE_PHRASE) {
            return ParseResult::state(State::MainMenu);
        }
        ParseResult::default()
    }

    fn parse_main_menu(transcript: &str) -> ParseResult {
        match normalize_number_word(transcript) {
            "todo" | "1" => ParseResult::state(State::TodoMenu),
            "weather" | "translation" | "2" => ParseResult::state(State::Translation),
            "connect" | "3" => ParseResult::state(State::DeviceList),
            "back" => ParseResult::state(State::Idle),
            _ => ParseResult::default(),
        }
    }

    fn parse_todo_menu(transcript: &str) -> ParseResult {
        match normalize_number_word(transcript) {
            "list" | "1" => ParseResult::state(State::TodoList),
            "add" | "2" => ParseResult::state(State::TodoAdd),
            "instructions" | "3" => ParseResult::state(State::TodoInstructions),
            _ => ParseResult::default(),
        }
    }

    fn parse_todo_instructions(transcript: &str) -> ParseResult {
        if transcript == "back" {
            return ParseResult::state(State::TodoMenu);
        }
        ParseResult::default()
    }

    fn parse_todo_list(transcript: &str) -> ParseResult {
        match transcript {
            "up" => ParseResult::action(Action::ScrollUp),
            "down" => ParseResult::action(Action::ScrollDown),
            "cross" => ParseResult::action(Action::MarkDone),
            "uncross" => ParseResult::action(Action::MarkUndone),
            "add" => ParseResult::state(State::TodoAdd),
            "back" => ParseResult::state(State::TodoMenu),
            _ => ParseResult::default(),
        }
    }

    fn parse_todo_add(&mut self, transcript: &str) -> ParseResult {
        match transcript {
            "confirm" => {
                match self.state_data("captured_text") {
                    Some(text) if !text.is_empty() => ParseResult {
                        new_state: Some(State::TodoList),
                        action: Some(Action::AddTodo { text: text.to_owned() }),
                    },
                    // Nothing dictated yet; stay and keep listening.
                    _ => ParseResult::default(),
                }
            }
            "cancel" => ParseResult::state(State::TodoList),
            other => {
                self.set_state_data("captured_text", other);
                ParseResult::action(Action::CaptureTodoText { text: other.to_owned() })
            }
        }
    }

    fn parse_translation(transcript: &str) -> ParseResult {
        if transcript == "end" || transcript.contains("iris end") {
            return ParseResult::state(State::MainMenu);
        }
        // All other speech passes through as a live-translation stream.
        ParseResult::action(Action::Translate { text: transcript.to_owned() })
    }

    fn parse_device_list(transcript: &str) -> ParseResult {
        match transcript {
            "up" => return ParseResult::action(Action::ScrollUp),
            "down" => return ParseResult::action(Action::ScrollDown),
            "connect" => return ParseResult::action(Action::ConnectCurrent),
            "back" => return ParseResult::state(State::MainMenu),
            _ => {}
        }
        if let Some(name) = transcript.strip_prefix("connect ") {
            return ParseResult::action(Action::ConnectNamed { name: name.to_owned() });
        }
        let normalized = normalize_number_word(transcript);
        if normalized.len() == 1
            && let Some(digit) = normalized.chars().next().and_then(|c| c.to_digit(10))
            && digit >= 1
        {
            return ParseResult::action(Action::ConnectNumbered { index: digit as usize - 1 });
        }
        ParseResult::default()
    }

    fn parse_connected_light(transcript: &str) -> ParseResult {
        match transcript {
            "on" => ParseResult::action(Action::LightOn),
            "off" => ParseResult::action(Action::LightOff),
            "back" => ParseResult::state(State::DeviceList),
            _ => ParseResult::default(),
        }
    }

    fn parse_connected_fan(transcript: &str) -> ParseResult {
        match transcript {
            "on" => ParseResult::action(Action::FanOn),
            "off" => ParseResult::action(Action::FanOff),
            "low" => ParseResult::action(Action::FanLow),
            "high" => ParseResult::action(Action::FanHigh),
            "back" => ParseResult::state(State::DeviceList),
            _ => ParseResult::default(),
        }
    }

    fn parse_connected_motion(transcript: &str) -> ParseResult {
        match transcript {
            "on" => ParseResult::action(Action::MotionOn),
            "off" => ParseResult::action(Action::MotionOff),
            "back" => ParseResult::state(State::DeviceList),
            _ => ParseResult::default(),
        }
    }

    fn parse_connected_distance(transcript: &str) -> ParseResult {
        // Passive live stream; only an explicit exit is recognized.
        if transcript == "back" {
            return ParseResult::state(State::DeviceList);
        }
        ParseResult::default()
    }

    fn parse_connected_glasses(transcript: &str) -> ParseResult {
        if let Some(message) = transcript.strip_prefix("send ") {
            return ParseResult::action(Action::SendMessage { message: message.to_owned() });
        }
        if transcript == "back" {
            return ParseResult::state(State::DeviceList);
        }
        ParseResult::default()
    }
}

/// Strip a leading "iris " token while preserving the wake phrase intact.
fn strip_iris_prefix(transcript: &str) -> &str {
    if transcript.starts_with(WAKE_PHRASE) {
        return transcript;
    }
    if let Some(rest) = transcript.strip_prefix("iris ") {
        return rest.trim_start();
    }
    transcript
}

/// Map spoken number words to digits for numeric menu selection.
fn normalize_number_word(transcript: &str) -> &str {
    match transcript {
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        other => other,
    }
}
