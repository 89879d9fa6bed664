//! Screen frame builders for the 4-line glasses display.
//!
//! Every screen in the hub is a pure function producing a [`Frame`]: exactly
//! four lines of at most 21 characters, matching the OLED the Pi drives.
//! Rendering backends only ever see finished frames, so all layout decisions
//! live (and are tested) here.

use crate::registry::DiscoveredDevice;
use crate::todo::VisibleTodo;
use crate::weather::WeatherReport;

/// Lines per frame. Must match the Pi display server.
pub const MAX_LINES: usize = 4;
/// Characters per line. Must match the Pi display server.
pub const CHARS_PER_LINE: usize = 21;

/// One rendered screen: four lines, each within the character limit.
pub type Frame = [String; MAX_LINES];

/// Truncate a line to the display width, marking the cut with an ellipsis.
#[must_use]
pub fn fit_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= CHARS_PER_LINE {
        return line.to_owned();
    }
    let mut out: String = chars[..CHARS_PER_LINE - 1].iter().collect();
    out.push('…');
    out
}

fn frame(lines: [&str; MAX_LINES]) -> Frame {
    [
        fit_line(lines[0]),
        fit_line(lines[1]),
        fit_line(lines[2]),
        fit_line(lines[3]),
    ]
}

/// Word-wrap free text into a frame, dropping anything past four lines.
#[must_use]
pub fn wrap_text(text: &str) -> Frame {
    let mut lines: Vec<String> = Vec::with_capacity(MAX_LINES);
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if candidate_len <= CHARS_PER_LINE {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_owned();
            if lines.len() >= MAX_LINES {
                break;
            }
        }
    }
    if !current.is_empty() && lines.len() < MAX_LINES {
        lines.push(current);
    }
    lines.resize(MAX_LINES, String::new());
    [
        fit_line(&lines[0]),
        fit_line(&lines[1]),
        fit_line(&lines[2]),
        fit_line(&lines[3]),
    ]
}

/// Resting screen: clock, weather, wake phrase hint.
#[must_use]
pub fn idle(weather: &WeatherReport) -> Frame {
    let conditions = format!("{}F {}", weather.temp_f, weather.condition);
    frame([&weather.clock, &conditions, "", "Say 'hey iris'"])
}

/// Resting screen when no weather is available.
#[must_use]
pub fn idle_plain() -> Frame {
    frame(["Iris Smart Glasses", "", "Ready for commands", "Say 'hey iris'"])
}

#[must_use]
pub fn main_menu() -> Frame {
    frame(["Main Menu", "1. Todo", "2. Translation", "3. Connect"])
}

#[must_use]
pub fn todo_menu() -> Frame {
    frame(["Todo", "1. List", "2. Add", "3. Instructions"])
}

#[must_use]
pub fn todo_instructions() -> Frame {
    frame(["up/down: scroll", "cross/uncross: mark", "add: dictate new", "back: exit"])
}

/// Scrollable todo list: a header plus the visible window around the cursor.
#[must_use]
pub fn todo_list(visible: &[VisibleTodo], total: usize) -> Frame {
    if visible.is_empty() {
        return frame(["Todo List (empty)", "", "say 'add' to start", ""]);
    }
    let header = format!("Todo List ({total})");
    let mut lines = [header, String::new(), String::new(), String::new()];
    for (slot, item) in visible.iter().take(MAX_LINES - 1).enumerate() {
        let cursor = if item.is_current { ">" } else { " " };
        let mark = if item.done { "x" } else { " " };
        lines[slot + 1] = fit_line(&format!("{cursor}[{mark}] {}", item.text));
    }
    [
        fit_line(&lines[0]),
        lines[1].clone(),
        lines[2].clone(),
        lines[3].clone(),
    ]
}

/// Dictation screen, echoing the captured text as it changes.
#[must_use]
pub fn todo_add(captured: Option<&str>) -> Frame {
    let echo = captured.unwrap_or("(listening...)");
    frame(["New todo:", echo, "", "confirm / cancel"])
}

/// Live translation feed: latest utterance above its translation.
#[must_use]
pub fn translation(original: &str, translated: &str) -> Frame {
    frame([original, "", "----------------", translated])
}

/// Translation screen before any speech has arrived.
#[must_use]
pub fn translation_waiting() -> Frame {
    frame(["Translation", "listening...", "", "say 'end' to exit"])
}

/// Device list window: up to three devices around the cursor.
#[must_use]
pub fn device_list(devices: &[DiscoveredDevice], cursor: usize) -> Frame {
    if devices.is_empty() {
        return frame(["Devices", "none found", "", "back: exit"]);
    }
    let window = MAX_LINES - 1;
    let start = cursor.saturating_sub(window - 1).min(devices.len().saturating_sub(window));
    let mut lines = ["Devices".to_owned(), String::new(), String::new(), String::new()];
    for (slot, (i, device)) in devices.iter().enumerate().skip(start).take(window).enumerate() {
        let marker = if i == cursor { ">" } else { " " };
        let status = if device.online { "On" } else { "Off" };
        lines[slot + 1] = fit_line(&format!("{marker}{}. {} {status}", i + 1, device.name));
    }
    [
        fit_line(&lines[0]),
        lines[1].clone(),
        lines[2].clone(),
        lines[3].clone(),
    ]
}

#[must_use]
pub fn connected_light(is_on: bool) -> Frame {
    let status = if is_on { "Status: on" } else { "Status: off" };
    frame(["Lights", status, "", "on / off / back"])
}

#[must_use]
pub fn connected_fan(status: &str, speed: &str) -> Frame {
    let status_line = format!("Status: {status}");
    let speed_line = format!("Speed: {speed}");
    frame(["Smart Fan", &status_line, &speed_line, "on off low high back"])
}

#[must_use]
pub fn connected_motion(alerts_enabled: bool) -> Frame {
    let status = if alerts_enabled { "Alerts: enabled" } else { "Alerts: disabled" };
    frame(["Motion Sensor", status, "", "on / off / back"])
}

#[must_use]
pub fn connected_distance(reading_cm: Option<i64>) -> Frame {
    let reading = match reading_cm {
        Some(cm) => format!("{cm} cm"),
        None => "no reading".to_owned(),
    };
    frame(["Distance Sensor", &reading, "", "back: exit"])
}

#[must_use]
pub fn connected_glasses() -> Frame {
    frame(["Glasses 2", "say: send <message>", "", "back: exit"])
}

/// Timed overlay for a motion alert.
#[must_use]
pub fn motion_interrupt() -> Frame {
    frame(["", "!! Motion detected", "", ""])
}

#[must_use]
pub fn connection_error(device_name: &str) -> Frame {
    frame(["Connection failed", device_name, "device is offline", "back: exit"])
}

/// Transient overlay for unrecognized speech.
#[must_use]
pub fn not_recognized() -> Frame {
    frame(["", "Not recognized", "", ""])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::registry::{DeviceRegistry, DeviceType};
    use std::time::Duration;

    fn assert_fits(frame: &Frame) {
        for line in frame {
            assert!(
                line.chars().count() <= CHARS_PER_LINE,
                "line too wide: '{line}'"
            );
        }
    }

    #[test]
    fn every_static_screen_fits() {
        let report = WeatherReport {
            temp_f: 72,
            condition: "Sunny".to_owned(),
            clock: "3:42 PM".to_owned(),
        };
        for frame in [
            idle(&report),
            idle_plain(),
            main_menu(),
            todo_menu(),
            todo_instructions(),
            todo_add(Some("a very long dictated todo item that keeps going")),
            translation("hello there my good friend", "bonjour mon bon ami ici present"),
            translation_waiting(),
            connected_light(true),
            connected_fan("on", "high"),
            connected_motion(false),
            connected_distance(Some(124)),
            connected_distance(None),
            connected_glasses(),
            motion_interrupt(),
            connection_error("Distance Sensor"),
            not_recognized(),
            wrap_text("one two three four five six seven eight nine ten eleven twelve"),
        ] {
            assert_fits(&frame);
        }
    }

    #[test]
    fn fit_line_truncates_with_ellipsis() {
        let long = "abcdefghijklmnopqrstuvwxyz";
        let fitted = fit_line(long);
        assert_eq!(fitted.chars().count(), CHARS_PER_LINE);
        assert!(fitted.ends_with('…'));
        assert_eq!(fit_line("short"), "short");
    }

    #[test]
    fn wrap_text_breaks_on_words() {
        let frame = wrap_text("turn on the kitchen light please");
        assert_eq!(frame[0], "turn on the kitchen");
        assert_eq!(frame[1], "light please");
        assert_eq!(frame[2], "");
    }

    #[test]
    fn todo_list_marks_cursor_and_done() {
        let visible = vec![
            VisibleTodo { text: "buy milk".to_owned(), done: true, is_current: false },
            VisibleTodo { text: "call mom".to_owned(), done: false, is_current: true },
        ];
        let frame = todo_list(&visible, 5);
        assert_eq!(frame[0], "Todo List (5)");
        assert_eq!(frame[1], " [x] buy milk");
        assert_eq!(frame[2], ">[ ] call mom");
        assert_fits(&frame);
    }

    #[test]
    fn empty_todo_list_prompts_add() {
        let frame = todo_list(&[], 0);
        assert!(frame[0].contains("empty"));
    }

    #[test]
    fn device_list_windows_around_cursor() {
        let registry = DeviceRegistry::new(Duration::from_secs(120));
        registry.record_sighting(DeviceType::Light, "192.168.1.40", 80, "");
        registry.record_sighting(DeviceType::Fan, "192.168.1.50", 80, "");
        registry.record_sighting(DeviceType::Distance, "192.168.1.70", 80, "");
        registry.record_sighting(DeviceType::Motion, "192.168.1.60", 80, "");
        let devices = registry.display_order();

        let frame = device_list(&devices, 3);
        // Cursor on the fourth device: window shows devices 2-4.
        assert!(frame[1].starts_with(" 2."));
        assert!(frame[3].starts_with(">4."));
        assert_fits(&frame);
    }

    #[test]
    fn device_list_empty() {
        let frame = device_list(&[], 0);
        assert_eq!(frame[1], "none found");
    }
}
