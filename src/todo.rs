//! Todo list with at-rest JSON persistence.
//!
//! Voice-dictated items land here from the `add_todo` action. The store
//! keeps a cursor for voice navigation ("up"/"down"/"cross") and persists
//! items plus cursor position to a single JSON file after every mutation.
//! A failed save rolls the in-memory change back so the file and memory
//! never drift.

use crate::error::{HubError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A single todo item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    /// The dictated text.
    pub text: String,
    /// Whether the item has been crossed off.
    #[serde(default)]
    pub done: bool,
    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created_at: String,
}

/// A todo item as it appears in the display window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleTodo {
    pub text: String,
    pub done: bool,
    /// Whether the cursor is on this item.
    pub is_current: bool,
}

/// Aggregate counts for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodoStats {
    pub total: usize,
    pub done: usize,
    pub pending: usize,
}

#[derive(Serialize, Deserialize, Default)]
struct StoreFile {
    #[serde(default)]
    todos: Vec<TodoItem>,
    #[serde(default)]
    cursor_index: usize,
    #[serde(default)]
    saved_at: String,
}

/// Persistent todo list with cursor navigation.
pub struct TodoStore {
    path: PathBuf,
    todos: Vec<TodoItem>,
    cursor: usize,
}

impl TodoStore {
    /// Open (or initialize) the store at `path`. A missing file is an empty
    /// list, not an error; an unparseable file is.
    pub fn open(path: &Path) -> Result<Self> {
        let (todos, cursor) = match std::fs::read_to_string(path) {
            Ok(raw) => {
                let file: StoreFile = serde_json::from_str(&raw)
                    .map_err(|e| HubError::Store(format!("cannot parse {}: {e}", path.display())))?;
                let cursor = file.cursor_index.min(file.todos.len().saturating_sub(1));
                (file.todos, cursor)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), 0),
            Err(e) => return Err(HubError::Io(e)),
        };

        info!("todo store opened with {} items", todos.len());
        Ok(Self { path: path.to_owned(), todos, cursor })
    }

    /// Add an item and move the cursor onto it. Empty text is ignored.
    pub fn add(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            warn!("ignoring empty todo item");
            return Ok(());
        }
        self.todos.push(TodoItem {
            text: text.to_owned(),
            done: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        self.cursor = self.todos.len() - 1;
        if let Err(e) = self.save() {
            self.todos.pop();
            self.cursor = self.cursor.min(self.todos.len().saturating_sub(1));
            return Err(e);
        }
        info!("added todo: '{text}'");
        Ok(())
    }

    /// Cross off the item under the cursor.
    pub fn cross(&mut self) -> Result<bool> {
        self.set_done(true)
    }

    /// Un-cross the item under the cursor.
    pub fn uncross(&mut self) -> Result<bool> {
        self.set_done(false)
    }

    fn set_done(&mut self, done: bool) -> Result<bool> {
        let Some(item) = self.todos.get_mut(self.cursor) else {
            return Ok(false);
        };
        if item.done == done {
            return Ok(true);
        }
        item.done = done;
        if let Err(e) = self.save() {
            // Roll back so memory matches disk.
            if let Some(item) = self.todos.get_mut(self.cursor) {
                item.done = !done;
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Move the cursor up. Returns whether it moved.
    pub fn scroll_up(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            debug!("todo cursor at {}", self.cursor);
            true
        } else {
            false
        }
    }

    /// Move the cursor down. Returns whether it moved.
    pub fn scroll_down(&mut self) -> bool {
        if self.cursor + 1 < self.todos.len() {
            self.cursor += 1;
            debug!("todo cursor at {}", self.cursor);
            true
        } else {
            false
        }
    }

    /// The display window around the cursor: up to `window` items ending at
    /// (or surrounding) the current one.
    #[must_use]
    pub fn get_visible(&self, window: usize) -> Vec<VisibleTodo> {
        if self.todos.is_empty() || window == 0 {
            return Vec::new();
        }
        let mut start = self.cursor.saturating_sub(window - 1);
        let end = (start + window).min(self.todos.len());
        if end - start < window {
            start = end.saturating_sub(window);
        }
        (start..end)
            .map(|i| VisibleTodo {
                text: self.todos[i].text.clone(),
                done: self.todos[i].done,
                is_current: i == self.cursor,
            })
            .collect()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.todos.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    /// Aggregate counts.
    #[must_use]
    pub fn stats(&self) -> TodoStats {
        let done = self.todos.iter().filter(|t| t.done).count();
        TodoStats {
            total: self.todos.len(),
            done,
            pending: self.todos.len() - done,
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = StoreFile {
            todos: self.todos.clone(),
            cursor_index: self.cursor,
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        let raw = serde_json::to_string_pretty(&file)
            .map_err(|e| HubError::Store(format!("cannot serialize todos: {e}")))?;
        std::fs::write(&self.path, raw)?;
        debug!("saved {} todos to {}", self.todos.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn store(dir: &tempfile::TempDir) -> TodoStore {
        TodoStore::open(&dir.path().join("todos.json")).unwrap()
    }

    #[test]
    fn add_moves_cursor_to_new_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut todos = store(&dir);
        todos.add("buy milk").unwrap();
        todos.add("call mom").unwrap();
        let visible = todos.get_visible(3);
        assert_eq!(visible.len(), 2);
        assert!(visible[1].is_current);
        assert_eq!(visible[1].text, "call mom");
    }

    #[test]
    fn empty_text_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut todos = store(&dir);
        todos.add("   ").unwrap();
        assert!(todos.is_empty());
    }

    #[test]
    fn changes_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut todos = store(&dir);
            todos.add("buy milk").unwrap();
            todos.add("call mom").unwrap();
            todos.scroll_up();
            todos.cross().unwrap();
        }
        let todos = store(&dir);
        assert_eq!(todos.len(), 2);
        let visible = todos.get_visible(3);
        assert!(visible[0].done);
        assert!(visible[0].is_current);
        assert!(!visible[1].done);
    }

    #[test]
    fn cursor_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        std::fs::write(
            &path,
            r#"{"todos": [{"text": "only one"}], "cursor_index": 9}"#,
        )
        .unwrap();
        let todos = TodoStore::open(&path).unwrap();
        assert!(todos.get_visible(3)[0].is_current);
    }

    #[test]
    fn scroll_stops_at_ends() {
        let dir = tempfile::tempdir().unwrap();
        let mut todos = store(&dir);
        todos.add("a").unwrap();
        todos.add("b").unwrap();
        assert!(!todos.scroll_down());
        assert!(todos.scroll_up());
        assert!(!todos.scroll_up());
    }

    #[test]
    fn visible_window_tracks_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut todos = store(&dir);
        for text in ["a", "b", "c", "d", "e"] {
            todos.add(text).unwrap();
        }
        // Cursor sits on "e"; window shows the last three.
        let visible = todos.get_visible(3);
        let texts: Vec<&str> = visible.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "d", "e"]);

        todos.scroll_up();
        todos.scroll_up();
        todos.scroll_up();
        todos.scroll_up();
        // Cursor on "a": window slides to the top.
        let visible = todos.get_visible(3);
        let texts: Vec<&str> = visible.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(visible[0].is_current);
    }

    #[test]
    fn cross_and_uncross_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let mut todos = store(&dir);
        todos.add("task").unwrap();
        assert!(todos.cross().unwrap());
        assert_eq!(todos.stats().done, 1);
        assert!(todos.uncross().unwrap());
        assert_eq!(todos.stats().pending, 1);
    }

    #[test]
    fn cross_on_empty_list_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut todos = store(&dir);
        assert!(!todos.cross().unwrap());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(TodoStore::open(&path), Err(HubError::Store(_))));
    }
}
