//! Host capability abstraction for input synthesis and screen perception.
//!
//! The [`Host`] trait decouples the automation core from the desktop it drives
//! (currently `enigo` + `xcap`, see [`crate::io::desktop`]). Tests use a
//! scripted host that records every event without touching the real screen.

use std::path::Path;

use anyhow::Result;

use crate::core::types::Point;

/// Named keys the automation presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Control,
    Char(char),
}

/// Primitives the automation needs from its environment.
pub trait Host {
    /// Move the pointer to `at` and click the primary button.
    fn click(&self, at: Point) -> Result<()>;

    /// Press and release a single key.
    fn press(&self, key: Key) -> Result<()>;

    /// Hold `modifier` while pressing `key`.
    fn chord(&self, modifier: Key, key: Key) -> Result<()>;

    /// Enter literal text at the current focus.
    fn type_text(&self, text: &str) -> Result<()>;

    /// Replace the clipboard contents with `text`.
    fn set_clipboard(&self, text: &str) -> Result<()>;

    /// Find `template` on screen and return the center of the best match.
    ///
    /// `confidence` is `None` when only exact matching is available.
    fn locate(&self, template: &Path, confidence: Option<f32>) -> Result<Option<Point>>;

    /// Whether [`Host::locate`] honors a confidence threshold.
    fn supports_confidence(&self) -> bool;

    /// Current pointer position, used for the failsafe corner.
    fn pointer(&self) -> Result<Point>;
}
