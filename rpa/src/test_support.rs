//! Test-only doubles: a scripted desktop, a fake clock and a recording sink.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::cancel::CancelToken;
use crate::core::types::{CellValue, Point, Row, ScreenReference};
use crate::io::assets::AssetSet;
use crate::io::clock::Clock;
use crate::io::config::{AssetConfig, RpaConfig};
use crate::io::host::{Host, Key};
use crate::progress::{LogLevel, ProgressEvent, ProgressSink};
use crate::session::Session;

/// Clock whose `sleep` advances virtual time instantly.
///
/// Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct FakeClock {
    start: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A simulated input event, in the order the host received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Click(Point),
    Press(Key),
    Chord(Key, Key),
    Type(String),
    Clipboard(String),
}

/// A perception query, in the order the host received it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup {
    pub reference: ScreenReference,
    pub confidence: Option<f32>,
    pub found: bool,
}

#[derive(Debug, Clone, Copy)]
enum Appear {
    /// Visible from this virtual instant on.
    At(Duration),
    /// Visible once this many input events have been received.
    AfterInputs(usize),
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    at: Point,
    appear: Appear,
    until: Option<Duration>,
}

/// Scripted desktop: serves reference matches from a timeline and records input.
///
/// Clicking the informational dialog's acknowledge control hides the dialog.
pub struct ScriptedHost {
    clock: FakeClock,
    assets: AssetSet,
    placements: RefCell<Vec<(ScreenReference, Placement)>>,
    failing: RefCell<Vec<ScreenReference>>,
    events: RefCell<Vec<InputEvent>>,
    lookups: RefCell<Vec<Lookup>>,
    pointer: Cell<Point>,
    confidence_matching: Cell<bool>,
}

impl ScriptedHost {
    pub fn new(clock: FakeClock, assets: AssetSet) -> Self {
        Self {
            clock,
            assets,
            placements: RefCell::new(Vec::new()),
            failing: RefCell::new(Vec::new()),
            events: RefCell::new(Vec::new()),
            lookups: RefCell::new(Vec::new()),
            pointer: Cell::new(Point::new(640, 480)),
            confidence_matching: Cell::new(true),
        }
    }

    /// Show `reference` at `at` from now on.
    pub fn show(&self, reference: ScreenReference, at: Point) {
        self.place(reference, at, Appear::At(Duration::ZERO), None);
    }

    /// Show `reference` once the virtual clock reaches `from`.
    pub fn show_from(&self, reference: ScreenReference, at: Point, from: Duration) {
        self.place(reference, at, Appear::At(from), None);
    }

    /// Show `reference` during `[from, until)` of virtual time.
    pub fn show_between(
        &self,
        reference: ScreenReference,
        at: Point,
        from: Duration,
        until: Duration,
    ) {
        self.place(reference, at, Appear::At(from), Some(until));
    }

    /// Show `reference` once `count` input events have been received.
    pub fn show_after_inputs(&self, reference: ScreenReference, at: Point, count: usize) {
        self.place(reference, at, Appear::AfterInputs(count), None);
    }

    pub fn hide(&self, reference: ScreenReference) {
        self.placements
            .borrow_mut()
            .retain(|(candidate, _)| *candidate != reference);
    }

    /// Make every lookup of `reference` fail with an error.
    pub fn fail_lookup(&self, reference: ScreenReference) {
        self.failing.borrow_mut().push(reference);
    }

    pub fn set_confidence_matching(&self, enabled: bool) {
        self.confidence_matching.set(enabled);
    }

    pub fn move_pointer(&self, to: Point) {
        self.pointer.set(to);
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.borrow().clone()
    }

    pub fn lookups(&self) -> Vec<Lookup> {
        self.lookups.borrow().clone()
    }

    /// Text delivered to the focused field, with typed characters coalesced
    /// and pastes resolved to the clipboard contents, split at each tab.
    pub fn entered_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut clipboard = String::new();
        for event in self.events.borrow().iter() {
            match event {
                InputEvent::Type(text) => current.push_str(text),
                InputEvent::Clipboard(text) => clipboard = text.clone(),
                InputEvent::Chord(Key::Control, Key::Char('v')) => current.push_str(&clipboard),
                InputEvent::Press(Key::Tab) => fields.push(std::mem::take(&mut current)),
                InputEvent::Click(_) | InputEvent::Press(_) | InputEvent::Chord(_, _) => {}
            }
        }
        fields
    }

    fn place(
        &self,
        reference: ScreenReference,
        at: Point,
        appear: Appear,
        until: Option<Duration>,
    ) {
        self.placements
            .borrow_mut()
            .push((reference, Placement { at, appear, until }));
    }

    fn record(&self, event: InputEvent) {
        self.events.borrow_mut().push(event);
    }

    fn reference_for(&self, template: &Path) -> Option<ScreenReference> {
        ScreenReference::ALL
            .into_iter()
            .find(|reference| self.assets.path(*reference) == template)
    }

    fn visible_at(&self, reference: ScreenReference) -> Option<Point> {
        let now = self.clock.elapsed();
        let inputs = self.events.borrow().len();
        self.placements
            .borrow()
            .iter()
            .filter(|(candidate, _)| *candidate == reference)
            .map(|(_, placement)| placement)
            .find(|placement| {
                let appeared = match placement.appear {
                    Appear::At(from) => now >= from,
                    Appear::AfterInputs(count) => inputs >= count,
                };
                appeared && placement.until.is_none_or(|until| now < until)
            })
            .map(|placement| placement.at)
    }
}

impl Host for ScriptedHost {
    fn click(&self, at: Point) -> Result<()> {
        self.pointer.set(at);
        self.record(InputEvent::Click(at));
        if self.visible_at(ScreenReference::InfoAcknowledge) == Some(at) {
            self.hide(ScreenReference::InfoDialog);
            self.hide(ScreenReference::InfoAcknowledge);
        }
        Ok(())
    }

    fn press(&self, key: Key) -> Result<()> {
        self.record(InputEvent::Press(key));
        Ok(())
    }

    fn chord(&self, modifier: Key, key: Key) -> Result<()> {
        self.record(InputEvent::Chord(modifier, key));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.record(InputEvent::Type(text.to_string()));
        Ok(())
    }

    fn set_clipboard(&self, text: &str) -> Result<()> {
        self.record(InputEvent::Clipboard(text.to_string()));
        Ok(())
    }

    fn locate(&self, template: &Path, confidence: Option<f32>) -> Result<Option<Point>> {
        let reference = self
            .reference_for(template)
            .ok_or_else(|| anyhow!("unknown template {}", template.display()))?;
        if self.failing.borrow().contains(&reference) {
            return Err(anyhow!("screen capture failed"));
        }
        let found = self.visible_at(reference);
        self.lookups.borrow_mut().push(Lookup {
            reference,
            confidence,
            found: found.is_some(),
        });
        Ok(found)
    }

    fn supports_confidence(&self) -> bool {
        self.confidence_matching.get()
    }

    fn pointer(&self) -> Result<Point> {
        Ok(self.pointer.get())
    }
}

/// Collects every progress event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.borrow().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Status(status) => Some(status.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self, level: LogLevel) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Log {
                    level: candidate,
                    message,
                    ..
                } if *candidate == level => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_log(&self) -> Option<String> {
        self.events.borrow().iter().rev().find_map(|event| match event {
            ProgressEvent::Log { message, .. } => Some(message.clone()),
            _ => None,
        })
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// A temp directory holding placeholder files for every reference image.
pub struct TestAssets {
    _dir: TempDir,
    set: AssetSet,
}

impl TestAssets {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp asset dir")?;
        let config = AssetConfig::default();
        let images = dir.path().join(&config.dir);
        fs::create_dir_all(&images).with_context(|| format!("create {}", images.display()))?;
        for reference in ScreenReference::ALL {
            let path = images.join(config.file_name(reference));
            fs::write(&path, b"placeholder").with_context(|| format!("write {}", path.display()))?;
        }
        let set = AssetSet::resolve(dir.path(), &config);
        Ok(Self { _dir: dir, set })
    }

    pub fn set(&self) -> &AssetSet {
        &self.set
    }
}

/// Everything a session needs, wired to the scripted doubles.
pub struct Harness {
    pub clock: FakeClock,
    pub host: ScriptedHost,
    pub assets: TestAssets,
    pub config: RpaConfig,
    pub cancel: CancelToken,
    pub sink: RecordingSink,
}

/// Where the harness places references by default.
pub const PRIMARY_AT: Point = Point::new(200, 150);
pub const VALIDATE_AT: Point = Point::new(820, 600);
pub const CONFIRM_AT: Point = Point::new(500, 420);
pub const INFO_AT: Point = Point::new(480, 300);
pub const ACK_AT: Point = Point::new(520, 360);
pub const CRITICAL_AT: Point = Point::new(470, 310);

impl Harness {
    pub fn new() -> Result<Self> {
        let clock = FakeClock::new();
        let assets = TestAssets::new()?;
        let host = ScriptedHost::new(clock.clone(), assets.set().clone());
        Ok(Self {
            clock,
            host,
            assets,
            config: RpaConfig::default(),
            cancel: CancelToken::new(),
            sink: RecordingSink::default(),
        })
    }

    /// A harness where the form is always ready: primary field, validate and
    /// confirm controls are on screen and no dialog ever appears.
    pub fn ready() -> Result<Self> {
        let harness = Self::new()?;
        harness.host.show(ScreenReference::PrimaryField, PRIMARY_AT);
        harness.host.show(ScreenReference::Validate, VALIDATE_AT);
        harness.host.show(ScreenReference::Confirm, CONFIRM_AT);
        Ok(harness)
    }

    pub fn session(&self) -> Session<'_, ScriptedHost, FakeClock> {
        Session {
            host: &self.host,
            clock: &self.clock,
            config: &self.config,
            assets: self.assets.set(),
            cancel: &self.cancel,
            sink: &self.sink,
        }
    }
}

/// Build a row from `(column, value)` pairs; empty strings become missing cells.
pub fn row(cells: &[(&str, &str)]) -> Row {
    Row::new(
        cells
            .iter()
            .map(|(column, value)| {
                let cell = if value.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::from(*value)
                };
                (column.to_string(), cell)
            })
            .collect(),
    )
}
