//! Terminal progress bar.
//!
//! [`ProgressBar`] keeps a value/max pair and repaints a single line of the
//! form `⸨███▌    ⸩ ⠹ 00:01:10 title` in place. Repaints are throttled.
//! Without a stream the bar runs headless and publishes
//! [`ProgressEvent`]s instead of writing.

mod resize;

pub use resize::ResizeWatcher;

use std::io::{IsTerminal, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use m3u8dl_common::timecode::format_clock;
use tokio::sync::broadcast;
use unicode_width::UnicodeWidthStr;

/// Rotating status glyphs, advanced on every redraw.
pub const CLOCKS: [&str; 12] = ["⠇", "⠏", "⠋", "⠉", "⠙", "⠹", "⠸", "⠼", "⠴", "⠤", "⠦", "⠧"];

/// Status glyph shown once the bar is full.
pub const FINISHED: &str = "⠿";

/// Partial-cell glyphs in eighth increments, empty through full.
pub const BLOCKS: [&str; 9] = ["", "▏", "▎", "▍", "▌", "▋", "▊", "▉", "█"];

/// Full cell glyph.
const FILLED: &str = "█";

/// Room kept beside the title so the status suffix is never clipped.
const MIN_EXTRA_WIDTH: usize = 7;

/// Widest bar that will be rendered.
pub const MAX_LENGTH: usize = 4096;

/// Width used when no terminal size is available.
const FALLBACK_COLUMNS: usize = 80;

/// Default minimum interval between repaints.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(200);

/// Events published by a headless bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A repaint that would have been written to a terminal.
    Update(String),
    /// The value reached the maximum.
    Finish,
}

/// Output target for a bar.
pub struct TermStream {
    writer: Box<dyn Write + Send>,
    interactive: bool,
}

impl TermStream {
    /// Standard error, interactive when it is a terminal.
    pub fn stderr() -> Self {
        let interactive = std::io::stderr().is_terminal();
        Self::new(std::io::stderr(), interactive)
    }

    /// Wrap an arbitrary writer.
    ///
    /// Non-interactive streams are never painted; the bar only keeps its
    /// state up to date.
    pub fn new(writer: impl Write + Send + 'static, interactive: bool) -> Self {
        Self {
            writer: Box::new(writer),
            interactive,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn clear_line(&mut self) -> std::io::Result<()> {
        queue!(self.writer, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        self.writer.flush()
    }

    fn paint(&mut self, line: &str) -> std::io::Result<()> {
        queue!(
            self.writer,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
        self.writer.flush()
    }
}

impl std::fmt::Debug for TermStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermStream")
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

/// Construction options for a [`ProgressBar`].
#[derive(Debug, Clone)]
pub struct ProgressOptions {
    /// Fixed width in columns. `None` follows the terminal width.
    pub length: Option<usize>,
    /// Label shown after the status glyph.
    pub title: String,
    /// Show the estimated time remaining.
    pub remain: bool,
    /// Minimum interval between repaints.
    pub throttle: Duration,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            length: None,
            title: String::new(),
            remain: false,
            throttle: DEFAULT_THROTTLE,
        }
    }
}

/// A throttled, resizable single-line progress bar.
#[derive(Debug)]
pub struct ProgressBar {
    value: u64,
    max: u64,
    frame: usize,
    length: usize,
    title: String,
    remain: bool,
    throttle: Duration,
    begin: Instant,
    last_draw: Option<Instant>,
    finished: bool,
    bar: String,
    stream: Option<TermStream>,
    resize: Option<ResizeWatcher>,
    events: broadcast::Sender<ProgressEvent>,
}

impl ProgressBar {
    /// Create a bar targeting `max`. Use `1` while the real target is unknown.
    ///
    /// When `stream` is an interactive terminal the bar subscribes to width
    /// changes; this needs a running tokio runtime on unix.
    pub fn new(max: u64, options: ProgressOptions, stream: Option<TermStream>) -> Self {
        let interactive = stream.as_ref().is_some_and(TermStream::is_interactive);
        let (events, _) = broadcast::channel(64);

        let mut bar = Self {
            value: 0,
            max,
            frame: 0,
            length: 0,
            title: options.title,
            remain: options.remain,
            throttle: options.throttle,
            begin: Instant::now(),
            last_draw: None,
            finished: false,
            bar: String::new(),
            stream,
            resize: interactive.then(ResizeWatcher::new),
            events,
        };

        let length = match options.length {
            Some(length) if length > 0 => length,
            _ if interactive => terminal_columns(),
            _ => FALLBACK_COLUMNS,
        };
        bar.set_length(length);
        bar
    }

    /// Publish events on `events` instead of the bar's own channel.
    pub fn with_events(mut self, events: broadcast::Sender<ProgressEvent>) -> Self {
        self.events = events;
        self
    }

    /// Subscribe to headless updates and completion notices.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub fn set_max(&mut self, max: u64) -> &mut Self {
        self.max = max;
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    /// Set the total width, capped at [`MAX_LENGTH`] and never below the
    /// title width plus room for the status suffix.
    pub fn set_length(&mut self, length: usize) -> &mut Self {
        let min = self.title.width() + MIN_EXTRA_WIDTH;
        self.length = length.min(MAX_LENGTH).max(min);
        self
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The most recently rendered bar line.
    pub fn line(&self) -> &str {
        &self.bar
    }

    /// Advance the value by `delta`.
    pub fn tick(&mut self, delta: u64) -> &mut Self {
        self.refresh(self.value.saturating_add(delta))
    }

    /// Jump straight to the maximum.
    pub fn finish(&mut self) -> &mut Self {
        self.refresh(self.max)
    }

    /// Set the current value, re-render and repaint if the throttle window
    /// has passed.
    ///
    /// [`ProgressEvent::Finish`] is published once each time the value
    /// crosses from below `max` to `max` or beyond.
    pub fn refresh(&mut self, value: u64) -> &mut Self {
        self.value = value;
        self.bar = self.render();

        let now = Instant::now();
        let due = self
            .last_draw
            .map_or(true, |last| now.duration_since(last) > self.throttle);
        if due {
            self.last_draw = Some(now);
            let line = self.bar.clone();
            self.paint(&line);
        }

        if value >= self.max {
            if !self.finished {
                self.finished = true;
                self.publish(ProgressEvent::Finish);
            }
        } else {
            self.finished = false;
        }
        self
    }

    /// Draw `text` followed by the next spinner glyph, ignoring the throttle.
    ///
    /// Used on a fixed interval while the maximum is still unknown.
    pub fn spin(&mut self, text: &str) -> &mut Self {
        let glyph = self.next_clock();
        let line = format!("{text} {glyph}").trim().to_string();
        self.paint(&line);
        self
    }

    /// Wait for the terminal width to change and adopt it.
    ///
    /// Never resolves when the bar is not subscribed to resizes.
    pub async fn follow_resize(&mut self) {
        let columns = match self.resize.as_mut() {
            Some(watcher) => watcher.changed().await,
            None => std::future::pending().await,
        };
        if let Some(columns) = columns {
            tracing::trace!(columns, "terminal resized");
            self.set_length(usize::from(columns));
        }
    }

    /// Erase the current line on an interactive stream.
    pub fn clear_line(&mut self) {
        if let Some(stream) = self.stream.as_mut().filter(|s| s.interactive) {
            if let Err(e) = stream.clear_line() {
                tracing::debug!("failed to clear progress line: {}", e);
            }
        }
    }

    /// Drop the resize subscription and the stream.
    pub fn close(&mut self) {
        self.resize = None;
        self.stream = None;
    }

    fn next_clock(&mut self) -> &'static str {
        let glyph = CLOCKS[self.frame % CLOCKS.len()];
        self.frame = self.frame.wrapping_add(1);
        glyph
    }

    fn paint(&mut self, line: &str) {
        match self.stream.as_mut() {
            Some(stream) if stream.interactive => {
                if let Err(e) = stream.paint(line) {
                    tracing::debug!("failed to draw progress line: {}", e);
                }
            }
            Some(_) => {}
            None => self.publish(ProgressEvent::Update(line.to_string())),
        }
    }

    fn publish(&self, event: ProgressEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("no subscribers for progress event");
        }
    }

    fn render(&mut self) -> String {
        let value = self.value;
        let max = self.max.max(value);

        let mark = if value == max {
            FINISHED
        } else {
            self.next_clock()
        };
        let ratio = if max == 0 { 0.0 } else { value as f64 / max as f64 };

        let remain = if self.remain {
            format!("{} ", self.remaining(ratio))
        } else {
            String::new()
        };
        let suffix = format!(" {mark} {remain}{}", self.title);

        let available = self.length.saturating_sub(suffix.width() + 2);
        let (filled, partial) = fill_cells(ratio, available);
        let used = filled + usize::from(partial > 0);

        let mut line = String::with_capacity(self.length * 3);
        line.push('⸨');
        line.push_str(&FILLED.repeat(filled));
        line.push_str(BLOCKS[partial]);
        line.push_str(&" ".repeat(available - used));
        line.push('⸩');
        line.push_str(&suffix);
        line
    }

    fn remaining(&self, ratio: f64) -> String {
        let elapsed = self.begin.elapsed().as_secs_f64();
        format_clock(elapsed / ratio - elapsed)
    }
}

/// Split `ratio * available` into whole cells and a partial-cell index
/// into [`BLOCKS`].
///
/// The result never occupies more than `available` cells.
pub fn fill_cells(ratio: f64, available: usize) -> (usize, usize) {
    let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
    let exact = ratio * available as f64;
    let filled = (exact.floor() as usize).min(available);
    if filled == available {
        return (filled, 0);
    }
    let partial = ((exact - filled as f64) * 8.0).round() as usize;
    (filled, partial.min(BLOCKS.len() - 1))
}

fn terminal_columns() -> usize {
    crossterm::terminal::size()
        .map(|(columns, _)| usize::from(columns))
        .unwrap_or(FALLBACK_COLUMNS)
}
