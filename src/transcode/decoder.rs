//! Incremental decoder for the transcoder's diagnostic stream.
//!
//! ffmpeg reports progress as free-form text on stderr. Two patterns carry
//! timing information:
//!
//! - `  Duration: 00:10:00.00, start: ...` once the input is opened
//! - `... time=00:01:23.45 bitrate=...` repeatedly while copying
//!
//! Chunks are split into lines on `\n` or `\r` (status lines are rewritten
//! in place with carriage returns). A partial trailing line is carried over
//! to the next chunk.

use std::sync::LazyLock;

use m3u8dl_common::timecode::centiseconds;
use regex::Regex;

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)Duration: (\d\d:\d\d:\d\d\.\d+),").expect("valid duration pattern")
});

static POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)time=(\d\d:\d\d:\d\d\.\d+)(?:\s|$)").expect("valid position pattern")
});

/// One decoded diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    /// Total input duration, in centiseconds.
    DurationSeen(u64),
    /// Current output position, in centiseconds.
    PositionSeen(u64),
    /// Any other non-empty line.
    Unmatched(String),
}

/// Splits raw stderr chunks into lines and classifies them.
#[derive(Debug, Default)]
pub struct StderrDecoder {
    partial: Vec<u8>,
}

impl StderrDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete line in `chunk`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecoderEvent> {
        self.partial.extend_from_slice(chunk);

        let Some(last_break) = self.partial.iter().rposition(|b| matches!(b, b'\n' | b'\r'))
        else {
            return Vec::new();
        };

        let rest = self.partial.split_off(last_break + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        decode_lines(&complete)
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<DecoderEvent> {
        let rest = std::mem::take(&mut self.partial);
        decode_lines(&rest)
    }
}

fn decode_lines(bytes: &[u8]) -> Vec<DecoderEvent> {
    String::from_utf8_lossy(bytes)
        .split(['\n', '\r'])
        .filter(|line| !line.trim().is_empty())
        .map(decode_line)
        .collect()
}

/// Classify a single line.
///
/// A duration match wins over a position match on the same line.
pub fn decode_line(line: &str) -> DecoderEvent {
    let capture = |re: &Regex| {
        re.captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| centiseconds(m.as_str()))
    };

    if let Some(duration) = capture(&DURATION) {
        DecoderEvent::DurationSeen(duration)
    } else if let Some(position) = capture(&POSITION) {
        DecoderEvent::PositionSeen(position)
    } else {
        DecoderEvent::Unmatched(line.to_string())
    }
}

/// What the progress bar should do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackUpdate {
    /// Install the real maximum and stop the indeterminate animation.
    SetMax(u64),
    /// Move the bar to a new position.
    Refresh(u64),
}

/// Two-state machine driven by decoder events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// No duration seen yet; the bar shows the indeterminate animation.
    #[default]
    AwaitingDuration,
    /// The duration is known and positions are tracked against it.
    Tracking { duration: u64 },
}

impl TrackState {
    /// Apply an event and return the resulting bar update, if any.
    ///
    /// Only the first duration is installed. Positions reported before the
    /// duration is known are ignored.
    pub fn advance(&mut self, event: &DecoderEvent) -> Option<TrackUpdate> {
        match (*self, event) {
            (TrackState::AwaitingDuration, DecoderEvent::DurationSeen(duration)) => {
                *self = TrackState::Tracking {
                    duration: *duration,
                };
                Some(TrackUpdate::SetMax(*duration))
            }
            (TrackState::Tracking { .. }, DecoderEvent::PositionSeen(position)) => {
                Some(TrackUpdate::Refresh(*position))
            }
            _ => None,
        }
    }

    pub fn is_awaiting_duration(&self) -> bool {
        matches!(self, TrackState::AwaitingDuration)
    }
}
