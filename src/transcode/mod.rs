//! Transcoder supervision.
//!
//! [`Supervisor::run`] drives one playlist URL through ffmpeg with a stream
//! copy, feeding timing events parsed from its stderr into a
//! [`ProgressBar`](crate::progress::ProgressBar).

mod command;
mod decoder;

pub use command::{ProcessHandle, TranscodeCommand};
pub use decoder::{decode_line, DecoderEvent, StderrDecoder, TrackState, TrackUpdate};

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossterm::style::Stylize;
use m3u8dl_common::paths::{output_name, DEFAULT_OUTPUT_EXTENSION};
use m3u8dl_common::timecode::{format_clock, format_throughput};
use m3u8dl_common::{Error, FailureReport, Result};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::progress::{ProgressBar, ProgressEvent, ProgressOptions, TermStream, DEFAULT_THROTTLE};
use crate::queue::JobRunner;

/// Proxy used when none is configured.
pub const DEFAULT_PROXY: &str = "localhost:1087";

/// Interval of the indeterminate animation shown before the duration is known.
pub const DEFAULT_SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Size of each stderr read.
const READ_CHUNK: usize = 8 * 1024;

/// Capacity of the supervisor's progress event channel.
const EVENT_CAPACITY: usize = 256;

/// Display settings for the per-job progress bar.
#[derive(Debug, Clone)]
pub struct ProgressSettings {
    /// Fixed bar width; `None` follows the terminal.
    pub length: Option<usize>,
    pub throttle: Duration,
    pub spinner_interval: Duration,
    /// Show the estimated time remaining.
    pub remain: bool,
    /// Publish events instead of drawing to stderr.
    pub headless: bool,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            length: None,
            throttle: DEFAULT_THROTTLE,
            spinner_interval: DEFAULT_SPINNER_INTERVAL,
            remain: true,
            headless: false,
        }
    }
}

/// Options for every job run by a [`Supervisor`].
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Path of the ffmpeg binary.
    pub ffmpeg: PathBuf,
    /// `host:port` injected as `http_proxy`/`https_proxy`. `None` leaves the
    /// inherited environment untouched.
    pub proxy: Option<String>,
    /// Output file extension.
    pub extension: String,
    /// Directory for output files; defaults to the working directory.
    pub output_dir: Option<PathBuf>,
    pub progress: ProgressSettings,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            ffmpeg: resolve_ffmpeg(None),
            proxy: Some(DEFAULT_PROXY.to_string()),
            extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            output_dir: None,
            progress: ProgressSettings::default(),
        }
    }
}

/// Locate ffmpeg: an explicit path wins, then `PATH`, then the bare name.
pub fn resolve_ffmpeg(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg"))
}

/// One URL's trip through the transcoder.
#[derive(Debug, Clone)]
pub struct Job {
    pub url: String,
    /// Position in the queue such as `3/12`; empty for single downloads.
    pub label: String,
    /// Output filename, without directory.
    pub name: String,
    /// Full output path.
    pub output: PathBuf,
    pub started: Instant,
}

impl Job {
    pub fn new(url: &str, label: &str, options: &TranscodeOptions) -> Self {
        let name = output_name(url, &options.extension);
        let output = match &options.output_dir {
            Some(dir) => dir.join(&name),
            None => PathBuf::from(&name),
        };
        Self {
            url: url.to_string(),
            label: label.to_string(),
            name,
            output,
            started: Instant::now(),
        }
    }

    /// Wall-clock time since the job started, as `HH:MM:SS`.
    pub fn elapsed(&self) -> String {
        format_clock(self.started.elapsed().as_secs_f64())
    }

    /// Output file growth rate since the job started.
    pub fn throughput(&self) -> String {
        let size = std::fs::metadata(&self.output).map(|m| m.len()).unwrap_or(0);
        let secs = self.started.elapsed().as_secs_f64();
        let rate = if secs > 0.0 { size as f64 / secs } else { 0.0 };
        format_throughput(rate)
    }

    /// Title shown beside the progress bar.
    fn title(&self) -> String {
        format!("{} {} {}", self.throughput(), self.name, self.label)
            .trim_end()
            .to_string()
    }

    /// Completion line printed to stdout, colored when `styled`.
    fn success_line(&self, styled: bool) -> String {
        let elapsed = self.elapsed();
        let speed = self.throughput();
        let speed = speed.trim();
        let line = if styled {
            format!(
                "{} {} done, elapsed {}, speed {}.",
                self.label,
                self.name.as_str().yellow().underlined(),
                elapsed.as_str().cyan(),
                speed.red(),
            )
        } else {
            format!(
                "{} {} done, elapsed {}, speed {}.",
                self.label, self.name, elapsed, speed
            )
        };
        line.trim().to_string()
    }

    /// Line shown while the duration is still unknown.
    fn waiting_line(&self) -> String {
        format!("{} {}", self.label, self.url).trim().to_string()
    }
}

/// A successfully finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub url: String,
    pub output: PathBuf,
}

/// Spawns and watches ffmpeg, one job at a time.
#[derive(Debug, Clone)]
pub struct Supervisor {
    options: TranscodeOptions,
    cancel: CancellationToken,
    events: broadcast::Sender<ProgressEvent>,
}

impl Supervisor {
    /// Create a supervisor. Cancelling `cancel` kills the running job.
    pub fn new(options: TranscodeOptions, cancel: CancellationToken) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            options,
            cancel,
            events,
        }
    }

    /// Subscribe to the progress events of every job run from now on.
    ///
    /// Events are only published for headless runs; a terminal bar draws
    /// instead.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// Build the ffmpeg invocation for `job`.
    pub fn command_for(&self, job: &Job) -> TranscodeCommand {
        let mut cmd = TranscodeCommand::new(self.options.ffmpeg.clone());
        cmd.args(["-y", "-i"])
            .arg(job.url.as_str())
            .args(["-c", "copy"])
            .arg(job.output.to_string_lossy());

        if let Some(proxy) = &self.options.proxy {
            cmd.env("http_proxy", format!("http://{proxy}"))
                .env("https_proxy", format!("https://{proxy}"));
        }
        cmd
    }

    /// Transcode `url`, drawing progress until ffmpeg exits.
    ///
    /// # Errors
    ///
    /// - [`Error::Spawn`] if ffmpeg cannot be launched.
    /// - [`Error::Transcode`] if it exits nonzero.
    /// - [`Error::Interrupted`] if the cancellation token fires; the process
    ///   is killed before returning. A token that is already cancelled, or
    ///   one cancelled by the time a failed process is reaped, also yields
    ///   this error.
    pub async fn run(&self, url: &str, label: &str) -> Result<Completed> {
        let job = Job::new(url, label, &self.options);
        let cmd = self.command_for(&job);

        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }

        info!(url, label, output = %job.output.display(), "Starting transcode");
        let mut handle = cmd.spawn()?;
        let mut bar = self.progress_bar();

        let streamed = self.watch(&job, &mut handle, &mut bar).await;
        let exit = match streamed {
            Ok(()) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Error::Interrupted),
                    code = handle.wait() => code,
                }
            }
            Err(e) => Err(e),
        };

        if exit.is_err() {
            handle.kill().await;
        }
        bar.clear_line();
        bar.close();

        let code = exit?;
        if code != 0 && self.cancel.is_cancelled() {
            // The terminal's SIGINT reached ffmpeg before our handler ran.
            debug!(url, code, "Transcoder exited during shutdown");
            return Err(Error::Interrupted);
        }
        if code != 0 {
            warn!(url, code, "Transcode failed");
            return Err(Error::Transcode(FailureReport::new(
                code,
                cmd.command_line(),
                &handle.diagnostics(),
            )));
        }

        info!(url, elapsed = %job.elapsed(), "Transcode finished");
        println!("{}", job.success_line(std::io::stdout().is_terminal()));

        Ok(Completed {
            url: job.url,
            output: job.output,
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        let settings = &self.options.progress;
        let options = ProgressOptions {
            length: settings.length,
            title: String::new(),
            remain: settings.remain,
            throttle: settings.throttle,
        };
        let stream = (!settings.headless).then(TermStream::stderr);
        ProgressBar::new(1, options, stream).with_events(self.events.clone())
    }

    /// Pump stderr into the decoder until it closes.
    async fn watch(
        &self,
        job: &Job,
        handle: &mut ProcessHandle,
        bar: &mut ProgressBar,
    ) -> Result<()> {
        let mut decoder = StderrDecoder::new();
        let mut state = TrackState::default();
        let mut spinner = tokio::time::interval(self.options.progress.spinner_interval);
        let waiting = job.waiting_line();
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            tokio::select! {
                read = handle.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        break;
                    }
                    bar.set_title(job.title());
                    for event in decoder.feed(&buf[..n]) {
                        apply(&mut state, bar, &event);
                    }
                }
                _ = spinner.tick(), if state.is_awaiting_duration() => {
                    bar.spin(&waiting);
                }
                _ = bar.follow_resize() => {}
                _ = self.cancel.cancelled() => {
                    debug!(url = %job.url, "Cancelling transcode");
                    return Err(Error::Interrupted);
                }
            }
        }

        for event in decoder.finish() {
            apply(&mut state, bar, &event);
        }
        Ok(())
    }
}

fn apply(state: &mut TrackState, bar: &mut ProgressBar, event: &DecoderEvent) {
    match state.advance(event) {
        Some(TrackUpdate::SetMax(max)) => {
            debug!(duration = max, "Duration known");
            let value = bar.value();
            bar.set_max(max).refresh(value);
        }
        Some(TrackUpdate::Refresh(position)) => {
            bar.refresh(position);
        }
        None => {}
    }
}

#[async_trait]
impl JobRunner for Supervisor {
    async fn run_job(&mut self, url: &str, label: &str) -> Result<()> {
        self.run(url, label).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TranscodeOptions {
        TranscodeOptions {
            ffmpeg: PathBuf::from("ffmpeg"),
            ..Default::default()
        }
    }

    #[test]
    fn job_output_name() {
        let job = Job::new("http://h/v/show.m3u8", "3/12", &options());
        assert_eq!(job.name, "show.ts");
        assert_eq!(job.output, PathBuf::from("show.ts"));
        assert_eq!(job.label, "3/12");
    }

    #[test]
    fn job_output_dir_and_extension() {
        let opts = TranscodeOptions {
            extension: "mp4".into(),
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..options()
        };
        let job = Job::new("http://h/v/show.m3u8", "", &opts);
        assert_eq!(job.output, PathBuf::from("/tmp/out/show.mp4"));
    }

    #[test]
    fn job_elapsed_is_placeholder_at_start() {
        let job = Job::new("http://h/a.m3u8", "", &options());
        assert_eq!(job.elapsed(), "--:--:--");
    }

    #[test]
    fn job_throughput_without_output_file() {
        let opts = TranscodeOptions {
            output_dir: Some(PathBuf::from("/nonexistent-m3u8dl-dir")),
            ..options()
        };
        let job = Job::new("http://h/a.m3u8", "", &opts);
        assert_eq!(job.throughput(), "     0B/s");
    }

    #[test]
    fn job_title_trims_empty_label() {
        let opts = TranscodeOptions {
            output_dir: Some(PathBuf::from("/nonexistent-m3u8dl-dir")),
            ..options()
        };
        let job = Job::new("http://h/a.m3u8", "", &opts);
        assert_eq!(job.title(), "     0B/s a.ts");
        assert_eq!(job.waiting_line(), "http://h/a.m3u8");
    }

    #[test]
    fn command_with_proxy() {
        let supervisor = Supervisor::new(options(), CancellationToken::new());
        let job = Job::new("http://h/a.m3u8", "", supervisor.options());
        let cmd = supervisor.command_for(&job);

        assert_eq!(cmd.command_line(), "ffmpeg -y -i http://h/a.m3u8 -c copy a.ts");
        assert_eq!(
            cmd.get_env(),
            &[
                ("http_proxy".to_string(), "http://localhost:1087".to_string()),
                ("https_proxy".to_string(), "https://localhost:1087".to_string()),
            ]
        );
    }

    #[test]
    fn command_without_proxy_inherits_environment() {
        let opts = TranscodeOptions {
            proxy: None,
            ..options()
        };
        let supervisor = Supervisor::new(opts, CancellationToken::new());
        let job = Job::new("http://h/a.m3u8", "", supervisor.options());
        assert!(supervisor.command_for(&job).get_env().is_empty());
    }

    #[test]
    fn apply_drives_bar() {
        let mut bar = ProgressBar::new(1, ProgressOptions::default(), None);
        let mut state = TrackState::default();

        apply(&mut state, &mut bar, &DecoderEvent::PositionSeen(50));
        assert_eq!(bar.value(), 0);

        apply(&mut state, &mut bar, &DecoderEvent::DurationSeen(6350));
        assert_eq!(bar.max(), 6350);

        apply(&mut state, &mut bar, &DecoderEvent::PositionSeen(1000));
        assert_eq!(bar.value(), 1000);
    }

    #[test]
    fn success_line_plain_has_no_escapes() {
        let opts = TranscodeOptions {
            output_dir: Some(PathBuf::from("/nonexistent-m3u8dl-dir")),
            ..options()
        };
        let job = Job::new("http://h/a.m3u8", "2/5", &opts);
        assert_eq!(
            job.success_line(false),
            "2/5 a.ts done, elapsed --:--:--, speed 0B/s."
        );
    }

    #[tokio::test]
    async fn cancelled_token_skips_spawn() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let opts = TranscodeOptions {
            ffmpeg: PathBuf::from("nonexistent_ffmpeg_xyz_12345"),
            ..options()
        };
        let supervisor = Supervisor::new(opts, cancel);
        let err = supervisor.run("http://h/a.m3u8", "1/1").await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let opts = TranscodeOptions {
            ffmpeg: PathBuf::from("nonexistent_ffmpeg_xyz_12345"),
            progress: ProgressSettings {
                headless: true,
                ..Default::default()
            },
            ..options()
        };
        let supervisor = Supervisor::new(opts, CancellationToken::new());
        let err = supervisor.run("http://h/a.m3u8", "1/1").await.unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(err.is_job_local());
    }
}
