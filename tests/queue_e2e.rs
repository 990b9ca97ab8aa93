//! Queue runs against a fake transcoder.

#![cfg(unix)]

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::FakeFfmpeg;
use m3u8dl::progress::ProgressEvent;
use m3u8dl::queue::Queue;
use m3u8dl::transcode::{ProgressSettings, Supervisor, TranscodeOptions};
use m3u8dl_common::Error;
use tokio_util::sync::CancellationToken;

fn options(fake: &FakeFfmpeg, proxy: Option<&str>) -> TranscodeOptions {
    TranscodeOptions {
        ffmpeg: fake.script.clone(),
        proxy: proxy.map(str::to_string),
        extension: "ts".to_string(),
        output_dir: Some(fake.output_dir.clone()),
        progress: ProgressSettings {
            headless: true,
            ..Default::default()
        },
    }
}

fn supervisor(fake: &FakeFfmpeg) -> Supervisor {
    Supervisor::new(options(fake, None), CancellationToken::new())
}

#[tokio::test]
async fn failed_entry_stays_in_queue() {
    let fake = FakeFfmpeg::install();
    let list = fake.queue(&["http://h/v/first.m3u8", "http://h/v/fail.m3u8"]);
    let mut supervisor = supervisor(&fake);

    let mut queue = Queue::load(&list).unwrap();
    let summary = queue.run(&mut supervisor).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.completed, vec!["http://h/v/first.m3u8"]);
    assert_eq!(summary.failed, vec!["http://h/v/fail.m3u8"]);
    assert_eq!(std::fs::read_to_string(&list).unwrap(), "http://h/v/fail.m3u8");
    assert_eq!(std::fs::read(fake.output("first.ts")).unwrap(), b"payload");
    assert!(!fake.output("fail.ts").exists());
}

#[tokio::test]
async fn failure_report_strips_banner() {
    let fake = FakeFfmpeg::install();
    let supervisor = supervisor(&fake);

    let err = supervisor.run("http://h/fail.m3u8", "").await.unwrap_err();

    assert_matches!(&err, Error::Transcode(report) => {
        assert_eq!(report.code, 137);
        assert!(report.command.contains(" -y -i http://h/fail.m3u8 -c copy "));
        assert_eq!(report.stderr, "Error: x");
    });
    let text = err.report();
    assert!(text.starts_with("Transcode error (exit code 137)\n"));
    assert!(text.ends_with("\nError: x"));
}

#[tokio::test]
async fn completed_job_reports_output() {
    let fake = FakeFfmpeg::install();
    let supervisor = supervisor(&fake);

    let done = supervisor
        .run("http://h/a/clip.m3u8?token=1", "1/1")
        .await
        .unwrap();

    assert_eq!(done.url, "http://h/a/clip.m3u8?token=1");
    assert_eq!(done.output, fake.output("clip.ts"));
    assert!(done.output.exists());
}

#[tokio::test]
async fn proxy_is_exported_to_transcoder() {
    let fake = FakeFfmpeg::install();
    let supervisor = Supervisor::new(
        options(&fake, Some("127.0.0.1:9")),
        CancellationToken::new(),
    );

    let err = supervisor.run("http://h/proxy.m3u8", "").await.unwrap_err();

    assert_matches!(err, Error::Transcode(report) => {
        assert_eq!(report.code, 1);
        assert_eq!(report.stderr, "Error: proxy=http://127.0.0.1:9");
    });
}

#[tokio::test]
async fn cancellation_interrupts_the_run() {
    let fake = FakeFfmpeg::install();
    let list = fake.queue(&["http://h/slow.m3u8", "http://h/b.m3u8"]);
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(options(&fake, None), cancel.clone());
    let mut queue = Queue::load(&list).unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let err = queue.run(&mut supervisor).await.unwrap_err();

    assert_matches!(err, Error::Interrupted);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        std::fs::read_to_string(&list).unwrap(),
        "http://h/slow.m3u8\nhttp://h/b.m3u8"
    );
}

#[tokio::test]
async fn progress_follows_duration_and_positions() {
    let fake = FakeFfmpeg::install();
    let mut options = options(&fake, None);
    options.progress.spinner_interval = Duration::from_millis(20);
    options.progress.throttle = Duration::ZERO;
    let supervisor = Supervisor::new(options, CancellationToken::new());
    let mut events = supervisor.subscribe();

    supervisor.run("http://h/paced.m3u8", "1/1").await.unwrap();

    let events: Vec<ProgressEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    let lines: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Update(line) => Some(line.as_str()),
            ProgressEvent::Finish => None,
        })
        .collect();

    // Bar lines are framed; spinner lines are the waiting text plus a glyph.
    let first_bar = lines
        .iter()
        .position(|line| line.starts_with('⸨'))
        .expect("bar drawn once the duration is known");
    assert!(first_bar > 0, "spinner runs while the duration is unknown");
    assert!(lines[..first_bar]
        .iter()
        .all(|line| line.starts_with("1/1 http://h/paced.m3u8 ")));
    assert!(lines[first_bar..].iter().all(|line| line.starts_with('⸨')));

    let finishes = events
        .iter()
        .filter(|e| **e == ProgressEvent::Finish)
        .count();
    assert_eq!(finishes, 1);
    assert_eq!(events.last(), Some(&ProgressEvent::Finish));
}
