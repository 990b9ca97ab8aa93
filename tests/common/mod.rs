//! Shared helpers for integration tests.
//!
//! [`FakeFfmpeg`] writes a shell script that stands in for ffmpeg. It takes
//! the input URL and output path from its arguments, emits a canned
//! diagnostic stream on stderr and exits with a status chosen by the URL.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A scratch directory holding a fake ffmpeg and an output directory.
pub struct FakeFfmpeg {
    pub dir: TempDir,
    pub script: PathBuf,
    pub output_dir: PathBuf,
}

impl FakeFfmpeg {
    /// Install the script.
    ///
    /// - URLs containing `fail` print `Error: x` and exit 137.
    /// - URLs containing `proxy` print the proxy they saw and exit 1.
    /// - URLs containing `slow` stall for ten seconds before finishing.
    /// - URLs containing `paced` stall before the duration and between
    ///   positions.
    /// - Everything else reports a duration and three positions, then
    ///   writes its output file.
    pub fn install() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffmpeg");
        let output_dir = dir.path().join("out");
        std::fs::create_dir(&output_dir).unwrap();

        std::fs::write(&script, SCRIPT).unwrap();
        make_executable(&script);

        Self {
            dir,
            script,
            output_dir,
        }
    }

    /// Write a queue file with the given lines.
    pub fn queue(&self, lines: &[&str]) -> PathBuf {
        let path = self.dir.path().join("list.txt");
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

// Arguments arrive as `-y -i URL -c copy OUTPUT`.
const SCRIPT: &str = r#"#!/bin/sh
url="$3"
out="$6"
echo "ffmpeg version n-fake Copyright (c) the FFmpeg developers" >&2
echo "  built with fake" >&2
echo "  configuration: --fake" >&2
case "$url" in
  *fail*)
    echo "Error: x" >&2
    exit 137
    ;;
  *proxy*)
    echo "Error: proxy=$http_proxy" >&2
    exit 1
    ;;
  *slow*)
    sleep 10
    ;;
esac
pause() {
  case "$url" in
    *paced*) sleep 0.3 ;;
  esac
}
pause
echo "Input #0, hls, from '$url':" >&2
echo "  Duration: 00:00:02.00, start: 0.000000, bitrate: 0 kb/s" >&2
pause
printf 'frame=1 time=00:00:00.50 bitrate=1.0kbits/s\r' >&2
pause
printf 'frame=2 time=00:00:01.00 bitrate=1.0kbits/s\r' >&2
pause
printf 'payload' > "$out"
printf 'frame=3 time=00:00:02.00 bitrate=1.0kbits/s\n' >&2
exit 0
"#;

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
