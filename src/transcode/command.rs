//! Builder for the transcoder invocation and the scoped process handle.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use m3u8dl_common::{Error, Result};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};

/// A builder for one transcoder invocation.
///
/// # Example
///
/// ```no_run
/// use m3u8dl::transcode::TranscodeCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> m3u8dl_common::Result<()> {
/// let mut cmd = TranscodeCommand::new(PathBuf::from("ffmpeg"));
/// cmd.args(["-y", "-i", "http://host/a.m3u8", "-c", "copy", "a.ts"]);
/// let mut handle = cmd.spawn()?;
/// let code = handle.wait().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl TranscodeCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable on top of the inherited environment.
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    /// The command line as shown in failure reports.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the process with stderr captured.
    ///
    /// The child is killed if the returned handle is dropped before it exits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] when the binary cannot be launched.
    pub fn spawn(&self) -> Result<ProcessHandle> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn(self.program.to_string_lossy(), e))?;
        let stderr = child.stderr.take();

        tracing::debug!(pid = ?child.id(), "spawned {}", self.command_line());

        Ok(ProcessHandle {
            child,
            stderr,
            output: Vec::new(),
        })
    }
}

/// One live transcoder process plus everything it wrote to stderr.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    stderr: Option<ChildStderr>,
    output: Vec<u8>,
}

impl ProcessHandle {
    /// Read the next stderr chunk into `buf`, recording it verbatim.
    ///
    /// Returns `0` at end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(stderr) = self.stderr.as_mut() else {
            return Ok(0);
        };
        let n = stderr
            .read(buf)
            .await
            .map_err(|source| Error::Stream { source })?;
        self.output.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    /// Wait for the process to exit and return its exit code.
    pub async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await?;
        Ok(exit_code(status))
    }

    /// Kill the process and reap it.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to kill transcoder: {}", e);
        }
    }

    /// Everything written to stderr so far.
    pub fn diagnostics(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Exit code of a finished process. Signal deaths map to `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
