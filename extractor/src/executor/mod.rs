//! Runs an external command with an optional timeout.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Represents a command executor.
///
/// # Example
///
/// ```rust,no_run
/// # use vidgrab_extractor::utils;
/// # use std::path::PathBuf;
/// # use std::time::Duration;
/// # use vidgrab_extractor::executor::Executor;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let args = vec!["--version"];
///
/// let executor = Executor {
///     executable_path: PathBuf::from("yt-dlp"),
///     timeout: Some(Duration::from_secs(30)),
///     args: utils::to_owned(args),
/// };
///
/// let output = executor.execute().await?;
/// println!("Output: {}", output.stdout);
///
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Executor {
    /// The path to the command executable.
    pub executable_path: PathBuf,
    /// The timeout for the process, if any.
    pub timeout: Option<Duration>,

    /// The arguments to pass to the command.
    pub args: Vec<String>,
}

/// Represents the output of a process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// The stdout of the process.
    pub stdout: String,
    /// The stderr of the process.
    pub stderr: String,
    /// The exit code of the process.
    pub code: i32,
}

impl Executor {
    /// Executes the command and returns the output.
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be executed, or if the process timed out.
    pub async fn execute(&self) -> Result<ProcessOutput> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Executing command: {:?}", self);

        let mut child = self.command().spawn()?;

        // Continually read from stdout so that it does not fill up with large output and hang forever.
        let (stdout_task, stderr_task) = capture_pipes(&mut child)?;

        let exit_status = self.wait(&mut child).await?;

        let stdout = join_capture(stdout_task).await?;
        let stderr = join_capture(stderr_task).await?;

        Self::finish(exit_status, stdout, stderr)
    }

    /// Executes the command, handing every stdout and stderr line to `on_line` as soon as
    /// it is read.
    ///
    /// The callback runs on the calling task, between reads, so lines from one stream keep
    /// their order. Lines are decoded lossily; a byte sequence that is not UTF-8 never ends
    /// the run. The returned output holds the stderr text, which has also been passed to
    /// the callback.
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be executed, exited
    /// with a failure code, or timed out.
    pub async fn execute_streaming<F>(&self, mut on_line: F) -> Result<ProcessOutput>
    where
        F: FnMut(&str) + Send,
    {
        #[cfg(feature = "tracing")]
        tracing::debug!("Executing streaming command: {:?}", self);

        let mut child = self.command().spawn()?;

        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stdout".to_string()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stderr".to_string()))?;

        let mut stdout = BufReader::new(stdout_handle);
        let mut stderr = BufReader::new(stderr_handle);
        let mut stderr_text = String::new();

        let work = async {
            let (mut stdout_buf, mut stderr_buf) = (Vec::new(), Vec::new());
            let (mut stdout_open, mut stderr_open) = (true, true);

            // An interrupted `read_until` leaves its partial line in the buffer, so the
            // next call picks up where it stopped.
            while stdout_open || stderr_open {
                tokio::select! {
                    read = stdout.read_until(b'\n', &mut stdout_buf), if stdout_open => {
                        if read? == 0 {
                            stdout_open = false;
                        } else {
                            on_line(&decode_line(&stdout_buf));
                            stdout_buf.clear();
                        }
                    }
                    read = stderr.read_until(b'\n', &mut stderr_buf), if stderr_open => {
                        if read? == 0 {
                            stderr_open = false;
                        } else {
                            let line = decode_line(&stderr_buf);
                            on_line(&line);
                            stderr_text.push_str(&line);
                            stderr_text.push('\n');
                            stderr_buf.clear();
                        }
                    }
                }
            }
            child.wait().await
        };

        let exit_status = match self.timeout {
            None => work.await?,
            Some(timeout) => {
                let outcome = tokio::time::timeout(timeout, work).await;
                match outcome {
                    Ok(result) => result?,
                    Err(_) => {
                        Self::kill(&mut child).await;
                        return Err(Error::Timeout(timeout));
                    }
                }
            }
        };

        Self::finish(exit_status, String::new(), stderr_text)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable_path);
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());
        command.stdin(std::process::Stdio::null());
        // The child must not outlive a dropped request.
        command.kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            command.creation_flags(0x08000000);
        }

        command.args(&self.args);
        command
    }

    async fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                Self::kill(child).await;
                Err(Error::Timeout(timeout))
            }
        }
    }

    async fn kill(child: &mut Child) {
        #[cfg(feature = "tracing")]
        tracing::warn!("Process timed out, killing it");

        if let Err(_e) = child.kill().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to kill process after timeout: {}", _e);
        }
    }

    fn finish(exit_status: ExitStatus, stdout: String, stderr: String) -> Result<ProcessOutput> {
        let code = exit_status.code().unwrap_or(-1);
        if exit_status.success() {
            return Ok(ProcessOutput {
                stdout,
                stderr,
                code,
            });
        }

        Err(Error::Command(format!(
            "Process failed with code {}: {}",
            code,
            stderr.trim()
        )))
    }
}

type CaptureTask = tokio::task::JoinHandle<std::io::Result<String>>;

fn capture_pipes(child: &mut Child) -> Result<(CaptureTask, CaptureTask)> {
    let stdout_handle = child
        .stdout
        .take()
        .ok_or_else(|| Error::Command("Failed to capture stdout".to_string()))?;
    let stderr_handle = child
        .stderr
        .take()
        .ok_or_else(|| Error::Command("Failed to capture stderr".to_string()))?;

    Ok((
        tokio::spawn(read_all(stdout_handle)),
        tokio::spawn(read_all(stderr_handle)),
    ))
}

async fn read_all<R: AsyncRead + Unpin>(handle: R) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    tokio::io::copy(&mut BufReader::new(handle), &mut buffer).await?;
    // yt-dlp may print titles in a legacy console encoding; keep what we can.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Decodes one line read with `read_until`, dropping its line terminator.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

async fn join_capture(task: CaptureTask) -> Result<String> {
    match task.await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(Error::IO(e)),
        Err(e) => Err(Error::Runtime(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, timeout: Option<Duration>) -> Executor {
        Executor {
            executable_path: PathBuf::from("sh"),
            timeout,
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn execute_captures_stdout() {
        let output = shell("echo hello", None).execute().await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.code, 0);
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let err = shell("echo boom >&2; exit 3", None)
            .execute()
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("code 3"), "{message}");
        assert!(message.contains("boom"), "{message}");
    }

    #[tokio::test]
    async fn streaming_delivers_lines_in_order() {
        let mut seen = Vec::new();
        shell("printf 'a\\nb\\nc\\n'", None)
            .execute_streaming(|line| seen.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn streaming_reads_stderr_lines_too() {
        let mut seen = Vec::new();
        let output = shell("echo out; echo err >&2", None)
            .execute_streaming(|line| seen.push(line.to_string()))
            .await
            .unwrap();

        seen.sort();
        assert_eq!(seen, vec!["err", "out"]);
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn streaming_survives_invalid_utf8() {
        let mut seen = Vec::new();
        shell("printf 'Titel \\351t\\351\\r\\n'; echo done", None)
            .execute_streaming(|line| seen.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["Titel \u{FFFD}t\u{FFFD}", "done"]);
    }

    #[tokio::test]
    async fn streaming_failure_keeps_stderr() {
        let err = shell("echo 'ERROR: gone' >&2; exit 1", None)
            .execute_streaming(|_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ERROR: gone"), "{err}");
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let err = shell("sleep 5", Some(Duration::from_millis(100)))
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
