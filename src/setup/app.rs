use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use crate::validator::ServiceSetup;

/// How long the service gets to exit after SIGTERM before it is killed.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    StdOut,
    StdErr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub source: OutputSource,
    pub line: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to spawn `{command}`")]
    SpawningAppFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not take the {0} pipe of the service")]
    PipeAccessError(&'static str),

    #[error("failed to stop the service")]
    Terminate(#[source] std::io::Error),
}

/// The spawned service under test.
///
/// The child is spawned with `kill_on_drop`, so it never outlives this value.
pub struct AppProcess {
    child: Child,
    output: Arc<Mutex<Vec<OutputLine>>>,
}

pub fn spawn(setup: &ServiceSetup, stream_app: bool) -> Result<AppProcess, AppError> {
    let output = Arc::new(Mutex::new(Vec::new()));

    let mut child = Command::new(&setup.command)
        .args(&setup.args)
        .envs(&setup.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AppError::SpawningAppFailed {
            command: setup.command.clone(),
            source,
        })?;

    debug!(pid = child.id(), command = %setup.command, "spawned service");

    let stdout = child
        .stdout
        .take()
        .ok_or(AppError::PipeAccessError("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(AppError::PipeAccessError("stderr"))?;

    capture(stdout, OutputSource::StdOut, output.clone(), stream_app);
    capture(stderr, OutputSource::StdErr, output.clone(), stream_app);

    Ok(AppProcess { child, output })
}

fn capture<T>(
    pipe: T,
    source: OutputSource,
    buffer: Arc<Mutex<Vec<OutputLine>>>,
    stream_app: bool,
) where
    T: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut raw = Vec::new();

        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(error) => {
                    // Keep the pipe drained or the service blocks on a full buffer.
                    warn!(%error, ?source, "can't read service output, discarding the rest");
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }

            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(['\n', '\r'])
                .to_string();

            if stream_app {
                match source {
                    OutputSource::StdOut => println!("[ STDOUT ] {line}"),
                    OutputSource::StdErr => println!("[ STDERR ] {line}"),
                }
            }

            buffer.lock().await.push(OutputLine { source, line });
        }
    });
}

impl AppProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn output(&self) -> Arc<Mutex<Vec<OutputLine>>> {
        self.output.clone()
    }

    /// Asks the service to stop, then kills it if it has not exited within
    /// [`TERMINATION_GRACE`].
    pub async fn terminate(&mut self) -> Result<(), AppError> {
        if let Some(status) = self.child.try_wait().map_err(AppError::Terminate)? {
            debug!(%status, "service had already exited");
            return Ok(());
        }

        if send_sigterm(&self.child) {
            match tokio::time::timeout(TERMINATION_GRACE, self.child.wait()).await {
                Ok(status) => {
                    let status = status.map_err(AppError::Terminate)?;
                    debug!(%status, "service stopped");
                    return Ok(());
                }
                Err(_) => warn!("service ignored SIGTERM for {TERMINATION_GRACE:?}, killing it"),
            }
        }

        self.child.kill().await.map_err(AppError::Terminate)
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };

    // SAFETY: `pid` is our own child and it has not been reaped yet, since
    // `Child::id` returns `None` once it has.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}
