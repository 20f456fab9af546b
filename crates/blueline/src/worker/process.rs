use super::Transport;
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use log::{debug, info, trace, warn};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdin, Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The helper binary running as a child process.
///
/// A dedicated thread reads the child's stdout and forwards complete lines
/// over a channel, so reads can wait with a timeout.
pub struct HelperProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<io::Result<String>>,
    reader: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
    /// Why the helper stopped answering, once a read has seen it go.
    gone: Option<String>,
    stopped: bool,
}

impl HelperProcess {
    /// Starts the helper for the configured controller.
    pub fn spawn(config: &WorkerConfig) -> Result<Self> {
        let mut command = ProcessCommand::new(&config.helper_path);
        command
            .arg(config.iface.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        // Ctrl-C in the caller must not take the radio worker down mid-command;
        // the session shuts it down explicitly.
        unsafe {
            command.pre_exec(|| {
                libc::signal(libc::SIGINT, libc::SIG_IGN);
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|e| {
            Error::Transport(format!(
                "failed to start helper {}: {}",
                config.helper_path.display(),
                e
            ))
        })?;
        info!(
            "Started helper {} (pid {}) on {}",
            config.helper_path.display(),
            child.id(),
            config.iface_name()
        );

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("helper stdout not captured".into()))?;

        let (tx, lines) = mpsc::channel();
        let reader = thread::Builder::new()
            .name(format!("blueline-{}", config.iface_name()))
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let failed = line.is_err();
                    if tx.send(line).is_err() || failed {
                        break;
                    }
                }
            })?;

        Ok(HelperProcess {
            child,
            stdin,
            lines,
            reader: Some(reader),
            shutdown_grace: config.shutdown_grace,
            gone: None,
            stopped: false,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn exit_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    fn lost(&mut self, reason: String) -> Error {
        self.gone = Some(reason.clone());
        Error::Transport(reason)
    }

    fn wait_for_exit(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.shutdown_grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                debug!("Helper exited with {}", status);
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(
                    "Helper did not exit within {:?}, killing it",
                    self.shutdown_grace
                );
                self.child.kill()?;
                self.child.wait()?;
                return Ok(());
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl Transport for HelperProcess {
    fn send(&mut self, line: &str) -> Result<()> {
        // The child may not be reaped yet after its output closed.
        if let Some(reason) = &self.gone {
            return Err(Error::Transport(reason.clone()));
        }
        if let Some(status) = self.exit_status()? {
            return Err(Error::Transport(format!("helper exited with {}", status)));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Transport("helper input is closed".into()))?;

        writeln!(stdin, "{}", line)
            .and_then(|_| stdin.flush())
            .map_err(|e| Error::Transport(format!("writing to helper: {}", e)))?;
        debug!("-> {}", line);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        match self.lines.recv_timeout(timeout) {
            Ok(Ok(line)) => {
                trace!("<- {}", line);
                Ok(Some(line))
            }
            Ok(Err(e)) => Err(self.lost(format!("reading from helper: {}", e))),
            Err(RecvTimeoutError::Timeout) => match self.exit_status()? {
                Some(status) => Err(self.lost(format!("helper exited with {}", status))),
                None => Ok(None),
            },
            Err(RecvTimeoutError::Disconnected) => {
                Err(self.lost("helper closed its output".into()))
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        if let Some(mut stdin) = self.stdin.take() {
            if writeln!(stdin, "quit").and_then(|_| stdin.flush()).is_ok() {
                debug!("-> quit");
            }
        }
        self.wait_for_exit()?;

        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Helper reader thread panicked");
            }
        }
        info!("Helper {} stopped", self.child.id());
        Ok(())
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to stop helper: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_helper_is_a_transport_error() {
        let config = WorkerConfig::default()
            .with_helper_path(PathBuf::from("/nonexistent/blueline-helper"));
        match HelperProcess::spawn(&config) {
            Err(Error::Transport(msg)) => assert!(msg.contains("/nonexistent")),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("spawned a helper that does not exist"),
        }
    }

    #[test]
    fn test_exited_helper_is_a_transport_error() {
        // `true` ignores the interface argument and exits at once.
        let config = WorkerConfig::default()
            .with_helper_path("true")
            .with_shutdown_grace(Duration::from_millis(500));
        let mut helper = match HelperProcess::spawn(&config) {
            Ok(helper) => helper,
            Err(_) => return,
        };

        assert!(matches!(
            helper.read_line(Duration::from_secs(2)),
            Err(Error::Transport(_))
        ));
        // Fails every time once a read has seen the helper go, reaped or not
        for _ in 0..3 {
            assert!(matches!(helper.send("status"), Err(Error::Transport(_))));
        }
        helper.shutdown().unwrap();
        helper.shutdown().unwrap();
    }
}
