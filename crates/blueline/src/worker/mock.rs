//! Scripted in-memory transport for unit tests

use super::Transport;
use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Shared handle: clone it before moving the transport into a session to keep
/// scripting and inspecting it from the test.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    sent: Vec<String>,
    scripts: HashMap<String, VecDeque<Vec<String>>>,
    incoming: VecDeque<String>,
    dead: bool,
    shutdowns: usize,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Queues the lines the worker prints in answer to the next command with
    /// this keyword. Repeated calls script successive commands.
    pub fn on(&self, keyword: &str, lines: &[&str]) -> &Self {
        self.state()
            .scripts
            .entry(keyword.to_string())
            .or_default()
            .push_back(lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Makes a line readable right away, as if the worker printed it unprompted.
    pub fn push_line(&self, line: &str) {
        self.state().incoming.push_back(line.to_string());
    }

    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    pub fn sent_keywords(&self) -> Vec<String> {
        self.state()
            .sent
            .iter()
            .filter_map(|l| l.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state().sent.clear();
    }

    /// Simulates the worker crashing: every later call fails.
    pub fn kill(&self) {
        self.state().dead = true;
    }

    pub fn shutdowns(&self) -> usize {
        self.state().shutdowns
    }

    /// Blocks the next read until the returned sender fires. The receiver
    /// reports when the reader has reached the gate.
    pub fn pause_next_read(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.state().gate = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

impl Transport for MockTransport {
    fn send(&mut self, line: &str) -> Result<()> {
        let mut state = self.state();
        if state.dead {
            return Err(Error::Transport("mock worker is gone".into()));
        }
        state.sent.push(line.to_string());

        let keyword = line.split_whitespace().next().unwrap_or_default();
        let script = state
            .scripts
            .get_mut(keyword)
            .and_then(|queue| queue.pop_front());
        if let Some(lines) = script {
            state.incoming.extend(lines);
        }
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>> {
        let gate = self.state().gate.take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.recv();
        }

        let mut state = self.state();
        if let Some(line) = state.incoming.pop_front() {
            return Ok(Some(line));
        }
        if state.dead {
            return Err(Error::Transport("mock worker is gone".into()));
        }
        Ok(None)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.state().shutdowns += 1;
        Ok(())
    }
}
