//! Debounced background sync.
//!
//! [`AutoSync`] owns a worker thread with an mpsc mailbox. Triggers arriving
//! inside the quiet window collapse into one run, and a trigger landing
//! while a run is in flight schedules exactly one follow-up run. There is no
//! timer machinery beyond `recv_timeout` on the mailbox.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

enum Msg {
    Trigger,
    Shutdown,
}

/// Handle on the auto-sync worker.
///
/// The runner is whatever closure the caller hands in; it is responsible for
/// its own error reporting, since nobody is waiting on its result.
pub struct AutoSync {
    sender: Sender<Msg>,
    handle: Option<JoinHandle<()>>,
}

impl AutoSync {
    /// Spawn the worker. `runner` executes once per debounced burst of
    /// triggers, on the worker thread.
    #[must_use]
    pub fn spawn(debounce: Duration, runner: impl FnMut() + Send + 'static) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = std::thread::spawn(move || worker(&receiver, debounce, runner));
        Self {
            sender,
            handle: Some(handle),
        }
    }

    /// Note a local change. Cheap and non-blocking; the run happens later,
    /// after the quiet window.
    pub fn trigger(&self) {
        let _ = self.sender.send(Msg::Trigger);
    }

    /// Stop the worker, running any pending sync first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.send(Msg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker(receiver: &Receiver<Msg>, debounce: Duration, mut runner: impl FnMut()) {
    let mut pending = false;
    loop {
        let msg = if pending {
            // Inside the quiet window: another trigger restarts it, silence
            // fires the run.
            match receiver.recv_timeout(debounce) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => {
                    pending = false;
                    runner();
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => None,
            }
        } else {
            receiver.recv().ok()
        };

        match msg {
            Some(Msg::Trigger) => pending = true,
            Some(Msg::Shutdown) | None => {
                if pending {
                    runner();
                }
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
