// ABOUTME: Cooperative pause gate for suspending a task loop between iterations
// ABOUTME: watch-channel pair so a controller can pause/resume a running session

use tokio::sync::watch;

/// Controller half of a pause gate. Held by whoever supervises the session.
pub struct PauseControl {
    tx: watch::Sender<bool>,
}

/// Session half of a pause gate. The task loop awaits `wait_if_paused` once
/// per iteration before issuing a model call.
#[derive(Clone)]
pub struct PauseGate {
    rx: watch::Receiver<bool>,
}

/// Create a linked controller/gate pair, initially unpaused.
pub fn pause_pair() -> (PauseControl, PauseGate) {
    let (tx, rx) = watch::channel(false);
    (PauseControl { tx }, PauseGate { rx })
}

impl PauseControl {
    pub fn pause(&self) {
        let _ = self.tx.send(true);
    }

    pub fn resume(&self) {
        let _ = self.tx.send(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }
}

impl PauseGate {
    /// Suspend until the controller resumes. Returns immediately when not
    /// paused. A dropped controller unblocks permanently.
    pub async fn wait_if_paused(&mut self) {
        loop {
            if !*self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for PauseGate {
    /// A gate that never pauses (controller is dropped immediately).
    fn default() -> Self {
        let (_control, gate) = pause_pair();
        gate
    }
}
