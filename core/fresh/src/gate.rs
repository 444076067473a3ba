//! Single-flight and time gating for freshness checkers.
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// Combined single-flight flag and completion-time gate.
///
/// Both conditions are evaluated under one lock together with the recorded
/// completion time: two callers racing the gate cannot both pass it.
pub struct CheckGate {
    state: Mutex<GateState>,
}

struct GateState {
    last_completed: Option<Instant>,
    running: bool,
}

impl CheckGate {
    pub fn new() -> CheckGate {
        CheckGate {
            state: Mutex::new(GateState {
                last_completed: None,
                running: false,
            }),
        }
    }

    /// Try to start a check.
    ///
    /// Returns `false` when a check is already in flight or the previous one
    /// completed less than `hold` ago. On `true` the caller owns the flight
    /// and must call [`CheckGate::finish`] when done.
    pub fn begin(&self, hold: Duration) -> bool {
        let mut state = self.state.lock().expect("CheckGate lock poisoned");
        if state.running {
            return false;
        }
        if let Some(last) = state.last_completed {
            if last.elapsed() < hold {
                return false;
            }
        }
        state.running = true;
        true
    }

    /// Record completion of the in-flight check.
    pub fn finish(&self) {
        let mut state = self.state.lock().expect("CheckGate lock poisoned");
        state.running = false;
        state.last_completed = Some(Instant::now());
    }
}

impl Default for CheckGate {
    fn default() -> CheckGate {
        CheckGate::new()
    }
}
