//! Deferred stop actions.
//!
//! A stop-with-limit command opens a flask's solenoid permanently after a
//! number of *simulated* hours. The countdown polls the warp clock instead
//! of sleeping wall time, so pausing the clock pauses every pending stop.
//! Actions are keyed by flask id and cancellable: re-registration,
//! emergency shutdown, and supervisor stop all replace or remove the
//! pending task instead of letting it fire into a torn-down vessel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use rumensim_core::time::WarpClock;
use rumensim_core::vessel::{FlaskId, SharedVesselState};

const COUNTDOWN_POLL: Duration = Duration::from_millis(100);

pub struct DeferredPurges {
    clock: Arc<WarpClock>,
    tasks: Mutex<HashMap<FlaskId, JoinHandle<()>>>,
}

impl DeferredPurges {
    pub fn new(clock: Arc<WarpClock>) -> Self {
        Self {
            clock,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule a permanent purge of `flask_id` after `duration_hours` of
    /// simulated time. Replaces any pending purge for the same flask.
    pub fn schedule(&self, flask_id: FlaskId, state: SharedVesselState, duration_hours: f64) {
        let deadline = self.clock.now()
            + ChronoDuration::milliseconds((duration_hours * 3_600_000.0) as i64);
        info!(flask_id, duration_hours, %deadline, "purge scheduled");

        let clock = Arc::clone(&self.clock);
        let task = tokio::spawn(async move {
            loop {
                if clock.now() >= deadline {
                    state.lock().set_purged();
                    info!(flask_id, "deferred purge fired, solenoid latched open");
                    return;
                }
                sleep(COUNTDOWN_POLL).await;
            }
        });

        if let Some(previous) = self.tasks.lock().insert(flask_id, task) {
            warn!(flask_id, "replacing pending purge");
            previous.abort();
        }
    }

    /// Cancel the pending purge for one flask, if any.
    pub fn cancel(&self, flask_id: FlaskId) {
        if let Some(task) = self.tasks.lock().remove(&flask_id) {
            task.abort();
            info!(flask_id, "pending purge cancelled");
        }
    }

    /// Cancel everything; called on emergency shutdown and supervisor stop.
    pub fn cancel_all(&self) {
        for (flask_id, task) in self.tasks.lock().drain() {
            task.abort();
            info!(flask_id, "pending purge cancelled");
        }
    }
}
