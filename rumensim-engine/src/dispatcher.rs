//! Control command dispatcher.
//!
//! One task drains the command source and applies every mutation of shared
//! state (clock, vessel thresholds, solenoids) itself, under the per-vessel
//! locks. Rejections are never silent: each one logs the assay/flask id and
//! the reason, and bumps the rejected-commands counter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use rumensim_config::SafetyConfig;
use rumensim_core::thermal;
use rumensim_core::time::WarpClock;
use rumensim_core::vessel::FlaskId;
use rumensim_telemetry::MetricsRecorder;
use rumensim_transport::{CommandSource, InboundMessage};

use crate::command::ControlCommand;
use crate::deferred::DeferredPurges;
use crate::vessel::VesselHandle;

pub struct Dispatcher {
    clock: Arc<WarpClock>,
    handles: Arc<HashMap<FlaskId, VesselHandle>>,
    purges: Arc<DeferredPurges>,
    safety: SafetyConfig,
    namespace: String,
    metrics: MetricsRecorder,
}

impl Dispatcher {
    pub fn new(
        clock: Arc<WarpClock>,
        handles: Arc<HashMap<FlaskId, VesselHandle>>,
        purges: Arc<DeferredPurges>,
        safety: SafetyConfig,
        namespace: String,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            clock,
            handles,
            purges,
            safety,
            namespace,
            metrics,
        }
    }

    /// Drain the source until it closes or the running flag clears.
    pub async fn run<S: CommandSource>(self, mut source: S, mut running: watch::Receiver<bool>) {
        info!("control dispatcher started");
        loop {
            tokio::select! {
                message = source.next_message() => match message {
                    Some(message) => self.handle(message),
                    None => {
                        info!("command source closed, dispatcher exiting");
                        break;
                    }
                },
                changed = running.changed() => {
                    if changed.is_err() || !*running.borrow() {
                        break;
                    }
                }
            }
        }
    }

    fn handle(&self, message: InboundMessage) {
        match ControlCommand::parse(&self.namespace, &message.topic, &message.payload) {
            Ok(command) => {
                info!(topic = %message.topic, ?command, "control command received");
                self.apply(command);
            }
            Err(error) => {
                self.metrics.rejected_commands.inc();
                warn!(topic = %message.topic, %error, "control message dropped");
            }
        }
    }

    /// Apply one parsed command to the clock and/or vessel states.
    pub fn apply(&self, command: ControlCommand) {
        match command {
            ControlCommand::SpeedChange { speed } => self.apply_speed(speed),
            ControlCommand::Pause => {
                self.clock.pause();
                info!("simulation paused");
            }
            ControlCommand::Resume => {
                self.clock.resume();
                info!("simulation resumed");
            }
            ControlCommand::StartWithDelay {
                assay_id,
                delay_seconds,
            } => self.apply_start_with_delay(&assay_id, delay_seconds),
            ControlCommand::StopWithLimit {
                assay_id,
                flask_id,
                duration_hours,
            } => self.apply_stop_with_limit(&assay_id, flask_id, duration_hours),
            ControlCommand::EmergencyShutdown { assay_id } => self.apply_emergency(&assay_id),
            ControlCommand::ReliefConfig {
                assay_id,
                relief_pressure,
                warning_threshold,
            } => self.apply_relief_config(&assay_id, relief_pressure, warning_threshold),
            ControlCommand::InitialConfig {
                flask_id,
                accumulated_pressure,
                total_volume_ml,
                solution_volume_ml,
                temperature_c,
            } => self.apply_initial_config(
                flask_id,
                accumulated_pressure,
                total_volume_ml,
                solution_volume_ml,
                temperature_c,
            ),
        }
    }

    fn apply_speed(&self, speed: f64) {
        if speed <= 0.0 || !speed.is_finite() {
            self.metrics.rejected_commands.inc();
            error!(speed, "speed change rejected: multiplier must be positive");
            return;
        }
        let clamped = speed.max(self.safety.min_speed);
        if clamped != speed {
            warn!(
                requested = speed,
                applied = clamped,
                "speed change clamped to configured minimum"
            );
        }
        if let Err(error) = self.clock.set_speed(clamped) {
            self.metrics.rejected_commands.inc();
            error!(%error, "speed change rejected");
            return;
        }
        info!(speed = clamped, "simulation speed changed");
    }

    /// Equalization start: vent all of the assay's flasks, hold for a real
    /// wall-clock delay, then seal them at fill pressure. The hold runs on
    /// its own task so the dispatcher keeps draining commands.
    fn apply_start_with_delay(&self, assay_id: &str, delay_seconds: u64) {
        let vessels = self.assay_vessels(assay_id);
        if vessels.is_empty() {
            self.metrics.rejected_commands.inc();
            warn!(assay_id, "start-with-delay dropped: no such assay");
            return;
        }

        info!(assay_id, delay_seconds, "equalization started");
        for handle in &vessels {
            handle.state.lock().solenoid_open = true;
        }

        let assay_id = assay_id.to_string();
        tokio::spawn(async move {
            sleep(Duration::from_secs(delay_seconds)).await;
            for handle in &vessels {
                let mut state = handle.state.lock();
                state.close_solenoid();
                state.baseline_bar = handle.fill_bar;
            }
            info!(assay_id = %assay_id, "equalization complete, flasks sealed");
        });
    }

    fn apply_stop_with_limit(&self, assay_id: &str, flask_id: FlaskId, duration_hours: f64) {
        match self.handles.get(&flask_id) {
            Some(handle) if handle.assay_id == assay_id => {
                self.purges
                    .schedule(flask_id, Arc::clone(&handle.state), duration_hours);
            }
            _ => {
                self.metrics.rejected_commands.inc();
                warn!(assay_id, flask_id, "stop-with-limit dropped: no such flask");
            }
        }
    }

    fn apply_emergency(&self, assay_id: &str) {
        let vessels = self.assay_vessels(assay_id);
        if vessels.is_empty() {
            self.metrics.rejected_commands.inc();
            warn!(assay_id, "emergency shutdown dropped: no such assay");
            return;
        }

        error!(assay_id, "EMERGENCY SHUTDOWN: venting all flasks");
        for handle in &vessels {
            self.purges.cancel(handle.flask_id);
            handle.state.lock().set_emergency();
        }
    }

    fn apply_relief_config(&self, assay_id: &str, relief_bar: f64, warning_bar: f64) {
        if relief_bar > self.safety.ceiling {
            self.metrics.rejected_commands.inc();
            error!(
                assay_id,
                relief_bar,
                ceiling = self.safety.ceiling,
                "relief config rejected: threshold above safety ceiling, vessels can rupture"
            );
            return;
        }

        let vessels = self.assay_vessels(assay_id);
        if vessels.is_empty() {
            self.metrics.rejected_commands.inc();
            warn!(assay_id, "relief config dropped: no such assay");
            return;
        }

        for handle in &vessels {
            handle.state.lock().valve.set_thresholds(relief_bar, warning_bar);
        }
        info!(assay_id, relief_bar, warning_bar, "relief thresholds updated");
    }

    fn apply_initial_config(
        &self,
        flask_id: FlaskId,
        accumulated_bar: f64,
        total_ml: f64,
        solution_ml: f64,
        temperature_c: f64,
    ) {
        if temperature_c <= -thermal::ZERO_CELSIUS_K {
            self.metrics.rejected_commands.inc();
            error!(flask_id, temperature_c, "initial config rejected: temperature below absolute zero");
            return;
        }
        let Some(handle) = self.handles.get(&flask_id) else {
            self.metrics.rejected_commands.inc();
            warn!(flask_id, "initial config dropped: no such flask");
            return;
        };

        let headspace_l = thermal::headspace_liters(total_ml, solution_ml);
        let moles = thermal::moles(accumulated_bar, headspace_l, temperature_c);

        let mut state = handle.state.lock();
        state.temperature_c = temperature_c;
        state.headspace_liters = Some(headspace_l);
        state.moles = Some(moles);

        info!(
            flask_id,
            headspace_l,
            kelvin = thermal::kelvin(temperature_c),
            moles,
            "initial vessel configuration applied"
        );
    }

    fn assay_vessels(&self, assay_id: &str) -> Vec<VesselHandle> {
        self.handles
            .values()
            .filter(|h| h.assay_id == assay_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use rumensim_core::model::KineticParams;
    use rumensim_core::relief::ReliefValve;
    use rumensim_core::vessel::{VesselConfig, VesselState};

    fn handle(flask_id: FlaskId, assay_id: &str) -> VesselHandle {
        let config = VesselConfig {
            flask_id,
            assay_id: assay_id.into(),
            params: KineticParams {
                a: 1.8,
                mu: 0.12,
                lambda: 2.5,
            },
            baseline_bar: 1.0,
            nominal_temp_c: 39.0,
        };
        VesselHandle {
            flask_id,
            assay_id: assay_id.into(),
            fill_bar: 1.0,
            state: Arc::new(Mutex::new(VesselState::new(
                &config,
                ReliefValve::new(1.5, 4.5),
                Utc::now(),
            ))),
        }
    }

    fn dispatcher(handles: Vec<VesselHandle>) -> Dispatcher {
        let clock = Arc::new(WarpClock::new(1.0).unwrap());
        let map: HashMap<_, _> = handles.into_iter().map(|h| (h.flask_id, h)).collect();
        Dispatcher::new(
            Arc::clone(&clock),
            Arc::new(map),
            Arc::new(DeferredPurges::new(clock)),
            SafetyConfig::default(),
            "rumen".into(),
            MetricsRecorder::new(),
        )
    }

    #[tokio::test]
    async fn speed_change_is_clamped_to_minimum() {
        let d = dispatcher(vec![handle(1, "SAQ0505")]);
        d.apply(ControlCommand::SpeedChange { speed: 0.25 });
        assert_eq!(d.clock.speed(), 1.0);

        d.apply(ControlCommand::SpeedChange { speed: 60.0 });
        assert_eq!(d.clock.speed(), 60.0);
    }

    #[tokio::test]
    async fn non_positive_speed_leaves_clock_unchanged() {
        let d = dispatcher(vec![handle(1, "SAQ0505")]);
        d.apply(ControlCommand::SpeedChange { speed: 60.0 });
        d.apply(ControlCommand::SpeedChange { speed: -3.0 });
        d.apply(ControlCommand::SpeedChange { speed: 0.0 });
        assert_eq!(d.clock.speed(), 60.0);
        assert_eq!(d.metrics.rejected_commands.get() as u64, 2);
    }

    #[tokio::test]
    async fn pause_and_resume_drive_the_clock() {
        let d = dispatcher(vec![handle(1, "SAQ0505")]);
        d.apply(ControlCommand::Pause);
        assert!(d.clock.is_paused());
        d.apply(ControlCommand::Resume);
        assert!(!d.clock.is_paused());
    }

    #[tokio::test]
    async fn relief_config_above_ceiling_is_rejected() {
        let d = dispatcher(vec![handle(1, "SAQ0505")]);
        d.apply(ControlCommand::ReliefConfig {
            assay_id: "SAQ0505".into(),
            relief_pressure: 5.5,
            warning_threshold: 4.5,
        });
        let state = d.handles[&1].state.lock();
        assert_eq!(state.valve.relief_threshold(), 1.5);
        drop(state);
        assert_eq!(d.metrics.rejected_commands.get() as u64, 1);
    }

    #[tokio::test]
    async fn relief_config_updates_every_assay_flask() {
        let d = dispatcher(vec![handle(1, "SAQ0505"), handle(2, "SAQ0505"), handle(3, "other")]);
        d.apply(ControlCommand::ReliefConfig {
            assay_id: "SAQ0505".into(),
            relief_pressure: 2.0,
            warning_threshold: 4.0,
        });
        assert_eq!(d.handles[&1].state.lock().valve.relief_threshold(), 2.0);
        assert_eq!(d.handles[&2].state.lock().valve.relief_threshold(), 2.0);
        assert_eq!(d.handles[&3].state.lock().valve.relief_threshold(), 1.5);
    }

    #[tokio::test]
    async fn emergency_latches_assay_flasks() {
        let d = dispatcher(vec![handle(1, "SAQ0505"), handle(2, "other")]);
        d.apply(ControlCommand::EmergencyShutdown {
            assay_id: "SAQ0505".into(),
        });
        assert!(d.handles[&1].state.lock().emergency());
        assert!(d.handles[&1].state.lock().solenoid_open);
        assert!(!d.handles[&2].state.lock().emergency());
    }

    #[tokio::test]
    async fn initial_config_derives_headspace_and_moles() {
        let d = dispatcher(vec![handle(1, "SAQ0505")]);
        d.apply(ControlCommand::InitialConfig {
            flask_id: 1,
            accumulated_pressure: 1.2,
            total_volume_ml: 350.0,
            solution_volume_ml: 200.0,
            temperature_c: 39.0,
        });
        let state = d.handles[&1].state.lock();
        let headspace = state.headspace_liters.unwrap();
        let moles = state.moles.unwrap();
        assert!((headspace - 0.150).abs() < 1e-12);
        assert!((moles - 1.2 * 0.150 / (thermal::GAS_CONSTANT_L_BAR * 312.15)).abs() < 1e-9);
        assert_eq!(state.temperature_c, 39.0);
    }

    #[tokio::test]
    async fn start_with_delay_vents_then_seals() {
        let d = dispatcher(vec![handle(1, "SAQ0505")]);
        d.apply(ControlCommand::StartWithDelay {
            assay_id: "SAQ0505".into(),
            delay_seconds: 0,
        });
        assert!(d.handles[&1].state.lock().solenoid_open);

        sleep(Duration::from_millis(100)).await;
        let state = d.handles[&1].state.lock();
        assert!(!state.solenoid_open);
        assert_eq!(state.baseline_bar, 1.0);
    }

    #[tokio::test]
    async fn unknown_targets_are_dropped_with_a_log() {
        let d = dispatcher(vec![handle(1, "SAQ0505")]);
        d.apply(ControlCommand::StopWithLimit {
            assay_id: "SAQ0505".into(),
            flask_id: 9,
            duration_hours: 1.0,
        });
        d.apply(ControlCommand::EmergencyShutdown {
            assay_id: "nope".into(),
        });
        assert_eq!(d.metrics.rejected_commands.get() as u64, 2);
    }
}
