//! Per-flask simulation task.
//!
//! `VesselRuntime::sample_at` is the whole tick computation as a pure
//! function of the simulated instant (and the vessel's rng), so the physics
//! path is testable without a running clock or sink. `run` wraps it in the
//! scheduled loop: pause gate, publish, floor-bounded sleep, fault backoff.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use rumensim_core::model::GompertzModel;
use rumensim_core::record::{
    round_to, AlertRecord, AlertSeverity, Reading, TelemetryEvent, TelemetryRecord,
};
use rumensim_core::time::WarpClock;
use rumensim_core::vessel::{measurement_noise, FlaskId, SharedVesselState, VesselConfig};
use rumensim_core::{thermal, SimulationError};
use rumensim_telemetry::MetricsRecorder;
use rumensim_transport::{topic, TelemetrySink};

/// Spread of the simulated incubator temperature around nominal (°C).
const TEMP_JITTER_STD_C: f64 = 0.5;
const TEMP_JITTER_CLAMP_C: f64 = 1.0;

/// Backoff after a failed tick before the loop tries again.
const TICK_FAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Re-check cadence while paused.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// The dispatcher's view of one flask.
#[derive(Debug, Clone)]
pub struct VesselHandle {
    pub flask_id: FlaskId,
    pub assay_id: String,
    /// Fill pressure restored when an equalization completes (bar).
    pub fill_bar: f64,
    pub state: SharedVesselState,
}

/// Output of one tick.
#[derive(Debug, Clone)]
pub struct Sample {
    pub record: TelemetryRecord,
    pub alert: Option<AlertRecord>,
}

pub struct VesselRuntime {
    config: VesselConfig,
    model: GompertzModel,
    state: SharedVesselState,
    clock: Arc<WarpClock>,
    sink: Arc<dyn TelemetrySink>,
    metrics: MetricsRecorder,
    namespace: String,
    noise_fraction: f64,
    sampling_interval_s: f64,
    tick_floor: Duration,
    rng: SmallRng,
}

impl VesselRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: VesselConfig,
        state: SharedVesselState,
        clock: Arc<WarpClock>,
        sink: Arc<dyn TelemetrySink>,
        metrics: MetricsRecorder,
        namespace: String,
        noise_fraction: f64,
        sampling_interval_s: f64,
        tick_floor: Duration,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        let model = GompertzModel::new(config.params, config.baseline_bar)?;
        Ok(Self {
            rng: SmallRng::seed_from_u64(seed ^ u64::from(config.flask_id)),
            config,
            model,
            state,
            clock,
            sink,
            metrics,
            namespace,
            noise_fraction,
            sampling_interval_s,
            tick_floor,
        })
    }

    /// Compute one tick at `sim_time` and update the vessel state.
    ///
    /// With `noise_fraction = 0` the result is fully deterministic.
    pub fn sample_at(&mut self, sim_time: DateTime<Utc>) -> Sample {
        let speed = self.clock.speed();
        let mut state = self.state.lock();

        let elapsed_h =
            (sim_time - state.start_time).num_milliseconds() as f64 / 3_600_000.0;

        let raw = self.model.pressure_at(elapsed_h);
        let noise = measurement_noise(&mut self.rng, raw, state.baseline_bar, self.noise_fraction);
        let measured = (raw + noise).max(state.baseline_bar);

        let temperature =
            sample_temperature(&mut self.rng, self.noise_fraction, state.temperature_c);

        let (pressure, relieved) = if state.solenoid_open {
            // Vented vessel: the headspace sits at fill pressure and the
            // relief valve has nothing to do.
            (state.baseline_bar, false)
        } else {
            let baseline_bar = state.baseline_bar;
            let outcome = state.valve.check(measured, baseline_bar, sim_time);
            (outcome.pressure, outcome.relieved)
        };

        let warning = !state.solenoid_open && !relieved && state.valve.exceeds_warning(measured);

        let p_abs = round_to(pressure, 3);
        let accum = match state.last_sim_time {
            Some(prev) => accumulation_rate(state.last_pressure, prev, p_abs, sim_time),
            None => 0.0,
        };

        let record = TelemetryRecord::from_reading(Reading {
            assay_id: self.config.assay_id.clone(),
            flask_id: self.config.flask_id,
            ts: sim_time,
            p_bar_abs: pressure,
            t_c: temperature,
            p_bar_std: thermal::normalize(pressure, temperature),
            accum_bar_per_h: accum,
            relief_count: state.valve.count(),
            time_elapsed_h: elapsed_h,
            speed_multiplier: speed,
            event: relieved.then_some(TelemetryEvent::Relief),
        });

        // Invariant: the state's last pressure is the P_bar_abs of the most
        // recently emitted record, feeding the next accumulation rate.
        state.last_pressure = record.p_bar_abs;
        state.last_sim_time = Some(sim_time);

        let alert = if relieved {
            Some(AlertSeverity::High)
        } else if warning {
            Some(AlertSeverity::Medium)
        } else {
            None
        }
        .map(|severity| AlertRecord {
            record: record.clone(),
            severity,
        });

        Sample { record, alert }
    }

    /// Scheduled loop for one flask. Exits when the running flag clears.
    pub async fn run(mut self, mut running: watch::Receiver<bool>) {
        info!(
            flask_id = self.config.flask_id,
            assay_id = %self.config.assay_id,
            a = self.config.params.a,
            mu = self.config.params.mu,
            lambda = self.config.params.lambda,
            "flask simulation started"
        );

        while *running.borrow() {
            if self.clock.is_paused() {
                tokio::select! {
                    _ = sleep(PAUSE_POLL) => {}
                    changed = running.changed() => if changed.is_err() { break },
                }
                continue;
            }

            if let Err(error) = self.tick().await {
                warn!(
                    flask_id = self.config.flask_id,
                    assay_id = %self.config.assay_id,
                    %error,
                    "tick failed, backing off"
                );
                tokio::select! {
                    _ = sleep(TICK_FAULT_BACKOFF) => {}
                    changed = running.changed() => if changed.is_err() { break },
                }
                continue;
            }

            let pace = self.sampling_interval_s / self.clock.speed();
            let interval = Duration::from_secs_f64(pace.max(0.0)).max(self.tick_floor);
            tokio::select! {
                _ = sleep(interval) => {}
                changed = running.changed() => if changed.is_err() { break },
            }
        }

        debug!(flask_id = self.config.flask_id, "flask simulation stopped");
    }

    async fn tick(&mut self) -> Result<(), SimulationError> {
        let timer = self.metrics.tick_duration.start_timer();
        let sim_time = self.clock.now();

        // The clock only stands still across a pause; emitting two records
        // at one instant would break per-flask ordering, so skip the tick.
        if self.state.lock().last_sim_time.is_some_and(|prev| sim_time <= prev) {
            timer.observe_duration();
            return Ok(());
        }

        let sample = self.sample_at(sim_time);
        timer.observe_duration();

        let payload = serde_json::to_vec(&sample.record)
            .map_err(|e| SimulationError::Processing(e.to_string()))?;
        let telemetry_topic = topic::telemetry(
            &self.namespace,
            &self.config.assay_id,
            self.config.flask_id,
        );
        self.publish(&telemetry_topic, payload.into()).await;
        self.metrics.published_records.inc();

        if let Some(alert) = &sample.alert {
            if alert.severity == AlertSeverity::High {
                self.metrics.relief_events.inc();
            }
            let payload = serde_json::to_vec(alert)
                .map_err(|e| SimulationError::Processing(e.to_string()))?;
            let alert_topic = topic::alert(
                &self.namespace,
                &self.config.assay_id,
                self.config.flask_id,
            );
            self.publish(&alert_topic, payload.into()).await;
            self.metrics.published_alerts.inc();
        }

        Ok(())
    }

    /// Publish one payload; a failure is logged and the tick dropped, the
    /// transport owns any delivery guarantee beyond that.
    async fn publish(&self, publish_topic: &str, payload: Bytes) {
        if let Err(error) = self.sink.publish(publish_topic, payload).await {
            self.metrics.publish_failures.inc();
            warn!(
                flask_id = self.config.flask_id,
                assay_id = %self.config.assay_id,
                topic = publish_topic,
                %error,
                "publish failed, record dropped"
            );
        }
    }
}

/// Incubator temperature for one reading: nominal plus clamped Gaussian
/// drift, or exactly nominal when the run is noise-free.
fn sample_temperature(rng: &mut SmallRng, noise_fraction: f64, nominal_c: f64) -> f64 {
    if noise_fraction <= 0.0 {
        return nominal_c;
    }
    let jitter = Normal::new(0.0, TEMP_JITTER_STD_C)
        .map(|dist| dist.sample(rng))
        .unwrap_or(0.0);
    (nominal_c + jitter).clamp(
        nominal_c - TEMP_JITTER_CLAMP_C,
        nominal_c + TEMP_JITTER_CLAMP_C,
    )
}

/// Gas accumulation rate in bar/h between consecutive emitted records.
/// Zero for the first tick and for a degenerate (empty) interval.
pub fn accumulation_rate(
    prev_pressure: f64,
    prev_ts: DateTime<Utc>,
    pressure: f64,
    ts: DateTime<Utc>,
) -> f64 {
    let dt_hours = (ts - prev_ts).num_milliseconds() as f64 / 3_600_000.0;
    if dt_hours <= 0.0 {
        return 0.0;
    }
    (pressure - prev_pressure) / dt_hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use rumensim_core::model::KineticParams;
    use rumensim_core::relief::ReliefValve;
    use rumensim_core::vessel::VesselState;
    use rumensim_transport::LogSink;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 5, 8, 0, 0).unwrap()
    }

    fn runtime(noise_fraction: f64) -> VesselRuntime {
        let config = VesselConfig {
            flask_id: 1,
            assay_id: "SAQ0505".into(),
            params: KineticParams {
                a: 1.8,
                mu: 0.12,
                lambda: 2.5,
            },
            baseline_bar: 1.0,
            nominal_temp_c: 39.0,
        };
        let state = Arc::new(Mutex::new(VesselState::new(
            &config,
            ReliefValve::new(1.5, 4.5),
            start(),
        )));
        VesselRuntime::new(
            config,
            state,
            Arc::new(WarpClock::new(1.0).unwrap()),
            Arc::new(LogSink),
            MetricsRecorder::new(),
            "rumen".into(),
            noise_fraction,
            900.0,
            Duration::from_millis(100),
            42,
        )
        .unwrap()
    }

    fn at_hours(h: f64) -> DateTime<Utc> {
        start() + chrono::Duration::milliseconds((h * 3_600_000.0) as i64)
    }

    #[test]
    fn accumulation_rate_between_ticks() {
        let rate = accumulation_rate(1.0, at_hours(0.0), 1.2, at_hours(0.25));
        assert!((rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn accumulation_rate_degenerate_interval_is_zero() {
        assert_eq!(accumulation_rate(1.0, at_hours(1.0), 1.2, at_hours(1.0)), 0.0);
    }

    #[test]
    fn first_tick_has_zero_rate_and_no_event() {
        let mut rt = runtime(0.0);
        let sample = rt.sample_at(at_hours(1.0));
        assert_eq!(sample.record.accum_bar_per_h, 0.0);
        assert_eq!(sample.record.p_bar_abs, 1.0);
        assert_eq!(sample.record.relief_count, 0);
        assert!(sample.record.event.is_none());
        assert!(sample.alert.is_none());
    }

    #[test]
    fn relief_fires_once_raw_curve_crosses_threshold() {
        let mut rt = runtime(0.0);

        // Still under the 1.5 bar threshold at 16 h.
        let below = rt.sample_at(at_hours(16.0));
        assert!(below.record.event.is_none());
        assert!(below.record.p_bar_abs < 1.5);

        // Past the crossing point: clamped to threshold - 0.1.
        let relief = rt.sample_at(at_hours(20.0));
        assert_eq!(relief.record.event, Some(TelemetryEvent::Relief));
        assert_eq!(relief.record.p_bar_abs, 1.4);
        assert_eq!(relief.record.relief_count, 1);
        let alert = relief.alert.expect("relief raises an alert");
        assert_eq!(alert.severity, AlertSeverity::High);

        // Raise the threshold out of reach: no event, counter unchanged.
        rt.state.lock().valve.set_thresholds(2.0, 4.5);
        let after = rt.sample_at(at_hours(21.0));
        assert!(after.record.event.is_none());
        assert_eq!(after.record.relief_count, 1);
    }

    #[test]
    fn vented_vessel_reports_fill_pressure() {
        let mut rt = runtime(0.0);
        rt.state.lock().solenoid_open = true;
        let sample = rt.sample_at(at_hours(20.0));
        assert_eq!(sample.record.p_bar_abs, 1.0);
        assert_eq!(sample.record.relief_count, 0);
        assert!(sample.record.event.is_none());
        assert!(sample.alert.is_none());
    }

    #[test]
    fn warning_crossing_raises_medium_alert() {
        let mut rt = runtime(0.0);
        rt.state.lock().valve.set_thresholds(3.0, 1.2);
        let sample = rt.sample_at(at_hours(20.0));
        assert!(sample.record.event.is_none());
        let alert = sample.alert.expect("warning raises an alert");
        assert_eq!(alert.severity, AlertSeverity::Medium);
    }

    #[test]
    fn last_pressure_tracks_emitted_record() {
        let mut rt = runtime(0.0);
        let sample = rt.sample_at(at_hours(16.0));
        assert_eq!(rt.state.lock().last_pressure, sample.record.p_bar_abs);
    }

    #[test]
    fn zero_noise_keeps_nominal_temperature() {
        let mut rt = runtime(0.0);
        let sample = rt.sample_at(at_hours(4.0));
        assert_eq!(sample.record.t_c, 39.0);
    }

    #[test]
    fn noisy_temperature_stays_clamped() {
        let mut rt = runtime(0.05);
        for i in 1..50 {
            let sample = rt.sample_at(at_hours(f64::from(i)));
            assert!(sample.record.t_c >= 38.0 && sample.record.t_c <= 40.0);
        }
    }
}
