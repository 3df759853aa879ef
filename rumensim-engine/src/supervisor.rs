//! Simulation supervisor.
//!
//! Owns the flask set, the warp clock, and the lifecycle of every task. One
//! explicit handle: the embedding process constructs it, starts it, and
//! stops it; there is no global instance for a signal handler to reach into.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use rumensim_config::RumensimConfig;
use rumensim_core::model::KineticParams;
use rumensim_core::relief::ReliefValve;
use rumensim_core::time::WarpClock;
use rumensim_core::vessel::{replicate_params, FlaskId, VesselConfig, VesselState};
use rumensim_telemetry::MetricsRecorder;
use rumensim_transport::{CommandSource, TelemetrySink};

use crate::dispatcher::Dispatcher;
use crate::deferred::DeferredPurges;
use crate::error::EngineError;
use crate::vessel::{VesselHandle, VesselRuntime};

/// How long `stop` waits for each task before abandoning it.
const STOP_GRACE: Duration = Duration::from_secs(5);

pub struct Supervisor {
    config: RumensimConfig,
    clock: Arc<WarpClock>,
    vessel_configs: Vec<VesselConfig>,
    handles: Arc<HashMap<FlaskId, VesselHandle>>,
    purges: Arc<DeferredPurges>,
    sink: Arc<dyn TelemetrySink>,
    metrics: MetricsRecorder,
    running: watch::Sender<bool>,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl Supervisor {
    /// Build the flask set from configuration. Kinetic profiles are assigned
    /// round-robin, with seeded per-replicate jitter when enabled.
    pub fn new(
        config: RumensimConfig,
        sink: Arc<dyn TelemetrySink>,
        metrics: MetricsRecorder,
    ) -> Result<Self, EngineError> {
        let clock = Arc::new(WarpClock::new(config.simulation.speed_multiplier)?);
        let assay_id = config.simulation.assay_id();
        let start_time = clock.now();
        let mut rng = SmallRng::seed_from_u64(config.simulation.seed);

        let mut vessel_configs = Vec::new();
        let mut handles = HashMap::new();
        for i in 0..config.simulation.num_flasks {
            let flask_id = i + 1;
            let profile = config.simulation.profiles[i as usize % config.simulation.profiles.len()];
            let base = KineticParams {
                a: profile.a,
                mu: profile.mu,
                lambda: profile.lambda,
            };
            let params = if config.simulation.replicate_variation {
                replicate_params(base, &mut rng)
            } else {
                base
            };

            let vessel = VesselConfig {
                flask_id,
                assay_id: assay_id.clone(),
                params,
                baseline_bar: config.simulation.baseline_bar,
                nominal_temp_c: config.simulation.temperature_c,
            };
            let valve = ReliefValve::new(
                config.safety.relief_threshold,
                config.safety.warning_threshold,
            );
            let state = Arc::new(Mutex::new(VesselState::new(&vessel, valve, start_time)));

            info!(
                flask_id,
                assay_id = %assay_id,
                a = params.a,
                mu = params.mu,
                lambda = params.lambda,
                "flask initialized"
            );

            handles.insert(
                flask_id,
                VesselHandle {
                    flask_id,
                    assay_id: assay_id.clone(),
                    fill_bar: config.simulation.baseline_bar,
                    state: Arc::clone(&state),
                },
            );
            vessel_configs.push(vessel);
        }

        let (running, _) = watch::channel(true);
        Ok(Self {
            purges: Arc::new(DeferredPurges::new(Arc::clone(&clock))),
            config,
            clock,
            vessel_configs,
            handles: Arc::new(handles),
            sink,
            metrics,
            running,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn clock(&self) -> Arc<WarpClock> {
        Arc::clone(&self.clock)
    }

    pub fn handles(&self) -> Arc<HashMap<FlaskId, VesselHandle>> {
        Arc::clone(&self.handles)
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Spawn one task per flask plus the control dispatcher.
    pub fn start<S: CommandSource + 'static>(&self, source: S) -> Result<(), EngineError> {
        let mut tasks = self.tasks.lock();
        let sampling_interval_s = f64::from(self.config.simulation.sampling_interval_min) * 60.0;
        let tick_floor = Duration::from_millis(self.config.simulation.tick_floor_ms);

        for vessel in &self.vessel_configs {
            let handle = &self.handles[&vessel.flask_id];
            let runtime = VesselRuntime::new(
                vessel.clone(),
                Arc::clone(&handle.state),
                Arc::clone(&self.clock),
                Arc::clone(&self.sink),
                self.metrics.clone(),
                self.config.broker.namespace.clone(),
                self.config.simulation.noise_fraction,
                sampling_interval_s,
                tick_floor,
                self.config.simulation.seed,
            )?;
            tasks.push((
                format!("flask-{}", vessel.flask_id),
                tokio::spawn(runtime.run(self.running.subscribe())),
            ));
        }

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.clock),
            Arc::clone(&self.handles),
            Arc::clone(&self.purges),
            self.config.safety.clone(),
            self.config.broker.namespace.clone(),
            self.metrics.clone(),
        );
        tasks.push((
            "dispatcher".into(),
            tokio::spawn(dispatcher.run(source, self.running.subscribe())),
        ));

        info!(
            flasks = self.vessel_configs.len(),
            speed = self.clock.speed(),
            assay_id = %self.config.simulation.assay_id(),
            "simulation started at {}",
            Utc::now()
        );
        Ok(())
    }

    /// Clear the running flag and wait for every task, bounded per task.
    /// A straggler is abandoned with a log line, never killed mid-tick.
    pub async fn stop(&self) {
        info!("stopping simulation");
        let _ = self.running.send(false);
        self.purges.cancel_all();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for (name, task) in tasks {
            match timeout(STOP_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(task = %name, %error, "task ended with a panic"),
                Err(_) => warn!(task = %name, "task did not stop in time, abandoning"),
            }
        }
        info!("simulation stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rumensim_transport::{command_channel, telemetry_channel, InboundMessage};
    use std::collections::HashMap as StdHashMap;

    fn test_config() -> RumensimConfig {
        let mut config = RumensimConfig::default();
        config.simulation.num_flasks = 2;
        config.simulation.sampling_interval_min = 1;
        config.simulation.speed_multiplier = 6000.0;
        config.simulation.noise_fraction = 0.0;
        config.simulation.replicate_variation = false;
        config.simulation.tick_floor_ms = 50;
        config.simulation.assay_id = Some("ensaio_001".into());
        config
    }

    #[tokio::test]
    async fn emits_ordered_telemetry_and_stops_cleanly() {
        let (sink, mut rx) = telemetry_channel(1024);
        let (_cmd_tx, source) = command_channel(8);
        let supervisor =
            Supervisor::new(test_config(), Arc::new(sink), MetricsRecorder::new()).unwrap();

        supervisor.start(source).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        supervisor.stop().await;

        let mut per_flask: StdHashMap<String, Vec<serde_json::Value>> = StdHashMap::new();
        while let Ok(msg) = rx.try_recv() {
            assert!(msg.topic.starts_with("rumen/ensaio_001/"));
            let record: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
            per_flask.entry(msg.topic).or_default().push(record);
        }

        let telemetry_flasks = per_flask
            .iter()
            .filter(|(topic, _)| topic.ends_with("/telemetry"))
            .count();
        assert_eq!(telemetry_flasks, 2, "both flasks must publish");

        for (topic, records) in per_flask {
            if !topic.ends_with("/telemetry") {
                continue;
            }
            assert!(records.len() >= 2, "expected several ticks on {topic}");
            let timestamps: Vec<&str> =
                records.iter().map(|r| r["ts"].as_str().unwrap()).collect();
            for pair in timestamps.windows(2) {
                // ISO-8601 UTC strings sort chronologically.
                assert!(pair[0] < pair[1], "out of order on {topic}");
            }
            for record in &records {
                assert_eq!(record["schema_version"], 1);
                assert_eq!(record["assay_id"], "ensaio_001");
            }
        }
    }

    #[tokio::test]
    async fn inbound_pause_command_reaches_the_clock() {
        let (sink, _rx) = telemetry_channel(1024);
        let (cmd_tx, source) = command_channel(8);
        let supervisor =
            Supervisor::new(test_config(), Arc::new(sink), MetricsRecorder::new()).unwrap();
        supervisor.start(source).unwrap();

        cmd_tx
            .send(InboundMessage {
                topic: "rumen/control/pause".into(),
                payload: Bytes::from_static(b"{}"),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(supervisor.clock().is_paused());

        cmd_tx
            .send(InboundMessage {
                topic: "rumen/control/resume".into(),
                payload: Bytes::from_static(b"{}"),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!supervisor.clock().is_paused());

        supervisor.stop().await;
    }
}
