//! Prometheus counters for the simulation run.

use prometheus::{Counter, Histogram, HistogramOpts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    /// Telemetry records handed to the sink.
    pub published_records: Counter,
    /// Alert records handed to the sink.
    pub published_alerts: Counter,
    /// Relief valve firings across all flasks.
    pub relief_events: Counter,
    /// Sink publish calls that returned an error.
    pub publish_failures: Counter,
    /// Control commands dropped or rejected by the dispatcher.
    pub rejected_commands: Counter,
    /// Wall time spent computing one tick (seconds).
    pub tick_duration: Histogram,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();
        let published_records = Counter::new(
            "rumensim_published_records_total",
            "Telemetry records handed to the sink",
        )
        .unwrap();
        let published_alerts = Counter::new(
            "rumensim_published_alerts_total",
            "Alert records handed to the sink",
        )
        .unwrap();
        let relief_events = Counter::new(
            "rumensim_relief_events_total",
            "Relief valve firings across all flasks",
        )
        .unwrap();
        let publish_failures = Counter::new(
            "rumensim_publish_failures_total",
            "Sink publish calls that failed",
        )
        .unwrap();
        let rejected_commands = Counter::new(
            "rumensim_rejected_commands_total",
            "Control commands dropped or rejected",
        )
        .unwrap();
        let tick_duration = Histogram::with_opts(
            HistogramOpts::new("rumensim_tick_duration_seconds", "Per-flask tick wall time")
                .buckets(vec![0.0001, 0.001, 0.01, 0.1, 1.0]),
        )
        .unwrap();

        for collector in [
            &published_records,
            &published_alerts,
            &relief_events,
            &publish_failures,
            &rejected_commands,
        ] {
            registry.register(Box::new(collector.clone())).unwrap();
        }
        registry.register(Box::new(tick_duration.clone())).unwrap();

        Self {
            registry,
            published_records,
            published_alerts,
            relief_events,
            publish_failures,
            rejected_commands,
            tick_duration,
        }
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
