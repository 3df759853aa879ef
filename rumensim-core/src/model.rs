//! Gompertz kinetics for in-vitro gas production.
//!
//! The modified Gompertz form used by gas-production assays:
//!
//! `P(t) = A * exp(-exp(mu*e/A * (lambda - t) + 1))`
//!
//! with `A` the asymptotic pressure (bar), `mu` the maximum production rate
//! (bar/h) and `lambda` the lag time (h). The model is pure and noise-free;
//! callers inject measurement noise so that tests stay deterministic.

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Shape parameters of the Gompertz curve. All three must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KineticParams {
    /// Asymptotic pressure (bar).
    pub a: f64,
    /// Maximum production rate (bar/h).
    pub mu: f64,
    /// Lag time (h).
    pub lambda: f64,
}

impl KineticParams {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.a <= 0.0 || self.mu <= 0.0 || self.lambda <= 0.0 {
            return Err(SimulationError::Validation(format!(
                "kinetic parameters must be positive: A={}, mu={}, lambda={}",
                self.a, self.mu, self.lambda
            )));
        }
        Ok(())
    }
}

/// Gompertz gas production model for a single flask.
#[derive(Debug, Clone)]
pub struct GompertzModel {
    params: KineticParams,
    baseline_bar: f64,
}

impl GompertzModel {
    pub fn new(params: KineticParams, baseline_bar: f64) -> Result<Self, SimulationError> {
        params.validate()?;
        if baseline_bar < 0.0 {
            return Err(SimulationError::Validation(format!(
                "baseline pressure must be non-negative, got {baseline_bar}"
            )));
        }
        Ok(Self {
            params,
            baseline_bar,
        })
    }

    pub fn params(&self) -> KineticParams {
        self.params
    }

    pub fn baseline(&self) -> f64 {
        self.baseline_bar
    }

    /// Absolute pressure (bar) at `t_hours` of elapsed simulated time.
    ///
    /// Returns the baseline fill pressure for negative times, and never
    /// reports below it: the flask cannot hold less than its initial charge.
    pub fn pressure_at(&self, t_hours: f64) -> f64 {
        if t_hours < 0.0 {
            return self.baseline_bar;
        }
        let KineticParams { a, mu, lambda } = self.params;
        let exponent = (mu * std::f64::consts::E / a) * (lambda - t_hours) + 1.0;
        let pressure = a * (-exponent.exp()).exp();
        pressure.max(self.baseline_bar)
    }

    /// Deterministic, noise-free series over `duration_hours` sampled every
    /// `interval_minutes`. Used for dashboard seeding and the CLI `generate`
    /// subcommand.
    pub fn sample_series(&self, duration_hours: f64, interval_minutes: u32) -> Vec<SeriesPoint> {
        let interval_h = f64::from(interval_minutes) / 60.0;
        let points = (duration_hours / interval_h).floor() as usize;
        (0..=points)
            .map(|i| {
                let t_hours = i as f64 * interval_h;
                SeriesPoint {
                    t_hours,
                    p_bar: self.pressure_at(t_hours),
                }
            })
            .collect()
    }
}

/// One sample of a generated pressure series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub t_hours: f64,
    pub p_bar: f64,
}

/// Kinetic parameters recovered from an observed series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KineticSummary {
    /// Peak pressure above baseline (bar).
    pub asymptote_observed: f64,
    /// Highest accumulation rate between consecutive samples (bar/h).
    pub peak_rate: f64,
    /// Time of the peak rate (h).
    pub peak_rate_at_h: f64,
    /// First time the series rises 0.05 bar above baseline (h).
    pub latency_h: f64,
}

impl KineticSummary {
    /// Returns `None` for series with fewer than two samples.
    pub fn from_series(series: &[SeriesPoint], baseline_bar: f64) -> Option<Self> {
        if series.len() < 2 {
            return None;
        }

        let mut max_pressure = f64::MIN;
        let mut peak_rate = 0.0;
        let mut peak_rate_at_h = 0.0;
        let mut latency_h = 0.0;

        for pair in series.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            max_pressure = max_pressure.max(next.p_bar);

            let dt = next.t_hours - prev.t_hours;
            if dt > 0.0 {
                let rate = (next.p_bar - prev.p_bar) / dt;
                if rate > peak_rate {
                    peak_rate = rate;
                    peak_rate_at_h = next.t_hours;
                }
            }
            if latency_h == 0.0 && next.p_bar > baseline_bar + 0.05 {
                latency_h = next.t_hours;
            }
        }

        Some(Self {
            asymptote_observed: (max_pressure - baseline_bar).max(0.0),
            peak_rate,
            peak_rate_at_h,
            latency_h,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model() -> GompertzModel {
        GompertzModel::new(
            KineticParams {
                a: 1.8,
                mu: 0.12,
                lambda: 2.5,
            },
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn negative_time_returns_baseline() {
        let m = model();
        assert_eq!(m.pressure_at(-0.001), 1.0);
        assert_eq!(m.pressure_at(-48.0), 1.0);
    }

    #[test]
    fn never_reports_below_baseline() {
        let m = model();
        // Early in the lag phase the raw curve sits far below 1.0 bar.
        assert_eq!(m.pressure_at(0.0), 1.0);
        assert_eq!(m.pressure_at(1.0), 1.0);
    }

    #[test]
    fn approaches_asymptote() {
        let m = model();
        let p = m.pressure_at(500.0);
        assert!(p > 1.79 && p <= 1.8, "p = {p}");
    }

    #[test]
    fn rejects_non_positive_parameters() {
        for params in [
            KineticParams {
                a: 0.0,
                mu: 0.12,
                lambda: 2.5,
            },
            KineticParams {
                a: 1.8,
                mu: -0.1,
                lambda: 2.5,
            },
            KineticParams {
                a: 1.8,
                mu: 0.12,
                lambda: 0.0,
            },
        ] {
            assert!(matches!(
                GompertzModel::new(params, 1.0),
                Err(SimulationError::Validation(_))
            ));
        }
    }

    #[test]
    fn series_is_monotone_and_starts_at_baseline() {
        let m = model();
        let series = m.sample_series(48.0, 15);
        assert_eq!(series[0].p_bar, 1.0);
        for pair in series.windows(2) {
            assert!(pair[1].p_bar >= pair[0].p_bar);
        }
    }

    #[test]
    fn summary_recovers_curve_features() {
        let m = model();
        let series = m.sample_series(96.0, 15);
        let summary = KineticSummary::from_series(&series, m.baseline()).unwrap();
        // The curve tops out near A - baseline and the onset sits past lambda.
        assert!(summary.asymptote_observed > 0.7);
        assert!(summary.latency_h > 2.5);
        assert!(summary.peak_rate > 0.0);
        assert!(summary.peak_rate_at_h > summary.latency_h);
    }

    #[test]
    fn summary_needs_two_samples() {
        assert!(KineticSummary::from_series(&[], 1.0).is_none());
        let one = [SeriesPoint {
            t_hours: 0.0,
            p_bar: 1.0,
        }];
        assert!(KineticSummary::from_series(&one, 1.0).is_none());
    }

    proptest! {
        #[test]
        fn monotone_non_decreasing(t in 0.0f64..200.0, dt in 0.0f64..10.0) {
            let m = model();
            prop_assert!(m.pressure_at(t + dt) >= m.pressure_at(t) - 1e-12);
        }
    }
}
