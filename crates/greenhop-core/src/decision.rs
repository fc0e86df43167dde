//! Scheduling decisions.
//!
//! `classify` is a pure function of the job, the intensity of its requested
//! region and the current region ranking. Rules, first match wins:
//!
//! 1. High priority and local intensity at or below the bypass limit: run now.
//! 2. Local intensity below the low threshold: run now.
//! 3. Local intensity in the medium band: delay once, then fall through to 4.
//! 4. Hop to the greenest other region, or run now if none is strictly greener.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{Job, Priority};
use crate::telemetry::RegionIntensity;

/// Thresholds and timings used by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// Intensities strictly below this run immediately (gCO2/kWh).
    pub low_threshold: f64,
    /// Upper inclusive bound of the medium band (gCO2/kWh).
    pub medium_threshold: f64,
    /// High-priority jobs at or below this intensity skip the delay.
    pub high_priority_bypass: f64,
    /// How long a medium-band job waits before it is re-evaluated.
    #[serde(with = "duration_secs")]
    pub delay_window: Duration,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            low_threshold: 120.0,
            medium_threshold: 200.0,
            high_priority_bypass: 200.0,
            delay_window: Duration::minutes(2),
        }
    }
}

/// Intensity band of a reading under a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Medium,
    High,
}

impl DecisionPolicy {
    pub fn band(&self, intensity: f64) -> Band {
        if intensity < self.low_threshold {
            Band::Low
        } else if intensity <= self.medium_threshold {
            Band::Medium
        } else {
            Band::High
        }
    }
}

/// Outcome of classifying a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Execute in the requested region.
    RunNow,
    /// Stay put and re-evaluate at the deadline.
    DelayUntil(DateTime<Utc>),
    /// Execute in a greener region.
    Hop { region: String, intensity: f64 },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::RunNow => "run_now",
            Decision::DelayUntil(_) => "delay",
            Decision::Hop { .. } => "hop",
        }
    }

    /// Region the job executes in, if the decision executes it.
    pub fn execution_region(&self, job: &Job) -> Option<String> {
        match self {
            Decision::RunNow => Some(job.requested_region.clone()),
            Decision::Hop { region, .. } => Some(region.clone()),
            Decision::DelayUntil(_) => None,
        }
    }

    /// Intensity of the execution region, if the decision executes the job.
    pub fn execution_intensity(&self, local_intensity: f64) -> Option<f64> {
        match self {
            Decision::RunNow => Some(local_intensity),
            Decision::Hop { intensity, .. } => Some(*intensity),
            Decision::DelayUntil(_) => None,
        }
    }

    /// Grams of CO2 avoided relative to running in the requested region.
    pub fn carbon_saved(&self, job: &Job, local_intensity: f64) -> f64 {
        match self {
            Decision::Hop { intensity, .. } => {
                (local_intensity - intensity).max(0.0) * job.energy_usage_kwh
            }
            _ => 0.0,
        }
    }
}

/// Decide what to do with `job` given the intensity of its requested region
/// and regions ranked greenest first.
pub fn classify(
    job: &Job,
    local_intensity: f64,
    ranking: &[RegionIntensity],
    now: DateTime<Utc>,
    policy: &DecisionPolicy,
) -> Decision {
    if job.priority == Priority::High && local_intensity <= policy.high_priority_bypass {
        return Decision::RunNow;
    }

    match policy.band(local_intensity) {
        Band::Low => Decision::RunNow,
        Band::Medium if !job.delay_elapsed(now) => match job.decision_deadline {
            // Still inside the one delay window a job gets.
            Some(deadline) => Decision::DelayUntil(deadline),
            None => Decision::DelayUntil(
                now.checked_add_signed(policy.delay_window)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
        },
        Band::Medium | Band::High => hop_or_run(job, local_intensity, ranking),
    }
}

fn hop_or_run(job: &Job, local_intensity: f64, ranking: &[RegionIntensity]) -> Decision {
    // The cached entry for the requested region may be staler than the
    // local reading, so it never competes.
    let Some(greenest) = ranking
        .iter()
        .filter(|r| r.region != job.requested_region)
        .min_by(|a, b| a.rank_cmp(b))
    else {
        return Decision::RunNow;
    };

    if greenest.intensity >= local_intensity {
        return Decision::RunNow;
    }

    Decision::Hop {
        region: greenest.region.clone(),
        intensity: greenest.intensity,
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Duration::try_seconds(secs)
            .ok_or_else(|| D::Error::custom(format!("{} seconds is out of range", secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{DEFAULT_REGION, JobStatus, NewJob};

    fn job(priority: Priority, energy: f64) -> Job {
        Job::new(
            NewJob {
                name: "J1".to_string(),
                energy_usage_kwh: energy,
                priority,
                requested_region: DEFAULT_REGION.to_string(),
            },
            Utc::now(),
        )
    }

    fn ranking(now: DateTime<Utc>) -> Vec<RegionIntensity> {
        vec![
            RegionIntensity::new("WIND", 30.0, now),
            RegionIntensity::new(DEFAULT_REGION, 250.0, now),
            RegionIntensity::new("PJM_ALL", 300.0, now),
        ]
    }

    #[test]
    fn test_low_band_runs_now() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let j = job(Priority::Low, 2.0);

        let decision = classify(&j, 90.0, &ranking(now), now, &policy);
        assert_eq!(decision, Decision::RunNow);
        assert_eq!(decision.execution_region(&j).as_deref(), Some(DEFAULT_REGION));
        assert_eq!(decision.carbon_saved(&j, 90.0), 0.0);
    }

    #[test]
    fn test_high_band_hops_to_greenest_region() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let j = job(Priority::Low, 2.0);

        let decision = classify(&j, 250.0, &ranking(now), now, &policy);
        assert_eq!(
            decision,
            Decision::Hop {
                region: "WIND".to_string(),
                intensity: 30.0
            }
        );
        assert_eq!(decision.carbon_saved(&j, 250.0), 440.0);
    }

    #[test]
    fn test_medium_band_delays_first_time() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let j = job(Priority::Low, 1.0);

        let decision = classify(&j, 150.0, &ranking(now), now, &policy);
        assert_eq!(decision, Decision::DelayUntil(now + Duration::minutes(2)));
    }

    #[test]
    fn test_medium_band_hops_after_delay_elapsed() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let mut j = job(Priority::Low, 1.0);
        j.status = JobStatus::Delayed;
        j.decision_deadline = Some(now - Duration::seconds(1));

        let decision = classify(&j, 150.0, &ranking(now), now, &policy);
        assert_eq!(decision.label(), "hop");
        assert_eq!(decision.carbon_saved(&j, 150.0), 120.0);
    }

    #[test]
    fn test_medium_band_keeps_existing_deadline() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let mut j = job(Priority::Low, 1.0);
        let deadline = now + Duration::seconds(30);
        j.decision_deadline = Some(deadline);

        let decision = classify(&j, 150.0, &ranking(now), now, &policy);
        assert_eq!(decision, Decision::DelayUntil(deadline));
    }

    #[test]
    fn test_band_boundaries() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.band(119.9), Band::Low);
        assert_eq!(policy.band(120.0), Band::Medium);
        assert_eq!(policy.band(200.0), Band::Medium);
        assert_eq!(policy.band(200.1), Band::High);
    }

    #[test]
    fn test_high_priority_bypasses_delay() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let j = job(Priority::High, 1.0);

        for intensity in [50.0, 120.0, 150.0, 200.0] {
            assert_eq!(
                classify(&j, intensity, &ranking(now), now, &policy),
                Decision::RunNow
            );
        }
        assert_eq!(classify(&j, 201.0, &ranking(now), now, &policy).label(), "hop");
    }

    #[test]
    fn test_no_hop_without_improvement() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let j = job(Priority::Low, 1.0);
        let dirty = vec![
            RegionIntensity::new("ERCOT_ALL", 400.0, now),
            RegionIntensity::new("PJM_ALL", 250.0, now),
        ];

        // Equal intensity is not an improvement.
        assert_eq!(classify(&j, 250.0, &dirty, now, &policy), Decision::RunNow);
        assert_eq!(classify(&j, 250.0, &[], now, &policy), Decision::RunNow);
    }

    #[test]
    fn test_no_hop_to_requested_region() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let j = job(Priority::Low, 1.0);
        let stale = vec![
            RegionIntensity::new(DEFAULT_REGION, 100.0, now),
            RegionIntensity::new("PJM_ALL", 300.0, now),
        ];

        assert_eq!(classify(&j, 250.0, &stale, now, &policy), Decision::RunNow);
    }

    #[test]
    fn test_hop_skips_stale_requested_region() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let j = job(Priority::Low, 2.0);
        let ranked = vec![
            RegionIntensity::new(DEFAULT_REGION, 40.0, now),
            RegionIntensity::new("NO1", 60.0, now),
            RegionIntensity::new("PJM_ALL", 300.0, now),
        ];

        let decision = classify(&j, 250.0, &ranked, now, &policy);
        assert_eq!(
            decision,
            Decision::Hop {
                region: "NO1".to_string(),
                intensity: 60.0
            }
        );
        assert_eq!(decision.carbon_saved(&j, 250.0), 380.0);
    }

    #[test]
    fn test_huge_delay_window_saturates() {
        let now = Utc::now();
        let policy = DecisionPolicy {
            delay_window: Duration::try_days(365 * 1_000_000).unwrap(),
            ..Default::default()
        };
        let j = job(Priority::Low, 1.0);

        assert_eq!(
            classify(&j, 150.0, &[], now, &policy),
            Decision::DelayUntil(DateTime::<Utc>::MAX_UTC)
        );
    }

    #[test]
    fn test_savings_never_negative_and_only_on_hop() {
        let now = Utc::now();
        let policy = DecisionPolicy::default();
        let regions = ranking(now);

        for priority in [Priority::Low, Priority::High] {
            let mut j = job(priority, 3.5);
            j.decision_deadline = Some(now - Duration::seconds(1));
            for step in 0..=100 {
                let local = step as f64 * 5.0;
                let decision = classify(&j, local, &regions, now, &policy);
                let saved = decision.carbon_saved(&j, local);
                assert!(saved >= 0.0);
                if saved > 0.0 {
                    assert_ne!(
                        decision.execution_region(&j).as_deref(),
                        Some(j.requested_region.as_str())
                    );
                }
            }
        }
    }
}
