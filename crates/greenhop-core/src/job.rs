//! Job records and their status state machine.
//!
//! A job is created `Pending`, may be `Delayed` once, and is resolved by the
//! scheduler into `Running` and then `Completed`. `Stopped` can be reached
//! from any non-terminal state by an external request.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, JobId, Result};

/// Placeholder rendered for the execution region until a decision lands.
pub const PENDING_REGION: &str = "Pending...";

/// Region assumed when a request does not name one.
pub const DEFAULT_REGION: &str = "CAISO_NORTH";

/// Scheduling priority of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Priority {
    Low,
    High,
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "high" => Ok(Priority::High),
            _ => Err(Error::InvalidInput(format!(
                "unknown priority '{}', expected Low or High",
                s
            ))),
        }
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum JobStatus {
    Pending,
    Delayed,
    Running,
    Completed,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Stopped)
    }

    /// Whether the scheduler still has a decision to make for this job.
    pub fn awaits_decision(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Delayed)
    }

    /// Legal edges of the state machine. Nothing re-enters `Pending`,
    /// a job is delayed at most once, and terminal states have no exits.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Delayed)
                | (Pending, Stopped)
                | (Delayed, Running)
                | (Delayed, Stopped)
                | (Running, Completed)
                | (Running, Stopped)
        )
    }
}

/// A batch job tracked by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    #[serde(rename = "energy_usage")]
    pub energy_usage_kwh: f64,
    pub priority: Priority,
    pub status: JobStatus,
    pub requested_region: String,
    #[serde(
        serialize_with = "serialize_execution_region",
        deserialize_with = "deserialize_execution_region"
    )]
    pub execution_region: Option<String>,
    /// Intensity of the region the job ran in, in gCO2/kWh.
    pub carbon_intensity_used: Option<f64>,
    /// Grams of CO2 avoided by hopping away from the requested region.
    pub carbon_saved: f64,
    /// Set when the decision was taken on cached or fallback telemetry.
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
    pub decision_deadline: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn serialize_execution_region<S>(
    region: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(region.as_deref().unwrap_or(PENDING_REGION))
}

fn deserialize_execution_region<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let region = Option::<String>::deserialize(deserializer)?;
    Ok(region.filter(|r| r != PENDING_REGION))
}

impl Job {
    /// Build a fresh `Pending` job from a validated request.
    pub fn new(spec: NewJob, created_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            name: spec.name,
            energy_usage_kwh: spec.energy_usage_kwh,
            priority: spec.priority,
            status: JobStatus::Pending,
            requested_region: spec.requested_region,
            execution_region: None,
            carbon_intensity_used: None,
            carbon_saved: 0.0,
            degraded: false,
            created_at,
            decision_deadline: None,
            completed_at: None,
        }
    }

    /// True once a delay window has been granted and has run out.
    pub fn delay_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.decision_deadline.is_some_and(|d| d <= now)
    }

    /// Whether the scheduler should look at this job on a tick at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.status.awaits_decision() {
            return false;
        }
        self.status == JobStatus::Pending || self.decision_deadline.is_none_or(|d| d <= now)
    }

    /// Write the fields carried by a transition.
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(region) = update.execution_region {
            self.execution_region = Some(region);
        }
        if let Some(intensity) = update.carbon_intensity_used {
            self.carbon_intensity_used = Some(intensity);
        }
        if let Some(saved) = update.carbon_saved {
            self.carbon_saved = saved.max(0.0);
        }
        if let Some(deadline) = update.decision_deadline {
            self.decision_deadline = Some(deadline);
        }
        if let Some(degraded) = update.degraded {
            self.degraded = degraded;
        }
    }
}

/// Fields written alongside a status transition. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub execution_region: Option<String>,
    pub carbon_intensity_used: Option<f64>,
    pub carbon_saved: Option<f64>,
    pub decision_deadline: Option<DateTime<Utc>>,
    pub degraded: Option<bool>,
}

/// Raw job submission as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub name: String,
    pub energy_usage: f64,
    pub priority: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// A validated job submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub name: String,
    pub energy_usage_kwh: f64,
    pub priority: Priority,
    pub requested_region: String,
}

impl NewJob {
    /// Validate a raw request. Jobs without a region land in `default_region`.
    pub fn parse(request: JobRequest, default_region: &str) -> Result<Self> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("job name must not be empty".to_string()));
        }

        if !request.energy_usage.is_finite() || request.energy_usage <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "energy_usage must be a positive number, got {}",
                request.energy_usage
            )));
        }

        let priority: Priority = request.priority.parse()?;

        let requested_region = request
            .region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| default_region.to_string());

        Ok(Self {
            name: name.to_string(),
            energy_usage_kwh: request.energy_usage,
            priority,
            requested_region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(energy: f64, priority: &str) -> JobRequest {
        JobRequest {
            name: "J1".to_string(),
            energy_usage: energy,
            priority: priority.to_string(),
            region: None,
        }
    }

    #[test]
    fn test_parse_valid_request() {
        let job = NewJob::parse(request(2.0, "Low"), DEFAULT_REGION).unwrap();
        assert_eq!(job.name, "J1");
        assert_eq!(job.priority, Priority::Low);
        assert_eq!(job.requested_region, DEFAULT_REGION);
    }

    #[test]
    fn test_parse_rejects_bad_energy() {
        for energy in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let err = NewJob::parse(request(energy, "High"), DEFAULT_REGION).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
    }

    #[test]
    fn test_parse_rejects_unknown_priority() {
        let err = NewJob::parse(request(1.0, "Urgent"), DEFAULT_REGION).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_parse_keeps_requested_region() {
        let mut req = request(1.0, "high");
        req.region = Some("NO1".to_string());
        let job = NewJob::parse(req, DEFAULT_REGION).unwrap();
        assert_eq!(job.requested_region, "NO1");
        assert_eq!(job.priority, Priority::High);
    }

    #[test]
    fn test_state_machine_edges() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Delayed));
        assert!(Delayed.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Stopped));

        assert!(!Delayed.can_transition_to(Delayed));
        assert!(!Delayed.can_transition_to(Pending));
        for terminal in [Completed, Stopped] {
            for next in [Pending, Delayed, Running, Completed, Stopped] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_pending_region_placeholder_in_json() {
        let job = Job::new(
            NewJob::parse(request(2.0, "Low"), DEFAULT_REGION).unwrap(),
            Utc::now(),
        );
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["execution_region"], PENDING_REGION);
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["energy_usage"], 2.0);
    }

    #[test]
    fn test_delayed_job_due_only_after_deadline() {
        let now = Utc::now();
        let mut job = Job::new(
            NewJob::parse(request(1.0, "Low"), DEFAULT_REGION).unwrap(),
            now,
        );
        job.status = JobStatus::Delayed;
        job.decision_deadline = Some(now + chrono::Duration::seconds(120));

        assert!(!job.is_due(now));
        assert!(job.is_due(now + chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_resolved_jobs_never_due() {
        let now = Utc::now();
        let mut job = Job::new(
            NewJob::parse(request(1.0, "Low"), DEFAULT_REGION).unwrap(),
            now,
        );
        assert!(job.status.awaits_decision());
        assert!(job.is_due(now));

        for status in [JobStatus::Running, JobStatus::Completed, JobStatus::Stopped] {
            job.status = status;
            assert!(!status.awaits_decision());
            assert!(!job.is_due(now + chrono::Duration::days(1)));
        }
    }
}
