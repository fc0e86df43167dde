//! Job commands.

use anyhow::Result;
use greenhop_core::job::PENDING_REGION;
use greenhop_core::{Job, JobId};
use serde_json::{Value, json};

use super::ApiClient;

pub async fn list(client: &ApiClient, skip: usize, limit: usize) -> Result<()> {
    let jobs: Vec<Job> = client
        .get(&format!("jobs?skip={}&limit={}", skip, limit))
        .await?;
    if jobs.is_empty() {
        println!("No jobs");
    } else {
        print!("{}", render_table(&jobs));
    }
    Ok(())
}

pub async fn submit(
    client: &ApiClient,
    name: String,
    energy: f64,
    priority: String,
    region: Option<String>,
) -> Result<()> {
    let body = json!({
        "name": name,
        "energy_usage": energy,
        "priority": priority,
        "region": region,
    });
    let job: Job = client.post("jobs", &body).await?;
    println!("Submitted job {} ({})", job.id, job.status);
    Ok(())
}

pub async fn show(client: &ApiClient, id: &str) -> Result<()> {
    let id: JobId = id.parse()?;
    let job: Job = client.get(&format!("jobs/{}", id)).await?;
    print!("{}", render_details(&job));
    Ok(())
}

pub async fn stop(client: &ApiClient, id: &str) -> Result<()> {
    let id: JobId = id.parse()?;
    let job: Job = client.put(&format!("jobs/{}/stop", id)).await?;
    println!("Job {} is {}", job.id, job.status);
    Ok(())
}

pub async fn delete(client: &ApiClient, id: &str) -> Result<()> {
    let id: JobId = id.parse()?;
    let response: Value = client.delete(&format!("jobs/{}", id)).await?;
    if response.get("deleted").and_then(|d| d.as_bool()) == Some(true) {
        println!("Deleted job {}", id);
    } else {
        println!("Job {} did not exist", id);
    }
    Ok(())
}

fn region(job: &Job) -> &str {
    job.execution_region.as_deref().unwrap_or(PENDING_REGION)
}

fn render_table(jobs: &[Job]) -> String {
    let mut out = format!(
        "{:<36}  {:<20}  {:<9}  {:<8}  {:<12}  {:>10}\n",
        "ID", "NAME", "STATUS", "PRIORITY", "REGION", "SAVED (g)"
    );
    for job in jobs {
        out.push_str(&format!(
            "{:<36}  {:<20}  {:<9}  {:<8}  {:<12}  {:>10.1}\n",
            job.id,
            truncate(&job.name, 20),
            job.status.to_string(),
            job.priority.to_string(),
            region(job),
            job.carbon_saved
        ));
    }
    out
}

fn render_details(job: &Job) -> String {
    let mut out = String::new();
    out.push_str(&format!("ID:               {}\n", job.id));
    out.push_str(&format!("Name:             {}\n", job.name));
    out.push_str(&format!("Status:           {}\n", job.status));
    out.push_str(&format!("Priority:         {}\n", job.priority));
    out.push_str(&format!("Energy:           {} kWh\n", job.energy_usage_kwh));
    out.push_str(&format!("Requested region: {}\n", job.requested_region));
    out.push_str(&format!("Execution region: {}\n", region(job)));
    if let Some(intensity) = job.carbon_intensity_used {
        out.push_str(&format!("Intensity used:   {} gCO2/kWh\n", intensity));
    }
    out.push_str(&format!("Carbon saved:     {} g\n", job.carbon_saved));
    if let Some(deadline) = job.decision_deadline {
        out.push_str(&format!("Delayed until:    {}\n", deadline));
    }
    if job.degraded {
        out.push_str("Decided on degraded telemetry\n");
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max - 1).collect();
        t.push('~');
        t
    }
}
