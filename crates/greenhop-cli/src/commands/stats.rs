//! Statistics command.

use anyhow::Result;
use greenhop_core::StatsSnapshot;

use super::ApiClient;

pub async fn show(client: &ApiClient) -> Result<()> {
    let stats: StatsSnapshot = client.get("stats").await?;
    print!("{}", render(&stats));
    Ok(())
}

fn render(stats: &StatsSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Carbon saved:      {:.1} g\n",
        stats.total_carbon_saved
    ));
    out.push_str(&format!(
        "Jobs processed:    {}\n",
        stats.total_jobs_processed
    ));
    out.push_str(&format!(
        "Local intensity:   {:.1} gCO2/kWh\n",
        stats.current_intensity
    ));
    if let Some(lowest) = &stats.lowest_region {
        out.push_str(&format!(
            "Greenest region:   {} ({:.1})\n",
            lowest.region, lowest.intensity
        ));
    }
    if let Some(highest) = &stats.highest_region {
        out.push_str(&format!(
            "Dirtiest region:   {} ({:.1})\n",
            highest.region, highest.intensity
        ));
    }
    if !stats.history.is_empty() {
        let samples: Vec<String> = stats
            .history
            .iter()
            .map(|s| format!("{:.0}", s.intensity))
            .collect();
        out.push_str(&format!("History:           {}\n", samples.join(" ")));
    }
    out
}
