//! GreenHop CLI tool.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "greenhop")]
#[command(about = "GreenHop carbon-aware scheduler CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "GREENHOP_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Show carbon savings and grid statistics
    Stats,
    /// Validate a scheduler configuration
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "greenhop.kdl")]
        path: String,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List recent jobs
    List {
        /// Number of jobs to skip
        #[arg(long, default_value = "0")]
        skip: usize,
        /// Maximum number of jobs to show
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Submit a new job
    Submit {
        /// Job name
        #[arg(long)]
        name: String,
        /// Energy usage in kWh
        #[arg(long)]
        energy: f64,
        /// Low or High
        #[arg(long, default_value = "Low")]
        priority: String,
        /// Requested region, defaults to the server's local region
        #[arg(long)]
        region: Option<String>,
    },
    /// Show job details
    Show {
        /// Job ID
        id: String,
    },
    /// Stop a job
    Stop {
        /// Job ID
        id: String,
    },
    /// Delete a job
    Delete {
        /// Job ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Jobs { command } => {
            let client = commands::ApiClient::new(&cli.api_url)?;
            match command {
                JobCommands::List { skip, limit } => {
                    commands::jobs::list(&client, skip, limit).await?;
                }
                JobCommands::Submit {
                    name,
                    energy,
                    priority,
                    region,
                } => {
                    commands::jobs::submit(&client, name, energy, priority, region).await?;
                }
                JobCommands::Show { id } => {
                    commands::jobs::show(&client, &id).await?;
                }
                JobCommands::Stop { id } => {
                    commands::jobs::stop(&client, &id).await?;
                }
                JobCommands::Delete { id } => {
                    commands::jobs::delete(&client, &id).await?;
                }
            }
        }
        Commands::Stats => {
            let client = commands::ApiClient::new(&cli.api_url)?;
            commands::stats::show(&client).await?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
    }

    Ok(())
}
