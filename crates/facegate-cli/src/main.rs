use anyhow::Result;
use clap::{Parser, Subcommand};
use facegate_core::Decision;
use std::path::PathBuf;
use std::process::ExitCode;

mod backend;
mod detections;
mod orchestrator;

use backend::HttpBackend;
use detections::DetectionFile;
use orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate face identity CLI")]
struct Cli {
    /// Base URL of the facegated server
    #[arg(long, env = "FACEGATE_URL", default_value = "http://localhost:4000", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the face in the current frame under a name
    Enroll {
        /// Display name for this identity
        #[arg(short, long)]
        name: String,
        /// JSON detections for the current frame, written by the vision pipeline
        #[arg(short, long)]
        detections: PathBuf,
    },
    /// Check whether the face in the current frame is enrolled
    Verify {
        /// JSON detections for the current frame, written by the vision pipeline
        #[arg(short, long)]
        detections: PathBuf,
    },
    /// List enrolled identities
    List,
    /// Remove every sample enrolled under a name
    Remove {
        /// Identity name to remove
        name: String,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let backend = HttpBackend::new(&cli.server)?;

    match cli.command {
        Commands::Enroll { name, detections } => {
            let orch = Orchestrator::new(DetectionFile::new(detections), backend);
            let receipt = orch.register(&name).await?;
            println!(
                "Registered {} ({} sample{})",
                receipt.name,
                receipt.samples,
                if receipt.samples == 1 { "" } else { "s" }
            );
        }
        Commands::Verify { detections } => {
            let orch = Orchestrator::new(DetectionFile::new(detections), backend);
            let decision = orch.recognize().await?;
            println!("{}", render_decision(&decision));
            if !decision.allowed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::List => {
            let identities = backend.identities().await?;
            if identities.is_empty() {
                println!("No identities enrolled");
            }
            for id in identities {
                println!("{}\t{} samples\tsince {}", id.name, id.samples, id.enrolled_at);
            }
        }
        Commands::Remove { name } => {
            let resp = backend.remove(&name).await?;
            println!("Removed {} ({} samples)", resp.name, resp.removed);
        }
        Commands::Status => {
            let status = backend.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn render_decision(decision: &Decision) -> String {
    match (&decision.name, decision.allowed) {
        (Some(name), true) => format!("Access granted: welcome back, {name}"),
        _ => "Access denied: face not recognized".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_granted() {
        let decision = Decision {
            allowed: true,
            name: Some("Alice".into()),
            distance: 0.3,
        };
        assert_eq!(render_decision(&decision), "Access granted: welcome back, Alice");
    }

    #[test]
    fn test_render_denied() {
        assert_eq!(
            render_decision(&Decision::denied(f32::INFINITY)),
            "Access denied: face not recognized"
        );
    }

    #[test]
    fn test_parse_enroll() {
        let cli = Cli::try_parse_from([
            "facegate", "--server", "http://10.0.0.2:4000", "enroll", "-n", "Alice", "-d", "/tmp/f.json",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://10.0.0.2:4000");
        assert!(matches!(cli.command, Commands::Enroll { ref name, .. } if name == "Alice"));
    }
}
