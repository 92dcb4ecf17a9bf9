//! Build command - Build a project from a description.

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use storm_core::{BuildEvent, BuildService, StormConfig};
use storm_store::{AgentToggles, BuildConfig, DevelopmentSpeed, ModelProvider, ProjectStatus};

#[derive(Args)]
pub struct BuildArgs {
    /// What to build, e.g. "a flask app called demo"
    pub description: String,

    /// Owner of the project
    #[arg(short, long, default_value = "default")]
    pub user: String,

    /// Text-generation provider (openai, anthropic, gemini)
    #[arg(short, long, default_value = "openai")]
    pub model: String,

    /// Pacing preset (fast, balanced, thorough)
    #[arg(short, long, default_value = "balanced")]
    pub speed: String,

    /// Skip the testing agent
    #[arg(long)]
    pub no_testing: bool,
}

impl BuildArgs {
    fn build_config(&self) -> Result<BuildConfig> {
        let development_speed: DevelopmentSpeed = self
            .speed
            .parse()
            .with_context(|| format!("invalid argument --speed {}", self.speed))?;
        Ok(BuildConfig {
            model: ModelProvider::parse_lossy(&self.model),
            agents: AgentToggles {
                testing: !self.no_testing,
                ..Default::default()
            },
            development_speed,
            require_approval: false,
        })
    }
}

pub async fn execute(args: BuildArgs, config: StormConfig) -> Result<()> {
    let build_config = args.build_config()?;
    let service = BuildService::new(config);
    let mut events = service.subscribe();

    let project_id = service
        .start_build(&args.description, &args.user, build_config)
        .await?;
    info!("Building project {}", project_id);
    println!("🚀 Building project {}", project_id);

    let printer = tokio::spawn({
        let project_id = project_id.clone();
        async move {
            forward_events(&mut events, &project_id, |event| {
                println!("   [{:>3}%] {}", event.progress, event.phase);
            })
            .await
        }
    });

    service.wait_for(&project_id).await;
    printer.abort();

    let view = service.get_project(&project_id).await?;
    let project = view.project;
    match project.status {
        ProjectStatus::Completed => {
            println!("✅ Project '{}' completed", project.name);
            println!(
                "   Workspace: {}",
                service
                    .config()
                    .project_workspace(&project.user_id, &project.project_id)
                    .display()
            );
            println!("   Files: {}", project.generated_files.len());
            Ok(())
        }
        status => anyhow::bail!(
            "Build failed ({}): {}",
            status,
            project.current_step.unwrap_or_default()
        ),
    }
}

/// Hand this project's events to `emit` until the channel closes. Skipped
/// events on a slow receiver are dropped, not fatal.
async fn forward_events(
    events: &mut broadcast::Receiver<BuildEvent>,
    project_id: &str,
    mut emit: impl FnMut(&BuildEvent),
) {
    loop {
        match events.recv().await {
            Ok(event) if event.project_id == project_id => emit(&event),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Progress output lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_store::Phase;

    fn args(speed: &str) -> BuildArgs {
        BuildArgs {
            description: "demo".to_string(),
            user: "default".to_string(),
            model: "claude".to_string(),
            speed: speed.to_string(),
            no_testing: true,
        }
    }

    #[test]
    fn test_build_config() {
        let config = args("thorough").build_config().unwrap();
        assert_eq!(config.development_speed, DevelopmentSpeed::Thorough);
        assert_eq!(config.model, ModelProvider::OpenAI);
        assert!(!config.agents.testing);
        assert!(config.agents.fixing);
    }

    fn event(project_id: &str, progress: u8) -> BuildEvent {
        BuildEvent {
            project_id: project_id.to_string(),
            status: ProjectStatus::Active,
            phase: Phase::Implementation,
            progress,
        }
    }

    #[tokio::test]
    async fn test_forward_events_survives_lag() {
        let (tx, mut rx) = broadcast::channel(2);
        for progress in [30, 40, 50, 60] {
            tx.send(event("p-1", progress)).unwrap();
        }
        tx.send(event("p-2", 99)).unwrap();
        drop(tx);

        let mut seen = Vec::new();
        forward_events(&mut rx, "p-1", |e| seen.push(e.progress)).await;
        assert_eq!(seen, vec![60]);
    }

    #[test]
    fn test_bad_speed() {
        let err = args("warp").build_config().unwrap_err();
        assert!(format!("{:#}", err).contains("--speed"));
    }
}
