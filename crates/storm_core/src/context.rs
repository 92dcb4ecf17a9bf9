//! Per-build handles shared by the builder, executor and recovery engine.

use std::path::PathBuf;
use std::sync::Arc;

use storm_store::{AgentRole, AgentToggles, MessageRole, Project, ProjectRepository, Severity};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::gate::PauseGate;
use crate::notifier::Notifier;

/// Everything a build step needs to touch the outside world.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub project_id: String,
    pub user_id: String,
    /// Directory files are written to and commands run in.
    pub workspace: PathBuf,
    pub repo: ProjectRepository,
    pub notifier: Arc<Notifier>,
    pub gate: PauseGate,
    pub agents: AgentToggles,
}

impl BuildContext {
    /// Block while the build is paused.
    pub async fn checkpoint(&self) {
        if self.gate.is_paused() {
            info!(project_id = %self.project_id, "Build paused, waiting for resume");
        }
        self.gate.wait_until_open().await;
    }

    /// Append a message to the project's transcript.
    pub async fn say(&self, role: MessageRole, content: impl Into<String>) -> CoreResult<()> {
        let appended = self
            .repo
            .append_message(&self.project_id, role, content, Vec::new())
            .await?;
        if !appended {
            warn!(project_id = %self.project_id, "No session to append message to");
        }
        Ok(())
    }

    pub async fn assistant(&self, content: impl Into<String>) -> CoreResult<()> {
        self.say(MessageRole::Assistant, content).await
    }

    /// Read-modify-write the project row.
    pub async fn update<F>(&self, f: F) -> CoreResult<Project>
    where
        F: Fn(&mut Project) + Send + Sync + 'static,
    {
        self.repo
            .update_project(&self.project_id, f)
            .await?
            .ok_or_else(|| CoreError::ProjectNotFound(self.project_id.clone()))
    }

    pub async fn notify(&self, title: &str, message: &str, severity: Severity) -> CoreResult<bool> {
        self.notifier.notify(title, message, severity).await
    }

    /// Hand the project to `role` if that agent is enabled.
    pub async fn switch_agent(&self, role: AgentRole) -> CoreResult<bool> {
        if !self.agents.is_enabled(role) {
            warn!(project_id = %self.project_id, agent = %role, "Agent not enabled, keeping current agent");
            return Ok(false);
        }

        self.update(move |p| p.current_agent = role).await?;
        self.notify(
            "Agent switched",
            &format!("The '{}' agent is now working on the project", role),
            Severity::Info,
        )
        .await?;
        info!(project_id = %self.project_id, agent = %role, "Switched agent");
        Ok(true)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_switch_agent_respects_toggles() {
        let dir = TempDir::new().unwrap();
        let agents = AgentToggles {
            testing: false,
            ..Default::default()
        };
        let ctx = context(&dir, agents).await;

        assert!(!ctx.switch_agent(AgentRole::Testing).await.unwrap());
        assert!(ctx.switch_agent(AgentRole::Developer).await.unwrap());

        let project = ctx.repo.get_project("p-1").await.unwrap().unwrap();
        assert_eq!(project.current_agent, AgentRole::Developer);
        assert_eq!(project.notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_project() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, AgentToggles::default()).await;
        ctx.project_id = "ghost".to_string();
        assert!(matches!(
            ctx.update(|p| p.progress = 1).await,
            Err(CoreError::ProjectNotFound(_))
        ));
    }
}
