//! The autonomous build script.
//!
//! A build walks a fixed sequence of stages: analysis, planning,
//! implementation, testing, completed. Every stage is persisted before the
//! next one starts, every file write and command waits at the pause gate,
//! and any error ends the build with the project marked `error`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use storm_planner::{
    analysis_response, classify_project, count_files, development_plan, extract_project_name,
    flatten_file_structure, generate_tasks, plan_structure, run_instructions, ContentSource,
    Language, ProjectType, TechStack,
};
use storm_store::{
    AgentRole, BuildConfig, MessageRole, Phase, Project, ProjectStatus, Severity, SpecialAction,
};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

use crate::context::BuildContext;
use crate::error::{CoreError, CoreResult};
use crate::executor::CommandExecutor;
use crate::registry::BuildRegistry;

const PROGRESS_ANALYSIS: u8 = 5;
const PROGRESS_PLANNING: u8 = 10;
const PROGRESS_IMPLEMENTATION: u8 = 25;
const PROGRESS_FILES_SPAN: usize = 50;
const PROGRESS_DEPENDENCIES: u8 = 75;
const PROGRESS_TESTING: u8 = 90;

/// A stage change of one build, broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub project_id: String,
    pub status: ProjectStatus,
    pub phase: Phase,
    pub progress: u8,
}

impl BuildEvent {
    fn of(project: &Project) -> Self {
        Self {
            project_id: project.project_id.clone(),
            status: project.status,
            phase: project.phase,
            progress: project.progress,
        }
    }
}

/// Progress after `done` of `total` planned files have been written.
pub fn file_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_IMPLEMENTATION;
    }
    let step = (PROGRESS_FILES_SPAN * done / total).min(PROGRESS_FILES_SPAN);
    PROGRESS_IMPLEMENTATION + step as u8
}

/// Dependency install command for a stack, if it has one.
pub fn install_command(stack: &TechStack) -> Option<&'static str> {
    if stack.framework.is_node() {
        Some("npm install")
    } else if stack.language == Language::Python {
        Some("pip install -r requirements.txt")
    } else {
        None
    }
}

/// Runs one build from description to completed project.
pub struct AutonomousBuilder {
    ctx: BuildContext,
    description: String,
    config: BuildConfig,
    pacing_scale: f64,
    executor: CommandExecutor,
    content: Arc<dyn ContentSource>,
    approval: Arc<Notify>,
    registry: BuildRegistry,
    events: broadcast::Sender<BuildEvent>,
}

impl AutonomousBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: BuildContext,
        description: impl Into<String>,
        config: BuildConfig,
        pacing_scale: f64,
        executor: CommandExecutor,
        content: Arc<dyn ContentSource>,
        approval: Arc<Notify>,
        registry: BuildRegistry,
        events: broadcast::Sender<BuildEvent>,
    ) -> Self {
        Self {
            ctx,
            description: description.into(),
            config,
            pacing_scale: if pacing_scale.is_finite() { pacing_scale.max(0.0) } else { 1.0 },
            executor,
            content,
            approval,
            registry,
            events,
        }
    }

    /// Run the build to completion or error, then leave the registry.
    pub async fn run(self) {
        let project_id = self.ctx.project_id.clone();
        info!(project_id = %project_id, "Build started");

        match self.build().await {
            Ok(()) => info!(project_id = %project_id, "Build completed"),
            Err(e) => {
                error!(project_id = %project_id, error = %e, "Build failed");
                self.fail(&e).await;
            }
        }

        self.registry.unregister(&project_id);
    }

    async fn build(&self) -> CoreResult<()> {
        let project = self.start().await?;
        let (project_type, stack) = self.analyse().await?;
        let files = self.plan(&project, project_type, &stack).await?;
        self.await_approval().await?;
        self.implement(&files, project_type, &stack).await?;
        self.install_dependencies(&stack).await?;
        self.test().await?;
        self.finish(&project.name, project_type, &stack, files.len()).await
    }

    /// Sleep `secs` nominal seconds, scaled by speed and pacing, honouring pauses.
    async fn wait(&self, secs: f64) {
        let scaled = secs * self.config.development_speed.wait_factor() * self.pacing_scale;
        if scaled > 0.0 {
            let duration = Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX);
            self.ctx.gate.sleep(duration).await;
        }
    }

    /// Persist a stage change and broadcast it.
    async fn stage<F>(&self, f: F) -> CoreResult<Project>
    where
        F: Fn(&mut Project) + Send + Sync + 'static,
    {
        let project = self.ctx.update(f).await?;
        debug!(
            project_id = %project.project_id,
            phase = %project.phase,
            progress = project.progress,
            "Stage updated"
        );
        // No subscribers is fine.
        let _ = self.events.send(BuildEvent::of(&project));
        Ok(project)
    }

    async fn start(&self) -> CoreResult<Project> {
        let repo = &self.ctx.repo;
        if repo.get_project(&self.ctx.project_id).await?.is_none() {
            let name = extract_project_name(&self.description);
            repo.insert_project(Project::new(
                &self.ctx.project_id,
                &self.ctx.user_id,
                name,
                &self.description,
                self.config,
            ))
            .await?;
        }
        repo.ensure_session(&self.ctx.project_id, &self.ctx.user_id, self.config.model)
            .await?;

        self.ctx.say(MessageRole::User, self.description.clone()).await?;
        let project = self
            .stage(|p| {
                p.set_phase(Phase::Analysis);
                p.update_progress(PROGRESS_ANALYSIS as i64);
                p.current_step = Some("Analyzing project requirements".to_string());
            })
            .await?;
        self.ctx
            .notify(
                "Build started",
                &format!("Starting autonomous build of project '{}'", project.name),
                Severity::Info,
            )
            .await?;
        self.wait(3.0).await;
        Ok(project)
    }

    async fn analyse(&self) -> CoreResult<(ProjectType, TechStack)> {
        self.ctx.checkpoint().await;
        let (project_type, stack) = classify_project(&self.description);
        info!(
            project_id = %self.ctx.project_id,
            project_type = %project_type,
            framework = %stack.framework,
            "Classified project"
        );

        self.ctx
            .update(move |p| {
                p.project_type = Some(project_type);
                p.tech_stack = Some(stack);
                p.requires_approval = true;
            })
            .await?;
        Ok((project_type, stack))
    }

    async fn plan(
        &self,
        project: &Project,
        project_type: ProjectType,
        stack: &TechStack,
    ) -> CoreResult<Vec<String>> {
        self.ctx.checkpoint().await;
        let tree = plan_structure(project_type, stack);
        let tasks = generate_tasks(project_type, stack);
        let plan = development_plan(project_type, stack, &tree, &tasks);
        let total_files = count_files(&tree) as u32;

        self.ctx.assistant(analysis_response(project_type, stack)).await?;
        self.ctx
            .repo
            .append_message(
                &project.project_id,
                MessageRole::Assistant,
                plan.clone(),
                vec![
                    SpecialAction::ShowDevelopmentPlan { plan: plan.clone() },
                    SpecialAction::ProjectApprovalRequired { plan: plan.clone() },
                ],
            )
            .await?;

        let stored_tree = tree.clone();
        self.stage(move |p| {
            p.plan = Some(plan.clone());
            p.structure = Some(stored_tree.clone());
            p.total_files = total_files;
            if p.status != ProjectStatus::Paused {
                p.status = ProjectStatus::PendingApproval;
            }
            p.set_phase(Phase::Planning);
            p.update_progress(PROGRESS_PLANNING as i64);
            p.current_step = Some("Waiting for plan approval".to_string());
        })
        .await?;

        Ok(flatten_file_structure(&tree)
            .into_iter()
            .map(|f| f.path)
            .collect())
    }

    async fn await_approval(&self) -> CoreResult<()> {
        if self.config.require_approval {
            info!(project_id = %self.ctx.project_id, "Waiting for plan approval");
            self.ctx
                .assistant("⏸️ The plan is ready. Reply \"start\" to approve it and begin the build.")
                .await?;
            self.approval.notified().await;
            info!(project_id = %self.ctx.project_id, "Plan approved");
        } else {
            self.wait(3.0).await;
            self.wait(2.0).await;
            warn!(project_id = %self.ctx.project_id, "Proceeding without waiting for plan approval");
        }

        self.ctx.checkpoint().await;
        let project = self
            .ctx
            .repo
            .get_project(&self.ctx.project_id)
            .await?
            .ok_or_else(|| CoreError::ProjectNotFound(self.ctx.project_id.clone()))?;
        if let Some(tree) = &project.structure {
            let json = serde_json::to_string_pretty(tree).unwrap_or_default();
            self.ctx
                .assistant(format!("📂 Project structure:\n```json\n{}\n```", json))
                .await?;
        }

        self.stage(|p| {
            // A pause requested while waiting stays in force.
            if p.status != ProjectStatus::Paused {
                p.status = ProjectStatus::Active;
            }
            p.set_phase(Phase::Implementation);
            p.update_progress(PROGRESS_IMPLEMENTATION as i64);
            p.current_step = Some("Creating project files".to_string());
        })
        .await?;
        self.ctx.switch_agent(AgentRole::Developer).await?;
        Ok(())
    }

    async fn implement(&self, files: &[String], project_type: ProjectType, stack: &TechStack) -> CoreResult<()> {
        let total = files.len();
        for (i, path) in files.iter().enumerate() {
            let content = self.content.file_content(path, project_type, stack).await;
            // A pause requested during generation holds the write.
            self.ctx.checkpoint().await;

            let full_path = self.ctx.workspace.join(path);
            if let Some(parent) = full_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full_path, &content).await?;
            debug!(project_id = %self.ctx.project_id, path = %path, "Wrote file");

            let progress = file_progress(i + 1, total);
            let recorded = path.clone();
            self.stage(move |p| {
                p.add_file(&recorded, Some(&content));
                p.update_progress(progress as i64);
                p.current_step = Some(format!("Created {}", recorded));
            })
            .await?;
            self.ctx.assistant(format!("✅ File created: `{}`", path)).await?;
            self.wait(1.0).await;
        }
        Ok(())
    }

    async fn install_dependencies(&self, stack: &TechStack) -> CoreResult<()> {
        self.stage(|p| {
            p.update_progress(PROGRESS_DEPENDENCIES as i64);
            p.current_step = Some("Installing dependencies".to_string());
        })
        .await?;

        if let Some(command) = install_command(stack) {
            let ok = self.executor.execute(&self.ctx, command).await?;
            if !ok {
                warn!(project_id = %self.ctx.project_id, command, "Dependency install failed, continuing");
            }
        }
        Ok(())
    }

    async fn test(&self) -> CoreResult<()> {
        self.ctx.checkpoint().await;
        if self.config.agents.testing {
            self.ctx.switch_agent(AgentRole::Testing).await?;
        }
        self.stage(|p| {
            p.set_phase(Phase::Testing);
            p.update_progress(PROGRESS_TESTING as i64);
            p.current_step = Some("Testing the project".to_string());
        })
        .await?;
        self.wait(3.0).await;
        Ok(())
    }

    async fn finish(&self, name: &str, project_type: ProjectType, stack: &TechStack, file_count: usize) -> CoreResult<()> {
        self.ctx.checkpoint().await;
        self.stage(|p| {
            p.complete();
            p.current_step = Some("Completed".to_string());
        })
        .await?;

        let summary = format!(
            "🎉 **Project completed!**\n\n\
             **{}** is ready.\n\n\
             - Type: {}\n\
             - Tech stack: {}\n\
             - Files created: {}\n\n\
             **How to run it:**\n{}",
            name,
            project_type.label(),
            stack.summary(),
            file_count,
            run_instructions(stack)
        );
        self.ctx.assistant(summary).await?;
        self.ctx
            .notify(
                "Build completed",
                &format!("Project '{}' is ready", name),
                Severity::Success,
            )
            .await?;
        Ok(())
    }

    /// Mark the project failed. Transcript and notification are best-effort.
    async fn fail(&self, e: &CoreError) {
        let message = format!("Error: {}", e);
        let result = self
            .stage(move |p| {
                p.status = ProjectStatus::Error;
                p.current_step = Some(message.clone());
            })
            .await;
        if let Err(store_err) = result {
            error!(project_id = %self.ctx.project_id, error = %store_err, "Could not record build failure");
        }

        let apology = format!(
            "❌ I'm sorry, the build ran into a problem and had to stop: {}",
            e
        );
        if let Err(err) = self.ctx.assistant(apology).await {
            debug!(project_id = %self.ctx.project_id, error = %err, "Could not post failure message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_planner::Framework;

    #[test]
    fn test_file_progress() {
        assert_eq!(file_progress(0, 0), 25);
        assert_eq!(file_progress(1, 4), 37);
        assert_eq!(file_progress(2, 4), 50);
        assert_eq!(file_progress(4, 4), 75);
        assert_eq!(file_progress(1, 3), 41);
    }

    #[test]
    fn test_file_progress_never_decreases() {
        let total = 7;
        let steps: Vec<u8> = (1..=total).map(|i| file_progress(i, total)).collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*steps.last().unwrap(), 75);
    }

    #[test]
    fn test_install_command() {
        assert_eq!(
            install_command(&TechStack::new(Language::Javascript, Framework::React)),
            Some("npm install")
        );
        assert_eq!(
            install_command(&TechStack::new(Language::Python, Framework::Flask)),
            Some("pip install -r requirements.txt")
        );
        assert_eq!(
            install_command(&TechStack::new(Language::Javascript, Framework::Express)),
            None
        );
    }
}
