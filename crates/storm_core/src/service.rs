//! Entry point for callers outside the build: start, pause, resume, inspect
//! and talk to builds.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storm_llm::{HttpGenerator, LlmProvider};
use storm_planner::{extract_project_name, ContentSource, TemplateContent};
use storm_runner::{CommandRunner, ShellRunner};
use storm_store::{
    BuildConfig, MessageRole, ModelProvider, Phase, Project, ProjectRepository, ProjectStatus,
    SessionGateway, SessionMessage, SpecialAction,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::builder::{AutonomousBuilder, BuildEvent};
use crate::config::{ContentMode, StormConfig};
use crate::content::GeneratedContent;
use crate::context::BuildContext;
use crate::error::{CoreError, CoreResult};
use crate::executor::CommandExecutor;
use crate::notifier::Notifier;
use crate::recovery::RecoveryEngine;
use crate::registry::BuildRegistry;

const EVENT_CAPACITY: usize = 256;
// Messages searched for special actions to carry into a reply.
const RECENT_MESSAGES: usize = 5;

const APPROVE_WORDS: &[&str] = &["start", "begin", "build", "approve"];
const PLAN_WORDS: &[&str] = &["show plan", "view plan", "check", "verification"];
const FILES_WORDS: &[&str] = &["files", "show files", "view files"];

/// What a chat message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIntent {
    /// Approve the plan and start implementation. Only recognised while
    /// the project waits for approval.
    Approve,
    ShowPlan,
    ShowFiles,
    Other,
}

impl MessageIntent {
    pub fn detect(text: &str, status: ProjectStatus) -> Self {
        let lower = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if status == ProjectStatus::PendingApproval && has(APPROVE_WORDS) {
            Self::Approve
        } else if has(PLAN_WORDS) {
            Self::ShowPlan
        } else if has(FILES_WORDS) {
            Self::ShowFiles
        } else {
            Self::Other
        }
    }
}

/// A project with its transcript and what is on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectView {
    pub project: Project,
    pub messages: Vec<SessionMessage>,
    /// Paths relative to the workspace, sorted.
    pub workspace_files: Vec<String>,
}

/// Answer to a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReply {
    pub response: String,
    pub special_actions: Vec<SpecialAction>,
}

/// Owns the store, the registry of live builds and the collaborators every
/// build shares.
#[derive(Clone)]
pub struct BuildService {
    config: StormConfig,
    repo: ProjectRepository,
    registry: BuildRegistry,
    runner: Arc<dyn CommandRunner>,
    content: Option<Arc<dyn ContentSource>>,
    events: broadcast::Sender<BuildEvent>,
}

impl BuildService {
    /// Service with a shell runner. File content follows
    /// `config.content_source`.
    pub fn new(config: StormConfig) -> Self {
        Self::with_runner(config, Arc::new(ShellRunner::new()))
    }

    pub fn with_runner(config: StormConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let repo = ProjectRepository::new(SessionGateway::new(config.store.clone()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            repo,
            registry: BuildRegistry::new(),
            runner,
            content: None,
            events,
        }
    }

    /// Use `content` for every build instead of choosing by configuration.
    pub fn with_content(mut self, content: Arc<dyn ContentSource>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn config(&self) -> &StormConfig {
        &self.config
    }

    pub fn repository(&self) -> &ProjectRepository {
        &self.repo
    }

    pub fn registry(&self) -> &BuildRegistry {
        &self.registry
    }

    /// Stage changes of every build started by this service.
    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    fn content_for(&self, model: ModelProvider) -> Arc<dyn ContentSource> {
        if let Some(content) = &self.content {
            return Arc::clone(content);
        }
        match self.config.content_source {
            ContentMode::Template => Arc::new(TemplateContent),
            ContentMode::Generated => {
                let provider = match model {
                    ModelProvider::OpenAI => LlmProvider::OpenAI,
                    ModelProvider::Anthropic => LlmProvider::Anthropic,
                    ModelProvider::Gemini => LlmProvider::Gemini,
                };
                match HttpGenerator::chain_from_env(provider) {
                    Ok(chain) => Arc::new(GeneratedContent::new(Arc::new(chain))),
                    Err(e) => {
                        warn!(error = %e, "No text-generation provider available, using templates");
                        Arc::new(TemplateContent)
                    }
                }
            }
        }
    }

    /// Create the project and start its build in the background. Returns
    /// the new project id.
    pub async fn start_build(&self, description: &str, user_id: &str, config: BuildConfig) -> CoreResult<String> {
        let description = description.trim();
        if description.is_empty() {
            return Err(CoreError::InvalidState {
                project_id: String::new(),
                message: "project description is empty".to_string(),
            });
        }

        let project_id = uuid::Uuid::new_v4().to_string();
        let name = extract_project_name(description);
        self.repo
            .insert_project(Project::new(&project_id, user_id, &name, description, config))
            .await?;
        self.repo.ensure_session(&project_id, user_id, config.model).await?;

        let workspace = self.config.project_workspace(user_id, &project_id);
        tokio::fs::create_dir_all(&workspace).await?;

        let (gate, approval) = self.registry.register(&project_id);
        let interval = self.config.paced(config.development_speed.notification_interval());
        let ctx = BuildContext {
            project_id: project_id.clone(),
            user_id: user_id.to_string(),
            workspace,
            notifier: Arc::new(Notifier::new(self.repo.clone(), &project_id, interval)),
            repo: self.repo.clone(),
            gate,
            agents: config.agents,
        };

        let recovery = Arc::new(RecoveryEngine::new(
            Arc::clone(&self.runner),
            self.config.command_timeout(),
            self.config.max_recovery_attempts,
        ));
        let executor = CommandExecutor::new(Arc::clone(&self.runner), recovery, self.config.command_timeout());
        let builder = AutonomousBuilder::new(
            ctx,
            description,
            config,
            self.config.pacing_scale,
            executor,
            self.content_for(config.model),
            approval,
            self.registry.clone(),
            self.events.clone(),
        );

        let task = tokio::spawn(builder.run());
        self.registry.attach_task(&project_id, task);
        info!(project_id = %project_id, user_id, name = %name, "Build queued");
        Ok(project_id)
    }

    /// Freeze a running build at its next checkpoint.
    pub async fn pause(&self, project_id: &str) -> CoreResult<()> {
        if !self.registry.pause(project_id) {
            return Err(CoreError::BuildNotActive(project_id.to_string()));
        }
        self.repo.update_project(project_id, |p| p.pause()).await?;
        info!(project_id, "Build paused");
        Ok(())
    }

    pub async fn resume(&self, project_id: &str) -> CoreResult<()> {
        if !self.registry.is_active(project_id) {
            return Err(CoreError::BuildNotActive(project_id.to_string()));
        }
        // Status first: once the gate opens the build writes its own status.
        let project = self.repo.update_project(project_id, |p| p.resume()).await?;
        self.registry.resume(project_id);
        info!(
            project_id,
            status = ?project.map(|p| p.status),
            "Build resumed"
        );
        Ok(())
    }

    /// Wait until the project's build task has finished.
    pub async fn wait_for(&self, project_id: &str) {
        self.registry.wait_for(project_id).await;
    }

    pub async fn get_project(&self, project_id: &str) -> CoreResult<ProjectView> {
        let project = self
            .repo
            .get_project(project_id)
            .await?
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))?;
        let messages = self
            .repo
            .get_session(project_id)
            .await?
            .map(|s| s.message_history)
            .unwrap_or_default();
        let workspace = self.config.project_workspace(&project.user_id, project_id);
        let workspace_files = list_workspace(&workspace);

        Ok(ProjectView {
            project,
            messages,
            workspace_files,
        })
    }

    pub async fn list_projects(&self, user_id: &str) -> CoreResult<Vec<Project>> {
        Ok(self.repo.list_projects(user_id).await?)
    }

    /// Record a user message and answer it.
    pub async fn send_message(&self, project_id: &str, text: &str) -> CoreResult<MessageReply> {
        let project = self
            .repo
            .get_project(project_id)
            .await?
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))?;
        let session = self
            .repo
            .ensure_session(project_id, &project.user_id, project.config.model)
            .await?;
        self.repo
            .append_message(project_id, MessageRole::User, text, Vec::new())
            .await?;

        let intent = MessageIntent::detect(text, project.status);
        debug!(project_id, ?intent, "Handling message");

        let mut special_actions = Vec::new();
        let response = match intent {
            MessageIntent::Approve => {
                self.approve(project_id).await?;
                "Perfect! Starting the project build according to the approved plan.".to_string()
            }
            MessageIntent::ShowPlan => match &project.plan {
                Some(plan) => {
                    special_actions.push(SpecialAction::ShowDevelopmentPlan { plan: plan.clone() });
                    "Here is the current development plan.".to_string()
                }
                None => "No development plan has been created yet.".to_string(),
            },
            MessageIntent::ShowFiles => {
                if project.generated_files.is_empty() {
                    "No files have been generated yet.".to_string()
                } else {
                    let list: Vec<String> = project
                        .generated_files
                        .iter()
                        .map(|f| format!("- `{}`", f.path))
                        .collect();
                    format!("📁 Generated files:\n{}", list.join("\n"))
                }
            }
            MessageIntent::Other => {
                "Thanks for your message. I'll keep it in mind while building the project.".to_string()
            }
        };

        let recent = session.message_history.iter().rev().take(RECENT_MESSAGES);
        if let Some(last) = recent
            .filter(|m| m.role == MessageRole::Assistant)
            .find(|m| !m.special_actions.is_empty())
        {
            for action in &last.special_actions {
                if !special_actions.contains(action) {
                    special_actions.push(action.clone());
                }
            }
        }

        if project.phase == Phase::Planning {
            if let Some(plan) = &project.plan {
                let has_plan = special_actions
                    .iter()
                    .any(|a| matches!(a, SpecialAction::ShowDevelopmentPlan { .. }));
                if !has_plan {
                    special_actions.push(SpecialAction::ShowDevelopmentPlan { plan: plan.clone() });
                }
            }
        }

        self.repo
            .append_message(
                project_id,
                MessageRole::Assistant,
                response.clone(),
                special_actions.clone(),
            )
            .await?;

        Ok(MessageReply {
            response,
            special_actions,
        })
    }

    /// Release a build waiting on its plan, or move a build that is no
    /// longer running straight into implementation.
    async fn approve(&self, project_id: &str) -> CoreResult<()> {
        if self.registry.approve(project_id) {
            info!(project_id, "Plan approved");
            return Ok(());
        }
        warn!(project_id, "Plan approved with no running build");
        self.repo
            .update_project(project_id, |p| {
                p.status = ProjectStatus::Active;
                p.set_phase(Phase::Implementation);
                p.update_progress(25);
            })
            .await?;
        Ok(())
    }
}

/// Files under `root`, relative and sorted. A missing directory is empty.
fn list_workspace(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_intent_detection() {
        use MessageIntent::*;
        let pending = ProjectStatus::PendingApproval;
        let active = ProjectStatus::Active;

        assert_eq!(MessageIntent::detect("Looks good, start!", pending), Approve);
        assert_eq!(MessageIntent::detect("Looks good, start!", active), Other);
        assert_eq!(MessageIntent::detect("can you SHOW PLAN", active), ShowPlan);
        assert_eq!(MessageIntent::detect("show files please", active), ShowFiles);
        assert_eq!(MessageIntent::detect("use blue buttons", pending), Other);
    }

    #[test]
    fn test_list_workspace() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/components")).unwrap();
        std::fs::write(dir.path().join("src/components/App.js"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();

        assert_eq!(
            list_workspace(dir.path()),
            vec!["README.md".to_string(), "src/components/App.js".to_string()]
        );
        assert!(list_workspace(&dir.path().join("missing")).is_empty());
    }
}
