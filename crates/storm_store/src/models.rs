//! Persisted build records: [`Project`] and [`ProjectSession`].

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use storm_planner::{FileTree, ProjectType, TechStack};

use crate::error::StoreError;

const PREVIEW_LIMIT: usize = 200;

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Error,
    PendingApproval,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::PendingApproval => "pending_approval",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "pending_approval" => Ok(Self::PendingApproval),
            other => Err(StoreError::invalid("status", other)),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage of the build script. Ordered so forward transitions compare greater.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Initial,
    Analysis,
    Planning,
    Implementation,
    Testing,
    Refinement,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Analysis => "analysis",
            Self::Planning => "planning",
            Self::Implementation => "implementation",
            Self::Testing => "testing",
            Self::Refinement => "refinement",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for Phase {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "analysis" => Ok(Self::Analysis),
            "planning" => Ok(Self::Planning),
            "implementation" => Ok(Self::Implementation),
            "testing" => Ok(Self::Testing),
            "refinement" => Ok(Self::Refinement),
            "completed" => Ok(Self::Completed),
            other => Err(StoreError::invalid("phase", other)),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent currently working on the project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    #[default]
    Architect,
    Developer,
    Testing,
    Fixing,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Developer => "developer",
            Self::Testing => "testing",
            Self::Fixing => "fixing",
        }
    }
}

impl FromStr for AgentRole {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "architect" => Ok(Self::Architect),
            "developer" => Ok(Self::Developer),
            "testing" => Ok(Self::Testing),
            "fixing" => Ok(Self::Fixing),
            other => Err(StoreError::invalid("current_agent", other)),
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn enabled() -> bool {
    true
}

/// Which agents may take over the project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentToggles {
    #[serde(default = "enabled")]
    pub architect: bool,
    #[serde(default = "enabled")]
    pub developer: bool,
    #[serde(default = "enabled")]
    pub testing: bool,
    #[serde(default = "enabled")]
    pub fixing: bool,
}

impl Default for AgentToggles {
    fn default() -> Self {
        Self {
            architect: true,
            developer: true,
            testing: true,
            fixing: true,
        }
    }
}

impl AgentToggles {
    pub fn is_enabled(&self, role: AgentRole) -> bool {
        match role {
            AgentRole::Architect => self.architect,
            AgentRole::Developer => self.developer,
            AgentRole::Testing => self.testing,
            AgentRole::Fixing => self.fixing,
        }
    }
}

/// Pacing preset for a build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentSpeed {
    Fast,
    #[default]
    Balanced,
    Thorough,
}

impl DevelopmentSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Thorough => "thorough",
        }
    }

    /// Minimum gap between two non-progress notifications.
    pub fn notification_interval(&self) -> Duration {
        match self {
            Self::Fast => Duration::from_secs(5),
            Self::Balanced => Duration::from_secs(10),
            Self::Thorough => Duration::from_secs(15),
        }
    }

    /// Multiplier applied to every simulated wait.
    pub fn wait_factor(&self) -> f64 {
        match self {
            Self::Fast => 0.5,
            Self::Balanced => 1.0,
            Self::Thorough => 1.5,
        }
    }
}

impl FromStr for DevelopmentSpeed {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            other => Err(StoreError::invalid("development_speed", other)),
        }
    }
}

/// Text-generation provider chosen for the project.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    OpenAI,
    Anthropic,
    Gemini,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Parse a provider name; anything unknown falls back to OpenAI.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Self::Anthropic,
            "gemini" => Self::Gemini,
            _ => Self::OpenAI,
        }
    }
}

impl<'de> Deserialize<'de> for ModelProvider {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lossy(&raw))
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-build options supplied by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct BuildConfig {
    pub model: ModelProvider,
    pub agents: AgentToggles,
    pub development_speed: DevelopmentSpeed,
    /// Block the build after planning until the plan is approved.
    pub require_approval: bool,
}

/// Notification severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Progress,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Progress => "progress",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Success => "✅",
            Self::Warning => "⚠️",
            Self::Error => "❌",
            Self::Progress => "🔄",
        }
    }
}

/// A notification recorded on the project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// A file written into the workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedFile {
    pub path: String,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Status of a recorded action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Completed,
}

/// Work item recorded on the project, e.g. an executed command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub description: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// One build job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub project_id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub project_type: Option<ProjectType>,
    pub tech_stack: Option<TechStack>,
    pub status: ProjectStatus,
    pub phase: Phase,
    pub progress: u8,
    pub current_step: Option<String>,
    pub requires_approval: bool,
    pub generated_files: Vec<GeneratedFile>,
    pub pending_actions: Vec<PendingAction>,
    pub notifications: Vec<Notification>,
    pub plan: Option<String>,
    pub structure: Option<FileTree>,
    pub total_files: u32,
    pub current_agent: AgentRole,
    pub error_count: u32,
    pub config: BuildConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a fresh project in the `initial` phase.
    pub fn new(
        project_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        config: BuildConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            description: description.into(),
            project_type: None,
            tech_stack: None,
            status: ProjectStatus::Active,
            phase: Phase::Initial,
            progress: 0,
            current_step: None,
            requires_approval: false,
            generated_files: Vec::new(),
            pending_actions: Vec::new(),
            notifications: Vec::new(),
            plan: None,
            structure: None,
            total_files: 0,
            current_agent: AgentRole::Architect,
            error_count: 0,
            config,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Record a generated file. Returns `false` if the path is already recorded.
    pub fn add_file(&mut self, path: &str, content: Option<&str>) -> bool {
        if self.generated_files.iter().any(|f| f.path == path) {
            return false;
        }

        let preview = content.map(|text| {
            if text.chars().count() > PREVIEW_LIMIT {
                let cut: String = text.chars().take(PREVIEW_LIMIT).collect();
                format!("{}...", cut)
            } else {
                text.to_string()
            }
        });

        let name = path.rsplit('/').next().unwrap_or(path);
        let file_type = match name.rfind('.') {
            Some(i) if i + 1 < name.len() => name[i + 1..].to_string(),
            _ => "txt".to_string(),
        };

        self.generated_files.push(GeneratedFile {
            path: path.to_string(),
            file_type,
            preview,
            created_at: Utc::now(),
        });
        self.touch();
        true
    }

    /// Record a new pending action and return its id.
    pub fn add_pending_action(
        &mut self,
        action_type: &str,
        description: &str,
        details: serde_json::Value,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.pending_actions.push(PendingAction {
            id: id.clone(),
            action_type: action_type.to_string(),
            description: description.to_string(),
            details,
            status: ActionStatus::Pending,
            result: None,
            created_at: Utc::now(),
            completed_at: None,
        });
        self.touch();
        id
    }

    /// Mark an action completed. Returns `false` for an unknown id.
    pub fn complete_action(&mut self, action_id: &str, result: Option<serde_json::Value>) -> bool {
        let Some(action) = self.pending_actions.iter_mut().find(|a| a.id == action_id) else {
            return false;
        };
        action.status = ActionStatus::Completed;
        action.completed_at = Some(Utc::now());
        if result.is_some() {
            action.result = result;
        }
        self.touch();
        true
    }

    /// Set progress, clamped to 0..=100.
    pub fn update_progress(&mut self, progress: i64) -> u8 {
        self.progress = progress.clamp(0, 100) as u8;
        self.touch();
        self.progress
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.touch();
    }

    pub fn add_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
        self.touch();
    }

    pub fn pause(&mut self) {
        self.status = ProjectStatus::Paused;
        self.touch();
    }

    /// Leave a pause. A project whose plan is still waiting for approval
    /// goes back to `PendingApproval`, anything else becomes `Active`.
    pub fn resume(&mut self) {
        self.status = if self.awaiting_approval() {
            ProjectStatus::PendingApproval
        } else {
            ProjectStatus::Active
        };
        self.touch();
    }

    /// Planned but not yet moved on to implementation.
    pub fn awaiting_approval(&self) -> bool {
        self.phase == Phase::Planning && self.plan.is_some()
    }

    pub fn complete(&mut self) {
        self.status = ProjectStatus::Completed;
        self.progress = 100;
        self.phase = Phase::Completed;
        self.touch();
    }
}

/// Role of a transcript message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Structured payload for the UI attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpecialAction {
    ShowDevelopmentPlan { plan: String },
    ProjectApprovalRequired { plan: String },
    CreateFile { path: String, content: String },
}

/// A single transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_actions: Vec<SpecialAction>,
}

/// Conversation and event log for one project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSession {
    pub project_id: String,
    pub user_id: String,
    pub ai_model: ModelProvider,
    pub message_history: Vec<SessionMessage>,
    pub special_actions: Vec<SpecialAction>,
    pub last_active: DateTime<Utc>,
}

const SYSTEM_ACTIONS_TEXT: &str = "System special actions";

impl ProjectSession {
    pub fn new(project_id: impl Into<String>, user_id: impl Into<String>, ai_model: ModelProvider) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            ai_model,
            message_history: Vec::new(),
            special_actions: Vec::new(),
            last_active: Utc::now(),
        }
    }

    /// Append a message to the transcript.
    pub fn add_message(
        &mut self,
        role: MessageRole,
        content: impl Into<String>,
        special_actions: Vec<SpecialAction>,
    ) -> &SessionMessage {
        self.special_actions.extend(special_actions.iter().cloned());
        self.message_history.push(SessionMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            special_actions,
        });
        self.last_active = Utc::now();
        &self.message_history[self.message_history.len() - 1]
    }

    /// Attach actions to the latest assistant message, or to a new system
    /// message when there is none.
    pub fn add_special_actions(&mut self, actions: Vec<SpecialAction>) -> &SessionMessage {
        let last_assistant = self
            .message_history
            .iter()
            .rposition(|m| m.role == MessageRole::Assistant);

        match last_assistant {
            Some(index) => {
                self.special_actions.extend(actions.iter().cloned());
                self.message_history[index].special_actions.extend(actions);
                self.last_active = Utc::now();
                &self.message_history[index]
            }
            None => self.add_message(MessageRole::System, SYSTEM_ACTIONS_TEXT, actions),
        }
    }

    /// Drop the whole transcript.
    pub fn clear_history(&mut self) {
        self.message_history.clear();
        self.last_active = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project::new("p-1", "default", "demo", "a demo", BuildConfig::default())
    }

    #[test]
    fn test_build_config_defaults() {
        let config: BuildConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.model, ModelProvider::OpenAI);
        assert_eq!(config.agents, AgentToggles::default());
        assert!(config.agents.is_enabled(AgentRole::Testing));
        assert_eq!(config.development_speed, DevelopmentSpeed::Balanced);
        assert!(!config.require_approval);
    }

    #[test]
    fn test_build_config_lenient_model() {
        let config: BuildConfig =
            serde_json::from_str(r#"{"model": "llama", "agents": {"testing": false}}"#).unwrap();
        assert_eq!(config.model, ModelProvider::OpenAI);
        assert!(!config.agents.testing);
        assert!(config.agents.fixing);

        let config: BuildConfig = serde_json::from_str(r#"{"model": "Gemini"}"#).unwrap();
        assert_eq!(config.model, ModelProvider::Gemini);
    }

    #[test]
    fn test_speed_intervals() {
        assert_eq!(DevelopmentSpeed::Fast.notification_interval(), Duration::from_secs(5));
        assert_eq!(DevelopmentSpeed::Thorough.wait_factor(), 1.5);
    }

    #[test]
    fn test_phase_order_and_parse() {
        assert!(Phase::Analysis < Phase::Planning);
        assert!(Phase::Testing < Phase::Completed);
        assert_eq!("pending_approval".parse::<ProjectStatus>().unwrap(), ProjectStatus::PendingApproval);
        assert!("sleeping".parse::<Phase>().is_err());
    }

    #[test]
    fn test_add_file_dedupes_and_truncates() {
        let mut project = project();
        let long = "x".repeat(250);

        assert!(project.add_file("src/App.js", Some(&long)));
        assert!(!project.add_file("src/App.js", Some("again")));
        assert!(project.add_file("Makefile", None));

        let first = &project.generated_files[0];
        assert_eq!(first.file_type, "js");
        assert_eq!(first.preview.as_deref().map(str::len), Some(203));
        assert_eq!(project.generated_files[1].file_type, "txt");
    }

    #[test]
    fn test_actions_lifecycle() {
        let mut project = project();
        let id = project.add_pending_action("command", "Run: ls", serde_json::Value::Null);
        assert_eq!(project.pending_actions[0].status, ActionStatus::Pending);

        assert!(project.complete_action(&id, Some(serde_json::json!({"status": 0}))));
        assert!(!project.complete_action("missing", None));

        let action = &project.pending_actions[0];
        assert_eq!(action.status, ActionStatus::Completed);
        assert_eq!(action.result, Some(serde_json::json!({"status": 0})));
    }

    #[test]
    fn test_progress_clamp_and_complete() {
        let mut project = project();
        assert_eq!(project.update_progress(150), 100);
        assert_eq!(project.update_progress(-3), 0);

        project.pause();
        assert_eq!(project.status, ProjectStatus::Paused);
        project.resume();
        assert_eq!(project.status, ProjectStatus::Active);

        project.plan = Some("# Plan".to_string());
        project.set_phase(Phase::Planning);
        project.pause();
        project.resume();
        assert_eq!(project.status, ProjectStatus::PendingApproval);
        project.complete();
        assert_eq!((project.status, project.phase, project.progress), (ProjectStatus::Completed, Phase::Completed, 100));
    }

    #[test]
    fn test_special_actions_attach_to_last_assistant() {
        let mut session = ProjectSession::new("p-1", "default", ModelProvider::OpenAI);
        let plan = SpecialAction::ShowDevelopmentPlan { plan: "plan".into() };

        let msg = session.add_special_actions(vec![plan.clone()]);
        assert_eq!(msg.role, MessageRole::System);
        assert_eq!(msg.content, SYSTEM_ACTIONS_TEXT);

        session.add_message(MessageRole::Assistant, "analysis", Vec::new());
        session.add_message(MessageRole::User, "ok", Vec::new());
        session.add_special_actions(vec![plan.clone()]);

        assert_eq!(session.message_history.len(), 3);
        assert_eq!(session.message_history[1].special_actions, vec![plan.clone()]);
        assert!(session.message_history[2].special_actions.is_empty());
        assert_eq!(session.special_actions.len(), 2);

        session.clear_history();
        assert!(session.message_history.is_empty());
    }

    #[test]
    fn test_special_action_wire_shape() {
        let action = SpecialAction::ProjectApprovalRequired { plan: "p".into() };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json, serde_json::json!({"type": "project_approval_required", "plan": "p"}));
    }
}
