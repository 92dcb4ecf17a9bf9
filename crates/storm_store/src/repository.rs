//! Typed operations on projects and sessions.
//!
//! Every method is a single [`SessionGateway::run_with_session`] call, so
//! read-modify-write sequences run inside one transaction and are retried
//! as a whole.

use tracing::debug;

use crate::error::StoreResult;
use crate::gateway::SessionGateway;
use crate::models::{MessageRole, ModelProvider, Project, ProjectSession, ProjectStatus, SpecialAction};
use crate::schema::{read_project, read_projects_for_user, read_session, write_project, write_session};

/// Repository over the `projects` and `project_sessions` tables.
#[derive(Debug, Clone)]
pub struct ProjectRepository {
    gateway: SessionGateway,
}

impl ProjectRepository {
    pub fn new(gateway: SessionGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &SessionGateway {
        &self.gateway
    }

    /// Insert a new project row. Fails if the id already exists.
    pub async fn insert_project(&self, project: Project) -> StoreResult<()> {
        debug!(project_id = %project.project_id, "Inserting project");
        self.gateway
            .run_with_session(move |tx| write_project(tx, &project, true).map(|_| ()))
            .await
    }

    pub async fn get_project(&self, project_id: &str) -> StoreResult<Option<Project>> {
        let id = project_id.to_string();
        self.gateway
            .run_with_session(move |tx| read_project(tx, &id))
            .await
    }

    /// Projects owned by `user_id`, most recently updated first.
    pub async fn list_projects(&self, user_id: &str) -> StoreResult<Vec<Project>> {
        let user = user_id.to_string();
        self.gateway
            .run_with_session(move |tx| read_projects_for_user(tx, &user))
            .await
    }

    /// Load, modify and save a project in one transaction.
    ///
    /// Returns the saved project, or `None` when no such project exists.
    /// `f` may run more than once if the transaction is retried.
    pub async fn update_project<F>(&self, project_id: &str, f: F) -> StoreResult<Option<Project>>
    where
        F: Fn(&mut Project) + Send + Sync + 'static,
    {
        let id = project_id.to_string();
        self.gateway
            .run_with_session(move |tx| {
                let Some(mut project) = read_project(tx, &id)? else {
                    return Ok(None);
                };
                f(&mut project);
                write_project(tx, &project, false)?;
                Ok(Some(project))
            })
            .await
    }

    /// Set the status. Returns `false` when the project does not exist.
    pub async fn set_status(&self, project_id: &str, status: ProjectStatus) -> StoreResult<bool> {
        let updated = self
            .update_project(project_id, move |p| {
                p.status = status;
                p.updated_at = chrono::Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }

    /// Fetch the session for a project, creating an empty one if missing.
    pub async fn ensure_session(
        &self,
        project_id: &str,
        user_id: &str,
        ai_model: ModelProvider,
    ) -> StoreResult<ProjectSession> {
        let id = project_id.to_string();
        let user = user_id.to_string();
        self.gateway
            .run_with_session(move |tx| {
                if let Some(existing) = read_session(tx, &id)? {
                    return Ok(existing);
                }
                let session = ProjectSession::new(id.clone(), user.clone(), ai_model);
                write_session(tx, &session)?;
                Ok(session)
            })
            .await
    }

    pub async fn get_session(&self, project_id: &str) -> StoreResult<Option<ProjectSession>> {
        let id = project_id.to_string();
        self.gateway
            .run_with_session(move |tx| read_session(tx, &id))
            .await
    }

    /// Load, modify and save a session in one transaction.
    pub async fn update_session<F>(&self, project_id: &str, f: F) -> StoreResult<Option<ProjectSession>>
    where
        F: Fn(&mut ProjectSession) + Send + Sync + 'static,
    {
        let id = project_id.to_string();
        self.gateway
            .run_with_session(move |tx| {
                let Some(mut session) = read_session(tx, &id)? else {
                    return Ok(None);
                };
                f(&mut session);
                write_session(tx, &session)?;
                Ok(Some(session))
            })
            .await
    }

    /// Append a message. Returns `false` when the session does not exist.
    pub async fn append_message(
        &self,
        project_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        special_actions: Vec<SpecialAction>,
    ) -> StoreResult<bool> {
        let content = content.into();
        let updated = self
            .update_session(project_id, move |s| {
                s.add_message(role, content.clone(), special_actions.clone());
            })
            .await?;
        Ok(updated.is_some())
    }

    pub async fn add_special_actions(
        &self,
        project_id: &str,
        actions: Vec<SpecialAction>,
    ) -> StoreResult<bool> {
        let updated = self
            .update_session(project_id, move |s| {
                s.add_special_actions(actions.clone());
            })
            .await?;
        Ok(updated.is_some())
    }

    pub async fn clear_history(&self, project_id: &str) -> StoreResult<bool> {
        let updated = self
            .update_session(project_id, |s| s.clear_history())
            .await?;
        Ok(updated.is_some())
    }
}
