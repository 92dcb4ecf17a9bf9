//! SQLite schema and row mapping.
//!
//! Scalar fields live in their own columns; nested values are stored as
//! JSON text.

use chrono::{DateTime, Utc};
use rusqlite::{named_params, OptionalExtension, Row, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use storm_planner::ProjectType;

use crate::error::{StoreError, StoreResult};
use crate::models::{Project, ProjectSession};

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL DEFAULT 'default',
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    project_type TEXT,
    tech_stack TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    phase TEXT NOT NULL DEFAULT 'initial',
    progress INTEGER NOT NULL DEFAULT 0,
    current_step TEXT,
    requires_approval INTEGER NOT NULL DEFAULT 0,
    generated_files TEXT NOT NULL DEFAULT '[]',
    pending_actions TEXT NOT NULL DEFAULT '[]',
    notifications TEXT NOT NULL DEFAULT '[]',
    plan TEXT,
    structure TEXT,
    total_files INTEGER NOT NULL DEFAULT 0,
    current_agent TEXT NOT NULL DEFAULT 'architect',
    active_agents TEXT NOT NULL,
    development_speed TEXT NOT NULL DEFAULT 'balanced',
    model TEXT NOT NULL DEFAULT 'openai',
    error_count INTEGER NOT NULL DEFAULT 0,
    config TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id);

CREATE TABLE IF NOT EXISTS project_sessions (
    project_id TEXT PRIMARY KEY REFERENCES projects(project_id),
    user_id TEXT NOT NULL DEFAULT 'default',
    ai_model TEXT NOT NULL DEFAULT 'openai',
    message_history TEXT NOT NULL DEFAULT '[]',
    special_actions TEXT NOT NULL DEFAULT '[]',
    last_active TEXT NOT NULL
);
";

const PROJECT_COLUMNS: &str = "project_id, user_id, name, description, project_type, tech_stack, \
     status, phase, progress, current_step, requires_approval, generated_files, pending_actions, \
     notifications, plan, structure, total_files, current_agent, error_count, config, \
     created_at, updated_at";

const INSERT_PROJECT: &str = "INSERT INTO projects (
        project_id, user_id, name, description, project_type, tech_stack, status, phase,
        progress, current_step, requires_approval, generated_files, pending_actions,
        notifications, plan, structure, total_files, current_agent, active_agents,
        development_speed, model, error_count, config, created_at, updated_at
    ) VALUES (
        :project_id, :user_id, :name, :description, :project_type, :tech_stack, :status, :phase,
        :progress, :current_step, :requires_approval, :generated_files, :pending_actions,
        :notifications, :plan, :structure, :total_files, :current_agent, :active_agents,
        :development_speed, :model, :error_count, :config, :created_at, :updated_at
    )";

const UPDATE_PROJECT: &str = "UPDATE projects SET
        user_id = :user_id, name = :name, description = :description,
        project_type = :project_type, tech_stack = :tech_stack, status = :status,
        phase = :phase, progress = :progress, current_step = :current_step,
        requires_approval = :requires_approval, generated_files = :generated_files,
        pending_actions = :pending_actions, notifications = :notifications, plan = :plan,
        structure = :structure, total_files = :total_files, current_agent = :current_agent,
        active_agents = :active_agents, development_speed = :development_speed,
        model = :model, error_count = :error_count, config = :config,
        created_at = :created_at, updated_at = :updated_at
    WHERE project_id = :project_id";

fn to_json<T: Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn to_json_opt<T: Serialize>(value: &Option<T>) -> StoreResult<Option<String>> {
    value.as_ref().map(to_json).transpose()
}

fn from_json<T: DeserializeOwned>(text: &str) -> StoreResult<T> {
    Ok(serde_json::from_str(text)?)
}

fn parse_time(field: &'static str, text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::invalid(field, text))
}

/// Insert a new row, or overwrite the existing one when `insert` is false.
/// Returns the number of affected rows.
pub(crate) fn write_project(tx: &Transaction<'_>, project: &Project, insert: bool) -> StoreResult<usize> {
    let sql = if insert { INSERT_PROJECT } else { UPDATE_PROJECT };

    let tech_stack = to_json_opt(&project.tech_stack)?;
    let structure = to_json_opt(&project.structure)?;
    let generated_files = to_json(&project.generated_files)?;
    let pending_actions = to_json(&project.pending_actions)?;
    let notifications = to_json(&project.notifications)?;
    let active_agents = to_json(&project.config.agents)?;
    let config = to_json(&project.config)?;

    let affected = tx.execute(
        sql,
        named_params! {
            ":project_id": project.project_id,
            ":user_id": project.user_id,
            ":name": project.name,
            ":description": project.description,
            ":project_type": project.project_type.map(|t| t.as_str()),
            ":tech_stack": tech_stack,
            ":status": project.status.as_str(),
            ":phase": project.phase.as_str(),
            ":progress": project.progress,
            ":current_step": project.current_step,
            ":requires_approval": project.requires_approval,
            ":generated_files": generated_files,
            ":pending_actions": pending_actions,
            ":notifications": notifications,
            ":plan": project.plan,
            ":structure": structure,
            ":total_files": project.total_files,
            ":current_agent": project.current_agent.as_str(),
            ":active_agents": active_agents,
            ":development_speed": project.config.development_speed.as_str(),
            ":model": project.config.model.as_str(),
            ":error_count": project.error_count,
            ":config": config,
            ":created_at": project.created_at.to_rfc3339(),
            ":updated_at": project.updated_at.to_rfc3339(),
        },
    )?;
    Ok(affected)
}

/// Column values exactly as stored, before parsing.
struct ProjectRow {
    project_id: String,
    user_id: String,
    name: String,
    description: String,
    project_type: Option<String>,
    tech_stack: Option<String>,
    status: String,
    phase: String,
    progress: i64,
    current_step: Option<String>,
    requires_approval: bool,
    generated_files: String,
    pending_actions: String,
    notifications: String,
    plan: Option<String>,
    structure: Option<String>,
    total_files: u32,
    current_agent: String,
    error_count: u32,
    config: String,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            project_id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            project_type: row.get(4)?,
            tech_stack: row.get(5)?,
            status: row.get(6)?,
            phase: row.get(7)?,
            progress: row.get(8)?,
            current_step: row.get(9)?,
            requires_approval: row.get(10)?,
            generated_files: row.get(11)?,
            pending_actions: row.get(12)?,
            notifications: row.get(13)?,
            plan: row.get(14)?,
            structure: row.get(15)?,
            total_files: row.get(16)?,
            current_agent: row.get(17)?,
            error_count: row.get(18)?,
            config: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }

    fn into_project(self) -> StoreResult<Project> {
        let project_type = match self.project_type {
            Some(raw) => Some(
                ProjectType::parse(&raw).ok_or_else(|| StoreError::invalid("project_type", raw))?,
            ),
            None => None,
        };

        Ok(Project {
            project_id: self.project_id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            project_type,
            tech_stack: self.tech_stack.as_deref().map(from_json).transpose()?,
            status: self.status.parse()?,
            phase: self.phase.parse()?,
            progress: self.progress.clamp(0, 100) as u8,
            current_step: self.current_step,
            requires_approval: self.requires_approval,
            generated_files: from_json(&self.generated_files)?,
            pending_actions: from_json(&self.pending_actions)?,
            notifications: from_json(&self.notifications)?,
            plan: self.plan,
            structure: self.structure.as_deref().map(from_json).transpose()?,
            total_files: self.total_files,
            current_agent: self.current_agent.parse()?,
            error_count: self.error_count,
            config: from_json(&self.config)?,
            created_at: parse_time("created_at", &self.created_at)?,
            updated_at: parse_time("updated_at", &self.updated_at)?,
        })
    }
}

pub(crate) fn read_project(tx: &Transaction<'_>, project_id: &str) -> StoreResult<Option<Project>> {
    let sql = format!("SELECT {} FROM projects WHERE project_id = ?1", PROJECT_COLUMNS);
    let row = tx
        .query_row(&sql, [project_id], ProjectRow::from_row)
        .optional()?;
    row.map(ProjectRow::into_project).transpose()
}

pub(crate) fn read_projects_for_user(tx: &Transaction<'_>, user_id: &str) -> StoreResult<Vec<Project>> {
    let sql = format!(
        "SELECT {} FROM projects WHERE user_id = ?1 ORDER BY updated_at DESC",
        PROJECT_COLUMNS
    );
    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], ProjectRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(ProjectRow::into_project).collect()
}

pub(crate) fn write_session(tx: &Transaction<'_>, session: &ProjectSession) -> StoreResult<()> {
    let message_history = to_json(&session.message_history)?;
    let special_actions = to_json(&session.special_actions)?;

    tx.execute(
        "INSERT INTO project_sessions
            (project_id, user_id, ai_model, message_history, special_actions, last_active)
         VALUES (:project_id, :user_id, :ai_model, :message_history, :special_actions, :last_active)
         ON CONFLICT(project_id) DO UPDATE SET
            user_id = excluded.user_id,
            ai_model = excluded.ai_model,
            message_history = excluded.message_history,
            special_actions = excluded.special_actions,
            last_active = excluded.last_active",
        named_params! {
            ":project_id": session.project_id,
            ":user_id": session.user_id,
            ":ai_model": session.ai_model.as_str(),
            ":message_history": message_history,
            ":special_actions": special_actions,
            ":last_active": session.last_active.to_rfc3339(),
        },
    )?;
    Ok(())
}

pub(crate) fn read_session(tx: &Transaction<'_>, project_id: &str) -> StoreResult<Option<ProjectSession>> {
    let row = tx
        .query_row(
            "SELECT project_id, user_id, ai_model, message_history, special_actions, last_active
             FROM project_sessions WHERE project_id = ?1",
            [project_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((project_id, user_id, ai_model, history, actions, last_active)) = row else {
        return Ok(None);
    };

    Ok(Some(ProjectSession {
        project_id,
        user_id,
        ai_model: crate::models::ModelProvider::parse_lossy(&ai_model),
        message_history: from_json(&history)?,
        special_actions: from_json(&actions)?,
        last_active: parse_time("last_active", &last_active)?,
    }))
}
