//! # storm_store
//!
//! Persistence for build records.
//!
//! A [`Project`] is one build job; a [`ProjectSession`] is its conversation
//! and event log. Both live in SQLite and are reached through a
//! [`SessionGateway`], which opens a new connection for every operation and
//! retries failed operations with exponential backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use storm_store::{BuildConfig, Project, ProjectRepository, SessionGateway, StoreConfig};
//!
//! # async fn example() -> storm_store::StoreResult<()> {
//! let repo = ProjectRepository::new(SessionGateway::new(StoreConfig::new("storm.db")));
//! let project = Project::new("p-1", "default", "demo", "a demo", BuildConfig::default());
//! repo.insert_project(project).await?;
//! assert!(repo.get_project("p-1").await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod models;
pub mod repository;
mod schema;

pub use error::{StoreError, StoreResult};
pub use gateway::{SessionGateway, StoreConfig};
pub use models::{
    ActionStatus, AgentRole, AgentToggles, BuildConfig, DevelopmentSpeed, GeneratedFile,
    MessageRole, ModelProvider, Notification, PendingAction, Phase, Project, ProjectSession,
    ProjectStatus, SessionMessage, Severity, SpecialAction,
};
pub use repository::ProjectRepository;
