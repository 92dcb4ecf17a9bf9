//! # storm_core
//!
//! Build orchestration for Storm.
//!
//! [`BuildService`] is the entry point: it starts one [`AutonomousBuilder`]
//! task per project and routes pause, resume and chat messages to it through
//! the [`BuildRegistry`]. A build walks the fixed stages
//!
//! ```text
//! analysis (5) -> planning (10) -> implementation (25..75) -> testing (90) -> completed (100)
//! ```
//!
//! writing planned files into its workspace and running dependency installs
//! through the [`CommandExecutor`]. Failed commands go to the
//! [`RecoveryEngine`], which fixes a handful of known errors and stops trying
//! after too many failures. [`Notifier`] records rate-limited notifications
//! and mirrors the important ones into the chat transcript.
//!
//! # Example
//!
//! ```rust,no_run
//! use storm_core::{BuildService, StormConfig};
//! use storm_store::BuildConfig;
//!
//! # async fn example() -> storm_core::CoreResult<()> {
//! let service = BuildService::new(StormConfig::load(None)?);
//! let id = service
//!     .start_build("build a flask app called demo", "default", BuildConfig::default())
//!     .await?;
//! service.wait_for(&id).await;
//! println!("{:?}", service.get_project(&id).await?.project.status);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod executor;
pub mod gate;
pub mod notifier;
pub mod recovery;
pub mod registry;
pub mod service;

pub use builder::{file_progress, install_command, AutonomousBuilder, BuildEvent};
pub use config::{ContentMode, StormConfig, CONFIG_FILE};
pub use content::GeneratedContent;
pub use context::BuildContext;
pub use error::{CoreError, CoreResult};
pub use executor::{is_progress_line, CommandExecutor, PROGRESS_EVERY, PROGRESS_KEYWORDS};
pub use gate::PauseGate;
pub use notifier::Notifier;
pub use recovery::{ErrorRecord, ErrorSignature, RecoveryEngine};
pub use registry::BuildRegistry;
pub use service::{BuildService, MessageIntent, MessageReply, ProjectView};
