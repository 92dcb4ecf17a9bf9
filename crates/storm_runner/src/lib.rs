//! # storm_runner
//!
//! Shell command execution for Storm builds.
//!
//! - [`ShellRunner`] runs a command through `sh -c` inside the project
//!   directory, either with a timeout or with every output line streamed
//!   to a callback.
//! - [`CommandKind`] tells plain shell lines apart from the installer and
//!   scaffolding shapes that get structured handling.
//! - [`MockRunner`] records calls and returns scripted results for tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use storm_runner::{CommandRunner, ShellRunner};
//!
//! # async fn example() -> storm_runner::RunnerResult<()> {
//! let runner = ShellRunner::new();
//! let result = runner.run("ls", Path::new("."), Duration::from_secs(30)).await?;
//! println!("exit code {}", result.exit_code);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod mock;
pub mod runner;
pub mod shell;

pub use command::{init_command, install_prefix, setup_command, CommandKind};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use runner::{CommandRunner, ExecutionResult, LogHandler, LogLine, LogStream};
pub use shell::ShellRunner;
