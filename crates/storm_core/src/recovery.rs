//! Automatic recovery from failed commands.
//!
//! stderr is matched against a closed set of error signatures; the first one
//! that matches picks the fix. Only two fixes do real work (installing a
//! missing module and creating a missing file); the rest report that the
//! error needs manual attention.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use storm_runner::CommandRunner;
use storm_store::{AgentRole, Severity};
use tracing::{info, warn};

use crate::context::BuildContext;
use crate::error::CoreResult;

/// A recognised error in command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSignature {
    MissingModule { module: String },
    Syntax,
    NotCallable { type_name: String },
    UndefinedName { name: String },
    ImportName { name: String, module: String },
    FileNotFound { path: String },
}

// Checked in order; the first match wins.
const SIGNATURES: &[(&str, SignatureKind)] = &[
    (r"ModuleNotFoundError: No module named '([^']+)'", SignatureKind::MissingModule),
    (r"SyntaxError: invalid syntax", SignatureKind::Syntax),
    (r"TypeError: '([^']+)' object is not callable", SignatureKind::NotCallable),
    (r"NameError: name '([^']+)' is not defined", SignatureKind::UndefinedName),
    (r"ImportError: cannot import name '([^']+)' from '([^']+)'", SignatureKind::ImportName),
    (
        r"FileNotFoundError: \[Errno 2\] No such file or directory: '([^']+)'",
        SignatureKind::FileNotFound,
    ),
];

#[derive(Debug, Clone, Copy)]
enum SignatureKind {
    MissingModule,
    Syntax,
    NotCallable,
    UndefinedName,
    ImportName,
    FileNotFound,
}

impl ErrorSignature {
    /// Find the first known signature in `text`.
    pub fn detect(text: &str) -> Option<Self> {
        for (pattern, kind) in SIGNATURES {
            let Ok(re) = Regex::new(pattern) else { continue };
            let Some(caps) = re.captures(text) else { continue };
            let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();

            return Some(match kind {
                SignatureKind::MissingModule => Self::MissingModule { module: group(1) },
                SignatureKind::Syntax => Self::Syntax,
                SignatureKind::NotCallable => Self::NotCallable { type_name: group(1) },
                SignatureKind::UndefinedName => Self::UndefinedName { name: group(1) },
                SignatureKind::ImportName => Self::ImportName {
                    name: group(1),
                    module: group(2),
                },
                SignatureKind::FileNotFound => Self::FileNotFound { path: group(1) },
            });
        }
        None
    }
}

/// One failure seen by the engine.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub file: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-build recovery with a circuit breaker.
pub struct RecoveryEngine {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    max_attempts: u32,
    error_count: AtomicU32,
    error_log: Mutex<Vec<ErrorRecord>>,
}

impl RecoveryEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            runner,
            timeout,
            max_attempts,
            error_count: AtomicU32::new(0),
            error_log: Mutex::new(Vec::new()),
        }
    }

    /// Calls to [`RecoveryEngine::attempt_fix`] so far.
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }

    pub fn error_log(&self) -> Vec<ErrorRecord> {
        self.error_log.lock().clone()
    }

    /// Try to fix the error described by `stderr`. Returns `true` when a fix
    /// was applied and the failed command is worth running again.
    ///
    /// Every call counts towards the breaker; once more than `max_attempts`
    /// calls have been made no matching is attempted.
    pub async fn attempt_fix(&self, ctx: &BuildContext, stderr: &str, file_path: &str) -> CoreResult<bool> {
        if ctx.agents.is_enabled(AgentRole::Fixing) {
            ctx.switch_agent(AgentRole::Fixing).await?;
        }

        let count = self.error_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.error_log.lock().push(ErrorRecord {
            file: file_path.to_string(),
            error: stderr.to_string(),
            timestamp: Utc::now(),
        });
        ctx.update(move |p| p.error_count = count).await?;

        if count > self.max_attempts {
            warn!(project_id = %ctx.project_id, count, "Too many errors, not attempting a fix");
            ctx.notify(
                "Too many errors detected",
                "Several errors could not be resolved automatically. \
                 Please review the code and the error messages to fix them.",
                Severity::Error,
            )
            .await?;
            return Ok(false);
        }

        ctx.notify(
            "Error detected",
            &format!("An error was detected in '{}'. Trying to fix it automatically...", file_path),
            Severity::Warning,
        )
        .await?;

        let fixed = match ErrorSignature::detect(stderr) {
            Some(signature) => {
                info!(project_id = %ctx.project_id, ?signature, "Matched error signature");
                self.apply(ctx, &signature, file_path).await?
            }
            None => false,
        };

        if fixed {
            ctx.notify(
                "Error fixed automatically",
                &format!("An error in '{}' was fixed.", file_path),
                Severity::Success,
            )
            .await?;
        } else {
            ctx.notify(
                "Error not resolved",
                &format!(
                    "The error in '{}' could not be resolved automatically. \
                     It may need manual intervention.",
                    file_path
                ),
                Severity::Error,
            )
            .await?;
        }
        Ok(fixed)
    }

    async fn apply(&self, ctx: &BuildContext, signature: &ErrorSignature, file_path: &str) -> CoreResult<bool> {
        match signature {
            ErrorSignature::MissingModule { module } => self.install_module(ctx, module).await,
            ErrorSignature::FileNotFound { path } => create_missing_file(ctx, path).await,
            ErrorSignature::Syntax => {
                ctx.assistant(format!("🔧 Trying to fix a syntax error in `{}`...", file_path))
                    .await?;
                Ok(false)
            }
            ErrorSignature::NotCallable { type_name } => {
                ctx.assistant(format!(
                    "🔧 Trying to fix a type error for object '{}' in `{}`...",
                    type_name, file_path
                ))
                .await?;
                Ok(false)
            }
            ErrorSignature::UndefinedName { name } => {
                ctx.assistant(format!(
                    "🔧 Trying to fix the undefined name '{}' in `{}`...",
                    name, file_path
                ))
                .await?;
                Ok(false)
            }
            ErrorSignature::ImportName { name, module } => {
                ctx.assistant(format!(
                    "🔧 Trying to fix the import of '{}' from '{}' in `{}`...",
                    name, module, file_path
                ))
                .await?;
                Ok(false)
            }
        }
    }

    async fn install_module(&self, ctx: &BuildContext, module: &str) -> CoreResult<bool> {
        ctx.assistant(format!("🔧 Installing missing module: `{}`", module))
            .await?;
        ctx.checkpoint().await;

        let command = format!("pip install {}", module);
        match self.runner.run(&command, &ctx.workspace, self.timeout).await {
            Ok(result) => {
                info!(project_id = %ctx.project_id, command, exit_code = result.exit_code, "Recovery command finished");
                Ok(result.success())
            }
            Err(e) => {
                warn!(project_id = %ctx.project_id, command, error = %e, "Recovery command failed to run");
                Ok(false)
            }
        }
    }
}

async fn create_missing_file(ctx: &BuildContext, missing: &str) -> CoreResult<bool> {
    ctx.assistant(format!("🔧 Creating missing file: `{}`", missing))
        .await?;
    ctx.checkpoint().await;

    let relative = missing.trim_start_matches('/');
    let full_path = ctx.workspace.join(relative);
    match write_empty(&full_path).await {
        Ok(()) => Ok(true),
        Err(e) => {
            ctx.assistant(format!("❌ Error creating missing file: {}", e))
                .await?;
            Ok(false)
        }
    }
}

async fn write_empty(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, b"").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use storm_runner::{MockResponse, MockRunner};
    use storm_store::AgentToggles;
    use tempfile::TempDir;

    fn engine(runner: &MockRunner, max_attempts: u32) -> RecoveryEngine {
        RecoveryEngine::new(Arc::new(runner.clone()), Duration::from_secs(5), max_attempts)
    }

    #[test]
    fn test_detect_signatures() {
        assert_eq!(
            ErrorSignature::detect("Traceback...\nModuleNotFoundError: No module named 'flask'"),
            Some(ErrorSignature::MissingModule { module: "flask".into() })
        );
        assert_eq!(
            ErrorSignature::detect("ImportError: cannot import name 'x' from 'y'"),
            Some(ErrorSignature::ImportName { name: "x".into(), module: "y".into() })
        );
        assert_eq!(
            ErrorSignature::detect("FileNotFoundError: [Errno 2] No such file or directory: 'data/a.csv'"),
            Some(ErrorSignature::FileNotFound { path: "data/a.csv".into() })
        );
        assert_eq!(ErrorSignature::detect("segmentation fault"), None);
    }

    #[test]
    fn test_first_signature_wins() {
        let text = "SyntaxError: invalid syntax\nModuleNotFoundError: No module named 'a'";
        assert_eq!(
            ErrorSignature::detect(text),
            Some(ErrorSignature::MissingModule { module: "a".into() })
        );
    }

    #[tokio::test]
    async fn test_missing_module_runs_pip_once() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, AgentToggles::default()).await;
        let runner = MockRunner::new();
        let engine = engine(&runner, 10);

        let fixed = engine
            .attempt_fix(&ctx, "ModuleNotFoundError: No module named 'requests'", "app.py")
            .await
            .unwrap();

        assert!(fixed);
        assert_eq!(runner.commands(), vec!["pip install requests".to_string()]);

        let project = ctx.repo.get_project("p-1").await.unwrap().unwrap();
        assert_eq!(project.current_agent, AgentRole::Fixing);
        assert_eq!(project.error_count, 1);
        assert!(project
            .notifications
            .iter()
            .any(|n| n.title == "Error fixed automatically"));
    }

    #[tokio::test]
    async fn test_missing_module_install_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, AgentToggles::default()).await;
        let runner = MockRunner::new().add_response(MockResponse::failure(1, "no such package"));
        let engine = engine(&runner, 10);

        let fixed = engine
            .attempt_fix(&ctx, "ModuleNotFoundError: No module named 'nope'", "command")
            .await
            .unwrap();
        assert!(!fixed);
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_file_not_found_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, AgentToggles::default()).await;
        let engine = engine(&MockRunner::new(), 10);

        let stderr = "FileNotFoundError: [Errno 2] No such file or directory: 'config/settings.ini'";
        assert!(engine.attempt_fix(&ctx, stderr, "app.py").await.unwrap());

        let created = ctx.workspace.join("config/settings.ini");
        assert!(created.exists());
        assert_eq!(std::fs::read_to_string(created).unwrap(), "");
    }

    #[tokio::test]
    async fn test_stub_handlers_report_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, AgentToggles::default()).await;
        let runner = MockRunner::new();
        let engine = engine(&runner, 10);

        assert!(!engine
            .attempt_fix(&ctx, "NameError: name 'foo' is not defined", "app.py")
            .await
            .unwrap());
        assert_eq!(runner.call_count(), 0);

        let session = ctx.repo.get_session("p-1").await.unwrap().unwrap();
        assert!(session
            .message_history
            .iter()
            .any(|m| m.content.contains("undefined name 'foo'")));
    }

    #[tokio::test]
    async fn test_circuit_breaker_trips_on_eleventh_call() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, AgentToggles::default()).await;
        let runner = MockRunner::new();
        let engine = engine(&runner, 10);
        let stderr = "ModuleNotFoundError: No module named 'requests'";

        for _ in 0..10 {
            assert!(engine.attempt_fix(&ctx, stderr, "command").await.unwrap());
        }
        assert_eq!(runner.call_count(), 10);

        assert!(!engine.attempt_fix(&ctx, stderr, "command").await.unwrap());
        assert_eq!(runner.call_count(), 10);
        assert_eq!(engine.error_count(), 11);
        assert_eq!(engine.error_log().len(), 11);

        let project = ctx.repo.get_project("p-1").await.unwrap().unwrap();
        assert_eq!(
            project.notifications.last().map(|n| n.title.as_str()),
            Some("Too many errors detected")
        );
    }
}
