//! Command execution inside a project's workspace.
//!
//! Plain commands run with a timeout and their output is summarised in the
//! transcript. Installer and scaffold commands, and the builder's own verbs,
//! are dispatched on [`CommandKind`]: filesystem verbs act directly, the rest
//! expand to a shell line that runs with streamed output. A failed command
//! goes to the [`RecoveryEngine`]; if it reports a fix the command runs once
//! more.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use storm_planner::{file_purpose_description, file_type_description};
use storm_runner::{CommandKind, CommandRunner, ExecutionResult, LogHandler, LogLine};
use storm_store::Severity;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::BuildContext;
use crate::error::CoreResult;
use crate::recovery::RecoveryEngine;

/// Output lines containing one of these are always reported.
pub const PROGRESS_KEYWORDS: &[&str] = &["installing", "created", "success", "done", "finished"];

/// Every n-th line of a stream is reported.
pub const PROGRESS_EVERY: usize = 5;

const SIMPLE_OUTPUT_LIMIT: usize = 500;
const STREAMED_OUTPUT_LIMIT: usize = 300;

// Commands whose success is worth a notification.
const NOTABLE_COMMAND_WORDS: &[&str] = &["install", "build", "start", "init", "create"];

const SOURCE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".jsx", ".html", ".vue", ".php", ".css", ".ts", ".tsx", ".json",
];

/// Whether a streamed line is reported as progress.
pub fn is_progress_line(line: &LogLine) -> bool {
    if line.index % PROGRESS_EVERY == 0 {
        return true;
    }
    let lower = line.message.to_lowercase();
    PROGRESS_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let cut: String = text.chars().take(limit).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn first_word(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

/// Runs commands for one build.
pub struct CommandExecutor {
    runner: Arc<dyn CommandRunner>,
    recovery: Arc<RecoveryEngine>,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, recovery: Arc<RecoveryEngine>, timeout: Duration) -> Self {
        Self {
            runner,
            recovery,
            timeout,
        }
    }

    pub fn recovery(&self) -> &RecoveryEngine {
        &self.recovery
    }

    /// Execute `command` in the build's workspace. Returns whether it
    /// succeeded; command failures are reported in the transcript, not as
    /// errors.
    pub async fn execute(&self, ctx: &BuildContext, command: &str) -> CoreResult<bool> {
        let command = command.trim();
        let kind = CommandKind::classify(command);
        debug!(project_id = %ctx.project_id, command, ?kind, "Classified command");

        if !kind.is_complex() {
            return self.run_simple(ctx, command).await;
        }

        match &kind {
            CommandKind::CreateFile { path, content } => self.create_file(ctx, path, content).await,
            CommandKind::CreateFolder { paths } => {
                let mut all_ok = true;
                for path in paths {
                    all_ok &= self.create_folder(ctx, path).await?;
                }
                Ok(all_ok)
            }
            CommandKind::Touch { paths } => {
                let mut all_ok = true;
                for path in paths {
                    all_ok &= self.create_file(ctx, path, "").await?;
                }
                Ok(all_ok)
            }
            CommandKind::Invalid { reason } => {
                ctx.assistant(format!("❌ Error: {}", reason)).await?;
                Ok(false)
            }
            _ => {
                let intro = match &kind {
                    CommandKind::InstallPackages { manager, packages } => {
                        format!("📦 Installing packages with {}: {}", manager, packages.join(", "))
                    }
                    CommandKind::InitProject { template, name, .. } => {
                        format!("🚀 Initializing {} project: {}", template, name)
                    }
                    CommandKind::SetupEnvironment { environment, .. } => {
                        format!("⚙️ Setting up {} environment", environment)
                    }
                    CommandKind::CloneRepo { url, target } => {
                        format!("📂 Cloning repository: {} into {}", url, target)
                    }
                    _ => format!("⚠️ Processing complex command: `{}`", command),
                };
                ctx.assistant(intro).await?;

                match kind.shell_command(command) {
                    Some(line) => self.run_streamed(ctx, &line).await,
                    None => Ok(false),
                }
            }
        }
    }

    async fn run_simple(&self, ctx: &BuildContext, command: &str) -> CoreResult<bool> {
        ctx.assistant(format!("⚙️ Running: `{}`", command)).await?;

        let mut may_retry = true;
        loop {
            ctx.checkpoint().await;
            let result = match self.runner.run(command, &ctx.workspace, self.timeout).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(project_id = %ctx.project_id, command, error = %e, "Command could not run");
                    ctx.assistant(format!("❌ Error running command: {}", e)).await?;
                    return Ok(false);
                }
            };

            let summary = if result.success() {
                if NOTABLE_COMMAND_WORDS.iter().any(|w| command.contains(w)) {
                    ctx.notify(
                        &format!("Command completed: {}", first_word(command)),
                        "The command ran successfully.",
                        Severity::Success,
                    )
                    .await?;
                }
                format!(
                    "✅ Command executed successfully:\n```\n{}\n```",
                    truncate(&result.stdout, SIMPLE_OUTPUT_LIMIT)
                )
            } else {
                if may_retry && self.recovery.attempt_fix(ctx, &result.stderr, "command").await? {
                    may_retry = false;
                    info!(project_id = %ctx.project_id, command, "Retrying after fix");
                    continue;
                }
                format!(
                    "⚠️ Command exited with code {}:\n```\n{}\n```",
                    result.exit_code,
                    truncate(&result.stderr, SIMPLE_OUTPUT_LIMIT)
                )
            };

            ctx.assistant(summary).await?;
            record_action(ctx, command, &result).await?;
            return Ok(result.success());
        }
    }

    async fn run_streamed(&self, ctx: &BuildContext, command: &str) -> CoreResult<bool> {
        ctx.assistant(format!("⏳ Running: `{}`", command)).await?;

        let mut may_retry = true;
        loop {
            ctx.checkpoint().await;
            let result = match self.stream_once(ctx, command).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(project_id = %ctx.project_id, command, error = %e, "Command could not run");
                    ctx.assistant(format!("❌ Error running command: {}", e)).await?;
                    return Ok(false);
                }
            };

            if result.success() {
                ctx.notify(
                    &format!("Command completed: {}", first_word(command)),
                    "The command ran successfully.",
                    Severity::Success,
                )
                .await?;
                ctx.assistant(format!(
                    "✅ Command executed successfully:\n```\n{}\n```",
                    truncate(&result.stdout, STREAMED_OUTPUT_LIMIT)
                ))
                .await?;
            } else {
                ctx.assistant(format!(
                    "⚠️ Command exited with code {}:\n```\n{}\n```",
                    result.exit_code,
                    truncate(&result.stderr, STREAMED_OUTPUT_LIMIT)
                ))
                .await?;
                if may_retry && self.recovery.attempt_fix(ctx, &result.stderr, "command").await? {
                    may_retry = false;
                    info!(project_id = %ctx.project_id, command, "Retrying after fix");
                    continue;
                }
            }

            record_action(ctx, command, &result).await?;
            return Ok(result.success());
        }
    }

    /// Run once with streamed output, turning progress lines into
    /// notifications as they arrive.
    async fn stream_once(&self, ctx: &BuildContext, command: &str) -> CoreResult<ExecutionResult> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handler: LogHandler = Arc::new(move |line: LogLine| {
            if is_progress_line(&line) {
                let _ = tx.send(line.message.trim().to_string());
            }
        });

        let forwarder = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                while let Some(line) = rx.recv().await {
                    if let Err(e) = ctx.notify("Command progress", &line, Severity::Progress).await {
                        warn!(project_id = %ctx.project_id, error = %e, "Failed to record progress line");
                    }
                }
            }
        });

        // The handler (and with it the sender) is dropped when the runner
        // returns, which ends the forwarder loop.
        let result = self.runner.run_streaming(command, &ctx.workspace, handler).await;
        if let Err(e) = forwarder.await {
            warn!(project_id = %ctx.project_id, error = %e, "Progress forwarder panicked");
        }
        Ok(result?)
    }

    /// Write `content` to `path` inside the workspace and record it.
    pub async fn create_file(&self, ctx: &BuildContext, path: &str, content: &str) -> CoreResult<bool> {
        ctx.checkpoint().await;
        let full_path = ctx.workspace.join(path);

        if let Err(e) = self.write_file(ctx, path, &full_path, content).await {
            ctx.assistant(format!("❌ Error creating file {}: {}", path, e)).await?;
            return Ok(false);
        }

        ctx.assistant(format!("✅ File created: `{}`", path)).await?;
        ctx.notify("File created", &format!("Created file {}", path), Severity::Success)
            .await?;

        if SOURCE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            ctx.notify(
                "Build progress",
                &format!(
                    "Implemented a {}: `{}`\n\nThis file {}.",
                    file_type_description(path),
                    path,
                    file_purpose_description(path)
                ),
                Severity::Progress,
            )
            .await?;
        }

        let (path, content) = (path.to_string(), content.to_string());
        ctx.update(move |p| {
            p.add_file(&path, Some(&content));
        })
        .await?;
        Ok(true)
    }

    async fn write_file(&self, ctx: &BuildContext, path: &str, full_path: &Path, content: &str) -> CoreResult<()> {
        if let Some(parent) = full_path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
                let relative = Path::new(path).parent().map(|p| p.display().to_string()).unwrap_or_default();
                ctx.assistant(format!("📁 Created directory: `{}`", relative)).await?;
                if !relative.is_empty() && !relative.starts_with('.') {
                    ctx.notify(
                        "Build progress",
                        &format!("Created directory `{}` to organize the project files", relative),
                        Severity::Progress,
                    )
                    .await?;
                }
            }
        }
        tokio::fs::write(full_path, content).await?;
        Ok(())
    }

    /// Create `path` and any missing parents inside the workspace.
    pub async fn create_folder(&self, ctx: &BuildContext, path: &str) -> CoreResult<bool> {
        ctx.checkpoint().await;
        if let Err(e) = tokio::fs::create_dir_all(ctx.workspace.join(path)).await {
            ctx.assistant(format!("❌ Error creating directory {}: {}", path, e)).await?;
            return Ok(false);
        }
        ctx.assistant(format!("✅ Directory created: `{}`", path)).await?;
        ctx.notify("Directory created", &format!("Created directory {}", path), Severity::Success)
            .await?;
        Ok(true)
    }
}

async fn record_action(ctx: &BuildContext, command: &str, result: &ExecutionResult) -> CoreResult<()> {
    let description = format!("Run: {}", command);
    let details = json!({ "command": command });
    let outcome = json!({
        "stdout": result.stdout,
        "stderr": result.stderr,
        "status": result.exit_code,
    });
    ctx.update(move |p| {
        let id = p.add_pending_action("command", &description, details.clone());
        p.complete_action(&id, Some(outcome.clone()));
    })
    .await?;
    Ok(())
}
