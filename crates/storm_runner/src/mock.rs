//! Mock command runner for testing.
//!
//! Records every call and answers from scripted responses, so the builder
//! and executor can be tested without spawning processes.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult, LogHandler, LogLine, LogStream};

/// Predefined mock response for a command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 10,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 10,
        }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    fn into_result(self, command: &str) -> ExecutionResult {
        let finished_at = Utc::now();
        ExecutionResult {
            command: command.to_string(),
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
            started_at: finished_at - chrono::Duration::milliseconds(self.duration_ms as i64),
            finished_at,
            duration_ms: self.duration_ms,
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    /// `run` or `run_streaming`
    pub method: String,
    pub command: String,
    pub workdir: String,
    pub timeout: Option<Duration>,
}

/// Mock command runner for testing.
///
/// Responses registered with [`MockRunner::respond_to`] win when the command
/// starts with their prefix. Otherwise the sequential responses are used in
/// order, wrapping around; with none configured every command succeeds with
/// empty output.
#[derive(Clone)]
pub struct MockRunner {
    responses: Arc<RwLock<Vec<MockResponse>>>,
    response_index: Arc<AtomicUsize>,
    prefixed: Arc<RwLock<Vec<(String, MockResponse)>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            prefixed: Arc::new(RwLock::new(Vec::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Add a mock response to the sequential list.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Replace the sequential list.
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.write() = responses;
        self
    }

    /// Answer commands starting with `prefix` with `response`.
    pub fn respond_to(self, prefix: impl Into<String>, response: MockResponse) -> Self {
        self.prefixed.write().push((prefix.into(), response));
        self
    }

    /// Fail every call with [`RunnerError::ExecutionFailed`].
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Command lines in call order.
    pub fn commands(&self) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn record_call(&self, method: &str, command: &str, workdir: &Path, timeout: Option<Duration>) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            command: command.to_string(),
            workdir: workdir.display().to_string(),
            timeout,
        });
    }

    fn next_response(&self, command: &str) -> MockResponse {
        if let Some((_, response)) = self
            .prefixed
            .read()
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
        {
            return response.clone();
        }

        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success("");
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index % responses.len())
            .cloned()
            .unwrap_or_else(|| MockResponse::success(""))
    }

    fn check_failure(&self) -> RunnerResult<()> {
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(RunnerError::ExecutionFailed(msg));
        }
        Ok(())
    }
}

fn emit_lines(text: &str, stream: LogStream, handler: &LogHandler) {
    for (i, line) in text.lines().enumerate() {
        handler(LogLine {
            timestamp: Utc::now(),
            stream,
            index: i + 1,
            message: line.to_string(),
        });
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &str, workdir: &Path, timeout: Duration) -> RunnerResult<ExecutionResult> {
        self.record_call("run", command, workdir, Some(timeout));
        self.check_failure()?;
        Ok(self.next_response(command).into_result(command))
    }

    async fn run_streaming(
        &self,
        command: &str,
        workdir: &Path,
        handler: LogHandler,
    ) -> RunnerResult<ExecutionResult> {
        self.record_call("run_streaming", command, workdir, None);
        self.check_failure()?;

        let response = self.next_response(command);
        emit_lines(&response.stdout, LogStream::Stdout, &handler);
        emit_lines(&response.stderr, LogStream::Stderr, &handler);
        Ok(response.into_result(command))
    }
}
