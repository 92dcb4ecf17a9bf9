//! End-to-end builds against a mock command runner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use storm_core::{BuildEvent, BuildService, CoreError, StormConfig};
use storm_planner::{
    synthesize_file_content, ContentSource, Framework, Language, ProjectType, TechStack,
};
use storm_runner::{MockResponse, MockRunner};
use storm_store::{BuildConfig, MessageRole, Phase, ProjectStatus, SpecialAction};
use tempfile::TempDir;
use tokio::sync::Notify;

fn service(dir: &TempDir, runner: &MockRunner) -> BuildService {
    BuildService::with_runner(StormConfig::for_root(dir.path()), Arc::new(runner.clone()))
}

fn approval_config() -> BuildConfig {
    BuildConfig {
        require_approval: true,
        ..Default::default()
    }
}

/// Template content that takes a while and signals each time it starts.
struct SlowContent {
    started: Arc<Notify>,
    delay: Duration,
}

#[async_trait]
impl ContentSource for SlowContent {
    async fn file_content(&self, path: &str, project_type: ProjectType, stack: &TechStack) -> String {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        synthesize_file_content(path, project_type, stack)
    }
}

async fn wait_for_status(service: &BuildService, id: &str, status: ProjectStatus) {
    for _ in 0..500 {
        let view = service.get_project(id).await.unwrap();
        if view.project.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("project {} never reached {:?}", id, status);
}

#[tokio::test]
async fn test_flask_build_completes() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let service = service(&dir, &runner);

    let id = service
        .start_build("build a flask app called demo", "tester", BuildConfig::default())
        .await
        .unwrap();
    service.wait_for(&id).await;

    let view = service.get_project(&id).await.unwrap();
    let project = &view.project;
    assert_eq!(project.status, ProjectStatus::Completed);
    assert_eq!(project.phase, Phase::Completed);
    assert_eq!(project.progress, 100);
    assert_eq!(project.name, "demo");
    assert_eq!(
        project.tech_stack,
        Some(TechStack {
            language: Language::Python,
            framework: Framework::Flask,
            database: None,
        })
    );

    let recorded: Vec<&str> = project.generated_files.iter().map(|f| f.path.as_str()).collect();
    for path in ["app.py", "requirements.txt", "templates/index.html"] {
        assert!(recorded.contains(&path), "missing {}", path);
        assert!(view.workspace_files.iter().any(|f| f == path));
    }
    assert_eq!(project.total_files as usize, recorded.len());

    assert_eq!(runner.commands(), vec!["pip install -r requirements.txt"]);
    assert!(!service.registry().is_active(&id));

    assert!(view
        .messages
        .iter()
        .any(|m| m.role == MessageRole::User && m.content == "build a flask app called demo"));
    assert!(view
        .messages
        .iter()
        .any(|m| m.content.starts_with("🎉 **Project completed!**")));
}

#[tokio::test]
async fn test_progress_and_phases_move_forward() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let service = service(&dir, &runner);
    let mut events = service.subscribe();

    let id = service
        .start_build("build a react todo app", "tester", BuildConfig::default())
        .await
        .unwrap();
    service.wait_for(&id).await;

    let mut seen: Vec<BuildEvent> = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.project_id == id {
            seen.push(event);
        }
    }

    let progress: Vec<u8> = seen.iter().map(|e| e.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    for expected in [5, 10, 25, 75, 90, 100] {
        assert!(progress.contains(&expected), "missing {} in {:?}", expected, progress);
    }

    let mut phases: Vec<Phase> = seen.iter().map(|e| e.phase).collect();
    phases.dedup();
    assert_eq!(
        phases,
        vec![
            Phase::Analysis,
            Phase::Planning,
            Phase::Implementation,
            Phase::Testing,
            Phase::Completed,
        ]
    );
    assert_eq!(seen.last().unwrap().status, ProjectStatus::Completed);
    assert_eq!(runner.commands(), vec!["npm install"]);
}

#[tokio::test]
async fn test_build_waits_for_approval() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let service = service(&dir, &runner);

    let id = service
        .start_build("build a flask app called gated", "tester", approval_config())
        .await
        .unwrap();
    wait_for_status(&service, &id, ProjectStatus::PendingApproval).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.phase, Phase::Planning);
    assert_eq!(view.project.progress, 10);
    assert!(view.workspace_files.is_empty());
    assert!(view.project.plan.is_some());

    let reply = service.send_message(&id, "Looks great, start!").await.unwrap();
    assert_eq!(
        reply.response,
        "Perfect! Starting the project build according to the approved plan."
    );
    assert!(reply
        .special_actions
        .iter()
        .any(|a| matches!(a, SpecialAction::ShowDevelopmentPlan { .. })));

    service.wait_for(&id).await;
    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::Completed);
    assert!(view.workspace_files.iter().any(|f| f == "app.py"));
}

#[tokio::test]
async fn test_pause_blocks_side_effects_until_resume() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let service = service(&dir, &runner);

    let id = service
        .start_build("build a flask app called paused", "tester", approval_config())
        .await
        .unwrap();
    wait_for_status(&service, &id, ProjectStatus::PendingApproval).await;

    service.pause(&id).await.unwrap();
    assert!(service.registry().approve(&id));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::Paused);
    assert!(view.workspace_files.is_empty());
    assert!(view.project.generated_files.is_empty());
    assert_eq!(runner.call_count(), 0);

    service.resume(&id).await.unwrap();
    service.wait_for(&id).await;

    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::Completed);
    assert_eq!(view.project.generated_files.len(), 13);
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_pause_during_generation_holds_the_write() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let started = Arc::new(Notify::new());
    let service = service(&dir, &runner).with_content(Arc::new(SlowContent {
        started: Arc::clone(&started),
        delay: Duration::from_millis(100),
    }));

    let id = service
        .start_build("build a flask app called slow", "tester", BuildConfig::default())
        .await
        .unwrap();
    started.notified().await;
    service.pause(&id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::Paused);
    assert_eq!(view.project.phase, Phase::Implementation);
    assert!(view.workspace_files.is_empty());
    assert!(view.project.generated_files.is_empty());
    assert_eq!(runner.call_count(), 0);

    service.resume(&id).await.unwrap();
    service.wait_for(&id).await;

    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::Completed);
    assert_eq!(view.project.generated_files.len(), 13);
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_resume_while_awaiting_approval_still_accepts_approval() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let service = service(&dir, &runner);

    let id = service
        .start_build("build a flask app called held", "tester", approval_config())
        .await
        .unwrap();
    wait_for_status(&service, &id, ProjectStatus::PendingApproval).await;

    service.pause(&id).await.unwrap();
    service.resume(&id).await.unwrap();
    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::PendingApproval);

    let reply = service.send_message(&id, "start").await.unwrap();
    assert_eq!(
        reply.response,
        "Perfect! Starting the project build according to the approved plan."
    );

    tokio::time::timeout(Duration::from_secs(10), service.wait_for(&id))
        .await
        .expect("build should finish once approved");
    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::Completed);
}

#[tokio::test]
async fn test_failed_install_is_fixed_and_retried_once() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new()
        .respond_to(
            "npm install",
            MockResponse::failure(1, "ModuleNotFoundError: No module named 'node_gyp'"),
        )
        .respond_to("pip install", MockResponse::success(""));
    let service = service(&dir, &runner);

    let id = service
        .start_build("build a react dashboard", "tester", BuildConfig::default())
        .await
        .unwrap();
    service.wait_for(&id).await;

    assert_eq!(
        runner.commands(),
        vec!["npm install", "pip install node_gyp", "npm install"]
    );

    let project = service.get_project(&id).await.unwrap().project;
    assert_eq!(project.status, ProjectStatus::Completed);
    assert_eq!(project.error_count, 1);
}

#[tokio::test]
async fn test_build_error_marks_project() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let service = service(&dir, &runner);

    let id = service
        .start_build("build a flask app called broken", "tester", approval_config())
        .await
        .unwrap();
    wait_for_status(&service, &id, ProjectStatus::PendingApproval).await;

    // A plain file where the templates directory has to go.
    let workspace = service.config().project_workspace("tester", &id);
    std::fs::write(workspace.join("templates"), "").unwrap();

    service.send_message(&id, "approve").await.unwrap();
    service.wait_for(&id).await;

    let view = service.get_project(&id).await.unwrap();
    assert_eq!(view.project.status, ProjectStatus::Error);
    assert!(view.project.current_step.as_deref().unwrap().starts_with("Error:"));
    assert!(view
        .messages
        .iter()
        .any(|m| m.role == MessageRole::Assistant && m.content.starts_with("❌ I'm sorry")));
    assert!(!service.registry().is_active(&id));
}

#[tokio::test]
async fn test_messages_after_completion() {
    let dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let service = service(&dir, &runner);

    let id = service
        .start_build("build a flask app called chatty", "tester", BuildConfig::default())
        .await
        .unwrap();
    service.wait_for(&id).await;

    let files = service.send_message(&id, "show files").await.unwrap();
    assert!(files.response.starts_with("📁 Generated files:"));
    assert!(files.response.contains("- `app.py`"));

    let plan = service.send_message(&id, "show plan").await.unwrap();
    assert!(plan
        .special_actions
        .iter()
        .any(|a| matches!(a, SpecialAction::ShowDevelopmentPlan { .. })));

    // Not waiting for approval, so "start" is just a message.
    let other = service.send_message(&id, "start over?").await.unwrap();
    assert_eq!(
        other.response,
        "Thanks for your message. I'll keep it in mind while building the project."
    );
}

#[tokio::test]
async fn test_controls_require_running_build() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &MockRunner::new());

    assert!(matches!(
        service.pause("nope").await,
        Err(CoreError::BuildNotActive(_))
    ));
    assert!(matches!(
        service.get_project("nope").await,
        Err(CoreError::ProjectNotFound(_))
    ));
    assert!(matches!(
        service.send_message("nope", "hi").await,
        Err(CoreError::ProjectNotFound(_))
    ));
}

#[tokio::test]
async fn test_list_projects_by_user() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &MockRunner::new());

    let a = service
        .start_build("build a flask app called one", "alice", BuildConfig::default())
        .await
        .unwrap();
    let b = service
        .start_build("build a react app called two", "bob", BuildConfig::default())
        .await
        .unwrap();
    service.wait_for(&a).await;
    service.wait_for(&b).await;

    let alice = service.list_projects("alice").await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].project_id, a);
}
