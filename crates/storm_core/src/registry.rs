//! Live builds in this process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::gate::PauseGate;

struct ActiveBuild {
    gate: PauseGate,
    approval: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

/// Handles for the builds currently running, keyed by project id.
///
/// An entry exists from the moment a build is started until its task
/// finishes, whatever the outcome.
#[derive(Clone, Default)]
pub struct BuildRegistry {
    builds: Arc<RwLock<HashMap<String, ActiveBuild>>>,
}

impl BuildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a build and return its pause gate and approval signal.
    pub fn register(&self, project_id: &str) -> (PauseGate, Arc<Notify>) {
        let gate = PauseGate::new();
        let approval = Arc::new(Notify::new());
        let previous = self.builds.write().insert(
            project_id.to_string(),
            ActiveBuild {
                gate: gate.clone(),
                approval: Arc::clone(&approval),
                task: None,
            },
        );
        if previous.is_some() {
            warn!(project_id, "Replaced an existing build registration");
        }
        debug!(project_id, "Build registered");
        (gate, approval)
    }

    /// Keep the task handle so callers can await completion. A build that
    /// already finished has no entry and the handle is dropped.
    pub fn attach_task(&self, project_id: &str, task: JoinHandle<()>) {
        if let Some(build) = self.builds.write().get_mut(project_id) {
            build.task = Some(task);
        }
    }

    pub fn unregister(&self, project_id: &str) {
        if self.builds.write().remove(project_id).is_some() {
            debug!(project_id, "Build unregistered");
        }
    }

    /// Close the build's gate. Returns `false` if no build is running.
    pub fn pause(&self, project_id: &str) -> bool {
        match self.builds.read().get(project_id) {
            Some(build) => {
                build.gate.pause();
                true
            }
            None => false,
        }
    }

    pub fn resume(&self, project_id: &str) -> bool {
        match self.builds.read().get(project_id) {
            Some(build) => {
                build.gate.resume();
                true
            }
            None => false,
        }
    }

    /// Release a build waiting for plan approval. A permit is stored if the
    /// build has not reached the wait yet.
    pub fn approve(&self, project_id: &str) -> bool {
        match self.builds.read().get(project_id) {
            Some(build) => {
                build.approval.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, project_id: &str) -> bool {
        self.builds.read().contains_key(project_id)
    }

    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.builds.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.builds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.read().is_empty()
    }

    /// Wait for the build's task to finish. Returns immediately when the
    /// build is not running or its task was already claimed.
    pub async fn wait_for(&self, project_id: &str) {
        let task = self
            .builds
            .write()
            .get_mut(project_id)
            .and_then(|build| build.task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(project_id, error = %e, "Build task did not finish cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_and_control() {
        let registry = BuildRegistry::new();
        assert!(!registry.pause("p"));

        let (gate, _approval) = registry.register("p");
        assert!(registry.is_active("p"));
        assert!(registry.pause("p"));
        assert!(gate.is_paused());
        assert!(registry.resume("p"));
        assert!(!gate.is_paused());

        registry.unregister("p");
        assert!(registry.is_empty());
        assert!(!registry.resume("p"));
    }

    #[tokio::test]
    async fn test_approve_before_wait_is_kept() {
        let registry = BuildRegistry::new();
        let (_gate, approval) = registry.register("p");

        assert!(registry.approve("p"));
        tokio::time::timeout(Duration::from_secs(1), approval.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_task() {
        let registry = BuildRegistry::new();
        registry.register("p");
        let task = tokio::spawn({
            let registry = registry.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                registry.unregister("p");
            }
        });
        registry.attach_task("p", task);

        tokio::time::timeout(Duration::from_secs(1), registry.wait_for("p"))
            .await
            .unwrap();
        assert!(!registry.is_active("p"));
        assert_eq!(registry.active_ids(), Vec::<String>::new());
    }
}
