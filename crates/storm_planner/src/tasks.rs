//! Development task list with time estimates.

use serde::{Deserialize, Serialize};

use crate::classify::{ProjectType, TechStack};

/// One block of planned work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevTask {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Estimated minutes as an inclusive `(min, max)` range.
    pub estimate_minutes: (u32, u32),
    pub subtasks: Vec<String>,
}

impl DevTask {
    fn new(
        id: &str,
        title: &str,
        description: &str,
        estimate_minutes: (u32, u32),
        subtasks: &[&str],
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            estimate_minutes,
            subtasks: subtasks.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Estimate rendered as `"5-10 minutes"`.
    pub fn estimate_label(&self) -> String {
        format!("{}-{} minutes", self.estimate_minutes.0, self.estimate_minutes.1)
    }
}

/// Assemble the task list for a project.
///
/// Setup and dependencies always come first and testing always comes last.
/// UI work is added for web projects, database work when a database was
/// detected, and endpoint work for APIs.
pub fn generate_tasks(project_type: ProjectType, stack: &TechStack) -> Vec<DevTask> {
    let mut tasks = vec![
        DevTask::new(
            "setup",
            "Environment setup",
            "Prepare the development environment and base layout",
            (5, 10),
            &[
                "Create the directory structure",
                "Configure base files",
                "Initialize the project",
            ],
        ),
        DevTask::new(
            "dependencies",
            "Dependency installation",
            "Install and configure the required libraries",
            (5, 15),
            &[
                "Install core dependencies",
                "Configure the package manager",
                "Validate the installation",
            ],
        ),
    ];

    if project_type == ProjectType::Web {
        tasks.push(DevTask::new(
            "ui_components",
            "UI components",
            "Build reusable visual components",
            (10, 20),
            &[
                "Design base components",
                "Implement navigation",
                "Create styles and themes",
            ],
        ));
    }

    if stack.database.is_some() {
        tasks.push(DevTask::new(
            "database",
            "Database setup",
            "Implement models and the database connection",
            (10, 15),
            &[
                "Define models and schemas",
                "Configure the connection",
                "Implement CRUD operations",
            ],
        ));
    }

    if project_type == ProjectType::Api {
        tasks.push(DevTask::new(
            "endpoints",
            "Endpoint implementation",
            "Create routes and controllers for the API",
            (15, 25),
            &[
                "Define the route layout",
                "Implement controllers",
                "Add validation and error handling",
            ],
        ));
    }

    tasks.push(DevTask::new(
        "testing",
        "Testing and validation",
        "Verify that the application works correctly",
        (5, 10),
        &[
            "Test basic functionality",
            "Validate component integration",
            "Check the requirements are met",
        ],
    ));

    tasks
}

/// Sum of all task estimates as a `(min, max)` pair.
pub fn total_estimate(tasks: &[DevTask]) -> (u32, u32) {
    tasks.iter().fold((0, 0), |(lo, hi), task| {
        (lo + task.estimate_minutes.0, hi + task.estimate_minutes.1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Database, Framework, Language};

    fn ids(tasks: &[DevTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_web_tasks() {
        let tasks = generate_tasks(ProjectType::Web, &TechStack::default());
        assert_eq!(ids(&tasks), ["setup", "dependencies", "ui_components", "testing"]);
        assert_eq!(total_estimate(&tasks), (25, 55));
    }

    #[test]
    fn test_api_with_database() {
        let stack = TechStack::new(Language::Python, Framework::Flask).with_database(Database::Sqlite);
        let tasks = generate_tasks(ProjectType::Api, &stack);
        assert_eq!(ids(&tasks), ["setup", "dependencies", "database", "endpoints", "testing"]);
        assert_eq!(total_estimate(&tasks), (40, 75));
    }

    #[test]
    fn test_mobile_gets_only_common_blocks() {
        let tasks = generate_tasks(ProjectType::Mobile, &TechStack::default());
        assert_eq!(ids(&tasks), ["setup", "dependencies", "testing"]);
        assert_eq!(tasks[0].estimate_label(), "5-10 minutes");
    }
}
