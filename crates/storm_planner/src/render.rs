//! Markdown rendering for chat messages.

use crate::classify::{Framework, ProjectType, TechStack};
use crate::structure::{count_files, flatten_file_structure, FileTree};
use crate::tasks::{total_estimate, DevTask};

const SOURCE_EXTENSIONS: &[&str] = &[".py", ".js", ".jsx", ".ts", ".tsx", ".html", ".css"];

/// True when any directory component of `path` equals `dir`.
pub(crate) fn in_dir(path: &str, dir: &str) -> bool {
    let mut parts: Vec<&str> = path.split('/').collect();
    parts.pop();
    parts.contains(&dir)
}

/// File name component of a relative path.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Summary of the detected project type and stack.
pub fn analysis_response(project_type: ProjectType, stack: &TechStack) -> String {
    let database = stack
        .database
        .map(|db| db.display_name())
        .unwrap_or("Not specified");

    format!(
        "# Project Requirements Analysis\n\n\
         Based on your description, you want to build a **{}** with the following technologies:\n\n\
         ## Tech Stack\n\
         - **Language:** {}\n\
         - **Framework:** {}\n\
         - **Database:** {}\n\n\
         A detailed development plan follows so you can review it before the automatic build starts.\n",
        project_type.label(),
        stack.language.display_name(),
        stack.framework.display_name(),
        database,
    )
}

/// Libraries suggested for the plan, by project type and framework.
fn suggested_libraries(project_type: ProjectType, framework: Framework) -> Vec<&'static str> {
    let mut libraries = Vec::new();
    match project_type {
        ProjectType::Web => {
            match framework {
                Framework::React => libraries.extend(["react-router-dom", "styled-components"]),
                Framework::Vue => libraries.extend(["vue-router", "vuex"]),
                _ => {}
            }
            libraries.push("axios");
        }
        ProjectType::Api => match framework {
            Framework::Flask => libraries.extend(["flask-sqlalchemy", "flask-cors"]),
            Framework::Express => libraries.extend(["mongoose", "cors", "body-parser"]),
            Framework::Django => libraries.extend(["djangorestframework", "django-cors-headers"]),
            _ => {}
        },
        ProjectType::Mobile => {}
    }
    libraries
}

/// Full development plan: details, main files, libraries and tasks.
pub fn development_plan(
    project_type: ProjectType,
    stack: &TechStack,
    tree: &FileTree,
    tasks: &[DevTask],
) -> String {
    let total_files = count_files(tree);
    let (min_time, max_time) = total_estimate(tasks);
    let flat = flatten_file_structure(tree);

    let mut important: Vec<String> = flat
        .iter()
        .take(10)
        .filter(|f| SOURCE_EXTENSIONS.iter().any(|ext| f.path.ends_with(ext)))
        .map(|f| format!("- `{}`", f.path))
        .collect();
    if flat.len() > 10 {
        important.push(format!("- ... and {} more files", flat.len() - 10));
    }
    let important = if important.is_empty() {
        "- No specific files defined yet".to_string()
    } else {
        important.join("\n")
    };

    let libraries = suggested_libraries(project_type, stack.framework);
    let libraries = if libraries.is_empty() {
        "Not specified".to_string()
    } else {
        libraries.join(", ")
    };

    let task_lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            format!(
                "#### {}. {}\n- {}\n- Estimated time: {}\n- Subtasks: {}",
                i + 1,
                task.title,
                task.description,
                task.estimate_label(),
                task.subtasks.join(", ")
            )
        })
        .collect();

    format!(
        "### Project details\n\
         - **Application type:** {}\n\
         - **Main language:** {}\n\
         - **Framework:** {}\n\
         - **Total files to generate:** {}\n\
         - **Estimated time:** {}-{} minutes\n\n\
         ### Main files\n{}\n\n\
         ### Frameworks and libraries\n\
         - Frameworks: {}\n\
         - Main libraries: {}\n\n\
         ### Development tasks\n{}\n",
        project_type.label(),
        stack.language,
        stack.framework,
        total_files,
        min_time,
        max_time,
        important,
        stack.framework,
        libraries,
        task_lines.join("\n"),
    )
}

/// Shell commands to run the generated project.
pub fn run_instructions(stack: &TechStack) -> &'static str {
    match stack.framework {
        Framework::React | Framework::Vue | Framework::Angular => "npm install\nnpm start",
        Framework::NextJs => "npm install\nnpm run dev",
        Framework::Flask => "pip install -r requirements.txt\npython app.py",
        Framework::Django => {
            "pip install -r requirements.txt\npython manage.py migrate\npython manage.py runserver"
        }
        Framework::Express => "# No specific run instructions for this project type",
    }
}

/// Short description of what kind of file `path` is.
pub fn file_type_description(path: &str) -> &'static str {
    let name = file_name(path);
    match name {
        "package.json" => return "npm package configuration",
        "tsconfig.json" => return "TypeScript configuration",
        "requirements.txt" => return "Python dependency list",
        "README.md" => return "project documentation",
        "Dockerfile" => return "Docker configuration",
        "docker-compose.yml" => return "Docker Compose configuration",
        ".gitignore" => return "Git configuration",
        _ => {}
    }

    let extension = name
        .rfind('.')
        .filter(|&i| i > 0)
        .map(|i| name[i..].to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        ".py" => "Python file",
        ".js" => "JavaScript file",
        ".jsx" => "React component",
        ".tsx" => "React TypeScript component",
        ".ts" => "TypeScript file",
        ".html" => "HTML template",
        ".css" => "CSS stylesheet",
        ".scss" => "SCSS stylesheet",
        ".vue" => "Vue component",
        ".json" => "JSON configuration file",
        ".md" => "Markdown document",
        ".sql" => "SQL script",
        ".env" => "environment variables file",
        _ => "file",
    }
}

/// Short description of what a file at `path` is for.
pub fn file_purpose_description(path: &str) -> &'static str {
    let name = file_name(path);

    if in_dir(path, "components") {
        "contains a reusable UI component"
    } else if in_dir(path, "pages") {
        "implements a main page or view"
    } else if in_dir(path, "models") {
        "defines the data structures and models"
    } else if in_dir(path, "routes") || in_dir(path, "controllers") {
        "handles routing and controller logic"
    } else if in_dir(path, "utils") || in_dir(path, "helpers") {
        "implements helper functions and utilities"
    } else if in_dir(path, "middleware") {
        "provides request-processing middleware"
    } else if in_dir(path, "config") {
        "holds application configuration"
    } else if in_dir(path, "static") || in_dir(path, "public") {
        "provides static assets"
    } else if in_dir(path, "templates") {
        "defines templates used to render views"
    } else if in_dir(path, "tests") {
        "implements automated tests"
    } else if in_dir(path, "src") {
        "is part of the main source code"
    } else if name == "app.py" || name == "main.py" {
        "is the main entry point of the application"
    } else if name.starts_with("index.") {
        "serves as the entry point of a module or view"
    } else if name.to_lowercase().contains("config") {
        "sets project configuration and parameters"
    } else {
        "is part of the base project structure"
    }
}
