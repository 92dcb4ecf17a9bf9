//! # storm_planner
//!
//! Heuristic planning for the autonomous project builder.
//!
//! Everything in this crate is a pure function of the free-text project
//! description: keyword matching picks a project type and tech stack, a fixed
//! table picks a file tree, and fixed task blocks build the development plan.
//! Nothing here fails; unknown inputs fall back to defaults or empty values.
//!
//! # Example
//!
//! ```rust
//! use storm_planner::{classify_project, flatten_file_structure, plan_structure, Framework};
//!
//! let (project_type, stack) = classify_project("build a flask app called demo");
//! assert_eq!(stack.framework, Framework::Flask);
//!
//! let tree = plan_structure(project_type, &stack);
//! let files = flatten_file_structure(&tree);
//! assert!(files.iter().any(|f| f.path == "app.py"));
//! ```

pub mod classify;
pub mod content;
pub mod render;
pub mod structure;
pub mod tasks;

pub use classify::{classify_project, extract_project_name, Database, Framework, Language, ProjectType, TechStack};
pub use content::{synthesize_file_content, ContentSource, TemplateContent};
pub use render::{
    analysis_response, development_plan, file_purpose_description, file_type_description,
    run_instructions,
};
pub use structure::{count_files, flatten_file_structure, plan_structure, DirectoryNode, FileEntry, FileKind, FileTree, FlatFile};
pub use tasks::{generate_tasks, total_estimate, DevTask};
