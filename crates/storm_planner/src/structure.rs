//! Planned file trees and their flattened form.

use serde::{Deserialize, Serialize};

use crate::classify::{Framework, ProjectType, TechStack};

/// Content category of a planned file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Json,
    Markdown,
    Html,
    Css,
    Javascript,
    Python,
    Binary,
    #[default]
    Text,
}

/// A single planned file inside a directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FileKind,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A planned directory with nested files and directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryNode {
    pub name: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub directories: Vec<DirectoryNode>,
}

impl DirectoryNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn file(mut self, name: &str, kind: FileKind) -> Self {
        self.files.push(FileEntry::new(name, kind));
        self
    }

    fn dir(mut self, dir: DirectoryNode) -> Self {
        self.directories.push(dir);
        self
    }
}

/// Root of a planned project layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileTree {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub directories: Vec<DirectoryNode>,
}

impl FileTree {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }

    fn file(mut self, name: &str, kind: FileKind) -> Self {
        self.files.push(FileEntry::new(name, kind));
        self
    }

    fn dir(mut self, dir: DirectoryNode) -> Self {
        self.directories.push(dir);
        self
    }
}

/// A file from the tree with its full relative path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlatFile {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

/// Pick the planned layout for a stack.
///
/// Only React and Flask have a layout; every other framework gets an
/// empty tree.
pub fn plan_structure(_project_type: ProjectType, stack: &TechStack) -> FileTree {
    match stack.framework {
        Framework::React => react_tree(),
        Framework::Flask => flask_tree(),
        _ => FileTree::default(),
    }
}

fn react_tree() -> FileTree {
    use FileKind::*;

    FileTree::default()
        .file("package.json", Json)
        .file("README.md", Markdown)
        .dir(
            DirectoryNode::new("public")
                .file("index.html", Html)
                .file("favicon.ico", Binary),
        )
        .dir(
            DirectoryNode::new("src")
                .file("index.js", Javascript)
                .file("App.js", Javascript)
                .file("App.css", Css)
                .dir(
                    DirectoryNode::new("components")
                        .file("Header.js", Javascript)
                        .file("Footer.js", Javascript),
                )
                .dir(
                    DirectoryNode::new("pages")
                        .file("Home.js", Javascript)
                        .file("About.js", Javascript),
                ),
        )
}

fn flask_tree() -> FileTree {
    use FileKind::*;

    FileTree::default()
        .file("app.py", Python)
        .file("config.py", Python)
        .file("requirements.txt", Text)
        .file("README.md", Markdown)
        .dir(
            DirectoryNode::new("static")
                .dir(DirectoryNode::new("css").file("style.css", Css))
                .dir(DirectoryNode::new("js").file("main.js", Javascript))
                .dir(DirectoryNode::new("img")),
        )
        .dir(
            DirectoryNode::new("templates")
                .file("base.html", Html)
                .file("index.html", Html)
                .file("about.html", Html),
        )
        .dir(
            DirectoryNode::new("models")
                .file("__init__.py", Python)
                .file("user.py", Python),
        )
        .dir(
            DirectoryNode::new("routes")
                .file("__init__.py", Python)
                .file("main.py", Python),
        )
}

/// Total number of files in the tree, at every depth.
pub fn count_files(tree: &FileTree) -> usize {
    fn count_dir(dir: &DirectoryNode) -> usize {
        dir.files.len() + dir.directories.iter().map(count_dir).sum::<usize>()
    }

    tree.files.len() + tree.directories.iter().map(count_dir).sum::<usize>()
}

/// Flatten the tree depth-first: a level's files first, then each
/// subdirectory in order.
pub fn flatten_file_structure(tree: &FileTree) -> Vec<FlatFile> {
    let mut out = Vec::new();
    flatten_level(&tree.files, &tree.directories, "", &mut out);
    out
}

fn flatten_level(
    files: &[FileEntry],
    directories: &[DirectoryNode],
    prefix: &str,
    out: &mut Vec<FlatFile>,
) {
    for file in files {
        out.push(FlatFile {
            path: join(prefix, &file.name),
            kind: file.kind,
        });
    }
    for dir in directories {
        let dir_path = join(prefix, &dir.name);
        flatten_level(&dir.files, &dir.directories, &dir_path, out);
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Language;

    fn flask() -> TechStack {
        TechStack::new(Language::Python, Framework::Flask)
    }

    #[test]
    fn test_flask_tree_paths() {
        let tree = plan_structure(ProjectType::Web, &flask());
        let paths: Vec<String> = flatten_file_structure(&tree)
            .into_iter()
            .map(|f| f.path)
            .collect();

        assert_eq!(paths.len(), 13);
        assert_eq!(&paths[..4], ["app.py", "config.py", "requirements.txt", "README.md"]);
        assert!(paths.contains(&"static/css/style.css".to_string()));
        assert!(paths.contains(&"templates/index.html".to_string()));
        assert!(paths.contains(&"routes/__init__.py".to_string()));
    }

    #[test]
    fn test_react_tree_paths() {
        let stack = TechStack::default();
        let tree = plan_structure(ProjectType::Web, &stack);
        let files = flatten_file_structure(&tree);

        assert_eq!(files.len(), 11);
        assert_eq!(files[0].path, "package.json");
        assert_eq!(files[0].kind, FileKind::Json);
        assert!(files.iter().any(|f| f.path == "src/components/Header.js"));
        assert!(files.iter().any(|f| f.path == "public/favicon.ico" && f.kind == FileKind::Binary));
    }

    #[test]
    fn test_other_frameworks_are_empty() {
        for framework in [Framework::Vue, Framework::Angular, Framework::NextJs, Framework::Django, Framework::Express] {
            let stack = TechStack::new(Language::Javascript, framework);
            let tree = plan_structure(ProjectType::Web, &stack);
            assert!(tree.is_empty());
            assert_eq!(count_files(&tree), 0);
            assert!(flatten_file_structure(&tree).is_empty());
        }
    }

    #[test]
    fn test_count_matches_flatten() {
        for stack in [flask(), TechStack::default()] {
            let tree = plan_structure(ProjectType::Web, &stack);
            assert_eq!(count_files(&tree), flatten_file_structure(&tree).len());
        }
    }

    #[test]
    fn test_tree_json_shape() {
        let tree = plan_structure(ProjectType::Web, &flask());
        let json = serde_json::to_value(&tree).unwrap();

        assert_eq!(json["files"][0], serde_json::json!({"name": "app.py", "type": "python"}));
        assert_eq!(json["directories"][0]["name"], "static");

        let back: FileTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }
}
