//! Keyword classification of a project description.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coarse kind of application being built.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    #[default]
    Web,
    Api,
    Mobile,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Api => "api",
            Self::Mobile => "mobile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "web" => Some(Self::Web),
            "api" => Some(Self::Api),
            "mobile" => Some(Self::Mobile),
            _ => None,
        }
    }

    /// Human-readable label used in chat messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Web => "web application",
            Self::Api => "REST API",
            Self::Mobile => "mobile web application",
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Primary implementation language.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Javascript,
    Python,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Python => "python",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Javascript => "JavaScript",
            Self::Python => "Python",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Application framework.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    React,
    Vue,
    Angular,
    #[serde(rename = "next.js")]
    NextJs,
    Flask,
    Django,
    Express,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::React => "react",
            Self::Vue => "vue",
            Self::Angular => "angular",
            Self::NextJs => "next.js",
            Self::Flask => "flask",
            Self::Django => "django",
            Self::Express => "express",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::React => "React",
            Self::Vue => "Vue.js",
            Self::Angular => "Angular",
            Self::NextJs => "Next.js",
            Self::Flask => "Flask",
            Self::Django => "Django",
            Self::Express => "Express.js",
        }
    }

    /// Frameworks whose dependencies are installed with npm.
    pub fn is_node(&self) -> bool {
        matches!(self, Self::React | Self::Vue | Self::Angular | Self::NextJs)
    }

    /// Language implied by the framework, if any.
    fn implied_language(&self) -> Option<Language> {
        match self {
            Self::Flask | Self::Django => Some(Language::Python),
            Self::Express => Some(Language::Javascript),
            _ => None,
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Database engine mentioned in the description.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Postgresql,
    Mysql,
    Mongodb,
    Sqlite,
}

impl Database {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Mongodb => "mongodb",
            Self::Sqlite => "sqlite",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgresql => "PostgreSQL",
            Self::Mysql => "MySQL",
            Self::Mongodb => "MongoDB",
            Self::Sqlite => "SQLite",
        }
    }
}

impl std::fmt::Display for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detected technology stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TechStack {
    pub language: Language,
    pub framework: Framework,
    pub database: Option<Database>,
}

impl TechStack {
    pub fn new(language: Language, framework: Framework) -> Self {
        Self {
            language,
            framework,
            database: None,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// One-line summary, e.g. `language: python, framework: flask, database: none`.
    pub fn summary(&self) -> String {
        format!(
            "language: {}, framework: {}, database: {}",
            self.language,
            self.framework,
            self.database.map(|d| d.as_str()).unwrap_or("none")
        )
    }
}

const API_KEYWORDS: &[&str] = &["api", "rest", "graphql", "endpoint", "servicio web"];
// Bare substrings: "app" also hits "happy" and "ios" also hits "studios".
const MOBILE_KEYWORDS: &[&str] = &["móvil", "mobile", "android", "ios", "app"];
const PYTHON_KEYWORDS: &[&str] = &["python", "flask", "django", "fastapi"];

// Checked in order; the first framework with a hit wins.
const FRAMEWORK_KEYWORDS: &[(Framework, &[&str])] = &[
    (Framework::React, &["react", "reactjs"]),
    (Framework::Vue, &["vue", "vuejs"]),
    (Framework::Angular, &["angular", "angularjs"]),
    (Framework::NextJs, &["next", "nextjs", "next.js"]),
    (Framework::Flask, &["flask"]),
    (Framework::Django, &["django"]),
    (Framework::Express, &["express", "node", "nodejs"]),
];

const DATABASE_KEYWORDS: &[(Database, &[&str])] = &[
    (Database::Postgresql, &["postgres", "postgresql", "psql"]),
    (Database::Mysql, &["mysql", "mariadb"]),
    (Database::Mongodb, &["mongo", "mongodb", "nosql"]),
    (Database::Sqlite, &["sqlite", "sql lite"]),
];

fn mentions(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Classify a description into a project type and tech stack.
///
/// Matching is lowercase substring search. Mobile keywords override API
/// keywords; a matched framework overrides the detected language.
pub fn classify_project(description: &str) -> (ProjectType, TechStack) {
    let lower = description.to_lowercase();

    let mut project_type = ProjectType::Web;
    if mentions(&lower, API_KEYWORDS) {
        project_type = ProjectType::Api;
    }
    if mentions(&lower, MOBILE_KEYWORDS) {
        project_type = ProjectType::Mobile;
    }

    let mut stack = TechStack::default();
    if mentions(&lower, PYTHON_KEYWORDS) {
        stack.language = Language::Python;
    }

    if let Some((framework, _)) = FRAMEWORK_KEYWORDS
        .iter()
        .find(|(_, keywords)| mentions(&lower, keywords))
    {
        stack.framework = *framework;
        if let Some(language) = framework.implied_language() {
            stack.language = language;
        }
    }

    stack.database = DATABASE_KEYWORDS
        .iter()
        .find(|(_, keywords)| mentions(&lower, keywords))
        .map(|(db, _)| *db);

    debug!(project_type = %project_type, stack = %stack.summary(), "Classified project description");
    (project_type, stack)
}

/// Derive a short project name from the description.
pub fn extract_project_name(description: &str) -> String {
    let patterns = [
        r#"(?i)(?:called|named|titled)\s+["']?([a-zA-Z0-9_\-]+)["']?"#,
        r#"(?i)project\s+["']?([a-zA-Z0-9_\-]+)["']?"#,
        r#"(?i)application\s+["']?([a-zA-Z0-9_\-]+)["']?"#,
        r#"(?i)\bapp\s+["']?([a-zA-Z0-9_\-]+)["']?"#,
    ];

    for pattern in patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(description) {
                return caps[1].to_string();
            }
        }
    }

    let parts: Vec<String> = description
        .split_whitespace()
        .take(3)
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect();

    if parts.is_empty() {
        format!("project-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
    } else {
        parts.join("-")
    }
}
