//! Classification of command strings.
//!
//! Most commands run as plain shell lines. A fixed set of installer and
//! scaffolding shapes, plus the builder's own verbs (`create-file`,
//! `install-package`, ...), are "complex": they get structured handling and
//! streamed output. [`CommandKind::classify`] checks the shapes in order and
//! the first match wins.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a command string asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandKind {
    /// Run as-is with a timeout.
    Plain,
    /// Installer or scaffold line run as-is with streamed output.
    Scaffold,
    CreateFile { path: String, content: String },
    CreateFolder { paths: Vec<String> },
    Touch { paths: Vec<String> },
    InstallPackages { manager: String, packages: Vec<String> },
    InitProject { template: String, name: String, options: Vec<String> },
    SetupEnvironment { environment: String, options: Vec<String> },
    CloneRepo { url: String, target: String },
    /// A builder verb with missing or unsupported arguments.
    Invalid { reason: String },
}

// Checked in order; these are the full-line shapes treated as complex.
const COMPLEX_PATTERNS: &[(&str, Shape)] = &[
    (r"^npm install (.+)$", Shape::Install("npm")),
    (r"^pip install (.+)$", Shape::Install("pip")),
    (r"^yarn add (.+)$", Shape::Scaffold),
    (r"^pnpm install (.+)$", Shape::Scaffold),
    (r"^mkdir -p (.+)$", Shape::Mkdir),
    (r"^touch (.+)$", Shape::Touch),
    (r"^create-react-app (.+)$", Shape::Scaffold),
    (r"^npx create-(.+)$", Shape::Scaffold),
    (r"^django-admin startproject (.+)$", Shape::Scaffold),
    (r"^django-admin startapp (.+)$", Shape::Scaffold),
    (r"^flask create (.+)$", Shape::Scaffold),
];

#[derive(Debug, Clone, Copy)]
enum Shape {
    Install(&'static str),
    Mkdir,
    Touch,
    Scaffold,
}

const BUILDER_VERBS: &[&str] = &[
    "create-file",
    "create-folder",
    "install-package",
    "init-project",
    "setup-environment",
    "clone-repo",
];

impl CommandKind {
    /// Classify a command line.
    pub fn classify(command: &str) -> Self {
        let command = command.trim();
        let parts: Vec<&str> = command.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Self::Invalid {
                reason: "Empty command".to_string(),
            };
        };

        if BUILDER_VERBS.contains(&first.to_lowercase().as_str()) {
            return Self::builder_verb(&first.to_lowercase(), &parts[1..]);
        }

        for (pattern, shape) in COMPLEX_PATTERNS {
            let Ok(re) = Regex::new(pattern) else { continue };
            let Some(caps) = re.captures(command) else { continue };
            let args: Vec<String> = caps[1].split_whitespace().map(str::to_string).collect();

            return match shape {
                Shape::Install(manager) => Self::InstallPackages {
                    manager: manager.to_string(),
                    packages: args,
                },
                Shape::Mkdir => Self::CreateFolder { paths: args },
                Shape::Touch => Self::Touch { paths: args },
                Shape::Scaffold => Self::Scaffold,
            };
        }

        Self::Plain
    }

    fn builder_verb(verb: &str, args: &[&str]) -> Self {
        let invalid = |reason: &str| Self::Invalid {
            reason: reason.to_string(),
        };
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        match verb {
            "create-file" => {
                if args.len() < 2 {
                    return invalid("create-file requires a file name and content");
                }
                Self::CreateFile {
                    path: args[0].to_string(),
                    content: strip_triple_quotes(&args[1..].join(" ")),
                }
            }
            "create-folder" => match args.first() {
                Some(path) => Self::CreateFolder {
                    paths: vec![path.to_string()],
                },
                None => invalid("create-folder requires a directory name"),
            },
            "install-package" => {
                if args.len() < 2 {
                    return invalid("install-package requires a package manager and at least one package");
                }
                if install_prefix(args[0]).is_none() {
                    return invalid(&format!("Unsupported package manager: {}", args[0]));
                }
                Self::InstallPackages {
                    manager: args[0].to_string(),
                    packages: owned(&args[1..]),
                }
            }
            "init-project" => {
                if args.len() < 2 {
                    return invalid("init-project requires a project type and a name");
                }
                if init_command(args[0], args[1], &[]).is_none() {
                    return invalid(&format!("Unsupported project type: {}", args[0]));
                }
                Self::InitProject {
                    template: args[0].to_string(),
                    name: args[1].to_string(),
                    options: owned(&args[2..]),
                }
            }
            "setup-environment" => {
                let Some(environment) = args.first() else {
                    return invalid("setup-environment requires an environment type");
                };
                if setup_command(environment).is_none() {
                    return invalid(&format!("Unsupported environment type: {}", environment));
                }
                Self::SetupEnvironment {
                    environment: environment.to_string(),
                    options: owned(&args[1..]),
                }
            }
            "clone-repo" => {
                let Some(url) = args.first() else {
                    return invalid("clone-repo requires a repository URL");
                };
                let target = match args.get(1) {
                    Some(target) => target.to_string(),
                    None => repo_dir_name(url),
                };
                Self::CloneRepo {
                    url: url.to_string(),
                    target,
                }
            }
            other => invalid(&format!("Unknown builder command: {}", other)),
        }
    }

    /// True for anything that is not a plain shell line.
    pub fn is_complex(&self) -> bool {
        !matches!(self, Self::Plain)
    }

    /// The shell line to run for kinds that expand to one.
    ///
    /// `original` is returned for [`CommandKind::Plain`] and
    /// [`CommandKind::Scaffold`]; filesystem kinds and invalid commands
    /// have no shell line.
    pub fn shell_command(&self, original: &str) -> Option<String> {
        match self {
            Self::Plain | Self::Scaffold => Some(original.trim().to_string()),
            Self::InstallPackages { manager, packages } => {
                install_prefix(manager).map(|prefix| format!("{} {}", prefix, packages.join(" ")))
            }
            Self::InitProject {
                template,
                name,
                options,
            } => init_command(template, name, options),
            Self::SetupEnvironment { environment, .. } => setup_command(environment).map(str::to_string),
            Self::CloneRepo { url, target } => Some(format!("git clone {} {}", url, target)),
            Self::CreateFile { .. }
            | Self::CreateFolder { .. }
            | Self::Touch { .. }
            | Self::Invalid { .. } => None,
        }
    }
}

fn strip_triple_quotes(content: &str) -> String {
    for quote in ["\"\"\"", "'''"] {
        if content.len() >= 6 && content.starts_with(quote) && content.ends_with(quote) {
            return content[3..content.len() - 3].to_string();
        }
    }
    content.to_string()
}

/// Directory name `git clone` would pick for `url`.
fn repo_dir_name(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Install command prefix for a package manager.
pub fn install_prefix(manager: &str) -> Option<&'static str> {
    let prefix = match manager {
        "npm" => "npm install",
        "yarn" => "yarn add",
        "pnpm" => "pnpm install",
        "pip" => "pip install",
        "pip3" => "pip3 install",
        "pipenv" => "pipenv install",
        "poetry" => "poetry add",
        "gem" => "gem install",
        "composer" => "composer require",
        "cargo" => "cargo add",
        "go" => "go get",
        "apt" | "apt-get" => "apt-get install -y",
        "apk" => "apk add",
        _ => return None,
    };
    Some(prefix)
}

/// Scaffolding command for a project template.
pub fn init_command(template: &str, name: &str, options: &[String]) -> Option<String> {
    let opts = options.join(" ");
    let command = match template {
        "react" => format!("npx create-react-app {}", name),
        "vue" => format!("npx @vue/cli create {} {}", name, opts),
        "angular" => format!("npx @angular/cli new {} {}", name, opts),
        "node" => format!("mkdir -p {0} && cd {0} && npm init -y", name),
        "flask" => format!("mkdir -p {0} && cd {0} && touch app.py requirements.txt", name),
        "django" => format!("django-admin startproject {}", name),
        "express" => format!("mkdir -p {0} && cd {0} && npm init -y && npm install express", name),
        "nextjs" => format!("npx create-next-app {}", name),
        "gatsby" => format!("npx gatsby new {}", name),
        "laravel" => format!("composer create-project --prefer-dist laravel/laravel {}", name),
        "spring" => format!("mkdir -p {0} && cd {0} && ./mvnw spring-boot:create", name),
        "rails" => format!("rails new {}", name),
        "electron" => format!("npx create-electron-app {}", name),
        _ => return None,
    };
    Some(command.trim_end().to_string())
}

/// Environment setup command for an environment type.
pub fn setup_command(environment: &str) -> Option<&'static str> {
    let command = match environment {
        "node" => "npm init -y && npm install nodemon --save-dev",
        "python" => "pip install virtualenv && virtualenv venv",
        "react" => "npm install eslint prettier --save-dev",
        "vue" => "npm install eslint prettier @vue/eslint-config-prettier --save-dev",
        "typescript" => "npm install typescript ts-node @types/node --save-dev && npx tsc --init",
        "web" => "npm install webpack webpack-cli webpack-dev-server html-webpack-plugin --save-dev",
        "testing" => "npm install jest @testing-library/react @testing-library/jest-dom --save-dev",
        "docker" => "touch Dockerfile docker-compose.yml .dockerignore",
        _ => return None,
    };
    Some(command)
}
