//! File content synthesis.
//!
//! [`synthesize_file_content`] is a fixed lookup table keyed by file name and
//! parent directory. [`ContentSource`] puts it behind a trait so the builder
//! can swap in a live generation backend.

use async_trait::async_trait;

use crate::classify::{Database, Framework, ProjectType, TechStack};
use crate::render::{file_name, in_dir};

/// Produces the text written to a planned file.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Content for the file at `path` (relative to the project root).
    async fn file_content(&self, path: &str, project_type: ProjectType, stack: &TechStack) -> String;
}

/// [`ContentSource`] backed by the built-in template table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContent;

#[async_trait]
impl ContentSource for TemplateContent {
    async fn file_content(&self, path: &str, project_type: ProjectType, stack: &TechStack) -> String {
        synthesize_file_content(path, project_type, stack)
    }
}

/// Look up the template for `path`; unknown files get a one-line comment.
pub fn synthesize_file_content(path: &str, project_type: ProjectType, stack: &TechStack) -> String {
    let name = file_name(path);
    let stem = name.split('.').next().unwrap_or(name);
    let is_js = name.ends_with(".js");

    match name {
        "package.json" => return PACKAGE_JSON.to_string(),
        "README.md" => return readme(project_type, stack),
        "App.js" => return APP_JS.to_string(),
        "App.css" => return APP_CSS.to_string(),
        "config.py" => return CONFIG_PY.to_string(),
        "requirements.txt" => return requirements(stack),
        _ => {}
    }

    if name == "index.html" && in_dir(path, "public") {
        PUBLIC_INDEX_HTML.to_string()
    } else if name == "index.js" && in_dir(path, "src") {
        INDEX_JS.to_string()
    } else if is_js && in_dir(path, "components") {
        react_component(stem)
    } else if is_js && in_dir(path, "pages") {
        react_page(stem)
    } else if name == "app.py" && stack.framework == Framework::Flask {
        FLASK_APP_PY.to_string()
    } else if in_dir(path, "templates") && name == "base.html" {
        FLASK_BASE_HTML.to_string()
    } else if in_dir(path, "templates") && name == "index.html" {
        FLASK_INDEX_HTML.to_string()
    } else if in_dir(path, "templates") && name == "about.html" {
        FLASK_ABOUT_HTML.to_string()
    } else if in_dir(path, "routes") && name == "__init__.py" {
        ROUTES_INIT_PY.to_string()
    } else if in_dir(path, "routes") && name == "main.py" {
        ROUTES_MAIN_PY.to_string()
    } else if in_dir(path, "models") && name == "__init__.py" {
        MODELS_INIT_PY.to_string()
    } else if in_dir(path, "models") && name == "user.py" {
        USER_MODEL_PY.to_string()
    } else if in_dir(path, "css") && name == "style.css" {
        STYLE_CSS.to_string()
    } else if in_dir(path, "js") && name == "main.js" {
        MAIN_JS.to_string()
    } else {
        format!(
            "// Content for {}\n// Generated automatically by the project builder\n",
            path
        )
    }
}

fn readme(project_type: ProjectType, stack: &TechStack) -> String {
    let database = stack
        .database
        .map(|db| db.display_name())
        .unwrap_or("Not specified");

    format!(
        "# {} project\n\n\
         This project was generated automatically by the project builder.\n\n\
         ## Technologies\n\n\
         - Language: {}\n\
         - Framework: {}\n\
         - Database: {}\n\n\
         ## Getting started\n\n\
         1. Clone this repository\n\
         2. Install the dependencies\n\
         3. Run the application\n\n\
         ## License\n\n\
         MIT\n",
        project_type.label(),
        stack.language.display_name(),
        stack.framework.display_name(),
        database,
    )
}

fn requirements(stack: &TechStack) -> String {
    let mut lines = vec!["Flask==2.2.3", "Werkzeug==2.2.3"];
    match stack.database {
        Some(Database::Postgresql) => {
            lines.extend(["Flask-SQLAlchemy==3.0.3", "psycopg2-binary==2.9.5"])
        }
        Some(Database::Mysql) => lines.extend(["Flask-SQLAlchemy==3.0.3", "mysqlclient==2.1.1"]),
        Some(_) => lines.push("Flask-SQLAlchemy==3.0.3"),
        None => {}
    }
    lines.join("\n")
}

fn react_component(name: &str) -> String {
    format!(
        "import React from 'react';\n\n\
         function {name}() {{\n  \
           return (\n    \
             <div className=\"{lower}\">\n      \
               <h2>{name} Component</h2>\n    \
             </div>\n  \
           );\n\
         }}\n\n\
         export default {name};\n",
        name = name,
        lower = name.to_lowercase()
    )
}

fn react_page(name: &str) -> String {
    format!(
        "import React from 'react';\n\n\
         function {name}() {{\n  \
           return (\n    \
             <div className=\"{lower}-page\">\n      \
               <h1>{name} Page</h1>\n      \
               <p>Welcome to the {name} page.</p>\n    \
             </div>\n  \
           );\n\
         }}\n\n\
         export default {name};\n",
        name = name,
        lower = name.to_lowercase()
    )
}

const PACKAGE_JSON: &str = r#"{
  "name": "project-name",
  "version": "0.1.0",
  "private": true,
  "dependencies": {
    "react": "^18.2.0",
    "react-dom": "^18.2.0",
    "react-router-dom": "^6.8.0",
    "react-scripts": "5.0.1"
  },
  "scripts": {
    "start": "react-scripts start",
    "build": "react-scripts build",
    "test": "react-scripts test",
    "eject": "react-scripts eject"
  },
  "eslintConfig": {
    "extends": ["react-app", "react-app/jest"]
  },
  "browserslist": {
    "production": [">0.2%", "not dead", "not op_mini all"],
    "development": ["last 1 chrome version", "last 1 firefox version", "last 1 safari version"]
  }
}
"#;

const PUBLIC_INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <link rel="icon" href="%PUBLIC_URL%/favicon.ico" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <meta name="theme-color" content="#000000" />
    <title>My Application</title>
  </head>
  <body>
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>
  </body>
</html>
"##;

const APP_JS: &str = r#"import React from 'react';
import { BrowserRouter as Router, Routes, Route } from 'react-router-dom';
import './App.css';
import Header from './components/Header';
import Footer from './components/Footer';
import Home from './pages/Home';
import About from './pages/About';

function App() {
  return (
    <Router>
      <div className="App">
        <Header />
        <main className="container">
          <Routes>
            <Route path="/" element={<Home />} />
            <Route path="/about" element={<About />} />
          </Routes>
        </main>
        <Footer />
      </div>
    </Router>
  );
}

export default App;
"#;

const APP_CSS: &str = r#".App {
  min-height: 100vh;
  display: flex;
  flex-direction: column;
}

.container {
  flex: 1;
  max-width: 960px;
  margin: 0 auto;
  padding: 1rem;
}
"#;

const INDEX_JS: &str = r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App';

const root = ReactDOM.createRoot(document.getElementById('root'));
root.render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
);
"#;

const FLASK_APP_PY: &str = r#"from flask import Flask
from config import Config
from routes import init_routes

app = Flask(__name__)
app.config.from_object(Config)

init_routes(app)

if __name__ == '__main__':
    app.run(debug=True)
"#;

const CONFIG_PY: &str = r#"import os


class Config:
    SECRET_KEY = os.environ.get('SECRET_KEY') or 'change-me'
    SQLALCHEMY_DATABASE_URI = os.environ.get('DATABASE_URL') or 'sqlite:///app.db'
    SQLALCHEMY_TRACK_MODIFICATIONS = False
"#;

const FLASK_BASE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{% block title %}My Flask App{% endblock %}</title>
    <link rel="stylesheet" href="{{ url_for('static', filename='css/style.css') }}">
</head>
<body>
    <header>
        <nav>
            <ul>
                <li><a href="{{ url_for('main.index') }}">Home</a></li>
                <li><a href="{{ url_for('main.about') }}">About</a></li>
            </ul>
        </nav>
    </header>

    <main>
        {% block content %}{% endblock %}
    </main>

    <script src="{{ url_for('static', filename='js/main.js') }}"></script>
</body>
</html>
"#;

const FLASK_INDEX_HTML: &str = r#"{% extends 'base.html' %}

{% block title %}Home - My Flask App{% endblock %}

{% block content %}
<section class="hero">
    <h1>Welcome to My Flask App</h1>
    <p>This application was generated by the project builder.</p>
</section>
{% endblock %}
"#;

const FLASK_ABOUT_HTML: &str = r#"{% extends 'base.html' %}

{% block title %}About - My Flask App{% endblock %}

{% block content %}
<section>
    <h1>About</h1>
    <p>A small Flask application.</p>
</section>
{% endblock %}
"#;

const ROUTES_INIT_PY: &str = r#"from routes.main import main


def init_routes(app):
    app.register_blueprint(main)
"#;

const ROUTES_MAIN_PY: &str = r#"from flask import Blueprint, render_template

main = Blueprint('main', __name__)


@main.route('/')
def index():
    return render_template('index.html')


@main.route('/about')
def about():
    return render_template('about.html')
"#;

const MODELS_INIT_PY: &str = r#"from models.user import User

__all__ = ['User']
"#;

const USER_MODEL_PY: &str = r#"class User:
    def __init__(self, username, email):
        self.username = username
        self.email = email

    def __repr__(self):
        return f'<User {self.username}>'
"#;

const STYLE_CSS: &str = r#"body {
    font-family: sans-serif;
    margin: 0;
    padding: 0;
}

nav ul {
    display: flex;
    gap: 1rem;
    list-style: none;
}
"#;

const MAIN_JS: &str = r#"document.addEventListener('DOMContentLoaded', () => {
    console.log('Application loaded');
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Language;

    fn flask() -> TechStack {
        TechStack::new(Language::Python, Framework::Flask)
    }

    #[test]
    fn test_templates_match_on_directory() {
        let stack = flask();
        let index = synthesize_file_content("templates/index.html", ProjectType::Web, &stack);
        assert!(index.starts_with("{% extends 'base.html' %}"));

        let public = synthesize_file_content("public/index.html", ProjectType::Web, &stack);
        assert!(public.contains("<div id=\"root\"></div>"));
        assert!(public.contains("content=\"#000000\""));
        assert!(public.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_component_and_page_names() {
        let stack = TechStack::default();
        let header = synthesize_file_content("src/components/Header.js", ProjectType::Web, &stack);
        assert!(header.contains("function Header()"));
        assert!(header.contains("className=\"header\""));

        let about = synthesize_file_content("src/pages/About.js", ProjectType::Web, &stack);
        assert!(about.contains("<h1>About Page</h1>"));
    }

    #[test]
    fn test_flask_app_only_for_flask() {
        let app = synthesize_file_content("app.py", ProjectType::Web, &flask());
        assert!(app.contains("from flask import Flask"));

        let other = synthesize_file_content("app.py", ProjectType::Web, &TechStack::default());
        assert!(other.starts_with("// Content for app.py"));
    }

    #[test]
    fn test_requirements_follow_database() {
        let plain = synthesize_file_content("requirements.txt", ProjectType::Web, &flask());
        assert_eq!(plain, "Flask==2.2.3\nWerkzeug==2.2.3");

        let pg = flask().with_database(Database::Postgresql);
        let text = synthesize_file_content("requirements.txt", ProjectType::Web, &pg);
        assert!(text.ends_with("psycopg2-binary==2.9.5"));

        let mongo = flask().with_database(Database::Mongodb);
        let text = synthesize_file_content("requirements.txt", ProjectType::Web, &mongo);
        assert!(text.ends_with("Flask-SQLAlchemy==3.0.3"));
    }

    #[test]
    fn test_fallback_comment() {
        let text = synthesize_file_content("static/img/logo.svg", ProjectType::Web, &flask());
        assert_eq!(
            text,
            "// Content for static/img/logo.svg\n// Generated automatically by the project builder\n"
        );
    }

    #[tokio::test]
    async fn test_template_source() {
        let source = TemplateContent;
        let text = source.file_content("README.md", ProjectType::Web, &flask()).await;
        assert!(text.contains("- Framework: Flask"));
    }
}
