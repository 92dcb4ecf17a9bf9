//! CLI command definitions.
//!
//! Builds run inside this process, so `build` stays in the foreground until
//! the project is completed or has failed. The other commands read the
//! shared database.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod build;
pub mod list;
pub mod message;
pub mod show;

/// Storm - autonomous project builder
#[derive(Parser)]
#[command(name = "storm")]
#[command(version, about = "Storm - autonomous project builder")]
#[command(long_about = r#"
Storm turns a one-line project description into a working project skeleton:
it classifies the request, plans a file tree and task list, writes the files
into a per-user workspace and installs the dependencies.

COMMANDS:
  build    → Build a project from a description
  show     → Show a project's status, files and transcript
  list     → List a user's projects
  message  → Send a chat message to a project

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Build failed
  4 - Storage error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to ./storm.yaml when present)
    #[arg(short, long, global = true, env = "STORM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a project from a description
    Build(build::BuildArgs),

    /// Show a project
    Show(show::ShowArgs),

    /// List projects
    List(list::ListArgs),

    /// Send a message to a project
    Message(message::MessageArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "storm",
            "build",
            "a flask app called demo",
            "--speed",
            "fast",
            "--no-testing",
        ])
        .unwrap();
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.description, "a flask app called demo");
                assert_eq!(args.speed, "fast");
                assert!(args.no_testing);
                assert_eq!(args.user, "default");
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["storm", "list", "--verbose", "--json"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.json);
    }

    #[test]
    fn test_message_requires_text() {
        assert!(Cli::try_parse_from(["storm", "message", "p-1"]).is_err());
    }
}
