//! List command - List a user's projects.

use anyhow::Result;
use clap::Args;

use storm_core::{BuildService, StormConfig};

#[derive(Args)]
pub struct ListArgs {
    /// Owner of the projects
    #[arg(short, long, default_value = "default")]
    pub user: String,
}

pub async fn execute(args: ListArgs, config: StormConfig) -> Result<()> {
    let service = BuildService::new(config);
    let projects = service.list_projects(&args.user).await?;

    if projects.is_empty() {
        println!("No projects for user '{}'", args.user);
        return Ok(());
    }

    for project in projects {
        println!(
            "{}  {:<20} {:<16} {:>3}%  {}",
            project.project_id, project.name, project.status, project.progress, project.phase
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_empty_store() {
        let dir = TempDir::new().unwrap();
        let config = StormConfig::for_root(dir.path());
        execute(
            ListArgs {
                user: "nobody".to_string(),
            },
            config,
        )
        .await
        .unwrap();
    }
}
