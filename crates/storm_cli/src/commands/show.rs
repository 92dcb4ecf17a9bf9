//! Show command - Print a project's state.

use anyhow::Result;
use clap::Args;

use storm_core::{BuildService, StormConfig};

#[derive(Args)]
pub struct ShowArgs {
    /// Project id
    pub project_id: String,

    /// Include the chat transcript
    #[arg(short, long)]
    pub messages: bool,

    /// Print the whole project view as JSON
    #[arg(long = "as-json")]
    pub as_json: bool,
}

pub async fn execute(args: ShowArgs, config: StormConfig) -> Result<()> {
    let service = BuildService::new(config);
    let view = service.get_project(&args.project_id).await?;

    if args.as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let project = &view.project;
    println!("📦 {} ({})", project.name, project.project_id);
    println!("   Status:   {}", project.status);
    println!("   Phase:    {}", project.phase);
    println!("   Progress: {}%", project.progress);
    if let Some(step) = &project.current_step {
        println!("   Step:     {}", step);
    }
    if let Some(stack) = &project.tech_stack {
        println!("   Stack:    {}", stack.summary());
    }

    println!("\n📁 Files ({}):", view.workspace_files.len());
    for file in &view.workspace_files {
        println!("   - {}", file);
    }

    if args.messages {
        println!("\n💬 Transcript:");
        for message in &view.messages {
            println!("[{:?}] {}\n", message.role, message.content);
        }
    }
    Ok(())
}
