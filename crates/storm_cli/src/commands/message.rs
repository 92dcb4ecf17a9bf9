//! Message command - Talk to a project.

use anyhow::Result;
use clap::Args;

use storm_core::{BuildService, StormConfig};
use storm_store::SpecialAction;

#[derive(Args)]
pub struct MessageArgs {
    /// Project id
    pub project_id: String,

    /// Message text
    pub text: String,
}

pub async fn execute(args: MessageArgs, config: StormConfig) -> Result<()> {
    let service = BuildService::new(config);
    let reply = service.send_message(&args.project_id, &args.text).await?;

    println!("{}", reply.response);
    for action in &reply.special_actions {
        match action {
            SpecialAction::ShowDevelopmentPlan { plan } => println!("\n📋 Development plan:\n{}", plan),
            SpecialAction::ProjectApprovalRequired { .. } => println!("\n⏸️  The plan is waiting for approval"),
            SpecialAction::CreateFile { path, .. } => println!("\n📄 File: {}", path),
        }
    }
    Ok(())
}
