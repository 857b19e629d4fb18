use colored::Colorize;
use std::path::Path;
use stratus_core::StateManager;

pub async fn handle_list(project_root: &Path) -> anyhow::Result<()> {
    let state = StateManager::new(project_root).load().await?;
    if state.resources.is_empty() {
        println!("{}", "No resources in the state.".dimmed());
        return Ok(());
    }
    for (address, resource) in &state.resources {
        let tainted = if resource.tainted {
            " (tainted)".red().to_string()
        } else {
            String::new()
        };
        println!("{}  {}{}", address.cyan(), resource.id.dimmed(), tainted);
    }
    Ok(())
}
