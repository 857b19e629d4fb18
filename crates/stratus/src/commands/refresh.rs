use crate::utils;
use colored::Colorize;
use std::path::Path;
use stratus_core::{StateManager, parse_address};

pub async fn handle(project_root: &Path, address: &str) -> anyhow::Result<()> {
    let (resource_type, _) = parse_address(address)?;
    let provider = utils::online_provider().await?;

    let manager = StateManager::new(project_root);
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let prior = state
        .get_resource(address)
        .map(|r| r.attributes.clone())
        .ok_or_else(|| anyhow::anyhow!("{address} is not in the state"))?;

    match provider.read(resource_type, &prior).await? {
        Some(attributes) => {
            state.upsert_resource(address, resource_type, attributes);
            println!("{} {}", "✓ Refreshed".green(), address.cyan());
        }
        None => {
            state.remove_resource(address);
            println!(
                "{} {} no longer exists and was removed from the state",
                "!".yellow().bold(),
                address.cyan()
            );
        }
    }
    manager.save(&state).await?;
    lock.release().await?;
    Ok(())
}
