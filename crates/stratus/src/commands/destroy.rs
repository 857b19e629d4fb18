use crate::utils;
use colored::Colorize;
use std::path::Path;
use stratus_core::{StateManager, parse_address};

pub async fn handle(project_root: &Path, address: &str, yes: bool) -> anyhow::Result<()> {
    let (resource_type, _) = parse_address(address)?;

    let manager = StateManager::new(project_root);
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let Some(prior) = state.get_resource(address).map(|r| r.attributes.clone()) else {
        println!("{} is not in the state; nothing to destroy.", address.cyan());
        lock.release().await?;
        return Ok(());
    };

    let provider = utils::online_provider().await?;
    let change = provider.plan(resource_type, Some(&prior), None)?;
    utils::print_change(address, &change);

    println!();
    if !yes && !utils::confirm(&format!("Destroy {address}?"))? {
        println!("{}", "Destroy cancelled.".yellow());
        lock.release().await?;
        return Ok(());
    }

    provider.apply(&change).await?;
    state.remove_resource(address);
    manager.save(&state).await?;
    lock.release().await?;

    println!("{}", "✓ Destroy complete".green().bold());
    Ok(())
}
