use crate::utils;
use colored::Colorize;
use std::path::Path;
use stratus_core::{StateManager, parse_address};

pub async fn handle(project_root: &Path, address: &str, id: &str) -> anyhow::Result<()> {
    let (resource_type, _) = parse_address(address)?;
    let provider = utils::online_provider().await?;

    let manager = StateManager::new(project_root);
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;
    if state.get_resource(address).is_some() {
        anyhow::bail!("{address} is already managed; destroy or remove it from the state first");
    }

    println!("{} {} ({})...", "Importing".blue(), address.cyan(), id);
    let attributes = provider
        .import(resource_type, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("cannot import non-existent remote object {id}"))?;

    state.upsert_resource(address, resource_type, attributes);
    manager.save(&state).await?;
    lock.release().await?;

    println!("{}", "✓ Import successful".green().bold());
    Ok(())
}
