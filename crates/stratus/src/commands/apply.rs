use crate::utils;
use colored::Colorize;
use std::path::Path;
use stratus_core::{ActionType, StateManager, parse_address};

pub async fn handle(project_root: &Path, address: &str, file: &Path, yes: bool) -> anyhow::Result<()> {
    let (resource_type, _) = parse_address(address)?;
    let config = utils::load_config(file)?;
    let provider = utils::online_provider().await?;

    let manager = StateManager::new(project_root);
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let prior = state.get_resource(address).map(|r| r.attributes.clone());
    let mut change = provider.plan(resource_type, prior.as_ref(), Some(&config))?;
    utils::taint_change(&state, address, &mut change);
    utils::print_change(address, &change);
    if change.action == ActionType::NoOp {
        lock.release().await?;
        return Ok(());
    }

    println!();
    if !yes && !utils::confirm("Apply these changes?")? {
        println!("{}", "Apply cancelled.".yellow());
        lock.release().await?;
        return Ok(());
    }

    println!("{} {}...", "Applying".blue(), address.cyan());
    tracing::info!(address, action = %change.action, "applying change");
    match provider.apply(&change).await {
        Ok(Some(attributes)) => state.upsert_resource(address, resource_type, attributes),
        Ok(None) => {
            state.remove_resource(address);
        }
        Err(err) => {
            // The object exists remotely even though the apply failed.
            if let Some(partial) = err.partial_state() {
                state.taint_resource(address, resource_type, partial.clone());
                manager.save(&state).await?;
                println!(
                    "{} {} {}",
                    "!".red(),
                    address.cyan(),
                    "was saved as tainted and will be replaced on the next apply".red()
                );
            }
            lock.release().await?;
            return Err(err.into());
        }
    }
    manager.save(&state).await?;
    lock.release().await?;

    println!("{}", format!("✓ Apply complete ({})", change.action).green().bold());
    Ok(())
}
