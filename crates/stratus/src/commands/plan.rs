use crate::utils;
use colored::Colorize;
use std::path::Path;
use stratus_core::{ActionType, Plan, StateManager, parse_address};

pub async fn handle(project_root: &Path, address: &str, file: &Path) -> anyhow::Result<()> {
    let (resource_type, _) = parse_address(address)?;
    let config = utils::load_config(file)?;

    let state = StateManager::new(project_root).load().await?;
    let prior = state.get_resource(address).map(|r| &r.attributes);

    // Planning is local: no API calls, no credentials.
    let provider = utils::planning_provider()?;
    let mut change = provider.plan(resource_type, prior, Some(&config))?;
    utils::taint_change(&state, address, &mut change);

    utils::print_change(address, &change);
    if change.action != ActionType::NoOp {
        println!();
        println!("{} {}", "Plan:".bold(), Plan::new(vec![change]).summary());
    }
    Ok(())
}
