use crate::utils;
use serde_json::{Value, json};
use std::path::Path;

pub async fn handle(type_name: &str, file: Option<&Path>) -> anyhow::Result<()> {
    let config = match file {
        Some(path) => utils::load_config(path)?,
        None => json!({}),
    };

    let provider = utils::online_provider().await?;
    let state: Value = provider.read_data_source(type_name, &config).await?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
