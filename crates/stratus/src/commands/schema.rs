use crate::utils;

pub fn handle(type_name: Option<&str>) -> anyhow::Result<()> {
    let provider = utils::offline_provider();
    let schema = provider.schema();

    let output = match type_name {
        None => serde_json::to_value(&schema)?,
        Some(name) => {
            let found = schema
                .resources
                .get(name)
                .or_else(|| schema.data_sources.get(name))
                .ok_or_else(|| anyhow::anyhow!("unknown resource or data source type: {name}"))?;
            serde_json::to_value(found)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
