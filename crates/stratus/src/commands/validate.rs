use crate::utils;
use colored::Colorize;
use std::path::Path;
use stratus_core::ProviderError;

pub fn handle(type_name: &str, file: &Path) -> anyhow::Result<()> {
    let config = utils::load_config(file)?;
    let provider = utils::offline_provider();

    let result = if provider.resource(type_name).is_ok() {
        provider.validate_resource_config(type_name, &config)
    } else {
        provider.validate_data_source_config(type_name, &config)
    };

    match result {
        Ok(warnings) => {
            for warning in &warnings {
                eprintln!("{} {}", "Warning:".yellow().bold(), warning);
            }
            println!("{}", "✓ Configuration is valid".green().bold());
            Ok(())
        }
        Err(ProviderError::Validation(diagnostics)) => {
            eprintln!("{}", "✗ Configuration is invalid".red().bold());
            for diagnostic in &diagnostics {
                eprintln!("  {}", diagnostic);
            }
            anyhow::bail!("{} error(s) in {}", diagnostics.len(), file.display())
        }
        Err(e) => Err(e.into()),
    }
}
