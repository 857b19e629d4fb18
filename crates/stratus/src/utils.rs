use anyhow::Context;
use colored::Colorize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use stratus_aws::{AwsClient, new_provider};
use stratus_core::{ActionType, GlobalState, Provider, ResourceChange};

/// Reads resource arguments from a JSON or YAML (`.yaml`/`.yml`) file.
pub fn load_config(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml");

    let value: Value = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?
    };
    if !value.is_object() {
        anyhow::bail!("{} must contain an object of arguments", path.display());
    }
    Ok(value)
}

/// Provider for commands that make no API calls (schema, validate).
pub fn offline_provider() -> Provider {
    new_provider(&AwsClient::offline())
}

/// Offline provider that knows the configured default tags.
pub fn planning_provider() -> anyhow::Result<Provider> {
    let settings = stratus_config::load()?;
    Ok(new_provider(&AwsClient::offline_from_settings(&settings)))
}

/// Provider backed by real credentials from the settings file and the
/// SDK's default chain.
pub async fn online_provider() -> anyhow::Result<Provider> {
    let settings = stratus_config::load()?;
    let client = AwsClient::from_settings(&settings).await;
    if client.region().is_empty() {
        anyhow::bail!("no AWS region configured: set `region` in stratus.yaml or AWS_REGION");
    }
    Ok(new_provider(&client))
}

/// Asks a yes/no question on stdin; anything but "y"/"yes" is no.
pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

fn render(value: Option<&Value>, sensitive: bool) -> String {
    match value {
        _ if sensitive => "(sensitive value)".dimmed().to_string(),
        None => "null".dimmed().to_string(),
        Some(Value::String(s)) => format!("{s:?}"),
        Some(other) => other.to_string(),
    }
}

/// Forces a replace when the stored object was left tainted by a failed apply.
pub fn taint_change(state: &GlobalState, address: &str, change: &mut ResourceChange) {
    if state.get_resource(address).is_some_and(|r| r.tainted) {
        println!("{} {}", address.cyan(), "is tainted, so must be replaced".red());
        change.force_replace();
    }
}

/// Prints a planned change the way `plan` and `apply` show it.
pub fn print_change(address: &str, change: &ResourceChange) {
    let (symbol, verb) = match change.action {
        ActionType::Create => ("+".green(), "will be created".green()),
        ActionType::Update => ("~".yellow(), "will be updated in-place".yellow()),
        ActionType::Replace => ("-/+".red(), "must be replaced".red()),
        ActionType::Delete => ("-".red(), "will be destroyed".red()),
        ActionType::NoOp => {
            println!("{} {}", address.cyan(), "is up to date.".green());
            return;
        }
    };
    println!("{} {} {}", symbol, address.cyan().bold(), verb);

    if change.action == ActionType::Create {
        if let Some(Value::Object(planned)) = &change.planned {
            for (name, value) in planned {
                println!("    {} {} = {}", "+".green(), name, render(Some(value), false));
            }
        }
        return;
    }

    for attribute in &change.changes {
        let marker = if attribute.requires_replace {
            " # forces replacement".red().to_string()
        } else {
            String::new()
        };
        println!(
            "    {} {}: {} -> {}{}",
            "~".yellow(),
            attribute.path,
            render(attribute.before.as_ref(), attribute.sensitive),
            render(attribute.after.as_ref(), attribute.sensitive),
            marker
        );
    }
}
