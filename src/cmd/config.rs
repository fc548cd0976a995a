//! Configuration view and validation commands — `revhook config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;

fn credential(set: bool) -> &'static str {
    if set { "set" } else { "not set" }
}

pub fn cmd_config(
    project_dir: &Path,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    use revhook::config::{CONFIG_FILE, Config, ENV_ACCESS_TOKEN, ENV_API_KEY, REVHOOK_DIR, RevhookToml};

    let revhook_dir = project_dir.join(REVHOOK_DIR);
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| revhook_dir.join(CONFIG_FILE));

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("revhook Configuration");
            println!("=====================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                RevhookToml::load(&config_path)?
            } else {
                println!("No revhook.toml found at {}", config_path.display());
                println!("Using default configuration.");
                RevhookToml::default()
            };
            println!();

            println!("[chat]");
            println!("  model = \"{}\"", toml.chat.model);
            println!("  send_by_proxy = {}", toml.chat.send_by_proxy);
            println!("  max_tokens = {}", toml.chat.max_tokens);
            println!("  max_model_tokens = {}", toml.chat.max_model_tokens);
            println!("  api_base_url = \"{}\"", toml.chat.api_base_url);
            println!("  proxy_url = \"{}\"", toml.chat.proxy_url);
            println!();

            println!("[prompt]");
            if let Some(custom) = &toml.prompt.custom_instructions {
                println!("  custom_instructions = {:?}", custom);
            }
            println!(
                "  include_extensions = [{}]",
                toml.prompt
                    .include_extensions
                    .iter()
                    .map(|e| format!("\"{}\"", e))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!();

            if let Some(pattern) = &toml.security.security_regex {
                println!("[security]");
                println!("  security_regex = {:?}", pattern);
                println!();
            }

            println!("[run]");
            println!("  task = \"{}\"", toml.run.task);
            println!("  cursor_policy = \"{}\"", toml.run.cursor_policy);
            println!("  fail_on_findings = {}", toml.run.fail_on_findings);
            println!("  review_fail_marker = \"{}\"", toml.run.review_fail_marker);
            println!();

            println!("Credentials:");
            println!(
                "  {} = {}",
                ENV_API_KEY,
                credential(std::env::var(ENV_API_KEY).is_ok_and(|v| !v.is_empty()))
            );
            println!(
                "  {} = {}",
                ENV_ACCESS_TOKEN,
                credential(std::env::var(ENV_ACCESS_TOKEN).is_ok_and(|v| !v.is_empty()))
            );
            println!();

            if !config_path.exists() {
                println!("Run 'revhook config init' to create a revhook.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let mut warnings = Vec::new();
            if config_path.exists() {
                warnings.extend(RevhookToml::load(&config_path)?.validate());
            } else {
                println!("No revhook.toml found. Using defaults.");
            }
            let file = config_path.exists().then_some(config_path.as_path());
            if let Err(e) = Config::load(project_dir, file, None, false) {
                warnings.push(format!("{:#}", e));
            }

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("revhook.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::create_dir_all(revhook_dir.join("prompts"))?;

            RevhookToml::default().save(&config_path)?;

            println!("Created revhook.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [chat] model, send_by_proxy, max_tokens");
            println!("  - [prompt] custom_instructions, include_extensions");
            println!("  - [security] security_regex");
            println!("  - [run] cursor_policy, fail_on_findings");
            println!();
            println!("Task templates can be overridden in {}", revhook_dir.join("prompts").display());
            println!();
        }
    }

    Ok(())
}
