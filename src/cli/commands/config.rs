use tracing::info;

use crate::cli::ConfigAction;
use crate::config::{ConfigManager, InsightConfig};
use crate::error::{InsightError, InsightResult};

pub async fn handle_config(manager: &ConfigManager, config: &InsightConfig, action: ConfigAction) -> InsightResult<()> {
    match action {
        ConfigAction::Show => {
            // API keys are never serialized
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| InsightError::config(format!("Failed to render config: {}", e)))?;
            if let Some(path) = manager.path() {
                println!("# {}", path.display());
            }
            println!("{}", rendered);
        }
        ConfigAction::Init { force } => {
            let path = manager
                .path()
                .ok_or_else(|| InsightError::config("No configuration directory available"))?;

            if path.exists() && !force {
                return Err(InsightError::config(format!(
                    "{} already exists, pass --force to overwrite",
                    path.display()
                )));
            }

            manager.save_config(&InsightConfig::default()).await?;
            info!("Wrote default configuration to {}", path.display());
            println!("✅ Wrote {}", path.display());
        }
    }

    Ok(())
}
