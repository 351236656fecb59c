use crate::config::InsightConfig;
use crate::error::InsightResult;

pub async fn handle_keys(config: &InsightConfig) -> InsightResult<()> {
    println!("API keys:");
    for (service, present) in config.api_key_status() {
        let icon = if present { "✅" } else { "❌" };
        let state = if present { "configured" } else { "missing" };
        println!("  {} {:<10} {}", icon, service, state);
    }

    Ok(())
}
