use crate::config::InsightConfig;
use crate::error::InsightResult;
use crate::tools::ToolRegistry;

pub async fn handle_tools(config: &InsightConfig) -> InsightResult<()> {
    let registry = ToolRegistry::with_default_tools(config);

    println!("Available tools ({} backend, chain {}):", config.backend, config.insight.chain_id);
    for (name, description) in registry.list_tools() {
        let summary = description.lines().next().unwrap_or_default();
        println!("  • {:<24} {}", name, summary);
    }

    Ok(())
}
