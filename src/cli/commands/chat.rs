use std::sync::Arc;
use tracing::warn;

use crate::assistant::{Assistant, GraphStatus};
use crate::cli::repl::{backend_title, Repl};
use crate::cli::ChatOptions;
use crate::config::InsightConfig;
use crate::error::InsightResult;

pub async fn handle_chat(mut config: InsightConfig, options: ChatOptions) -> InsightResult<()> {
    options.apply(&mut config);

    let assistant = Arc::new(Assistant::from_config(&config).await);
    if let GraphStatus::Unavailable(reason) = assistant.status().await {
        warn!("Assistant is {}; set GOOGLE_API_KEY, ANTHROPIC_API_KEY or OPENAI_API_KEY", reason);
    }

    Repl::new(assistant, options.thread)
        .with_title(backend_title(&config))
        .run()
        .await
}
