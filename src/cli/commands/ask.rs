use tracing::info;

use crate::assistant::Assistant;
use crate::cli::repl::{backend_title, print_reply};
use crate::cli::ChatOptions;
use crate::config::InsightConfig;
use crate::error::InsightResult;

pub async fn handle_ask(mut config: InsightConfig, question: String, options: ChatOptions) -> InsightResult<()> {
    options.apply(&mut config);

    let assistant = Assistant::from_config(&config).await;
    let reply = assistant.respond(&options.thread, &question).await?;
    info!("Answered as {} with {} tool call(s)", reply.intent, reply.tools_used.len());

    print_reply(&backend_title(&config), &reply);
    Ok(())
}
