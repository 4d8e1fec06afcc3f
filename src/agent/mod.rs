mod extractor;
mod factory;
mod orchestrator;
mod runner;

pub use orchestrator::{CampaignResult, CreatedResources, Orchestrator};
pub use runner::PollPolicy;

/// User message that asks the orchestrator for a campaign
pub fn campaign_task(product: &str) -> String {
    format!("Generate campaign strategy, content for {}", product.trim())
}
