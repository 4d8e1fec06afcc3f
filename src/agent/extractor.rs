use serde::Serialize;

use crate::platform::{Citation, MessageRole, ThreadMessage};

/// The orchestrator's final answer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reply {
    pub text: Option<String>,
    pub citations: Vec<Citation>,
}

/// Take the first assistant message in platform order (newest first)
pub fn extract_reply(messages: &[ThreadMessage]) -> Reply {
    let Some(message) = messages.iter().find(|m| m.role == MessageRole::Assistant) else {
        return Reply::default();
    };

    let joined = message.text.join("\n");
    let text = joined.trim();

    Reply {
        text: (!text.is_empty()).then(|| text.to_string()),
        citations: message.citations.clone(),
    }
}
