mod connected;
mod openapi;

pub use connected::ConnectedTool;
pub use openapi::{bind_external_tool, load_api_document, ExternalTool};

/// Name the orchestrator sees for the image generation tool
pub const IMAGE_TOOL_NAME: &str = "generate_image";

pub const IMAGE_TOOL_DESCRIPTION: &str = "Generate high-quality images from a text prompt. \
Use this tool when the image concept agent has provided visual concepts and actual images are needed. \
The tool accepts prompts and returns URLs to generated images.";
