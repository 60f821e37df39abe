//! Content block → Interactions API wire conversion.

use gale_core::ContentBlock;
use gale_llm::ModelRequest;
use gale_tools::ToolDefinition;
use serde_json::Value;

use crate::types::{FunctionTool, InputContent, InteractionRequest, TextPart};

/// Convert engine content blocks into wire input items.
pub fn convert_input(blocks: &[ContentBlock]) -> Vec<InputContent> {
    blocks.iter().map(convert_block).collect()
}

fn convert_block(block: &ContentBlock) -> InputContent {
    match block {
        ContentBlock::Text { text } => InputContent::Text { text: text.clone() },
        ContentBlock::ThoughtSummary { summary, signature } => InputContent::Thought {
            signature: signature.clone(),
            summary: if summary.is_empty() {
                Vec::new()
            } else {
                vec![TextPart {
                    kind: "text".into(),
                    text: summary.clone(),
                }]
            },
        },
        ContentBlock::FunctionCall(call) => InputContent::FunctionCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: Value::Object(call.arguments.clone()),
        },
        ContentBlock::FunctionResult(result) => InputContent::FunctionResult {
            call_id: result.call_id.clone(),
            name: result.name.clone(),
            result: result.result.clone(),
            is_error: result.is_error,
        },
    }
}

/// Convert tool schemas into function declarations.
pub fn convert_tools(tools: &[ToolDefinition]) -> Vec<FunctionTool> {
    tools
        .iter()
        .map(|t| FunctionTool {
            kind: "function",
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.parameters.clone(),
        })
        .collect()
}

/// Build the request body for one model call.
pub fn build_request(request: &ModelRequest) -> InteractionRequest {
    InteractionRequest {
        model: request.model.clone(),
        input: convert_input(&request.input),
        tools: convert_tools(&request.tools),
        system_instruction: request
            .system_instruction
            .clone()
            .filter(|s| !s.trim().is_empty()),
        previous_interaction_id: request.interaction_id.clone(),
        stream: true,
    }
}
