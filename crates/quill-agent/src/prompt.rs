use std::fmt::Write;

use quill_core::canvas::ResolvedResource;

use crate::state::WorkState;

const BASE_INSTRUCTION: &str = "You are a professional blog content creator. Your role is to:
1. Write engaging blog posts with well-structured content and compelling titles
2. Create infographics to visualize key concepts when appropriate
3. Search for references when the post needs supporting material

Use WriteBlogPost to change the post. Use one Generate tool per infographic.
Use DeleteResources only when the user asks to remove references; the user confirms before anything is removed.";

/// Build the chat node's system instruction from the current canvas.
///
/// `resources` carries only the resources whose content fetched successfully.
pub fn system_prompt(
    operator_prefix: Option<&str>,
    state: &WorkState,
    resources: &[ResolvedResource],
) -> String {
    let mut prompt = String::new();

    if let Some(prefix) = operator_prefix.filter(|p| !p.trim().is_empty()) {
        prompt.push_str(prefix.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str(BASE_INSTRUCTION);

    prompt.push_str("\n\n## Current blog post\n");
    let _ = writeln!(prompt, "Title: {}", state.document.title);
    let _ = writeln!(prompt, "Content:\n{}", state.document.content);

    prompt.push_str("\n## Current infographics\n");
    if state.artifacts.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for artifact in state.artifacts.iter() {
            let json = serde_json::to_string(artifact).unwrap_or_default();
            let _ = writeln!(prompt, "- {}", json);
        }
    }

    prompt.push_str("\n## Available resources\n");
    if resources.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        prompt.push_str(&serde_json::to_string_pretty(resources).unwrap_or_default());
        prompt.push('\n');
    }

    prompt
}
