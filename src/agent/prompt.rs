//! Prompt construction for the agent loop
//!
//! Each iteration gets one prompt assembled from the task, the tool
//! listing, recalled memory, caller context, and the scratchpad of steps so
//! far. The assembly is deterministic: same inputs, same prompt.

use crate::error::Error;
use crate::tools::ToolInfo;
use crate::trace::{Step, StepAction};
use handlebars::Handlebars;
use serde_json::json;
use std::collections::HashMap;

const AGENT_TEMPLATE: &str = "\
You are a helpful AI assistant that can use tools to find information and answer questions.

Available Tools:
{{#each tools}}
- {{name}}: {{description}}
{{/each}}

To use a tool, respond with a JSON object in this format:
{\"tool\": \"tool_name\", \"input\": \"what to pass to the tool\"}

To provide a final answer, respond with a JSON object in this format:
{\"final_answer\": \"your detailed response\"}
{{#if memory}}

Recalled Context:
{{memory}}
{{/if}}
{{#if context}}

Caller Context:
{{#each context}}
- {{@key}}: {{this}}
{{/each}}
{{/if}}

User Query: {{task}}
{{#if scratchpad}}

Progress so far:
{{#each scratchpad}}
{{this}}

{{/each}}
{{/if}}

Think step by step:
1. Do you need to use any tools to answer this question?
2. If yes, which tool would be most helpful?
3. If no, can you provide a final answer based on what you know so far?

Respond with exactly one tool call or one final answer in the JSON format specified above:";

/// Builds iteration prompts from execution state
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, Error> {
        let mut registry = Handlebars::new();
        // Prompts are plain text, not HTML.
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string("agent", AGENT_TEMPLATE)
            .map_err(|e| Error::Template(e.to_string()))?;

        Ok(Self { registry })
    }

    /// Assemble the prompt for the next iteration
    pub fn build(
        &self,
        task: &str,
        context: Option<&HashMap<String, String>>,
        tools: &[ToolInfo],
        memory: Option<&str>,
        steps: &[Step],
    ) -> Result<String, Error> {
        let tools: Vec<_> = tools
            .iter()
            .map(|t| json!({"name": t.name, "description": t.description}))
            .collect();

        let scratchpad: Vec<String> = steps.iter().map(render_step).collect();

        let data = json!({
            "task": task,
            "tools": tools,
            "memory": memory,
            "context": context,
            "scratchpad": scratchpad,
        });

        self.registry
            .render("agent", &data)
            .map_err(|e| Error::Template(e.to_string()))
    }
}

/// One scratchpad entry per step, in the thought/action/observation shape
/// the model is asked to continue from.
fn render_step(step: &Step) -> String {
    let mut lines = Vec::new();

    if !step.thought.is_empty() {
        match step.action {
            StepAction::ParseFailure { .. } => {}
            _ => lines.push(format!("Thought: {}", step.thought)),
        }
    }

    match &step.action {
        StepAction::ToolCall {
            tool_name,
            tool_input,
        } => {
            lines.push(format!("Action: {}", tool_name));
            lines.push(format!("Action Input: {}", tool_input));
        }
        StepAction::FinalAnswer { content } => {
            lines.push(format!("Final Answer: {}", content));
        }
        StepAction::ParseFailure { message } => {
            lines.push(format!(
                "Your previous response could not be interpreted: {}. \
                 Respond with exactly one JSON object.",
                message
            ));
        }
    }

    if let Some(observation) = &step.observation {
        lines.push(format!("Observation: {}", observation.content));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Observation;
    use chrono::Utc;

    fn tool_infos() -> Vec<ToolInfo> {
        vec![
            ToolInfo {
                name: "search".to_string(),
                description: "Search the web".to_string(),
            },
            ToolInfo {
                name: "wikipedia".to_string(),
                description: "Look up encyclopedia articles".to_string(),
            },
        ]
    }

    #[test]
    fn prompt_lists_tools_in_registration_order() {
        let builder = PromptBuilder::new().unwrap();
        let prompt = builder
            .build("what is rust", None, &tool_infos(), None, &[])
            .unwrap();

        let search_pos = prompt.find("- search:").unwrap();
        let wiki_pos = prompt.find("- wikipedia:").unwrap();
        assert!(search_pos < wiki_pos);
        assert!(prompt.contains("User Query: what is rust"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let builder = PromptBuilder::new().unwrap();
        let a = builder
            .build("task", None, &tool_infos(), Some("prior"), &[])
            .unwrap();
        let b = builder
            .build("task", None, &tool_infos(), Some("prior"), &[])
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scratchpad_includes_observations() {
        let builder = PromptBuilder::new().unwrap();
        let steps = vec![Step {
            index: 1,
            thought: "need data".to_string(),
            action: StepAction::ToolCall {
                tool_name: "search".to_string(),
                tool_input: "rust".to_string(),
            },
            observation: Some(Observation::success("rust is a language")),
            timestamp: Utc::now(),
            duration_ms: 4,
        }];

        let prompt = builder
            .build("task", None, &tool_infos(), None, &steps)
            .unwrap();
        assert!(prompt.contains("Thought: need data"));
        assert!(prompt.contains("Action: search"));
        assert!(prompt.contains("Observation: rust is a language"));
    }

    #[test]
    fn parse_failures_ask_for_correction() {
        let builder = PromptBuilder::new().unwrap();
        let steps = vec![Step {
            index: 1,
            thought: "gibberish output".to_string(),
            action: StepAction::ParseFailure {
                message: "no recognizable tool call or final answer".to_string(),
            },
            observation: Some(Observation::success("")),
            timestamp: Utc::now(),
            duration_ms: 2,
        }];

        let prompt = builder.build("task", None, &[], None, &steps).unwrap();
        assert!(prompt.contains("could not be interpreted"));
    }

    #[test]
    fn memory_and_context_sections_are_optional() {
        let builder = PromptBuilder::new().unwrap();
        let bare = builder.build("task", None, &[], None, &[]).unwrap();
        assert!(!bare.contains("Recalled Context:"));
        assert!(!bare.contains("Caller Context:"));

        let mut context = HashMap::new();
        context.insert("purpose".to_string(), "research".to_string());
        let full = builder
            .build("task", Some(&context), &[], Some("earlier findings"), &[])
            .unwrap();
        assert!(full.contains("Recalled Context:\nearlier findings"));
        assert!(full.contains("- purpose: research"));
    }
}
