//! Decision Collaborator
//!
//! The language model behind a sequential agent is reached only through
//! [`LlmClient`]. Its reply must contain one JSON object naming the next
//! tool call; anything around that object (prose, code fences) is ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{HelmError, Result};
use crate::tool::Arguments;

/// Tool name a decision uses to end the loop with an answer.
pub const FINISH_TOOL: &str = "finish";

/// Instructions sent as the system prompt on every turn.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant designed to respond with a JSON object.
Your goal is to select the single best tool to make progress on the user's request and determine the arguments for it.
Respond with a single, valid JSON object with the keys 'thought', 'confidence', 'tool_name' and 'arguments'.
When the task is done, use tool_name 'finish' with an 'answer' argument.
Do not add any other text, explanations, or markdown formatting.";

/// Something that answers a prompt pair with text.
pub trait LlmClient: Send + Sync {
    fn predict(&self, system_prompt: &str, user_prompt: &str) -> std::result::Result<String, String>;
}

impl<F> LlmClient for F
where
    F: Fn(&str, &str) -> std::result::Result<String, String> + Send + Sync,
{
    fn predict(&self, system_prompt: &str, user_prompt: &str) -> std::result::Result<String, String> {
        self(system_prompt, user_prompt)
    }
}

/// One parsed choice of the next tool call.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Decision {
    pub tool_name: String,

    pub arguments: Arguments,

    #[serde(default)]
    pub thought: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Decision {
    /// Parses the JSON object spanning the first `{` to the last `}` of a
    /// model response.
    ///
    /// # Example
    ///
    /// ```
    /// use agenthelm::agent::Decision;
    ///
    /// let reply = "Sure!\n```json\n{\"tool_name\": \"get_order\", \"arguments\": {\"order_id\": \"A1\"}}\n```";
    /// let decision = Decision::parse(reply).unwrap();
    /// assert_eq!(decision.tool_name, "get_order");
    /// ```
    pub fn parse(response: &str) -> Result<Self> {
        let (start, end) = match (response.find('{'), response.rfind('}')) {
            (Some(start), Some(end)) if start < end => (start, end),
            _ => {
                return Err(HelmError::InvalidDecision(format!(
                    "no JSON object in response: {}",
                    response.trim()
                )))
            }
        };

        let decision: Decision = serde_json::from_str(&response[start..=end])
            .map_err(|e| HelmError::InvalidDecision(e.to_string()))?;

        if decision.tool_name.trim().is_empty() {
            return Err(HelmError::InvalidDecision("empty tool_name".to_string()));
        }

        Ok(decision)
    }

    pub fn is_finish(&self) -> bool {
        self.tool_name == FINISH_TOOL
    }

    /// The final answer of a `finish` decision. Non-string answers are
    /// rendered as JSON.
    pub fn answer(&self) -> Result<String> {
        match self.arguments.get("answer") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(HelmError::InvalidDecision(
                "finish decision without an 'answer' argument".to_string(),
            )),
        }
    }
}

/// Builds the per-turn user prompt from the tool descriptions, the task and
/// the observations so far.
pub fn build_user_prompt(tools: &str, task: &str, history: &[String]) -> String {
    let mut prompt = format!(
        "Here are the available tools:\n---\n{}---\nUser's request: \"{}\"\n",
        tools, task
    );

    if history.is_empty() {
        prompt.push_str("\nNo tools have been called yet.\n");
    } else {
        prompt.push_str("\nPrevious steps:\n");
        for entry in history {
            prompt.push_str(entry);
            prompt.push('\n');
        }
    }

    prompt
}
