//! Interpretation of the provider's reply.

use serde::{Deserialize, Serialize};

/// Summary split into named sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSummary {
    /// One-paragraph overview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executive_summary: Option<String>,
    /// Main points, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    /// Decisions taken, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Vec<String>>,
    /// Follow-up tasks, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_items: Option<Vec<String>>,
}

impl StructuredSummary {
    fn is_empty(&self) -> bool {
        self.executive_summary.is_none()
            && self.key_points.is_none()
            && self.decisions.is_none()
            && self.action_items.is_none()
    }
}

/// Summary returned to the caller.
///
/// Serializes untagged: a JSON object for [`SummaryResult::Structured`] and a JSON string for
/// [`SummaryResult::PlainText`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SummaryResult {
    /// Sectioned summary recognised in the provider's reply.
    Structured(StructuredSummary),
    /// Free-form reply, passed through verbatim.
    PlainText(String),
}

impl SummaryResult {
    /// Classify the provider's reply.
    ///
    /// A reply is structured only when it is a JSON object (bare or inside a Markdown code
    /// fence) whose fields have the expected types and that carries at least one known section.
    /// Anything else is kept as plain text, unchanged.
    pub fn from_response(text: String) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(strip_code_fence(&text))
            .ok()
            .filter(serde_json::Value::is_object)
            .and_then(|value| serde_json::from_value::<StructuredSummary>(value).ok());
        match parsed {
            Some(structured) if !structured.is_empty() => Self::Structured(structured),
            _ => Self::PlainText(text),
        }
    }

    /// Render the summary as plain text, the way the upload form displays it.
    pub fn render_text(&self) -> String {
        let summary = match self {
            Self::PlainText(text) => return text.clone(),
            Self::Structured(summary) => summary,
        };

        let mut output = String::new();
        if let Some(executive) = summary.executive_summary.as_deref().filter(|s| !s.is_empty()) {
            output.push_str("Executive Summary:\n");
            output.push_str(executive);
            output.push_str("\n\n");
        }
        push_section(&mut output, "Key Points", summary.key_points.as_deref());
        push_section(&mut output, "Decisions", summary.decisions.as_deref());
        push_section(&mut output, "Action Items", summary.action_items.as_deref());
        output.trim().to_string()
    }
}

fn push_section(output: &mut String, title: &str, items: Option<&[String]>) {
    let Some(items) = items.filter(|items| !items.is_empty()) else {
        return;
    };
    output.push_str(title);
    output.push_str(":\n- ");
    output.push_str(&items.join("\n- "));
    output.push_str("\n\n");
}

/// Strip a surrounding ```` ``` ```` or ```` ```json ```` fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.trim()
}
