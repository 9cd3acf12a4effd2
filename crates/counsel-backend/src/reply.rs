//! Tagged classification and normalization of AI backend replies.
//!
//! The inference service returns a different JSON shape per endpoint and
//! offers no explicit type tag. `BackendReply::classify` performs the
//! structural sniff exactly once, at the call boundary; downstream code
//! matches on the variant and never re-checks field presence.
//!
//! Normalization never fails: malformed or empty replies degrade to a
//! fixed placeholder string and an empty tool summary. Availability of
//! display text wins over strictness here.

use serde_json::Value;
use tracing::warn;

use counsel_core::types::ToolUsage;

/// Returned when no usable text can be extracted from a reply.
pub const PLACEHOLDER_TEXT: &str = "AI response received but content could not be extracted.";

/// One recorded reasoning step from the agent.
#[derive(Clone, Debug)]
pub struct IntermediateStep {
    pub tool: Option<String>,
    pub result: Option<Value>,
}

/// Reply to `upload-and-chat`: a freshly assigned document id plus the
/// agent's formatted response.
#[derive(Clone, Debug)]
pub struct UploadAndChatReply {
    pub agent_response: Option<Value>,
    pub document_id: Option<String>,
    pub session_id: Option<String>,
    pub tools_used: Vec<String>,
    pub intermediate_steps: Vec<IntermediateStep>,
}

/// Reply to `agent/chat`: carries a session id, never a document id.
#[derive(Clone, Debug)]
pub struct AgentChatReply {
    pub response: Option<Value>,
    pub session_id: Option<String>,
    pub tools_used: Vec<String>,
    pub intermediate_steps: Vec<IntermediateStep>,
}

/// Reply to plain `chat`: text only, no affinity fields.
#[derive(Clone, Debug)]
pub struct PlainChatReply {
    pub response: Option<Value>,
    pub message: Option<String>,
    pub text: Option<String>,
    pub answer: Option<String>,
}

/// A classified backend reply.
#[derive(Clone, Debug)]
pub enum BackendReply {
    Plain(PlainChatReply),
    Agent(AgentChatReply),
    Upload(UploadAndChatReply),
}

/// Aggregated per-tool invocation records for assistant-message metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolSummary {
    pub tools_used: Vec<ToolUsage>,
    /// Sum of per-tool latencies, rounded to 2 decimals. Absent when zero.
    pub total_query_time_ms: Option<f64>,
    /// Max total-chunk count across invocations. Absent when zero.
    pub total_chunks: Option<u64>,
}

fn str_field(value: &Value, name: &str) -> Option<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: &Value, name: &str) -> Vec<String> {
    value
        .get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn step_list(value: &Value) -> Vec<IntermediateStep> {
    value
        .get("intermediate_steps")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|step| IntermediateStep {
                    tool: step.get("tool").and_then(Value::as_str).map(str::to_string),
                    result: step.get("result").cloned(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// True for null and blank strings: values that cannot stand as reply text.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Turn a candidate text value into display text.
///
/// Strings pass through. Objects prefer a nested `answer` (with an
/// appended sources section when present), then a nested `response`, and
/// finally their JSON serialization. Null and blank strings yield None.
fn render_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            if s.trim().is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Value::Object(map) => {
            if let Some(answer) = map.get("answer").and_then(Value::as_str) {
                let mut content = answer.to_string();
                if let Some(sources) = map.get("sources") {
                    content.push_str("\n\n**Sources:**\n");
                    match sources.as_str() {
                        Some(s) => content.push_str(s),
                        None => content.push_str(&sources.to_string()),
                    }
                }
                Some(content)
            } else if let Some(nested) = map.get("response") {
                match nested.as_str() {
                    Some(s) => Some(s.to_string()),
                    None => Some(nested.to_string()),
                }
            } else {
                Some(value.to_string())
            }
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl BackendReply {
    /// Structurally classify a raw backend reply.
    ///
    /// Presence of both a document id and an agent response marks the
    /// upload variant; a session id without a document id marks the agent
    /// variant; everything else (including non-object values) is plain.
    pub fn classify(value: &Value) -> Self {
        if value.get("document_id").is_some() && value.get("agent_response").is_some() {
            BackendReply::Upload(UploadAndChatReply {
                agent_response: value.get("agent_response").cloned(),
                document_id: str_field(value, "document_id"),
                session_id: str_field(value, "session_id"),
                tools_used: string_list(value, "tools_used"),
                intermediate_steps: step_list(value),
            })
        } else if value.get("session_id").is_some() && value.get("document_id").is_none() {
            BackendReply::Agent(AgentChatReply {
                response: value.get("response").cloned(),
                session_id: str_field(value, "session_id"),
                tools_used: string_list(value, "tools_used"),
                intermediate_steps: step_list(value),
            })
        } else {
            BackendReply::Plain(PlainChatReply {
                response: value.get("response").cloned(),
                message: str_field(value, "message"),
                text: str_field(value, "text"),
                answer: str_field(value, "answer"),
            })
        }
    }

    fn steps(&self) -> &[IntermediateStep] {
        match self {
            BackendReply::Upload(r) => &r.intermediate_steps,
            BackendReply::Agent(r) => &r.intermediate_steps,
            BackendReply::Plain(_) => &[],
        }
    }

    fn tool_names(&self) -> &[String] {
        match self {
            BackendReply::Upload(r) => &r.tools_used,
            BackendReply::Agent(r) => &r.tools_used,
            BackendReply::Plain(_) => &[],
        }
    }

    /// Extract display text. Never empty, never an error.
    ///
    /// Order: primary text field -> first intermediate step's result ->
    /// (plain variant only) message/text/answer -> fixed placeholder.
    pub fn text(&self) -> String {
        let primary = match self {
            BackendReply::Upload(r) => r.agent_response.as_ref(),
            BackendReply::Agent(r) => r.response.as_ref(),
            BackendReply::Plain(r) => r.response.as_ref(),
        };

        let effective = match primary {
            Some(value) if !is_blank(value) => Some(value.clone()),
            _ => self.steps().first().and_then(|step| step.result.clone()),
        };

        if let Some(value) = effective {
            if let Some(text) = render_text(&value) {
                return text;
            }
        }

        if let BackendReply::Plain(r) = self {
            for candidate in [&r.message, &r.text, &r.answer].into_iter().flatten() {
                if !candidate.trim().is_empty() {
                    return candidate.clone();
                }
            }
        }

        warn!("No usable text in backend reply; returning placeholder");
        PLACEHOLDER_TEXT.to_string()
    }

    /// Session affinity token, when this variant carries one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            BackendReply::Upload(r) => r.session_id.as_deref(),
            BackendReply::Agent(r) => r.session_id.as_deref(),
            BackendReply::Plain(_) => None,
        }
    }

    /// Document id, only ever present on the upload variant.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            BackendReply::Upload(r) => r.document_id.as_deref(),
            _ => None,
        }
    }

    /// Aggregate the per-tool invocation records.
    ///
    /// When no structured records exist the summary falls back to the
    /// bare tool-name list; totals are omitted rather than reported as 0.
    pub fn tool_summary(&self) -> ToolSummary {
        let mut tools: Vec<ToolUsage> = self
            .steps()
            .iter()
            .map(|step| {
                let mut usage = ToolUsage {
                    tool: step
                        .tool
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    ..ToolUsage::default()
                };
                if let Some(Value::Object(result)) = &step.result {
                    usage.query_time_ms = result.get("query_time").and_then(Value::as_f64);
                    usage.chunks_used = result.get("chunks_used").and_then(Value::as_u64);
                    usage.total_chunks = result.get("total_chunks").and_then(Value::as_u64);
                }
                usage
            })
            .collect();

        let mut total_time = 0.0;
        let mut max_chunks = 0u64;
        for usage in &tools {
            if let Some(time) = usage.query_time_ms {
                total_time += time;
            }
            if let Some(chunks) = usage.total_chunks {
                max_chunks = max_chunks.max(chunks);
            }
        }

        if tools.is_empty() {
            tools = self
                .tool_names()
                .iter()
                .map(|name| ToolUsage {
                    tool: name.clone(),
                    ..ToolUsage::default()
                })
                .collect();
        }

        ToolSummary {
            tools_used: tools,
            total_query_time_ms: (total_time > 0.0).then(|| (total_time * 100.0).round() / 100.0),
            total_chunks: (max_chunks > 0).then_some(max_chunks),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
