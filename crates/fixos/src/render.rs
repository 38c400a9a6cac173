//! Tool-result rendering: deciding which component (if any) to display for
//! an assistant message, matched against the tool results present in the
//! thread. Kept as pure functions over an ordered message snapshot so the
//! same thread state always produces the same decision.

use serde_json::{Map, Value};

use crate::models::{Message, Role, ToolCall};
use crate::registry::ComponentRegistry;

/// Declares that `subordinate`'s component must not render whenever a call
/// to `superseding` appears anywhere in the same thread. The two tools are
/// alternative representations of the same underlying event.
#[derive(Debug, Clone)]
pub struct SuppressionRule {
    pub subordinate: String,
    pub superseding: String,
}

/// A tool whose component renders immediately while the result is pending,
/// e.g. an audio-capture card that means "now collecting input". Request
/// parameters are merged over `defaults`.
#[derive(Debug, Clone)]
pub struct LiveTool {
    pub tool: String,
    pub defaults: Value,
}

/// Data-driven rendering policy: suppression pairs plus live-tool defaults.
#[derive(Debug, Clone, Default)]
pub struct RenderPolicy {
    pub suppression: Vec<SuppressionRule>,
    pub live: Vec<LiveTool>,
}

impl RenderPolicy {
    fn is_suppressed(&self, tool: &str, thread: &[Message]) -> bool {
        let superseding: Vec<&str> = self
            .suppression
            .iter()
            .filter(|rule| rule.subordinate == tool)
            .map(|rule| rule.superseding.as_str())
            .collect();
        if superseding.is_empty() {
            return false;
        }

        thread.iter().any(|message| {
            message
                .tool_call()
                .is_some_and(|call| superseding.contains(&call.name.as_str()))
        })
    }

    fn live_defaults(&self, tool: &str) -> Option<&Value> {
        self.live
            .iter()
            .find(|live| live.tool == tool)
            .map(|live| &live.defaults)
    }
}

/// The component and props chosen for a message.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCard {
    pub component: String,
    pub props: Value,
    /// True when rendered from request parameters while the result is
    /// still pending.
    pub live: bool,
}

/// Decide what to render for the message at `index` in `thread`.
///
/// Returns `None` when there is nothing to render: the message is not an
/// assistant message, was already rendered by the hosting layer, carries no
/// well-formed tool call, maps to no component, is suppressed, or is still
/// waiting for a result without being a live tool.
pub fn resolve(
    thread: &[Message],
    index: usize,
    components: &ComponentRegistry,
    policy: &RenderPolicy,
) -> Option<RenderedCard> {
    let message = thread.get(index)?;
    if message.role != Role::Assistant {
        return None;
    }
    if message.rendered_component.is_some() {
        return None;
    }

    let call = message.tool_call()?;
    let component = components.find_by_tool_name(&call.name)?;

    if policy.is_suppressed(&call.name, thread) {
        return None;
    }

    if let Some(result) = find_tool_result(thread, index) {
        if let Some(props) = parse_result_payload(result) {
            return Some(RenderedCard {
                component: component.name.clone(),
                props,
                live: false,
            });
        }
        // An unparseable payload is treated the same as no result yet.
    }

    let defaults = policy.live_defaults(&call.name)?;
    Some(RenderedCard {
        component: component.name.clone(),
        props: merge_params(defaults, &call.parameters),
        live: true,
    })
}

/// Locate the tool-role message answering the request at `index`.
///
/// Scans strictly forward; the first tool-role message is the result,
/// unless another assistant message carrying its own tool call comes
/// first, in which case the next tool-role message belongs to that later
/// request and this one has no result yet. This keeps call/result pairing
/// FIFO even though the thread is a flat list.
pub fn find_tool_result<'a>(thread: &'a [Message], index: usize) -> Option<&'a Message> {
    for message in &thread[index + 1..] {
        if message.role == Role::Tool {
            return Some(message);
        }
        if message.role == Role::Assistant && message.tool_call().is_some() {
            return None;
        }
    }
    None
}

/// Extract the structured payload from a tool-role message. A structured
/// object is used as-is; string payloads are parsed as JSON; anything that
/// fails to parse yields `None`.
pub fn parse_result_payload(message: &Message) -> Option<Value> {
    for content in &message.content {
        if let Some(response) = content.as_tool_response() {
            if let Ok(value) = &response.tool_result {
                if value.is_object() {
                    return Some(value.clone());
                }
                if let Some(text) = value.as_str() {
                    if let Some(parsed) = parse_object(text) {
                        return Some(parsed);
                    }
                }
            }
        }
        if let Some(text) = content.as_text() {
            if let Some(parsed) = parse_object(text) {
                return Some(parsed);
            }
        }
    }
    None
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Merge request parameters over the live defaults, skipping parameters
/// that are not a JSON object field-by-field rather than failing the
/// whole render.
fn merge_params(defaults: &Value, parameters: &Value) -> Value {
    let mut props: Map<String, Value> = defaults
        .as_object()
        .cloned()
        .unwrap_or_default();
    if let Some(fields) = parameters.as_object() {
        for (name, value) in fields {
            props.insert(name.clone(), value.clone());
        }
    }
    Value::Object(props)
}
