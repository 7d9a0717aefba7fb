//! Trace-id propagation across asynchronous call chains.
//!
//! [`TraceContext`] carries a trace id, a span id, an optional parent span
//! id, a start time, and a free-form attribute map. [`with_trace_context`]
//! installs a context as "current" for the duration of an async block,
//! including any descendant `.await`s in the same task; nesting restores
//! the outer context on exit. A sibling task spawned outside the block
//! never observes it — this is `tokio::task_local!`'s scoping, which is the
//! cooperative-async propagation primitive this crate relies on instead of
//! a global mutable context.

use std::collections::HashMap;
use std::future::Future;

use rand::RngCore;
use serde::{Deserialize, Serialize};

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// An attribute value attached to a trace or span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string attribute.
    String(String),
    /// A numeric attribute.
    Number(f64),
    /// A boolean attribute.
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A trace/span correlation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceContext {
    /// 128-bit trace id, lowercase hex (32 chars).
    pub trace_id: String,
    /// 64-bit span id, lowercase hex (16 chars).
    pub span_id: String,
    /// The parent span id, if this is a child span.
    pub parent_span_id: Option<String>,
    /// Epoch milliseconds when the span started.
    pub started_at: i64,
    /// Free-form attributes.
    pub attributes: HashMap<String, AttributeValue>,
}

/// Generate a 128-bit trace id as 32 lowercase hex characters.
#[must_use]
pub fn generate_trace_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a 64-bit span id as 16 lowercase hex characters.
#[must_use]
pub fn generate_span_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Create a new root trace context with a fresh trace id and span id.
#[must_use]
pub fn create_trace_context(attributes: HashMap<String, AttributeValue>) -> TraceContext {
    TraceContext {
        trace_id: generate_trace_id(),
        span_id: generate_span_id(),
        parent_span_id: None,
        started_at: now_epoch_ms(),
        attributes,
    }
}

/// Create a child span under `parent`. The child inherits `trace_id` and
/// merges `parent`'s attributes with its own (child keys win on conflict).
#[must_use]
pub fn create_child_span(
    parent: &TraceContext,
    attributes: HashMap<String, AttributeValue>,
) -> TraceContext {
    let mut merged = parent.attributes.clone();
    merged.extend(attributes);
    TraceContext {
        trace_id: parent.trace_id.clone(),
        span_id: generate_span_id(),
        parent_span_id: Some(parent.span_id.clone()),
        started_at: now_epoch_ms(),
        attributes: merged,
    }
}

/// Run `fut` with `ctx` installed as the current trace context.
///
/// Any `current_trace_context()` call lexically inside `fut` (including
/// through nested async calls in the same task) observes `ctx`. The outer
/// context, if any, is restored once `fut` completes.
pub async fn with_trace_context<F, T>(ctx: TraceContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT.scope(ctx, fut).await
}

/// Read the currently installed trace context, if any.
#[must_use]
pub fn current_trace_context() -> Option<TraceContext> {
    CURRENT.try_with(Clone::clone).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_is_32_hex_chars() {
        let id = generate_trace_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn span_id_is_16_hex_chars() {
        let id = generate_span_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn child_span_inherits_trace_id_and_merges_attributes() {
        let mut parent_attrs = HashMap::new();
        parent_attrs.insert("a".to_string(), AttributeValue::from("parent"));
        parent_attrs.insert("shared".to_string(), AttributeValue::from("parent"));
        let parent = create_trace_context(parent_attrs);

        let mut child_attrs = HashMap::new();
        child_attrs.insert("shared".to_string(), AttributeValue::from("child"));
        let child = create_child_span(&parent, child_attrs);

        assert_eq!(child.trace_id, parent.trace_id);
        assert_eq!(child.parent_span_id, Some(parent.span_id));
        assert_eq!(child.attributes.get("a"), Some(&AttributeValue::from("parent")));
        assert_eq!(child.attributes.get("shared"), Some(&AttributeValue::from("child")));
    }

    #[tokio::test]
    async fn no_context_outside_any_scope() {
        assert!(current_trace_context().is_none());
    }

    #[tokio::test]
    async fn current_trace_context_reflects_installed_scope() {
        let ctx = create_trace_context(HashMap::new());
        let trace_id = ctx.trace_id.clone();
        with_trace_context(ctx, async move {
            let current = current_trace_context().expect("context installed");
            assert_eq!(current.trace_id, trace_id);
        })
        .await;
        assert!(current_trace_context().is_none());
    }

    #[tokio::test]
    async fn nesting_restores_outer_context_on_exit() {
        let outer = create_trace_context(HashMap::new());
        let outer_id = outer.trace_id.clone();
        with_trace_context(outer, async move {
            let inner = create_trace_context(HashMap::new());
            let inner_id = inner.trace_id.clone();
            with_trace_context(inner, async move {
                assert_eq!(current_trace_context().unwrap().trace_id, inner_id);
            })
            .await;
            assert_eq!(current_trace_context().unwrap().trace_id, outer_id);
        })
        .await;
    }

    #[tokio::test]
    async fn sibling_task_does_not_observe_scope() {
        let ctx = create_trace_context(HashMap::new());
        with_trace_context(ctx, async move {
            let sibling = tokio::spawn(async { current_trace_context() }).await.unwrap();
            assert!(sibling.is_none());
        })
        .await;
    }
}
