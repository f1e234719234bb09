// Collaborator interfaces for the backend and the host's dialog layer.
//
// The board never talks to the network directly. Everything goes through these two traits
// so the orchestrator can be driven by fakes in tests and by the host's real services in
// production.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[cfg(test)]
use mockall::automock;

/// A search domain, e.g. `[["user_id", "=", 7]]`
pub type Domain = Vec<Value>;

/// Remote model access
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteCall: Send + Sync {
    /// Read the `fields` of the records of `model` matching `domain`, in backend order
    async fn search_read(
        &self,
        model: &str,
        domain: Domain,
        fields: Vec<String>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>>;

    /// Invoke `method` on `model` with positional `args` and a call context
    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        context: Map<String, Value>,
    ) -> Result<Value>;
}

/// Presents an action description (usually a modal form) to the user.
///
/// The returned future resolves once, when the action is dismissed:
/// - `None` when the dialog was closed without a result
/// - `Some({"special": true, ..})` when the cancel button was used
/// - `Some(result)` with the save result otherwise
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ActionPresenter: Send + Sync {
    async fn do_action(&self, action: Value) -> Result<Option<Value>>;
}

/// Truthiness of a backend value: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
