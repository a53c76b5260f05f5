//! Command channel abstraction
//!
//! A [`CommandChannel`] evaluates one JavaScript expression inside the
//! embedded engine and returns its result. Implementations must run
//! requests one at a time and in submission order.

use async_trait::async_trait;

use crate::error::Result;
use crate::value::ScriptValue;

#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Evaluate `expression` and decode its completion value
    ///
    /// Exceptions and syntax errors surface as
    /// [`Error::RemoteEvaluation`](crate::Error::RemoteEvaluation) carrying
    /// the engine's diagnostic text.
    async fn evaluate(&self, expression: &str) -> Result<ScriptValue>;

    /// Run a script for its side effects, discarding its completion value
    async fn execute(&self, script: &str) -> Result<()> {
        self.evaluate(script).await.map(|_| ())
    }
}
