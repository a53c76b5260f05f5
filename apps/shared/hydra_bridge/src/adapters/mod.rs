//! Engine Adapters
//!
//! Each adapter implements [`CommandChannel`](crate::CommandChannel) over a
//! concrete JavaScript engine and feeds its notifications to a session.

#[cfg(feature = "js")]
pub mod js;

#[cfg(feature = "js")]
pub use js::{AppletSource, EngineConfig, JsEngine, run_js_event_loop};
