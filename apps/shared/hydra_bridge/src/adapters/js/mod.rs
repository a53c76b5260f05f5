//! JavaScript Engine Adapter (QuickJS)
//!
//! Hosts the applet page inside a QuickJS context via rquickjs, with the
//! small browser surface the applet needs (timers, animation frames,
//! `console`, `window`).

mod config;
mod runtime;
pub mod bindings;

pub use config::{AppletSource, BUNDLED_APPLET, EngineConfig};
pub use runtime::{JsEngine, format_js_error, run_js_event_loop};
