use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rquickjs::{AsyncContext, AsyncRuntime, Ctx, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::bindings::{self, Timers};
use super::config::EngineConfig;
use crate::channel::CommandChannel;
use crate::error::{Error, Result};
use crate::events::{NotificationStream, notification_queue};
use crate::value::ScriptValue;

/// Pause between two passes of the event loop when nothing is runnable
const EVENT_LOOP_TICK: Duration = Duration::from_millis(1);

/// QuickJS engine hosting the applet page
///
/// One runtime, one context. Requests are serialized by the context lock,
/// so evaluations run in the order they were submitted.
pub struct JsEngine {
    context: AsyncContext,
    timers: Arc<Timers>,
    event_loop: JoinHandle<()>,
}

impl JsEngine {
    /// Create the runtime, install the browser globals and start the event loop
    ///
    /// The returned stream carries every notification the page publishes
    /// through the `hydra` bridge object.
    pub async fn start(config: EngineConfig) -> Result<(Self, NotificationStream)> {
        debug!("Initializing QuickJS async runtime");

        let runtime = Arc::new(AsyncRuntime::new()?);
        let context = AsyncContext::full(&runtime).await?;

        let (notifier, notifications) = notification_queue();
        let timers = Timers::new();
        let frame_interval = config.frame_interval();

        let task_timers = Arc::clone(&timers);
        context
            .with(|ctx| {
                let setup = || -> rquickjs::Result<()> {
                    bindings::setup_console_api(ctx.clone())?;
                    bindings::setup_timer_api(ctx.clone(), task_timers, frame_interval)?;
                    bindings::setup_host_bridge(ctx.clone(), notifier)?;
                    bindings::setup_page(ctx.clone())?;
                    Ok(())
                };
                setup().map_err(|err| format_js_error(&ctx, &err))
            })
            .await
            .map_err(Error::RemoteEvaluation)?;

        let event_loop = tokio::spawn(run_js_event_loop(Arc::clone(&runtime)));

        info!("JavaScript engine initialized successfully");
        Ok((
            Self {
                context,
                timers,
                event_loop,
            },
            notifications,
        ))
    }

    /// Timers scheduled by the page and not yet fired or cleared
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }
}

impl Drop for JsEngine {
    fn drop(&mut self) {
        self.event_loop.abort();
        debug!("JavaScript engine stopped");
    }
}

#[async_trait]
impl CommandChannel for JsEngine {
    async fn evaluate(&self, expression: &str) -> Result<ScriptValue> {
        let source = expression.to_string();
        self.context
            .with(|ctx| {
                let value: Value = ctx
                    .eval(source)
                    .map_err(|err| format_js_error(&ctx, &err))?;
                to_script_value(&value)
            })
            .await
            .map_err(Error::RemoteEvaluation)
    }

    async fn execute(&self, script: &str) -> Result<()> {
        let source = script.to_string();
        self.context
            .with(|ctx| {
                ctx.eval::<(), _>(source)
                    .map_err(|err| format_js_error(&ctx, &err))
            })
            .await
            .map_err(Error::RemoteEvaluation)
    }
}

/// Convert a completion value into its host form
fn to_script_value(value: &Value) -> std::result::Result<ScriptValue, String> {
    if value.is_null() || value.is_undefined() {
        return Ok(ScriptValue::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(ScriptValue::Bool(b));
    }
    if let Some(n) = value.as_number() {
        return Ok(ScriptValue::Number(n));
    }
    if let Some(s) = value.as_string() {
        return s
            .to_string()
            .map(ScriptValue::String)
            .map_err(|e| e.to_string());
    }
    if let Some(array) = value.as_array() {
        return array
            .iter::<Value>()
            .map(|item| item.map_err(|e| e.to_string()).and_then(|v| to_script_value(&v)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(ScriptValue::List);
    }

    Err(format!("Unsupported result type: {:?}", value.type_of()))
}

/// Format a JavaScript error with stack trace in Node.js style
///
/// Only exceptions carry a pending value; other errors are reported as is.
pub fn format_js_error(ctx: &Ctx, error: &rquickjs::Error) -> String {
    if !matches!(error, rquickjs::Error::Exception) {
        return error.to_string();
    }

    let exception = ctx.catch();

    if let Some(obj) = exception.as_object() {
        let read = |key: &str| -> Option<String> {
            obj.get::<_, Value>(key)
                .ok()
                .and_then(|v| v.as_string().and_then(|s| s.to_string().ok()))
                .filter(|s| !s.is_empty())
        };

        let name = read("name").unwrap_or_else(|| String::from("Error"));
        let mut output = match read("message") {
            Some(message) => format!("{}: {}", name, message),
            None => name.clone(),
        };

        if let Some(stack) = read("stack") {
            if stack.starts_with(&name) {
                output = stack;
            } else {
                output.push('\n');
                output.push_str(stack.trim_end());
            }
        }

        return output;
    }

    if let Some(msg) = exception.as_string().and_then(|s| s.to_string().ok()) {
        return format!("Error: {}", msg);
    }

    if let Some(n) = exception.as_number() {
        return format!("Error: {}", n);
    }

    String::from("Error: Unknown JavaScript error")
}

/// Drive spawned JavaScript tasks (timers, animation frames)
///
/// Runs until the owning [`JsEngine`] is dropped.
pub async fn run_js_event_loop(runtime: Arc<AsyncRuntime>) {
    debug!("Starting JavaScript event loop");

    loop {
        runtime.idle().await;
        tokio::task::yield_now().await;
        tokio::time::sleep(EVENT_LOOP_TICK).await;
    }
}
