//! JavaScript bindings for the embedded page
//!
//! # Timer System Architecture
//!
//! `setTimeout`, `setInterval` and `requestAnimationFrame` spawn a task on
//! the QuickJS context that sleeps on tokio time and then calls back into
//! JavaScript. Each timer owns a `Notify` used for cancellation; the
//! per-engine [`Timers`] table maps ids to those handles so `clearTimeout`
//! and `cancelAnimationFrame` can find them.
//!
//! Spawned tasks only run while the engine's event loop drives the runtime.
//!
//! # Host Bridge
//!
//! The global `hydra` object is how the page talks back to the host:
//! `hydra.loaded()`, `hydra.renamed(old, new)` and `hydra.removed(name)`.
//! Each call only queues a [`HostEvent`]; the host never re-enters the
//! engine from inside a callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object};
use tokio::sync::Notify;

use super::runtime::format_js_error;
use crate::events::{HostEvent, Notifier};

/// Browser globals evaluated before any page script
const PAGE_GLUE: &str = include_str!("glue/page.js");

/// Minimum delay for `setTimeout`/`setInterval`, as in browsers
const MIN_TIMER_DELAY: Duration = Duration::from_millis(4);

/// Cancellation table for one engine's timers
pub struct Timers {
    next_id: AtomicU32,
    aborts: Mutex<HashMap<u32, Arc<Notify>>>,
}

impl Timers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU32::new(1),
            aborts: Mutex::new(HashMap::new()),
        })
    }

    fn register(&self) -> (u32, Arc<Notify>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let abort = Arc::new(Notify::new());
        self.aborts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&abort));
        (id, abort)
    }

    fn finish(&self, id: u32) {
        self.aborts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Cancel a pending timer; unknown ids are ignored
    pub fn clear(&self, id: u32) {
        let abort = self
            .aborts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();
        if let Some(abort) = abort {
            abort.notify_one();
        }
    }

    /// Number of timers still pending
    pub fn pending(&self) -> usize {
        self.aborts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// How a scheduled callback is invoked
#[derive(Clone, Copy)]
enum TimerKind {
    Timeout,
    Interval,
    /// Called once with the frame timestamp in milliseconds
    Frame(Instant),
}

fn schedule<'js>(
    ctx: &Ctx<'js>,
    timers: &Arc<Timers>,
    cb: Function<'js>,
    delay: Duration,
    kind: TimerKind,
) -> u32 {
    let (id, abort) = timers.register();
    let timers = Arc::clone(timers);
    let task_ctx = ctx.clone();

    ctx.spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = abort.notified() => {
                    tracing::trace!("Timer {} cancelled", id);
                    break;
                }

                _ = tokio::time::sleep(delay) => {
                    let res = match kind {
                        TimerKind::Frame(origin) => {
                            cb.call::<_, ()>((origin.elapsed().as_secs_f64() * 1000.0,))
                        }
                        _ => cb.call::<_, ()>(()),
                    };

                    if let Err(err) = res {
                        tracing::warn!(target: "ggb", "Timer callback failed: {}", format_js_error(&task_ctx, &err));
                        break;
                    }

                    if !matches!(kind, TimerKind::Interval) {
                        break;
                    }
                }
            }
        }

        timers.finish(id);
    });

    id
}

/// Setup `console` in the JavaScript context
///
/// Messages are routed to `tracing` under the `ggb` target.
pub fn setup_console_api(ctx: Ctx) -> Result<(), rquickjs::Error> {
    let console = Object::new(ctx.clone())?;

    fn join(args: Rest<Coerced<String>>) -> String {
        args.0
            .into_iter()
            .map(|arg| arg.0)
            .collect::<Vec<_>>()
            .join(" ")
    }

    console.set(
        "log",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::info!(target: "ggb", "{}", join(args));
        })?,
    )?;
    console.set(
        "info",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::info!(target: "ggb", "{}", join(args));
        })?,
    )?;
    console.set(
        "warn",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::warn!(target: "ggb", "{}", join(args));
        })?,
    )?;
    console.set(
        "error",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::error!(target: "ggb", "{}", join(args));
        })?,
    )?;
    console.set(
        "debug",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::debug!(target: "ggb", "{}", join(args));
        })?,
    )?;

    ctx.globals().set("console", console)?;
    Ok(())
}

/// Setup timers and animation frames in the JavaScript context
///
/// `setTimeout`, `setInterval`, `clearTimeout`, `clearInterval`,
/// `requestAnimationFrame` and `cancelAnimationFrame`.
pub fn setup_timer_api<'js>(
    ctx: Ctx<'js>,
    timers: Arc<Timers>,
    frame_interval: Duration,
) -> Result<(), rquickjs::Error> {
    let globals = ctx.globals();
    let origin = Instant::now();

    let t = Arc::clone(&timers);
    globals.set(
        "setTimeout",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, cb: Function<'js>, msec: Option<f64>| {
            schedule(&ctx, &t, cb, timer_delay(msec), TimerKind::Timeout)
        })?,
    )?;

    let t = Arc::clone(&timers);
    globals.set(
        "setInterval",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, cb: Function<'js>, msec: Option<f64>| {
            schedule(&ctx, &t, cb, timer_delay(msec), TimerKind::Interval)
        })?,
    )?;

    let t = Arc::clone(&timers);
    globals.set(
        "requestAnimationFrame",
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, cb: Function<'js>| {
            schedule(&ctx, &t, cb, frame_interval, TimerKind::Frame(origin))
        })?,
    )?;

    for name in ["clearTimeout", "clearInterval", "cancelAnimationFrame"] {
        let t = Arc::clone(&timers);
        globals.set(
            name,
            Function::new(ctx.clone(), move |id: Option<u32>| {
                if let Some(id) = id {
                    t.clear(id);
                }
            })?,
        )?;
    }

    globals.set(
        "__hydra_now",
        Function::new(ctx.clone(), move || origin.elapsed().as_secs_f64() * 1000.0)?,
    )?;

    Ok(())
}

fn timer_delay(msec: Option<f64>) -> Duration {
    let requested = msec
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| Duration::from_secs_f64(ms / 1000.0))
        .unwrap_or_default();
    requested.max(MIN_TIMER_DELAY)
}

/// Setup the `hydra` host bridge object
pub fn setup_host_bridge(ctx: Ctx, notifier: Notifier) -> Result<(), rquickjs::Error> {
    let bridge = Object::new(ctx.clone())?;

    let n = notifier.clone();
    bridge.set(
        "loaded",
        Function::new(ctx.clone(), move || {
            tracing::debug!("hydra.loaded()");
            n.notify(HostEvent::Loaded);
        })?,
    )?;

    let n = notifier.clone();
    bridge.set(
        "renamed",
        Function::new(ctx.clone(), move |old: String, new: String| {
            tracing::debug!("hydra.renamed({}, {})", old, new);
            n.notify(HostEvent::Renamed { old, new });
        })?,
    )?;

    let n = notifier;
    bridge.set(
        "removed",
        Function::new(ctx.clone(), move |name: String| {
            tracing::debug!("hydra.removed({})", name);
            n.notify(HostEvent::Removed { name });
        })?,
    )?;

    ctx.globals().set("hydra", bridge)?;
    Ok(())
}

/// Evaluate the browser prelude
pub fn setup_page(ctx: Ctx) -> Result<(), rquickjs::Error> {
    ctx.eval::<(), _>(PAGE_GLUE)
}
