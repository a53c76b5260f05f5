//! Session: one applet instance and everything attached to it
//!
//! The session owns the command channel, the object registry, the event
//! bridge and the load sequencer. A notification pump task applies engine
//! notifications in arrival order: it updates the registry first and then
//! publishes the event, so a waiter observes the registry already updated.
//!
//! Every evaluation made through the session *settles* before returning:
//! it waits until the pump has applied the notifications the evaluation
//! produced. A proxy therefore never sees a stale name after a call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::channel::CommandChannel;
use crate::error::{Error, Result};
use crate::events::{EventBridge, HostEvent, NotificationStream};
use crate::lifecycle::{EngineState, LoadSequencer};
use crate::proxy::{Adopt, Circle, FreePoint, Handle, Line, ObjectInfo, PointOps};
use crate::registry::ObjectRegistry;
use crate::script::{self, Command};
use crate::value::{Coords, ScriptValue};

#[cfg(feature = "js")]
use crate::adapters::js::{EngineConfig, JsEngine};

struct SessionInner {
    channel: Arc<dyn CommandChannel>,
    registry: ObjectRegistry,
    events: EventBridge,
    lifecycle: LoadSequencer,
    /// Notifications queued by the engine so far
    sent: Arc<AtomicU64>,
    /// Notifications applied by the pump so far
    processed: watch::Sender<u64>,
    pump: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let pump = self.pump.get_mut().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(pump) = pump.take() {
            pump.abort();
        }
        self.events.close();
        debug!("Session closed");
    }
}

/// Cheap, cloneable handle to a running applet session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Wrap an already running engine
    ///
    /// `notifications` must be fed by the same engine `channel` talks to.
    /// Must be called from within a tokio runtime.
    pub fn attach(channel: Arc<dyn CommandChannel>, notifications: NotificationStream) -> Self {
        let NotificationStream { rx, sent } = notifications;
        let (processed, _) = watch::channel(0u64);

        let inner = Arc::new(SessionInner {
            channel,
            registry: ObjectRegistry::new(),
            events: EventBridge::new(),
            lifecycle: LoadSequencer::new(),
            sent,
            processed,
            pump: std::sync::Mutex::new(None),
        });

        let pump = tokio::spawn(run_notification_pump(Arc::downgrade(&inner), rx));
        *inner.pump.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(pump);

        Self { inner }
    }

    /// Start an embedded engine, load the applet and begin waiting for it
    ///
    /// Returns as soon as the page is loaded; use [`wait_loaded`](Self::wait_loaded)
    /// to wait for the applet itself.
    #[cfg(feature = "js")]
    pub async fn launch(config: EngineConfig) -> Result<Self> {
        let page = config.applet_source()?;
        let (engine, notifications) = JsEngine::start(config).await?;
        let session = Self::attach(Arc::new(engine), notifications);
        session.navigate(&page).await?;
        Ok(session)
    }

    /// Evaluate the page script, then arm the load check
    pub async fn navigate(&self, page: &str) -> Result<()> {
        self.inner.lifecycle.begin()?;

        debug!("Loading page ({} bytes)", page.len());
        self.inner.channel.execute(page).await?;
        self.inner.channel.execute(script::LOAD_CHECK).await?;
        self.settle().await
    }

    /// Resolve once the applet is ready; immediate for late callers
    pub async fn wait_loaded(&self) -> Result<()> {
        self.inner.lifecycle.wait_ready().await
    }

    pub fn state(&self) -> EngineState {
        self.inner.lifecycle.state()
    }

    pub fn ensure_ready(&self) -> Result<()> {
        self.inner.lifecycle.ensure_ready()
    }

    pub fn events(&self) -> &EventBridge {
        &self.inner.events
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.inner.registry
    }

    /// Evaluate a script against the ready applet
    pub async fn evaluate(&self, expression: &str) -> Result<ScriptValue> {
        self.ensure_ready()?;

        trace!("evaluate: {}", expression);
        let result = self.inner.channel.evaluate(expression).await;
        self.settle().await?;

        match &result {
            Ok(value) => trace!("result: {}", value),
            Err(err) => debug!("evaluation failed: {}", err),
        }
        result
    }

    /// Run a GeoGebra command; returns the labels of the objects it created
    pub async fn eval_command(&self, command: &str) -> Result<Vec<String>> {
        debug!("command: {}", command);
        self.evaluate(&script::eval_command_get_labels(command))
            .await?
            .into_labels()
    }

    /// Run a command that creates exactly one object
    pub(crate) async fn create_object(&self, command: &str) -> Result<String> {
        debug!("command: {}", command);
        self.evaluate(&script::eval_command_get_labels(command))
            .await?
            .into_label()
    }

    /// Shared handle for a live object name
    pub fn bind(&self, name: &str) -> Arc<Handle> {
        self.inner
            .registry
            .bind_or_insert(name, || Handle::new(name, self.clone()))
    }

    /// Wait until every notification queued so far has been applied
    async fn settle(&self) -> Result<()> {
        let target = self.inner.sent.load(Ordering::SeqCst);
        let mut processed = self.inner.processed.subscribe();
        processed
            .wait_for(|applied| *applied >= target)
            .await
            .map(|_| ())
            .map_err(|_| Error::ChannelClosed)
    }

    /// New free point with an applet-chosen name
    pub async fn create_point<C>(&self, coords: C) -> Result<FreePoint>
    where
        C: Into<Coords>,
    {
        self.create_free_point(None, coords.into()).await
    }

    /// New free point with a requested name
    pub async fn create_named_point<C>(&self, name: &str, coords: C) -> Result<FreePoint>
    where
        C: Into<Coords>,
    {
        self.create_free_point(Some(name), coords.into()).await
    }

    async fn create_free_point(&self, name: Option<&str>, coords: Coords) -> Result<FreePoint> {
        let label = self
            .create_object(&script::point_literal(name, coords)?)
            .await?;
        Ok(FreePoint::from_handle(self.bind(&label)))
    }

    /// Line through two points
    pub async fn create_line<A, B>(&self, a: &A, b: &B) -> Result<Line>
    where
        A: PointOps,
        B: PointOps,
    {
        let command = Command::new("Line")
            .object(&a.handle().require_name()?)
            .object(&b.handle().require_name()?)
            .build();
        let label = self.create_object(&command).await?;
        Ok(Line::from_handle(self.bind(&label)))
    }

    /// Circle around `center`
    pub async fn create_circle<P>(&self, center: &P, radius: f64) -> Result<Circle>
    where
        P: PointOps,
    {
        if radius <= 0.0 {
            return Err(Error::InvalidArgument(format!("radius must be positive, got {}", radius)));
        }
        let command = Command::new("Circle")
            .object(&center.handle().require_name()?)
            .number(radius)?
            .build();
        let label = self.create_object(&command).await?;
        Ok(Circle::from_handle(self.bind(&label)))
    }

    /// Typed proxy for an object that already exists in the applet
    ///
    /// Restricted points cannot be adopted; they only come from their path
    /// or region.
    pub async fn adopt<T: Adopt>(&self, name: &str) -> Result<T> {
        let info = match self.evaluate(&script::object_info(name)).await? {
            ScriptValue::Null => {
                return Err(Error::OperationFailed(format!("no object named '{}'", name)));
            }
            value => {
                let mut fields = value.into_list()?.into_iter();
                match (fields.next(), fields.next()) {
                    (Some(object_type), Some(independent)) => ObjectInfo {
                        object_type: object_type.into_string()?,
                        independent: independent.into_bool()?,
                    },
                    _ => {
                        return Err(Error::UnexpectedResult {
                            expected: "[type, independent]",
                            actual: "short list".to_string(),
                        });
                    }
                }
            }
        };

        T::adopt(self.bind(name), &info)
    }

    async fn apply(&self, event: &HostEvent) {
        match event {
            HostEvent::Loaded => {
                if self.state() != EngineState::WaitingForEngine {
                    debug!("Ignoring repeated load notification");
                    return;
                }
                if let Err(err) = self.inner.channel.execute(script::REGISTER_LISTENERS).await {
                    error!("Failed to register applet listeners: {}", err);
                    return;
                }
                if self.inner.lifecycle.mark_ready() {
                    self.inner.events.emit(event);
                }
            }
            HostEvent::Renamed { old, new } => {
                if self.inner.registry.rename(old, new).is_none() {
                    trace!("Rename of untracked '{}' to '{}'", old, new);
                }
                self.inner.events.emit(event);
            }
            HostEvent::Removed { name } => {
                if self.inner.registry.invalidate(name).is_none() {
                    trace!("Removal of untracked '{}'", name);
                }
                self.inner.events.emit(event);
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("objects", &self.inner.registry.len())
            .finish()
    }
}

/// Apply engine notifications in order until the engine or the session goes away
async fn run_notification_pump(session: Weak<SessionInner>, mut rx: mpsc::UnboundedReceiver<HostEvent>) {
    debug!("Notification pump started");

    while let Some(event) = rx.recv().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        trace!("notification: {}", event);

        let session = Session { inner };
        session.apply(&event).await;
        session.inner.processed.send_modify(|applied| *applied += 1);
    }

    if let Some(inner) = session.upgrade() {
        warn!("Engine notification queue closed");
        inner.events.close();
    }
    info!("Notification pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, notification_queue};
    use crate::proxy::{ObjectOps, Proxy};
    use crate::testing::{ScriptedChannel, ready_session};

    #[tokio::test]
    async fn test_not_ready_before_load() {
        let channel = ScriptedChannel::new();
        let (_notifier, stream) = notification_queue();
        let session = Session::attach(channel.clone(), stream);

        assert_eq!(session.state(), EngineState::Uninitialized);
        assert!(matches!(session.evaluate("1").await, Err(Error::NotReady)));
        assert!(matches!(
            session.create_point((1.0, 2.0)).await,
            Err(Error::NotReady)
        ));
        assert!(channel.expressions().is_empty());
    }

    #[tokio::test]
    async fn test_navigate_reaches_ready() {
        let channel = ScriptedChannel::new();
        let session = ready_session(channel.clone()).await;

        assert_eq!(session.state(), EngineState::Ready);
        session.wait_loaded().await.unwrap();
        assert!(channel
            .expressions()
            .iter()
            .any(|e| e.contains("registerRenameListener")));

        // Navigating twice is a configuration error
        assert!(matches!(session.navigate("").await, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_loaded_emitted_once() {
        let channel = ScriptedChannel::new();
        let (notifier, stream) = notification_queue();
        channel.set_notifier(notifier.clone());
        let session = Session::attach(channel, stream);

        let loaded = session.events().once(EventKind::Loaded);
        session.navigate("").await.unwrap();
        assert_eq!(loaded.await.unwrap(), HostEvent::Loaded);

        let again = session.events().once(EventKind::Loaded);
        notifier.notify(HostEvent::Loaded);
        session.settle().await.unwrap();
        assert_eq!(session.events().pending(EventKind::Loaded), 1);
        drop(again);
    }

    #[tokio::test]
    async fn test_create_point_registers_handle() {
        let channel = ScriptedChannel::new();
        channel.on("(1, 2, 3)", ScriptValue::String("A".into()));
        let session = ready_session(channel).await;

        let point = session.create_point((1.0, 2.0, 3.0)).await.unwrap();
        assert_eq!(point.name().as_deref(), Some("A"));
        let shared = session.bind("A");
        assert!(Arc::ptr_eq(&shared, point.handle()));
    }

    #[tokio::test]
    async fn test_remote_removal_invalidates() {
        let channel = ScriptedChannel::new();
        channel.on("(0, 0, 0)", ScriptValue::String("A".into()));
        channel.on_with_events(
            "Delete[A]",
            ScriptValue::String(String::new()),
            vec![HostEvent::Removed { name: "A".into() }],
        );
        let session = ready_session(channel).await;

        let point = session.create_point((0.0, 0.0)).await.unwrap();
        session.eval_command("Delete[A]").await.unwrap();
        assert_eq!(point.name(), None);
        assert!(matches!(point.rename("B").await, Err(Error::Disposed)));
    }

    #[tokio::test]
    async fn test_adopt_missing_object() {
        let channel = ScriptedChannel::new();
        channel.on("isIndependent", ScriptValue::Null);
        let session = ready_session(channel).await;

        assert!(matches!(
            session.adopt::<crate::proxy::GeoObject>("Z").await,
            Err(Error::OperationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_adopt_checks_type() {
        let channel = ScriptedChannel::new();
        channel.on(
            "isIndependent",
            ScriptValue::List(vec![ScriptValue::String("line".into()), ScriptValue::Bool(true)]),
        );
        let session = ready_session(channel).await;

        assert!(session.adopt::<Line>("f").await.is_ok());
        assert!(matches!(
            session.adopt::<FreePoint>("f").await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_circle_radius_must_be_positive() {
        let session = ready_session(ScriptedChannel::new()).await;
        let center = FreePoint::from_handle(session.bind("A"));

        assert!(matches!(
            session.create_circle(&center, 0.0).await,
            Err(Error::InvalidArgument(_))
        ));
    }
}
