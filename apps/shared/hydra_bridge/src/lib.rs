//! Hydra Bridge
//!
//! Typed, asynchronous proxies for geometry objects that live inside a
//! GeoGebra applet running in an embedded JavaScript engine.
//!
//! # Architecture
//!
//! - **CommandChannel**: evaluates JavaScript expressions inside the engine, one at a time
//! - **Session**: owns the channel, the object registry, the event bridge and the load sequencer
//! - **Proxies**: capability traits (`ObjectOps`, `PointOps`, `PathOps`, ...) over shared handles
//! - **EventBridge**: awaitable one-shot subscriptions to engine notifications
//! - **Adapters**: engine implementations (QuickJS behind the `js` feature)
//!
//! ```no_run
//! # async fn demo() -> hydra_bridge::Result<()> {
//! use hydra_bridge::prelude::*;
//!
//! let session = Session::launch(EngineConfig::default()).await?;
//! session.wait_loaded().await?;
//!
//! let a = session.create_point((1.0, 2.0)).await?;
//! a.rename("František").await?;
//! assert_eq!(a.name().as_deref(), Some("František"));
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod proxy;
pub mod registry;
pub mod script;
pub mod session;
pub mod timeout;
pub mod value;

#[cfg(feature = "js")]
pub mod adapters;

#[cfg(test)]
mod testing;

pub use channel::CommandChannel;
pub use error::{Error, Result};
pub use events::{EventBridge, EventKind, HostEvent, Notifier, NotificationStream, Once, notification_queue};
pub use lifecycle::EngineState;
pub use session::Session;
pub use timeout::{WithTimeout, with_timeout};
pub use value::{Coords, ScriptValue};

/// Everything needed to drive proxies
pub mod prelude {
    pub use crate::proxy::{
        Circle, FreePoint, FreePointOps, GeoObject, GeoPath, GeoPoint, GeoRegion, Line, ObjectOps,
        PathOps, PointInRegion, PointOnPath, PointOps, Proxy, RegionOps, RestrictedPointOps,
    };
    pub use crate::{Coords, Error, Result, Session, WithTimeout, with_timeout};

    #[cfg(feature = "js")]
    pub use crate::adapters::js::{AppletSource, EngineConfig};
}
