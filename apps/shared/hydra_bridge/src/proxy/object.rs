use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Adopt, Handle, ObjectInfo, Proxy};
use crate::error::{Error, Result};
use crate::events::{EventKind, HostEvent};
use crate::script;

/// Operations every remote object supports
#[async_trait]
pub trait ObjectOps: Proxy {
    /// Cached name; no round trip
    fn name(&self) -> Option<String> {
        self.handle().name()
    }

    /// Ask the applet whether the object is still there
    ///
    /// A `false` answer invalidates the handle. Never fails for a disposed
    /// proxy.
    async fn exists(&self) -> Result<bool> {
        let handle = self.handle();
        let Some(name) = handle.name() else {
            return Ok(false);
        };

        let session = handle.session();
        let exists = session.evaluate(&script::exists(&name)).await?.into_bool()?;
        if !exists {
            debug!(object = %name, "gone, invalidating its proxy");
            session.registry().invalidate_handle(handle);
        }
        Ok(exists)
    }

    /// Rename the object; resolves once the new name is visible here
    async fn rename(&self, new_name: &str) -> Result<()> {
        let handle = self.handle();
        let old = handle.require_name()?;
        if old == new_name {
            return Ok(());
        }

        let session = handle.session();
        session.ensure_ready()?;

        let watched = old.clone();
        let renamed = session.events().once_where(EventKind::Renamed, move |event| {
            matches!(event, HostEvent::Renamed { old, .. } if *old == watched)
        });

        let accepted = session
            .evaluate(&script::rename(&old, new_name))
            .await?
            .into_bool()?;
        if !accepted {
            return Err(Error::OperationFailed(format!(
                "the applet refused to rename '{}' to '{}'",
                old, new_name
            )));
        }

        renamed.await?;
        debug!(object = %new_name, "renamed from '{}'", old);
        Ok(())
    }

    /// Delete the object; deleting a disposed proxy is a no-op
    async fn delete(&self) -> Result<()> {
        let handle = self.handle();
        let Some(name) = handle.name() else {
            return Ok(());
        };

        let session = handle.session();
        session.evaluate(&script::delete(&name)).await?;

        let still_there = session.evaluate(&script::exists(&name)).await?.into_bool()?;
        if still_there {
            return Err(Error::OperationFailed(format!("'{}' is still present after delete", name)));
        }

        session.registry().invalidate_handle(handle);
        debug!(object = %name, "deleted");
        Ok(())
    }
}

impl<T: Proxy> ObjectOps for T {}

/// Proxy for an object of any type
#[derive(Clone)]
pub struct GeoObject {
    pub(crate) handle: Arc<Handle>,
}

impl GeoObject {
    pub(crate) fn from_handle(handle: Arc<Handle>) -> Self {
        Self { handle }
    }
}

impl Adopt for GeoObject {
    fn adopt(handle: Arc<Handle>, _info: &ObjectInfo) -> Result<Self> {
        Ok(Self::from_handle(handle))
    }
}
