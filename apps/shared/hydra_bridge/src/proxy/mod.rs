//! Typed proxies for objects living inside the applet
//!
//! A proxy is a thin typed view over a shared [`Handle`]. Capabilities are
//! traits with default async methods, so a concrete proxy opts into what
//! its object can do:
//!
//! | Trait                  | Capability                                    |
//! |------------------------|-----------------------------------------------|
//! | [`ObjectOps`]          | name, exists, rename, delete (every proxy)    |
//! | [`PointOps`]           | coordinates, free copy                        |
//! | [`FreePointOps`]       | free placement                                |
//! | [`RestrictedPointOps`] | placement projected onto a path or region     |
//! | [`PathOps`]            | points on the path, intersections             |
//! | [`RegionOps`]          | points inside the region                      |
//!
//! Free and restricted placement are separate traits; a restricted point
//! has no `set_coords`.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::session::Session;

mod object;
mod path;
mod point;
mod restricted;

pub use object::{GeoObject, ObjectOps};
pub use path::{Circle, GeoPath, GeoRegion, Line, PathOps, RegionOps};
pub use point::{FreePoint, FreePointOps, GeoPoint, PointOps};
pub use restricted::{PointInRegion, PointOnPath, RestrictedPointOps};

/// Shared identity of one remote object
///
/// Every proxy of the same live object holds the same handle, so a rename
/// or removal seen through one proxy is seen through all of them.
pub struct Handle {
    name: RwLock<Option<String>>,
    session: Session,
}

impl Handle {
    pub(crate) fn new(name: impl Into<String>, session: Session) -> Arc<Self> {
        Arc::new(Self {
            name: RwLock::new(Some(name.into())),
            session,
        })
    }

    /// Current name, `None` once the object is gone
    pub fn name(&self) -> Option<String> {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_valid(&self) -> bool {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current name, or `Disposed`
    pub fn require_name(&self) -> Result<String> {
        self.name().ok_or(Error::Disposed)
    }

    /// Only the registry renames or invalidates handles
    pub(crate) fn set_name(&self, name: Option<String>) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Handle({})", name),
            None => write!(f, "Handle(<disposed>)"),
        }
    }
}

/// Anything backed by a [`Handle`]
pub trait Proxy: Send + Sync {
    fn handle(&self) -> &Arc<Handle>;

    /// Untyped view of the same object
    fn to_object(&self) -> GeoObject {
        GeoObject::from_handle(Arc::clone(self.handle()))
    }
}

/// What the applet reports about an object before it is adopted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// `getObjectType`, e.g. `"point"` or `"line"`
    pub object_type: String,
    /// `isIndependent`; free points are independent
    pub independent: bool,
}

/// Proxies that can be built for an object that already exists
pub trait Adopt: Proxy + Sized {
    fn adopt(handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self>;
}

pub(crate) fn wrong_type(name: &str, wanted: &str, info: &ObjectInfo) -> Error {
    Error::Configuration(format!(
        "'{}' is a {}, not a {}",
        name, info.object_type, wanted
    ))
}

macro_rules! impl_proxy {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Proxy for $ty {
                fn handle(&self) -> &Arc<Handle> {
                    &self.handle
                }
            }

            impl fmt::Debug for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!($ty)).field(&self.handle.name()).finish()
                }
            }
        )*
    };
}

impl_proxy!(
    GeoObject,
    GeoPoint,
    FreePoint,
    GeoPath,
    GeoRegion,
    Line,
    Circle,
    PointOnPath,
    PointInRegion,
);
