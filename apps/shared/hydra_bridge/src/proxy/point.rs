use std::sync::Arc;

use async_trait::async_trait;

use super::{Adopt, Handle, ObjectInfo, Proxy, wrong_type};
use crate::error::Result;
use crate::script::{self, Axis, Command};
use crate::value::Coords;

/// Read access to a point's coordinates
#[async_trait]
pub trait PointOps: Proxy {
    async fn x(&self) -> Result<f64> {
        self.coord(Axis::X).await
    }

    async fn y(&self) -> Result<f64> {
        self.coord(Axis::Y).await
    }

    async fn z(&self) -> Result<f64> {
        self.coord(Axis::Z).await
    }

    /// One coordinate, one round trip
    async fn coord(&self, axis: Axis) -> Result<f64> {
        let name = self.handle().require_name()?;
        self.handle()
            .session()
            .evaluate(&script::coord(axis, &name))
            .await?
            .into_f64()
    }

    /// All three coordinates in a single round trip
    async fn coords(&self) -> Result<Coords> {
        let name = self.handle().require_name()?;
        self.handle()
            .session()
            .evaluate(&script::coords(&name))
            .await?
            .into_coords()
    }

    /// Independent copy of this point at its current position
    async fn copy_free_object(&self) -> Result<FreePoint> {
        let name = self.handle().require_name()?;
        let session = self.handle().session();
        let label = session
            .create_object(&Command::new("CopyFreeObject").object(&name).build())
            .await?;
        Ok(FreePoint::from_handle(session.bind(&label)))
    }

    /// Untyped point view of the same object
    fn as_point(&self) -> GeoPoint {
        GeoPoint::from_handle(Arc::clone(self.handle()))
    }
}

/// Placement of an unconstrained point
#[async_trait]
pub trait FreePointOps: PointOps {
    /// Move the point; accepts `(x, y)`, `(x, y, z)` or [`Coords`]
    async fn set_coords<C>(&self, coords: C) -> Result<()>
    where
        C: Into<Coords> + Send,
    {
        let coords = coords.into();
        let name = self.handle().require_name()?;
        self.handle()
            .session()
            .evaluate(&script::set_coords(&name, coords)?)
            .await?;
        Ok(())
    }

    /// Move the point from a slice of two or three coordinates
    async fn set_coords_from(&self, values: &[f64]) -> Result<()> {
        let coords = Coords::try_from(values)?;
        self.set_coords(coords).await
    }
}

/// Proxy for a point of unknown freedom
#[derive(Clone)]
pub struct GeoPoint {
    pub(crate) handle: Arc<Handle>,
}

impl GeoPoint {
    pub(crate) fn from_handle(handle: Arc<Handle>) -> Self {
        Self { handle }
    }
}

impl PointOps for GeoPoint {}

impl Adopt for GeoPoint {
    fn adopt(handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        if info.object_type == "point" {
            Ok(Self::from_handle(handle))
        } else {
            Err(wrong_type(&handle.require_name()?, "point", info))
        }
    }
}

/// Proxy for an independent point
#[derive(Clone)]
pub struct FreePoint {
    pub(crate) handle: Arc<Handle>,
}

impl FreePoint {
    pub(crate) fn from_handle(handle: Arc<Handle>) -> Self {
        Self { handle }
    }
}

impl PointOps for FreePoint {}
impl FreePointOps for FreePoint {}

impl Adopt for FreePoint {
    fn adopt(handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        if info.object_type == "point" && info.independent {
            Ok(Self::from_handle(handle))
        } else {
            Err(wrong_type(&handle.require_name()?, "free point", info))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{ScriptedChannel, ready_session};
    use crate::value::ScriptValue;

    #[tokio::test]
    async fn test_coordinate_reads() {
        let channel = ScriptedChannel::new();
        channel.on("ggbApplet.getXcoord(\"A\")", ScriptValue::Number(1.0));
        channel.on("ggbApplet.getYcoord(\"A\")", ScriptValue::Number(2.0));
        channel.on("ggbApplet.getZcoord(\"A\")", ScriptValue::Number(3.0));
        channel.on(
            "[ggbApplet.getXcoord",
            ScriptValue::List(vec![
                ScriptValue::Number(1.0),
                ScriptValue::Number(2.0),
                ScriptValue::Number(3.0),
            ]),
        );
        let session = ready_session(channel).await;
        let point = FreePoint::from_handle(session.bind("A"));

        assert_eq!(point.x().await.unwrap(), 1.0);
        assert_eq!(point.y().await.unwrap(), 2.0);
        assert_eq!(point.z().await.unwrap(), 3.0);
        assert_eq!(point.coords().await.unwrap(), Coords::new(1.0, 2.0, 3.0));
    }

    #[tokio::test]
    async fn test_set_coords_arity() {
        let channel = ScriptedChannel::new();
        let session = ready_session(channel.clone()).await;
        let point = FreePoint::from_handle(session.bind("A"));

        point.set_coords((1.0, 2.0)).await.unwrap();
        point.set_coords_from(&[4.0, 5.0, 6.0]).await.unwrap();
        let sent = channel.expressions();
        assert!(sent.iter().any(|e| e == "ggbApplet.setCoords(\"A\", 1, 2, 0)"));
        assert!(sent.iter().any(|e| e == "ggbApplet.setCoords(\"A\", 4, 5, 6)"));

        let before = sent.len();
        assert!(matches!(
            point.set_coords_from(&[1.0]).await,
            Err(Error::ArgumentArity(1))
        ));
        assert!(matches!(
            point.set_coords_from(&[1.0, 2.0, 3.0, 4.0]).await,
            Err(Error::ArgumentArity(4))
        ));
        assert_eq!(channel.expressions().len(), before);
    }

    #[tokio::test]
    async fn test_copy_free_object() {
        let channel = ScriptedChannel::new();
        channel.on("CopyFreeObject[A]", ScriptValue::String("B".into()));
        let session = ready_session(channel).await;
        let point = GeoPoint::from_handle(session.bind("A"));

        let copy = point.copy_free_object().await.unwrap();
        assert_eq!(copy.handle().name().as_deref(), Some("B"));
    }
}
