use std::sync::Arc;

use async_trait::async_trait;

use super::{Adopt, GeoPath, GeoRegion, Handle, ObjectInfo, PointOps};
use crate::error::{Error, Result};
use crate::script::{self, Command};
use crate::value::{Coords, ScriptValue};

/// Placement of a point bound to a path or region
///
/// The applet projects the requested position onto the constraint, so the
/// point ends up as close to it as the constraint allows.
#[async_trait]
pub trait RestrictedPointOps: PointOps {
    async fn set_coords_near<C>(&self, coords: C) -> Result<()>
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

    async fn set_coords_near_from(&self, values: &[f64]) -> Result<()> {
        let coords = Coords::try_from(values)?;
        self.set_coords_near(coords).await
    }

    /// Move as close as possible to another point's current position
    async fn set_coords_near_point<P>(&self, point: &P) -> Result<()>
    where
        P: PointOps,
    {
        let target = point.coords().await?;
        self.set_coords_near(target).await
    }
}

fn not_adoptable(info: &ObjectInfo, what: &str, owner: &str) -> Error {
    Error::Configuration(format!(
        "a {} ({}) can only be created through its {}",
        what, info.object_type, owner
    ))
}

/// Point constrained to a path
#[derive(Clone)]
pub struct PointOnPath {
    pub(crate) handle: Arc<Handle>,
    path: GeoPath,
}

impl PointOnPath {
    pub(crate) fn new(handle: Arc<Handle>, path: GeoPath) -> Self {
        Self { handle, path }
    }

    /// The path this point was created on
    pub fn path(&self) -> &GeoPath {
        &self.path
    }

    /// Position along the path
    ///
    /// Computed with a temporary `PathParameter` object that is removed in
    /// the same evaluation. Fails with `OperationFailed` when the applet
    /// creates no helper or reports a non-finite value.
    pub async fn parameter(&self) -> Result<f64> {
        let name = self.handle.require_name()?;
        let command = Command::new("PathParameter").object(&name).build();
        let value = self
            .handle
            .session()
            .evaluate(&script::temporary_value(&command))
            .await?;
        if matches!(value, ScriptValue::Null) {
            return Err(Error::OperationFailed(format!("no path parameter for '{}'", name)));
        }

        let parameter = value.into_f64()?;
        if !parameter.is_finite() {
            return Err(Error::OperationFailed(format!(
                "path parameter of '{}' is not finite",
                name
            )));
        }
        Ok(parameter)
    }
}

impl PointOps for PointOnPath {}
impl RestrictedPointOps for PointOnPath {}

impl Adopt for PointOnPath {
    fn adopt(_handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        Err(not_adoptable(info, "point on path", "path"))
    }
}

/// Point constrained to a region
#[derive(Clone)]
pub struct PointInRegion {
    pub(crate) handle: Arc<Handle>,
    region: GeoRegion,
}

impl PointInRegion {
    pub(crate) fn new(handle: Arc<Handle>, region: GeoRegion) -> Self {
        Self { handle, region }
    }

    /// The region this point was created in
    pub fn region(&self) -> &GeoRegion {
        &self.region
    }
}

impl PointOps for PointInRegion {}
impl RestrictedPointOps for PointInRegion {}

impl Adopt for PointInRegion {
    fn adopt(_handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        Err(not_adoptable(info, "point in region", "region"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::Proxy;
    use crate::testing::{ScriptedChannel, ready_session};

    #[tokio::test]
    async fn test_parameter_uses_temporary_helper() {
        let channel = ScriptedChannel::new();
        channel.on("PathParameter[A]", ScriptValue::Number(0.25));
        let session = ready_session(channel.clone()).await;
        let path = GeoPath::from_handle(session.bind("f"));
        let point = PointOnPath::new(session.bind("A"), path);

        assert_eq!(point.parameter().await.unwrap(), 0.25);
        let script = channel.expressions().pop().unwrap();
        assert!(script.contains("ggbApplet.deleteObject(name)"));
    }

    #[tokio::test]
    async fn test_parameter_without_helper_fails() {
        let channel = ScriptedChannel::new();
        channel.on("PathParameter[A]", ScriptValue::Null);
        let session = ready_session(channel.clone()).await;
        let path = GeoPath::from_handle(session.bind("f"));
        let point = PointOnPath::new(session.bind("A"), path);

        assert!(matches!(point.parameter().await, Err(Error::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_parameter_rejects_non_finite() {
        let channel = ScriptedChannel::new();
        channel.on("PathParameter[A]", ScriptValue::Number(f64::NAN));
        let session = ready_session(channel.clone()).await;
        let path = GeoPath::from_handle(session.bind("f"));
        let point = PointOnPath::new(session.bind("A"), path);

        assert!(matches!(point.parameter().await, Err(Error::OperationFailed(_))));

        channel.on("PathParameter[A]", ScriptValue::Number(f64::INFINITY));
        assert!(matches!(point.parameter().await, Err(Error::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_set_coords_near_forms() {
        let channel = ScriptedChannel::new();
        channel.on(
            "[ggbApplet.getXcoord(\"Q\")",
            ScriptValue::List(vec![
                ScriptValue::Number(3.0),
                ScriptValue::Number(4.0),
                ScriptValue::Number(0.0),
            ]),
        );
        let session = ready_session(channel.clone()).await;
        let region = GeoRegion::from_handle(session.bind("c"));
        let point = PointInRegion::new(session.bind("A"), region);
        let target = crate::proxy::GeoPoint::from_handle(session.bind("Q"));

        point.set_coords_near((1.0, 2.0)).await.unwrap();
        point.set_coords_near_point(&target).await.unwrap();
        assert!(matches!(
            point.set_coords_near_from(&[1.0]).await,
            Err(Error::ArgumentArity(1))
        ));

        let sent = channel.expressions();
        assert!(sent.iter().any(|e| e == "ggbApplet.setCoords(\"A\", 1, 2, 0)"));
        assert!(sent.iter().any(|e| e == "ggbApplet.setCoords(\"A\", 3, 4, 0)"));
        assert_eq!(point.region().handle().name().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_restricted_points_are_not_adoptable() {
        let session = ready_session(ScriptedChannel::new()).await;
        let info = ObjectInfo {
            object_type: "point".into(),
            independent: false,
        };

        assert!(matches!(
            PointOnPath::adopt(session.bind("A"), &info),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            PointInRegion::adopt(session.bind("A"), &info),
            Err(Error::Configuration(_))
        ));
    }
}
