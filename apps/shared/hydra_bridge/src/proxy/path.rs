use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Adopt, Handle, ObjectInfo, ObjectOps, PointInRegion, PointOnPath, PointOps, Proxy,
            RestrictedPointOps, wrong_type};
use super::point::GeoPoint;
use crate::error::Result;
use crate::script::Command;
use crate::value::Coords;

const PATH_TYPES: &[&str] = &["line", "segment", "ray", "circle", "conic", "polygon"];
const REGION_TYPES: &[&str] = &["circle", "conic", "polygon"];

/// Objects points can be attached to
#[async_trait]
pub trait PathOps: Proxy {
    /// Path view of the same object
    fn as_path(&self) -> GeoPath {
        GeoPath::from_handle(Arc::clone(self.handle()))
    }

    /// New point on this path, at `parameter` when given
    async fn create_point(&self, parameter: Option<f64>) -> Result<PointOnPath> {
        let name = self.handle().require_name()?;
        let mut command = Command::new("Point").object(&name);
        if let Some(parameter) = parameter {
            command = command.number(parameter)?;
        }

        let session = self.handle().session();
        let label = session.create_object(&command.build()).await?;
        Ok(PointOnPath::new(session.bind(&label), self.as_path()))
    }

    /// New point on this path, as close as possible to `point`
    async fn create_point_near<P>(&self, point: &P) -> Result<PointOnPath>
    where
        P: PointOps,
    {
        let target = point.coords().await?;
        self.create_point_near_coords(target).await
    }

    /// New point on this path, as close as possible to `coords`
    async fn create_point_near_coords<C>(&self, coords: C) -> Result<PointOnPath>
    where
        C: Into<Coords> + Send,
    {
        let coords = coords.into();
        let point = self.create_point(None).await?;

        if let Err(err) = point.set_coords_near(coords).await {
            if let Err(cleanup) = point.delete().await {
                warn!("Failed to remove half-placed point: {}", cleanup);
            }
            return Err(err);
        }
        Ok(point)
    }

    /// Slice form of [`create_point_near_coords`](PathOps::create_point_near_coords)
    async fn create_point_near_from(&self, values: &[f64]) -> Result<PointOnPath> {
        let coords = Coords::try_from(values)?;
        self.create_point_near_coords(coords).await
    }

    /// Intersection points with `other`; empty when they do not meet
    async fn intersect<O>(&self, other: &O) -> Result<Vec<GeoPoint>>
    where
        O: PathOps,
    {
        let name = self.handle().require_name()?;
        let other_name = other.handle().require_name()?;

        let session = self.handle().session();
        let command = Command::new("Intersect").object(&other_name).object(&name).build();
        let labels = session.eval_command(&command).await?;

        Ok(labels
            .iter()
            .map(|label| GeoPoint::from_handle(session.bind(label)))
            .collect())
    }
}

/// Objects points can be placed inside of
#[async_trait]
pub trait RegionOps: Proxy {
    fn as_region(&self) -> GeoRegion {
        GeoRegion::from_handle(Arc::clone(self.handle()))
    }

    /// New point constrained to this region
    async fn create_point_in(&self) -> Result<PointInRegion> {
        let name = self.handle().require_name()?;
        let session = self.handle().session();
        let label = session
            .create_object(&Command::new("PointIn").object(&name).build())
            .await?;
        Ok(PointInRegion::new(session.bind(&label), self.as_region()))
    }
}

/// Proxy for a path of any shape
#[derive(Clone)]
pub struct GeoPath {
    pub(crate) handle: Arc<Handle>,
}

impl GeoPath {
    pub(crate) fn from_handle(handle: Arc<Handle>) -> Self {
        Self { handle }
    }
}

impl PathOps for GeoPath {}

impl Adopt for GeoPath {
    fn adopt(handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        if PATH_TYPES.contains(&info.object_type.as_str()) {
            Ok(Self::from_handle(handle))
        } else {
            Err(wrong_type(&handle.require_name()?, "path", info))
        }
    }
}

/// Proxy for a region of any shape
#[derive(Clone)]
pub struct GeoRegion {
    pub(crate) handle: Arc<Handle>,
}

impl GeoRegion {
    pub(crate) fn from_handle(handle: Arc<Handle>) -> Self {
        Self { handle }
    }
}

impl RegionOps for GeoRegion {}

impl Adopt for GeoRegion {
    fn adopt(handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        if REGION_TYPES.contains(&info.object_type.as_str()) {
            Ok(Self::from_handle(handle))
        } else {
            Err(wrong_type(&handle.require_name()?, "region", info))
        }
    }
}

#[derive(Clone)]
pub struct Line {
    pub(crate) handle: Arc<Handle>,
}

impl Line {
    pub(crate) fn from_handle(handle: Arc<Handle>) -> Self {
        Self { handle }
    }

    async fn derive_line(&self, command: &'static str, through: &str) -> Result<Line> {
        let name = self.handle.require_name()?;
        let session = self.handle.session();
        let label = session
            .create_object(&Command::new(command).object(through).object(&name).build())
            .await?;
        Ok(Line::from_handle(session.bind(&label)))
    }

    /// Line through `point` parallel to this one
    pub async fn parallel_through<P>(&self, point: &P) -> Result<Line>
    where
        P: PointOps,
    {
        self.derive_line("Line", &point.handle().require_name()?).await
    }

    /// Line through `point` perpendicular to this one
    pub async fn perpendicular_through<P>(&self, point: &P) -> Result<Line>
    where
        P: PointOps,
    {
        self.derive_line("PerpendicularLine", &point.handle().require_name()?)
            .await
    }

    /// Perpendicular at the point of this line with the given parameter
    ///
    /// The foot point stays in the applet as the anchor of the new line.
    pub async fn perpendicular_at(&self, parameter: f64) -> Result<(Line, PointOnPath)> {
        let foot = self.create_point(Some(parameter)).await?;
        let line = self.perpendicular_through(&foot).await?;
        Ok((line, foot))
    }
}

impl PathOps for Line {}

impl Adopt for Line {
    fn adopt(handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        if info.object_type == "line" {
            Ok(Self::from_handle(handle))
        } else {
            Err(wrong_type(&handle.require_name()?, "line", info))
        }
    }
}

/// A circle is both a path (its circumference) and a region (its disk)
#[derive(Clone)]
pub struct Circle {
    pub(crate) handle: Arc<Handle>,
}

impl Circle {
    pub(crate) fn from_handle(handle: Arc<Handle>) -> Self {
        Self { handle }
    }
}

impl PathOps for Circle {}
impl RegionOps for Circle {}

impl Adopt for Circle {
    fn adopt(handle: Arc<Handle>, info: &ObjectInfo) -> Result<Self> {
        if info.object_type == "circle" {
            Ok(Self::from_handle(handle))
        } else {
            Err(wrong_type(&handle.require_name()?, "circle", info))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedChannel, ready_session};
    use crate::value::ScriptValue;

    #[tokio::test]
    async fn test_create_point_with_parameter() {
        let channel = ScriptedChannel::new();
        channel.on("Point[f, 0.5]", ScriptValue::String("A".into()));
        let session = ready_session(channel).await;
        let line = Line::from_handle(session.bind("f"));

        let point = line.create_point(Some(0.5)).await.unwrap();
        assert_eq!(point.handle().name().as_deref(), Some("A"));
        assert_eq!(point.path().handle().name().as_deref(), Some("f"));
    }

    #[tokio::test]
    async fn test_intersect_argument_order() {
        let channel = ScriptedChannel::new();
        channel.on("Intersect[g, f]", ScriptValue::String("A,B".into()));
        let session = ready_session(channel.clone()).await;
        let f = Line::from_handle(session.bind("f"));
        let g = Circle::from_handle(session.bind("g"));

        let points = f.intersect(&g).await.unwrap();
        let names: Vec<_> = points.iter().filter_map(|p| p.handle().name()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_intersect_nothing() {
        let channel = ScriptedChannel::new();
        channel.on("Intersect[", ScriptValue::String(String::new()));
        let session = ready_session(channel).await;
        let f = Line::from_handle(session.bind("f"));
        let g = Line::from_handle(session.bind("g"));

        assert!(f.intersect(&g).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_point_near_from_checks_arity() {
        let channel = ScriptedChannel::new();
        let session = ready_session(channel.clone()).await;
        let f = Line::from_handle(session.bind("f"));

        let before = channel.expressions().len();
        assert!(matches!(
            f.create_point_near_from(&[1.0, 2.0, 3.0, 4.0]).await,
            Err(crate::Error::ArgumentArity(4))
        ));
        assert_eq!(channel.expressions().len(), before);
    }

    #[tokio::test]
    async fn test_derived_lines() {
        let channel = ScriptedChannel::new();
        channel.on("Line[P, f]", ScriptValue::String("g".into()));
        channel.on("PerpendicularLine[P, f]", ScriptValue::String("h".into()));
        let session = ready_session(channel).await;
        let f = Line::from_handle(session.bind("f"));
        let p = GeoPoint::from_handle(session.bind("P"));

        let parallel = f.parallel_through(&p).await.unwrap();
        let perpendicular = f.perpendicular_through(&p).await.unwrap();
        assert_eq!(parallel.handle().name().as_deref(), Some("g"));
        assert_eq!(perpendicular.handle().name().as_deref(), Some("h"));
    }
}
