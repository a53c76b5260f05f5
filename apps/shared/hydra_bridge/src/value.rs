//! Values crossing the engine boundary
//!
//! Every evaluation returns a [`ScriptValue`], a boxed and dynamically typed
//! payload. Proxies decode it into the type their operation promises.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Return value of an evaluated expression
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// `null` or `undefined`
    Null,
    Bool(bool),
    /// Every engine number, integer or not, is carried as `f64`
    Number(f64),
    String(String),
    List(Vec<ScriptValue>),
}

impl ScriptValue {
    /// Short type name used in decode errors
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::List(_) => "list",
        }
    }

    fn unexpected(&self, expected: &'static str) -> Error {
        Error::UnexpectedResult {
            expected,
            actual: format!("{} {}", self.type_name(), self),
        }
    }

    pub fn into_bool(self) -> Result<bool> {
        match self {
            ScriptValue::Bool(b) => Ok(b),
            other => Err(other.unexpected("boolean")),
        }
    }

    /// Decode as `f64`, converting booleans and numeric strings the way a
    /// loosely typed caller would
    pub fn into_f64(self) -> Result<f64> {
        match self {
            ScriptValue::Number(n) => Ok(n),
            ScriptValue::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
            ScriptValue::String(ref s) => s.trim().parse().map_err(|_| self.unexpected("number")),
            other => Err(other.unexpected("number")),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            ScriptValue::String(s) => Ok(s),
            ScriptValue::Number(n) => Ok(n.to_string()),
            ScriptValue::Bool(b) => Ok(b.to_string()),
            other => Err(other.unexpected("string")),
        }
    }

    pub fn into_list(self) -> Result<Vec<ScriptValue>> {
        match self {
            ScriptValue::List(items) => Ok(items),
            other => Err(other.unexpected("list")),
        }
    }

    /// Decode the label list returned by `evalCommandGetLabels`
    ///
    /// The applet answers with a comma separated string; an empty string or
    /// `null` means the command produced no objects.
    pub fn into_labels(self) -> Result<Vec<String>> {
        match self {
            ScriptValue::Null => Ok(Vec::new()),
            ScriptValue::String(s) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string)
                .collect()),
            ScriptValue::List(items) => items.into_iter().map(ScriptValue::into_string).collect(),
            other => Err(other.unexpected("label list")),
        }
    }

    /// Decode exactly one label
    pub fn into_label(self) -> Result<String> {
        let mut labels = self.into_labels()?;
        match labels.len() {
            1 => Ok(labels.remove(0)),
            0 => Err(Error::OperationFailed("command did not create an object".to_string())),
            n => Err(Error::UnexpectedResult {
                expected: "a single label",
                actual: format!("{} labels ({})", n, labels.join(",")),
            }),
        }
    }

    /// Decode a three element numeric list
    pub fn into_coords(self) -> Result<Coords> {
        let values = self
            .into_list()?
            .into_iter()
            .map(ScriptValue::into_f64)
            .collect::<Result<Vec<_>>>()?;
        Coords::try_from(values.as_slice())
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Bool(b) => write!(f, "{}", b),
            ScriptValue::Number(n) => write!(f, "{}", n),
            ScriptValue::String(s) => write!(f, "{:?}", s),
            ScriptValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Cartesian coordinates of a point
///
/// Two component inputs are planar and imply `z = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coords {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<(f64, f64)> for Coords {
    fn from((x, y): (f64, f64)) -> Self {
        Coords::planar(x, y)
    }
}

impl From<(f64, f64, f64)> for Coords {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Coords::new(x, y, z)
    }
}

impl From<[f64; 3]> for Coords {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Coords::new(x, y, z)
    }
}

impl TryFrom<&[f64]> for Coords {
    type Error = Error;

    fn try_from(values: &[f64]) -> Result<Self> {
        match *values {
            [x, y] => Ok(Coords::planar(x, y)),
            [x, y, z] => Ok(Coords::new(x, y, z)),
            _ => Err(Error::ArgumentArity(values.len())),
        }
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
