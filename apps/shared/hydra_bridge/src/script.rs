//! Expression builders for the `ggbApplet` API
//!
//! Names and GeoGebra commands are embedded as JSON string literals, which
//! are valid JavaScript string literals. Numbers use Rust's shortest
//! round-trip formatting so that a value read back equals the value sent.

use crate::error::{Error, Result};
use crate::value::Coords;

/// Check evaluated once the page is loaded; re-arms every animation frame
/// until the applet API is callable, then signals the host
pub const LOAD_CHECK: &str = r#"
(function repeat() {
    if (window.ggbApplet && ggbApplet.evalCommand) {
        hydra.loaded();
    } else {
        requestAnimationFrame(repeat);
    }
})();
"#;

/// Forwards rename and remove notifications from the applet to the host bridge
pub const REGISTER_LISTENERS: &str = r#"
ggbApplet.registerRenameListener(function (oldName, newName) { hydra.renamed(oldName, newName); });
ggbApplet.registerRemoveListener(function (name) { hydra.removed(name); });
true;
"#;

/// Quote a string as a JavaScript literal
pub fn js_string(value: &str) -> String {
    // Serializing a &str cannot fail
    serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""))
}

/// Format a finite number for a command or a script
pub fn number(value: f64) -> Result<String> {
    if value.is_finite() {
        Ok(value.to_string())
    } else {
        Err(Error::InvalidArgument(format!("{} is not a finite number", value)))
    }
}

/// `ggbApplet.exists("A")`
pub fn exists(name: &str) -> String {
    format!("ggbApplet.exists({})", js_string(name))
}

/// `ggbApplet.renameObject("A", "B")`
pub fn rename(old: &str, new: &str) -> String {
    format!("ggbApplet.renameObject({}, {})", js_string(old), js_string(new))
}

/// `ggbApplet.deleteObject("A")`
pub fn delete(name: &str) -> String {
    format!("ggbApplet.deleteObject({})", js_string(name))
}

/// `ggbApplet.getObjectType("A")`
pub fn object_type(name: &str) -> String {
    format!("ggbApplet.getObjectType({})", js_string(name))
}

/// `[type, independent]` for an existing object, `null` otherwise
pub fn object_info(name: &str) -> String {
    format!(
        "{} ? [{}, ggbApplet.isIndependent({})] : null",
        exists(name),
        object_type(name),
        js_string(name)
    )
}

/// Coordinate axis of a point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn as_str(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

/// `ggbApplet.getXcoord("A")` and friends
pub fn coord(axis: Axis, name: &str) -> String {
    format!("ggbApplet.get{}coord({})", axis.as_str(), js_string(name))
}

/// All three coordinates in one round trip
pub fn coords(name: &str) -> String {
    let name = js_string(name);
    format!(
        "[ggbApplet.getXcoord({name}), ggbApplet.getYcoord({name}), ggbApplet.getZcoord({name})]"
    )
}

/// `ggbApplet.setCoords("A", x, y, z)`
pub fn set_coords(name: &str, coords: Coords) -> Result<String> {
    Ok(format!(
        "ggbApplet.setCoords({}, {}, {}, {})",
        js_string(name),
        number(coords.x)?,
        number(coords.y)?,
        number(coords.z)?
    ))
}

/// Evaluate a GeoGebra command and return the labels it created
pub fn eval_command_get_labels(command: &str) -> String {
    format!("ggbApplet.evalCommandGetLabels({})", js_string(command))
}

/// Evaluate a helper command, read its numeric value and delete it again
///
/// The helper never outlives the script, so the object namespace is left
/// as it was found. Evaluates to `null` when the command creates nothing.
pub fn temporary_value(command: &str) -> String {
    format!(
        r#"(function () {{
    var name = ggbApplet.evalCommandGetLabels({});
    if (!name) {{
        return null;
    }}
    var value = ggbApplet.getValue(name);
    ggbApplet.deleteObject(name);
    return +value;
}})()"#,
        js_string(command)
    )
}

/// Builder for GeoGebra commands such as `Intersect[f, g]`
#[derive(Debug, Clone)]
pub struct Command {
    label: Option<String>,
    name: &'static str,
    args: Vec<String>,
}

impl Command {
    pub fn new(name: &'static str) -> Self {
        Self {
            label: None,
            name,
            args: Vec::new(),
        }
    }

    /// Request a label for the created object (`A = ...`)
    pub fn labelled(mut self, label: Option<&str>) -> Self {
        self.label = label.map(str::to_string);
        self
    }

    /// Append an object name argument
    pub fn object(mut self, name: &str) -> Self {
        self.args.push(name.to_string());
        self
    }

    /// Append a numeric argument
    pub fn number(mut self, value: f64) -> Result<Self> {
        self.args.push(number(value)?);
        Ok(self)
    }

    /// Render the command text
    pub fn build(&self) -> String {
        let body = format!("{}[{}]", self.name, self.args.join(", "));
        match &self.label {
            Some(label) => format!("{} = {}", label, body),
            None => body,
        }
    }
}

/// Point literal command `(x, y, z)`, optionally labelled
pub fn point_literal(label: Option<&str>, coords: Coords) -> Result<String> {
    let body = format!(
        "({}, {}, {})",
        number(coords.x)?,
        number(coords.y)?,
        number(coords.z)?
    );
    Ok(match label {
        Some(label) => format!("{} = {}", label, body),
        None => body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escaping() {
        assert_eq!(js_string("A"), "\"A\"");
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_string("František"), "\"František\"");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(1.0).unwrap(), "1");
        assert_eq!(number(-0.25).unwrap(), "-0.25");
        assert_eq!(number(0.1).unwrap().parse::<f64>().unwrap(), 0.1);
        assert!(matches!(number(f64::NAN), Err(Error::InvalidArgument(_))));
        assert!(matches!(number(f64::INFINITY), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::new("Intersect").object("f").object("g");
        assert_eq!(cmd.build(), "Intersect[f, g]");

        let cmd = Command::new("Point").object("f").number(0.5).unwrap();
        assert_eq!(cmd.build(), "Point[f, 0.5]");

        let cmd = Command::new("Circle").labelled(Some("c")).object("A").number(2.0).unwrap();
        assert_eq!(cmd.build(), "c = Circle[A, 2]");
    }

    #[test]
    fn test_point_literal() {
        assert_eq!(point_literal(None, Coords::new(1.0, 2.0, 3.0)).unwrap(), "(1, 2, 3)");
        assert_eq!(
            point_literal(Some("P"), Coords::planar(1.5, -1.0)).unwrap(),
            "P = (1.5, -1, 0)"
        );
    }

    #[test]
    fn test_expressions() {
        assert_eq!(exists("A"), "ggbApplet.exists(\"A\")");
        assert_eq!(coord(Axis::Y, "A"), "ggbApplet.getYcoord(\"A\")");
        assert_eq!(
            eval_command_get_labels("CopyFreeObject[A]"),
            "ggbApplet.evalCommandGetLabels(\"CopyFreeObject[A]\")"
        );
        assert_eq!(
            set_coords("A", Coords::planar(1.0, 2.0)).unwrap(),
            "ggbApplet.setCoords(\"A\", 1, 2, 0)"
        );
        assert_eq!(
            object_info("A"),
            "ggbApplet.exists(\"A\") ? [ggbApplet.getObjectType(\"A\"), ggbApplet.isIndependent(\"A\")] : null"
        );
        let helper = temporary_value("PathParameter[A]");
        assert!(helper.contains("if (!name) {\n        return null;\n    }"));
        assert!(helper.contains("ggbApplet.deleteObject(name)"));
    }
}
