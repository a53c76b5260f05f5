use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// The stand-in applet shipped with the crate
pub const BUNDLED_APPLET: &str = include_str!("glue/applet.js");

/// Where the applet script comes from
#[derive(Debug, Clone, Default)]
pub enum AppletSource {
    #[default]
    Bundled,
    File(PathBuf),
    Inline(String),
}

/// Configuration for the embedded JavaScript engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    applet: AppletSource,
    /// Delay between animation frames (`requestAnimationFrame`)
    frame_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            applet: AppletSource::Bundled,
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the applet from a script file
    pub fn with_applet_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.applet = AppletSource::File(path.into());
        self
    }

    /// Load the applet from script text
    pub fn with_applet_script(mut self, script: impl Into<String>) -> Self {
        self.applet = AppletSource::Inline(script.into());
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn applet(&self) -> &AppletSource {
        &self.applet
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Resolve the applet script text
    pub fn applet_source(&self) -> Result<String> {
        match &self.applet {
            AppletSource::Bundled => Ok(BUNDLED_APPLET.to_string()),
            AppletSource::Inline(script) => Ok(script.clone()),
            AppletSource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| Error::Io(path.display().to_string(), e)),
        }
    }
}
