//! Process configuration.
//!
//! The four positional parameters always come from the command line. Tuning settings
//! are layered: built-in defaults, then a TOML file, then `LIVE_SEGMENTER_*`
//! environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::format::ts::DEFAULT_PROBE_SIZE;
use crate::segment::{SegmentOptions, TrailerPolicy};
use crate::{Result, SegmenterError};

/// Settings files tried, in order, when none is given.
pub const DEFAULT_SETTINGS_FILES: [&str; 2] = ["./live-segmenter.toml", "./config.toml"];

pub const ENV_INPUT: &str = "LIVE_SEGMENTER_INPUT";
pub const ENV_TRAILER_POLICY: &str = "LIVE_SEGMENTER_TRAILER_POLICY";
pub const ENV_PROBE_SIZE: &str = "LIVE_SEGMENTER_PROBE_SIZE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Transport stream to read instead of stdin
    pub input: Option<PathBuf>,
    pub trailer_policy: TrailerPolicy,
    /// Bytes of input inspected for stream parameters
    pub probe_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: None,
            trailer_policy: TrailerPolicy::default(),
            probe_size: DEFAULT_PROBE_SIZE,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SegmenterError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SegmenterError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path`, or the first default settings file present, or the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match DEFAULT_SETTINGS_FILES.iter().map(Path::new).find(|p| p.exists()) {
            Some(path) => {
                debug!("using settings from {}", path.display());
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Overrides settings from environment variables, read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(input) = lookup(ENV_INPUT).filter(|v| !v.is_empty()) {
            self.input = Some(PathBuf::from(input));
        }
        if let Some(policy) = lookup(ENV_TRAILER_POLICY) {
            self.trailer_policy = policy.trim().parse()?;
        }
        if let Some(size) = lookup(ENV_PROBE_SIZE) {
            self.probe_size = size.trim().parse().map_err(|e| {
                SegmenterError::Config(format!("{} must be a byte count: {}", ENV_PROBE_SIZE, e))
            })?;
        }
        Ok(self)
    }

    pub fn apply_process_env(self) -> Result<Self> {
        self.apply_env(|key| env::var(key).ok())
    }
}

/// Everything one segmenter run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    /// Target segment duration in seconds
    pub segment_length: u32,
    pub output_dir: PathBuf,
    pub filename_prefix: String,
    /// Opaque label echoed in completion records
    pub encoding_profile: String,
    pub settings: Settings,
}

impl SegmenterConfig {
    pub fn new(
        segment_length: u32,
        output_dir: impl Into<PathBuf>,
        filename_prefix: impl Into<String>,
        encoding_profile: impl Into<String>,
        settings: Settings,
    ) -> Result<Self> {
        let config = Self {
            segment_length,
            output_dir: output_dir.into(),
            filename_prefix: filename_prefix.into(),
            encoding_profile: encoding_profile.into(),
            settings,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_length == 0 {
            return Err(SegmenterError::Config(
                "segment length must be at least one second".into(),
            ));
        }
        if self.filename_prefix.is_empty() {
            return Err(SegmenterError::Config("filename prefix is empty".into()));
        }
        if self.settings.probe_size == 0 {
            return Err(SegmenterError::Config("probe size must not be zero".into()));
        }
        Ok(())
    }

    pub fn segment_options(&self) -> SegmentOptions {
        SegmentOptions::new(self.segment_length as f64, self.encoding_profile.clone())
            .with_trailer_policy(self.settings.trailer_policy)
    }
}
