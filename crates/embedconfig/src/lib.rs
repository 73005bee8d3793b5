use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Page-level configuration for a set of embedded shader blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbedConfig {
    pub version: u32,
    #[serde(default)]
    pub surface: SurfaceDefaults,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurfaceDefaults {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_class")]
    pub class: String,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

impl Default for SurfaceDefaults {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            class: default_class(),
            id_prefix: default_id_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderSettings {
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_interval",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
    #[serde(
        default = "default_time_wrap",
        deserialize_with = "deserialize_time_wrap",
        serialize_with = "serialize_duration"
    )]
    pub time_wrap: Duration,
    #[serde(default = "default_clear_colour")]
    pub clear_colour: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            time_wrap: default_time_wrap(),
            clear_colour: default_clear_colour(),
        }
    }
}

/// One embed point. Exactly one of `source` (a file path, relative to the
/// config file) or `inline` must be given.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSource {
    Path(PathBuf),
    Inline(String),
}

impl BlockSource {
    /// Resolves a relative path against `base`; inline sources are unchanged.
    pub fn relative_to(self, base: &Path) -> Self {
        match self {
            Self::Path(path) if path.is_relative() => Self::Path(base.join(path)),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBlock {
    pub index: usize,
    pub source: BlockSource,
    pub width: u32,
    pub height: u32,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    360
}

fn default_class() -> String {
    "shaderblock-canvas".into()
}

fn default_id_prefix() -> String {
    "shaderblock-".into()
}

fn default_interval() -> Duration {
    Duration::from_micros(16_660)
}

/// Longest accepted frame interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

fn default_time_wrap() -> Duration {
    Duration::from_secs(100)
}

fn default_clear_colour() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer).map(|d| d.unwrap_or_else(default_interval))
}

fn deserialize_time_wrap<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer).map(|d| d.unwrap_or_else(default_time_wrap))
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Duration::try_from_secs_f64(v).map(Some).map_err(E::custom)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl EmbedConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: EmbedConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Renders the configuration back to TOML with durations in
    /// human-readable form.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface.width, self.surface.height)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(ConfigError::Invalid(
                "surface width and height must be greater than zero".into(),
            ));
        }

        if self.surface.id_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "surface.id_prefix may not be empty".into(),
            ));
        }

        if self.render.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "render.interval must be greater than zero".into(),
            ));
        }

        if self.render.interval > MAX_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "render.interval may not exceed {}",
                humantime::format_duration(MAX_INTERVAL)
            )));
        }

        if self.render.time_wrap < Duration::from_millis(1) {
            return Err(ConfigError::Invalid(
                "render.time_wrap must be at least 1ms".into(),
            ));
        }

        if self
            .render
            .clear_colour
            .iter()
            .any(|channel| !(0.0..=1.0).contains(channel))
        {
            return Err(ConfigError::Invalid(
                "render.clear_colour channels must be within 0.0..=1.0".into(),
            ));
        }

        for (index, block) in self.blocks.iter().enumerate() {
            match (&block.source, &block.inline) {
                (None, None) => {
                    return Err(ConfigError::Invalid(format!(
                        "block {index} must set either 'source' or 'inline'"
                    )));
                }
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Invalid(format!(
                        "block {index} sets both 'source' and 'inline'"
                    )));
                }
                (Some(path), None) if path.as_os_str().is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "block {index} has an empty source path"
                    )));
                }
                (None, Some(body)) if body.trim().is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "block {index} has an empty inline shader"
                    )));
                }
                _ => {}
            }

            if block.width == Some(0) || block.height == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "block {index} width and height must be greater than zero"
                )));
            }
        }

        Ok(())
    }

    /// Block `index` with its size overrides merged over the surface defaults.
    pub fn resolved_block(&self, index: usize) -> Option<ResolvedBlock> {
        let block = self.blocks.get(index)?;
        let source = match (&block.source, &block.inline) {
            (Some(path), _) => BlockSource::Path(path.clone()),
            (None, Some(body)) => BlockSource::Inline(body.clone()),
            (None, None) => return None,
        };

        Some(ResolvedBlock {
            index,
            source,
            width: block.width.unwrap_or(self.surface.width),
            height: block.height.unwrap_or(self.surface.height),
        })
    }

    pub fn resolved_blocks(&self) -> impl Iterator<Item = ResolvedBlock> + '_ {
        (0..self.blocks.len()).filter_map(|index| self.resolved_block(index))
    }
}
