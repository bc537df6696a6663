use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How `submit` treats a manifest whose paired image is already resident in
/// the texture cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FastPathMode {
    /// Register frames straight from the cached texture and skip decoding.
    #[default]
    Exclusive,
    /// Register from the cached texture and still run the full decode path.
    /// Frames are registered twice; the completion callback fires once.
    Duplicate,
    /// Never consult the texture cache.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoaderConfig {
    pub version: u32,
    #[serde(default)]
    pub fast_path: FastPathMode,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub drain: DrainConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NamingConfig {
    #[serde(default = "default_manifest_suffix")]
    pub manifest_suffix: String,
    #[serde(default = "default_image_suffix")]
    pub image_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_decode_thread")]
    pub decode_thread: String,
    #[serde(default = "default_register_thread")]
    pub register_thread: String,
    /// Upper bound on how long an idle worker sleeps before re-checking its
    /// queue and the shutdown flag.
    #[serde(
        default = "default_idle_wake",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub idle_wake: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DrainConfig {
    /// Minimum time between two runs of a main-thread drain. Zero means every
    /// host tick.
    #[serde(
        default,
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            fast_path: FastPathMode::default(),
            naming: NamingConfig::default(),
            workers: WorkerConfig::default(),
            drain: DrainConfig::default(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            manifest_suffix: default_manifest_suffix(),
            image_suffix: default_image_suffix(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            decode_thread: default_decode_thread(),
            register_thread: default_register_thread(),
            idle_wake: default_idle_wake(),
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
        }
    }
}

fn default_manifest_suffix() -> String {
    ".plist".to_string()
}

fn default_image_suffix() -> String {
    ".png".to_string()
}

fn default_decode_thread() -> String {
    "sheetload-decode".to_string()
}

fn default_register_thread() -> String {
    "sheetload-register".to_string()
}

fn default_idle_wake() -> Duration {
    Duration::from_millis(250)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = v.trim();
            if trimmed == "0" {
                return Ok(Duration::ZERO);
            }
            humantime::parse_duration(trimmed)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl LoaderConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LoaderConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        validate_suffix("naming.manifest_suffix", &self.naming.manifest_suffix)?;
        validate_suffix("naming.image_suffix", &self.naming.image_suffix)?;
        if self.naming.manifest_suffix == self.naming.image_suffix {
            return Err(ConfigError::Invalid(format!(
                "naming.manifest_suffix and naming.image_suffix must differ (both '{}')",
                self.naming.image_suffix
            )));
        }

        if self.workers.decode_thread.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "workers.decode_thread may not be empty".into(),
            ));
        }
        if self.workers.register_thread.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "workers.register_thread may not be empty".into(),
            ));
        }
        if self.workers.idle_wake.is_zero() {
            return Err(ConfigError::Invalid(
                "workers.idle_wake must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn validate_suffix(field: &str, suffix: &str) -> Result<(), ConfigError> {
    match suffix.strip_prefix('.') {
        Some(ext) if !ext.is_empty() && !ext.contains(&['.', '/', '\\'][..]) => Ok(()),
        _ => Err(ConfigError::Invalid(format!(
            "{field} must look like '.ext', got '{suffix}'"
        ))),
    }
}
