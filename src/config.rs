//! Codec configuration with layered sources.
//!
//! Precedence, lowest first: profile defaults, configuration file, `WIREHAIR_*`
//! environment variables, programmatic overrides.
//!
//! The file format is a minimal `key = value` syntax under a `[codec]` section:
//!
//! ```text
//! [codec]
//! block_size = 1200
//! check_blocks = auto
//! seed = 7
//! max_seed_attempts = 512
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::params::DEFAULT_SEED_ATTEMPTS;
use crate::codec::{
    CodeParams, FixedParams, ParameterPolicy, SimulatedParams, MAX_CHECK_BLOCKS,
};

const ENV_KEYS: [&str; 4] = [
    "WIREHAIR_BLOCK_SIZE",
    "WIREHAIR_CHECK_BLOCKS",
    "WIREHAIR_SEED",
    "WIREHAIR_MAX_SEED_ATTEMPTS",
];

/// Codec settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Payload bytes per block.
    pub block_size: usize,
    /// Fixed M; `None` derives it from K.
    pub check_blocks: Option<u16>,
    /// Fixed seed; `None` searches for one.
    pub seed: Option<u32>,
    /// Seeds tried per K when searching.
    pub max_seed_attempts: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecProfile::Default.to_config()
    }
}

impl CodecConfig {
    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::InvalidBlockSize);
        }
        if let Some(m) = self.check_blocks {
            if !(2..=MAX_CHECK_BLOCKS).contains(&m) {
                return Err(ConfigError::InvalidCheckBlocks(m));
            }
        }
        if self.max_seed_attempts == 0 {
            return Err(ConfigError::InvalidSeedAttempts);
        }
        Ok(())
    }

    /// Parameter policy implied by the fixed fields.
    ///
    /// Both `check_blocks` and `seed` set gives a fixed pair. A seed alone
    /// fixes the seed with the default M. Otherwise seeds are searched, with
    /// the process-wide memoized policy when nothing is customized.
    #[must_use]
    pub fn parameter_policy(&self) -> Box<dyn ParameterPolicy> {
        match (self.check_blocks, self.seed) {
            (Some(m), Some(seed)) => Box::new(FixedParams::new(CodeParams::new(m, seed))),
            (None, Some(seed)) => Box::new(FixedParams::seed_only(seed)),
            (Some(m), None) => Box::new(
                SimulatedParams::new()
                    .with_check_blocks(m)
                    .with_max_attempts(self.max_seed_attempts),
            ),
            (None, None) if self.max_seed_attempts == DEFAULT_SEED_ATTEMPTS => {
                Box::new(SimulatedParams::global())
            }
            (None, None) => {
                Box::new(SimulatedParams::new().with_max_attempts(self.max_seed_attempts))
            }
        }
    }
}

/// Pre-defined configuration profiles.
#[derive(Debug, Clone)]
pub enum CodecProfile {
    /// 1 KiB blocks.
    Default,
    /// Blocks sized to fit a typical UDP datagram.
    Datagram,
    /// 64 KiB blocks for large transfers.
    Bulk,
    /// User-provided configuration.
    Custom(Box<CodecConfig>),
}

impl CodecProfile {
    /// Expands the profile into a concrete configuration.
    #[must_use]
    pub fn to_config(&self) -> CodecConfig {
        let base = CodecConfig {
            block_size: 1024,
            check_blocks: None,
            seed: None,
            max_seed_attempts: DEFAULT_SEED_ATTEMPTS,
        };
        match self {
            Self::Default => base,
            Self::Datagram => CodecConfig {
                block_size: 1200,
                ..base
            },
            Self::Bulk => CodecConfig {
                block_size: 64 * 1024,
                ..base
            },
            Self::Custom(config) => config.as_ref().clone(),
        }
    }
}

/// Configuration loader with layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    profile: CodecProfile,
    file_path: Option<PathBuf>,
    overrides: BTreeMap<String, String>,
}

impl ConfigLoader {
    /// Creates a loader with the default profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: CodecProfile::Default,
            file_path: None,
            overrides: BTreeMap::new(),
        }
    }

    /// Sets the base profile.
    #[must_use]
    pub fn profile(mut self, profile: CodecProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets a file path for config loading.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Adds a programmatic override (highest precedence), keyed like the
    /// environment variables, e.g. `WIREHAIR_BLOCK_SIZE`.
    #[must_use]
    pub fn override_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<CodecConfig, ConfigError> {
        self.load_with_env(std::env::vars())
    }

    fn load_with_env<I>(&self, vars: I) -> Result<CodecConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = if let Some(path) = &self.file_path {
            load_from_file(path, &self.profile)?
        } else {
            self.profile.to_config()
        };

        let env: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(key, _)| ENV_KEYS.contains(&key.as_str()))
            .collect();
        apply_overrides(&mut config, &env)?;
        apply_overrides(&mut config, &self.overrides)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error while reading configuration.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Block size of zero.
    #[error("block_size must be > 0")]
    InvalidBlockSize,
    /// Check block count out of range.
    #[error("check_blocks out of range: {0}")]
    InvalidCheckBlocks(u16),
    /// Zero seed attempts.
    #[error("max_seed_attempts must be > 0")]
    InvalidSeedAttempts,
    /// Unknown override key.
    #[error("invalid override: {0}")]
    InvalidOverride(String),
}

fn load_from_file(path: &Path, profile: &CodecProfile) -> Result<CodecConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents, profile.to_config())
}

fn apply_overrides(
    config: &mut CodecConfig,
    overrides: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (key, value) in overrides {
        apply_env_override(config, key, value)?;
    }
    Ok(())
}

fn apply_env_override(config: &mut CodecConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "WIREHAIR_BLOCK_SIZE" => config.block_size = parse_usize(value, key)?,
        "WIREHAIR_CHECK_BLOCKS" => config.check_blocks = parse_auto(value, key, parse_u16)?,
        "WIREHAIR_SEED" => config.seed = parse_auto(value, key, parse_u32)?,
        "WIREHAIR_MAX_SEED_ATTEMPTS" => config.max_seed_attempts = parse_u32(value, key)?,
        _ => return Err(ConfigError::InvalidOverride(key.to_string())),
    }
    Ok(())
}

fn parse_config(contents: &str, base: CodecConfig) -> Result<CodecConfig, ConfigError> {
    let mut config = base;
    let mut section = String::new();

    for (line_idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].trim().to_lowercase();
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ConfigError::Parse(format!("line {}: {}", line_idx + 1, line)))?;
        let key = key.trim();
        let value = value.trim().trim_matches('"');

        apply_section_kv(&mut config, &section, key, value)?;
    }

    Ok(config)
}

fn apply_section_kv(
    config: &mut CodecConfig,
    section: &str,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match section {
        "codec" => apply_codec_kv(config, key, value),
        "" => Err(ConfigError::Parse(format!(
            "missing section for key: {key}"
        ))),
        _ => Err(ConfigError::Parse(format!("unknown section: {section}"))),
    }
}

fn apply_codec_kv(config: &mut CodecConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "block_size" => config.block_size = parse_usize(value, key)?,
        "check_blocks" => config.check_blocks = parse_auto(value, key, parse_u16)?,
        "seed" => config.seed = parse_auto(value, key, parse_u32)?,
        "max_seed_attempts" => config.max_seed_attempts = parse_u32(value, key)?,
        _ => return Err(ConfigError::Parse(format!("unknown key: codec.{key}"))),
    }
    Ok(())
}

/// `auto` (or empty) clears an optional setting.
fn parse_auto<T>(
    value: &str,
    key: &str,
    parse: fn(&str, &str) -> Result<T, ConfigError>,
) -> Result<Option<T>, ConfigError> {
    if value.is_empty() || value.eq_ignore_ascii_case("auto") {
        Ok(None)
    } else {
        parse(value, key).map(Some)
    }
}

fn parse_usize(value: &str, key: &str) -> Result<usize, ConfigError> {
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Parse(format!("invalid usize for {key}: {value}")))
}

fn parse_u32(value: &str, key: &str) -> Result<u32, ConfigError> {
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Parse(format!("invalid u32 for {key}: {value}")))
}

fn parse_u16(value: &str, key: &str) -> Result<u16, ConfigError> {
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Parse(format!("invalid u16 for {key}: {value}")))
}
