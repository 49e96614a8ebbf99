//! Dispatcher configuration.
//!
//! Configuration is plain data deserialized from TOML:
//!
//! ```toml
//! warn_on_kernel_overwrite = true
//! options_mismatch = "reject"
//! expected_operators = 512
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Policy for a duplicate schema registration whose options differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionsMismatch {
	/// Keep the first registration's options and log a warning.
	#[default]
	Warn,
	/// Fail with [`crate::RegistrationError::OptionsConflict`].
	Reject,
}

/// Tunables for one [`crate::Dispatcher`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
	/// Log a warning when a kernel registration replaces an existing one.
	pub warn_on_kernel_overwrite: bool,
	pub options_mismatch: OptionsMismatch,
	/// Pre-sizes the operator arena and name index.
	pub expected_operators: usize,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			warn_on_kernel_overwrite: true,
			options_mismatch: OptionsMismatch::Warn,
			expected_operators: 0,
		}
	}
}

/// Errors raised while loading a [`DispatcherConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("invalid dispatcher config: {0}")]
	Parse(#[from] toml::de::Error),
}

impl DispatcherConfig {
	/// Parses a config from TOML text. Missing keys take their defaults.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	/// Reads and parses a TOML config file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&text)
	}
}
