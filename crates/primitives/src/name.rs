//! Qualified operator names.

use std::fmt;
use std::str::FromStr;

/// Unique key of an operator: `namespace::name.overload`.
///
/// The overload part may be empty, in which case it is omitted when displayed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperatorName {
	pub namespace: String,
	pub name: String,
	pub overload: String,
}

impl OperatorName {
	/// Creates a name without an overload.
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
			overload: String::new(),
		}
	}

	/// Returns this name with the given overload.
	pub fn with_overload(mut self, overload: impl Into<String>) -> Self {
		self.overload = overload.into();
		self
	}
}

impl fmt::Display for OperatorName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}::{}", self.namespace, self.name)?;
		if !self.overload.is_empty() {
			write!(f, ".{}", self.overload)?;
		}
		Ok(())
	}
}

/// Error returned when a qualified name is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameParseError {
	#[error("operator name {0:?} is missing a `namespace::` prefix")]
	MissingNamespace(String),
	#[error("operator name {0:?} has an empty component")]
	EmptyComponent(String),
}

impl FromStr for OperatorName {
	type Err = NameParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (namespace, rest) = s
			.split_once("::")
			.ok_or_else(|| NameParseError::MissingNamespace(s.to_string()))?;
		let (name, overload) = rest.split_once('.').unwrap_or((rest, ""));
		if namespace.is_empty() || name.is_empty() || (rest.contains('.') && overload.is_empty()) {
			return Err(NameParseError::EmptyComponent(s.to_string()));
		}
		Ok(Self::new(namespace, name).with_overload(overload))
	}
}
