//! Operator signatures and registration options.
//!
//! A [`Schema`] is built programmatically; there is no textual grammar. Two
//! schemas are structurally identical exactly when they compare equal.

use std::fmt;

use crate::name::OperatorName;

/// Declared type of an argument or return slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
	/// A value carrying backend tags.
	Tagged,
	/// Tag-only construction options.
	Options,
	Int,
	Float,
	Bool,
	Str,
	List(Box<ArgType>),
	Optional(Box<ArgType>),
	/// Any boxed value.
	Any,
}

impl ArgType {
	/// Shorthand for `List(Tagged)`.
	pub fn tagged_list() -> Self {
		Self::List(Box::new(Self::Tagged))
	}

	/// Wraps this type in `Optional`.
	pub fn optional(self) -> Self {
		Self::Optional(Box::new(self))
	}
}

impl fmt::Display for ArgType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Tagged => f.write_str("Tagged"),
			Self::Options => f.write_str("TagOptions"),
			Self::Int => f.write_str("int"),
			Self::Float => f.write_str("float"),
			Self::Bool => f.write_str("bool"),
			Self::Str => f.write_str("str"),
			Self::List(inner) => write!(f, "{inner}[]"),
			Self::Optional(inner) => write!(f, "{inner}?"),
			Self::Any => f.write_str("Any"),
		}
	}
}

/// Alias annotation on an argument, e.g. `Tagged(a!)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AliasInfo {
	/// Alias sets the value belongs to before the call.
	pub before: Vec<String>,
	/// Alias sets the value belongs to after the call.
	pub after: Vec<String>,
	/// The operator writes through this alias.
	pub is_write: bool,
}

/// One argument or return slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument {
	pub name: String,
	pub ty: ArgType,
	pub alias: Option<AliasInfo>,
	pub keyword_only: bool,
}

impl Argument {
	pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
		Self {
			name: name.into(),
			ty,
			alias: None,
			keyword_only: false,
		}
	}

	/// Attaches an alias annotation.
	pub fn with_alias(mut self, alias: AliasInfo) -> Self {
		self.alias = Some(alias);
		self
	}

	/// Marks the argument as keyword-only.
	pub fn keyword_only(mut self) -> Self {
		self.keyword_only = true;
		self
	}
}

impl fmt::Display for Argument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.ty)?;
		if let Some(alias) = &self.alias {
			write!(f, "({}", alias.before.join("|"))?;
			if alias.is_write {
				f.write_str("!")?;
			}
			f.write_str(")")?;
		}
		if !self.name.is_empty() {
			write!(f, " {}", self.name)?;
		}
		Ok(())
	}
}

/// Operator signature. Immutable once attached to a registered operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
	name: OperatorName,
	arguments: Vec<Argument>,
	returns: Vec<Argument>,
	is_vararg: bool,
	is_varret: bool,
}

impl Schema {
	/// Creates a schema with no arguments and no returns.
	pub fn new(name: OperatorName) -> Self {
		Self {
			name,
			arguments: Vec::new(),
			returns: Vec::new(),
			is_vararg: false,
			is_varret: false,
		}
	}

	/// Appends a positional argument.
	pub fn arg(mut self, name: impl Into<String>, ty: ArgType) -> Self {
		self.arguments.push(Argument::new(name, ty));
		self
	}

	/// Appends a fully specified argument.
	pub fn argument(mut self, argument: Argument) -> Self {
		self.arguments.push(argument);
		self
	}

	/// Appends an unnamed return slot.
	pub fn ret(mut self, ty: ArgType) -> Self {
		self.returns.push(Argument::new("", ty));
		self
	}

	/// Marks the argument list as variadic.
	pub fn vararg(mut self) -> Self {
		self.is_vararg = true;
		self
	}

	/// Marks the return list as variadic.
	pub fn varret(mut self) -> Self {
		self.is_varret = true;
		self
	}

	pub fn name(&self) -> &OperatorName {
		&self.name
	}

	pub fn arguments(&self) -> &[Argument] {
		&self.arguments
	}

	pub fn returns(&self) -> &[Argument] {
		&self.returns
	}

	/// Number of declared arguments; the boxed calling convention reads this
	/// many slots from the top of the stack.
	pub fn arity(&self) -> usize {
		self.arguments.len()
	}

	pub fn num_returns(&self) -> usize {
		self.returns.len()
	}

	pub fn is_vararg(&self) -> bool {
		self.is_vararg
	}

	pub fn is_varret(&self) -> bool {
		self.is_varret
	}
}

impl fmt::Display for Schema {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}(", self.name)?;
		for (i, arg) in self.arguments.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{arg}")?;
		}
		if self.is_vararg {
			f.write_str(if self.arguments.is_empty() { "..." } else { ", ..." })?;
		}
		f.write_str(") -> ")?;
		match (self.returns.as_slice(), self.is_varret) {
			([single], false) => write!(f, "{single}"),
			(returns, varret) => {
				f.write_str("(")?;
				for (i, ret) in returns.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{ret}")?;
				}
				if varret {
					f.write_str(if returns.is_empty() { "..." } else { ", ..." })?;
				}
				f.write_str(")")
			}
		}
	}
}

/// How alias analysis treats calls to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
pub enum AliasAnalysisKind {
	/// Assume every argument may alias every output.
	#[default]
	Conservative,
	/// Trust the schema's alias annotations.
	FromSchema,
	/// No aliasing and no side effects.
	PureFunction,
	/// Handled by special-cased logic outside alias analysis.
	InternalSpecialCase,
}

/// Options attached to an operator at schema registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperatorOptions {
	pub alias_analysis: AliasAnalysisKind,
}

impl OperatorOptions {
	pub fn with_alias_analysis(mut self, kind: AliasAnalysisKind) -> Self {
		self.alias_analysis = kind;
		self
	}
}
