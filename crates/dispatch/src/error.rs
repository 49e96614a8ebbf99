use switchyard_primitives::{OperatorName, OperatorOptions, Schema, TypeTag, TypeTagSet, ValueError};

/// Fatal registration errors. The existing registration is left untouched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistrationError {
	/// Same operator name, structurally different schema.
	#[error(
		"operator {name} is already registered with a different schema: existing `{existing}`, incoming `{incoming}`"
	)]
	SchemaConflict {
		name: OperatorName,
		existing: Box<Schema>,
		incoming: Box<Schema>,
	},
	/// Same schema, different options, under the `reject` options policy.
	#[error(
		"operator {name} is already registered with different options: existing {existing:?}, incoming {incoming:?}"
	)]
	OptionsConflict {
		name: OperatorName,
		existing: OperatorOptions,
		incoming: OperatorOptions,
	},
}

/// Error raised by a kernel body or while marshalling its arguments.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
	#[error(transparent)]
	Value(#[from] ValueError),
	#[error("{0}")]
	Failed(String),
}

impl KernelError {
	pub fn failed(msg: impl Into<String>) -> Self {
		Self::Failed(msg.into())
	}
}

/// Call-time failures. None are retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
	/// A concrete tag was derived but neither a kernel for it nor a catchall exists.
	#[error(
		"could not find a kernel for operator {operator} with dispatch tag {tag}; registered tags are {registered}"
	)]
	NoKernelFound {
		operator: OperatorName,
		tag: TypeTag,
		registered: TypeTagSet,
	},
	/// No tag could be derived from the arguments and no catchall exists.
	#[error(
		"there were no tagged arguments to operator {operator} (e.g. an empty list of tagged values was passed) and no catchall kernel is registered; this usually means the operator requires a non-empty list of tagged values; registered tags are {registered}"
	)]
	NoTaggedArguments {
		operator: OperatorName,
		registered: TypeTagSet,
	},
	/// The boxed stack holds fewer values than the schema declares.
	#[error("operator {operator} expects {expected} arguments on the stack, found {actual}")]
	StackUnderflow {
		operator: OperatorName,
		expected: usize,
		actual: usize,
	},
	/// An unboxed-only call reached a kernel without a matching typed form.
	#[error("kernel selected for operator {operator} has no unboxed form for this signature")]
	UnboxedUnavailable { operator: OperatorName },
	#[error("kernel for operator {operator} failed: {source}")]
	Kernel {
		operator: OperatorName,
		#[source]
		source: KernelError,
	},
}

impl DispatchError {
	/// Tags that had kernels when a lookup failed, in ascending priority.
	pub fn registered_tags(&self) -> Option<TypeTagSet> {
		match self {
			Self::NoKernelFound { registered, .. } | Self::NoTaggedArguments { registered, .. } => {
				Some(*registered)
			}
			_ => None,
		}
	}
}
