//! Shared value types for the dispatch runtime: backend tags, operator names,
//! schemas, and the boxed argument representation kernels operate on.

/// Qualified operator names.
pub mod name;
/// Operator signatures and registration options.
pub mod schema;
/// Backend type tags and tag sets.
pub mod tag;
/// Boxed values, argument stacks and typed marshalling.
pub mod value;

pub use name::{NameParseError, OperatorName};
pub use schema::{AliasAnalysisKind, AliasInfo, ArgType, Argument, OperatorOptions, Schema};
pub use tag::{TypeTag, TypeTagSet};
pub use value::{
	ArgumentList, FromValue, IntoValue, ReturnList, Stack, TagOptions, TagSource, TaggedValue,
	Value, ValueError,
};
