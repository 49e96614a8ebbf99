//! Boxed argument representation.
//!
//! Kernel bodies and argument payloads are opaque to the dispatcher; the only
//! thing it reads from a value is the set of backend tags embedded in it.
//! [`Value`] is the untyped slot of a boxed [`Stack`]; [`TaggedValue`] is the
//! tag-carrying payload and [`TagOptions`] carries a tag without data.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::tag::{TypeTag, TypeTagSet};

mod convert;

pub use convert::{ArgumentList, FromValue, IntoValue, ReturnList, TagSource};

/// Untyped argument stack used by the boxed calling convention.
///
/// Arguments are pushed in declaration order; a boxed kernel pops its
/// arguments and pushes its returns.
pub type Stack = Vec<Value>;

/// Errors raised while moving values between typed and boxed form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
	#[error("expected {expected}, found {found}")]
	TypeMismatch {
		expected: &'static str,
		found: &'static str,
	},
	#[error("stack underflow: needed {needed} values, {available} available")]
	StackUnderflow { needed: usize, available: usize },
}

/// A tag-carrying value with an opaque, shared payload.
#[derive(Clone)]
pub struct TaggedValue {
	tags: TypeTagSet,
	payload: Arc<dyn Any + Send + Sync>,
}

impl TaggedValue {
	/// Wraps `payload` and associates it with `tags`. Unknown bits are dropped.
	pub fn new<T>(tags: impl Into<TypeTagSet>, payload: T) -> Self
	where
		T: Any + Send + Sync,
	{
		Self {
			tags: known(tags.into()),
			payload: Arc::new(payload),
		}
	}

	/// A payload-less value associated with one tag.
	pub fn marker(tag: TypeTag) -> Self {
		Self::new(tag, ())
	}

	pub fn tags(&self) -> TypeTagSet {
		self.tags
	}

	/// Borrows the payload if it has type `T`.
	pub fn payload<T: Any>(&self) -> Option<&T> {
		self.payload.downcast_ref::<T>()
	}

	/// Shares the payload under a different tag set.
	pub fn retagged(&self, tags: impl Into<TypeTagSet>) -> Self {
		Self {
			tags: known(tags.into()),
			payload: Arc::clone(&self.payload),
		}
	}
}

fn known(tags: TypeTagSet) -> TypeTagSet {
	TypeTagSet::from_bits_truncate(tags.bits())
}

impl fmt::Debug for TaggedValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaggedValue")
			.field("tags", &self.tags)
			.finish_non_exhaustive()
	}
}

/// Identity comparison: same tags and the same shared payload.
impl PartialEq for TaggedValue {
	fn eq(&self, other: &Self) -> bool {
		self.tags == other.tags && Arc::ptr_eq(&self.payload, &other.payload)
	}
}

/// Construction options naming a backend without carrying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagOptions {
	pub tag: TypeTag,
}

impl TagOptions {
	pub const fn new(tag: TypeTag) -> Self {
		Self { tag }
	}
}

/// One untyped stack slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
	/// Absent optional or no value.
	#[default]
	None,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Arc<str>),
	Tagged(TaggedValue),
	Options(TagOptions),
	List(Vec<Value>),
}

impl Value {
	/// Short type name used in mismatch diagnostics.
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::None => "None",
			Self::Bool(_) => "bool",
			Self::Int(_) => "int",
			Self::Float(_) => "float",
			Self::Str(_) => "str",
			Self::Tagged(_) => "Tagged",
			Self::Options(_) => "TagOptions",
			Self::List(_) => "list",
		}
	}

	pub fn as_tagged(&self) -> Option<&TaggedValue> {
		match self {
			Self::Tagged(t) => Some(t),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(v) => Some(*v),
			_ => None,
		}
	}

	pub fn is_none(&self) -> bool {
		matches!(self, Self::None)
	}
}
