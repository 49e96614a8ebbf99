//! Conversions between typed arguments and boxed [`Value`]s.
//!
//! [`TagSource`] is the read-only view the dispatcher needs: it folds every
//! embedded tag into an accumulator, recursing through lists and optionals,
//! while scalars contribute nothing. [`ArgumentList`] and [`ReturnList`] are
//! implemented for tuples so a typed kernel's signature can be marshalled onto
//! and off a [`Stack`].

use std::sync::Arc;

use super::{Stack, TagOptions, TaggedValue, Value, ValueError};
use crate::tag::TypeTagSet;

/// Anything that may embed backend tags.
pub trait TagSource {
	/// Unions every embedded tag into `acc`.
	fn collect_tags(&self, acc: &mut TypeTagSet);

	/// Returns the embedded tags as a fresh set.
	fn tag_set(&self) -> TypeTagSet {
		let mut acc = TypeTagSet::empty();
		self.collect_tags(&mut acc);
		acc
	}
}

/// Moves a typed value into a boxed slot.
pub trait IntoValue {
	fn into_value(self) -> Value;
}

/// Takes a typed value out of a boxed slot.
pub trait FromValue: Sized {
	/// Name reported when the slot holds something else.
	const TYPE_NAME: &'static str;

	fn from_value(value: Value) -> Result<Self, ValueError>;
}

fn mismatch(expected: &'static str, found: &Value) -> ValueError {
	ValueError::TypeMismatch {
		expected,
		found: found.type_name(),
	}
}

impl TagSource for Value {
	fn collect_tags(&self, acc: &mut TypeTagSet) {
		match self {
			Value::Tagged(t) => *acc |= t.tags(),
			Value::Options(o) => *acc |= o.tag.as_set(),
			Value::List(items) => items.iter().for_each(|v| v.collect_tags(acc)),
			Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {}
		}
	}
}

impl TagSource for TaggedValue {
	fn collect_tags(&self, acc: &mut TypeTagSet) {
		*acc |= self.tags();
	}
}

impl TagSource for TagOptions {
	fn collect_tags(&self, acc: &mut TypeTagSet) {
		*acc |= self.tag.as_set();
	}
}

impl<T: TagSource> TagSource for Vec<T> {
	fn collect_tags(&self, acc: &mut TypeTagSet) {
		self.iter().for_each(|v| v.collect_tags(acc));
	}
}

impl<T: TagSource> TagSource for Option<T> {
	fn collect_tags(&self, acc: &mut TypeTagSet) {
		if let Some(v) = self {
			v.collect_tags(acc);
		}
	}
}

impl<T: TagSource + ?Sized> TagSource for &T {
	fn collect_tags(&self, acc: &mut TypeTagSet) {
		(**self).collect_tags(acc);
	}
}

macro_rules! untagged {
	($($ty:ty),* $(,)?) => {
		$(
			impl TagSource for $ty {
				#[inline]
				fn collect_tags(&self, _acc: &mut TypeTagSet) {}
			}
		)*
	};
}

untagged!(bool, i64, f64, String, Arc<str>);

macro_rules! scalar_value {
	($ty:ty, $variant:ident, $name:literal) => {
		impl IntoValue for $ty {
			fn into_value(self) -> Value {
				Value::$variant(self)
			}
		}

		impl FromValue for $ty {
			const TYPE_NAME: &'static str = $name;

			fn from_value(value: Value) -> Result<Self, ValueError> {
				match value {
					Value::$variant(v) => Ok(v),
					other => Err(mismatch($name, &other)),
				}
			}
		}
	};
}

scalar_value!(bool, Bool, "bool");
scalar_value!(i64, Int, "int");
scalar_value!(f64, Float, "float");
scalar_value!(Arc<str>, Str, "str");
scalar_value!(TaggedValue, Tagged, "Tagged");
scalar_value!(TagOptions, Options, "TagOptions");

impl IntoValue for String {
	fn into_value(self) -> Value {
		Value::Str(Arc::from(self))
	}
}

impl FromValue for String {
	const TYPE_NAME: &'static str = "str";

	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::Str(s) => Ok(s.to_string()),
			other => Err(mismatch("str", &other)),
		}
	}
}

impl IntoValue for Value {
	fn into_value(self) -> Value {
		self
	}
}

impl FromValue for Value {
	const TYPE_NAME: &'static str = "Any";

	fn from_value(value: Value) -> Result<Self, ValueError> {
		Ok(value)
	}
}

impl<T: IntoValue> IntoValue for Vec<T> {
	fn into_value(self) -> Value {
		Value::List(self.into_iter().map(IntoValue::into_value).collect())
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	const TYPE_NAME: &'static str = "list";

	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::List(items) => items.into_iter().map(T::from_value).collect(),
			other => Err(mismatch("list", &other)),
		}
	}
}

impl<T: IntoValue> IntoValue for Option<T> {
	fn into_value(self) -> Value {
		self.map_or(Value::None, IntoValue::into_value)
	}
}

impl<T: FromValue> FromValue for Option<T> {
	const TYPE_NAME: &'static str = T::TYPE_NAME;

	fn from_value(value: Value) -> Result<Self, ValueError> {
		match value {
			Value::None => Ok(None),
			other => T::from_value(other).map(Some),
		}
	}
}

/// Removes the top `n` slots, oldest first.
fn take_top(stack: &mut Stack, n: usize) -> Result<std::vec::Drain<'_, Value>, ValueError> {
	let available = stack.len();
	if available < n {
		return Err(ValueError::StackUnderflow {
			needed: n,
			available,
		});
	}
	Ok(stack.drain(available - n..))
}

/// A typed argument tuple a kernel can be called with.
pub trait ArgumentList: TagSource + Sized + 'static {
	/// Number of stack slots the tuple occupies.
	const LEN: usize;

	/// Pushes each element in order.
	fn push_onto(self, stack: &mut Stack);

	/// Pops `LEN` slots and converts them.
	fn pop_from(stack: &mut Stack) -> Result<Self, ValueError>;
}

/// A typed return shape a kernel can produce.
pub trait ReturnList: Sized + 'static {
	/// Number of stack slots the return occupies.
	const LEN: usize;

	fn push_onto(self, stack: &mut Stack);

	fn pop_from(stack: &mut Stack) -> Result<Self, ValueError>;
}

macro_rules! tuple_lists {
	($len:expr; $($name:ident),*) => {
		impl<$($name: TagSource),*> TagSource for ($($name,)*) {
			#[allow(non_snake_case, unused_variables)]
			fn collect_tags(&self, acc: &mut TypeTagSet) {
				let ($($name,)*) = self;
				$($name.collect_tags(acc);)*
			}
		}

		impl<$($name),*> ArgumentList for ($($name,)*)
		where
			$($name: TagSource + IntoValue + FromValue + 'static,)*
		{
			const LEN: usize = $len;

			#[allow(non_snake_case, unused_variables)]
			fn push_onto(self, stack: &mut Stack) {
				let ($($name,)*) = self;
				$(stack.push($name.into_value());)*
			}

			#[allow(unused_mut, unused_variables)]
			fn pop_from(stack: &mut Stack) -> Result<Self, ValueError> {
				let mut slots = take_top(stack, $len)?;
				Ok(($(
					$name::from_value(slots.next().unwrap_or_default())?,
				)*))
			}
		}

		impl<$($name),*> ReturnList for ($($name,)*)
		where
			$($name: IntoValue + FromValue + 'static,)*
		{
			const LEN: usize = $len;

			#[allow(non_snake_case, unused_variables)]
			fn push_onto(self, stack: &mut Stack) {
				let ($($name,)*) = self;
				$(stack.push($name.into_value());)*
			}

			#[allow(unused_mut, unused_variables)]
			fn pop_from(stack: &mut Stack) -> Result<Self, ValueError> {
				let mut slots = take_top(stack, $len)?;
				Ok(($(
					$name::from_value(slots.next().unwrap_or_default())?,
				)*))
			}
		}
	};
}

tuple_lists!(0;);
tuple_lists!(1; A);
tuple_lists!(2; A, B);
tuple_lists!(3; A, B, C);
tuple_lists!(4; A, B, C, D);
tuple_lists!(5; A, B, C, D, E);
tuple_lists!(6; A, B, C, D, E, F);

macro_rules! single_return {
	($($ty:ty),* $(,)?) => {
		$(
			impl ReturnList for $ty {
				const LEN: usize = 1;

				fn push_onto(self, stack: &mut Stack) {
					stack.push(self.into_value());
				}

				fn pop_from(stack: &mut Stack) -> Result<Self, ValueError> {
					let slot = stack.pop().ok_or(ValueError::StackUnderflow {
						needed: 1,
						available: 0,
					})?;
					<$ty>::from_value(slot)
				}
			}
		)*
	};
}

single_return!(bool, i64, f64, String, Arc<str>, TaggedValue, TagOptions, Value);

impl<T: IntoValue + FromValue + 'static> ReturnList for Vec<T> {
	const LEN: usize = 1;

	fn push_onto(self, stack: &mut Stack) {
		stack.push(self.into_value());
	}

	fn pop_from(stack: &mut Stack) -> Result<Self, ValueError> {
		let slot = stack.pop().ok_or(ValueError::StackUnderflow {
			needed: 1,
			available: 0,
		})?;
		Self::from_value(slot)
	}
}

impl<T: IntoValue + FromValue + 'static> ReturnList for Option<T> {
	const LEN: usize = 1;

	fn push_onto(self, stack: &mut Stack) {
		stack.push(self.into_value());
	}

	fn pop_from(stack: &mut Stack) -> Result<Self, ValueError> {
		let slot = stack.pop().ok_or(ValueError::StackUnderflow {
			needed: 1,
			available: 0,
		})?;
		Self::from_value(slot)
	}
}
