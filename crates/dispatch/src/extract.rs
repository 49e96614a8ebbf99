//! Dispatch tag extraction.
//!
//! Extraction folds every tag embedded in the call's arguments into one
//! [`TypeTagSet`], applies the thread-local override, and keeps the
//! highest-priority member. It runs once per call and touches nothing but the
//! arguments and a thread-local `Cell`.

use switchyard_primitives::{Schema, Stack, TagSource, TypeTag, TypeTagSet};

use crate::local::{LocalTagSets, local_tag_sets};

/// Reduces argument tags under an explicit override state.
#[inline]
pub fn compute_dispatch_tag(arg_tags: TypeTagSet, local: LocalTagSets) -> TypeTag {
	local.apply(arg_tags).highest_priority()
}

/// Reduces argument tags under the current thread's override state.
#[inline]
pub fn dispatch_tag(arg_tags: TypeTagSet) -> TypeTag {
	compute_dispatch_tag(arg_tags, local_tag_sets())
}

/// Per-operator extractor derived from the schema's arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchKeyExtractor {
	num_args: usize,
}

impl DispatchKeyExtractor {
	pub fn for_schema(schema: &Schema) -> Self {
		Self {
			num_args: schema.arity(),
		}
	}

	/// Number of stack slots the boxed convention reads.
	pub fn num_args(&self) -> usize {
		self.num_args
	}

	/// Tags of the top `num_args` stack slots, or `None` if the stack is shorter.
	pub fn boxed_tags(&self, stack: &Stack) -> Option<TypeTagSet> {
		let start = stack.len().checked_sub(self.num_args)?;
		let mut acc = TypeTagSet::empty();
		for value in &stack[start..] {
			value.collect_tags(&mut acc);
		}
		Some(acc)
	}

	/// Tags of a typed argument tuple.
	#[inline]
	pub fn unboxed_tags<A: TagSource>(&self, args: &A) -> TypeTagSet {
		args.tag_set()
	}
}
