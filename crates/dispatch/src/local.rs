//! Per-thread include/exclude tag adjustments.
//!
//! Every dispatch on a thread combines the argument-derived tags with this
//! thread's state as `(arguments | included) - excluded`. The state is a pair of
//! fixed-size sets in a `Cell`; reading it never allocates or locks.

use std::cell::Cell;
use std::marker::PhantomData;

use switchyard_primitives::{TypeTag, TypeTagSet};

/// The current thread's override state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalTagSets {
	/// Tags added to every dispatch on this thread.
	pub included: TypeTagSet,
	/// Tags removed from every dispatch on this thread.
	pub excluded: TypeTagSet,
}

impl LocalTagSets {
	pub const EMPTY: Self = Self {
		included: TypeTagSet::empty(),
		excluded: TypeTagSet::empty(),
	};

	/// Applies this override to argument-derived tags.
	#[inline]
	pub fn apply(self, arg_tags: TypeTagSet) -> TypeTagSet {
		(arg_tags | self.included) - self.excluded
	}
}

thread_local! {
	static LOCAL_TAG_SETS: Cell<LocalTagSets> = const { Cell::new(LocalTagSets::EMPTY) };
}

/// Returns this thread's override state.
#[inline]
pub fn local_tag_sets() -> LocalTagSets {
	LOCAL_TAG_SETS.with(Cell::get)
}

/// Replaces this thread's override state.
pub fn set_local_tag_sets(sets: LocalTagSets) {
	LOCAL_TAG_SETS.with(|cell| cell.set(sets));
}

fn update(f: impl FnOnce(&mut LocalTagSets)) {
	LOCAL_TAG_SETS.with(|cell| {
		let mut sets = cell.get();
		f(&mut sets);
		cell.set(sets);
	});
}

/// Adds one tag to this thread's included set until dropped.
///
/// On drop only that tag's bit is restored, so guards for different tags
/// nest in any order.
#[must_use = "the tag is included only while the guard is alive"]
#[derive(Debug)]
pub struct IncludeTagGuard {
	tag: TypeTag,
	was_included: bool,
	_not_send: PhantomData<*const ()>,
}

impl IncludeTagGuard {
	pub fn new(tag: TypeTag) -> Self {
		let was_included = local_tag_sets().included.contains_tag(tag);
		update(|sets| sets.included |= tag.as_set());
		Self {
			tag,
			was_included,
			_not_send: PhantomData,
		}
	}
}

impl Drop for IncludeTagGuard {
	fn drop(&mut self) {
		if !self.was_included {
			let bit = self.tag.as_set();
			update(|sets| sets.included -= bit);
		}
	}
}

/// Adds one tag to this thread's excluded set until dropped.
#[must_use = "the tag is excluded only while the guard is alive"]
#[derive(Debug)]
pub struct ExcludeTagGuard {
	tag: TypeTag,
	was_excluded: bool,
	_not_send: PhantomData<*const ()>,
}

impl ExcludeTagGuard {
	pub fn new(tag: TypeTag) -> Self {
		let was_excluded = local_tag_sets().excluded.contains_tag(tag);
		update(|sets| sets.excluded |= tag.as_set());
		Self {
			tag,
			was_excluded,
			_not_send: PhantomData,
		}
	}
}

impl Drop for ExcludeTagGuard {
	fn drop(&mut self) {
		if !self.was_excluded {
			let bit = self.tag.as_set();
			update(|sets| sets.excluded -= bit);
		}
	}
}
