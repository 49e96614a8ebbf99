//! Per-operator kernel table.
//!
//! One fixed slot per concrete [`TypeTag`] plus a catchall slot. A bitmask of
//! occupied tag slots is kept alongside so diagnostics and `len` never scan.
//! Tables are immutable once published; writers clone, edit and swap.

use std::sync::atomic::{AtomicU64, Ordering};

use switchyard_primitives::{TypeTag, TypeTagSet};

use crate::kernel::KernelFunction;

/// Identifies the registration that installed a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

impl RegistrationId {
	pub(crate) fn fresh() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// Outcome of writing a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
	/// The slot was empty.
	Inserted,
	/// A previous kernel was replaced.
	Overwrote,
	/// The tag has no slot ([`TypeTag::Undefined`]).
	Ignored,
}

#[derive(Debug, Clone)]
struct TableSlot {
	kernel: KernelFunction,
	registration: RegistrationId,
}

const SLOT_COUNT: usize = TypeTag::CONCRETE.len();

#[derive(Debug, Clone, Default)]
pub struct KernelTable {
	slots: [Option<TableSlot>; SLOT_COUNT],
	catchall: Option<TableSlot>,
	registered: TypeTagSet,
}

impl KernelTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Installs `kernel` for `tag`, replacing any previous kernel.
	pub fn set(&mut self, tag: TypeTag, kernel: KernelFunction, registration: RegistrationId) -> SlotWrite {
		let Some(index) = tag.slot() else {
			return SlotWrite::Ignored;
		};
		let previous = self.slots[index].replace(TableSlot {
			kernel,
			registration,
		});
		self.registered |= tag.as_set();
		if previous.is_some() {
			SlotWrite::Overwrote
		} else {
			SlotWrite::Inserted
		}
	}

	/// Removes the kernel for `tag`. Returns whether one was present.
	pub fn remove_if_exists(&mut self, tag: TypeTag) -> bool {
		let Some(index) = tag.slot() else {
			return false;
		};
		let removed = self.slots[index].take().is_some();
		assert_eq!(
			removed,
			self.registered.contains_tag(tag),
			"kernel table slot for {tag} disagrees with its registered set"
		);
		self.registered -= tag.as_set();
		removed
	}

	/// Removes the kernel for `tag` only if `registration` installed it.
	pub fn remove_if_owned(&mut self, tag: TypeTag, registration: RegistrationId) -> bool {
		let owned = tag
			.slot()
			.and_then(|index| self.slots[index].as_ref())
			.is_some_and(|slot| slot.registration == registration);
		owned && self.remove_if_exists(tag)
	}

	pub fn set_catchall(&mut self, kernel: KernelFunction, registration: RegistrationId) -> SlotWrite {
		match self.catchall.replace(TableSlot {
			kernel,
			registration,
		}) {
			Some(_) => SlotWrite::Overwrote,
			None => SlotWrite::Inserted,
		}
	}

	pub fn remove_catchall(&mut self) -> bool {
		self.catchall.take().is_some()
	}

	pub fn remove_catchall_if_owned(&mut self, registration: RegistrationId) -> bool {
		let owned = self
			.catchall
			.as_ref()
			.is_some_and(|slot| slot.registration == registration);
		owned && self.remove_catchall()
	}

	/// Drops every kernel, including the catchall.
	pub fn clear(&mut self) {
		*self = Self::default();
	}

	#[inline]
	pub fn lookup(&self, tag: TypeTag) -> Option<&KernelFunction> {
		let index = tag.slot()?;
		self.slots[index].as_ref().map(|slot| &slot.kernel)
	}

	#[inline]
	pub fn lookup_catchall(&self) -> Option<&KernelFunction> {
		self.catchall.as_ref().map(|slot| &slot.kernel)
	}

	/// Tags with a kernel. Iterates in ascending priority.
	pub fn registered_tags(&self) -> TypeTagSet {
		self.registered
	}

	pub fn has_catchall(&self) -> bool {
		self.catchall.is_some()
	}

	/// Number of tag-specific kernels; the catchall is not counted.
	pub fn len(&self) -> usize {
		self.registered.bits().count_ones() as usize
	}

	/// True when neither a tag kernel nor a catchall is installed.
	pub fn is_empty(&self) -> bool {
		self.registered.is_empty() && self.catchall.is_none()
	}
}
