//! Operator entries and the handles that reference them.
//!
//! An [`OperatorEntry`] is allocated once per registered operator and never
//! moves: the registry and every [`OperatorHandle`] share it through an `Arc`.
//! Its kernel table is published through an [`ArcSwap`] so the call path reads
//! it without locking, while writers (serialized by the registry) replace it
//! wholesale.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use switchyard_primitives::{OperatorName, OperatorOptions, Schema, TypeTag, TypeTagSet};

use crate::error::DispatchError;
use crate::extract::DispatchKeyExtractor;
use crate::kernel::KernelFunction;
use crate::table::KernelTable;

/// Identity of an operator within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorId {
	/// Arena slot. Reused after the operator is removed.
	pub slot: u32,
	/// Registration order. Never reused.
	pub ordinal: u64,
}

pub(crate) struct OperatorEntry {
	id: OperatorId,
	schema: Schema,
	options: OperatorOptions,
	extractor: DispatchKeyExtractor,
	table: ArcSwap<KernelTable>,
	/// Outstanding schema and kernel scopes.
	refcount: AtomicUsize,
	live: AtomicBool,
}

impl OperatorEntry {
	pub(crate) fn new(id: OperatorId, schema: Schema, options: OperatorOptions) -> Self {
		let extractor = DispatchKeyExtractor::for_schema(&schema);
		Self {
			id,
			schema,
			options,
			extractor,
			table: ArcSwap::from_pointee(KernelTable::new()),
			refcount: AtomicUsize::new(0),
			live: AtomicBool::new(true),
		}
	}

	pub(crate) fn acquire(&self) {
		self.refcount.fetch_add(1, Ordering::AcqRel);
	}

	pub(crate) fn release(&self) {
		let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
		debug_assert!(prev > 0, "operator {} released more scopes than it issued", self.schema.name());
	}

	/// Clones the current table, edits the copy and publishes it. Returns the
	/// edit's result and the table it replaced.
	///
	/// Callers must hold the registry lock; concurrent writers would lose updates.
	/// The replaced table must be dropped after that lock is released.
	pub(crate) fn update_table<R>(&self, edit: impl FnOnce(&mut KernelTable) -> R) -> (R, Arc<KernelTable>) {
		let mut next = KernelTable::clone(&self.table.load());
		let out = edit(&mut next);
		(out, self.table.swap(Arc::new(next)))
	}

	/// Marks the entry removed and unpublishes every kernel. Returns the last
	/// published table.
	pub(crate) fn retire(&self) -> Arc<KernelTable> {
		self.live.store(false, Ordering::Release);
		self.table.swap(Arc::new(KernelTable::new()))
	}
}

/// Shared reference to a registered operator.
///
/// Handles stay valid for as long as they are held, regardless of how many
/// other operators are registered later. Once the operator's last schema
/// registration is released the handle still resolves its name and schema, but
/// [`OperatorHandle::is_registered`] turns false and its kernel table is empty.
#[derive(Clone)]
pub struct OperatorHandle {
	entry: Arc<OperatorEntry>,
}

impl OperatorHandle {
	pub(crate) fn new(entry: OperatorEntry) -> Self {
		Self {
			entry: Arc::new(entry),
		}
	}

	pub(crate) fn entry(&self) -> &OperatorEntry {
		&self.entry
	}

	pub fn id(&self) -> OperatorId {
		self.entry.id
	}

	pub fn name(&self) -> &OperatorName {
		self.entry.schema.name()
	}

	pub fn schema(&self) -> &Schema {
		&self.entry.schema
	}

	pub fn options(&self) -> &OperatorOptions {
		&self.entry.options
	}

	pub fn extractor(&self) -> &DispatchKeyExtractor {
		&self.entry.extractor
	}

	/// Whether the operator is still present in its registry.
	pub fn is_registered(&self) -> bool {
		self.entry.live.load(Ordering::Acquire)
	}

	/// Outstanding scopes (schema and kernel) that target this operator.
	pub fn registration_count(&self) -> usize {
		self.entry.refcount.load(Ordering::Acquire)
	}

	/// Snapshot of the kernel table as of this call.
	pub fn kernel_table(&self) -> Arc<KernelTable> {
		self.entry.table.load_full()
	}

	pub fn registered_tags(&self) -> TypeTagSet {
		self.entry.table.load().registered_tags()
	}

	pub fn has_kernel(&self, tag: TypeTag) -> bool {
		self.entry.table.load().lookup(tag).is_some()
	}

	pub fn has_catchall(&self) -> bool {
		self.entry.table.load().has_catchall()
	}

	/// Registered tags rendered as `[CPU, CUDA]`.
	pub fn list_kernels(&self) -> String {
		self.registered_tags().to_string()
	}

	/// Picks the kernel for `tag`: the tag's own kernel, then the catchall.
	pub(crate) fn resolve(&self, tag: TypeTag) -> Result<KernelFunction, DispatchError> {
		let table = self.entry.table.load();
		if let Some(kernel) = table.lookup(tag).or_else(|| table.lookup_catchall()) {
			return Ok(kernel.clone());
		}
		let registered = table.registered_tags();
		tracing::debug!(operator = %self.name(), %tag, %registered, "no kernel for dispatch tag");
		let operator = self.name().clone();
		Err(if tag.is_concrete() {
			DispatchError::NoKernelFound {
				operator,
				tag,
				registered,
			}
		} else {
			DispatchError::NoTaggedArguments {
				operator,
				registered,
			}
		})
	}
}

impl PartialEq for OperatorHandle {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.entry, &other.entry)
	}
}

impl Eq for OperatorHandle {}

impl Hash for OperatorHandle {
	fn hash<H: Hasher>(&self, state: &mut H) {
		Arc::as_ptr(&self.entry).hash(state);
	}
}

impl fmt::Debug for OperatorHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OperatorHandle")
			.field("name", self.name())
			.field("id", &self.entry.id)
			.field("registered", &self.is_registered())
			.finish()
	}
}
