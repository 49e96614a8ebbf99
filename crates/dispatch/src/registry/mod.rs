//! Operator registry.
//!
//! # Layout
//!
//! Entries live in a [`Slab`] arena guarded by one [`Mutex`] that serializes
//! every write: schema and kernel registration, scope release, and listener
//! changes. Lookups by name never take that lock; they read an immutable
//! name index published through [`ArcSwap`]. Each write that adds or removes an
//! operator builds a new index and swaps it in.
//!
//! # Identity
//!
//! Entries are reference counted, so an [`OperatorHandle`] stays valid across
//! any number of later insertions. Arena slots are reused after removal;
//! every slot access checks that the stored entry is the one the caller holds.
//!
//! # Drops
//!
//! Kernels and listeners are user closures and may own a [`RegistrationScope`].
//! Anything a write displaces (kernel tables, removed arena entries, listeners)
//! is dropped only after the state lock is released.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slab::Slab;
use switchyard_primitives::{OperatorName, OperatorOptions, Schema, TypeTag};

use crate::config::{DispatcherConfig, OptionsMismatch};
use crate::entry::{OperatorEntry, OperatorHandle, OperatorId};
use crate::error::RegistrationError;
use crate::kernel::KernelFunction;
use crate::scope::{RegistrationScope, ScopeAction};
use crate::table::{RegistrationId, SlotWrite};

mod listeners;

pub use listeners::{ListenerId, RegistrationListener};
pub(crate) use listeners::ListenerHub;

/// Keys are shared so republishing the index copies pointers, not strings.
type NameIndex = FxHashMap<Arc<OperatorName>, OperatorHandle>;

struct OperatorDef {
	handle: OperatorHandle,
	/// Outstanding schema scopes. The entry is removed when this reaches zero.
	schema_refs: usize,
}

struct RegistryState {
	operators: Slab<OperatorDef>,
	next_ordinal: u64,
	listeners: ListenerHub,
}

impl RegistryState {
	/// The arena entry for `op`, if `op` is still registered here.
	fn def_mut(&mut self, op: &OperatorHandle) -> Option<&mut OperatorDef> {
		self.operators
			.get_mut(op.id().slot as usize)
			.filter(|def| def.handle == *op)
	}

	fn owns(&self, op: &OperatorHandle) -> bool {
		self.operators
			.get(op.id().slot as usize)
			.is_some_and(|def| def.handle == *op)
	}

	/// Live operators in registration order.
	fn handles_by_ordinal(&self) -> Vec<&OperatorHandle> {
		let mut handles: Vec<_> = self.operators.iter().map(|(_, def)| &def.handle).collect();
		handles.sort_by_key(|handle| handle.id().ordinal);
		handles
	}
}

pub(crate) struct OperatorRegistry {
	config: DispatcherConfig,
	state: Mutex<RegistryState>,
	index: ArcSwap<NameIndex>,
}

impl OperatorRegistry {
	pub(crate) fn new(config: DispatcherConfig) -> Self {
		let capacity = config.expected_operators;
		let mut index = NameIndex::default();
		index.reserve(capacity);
		Self {
			state: Mutex::new(RegistryState {
				operators: Slab::with_capacity(capacity),
				next_ordinal: 0,
				listeners: ListenerHub::default(),
			}),
			index: ArcSwap::from_pointee(index),
			config,
		}
	}

	pub(crate) fn config(&self) -> &DispatcherConfig {
		&self.config
	}

	pub(crate) fn find(&self, name: &OperatorName) -> Option<OperatorHandle> {
		self.index.load().get(name).cloned()
	}

	pub(crate) fn len(&self) -> usize {
		self.index.load().len()
	}

	pub(crate) fn operator_names(&self) -> Vec<OperatorName> {
		let index = self.index.load();
		let mut handles: Vec<_> = index.values().collect();
		handles.sort_by_key(|handle| handle.id().ordinal);
		handles.into_iter().map(|handle| handle.name().clone()).collect()
	}

	pub(crate) fn listener_count(&self) -> usize {
		self.state.lock().listeners.len()
	}

	/// Copies the name index, applies `edit`, and publishes the copy.
	///
	/// Only called with the state lock held.
	fn republish(&self, edit: impl FnOnce(&mut NameIndex)) {
		let mut next = NameIndex::clone(&self.index.load());
		edit(&mut next);
		self.index.store(Arc::new(next));
	}

	pub(crate) fn register_schema(
		self: &Arc<Self>,
		schema: Schema,
		options: OperatorOptions,
	) -> Result<(OperatorHandle, RegistrationScope), RegistrationError> {
		let mut guard = self.state.lock();
		let state = &mut *guard;

		if let Some(existing) = self.find(schema.name()) {
			if *existing.schema() != schema {
				return Err(RegistrationError::SchemaConflict {
					name: schema.name().clone(),
					existing: Box::new(existing.schema().clone()),
					incoming: Box::new(schema),
				});
			}
			if *existing.options() != options {
				match self.config.options_mismatch {
					OptionsMismatch::Reject => {
						return Err(RegistrationError::OptionsConflict {
							name: schema.name().clone(),
							existing: *existing.options(),
							incoming: options,
						});
					}
					OptionsMismatch::Warn => {
						tracing::warn!(
							operator = %schema.name(),
							existing = ?existing.options(),
							incoming = ?options,
							"operator registered again with different options; keeping the first"
						);
					}
				}
			}
			if let Some(def) = state.def_mut(&existing) {
				def.schema_refs += 1;
			}
			existing.entry().acquire();
			let scope = RegistrationScope::new(ScopeAction::Schema(existing.clone()), self);
			return Ok((existing, scope));
		}

		let slot = state.operators.vacant_entry();
		let id = OperatorId {
			slot: slot.key() as u32,
			ordinal: state.next_ordinal,
		};
		let handle = OperatorHandle::new(OperatorEntry::new(id, schema, options));
		handle.entry().acquire();
		slot.insert(OperatorDef {
			handle: handle.clone(),
			schema_refs: 1,
		});
		state.next_ordinal += 1;
		self.republish(|index| {
			index.insert(Arc::new(handle.name().clone()), handle.clone());
		});

		tracing::debug!(operator = %handle.name(), slot = id.slot, "registered operator");
		state.listeners.notify_registered(&handle);

		let scope = RegistrationScope::new(ScopeAction::Schema(handle.clone()), self);
		Ok((handle, scope))
	}

	pub(crate) fn register_kernel(
		self: &Arc<Self>,
		op: &OperatorHandle,
		tag: TypeTag,
		kernel: KernelFunction,
	) -> RegistrationScope {
		let state = self.state.lock();
		if !state.owns(op) {
			drop(state);
			tracing::warn!(operator = %op.name(), %tag, "kernel registered for an operator that is not registered; ignoring");
			return RegistrationScope::inert();
		}
		if !tag.is_concrete() {
			tracing::warn!(operator = %op.name(), %tag, "kernels can only be registered for concrete tags; ignoring");
			return RegistrationScope::inert();
		}

		let registration = RegistrationId::fresh();
		let (write, displaced) = op.entry().update_table(|table| table.set(tag, kernel, registration));
		op.entry().acquire();
		drop(state);
		drop(displaced);
		if write == SlotWrite::Overwrote && self.config.warn_on_kernel_overwrite {
			tracing::warn!(
				operator = %op.name(),
				%tag,
				"overwriting an existing kernel; the newer registration takes precedence"
			);
		}
		RegistrationScope::new(
			ScopeAction::Kernel {
				op: op.clone(),
				tag,
				registration,
			},
			self,
		)
	}

	pub(crate) fn register_catchall(self: &Arc<Self>, op: &OperatorHandle, kernel: KernelFunction) -> RegistrationScope {
		let state = self.state.lock();
		if !state.owns(op) {
			drop(state);
			tracing::warn!(operator = %op.name(), "catchall kernel registered for an operator that is not registered; ignoring");
			return RegistrationScope::inert();
		}

		let registration = RegistrationId::fresh();
		let (write, displaced) = op.entry().update_table(|table| table.set_catchall(kernel, registration));
		op.entry().acquire();
		drop(state);
		drop(displaced);
		if write == SlotWrite::Overwrote && self.config.warn_on_kernel_overwrite {
			tracing::warn!(
				operator = %op.name(),
				"overwriting an existing catchall kernel; the newer registration takes precedence"
			);
		}
		RegistrationScope::new(ScopeAction::Catchall { op: op.clone(), registration }, self)
	}

	pub(crate) fn add_listener(self: &Arc<Self>, listener: Arc<dyn RegistrationListener>) -> RegistrationScope {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		let id = state.listeners.add(Arc::clone(&listener));
		let existing = state.handles_by_ordinal();
		tracing::debug!(listener = ?id, replayed = existing.len(), "added registration listener");
		for handle in existing {
			listener.on_operator_registered(handle);
		}
		RegistrationScope::new(ScopeAction::Listener(id), self)
	}

	/// Undoes one scope's contribution. Targets that are already gone are
	/// skipped.
	pub(crate) fn undo(&self, action: ScopeAction) {
		match action {
			ScopeAction::Schema(op) => self.deregister_schema(&op),
			ScopeAction::Kernel { op, tag, registration } => {
				let state = self.state.lock();
				op.entry().release();
				if !op.is_registered() {
					drop(state);
					tracing::trace!(operator = %op.name(), %tag, "kernel scope outlived its operator");
					return;
				}
				let (removed, displaced) = op.entry().update_table(|table| table.remove_if_owned(tag, registration));
				drop(state);
				drop(displaced);
				if !removed {
					tracing::trace!(operator = %op.name(), %tag, "kernel slot was overwritten; nothing to remove");
				}
			}
			ScopeAction::Catchall { op, registration } => {
				let state = self.state.lock();
				op.entry().release();
				if !op.is_registered() {
					drop(state);
					tracing::trace!(operator = %op.name(), "catchall scope outlived its operator");
					return;
				}
				let (removed, displaced) = op.entry().update_table(|table| table.remove_catchall_if_owned(registration));
				drop(state);
				drop(displaced);
				if !removed {
					tracing::trace!(operator = %op.name(), "catchall slot was overwritten; nothing to remove");
				}
			}
			ScopeAction::Listener(id) => {
				let removed = self.state.lock().listeners.remove(id);
				if let Some(listener) = removed {
					tracing::debug!(listener = ?id, "removed registration listener");
					drop(listener);
				}
			}
		}
	}

	fn deregister_schema(&self, op: &OperatorHandle) {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		let Some(def) = state.def_mut(op) else {
			tracing::trace!(operator = %op.name(), "schema scope outlived its operator");
			return;
		};
		op.entry().release();
		def.schema_refs -= 1;
		if def.schema_refs > 0 {
			return;
		}

		let def = state.operators.remove(op.id().slot as usize);
		let retired = def.handle.entry().retire();
		self.republish(|index| {
			index.remove(def.handle.name());
		});
		tracing::debug!(operator = %op.name(), "deregistered operator");
		state.listeners.notify_deregistered(&def.handle);
		drop(guard);
		drop(retired);
		drop(def);
	}
}
