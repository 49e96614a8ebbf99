use switchyard_primitives::{ArgType, OperatorName, OperatorOptions, Schema, TaggedValue, TypeTag};

use crate::{Dispatcher, KernelFunction, RegistrationScope};

fn register(dispatcher: &Dispatcher, name: &str) -> (crate::OperatorHandle, RegistrationScope) {
	let schema = Schema::new(OperatorName::new("inv", name))
		.arg("self", ArgType::Tagged)
		.ret(ArgType::Int);
	dispatcher
		.register_schema(schema, OperatorOptions::default())
		.expect("fresh name registers")
}

fn constant(value: i64) -> KernelFunction {
	KernelFunction::from_typed(move |(_x,): (TaggedValue,)| value)
}

/// Must keep handles valid and pointing at the same entry across arena growth.
///
/// - Enforced in: `OperatorRegistry::register_schema`, `OperatorHandle`
/// - Failure symptom: a handle obtained early dispatches to another operator's
///   kernels once the registry has grown.
#[cfg_attr(test, test)]
pub(crate) fn test_handles_survive_growth() {
	let dispatcher = Dispatcher::new();
	let (first, _scope) = register(&dispatcher, "first");
	let _kernel = dispatcher.register_kernel(&first, TypeTag::Cpu, constant(7));

	let scopes: Vec<_> = (0..512)
		.map(|i| register(&dispatcher, &format!("op{i}")).1)
		.collect();

	assert_eq!(dispatcher.find_schema(first.name()), Some(first.clone()));
	let out: i64 = first.call((TaggedValue::marker(TypeTag::Cpu),)).expect("kernel present");
	assert_eq!(out, 7);
	drop(scopes);
}

/// Must never leave a reused arena slot reachable through a stale handle.
///
/// - Enforced in: `RegistryState::owns`, `RegistryState::def_mut`
/// - Failure symptom: releasing an old scope removes a newer operator that
///   happens to occupy the same slot.
#[cfg_attr(test, test)]
pub(crate) fn test_stale_handle_cannot_touch_reused_slot() {
	let dispatcher = Dispatcher::new();
	let (old, old_scope) = register(&dispatcher, "old");
	let stale_kernel = dispatcher.register_kernel(&old, TypeTag::Cpu, constant(1));
	old_scope.release();

	let (new, _scope) = register(&dispatcher, "new");
	assert_eq!(old.id().slot, new.id().slot);
	assert_ne!(old.id(), new.id());

	let _new_kernel = dispatcher.register_kernel(&new, TypeTag::Cpu, constant(2));
	drop(stale_kernel);
	assert!(new.has_kernel(TypeTag::Cpu));
	assert!(!dispatcher.register_kernel(&old, TypeTag::Cpu, constant(3)).is_armed());
}

/// Must balance the registration count: every scope issued adds one and its
/// release subtracts one, whatever the release order.
///
/// - Enforced in: `OperatorEntry::acquire`, `OperatorEntry::release`, `OperatorRegistry::undo`
/// - Failure symptom: counts drift and diagnostics report phantom registrations.
#[cfg_attr(test, test)]
pub(crate) fn test_registration_count_balances() {
	let dispatcher = Dispatcher::new();
	let (op, schema_scope) = register(&dispatcher, "count");
	let a = dispatcher.register_kernel(&op, TypeTag::Cpu, constant(1));
	let b = dispatcher.register_kernel(&op, TypeTag::Cpu, constant(2));
	let c = dispatcher.register_catchall_kernel(&op, constant(3));
	assert_eq!(op.registration_count(), 4);

	drop(b);
	drop(schema_scope);
	drop(a);
	drop(c);
	assert_eq!(op.registration_count(), 0);
}

/// Must clear an operator's kernels when its last schema scope is released.
///
/// - Enforced in: `OperatorRegistry::deregister_schema`, `OperatorEntry::retire`
/// - Failure symptom: a re-registered operator inherits kernels from its
///   previous incarnation.
#[cfg_attr(test, test)]
pub(crate) fn test_schema_release_clears_kernels() {
	let dispatcher = Dispatcher::new();
	let (op, scope) = register(&dispatcher, "clear");
	let kernel = dispatcher.register_kernel(&op, TypeTag::Cpu, constant(1));
	drop(scope);

	assert!(!op.is_registered());
	assert!(op.kernel_table().is_empty());
	let (again, _scope) = register(&dispatcher, "clear");
	assert!(!again.has_kernel(TypeTag::Cpu));
	drop(kernel);
	assert!(again.is_registered());
}

/// Must not hold a table snapshot or the registry lock while a kernel runs.
///
/// - Enforced in: `OperatorHandle::call_boxed`, `OperatorHandle::call`
/// - Failure symptom: a kernel that registers another operator deadlocks.
#[cfg_attr(test, test)]
pub(crate) fn test_kernel_may_reenter_registry() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = register(&dispatcher, "outer");
	let inner = dispatcher.clone();
	let kernel = KernelFunction::from_typed(move |(_x,): (TaggedValue,)| {
		let (_handle, scope) = register(&inner, "inner");
		scope.disarm();
		inner.len() as i64
	});
	let _kernel = dispatcher.register_kernel(&op, TypeTag::Cpu, kernel);

	let out: i64 = op.call((TaggedValue::marker(TypeTag::Cpu),)).expect("kernel present");
	assert_eq!(out, 2);
}

fn owning(scope: RegistrationScope, value: i64) -> KernelFunction {
	KernelFunction::from_typed(move |(_x,): (TaggedValue,)| {
		let _ = &scope;
		value
	})
}

/// Must drop displaced kernels only after the registry lock is released.
///
/// - Enforced in: `OperatorRegistry::register_kernel`, `OperatorRegistry::undo`,
///   `OperatorRegistry::deregister_schema`
/// - Failure symptom: removing a kernel that owns a registration scope
///   deadlocks on the registry lock.
#[cfg_attr(test, test)]
pub(crate) fn test_displaced_kernels_drop_outside_lock() {
	let dispatcher = Dispatcher::new();
	let (op, op_scope) = register(&dispatcher, "owner");
	let (released, released_scope) = register(&dispatcher, "released");
	let (overwritten, overwritten_scope) = register(&dispatcher, "overwritten");
	let (retired, retired_scope) = register(&dispatcher, "retired");

	let cpu = dispatcher.register_kernel(&op, TypeTag::Cpu, owning(released_scope, 1));
	drop(cpu);
	assert!(!released.is_registered());

	let _first = dispatcher.register_kernel(&op, TypeTag::Cuda, owning(overwritten_scope, 2));
	let _second = dispatcher.register_kernel(&op, TypeTag::Cuda, constant(3));
	assert!(!overwritten.is_registered());

	let _catchall = dispatcher.register_catchall_kernel(&op, owning(retired_scope, 4));
	drop(op_scope);
	assert!(!retired.is_registered());
	assert!(!op.is_registered());
	assert_eq!(dispatcher.len(), 0);
}
