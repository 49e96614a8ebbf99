use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use switchyard_primitives::{AliasAnalysisKind, ArgType, TaggedValue, Value};

use super::*;
use crate::config::OptionsMismatch;
use crate::error::KernelError;
use crate::local::ExcludeTagGuard;

fn unary(name: &str) -> Schema {
	Schema::new(OperatorName::new("test", name))
		.arg("self", ArgType::Tagged)
		.ret(ArgType::Str)
}

/// A kernel that returns `label` as a string.
fn labeled(label: &'static str) -> KernelFunction {
	KernelFunction::from_typed(move |(_x,): (TaggedValue,)| label.to_string())
}

fn tagged(tags: &[TypeTag]) -> TaggedValue {
	TaggedValue::new(tags.iter().copied().collect::<crate::primitives::TypeTagSet>(), ())
}

#[test]
fn test_register_and_find() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();

	let found = dispatcher.find_schema(&"test::relu".parse().unwrap()).unwrap();
	assert_eq!(found, op);
	assert!(op.is_registered());
	assert_eq!(dispatcher.len(), 1);
	assert!(dispatcher.find_schema(&OperatorName::new("test", "gelu")).is_none());
}

#[test]
fn test_schema_conflict_keeps_existing() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();

	let other = unary("relu").arg("inplace", ArgType::Bool);
	let err = dispatcher
		.register_schema(other, OperatorOptions::default())
		.unwrap_err();
	assert!(matches!(err, RegistrationError::SchemaConflict { .. }));
	assert_eq!(dispatcher.find_schema(op.name()).unwrap().schema(), &unary("relu"));
	assert_eq!(op.registration_count(), 1);
}

#[test]
fn test_duplicate_schema_shares_entry() {
	let dispatcher = Dispatcher::new();
	let (first, first_scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let (second, second_scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	assert_eq!(first, second);
	assert_eq!(first.registration_count(), 2);

	first_scope.release();
	assert!(second.is_registered());
	second_scope.release();
	assert!(!second.is_registered());
	assert!(dispatcher.is_empty());
}

#[rstest]
#[case(OptionsMismatch::Warn, true)]
#[case(OptionsMismatch::Reject, false)]
fn test_options_mismatch_policy(#[case] policy: OptionsMismatch, #[case] accepted: bool) {
	let dispatcher = Dispatcher::with_config(DispatcherConfig {
		options_mismatch: policy,
		..DispatcherConfig::default()
	});
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let pure = OperatorOptions::default().with_alias_analysis(AliasAnalysisKind::PureFunction);
	let result = dispatcher.register_schema(unary("relu"), pure);

	assert_eq!(result.is_ok(), accepted);
	if let Err(err) = &result {
		assert!(matches!(err, RegistrationError::OptionsConflict { .. }));
	}
	// First options always win.
	assert_eq!(op.options(), &OperatorOptions::default());
}

#[test]
fn test_priority_and_fallback() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let _cpu = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("cpu"));
	let autograd = dispatcher.register_kernel(&op, TypeTag::Autograd, labeled("autograd"));

	let arg = tagged(&[TypeTag::Cpu, TypeTag::Autograd]);
	let out: String = dispatcher.call(&op, (arg.clone(),)).unwrap();
	assert_eq!(out, "autograd");

	// Without its kernel the highest tag fails instead of falling through.
	autograd.release();
	let err = dispatcher.call::<_, String>(&op, (arg,)).unwrap_err();
	assert!(matches!(
		err,
		DispatchError::NoKernelFound {
			tag: TypeTag::Autograd,
			..
		}
	));
	let out: String = dispatcher.call(&op, (TaggedValue::marker(TypeTag::Cpu),)).unwrap();
	assert_eq!(out, "cpu");
}

#[test]
fn test_exclusion_skips_to_next_tag() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let _cpu = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("cpu"));
	let _autograd = dispatcher.register_kernel(&op, TypeTag::Autograd, labeled("autograd"));
	let arg = tagged(&[TypeTag::Cpu, TypeTag::Autograd]);

	{
		let _guard = ExcludeTagGuard::new(TypeTag::Autograd);
		let out: String = dispatcher.call(&op, (arg.clone(),)).unwrap();
		assert_eq!(out, "cpu");
	}
	let out: String = dispatcher.call(&op, (arg,)).unwrap();
	assert_eq!(out, "autograd");
	assert_eq!(op.list_kernels(), "[CPU, Autograd]");
}

#[test]
fn test_catchall_handles_everything() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let _catchall = dispatcher.register_catchall_kernel(&op, labeled("catchall"));

	for tag in [TypeTag::Cpu, TypeTag::Xla, TypeTag::Tracer] {
		let out: String = dispatcher.call(&op, (TaggedValue::marker(tag),)).unwrap();
		assert_eq!(out, "catchall");
	}
	let out: String = dispatcher.call(&op, (tagged(&[]),)).unwrap();
	assert_eq!(out, "catchall");
}

#[test]
fn test_missing_kernel_errors() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let _cuda = dispatcher.register_kernel(&op, TypeTag::Cuda, labeled("cuda"));
	let _cpu = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("cpu"));

	let err = dispatcher
		.call::<_, String>(&op, (TaggedValue::marker(TypeTag::Xla),))
		.unwrap_err();
	assert_eq!(
		err.to_string(),
		"could not find a kernel for operator test::relu with dispatch tag XLA; registered tags are [CPU, CUDA]"
	);

	let err = dispatcher.call::<_, String>(&op, (tagged(&[]),)).unwrap_err();
	assert!(matches!(err, DispatchError::NoTaggedArguments { .. }));
	assert!(err.to_string().contains("no tagged arguments"));
	assert_eq!(
		err.registered_tags(),
		Some(crate::primitives::TypeTagSet::CPU | crate::primitives::TypeTagSet::CUDA)
	);
}

#[test]
fn test_overwrite_then_release_in_any_order() {
	let _ = tracing_subscriber::fmt::try_init();
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let first = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("first"));
	let second = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("second"));

	let out: String = dispatcher.call(&op, (TaggedValue::marker(TypeTag::Cpu),)).unwrap();
	assert_eq!(out, "second");

	// The first scope no longer owns the slot.
	first.release();
	let out: String = dispatcher.call(&op, (TaggedValue::marker(TypeTag::Cpu),)).unwrap();
	assert_eq!(out, "second");

	second.release();
	assert!(!op.has_kernel(TypeTag::Cpu));
}

#[test]
fn test_boxed_call() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let _cpu = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("cpu"));

	let mut stack = vec![Value::Tagged(TaggedValue::marker(TypeTag::Cpu))];
	dispatcher.call_boxed(&op, &mut stack).unwrap();
	assert_eq!(stack, vec![Value::Str("cpu".into())]);

	let err = dispatcher.call_boxed(&op, &mut Vec::new()).unwrap_err();
	assert!(matches!(
		err,
		DispatchError::StackUnderflow {
			expected: 1,
			actual: 0,
			..
		}
	));
}

#[test]
fn test_unboxed_only_refuses_boxed_kernels() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let _cpu = dispatcher.register_kernel(
		&op,
		TypeTag::Cpu,
		KernelFunction::from_boxed(|_, stack| {
			stack.pop();
			stack.push(Value::Str("boxed".into()));
			Ok(())
		}),
	);
	let _cuda = dispatcher.register_kernel(&op, TypeTag::Cuda, labeled("typed"));

	let err = dispatcher
		.call_unboxed_only::<_, String>(&op, (TaggedValue::marker(TypeTag::Cpu),))
		.unwrap_err();
	assert!(matches!(err, DispatchError::UnboxedUnavailable { .. }));

	let out: String = dispatcher.call(&op, (TaggedValue::marker(TypeTag::Cpu),)).unwrap();
	assert_eq!(out, "boxed");
	let out: String = dispatcher
		.call_unboxed_only(&op, (TaggedValue::marker(TypeTag::Cuda),))
		.unwrap();
	assert_eq!(out, "typed");
}

#[test]
fn test_kernel_error_is_wrapped() {
	let dispatcher = Dispatcher::new();
	let (op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let _cpu = dispatcher.register_kernel(
		&op,
		TypeTag::Cpu,
		KernelFunction::from_boxed(|_, _| Err(KernelError::failed("bad input"))),
	);
	let err = dispatcher
		.call::<_, String>(&op, (TaggedValue::marker(TypeTag::Cpu),))
		.unwrap_err();
	assert_eq!(err.to_string(), "kernel for operator test::relu failed: bad input");
}

#[test]
fn test_registration_against_removed_operator_is_inert() {
	let dispatcher = Dispatcher::new();
	let (op, scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	drop(scope);

	let kernel_scope = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("cpu"));
	assert!(!kernel_scope.is_armed());
	assert!(!op.has_kernel(TypeTag::Cpu));

	let (live, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	assert_ne!(live, op);
	let undefined = dispatcher.register_kernel(&live, TypeTag::Undefined, labeled("none"));
	assert!(!undefined.is_armed());
}

#[test]
fn test_kernels_do_not_leak_across_dispatchers() {
	let a = Dispatcher::new();
	let b = Dispatcher::new();
	let (op_a, _sa) = a.register_schema(unary("relu"), OperatorOptions::default()).unwrap();
	let (op_b, _sb) = b.register_schema(unary("relu"), OperatorOptions::default()).unwrap();
	assert_ne!(op_a, op_b);

	let foreign = a.register_kernel(&op_b, TypeTag::Cpu, labeled("cpu"));
	assert!(!foreign.is_armed());
	assert!(!op_b.has_kernel(TypeTag::Cpu));
}

#[test]
fn test_clones_share_registry() {
	let dispatcher = Dispatcher::new();
	let clone = dispatcher.clone();
	let (_op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	assert_eq!(clone.operator_names(), vec![OperatorName::new("test", "relu")]);
}

#[derive(Default)]
struct Recorder {
	events: Mutex<Vec<String>>,
}

impl RegistrationListener for Recorder {
	fn on_operator_registered(&self, op: &OperatorHandle) {
		self.events.lock().push(format!("+{}", op.name()));
	}

	fn on_operator_deregistered(&self, op: &OperatorHandle) {
		self.events.lock().push(format!("-{}", op.name()));
	}
}

#[test]
fn test_listener_replay_and_removal() {
	let dispatcher = Dispatcher::new();
	let (_a, _sa) = dispatcher.register_schema(unary("a"), OperatorOptions::default()).unwrap();
	let (_b, sb) = dispatcher.register_schema(unary("b"), OperatorOptions::default()).unwrap();

	let recorder = Arc::new(Recorder::default());
	let listener_scope = dispatcher.add_registration_listener(recorder.clone());
	drop(sb);
	let (_c, _sc) = dispatcher.register_schema(unary("c"), OperatorOptions::default()).unwrap();
	listener_scope.release();
	let (_d, _sd) = dispatcher.register_schema(unary("d"), OperatorOptions::default()).unwrap();

	assert_eq!(
		*recorder.events.lock(),
		vec!["+test::a", "+test::b", "-test::b", "+test::c"]
	);
}

#[test]
fn test_scope_outlives_dispatcher() {
	let dispatcher = Dispatcher::new();
	let (op, scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let kernel = dispatcher.register_kernel(&op, TypeTag::Cpu, labeled("cpu"));
	drop(dispatcher);
	drop(kernel);
	drop(scope);
	assert_eq!(op.name(), &OperatorName::new("test", "relu"));
}

#[test]
fn test_debug_output() {
	let dispatcher = Dispatcher::new();
	let (_op, _scope) = dispatcher
		.register_schema(unary("relu"), OperatorOptions::default())
		.unwrap();
	let debug = format!("{dispatcher:?}");
	assert!(debug.contains("operators: 1"));
}
