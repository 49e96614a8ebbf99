use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use switchyard_primitives::{
	ArgType, OperatorName, OperatorOptions, Schema, TagOptions, TaggedValue, TypeTag, Value, ValueError,
};

use super::*;
use crate::Dispatcher;
use crate::error::KernelError;

fn handle(dispatcher: &Dispatcher) -> OperatorHandle {
	let schema = Schema::new(OperatorName::new("test", "scale"))
		.arg("self", ArgType::Tagged)
		.arg("factor", ArgType::Int)
		.ret(ArgType::Int);
	let (op, scope) = dispatcher
		.register_schema(schema, OperatorOptions::default())
		.unwrap();
	scope.disarm();
	op
}

fn scale_kernel() -> KernelFunction {
	KernelFunction::from_typed(|(_x, factor): (TaggedValue, i64)| factor * 2)
}

#[test]
fn test_typed_kernel_boxed_form() {
	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	let kernel = scale_kernel();

	let mut stack = vec![Value::Tagged(TaggedValue::marker(TypeTag::Cpu)), Value::Int(21)];
	kernel.call_boxed(&op, &mut stack).unwrap();
	assert_eq!(stack, vec![Value::Int(42)]);
}

#[test]
fn test_typed_kernel_unboxed_form() {
	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	let kernel = scale_kernel();

	assert!(kernel.has_unboxed());
	assert!(kernel.unboxed::<(TaggedValue, i64), i64>().is_some());
	assert!(kernel.unboxed::<(TaggedValue, i64), bool>().is_none());
	let out: i64 = kernel
		.call_unboxed(&op, (TaggedValue::marker(TypeTag::Cpu), 5_i64))
		.unwrap();
	assert_eq!(out, 10);
}

#[test]
fn test_boxed_kernel_serves_typed_callers() {
	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	let kernel = KernelFunction::from_boxed(|_, stack| {
		let factor = stack.pop().and_then(|v| v.as_int()).unwrap_or_default();
		stack.pop();
		stack.push(Value::Int(factor + 1));
		Ok(())
	});

	assert!(!kernel.has_unboxed());
	assert_eq!(kernel.signature(), None);
	let out: i64 = kernel
		.call_unboxed(&op, (TaggedValue::marker(TypeTag::Cpu), 1_i64))
		.unwrap();
	assert_eq!(out, 2);
}

#[test]
fn test_mismatched_signature_marshals_through_boxed_form() {
	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	let kernel = scale_kernel();

	// Same slots, different return type: the boxed form runs and the pop fails.
	let err = kernel
		.call_unboxed::<(TaggedValue, i64), bool>(&op, (TaggedValue::marker(TypeTag::Cpu), 1))
		.unwrap_err();
	assert_eq!(
		err,
		KernelError::Value(ValueError::TypeMismatch {
			expected: "bool",
			found: "int",
		})
	);
}

#[test]
fn test_boxed_form_reports_bad_arguments() {
	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	let kernel = scale_kernel();

	let mut stack = vec![Value::Options(TagOptions::new(TypeTag::Cpu)), Value::Int(1)];
	let err = kernel.call_boxed(&op, &mut stack).unwrap_err();
	assert_eq!(
		err,
		KernelError::Value(ValueError::TypeMismatch {
			expected: "Tagged",
			found: "TagOptions",
		})
	);
}

#[test]
fn test_clones_share_body() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let kernel = KernelFunction::from_boxed(move |_, _| {
		counter.fetch_add(1, Ordering::Relaxed);
		Ok(())
	});
	let copy = kernel.clone();
	assert!(kernel.ptr_eq(&copy));
	assert!(!kernel.ptr_eq(&scale_kernel()));

	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	kernel.call_boxed(&op, &mut Vec::new()).unwrap();
	copy.call_boxed(&op, &mut Vec::new()).unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn test_kernel_receives_handle() {
	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	let kernel = KernelFunction::from_boxed(|op, stack| {
		stack.push(Value::Str(op.name().to_string().into()));
		Ok(())
	});
	let mut stack = Vec::new();
	kernel.call_boxed(&op, &mut stack).unwrap();
	assert_eq!(stack, vec![Value::Str("test::scale".into())]);
}

#[test]
fn test_failing_kernel() {
	let dispatcher = Dispatcher::new();
	let op = handle(&dispatcher);
	let kernel = KernelFunction::from_boxed(|_, _| Err(KernelError::failed("out of memory")));
	let err = kernel.call_boxed(&op, &mut Vec::new()).unwrap_err();
	assert_eq!(err.to_string(), "out of memory");
}
