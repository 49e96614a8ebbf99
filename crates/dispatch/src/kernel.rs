//! Kernel callables.
//!
//! A [`KernelFunction`] always carries a boxed form that works on a [`Stack`].
//! Kernels built from a typed closure additionally keep that closure so typed
//! callers can skip marshalling. Both forms share the same body.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use switchyard_primitives::{ArgumentList, ReturnList, Stack};

use crate::entry::OperatorHandle;
use crate::error::KernelError;

/// Boxed calling convention: pop the operator's arguments, push its returns.
pub type BoxedKernelFn =
	dyn Fn(&OperatorHandle, &mut Stack) -> Result<(), KernelError> + Send + Sync;

/// Typed calling convention for a fixed signature.
pub type UnboxedKernelFn<Args, Ret> = dyn Fn(Args) -> Ret + Send + Sync;

/// A cheaply clonable kernel.
#[derive(Clone)]
pub struct KernelFunction {
	boxed: Arc<BoxedKernelFn>,
	/// `Arc<UnboxedKernelFn<Args, Ret>>` behind `Any`, keyed by signature.
	unboxed: Option<Arc<dyn Any + Send + Sync>>,
	signature: Option<&'static str>,
}

impl KernelFunction {
	/// Wraps a kernel that only speaks the boxed convention.
	pub fn from_boxed<F>(f: F) -> Self
	where
		F: Fn(&OperatorHandle, &mut Stack) -> Result<(), KernelError> + Send + Sync + 'static,
	{
		Self {
			boxed: Arc::new(f),
			unboxed: None,
			signature: None,
		}
	}

	/// Wraps a typed closure. The boxed form pops `Args`, calls `f` and pushes
	/// the result.
	pub fn from_typed<Args, Ret, F>(f: F) -> Self
	where
		Args: ArgumentList,
		Ret: ReturnList,
		F: Fn(Args) -> Ret + Send + Sync + 'static,
	{
		let typed: Arc<UnboxedKernelFn<Args, Ret>> = Arc::new(f);
		let body = Arc::clone(&typed);
		let boxed = move |_: &OperatorHandle, stack: &mut Stack| -> Result<(), KernelError> {
			let args = <Args as ArgumentList>::pop_from(stack)?;
			ReturnList::push_onto(body(args), stack);
			Ok(())
		};
		let erased: Arc<dyn Any + Send + Sync> = Arc::new(typed);
		Self {
			boxed: Arc::new(boxed),
			unboxed: Some(erased),
			signature: Some(type_name::<fn(Args) -> Ret>()),
		}
	}

	/// Runs the boxed form.
	#[inline]
	pub fn call_boxed(&self, op: &OperatorHandle, stack: &mut Stack) -> Result<(), KernelError> {
		(self.boxed)(op, stack)
	}

	/// Runs the typed form when the signature matches, otherwise marshals
	/// through the boxed form.
	pub fn call_unboxed<Args, Ret>(&self, op: &OperatorHandle, args: Args) -> Result<Ret, KernelError>
	where
		Args: ArgumentList,
		Ret: ReturnList,
	{
		if let Some(f) = self.unboxed::<Args, Ret>() {
			return Ok(f(args));
		}
		let mut stack = Stack::with_capacity(Args::LEN.max(Ret::LEN));
		ArgumentList::push_onto(args, &mut stack);
		self.call_boxed(op, &mut stack)?;
		Ok(<Ret as ReturnList>::pop_from(&mut stack)?)
	}

	/// The typed form, if this kernel was built with exactly this signature.
	pub fn unboxed<Args, Ret>(&self) -> Option<&UnboxedKernelFn<Args, Ret>>
	where
		Args: ArgumentList,
		Ret: ReturnList,
	{
		self.unboxed
			.as_deref()?
			.downcast_ref::<Arc<UnboxedKernelFn<Args, Ret>>>()
			.map(|f| &**f)
	}

	pub fn has_unboxed(&self) -> bool {
		self.unboxed.is_some()
	}

	/// Rust type of the typed signature, if any.
	pub fn signature(&self) -> Option<&'static str> {
		self.signature
	}

	/// Whether both values share the same body.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.boxed, &other.boxed)
	}
}

impl fmt::Debug for KernelFunction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KernelFunction")
			.field("signature", &self.signature)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests;
