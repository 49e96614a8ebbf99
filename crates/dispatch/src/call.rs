//! Call paths.
//!
//! Every call resolves its kernel from one table snapshot, then drops the
//! snapshot before the kernel runs. Kernels are free to register or call other
//! operators.

use std::any::type_name;

use switchyard_primitives::{ArgumentList, ReturnList, Stack};

use crate::entry::OperatorHandle;
use crate::error::{DispatchError, KernelError};
use crate::extract::dispatch_tag;
use crate::kernel::KernelFunction;

impl OperatorHandle {
	/// Boxed call. Arguments are the top `arity` stack slots; on success they
	/// have been replaced by the kernel's returns.
	pub fn call_boxed(&self, stack: &mut Stack) -> Result<(), DispatchError> {
		let extractor = self.extractor();
		let Some(arg_tags) = extractor.boxed_tags(stack) else {
			return Err(DispatchError::StackUnderflow {
				operator: self.name().clone(),
				expected: extractor.num_args(),
				actual: stack.len(),
			});
		};
		let kernel = self.resolve(dispatch_tag(arg_tags))?;
		kernel
			.call_boxed(self, stack)
			.map_err(|source| self.kernel_failed(source))
	}

	/// Typed call. Uses the kernel's typed form when its signature matches
	/// `Args -> Ret`, otherwise goes through the boxed form.
	pub fn call<Args, Ret>(&self, args: Args) -> Result<Ret, DispatchError>
	where
		Args: ArgumentList,
		Ret: ReturnList,
	{
		let kernel = self.resolve_typed(&args)?;
		kernel
			.call_unboxed(self, args)
			.map_err(|source| self.kernel_failed(source))
	}

	/// Typed call that never marshals through the boxed form.
	pub fn call_unboxed_only<Args, Ret>(&self, args: Args) -> Result<Ret, DispatchError>
	where
		Args: ArgumentList,
		Ret: ReturnList,
	{
		let kernel = self.resolve_typed(&args)?;
		let Some(f) = kernel.unboxed::<Args, Ret>() else {
			let signature = type_name::<fn(Args) -> Ret>();
			tracing::debug!(operator = %self.name(), signature, "selected kernel has no matching typed form");
			return Err(DispatchError::UnboxedUnavailable {
				operator: self.name().clone(),
			});
		};
		Ok(f(args))
	}

	fn resolve_typed<Args: ArgumentList>(&self, args: &Args) -> Result<KernelFunction, DispatchError> {
		self.resolve(dispatch_tag(self.extractor().unboxed_tags(args)))
	}

	fn kernel_failed(&self, source: KernelError) -> DispatchError {
		DispatchError::Kernel {
			operator: self.name().clone(),
			source,
		}
	}
}
