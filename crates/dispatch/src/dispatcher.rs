//! The [`Dispatcher`] façade.

use std::fmt;
use std::sync::Arc;

use switchyard_primitives::{ArgumentList, OperatorName, OperatorOptions, ReturnList, Schema, Stack, TypeTag};

use crate::config::DispatcherConfig;
use crate::entry::OperatorHandle;
use crate::error::{DispatchError, RegistrationError};
use crate::kernel::KernelFunction;
use crate::registry::{OperatorRegistry, RegistrationListener};
use crate::scope::RegistrationScope;

/// Registry of operators and their kernels, plus the call entry points.
///
/// A dispatcher is an explicit context object: construct one and share it.
/// Clones refer to the same registry. Registration methods return a
/// [`RegistrationScope`] that undoes the registration when dropped.
#[derive(Clone)]
pub struct Dispatcher {
	registry: Arc<OperatorRegistry>,
}

impl Dispatcher {
	pub fn new() -> Self {
		Self::with_config(DispatcherConfig::default())
	}

	pub fn with_config(config: DispatcherConfig) -> Self {
		Self {
			registry: Arc::new(OperatorRegistry::new(config)),
		}
	}

	pub fn config(&self) -> &DispatcherConfig {
		self.registry.config()
	}

	/// Registers `schema`, or adds a reference to an identical existing one.
	///
	/// The operator stays registered until every scope returned for its name
	/// has been released. A different schema under the same name fails with
	/// [`RegistrationError::SchemaConflict`] and leaves the existing operator
	/// untouched.
	pub fn register_schema(
		&self,
		schema: Schema,
		options: OperatorOptions,
	) -> Result<(OperatorHandle, RegistrationScope), RegistrationError> {
		self.registry.register_schema(schema, options)
	}

	/// Looks up a registered operator. Never blocks on writers.
	pub fn find_schema(&self, name: &OperatorName) -> Option<OperatorHandle> {
		self.registry.find(name)
	}

	/// Installs `kernel` for `tag`. An existing kernel for the same tag is
	/// replaced and a warning is logged.
	///
	/// Registering against an operator that is no longer registered, or for
	/// [`TypeTag::Undefined`], logs a warning and returns an inert scope.
	pub fn register_kernel(&self, op: &OperatorHandle, tag: TypeTag, kernel: KernelFunction) -> RegistrationScope {
		self.registry.register_kernel(op, tag, kernel)
	}

	/// Installs the kernel used when no tag-specific kernel matches.
	pub fn register_catchall_kernel(&self, op: &OperatorHandle, kernel: KernelFunction) -> RegistrationScope {
		self.registry.register_catchall(op, kernel)
	}

	pub fn call_boxed(&self, op: &OperatorHandle, stack: &mut Stack) -> Result<(), DispatchError> {
		op.call_boxed(stack)
	}

	pub fn call<Args, Ret>(&self, op: &OperatorHandle, args: Args) -> Result<Ret, DispatchError>
	where
		Args: ArgumentList,
		Ret: ReturnList,
	{
		op.call(args)
	}

	/// Like [`Dispatcher::call`] but fails with
	/// [`DispatchError::UnboxedUnavailable`] instead of marshalling through a
	/// boxed kernel.
	pub fn call_unboxed_only<Args, Ret>(&self, op: &OperatorHandle, args: Args) -> Result<Ret, DispatchError>
	where
		Args: ArgumentList,
		Ret: ReturnList,
	{
		op.call_unboxed_only(args)
	}

	/// Adds a listener and immediately replays every registered operator to
	/// it in registration order.
	pub fn add_registration_listener(&self, listener: Arc<dyn RegistrationListener>) -> RegistrationScope {
		self.registry.add_listener(listener)
	}

	/// Registered operator names in registration order.
	pub fn operator_names(&self) -> Vec<OperatorName> {
		self.registry.operator_names()
	}

	pub fn len(&self) -> usize {
		self.registry.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Default for Dispatcher {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatcher")
			.field("operators", &self.len())
			.field("listeners", &self.registry.listener_count())
			.field("config", self.config())
			.finish()
	}
}

#[cfg(test)]
mod tests;
