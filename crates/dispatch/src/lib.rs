//! Operator dispatch runtime.
//!
//! A [`Dispatcher`] maps qualified operator names to per-backend kernels and,
//! on each call, picks one kernel from the backend tags carried by the
//! arguments:
//!
//! 1. Union the tags embedded in the arguments.
//! 2. Apply this thread's override: `(tags | included) - excluded`.
//! 3. Take the highest-priority tag and run its kernel, falling back to the
//!    operator's catchall kernel.
//!
//! Registration is scope based. Every registration returns a
//! [`RegistrationScope`] that undoes exactly that registration when dropped.
//!
//! ```
//! use switchyard_dispatch::{Dispatcher, KernelFunction};
//! use switchyard_dispatch::primitives::{
//! 	ArgType, OperatorName, OperatorOptions, Schema, TaggedValue, TypeTag,
//! };
//!
//! let dispatcher = Dispatcher::new();
//! let schema = Schema::new(OperatorName::new("demo", "neg"))
//! 	.arg("self", ArgType::Tagged)
//! 	.ret(ArgType::Int);
//! let (op, _schema_scope) = dispatcher
//! 	.register_schema(schema, OperatorOptions::default())
//! 	.unwrap();
//! let _cpu = dispatcher.register_kernel(
//! 	&op,
//! 	TypeTag::Cpu,
//! 	KernelFunction::from_typed(|(_x,): (TaggedValue,)| -1_i64),
//! );
//!
//! let out: i64 = dispatcher
//! 	.call(&op, (TaggedValue::marker(TypeTag::Cpu),))
//! 	.unwrap();
//! assert_eq!(out, -1);
//! ```

mod call;
mod config;
mod dispatcher;
mod entry;
mod error;
mod extract;
mod kernel;
mod local;
mod registry;
mod scope;
mod table;

#[cfg(test)]
mod invariants;

pub use config::{ConfigError, DispatcherConfig, OptionsMismatch};
pub use dispatcher::Dispatcher;
pub use entry::{OperatorHandle, OperatorId};
pub use error::{DispatchError, KernelError, RegistrationError};
pub use extract::{DispatchKeyExtractor, compute_dispatch_tag, dispatch_tag};
pub use kernel::{BoxedKernelFn, KernelFunction, UnboxedKernelFn};
pub use local::{ExcludeTagGuard, IncludeTagGuard, LocalTagSets, local_tag_sets, set_local_tag_sets};
pub use registry::{ListenerId, RegistrationListener};
pub use scope::RegistrationScope;
pub use switchyard_primitives as primitives;
pub use table::{KernelTable, RegistrationId, SlotWrite};
