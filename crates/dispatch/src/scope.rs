use std::sync::{Arc, Weak};

use switchyard_primitives::TypeTag;

use crate::entry::OperatorHandle;
use crate::registry::{ListenerId, OperatorRegistry};
use crate::table::RegistrationId;

/// The single contribution a scope undoes.
#[derive(Debug)]
pub(crate) enum ScopeAction {
	Schema(OperatorHandle),
	Kernel {
		op: OperatorHandle,
		tag: TypeTag,
		registration: RegistrationId,
	},
	Catchall {
		op: OperatorHandle,
		registration: RegistrationId,
	},
	Listener(ListenerId),
}

/// Token for one outstanding registration.
///
/// Dropping or [releasing](Self::release) the scope undoes exactly the
/// registration that produced it, once. Scopes may be released in any order,
/// from any thread, and after the dispatcher itself is gone; a scope whose
/// target no longer exists releases as a no-op.
#[must_use = "dropping a RegistrationScope immediately undoes the registration"]
#[derive(Debug)]
pub struct RegistrationScope {
	action: Option<ScopeAction>,
	registry: Weak<OperatorRegistry>,
}

impl RegistrationScope {
	pub(crate) fn new(action: ScopeAction, registry: &Arc<OperatorRegistry>) -> Self {
		Self {
			action: Some(action),
			registry: Arc::downgrade(registry),
		}
	}

	/// A scope with nothing to undo.
	pub(crate) fn inert() -> Self {
		Self {
			action: None,
			registry: Weak::new(),
		}
	}

	/// Whether releasing this scope would still undo something.
	pub fn is_armed(&self) -> bool {
		self.action.is_some()
	}

	/// Undoes the registration now.
	pub fn release(mut self) {
		self.release_now();
	}

	/// Keeps the registration for the rest of the dispatcher's lifetime.
	pub fn disarm(mut self) {
		self.action = None;
	}

	fn release_now(&mut self) {
		let Some(action) = self.action.take() else {
			return;
		};
		match self.registry.upgrade() {
			Some(registry) => registry.undo(action),
			None => tracing::trace!(?action, "dispatcher dropped before scope release"),
		}
	}
}

impl Drop for RegistrationScope {
	fn drop(&mut self) {
		self.release_now();
	}
}
