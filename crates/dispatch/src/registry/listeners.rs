use std::sync::Arc;

use crate::entry::OperatorHandle;

/// Observer of operator registration and removal.
///
/// Callbacks run on the registering thread while the registry's write lock is
/// held. They may look operators up and call them, but must not register,
/// add listeners, or release a [`crate::RegistrationScope`].
pub trait RegistrationListener: Send + Sync {
	fn on_operator_registered(&self, op: &OperatorHandle);
	fn on_operator_deregistered(&self, op: &OperatorHandle);
}

/// Identifies one added listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners in the order they were added.
#[derive(Default)]
pub(crate) struct ListenerHub {
	listeners: Vec<(ListenerId, Arc<dyn RegistrationListener>)>,
	next_id: u64,
}

impl ListenerHub {
	pub(crate) fn add(&mut self, listener: Arc<dyn RegistrationListener>) -> ListenerId {
		let id = ListenerId(self.next_id);
		self.next_id += 1;
		self.listeners.push((id, listener));
		id
	}

	/// Takes the listener out, leaving the rest in order.
	pub(crate) fn remove(&mut self, id: ListenerId) -> Option<Arc<dyn RegistrationListener>> {
		let at = self.listeners.iter().position(|(other, _)| *other == id)?;
		Some(self.listeners.remove(at).1)
	}

	pub(crate) fn len(&self) -> usize {
		self.listeners.len()
	}

	pub(crate) fn notify_registered(&self, op: &OperatorHandle) {
		for (_, listener) in &self.listeners {
			listener.on_operator_registered(op);
		}
	}

	pub(crate) fn notify_deregistered(&self, op: &OperatorHandle) {
		for (_, listener) in &self.listeners {
			listener.on_operator_deregistered(op);
		}
	}
}
