use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

type Teardown = Box<dyn FnOnce() + Send>;
type Renew = Box<dyn Fn() -> Subscription + Send + Sync>;

/// The relationship between one observer and one observable.
///
/// Subscriptions are not released on drop: call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
	body: Arc<SubscriptionBody>,
}

struct SubscriptionBody {
	teardown: Mutex<Option<Teardown>>,
	closed: AtomicBool,
	renew: Option<Renew>,
}

impl Subscription {
	pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
		Self::build(Some(Box::new(teardown)), None)
	}

	/// A subscription with nothing to release.
	pub fn empty() -> Self {
		Self::build(None, None)
	}

	pub(crate) fn renewable(
		teardown: Option<Teardown>,
		renew: impl Fn() -> Subscription + Send + Sync + 'static,
	) -> Self {
		Self::build(teardown, Some(Box::new(renew)))
	}

	/// Wraps this subscription so that [`Subscription::resubscribe`] runs
	/// `renew` instead.
	pub(crate) fn with_renew(
		self,
		renew: impl Fn() -> Subscription + Send + Sync + 'static,
	) -> Self {
		let teardown: Option<Teardown> = if self.is_closed() {
			None
		} else {
			Some(Box::new(move || self.unsubscribe()))
		};
		Self::renewable(teardown, renew)
	}

	fn build(teardown: Option<Teardown>, renew: Option<Renew>) -> Self {
		let closed = teardown.is_none();
		Subscription {
			body: Arc::new(SubscriptionBody {
				teardown: Mutex::new(teardown),
				closed: AtomicBool::new(closed),
				renew,
			}),
		}
	}

	/// Combines several subscriptions into one that releases all of them.
	pub fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
		let all: SmallVec<[Subscription; 4]> = subscriptions.into_iter().collect();
		Subscription::new(move || {
			for subscription in all {
				subscription.unsubscribe();
			}
		})
	}

	/// Stops delivery. Idempotent, and safe to call from inside the
	/// observer's own callback.
	pub fn unsubscribe(&self) {
		self.body.closed.store(true, Ordering::Release);
		// The lock is released before running the teardown so that a teardown
		// touching this subscription again does not deadlock.
		let teardown = self.body.teardown.lock().take();
		if let Some(teardown) = teardown {
			teardown();
		}
	}

	pub fn is_closed(&self) -> bool {
		self.body.closed.load(Ordering::Acquire)
	}

	/// Subscribes the same observer to the same source again.
	///
	/// Returns `None` for subscriptions that do not remember their source,
	/// such as [`Subscription::merge`] composites.
	pub fn resubscribe(&self) -> Option<Subscription> {
		self.body.renew.as_ref().map(|renew| renew())
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}
