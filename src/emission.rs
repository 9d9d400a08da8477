use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::observer::deliver;
use crate::{Fault, Observer, Subscription};

/// Outcome of one step of a composition.
#[derive(Clone, Debug)]
pub enum Emission<T> {
	Value(T),
	Completed,
	Fault(Fault),
}

pub(crate) type Sources = SmallVec<[Subscription; 4]>;

/// Per-subscriber end of a composition: forwards emissions downstream and
/// owns the subscriptions to every upstream source.
pub(crate) struct Sink<E: 'static> {
	downstream: Arc<dyn Observer<E>>,
	sources: Mutex<Sources>,
	done: AtomicBool,
}

impl<E: 'static> Sink<E> {
	pub(crate) fn new(downstream: Arc<dyn Observer<E>>) -> Arc<Self> {
		Arc::new(Sink {
			downstream,
			sources: Mutex::new(SmallVec::new()),
			done: AtomicBool::new(false),
		})
	}

	pub(crate) fn emit(&self, emission: Emission<E>) {
		if self.done.load(Ordering::Acquire) {
			return;
		}

		match emission {
			Emission::Value(value) => deliver(&*self.downstream, &value),
			Emission::Fault(fault) => self.downstream.on_error(&fault),
			Emission::Completed => {
				if !self.done.swap(true, Ordering::AcqRel) {
					self.release();
					self.downstream.on_completed();
				}
			}
		}
	}

	/// Takes ownership of the upstream subscriptions. If a source already
	/// completed while they were being set up, they are released at once.
	pub(crate) fn hold(&self, subscriptions: Sources) {
		let late = {
			let mut sources = self.sources.lock();
			if self.done.load(Ordering::Acquire) {
				subscriptions
			} else {
				sources.extend(subscriptions);
				SmallVec::new()
			}
		};

		for subscription in late {
			subscription.unsubscribe();
		}
	}

	/// Stops delivery without a terminal event.
	pub(crate) fn close(&self) {
		if !self.done.swap(true, Ordering::AcqRel) {
			self.release();
		}
	}

	fn release(&self) {
		let sources = std::mem::take(&mut *self.sources.lock());
		for subscription in sources {
			subscription.unsubscribe();
		}
	}

	/// `renew` subscribes the same downstream to the composition again.
	pub(crate) fn into_subscription(
		self: Arc<Self>,
		renew: impl Fn() -> Subscription + Send + Sync + 'static,
	) -> Subscription {
		Subscription::renewable(Some(Box::new(move || self.close())), renew)
	}
}

/// Observes one source of a composition. `step` turns a source value into
/// an emission, or into nothing when the value does not produce one yet.
pub(crate) struct SlotObserver<T, E: 'static, G> {
	sink: Arc<Sink<E>>,
	step: G,
	_marker: PhantomData<fn(&T)>,
}

impl<T, E, G> SlotObserver<T, E, G>
where
	T: 'static,
	E: 'static,
	G: Fn(&T) -> Option<Result<E, Fault>> + Send + Sync + 'static,
{
	pub(crate) fn new(sink: &Arc<Sink<E>>, step: G) -> Arc<dyn Observer<T>> {
		Arc::new(SlotObserver {
			sink: sink.clone(),
			step,
			_marker: PhantomData,
		})
	}
}

impl<T, E, G> Observer<T> for SlotObserver<T, E, G>
where
	T: 'static,
	E: 'static,
	G: Fn(&T) -> Option<Result<E, Fault>> + Send + Sync + 'static,
{
	fn on_next(&self, value: &T) -> Result<(), Fault> {
		match (self.step)(value) {
			Some(Ok(emitted)) => self.sink.emit(Emission::Value(emitted)),
			Some(Err(fault)) => self.sink.emit(Emission::Fault(fault)),
			None => {}
		}
		Ok(())
	}

	fn on_completed(&self) {
		self.sink.emit(Emission::Completed);
	}

	fn on_error(&self, fault: &Fault) {
		self.sink.emit(Emission::Fault(fault.clone()));
	}
}
