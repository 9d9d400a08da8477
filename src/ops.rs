use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::combine::{try_combine_latest2, Combined};
use crate::observer::Callbacks;
use crate::{Fault, Observable, Observer, Subscription};

/// Composition helpers available on every [`Observable`].
///
/// Operators are cold: nothing is subscribed upstream until the result is
/// subscribed, and each downstream subscriber gets its own upstream
/// subscription.
pub trait ObservableExt<T: 'static>: Observable<T> + Sized {
	fn map<U, F>(self, func: F) -> Map<Self, T, F>
	where
		F: Fn(&T) -> U + Send + Sync + 'static,
	{
		Map {
			source: self,
			func: Arc::new(func),
			_marker: PhantomData,
		}
	}

	/// Like [`ObservableExt::map`]; a failing `func` reaches the downstream
	/// observer as `on_error` and the value is dropped.
	fn try_map<U, F>(self, func: F) -> TryMap<Self, T, F>
	where
		F: Fn(&T) -> Result<U, Fault> + Send + Sync + 'static,
	{
		TryMap {
			source: self,
			func: Arc::new(func),
			_marker: PhantomData,
		}
	}

	fn filter<F>(self, predicate: F) -> Filter<Self, T, F>
	where
		F: Fn(&T) -> bool + Send + Sync + 'static,
	{
		Filter {
			source: self,
			predicate: Arc::new(predicate),
			_marker: PhantomData,
		}
	}

	fn filter_map<U, F>(self, func: F) -> FilterMap<Self, T, F>
	where
		F: Fn(&T) -> Option<U> + Send + Sync + 'static,
	{
		FilterMap {
			source: self,
			func: Arc::new(func),
			_marker: PhantomData,
		}
	}

	/// Forwards values until `signal` emits, then releases both upstream
	/// subscriptions. No terminal event is sent downstream.
	fn take_until<S, X>(self, signal: S) -> TakeUntil<Self, T, S, X>
	where
		S: Observable<X>,
		X: 'static,
	{
		TakeUntil {
			body: Arc::new(TakeUntilBody {
				source: self,
				signal,
			}),
			_marker: PhantomData,
		}
	}

	/// Eager combine with another observable, see [`crate::combine_latest2`].
	fn combine_latest<B, R, O, F>(self, other: O, func: F) -> Combined<R>
	where
		Self: 'static,
		T: Clone + Send + Sync,
		B: Clone + Send + Sync + 'static,
		R: 'static,
		O: Observable<B> + 'static,
		F: Fn(&T, &B) -> R + Send + Sync + 'static,
	{
		try_combine_latest2(self, other, move |a: &T, b: &B| Ok(func(a, b)))
	}

	fn subscribe_next(&self, next: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
		self.subscribe(Callbacks::new(next).build())
	}

	fn boxed(self) -> Arc<dyn Observable<T>>
	where
		Self: 'static,
	{
		Arc::new(self)
	}
}

impl<T: 'static, O: Observable<T>> ObservableExt<T> for O {}

/// Forwards every upstream value through `step`.
struct Forward<T, U: 'static, S> {
	downstream: Arc<dyn Observer<U>>,
	step: S,
	_marker: PhantomData<fn(&T)>,
}

impl<T, U, S> Forward<T, U, S>
where
	T: 'static,
	U: 'static,
	S: Fn(&T) -> Result<Option<U>, Fault> + Send + Sync + 'static,
{
	fn new(downstream: Arc<dyn Observer<U>>, step: S) -> Arc<dyn Observer<T>> {
		Arc::new(Forward {
			downstream,
			step,
			_marker: PhantomData,
		})
	}
}

impl<T, U, S> Observer<T> for Forward<T, U, S>
where
	T: 'static,
	U: 'static,
	S: Fn(&T) -> Result<Option<U>, Fault> + Send + Sync + 'static,
{
	fn on_next(&self, value: &T) -> Result<(), Fault> {
		match (self.step)(value) {
			Ok(Some(forwarded)) => self.downstream.on_next(&forwarded),
			Ok(None) => Ok(()),
			Err(fault) => {
				// The fault belongs to this chain only; upstream keeps going.
				self.downstream.on_error(&fault);
				Ok(())
			}
		}
	}

	fn on_completed(&self) {
		self.downstream.on_completed();
	}

	fn on_error(&self, fault: &Fault) {
		self.downstream.on_error(fault);
	}
}

pub struct Map<O, T, F> {
	source: O,
	func: Arc<F>,
	_marker: PhantomData<fn(&T)>,
}

impl<O, T, U, F> Observable<U> for Map<O, T, F>
where
	O: Observable<T>,
	T: 'static,
	U: 'static,
	F: Fn(&T) -> U + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<U>>) -> Subscription {
		let func = self.func.clone();
		self.source
			.subscribe(Forward::new(observer, move |value: &T| Ok(Some(func(value)))))
	}
}

pub struct TryMap<O, T, F> {
	source: O,
	func: Arc<F>,
	_marker: PhantomData<fn(&T)>,
}

impl<O, T, U, F> Observable<U> for TryMap<O, T, F>
where
	O: Observable<T>,
	T: 'static,
	U: 'static,
	F: Fn(&T) -> Result<U, Fault> + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<U>>) -> Subscription {
		let func = self.func.clone();
		self.source
			.subscribe(Forward::new(observer, move |value: &T| func(value).map(Some)))
	}
}

pub struct Filter<O, T, F> {
	source: O,
	predicate: Arc<F>,
	_marker: PhantomData<fn(&T)>,
}

impl<O, T, F> Observable<T> for Filter<O, T, F>
where
	O: Observable<T>,
	T: Clone + 'static,
	F: Fn(&T) -> bool + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
		let predicate = self.predicate.clone();
		self.source.subscribe(Forward::new(observer, move |value: &T| {
			Ok(predicate(value).then(|| value.clone()))
		}))
	}
}

pub struct FilterMap<O, T, F> {
	source: O,
	func: Arc<F>,
	_marker: PhantomData<fn(&T)>,
}

impl<O, T, U, F> Observable<U> for FilterMap<O, T, F>
where
	O: Observable<T>,
	T: 'static,
	U: 'static,
	F: Fn(&T) -> Option<U> + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<U>>) -> Subscription {
		let func = self.func.clone();
		self.source
			.subscribe(Forward::new(observer, move |value: &T| Ok(func(value))))
	}
}

pub struct TakeUntil<O, T, S, X> {
	body: Arc<TakeUntilBody<O, S>>,
	_marker: PhantomData<fn(&T, &X)>,
}

struct TakeUntilBody<O, S> {
	source: O,
	signal: S,
}

impl<O, T, S, X> Clone for TakeUntil<O, T, S, X> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
			_marker: PhantomData,
		}
	}
}

#[derive(Default)]
struct Gate {
	stopped: AtomicBool,
	held: Mutex<SmallVec<[Subscription; 2]>>,
}

impl Gate {
	fn is_stopped(&self) -> bool {
		self.stopped.load(Ordering::Acquire)
	}

	fn hold(&self, subscription: Subscription) {
		{
			let mut held = self.held.lock();
			if !self.is_stopped() {
				held.push(subscription);
				return;
			}
		}
		subscription.unsubscribe();
	}

	fn stop(&self) {
		if !self.stopped.swap(true, Ordering::AcqRel) {
			let held = std::mem::take(&mut *self.held.lock());
			for subscription in held {
				subscription.unsubscribe();
			}
		}
	}
}

struct Gated<T: 'static> {
	gate: Arc<Gate>,
	downstream: Arc<dyn Observer<T>>,
}

impl<T: 'static> Observer<T> for Gated<T> {
	fn on_next(&self, value: &T) -> Result<(), Fault> {
		if self.gate.is_stopped() {
			return Ok(());
		}
		self.downstream.on_next(value)
	}

	fn on_completed(&self) {
		if !self.gate.is_stopped() {
			self.downstream.on_completed();
			// Nothing follows completion; let go of the signal as well.
			self.gate.stop();
		}
	}

	fn on_error(&self, fault: &Fault) {
		if !self.gate.is_stopped() {
			self.downstream.on_error(fault);
		}
	}
}

struct Stop<X> {
	gate: Arc<Gate>,
	_marker: PhantomData<fn(&X)>,
}

impl<X: 'static> Observer<X> for Stop<X> {
	fn on_next(&self, _: &X) -> Result<(), Fault> {
		self.gate.stop();
		Ok(())
	}

	fn on_error(&self, _: &Fault) {}
}

impl<O, T, S, X> Observable<T> for TakeUntil<O, T, S, X>
where
	O: Observable<T> + 'static,
	S: Observable<X> + 'static,
	T: 'static,
	X: 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
		let renew = {
			let take = self.clone();
			let observer = observer.clone();
			move || take.subscribe(observer.clone())
		};

		let gate = Arc::new(Gate::default());

		let signal = self.body.signal.subscribe(Arc::new(Stop {
			gate: gate.clone(),
			_marker: PhantomData,
		}));
		gate.hold(signal);

		if !gate.is_stopped() {
			let upstream = self.body.source.subscribe(Arc::new(Gated {
				gate: gate.clone(),
				downstream: observer,
			}));
			gate.hold(upstream);
		}

		Subscription::renewable(Some(Box::new(move || gate.stop())), renew)
	}
}
