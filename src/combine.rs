use std::sync::Arc;

use enclose::enclose;
use parking_lot::Mutex;
use smallvec::smallvec;

use crate::emission::{Sink, SlotObserver, Sources};
use crate::{Fault, Observable, Observer, Subscription};

type Attach<R> = Box<dyn Fn(&Arc<Sink<R>>) -> Sources + Send + Sync>;

/// Eager N-ary combination of plain observables.
///
/// Nothing is emitted until every source has produced a value; after that
/// every upstream value produces one combined value. The first source to
/// complete completes the combination and releases the others.
pub struct Combined<R: 'static> {
	attach: Arc<Attach<R>>,
}

impl<R: 'static> Clone for Combined<R> {
	fn clone(&self) -> Self {
		Self {
			attach: self.attach.clone(),
		}
	}
}

impl<R: 'static> Combined<R> {
	fn new(attach: impl Fn(&Arc<Sink<R>>) -> Sources + Send + Sync + 'static) -> Self {
		Combined {
			attach: Arc::new(Box::new(attach)),
		}
	}
}

impl<R: 'static> Observable<R> for Combined<R> {
	fn subscribe(&self, observer: Arc<dyn Observer<R>>) -> Subscription {
		let renew = {
			let combined = self.clone();
			let observer = observer.clone();
			move || combined.subscribe(observer.clone())
		};

		let sink = Sink::new(observer);
		sink.hold((self.attach)(&sink));
		sink.into_subscription(renew)
	}
}

/// Per-subscriber source slot. `Empty` is distinct from every value a
/// source can produce.
#[derive(Clone)]
enum Slot<T> {
	Empty,
	Full(T),
}

impl<T: Clone> Slot<T> {
	fn full(&self) -> Option<T> {
		match self {
			Slot::Empty => None,
			Slot::Full(value) => Some(value.clone()),
		}
	}
}

pub fn combine_latest2<A, B, R, F>(
	a: impl Observable<A> + 'static,
	b: impl Observable<B> + 'static,
	func: F,
) -> Combined<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	R: 'static,
	F: Fn(&A, &B) -> R + Send + Sync + 'static,
{
	try_combine_latest2(a, b, move |a: &A, b: &B| Ok(func(a, b)))
}

pub fn try_combine_latest2<A, B, R, F>(
	a: impl Observable<A> + 'static,
	b: impl Observable<B> + 'static,
	func: F,
) -> Combined<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	R: 'static,
	F: Fn(&A, &B) -> Result<R, Fault> + Send + Sync + 'static,
{
	let func = Arc::new(func);
	Combined::new(move |sink| {
		let slots = Arc::new(Mutex::new((Slot::<A>::Empty, Slot::<B>::Empty)));
		smallvec![
			a.subscribe(SlotObserver::new(
				sink,
				enclose!((slots, func) move |value: &A| {
					let (a, b) = {
						let mut slots = slots.lock();
						slots.0 = Slot::Full(value.clone());
						(slots.0.full()?, slots.1.full()?)
					};
					Some(func(&a, &b))
				})
			)),
			b.subscribe(SlotObserver::new(
				sink,
				enclose!((slots, func) move |value: &B| {
					let (a, b) = {
						let mut slots = slots.lock();
						slots.1 = Slot::Full(value.clone());
						(slots.0.full()?, slots.1.full()?)
					};
					Some(func(&a, &b))
				})
			)),
		]
	})
}

pub fn combine_latest3<A, B, C, R, F>(
	a: impl Observable<A> + 'static,
	b: impl Observable<B> + 'static,
	c: impl Observable<C> + 'static,
	func: F,
) -> Combined<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	C: Clone + Send + Sync + 'static,
	R: 'static,
	F: Fn(&A, &B, &C) -> R + Send + Sync + 'static,
{
	try_combine_latest3(a, b, c, move |a: &A, b: &B, c: &C| Ok(func(a, b, c)))
}

pub fn try_combine_latest3<A, B, C, R, F>(
	a: impl Observable<A> + 'static,
	b: impl Observable<B> + 'static,
	c: impl Observable<C> + 'static,
	func: F,
) -> Combined<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	C: Clone + Send + Sync + 'static,
	R: 'static,
	F: Fn(&A, &B, &C) -> Result<R, Fault> + Send + Sync + 'static,
{
	type Slots<X, Y, Z> = (Slot<X>, Slot<Y>, Slot<Z>);

	fn ready<X: Clone, Y: Clone, Z: Clone>(slots: &Slots<X, Y, Z>) -> Option<(X, Y, Z)> {
		Some((slots.0.full()?, slots.1.full()?, slots.2.full()?))
	}

	let func = Arc::new(func);
	Combined::new(move |sink| {
		let slots: Arc<Mutex<Slots<A, B, C>>> =
			Arc::new(Mutex::new((Slot::Empty, Slot::Empty, Slot::Empty)));
		smallvec![
			a.subscribe(SlotObserver::new(
				sink,
				enclose!((slots, func) move |value: &A| {
					let (a, b, c) = {
						let mut slots = slots.lock();
						slots.0 = Slot::Full(value.clone());
						ready(&slots)?
					};
					Some(func(&a, &b, &c))
				})
			)),
			b.subscribe(SlotObserver::new(
				sink,
				enclose!((slots, func) move |value: &B| {
					let (a, b, c) = {
						let mut slots = slots.lock();
						slots.1 = Slot::Full(value.clone());
						ready(&slots)?
					};
					Some(func(&a, &b, &c))
				})
			)),
			c.subscribe(SlotObserver::new(
				sink,
				enclose!((slots, func) move |value: &C| {
					let (a, b, c) = {
						let mut slots = slots.lock();
						slots.2 = Slot::Full(value.clone());
						ready(&slots)?
					};
					Some(func(&a, &b, &c))
				})
			)),
		]
	})
}

pub fn combine_latest_all<T, R, F>(sources: Vec<Arc<dyn Observable<T>>>, func: F) -> Combined<R>
where
	T: Clone + Send + Sync + 'static,
	R: 'static,
	F: Fn(&[T]) -> R + Send + Sync + 'static,
{
	try_combine_latest_all(sources, move |values: &[T]| Ok(func(values)))
}

pub fn try_combine_latest_all<T, R, F>(
	sources: Vec<Arc<dyn Observable<T>>>,
	func: F,
) -> Combined<R>
where
	T: Clone + Send + Sync + 'static,
	R: 'static,
	F: Fn(&[T]) -> Result<R, Fault> + Send + Sync + 'static,
{
	let func = Arc::new(func);
	Combined::new(move |sink| {
		let slots: Arc<Mutex<Vec<Slot<T>>>> = Arc::new(Mutex::new(vec![Slot::Empty; sources.len()]));
		sources
			.iter()
			.enumerate()
			.map(|(index, source)| {
				source.subscribe(SlotObserver::new(
					sink,
					enclose!((slots, func) move |value: &T| {
						let values = {
							let mut slots = slots.lock();
							slots[index] = Slot::Full(value.clone());
							slots.iter().map(Slot::full).collect::<Option<Vec<T>>>()?
						};
						Some(func(&values))
					}),
				))
			})
			.collect()
	})
}
