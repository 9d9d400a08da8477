use std::fmt::Debug;
use std::sync::Arc;

use enclose::enclose;
use smallvec::smallvec;

use crate::emission::{Emission, Sink, SlotObserver, Sources};
use crate::value::Value;
use crate::{ChangeEvent, Fault, Observable, ObservableValue, Observer, Subscription};

type Current<R> = Box<dyn Fn() -> Result<R, Fault> + Send + Sync>;
type Attach<R> = Box<dyn Fn(&Arc<Sink<ChangeEvent<R>>>) -> Sources + Send + Sync>;

/// Combine-latest over observable values.
///
/// Nothing is cached. When one source changes, the function runs twice:
/// once with that source's old value and once with its new value, every
/// other source contributing its current snapshot. The two results form
/// the emitted [`ChangeEvent`]. A new subscriber first receives one initial
/// event computed from the current snapshots.
///
/// The first source to complete completes the computed value for that
/// subscriber and releases the remaining sources.
pub struct Computed<R: 'static> {
	body: Arc<ComputedBody<R>>,
}

struct ComputedBody<R: 'static> {
	current: Current<R>,
	attach: Attach<R>,
}

impl<R: 'static> Clone for Computed<R> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<R> Computed<R>
where
	R: Send + Sync + 'static,
{
	fn from_parts(
		current: impl Fn() -> Result<R, Fault> + Send + Sync + 'static,
		attach: impl Fn(&Arc<Sink<ChangeEvent<R>>>) -> Sources + Send + Sync + 'static,
	) -> Self {
		Computed {
			body: Arc::new(ComputedBody {
				current: Box::new(current),
				attach: Box::new(attach),
			}),
		}
	}

	/// Recomputes from the current snapshots.
	#[inline]
	pub fn try_get(&self) -> Result<R, Fault> {
		(self.body.current)()
	}

	/// Recomputes from the current snapshots.
	///
	/// # Panics
	///
	/// Panics when the function fails, there being no observer to deliver
	/// the fault to. Use [`Computed::try_get`] for fallible functions.
	pub fn get(&self) -> R {
		self.try_get()
			.unwrap_or_else(|fault| panic!("computed value failed: {fault}"))
	}

	/// Unary composition.
	pub fn map<A, F>(source: impl Into<Value<A>>, func: F) -> Self
	where
		A: Clone + Send + Sync + 'static,
		F: Fn(&A) -> R + Send + Sync + 'static,
	{
		Self::try_map(source, move |a: &A| Ok(func(a)))
	}

	pub fn try_map<A, F>(source: impl Into<Value<A>>, func: F) -> Self
	where
		A: Clone + Send + Sync + 'static,
		F: Fn(&A) -> Result<R, Fault> + Send + Sync + 'static,
	{
		let (source, func) = (source.into(), Arc::new(func));
		Computed::from_parts(
			enclose!((source, func) move || func(&source.get())),
			move |sink| {
				smallvec![source.subscribe(SlotObserver::new(
					sink,
					enclose!((func) move |event: &ChangeEvent<A>| change(event, |a| func(a)))
				))]
			},
		)
	}
}

/// Turns one source event into a composed event. Initial snapshot events
/// from a source are not changes and produce nothing.
fn change<A, R>(
	event: &ChangeEvent<A>,
	mut func: impl FnMut(&A) -> Result<R, Fault>,
) -> Option<Result<ChangeEvent<R>, Fault>>
where
	A: Clone + Send + Sync + 'static,
{
	let old = event.old.as_ref()?;
	let composed = func(old).and_then(|old| func(&event.new).map(|new| ChangeEvent::changed(old, new)));
	Some(composed.map(|composed| composed.caused_by(Arc::new(event.clone()))))
}

pub fn combine2<A, B, R, F>(a: impl Into<Value<A>>, b: impl Into<Value<B>>, func: F) -> Computed<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	R: Send + Sync + 'static,
	F: Fn(&A, &B) -> R + Send + Sync + 'static,
{
	try_combine2(a, b, move |a: &A, b: &B| Ok(func(a, b)))
}

pub fn try_combine2<A, B, R, F>(
	a: impl Into<Value<A>>,
	b: impl Into<Value<B>>,
	func: F,
) -> Computed<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	R: Send + Sync + 'static,
	F: Fn(&A, &B) -> Result<R, Fault> + Send + Sync + 'static,
{
	let (a, b, func) = (a.into(), b.into(), Arc::new(func));
	Computed::from_parts(
		enclose!((a, b, func) move || func(&a.get(), &b.get())),
		move |sink| {
			smallvec![
				a.subscribe(SlotObserver::new(
					sink,
					enclose!((b, func) move |event: &ChangeEvent<A>| {
						let b = b.get();
						change(event, |a| func(a, &b))
					})
				)),
				b.subscribe(SlotObserver::new(
					sink,
					enclose!((a, func) move |event: &ChangeEvent<B>| {
						let a = a.get();
						change(event, |b| func(&a, b))
					})
				)),
			]
		},
	)
}

pub fn combine3<A, B, C, R, F>(
	a: impl Into<Value<A>>,
	b: impl Into<Value<B>>,
	c: impl Into<Value<C>>,
	func: F,
) -> Computed<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	C: Clone + Send + Sync + 'static,
	R: Send + Sync + 'static,
	F: Fn(&A, &B, &C) -> R + Send + Sync + 'static,
{
	try_combine3(a, b, c, move |a: &A, b: &B, c: &C| Ok(func(a, b, c)))
}

pub fn try_combine3<A, B, C, R, F>(
	a: impl Into<Value<A>>,
	b: impl Into<Value<B>>,
	c: impl Into<Value<C>>,
	func: F,
) -> Computed<R>
where
	A: Clone + Send + Sync + 'static,
	B: Clone + Send + Sync + 'static,
	C: Clone + Send + Sync + 'static,
	R: Send + Sync + 'static,
	F: Fn(&A, &B, &C) -> Result<R, Fault> + Send + Sync + 'static,
{
	let (a, b, c, func) = (a.into(), b.into(), c.into(), Arc::new(func));
	Computed::from_parts(
		enclose!((a, b, c, func) move || func(&a.get(), &b.get(), &c.get())),
		move |sink| {
			smallvec![
				a.subscribe(SlotObserver::new(
					sink,
					enclose!((b, c, func) move |event: &ChangeEvent<A>| {
						let (b, c) = (b.get(), c.get());
						change(event, |a| func(a, &b, &c))
					})
				)),
				b.subscribe(SlotObserver::new(
					sink,
					enclose!((a, c, func) move |event: &ChangeEvent<B>| {
						let (a, c) = (a.get(), c.get());
						change(event, |b| func(&a, b, &c))
					})
				)),
				c.subscribe(SlotObserver::new(
					sink,
					enclose!((a, b, func) move |event: &ChangeEvent<C>| {
						let (a, b) = (a.get(), b.get());
						change(event, |c| func(&a, &b, c))
					})
				)),
			]
		},
	)
}

pub fn combine_all<T, R, F>(sources: Vec<Value<T>>, func: F) -> Computed<R>
where
	T: Clone + Send + Sync + 'static,
	R: Send + Sync + 'static,
	F: Fn(&[T]) -> R + Send + Sync + 'static,
{
	try_combine_all(sources, move |values: &[T]| Ok(func(values)))
}

pub fn try_combine_all<T, R, F>(sources: Vec<Value<T>>, func: F) -> Computed<R>
where
	T: Clone + Send + Sync + 'static,
	R: Send + Sync + 'static,
	F: Fn(&[T]) -> Result<R, Fault> + Send + Sync + 'static,
{
	let sources: Arc<[Value<T>]> = sources.into();
	let func = Arc::new(func);
	Computed::from_parts(
		enclose!((sources, func) move || {
			let values: Vec<T> = sources.iter().map(Value::get).collect();
			func(&values)
		}),
		move |sink| {
			sources
				.iter()
				.enumerate()
				.map(|(index, source)| {
					source.subscribe(SlotObserver::new(
						sink,
						enclose!((sources, func) move |event: &ChangeEvent<T>| {
							let mut values: Vec<T> = sources.iter().map(Value::get).collect();
							change(event, |value| {
								values[index] = value.clone();
								func(&values)
							})
						}),
					))
				})
				.collect()
		},
	)
}

impl<R> Observable<ChangeEvent<R>> for Computed<R>
where
	R: Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ChangeEvent<R>>>) -> Subscription {
		let renew = {
			let computed = self.clone();
			let observer = observer.clone();
			move || computed.subscribe(observer.clone())
		};

		let sink = Sink::new(observer);
		match self.try_get() {
			Ok(value) => sink.emit(Emission::Value(ChangeEvent::initial(value))),
			Err(fault) => sink.emit(Emission::Fault(fault)),
		}
		sink.hold((self.body.attach)(&sink));
		sink.into_subscription(renew)
	}
}

impl<R> ObservableValue<R> for Computed<R>
where
	R: Send + Sync + 'static,
{
	fn get(&self) -> R {
		Computed::get(self)
	}
}

impl<R> From<Computed<R>> for Value<R>
where
	R: Send + Sync + 'static,
{
	fn from(computed: Computed<R>) -> Self {
		Value::new(Arc::new(computed))
	}
}

impl<R> Debug for Computed<R>
where
	R: Debug + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.try_get() {
			Ok(value) => value.fmt(f),
			Err(fault) => write!(f, "<{fault}>"),
		}
	}
}
