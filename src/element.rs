use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::addr::ArcAddr;
use crate::subject::{Controller, Subject};
use crate::value::Value;
use crate::{Cause, ChangeEvent, Fault, Observable, ObservableValue, Observer, Subscription};

/// Whoever holds an element in order. Answers where the element sits now.
pub(crate) trait Owner<T: 'static>: Send + Sync {
	fn position(&self, element: &ElementStream<T>) -> Option<usize>;
}

/// One item of an observable collection.
///
/// Value changes arrive as [`ChangeEvent`]s. Completion means the item was
/// removed from its collection; nothing is emitted after that, and a late
/// subscriber is completed immediately.
pub struct ElementStream<T: 'static> {
	body: Arc<ElementBody<T>>,
}

pub(crate) struct ElementBody<T: 'static> {
	value: RwLock<T>,
	subject: Subject<ChangeEvent<T>>,
	controller: Controller<ChangeEvent<T>>,
	owner: Weak<dyn Owner<T>>,
}

impl<T: 'static> Clone for ElementStream<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> ElementStream<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub(crate) fn new(value: T, owner: Weak<dyn Owner<T>>) -> Self {
		let subject = Subject::new();
		let controller = subject.control();
		ElementStream {
			body: Arc::new(ElementBody {
				value: RwLock::new(value),
				subject,
				controller,
				owner,
			}),
		}
	}

	/// The current value. After removal, the last value the item had.
	#[inline]
	pub fn get(&self) -> T {
		self.body.value.read().clone()
	}

	pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
		func(&self.body.value.read())
	}

	/// Position in the owning collection, `None` once removed.
	pub fn index(&self) -> Option<usize> {
		if self.is_removed() {
			return None;
		}
		self.body.owner.upgrade()?.position(self)
	}

	#[inline]
	pub fn is_removed(&self) -> bool {
		self.body.controller.is_completed()
	}

	/// Whether both handles are the same element.
	#[inline]
	pub fn ptr_eq(&self, other: &ElementStream<T>) -> bool {
		Arc::ptr_eq(&self.body, &other.body)
	}

	/// A view of this element that outlives its removal.
	pub fn persistent(&self) -> PersistentElement<T> {
		PersistentElement {
			element: self.clone(),
		}
	}

	/// Stores a new value and publishes the change. Returns the old value.
	pub(crate) fn replace(&self, value: T, cause: Option<Cause>) -> T {
		let old = std::mem::replace(&mut *self.body.value.write(), value.clone());

		let mut event = ChangeEvent::changed(old.clone(), value);
		event.cause = cause;
		self.body.controller.next(&event);

		old
	}

	/// Signals removal. Returns `false` if the element was already removed.
	pub(crate) fn remove(&self) -> bool {
		self.body.controller.complete()
	}

	pub(crate) fn addr(&self) -> ArcAddr<ElementBody<T>> {
		ArcAddr::new(self.body.clone())
	}
}

impl<T> Observable<ChangeEvent<T>> for ElementStream<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ChangeEvent<T>>>) -> Subscription {
		self.body.subject.subscribe(observer)
	}
}

impl<T> ObservableValue<T> for ElementStream<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn get(&self) -> T {
		ElementStream::get(self)
	}
}

impl<T> From<ElementStream<T>> for Value<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn from(element: ElementStream<T>) -> Self {
		Value::new(Arc::new(element))
	}
}

impl<T> Debug for ElementStream<T>
where
	T: Debug + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ElementStream")
			.field("value", &*self.body.value.read())
			.field("removed", &self.body.controller.is_completed())
			.finish()
	}
}

/// An element projected to `Option<T>`.
///
/// Removal shows up as a final change from `Some(last)` to `None` instead of
/// completion, and subscribing after removal is a no-op rather than an
/// immediate completion.
pub struct PersistentElement<T: 'static> {
	element: ElementStream<T>,
}

impl<T: 'static> Clone for PersistentElement<T> {
	fn clone(&self) -> Self {
		Self {
			element: self.element.clone(),
		}
	}
}

impl<T> PersistentElement<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn get(&self) -> Option<T> {
		if self.element.is_removed() {
			None
		} else {
			Some(self.element.get())
		}
	}
}

struct Persisted<T: 'static> {
	element: ElementStream<T>,
	downstream: Arc<dyn Observer<ChangeEvent<Option<T>>>>,
}

impl<T> Observer<ChangeEvent<T>> for Persisted<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn on_next(&self, event: &ChangeEvent<T>) -> Result<(), Fault> {
		self.downstream.on_next(&ChangeEvent {
			old: event.old.clone().map(Some),
			new: Some(event.new.clone()),
			cause: event.cause.clone(),
		})
	}

	fn on_completed(&self) {
		let last = ChangeEvent::changed(Some(self.element.get()), None);
		crate::observer::deliver(&*self.downstream, &last);
	}

	fn on_error(&self, fault: &Fault) {
		self.downstream.on_error(fault);
	}
}

impl<T> Observable<ChangeEvent<Option<T>>> for PersistentElement<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ChangeEvent<Option<T>>>>) -> Subscription {
		if self.element.is_removed() {
			return Subscription::empty();
		}

		let renew = {
			let persistent = self.clone();
			let observer = observer.clone();
			move || persistent.subscribe(observer.clone())
		};

		// Renewing after removal must not report the removal a second time.
		self.element
			.subscribe(Arc::new(Persisted {
				element: self.element.clone(),
				downstream: observer,
			}))
			.with_renew(renew)
	}
}

impl<T> ObservableValue<Option<T>> for PersistentElement<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn get(&self) -> Option<T> {
		PersistentElement::get(self)
	}
}

impl<T> From<PersistentElement<T>> for Value<Option<T>>
where
	T: Clone + Send + Sync + 'static,
{
	fn from(element: PersistentElement<T>) -> Self {
		Value::new(Arc::new(element))
	}
}

impl<T> Debug for PersistentElement<T>
where
	T: Debug + Clone + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get().fmt(f)
	}
}
