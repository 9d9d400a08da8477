use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

use crate::subject::{Controller, Subject};
use crate::value::Value;
use crate::{Cause, ChangeEvent, Observable, ObservableValue, Observer, Subscription};

/// A settable value. Every write publishes a [`ChangeEvent`], even when the
/// new value equals the old one.
pub struct Var<T: 'static> {
	body: Arc<VarBody<T>>,
}

struct VarBody<T: 'static> {
	value: RwLock<T>,
	subject: Subject<ChangeEvent<T>>,
	controller: Controller<ChangeEvent<T>>,
}

impl<T> Clone for Var<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Var<T>
where
	T: Default + Clone + Send + Sync + 'static,
{
	fn default() -> Self {
		Var::new(Default::default())
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

impl<T> Var<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new(value: T) -> Self {
		let subject = Subject::new();
		let controller = subject.control();
		Var {
			body: Arc::new(VarBody {
				value: RwLock::new(value),
				subject,
				controller,
			}),
		}
	}

	#[inline]
	pub fn get(&self) -> T {
		self.body.value.read().clone()
	}

	#[inline]
	pub fn get_ref(&self) -> MappedRwLockReadGuard<'_, T> {
		RwLockReadGuard::map(self.body.value.read(), |value| value)
	}

	pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
		func(&self.body.value.read())
	}

	#[inline]
	pub fn set(&self, value: T) {
		let _ = self.replace(value);
	}

	pub fn set_with_cause(&self, value: T, cause: Cause) {
		let _ = self.body.replace(value, Some(cause));
	}

	#[inline]
	pub fn replace(&self, value: T) -> T {
		self.body.replace(value, None)
	}

	pub fn update(&self, func: impl FnOnce(&mut T)) {
		let event = {
			let mut value = self.body.value.write();
			let old = value.clone();
			func(&mut value);
			ChangeEvent::changed(old, value.clone())
		};
		self.body.controller.next(&event);
	}

	#[inline]
	pub fn toggle(&self)
	where
		T: Toggle,
	{
		self.update(T::toggle)
	}
}

impl<T> VarBody<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn replace(&self, value: T, cause: Option<Cause>) -> T {
		let old = std::mem::replace(&mut *self.value.write(), value.clone());

		let mut event = ChangeEvent::changed(old.clone(), value);
		event.cause = cause;
		self.controller.next(&event);

		old
	}
}

impl<T> Observable<ChangeEvent<T>> for Var<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ChangeEvent<T>>>) -> Subscription {
		self.body.subject.subscribe(observer)
	}
}

impl<T> ObservableValue<T> for Var<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn get(&self) -> T {
		Var::get(self)
	}
}

impl<T> From<Var<T>> for Value<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn from(var: Var<T>) -> Self {
		Value::new(Arc::new(var))
	}
}

impl<T> Debug for Var<T>
where
	T: Debug + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.body.value.read().fmt(f)
	}
}
