use std::fmt::Debug;
use std::sync::Arc;

use crate::value::Value;
use crate::{ChangeEvent, Observable, ObservableValue, Observer, Subscription};

/// A value that never changes and never completes.
pub struct Const<T> {
	body: Arc<ConstBody<T>>,
}

impl<T> Clone for Const<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

struct ConstBody<T> {
	value: T,
}

impl<T> Const<T> {
	pub fn new(value: T) -> Self {
		Const {
			body: Arc::new(ConstBody { value }),
		}
	}

	pub fn get_ref(&self) -> &T {
		&self.body.value
	}
}

impl<T> Observable<ChangeEvent<T>> for Const<T>
where
	T: Send + Sync + 'static,
{
	fn subscribe(&self, _: Arc<dyn Observer<ChangeEvent<T>>>) -> Subscription {
		Subscription::empty()
	}
}

impl<T> ObservableValue<T> for Const<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn get(&self) -> T {
		self.body.value.clone()
	}
}

impl<T> From<Const<T>> for Value<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn from(value: Const<T>) -> Self {
		Value::new(Arc::new(value))
	}
}

impl<T> Debug for Const<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get_ref().fmt(f)
	}
}
