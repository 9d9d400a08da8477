use std::sync::Arc;

use crate::{ChangeEvent, Observable, ObservableValue, Observer, Subscription};

/// Type-erased [`ObservableValue`] handle.
pub struct Value<T: 'static> {
	value: Arc<dyn ObservableValue<T>>,
}

impl<T: 'static> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			value: self.value.clone(),
		}
	}
}

impl<T> Value<T>
where
	T: 'static,
{
	pub fn new(value: Arc<dyn ObservableValue<T>>) -> Self {
		Value { value }
	}

	#[inline]
	pub fn get(&self) -> T {
		self.value.get()
	}
}

impl<T: 'static> Observable<ChangeEvent<T>> for Value<T> {
	fn subscribe(&self, observer: Arc<dyn Observer<ChangeEvent<T>>>) -> Subscription {
		self.value.subscribe(observer)
	}
}

impl<T: 'static> ObservableValue<T> for Value<T> {
	fn get(&self) -> T {
		self.value.get()
	}
}

impl<T: 'static> From<Arc<dyn ObservableValue<T>>> for Value<T> {
	fn from(value: Arc<dyn ObservableValue<T>>) -> Self {
		Value::new(value)
	}
}
