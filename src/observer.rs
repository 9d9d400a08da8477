use std::sync::Arc;

use crate::{Fault, Observer};

type Next<T> = Box<dyn Fn(&T) -> Result<(), Fault> + Send + Sync>;
type Completed = Box<dyn Fn() + Send + Sync>;
type Failed = Box<dyn Fn(&Fault) + Send + Sync>;

/// Closure-backed observer.
///
/// ```
/// use propagate::{Callbacks, Observable, Subject};
///
/// let subject = Subject::<i32>::new();
/// let controller = subject.control();
/// subject.subscribe(
/// 	Callbacks::new(|value: &i32| println!("got {value}"))
/// 		.on_completed(|| println!("done"))
/// 		.build(),
/// );
/// controller.next(&1);
/// controller.complete();
/// ```
pub struct Callbacks<T: 'static> {
	next: Next<T>,
	completed: Option<Completed>,
	error: Option<Failed>,
}

impl<T: 'static> Callbacks<T> {
	pub fn new(next: impl Fn(&T) + Send + Sync + 'static) -> Self {
		Self::fallible(move |value| {
			next(value);
			Ok(())
		})
	}

	pub fn fallible(next: impl Fn(&T) -> Result<(), Fault> + Send + Sync + 'static) -> Self {
		Callbacks {
			next: Box::new(next),
			completed: None,
			error: None,
		}
	}

	pub fn on_completed(mut self, completed: impl Fn() + Send + Sync + 'static) -> Self {
		self.completed = Some(Box::new(completed));
		self
	}

	pub fn on_error(mut self, error: impl Fn(&Fault) + Send + Sync + 'static) -> Self {
		self.error = Some(Box::new(error));
		self
	}

	pub fn build(self) -> Arc<dyn Observer<T>> {
		Arc::new(self)
	}
}

impl<T: 'static> Observer<T> for Callbacks<T> {
	fn on_next(&self, value: &T) -> Result<(), Fault> {
		(self.next)(value)
	}

	fn on_completed(&self) {
		if let Some(completed) = &self.completed {
			completed()
		}
	}

	fn on_error(&self, fault: &Fault) {
		match &self.error {
			Some(error) => error(fault),
			None => tracing::warn!(%fault, "fault reached an observer without an error handler"),
		}
	}
}

/// Delivers one value, routing a fault back to the observer that raised it.
pub(crate) fn deliver<T: 'static>(observer: &dyn Observer<T>, value: &T) {
	if let Err(fault) = observer.on_next(value) {
		tracing::debug!(%fault, "isolating listener fault");
		observer.on_error(&fault);
	}
}
