//! Reactive propagation engine.
//!
//! Everything here is expressed in terms of three pieces: an [`Observable`]
//! that accepts an [`Observer`] and hands back a [`Subscription`]. On top of
//! that sit the single-writer [`Subject`], current-value holders
//! ([`ObservableValue`]) with combine-latest composition ([`Computed`]), and
//! observable collections whose items are published as [`ElementStream`]s.
//!
//! Delivery is synchronous: pushing a value runs every listener inline before
//! the push returns.

pub mod macros;

mod addr;
mod collection;
mod combine;
mod computed;
mod r#const;
mod element;
mod emission;
mod error;
mod lock;
mod observer;
mod ops;
mod subject;
mod subscription;
mod value;
mod var;

use std::any::Any;
use std::sync::Arc;

pub use collection::{
	flatten_sorted, merge_sorted, InsertPolicy, ListController, ListEdit, MemberId, MergedList,
	MergedSet, ObservableCollection, ObservableList, ObservableSet, Options, SetController,
	SetEdit, SortedList, SortedMerge,
};
pub use combine::{
	combine_latest2, combine_latest3, combine_latest_all, try_combine_latest2,
	try_combine_latest3, try_combine_latest_all, Combined,
};
pub use computed::{
	combine2, combine3, combine_all, try_combine2, try_combine3, try_combine_all, Computed,
};
pub use element::{ElementStream, PersistentElement};
pub use emission::Emission;
pub use error::{Error, Fault};
pub use lock::{CollectionLock, Lease, SingleThreadLock, ThreadLock};
pub use observer::Callbacks;
pub use ops::{Filter, FilterMap, Map, ObservableExt, TakeUntil, TryMap};
pub use r#const::Const;
pub use subject::{Controller, Replay, ReplayHook, Subject};
pub use subscription::Subscription;
pub use value::Value;
pub use var::{Toggle, Var};

/// Receives the events of one subscription.
///
/// `on_completed` is terminal. A fault returned from `on_next` is handed back
/// to the same observer through `on_error`; siblings are not affected.
pub trait Observer<T>: Send + Sync + 'static {
	fn on_next(&self, value: &T) -> Result<(), Fault>;

	fn on_completed(&self) {}

	fn on_error(&self, fault: &Fault) {
		tracing::warn!(%fault, "fault reached an observer without an error handler");
	}
}

pub trait Observable<T>: Send + Sync {
	fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription;
}

/// An observable that can also be read synchronously.
pub trait ObservableValue<T: 'static>: Observable<ChangeEvent<T>> {
	fn get(&self) -> T;
}

/// Whatever caused a change, passed along untyped.
pub type Cause = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Debug)]
pub struct ChangeEvent<T> {
	/// `None` only for the initial snapshot a composed value sends
	/// to a new subscriber.
	pub old: Option<T>,
	pub new: T,
	pub cause: Option<Cause>,
}

impl<T> ChangeEvent<T> {
	pub fn initial(value: T) -> Self {
		ChangeEvent {
			old: None,
			new: value,
			cause: None,
		}
	}

	pub fn changed(old: T, new: T) -> Self {
		ChangeEvent {
			old: Some(old),
			new,
			cause: None,
		}
	}

	pub fn caused_by(mut self, cause: Cause) -> Self {
		self.cause = Some(cause);
		self
	}

	#[inline]
	pub fn is_initial(&self) -> bool {
		self.old.is_none()
	}
}
