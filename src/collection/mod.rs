//! Observable collections.
//!
//! A collection is an [`Observable`] of [`ElementStream`]s: a stream
//! appearing is an addition, a stream completing is a removal, and a value
//! change travels through the stream itself. Subscribing replays every live
//! element, in order, before any later event.
//!
//! Every collection has a read-only public view and exactly one controller.

mod flatten;
mod list;
mod merge;
mod set;
mod sorted;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use flatten::{flatten_sorted, merge_sorted, SortedMerge};
pub use list::{ListController, ListEdit, ObservableList};
pub use merge::{MergedList, MergedSet};
pub use set::{ObservableSet, SetController, SetEdit};
pub use sorted::SortedList;

use crate::lock::{CollectionLock, ThreadLock};
use crate::{ElementStream, Observable};

/// Read access shared by every collection.
pub trait ObservableCollection<T: 'static>: Observable<ElementStream<T>> {
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The live element streams, in order.
	fn elements(&self) -> Vec<ElementStream<T>>;

	fn to_vec(&self) -> Vec<T>;
}

/// What an interior insert does to the elements after it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertPolicy {
	/// Later elements keep their streams; only their index moves.
	#[default]
	Shift,
	/// Every later element is removed and added again as a fresh stream
	/// carrying the same value, so each stream keeps the index it was
	/// created with.
	Cascade,
}

/// Construction parameters of a collection.
///
/// ```
/// use propagate::{InsertPolicy, ObservableList, Options, SingleThreadLock};
///
/// let list = ObservableList::<u32>::with_options(
/// 	Options::default()
/// 		.lock(SingleThreadLock::new())
/// 		.policy(InsertPolicy::Cascade)
/// 		.name("rows"),
/// );
/// let rows = list.control();
/// rows.add(1);
/// ```
#[derive(Clone, Default)]
pub struct Options {
	lock: Option<Arc<dyn CollectionLock>>,
	policy: InsertPolicy,
	name: Option<&'static str>,
}

impl Options {
	/// Defaults to a [`ThreadLock`].
	pub fn lock(mut self, lock: impl CollectionLock) -> Self {
		self.lock = Some(Arc::new(lock));
		self
	}

	pub fn policy(mut self, policy: InsertPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Used in log fields and panic messages. Defaults to `"collection"`.
	pub fn name(mut self, name: &'static str) -> Self {
		self.name = Some(name);
		self
	}

	pub(crate) fn build(self) -> Settings {
		let name = self.name.unwrap_or("collection");
		Settings {
			lock: self
				.lock
				.unwrap_or_else(|| Arc::new(ThreadLock::named(name))),
			policy: self.policy,
			name,
		}
	}
}

impl std::fmt::Debug for Options {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Options")
			.field("custom_lock", &self.lock.is_some())
			.field("policy", &self.policy)
			.field("name", &self.name)
			.finish()
	}
}

pub(crate) struct Settings {
	pub(crate) lock: Arc<dyn CollectionLock>,
	pub(crate) policy: InsertPolicy,
	pub(crate) name: &'static str,
}

/// Identifies one member of a merged collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(u64);

impl MemberId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		MemberId(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}
