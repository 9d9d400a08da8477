use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;

use super::{ObservableCollection, Options, Settings};
use crate::element::Owner;
use crate::lock::Lease;
use crate::subject::{Controller, Replay, Subject};
use crate::{ElementStream, Error, Observable, Observer, Subscription};

/// Public, read-only view of a collection of distinct values.
///
/// Iteration and replay follow insertion order.
pub struct ObservableSet<T: 'static> {
	body: Arc<SetBody<T>>,
}

struct SetBody<T: 'static> {
	settings: Settings,
	store: Mutex<SetStore<T>>,
	subject: Subject<ElementStream<T>>,
	events: Controller<ElementStream<T>>,
	controlled: AtomicBool,
	this: Weak<SetBody<T>>,
}

struct SetStore<T: 'static> {
	index: FxHashMap<T, ElementStream<T>>,
	order: Vec<ElementStream<T>>,
}

impl<T> SetStore<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn take(&mut self, value: &T) -> Option<ElementStream<T>> {
		let element = self.index.remove(value)?;
		self.order.retain(|candidate| !candidate.ptr_eq(&element));
		Some(element)
	}
}

impl<T: 'static> Clone for ObservableSet<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for ObservableSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn default() -> Self {
		ObservableSet::new()
	}
}

impl<T> Owner<T> for SetBody<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn position(&self, element: &ElementStream<T>) -> Option<usize> {
		self.store
			.lock()
			.order
			.iter()
			.position(|candidate| candidate.ptr_eq(element))
	}
}

impl<T> ObservableSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::with_options(Options::default())
	}

	/// The insert policy of `options` has no meaning for a set and is ignored.
	pub fn with_options(options: Options) -> Self {
		let settings = options.build();
		ObservableSet {
			body: Arc::new_cyclic(|this: &Weak<SetBody<T>>| {
				let subject = Subject::new();
				let events = subject.control_with_replay(Box::new({
					let this = this.clone();
					move |replay: &Replay<'_, ElementStream<T>>| {
						let Some(body) = this.upgrade() else { return };
						for element in body.snapshot() {
							if !replay.send(&element) {
								break;
							}
						}
					}
				}));

				SetBody {
					settings,
					store: Mutex::new(SetStore {
						index: FxHashMap::default(),
						order: Vec::new(),
					}),
					subject,
					events,
					controlled: AtomicBool::new(false),
					this: this.clone(),
				}
			}),
		}
	}

	/// Takes the controller.
	///
	/// # Panics
	///
	/// Panics when the controller was already taken.
	pub fn control(&self) -> SetController<T> {
		self.try_control().unwrap_or_else(|error| panic!("{error}"))
	}

	pub fn try_control(&self) -> Result<SetController<T>, Error> {
		if self.body.controlled.swap(true, Ordering::AcqRel) {
			return Err(Error::AlreadyControlled(self.body.settings.name));
		}

		tracing::debug!(collection = self.body.settings.name, "set controller issued");
		Ok(SetController { set: self.clone() })
	}

	pub fn contains(&self, value: &T) -> bool {
		let _lease = self.body.settings.lock.read();
		self.body.store.lock().index.contains_key(value)
	}

	pub fn element(&self, value: &T) -> Option<ElementStream<T>> {
		let _lease = self.body.settings.lock.read();
		self.body.store.lock().index.get(value).cloned()
	}

	pub fn elements(&self) -> Vec<ElementStream<T>> {
		let _lease = self.body.settings.lock.read();
		self.body.snapshot()
	}

	pub fn to_vec(&self) -> Vec<T> {
		let _lease = self.body.settings.lock.read();
		self.body.values()
	}

	pub fn len(&self) -> usize {
		let _lease = self.body.settings.lock.read();
		self.body.store.lock().order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T> SetBody<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn snapshot(&self) -> Vec<ElementStream<T>> {
		self.store.lock().order.clone()
	}

	fn values(&self) -> Vec<T> {
		self.store
			.lock()
			.order
			.iter()
			.map(ElementStream::get)
			.collect()
	}

	fn subscribe(
		self: &Arc<Self>,
		observer: Arc<dyn Observer<ElementStream<T>>>,
	) -> Subscription {
		let subscription = {
			let _lease = self.settings.lock.read();
			self.subject.subscribe(observer.clone())
		};

		let body = Arc::downgrade(self);
		subscription.with_renew(move || match body.upgrade() {
			Some(body) => body.subscribe(observer.clone()),
			None => Subscription::empty(),
		})
	}
}

impl<T> Observable<ElementStream<T>> for ObservableSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ElementStream<T>>>) -> Subscription {
		self.body.subscribe(observer)
	}
}

impl<T> ObservableCollection<T> for ObservableSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn len(&self) -> usize {
		ObservableSet::len(self)
	}

	fn elements(&self) -> Vec<ElementStream<T>> {
		ObservableSet::elements(self)
	}

	fn to_vec(&self) -> Vec<T> {
		ObservableSet::to_vec(self)
	}
}

impl<T> Debug for ObservableSet<T>
where
	T: Debug + Clone + Eq + Hash + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_set().entries(self.to_vec()).finish()
	}
}

/// The write side of an [`ObservableSet`].
pub struct SetController<T: 'static> {
	set: ObservableSet<T>,
}

impl<T> SetController<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	pub fn set(&self) -> ObservableSet<T> {
		self.set.clone()
	}

	/// Takes the exclusive lease until the returned edit is dropped.
	pub fn edit(&self) -> SetEdit<'_, T> {
		let body = &*self.set.body;
		SetEdit {
			_lease: body.settings.lock.write(),
			body,
		}
	}

	pub fn add(&self, value: T) -> bool {
		self.edit().add(value)
	}

	pub fn add_all(&self, values: impl IntoIterator<Item = T>) -> bool {
		self.edit().add_all(values)
	}

	pub fn remove(&self, value: &T) -> bool {
		self.edit().remove(value)
	}

	pub fn remove_all(&self, values: impl IntoIterator<Item = T>) -> bool {
		self.edit().remove_all(values)
	}

	pub fn retain_all(&self, values: impl IntoIterator<Item = T>) -> bool {
		self.edit().retain_all(values)
	}

	pub fn retain(&self, keep: impl FnMut(&T) -> bool) -> bool {
		self.edit().retain(keep)
	}

	pub fn clear(&self) {
		self.edit().clear()
	}

	pub fn contains(&self, value: &T) -> bool {
		self.set.contains(value)
	}

	pub fn len(&self) -> usize {
		self.set.len()
	}

	pub fn is_empty(&self) -> bool {
		self.set.is_empty()
	}

	pub fn to_vec(&self) -> Vec<T> {
		self.set.to_vec()
	}
}

impl<T: 'static> Debug for SetController<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SetController")
			.field("collection", &self.set.body.settings.name)
			.finish()
	}
}

/// Several set operations under one exclusive lease.
pub struct SetEdit<'a, T: 'static> {
	body: &'a SetBody<T>,
	_lease: Lease<'a>,
}

impl<'a, T> SetEdit<'a, T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	pub fn contains(&self, value: &T) -> bool {
		self.body.store.lock().index.contains_key(value)
	}

	pub fn len(&self) -> usize {
		self.body.store.lock().order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn to_vec(&self) -> Vec<T> {
		self.body.values()
	}

	/// Returns `false`, and emits nothing, when `value` is already present.
	pub fn add(&mut self, value: T) -> bool {
		let element = {
			let mut store = self.body.store.lock();
			if store.index.contains_key(&value) {
				return false;
			}

			let owner: Weak<dyn Owner<T>> = self.body.this.clone();
			let element = ElementStream::new(value.clone(), owner);
			store.index.insert(value, element.clone());
			store.order.push(element.clone());
			element
		};

		tracing::trace!(collection = self.body.settings.name, "element added");
		self.body.events.next(&element);
		true
	}

	pub fn add_all(&mut self, values: impl IntoIterator<Item = T>) -> bool {
		let mut changed = false;
		for value in values {
			changed |= self.add(value);
		}
		changed
	}

	pub fn remove(&mut self, value: &T) -> bool {
		let element = self.body.store.lock().take(value);
		match element {
			Some(element) => {
				self.retire(&element);
				true
			}
			None => false,
		}
	}

	pub fn remove_all(&mut self, values: impl IntoIterator<Item = T>) -> bool {
		let mut changed = false;
		for value in values {
			changed |= self.remove(&value);
		}
		changed
	}

	/// Removes every value not in `values`.
	pub fn retain_all(&mut self, values: impl IntoIterator<Item = T>) -> bool {
		let values: FxHashSet<T> = values.into_iter().collect();
		self.retain(|value| values.contains(value))
	}

	/// Removes, in insertion order, every value `keep` rejects.
	pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> bool {
		let doomed: Vec<T> = self
			.body
			.snapshot()
			.iter()
			.map(ElementStream::get)
			.filter(|value| !keep(value))
			.collect();

		let mut changed = false;
		for value in doomed.iter() {
			changed |= self.remove(value);
		}
		changed
	}

	pub fn clear(&mut self) {
		let removed = {
			let mut store = self.body.store.lock();
			store.index.clear();
			std::mem::take(&mut store.order)
		};
		for element in removed.iter() {
			self.retire(element);
		}
	}

	fn retire(&self, element: &ElementStream<T>) {
		tracing::trace!(collection = self.body.settings.name, "element removed");
		element.remove();
	}
}
