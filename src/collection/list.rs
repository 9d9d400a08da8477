use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{InsertPolicy, ObservableCollection, Options, Settings};
use crate::element::Owner;
use crate::lock::Lease;
use crate::subject::{Controller, Replay, Subject};
use crate::{Cause, ElementStream, Error, Observable, Observer, Subscription};

/// Public, read-only view of an ordered collection.
///
/// Every read takes the collection's shared lease. Mutation goes through
/// the single [`ListController`].
pub struct ObservableList<T: 'static> {
	body: Arc<ListBody<T>>,
}

struct ListBody<T: 'static> {
	settings: Settings,
	/// Never held while events are delivered.
	store: Mutex<Vec<ElementStream<T>>>,
	subject: Subject<ElementStream<T>>,
	events: Controller<ElementStream<T>>,
	controlled: AtomicBool,
	this: Weak<ListBody<T>>,
}

impl<T: 'static> Clone for ObservableList<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for ObservableList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn default() -> Self {
		ObservableList::new()
	}
}

impl<T> Owner<T> for ListBody<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn position(&self, element: &ElementStream<T>) -> Option<usize> {
		self.store
			.lock()
			.iter()
			.position(|candidate| candidate.ptr_eq(element))
	}
}

impl<T> ObservableList<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::with_options(Options::default())
	}

	pub fn with_options(options: Options) -> Self {
		let settings = options.build();
		ObservableList {
			body: Arc::new_cyclic(|this: &Weak<ListBody<T>>| {
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

				ListBody {
					settings,
					store: Mutex::new(Vec::new()),
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
	pub fn control(&self) -> ListController<T> {
		self.try_control().unwrap_or_else(|error| panic!("{error}"))
	}

	pub fn try_control(&self) -> Result<ListController<T>, Error> {
		if self.body.controlled.swap(true, Ordering::AcqRel) {
			return Err(Error::AlreadyControlled(self.body.settings.name));
		}

		tracing::debug!(collection = self.body.settings.name, "list controller issued");
		Ok(ListController { list: self.clone() })
	}

	pub fn get(&self, index: usize) -> Option<T> {
		let _lease = self.body.settings.lock.read();
		self.body.store.lock().get(index).map(ElementStream::get)
	}

	pub fn element(&self, index: usize) -> Option<ElementStream<T>> {
		let _lease = self.body.settings.lock.read();
		self.body.store.lock().get(index).cloned()
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
		self.body.store.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, value: &T) -> bool
	where
		T: PartialEq,
	{
		self.index_of(value).is_some()
	}

	pub fn index_of(&self, value: &T) -> Option<usize>
	where
		T: PartialEq,
	{
		let _lease = self.body.settings.lock.read();
		self.body
			.store
			.lock()
			.iter()
			.position(|element| element.with(|current| current == value))
	}

	/// Whether both handles view the same list.
	pub fn ptr_eq(&self, other: &ObservableList<T>) -> bool {
		Arc::ptr_eq(&self.body, &other.body)
	}
}

impl<T> ListBody<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn snapshot(&self) -> Vec<ElementStream<T>> {
		self.store.lock().clone()
	}

	fn values(&self) -> Vec<T> {
		self.store.lock().iter().map(ElementStream::get).collect()
	}

	fn create(&self, value: T) -> ElementStream<T> {
		let owner: Weak<dyn Owner<T>> = self.this.clone();
		ElementStream::new(value, owner)
	}

	fn subscribe(
		self: &Arc<Self>,
		observer: Arc<dyn Observer<ElementStream<T>>>,
	) -> Subscription {
		// Replay runs under the shared lease, so no structural event can slip
		// in between the catch-up and live delivery. Renewal goes through here
		// too and takes the same lease.
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

impl<T> Observable<ElementStream<T>> for ObservableList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ElementStream<T>>>) -> Subscription {
		self.body.subscribe(observer)
	}
}

impl<T> ObservableCollection<T> for ObservableList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn len(&self) -> usize {
		ObservableList::len(self)
	}

	fn elements(&self) -> Vec<ElementStream<T>> {
		ObservableList::elements(self)
	}

	fn to_vec(&self) -> Vec<T> {
		ObservableList::to_vec(self)
	}
}

impl<T> Debug for ObservableList<T>
where
	T: Debug + Clone + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.to_vec()).finish()
	}
}

/// The write side of an [`ObservableList`].
///
/// Each method is one atomic operation. Use [`ListController::edit`] to
/// group several.
pub struct ListController<T: 'static> {
	list: ObservableList<T>,
}

impl<T> ListController<T>
where
	T: Clone + Send + Sync + 'static,
{
	/// The public view of the controlled list.
	pub fn list(&self) -> ObservableList<T> {
		self.list.clone()
	}

	/// Takes the exclusive lease until the returned edit is dropped.
	pub fn edit(&self) -> ListEdit<'_, T> {
		let body = &*self.list.body;
		ListEdit {
			_lease: body.settings.lock.write(),
			body,
		}
	}

	pub fn add(&self, value: T) -> ElementStream<T> {
		self.edit().add(value)
	}

	pub fn add_all(&self, values: impl IntoIterator<Item = T>) {
		self.edit().add_all(values)
	}

	pub fn insert(&self, index: usize, value: T) -> ElementStream<T> {
		self.edit().insert(index, value)
	}

	pub fn remove_at(&self, index: usize) -> T {
		self.edit().remove_at(index)
	}

	pub fn remove(&self, value: &T) -> bool
	where
		T: PartialEq,
	{
		self.edit().remove(value)
	}

	pub fn remove_all(&self, values: impl IntoIterator<Item = T>) -> bool
	where
		T: PartialEq,
	{
		self.edit().remove_all(values)
	}

	pub fn retain_all(&self, values: impl IntoIterator<Item = T>) -> bool
	where
		T: PartialEq,
	{
		self.edit().retain_all(values)
	}

	pub fn retain(&self, keep: impl FnMut(&T) -> bool) -> bool {
		self.edit().retain(keep)
	}

	pub fn set(&self, index: usize, value: T) -> T {
		self.edit().set(index, value)
	}

	pub fn set_with_cause(&self, index: usize, value: T, cause: Cause) -> T {
		self.edit().set_with_cause(index, value, cause)
	}

	pub fn clear(&self) {
		self.edit().clear()
	}

	pub fn len(&self) -> usize {
		self.list.len()
	}

	pub fn is_empty(&self) -> bool {
		self.list.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<T> {
		self.list.get(index)
	}

	pub fn to_vec(&self) -> Vec<T> {
		self.list.to_vec()
	}
}

impl<T: 'static> Debug for ListController<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListController")
			.field("collection", &self.list.body.settings.name)
			.finish()
	}
}

/// Several list operations under one exclusive lease.
///
/// Listeners see the events of every operation as they happen, and may read
/// the list from the writing thread. Other threads see the list only
/// before or after the whole edit.
pub struct ListEdit<'a, T: 'static> {
	body: &'a ListBody<T>,
	_lease: Lease<'a>,
}

impl<'a, T> ListEdit<'a, T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn len(&self) -> usize {
		self.body.store.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn get(&self, index: usize) -> Option<T> {
		self.body.store.lock().get(index).map(ElementStream::get)
	}

	pub fn to_vec(&self) -> Vec<T> {
		self.body.values()
	}

	/// Appends a value.
	pub fn add(&mut self, value: T) -> ElementStream<T> {
		let element = self.body.create(value);
		let index = {
			let mut store = self.body.store.lock();
			store.push(element.clone());
			store.len() - 1
		};
		self.publish(index, &element);
		element
	}

	pub fn add_all(&mut self, values: impl IntoIterator<Item = T>) {
		for value in values {
			self.add(value);
		}
	}

	/// Inserts at `index`, moving later elements as the list's
	/// [`InsertPolicy`] says.
	///
	/// # Panics
	///
	/// Panics if `index > len`.
	pub fn insert(&mut self, index: usize, value: T) -> ElementStream<T> {
		let len = self.len();
		assert!(
			index <= len,
			"insertion index (is {index}) should be <= len (is {len})"
		);

		if index == len {
			return self.add(value);
		}

		match self.body.settings.policy {
			InsertPolicy::Shift => {
				let element = self.body.create(value);
				self.body.store.lock().insert(index, element.clone());
				self.publish(index, &element);
				element
			}
			InsertPolicy::Cascade => {
				let tail = self.body.store.lock().split_off(index);
				for element in tail.iter().rev() {
					self.retire(element);
				}

				let element = self.add(value);
				for moved in tail {
					self.add(moved.get());
				}
				element
			}
		}
	}

	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn remove_at(&mut self, index: usize) -> T {
		let element = {
			let mut store = self.body.store.lock();
			let len = store.len();
			assert!(
				index < len,
				"removal index (is {index}) should be < len (is {len})"
			);
			store.remove(index)
		};
		self.retire(&element);
		element.get()
	}

	/// Removes the first occurrence of `value`.
	pub fn remove(&mut self, value: &T) -> bool
	where
		T: PartialEq,
	{
		let index = self
			.body
			.store
			.lock()
			.iter()
			.position(|element| element.with(|current| current == value));

		match index {
			Some(index) => {
				self.remove_at(index);
				true
			}
			None => false,
		}
	}

	/// Removes every element equal to one of `values`.
	pub fn remove_all(&mut self, values: impl IntoIterator<Item = T>) -> bool
	where
		T: PartialEq,
	{
		let values: Vec<T> = values.into_iter().collect();
		self.retain(|value| !values.contains(value))
	}

	/// Removes every element not equal to one of `values`.
	pub fn retain_all(&mut self, values: impl IntoIterator<Item = T>) -> bool
	where
		T: PartialEq,
	{
		let values: Vec<T> = values.into_iter().collect();
		self.retain(|value| values.contains(value))
	}

	/// Removes, front to back, every element `keep` rejects.
	pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> bool {
		let doomed: Vec<ElementStream<T>> = self
			.body
			.snapshot()
			.into_iter()
			.filter(|element| !element.with(|value| keep(value)))
			.collect();

		for element in doomed.iter() {
			let removed = {
				let mut store = self.body.store.lock();
				match store.iter().position(|candidate| candidate.ptr_eq(element)) {
					Some(index) => {
						store.remove(index);
						true
					}
					None => false,
				}
			};
			if removed {
				self.retire(element);
			}
		}

		!doomed.is_empty()
	}

	/// Pushes a new value through the existing element. Returns the old
	/// value.
	///
	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn set(&mut self, index: usize, value: T) -> T {
		self.replace(index, value, None)
	}

	pub fn set_with_cause(&mut self, index: usize, value: T, cause: Cause) -> T {
		self.replace(index, value, Some(cause))
	}

	fn replace(&mut self, index: usize, value: T, cause: Option<Cause>) -> T {
		let element = {
			let store = self.body.store.lock();
			let len = store.len();
			match store.get(index) {
				Some(element) => element.clone(),
				None => panic!("index (is {index}) should be < len (is {len})"),
			}
		};
		element.replace(value, cause)
	}

	/// Removes everything, front to back.
	pub fn clear(&mut self) {
		let removed = std::mem::take(&mut *self.body.store.lock());
		for element in removed.iter() {
			self.retire(element);
		}
	}

	fn publish(&self, index: usize, element: &ElementStream<T>) {
		tracing::trace!(collection = self.body.settings.name, index, "element added");
		self.body.events.next(element);
	}

	/// The element must already be out of the store.
	fn retire(&self, element: &ElementStream<T>) {
		tracing::trace!(collection = self.body.settings.name, "element removed");
		element.remove();
	}
}
