use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use crate::observer::deliver;
use crate::{Error, Fault, Observable, Observer, Subscription};

/// Catches a late subscriber up, see [`Subject::control_with_replay`].
pub type ReplayHook<T> = Box<dyn Fn(&Replay<'_, T>) + Send + Sync>;

/// Single-writer publish/subscribe primitive.
///
/// The subject itself only accepts subscribers. Values are pushed through
/// the one [`Controller`] obtained with [`Subject::control`].
pub struct Subject<T: 'static> {
	body: Arc<SubjectBody<T>>,
}

impl<T: 'static> Clone for Subject<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T: 'static> Default for Subject<T> {
	fn default() -> Self {
		Subject::new()
	}
}

struct SubjectBody<T: 'static> {
	listeners: ArcSwap<Listeners<T>>,
	replay: OnceLock<ReplayHook<T>>,
	controlled: AtomicBool,
	next_id: AtomicU64,
}

/// Copy-on-write snapshot. A delivery loop keeps iterating the snapshot it
/// loaded while subscribers come and go.
struct Listeners<T: 'static> {
	alive: bool,
	entries: Vec<Entry<T>>,
}

struct Entry<T: 'static> {
	id: u64,
	observer: Arc<dyn Observer<T>>,
	active: Arc<AtomicBool>,
}

impl<T: 'static> Clone for Entry<T> {
	fn clone(&self) -> Self {
		Entry {
			id: self.id,
			observer: self.observer.clone(),
			active: self.active.clone(),
		}
	}
}

impl<T: 'static> Listeners<T> {
	fn alive() -> Self {
		Listeners {
			alive: true,
			entries: Vec::new(),
		}
	}

	fn completed() -> Self {
		Listeners {
			alive: false,
			entries: Vec::new(),
		}
	}

	fn with(&self, entry: Entry<T>) -> Self {
		let mut entries = self.entries.clone();
		entries.push(entry);
		Listeners {
			alive: self.alive,
			entries,
		}
	}

	fn without(&self, id: u64) -> Self {
		Listeners {
			alive: self.alive,
			entries: self
				.entries
				.iter()
				.filter(|entry| entry.id != id)
				.cloned()
				.collect(),
		}
	}
}

impl<T: 'static> Entry<T> {
	fn deliver(&self, value: &T) {
		if self.active.load(Ordering::Acquire) {
			deliver(&*self.observer, value);
		}
	}
}

impl<T: 'static> Subject<T> {
	pub fn new() -> Self {
		Subject {
			body: Arc::new(SubjectBody {
				listeners: ArcSwap::from_pointee(Listeners::alive()),
				replay: OnceLock::new(),
				controlled: AtomicBool::new(false),
				next_id: AtomicU64::new(0),
			}),
		}
	}

	/// Takes the write handle.
	///
	/// # Panics
	///
	/// Panics when the subject already has a controller.
	pub fn control(&self) -> Controller<T> {
		self.try_control().unwrap_or_else(|error| panic!("{error}"))
	}

	/// Takes the write handle and installs a hook that runs for every new
	/// subscriber right after it is registered.
	///
	/// # Panics
	///
	/// Panics when the subject already has a controller.
	pub fn control_with_replay(&self, replay: ReplayHook<T>) -> Controller<T> {
		self.try_control_with(Some(replay))
			.unwrap_or_else(|error| panic!("{error}"))
	}

	pub fn try_control(&self) -> Result<Controller<T>, Error> {
		self.try_control_with(None)
	}

	fn try_control_with(&self, replay: Option<ReplayHook<T>>) -> Result<Controller<T>, Error> {
		if self.body.controlled.swap(true, Ordering::AcqRel) {
			return Err(Error::AlreadyControlled("subject"));
		}

		if let Some(replay) = replay {
			let _ = self.body.replay.set(replay);
		}

		tracing::debug!("subject controller issued");
		Ok(Controller {
			body: self.body.clone(),
		})
	}

	pub fn is_completed(&self) -> bool {
		!self.body.listeners.load().alive
	}

	pub fn observer_count(&self) -> usize {
		self.body.listeners.load().entries.len()
	}
}

impl<T: 'static> SubjectBody<T> {
	fn subscribe(self: &Arc<Self>, observer: Arc<dyn Observer<T>>) -> Subscription {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let active = Arc::new(AtomicBool::new(true));
		let entry = Entry {
			id,
			observer: observer.clone(),
			active: active.clone(),
		};

		let previous = self.listeners.rcu(|current| {
			if current.alive {
				Arc::new(current.with(entry.clone()))
			} else {
				Arc::clone(current)
			}
		});

		let renew = {
			let body = Arc::downgrade(self);
			let observer = observer.clone();
			move || match body.upgrade() {
				Some(body) => body.subscribe(observer.clone()),
				None => {
					observer.on_completed();
					Subscription::empty()
				}
			}
		};

		if !previous.alive {
			observer.on_completed();
			return Subscription::renewable(None, renew);
		}

		if let Some(replay) = self.replay.get() {
			replay(&Replay {
				observer: &observer,
				active: &active,
			});
		}

		let body = Arc::downgrade(self);
		let teardown = move || {
			active.store(false, Ordering::Release);
			if let Some(body) = body.upgrade() {
				body.listeners.rcu(|current| {
					if current.alive {
						Arc::new(current.without(id))
					} else {
						Arc::clone(current)
					}
				});
			}
		};

		Subscription::renewable(Some(Box::new(teardown)), renew)
	}
}

impl<T: 'static> Observable<T> for Subject<T> {
	fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
		self.body.subscribe(observer)
	}
}

/// Handed to a [`ReplayHook`]; sends values to the one subscriber being
/// caught up.
pub struct Replay<'a, T: 'static> {
	observer: &'a Arc<dyn Observer<T>>,
	active: &'a AtomicBool,
}

impl<'a, T: 'static> Replay<'a, T> {
	/// Returns `false` once the subscriber has unsubscribed; the hook
	/// should stop there.
	pub fn send(&self, value: &T) -> bool {
		if !self.active.load(Ordering::Acquire) {
			return false;
		}

		deliver(&**self.observer, value);
		self.active.load(Ordering::Acquire)
	}
}

/// The write side of a [`Subject`].
pub struct Controller<T: 'static> {
	body: Arc<SubjectBody<T>>,
}

impl<T: 'static> Controller<T> {
	pub fn subject(&self) -> Subject<T> {
		Subject {
			body: self.body.clone(),
		}
	}

	/// Pushes a value to every listener registered at the time of the call.
	///
	/// # Panics
	///
	/// Panics when the subject has completed.
	pub fn next(&self, value: &T) {
		let listeners = self.body.listeners.load_full();
		if !listeners.alive {
			panic!("{}", Error::Completed);
		}

		for entry in listeners.entries.iter() {
			entry.deliver(value);
		}
	}

	/// Completes the subject. Returns `false` if it was already completed.
	pub fn complete(&self) -> bool {
		let previous = self.body.listeners.swap(Arc::new(Listeners::completed()));
		if !previous.alive {
			return false;
		}

		for entry in previous.entries.iter() {
			if entry.active.swap(false, Ordering::AcqRel) {
				entry.observer.on_completed();
			}
		}

		true
	}

	/// Forwards a fault to every listener. The subject stays alive.
	pub fn error(&self, fault: &Fault) {
		let listeners = self.body.listeners.load_full();
		for entry in listeners.entries.iter() {
			if entry.active.load(Ordering::Acquire) {
				entry.observer.on_error(fault);
			}
		}
	}

	pub fn is_completed(&self) -> bool {
		!self.body.listeners.load().alive
	}

	pub fn observer_count(&self) -> usize {
		self.body.listeners.load().entries.len()
	}
}

impl<T: 'static> std::fmt::Debug for Subject<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let listeners = self.body.listeners.load();
		f.debug_struct("Subject")
			.field("completed", &!listeners.alive)
			.field("observers", &listeners.entries.len())
			.finish()
	}
}
