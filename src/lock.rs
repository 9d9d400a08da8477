use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};

use crate::Error;

/// The reader/writer discipline of one collection.
///
/// Readers hold a shared lease while they look at the collection. A
/// controller holds the exclusive lease for a whole operation, including
/// the delivery of the events it causes, so a listener reacting to one of
/// those events sees either the state before or the state after the
/// operation, never something in between.
///
/// Collections take their lock through [`crate::Options`], so tests can
/// swap in a [`SingleThreadLock`].
pub trait CollectionLock: Send + Sync + 'static {
	fn read(&self) -> Lease<'_>;

	fn write(&self) -> Lease<'_>;
}

trait Held {}

impl<T> Held for T {}

/// A held shared or exclusive lease, released on drop.
#[must_use = "the lease is released as soon as it is dropped"]
pub struct Lease<'a> {
	_held: Option<Box<dyn Held + 'a>>,
}

impl<'a> Lease<'a> {
	/// Wraps whatever guard keeps the lease held.
	pub fn new(guard: impl Sized + 'a) -> Self {
		Lease {
			_held: Some(Box::new(guard)),
		}
	}

	/// A lease that holds nothing.
	pub fn free() -> Self {
		Lease { _held: None }
	}
}

impl std::fmt::Debug for Lease<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Lease")
			.field("held", &self._held.is_some())
			.finish()
	}
}

/// Blocking reader/writer lock for collections shared between threads.
///
/// The thread holding the write lease may read again without blocking,
/// which is what listeners running inside a mutation do. Writing again
/// from that thread, or writing from a thread that holds a read lease,
/// would deadlock; both panic instead.
pub struct ThreadLock {
	lock: RwLock<()>,
	owners: Mutex<Owners>,
	name: &'static str,
}

#[derive(Default)]
struct Owners {
	writer: Option<ThreadId>,
	readers: FxHashMap<ThreadId, usize>,
}

impl ThreadLock {
	pub fn new() -> Self {
		Self::named("collection")
	}

	/// `name` shows up in panic messages.
	pub fn named(name: &'static str) -> Self {
		ThreadLock {
			lock: RwLock::new(()),
			owners: Mutex::new(Owners::default()),
			name,
		}
	}
}

impl Default for ThreadLock {
	fn default() -> Self {
		ThreadLock::new()
	}
}

struct ReadMark<'a> {
	owners: &'a Mutex<Owners>,
	thread: ThreadId,
}

impl Drop for ReadMark<'_> {
	fn drop(&mut self) {
		let mut owners = self.owners.lock();
		if let Some(count) = owners.readers.get_mut(&self.thread) {
			*count -= 1;
			if *count == 0 {
				owners.readers.remove(&self.thread);
			}
		}
	}
}

struct WriteMark<'a> {
	owners: &'a Mutex<Owners>,
}

impl Drop for WriteMark<'_> {
	fn drop(&mut self) {
		self.owners.lock().writer = None;
	}
}

impl CollectionLock for ThreadLock {
	fn read(&self) -> Lease<'_> {
		let thread = thread::current().id();
		if self.owners.lock().writer == Some(thread) {
			return Lease::free();
		}

		// Recursive so that nested reads on one thread never queue behind a
		// waiting writer.
		let guard = self.lock.read_recursive();
		*self.owners.lock().readers.entry(thread).or_insert(0) += 1;
		Lease::new((
			ReadMark {
				owners: &self.owners,
				thread,
			},
			guard,
		))
	}

	fn write(&self) -> Lease<'_> {
		let thread = thread::current().id();
		{
			let owners = self.owners.lock();
			if owners.writer == Some(thread) {
				panic!("{}", Error::ReentrantWrite(self.name));
			}
			if owners.readers.contains_key(&thread) {
				panic!("{}", Error::UpgradeWhileReading(self.name));
			}
		}

		let guard = self.lock.write();
		self.owners.lock().writer = Some(thread);
		Lease::new((
			WriteMark {
				owners: &self.owners,
			},
			guard,
		))
	}
}

/// Non-blocking lock for collections confined to one thread.
///
/// Reads are free. A write while another write is in progress panics, which
/// catches a listener mutating the collection it is listening to.
pub struct SingleThreadLock {
	writing: AtomicBool,
	name: &'static str,
}

impl SingleThreadLock {
	pub fn new() -> Self {
		Self::named("collection")
	}

	pub fn named(name: &'static str) -> Self {
		SingleThreadLock {
			writing: AtomicBool::new(false),
			name,
		}
	}
}

impl Default for SingleThreadLock {
	fn default() -> Self {
		SingleThreadLock::new()
	}
}

struct Writing<'a>(&'a AtomicBool);

impl Drop for Writing<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

impl CollectionLock for SingleThreadLock {
	fn read(&self) -> Lease<'_> {
		Lease::free()
	}

	fn write(&self) -> Lease<'_> {
		if self.writing.swap(true, Ordering::AcqRel) {
			panic!("{}", Error::ReentrantWrite(self.name));
		}
		Lease::new(Writing(&self.writing))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn writer_reads_reentrantly() {
		let lock = ThreadLock::new();
		let _write = lock.write();
		let _read = lock.read();
		let _again = lock.read();
	}

	#[test]
	#[should_panic(expected = "mutated from inside one of its own listeners")]
	fn recursive_write_panics() {
		let lock = ThreadLock::named("list");
		let _write = lock.write();
		let _ = lock.write();
	}

	#[test]
	#[should_panic(expected = "mutated by a thread that is reading it")]
	fn upgrade_panics() {
		let lock = ThreadLock::new();
		let _read = lock.read();
		let _ = lock.write();
	}

	#[test]
	fn leases_release_on_drop() {
		let lock = ThreadLock::new();
		drop(lock.read());
		drop(lock.write());
		drop(lock.write());

		let single = SingleThreadLock::new();
		drop(single.write());
		drop(single.write());
	}

	#[test]
	#[should_panic]
	fn single_thread_lock_detects_recursion() {
		let lock = SingleThreadLock::new();
		let _write = lock.write();
		let _ = lock.write();
	}
}
