use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use proptest::sample::Index;
use propagate::{
	Callbacks, ChangeEvent, ElementStream, Error, Fault, InsertPolicy, ObservableCollection,
	ObservableList, ObservableSet, Observable, Observer, Options, SingleThreadLock,
};

use crate::mock::{self, Change, Journal};

#[test]
fn replay_then_live() {
	mock::init_tracing();

	let list = ObservableList::new();
	let controller = list.control();
	controller.add_all([1, 2]);

	let (journal, _subscription) = Journal::follow(&list);
	controller.add(3);

	assert_eq!(
		journal.changes(),
		vec![Change::Added(1), Change::Added(2), Change::Added(3)]
	);
}

#[test]
fn single_controller() {
	let list = ObservableList::<i32>::new();
	let _controller = list.control();
	assert_eq!(
		list.try_control().err(),
		Some(Error::AlreadyControlled("collection"))
	);

	let named = ObservableList::<i32>::with_options(Options::default().name("rows"));
	let _rows = named.control();
	assert_eq!(named.try_control().err(), Some(Error::AlreadyControlled("rows")));

	let set = ObservableSet::<i32>::new();
	let _set_controller = set.control();
	assert!(set.try_control().is_err());
}

#[test]
#[should_panic(expected = "collection already has a controller")]
fn second_control_panics() {
	let list = ObservableList::<i32>::new();
	let _first = list.control();
	let _second = list.control();
}

#[test]
fn set_keeps_the_stream() {
	let list = ObservableList::new();
	let controller = list.control();
	let element = controller.add(1);

	let (journal, _subscription) = Journal::follow(&list);
	assert_eq!(controller.set(0, 5), 1);

	assert_eq!(element.get(), 5);
	assert!(list.element(0).expect("one element").ptr_eq(&element));
	assert_eq!(journal.changes(), vec![Change::Added(1), Change::Changed(1, 5)]);
}

#[test]
fn index_is_live() {
	let list = ObservableList::new();
	let controller = list.control();
	let a = controller.add("a");
	let b = controller.add("b");
	let c = controller.insert(0, "c");

	assert_eq!((a.index(), b.index(), c.index()), (Some(1), Some(2), Some(0)));

	assert_eq!(controller.remove_at(1), "a");
	assert!(a.is_removed());
	assert_eq!(a.index(), None);
	assert_eq!(a.get(), "a");
	assert_eq!(b.index(), Some(1));
	assert_eq!(list.to_vec(), vec!["c", "b"]);
}

#[test]
fn removal_completes_the_element() {
	let list = ObservableList::new();
	let controller = list.control();
	controller.add_all([1, 2, 3]);

	let (journal, _subscription) = Journal::follow(&list);
	journal.clear();

	assert!(controller.remove(&2));
	assert!(!controller.remove(&7));
	assert_eq!(journal.changes(), vec![Change::Removed(2)]);

	let late = Arc::new(AtomicBool::new(false));
	let removed = list.element(0).expect("first element");
	controller.remove_at(0);
	removed.subscribe(
		Callbacks::new(|_: &ChangeEvent<i32>| {})
			.on_completed({
				let late = late.clone();
				move || late.store(true, Ordering::SeqCst)
			})
			.build(),
	);
	assert!(late.load(Ordering::SeqCst));
}

#[test]
fn shift_insert_moves_indexes_only() {
	let list = ObservableList::new();
	let controller = list.control();
	controller.add_all(["a", "b", "c"]);
	let b = list.element(1).expect("b");

	let (journal, _subscription) = Journal::follow(&list);
	journal.clear();
	controller.insert(1, "x");

	assert_eq!(journal.changes(), vec![Change::Added("x")]);
	assert!(!b.is_removed());
	assert_eq!(b.index(), Some(2));
	assert_eq!(list.to_vec(), vec!["a", "x", "b", "c"]);
}

#[test]
fn cascade_insert_reissues_the_tail() {
	let list = ObservableList::with_options(Options::default().policy(InsertPolicy::Cascade));
	let controller = list.control();
	controller.add_all(["a", "b", "c"]);
	let b = list.element(1).expect("b");

	let (journal, _subscription) = Journal::follow(&list);
	journal.clear();
	controller.insert(1, "x");

	assert_eq!(
		journal.changes(),
		vec![
			Change::Removed("c"),
			Change::Removed("b"),
			Change::Added("x"),
			Change::Added("b"),
			Change::Added("c"),
		]
	);
	assert!(b.is_removed());
	assert_eq!(list.to_vec(), vec!["a", "x", "b", "c"]);
}

#[test]
fn bulk_removals() {
	let list = ObservableList::new();
	let controller = list.control();
	controller.add_all(1..=8);

	assert!(controller.retain(|value| value % 2 == 0));
	assert_eq!(list.to_vec(), vec![2, 4, 6, 8]);

	assert!(controller.remove_all([4, 9]));
	assert!(!controller.remove_all([9]));
	assert_eq!(list.to_vec(), vec![2, 6, 8]);

	assert!(controller.retain_all([6, 8, 10]));
	assert_eq!(list.to_vec(), vec![6, 8]);

	let (journal, _subscription) = Journal::follow(&list);
	journal.clear();
	controller.clear();
	assert_eq!(journal.changes(), vec![Change::Removed(6), Change::Removed(8)]);
	assert!(list.is_empty());
}

#[test]
fn persistent_element_outlives_removal() {
	let list = ObservableList::new();
	let controller = list.control();
	let persistent = controller.add(1).persistent();
	assert_eq!(persistent.get(), Some(1));

	controller.remove_at(0);
	assert_eq!(persistent.get(), None);
}

#[test]
fn edit_groups_operations() {
	let list = ObservableList::new();
	let controller = list.control();

	{
		let mut edit = controller.edit();
		edit.add(1);
		edit.add(2);
		edit.insert(0, 0);
		assert_eq!(edit.to_vec(), vec![0, 1, 2]);
		assert_eq!(edit.len(), 3);
	}

	assert_eq!(list.len(), 3);
	assert!(list.contains(&2));
	assert_eq!(list.index_of(&1), Some(1));
}

#[test]
fn readers_never_see_half_an_edit() {
	let list = ObservableList::new();
	let controller = list.control();
	let done = Arc::new(AtomicBool::new(false));

	let reader = thread::spawn({
		let list = list.clone();
		let done = done.clone();
		move || {
			while !done.load(Ordering::SeqCst) {
				assert_eq!(list.len() % 3, 0);
				assert_eq!(list.to_vec().len() % 3, 0);
			}
		}
	});

	for round in 0..200 {
		controller.add_all([round, round + 1, round + 2]);
		if round % 10 == 9 {
			controller.clear();
		}
	}
	done.store(true, Ordering::SeqCst);
	reader.join().unwrap();
}

#[test]
fn listeners_read_during_a_mutation() {
	let list = ObservableList::new();
	let controller = list.control();
	let seen = Arc::new(Mutex::new(Vec::new()));

	list.subscribe(
		Callbacks::new({
			let list = list.clone();
			let seen = seen.clone();
			move |element: &ElementStream<i32>| {
				seen.lock().unwrap().push((list.len(), element.index()));
			}
		})
		.build(),
	);
	controller.add_all([7, 8, 9]);

	assert_eq!(
		*seen.lock().unwrap(),
		vec![(1, Some(0)), (2, Some(1)), (3, Some(2))]
	);
}

#[test]
#[should_panic(expected = "was mutated from inside one of its own listeners")]
fn reentrant_write_panics() {
	let list = ObservableList::new();
	let controller = Arc::new(list.control());

	list.subscribe(
		Callbacks::new({
			let controller = controller.clone();
			move |_: &ElementStream<i32>| {
				controller.add(0);
			}
		})
		.build(),
	);
	controller.add(1);
}

#[test]
#[should_panic(expected = "was mutated by a thread that is reading it")]
fn write_during_replay_panics() {
	let list = ObservableList::new();
	let controller = Arc::new(list.control());
	controller.add(1);

	list.subscribe(
		Callbacks::new({
			let controller = controller.clone();
			move |_: &ElementStream<i32>| {
				controller.add(0);
			}
		})
		.build(),
	);
}

#[test]
#[should_panic(expected = "was mutated from inside one of its own listeners")]
fn single_thread_lock_rejects_recursion() {
	let list = ObservableList::with_options(Options::default().lock(SingleThreadLock::new()));
	let controller = Arc::new(list.control());
	controller.add(1);

	// Reads are free under this lock, so replay may happen anywhere.
	let (journal, _subscription) = Journal::follow(&list);
	assert_eq!(journal.changes(), vec![Change::Added(1)]);

	list.subscribe(
		Callbacks::new({
			let controller = controller.clone();
			move |_: &ElementStream<i32>| {
				controller.add(0);
			}
		})
		.build(),
	);
}

#[test]
fn resubscribe_replays_then_follows() {
	let list = ObservableList::new();
	let controller = list.control();
	controller.add_all([1, 2]);

	let (journal, subscription) = Journal::follow(&list);
	subscription.unsubscribe();
	controller.add(3);
	journal.clear();

	let renewed = subscription.resubscribe().expect("list subscriptions renew");
	controller.remove(&1);
	assert_eq!(
		journal.changes(),
		vec![
			Change::Added(1),
			Change::Added(2),
			Change::Added(3),
			Change::Removed(1)
		]
	);

	renewed.unsubscribe();
	controller.add(4);
	assert_eq!(journal.changes().len(), 4);
}

#[test]
fn set_resubscribe_replays_in_insertion_order() {
	let set = ObservableSet::new();
	let controller = set.control();
	controller.add_all(["b", "a"]);

	let (journal, subscription) = Journal::follow(&set);
	subscription.unsubscribe();
	journal.clear();

	let _renewed = subscription.resubscribe().expect("set subscriptions renew");
	controller.add("c");
	assert_eq!(
		journal.changes(),
		vec![Change::Added("b"), Change::Added("a"), Change::Added("c")]
	);
}

#[test]
fn resubscribe_waits_for_an_edit_in_progress() {
	let list = ObservableList::new();
	let controller = list.control();
	let (journal, subscription) = Journal::follow(&list);
	subscription.unsubscribe();

	let (paused_tx, paused_rx) = mpsc::channel();
	let (resume_tx, resume_rx) = mpsc::channel::<()>();
	let paused_tx = Mutex::new(paused_tx);
	let resume_rx = Mutex::new(resume_rx);
	list.subscribe(
		Callbacks::new(move |element: &ElementStream<i32>| {
			if element.get() == 1 {
				paused_tx.lock().unwrap().send(()).unwrap();
				resume_rx.lock().unwrap().recv().unwrap();
			}
		})
		.build(),
	);

	let writer = thread::spawn(move || {
		controller.add_all([1, 2, 3]);
		controller
	});
	paused_rx.recv().unwrap();

	let finished = Arc::new(AtomicBool::new(false));
	let renewer = thread::spawn({
		let finished = finished.clone();
		move || {
			let renewed = subscription.resubscribe().expect("list subscriptions renew");
			finished.store(true, Ordering::SeqCst);
			renewed
		}
	});

	thread::sleep(Duration::from_millis(50));
	assert!(!finished.load(Ordering::SeqCst));
	assert!(journal.changes().is_empty());

	resume_tx.send(()).unwrap();
	let controller = writer.join().unwrap();
	let _renewed = renewer.join().unwrap();

	assert!(finished.load(Ordering::SeqCst));
	assert_eq!(
		journal.changes(),
		vec![Change::Added(1), Change::Added(2), Change::Added(3)]
	);

	controller.add(4);
	assert_eq!(journal.changes().last(), Some(&Change::Added(4)));
}

#[test]
fn set_semantics() {
	let set = ObservableSet::new();
	let controller = set.control();

	assert!(controller.add("b"));
	assert!(controller.add("a"));
	assert!(!controller.add("b"));

	let (journal, _subscription) = Journal::follow(&set);
	assert_eq!(journal.changes(), vec![Change::Added("b"), Change::Added("a")]);
	journal.clear();

	assert!(controller.add_all(["a", "c"]));
	assert!(controller.remove(&"b"));
	assert!(!controller.remove(&"b"));
	assert_eq!(
		journal.changes(),
		vec![Change::Added("c"), Change::Removed("b")]
	);
	assert_eq!(set.to_vec(), vec!["a", "c"]);

	let a = set.element(&"a").expect("a is present");
	assert_eq!(a.index(), Some(0));
	assert!(controller.retain_all(["c"]));
	assert!(a.is_removed());
	assert_eq!(set.len(), 1);
	assert!(set.contains(&"c"));

	controller.clear();
	assert!(set.is_empty());
}

#[test]
fn collections_share_a_read_interface() {
	fn total(collection: &dyn ObservableCollection<i32>) -> i32 {
		collection.to_vec().iter().sum()
	}

	let list = ObservableList::new();
	list.control().add_all([1, 2, 3]);
	let set = ObservableSet::new();
	set.control().add_all([4, 5]);

	assert_eq!(total(&list), 6);
	assert_eq!(total(&set), 9);
	assert_eq!(ObservableCollection::elements(&set).len(), 2);
}

/// Rebuilds the list from its events, placing each addition at the index
/// the element reports when it arrives.
#[derive(Clone)]
struct Mirror {
	elements: Arc<Mutex<Vec<ElementStream<i32>>>>,
}

struct MirrorEntry {
	mirror: Mirror,
	element: ElementStream<i32>,
}

impl Observer<ChangeEvent<i32>> for MirrorEntry {
	fn on_next(&self, _: &ChangeEvent<i32>) -> Result<(), Fault> {
		Ok(())
	}

	fn on_completed(&self) {
		self.mirror
			.elements
			.lock()
			.unwrap()
			.retain(|element| !element.ptr_eq(&self.element));
	}
}

impl Observer<ElementStream<i32>> for Mirror {
	fn on_next(&self, element: &ElementStream<i32>) -> Result<(), Fault> {
		let index = element.index().ok_or_else(|| Fault::msg("added element has no index"))?;
		self.elements.lock().unwrap().insert(index, element.clone());
		element.subscribe(Arc::new(MirrorEntry {
			mirror: self.clone(),
			element: element.clone(),
		}));
		Ok(())
	}
}

#[derive(Clone, Debug)]
enum Op {
	Add(i32),
	Insert(Index, i32),
	RemoveAt(Index),
	Set(Index, i32),
	Retain(i32),
	Clear,
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		4 => any::<i32>().prop_map(Op::Add),
		3 => (any::<Index>(), any::<i32>()).prop_map(|(at, value)| Op::Insert(at, value)),
		2 => any::<Index>().prop_map(Op::RemoveAt),
		2 => (any::<Index>(), any::<i32>()).prop_map(|(at, value)| Op::Set(at, value)),
		1 => (2..5i32).prop_map(Op::Retain),
		1 => Just(Op::Clear),
	]
}

proptest! {
	#[test]
	fn list_matches_a_vec(ops in prop::collection::vec(op(), 0..60), cascade in any::<bool>()) {
		let policy = if cascade { InsertPolicy::Cascade } else { InsertPolicy::Shift };
		let list = ObservableList::with_options(Options::default().policy(policy));
		let controller = list.control();
		let mirror = Mirror { elements: Arc::new(Mutex::new(Vec::new())) };
		list.subscribe(Arc::new(mirror.clone()));

		let mut model: Vec<i32> = Vec::new();
		for op in ops {
			match op {
				Op::Add(value) => {
					controller.add(value);
					model.push(value);
				}
				Op::Insert(at, value) => {
					let index = at.index(model.len() + 1);
					controller.insert(index, value);
					model.insert(index, value);
				}
				Op::RemoveAt(at) if !model.is_empty() => {
					let index = at.index(model.len());
					prop_assert_eq!(controller.remove_at(index), model.remove(index));
				}
				Op::Set(at, value) if !model.is_empty() => {
					let index = at.index(model.len());
					prop_assert_eq!(controller.set(index, value), model[index]);
					model[index] = value;
				}
				Op::Retain(divisor) => {
					controller.retain(|value| value % divisor != 0);
					model.retain(|value| value % divisor != 0);
				}
				Op::Clear => {
					controller.clear();
					model.clear();
				}
				_ => {}
			}

			prop_assert_eq!(list.to_vec(), model.clone());
		}

		let mirrored: Vec<i32> = mirror.elements.lock().unwrap().iter().map(ElementStream::get).collect();
		prop_assert_eq!(mirrored, model);
	}
}
