use propagate::{MergedList, MergedSet, ObservableList, ObservableSet};

use crate::mock::{self, Change, Journal};

#[test]
fn concatenates_in_attach_order() {
	mock::init_tracing();

	let first = ObservableList::new();
	let first_controller = first.control();
	first_controller.add_all([1, 2]);
	let second = ObservableList::new();
	let second_controller = second.control();
	second_controller.add(10);

	let merged = MergedList::new();
	let a = merged.attach(&first);
	let b = merged.attach(&second);

	assert_eq!(merged.to_vec(), vec![1, 2, 10]);
	assert_eq!(merged.member_count(), 2);
	assert_eq!((merged.offset_of(a), merged.offset_of(b)), (Some(0), Some(2)));

	first_controller.add(3);
	assert_eq!(merged.to_vec(), vec![1, 2, 3, 10]);
	assert_eq!(merged.offset_of(b), Some(3));

	second_controller.insert(0, 9);
	assert_eq!(merged.to_vec(), vec![1, 2, 3, 9, 10]);

	first_controller.remove_at(1);
	assert_eq!(merged.to_vec(), vec![1, 3, 9, 10]);
	assert_eq!(merged.offset_of(b), Some(2));
	assert_eq!(merged.get(2), Some(9));
}

#[test]
fn member_changes_are_in_place() {
	let member = ObservableList::new();
	let controller = member.control();
	controller.add_all([1, 2]);

	let merged = MergedList::new();
	merged.attach(&member);
	let before = merged.list().element(1).expect("merged element");

	let (journal, _subscription) = Journal::follow(&merged);
	journal.clear();
	controller.set(1, 20);

	assert_eq!(journal.changes(), vec![Change::Changed(2, 20)]);
	assert!(merged.list().element(1).expect("merged element").ptr_eq(&before));
	assert_eq!(before.get(), 20);
}

#[test]
fn detach_removes_the_slice() {
	let first = ObservableList::new();
	let first_controller = first.control();
	first_controller.add_all([1, 2]);
	let second = ObservableList::new();
	let second_controller = second.control();
	second_controller.add_all([3, 4]);

	let merged = MergedList::new();
	let a = merged.attach(&first);
	let b = merged.attach(&second);

	let (journal, _subscription) = Journal::follow(&merged);
	journal.clear();

	assert!(merged.detach(a));
	assert!(!merged.detach(a));
	assert_eq!(journal.changes(), vec![Change::Removed(2), Change::Removed(1)]);
	assert_eq!(merged.to_vec(), vec![3, 4]);
	assert_eq!(merged.offset_of(a), None);
	assert_eq!(merged.offset_of(b), Some(0));
	assert_eq!(merged.member_count(), 1);

	journal.clear();
	first_controller.set(0, 100);
	first_controller.add(5);
	first_controller.clear();
	assert!(journal.changes().is_empty());

	second_controller.add(6);
	assert_eq!(merged.to_vec(), vec![3, 4, 6]);
}

#[test]
fn merges_can_be_nested() {
	let inner_member = ObservableList::new();
	let inner_controller = inner_member.control();
	inner_controller.add_all(["b", "c"]);

	let inner = MergedList::new();
	inner.attach(&inner_member);

	let head = ObservableList::new();
	head.control().add("a");

	let outer = MergedList::new();
	outer.attach(&head);
	outer.attach(&inner);
	assert_eq!(outer.to_vec(), vec!["a", "b", "c"]);

	inner_controller.remove(&"b");
	inner_controller.set(0, "z");
	assert_eq!(outer.to_vec(), vec!["a", "z"]);
}

#[test]
fn set_union_counts_holders() {
	let left = ObservableSet::new();
	let left_controller = left.control();
	left_controller.add_all([1, 2, 3]);
	let right = ObservableSet::new();
	let right_controller = right.control();
	right_controller.add_all([3, 4]);

	let merged = MergedSet::new();
	merged.attach(&left);
	let r = merged.attach(&right);
	assert_eq!(merged.to_vec(), vec![1, 2, 3, 4]);

	let (journal, _subscription) = Journal::follow(&merged);
	journal.clear();

	left_controller.remove(&3);
	assert!(merged.contains(&3));
	assert!(journal.changes().is_empty());

	right_controller.remove(&3);
	assert!(!merged.contains(&3));
	assert_eq!(journal.changes(), vec![Change::Removed(3)]);

	journal.clear();
	left_controller.add(4);
	assert!(journal.changes().is_empty());

	assert!(merged.detach(r));
	assert!(merged.contains(&4));
	assert_eq!(merged.to_vec(), vec![1, 2, 4]);
	assert_eq!(merged.member_count(), 1);
}

#[test]
fn detaching_a_set_member_drops_its_own_values() {
	let left = ObservableSet::new();
	left.control().add_all(["x", "shared"]);
	let right = ObservableSet::new();
	right.control().add_all(["shared", "y"]);

	let merged = MergedSet::new();
	let l = merged.attach(&left);
	merged.attach(&right);

	let (journal, _subscription) = Journal::follow(&merged);
	journal.clear();

	merged.detach(l);
	assert_eq!(journal.changes(), vec![Change::Removed("x")]);
	assert_eq!(merged.to_vec(), vec!["shared", "y"]);
}

#[test]
fn set_union_follows_value_changes() {
	let list = ObservableList::new();
	let controller = list.control();
	controller.add_all([5, 5, 7]);

	let merged = MergedSet::new();
	merged.attach(&list);
	assert_eq!(merged.to_vec(), vec![5, 7]);

	// One of the two fives still holds the value.
	controller.set(0, 6);
	assert_eq!(merged.to_vec(), vec![5, 7, 6]);

	controller.set(1, 7);
	assert_eq!(merged.to_vec(), vec![7, 6]);

	controller.remove_at(2);
	assert_eq!(merged.to_vec(), vec![7, 6]);
	controller.remove_at(1);
	assert_eq!(merged.to_vec(), vec![6]);
}
