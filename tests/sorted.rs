use std::cmp::Ordering;

use proptest::prelude::*;
use proptest::sample::Index;
use propagate::{
	flatten_sorted, merge_sorted, ObservableCollection, ObservableList, ObservableSet, SortedList,
};

use crate::mock::{self, Change, Journal};

#[test]
fn keeps_order_while_the_source_changes() {
	mock::init_tracing();

	let source = ObservableList::new();
	let controller = source.control();
	let sorted = SortedList::ascending(&source);

	controller.add(5);
	assert_eq!(sorted.walk(), vec![5]);
	controller.add(1);
	assert_eq!(sorted.walk(), vec![1, 5]);
	controller.add(3);
	assert_eq!(sorted.walk(), vec![1, 3, 5]);

	controller.set(1, 9);
	assert_eq!(sorted.walk(), vec![3, 5, 9]);
	assert_eq!(sorted.to_vec(), sorted.walk());
	assert_eq!(source.to_vec(), vec![5, 9, 3]);
}

#[test]
fn sorts_what_is_already_there() {
	let source = ObservableSet::new();
	source.control().add_all(["pear", "apple", "fig"]);

	let sorted = SortedList::ascending(&source);
	assert_eq!(sorted.to_vec(), vec!["apple", "fig", "pear"]);
	assert_eq!(sorted.len(), 3);
	assert_eq!(sorted.get(1), Some("fig"));
}

#[test]
fn custom_comparator() {
	let source = ObservableList::new();
	let controller = source.control();
	controller.add_all([2, 8, 5]);

	let descending = SortedList::new(&source, |a: &i32, b: &i32| b.cmp(a));
	assert_eq!(descending.to_vec(), vec![8, 5, 2]);

	controller.add(6);
	assert_eq!(descending.to_vec(), vec![8, 6, 5, 2]);
}

#[test]
fn fitting_change_is_in_place() {
	let source = ObservableList::new();
	let controller = source.control();
	controller.add_all([1, 3, 5]);
	let sorted = SortedList::ascending(&source);
	let middle = sorted.list().element(1).expect("middle element");

	let (journal, _subscription) = Journal::follow(&sorted);
	journal.clear();
	controller.set(1, 4);

	assert_eq!(journal.changes(), vec![Change::Changed(3, 4)]);
	assert!(!middle.is_removed());
	assert_eq!(middle.get(), 4);
	assert_eq!(sorted.to_vec(), vec![1, 4, 5]);
}

#[test]
fn reposition_reissues_the_element() {
	let source = ObservableList::new();
	let controller = source.control();
	controller.add_all([1, 3, 5]);
	let sorted = SortedList::ascending(&source);
	let first = sorted.list().element(0).expect("first element");

	let (journal, _subscription) = Journal::follow(&sorted);
	journal.clear();
	controller.set(0, 9);

	assert_eq!(journal.changes(), vec![Change::Removed(1), Change::Added(9)]);
	assert!(first.is_removed());
	let last = sorted.list().element(2).expect("last element");
	assert!(!last.ptr_eq(&first));
	assert_eq!(last.index(), Some(2));

	// The repositioned source element is still followed.
	controller.set(0, 10);
	assert_eq!(journal.changes().last(), Some(&Change::Changed(9, 10)));
	assert_eq!(sorted.to_vec(), vec![3, 5, 10]);
}

#[test]
fn removal_and_detach() {
	let source = ObservableList::new();
	let controller = source.control();
	controller.add_all([4, 2, 7]);
	let sorted = SortedList::ascending(&source);

	controller.remove(&4);
	assert_eq!(sorted.to_vec(), vec![2, 7]);
	assert_eq!(sorted.walk(), vec![2, 7]);

	assert!(sorted.detach());
	assert!(!sorted.detach());
	controller.add(1);
	controller.set(0, 100);
	controller.clear();
	assert_eq!(sorted.to_vec(), vec![2, 7]);
	assert!(!sorted.is_empty());
}

#[test]
fn flatten_keeps_member_order_on_ties() {
	let compare = |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0);

	let left = ObservableList::new();
	left.control().add_all([(1, 'a'), (2, 'a'), (4, 'a')]);
	let right = ObservableList::new();
	right.control().add_all([(1, 'b'), (2, 'b'), (3, 'b')]);

	let left_sorted = SortedList::new(&left, compare);
	let right_sorted = SortedList::new(&right, compare);
	let members: [&dyn ObservableCollection<(i32, char)>; 2] = [&left_sorted, &right_sorted];

	let flat: Vec<(i32, char)> = flatten_sorted(&members, compare).collect();
	assert_eq!(
		flat,
		vec![(1, 'a'), (1, 'b'), (2, 'a'), (2, 'b'), (3, 'b'), (4, 'a')]
	);
}

#[test]
fn merge_sorted_handles_empty_members() {
	let merged: Vec<i32> = merge_sorted(
		vec![vec![].into_iter(), vec![2, 2, 5].into_iter(), vec![1].into_iter()],
		|a: &i32, b: &i32| a.cmp(b),
	)
	.collect();
	assert_eq!(merged, vec![1, 2, 2, 5]);
}

#[test]
#[should_panic(expected = "sorted member 1 yielded an item out of order")]
fn merge_sorted_rejects_unsorted_members() {
	let _: Vec<i32> = merge_sorted(
		vec![vec![1, 2].into_iter(), vec![3, 0].into_iter()],
		|a: &i32, b: &i32| a.cmp(b),
	)
	.collect();
}

#[derive(Clone, Debug)]
enum Op {
	Add(i16),
	Set(Index, i16),
	RemoveAt(Index),
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		3 => any::<i16>().prop_map(Op::Add),
		3 => (any::<Index>(), any::<i16>()).prop_map(|(at, value)| Op::Set(at, value)),
		1 => any::<Index>().prop_map(Op::RemoveAt),
	]
}

proptest! {
	#[test]
	fn sorted_output_matches_a_sorted_model(ops in prop::collection::vec(op(), 0..80)) {
		let source = ObservableList::new();
		let controller = source.control();
		let sorted = SortedList::new(&source, |a: &i16, b: &i16| a.cmp(b));

		let mut model: Vec<i16> = Vec::new();
		for op in ops {
			match op {
				Op::Add(value) => {
					controller.add(value);
					model.push(value);
				}
				Op::Set(at, value) if !model.is_empty() => {
					let index = at.index(model.len());
					controller.set(index, value);
					model[index] = value;
				}
				Op::RemoveAt(at) if !model.is_empty() => {
					let index = at.index(model.len());
					controller.remove_at(index);
					model.remove(index);
				}
				_ => {}
			}

			let mut expected = model.clone();
			expected.sort();
			prop_assert_eq!(sorted.to_vec(), expected.clone());
			prop_assert_eq!(sorted.walk(), expected);
		}

		let ordered = sorted
			.to_vec()
			.windows(2)
			.all(|pair| pair[0].cmp(&pair[1]) != Ordering::Greater);
		prop_assert!(ordered);
	}
}

proptest! {
	#[test]
	fn merge_sorted_equals_sorting_everything(members in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..12), 0..6)) {
		let members: Vec<Vec<u8>> = members
			.into_iter()
			.map(|mut member| {
				member.sort();
				member
			})
			.collect();

		let mut expected: Vec<u8> = members.iter().flatten().copied().collect();
		expected.sort();

		let merge = merge_sorted(members.into_iter().map(Vec::into_iter), |a: &u8, b: &u8| a.cmp(b));
		prop_assert_eq!(merge.size_hint(), (expected.len(), Some(expected.len())));
		prop_assert_eq!(merge.collect::<Vec<u8>>(), expected);
	}
}
