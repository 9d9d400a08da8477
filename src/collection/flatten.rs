use std::cmp::Ordering;
use std::collections::VecDeque;

use super::ObservableCollection;
use crate::Error;

/// K-way merge of iterators that are each already sorted by `compare`.
///
/// Yields the smallest head first; equal heads come out in member order.
/// A member that yields an item smaller than its previous one breaks the
/// precondition and makes the merge panic with [`Error::Unsorted`].
pub struct SortedMerge<I: Iterator, F> {
	members: Vec<I>,
	heads: Vec<Option<I::Item>>,
	/// Members with a head, smallest head first.
	order: VecDeque<usize>,
	compare: F,
}

impl<I, F> SortedMerge<I, F>
where
	I: Iterator,
	F: Fn(&I::Item, &I::Item) -> Ordering,
{
	fn new(members: Vec<I>, compare: F) -> Self {
		let mut merge = SortedMerge {
			heads: Vec::with_capacity(members.len()),
			order: VecDeque::with_capacity(members.len()),
			members,
			compare,
		};

		for member in 0..merge.members.len() {
			let head = merge.members[member].next();
			merge.heads.push(head);
			merge.enqueue(member);
		}
		merge
	}

	/// Puts a member with a head into the order; ties go behind members
	/// registered earlier.
	fn enqueue(&mut self, member: usize) {
		let Some(head) = self.heads[member].as_ref() else {
			return;
		};

		let heads = &self.heads;
		let compare = &self.compare;
		let position = self.order.partition_point(|&other| {
			let Some(other_head) = heads[other].as_ref() else {
				return true;
			};
			match compare(other_head, head) {
				Ordering::Less => true,
				Ordering::Equal => other < member,
				Ordering::Greater => false,
			}
		});
		self.order.insert(position, member);
	}
}

impl<I, F> Iterator for SortedMerge<I, F>
where
	I: Iterator,
	F: Fn(&I::Item, &I::Item) -> Ordering,
{
	type Item = I::Item;

	fn next(&mut self) -> Option<I::Item> {
		let member = self.order.pop_front()?;
		let value = self.heads[member].take()?;

		let next = self.members[member].next();
		if let Some(next) = next.as_ref() {
			if (self.compare)(next, &value) == Ordering::Less {
				panic!("{}", Error::Unsorted { member });
			}
		}
		self.heads[member] = next;
		self.enqueue(member);

		Some(value)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let queued = self.order.len();
		self.members
			.iter()
			.map(Iterator::size_hint)
			.fold((queued, Some(queued)), |(low, high), (member_low, member_high)| {
				(
					low.saturating_add(member_low),
					high.zip(member_high).and_then(|(a, b)| a.checked_add(b)),
				)
			})
	}
}

/// Merges iterators that are each sorted by `compare`.
///
/// ```
/// use propagate::merge_sorted;
///
/// let merged: Vec<u32> = merge_sorted(
/// 	vec![vec![1, 4, 9].into_iter(), vec![2, 3, 10].into_iter()],
/// 	|a: &u32, b: &u32| a.cmp(b),
/// )
/// .collect();
/// assert_eq!(merged, [1, 2, 3, 4, 9, 10]);
/// ```
pub fn merge_sorted<I, F>(members: impl IntoIterator<Item = I>, compare: F) -> SortedMerge<I, F>
where
	I: Iterator,
	F: Fn(&I::Item, &I::Item) -> Ordering,
{
	SortedMerge::new(members.into_iter().collect(), compare)
}

/// Merges snapshots of collections that are each sorted by `compare`,
/// typically [`crate::SortedList`]s.
pub fn flatten_sorted<T, F>(
	members: &[&dyn ObservableCollection<T>],
	compare: F,
) -> SortedMerge<std::vec::IntoIter<T>, F>
where
	T: 'static,
	F: Fn(&T, &T) -> Ordering,
{
	merge_sorted(members.iter().map(|member| member.to_vec().into_iter()), compare)
}
