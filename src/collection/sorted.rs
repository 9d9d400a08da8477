use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use fxhash::FxHashMap;
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use super::{ListController, ObservableCollection, ObservableList, Options};
use crate::addr::ArcAddr;
use crate::element::ElementBody;
use crate::ops::ObservableExt;
use crate::subject::{Controller, Subject};
use crate::{ChangeEvent, ElementStream, Fault, Observable, Observer, Subscription};

type Compare<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

new_key_type! {
	struct NodeKey;
}

struct Node<T> {
	value: T,
	left: Option<NodeKey>,
	right: Option<NodeKey>,
}

impl<T> Node<T> {
	fn unlinked(value: T) -> Self {
		Node {
			value,
			left: None,
			right: None,
		}
	}
}

/// Doubly linked order over the nodes. New nodes are placed by probing
/// from a seed node, the anchor unless a closer one is known.
struct Chain<T: 'static> {
	nodes: SlotMap<NodeKey, Node<T>>,
	anchor: Option<NodeKey>,
	sources: FxHashMap<ArcAddr<ElementBody<T>>, NodeKey>,
}

impl<T: 'static> Chain<T> {
	/// Splices an unlinked node in. Equal values go after the ones already
	/// there.
	fn link(&mut self, key: NodeKey, start: Option<NodeKey>, compare: &Compare<T>) {
		let seed = start
			.filter(|start| self.nodes.contains_key(*start))
			.or(self.anchor);
		let Some(mut probe) = seed else {
			self.anchor = Some(key);
			return;
		};

		let rightwards = compare(&self.nodes[key].value, &self.nodes[probe].value) != Ordering::Less;
		let (left, right) = if rightwards {
			while let Some(right) = self.nodes[probe].right {
				if compare(&self.nodes[key].value, &self.nodes[right].value) == Ordering::Less {
					break;
				}
				probe = right;
			}
			(Some(probe), self.nodes[probe].right)
		} else {
			while let Some(left) = self.nodes[probe].left {
				if compare(&self.nodes[key].value, &self.nodes[left].value) != Ordering::Less {
					break;
				}
				probe = left;
			}
			(self.nodes[probe].left, Some(probe))
		};

		self.nodes[key].left = left;
		self.nodes[key].right = right;
		if let Some(left) = left {
			self.nodes[left].right = Some(key);
		}
		if let Some(right) = right {
			self.nodes[right].left = Some(key);
		}
	}

	/// Takes a node out of the order and returns a former neighbor.
	fn unlink(&mut self, key: NodeKey) -> Option<NodeKey> {
		let (left, right) = (self.nodes[key].left, self.nodes[key].right);
		if let Some(left) = left {
			self.nodes[left].right = right;
		}
		if let Some(right) = right {
			self.nodes[right].left = left;
		}

		let node = &mut self.nodes[key];
		node.left = None;
		node.right = None;

		if self.anchor == Some(key) {
			self.anchor = left.or(right);
		}
		left.or(right)
	}

	/// Number of hops to the head.
	fn index(&self, key: NodeKey) -> usize {
		let mut index = 0;
		let mut cursor = self.nodes[key].left;
		while let Some(left) = cursor {
			index += 1;
			cursor = self.nodes[left].left;
		}
		index
	}

	/// Whether `value` could replace the node's value without breaking the
	/// order with either neighbor.
	fn fits(&self, key: NodeKey, value: &T, compare: &Compare<T>) -> bool {
		let node = &self.nodes[key];
		let left = node
			.left
			.map_or(true, |left| compare(&self.nodes[left].value, value) != Ordering::Greater);
		let right = node
			.right
			.map_or(true, |right| compare(value, &self.nodes[right].value) != Ordering::Greater);
		left && right
	}

	fn walk(&self) -> Vec<T>
	where
		T: Clone,
	{
		let Some(mut cursor) = self.anchor else {
			return Vec::new();
		};
		while let Some(left) = self.nodes[cursor].left {
			cursor = left;
		}

		let mut values = Vec::with_capacity(self.nodes.len());
		let mut next = Some(cursor);
		while let Some(key) = next {
			values.push(self.nodes[key].value.clone());
			next = self.nodes[key].right;
		}
		values
	}
}

/// A collection kept in comparator order while its source changes.
///
/// A source element whose new value still fits between its neighbors is
/// changed in place. One that no longer fits is removed (its sorted element
/// completes) and a brand-new element is added at its new position.
pub struct SortedList<T: 'static> {
	body: Arc<SortedBody<T>>,
}

struct SortedBody<T: 'static> {
	output: ListController<T>,
	chain: Mutex<Chain<T>>,
	compare: Compare<T>,
	signal: Subject<()>,
	stop: Controller<()>,
	subscription: Mutex<Option<Subscription>>,
	detached: AtomicBool,
}

enum Step {
	Update(usize),
	Move { from: usize, to: usize },
}

impl<T: 'static> Clone for SortedList<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> SortedList<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new<C>(source: &C, compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self
	where
		C: Observable<ElementStream<T>> + ?Sized,
	{
		Self::with_options(source, compare, Options::default().name("sorted list"))
	}

	pub fn ascending<C>(source: &C) -> Self
	where
		C: Observable<ElementStream<T>> + ?Sized,
		T: Ord,
	{
		Self::new(source, Ord::cmp)
	}

	pub fn with_options<C>(
		source: &C,
		compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
		options: Options,
	) -> Self
	where
		C: Observable<ElementStream<T>> + ?Sized,
	{
		let signal = Subject::new();
		let stop = signal.control();
		let body = Arc::new(SortedBody {
			output: ObservableList::with_options(options).control(),
			chain: Mutex::new(Chain {
				nodes: SlotMap::with_key(),
				anchor: None,
				sources: FxHashMap::default(),
			}),
			compare: Box::new(compare),
			signal,
			stop,
			subscription: Mutex::new(None),
			detached: AtomicBool::new(false),
		});

		let subscription = source.subscribe(Arc::new(Arrivals {
			sorted: Arc::downgrade(&body),
		}));
		*body.subscription.lock() = Some(subscription);

		SortedList { body }
	}

	/// Stops following the source. The sorted contents stay as they are.
	pub fn detach(&self) -> bool {
		if self.body.detached.swap(true, AtomicOrdering::AcqRel) {
			return false;
		}

		let subscription = self.body.subscription.lock().take();
		if let Some(subscription) = subscription {
			subscription.unsubscribe();
		}
		self.body.stop.next(&());
		self.body.stop.complete();
		tracing::debug!("sorted list detached from its source");
		true
	}

	pub fn list(&self) -> ObservableList<T> {
		self.body.output.list()
	}

	pub fn get(&self, index: usize) -> Option<T> {
		self.body.output.get(index)
	}

	pub fn len(&self) -> usize {
		self.body.output.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn to_vec(&self) -> Vec<T> {
		self.body.output.to_vec()
	}

	pub fn elements(&self) -> Vec<ElementStream<T>> {
		self.body.output.list().elements()
	}

	/// The values in link order, head to tail.
	pub fn walk(&self) -> Vec<T> {
		self.body.chain.lock().walk()
	}
}

impl<T> SortedBody<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn arrive(self: &Arc<Self>, element: &ElementStream<T>) {
		if self.detached.load(AtomicOrdering::Acquire) || element.is_removed() {
			return;
		}

		let value = element.get();
		{
			let mut edit = self.output.edit();
			let index = {
				let mut chain = self.chain.lock();
				let addr = element.addr();
				if chain.sources.contains_key(&addr) {
					return;
				}

				let key = chain.nodes.insert(Node::unlinked(value.clone()));
				chain.link(key, None, &self.compare);
				chain.sources.insert(addr, key);
				chain.index(key)
			};
			tracing::trace!(index, "sorted element added");
			edit.insert(index, value);
		}

		let _ = element
			.clone()
			.take_until::<_, ()>(self.signal.clone())
			.subscribe(Arc::new(Follow {
				sorted: Arc::downgrade(self),
				source: element.clone(),
			}));
	}

	fn change(&self, source: &ElementStream<T>, event: &ChangeEvent<T>) {
		let mut edit = self.output.edit();
		let step = {
			let mut chain = self.chain.lock();
			let addr = source.addr();
			let Some(&key) = chain.sources.get(&addr) else {
				return;
			};

			if chain.fits(key, &event.new, &self.compare) {
				chain.nodes[key].value = event.new.clone();
				Step::Update(chain.index(key))
			} else {
				let from = chain.index(key);
				let neighbor = chain.unlink(key);
				chain.nodes.remove(key);

				let moved = chain.nodes.insert(Node::unlinked(event.new.clone()));
				chain.link(moved, neighbor, &self.compare);
				chain.sources.insert(addr, moved);
				Step::Move {
					from,
					to: chain.index(moved),
				}
			}
		};

		match step {
			Step::Update(index) => {
				edit.set_with_cause(index, event.new.clone(), Arc::new(event.clone()));
			}
			Step::Move { from, to } => {
				tracing::trace!(from, to, "sorted element repositioned");
				edit.remove_at(from);
				edit.insert(to, event.new.clone());
			}
		}
	}

	fn depart(&self, source: &ElementStream<T>) {
		let mut edit = self.output.edit();
		let index = {
			let mut chain = self.chain.lock();
			let Some(key) = chain.sources.remove(&source.addr()) else {
				return;
			};
			let index = chain.index(key);
			chain.unlink(key);
			chain.nodes.remove(key);
			index
		};

		tracing::trace!(index, "sorted element removed");
		edit.remove_at(index);
	}
}

struct Arrivals<T: 'static> {
	sorted: Weak<SortedBody<T>>,
}

impl<T> Observer<ElementStream<T>> for Arrivals<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn on_next(&self, element: &ElementStream<T>) -> Result<(), Fault> {
		if let Some(sorted) = self.sorted.upgrade() {
			sorted.arrive(element);
		}
		Ok(())
	}
}

struct Follow<T: 'static> {
	sorted: Weak<SortedBody<T>>,
	source: ElementStream<T>,
}

impl<T> Observer<ChangeEvent<T>> for Follow<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn on_next(&self, event: &ChangeEvent<T>) -> Result<(), Fault> {
		if let Some(sorted) = self.sorted.upgrade() {
			sorted.change(&self.source, event);
		}
		Ok(())
	}

	fn on_completed(&self) {
		if let Some(sorted) = self.sorted.upgrade() {
			sorted.depart(&self.source);
		}
	}
}

impl<T> Observable<ElementStream<T>> for SortedList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ElementStream<T>>>) -> Subscription {
		self.body.output.list().subscribe(observer)
	}
}

impl<T> ObservableCollection<T> for SortedList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn len(&self) -> usize {
		SortedList::len(self)
	}

	fn elements(&self) -> Vec<ElementStream<T>> {
		SortedList::elements(self)
	}

	fn to_vec(&self) -> Vec<T> {
		SortedList::to_vec(self)
	}
}

impl<T> Debug for SortedList<T>
where
	T: Debug + Clone + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.to_vec()).finish()
	}
}
