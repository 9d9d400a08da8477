use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use fxhash::FxHashMap;
use parking_lot::Mutex;

use super::{
	ListController, MemberId, ObservableCollection, ObservableList, ObservableSet, Options,
	SetController,
};
use crate::ops::ObservableExt;
use crate::subject::{Controller, Subject};
use crate::{ChangeEvent, ElementStream, Fault, Observable, Observer, Subscription};

/// Reactions of a merged collection to its members' events.
///
/// Every reaction takes the merged collection's exclusive lease before its
/// own member table, never the other way round.
trait Merge<T: 'static>: Send + Sync + Sized + 'static {
	fn arrive(self: &Arc<Self>, member: MemberId, element: &ElementStream<T>);

	fn change(&self, member: MemberId, element: &ElementStream<T>, event: &ChangeEvent<T>);

	fn depart(&self, member: MemberId, element: &ElementStream<T>);
}

/// Bookkeeping every member carries.
struct Link {
	id: MemberId,
	/// Fires once when the member is detached; every element subscription
	/// of the member ends on it.
	signal: Subject<()>,
	stop: Arc<Controller<()>>,
	subscription: Option<Subscription>,
	detached: bool,
}

impl Link {
	fn new(id: MemberId) -> Self {
		let signal = Subject::new();
		let stop = Arc::new(signal.control());
		Link {
			id,
			signal,
			stop,
			subscription: None,
			detached: false,
		}
	}

	fn is_live(&self, id: MemberId) -> bool {
		self.id == id && !self.detached
	}
}

trait Membership {
	fn link(&self) -> &Link;

	fn link_mut(&mut self) -> &mut Link;
}

/// Stores the member's subscription, or drops it if the member was detached
/// while it was being set up.
fn keep<M: Membership>(members: &Mutex<Vec<M>>, id: MemberId, subscription: Subscription) {
	let late = {
		let mut members = members.lock();
		match members.iter_mut().find(|member| member.link().is_live(id)) {
			Some(member) => {
				member.link_mut().subscription = Some(subscription);
				None
			}
			None => Some(subscription),
		}
	};

	if let Some(subscription) = late {
		subscription.unsubscribe();
	}
}

/// Marks the member detached, stops following it and fires its signal.
/// Returns `false` for unknown or already detached members.
fn cut<M: Membership>(members: &Mutex<Vec<M>>, id: MemberId) -> bool {
	let (subscription, stop) = {
		let mut members = members.lock();
		let Some(member) = members.iter_mut().find(|member| member.link().is_live(id)) else {
			return false;
		};
		let link = member.link_mut();
		link.detached = true;
		(link.subscription.take(), link.stop.clone())
	};

	if let Some(subscription) = subscription {
		subscription.unsubscribe();
	}
	stop.next(&());
	stop.complete();
	true
}

struct Arrivals<M> {
	merge: Weak<M>,
	member: MemberId,
}

impl<T, M> Observer<ElementStream<T>> for Arrivals<M>
where
	T: 'static,
	M: Merge<T>,
{
	fn on_next(&self, element: &ElementStream<T>) -> Result<(), Fault> {
		if let Some(merge) = self.merge.upgrade() {
			merge.arrive(self.member, element);
		}
		Ok(())
	}
}

struct Tracked<M, T: 'static> {
	merge: Weak<M>,
	member: MemberId,
	element: ElementStream<T>,
}

impl<T, M> Observer<ChangeEvent<T>> for Tracked<M, T>
where
	T: Send + Sync + 'static,
	M: Merge<T>,
{
	fn on_next(&self, event: &ChangeEvent<T>) -> Result<(), Fault> {
		if let Some(merge) = self.merge.upgrade() {
			merge.change(self.member, &self.element, event);
		}
		Ok(())
	}

	fn on_completed(&self) {
		if let Some(merge) = self.merge.upgrade() {
			merge.depart(self.member, &self.element);
		}
	}
}

/// Follows one member element until it is removed or its member detached.
fn track<T, M>(merge: &Arc<M>, member: MemberId, signal: Subject<()>, element: &ElementStream<T>)
where
	T: Clone + Send + Sync + 'static,
	M: Merge<T>,
{
	// The subscription ends itself on completion or on the signal.
	let _ = element
		.clone()
		.take_until::<_, ()>(signal)
		.subscribe(Arc::new(Tracked {
			merge: Arc::downgrade(merge),
			member,
			element: element.clone(),
		}));
}

/// Concatenation of several collections, in attach order.
///
/// Each member owns a contiguous slice of the merged list, starting at its
/// offset. Element changes in a member become in-place changes of the
/// merged element; additions and removals shift the offsets of the members
/// after it.
pub struct MergedList<T: 'static> {
	body: Arc<MergedListBody<T>>,
}

struct MergedListBody<T: 'static> {
	output: ListController<T>,
	members: Mutex<Vec<ListMember<T>>>,
}

struct ListMember<T: 'static> {
	link: Link,
	offset: usize,
	/// The member's elements, in the member's order.
	mirror: Vec<ElementStream<T>>,
}

impl<T: 'static> Membership for ListMember<T> {
	fn link(&self) -> &Link {
		&self.link
	}

	fn link_mut(&mut self) -> &mut Link {
		&mut self.link
	}
}

impl<T: 'static> Clone for MergedList<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for MergedList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn default() -> Self {
		MergedList::new()
	}
}

impl<T> MergedList<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::with_options(Options::default().name("merged list"))
	}

	pub fn with_options(options: Options) -> Self {
		let output = ObservableList::with_options(options).control();
		MergedList {
			body: Arc::new(MergedListBody {
				output,
				members: Mutex::new(Vec::new()),
			}),
		}
	}

	/// Appends `member` after every member already attached. Its current
	/// elements are added right away.
	pub fn attach<C>(&self, member: &C) -> MemberId
	where
		C: Observable<ElementStream<T>> + ?Sized,
	{
		let id = MemberId::next();
		{
			let _edit = self.body.output.edit();
			let mut members = self.body.members.lock();
			let offset = members.iter().map(|member| member.mirror.len()).sum();
			members.push(ListMember {
				link: Link::new(id),
				offset,
				mirror: Vec::new(),
			});
		}
		tracing::debug!(member = ?id, "member attached to merged list");

		let subscription = member.subscribe(Arc::new(Arrivals {
			merge: Arc::downgrade(&self.body),
			member: id,
		}));
		keep(&self.body.members, id, subscription);
		id
	}

	/// Removes the member's slice and stops following it.
	pub fn detach(&self, id: MemberId) -> bool {
		if !cut(&self.body.members, id) {
			return false;
		}

		let mut edit = self.body.output.edit();
		let (offset, len) = {
			let mut members = self.body.members.lock();
			let Some(position) = members.iter().position(|member| member.link.id == id) else {
				return false;
			};
			let member = members.remove(position);
			let len = member.mirror.len();
			for later in members[position..].iter_mut() {
				later.offset -= len;
			}
			(member.offset, len)
		};

		for local in (0..len).rev() {
			edit.remove_at(offset + local);
		}

		tracing::debug!(member = ?id, removed = len, "member detached from merged list");
		true
	}

	/// Where the member's slice starts in the merged list.
	pub fn offset_of(&self, id: MemberId) -> Option<usize> {
		self.body
			.members
			.lock()
			.iter()
			.find(|member| member.link.is_live(id))
			.map(|member| member.offset)
	}

	pub fn member_count(&self) -> usize {
		self.body
			.members
			.lock()
			.iter()
			.filter(|member| !member.link.detached)
			.count()
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
}

impl<T> Merge<T> for MergedListBody<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn arrive(self: &Arc<Self>, id: MemberId, element: &ElementStream<T>) {
		let Some(local) = element.index() else { return };

		let signal = {
			let mut edit = self.output.edit();
			let (index, signal) = {
				let mut members = self.members.lock();
				let Some(position) = members.iter().position(|member| member.link.is_live(id))
				else {
					return;
				};

				let (index, signal) = {
					let member = &mut members[position];
					let local = local.min(member.mirror.len());
					member.mirror.insert(local, element.clone());
					(member.offset + local, member.link.signal.clone())
				};
				for later in members[position + 1..].iter_mut() {
					later.offset += 1;
				}
				(index, signal)
			};
			edit.insert(index, element.get());
			signal
		};

		track(self, id, signal, element);
	}

	fn change(&self, id: MemberId, element: &ElementStream<T>, event: &ChangeEvent<T>) {
		let mut edit = self.output.edit();
		let index = {
			let members = self.members.lock();
			let Some(member) = members.iter().find(|member| member.link.is_live(id)) else {
				return;
			};
			let Some(local) = member
				.mirror
				.iter()
				.position(|candidate| candidate.ptr_eq(element))
			else {
				return;
			};
			member.offset + local
		};

		edit.set_with_cause(index, event.new.clone(), Arc::new(event.clone()));
	}

	fn depart(&self, id: MemberId, element: &ElementStream<T>) {
		let mut edit = self.output.edit();
		let index = {
			let mut members = self.members.lock();
			let Some(position) = members.iter().position(|member| member.link.is_live(id)) else {
				return;
			};

			let index = {
				let member = &mut members[position];
				let Some(local) = member
					.mirror
					.iter()
					.position(|candidate| candidate.ptr_eq(element))
				else {
					return;
				};
				member.mirror.remove(local);
				member.offset + local
			};
			for later in members[position + 1..].iter_mut() {
				later.offset -= 1;
			}
			index
		};

		edit.remove_at(index);
	}
}

impl<T> Observable<ElementStream<T>> for MergedList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ElementStream<T>>>) -> Subscription {
		self.body.output.list().subscribe(observer)
	}
}

impl<T> ObservableCollection<T> for MergedList<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn len(&self) -> usize {
		MergedList::len(self)
	}

	fn elements(&self) -> Vec<ElementStream<T>> {
		self.body.output.list().elements()
	}

	fn to_vec(&self) -> Vec<T> {
		MergedList::to_vec(self)
	}
}

impl<T> Debug for MergedList<T>
where
	T: Debug + Clone + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MergedList")
			.field("members", &self.member_count())
			.field("values", &self.to_vec())
			.finish()
	}
}

/// Union of several collections.
///
/// A value is in the merged set while at least one attached member holds
/// it. The merge counts each member's values itself, so deciding whether a
/// value is still held never reads another collection.
pub struct MergedSet<T: 'static> {
	body: Arc<MergedSetBody<T>>,
}

struct MergedSetBody<T: 'static> {
	output: SetController<T>,
	members: Mutex<Vec<SetMember<T>>>,
}

struct SetMember<T: 'static> {
	link: Link,
	counts: FxHashMap<T, usize>,
}

impl<T: 'static> Membership for SetMember<T> {
	fn link(&self) -> &Link {
		&self.link
	}

	fn link_mut(&mut self) -> &mut Link {
		&mut self.link
	}
}

impl<T> SetMember<T>
where
	T: Clone + Eq + Hash,
{
	fn count(&mut self, value: &T) {
		*self.counts.entry(value.clone()).or_insert(0) += 1;
	}

	fn uncount(&mut self, value: &T) {
		if let Some(count) = self.counts.get_mut(value) {
			*count -= 1;
			if *count == 0 {
				self.counts.remove(value);
			}
		}
	}
}

fn held<T: Eq + Hash>(members: &[SetMember<T>], value: &T) -> bool {
	members
		.iter()
		.any(|member| !member.link.detached && member.counts.contains_key(value))
}

impl<T: 'static> Clone for MergedSet<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for MergedSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn default() -> Self {
		MergedSet::new()
	}
}

impl<T> MergedSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::with_options(Options::default().name("merged set"))
	}

	pub fn with_options(options: Options) -> Self {
		let output = ObservableSet::with_options(options).control();
		MergedSet {
			body: Arc::new(MergedSetBody {
				output,
				members: Mutex::new(Vec::new()),
			}),
		}
	}

	pub fn attach<C>(&self, member: &C) -> MemberId
	where
		C: Observable<ElementStream<T>> + ?Sized,
	{
		let id = MemberId::next();
		{
			let _edit = self.body.output.edit();
			self.body.members.lock().push(SetMember {
				link: Link::new(id),
				counts: FxHashMap::default(),
			});
		}
		tracing::debug!(member = ?id, "member attached to merged set");

		let subscription = member.subscribe(Arc::new(Arrivals {
			merge: Arc::downgrade(&self.body),
			member: id,
		}));
		keep(&self.body.members, id, subscription);
		id
	}

	/// Stops following the member. Values no other member holds leave the
	/// merged set, in merged order.
	pub fn detach(&self, id: MemberId) -> bool {
		if !cut(&self.body.members, id) {
			return false;
		}

		let mut edit = self.body.output.edit();
		let gone: Vec<T> = {
			let mut members = self.body.members.lock();
			let Some(position) = members.iter().position(|member| member.link.id == id) else {
				return false;
			};
			let member = members.remove(position);
			edit.to_vec()
				.into_iter()
				.filter(|value| member.counts.contains_key(value) && !held(&members, value))
				.collect()
		};

		for value in gone.iter() {
			edit.remove(value);
		}

		tracing::debug!(member = ?id, removed = gone.len(), "member detached from merged set");
		true
	}

	pub fn member_count(&self) -> usize {
		self.body
			.members
			.lock()
			.iter()
			.filter(|member| !member.link.detached)
			.count()
	}

	pub fn set(&self) -> ObservableSet<T> {
		self.body.output.set()
	}

	pub fn contains(&self, value: &T) -> bool {
		self.body.output.contains(value)
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
}

impl<T> Merge<T> for MergedSetBody<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn arrive(self: &Arc<Self>, id: MemberId, element: &ElementStream<T>) {
		if element.is_removed() {
			return;
		}

		let value = element.get();
		let signal = {
			let mut edit = self.output.edit();
			let signal = {
				let mut members = self.members.lock();
				let Some(member) = members.iter_mut().find(|member| member.link.is_live(id)) else {
					return;
				};
				member.count(&value);
				member.link.signal.clone()
			};
			edit.add(value);
			signal
		};

		track(self, id, signal, element);
	}

	fn change(&self, id: MemberId, _: &ElementStream<T>, event: &ChangeEvent<T>) {
		let Some(old) = event.old.as_ref() else { return };

		let mut edit = self.output.edit();
		let gone = {
			let mut members = self.members.lock();
			let Some(member) = members.iter_mut().find(|member| member.link.is_live(id)) else {
				return;
			};
			member.uncount(old);
			member.count(&event.new);
			!held(&members, old)
		};

		if gone {
			edit.remove(old);
		}
		edit.add(event.new.clone());
	}

	fn depart(&self, id: MemberId, element: &ElementStream<T>) {
		let value = element.get();

		let mut edit = self.output.edit();
		let gone = {
			let mut members = self.members.lock();
			let Some(member) = members.iter_mut().find(|member| member.link.is_live(id)) else {
				return;
			};
			member.uncount(&value);
			!held(&members, &value)
		};

		if gone {
			edit.remove(&value);
		}
	}
}

impl<T> Observable<ElementStream<T>> for MergedSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn subscribe(&self, observer: Arc<dyn Observer<ElementStream<T>>>) -> Subscription {
		self.body.output.set().subscribe(observer)
	}
}

impl<T> ObservableCollection<T> for MergedSet<T>
where
	T: Clone + Eq + Hash + Send + Sync + 'static,
{
	fn len(&self) -> usize {
		MergedSet::len(self)
	}

	fn elements(&self) -> Vec<ElementStream<T>> {
		self.body.output.set().elements()
	}

	fn to_vec(&self) -> Vec<T> {
		MergedSet::to_vec(self)
	}
}

impl<T> Debug for MergedSet<T>
where
	T: Debug + Clone + Eq + Hash + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MergedSet")
			.field("members", &self.member_count())
			.field("values", &self.to_vec())
			.finish()
	}
}
