use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Compares, orders and hashes an `Arc` by the address it points to.
pub(crate) struct ArcAddr<T: ?Sized> {
	ptr: Arc<T>,
}

impl<T: ?Sized> ArcAddr<T> {
	pub(crate) fn new(ptr: Arc<T>) -> Self {
		ArcAddr { ptr }
	}
}

impl<T: ?Sized> Clone for ArcAddr<T> {
	fn clone(&self) -> Self {
		ArcAddr {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> Deref for ArcAddr<T> {
	type Target = Arc<T>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl<T: ?Sized> PartialEq for ArcAddr<T> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.ptr, &other.ptr)
	}
}

impl<T: ?Sized> Eq for ArcAddr<T> {}

impl<T: ?Sized> Hash for ArcAddr<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		(Arc::as_ptr(&self.ptr) as *const ()).hash(state)
	}
}

impl<T: ?Sized> Ord for ArcAddr<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		(Arc::as_ptr(&self.ptr) as *const ()).cmp(&(Arc::as_ptr(&other.ptr) as *const ()))
	}
}

impl<T: ?Sized> PartialOrd for ArcAddr<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
