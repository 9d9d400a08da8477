pub use enclose::*;

/// Builds an observer from a closure body. Captures listed in parentheses
/// are cloned into the closure first.
///
/// ```
/// use propagate::{observer, Observable, Subject};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let subject = Subject::<usize>::new();
/// let controller = subject.control();
/// subject.subscribe(observer!((seen) value: usize => {
/// 	seen.fetch_add(*value, Ordering::SeqCst);
/// }));
/// controller.next(&3);
/// assert_eq!(seen.load(Ordering::SeqCst), 3);
/// ```
#[macro_export]
macro_rules! observer {
    (( $($d_tt:tt)* ) $value:ident : $t:ty => $($b:tt)*) => {
        $crate::Callbacks::<$t>::new($crate::macros::enclose!(($( $d_tt )*) move |$value: &$t| { $($b)* })).build()
    };
    ($value:ident : $t:ty => $($b:tt)*) => {
        $crate::Callbacks::<$t>::new(move |$value: &$t| { $($b)* }).build()
    };
}
