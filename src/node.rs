use std::ptr;

use crate::sync_atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

/// A single atomically-accessed link field.
///
/// This is the generic-over-payload realization of the source's naming-
/// convention-coupled pointer arithmetic between the list anchor and a
/// node's own link fields: the list owns `head`/`tail` by value, and each
/// `Node` owns its `next`/`prev` by value, both as a plain `Link<T>`.
pub(crate) struct Link<T>(AtomicPtr<Node<T>>);

impl<T> Link<T> {
    pub(crate) fn null() -> Self {
        Link(AtomicPtr::new(ptr::null_mut()))
    }

    #[inline]
    pub(crate) fn load(&self, ord: Ordering) -> *mut Node<T> {
        self.0.load(ord)
    }

    #[inline]
    pub(crate) fn store(&self, new: *mut Node<T>, ord: Ordering) {
        self.0.store(new, ord)
    }

    #[inline]
    pub(crate) fn swap(&self, new: *mut Node<T>, ord: Ordering) -> *mut Node<T> {
        self.0.swap(new, ord)
    }

    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: *mut Node<T>,
        new: *mut Node<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<*mut Node<T>, *mut Node<T>> {
        self.0.compare_exchange(current, new, success, failure)
    }
}

/// An entry in the list.
///
/// `next`/`prev` are maintained by the list's publication, unlink and
/// sweep protocols. `removed` is set once by `mark_removed` and never
/// reset. `refcount` is maintained entirely by external callers; the list
/// only ever reads it, in `sweep`, to decide whether a logically-removed
/// node is safe to free.
pub struct Node<T> {
    pub(crate) next: Link<T>,
    pub(crate) prev: Link<T>,
    pub(crate) removed: AtomicBool,
    pub(crate) refcount: AtomicUsize,
    data: T,
}

unsafe impl<T: Send + Sync> Send for Node<T> {}
unsafe impl<T: Send + Sync> Sync for Node<T> {}

impl<T> Node<T> {
    pub(crate) fn new(data: T) -> Self {
        Node {
            next: Link::null(),
            prev: Link::null(),
            removed: AtomicBool::new(false),
            refcount: AtomicUsize::new(0),
            data,
        }
    }

    /// Returns the payload carried by this node.
    pub fn get(&self) -> &T {
        &self.data
    }

    /// Atomically marks this node as logically removed.
    ///
    /// Idempotent and monotone: once set, `is_removed` never reports
    /// `false` again. Safe to call from any thread holding a reference to
    /// the node, including from inside a `foreach_live` body on the node
    /// currently being visited.
    pub fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Returns whether this node has been logically removed.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Returns the current refcount.
    ///
    /// The count is maintained entirely by external users; the list never
    /// increments or decrements it on its own.
    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    /// Increments the refcount, returning the new value.
    ///
    /// Callers must pair this with a later [`Node::release`] once they are
    /// done dereferencing the node across a yield point.
    pub fn acquire(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the refcount, returning the new value.
    ///
    /// The decrement must happen-after the holder's last access to the
    /// node, since `sweep` may free the node as soon as the count reaches
    /// zero.
    pub fn release(&self) -> usize {
        self.refcount.fetch_sub(1, Ordering::AcqRel) - 1
    }
}
