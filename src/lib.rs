//! A concurrent doubly-linked list for high-throughput work queues.
//!
//! Producers publish nodes at the head or tail without a shared mutex.
//! Consumers mark nodes as logically removed (`Node::mark_removed`) or
//! unlink one outright (`List::delete`); a reclaimer thread periodically
//! sweeps the list, freeing any logically-removed node whose
//! externally-maintained refcount has reached zero. Live iteration
//! (`List::foreach_live`) tolerates in-loop removal of the node currently
//! being visited.
//!
//! This crate does not provide automatic ABA-proof memory reclamation: it
//! is not epoch-based and does not use hazard pointers. Safety instead
//! relies on the refcount discipline described on [`Node`] plus the
//! `sweep` protocol — see the module-level docs on [`List`] for the full
//! contract.

mod error;
mod iter;
mod list;
mod node;
mod sync_atomic;

pub use crate::error::ListError;
pub use crate::iter::Iter;
pub use crate::list::List;
pub use crate::node::Node;
