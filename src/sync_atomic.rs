//! Indirection so the CAS retry loops in [`crate::list`] can be model
//! checked by `loom`: under `--cfg loom` this re-exports loom's atomics,
//! which loom can explore every interleaving of; otherwise it's a plain
//! re-export of `std::sync::atomic`, with no runtime cost.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
