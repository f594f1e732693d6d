use thiserror::Error;

/// Errors surfaced across the public API.
///
/// `Empty` and `NotFound` are deliberately *not* variants here: per the
/// design, a pop on an empty list or a failed `find` is encoded as
/// `Option::None`, not as an error. `Contended` is never surfaced either —
/// a failing CAS is retried internally or tolerated as best-effort.
#[derive(Debug, Error)]
pub enum ListError {
    /// The allocating `insert_head`/`insert_tail` could not obtain memory
    /// for the new node. The list is left unchanged.
    #[error("failed to allocate a new list node")]
    ResourceExhausted,
}
