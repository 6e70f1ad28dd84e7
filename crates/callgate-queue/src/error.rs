use crate::entry::EntryId;

/// Errors returned by the request queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// An entry with this id is already pending, in flight, or in history.
    #[error("entry `{0}` is already queued or recorded")]
    DuplicateId(EntryId),
    /// The entry was not popped from this queue, or was already settled.
    #[error("entry `{0}` is not in flight")]
    NotInFlight(EntryId),
}
