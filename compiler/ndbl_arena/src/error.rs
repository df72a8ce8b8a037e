use thiserror::Error;

/// Lookup failures reported by [`Arena::try_get`](crate::Arena::try_get).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The handle is null, was destroyed, or was issued by another arena.
    #[error("handle {id} does not resolve to a live object")]
    NotFound { id: u32 },
    /// The handle's record points into a store of another type.
    #[error("handle {id} was requested as `{requested}` but is stored as `{stored}`")]
    WrongType {
        id: u32,
        requested: &'static str,
        stored: &'static str,
    },
}
