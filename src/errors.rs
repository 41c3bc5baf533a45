use thiserror::Error;

/// Errors surfaced by the ambient layers around the engine — the core
/// itself never returns a `Result` (unknown symbol/id are return-value
/// encoded as an empty `Vec`/`false`; an over-fill is a programmer error
/// and panics, per the crate's error handling docs).
#[derive(Error, Debug)]
pub enum DemoError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
}
