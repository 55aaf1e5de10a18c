/// Faults in request validation or execution plumbing. Always caught
/// at the execution boundary and converted into a synthetic failing
/// result; callers never see these as errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("sequence name is empty")]
    EmptyName,

    #[error("sequence '{id}' has no messages")]
    EmptySequence { id: String },

    #[error("unknown target ECU: {id}")]
    UnknownEcu { id: String },
}
