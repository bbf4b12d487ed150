/// Errors raised by node hardware and its backing storage.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A persisted configuration field could not be read.
    #[error("failed to read {field} from config store: {reason}")]
    StoreRead { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, TransportError>;
