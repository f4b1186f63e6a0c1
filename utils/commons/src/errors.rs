use super::*;

/// The custom errors the auction contracts can produce.
#[derive(Serialize, Debug, PartialEq, Eq, Reject, SchemaType)]
pub enum CustomContractError {
    /// Failed parsing the parameter (Error code: -1).
    #[from(ParseError)]
    ParseParams,
    /// Failed logging: Log is full (Error code: -2).
    LogFull,
    /// Failed logging: Log is malformed (Error code: -3).
    LogMalformed,
    /// Administrator-only operation called by another identity
    /// (Error code: -4).
    NotOwner,
    /// Batch parameter sequences differ in length (Error code: -5).
    InvalidInput,
    /// Attempt to initialize an item identifier a second time
    /// (Error code: -6).
    DuplicateItem,
    /// Item identifier was never initialized (Error code: -7).
    ItemNotFound,
    /// Bid placed on an item that has been closed (Error code: -8).
    AuctionEnded,
    /// Winner queried before the item was closed (Error code: -9).
    AuctionNotEnded,
    /// The administrator may not bid on its own auction (Error code: -10).
    CallerIsOwner,
    /// Bid does not exceed the required threshold (Error code: -11).
    BidTooLow,
    /// Outbound value transfer was rejected by the recipient
    /// (Error code: -12).
    TransferFailed,
    /// Nested entry into a guarded entrypoint (Error code: -13).
    ReentrantCall,
    /// Bidder contract was used before an item was recorded
    /// (Error code: -14).
    NotConfigured,
    /// Failed to invoke a contract (Error code: -15).
    InvokeContractError,
}

/// Shorthand for the result type returned by contract entrypoints.
pub type ContractResult<A> = Result<A, CustomContractError>;

/// Mapping the logging errors to CustomContractError.
impl From<LogError> for CustomContractError {
    fn from(le: LogError) -> Self {
        match le {
            LogError::Full => Self::LogFull,
            LogError::Malformed => Self::LogMalformed,
        }
    }
}

/// Mapping errors related to contract invocations to CustomContractError.
impl<T> From<CallContractError<T>> for CustomContractError {
    fn from(_cce: CallContractError<T>) -> Self {
        Self::InvokeContractError
    }
}

/// Mapping errors related to value transfers to CustomContractError.
impl From<TransferError> for CustomContractError {
    fn from(_te: TransferError) -> Self {
        Self::TransferFailed
    }
}
