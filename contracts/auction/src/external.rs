use commons::ItemId;
use concordium_std::*;

/// When the refund of a displaced bid is issued relative to recording the
/// new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SchemaType)]
pub enum BidOrdering {
    /// Pay the displaced bidder first, record the new bid after the transfer
    /// returns. The recipient runs with the registry mid-update.
    RefundThenCommit,
    /// Record the new bid before any value leaves the registry
    /// (checks-effects-interactions).
    CommitThenRefund,
}

#[derive(Debug, Clone, Serialize, SchemaType)]
pub struct InitParams {
    pub ordering: BidOrdering,
    /// Reject nested entry into `placeBid` while one is already executing.
    pub reentrancy_guard: bool,
}

/// Batch item registration. The sequences are paired up by position and must
/// have equal length.
#[derive(Debug, Clone, Serialize, SchemaType)]
pub struct InitializeAuctionParams {
    pub ids: Vec<ItemId>,
    pub starting_bids: Vec<Amount>,
}

/// Registry-wide configuration, as returned by the `view` entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, SchemaType)]
pub struct ViewState {
    pub owner: AccountAddress,
    pub ordering: BidOrdering,
    pub reentrancy_guard: bool,
}
