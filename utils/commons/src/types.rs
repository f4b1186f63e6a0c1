use super::*;

/// Identifier of one auctionable lot, unique within a registry.
pub type ItemId = u64;

/// Parameter of the registry's `placeBid` entrypoint. The bid itself is the
/// amount attached to the call.
#[derive(Debug, Clone, Serialize, SchemaType)]
pub struct BidParams {
    pub item: ItemId,
}

/// Public record of a single item, as returned by the registry's `viewItem`
/// entrypoint. Available at any point of the item lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, SchemaType)]
pub struct ItemView {
    /// Minimum acceptable value for the first bid.
    pub starting_bid: Amount,
    /// Highest accepted bid so far. Zero until the first bid lands.
    pub highest_bid: Amount,
    /// Party holding `highest_bid`. `None` until the first bid lands.
    pub highest_bidder: Option<Address>,
    /// Whether the administrator has closed the item.
    pub ended: bool,
}
