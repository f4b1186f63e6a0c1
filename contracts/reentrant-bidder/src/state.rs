use commons::ItemId;
use concordium_std::*;

/// The contract state. Flat, so the whole of it doubles as the `view`
/// return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, SchemaType)]
pub struct State {
    /// Deploying account; the only one allowed to reconfigure.
    pub owner: AccountAddress,
    /// Auction registry to bid against.
    pub target: ContractAddress,
    /// Item the payment hook outbids on. `None` disarms the hook.
    pub item: Option<ItemId>,
    /// How far above the observed highest bid the nested bid goes.
    pub top_up: Amount,
    /// One-shot latch: set by the first refund the hook acts on, never
    /// cleared. Keeps the reentry a single level deep.
    pub reentered: bool,
}
