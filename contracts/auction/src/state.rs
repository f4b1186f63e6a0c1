use commons::{ContractResult, CustomContractError, ItemId, ItemView};
use concordium_std::*;

use crate::external::BidOrdering;

/// One auctionable lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Minimum acceptable value for the first bid.
    pub starting_bid: Amount,
    /// Highest accepted bid so far. Zero until the first bid lands.
    pub highest_bid: Amount,
    /// Party holding `highest_bid`. Contracts may bid, so this is a full
    /// address rather than an account.
    pub highest_bidder: Option<Address>,
    /// Set once by `endAuction`; no bids are accepted afterwards.
    pub ended: bool,
}

impl Item {
    fn new(starting_bid: Amount) -> Self {
        Self {
            starting_bid,
            highest_bid: Amount::zero(),
            highest_bidder: None,
            ended: false,
        }
    }
}

/// A displaced bid that must be pushed back to its previous owner.
#[must_use]
#[derive(Debug, Clone, Copy)]
pub struct Refund {
    pub to: Address,
    pub amount: Amount,
}

/// The contract state.
#[derive(Serial, DeserialWithState, StateClone)]
#[concordium(state_parameter = "S")]
pub struct State<S: HasStateApi> {
    /// Administrator identity, fixed at init.
    pub owner: AccountAddress,
    /// Refund scheduling relative to the state commit.
    pub ordering: BidOrdering,
    /// Whether `placeBid` rejects nested entry.
    pub reentrancy_guard: bool,
    /// True while a `placeBid` has handed control to an external recipient
    /// but has not finished its own commit. Visible to re-entrant callers.
    pub entered: bool,
    /// Item data, append-only by identifier.
    pub items: StateMap<ItemId, Item, S>,
}

impl<S: HasStateApi> State<S> {
    /// Create a new registry with no items.
    pub fn new(
        state_builder: &mut StateBuilder<S>,
        owner: AccountAddress,
        ordering: BidOrdering,
        reentrancy_guard: bool,
    ) -> Self {
        State {
            owner,
            ordering,
            reentrancy_guard,
            entered: false,
            items: state_builder.new_map(),
        }
    }

    /// Register a batch of items. Registration is one-time: an identifier
    /// that already exists cannot be registered again.
    pub fn register_items(
        &mut self,
        ids: &[ItemId],
        starting_bids: &[Amount],
    ) -> ContractResult<()> {
        ensure!(
            ids.len() == starting_bids.len(),
            CustomContractError::InvalidInput
        );

        for (&id, &starting_bid) in ids.iter().zip(starting_bids.iter()) {
            match self.items.entry(id) {
                Entry::Vacant(hole) => {
                    hole.insert(Item::new(starting_bid));
                }
                Entry::Occupied(_) => bail!(CustomContractError::DuplicateItem),
            }
        }

        Ok(())
    }

    /// Validate a bid without touching item state. Returns the bid the
    /// caller displaces, which must be pushed back to its previous owner.
    pub fn check_bid(
        &self,
        id: ItemId,
        bidder: &Address,
        amount: Amount,
    ) -> ContractResult<Option<Refund>> {
        let item = self
            .items
            .get(&id)
            .ok_or(CustomContractError::ItemNotFound)?;

        ensure!(!item.ended, CustomContractError::AuctionEnded);

        // The administrator may not raise bids on its own auction
        ensure!(
            !bidder.matches_account(&self.owner),
            CustomContractError::CallerIsOwner
        );

        match item.highest_bidder {
            Some(previous) => {
                ensure!(amount > item.highest_bid, CustomContractError::BidTooLow);
                Ok(Some(Refund {
                    to: previous,
                    amount: item.highest_bid,
                }))
            }
            None => {
                ensure!(amount > item.starting_bid, CustomContractError::BidTooLow);
                Ok(None)
            }
        }
    }

    /// Record `bidder` as the item's highest bidder. Deliberately performs
    /// no validation: `placeBid` schedules this around the refund transfer
    /// according to the configured ordering, and whatever passed `check_bid`
    /// before the transfer is written as is after it.
    pub fn commit_bid(
        &mut self,
        id: ItemId,
        bidder: Address,
        amount: Amount,
    ) -> ContractResult<()> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or(CustomContractError::ItemNotFound)?;

        item.highest_bid = amount;
        item.highest_bidder = Some(bidder);

        Ok(())
    }

    /// Close an item. Closing an already closed item is accepted and has no
    /// further effect.
    pub fn end(&mut self, id: ItemId) -> ContractResult<()> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or(CustomContractError::ItemNotFound)?;

        item.ended = true;

        Ok(())
    }

    /// Winning bidder of a closed item. `None` if the item never saw a bid.
    pub fn winning_bidder(&self, id: ItemId) -> ContractResult<Option<Address>> {
        let item = self
            .items
            .get(&id)
            .ok_or(CustomContractError::ItemNotFound)?;

        ensure!(item.ended, CustomContractError::AuctionNotEnded);

        Ok(item.highest_bidder)
    }

    /// Public record of an item, available at any point of its lifecycle.
    pub fn view_item(&self, id: ItemId) -> ContractResult<ItemView> {
        let item = self
            .items
            .get(&id)
            .ok_or(CustomContractError::ItemNotFound)?;

        Ok(ItemView {
            starting_bid: item.starting_bid,
            highest_bid: item.highest_bid,
            highest_bidder: item.highest_bidder,
            ended: item.ended,
        })
    }
}
