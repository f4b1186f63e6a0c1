use commons::{ItemId, BID_TAG, ENDED_TAG, LISTED_TAG, WITHDRAWN_TAG};
use concordium_std::*;

/// Item registration event data.
#[derive(Debug, Serial)]
pub struct ListedEvent {
    /// Item identifier.
    pub item: ItemId,
    /// Minimum acceptable value for the first bid.
    pub starting_bid: Amount,
}

/// Accepted bid event data.
#[derive(Debug, Serial)]
pub struct BidEvent {
    /// Item identifier.
    pub item: ItemId,
    /// New highest bidder.
    pub bidder: Address,
    /// Accepted bid value.
    pub amount: Amount,
}

/// Item closure event data.
#[derive(Debug, Serial)]
pub struct EndedEvent {
    /// Item identifier.
    pub item: ItemId,
}

/// Balance sweep event data.
#[derive(Debug, Serial)]
pub struct WithdrawnEvent {
    /// Receiving administrator account.
    pub to: AccountAddress,
    /// Swept amount.
    pub amount: Amount,
}

/// Tagged custom event to be serialized for the event log.
#[derive(Debug)]
pub enum AuctionEvent {
    Listed(ListedEvent),
    Bid(BidEvent),
    Ended(EndedEvent),
    Withdrawn(WithdrawnEvent),
}

impl AuctionEvent {
    pub fn listed(item: ItemId, starting_bid: Amount) -> Self {
        Self::Listed(ListedEvent { item, starting_bid })
    }

    pub fn bid(item: ItemId, bidder: Address, amount: Amount) -> Self {
        Self::Bid(BidEvent {
            item,
            bidder,
            amount,
        })
    }

    pub fn ended(item: ItemId) -> Self {
        Self::Ended(EndedEvent { item })
    }

    pub fn withdrawn(to: AccountAddress, amount: Amount) -> Self {
        Self::Withdrawn(WithdrawnEvent { to, amount })
    }
}

impl Serial for AuctionEvent {
    fn serial<W: Write>(&self, out: &mut W) -> Result<(), W::Err> {
        match self {
            AuctionEvent::Listed(event) => {
                out.write_u8(LISTED_TAG)?;
                event.serial(out)
            }
            AuctionEvent::Bid(event) => {
                out.write_u8(BID_TAG)?;
                event.serial(out)
            }
            AuctionEvent::Ended(event) => {
                out.write_u8(ENDED_TAG)?;
                event.serial(out)
            }
            AuctionEvent::Withdrawn(event) => {
                out.write_u8(WITHDRAWN_TAG)?;
                event.serial(out)
            }
        }
    }
}
