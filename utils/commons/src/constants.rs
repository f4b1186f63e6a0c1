/// Tag for the Custom Listed event.
pub const LISTED_TAG: u8 = u8::MAX - 1;

/// Tag for the Custom Bid event.
pub const BID_TAG: u8 = u8::MAX - 2;

/// Tag for the Custom Ended event.
pub const ENDED_TAG: u8 = u8::MAX - 3;

/// Tag for the Custom Withdrawn event.
pub const WITHDRAWN_TAG: u8 = u8::MAX - 4;

/// Entrypoint invoked on a contract that is paid by the registry. A contract
/// that wants to hold bids must expose it; whatever it does runs while the
/// paying call is still on the stack.
pub const VALUE_RECEIVE_ENTRYPOINT: &str = "receive";
