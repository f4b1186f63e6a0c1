//! A bidder contract that exploits a registry paying refunds before it
//! commits the displacing bid.
//!
//! The contract proxies ordinary bids to a configured auction registry. When
//! the registry later pushes a refund to it, the payment hook re-enters
//! `placeBid` once, outbidding whatever record the registry holds at that
//! moment. Against a refund-first registry that record is stale, and the
//! nested bid is validated against state the outer call is about to
//! overwrite.
#![cfg_attr(not(feature = "std"), no_std)]

mod contract;
mod external;
mod state;
