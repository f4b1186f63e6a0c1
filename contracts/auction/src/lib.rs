//! A multi-item auction registry holding every bid it has accepted.
//!
//! The registry pushes displaced bids back to their previous owners. The
//! ordering of that push relative to recording the new bid is configured at
//! init: the refund-first ordering reproduces the classic reentrancy gap,
//! the commit-first ordering closes it. An optional entry guard rejects
//! nested bids outright.
#![cfg_attr(not(feature = "std"), no_std)]

mod contract;
mod events;
mod external;
mod state;
