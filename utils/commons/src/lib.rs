//! It exposes the error taxonomy, common types and event tags shared by the
//! auction contracts, along with mock helpers for contract tests.
#![cfg_attr(not(feature = "std"), no_std)]
pub use crate::{constants::*, errors::*, types::*};

use concordium_std::*;

#[cfg(all(feature = "std", not(target_arch = "wasm32")))]
pub mod test;

mod constants;
mod errors;
mod types;
