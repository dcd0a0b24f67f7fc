//! Two-round threshold signing of taproot key-path spends
//!
//! Every signer runs the same three calls: [`attempt_sign`] draws per-input
//! nonces and broadcasts commitments to them, [`continue_sign`] combines
//! exactly `threshold` commitment sets into group nonces and produces
//! partial signatures, and [`complete_sign`] verifies and aggregates the
//! partial signatures into a fully signed transaction. Machines are
//! consumed by value, so nonces can never be reused across attempts.

mod dsg;
mod messages;

pub use dsg::{
    attempt_sign, complete_sign, continue_sign, TransactionSignMachine,
    TransactionSignatureMachine,
};
pub use messages::{Preprocess, SignatureShares};
