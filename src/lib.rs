//! # Threshold Multisig
//!
//! A threshold-signature engine for Bitcoin taproot: `t`-of-`n` participants
//! jointly generate a shared key, jointly sign transactions, and later
//! reshare the secret material to a new participant set without ever
//! reconstructing the private key or changing the group public key.
//!
//! This crate provides the protocol core:
//! - Distributed Key Generation (DKG), a three-round ceremony
//! - Distributed transaction signing, a two-round FROST-style ceremony
//! - Resharing to a new threshold/participant set
//!
//! ## Protocol Overview
//!
//! Every engine is a strictly sequential, round-based state machine. Each
//! round function consumes the previous round's machine by value together
//! with the messages received from the other participants, and returns a new
//! machine plus an outbound message. Consuming machines by value makes
//! reusing a spent round (and thereby reusing round-local secrets such as
//! signing nonces) a compile-time impossibility.
//!
//! Transport is the caller's responsibility: no function blocks waiting for
//! other participants. A round function only checks that the supplied
//! message set has the required shape, so callers must uphold the barrier
//! discipline of not invoking round `k + 1` until every required round-`k`
//! message has arrived.
//!
//! ## Example
//!
//! ```rust,ignore
//! use threshold_multisig::{config, keygen, sign};
//!
//! let cfg = config::new_multisig_config("treasury", 2, &names)?;
//! let start = keygen::start_key_gen(cfg, "alice", keygen::Language::English)?;
//! // ... exchange commitments, shares; obtain ThresholdKeys ...
//! let (machine, preprocess) = sign::attempt_sign(&keys, &sign_config)?;
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keygen;
pub mod keys;
pub mod poly;
pub mod reshare;
pub mod sign;
pub mod transaction;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{decode_multisig_config, new_multisig_config, MultisigConfig, MultisigConfigWithName};
pub use error::{KeyGenError, ReshareError, SignError};
pub use keys::ThresholdKeys;
pub use transaction::{decode_sign_config, new_sign_config, PortableOutput, SignConfig};
pub use types::{Network, Participant};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
