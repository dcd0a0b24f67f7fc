//! Resharing an existing group key to a new participant set
//!
//! A designated subset of current key-holders (the resharers) re-split
//! their Lagrange-weighted shares with fresh polynomials sized for the new
//! threshold. New participants sum the sub-shares they receive, ending up
//! with shares of the *same* group secret under the new parameters. The
//! group public key, and therefore every address derived from it, is
//! unchanged.

mod config;
mod messages;
mod reshared;
mod resharer;

pub use config::{decode_resharer_config, new_resharer_config, ResharerConfig};
pub use messages::{ResharedAck, ResharerComplete, ResharerStart};
pub use reshared::{complete_reshared, start_reshared, ResharedMachine};
pub use resharer::{complete_resharer, start_resharer, ResharerMachine};
