//! Wire messages exchanged during transaction signing

use serde::{Deserialize, Serialize};

use crate::{codec, types::Participant};

/// Round-1 broadcast: one pair of nonce commitments per transaction input
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Preprocess {
    pub(crate) sender: Participant,
    /// (D, E) compressed points, indexed by input
    pub(crate) commitments: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Preprocess {
    pub(crate) fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<Preprocess> {
        codec::decode(bytes)
    }
}

/// Round-2 broadcast: one partial signature scalar per transaction input
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SignatureShares {
    pub(crate) sender: Participant,
    pub(crate) shares: Vec<[u8; 32]>,
}

impl SignatureShares {
    pub(crate) fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<SignatureShares> {
        codec::decode(bytes)
    }
}
