//! Wire messages exchanged during key generation
//!
//! Round-1 commitments are broadcast; round-2 shares are addressed to one
//! recipient each and encrypted to that recipient's key.

use serde::{Deserialize, Serialize};

use crate::{
    codec,
    crypto::{EncryptedShare, SchnorrProof},
    types::Participant,
};

/// Round-1 broadcast: Feldman commitments to every polynomial coefficient,
/// a proof of knowledge of the constant term, and a fresh X25519 key the
/// sender will receive encrypted shares under
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct KeyGenCommitments {
    pub(crate) sender: Participant,
    pub(crate) commitments: Vec<Vec<u8>>,
    pub(crate) proof: SchnorrProof,
    pub(crate) enc_key: [u8; 32],
}

impl KeyGenCommitments {
    pub(crate) fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<KeyGenCommitments> {
        codec::decode(bytes)
    }
}

/// Round-2 message: one participant's encrypted Shamir share for one
/// recipient
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SecretShare {
    pub(crate) sender: Participant,
    pub(crate) recipient: Participant,
    pub(crate) share: EncryptedShare,
}

impl SecretShare {
    pub(crate) fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<SecretShare> {
        codec::decode(bytes)
    }
}
