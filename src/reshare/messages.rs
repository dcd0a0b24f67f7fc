//! Wire messages exchanged during resharing

use serde::{Deserialize, Serialize};

use crate::{
    codec,
    crypto::{EncryptedShare, SchnorrProof},
    types::Participant,
};

/// A resharer's opening broadcast: the claimed group key, Feldman
/// commitments to its re-sharing polynomial (the constant term commits to
/// its Lagrange-weighted share), a proof of knowledge, and an encryption
/// key
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ResharerStart {
    pub(crate) resharer: Participant,
    pub(crate) group_key: Vec<u8>,
    pub(crate) commitments: Vec<Vec<u8>>,
    pub(crate) proof: SchnorrProof,
    pub(crate) enc_key: [u8; 32],
}

impl ResharerStart {
    pub(crate) fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<ResharerStart> {
        codec::decode(bytes)
    }
}

/// A new participant's acknowledgement, carrying the key its sub-shares
/// should be encrypted to. `participant` is a new-group index.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ResharedAck {
    pub(crate) participant: Participant,
    pub(crate) enc_key: [u8; 32],
}

impl ResharedAck {
    pub(crate) fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<ResharedAck> {
        codec::decode(bytes)
    }
}

/// A resharer's completion broadcast: one encrypted sub-share per new
/// participant
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ResharerComplete {
    pub(crate) resharer: Participant,
    pub(crate) shares: Vec<(Participant, EncryptedShare)>,
}

impl ResharerComplete {
    pub(crate) fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Option<ResharerComplete> {
        codec::decode(bytes)
    }

    pub(crate) fn share_for(&self, recipient: Participant) -> Option<&EncryptedShare> {
        self.shares
            .iter()
            .find(|(to, _)| *to == recipient)
            .map(|(_, share)| share)
    }
}
