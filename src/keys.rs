//! Threshold key material produced by key generation and resharing
//!
//! A [`ThresholdKeys`] is exclusively held by its local participant and is
//! never transmitted. It serializes to a versioned binary blob that
//! round-trips bit-for-bit; a blob from a different format version is
//! rejected rather than misparsed.

use bitcoin::{
    hashes::Hash,
    key::{TweakedPublicKey, XOnlyPublicKey},
    taproot::TapTweakHash,
    Address, ScriptBuf,
};
use k256::{elliptic_curve::point::AffineCoordinates, ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    crypto::{point_from_bytes, point_to_bytes, reduce_scalar, scalar_from_bytes, scalar_to_bytes},
    error::KeyGenError,
    types::{Network, Participant},
};

/// The local participant's share of a threshold key, plus the public
/// material needed to verify other participants' contributions
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ThresholdKeys {
    threshold: u16,
    participants: u16,
    index: Participant,
    secret_share: Scalar,
    group_key: ProjectivePoint,
    verification_shares: Vec<ProjectivePoint>,
}

#[derive(Serialize, Deserialize)]
struct KeysRepr {
    threshold: u16,
    participants: u16,
    index: Participant,
    secret_share: [u8; 32],
    group_key: Vec<u8>,
    verification_shares: Vec<Vec<u8>>,
}

/// The taproot key-path spending data derived from a group key
pub(crate) struct TaprootKey {
    /// Whether the group key's y coordinate is odd, requiring secret-share
    /// negation during signing
    pub negate_group: bool,
    /// The BIP341 tweak scalar for the x-only internal key
    pub tweak: Scalar,
    /// The tweaked output key Q
    pub output: ProjectivePoint,
    /// Whether Q's y coordinate is odd
    pub negate_output: bool,
    /// Q's x coordinate, the on-chain x-only key
    pub output_x: [u8; 32],
}

impl ThresholdKeys {
    pub(crate) fn new(
        threshold: u16,
        participants: u16,
        index: Participant,
        secret_share: Scalar,
        group_key: ProjectivePoint,
        verification_shares: Vec<ProjectivePoint>,
    ) -> ThresholdKeys {
        ThresholdKeys { threshold, participants, index, secret_share, group_key, verification_shares }
    }

    /// The signing threshold
    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// The total number of participants
    pub fn participants(&self) -> u16 {
        self.participants
    }

    /// The local participant's 1-based index
    pub fn index(&self) -> Participant {
        self.index
    }

    /// The group public key, compressed SEC1
    pub fn group_key(&self) -> Vec<u8> {
        point_to_bytes(&self.group_key)
    }

    pub(crate) fn group_key_point(&self) -> ProjectivePoint {
        self.group_key
    }

    pub(crate) fn secret_share(&self) -> Scalar {
        self.secret_share
    }

    pub(crate) fn verification_share(&self, participant: Participant) -> Option<ProjectivePoint> {
        self.verification_shares.get(participant.pos()).copied()
    }

    /// Derive the taproot output key for key-path spends of the group key
    pub(crate) fn taproot_key(&self) -> TaprootKey {
        let affine = self.group_key.to_affine();
        let negate_group = bool::from(affine.y_is_odd());
        let even = if negate_group { -self.group_key } else { self.group_key };
        let internal_x: [u8; 32] = even.to_affine().x().into();
        let internal = XOnlyPublicKey::from_slice(&internal_x).expect("valid x-only key");

        let tweak = reduce_scalar(TapTweakHash::from_key_and_tweak(internal, None).to_byte_array());
        let output = even + ProjectivePoint::GENERATOR * tweak;
        let output_affine = output.to_affine();
        let negate_output = bool::from(output_affine.y_is_odd());
        let output_x: [u8; 32] = output_affine.x().into();

        TaprootKey { negate_group, tweak, output, negate_output, output_x }
    }

    /// The P2TR script_pubkey spendable by this group. A pure function of
    /// the group key.
    pub fn script_pubkey(&self) -> ScriptBuf {
        let output = XOnlyPublicKey::from_slice(&self.taproot_key().output_x).expect("valid x-only key");
        ScriptBuf::new_p2tr_tweaked(TweakedPublicKey::dangerous_assume_tweaked(output))
    }

    /// The group's receiving address on `network`. A pure function of the
    /// group key and the network.
    pub fn address(&self, network: Network) -> Address {
        let output = XOnlyPublicKey::from_slice(&self.taproot_key().output_x).expect("valid x-only key");
        Address::p2tr_tweaked(
            TweakedPublicKey::dangerous_assume_tweaked(output),
            bitcoin::Network::from(network),
        )
    }

    /// Serialize to a versioned binary blob
    pub fn serialize(&self) -> Vec<u8> {
        codec::encode(&KeysRepr {
            threshold: self.threshold,
            participants: self.participants,
            index: self.index,
            secret_share: scalar_to_bytes(&self.secret_share),
            group_key: point_to_bytes(&self.group_key),
            verification_shares: self.verification_shares.iter().map(point_to_bytes).collect(),
        })
    }

    /// Deserialize, validating parameter shape and key-material consistency
    pub fn deserialize(bytes: &[u8]) -> Result<ThresholdKeys, KeyGenError> {
        let repr: KeysRepr = codec::decode(bytes).ok_or(KeyGenError::InvalidEncoding)?;

        if repr.threshold == 0
            || repr.participants == 0
            || repr.threshold > repr.participants
            || repr.index.get() > repr.participants
            || repr.verification_shares.len() != usize::from(repr.participants)
        {
            Err(KeyGenError::InvalidEncoding)?;
        }

        let secret_share =
            scalar_from_bytes(&repr.secret_share).ok_or(KeyGenError::InvalidEncoding)?;
        let group_key = point_from_bytes(&repr.group_key).ok_or(KeyGenError::InvalidEncoding)?;
        let verification_shares = repr
            .verification_shares
            .iter()
            .map(|bytes| point_from_bytes(bytes).ok_or(KeyGenError::InvalidEncoding))
            .collect::<Result<Vec<_>, _>>()?;

        // The local verification share must commit to the carried secret
        if verification_shares[repr.index.pos()] != ProjectivePoint::GENERATOR * secret_share {
            Err(KeyGenError::InvalidEncoding)?;
        }

        Ok(ThresholdKeys {
            threshold: repr.threshold,
            participants: repr.participants,
            index: repr.index,
            secret_share,
            group_key,
            verification_shares,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::Field;
    use rand::rngs::OsRng;

    fn dummy_keys() -> ThresholdKeys {
        let secret = Scalar::random(&mut OsRng);
        let other = Scalar::random(&mut OsRng);
        ThresholdKeys::new(
            2,
            2,
            Participant::new(1).unwrap(),
            secret,
            ProjectivePoint::GENERATOR * (secret + other),
            vec![ProjectivePoint::GENERATOR * secret, ProjectivePoint::GENERATOR * other],
        )
    }

    #[test]
    fn serialization_round_trips_exactly() {
        let keys = dummy_keys();
        let blob = keys.serialize();
        let restored = ThresholdKeys::deserialize(&blob).unwrap();
        assert_eq!(restored, keys);
        assert_eq!(restored.serialize(), blob);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut blob = dummy_keys().serialize();
        blob[0] ^= 0xff;
        assert_eq!(ThresholdKeys::deserialize(&blob).unwrap_err(), KeyGenError::InvalidEncoding);
    }

    #[test]
    fn tampered_secret_is_rejected() {
        let keys = dummy_keys();
        let mut repr: KeysRepr = crate::codec::decode(&keys.serialize()).unwrap();
        repr.secret_share[0] ^= 1;
        let blob = crate::codec::encode(&repr);
        assert_eq!(ThresholdKeys::deserialize(&blob).unwrap_err(), KeyGenError::InvalidEncoding);
    }

    #[test]
    fn address_and_script_are_deterministic_per_network() {
        let keys = dummy_keys();
        assert_eq!(keys.address(Network::Mainnet), keys.address(Network::Mainnet));
        assert_ne!(
            keys.address(Network::Mainnet).to_string(),
            keys.address(Network::Regtest).to_string()
        );
        assert_eq!(keys.script_pubkey(), keys.script_pubkey());
        // The script commits to the taproot output key, not the raw group key
        assert_eq!(keys.script_pubkey().as_bytes()[2..], keys.taproot_key().output_x);
    }

    #[test]
    fn taproot_output_key_is_even() {
        let taproot = dummy_keys().taproot_key();
        let lifted = if taproot.negate_output { -taproot.output } else { taproot.output };
        assert!(!bool::from(lifted.to_affine().y_is_odd()));
        let x: [u8; 32] = lifted.to_affine().x().into();
        assert_eq!(x, taproot.output_x);
    }
}
