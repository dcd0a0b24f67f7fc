//! Cryptographic helpers shared by the protocol engines
//!
//! This module wraps the external curve primitives (k256) with the small
//! amount of glue the protocols need: canonical point/scalar codecs, the
//! BIP340 tagged-hash challenge, transcript-seeded deterministic RNGs, a
//! Schnorr proof of knowledge for commitment constant terms, and the
//! X25519 + ChaCha20-Poly1305 envelope that protects secret shares in
//! transit.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use k256::{
    elliptic_curve::{
        bigint::U256,
        group::Group,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Field, PrimeField,
    },
    AffinePoint, ProjectivePoint, Scalar,
};
use merlin::Transcript;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519PublicKey, ReusableSecret};

use crate::types::Participant;

/// Serialize a point in compressed SEC1 form (33 bytes)
pub(crate) fn point_to_bytes(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Deserialize a compressed SEC1 point, rejecting malformed encodings and
/// the identity
pub(crate) fn point_from_bytes(bytes: &[u8]) -> Option<ProjectivePoint> {
    let encoded = k256::EncodedPoint::from_bytes(bytes).ok()?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))?;
    let point = ProjectivePoint::from(affine);
    if bool::from(point.is_identity()) {
        return None;
    }
    Some(point)
}

/// Serialize a scalar as 32 big-endian bytes
pub(crate) fn scalar_to_bytes(scalar: &Scalar) -> [u8; 32] {
    scalar.to_bytes().into()
}

/// Deserialize a scalar, rejecting non-canonical encodings
pub(crate) fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::<Scalar>::from(Scalar::from_repr((*bytes).into()))
}

/// Reduce 32 bytes into a scalar
pub(crate) fn reduce_scalar(bytes: [u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&bytes.into())
}

/// BIP340 tagged hash: SHA256(SHA256(tag) || SHA256(tag) || data)
pub(crate) fn tagged_hash(tag: &[u8], data: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag);
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    for part in data {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// BIP340 Schnorr challenge for an x-only public key
pub(crate) fn bip340_challenge(r_x: &[u8; 32], pk_x: &[u8; 32], message: &[u8; 32]) -> Scalar {
    reduce_scalar(tagged_hash(b"BIP0340/challenge", &[r_x, pk_x, message]))
}

/// Finalize a transcript into a seeded ChaCha20 RNG
pub(crate) fn transcript_rng(mut transcript: Transcript) -> ChaCha20Rng {
    let mut seed = [0u8; 32];
    transcript.challenge_bytes(b"rng-seed", &mut seed);
    ChaCha20Rng::from_seed(seed)
}

/// Finalize a transcript into a 32-byte challenge
pub(crate) fn transcript_challenge(mut transcript: Transcript) -> [u8; 32] {
    let mut challenge = [0u8; 32];
    transcript.challenge_bytes(b"challenge", &mut challenge);
    challenge
}

/// Schnorr proof of knowledge of a commitment's constant term, bound to a
/// ceremony context. Broadcast alongside Feldman commitments so a
/// participant cannot choose its contribution as a function of others'.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SchnorrProof {
    nonce: Vec<u8>,
    response: [u8; 32],
}

/// The statement a commitment proof of knowledge signs: the serialized
/// commitment list
pub(crate) fn pok_statement(commitments: &[Vec<u8>]) -> Vec<u8> {
    let mut statement = Vec::with_capacity(commitments.len() * 33);
    for commitment in commitments {
        statement.extend_from_slice(commitment);
    }
    statement
}

fn pok_challenge(context: &[u8; 32], nonce: &[u8], statement: &[u8]) -> Scalar {
    let mut transcript = Transcript::new(b"threshold-multisig proof-of-knowledge");
    transcript.append_message(b"context", context);
    transcript.append_message(b"nonce", nonce);
    transcript.append_message(b"statement", statement);
    reduce_scalar(transcript_challenge(transcript))
}

impl SchnorrProof {
    /// Prove knowledge of `secret` where `statement` commits to
    /// `secret * G` (typically the serialized Feldman commitment list)
    pub(crate) fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        context: &[u8; 32],
        statement: &[u8],
        secret: &Scalar,
    ) -> SchnorrProof {
        let k = Scalar::random(&mut *rng);
        let nonce = point_to_bytes(&(ProjectivePoint::GENERATOR * k));
        let challenge = pok_challenge(context, &nonce, statement);
        let response = scalar_to_bytes(&(k + challenge * secret));
        SchnorrProof { nonce, response }
    }

    /// Verify against the claimed public constant term
    pub(crate) fn verify(
        &self,
        context: &[u8; 32],
        statement: &[u8],
        public: &ProjectivePoint,
    ) -> bool {
        let Some(nonce) = point_from_bytes(&self.nonce) else {
            return false;
        };
        let Some(response) = scalar_from_bytes(&self.response) else {
            return false;
        };
        let challenge = pok_challenge(context, &self.nonce, statement);
        ProjectivePoint::GENERATOR * response == nonce + *public * challenge
    }
}

/// A secret share encrypted to its recipient's X25519 key
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EncryptedShare {
    pub(crate) nonce: [u8; 12],
    pub(crate) ciphertext: Vec<u8>,
}

fn share_key(
    shared_secret: &[u8; 32],
    context: &[u8; 32],
    from: Participant,
    to: Participant,
) -> Key {
    let mut transcript = Transcript::new(b"threshold-multisig share encryption");
    transcript.append_message(b"context", context);
    transcript.append_message(b"shared-secret", shared_secret);
    transcript.append_message(b"from", &from.get().to_le_bytes());
    transcript.append_message(b"to", &to.get().to_le_bytes());
    Key::from(transcript_challenge(transcript))
}

/// Encrypt a 32-byte share from `from` to `to` under the ceremony context
pub(crate) fn encrypt_share<R: RngCore + CryptoRng>(
    rng: &mut R,
    our_secret: &ReusableSecret,
    their_key: &X25519PublicKey,
    context: &[u8; 32],
    from: Participant,
    to: Participant,
    share: &[u8; 32],
) -> EncryptedShare {
    let shared = our_secret.diffie_hellman(their_key);
    let cipher = ChaCha20Poly1305::new(&share_key(shared.as_bytes(), context, from, to));
    let mut nonce = [0u8; 12];
    rng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), share.as_slice())
        .expect("ChaCha20-Poly1305 encryption of a 32-byte buffer cannot fail");
    EncryptedShare { nonce, ciphertext }
}

/// Decrypt a share sent from `from` to `to`. `None` on any tampering.
pub(crate) fn decrypt_share(
    our_secret: &ReusableSecret,
    their_key: &X25519PublicKey,
    context: &[u8; 32],
    from: Participant,
    to: Participant,
    share: &EncryptedShare,
) -> Option<[u8; 32]> {
    let shared = our_secret.diffie_hellman(their_key);
    let cipher = ChaCha20Poly1305::new(&share_key(shared.as_bytes(), context, from, to));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&share.nonce), share.ciphertext.as_slice())
        .ok()?;
    plaintext.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn point_codec_rejects_identity_and_garbage() {
        let point = ProjectivePoint::GENERATOR * Scalar::from(5u64);
        let bytes = point_to_bytes(&point);
        assert_eq!(point_from_bytes(&bytes).unwrap(), point);
        assert!(point_from_bytes(&[0u8; 33]).is_none());
        assert!(point_from_bytes(&point_to_bytes(&ProjectivePoint::IDENTITY)).is_none());
    }

    #[test]
    fn scalar_codec_rejects_non_canonical() {
        let scalar = Scalar::from(123456u64);
        assert_eq!(scalar_from_bytes(&scalar_to_bytes(&scalar)).unwrap(), scalar);
        // The group order itself is not a canonical scalar encoding
        assert!(scalar_from_bytes(&[0xff; 32]).is_none());
    }

    #[test]
    fn proof_of_knowledge_round_trip() {
        let secret = Scalar::random(&mut OsRng);
        let public = ProjectivePoint::GENERATOR * secret;
        let context = [7u8; 32];
        let proof = SchnorrProof::prove(&mut OsRng, &context, b"statement", &secret);
        assert!(proof.verify(&context, b"statement", &public));
        assert!(!proof.verify(&context, b"other statement", &public));
        assert!(!proof.verify(&[8u8; 32], b"statement", &public));
    }

    #[test]
    fn share_encryption_round_trip_and_tamper() {
        let a = ReusableSecret::random_from_rng(OsRng);
        let b = ReusableSecret::random_from_rng(OsRng);
        let a_pub = X25519PublicKey::from(&a);
        let b_pub = X25519PublicKey::from(&b);
        let context = [1u8; 32];
        let from = Participant::new(1).unwrap();
        let to = Participant::new(2).unwrap();

        let share = [42u8; 32];
        let mut encrypted = encrypt_share(&mut OsRng, &a, &b_pub, &context, from, to, &share);
        assert_eq!(decrypt_share(&b, &a_pub, &context, from, to, &encrypted).unwrap(), share);

        encrypted.ciphertext[0] ^= 1;
        assert!(decrypt_share(&b, &a_pub, &context, from, to, &encrypted).is_none());
    }
}
