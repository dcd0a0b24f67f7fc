//! The round functions and state machines of distributed key generation

use bip39::Mnemonic;
use k256::{ProjectivePoint, Scalar};
use merlin::Transcript;
use rand::rngs::OsRng;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use x25519_dalek::{PublicKey as X25519PublicKey, ReusableSecret};
use zeroize::Zeroizing;

use super::{
    messages::{KeyGenCommitments, SecretShare},
    Language,
};
use crate::{
    codec,
    config::{MultisigConfig, MultisigConfigWithName},
    crypto::{
        decrypt_share, encrypt_share, point_from_bytes, point_to_bytes, pok_statement,
        scalar_from_bytes, scalar_to_bytes, transcript_challenge, transcript_rng, SchnorrProof,
    },
    error::KeyGenError,
    keys::ThresholdKeys,
    poly::{evaluate, evaluate_commitments, generate_polynomial, sum_commitments, verify_share},
    types::Participant,
};

const SEED_ENTROPY_LEN: usize = 16;

/// The coefficient RNG is a pure function of the recovery seed's entropy and
/// the ceremony context, so a participant who kept the mnemonic can replay
/// its polynomial
fn coefficient_rng(entropy: &[u8], context: &[u8; 32]) -> rand_chacha::ChaCha20Rng {
    let mut transcript = Transcript::new(b"threshold-multisig keygen rng");
    transcript.append_message(b"entropy", entropy);
    transcript.append_message(b"context", context);
    transcript_rng(transcript)
}

/// State after round 1, consumed by [`get_secret_shares`]
pub struct SecretShareMachine {
    config: MultisigConfigWithName,
    index: Participant,
    context: [u8; 32],
    commitments: Vec<ProjectivePoint>,
    encoded_commitments: Vec<u8>,
    enc_secret: ReusableSecret,
}

/// State after round 2, consumed by [`complete_key_gen`]
pub struct KeyMachine {
    config: MultisigConfigWithName,
    index: Participant,
    context: [u8; 32],
    enc_secret: ReusableSecret,
    /// Our own polynomial evaluated at our own index
    secret_eval: Scalar,
    /// Per-sender commitment vectors, ordered by sender index, self included
    commitments: Vec<Vec<ProjectivePoint>>,
    /// Other participants' encryption keys
    enc_keys: Vec<(Participant, X25519PublicKey)>,
    /// Round-1 broadcast bytes ordered by sender index, self included
    commitment_blobs: Vec<Vec<u8>>,
}

/// Everything round 1 hands back to the caller
pub struct StartKeyGenResult {
    /// The recovery mnemonic. Show it to the user once; round 2 requires it
    /// typed back in.
    pub seed: String,
    pub machine: SecretShareMachine,
    /// The round-1 broadcast bytes
    pub commitments: Vec<u8>,
}

/// Everything round 3 hands back to the caller
pub struct KeyGenResult {
    /// Ceremony identifier, identical at every honest participant
    pub multisig_id: [u8; 32],
    pub keys: ThresholdKeys,
    /// Hex blob which, together with the seed, replays this participant's
    /// ceremony
    pub recovery: String,
}

#[derive(Serialize, Deserialize)]
struct RecoveryData {
    config: Vec<u8>,
    commitments: Vec<Vec<u8>>,
    shares: Vec<Vec<u8>>,
}

/// Round 1: commit to a fresh polynomial and derive the recovery seed
pub fn start_key_gen(
    config: MultisigConfig,
    my_name: &str,
    language: Language,
) -> Result<StartKeyGenResult, KeyGenError> {
    let config = MultisigConfigWithName::new(config, my_name)?;
    let index = config.index()?;
    let context = config.config().context();

    let mut entropy = Zeroizing::new([0u8; SEED_ENTROPY_LEN]);
    OsRng.fill_bytes(entropy.as_mut());
    let mnemonic = Mnemonic::from_entropy_in(language.into(), entropy.as_ref())
        .map_err(|_| KeyGenError::Internal)?;

    // Coefficients are not kept between rounds; round 2 re-derives them
    // from the typed-in seed
    let mut rng = coefficient_rng(entropy.as_ref(), &context);
    let (coefficients, commitments) =
        generate_polynomial(&mut rng, config.config().threshold(), None);

    let enc_secret = ReusableSecret::random_from_rng(OsRng);
    let enc_key = *X25519PublicKey::from(&enc_secret).as_bytes();

    let commitment_bytes: Vec<Vec<u8>> = commitments.iter().map(point_to_bytes).collect();
    let proof = SchnorrProof::prove(
        &mut rng,
        &context,
        &pok_statement(&commitment_bytes),
        &coefficients[0],
    );

    let message =
        KeyGenCommitments { sender: index, commitments: commitment_bytes, proof, enc_key };
    let encoded = message.encode();

    debug!(participant = %index, "key generation round 1 complete");

    Ok(StartKeyGenResult {
        seed: mnemonic.to_string(),
        machine: SecretShareMachine {
            config,
            index,
            context,
            commitments,
            encoded_commitments: encoded.clone(),
            enc_secret,
        },
        commitments: encoded,
    })
}

/// Round 2: verify everyone's commitments and deal encrypted shares.
///
/// `seed` is the mnemonic returned by round 1, typed back in by the user;
/// the polynomial is re-derived from it rather than held in memory between
/// rounds. `commitments` must hold exactly one round-1 broadcast from every
/// other participant. Returns one share message per other participant,
/// ordered by participant index excluding self; each must be delivered to
/// its recipient.
pub fn get_secret_shares(
    machine: SecretShareMachine,
    language: Language,
    seed: &str,
    commitments: &[Vec<u8>],
) -> Result<(KeyMachine, Vec<Vec<u8>>), KeyGenError> {
    let SecretShareMachine { config, index, context, commitments: our_commitments, encoded_commitments, enc_secret } =
        machine;
    let threshold = config.config().threshold();
    let participants = config.config().participant_count();

    let mnemonic =
        Mnemonic::parse_in_normalized(language.into(), seed).map_err(|_| KeyGenError::InvalidSeed)?;
    let entropy = Zeroizing::new(mnemonic.to_entropy());
    let mut rng = coefficient_rng(&entropy, &context);
    let (coefficients, rederived) = generate_polynomial(&mut rng, threshold, None);
    // A valid but wrong mnemonic yields a different polynomial
    if rederived != our_commitments {
        Err(KeyGenError::InvalidSeed)?;
    }

    if commitments.len() != usize::from(participants) - 1 {
        Err(KeyGenError::InvalidAmountOfCommitments)?;
    }

    let mut received: Vec<(Participant, KeyGenCommitments)> = Vec::with_capacity(commitments.len());
    for bytes in commitments {
        let message = KeyGenCommitments::decode(bytes).ok_or(KeyGenError::InvalidEncoding)?;
        let sender = message.sender;
        if sender == index
            || sender.get() > participants
            || received.iter().any(|(s, _)| *s == sender)
        {
            Err(KeyGenError::InvalidCommitments)?;
        }
        if message.commitments.len() != usize::from(threshold) {
            Err(KeyGenError::InvalidCommitments)?;
        }
        received.push((sender, message));
    }
    received.sort_by_key(|(sender, _)| *sender);

    // Position k ends up holding participant k+1's data, self included
    let mut indexed: Vec<(Participant, Vec<ProjectivePoint>, Vec<u8>)> =
        vec![(index, our_commitments, encoded_commitments)];
    let mut enc_keys = Vec::with_capacity(received.len());
    for (sender, message) in &received {
        let points = message
            .commitments
            .iter()
            .map(|bytes| point_from_bytes(bytes).ok_or(KeyGenError::InvalidCommitments))
            .collect::<Result<Vec<_>, _>>()?;
        if !message.proof.verify(&context, &pok_statement(&message.commitments), &points[0]) {
            Err(KeyGenError::InvalidCommitments)?;
        }
        enc_keys.push((*sender, X25519PublicKey::from(message.enc_key)));
        indexed.push((*sender, points, message.encode()));
    }
    indexed.sort_by_key(|(sender, _, _)| *sender);
    let (all_commitments, commitment_blobs): (Vec<_>, Vec<_>) =
        indexed.into_iter().map(|(_, points, blob)| (points, blob)).unzip();

    let mut recipients: Vec<&(Participant, X25519PublicKey)> = enc_keys.iter().collect();
    recipients.sort_by_key(|(recipient, _)| *recipient);
    let mut shares = Vec::with_capacity(recipients.len());
    for (recipient, their_key) in recipients {
        let share = scalar_to_bytes(&evaluate(&coefficients, *recipient));
        let encrypted =
            encrypt_share(&mut OsRng, &enc_secret, their_key, &context, index, *recipient, &share);
        shares.push(
            SecretShare { sender: index, recipient: *recipient, share: encrypted }.encode(),
        );
    }

    let secret_eval = evaluate(&coefficients, index);

    debug!(participant = %index, "key generation round 2 complete");

    Ok((
        KeyMachine {
            config,
            index,
            context,
            enc_secret,
            secret_eval,
            commitments: all_commitments,
            enc_keys,
            commitment_blobs,
        },
        shares,
    ))
}

/// Round 3: verify received shares and assemble the threshold keys.
///
/// `shares` must hold exactly one round-2 message from every other
/// participant, each addressed to the local party.
pub fn complete_key_gen(
    machine: KeyMachine,
    shares: &[Vec<u8>],
) -> Result<KeyGenResult, KeyGenError> {
    let KeyMachine { config, index, context, enc_secret, secret_eval, commitments, enc_keys, commitment_blobs } =
        machine;
    let participants = config.config().participant_count();

    if shares.len() != usize::from(participants) - 1 {
        Err(KeyGenError::InvalidAmountOfShares)?;
    }

    let mut secret = secret_eval;
    let mut seen: Vec<Participant> = Vec::with_capacity(shares.len());
    let mut share_blobs: Vec<(Participant, Vec<u8>)> = Vec::with_capacity(shares.len());
    for bytes in shares {
        let message = SecretShare::decode(bytes).ok_or(KeyGenError::InvalidEncoding)?;
        let sender = message.sender;
        if sender == index
            || sender.get() > participants
            || message.recipient != index
            || seen.contains(&sender)
        {
            Err(KeyGenError::InvalidShare)?;
        }
        let their_key = enc_keys
            .iter()
            .find(|(s, _)| *s == sender)
            .map(|(_, key)| key)
            .ok_or(KeyGenError::InvalidShare)?;

        let plaintext =
            decrypt_share(&enc_secret, their_key, &context, sender, index, &message.share)
                .ok_or(KeyGenError::InvalidShare)?;
        let share = scalar_from_bytes(&plaintext).ok_or(KeyGenError::InvalidShare)?;
        if !verify_share(&share, &commitments[sender.pos()], index) {
            Err(KeyGenError::InvalidShare)?;
        }

        secret += share;
        seen.push(sender);
        share_blobs.push((sender, bytes.clone()));
    }

    let stripes = sum_commitments(&commitments);
    let group_key = stripes[0];
    let verification_shares: Vec<ProjectivePoint> = (1..=participants)
        .map(|i| evaluate_commitments(&stripes, Participant::new(i).expect("i >= 1")))
        .collect();
    if verification_shares[index.pos()] != ProjectivePoint::GENERATOR * secret {
        Err(KeyGenError::Internal)?;
    }

    let encoded_config = config.config().encode();
    let mut transcript = Transcript::new(b"threshold-multisig id");
    transcript.append_message(b"config", &encoded_config);
    for blob in &commitment_blobs {
        transcript.append_message(b"commitments", blob);
    }
    let multisig_id = transcript_challenge(transcript);

    share_blobs.sort_by_key(|(sender, _)| *sender);
    let recovery = hex::encode(codec::encode(&RecoveryData {
        config: encoded_config,
        commitments: commitment_blobs,
        shares: share_blobs.into_iter().map(|(_, blob)| blob).collect(),
    }));

    debug!(participant = %index, "key generation complete");

    Ok(KeyGenResult {
        multisig_id,
        keys: ThresholdKeys::new(
            config.config().threshold(),
            participants,
            index,
            secret,
            group_key,
            verification_shares,
        ),
        recovery,
    })
}
