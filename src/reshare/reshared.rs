//! The reshared side: a new participant assembling its share

use std::cmp::Ordering;

use k256::{ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use tracing::debug;
use x25519_dalek::{PublicKey as X25519PublicKey, ReusableSecret};

use super::{
    config::ResharerConfig,
    messages::{ResharedAck, ResharerComplete, ResharerStart},
};
use crate::{
    crypto::{decrypt_share, point_from_bytes, pok_statement, scalar_from_bytes},
    error::ReshareError,
    keys::ThresholdKeys,
    poly::{evaluate_commitments, sum_commitments, verify_share},
    types::Participant,
};

/// State between [`start_reshared`] and [`complete_reshared`]
pub struct ResharedMachine {
    config: ResharerConfig,
    context: [u8; 32],
    index: Participant,
    enc_secret: ReusableSecret,
    group_key: ProjectivePoint,
    /// Per-resharer commitment vectors, ordered as `config.resharers()`
    commitments: Vec<Vec<ProjectivePoint>>,
    enc_keys: Vec<(Participant, X25519PublicKey)>,
}

/// Join a resharing ceremony as a new participant.
///
/// `starts` must hold the opening broadcast of every designated resharer;
/// each resharer's Lagrange weight is computed over the full designated
/// set, so a partial set cannot reconstruct the secret.
pub fn start_reshared(
    config: ResharerConfig,
    my_name: &str,
    starts: &[Vec<u8>],
) -> Result<(ResharedMachine, Vec<u8>), ReshareError> {
    let index = config.index_of(my_name)?;

    match starts.len().cmp(&config.resharers().len()) {
        Ordering::Less => Err(ReshareError::NotEnoughResharers)?,
        Ordering::Greater => Err(ReshareError::InvalidResharerMsg)?,
        Ordering::Equal => {}
    }

    let mut received: Vec<(Participant, ResharerStart)> = Vec::with_capacity(starts.len());
    let mut group_key_claim: Option<Vec<u8>> = None;
    for bytes in starts {
        let message = ResharerStart::decode(bytes).ok_or(ReshareError::InvalidEncoding)?;
        let resharer = message.resharer;
        if !config.resharers().contains(&resharer)
            || received.iter().any(|(r, _)| *r == resharer)
        {
            Err(ReshareError::InvalidResharerMsg)?;
        }
        if message.commitments.len() != usize::from(config.new_threshold()) {
            Err(ReshareError::InvalidResharerMsg)?;
        }
        // Every resharer must claim the same key
        match &group_key_claim {
            None => group_key_claim = Some(message.group_key.clone()),
            Some(claim) => {
                if *claim != message.group_key {
                    Err(ReshareError::InvalidResharerMsg)?;
                }
            }
        }
        received.push((resharer, message));
    }
    received.sort_by_key(|(resharer, _)| *resharer);

    let claim = group_key_claim.ok_or(ReshareError::NotEnoughResharers)?;
    let group_key = point_from_bytes(&claim).ok_or(ReshareError::InvalidResharerMsg)?;
    let context = config.context(&claim);

    let mut commitments = Vec::with_capacity(received.len());
    let mut enc_keys = Vec::with_capacity(received.len());
    for (resharer, message) in &received {
        let points = message
            .commitments
            .iter()
            .map(|bytes| point_from_bytes(bytes).ok_or(ReshareError::InvalidResharerMsg))
            .collect::<Result<Vec<_>, _>>()?;
        if !message.proof.verify(&context, &pok_statement(&message.commitments), &points[0]) {
            Err(ReshareError::InvalidResharerMsg)?;
        }
        commitments.push(points);
        enc_keys.push((*resharer, X25519PublicKey::from(message.enc_key)));
    }

    let enc_secret = ReusableSecret::random_from_rng(OsRng);
    let ack = ResharedAck { participant: index, enc_key: *X25519PublicKey::from(&enc_secret).as_bytes() };

    debug!(participant = %index, resharers = received.len(), "reshared acknowledgement ready");

    Ok((
        ResharedMachine { config, context, index, enc_secret, group_key, commitments, enc_keys },
        ack.encode(),
    ))
}

/// Finish the reshared side: decrypt and verify one sub-share per
/// designated resharer, sum them into the new share, and confirm the new
/// commitments reproduce the claimed group key
pub fn complete_reshared(
    machine: ResharedMachine,
    completes: &[Vec<u8>],
) -> Result<ThresholdKeys, ReshareError> {
    let ResharedMachine { config, context, index, enc_secret, group_key, commitments, enc_keys } =
        machine;

    match completes.len().cmp(&config.resharers().len()) {
        Ordering::Less => Err(ReshareError::NotEnoughResharers)?,
        Ordering::Greater => Err(ReshareError::InvalidResharedMsg)?,
        Ordering::Equal => {}
    }

    let mut secret = Scalar::ZERO;
    let mut seen: Vec<Participant> = Vec::with_capacity(completes.len());
    for bytes in completes {
        let message = ResharerComplete::decode(bytes).ok_or(ReshareError::InvalidEncoding)?;
        let resharer = message.resharer;
        let pos = config
            .resharers()
            .iter()
            .position(|r| *r == resharer)
            .ok_or(ReshareError::InvalidResharedMsg)?;
        if seen.contains(&resharer) {
            Err(ReshareError::InvalidResharedMsg)?;
        }
        let their_key = enc_keys
            .iter()
            .find(|(r, _)| *r == resharer)
            .map(|(_, key)| key)
            .ok_or(ReshareError::InvalidResharedMsg)?;
        let encrypted = message.share_for(index).ok_or(ReshareError::InvalidResharedMsg)?;

        let plaintext = decrypt_share(&enc_secret, their_key, &context, resharer, index, encrypted)
            .ok_or(ReshareError::InvalidResharedMsg)?;
        let share = scalar_from_bytes(&plaintext).ok_or(ReshareError::InvalidResharedMsg)?;
        if !verify_share(&share, &commitments[pos], index) {
            Err(ReshareError::InvalidResharedMsg)?;
        }

        secret += share;
        seen.push(resharer);
    }

    let stripes = sum_commitments(&commitments);
    // The reshared key must be the key we started with
    if stripes[0] != group_key {
        Err(ReshareError::InvalidResharedMsg)?;
    }

    let new_participants = config.new_participant_count();
    let verification_shares: Vec<ProjectivePoint> = (1..=new_participants)
        .map(|i| evaluate_commitments(&stripes, Participant::new(i).expect("i >= 1")))
        .collect();
    if verification_shares[index.pos()] != ProjectivePoint::GENERATOR * secret {
        Err(ReshareError::Internal)?;
    }

    debug!(participant = %index, "resharing complete");

    Ok(ThresholdKeys::new(
        config.new_threshold(),
        new_participants,
        index,
        secret,
        group_key,
        verification_shares,
    ))
}
