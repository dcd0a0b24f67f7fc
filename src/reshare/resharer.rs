//! The resharer side: an existing key-holder re-splitting its share

use k256::Scalar;
use rand::rngs::OsRng;
use tracing::debug;
use x25519_dalek::{PublicKey as X25519PublicKey, ReusableSecret};

use super::{
    config::ResharerConfig,
    messages::{ResharedAck, ResharerComplete, ResharerStart},
};
use crate::{
    crypto::{encrypt_share, point_to_bytes, pok_statement, scalar_to_bytes, SchnorrProof},
    error::ReshareError,
    keys::ThresholdKeys,
    poly::{evaluate, generate_polynomial, lagrange},
    types::Participant,
};

/// State between [`start_resharer`] and [`complete_resharer`]
pub struct ResharerMachine {
    config: ResharerConfig,
    context: [u8; 32],
    index: Participant,
    coefficients: Vec<Scalar>,
    enc_secret: ReusableSecret,
}

/// Open a resharing ceremony as a designated resharer.
///
/// The local participant's Lagrange-weighted share becomes the constant
/// term of a fresh polynomial sized for the new threshold; summed over all
/// resharers those constants reconstruct the group secret, which is why
/// the full designated set must participate.
pub fn start_resharer(
    keys: &ThresholdKeys,
    config: &ResharerConfig,
) -> Result<(ResharerMachine, Vec<u8>), ReshareError> {
    let index = keys.index();
    if !config.resharers().contains(&index) {
        Err(ReshareError::InvalidParticipant)?;
    }
    for resharer in config.resharers() {
        if resharer.get() > keys.participants() {
            Err(ReshareError::InvalidParticipant)?;
        }
    }
    // The old secret is only reconstructible from at least `threshold`
    // resharers
    if config.resharers().len() < usize::from(keys.threshold()) {
        Err(ReshareError::NotEnoughResharers)?;
    }

    let group_key = keys.group_key();
    let context = config.context(&group_key);

    let constant = lagrange(index, config.resharers()) * keys.secret_share();
    let (coefficients, commitments) =
        generate_polynomial(&mut OsRng, config.new_threshold(), Some(constant));

    let enc_secret = ReusableSecret::random_from_rng(OsRng);
    let enc_key = *X25519PublicKey::from(&enc_secret).as_bytes();

    let commitment_bytes: Vec<Vec<u8>> = commitments.iter().map(point_to_bytes).collect();
    let proof =
        SchnorrProof::prove(&mut OsRng, &context, &pok_statement(&commitment_bytes), &constant);

    let message = ResharerStart {
        resharer: index,
        group_key,
        commitments: commitment_bytes,
        proof,
        enc_key,
    };

    debug!(resharer = %index, "resharer start broadcast ready");

    Ok((
        ResharerMachine { config: config.clone(), context, index, coefficients, enc_secret },
        message.encode(),
    ))
}

/// Finish the resharer side: given every new participant's acknowledgement,
/// emit their encrypted sub-shares
pub fn complete_resharer(
    machine: ResharerMachine,
    acks: &[Vec<u8>],
) -> Result<Vec<u8>, ReshareError> {
    let ResharerMachine { config, context, index, coefficients, enc_secret } = machine;
    let new_participants = config.new_participant_count();

    if acks.len() != usize::from(new_participants) {
        Err(ReshareError::InvalidResharedMsg)?;
    }

    let mut recipients: Vec<(Participant, X25519PublicKey)> = Vec::with_capacity(acks.len());
    for bytes in acks {
        let ack = ResharedAck::decode(bytes).ok_or(ReshareError::InvalidEncoding)?;
        if ack.participant.get() > new_participants
            || recipients.iter().any(|(p, _)| *p == ack.participant)
        {
            Err(ReshareError::InvalidResharedMsg)?;
        }
        recipients.push((ack.participant, X25519PublicKey::from(ack.enc_key)));
    }
    recipients.sort_by_key(|(participant, _)| *participant);

    let mut shares = Vec::with_capacity(recipients.len());
    for (recipient, their_key) in &recipients {
        let share = scalar_to_bytes(&evaluate(&coefficients, *recipient));
        shares.push((
            *recipient,
            encrypt_share(&mut OsRng, &enc_secret, their_key, &context, index, *recipient, &share),
        ));
    }

    debug!(resharer = %index, recipients = shares.len(), "resharer complete");

    Ok(ResharerComplete { resharer: index, shares }.encode())
}
