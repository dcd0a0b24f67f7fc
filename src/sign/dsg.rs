//! The round functions and state machines of threshold signing

use bitcoin::{consensus, Witness};
use k256::{
    elliptic_curve::{point::AffineCoordinates, Field},
    ProjectivePoint, Scalar,
};
use merlin::Transcript;
use rand::rngs::OsRng;
use tracing::debug;

use super::messages::{Preprocess, SignatureShares};
use crate::{
    crypto::{
        bip340_challenge, point_from_bytes, point_to_bytes, reduce_scalar, scalar_from_bytes,
        scalar_to_bytes, transcript_challenge,
    },
    error::SignError,
    keys::ThresholdKeys,
    poly::lagrange,
    transaction::{signable_transaction, SignConfig, SignableTransaction},
    types::Participant,
};

/// The binding factor tying a signer's second nonce to this exact signing
/// attempt: the message, the full commitment set, and the signer identity
fn binding_factor(
    group_key: &[u8],
    sighash: &[u8; 32],
    preprocesses: &[Vec<u8>],
    signer: Participant,
) -> Scalar {
    let mut transcript = Transcript::new(b"threshold-multisig binding factor");
    transcript.append_message(b"group-key", group_key);
    transcript.append_message(b"sighash", sighash);
    for preprocess in preprocesses {
        transcript.append_message(b"preprocess", preprocess);
    }
    transcript.append_message(b"signer", &signer.get().to_le_bytes());
    reduce_scalar(transcript_challenge(transcript))
}

/// State after round 1, consumed by [`continue_sign`]
pub struct TransactionSignMachine {
    keys: ThresholdKeys,
    signable: SignableTransaction,
    sighashes: Vec<[u8; 32]>,
    /// Per-input (d, e) nonces. Consumed with the machine; a nonce pair
    /// signs at most once.
    nonces: Vec<(Scalar, Scalar)>,
    our_preprocess: Vec<u8>,
}

/// State after round 2, consumed by [`complete_sign`]
pub struct TransactionSignatureMachine {
    keys: ThresholdKeys,
    signable: SignableTransaction,
    signers: Vec<Participant>,
    lambdas: Vec<Scalar>,
    /// (D, E) per signer per input
    commitments: Vec<Vec<(ProjectivePoint, ProjectivePoint)>>,
    /// Binding factor per signer per input
    bindings: Vec<Vec<Scalar>>,
    challenges: Vec<Scalar>,
    r_x: Vec<[u8; 32]>,
    negate_r: Vec<bool>,
    negate_group: bool,
    negate_output: bool,
    tweak: Scalar,
    output: ProjectivePoint,
}

/// Round 1: validate the config against the keys, commit to fresh nonces.
///
/// Returns the machine and the preprocess bytes to broadcast.
pub fn attempt_sign(
    keys: &ThresholdKeys,
    config: &SignConfig,
) -> Result<(TransactionSignMachine, Vec<u8>), SignError> {
    let expected_script = keys.script_pubkey();
    for input in config.inputs() {
        if input.script_pubkey() != expected_script.as_bytes() {
            Err(SignError::WrongKeys)?;
        }
    }

    let signable = signable_transaction(config)?;
    let sighashes = signable.sighashes()?;

    let mut nonces = Vec::with_capacity(sighashes.len());
    let mut commitments = Vec::with_capacity(sighashes.len());
    for _ in &sighashes {
        let d = Scalar::random(&mut OsRng);
        let e = Scalar::random(&mut OsRng);
        commitments.push((
            point_to_bytes(&(ProjectivePoint::GENERATOR * d)),
            point_to_bytes(&(ProjectivePoint::GENERATOR * e)),
        ));
        nonces.push((d, e));
    }

    let message = Preprocess { sender: keys.index(), commitments };
    let encoded = message.encode();

    debug!(participant = %keys.index(), inputs = sighashes.len(), "signing round 1 complete");

    Ok((
        TransactionSignMachine {
            keys: keys.clone(),
            signable,
            sighashes,
            nonces,
            our_preprocess: encoded.clone(),
        },
        encoded,
    ))
}

/// Round 2: combine exactly `threshold` preprocesses (the local one
/// included, byte-identical) into group nonces and produce the local
/// partial signatures.
pub fn continue_sign(
    machine: TransactionSignMachine,
    preprocesses: &[Vec<u8>],
) -> Result<(TransactionSignatureMachine, Vec<u8>), SignError> {
    let TransactionSignMachine { keys, signable, sighashes, nonces, our_preprocess } = machine;

    if preprocesses.len() != usize::from(keys.threshold()) {
        Err(SignError::InvalidPreprocess)?;
    }

    let mut entries: Vec<(Participant, Vec<(ProjectivePoint, ProjectivePoint)>, Vec<u8>)> =
        Vec::with_capacity(preprocesses.len());
    for bytes in preprocesses {
        let message = Preprocess::decode(bytes).ok_or(SignError::InvalidEncoding)?;
        let sender = message.sender;
        if sender.get() > keys.participants() || entries.iter().any(|(s, _, _)| *s == sender) {
            Err(SignError::InvalidPreprocess)?;
        }
        if sender == keys.index() && *bytes != our_preprocess {
            Err(SignError::InvalidPreprocess)?;
        }
        if message.commitments.len() != sighashes.len() {
            Err(SignError::InvalidPreprocess)?;
        }
        let points = message
            .commitments
            .iter()
            .map(|(d, e)| {
                Some((point_from_bytes(d)?, point_from_bytes(e)?))
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(SignError::InvalidPreprocess)?;
        entries.push((sender, points, bytes.clone()));
    }
    entries.sort_by_key(|(sender, _, _)| *sender);

    let signers: Vec<Participant> = entries.iter().map(|(sender, _, _)| *sender).collect();
    if !signers.contains(&keys.index()) {
        Err(SignError::InvalidPreprocess)?;
    }
    let commitments: Vec<Vec<(ProjectivePoint, ProjectivePoint)>> =
        entries.iter().map(|(_, points, _)| points.clone()).collect();
    let blobs: Vec<Vec<u8>> = entries.into_iter().map(|(_, _, blob)| blob).collect();

    let taproot = keys.taproot_key();
    let group_key = keys.group_key();
    let lambdas: Vec<Scalar> = signers.iter().map(|s| lagrange(*s, &signers)).collect();
    let my_pos =
        signers.iter().position(|s| *s == keys.index()).expect("local signer checked above");

    // The share of the x-only output key's secret, before the tweak term
    // the aggregator adds
    let mut effective_secret = keys.secret_share();
    if taproot.negate_group {
        effective_secret = -effective_secret;
    }
    if taproot.negate_output {
        effective_secret = -effective_secret;
    }

    let mut bindings = vec![Vec::with_capacity(sighashes.len()); signers.len()];
    let mut challenges = Vec::with_capacity(sighashes.len());
    let mut r_xs = Vec::with_capacity(sighashes.len());
    let mut negate_rs = Vec::with_capacity(sighashes.len());
    let mut shares = Vec::with_capacity(sighashes.len());

    for (i, sighash) in sighashes.iter().enumerate() {
        for (j, signer) in signers.iter().enumerate() {
            bindings[j].push(binding_factor(&group_key, sighash, &blobs, *signer));
        }

        let mut r = ProjectivePoint::IDENTITY;
        for (j, points) in commitments.iter().enumerate() {
            let (d, e) = points[i];
            r += d + e * bindings[j][i];
        }
        let r_affine = r.to_affine();
        let negate_r = bool::from(r_affine.y_is_odd());
        let r_x: [u8; 32] = if negate_r { (-r).to_affine().x().into() } else { r_affine.x().into() };

        let challenge = bip340_challenge(&r_x, &taproot.output_x, sighash);

        let (d, e) = nonces[i];
        let mut nonce_part = d + e * bindings[my_pos][i];
        if negate_r {
            nonce_part = -nonce_part;
        }
        let share = nonce_part + (challenge * lambdas[my_pos] * effective_secret);
        shares.push(scalar_to_bytes(&share));

        challenges.push(challenge);
        r_xs.push(r_x);
        negate_rs.push(negate_r);
    }

    let message = SignatureShares { sender: keys.index(), shares };

    debug!(participant = %keys.index(), signers = signers.len(), "signing round 2 complete");

    Ok((
        TransactionSignatureMachine {
            keys,
            signable,
            signers,
            lambdas,
            commitments,
            bindings,
            challenges,
            r_x: r_xs,
            negate_r: negate_rs,
            negate_group: taproot.negate_group,
            negate_output: taproot.negate_output,
            tweak: taproot.tweak,
            output: taproot.output,
        },
        message.encode(),
    ))
}

/// Round 3: verify every partial signature against its signer's nonce
/// commitments and verification share, aggregate, and return the fully
/// signed, consensus-serialized transaction.
pub fn complete_sign(
    machine: TransactionSignatureMachine,
    shares: &[Vec<u8>],
) -> Result<Vec<u8>, SignError> {
    let TransactionSignatureMachine {
        keys,
        signable,
        signers,
        lambdas,
        commitments,
        bindings,
        challenges,
        r_x,
        negate_r,
        negate_group,
        negate_output,
        tweak,
        output,
    } = machine;
    let inputs = challenges.len();

    if shares.len() != signers.len() {
        Err(SignError::InvalidShare)?;
    }
    let mut received: Vec<Option<Vec<Scalar>>> = vec![None; signers.len()];
    for bytes in shares {
        let message = SignatureShares::decode(bytes).ok_or(SignError::InvalidEncoding)?;
        let pos = signers
            .iter()
            .position(|s| *s == message.sender)
            .ok_or(SignError::InvalidShare)?;
        if received[pos].is_some() || message.shares.len() != inputs {
            Err(SignError::InvalidShare)?;
        }
        let scalars = message
            .shares
            .iter()
            .map(|bytes| scalar_from_bytes(bytes).ok_or(SignError::InvalidShare))
            .collect::<Result<Vec<_>, _>>()?;
        received[pos] = Some(scalars);
    }

    let q_even = if negate_output { -output } else { output };
    let tweak_term = if negate_output { -tweak } else { tweak };

    let mut tx = signable.tx;
    for i in 0..inputs {
        let mut total = challenges[i] * tweak_term;
        let mut r_even = ProjectivePoint::IDENTITY;

        for (j, signer) in signers.iter().enumerate() {
            let share = received[j].as_ref().expect("filled for every signer above")[i];

            let (d, e) = commitments[j][i];
            let mut nonce_part = d + e * bindings[j][i];
            if negate_r[i] {
                nonce_part = -nonce_part;
            }
            r_even += nonce_part;

            let mut verification_share =
                keys.verification_share(*signer).ok_or(SignError::Internal)?;
            if negate_group {
                verification_share = -verification_share;
            }
            if negate_output {
                verification_share = -verification_share;
            }

            if ProjectivePoint::GENERATOR * share
                != nonce_part + (verification_share * (challenges[i] * lambdas[j]))
            {
                Err(SignError::InvalidShare)?;
            }
            total += share;
        }

        // Shares verified individually; failure here is a local fault
        if ProjectivePoint::GENERATOR * total != r_even + (q_even * challenges[i]) {
            Err(SignError::Internal)?;
        }

        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&r_x[i]);
        signature[32..].copy_from_slice(&scalar_to_bytes(&total));
        let mut witness = Witness::new();
        witness.push(signature);
        tx.input[i].witness = witness;
    }

    debug!(inputs, "signing complete");

    Ok(consensus::encode::serialize(&tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Transaction;
    use k256::schnorr::{Signature, VerifyingKey};

    use crate::{
        testutil::run_dkg,
        transaction::{new_sign_config, PortableOutput},
        types::Network,
    };

    fn self_spend_config(keys: &ThresholdKeys) -> SignConfig {
        let script = keys.script_pubkey().to_bytes();
        let inputs =
            [PortableOutput::new([3; 32], 0, 100_000, script), PortableOutput::new([4; 32], 1, 50_000, keys.script_pubkey().to_bytes())];
        let destination = keys.address(Network::Regtest).to_string();
        new_sign_config(Network::Regtest, &inputs, &[(destination, 40_000)], "", 2).unwrap()
    }

    fn sign_with(subset: [&ThresholdKeys; 2], config: &SignConfig) -> Vec<u8> {
        let (machine_a, preprocess_a) = attempt_sign(subset[0], config).unwrap();
        let (machine_b, preprocess_b) = attempt_sign(subset[1], config).unwrap();
        let preprocesses = vec![preprocess_a, preprocess_b];

        let (machine_a, shares_a) = continue_sign(machine_a, &preprocesses).unwrap();
        let (machine_b, shares_b) = continue_sign(machine_b, &preprocesses).unwrap();
        let shares = vec![shares_a, shares_b];

        let tx_a = complete_sign(machine_a, &shares).unwrap();
        let tx_b = complete_sign(machine_b, &shares).unwrap();
        assert_eq!(tx_a, tx_b);
        tx_a
    }

    #[test]
    fn different_subsets_produce_valid_signatures() {
        let keys = run_dkg(&["alice", "bob", "carol"], 2);
        let config = self_spend_config(&keys[0]);
        let sighashes = signable_transaction(&config).unwrap().sighashes().unwrap();
        let output_key = VerifyingKey::from_bytes(&keys[0].taproot_key().output_x).unwrap();

        for subset in [[&keys[0], &keys[1]], [&keys[1], &keys[2]]] {
            let bytes = sign_with(subset, &config);
            let tx: Transaction = consensus::encode::deserialize(&bytes).unwrap();
            assert_eq!(tx.input.len(), 2);
            for (i, input) in tx.input.iter().enumerate() {
                let witness = input.witness.nth(0).unwrap();
                assert_eq!(witness.len(), 64);
                let signature = Signature::try_from(witness).unwrap();
                output_key.verify_raw(&sighashes[i], &signature).unwrap();
            }
        }
    }

    #[test]
    fn foreign_inputs_are_wrong_keys() {
        let keys = run_dkg(&["alice", "bob"], 2);
        let other = run_dkg(&["dave", "erin"], 2);
        let config = self_spend_config(&other[0]);
        assert_eq!(attempt_sign(&keys[0], &config).err().unwrap(), SignError::WrongKeys);
    }

    #[test]
    fn wrong_preprocess_count_rejected() {
        let keys = run_dkg(&["alice", "bob"], 2);
        let config = self_spend_config(&keys[0]);
        let (machine, preprocess) = attempt_sign(&keys[0], &config).unwrap();
        assert_eq!(
            continue_sign(machine, &[preprocess]).err().unwrap(),
            SignError::InvalidPreprocess
        );
    }

    #[test]
    fn substituted_local_preprocess_rejected() {
        let keys = run_dkg(&["alice", "bob"], 2);
        let config = self_spend_config(&keys[0]);
        let (machine_a, _) = attempt_sign(&keys[0], &config).unwrap();
        // A second attempt by the same participant yields different nonces
        let (_, stale_a) = attempt_sign(&keys[0], &config).unwrap();
        let (_, preprocess_b) = attempt_sign(&keys[1], &config).unwrap();
        assert_eq!(
            continue_sign(machine_a, &[stale_a, preprocess_b]).err().unwrap(),
            SignError::InvalidPreprocess
        );
    }

    #[test]
    fn tampered_share_rejected() {
        let keys = run_dkg(&["alice", "bob"], 2);
        let config = self_spend_config(&keys[0]);
        let (machine_a, preprocess_a) = attempt_sign(&keys[0], &config).unwrap();
        let (machine_b, preprocess_b) = attempt_sign(&keys[1], &config).unwrap();
        let preprocesses = vec![preprocess_a, preprocess_b];

        let (machine_a, shares_a) = continue_sign(machine_a, &preprocesses).unwrap();
        let (_, shares_b) = continue_sign(machine_b, &preprocesses).unwrap();

        let mut tampered = SignatureShares::decode(&shares_b).unwrap();
        tampered.shares[0] = scalar_to_bytes(&Scalar::ONE);
        assert_eq!(
            complete_sign(machine_a, &[shares_a, tampered.encode()]).unwrap_err(),
            SignError::InvalidShare
        );
    }
}
