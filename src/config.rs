//! Multisig group configuration
//!
//! A [`MultisigConfig`] names a group, its threshold, its ordered
//! participants, and a random salt binding the config to exactly one
//! ceremony. Two configs describe the same ceremony iff all fields,
//! including the salt, are byte-equal. The config is immutable once
//! constructed or decoded; everything cryptographic in the DKG is
//! domain-separated by its [`MultisigConfig::context`].

use merlin::Transcript;
use rand::rngs::OsRng;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    crypto::transcript_challenge,
    error::KeyGenError,
    types::{Participant, SALT_LEN},
};

/// An immutable multisig group configuration
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MultisigConfig {
    name: String,
    threshold: u16,
    participants: Vec<String>,
    salt: [u8; SALT_LEN],
}

fn check_t_n(threshold: u16, participants: usize) -> Result<(), KeyGenError> {
    if threshold == 0 || participants == 0 {
        Err(KeyGenError::ZeroParameter)?;
    }
    if participants >= usize::from(u16::MAX) {
        Err(KeyGenError::InvalidParticipant)?;
    }
    if usize::from(threshold) > participants {
        Err(KeyGenError::InvalidThreshold)?;
    }
    Ok(())
}

fn check_names(name: &str, participants: &[String]) -> Result<(), KeyGenError> {
    if name.is_empty() {
        Err(KeyGenError::InvalidName)?;
    }
    for (i, participant) in participants.iter().enumerate() {
        if participant.is_empty() || participants[..i].contains(participant) {
            Err(KeyGenError::InvalidName)?;
        }
    }
    Ok(())
}

/// Create a multisig config with a fresh random salt.
///
/// Each config should have a unique ceremony context. The proposer draws a
/// random salt so a collision only occurs if the proposer is malicious;
/// wallets should track previously seen salts and reject repeats.
pub fn new_multisig_config(
    name: &str,
    threshold: u16,
    participants: &[impl AsRef<str>],
) -> Result<MultisigConfig, KeyGenError> {
    let participants: Vec<String> = participants.iter().map(|p| p.as_ref().to_string()).collect();
    check_t_n(threshold, participants.len())?;
    check_names(name, &participants)?;

    let mut salt = [0; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    Ok(MultisigConfig { name: name.to_string(), threshold, participants, salt })
}

/// Decode an encoded config, re-validating every construction invariant.
/// The carried salt is preserved so all participants share one ceremony
/// context.
pub fn decode_multisig_config(bytes: &[u8]) -> Result<MultisigConfig, KeyGenError> {
    let config: MultisigConfig = codec::decode(bytes).ok_or(KeyGenError::InvalidEncoding)?;
    check_t_n(config.threshold, config.participants.len())?;
    check_names(&config.name, &config.participants)?;
    Ok(config)
}

impl MultisigConfig {
    /// The human-readable group label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The signing threshold
    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// The ordered participant names; a participant's 1-based position is
    /// its index for the whole life of the group
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    /// The ceremony-binding salt
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// The number of participants
    pub fn participant_count(&self) -> u16 {
        u16::try_from(self.participants.len()).expect("validated at construction")
    }

    /// Canonical bytes; all participants decoding these converge on
    /// bit-identical configs
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// The ceremony context every DKG transcript binds to
    pub(crate) fn context(&self) -> [u8; 32] {
        let mut transcript = Transcript::new(b"threshold-multisig config context");
        transcript.append_message(b"name", self.name.as_bytes());
        transcript.append_message(b"threshold", &self.threshold.to_le_bytes());
        for participant in &self.participants {
            transcript.append_message(b"participant", participant.as_bytes());
        }
        transcript.append_message(b"salt", &self.salt);
        transcript_challenge(transcript)
    }
}

/// A config bound to the local participant's own name, held only by the
/// local process during key generation
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MultisigConfigWithName {
    config: MultisigConfig,
    my_name: String,
}

impl MultisigConfigWithName {
    pub(crate) fn new(config: MultisigConfig, my_name: &str) -> Result<Self, KeyGenError> {
        let with_name = MultisigConfigWithName { config, my_name: my_name.to_string() };
        // Resolve eagerly so later rounds can rely on a valid index
        with_name.index()?;
        Ok(with_name)
    }

    /// The underlying group config
    pub fn config(&self) -> &MultisigConfig {
        &self.config
    }

    /// The local participant's name
    pub fn my_name(&self) -> &str {
        &self.my_name
    }

    /// The local participant's 1-based index within the group
    pub fn index(&self) -> Result<Participant, KeyGenError> {
        let pos = self
            .config
            .participants
            .iter()
            .position(|participant| *participant == self.my_name)
            .ok_or(KeyGenError::InvalidParticipant)?;
        Participant::new(u16::try_from(pos + 1).map_err(|_| KeyGenError::InvalidParticipant)?)
            .ok_or(KeyGenError::InvalidParticipant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 3] = ["alice", "bob", "carol"];

    #[test]
    fn round_trip_preserves_every_field() {
        let config = new_multisig_config("treasury", 2, &NAMES).unwrap();
        let decoded = decode_multisig_config(&config.encode()).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.salt(), config.salt());
        assert_eq!(decoded.context(), config.context());
    }

    #[test]
    fn threshold_bounds() {
        assert_eq!(new_multisig_config("g", 0, &NAMES).unwrap_err(), KeyGenError::ZeroParameter);
        assert_eq!(new_multisig_config("g", 4, &NAMES).unwrap_err(), KeyGenError::InvalidThreshold);
        assert_eq!(
            new_multisig_config("g", 1, &[] as &[&str]).unwrap_err(),
            KeyGenError::ZeroParameter
        );
    }

    #[test]
    fn name_validation() {
        assert_eq!(new_multisig_config("", 2, &NAMES).unwrap_err(), KeyGenError::InvalidName);
        assert_eq!(
            new_multisig_config("g", 2, &["alice", "", "carol"]).unwrap_err(),
            KeyGenError::InvalidName
        );
        assert_eq!(
            new_multisig_config("g", 2, &["alice", "bob", "alice"]).unwrap_err(),
            KeyGenError::InvalidName
        );
    }

    #[test]
    fn salts_differ_per_config_and_change_the_context() {
        let a = new_multisig_config("g", 2, &NAMES).unwrap();
        let b = new_multisig_config("g", 2, &NAMES).unwrap();
        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.context(), b.context());
    }

    #[test]
    fn invalid_decodes_never_yield_partial_configs() {
        assert_eq!(decode_multisig_config(b"junk").unwrap_err(), KeyGenError::InvalidEncoding);

        let mut config = new_multisig_config("g", 2, &NAMES).unwrap();
        config.threshold = 9;
        assert_eq!(
            decode_multisig_config(&config.encode()).unwrap_err(),
            KeyGenError::InvalidThreshold
        );
    }

    #[test]
    fn local_index_resolution() {
        let config = new_multisig_config("g", 2, &NAMES).unwrap();
        let bound = MultisigConfigWithName::new(config.clone(), "bob").unwrap();
        assert_eq!(bound.index().unwrap().get(), 2);
        assert_eq!(
            MultisigConfigWithName::new(config, "mallory").unwrap_err(),
            KeyGenError::InvalidParticipant
        );
    }
}
