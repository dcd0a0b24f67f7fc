//! Resharing ceremony configuration

use merlin::Transcript;
use rand::rngs::OsRng;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    crypto::transcript_challenge,
    error::ReshareError,
    types::{Participant, SALT_LEN},
};

/// An immutable resharing configuration: who reshares, to whom, and under
/// what new threshold. Like `MultisigConfig`, the salt binds it to exactly
/// one ceremony.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ResharerConfig {
    new_threshold: u16,
    resharers: Vec<Participant>,
    new_participants: Vec<String>,
    salt: [u8; SALT_LEN],
}

fn validate(
    new_threshold: u16,
    resharers: &[Participant],
    new_participants: &[String],
) -> Result<(), ReshareError> {
    if new_threshold == 0 || resharers.is_empty() || new_participants.is_empty() {
        Err(ReshareError::ZeroParameter)?;
    }
    if new_participants.len() >= usize::from(u16::MAX) || resharers.len() >= usize::from(u16::MAX)
    {
        Err(ReshareError::InvalidParticipantsAmount)?;
    }
    if usize::from(new_threshold) > new_participants.len() {
        Err(ReshareError::InvalidThreshold)?;
    }
    for (i, name) in new_participants.iter().enumerate() {
        if name.is_empty() {
            Err(ReshareError::InvalidName)?;
        }
        if new_participants[..i].contains(name) {
            Err(ReshareError::DuplicatedParticipant)?;
        }
    }
    for (i, resharer) in resharers.iter().enumerate() {
        if resharers[..i].contains(resharer) {
            Err(ReshareError::DuplicatedParticipant)?;
        }
    }
    if resharers.len() < usize::from(new_threshold) {
        Err(ReshareError::NotEnoughResharers)?;
    }
    Ok(())
}

/// Create a resharing config with a fresh random salt. `resharers` are
/// 1-based indices into the *current* group.
pub fn new_resharer_config(
    new_threshold: u16,
    resharers: &[u16],
    new_participants: &[impl AsRef<str>],
) -> Result<ResharerConfig, ReshareError> {
    let mut resharers = resharers
        .iter()
        .map(|&i| Participant::new(i).ok_or(ReshareError::InvalidParticipant))
        .collect::<Result<Vec<_>, _>>()?;
    resharers.sort_unstable();
    let new_participants: Vec<String> =
        new_participants.iter().map(|name| name.as_ref().to_string()).collect();
    validate(new_threshold, &resharers, &new_participants)?;

    let mut salt = [0; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    Ok(ResharerConfig { new_threshold, resharers, new_participants, salt })
}

/// Decode an encoded resharing config, re-validating every construction
/// invariant and preserving the carried salt
pub fn decode_resharer_config(bytes: &[u8]) -> Result<ResharerConfig, ReshareError> {
    let config: ResharerConfig = codec::decode(bytes).ok_or(ReshareError::InvalidEncoding)?;
    // Constructors always emit the resharers sorted; anything else is not a
    // canonical encoding. Duplicates fall through to validate.
    if config.resharers.windows(2).any(|pair| pair[0] > pair[1]) {
        Err(ReshareError::InvalidEncoding)?;
    }
    validate(config.new_threshold, &config.resharers, &config.new_participants)?;
    Ok(config)
}

impl ResharerConfig {
    /// The new group's signing threshold
    pub fn new_threshold(&self) -> u16 {
        self.new_threshold
    }

    /// The designated resharers, sorted, as current-group indices
    pub fn resharers(&self) -> &[Participant] {
        &self.resharers
    }

    /// The new group's ordered participant names
    pub fn new_participants(&self) -> &[String] {
        &self.new_participants
    }

    /// The ceremony-binding salt
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// The number of new participants
    pub fn new_participant_count(&self) -> u16 {
        u16::try_from(self.new_participants.len()).expect("validated at construction")
    }

    /// Canonical bytes
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// The new participant's 1-based index in the new group
    pub(crate) fn index_of(&self, name: &str) -> Result<Participant, ReshareError> {
        let pos = self
            .new_participants
            .iter()
            .position(|participant| participant == name)
            .ok_or(ReshareError::InvalidParticipant)?;
        Participant::new(u16::try_from(pos + 1).map_err(|_| ReshareError::InvalidParticipant)?)
            .ok_or(ReshareError::InvalidParticipant)
    }

    /// The ceremony context every resharing transcript binds to, including
    /// the key being reshared
    pub(crate) fn context(&self, group_key: &[u8]) -> [u8; 32] {
        let mut transcript = Transcript::new(b"threshold-multisig reshare context");
        transcript.append_message(b"new-threshold", &self.new_threshold.to_le_bytes());
        for resharer in &self.resharers {
            transcript.append_message(b"resharer", &resharer.get().to_le_bytes());
        }
        for participant in &self.new_participants {
            transcript.append_message(b"participant", participant.as_bytes());
        }
        transcript.append_message(b"salt", &self.salt);
        transcript.append_message(b"group-key", group_key);
        transcript_challenge(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEW_NAMES: [&str; 4] = ["dave", "erin", "frank", "grace"];

    #[test]
    fn round_trip_preserves_salt() {
        let config = new_resharer_config(3, &[2, 1, 3], &NEW_NAMES).unwrap();
        // Sorted regardless of input order
        assert_eq!(config.resharers()[0].get(), 1);
        let decoded = decode_resharer_config(&config.encode()).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.salt(), config.salt());
    }

    #[test]
    fn parameter_bounds() {
        assert_eq!(
            new_resharer_config(0, &[1, 2], &NEW_NAMES).unwrap_err(),
            ReshareError::ZeroParameter
        );
        assert_eq!(
            new_resharer_config(5, &[1, 2, 3, 4, 5], &NEW_NAMES).unwrap_err(),
            ReshareError::InvalidThreshold
        );
        assert_eq!(
            new_resharer_config(3, &[1, 2], &NEW_NAMES).unwrap_err(),
            ReshareError::NotEnoughResharers
        );
        assert_eq!(
            new_resharer_config(2, &[1, 0], &NEW_NAMES).unwrap_err(),
            ReshareError::InvalidParticipant
        );
        assert_eq!(
            new_resharer_config(2, &[1, 1], &NEW_NAMES).unwrap_err(),
            ReshareError::DuplicatedParticipant
        );
        assert_eq!(
            new_resharer_config(2, &[1, 2], &["dave", "dave"]).unwrap_err(),
            ReshareError::DuplicatedParticipant
        );
        assert_eq!(
            new_resharer_config(2, &[1, 2], &["dave", ""]).unwrap_err(),
            ReshareError::InvalidName
        );
    }

    #[test]
    fn unsorted_encoding_rejected() {
        let mut config = new_resharer_config(2, &[1, 2], &NEW_NAMES).unwrap();
        config.resharers.swap(0, 1);
        assert_eq!(
            decode_resharer_config(&config.encode()).unwrap_err(),
            ReshareError::InvalidEncoding
        );
    }

    #[test]
    fn duplicated_resharer_encoding_rejected() {
        let mut config = new_resharer_config(2, &[1, 2], &NEW_NAMES).unwrap();
        config.resharers[1] = config.resharers[0];
        assert_eq!(
            decode_resharer_config(&config.encode()).unwrap_err(),
            ReshareError::DuplicatedParticipant
        );
    }

    #[test]
    fn context_binds_the_group_key() {
        let config = new_resharer_config(2, &[1, 2], &NEW_NAMES).unwrap();
        assert_ne!(config.context(b"key-a"), config.context(b"key-b"));
    }
}
