//! Error types for the threshold multisig protocols
//!
//! Errors are grouped by protocol phase, one closed enum per phase. Each
//! variant maps to a stable numeric code via [`KeyGenError::code`] and
//! friends; the codes are a versioned wire contract (generic/encoding in the
//! 100s, key generation in the 200s, signing in the 300s, resharing in the
//! 80s) and exist only for the serialization boundary. Internal code matches
//! on the variants, never on the numbers.

use thiserror::Error;

/// Errors that can occur during multisig configuration and key generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyGenError {
    /// A message or config failed to decode
    #[error("invalid encoding")]
    InvalidEncoding,

    /// Unclassified internal failure
    #[error("internal error")]
    Internal,

    /// Threshold or participant count was zero
    #[error("zero parameter")]
    ZeroParameter,

    /// Threshold exceeds the participant count
    #[error("invalid threshold")]
    InvalidThreshold,

    /// Participant index/reference out of range
    #[error("invalid participant")]
    InvalidParticipant,

    /// Empty, duplicated, or unknown participant name
    #[error("invalid name")]
    InvalidName,

    /// The wordlist language tag is not one of the supported languages
    #[error("unknown language")]
    UnknownLanguage,

    /// The supplied recovery seed phrase was malformed
    #[error("invalid seed")]
    InvalidSeed,

    /// The round-1 message count does not equal participants - 1
    #[error("invalid amount of commitments")]
    InvalidAmountOfCommitments,

    /// A round-1 message carried invalid commitments or an invalid proof
    #[error("invalid commitments")]
    InvalidCommitments,

    /// The round-2 message count does not equal participants - 1
    #[error("invalid amount of shares")]
    InvalidAmountOfShares,

    /// A secret share failed verification against its sender's commitments
    #[error("invalid share")]
    InvalidShare,
}

impl KeyGenError {
    /// Stable numeric code for the serialization boundary
    pub fn code(&self) -> u16 {
        match self {
            KeyGenError::InvalidEncoding => 100,
            KeyGenError::Internal => 101,
            KeyGenError::ZeroParameter => 200,
            KeyGenError::InvalidThreshold => 201,
            KeyGenError::InvalidParticipant => 202,
            KeyGenError::InvalidName => 203,
            KeyGenError::UnknownLanguage => 204,
            KeyGenError::InvalidSeed => 205,
            KeyGenError::InvalidAmountOfCommitments => 206,
            KeyGenError::InvalidCommitments => 207,
            KeyGenError::InvalidAmountOfShares => 208,
            KeyGenError::InvalidShare => 209,
        }
    }
}

/// Errors that can occur while building a sign config or signing a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignError {
    /// A message or config failed to decode
    #[error("invalid encoding")]
    InvalidEncoding,

    /// Unclassified internal failure
    #[error("internal error")]
    Internal,

    /// An input could not be interpreted as a spendable output
    #[error("invalid output")]
    InvalidOutput,

    /// A payment or change address failed to parse
    #[error("invalid address")]
    InvalidAddress,

    /// An address belongs to a different network than the config
    #[error("invalid network")]
    InvalidNetwork,

    /// The config has no inputs
    #[error("no inputs")]
    NoInputs,

    /// The config has no payments and no change
    #[error("no outputs")]
    NoOutputs,

    /// A payment is below the dust floor for its script
    #[error("dust payment")]
    Dust,

    /// Input value does not cover outputs plus fee
    #[error("not enough funds")]
    NotEnoughFunds,

    /// The transaction exceeds the standardness weight cap
    #[error("too large transaction")]
    TooLargeTransaction,

    /// The keys cannot spend the config's inputs
    #[error("wrong keys")]
    WrongKeys,

    /// A preprocess message was malformed, duplicated, or miscounted
    #[error("invalid preprocess")]
    InvalidPreprocess,

    /// A signature share failed verification against its signer's preprocess
    #[error("invalid share")]
    InvalidShare,
}

impl SignError {
    /// Stable numeric code for the serialization boundary
    pub fn code(&self) -> u16 {
        match self {
            SignError::InvalidEncoding => 100,
            SignError::Internal => 101,
            SignError::InvalidOutput => 300,
            SignError::InvalidAddress => 301,
            SignError::InvalidNetwork => 302,
            SignError::NoInputs => 303,
            SignError::NoOutputs => 304,
            SignError::Dust => 305,
            SignError::NotEnoughFunds => 306,
            SignError::TooLargeTransaction => 307,
            SignError::WrongKeys => 308,
            SignError::InvalidPreprocess => 309,
            SignError::InvalidShare => 310,
        }
    }
}

/// Errors that can occur during resharing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReshareError {
    /// A message or config failed to decode
    #[error("invalid encoding")]
    InvalidEncoding,

    /// Unclassified internal failure
    #[error("internal error")]
    Internal,

    /// The resharer or new-participant count is out of range
    #[error("invalid amount of participants")]
    InvalidParticipantsAmount,

    /// A resharer index or participant name appears twice
    #[error("duplicated participant")]
    DuplicatedParticipant,

    /// Fewer resharers than required
    #[error("not enough resharers")]
    NotEnoughResharers,

    /// A resharer's broadcast was malformed or inconsistent
    #[error("invalid resharer message")]
    InvalidResharerMsg,

    /// A new participant's message was malformed, or the reshared key
    /// failed to reproduce the group key
    #[error("invalid reshared message")]
    InvalidResharedMsg,

    /// The local party is not part of the referenced set
    #[error("invalid participant")]
    InvalidParticipant,

    /// The new threshold or participant count was zero
    #[error("zero parameter")]
    ZeroParameter,

    /// The new threshold exceeds the new participant count
    #[error("invalid threshold")]
    InvalidThreshold,

    /// Empty or duplicated participant name
    #[error("invalid name")]
    InvalidName,
}

impl ReshareError {
    /// Stable numeric code for the serialization boundary
    pub fn code(&self) -> u16 {
        match self {
            ReshareError::InvalidEncoding => 100,
            ReshareError::Internal => 101,
            ReshareError::InvalidParticipantsAmount => 80,
            ReshareError::DuplicatedParticipant => 81,
            ReshareError::NotEnoughResharers => 82,
            ReshareError::InvalidResharerMsg => 83,
            ReshareError::InvalidResharedMsg => 84,
            ReshareError::InvalidParticipant => 85,
            ReshareError::ZeroParameter => 86,
            ReshareError::InvalidThreshold => 87,
            ReshareError::InvalidName => 88,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_stay_in_their_bands() {
        assert_eq!(KeyGenError::InvalidEncoding.code(), 100);
        assert!((200..300).contains(&KeyGenError::InvalidShare.code()));
        assert!((300..400).contains(&SignError::Dust.code()));
        assert!((80..100).contains(&ReshareError::NotEnoughResharers.code()));
    }
}
