//! Three-round distributed key generation
//!
//! Round 1 commits each participant to a random Shamir polynomial and hands
//! the caller a recovery mnemonic. Round 2 verifies everyone's commitments
//! and deals encrypted shares. Round 3 verifies received shares and
//! assembles [`crate::ThresholdKeys`]. Each round consumes its machine, so
//! a round can never run twice against the same state.

mod dkg;
mod messages;

pub use dkg::{
    complete_key_gen, get_secret_shares, start_key_gen, KeyGenResult, KeyMachine,
    SecretShareMachine, StartKeyGenResult,
};
pub use messages::{KeyGenCommitments, SecretShare};

/// Wordlist for the recovery mnemonic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    SimplifiedChinese,
    TraditionalChinese,
    French,
    Italian,
    Japanese,
    Korean,
    Spanish,
}

impl Language {
    /// Resolve the numeric wordlist tag used at serialization boundaries
    pub fn from_code(code: u8) -> Result<Language, crate::error::KeyGenError> {
        match code {
            0 => Ok(Language::English),
            1 => Ok(Language::SimplifiedChinese),
            2 => Ok(Language::TraditionalChinese),
            3 => Ok(Language::French),
            4 => Ok(Language::Italian),
            5 => Ok(Language::Japanese),
            6 => Ok(Language::Korean),
            7 => Ok(Language::Spanish),
            _ => Err(crate::error::KeyGenError::UnknownLanguage),
        }
    }
}

impl From<Language> for bip39::Language {
    fn from(language: Language) -> bip39::Language {
        match language {
            Language::English => bip39::Language::English,
            Language::SimplifiedChinese => bip39::Language::SimplifiedChinese,
            Language::TraditionalChinese => bip39::Language::TraditionalChinese,
            Language::French => bip39::Language::French,
            Language::Italian => bip39::Language::Italian,
            Language::Japanese => bip39::Language::Japanese,
            Language::Korean => bip39::Language::Korean,
            Language::Spanish => bip39::Language::Spanish,
        }
    }
}
