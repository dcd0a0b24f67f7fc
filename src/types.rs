//! Core types shared by every protocol phase

use k256::Scalar;
use serde::{Deserialize, Deserializer, Serialize};

/// Length of the ceremony-binding salt carried by configs
pub const SALT_LEN: usize = 32;

/// A 1-based participant index within a multisig group.
///
/// Index 0 is unrepresentable; deserialization rejects it so no wire message
/// can smuggle one in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Participant(u16);

impl Participant {
    /// Create a participant index. Returns `None` for zero.
    pub fn new(i: u16) -> Option<Participant> {
        if i == 0 {
            None
        } else {
            Some(Participant(i))
        }
    }

    /// The 1-based index
    pub fn get(&self) -> u16 {
        self.0
    }

    /// The 0-based position within an ordered participant list
    pub fn pos(&self) -> usize {
        usize::from(self.0) - 1
    }

    /// The index as a curve scalar (the Shamir evaluation point)
    pub fn scalar(&self) -> Scalar {
        Scalar::from(u64::from(self.0))
    }
}

impl From<Participant> for u16 {
    fn from(p: Participant) -> u16 {
        p.0
    }
}

impl core::fmt::Display for Participant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Participant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let i = u16::deserialize(deserializer)?;
        Participant::new(i).ok_or_else(|| serde::de::Error::custom("zero participant index"))
    }
}

/// The chain a transaction targets. Closed set; address and script
/// derivations branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl From<Network> for bitcoin::Network {
    fn from(network: Network) -> bitcoin::Network {
        match network {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_participant_is_unrepresentable() {
        assert!(Participant::new(0).is_none());
        assert_eq!(Participant::new(3).unwrap().get(), 3);
        assert_eq!(Participant::new(3).unwrap().pos(), 2);
    }

    #[test]
    fn zero_participant_rejected_on_decode() {
        let ok = bincode::serialize(&1u16).unwrap();
        assert!(bincode::deserialize::<Participant>(&ok).is_ok());
        let zero = bincode::serialize(&0u16).unwrap();
        assert!(bincode::deserialize::<Participant>(&zero).is_err());
    }
}
