//! Transaction construction and sign-config validation
//!
//! A [`SignConfig`] describes one spend: the coins consumed, the payments
//! made, an optional change address, and a fee rate. Construction and
//! decoding run the full validation pipeline — structural checks first,
//! then per-payment dust checks, then the funds and size checks that
//! require summation — so a `SignConfig` in hand is always signable.

use bitcoin::{
    absolute::LockTime,
    address::NetworkUnchecked,
    hashes::{sha256d, Hash},
    sighash::{Prevouts, SighashCache},
    transaction::Version,
    Address, Amount, OutPoint, ScriptBuf, Sequence, TapSighashType, Transaction, TxIn, TxOut,
    Txid, Witness,
};
use serde::{Deserialize, Serialize};

use crate::{codec, error::SignError, types::Network};

/// Consensus standardness cap, in weight units
const MAX_TX_WEIGHT: u64 = 400_000;

/// One spendable coin, as seen by every participant
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PortableOutput {
    hash: [u8; 32],
    vout: u32,
    value: u64,
    script_pubkey: Vec<u8>,
}

impl PortableOutput {
    pub fn new(hash: [u8; 32], vout: u32, value: u64, script_pubkey: Vec<u8>) -> PortableOutput {
        PortableOutput { hash, vout, value, script_pubkey }
    }

    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }
    pub fn vout(&self) -> u32 {
        self.vout
    }
    pub fn value(&self) -> u64 {
        self.value
    }
    pub fn script_pubkey(&self) -> &[u8] {
        &self.script_pubkey
    }

    fn outpoint(&self) -> OutPoint {
        OutPoint::new(Txid::from_raw_hash(sha256d::Hash::from_byte_array(self.hash)), self.vout)
    }

    fn prevout(&self) -> TxOut {
        TxOut {
            value: Amount::from_sat(self.value),
            script_pubkey: ScriptBuf::from_bytes(self.script_pubkey.clone()),
        }
    }
}

/// A validated description of one transaction to sign
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SignConfig {
    network: Network,
    inputs: Vec<PortableOutput>,
    payments: Vec<(String, u64)>,
    change: String,
    fee_per_weight: u64,
}

impl SignConfig {
    pub fn network(&self) -> Network {
        self.network
    }
    pub fn inputs(&self) -> &[PortableOutput] {
        &self.inputs
    }
    pub fn payments(&self) -> &[(String, u64)] {
        &self.payments
    }
    /// The change address, empty if none
    pub fn change(&self) -> &str {
        &self.change
    }
    pub fn fee_per_weight(&self) -> u64 {
        self.fee_per_weight
    }

    /// Canonical bytes, identical at every participant
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }
}

/// Build a sign config, validating it end to end
pub fn new_sign_config(
    network: Network,
    inputs: &[PortableOutput],
    payments: &[(impl AsRef<str>, u64)],
    change: &str,
    fee_per_weight: u64,
) -> Result<SignConfig, SignError> {
    let config = SignConfig {
        network,
        inputs: inputs.to_vec(),
        payments: payments
            .iter()
            .map(|(address, amount)| (address.as_ref().to_string(), *amount))
            .collect(),
        change: change.to_string(),
        fee_per_weight,
    };
    signable_transaction(&config)?;
    Ok(config)
}

/// Decode a sign config, checking it targets the expected network and
/// re-running the full validation pipeline
pub fn decode_sign_config(network: Network, bytes: &[u8]) -> Result<SignConfig, SignError> {
    let config: SignConfig = codec::decode(bytes).ok_or(SignError::InvalidEncoding)?;
    if config.network != network {
        Err(SignError::InvalidNetwork)?;
    }
    signable_transaction(&config)?;
    Ok(config)
}

/// The unsigned transaction a config resolves to, with the prevouts needed
/// for taproot sighashing
#[derive(Clone, Debug)]
pub(crate) struct SignableTransaction {
    pub tx: Transaction,
    pub prevouts: Vec<TxOut>,
}

impl SignableTransaction {
    /// Taproot key-spend sighashes, one per input
    pub fn sighashes(&self) -> Result<Vec<[u8; 32]>, SignError> {
        let mut cache = SighashCache::new(&self.tx);
        (0..self.tx.input.len())
            .map(|i| {
                cache
                    .taproot_key_spend_signature_hash(
                        i,
                        &Prevouts::All(&self.prevouts),
                        TapSighashType::Default,
                    )
                    .map(|sighash| sighash.to_byte_array())
                    .map_err(|_| SignError::Internal)
            })
            .collect()
    }
}

fn parse_address(address: &str, network: Network) -> Result<Address, SignError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|_| SignError::InvalidAddress)?
        .require_network(bitcoin::Network::from(network))
        .map_err(|_| SignError::InvalidNetwork)
}

fn assemble(inputs: &[TxIn], outputs: &[TxOut]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs.to_vec(),
        output: outputs.to_vec(),
    }
}

/// Weight of the transaction once each input carries a 64-byte key-spend
/// signature witness
fn signed_weight(inputs: &[TxIn], outputs: &[TxOut]) -> u64 {
    let mut tx = assemble(inputs, outputs);
    for input in &mut tx.input {
        let mut witness = Witness::new();
        witness.push([0u8; 64]);
        input.witness = witness;
    }
    tx.weight().to_wu()
}

/// Resolve a config into its unsigned transaction, enforcing every
/// invariant from the data model
pub(crate) fn signable_transaction(config: &SignConfig) -> Result<SignableTransaction, SignError> {
    if config.inputs.is_empty() {
        Err(SignError::NoInputs)?;
    }
    if config.payments.is_empty() && config.change.is_empty() {
        Err(SignError::NoOutputs)?;
    }

    let inputs: Vec<TxIn> = config
        .inputs
        .iter()
        .map(|input| TxIn {
            previous_output: input.outpoint(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        })
        .collect();
    let prevouts: Vec<TxOut> = config.inputs.iter().map(PortableOutput::prevout).collect();

    let mut payment_sum: u64 = 0;
    let mut outputs = Vec::with_capacity(config.payments.len() + 1);
    for (address, amount) in &config.payments {
        let script_pubkey = parse_address(address, config.network)?.script_pubkey();
        if *amount < script_pubkey.minimal_non_dust().to_sat() {
            Err(SignError::Dust)?;
        }
        payment_sum = payment_sum.checked_add(*amount).ok_or(SignError::InvalidOutput)?;
        outputs.push(TxOut { value: Amount::from_sat(*amount), script_pubkey });
    }

    let mut input_sum: u64 = 0;
    for input in &config.inputs {
        input_sum = input_sum.checked_add(input.value).ok_or(SignError::InvalidOutput)?;
    }

    let fee_for = |outputs: &[TxOut]| -> Result<u64, SignError> {
        config
            .fee_per_weight
            .checked_mul(signed_weight(&inputs, outputs))
            .ok_or(SignError::NotEnoughFunds)
    };

    // Try to pay change; fold it into the fee when it would be dust
    let mut funded = false;
    if !config.change.is_empty() {
        let change_script = parse_address(&config.change, config.network)?.script_pubkey();
        let mut with_change = outputs.clone();
        with_change.push(TxOut { value: Amount::from_sat(0), script_pubkey: change_script.clone() });

        let fee = fee_for(&with_change)?;
        if let Some(change_value) = input_sum.checked_sub(payment_sum).and_then(|v| v.checked_sub(fee))
        {
            if change_value >= change_script.minimal_non_dust().to_sat() {
                with_change
                    .last_mut()
                    .expect("change output just pushed")
                    .value = Amount::from_sat(change_value);
                outputs = with_change;
                funded = true;
            }
        }
    }

    if !funded {
        if outputs.is_empty() {
            // Change-only spend whose change didn't survive the fee
            Err(SignError::NotEnoughFunds)?;
        }
        let fee = fee_for(&outputs)?;
        if input_sum < payment_sum.checked_add(fee).ok_or(SignError::NotEnoughFunds)? {
            Err(SignError::NotEnoughFunds)?;
        }
    }

    if signed_weight(&inputs, &outputs) > MAX_TX_WEIGHT {
        Err(SignError::TooLargeTransaction)?;
    }

    Ok(SignableTransaction { tx: assemble(&inputs, &outputs), prevouts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::key::{TweakedPublicKey, XOnlyPublicKey};

    fn test_address() -> String {
        // x coordinate of the secp256k1 generator: a known-valid x-only key
        let gx =
            hex::decode("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798").unwrap();
        let key = XOnlyPublicKey::from_slice(&gx).unwrap();
        Address::p2tr_tweaked(TweakedPublicKey::dangerous_assume_tweaked(key), bitcoin::Network::Regtest)
            .to_string()
    }

    fn coin(value: u64) -> PortableOutput {
        let script = parse_address(&test_address(), Network::Regtest).unwrap().script_pubkey();
        PortableOutput::new([1; 32], 0, value, script.to_bytes())
    }

    #[test]
    fn config_round_trip() {
        let config = new_sign_config(
            Network::Regtest,
            &[coin(100_000)],
            &[(test_address(), 30_000)],
            &test_address(),
            2,
        )
        .unwrap();
        let decoded = decode_sign_config(Network::Regtest, &config.encode()).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn network_mismatch_rejected() {
        let config = new_sign_config(
            Network::Regtest,
            &[coin(100_000)],
            &[(test_address(), 30_000)],
            "",
            2,
        )
        .unwrap();
        assert_eq!(
            decode_sign_config(Network::Mainnet, &config.encode()).unwrap_err(),
            SignError::InvalidNetwork
        );
    }

    #[test]
    fn structural_validation() {
        assert_eq!(
            new_sign_config(Network::Regtest, &[], &[(test_address(), 30_000)], "", 2).unwrap_err(),
            SignError::NoInputs
        );
        assert_eq!(
            new_sign_config(Network::Regtest, &[coin(100_000)], &[] as &[(&str, u64)], "", 2)
                .unwrap_err(),
            SignError::NoOutputs
        );
        assert_eq!(
            new_sign_config(Network::Regtest, &[coin(100_000)], &[("bogus", 30_000)], "", 2)
                .unwrap_err(),
            SignError::InvalidAddress
        );
    }

    #[test]
    fn dust_payment_rejected() {
        assert_eq!(
            new_sign_config(Network::Regtest, &[coin(100_000)], &[(test_address(), 100)], "", 2)
                .unwrap_err(),
            SignError::Dust
        );
    }

    #[test]
    fn insufficient_funds_rejected() {
        assert_eq!(
            new_sign_config(Network::Regtest, &[coin(30_000)], &[(test_address(), 30_000)], "", 2)
                .unwrap_err(),
            SignError::NotEnoughFunds
        );
    }

    #[test]
    fn change_is_paid_when_it_clears_dust() {
        let config = new_sign_config(
            Network::Regtest,
            &[coin(100_000)],
            &[(test_address(), 30_000)],
            &test_address(),
            2,
        )
        .unwrap();
        let signable = signable_transaction(&config).unwrap();
        assert_eq!(signable.tx.output.len(), 2);
        let paid: u64 = signable.tx.output.iter().map(|o| o.value.to_sat()).sum();
        assert!(paid < 100_000);
        assert!(signable.tx.output[1].value.to_sat() > 0);
    }

    #[test]
    fn dust_change_folds_into_fee() {
        // Inputs barely cover the payment, leaving sub-dust change
        let config = new_sign_config(
            Network::Regtest,
            &[coin(31_000)],
            &[(test_address(), 30_000)],
            &test_address(),
            2,
        )
        .unwrap();
        let signable = signable_transaction(&config).unwrap();
        assert_eq!(signable.tx.output.len(), 1);
    }

    #[test]
    fn sighashes_are_per_input_and_stable() {
        let config = new_sign_config(
            Network::Regtest,
            &[coin(100_000), coin(50_000)],
            &[(test_address(), 30_000)],
            &test_address(),
            2,
        )
        .unwrap();
        let signable = signable_transaction(&config).unwrap();
        let sighashes = signable.sighashes().unwrap();
        assert_eq!(sighashes.len(), 2);
        assert_ne!(sighashes[0], sighashes[1]);
        assert_eq!(sighashes, signable_transaction(&config).unwrap().sighashes().unwrap());
    }
}
