//! In-process multi-party ceremony helpers for tests

use crate::{
    config::new_multisig_config,
    keygen::{complete_key_gen, get_secret_shares, start_key_gen, Language, SecretShare},
    keys::ThresholdKeys,
};

/// Everyone's broadcasts except participant `i`'s own
pub(crate) fn broadcasts_for(broadcasts: &[Vec<u8>], i: usize) -> Vec<Vec<u8>> {
    broadcasts
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, bytes)| bytes.clone())
        .collect()
}

/// Run a full key generation ceremony with all participants in-process,
/// returning keys ordered as `names`
pub(crate) fn run_dkg(names: &[&str], threshold: u16) -> Vec<ThresholdKeys> {
    let config = new_multisig_config("test-group", threshold, names).unwrap();

    let round_1: Vec<_> = names
        .iter()
        .map(|name| start_key_gen(config.clone(), name, Language::English).unwrap())
        .collect();
    let commitments: Vec<Vec<u8>> = round_1.iter().map(|r| r.commitments.clone()).collect();

    let round_2: Vec<_> = round_1
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            get_secret_shares(
                result.machine,
                Language::English,
                &result.seed,
                &broadcasts_for(&commitments, i),
            )
            .unwrap()
        })
        .collect();
    let sent_shares: Vec<Vec<Vec<u8>>> =
        round_2.iter().map(|(_, shares)| shares.clone()).collect();

    round_2
        .into_iter()
        .enumerate()
        .map(|(i, (machine, _))| {
            let mine: Vec<Vec<u8>> = sent_shares
                .iter()
                .flatten()
                .filter(|bytes| SecretShare::decode(bytes).unwrap().recipient.pos() == i)
                .cloned()
                .collect();
            complete_key_gen(machine, &mine).unwrap().keys
        })
        .collect()
}
