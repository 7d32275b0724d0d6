//! A reference backend built on the Benaloh cryptosystem: the ciphertext store, a local
//! decryption oracle and the attestations it signs.
pub mod arithmetics;
pub mod keys;
pub mod oracle;
pub mod store;

use tracing::warn;

use self::{
    oracle::{AttestationVerifier, Attestor, DecryptionJob, LocalOracle},
    store::BenalohStore,
};
use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    oracle::RequestId,
    voting::VotingState,
    Result,
};

pub type LocalVotingState<C = SystemClock> =
    VotingState<BenalohStore, LocalOracle, AttestationVerifier, C>;

/// Generate keys and an attestation key, and wire them into a fresh voting state. The attestor
/// stays with the caller, who plays the part of the decryption service.
pub fn deploy<C: Clock>(config: &Config, clock: C) -> (LocalVotingState<C>, Attestor) {
    let attestor = Attestor::generate();
    let state = VotingState::new(
        BenalohStore::generate(config),
        LocalOracle::new(),
        attestor.verifier(),
        clock,
        config,
    );
    return (state, attestor);
}

/// Fulfil the jobs in the given order and feed each delivery back through its callback
pub fn deliver_all<C: Clock>(
    state: &mut LocalVotingState<C>,
    attestor: &Attestor,
    jobs: Vec<DecryptionJob>,
) -> Vec<(RequestId, Result<()>)> {
    return jobs
        .into_iter()
        .map(|job| {
            let outcome = match attestor.fulfil(state.store(), &job) {
                Ok(delivery) => state.dispatch(
                    delivery.request_id,
                    delivery.callback,
                    &delivery.cleartext,
                    &delivery.proof,
                ),
                Err(e) => Err(e),
            };
            if let Err(e) = &outcome {
                warn!(request_id = %job.request_id, error = %e, "delivery rejected");
            }
            (job.request_id, outcome)
        })
        .collect();
}
