//! Run a simulated election against the local Benaloh backend
use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::{rngs::OsRng, seq::SliceRandom, Rng};
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use encrypted_voting::{
    benaloh::{self, LocalVotingState},
    clock::SystemClock,
    config::{Config, ConfigError},
    kv::{self, KeyValueStore, KvError},
    VotingError,
};

#[derive(StructOpt)]
#[structopt(
    name = "encrypted-voting",
    about = "Simulate an election with encrypted ballots and asynchronous decryption."
)]
struct Options {
    /// JSON file with key sizes and request expiry. Defaults apply if absent.
    #[structopt(parse(from_os_str))]
    #[structopt(short = "c", long = "config")]
    config: Option<PathBuf>,

    #[structopt(long = "voters", default_value = "20")]
    voters: usize,

    #[structopt(long = "candidates", default_value = "Alice,Bob,Carol", use_delimiter = true)]
    candidates: Vec<String>,

    /// Deliver decryptions in random order
    #[structopt(long = "shuffle")]
    shuffle: bool,

    /// Print the event log as JSON lines
    #[structopt(long = "events")]
    events: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

#[derive(Debug)]
enum Error {
    Config(ConfigError),
    Voting(VotingError),
    Storage(KvError),
    JSON(serde_json::Error),
    Mismatch {
        candidate: String,
        expected: u64,
        revealed: Option<u64>,
    },
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Error {
        Error::Config(error)
    }
}

impl From<VotingError> for Error {
    fn from(error: VotingError) -> Error {
        Error::Voting(error)
    }
}

impl From<KvError> for Error {
    fn from(error: KvError) -> Error {
        Error::Storage(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::JSON(error)
    }
}

/// Fulfil everything the oracle has queued, optionally out of order. Stops at the first
/// rejected delivery.
fn settle(
    state: &mut LocalVotingState,
    attestor: &benaloh::oracle::Attestor,
    shuffle: bool,
) -> Result<(), Error> {
    let mut jobs = state.oracle_mut().take_jobs();
    if shuffle {
        jobs.shuffle(&mut OsRng);
    }
    for (_, outcome) in benaloh::deliver_all(state, attestor, jobs) {
        outcome?;
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    let opt = Options::from_args();

    let default_level = if opt.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &opt.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let (mut state, attestor) = benaloh::deploy(&config, SystemClock);
    info!(
        ring = state.store().ring_size(),
        voters = opt.voters,
        "election opened"
    );

    let mut expected: BTreeMap<String, u64> = BTreeMap::new();
    for _ in 0..opt.voters {
        let candidate = match opt.candidates.choose(&mut OsRng) {
            Some(candidate) => candidate.clone(),
            None => break,
        };
        let weight = OsRng.gen_range(1..=10u64);
        let encrypted_candidate = state.store_mut().encrypt_str(&candidate);
        let encrypted_weight = state.store_mut().encrypt_u64(weight)?;
        let vote_id = state.submit_encrypted_vote(encrypted_candidate, encrypted_weight);
        state.request_vote_decryption(vote_id)?;
        *expected.entry(candidate).or_insert(0) += 1;
    }
    settle(&mut state, &attestor, opt.shuffle)?;

    for candidate in expected.keys() {
        state.request_candidate_count_decryption(candidate)?;
    }
    settle(&mut state, &attestor, opt.shuffle)?;

    let mut records = KeyValueStore::new();
    for (candidate, count) in &expected {
        let revealed = state.get_revealed_count(candidate);
        if revealed.map(|revealed| revealed.count) != Some(*count) {
            return Err(Error::Mismatch {
                candidate: candidate.clone(),
                expected: *count,
                revealed: revealed.map(|revealed| revealed.count),
            });
        }
        kv::put_json(&mut records, &format!("tally:{candidate}"), &revealed)?;
        println!("{candidate}: {count}");
    }
    info!(
        votes = state.vote_count(),
        records = kv::keys(&records)?.len(),
        "every revealed count matches"
    );

    if opt.events {
        for event in state.events().all() {
            println!("{}", serde_json::to_string(event)?);
        }
    }

    Ok(())
}
