// ********* Input data structures ***********

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type BallotId = u64;
pub type AssemblyId = u64;
pub type PersonaId = u64;

/// Reserved moniker of the "against all" pseudo-candidate.
pub const BAR_MONIKER: &str = "_bar_";

/// One vote to be decided within an assembly.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub id: BallotId,
    pub assembly_id: AssemblyId,
    pub title: String,
    pub description: Option<String>,
    pub vote_begin: DateTime<Utc>,
    pub vote_end: DateTime<Utc>,
    /// End of the extension period. Without it the quorum is ignored.
    pub vote_extension_end: Option<DateTime<Utc>>,
    /// The extension decision, recorded the first time the ballot is
    /// looked at after `vote_end`. `None` before that.
    pub extended: Option<bool>,
    pub quorum: u64,
    pub use_bar: bool,
    /// Number of selectable choices of a classical ballot. `None` or zero
    /// means a preferential ballot.
    pub votes: Option<u32>,
    pub is_tallied: bool,
}

impl Ballot {
    pub fn mode(&self) -> BallotMode {
        BallotMode::from_votes(self.votes)
    }
}

/// How voters express themselves on a ballot.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum BallotMode {
    /// Full ranking of all the candidates.
    Preferential,
    /// Pick up to this many candidates.
    Classical(u32),
}

impl BallotMode {
    pub fn from_votes(votes: Option<u32>) -> BallotMode {
        match votes {
            Some(n) if n > 0 => BallotMode::Classical(n),
            _ => BallotMode::Preferential,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub ballot_id: BallotId,
    /// Short ballot-unique token used in preference strings.
    pub moniker: String,
    pub description: String,
}

/// A stored vote. It does not reference the voter: only the holder of the
/// attendee secret can recompute `hash` and recognise it.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct StoredVote {
    pub ballot_id: BallotId,
    pub vote: String,
    pub salt: String,
    pub hash: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoterRegisterEntry {
    pub persona_id: PersonaId,
    pub ballot_id: BallotId,
    pub has_voted: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AttendeeSecret {
    pub persona_id: PersonaId,
    pub assembly_id: AssemblyId,
    pub secret: String,
}

/// The identity presented by somebody casting a vote.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Voter {
    pub persona_id: PersonaId,
    pub secret: String,
}

/// Handed back to the voter after a vote was accepted.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub ballot_id: BallotId,
    /// The vote as stored, in normalized form.
    pub vote: String,
    pub salt: String,
    pub hash: String,
    /// True if this vote superseded an earlier one of the same voter.
    pub replaced: bool,
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub enum Outcome {
    /// The real candidates of the top rank group.
    Winners(Vec<String>),
    /// The bar is ranked alone above every candidate.
    Rejected,
}

/// Number of voters strictly preferring `pro` over `contra`.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseSupport {
    pub pro: String,
    pub contra: String,
    pub support: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TallyReport {
    pub ballot_id: BallotId,
    /// Rank groups, best first. Candidates inside a group are tied.
    pub ranking: Vec<Vec<String>>,
    /// The ranking written in the preference grammar.
    pub condensed: String,
    pub outcome: Outcome,
    pub vote_count: u64,
    pub abstentions: u64,
    pub pairwise: Vec<PairwiseSupport>,
    /// Classical ballots only: how many voters picked each candidate.
    pub approvals: Option<Vec<(String, u64)>>,
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EngineConfig {
    pub salt_length: usize,
    pub secret_length: usize,
}

impl EngineConfig {
    pub const DEFAULT: EngineConfig = EngineConfig {
        salt_length: 12,
        secret_length: 12,
    };
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::DEFAULT
    }
}
