//! The result file published after a ballot is tallied.
//!
//! It carries everything needed to recount the ballot offline: the candidate
//! set and every stored vote with its salt and hash. Vote rows are sorted by
//! hash so that their order says nothing about who voted when.

use serde::{Deserialize, Serialize};

use crate::candidates::CandidateSet;
use crate::config::*;
use crate::crypto;
use crate::error::*;
use crate::tally;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultCandidate {
    pub moniker: String,
    pub description: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultVote {
    pub vote: String,
    pub salt: String,
    pub hash: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotResultFile {
    #[serde(rename = "assemblyId")]
    pub assembly_id: AssemblyId,
    #[serde(rename = "ballotId")]
    pub ballot_id: BallotId,
    pub title: String,
    pub candidates: Vec<ResultCandidate>,
    #[serde(rename = "useBar")]
    pub use_bar: bool,
    #[serde(rename = "votesAllowed")]
    pub votes_allowed: Option<u32>,
    /// The condensed ranking, as published.
    pub result: String,
    #[serde(rename = "voteCount")]
    pub vote_count: u64,
    pub votes: Vec<ResultVote>,
}

impl BallotResultFile {
    pub fn new(
        ballot: &Ballot,
        candidates: &[Candidate],
        report: &TallyReport,
        votes: Vec<StoredVote>,
    ) -> BallotResultFile {
        let mut votes: Vec<ResultVote> = votes
            .into_iter()
            .map(|v| ResultVote {
                vote: v.vote,
                salt: v.salt,
                hash: v.hash,
            })
            .collect();
        votes.sort_by(|a, b| a.hash.cmp(&b.hash));
        BallotResultFile {
            assembly_id: ballot.assembly_id,
            ballot_id: ballot.id,
            title: ballot.title.clone(),
            candidates: candidates
                .iter()
                .map(|c| ResultCandidate {
                    moniker: c.moniker.clone(),
                    description: c.description.clone(),
                })
                .collect(),
            use_bar: ballot.use_bar,
            votes_allowed: ballot.votes,
            result: report.condensed.clone(),
            vote_count: report.vote_count,
            votes,
        }
    }

    pub fn candidate_set(&self) -> TallyResult<CandidateSet> {
        let monikers: Vec<String> = self.candidates.iter().map(|c| c.moniker.clone()).collect();
        CandidateSet::from_monikers(
            self.ballot_id,
            &monikers,
            self.use_bar,
            BallotMode::from_votes(self.votes_allowed),
        )
    }

    /// Counts the published votes again.
    pub fn recount(&self) -> TallyResult<TallyReport> {
        let set = self.candidate_set()?;
        let votes: Vec<String> = self.votes.iter().map(|v| v.vote.clone()).collect();
        tally::count_votes(&set, &votes)
    }

    /// The published vote whose hash matches `secret`.
    pub fn find_vote(&self, secret: &str) -> Option<&ResultVote> {
        self.votes
            .iter()
            .find(|v| crypto::matches_hash(secret, &v.vote, &v.salt, &v.hash))
    }
}
