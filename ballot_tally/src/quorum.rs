//! Voting period and quorum extension.
//!
//! Everything here is a pure function of the ballot, the time and the number
//! of voters. The engine stores the extension decision in
//! [`Ballot::extended`] once it has been taken, which makes later
//! evaluations independent of votes cast during the extension.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Ballot;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum BallotState {
    /// Before `vote_begin`.
    Scheduled,
    Open,
    /// Quorum was missed at `vote_end`, voting goes on until
    /// `vote_extension_end`.
    Extended,
    /// Voting is over. The count itself may still be pending.
    Tallied,
}

impl BallotState {
    pub fn accepts_votes(&self) -> bool {
        matches!(self, BallotState::Open | BallotState::Extended)
    }
}

impl Display for BallotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BallotState::Scheduled => "scheduled",
            BallotState::Open => "open",
            BallotState::Extended => "extended",
            BallotState::Tallied => "tallied",
        };
        write!(f, "{}", s)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Evaluation {
    pub state: BallotState,
    /// The extension decision. `None` as long as `vote_end` is not reached.
    pub extended: Option<bool>,
}

/// Whether a ballot must be extended, given the number of voters at
/// `vote_end`. Extension is opt-in: without `vote_extension_end` the quorum
/// is ignored.
pub fn needs_extension(ballot: &Ballot, vote_count: u64) -> bool {
    ballot.vote_extension_end.is_some() && ballot.quorum > 0 && vote_count < ballot.quorum
}

pub fn evaluate(ballot: &Ballot, now: DateTime<Utc>, vote_count: u64) -> Evaluation {
    if ballot.is_tallied {
        return Evaluation {
            state: BallotState::Tallied,
            extended: ballot.extended,
        };
    }
    if now < ballot.vote_begin {
        return Evaluation {
            state: BallotState::Scheduled,
            extended: None,
        };
    }
    if now < ballot.vote_end {
        return Evaluation {
            state: BallotState::Open,
            extended: None,
        };
    }
    let extended = ballot
        .extended
        .unwrap_or_else(|| needs_extension(ballot, vote_count));
    let state = match ballot.vote_extension_end {
        Some(ext_end) if extended && now < ext_end => BallotState::Extended,
        _ => BallotState::Tallied,
    };
    Evaluation {
        state,
        extended: Some(extended),
    }
}
