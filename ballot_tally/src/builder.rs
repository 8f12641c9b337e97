use chrono::{DateTime, Utc};
use snafu::ensure;

use crate::candidates::CandidateSet;
use crate::config::*;
use crate::error::*;

/// A builder for ballots and their candidates.
///
/// ```
/// use ballot_tally::builder::BallotBuilder;
/// use ballot_tally::TallyError;
/// use chrono::{Duration, Utc};
///
/// let begin = Utc::now();
/// let (ballot, candidates) = BallotBuilder::new(1, 1)
///     .title("Logo")?
///     .voting_period(begin, begin + Duration::days(7))?
///     .use_bar(true)?
///     .candidate("rot", "Red logo")?
///     .candidate("blau", "Blue logo")?
///     .build()?;
/// assert_eq!(candidates.len(), 2);
/// assert!(ballot.use_bar);
///
/// # Ok::<(), TallyError>(())
/// ```
pub struct BallotBuilder {
    id: BallotId,
    assembly_id: AssemblyId,
    title: String,
    description: Option<String>,
    period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    extension_end: Option<DateTime<Utc>>,
    quorum: u64,
    use_bar: bool,
    votes: Option<u32>,
    candidates: Vec<Candidate>,
}

impl BallotBuilder {
    pub fn new(id: BallotId, assembly_id: AssemblyId) -> BallotBuilder {
        BallotBuilder {
            id,
            assembly_id,
            title: String::new(),
            description: None,
            period: None,
            extension_end: None,
            quorum: 0,
            use_bar: false,
            votes: None,
            candidates: Vec::new(),
        }
    }

    pub fn title(self, title: &str) -> TallyResult<BallotBuilder> {
        Ok(BallotBuilder {
            title: title.to_string(),
            ..self
        })
    }

    pub fn description(self, description: &str) -> TallyResult<BallotBuilder> {
        Ok(BallotBuilder {
            description: Some(description.to_string()),
            ..self
        })
    }

    pub fn voting_period(
        self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TallyResult<BallotBuilder> {
        ensure!(
            begin < end,
            InvalidBallotSnafu {
                reason: "voting must begin before it ends"
            }
        );
        Ok(BallotBuilder {
            period: Some((begin, end)),
            ..self
        })
    }

    /// Extends voting until `end` if fewer than `quorum` voters have voted
    /// when the regular period is over.
    pub fn extension(self, end: DateTime<Utc>, quorum: u64) -> TallyResult<BallotBuilder> {
        Ok(BallotBuilder {
            extension_end: Some(end),
            quorum,
            ..self
        })
    }

    pub fn use_bar(self, use_bar: bool) -> TallyResult<BallotBuilder> {
        Ok(BallotBuilder { use_bar, ..self })
    }

    /// Makes this a classical ballot with up to `votes` choices.
    pub fn classical(self, votes: u32) -> TallyResult<BallotBuilder> {
        ensure!(
            votes > 0,
            InvalidBallotSnafu {
                reason: "a classical ballot needs at least one choice"
            }
        );
        Ok(BallotBuilder {
            votes: Some(votes),
            ..self
        })
    }

    pub fn candidate(mut self, moniker: &str, description: &str) -> TallyResult<BallotBuilder> {
        self.candidates.push(Candidate {
            ballot_id: self.id,
            moniker: moniker.to_string(),
            description: description.to_string(),
        });
        Ok(self)
    }

    pub fn build(self) -> TallyResult<(Ballot, Vec<Candidate>)> {
        let (vote_begin, vote_end) = match self.period {
            Some(p) => p,
            None => {
                return InvalidBallotSnafu {
                    reason: "no voting period",
                }
                .fail()
            }
        };
        let ballot = Ballot {
            id: self.id,
            assembly_id: self.assembly_id,
            title: self.title,
            description: self.description,
            vote_begin,
            vote_end,
            vote_extension_end: self.extension_end,
            extended: None,
            quorum: self.quorum,
            use_bar: self.use_bar,
            votes: self.votes,
            is_tallied: false,
        };
        check_ballot(&ballot, &self.candidates)?;
        Ok((ballot, self.candidates))
    }
}

/// Checks the invariants of a new ballot and its candidates.
///
/// The voting period must be non-empty and end before the extension, there
/// must be something to vote on, and nothing may have been decided yet.
pub fn check_ballot(ballot: &Ballot, candidates: &[Candidate]) -> TallyResult<()> {
    ensure!(
        ballot.vote_begin < ballot.vote_end,
        InvalidBallotSnafu {
            reason: "voting must begin before it ends"
        }
    );
    if let Some(ext_end) = ballot.vote_extension_end {
        ensure!(
            ballot.vote_end < ext_end,
            InvalidBallotSnafu {
                reason: "the extension must end after the regular voting period"
            }
        );
    }
    ensure!(
        !candidates.is_empty() || ballot.use_bar,
        InvalidBallotSnafu {
            reason: "no candidates"
        }
    );
    ensure!(
        ballot.extended.is_none() && !ballot.is_tallied,
        InvalidBallotSnafu {
            reason: "a new ballot cannot be extended or tallied already"
        }
    );
    CandidateSet::for_ballot(ballot, candidates)?;
    Ok(())
}
