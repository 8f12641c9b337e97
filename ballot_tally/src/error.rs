use snafu::Snafu;

use crate::config::{BallotId, PersonaId};

/// Errors of the ballot engine.
///
/// The validation variants are returned by `cast_vote` before anything is
/// written. `CorruptVoteData` only ever comes out of a tally run.
#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum TallyError {
    #[snafu(display("ballot {ballot_id} is not open for voting"))]
    BallotNotOpen { ballot_id: BallotId },

    #[snafu(display("persona {persona_id} is not registered for ballot {ballot_id}"))]
    NotRegistered {
        ballot_id: BallotId,
        persona_id: PersonaId,
    },

    #[snafu(display("malformed preference string {input:?}: {reason}"))]
    MalformedPreferenceString { input: String, reason: String },

    #[snafu(display("unknown candidate {moniker:?}"))]
    UnknownCandidate { moniker: String },

    #[snafu(display("candidate {moniker:?} is missing from the preference"))]
    MissingCandidate { moniker: String },

    #[snafu(display("candidate {moniker:?} appears more than once"))]
    DuplicateCandidate { moniker: String },

    #[snafu(display("stored vote {vote:?} of ballot {ballot_id} is corrupt: {reason}"))]
    CorruptVoteData {
        ballot_id: BallotId,
        vote: String,
        reason: String,
    },

    #[snafu(display("voting on ballot {ballot_id} has not finished"))]
    VotingNotFinished { ballot_id: BallotId },

    #[snafu(display("ballot {ballot_id} is already tallied"))]
    AlreadyTallied { ballot_id: BallotId },

    #[snafu(display("ballot {ballot_id} has not been tallied yet"))]
    NotTallied { ballot_id: BallotId },

    #[snafu(display("unknown ballot {ballot_id}"))]
    UnknownBallot { ballot_id: BallotId },

    #[snafu(display("invalid ballot: {reason}"))]
    InvalidBallot { reason: String },

    #[snafu(display("invalid candidate {moniker:?}: {reason}"))]
    InvalidCandidate { moniker: String, reason: String },
}

/// How a caller should react to an error.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    /// Rejected input. The voter may correct it and resubmit.
    Validation,
    /// The request conflicts with the ballot's state. Retrying does not help.
    Conflict,
    /// Broken data or setup. Needs an administrator.
    Fatal,
}

impl TallyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TallyError::MalformedPreferenceString { .. }
            | TallyError::UnknownCandidate { .. }
            | TallyError::MissingCandidate { .. }
            | TallyError::DuplicateCandidate { .. } => ErrorKind::Validation,
            TallyError::BallotNotOpen { .. }
            | TallyError::NotRegistered { .. }
            | TallyError::VotingNotFinished { .. }
            | TallyError::AlreadyTallied { .. }
            | TallyError::NotTallied { .. }
            | TallyError::UnknownBallot { .. } => ErrorKind::Conflict,
            TallyError::CorruptVoteData { .. }
            | TallyError::InvalidBallot { .. }
            | TallyError::InvalidCandidate { .. } => ErrorKind::Fatal,
        }
    }
}

pub type TallyResult<T> = Result<T, TallyError>;
