//! Persistence of ballots, voter registers, secrets and votes.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use snafu::OptionExt;

use crate::config::*;
use crate::error::*;

/// The storage the engine runs on.
///
/// Implementations must make every method atomic on its own. The engine
/// serialises the calls touching one ballot; [`VoteStore::replace_vote`] is
/// the only write of a vote and must apply all of its effects or none.
pub trait VoteStore: Send + Sync {
    fn ballot(&self, ballot_id: BallotId) -> TallyResult<Ballot>;
    fn ballots_of_assembly(&self, assembly_id: AssemblyId) -> Vec<Ballot>;
    fn insert_ballot(&self, ballot: Ballot, candidates: Vec<Candidate>) -> TallyResult<()>;
    /// Overwrites the ballot's mutable fields (`extended`, `is_tallied`).
    fn update_ballot(&self, ballot: &Ballot) -> TallyResult<()>;
    fn candidates(&self, ballot_id: BallotId) -> TallyResult<Vec<Candidate>>;

    fn insert_attendee(&self, secret: AttendeeSecret);
    fn attendees(&self, assembly_id: AssemblyId) -> Vec<PersonaId>;
    fn attendee_secret(&self, assembly_id: AssemblyId, persona_id: PersonaId) -> Option<String>;

    /// Adds a register entry unless one exists already.
    fn insert_register_entry(&self, ballot_id: BallotId, persona_id: PersonaId);
    fn register_entry(&self, ballot_id: BallotId, persona_id: PersonaId)
        -> Option<VoterRegisterEntry>;
    /// Number of register entries with `has_voted`.
    fn voted_count(&self, ballot_id: BallotId) -> u64;

    fn votes(&self, ballot_id: BallotId) -> Vec<StoredVote>;
    /// Removes the vote with hash `previous` (if given), inserts `vote` and
    /// flags the voter as having voted, all at once.
    fn replace_vote(
        &self,
        persona_id: PersonaId,
        previous: Option<&str>,
        vote: StoredVote,
    ) -> TallyResult<()>;

    fn store_result(&self, report: TallyReport);
    fn result(&self, ballot_id: BallotId) -> Option<TallyReport>;
}

#[derive(Default, Debug)]
struct Tables {
    ballots: HashMap<BallotId, Ballot>,
    candidates: HashMap<BallotId, Vec<Candidate>>,
    secrets: HashMap<(AssemblyId, PersonaId), String>,
    register: HashMap<(BallotId, PersonaId), VoterRegisterEntry>,
    votes: HashMap<BallotId, Vec<StoredVote>>,
    results: HashMap<BallotId, TallyReport>,
}

/// A [`VoteStore`] in memory, for tests and for embedding.
#[derive(Default, Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VoteStore for MemoryStore {
    fn ballot(&self, ballot_id: BallotId) -> TallyResult<Ballot> {
        self.read()
            .ballots
            .get(&ballot_id)
            .cloned()
            .context(UnknownBallotSnafu { ballot_id })
    }

    fn ballots_of_assembly(&self, assembly_id: AssemblyId) -> Vec<Ballot> {
        let mut res: Vec<Ballot> = self
            .read()
            .ballots
            .values()
            .filter(|b| b.assembly_id == assembly_id)
            .cloned()
            .collect();
        res.sort_by_key(|b| b.id);
        res
    }

    fn insert_ballot(&self, ballot: Ballot, candidates: Vec<Candidate>) -> TallyResult<()> {
        let mut t = self.write();
        if t.ballots.contains_key(&ballot.id) {
            return InvalidBallotSnafu {
                reason: format!("ballot {} exists already", ballot.id),
            }
            .fail();
        }
        t.candidates.insert(ballot.id, candidates);
        t.votes.insert(ballot.id, Vec::new());
        t.ballots.insert(ballot.id, ballot);
        Ok(())
    }

    fn update_ballot(&self, ballot: &Ballot) -> TallyResult<()> {
        let mut t = self.write();
        let stored = t
            .ballots
            .get_mut(&ballot.id)
            .context(UnknownBallotSnafu {
                ballot_id: ballot.id,
            })?;
        stored.extended = ballot.extended;
        stored.is_tallied = ballot.is_tallied;
        Ok(())
    }

    fn candidates(&self, ballot_id: BallotId) -> TallyResult<Vec<Candidate>> {
        self.read()
            .candidates
            .get(&ballot_id)
            .cloned()
            .context(UnknownBallotSnafu { ballot_id })
    }

    fn insert_attendee(&self, secret: AttendeeSecret) {
        self.write()
            .secrets
            .insert((secret.assembly_id, secret.persona_id), secret.secret);
    }

    fn attendees(&self, assembly_id: AssemblyId) -> Vec<PersonaId> {
        let mut res: Vec<PersonaId> = self
            .read()
            .secrets
            .keys()
            .filter(|(aid, _)| *aid == assembly_id)
            .map(|(_, pid)| *pid)
            .collect();
        res.sort_unstable();
        res
    }

    fn attendee_secret(&self, assembly_id: AssemblyId, persona_id: PersonaId) -> Option<String> {
        self.read().secrets.get(&(assembly_id, persona_id)).cloned()
    }

    fn insert_register_entry(&self, ballot_id: BallotId, persona_id: PersonaId) {
        self.write()
            .register
            .entry((ballot_id, persona_id))
            .or_insert(VoterRegisterEntry {
                persona_id,
                ballot_id,
                has_voted: false,
            });
    }

    fn register_entry(
        &self,
        ballot_id: BallotId,
        persona_id: PersonaId,
    ) -> Option<VoterRegisterEntry> {
        self.read().register.get(&(ballot_id, persona_id)).cloned()
    }

    fn voted_count(&self, ballot_id: BallotId) -> u64 {
        self.read()
            .register
            .values()
            .filter(|e| e.ballot_id == ballot_id && e.has_voted)
            .count() as u64
    }

    fn votes(&self, ballot_id: BallotId) -> Vec<StoredVote> {
        self.read()
            .votes
            .get(&ballot_id)
            .cloned()
            .unwrap_or_default()
    }

    fn replace_vote(
        &self,
        persona_id: PersonaId,
        previous: Option<&str>,
        vote: StoredVote,
    ) -> TallyResult<()> {
        let ballot_id = vote.ballot_id;
        let mut t = self.write();
        let entry = t
            .register
            .get_mut(&(ballot_id, persona_id))
            .context(NotRegisteredSnafu {
                ballot_id,
                persona_id,
            })?;
        entry.has_voted = true;
        let rows = t.votes.entry(ballot_id).or_default();
        if let Some(hash) = previous {
            rows.retain(|v| v.hash != hash);
        }
        debug!("replace_vote: ballot {}: storing {}", ballot_id, vote.hash);
        rows.push(vote);
        Ok(())
    }

    fn store_result(&self, report: TallyReport) {
        self.write().results.insert(report.ballot_id, report);
    }

    fn result(&self, ballot_id: BallotId) -> Option<TallyReport> {
        self.read().results.get(&ballot_id).cloned()
    }
}
