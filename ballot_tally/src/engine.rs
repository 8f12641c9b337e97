//! The ballot engine: voter registration, vote casting, state transitions and
//! tallying on top of a [`VoteStore`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use snafu::{ensure, OptionExt};

use crate::builder::check_ballot;
use crate::candidates::CandidateSet;
use crate::config::*;
use crate::crypto;
use crate::error::*;
use crate::preference::{Preference, MAGIC_ABSTAIN};
use crate::quorum::{self, BallotState};
use crate::result_file::BallotResultFile;
use crate::store::VoteStore;
use crate::tally;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Entry point of the library for a running assembly.
///
/// All operations touching one ballot run under that ballot's lock, so a
/// vote is either in the tally snapshot or rejected. Creating ballots and
/// registering attendees also hold the assembly's lock, taken before any
/// ballot lock.
pub struct TallyEngine<S: VoteStore> {
    store: S,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    locks: Mutex<HashMap<BallotId, Arc<Mutex<()>>>>,
    assembly_locks: Mutex<HashMap<AssemblyId, Arc<Mutex<()>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn keyed_lock(locks: &Mutex<HashMap<u64, Arc<Mutex<()>>>>, key: u64) -> Arc<Mutex<()>> {
    lock(locks)
        .entry(key)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

impl<S: VoteStore> TallyEngine<S> {
    pub fn new(store: S) -> TallyEngine<S> {
        TallyEngine {
            store,
            clock: Box::new(SystemClock),
            config: EngineConfig::DEFAULT,
            locks: Mutex::new(HashMap::new()),
            assembly_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(self, clock: Box<dyn Clock>) -> TallyEngine<S> {
        TallyEngine { clock, ..self }
    }

    pub fn with_config(self, config: EngineConfig) -> TallyEngine<S> {
        TallyEngine { config, ..self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn ballot_lock(&self, ballot_id: BallotId) -> Arc<Mutex<()>> {
        keyed_lock(&self.locks, ballot_id)
    }

    fn assembly_lock(&self, assembly_id: AssemblyId) -> Arc<Mutex<()>> {
        keyed_lock(&self.assembly_locks, assembly_id)
    }

    /// Stores a new ballot and registers every current attendee of its
    /// assembly as a voter.
    pub fn create_ballot(&self, ballot: Ballot, candidates: Vec<Candidate>) -> TallyResult<()> {
        check_ballot(&ballot, &candidates)?;
        let ballot_id = ballot.id;
        let assembly_id = ballot.assembly_id;
        let assembly_lock = self.assembly_lock(assembly_id);
        let _guard = lock(&assembly_lock);
        self.store.insert_ballot(ballot, candidates)?;
        for persona_id in self.store.attendees(assembly_id) {
            self.store.insert_register_entry(ballot_id, persona_id);
        }
        info!("create_ballot: ballot {} in assembly {}", ballot_id, assembly_id);
        Ok(())
    }

    /// Makes `persona_id` an attendee of the assembly and returns their
    /// secret. Calling it again returns the existing secret.
    ///
    /// The attendee is registered for every ballot still accepting votes.
    pub fn register_attendee(
        &self,
        assembly_id: AssemblyId,
        persona_id: PersonaId,
    ) -> TallyResult<String> {
        let assembly_lock = self.assembly_lock(assembly_id);
        let _assembly_guard = lock(&assembly_lock);
        let secret = match self.store.attendee_secret(assembly_id, persona_id) {
            Some(s) => s,
            None => {
                let secret = crypto::generate_secret(self.config.secret_length);
                self.store.insert_attendee(AttendeeSecret {
                    persona_id,
                    assembly_id,
                    secret: secret.clone(),
                });
                secret
            }
        };
        for ballot in self.store.ballots_of_assembly(assembly_id) {
            let ballot_lock = self.ballot_lock(ballot.id);
            let _guard = lock(&ballot_lock);
            let state = self.refresh_state(ballot.id)?;
            if state != BallotState::Tallied {
                self.store.insert_register_entry(ballot.id, persona_id);
            }
        }
        Ok(secret)
    }

    /// Re-evaluates the state of a ballot and records the extension decision
    /// the first time `vote_end` has passed. The caller holds the ballot lock.
    fn refresh_state(&self, ballot_id: BallotId) -> TallyResult<BallotState> {
        let mut ballot = self.store.ballot(ballot_id)?;
        let vote_count = self.store.voted_count(ballot_id);
        let now = self.clock.now();
        let eval = quorum::evaluate(&ballot, now, vote_count);
        if eval.extended != ballot.extended && eval.extended.is_some() {
            if eval.extended == Some(true) {
                info!(
                    "Ballot {}: quorum {} missed with {} voters, extended",
                    ballot_id, ballot.quorum, vote_count
                );
            } else {
                info!("Ballot {}: voting closed with {} voters", ballot_id, vote_count);
            }
            ballot.extended = eval.extended;
            self.store.update_ballot(&ballot)?;
        }
        debug!("refresh_state: ballot {} at {}: {}", ballot_id, now, eval.state);
        Ok(eval.state)
    }

    pub fn current_state(&self, ballot_id: BallotId) -> TallyResult<BallotState> {
        let ballot_lock = self.ballot_lock(ballot_id);
        let _guard = lock(&ballot_lock);
        self.refresh_state(ballot_id)
    }

    /// Casts or replaces the vote of `voter`.
    ///
    /// `preference` is a preference string over the ballot's tokens, or
    /// [`MAGIC_ABSTAIN`]. A previous vote of the same voter is replaced.
    pub fn cast_vote(
        &self,
        ballot_id: BallotId,
        voter: &Voter,
        preference: &str,
    ) -> TallyResult<VoteReceipt> {
        let ballot_lock = self.ballot_lock(ballot_id);
        let _guard = lock(&ballot_lock);

        let ballot = self.store.ballot(ballot_id)?;
        ensure!(!ballot.is_tallied, AlreadyTalliedSnafu { ballot_id });
        let state = self.refresh_state(ballot_id)?;
        ensure!(state.accepts_votes(), BallotNotOpenSnafu { ballot_id });

        let persona_id = voter.persona_id;
        self.store
            .register_entry(ballot_id, persona_id)
            .context(NotRegisteredSnafu {
                ballot_id,
                persona_id,
            })?;
        let secret = self
            .store
            .attendee_secret(ballot.assembly_id, persona_id)
            .context(NotRegisteredSnafu {
                ballot_id,
                persona_id,
            })?;
        ensure!(
            secret == voter.secret,
            NotRegisteredSnafu {
                ballot_id,
                persona_id,
            }
        );

        let set = CandidateSet::for_ballot(&ballot, &self.store.candidates(ballot_id)?)?;
        let pref = if preference == MAGIC_ABSTAIN {
            Preference::abstain(set.tokens())
        } else {
            set.validate(preference).map_err(|e| {
                warn!("cast_vote: ballot {}: rejected {:?}: {}", ballot_id, preference, e);
                e
            })?
        };
        let vote = pref.to_string();

        let previous = crypto::find_own_vote(&self.store.votes(ballot_id), &secret)
            .map(|v| v.hash.clone());
        let salt = crypto::generate_salt(self.config.salt_length);
        let hash = crypto::vote_hash(&secret, &vote, &salt);
        self.store.replace_vote(
            persona_id,
            previous.as_deref(),
            StoredVote {
                ballot_id,
                vote: vote.clone(),
                salt: salt.clone(),
                hash: hash.clone(),
            },
        )?;
        info!(
            "Ballot {}: vote {} ({})",
            ballot_id,
            if previous.is_some() { "replaced" } else { "cast" },
            hash
        );
        Ok(VoteReceipt {
            ballot_id,
            vote,
            salt,
            hash,
            replaced: previous.is_some(),
        })
    }

    /// The vote cast with `secret`, if any. Read only.
    pub fn verify_my_vote(&self, ballot_id: BallotId, secret: &str) -> TallyResult<Option<String>> {
        self.store.ballot(ballot_id)?;
        let votes = self.store.votes(ballot_id);
        Ok(crypto::find_own_vote(&votes, secret).map(|v| v.vote.clone()))
    }

    pub fn has_voted(&self, ballot_id: BallotId, persona_id: PersonaId) -> TallyResult<bool> {
        self.store.ballot(ballot_id)?;
        Ok(self
            .store
            .register_entry(ballot_id, persona_id)
            .map(|e| e.has_voted)
            .unwrap_or(false))
    }

    pub fn vote_count(&self, ballot_id: BallotId) -> TallyResult<u64> {
        self.store.ballot(ballot_id)?;
        Ok(self.store.voted_count(ballot_id))
    }

    /// Closes the ballot and counts it.
    ///
    /// The ballot is only marked as tallied once the count succeeded. A
    /// corrupt vote aborts with `CorruptVoteData` and leaves it untouched.
    pub fn tally(&self, ballot_id: BallotId) -> TallyResult<TallyReport> {
        let ballot_lock = self.ballot_lock(ballot_id);
        let _guard = lock(&ballot_lock);

        let ballot = self.store.ballot(ballot_id)?;
        ensure!(!ballot.is_tallied, AlreadyTalliedSnafu { ballot_id });
        let state = self.refresh_state(ballot_id)?;
        ensure!(
            state == BallotState::Tallied,
            VotingNotFinishedSnafu { ballot_id }
        );

        let candidates = self.store.candidates(ballot_id)?;
        let votes: Vec<String> = self
            .store
            .votes(ballot_id)
            .into_iter()
            .map(|v| v.vote)
            .collect();
        let report = tally::tally(&ballot, &candidates, &votes)?;

        let mut ballot = self.store.ballot(ballot_id)?;
        ballot.is_tallied = true;
        self.store.update_ballot(&ballot)?;
        self.store.store_result(report.clone());
        info!("Ballot {} tallied: {:?}", ballot_id, report.outcome);
        Ok(report)
    }

    pub fn result(&self, ballot_id: BallotId) -> TallyResult<TallyReport> {
        self.store.ballot(ballot_id)?;
        self.store
            .result(ballot_id)
            .context(NotTalliedSnafu { ballot_id })
    }

    /// The publishable result of a tallied ballot.
    pub fn result_file(&self, ballot_id: BallotId) -> TallyResult<BallotResultFile> {
        let report = self.result(ballot_id)?;
        let ballot = self.store.ballot(ballot_id)?;
        let candidates = self.store.candidates(ballot_id)?;
        let votes = self.store.votes(ballot_id);
        Ok(BallotResultFile::new(&ballot, &candidates, &report, votes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    /// A clock the test moves by hand.
    struct TestClock(Mutex<DateTime<Utc>>);

    impl Clock for Arc<TestClock> {
        fn now(&self) -> DateTime<Utc> {
            *lock(&self.0)
        }
    }

    impl TestClock {
        fn set(&self, t: DateTime<Utc>) {
            *lock(&self.0) = t;
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 18, 0, 0).unwrap()
    }

    fn ballot(id: BallotId, quorum: u64, use_bar: bool, votes: Option<u32>) -> Ballot {
        Ballot {
            id,
            assembly_id: 1,
            title: format!("Abstimmung {}", id),
            description: None,
            vote_begin: start() + Duration::hours(1),
            vote_end: start() + Duration::days(7),
            vote_extension_end: Some(start() + Duration::days(14)),
            extended: None,
            quorum,
            use_bar,
            votes,
            is_tallied: false,
        }
    }

    fn candidates(ballot_id: BallotId, monikers: &[&str]) -> Vec<Candidate> {
        monikers
            .iter()
            .map(|m| Candidate {
                ballot_id,
                moniker: m.to_string(),
                description: m.to_string(),
            })
            .collect()
    }

    fn setup(
        quorum: u64,
        use_bar: bool,
        monikers: &[&str],
    ) -> (TallyEngine<MemoryStore>, Arc<TestClock>) {
        let clock = Arc::new(TestClock(Mutex::new(start())));
        let engine = TallyEngine::new(MemoryStore::new()).with_clock(Box::new(clock.clone()));
        engine
            .create_ballot(ballot(1, quorum, use_bar, None), candidates(1, monikers))
            .unwrap();
        (engine, clock)
    }

    fn voter(engine: &TallyEngine<MemoryStore>, persona_id: PersonaId) -> Voter {
        let secret = engine.register_attendee(1, persona_id).unwrap();
        Voter { persona_id, secret }
    }

    #[test]
    fn vote_before_begin_is_refused() {
        let (engine, _clock) = setup(0, false, &["A", "B"]);
        let v = voter(&engine, 1);
        assert_eq!(engine.current_state(1).unwrap(), BallotState::Scheduled);
        assert_eq!(
            engine.cast_vote(1, &v, "A>B"),
            Err(TallyError::BallotNotOpen { ballot_id: 1 })
        );
    }

    #[test]
    fn revote_replaces() {
        let (engine, clock) = setup(0, false, &["A", "B"]);
        let v = voter(&engine, 1);
        clock.set(start() + Duration::days(1));
        let first = engine.cast_vote(1, &v, "A>B").unwrap();
        assert!(!first.replaced);
        let second = engine.cast_vote(1, &v, "B>A").unwrap();
        assert!(second.replaced);
        assert_eq!(engine.store().votes(1).len(), 1);
        assert_eq!(engine.verify_my_vote(1, &v.secret).unwrap(), Some("B>A".to_string()));
        assert_eq!(engine.vote_count(1).unwrap(), 1);

        clock.set(start() + Duration::days(8));
        let r = engine.tally(1).unwrap();
        assert_eq!(r.vote_count, 1);
        assert_eq!(r.condensed, "B>A");
    }

    #[test]
    fn secrets_are_checked() {
        let (engine, clock) = setup(0, false, &["A", "B"]);
        let v = voter(&engine, 1);
        clock.set(start() + Duration::days(1));
        let impostor = Voter {
            persona_id: 1,
            secret: "wrong".to_string(),
        };
        assert!(matches!(
            engine.cast_vote(1, &impostor, "A>B"),
            Err(TallyError::NotRegistered { .. })
        ));
        let stranger = Voter {
            persona_id: 99,
            secret: v.secret.clone(),
        };
        assert!(matches!(
            engine.cast_vote(1, &stranger, "A>B"),
            Err(TallyError::NotRegistered { .. })
        ));
        assert_eq!(engine.vote_count(1).unwrap(), 0);
    }

    #[test]
    fn rejected_vote_changes_nothing() {
        let (engine, clock) = setup(0, true, &["A", "B"]);
        let v = voter(&engine, 1);
        clock.set(start() + Duration::days(1));
        engine.cast_vote(1, &v, "A>B>_bar_").unwrap();
        assert_eq!(
            engine.cast_vote(1, &v, "A>B"),
            Err(TallyError::MissingCandidate {
                moniker: "_bar_".to_string()
            })
        );
        assert_eq!(engine.verify_my_vote(1, &v.secret).unwrap(), Some("A>B>_bar_".to_string()));
    }

    #[test]
    fn abstention_sentinel() {
        let (engine, clock) = setup(0, true, &["A", "B"]);
        let v = voter(&engine, 1);
        clock.set(start() + Duration::days(1));
        let receipt = engine.cast_vote(1, &v, MAGIC_ABSTAIN).unwrap();
        assert_eq!(receipt.vote, "A=B=_bar_");
        assert_eq!(
            receipt.hash,
            crypto::vote_hash(&v.secret, &receipt.vote, &receipt.salt)
        );
        clock.set(start() + Duration::days(8));
        assert_eq!(engine.tally(1).unwrap().abstentions, 1);
    }

    #[test]
    fn quorum_extension_and_tally() {
        let (engine, clock) = setup(10, true, &["A", "B"]);
        let voters: Vec<Voter> = (1..=12).map(|pid| voter(&engine, pid)).collect();
        clock.set(start() + Duration::days(1));
        for v in voters.iter().take(7) {
            engine.cast_vote(1, v, "A>B>_bar_").unwrap();
        }
        clock.set(start() + Duration::days(7));
        assert_eq!(engine.current_state(1).unwrap(), BallotState::Extended);
        assert_eq!(
            engine.tally(1),
            Err(TallyError::VotingNotFinished { ballot_id: 1 })
        );
        // Late voters during the extension; the decision stays.
        for v in voters.iter().skip(7) {
            engine.cast_vote(1, v, "B>A>_bar_").unwrap();
        }
        assert_eq!(engine.current_state(1).unwrap(), BallotState::Extended);

        clock.set(start() + Duration::days(14));
        assert_eq!(engine.current_state(1).unwrap(), BallotState::Tallied);
        assert!(matches!(
            engine.cast_vote(1, &voters[0], "B>A>_bar_"),
            Err(TallyError::BallotNotOpen { .. })
        ));
        let r = engine.tally(1).unwrap();
        assert_eq!(r.vote_count, 12);
        assert_eq!(r.condensed, "A>B>_bar_");
        assert_eq!(engine.result(1).unwrap(), r);
        assert_eq!(engine.tally(1), Err(TallyError::AlreadyTallied { ballot_id: 1 }));
        assert_eq!(
            engine.cast_vote(1, &voters[0], "B>A>_bar_"),
            Err(TallyError::AlreadyTallied { ballot_id: 1 })
        );
    }

    #[test]
    fn late_attendee_registration() {
        let (engine, clock) = setup(0, false, &["A", "B"]);
        clock.set(start() + Duration::days(8));
        let v = voter(&engine, 5);
        assert!(engine.store().register_entry(1, 5).is_none());
        assert!(matches!(
            engine.cast_vote(1, &v, "A>B"),
            Err(TallyError::BallotNotOpen { .. })
        ));
    }

    #[test]
    fn result_before_tally() {
        let (engine, _clock) = setup(0, false, &["A", "B"]);
        assert_eq!(engine.result(1), Err(TallyError::NotTallied { ballot_id: 1 }));
        assert_eq!(engine.result(2), Err(TallyError::UnknownBallot { ballot_id: 2 }));
    }

    #[test]
    fn concurrent_voters() {
        let (engine, clock) = setup(0, false, &["A", "B", "C"]);
        let voters: Vec<Voter> = (1..=16).map(|pid| voter(&engine, pid)).collect();
        clock.set(start() + Duration::days(1));
        std::thread::scope(|s| {
            for v in voters.iter() {
                let engine = &engine;
                s.spawn(move || {
                    engine.cast_vote(1, v, "C>B>A").unwrap();
                    engine.cast_vote(1, v, "A>B>C").unwrap();
                });
            }
        });
        assert_eq!(engine.store().votes(1).len(), 16);
        clock.set(start() + Duration::days(8));
        let r = engine.tally(1).unwrap();
        assert_eq!(r.condensed, "A>B>C");
    }

    #[test]
    fn invalid_ballots_are_refused() {
        let engine = TallyEngine::new(MemoryStore::new());
        let mut inverted = ballot(1, 0, true, None);
        inverted.vote_begin = start() + Duration::days(7);
        inverted.vote_end = start();
        inverted.vote_extension_end = Some(start() - Duration::days(1));
        assert!(matches!(
            engine.create_ballot(inverted, candidates(1, &["A", "B"])),
            Err(TallyError::InvalidBallot { .. })
        ));

        let nothing_to_vote_on = ballot(2, 0, false, None);
        assert!(matches!(
            engine.create_ballot(nothing_to_vote_on, vec![]),
            Err(TallyError::InvalidBallot { .. })
        ));

        let mut decided = ballot(3, 0, false, None);
        decided.is_tallied = true;
        assert!(matches!(
            engine.create_ballot(decided, candidates(3, &["A"])),
            Err(TallyError::InvalidBallot { .. })
        ));
        assert!(engine.store().ballots_of_assembly(1).is_empty());
    }

    #[test]
    fn bar_only_ballot_abstains() {
        let clock = Arc::new(TestClock(Mutex::new(start())));
        let engine = TallyEngine::new(MemoryStore::new()).with_clock(Box::new(clock.clone()));
        engine.create_ballot(ballot(1, 0, true, None), vec![]).unwrap();
        let v = voter(&engine, 1);
        clock.set(start() + Duration::days(1));
        let receipt = engine.cast_vote(1, &v, MAGIC_ABSTAIN).unwrap();
        assert_eq!(receipt.vote, "_bar_");
        clock.set(start() + Duration::days(8));
        let r = engine.tally(1).unwrap();
        assert_eq!(r.vote_count, 1);
        assert_eq!(r.outcome, Outcome::Rejected);
    }

    #[test]
    fn attendees_and_ballots_created_together() {
        let clock = Arc::new(TestClock(Mutex::new(start())));
        let engine = TallyEngine::new(MemoryStore::new()).with_clock(Box::new(clock));
        let secrets: Vec<(PersonaId, String)> = std::thread::scope(|s| {
            let engine = &engine;
            let creators: Vec<_> = (1..=8)
                .map(|bid| {
                    s.spawn(move || {
                        engine
                            .create_ballot(ballot(bid, 0, false, None), candidates(bid, &["A", "B"]))
                            .unwrap();
                    })
                })
                .collect();
            let registrations: Vec<_> = (1..=8)
                .map(|pid| s.spawn(move || (pid, engine.register_attendee(1, pid).unwrap())))
                .collect();
            for c in creators {
                c.join().unwrap();
            }
            registrations.into_iter().map(|r| r.join().unwrap()).collect()
        });
        for (pid, secret) in secrets.iter() {
            assert_eq!(engine.store().attendee_secret(1, *pid).as_ref(), Some(secret));
            for bid in 1..=8 {
                assert!(
                    engine.store().register_entry(bid, *pid).is_some(),
                    "persona {} missing on ballot {}",
                    pid,
                    bid
                );
            }
        }
    }
}
