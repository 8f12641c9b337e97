use std::collections::HashMap;

use log::{debug, info, warn};

use crate::candidates::CandidateSet;
use crate::config::*;
use crate::error::*;
use crate::preference::{Preference, PREFER, TIE};
use crate::schulze::{self, CandidateId, VoteCount};

/// Counts the votes of a ballot with the Schulze method.
///
/// Arguments:
/// * `ballot` the ballot, for its bar and classical settings
/// * `candidates` the registered candidates of this ballot, in display order
/// * `votes` the stored preference strings. A string that does not validate
/// aborts the count with `CorruptVoteData`.
pub fn tally(ballot: &Ballot, candidates: &[Candidate], votes: &[String]) -> TallyResult<TallyReport> {
    let set = CandidateSet::for_ballot(ballot, candidates)?;
    count_votes(&set, votes)
}

/// Same as [`tally`], on an already assembled candidate set.
pub fn count_votes(set: &CandidateSet, votes: &[String]) -> TallyResult<TallyReport> {
    info!(
        "Processing {:?} votes for ballot {}, tokens: {:?}",
        votes.len(),
        set.ballot_id(),
        set.tokens()
    );
    let mut prefs: Vec<Preference> = Vec::with_capacity(votes.len());
    for v in votes.iter() {
        match set.validate(v) {
            Ok(p) => prefs.push(p),
            Err(e) => {
                warn!("count_votes: ballot {}: corrupt vote {:?}: {}", set.ballot_id(), v, e);
                return CorruptVoteDataSnafu {
                    ballot_id: set.ballot_id(),
                    vote: v.as_str(),
                    reason: e.to_string(),
                }
                .fail();
            }
        }
    }
    Ok(count_preferences(set, &prefs))
}

/// The preferences must all have been validated against `set`.
fn count_preferences(set: &CandidateSet, prefs: &[Preference]) -> TallyReport {
    let tokens = set.tokens();
    let ballots: Vec<Vec<usize>> = prefs
        .iter()
        .map(|p| {
            let idx = p.group_index();
            tokens
                .iter()
                .map(|t| idx.get(t.as_str()).cloned().unwrap_or(usize::MAX))
                .collect()
        })
        .collect();

    let d = schulze::pairwise_preferences(tokens.len(), &ballots);
    debug!("count_preferences: pairwise matrix {:?}", d);
    let p = schulze::strongest_paths(&d);
    debug!("count_preferences: strongest paths {:?}", p);
    let groups = schulze::rank_groups(&p);

    let ranking: Vec<Vec<String>> = groups
        .iter()
        .map(|g| g.iter().map(|cid| tokens[cid.0].clone()).collect())
        .collect();
    let condensed = ranking
        .iter()
        .map(|g| g.join(TIE))
        .collect::<Vec<String>>()
        .join(PREFER);

    let outcome = match ranking.first() {
        Some(top) if set.use_bar() && top.len() == 1 && top[0] == BAR_MONIKER => Outcome::Rejected,
        Some(top) => Outcome::Winners(
            top.iter()
                .filter(|t| t.as_str() != BAR_MONIKER)
                .cloned()
                .collect(),
        ),
        None => Outcome::Winners(vec![]),
    };

    let mut pairwise: Vec<PairwiseSupport> = Vec::new();
    for (a, pro) in tokens.iter().enumerate() {
        for (b, contra) in tokens.iter().enumerate() {
            if a != b {
                pairwise.push(PairwiseSupport {
                    pro: pro.clone(),
                    contra: contra.clone(),
                    support: d.get(CandidateId(a), CandidateId(b)).0,
                });
            }
        }
    }

    let abstentions = prefs.iter().filter(|p| p.is_abstention()).count() as u64;
    let approvals = match set.mode() {
        BallotMode::Classical(_) => Some(approvals(set, prefs)),
        BallotMode::Preferential => None,
    };

    info!(
        "Ballot {}: {} ({} votes, {} abstentions)",
        set.ballot_id(),
        condensed,
        prefs.len(),
        abstentions
    );
    TallyReport {
        ballot_id: set.ballot_id(),
        ranking,
        condensed,
        outcome,
        vote_count: prefs.len() as u64,
        abstentions,
        pairwise,
        approvals,
    }
}

/// Number of votes picking each candidate on a classical ballot: the
/// candidates of the first group, unless the vote is an abstention or the
/// first group is the bar alone.
fn approvals(set: &CandidateSet, prefs: &[Preference]) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, VoteCount> = HashMap::new();
    for p in prefs.iter().filter(|p| !p.is_abstention()) {
        if let Some(first) = p.groups().first() {
            for t in first.iter().filter(|t| t.as_str() != BAR_MONIKER) {
                *counts.entry(t.as_str()).or_insert(VoteCount::EMPTY) += VoteCount(1);
            }
        }
    }
    set.candidates()
        .iter()
        .map(|c| {
            let vc = counts.get(c.as_str()).cloned().unwrap_or(VoteCount::EMPTY);
            (c.clone(), vc.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ballot(use_bar: bool, votes: Option<u32>) -> Ballot {
        Ballot {
            id: 7,
            assembly_id: 1,
            title: "Farbe des Logos".to_string(),
            description: None,
            vote_begin: Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap(),
            vote_end: Utc.with_ymd_and_hms(2026, 5, 8, 10, 0, 0).unwrap(),
            vote_extension_end: None,
            extended: None,
            quorum: 0,
            use_bar,
            votes,
            is_tallied: false,
        }
    }

    fn candidates(monikers: &[&str]) -> Vec<Candidate> {
        monikers
            .iter()
            .map(|m| Candidate {
                ballot_id: 7,
                moniker: m.to_string(),
                description: format!("Kandidat {}", m),
            })
            .collect()
    }

    fn strings(votes: &[&str]) -> Vec<String> {
        votes.iter().map(|s| s.to_string()).collect()
    }

    fn support(report: &TallyReport, pro: &str, contra: &str) -> u64 {
        report
            .pairwise
            .iter()
            .find(|ps| ps.pro == pro && ps.contra == contra)
            .map(|ps| ps.support)
            .unwrap()
    }

    #[test]
    fn three_voters_with_bar() {
        let _ = env_logger::try_init();
        let votes = strings(&["A>B>_bar_>C", "B>A=C>_bar_", "_bar_>A>B>C"]);
        let r = tally(&ballot(true, None), &candidates(&["A", "B", "C"]), &votes).unwrap();
        assert_eq!(support(&r, "A", "B"), 2);
        assert_eq!(support(&r, "B", "A"), 1);
        assert_eq!(support(&r, "A", "C"), 2);
        assert_eq!(support(&r, "C", "A"), 0);
        assert_eq!(support(&r, "B", "C"), 3);
        assert_eq!(support(&r, "_bar_", "C"), 2);
        assert_eq!(r.ranking[0], vec!["A".to_string()]);
        assert_eq!(r.condensed, "A>B>_bar_>C");
        assert_eq!(r.outcome, Outcome::Winners(vec!["A".to_string()]));
        assert_eq!(r.vote_count, 3);
        assert_eq!(r.abstentions, 0);
        assert_eq!(r.approvals, None);
    }

    #[test]
    fn no_votes_everything_tied() {
        let r = tally(&ballot(true, None), &candidates(&["A", "B", "C"]), &[]).unwrap();
        assert_eq!(r.condensed, "A=B=C=_bar_");
        assert_eq!(r.ranking.len(), 1);
        assert_eq!(r.vote_count, 0);
        assert_eq!(
            r.outcome,
            Outcome::Winners(strings(&["A", "B", "C"]))
        );
    }

    #[test]
    fn exact_tie() {
        let votes = strings(&["A>B", "B>A"]);
        let r = tally(&ballot(false, None), &candidates(&["A", "B"]), &votes).unwrap();
        assert_eq!(r.ranking, vec![strings(&["A", "B"])]);
        assert_eq!(r.outcome, Outcome::Winners(strings(&["A", "B"])));
    }

    #[test]
    fn bar_wins() {
        let votes = strings(&["_bar_>A>B", "_bar_>B>A", "A>_bar_>B"]);
        let r = tally(&ballot(true, None), &candidates(&["A", "B"]), &votes).unwrap();
        assert_eq!(r.ranking[0], strings(&["_bar_"]));
        assert_eq!(r.outcome, Outcome::Rejected);
    }

    #[test]
    fn bar_tied_on_top_is_not_a_rejection() {
        let votes = strings(&["_bar_>A", "A>_bar_"]);
        let r = tally(&ballot(true, None), &candidates(&["A"]), &votes).unwrap();
        assert_eq!(r.condensed, "A=_bar_");
        assert_eq!(r.outcome, Outcome::Winners(strings(&["A"])));
    }

    #[test]
    fn abstentions_count_for_nobody() {
        let votes = strings(&["A=B=_bar_", "A>B>_bar_"]);
        let r = tally(&ballot(true, None), &candidates(&["A", "B"]), &votes).unwrap();
        assert_eq!(r.abstentions, 1);
        assert_eq!(r.vote_count, 2);
        assert_eq!(support(&r, "A", "B"), 1);
        assert_eq!(r.condensed, "A>B>_bar_");
    }

    #[test]
    fn single_candidate_votes_are_not_abstentions() {
        let votes = strings(&["A", "A"]);
        let r = tally(&ballot(false, None), &candidates(&["A"]), &votes).unwrap();
        assert_eq!(r.vote_count, 2);
        assert_eq!(r.abstentions, 0);
        assert_eq!(r.outcome, Outcome::Winners(strings(&["A"])));
    }

    #[test]
    fn classical_approvals() {
        let votes = strings(&[
            "A=B>_bar_>C=D",
            "A>_bar_>B=C=D",
            "_bar_>A=B=C=D",
            "A=B=C=D=_bar_",
        ]);
        let r = tally(&ballot(true, Some(2)), &candidates(&["A", "B", "C", "D"]), &votes).unwrap();
        assert_eq!(
            r.approvals,
            Some(vec![
                ("A".to_string(), 2),
                ("B".to_string(), 1),
                ("C".to_string(), 0),
                ("D".to_string(), 0),
            ])
        );
        assert_eq!(r.abstentions, 1);
        assert_eq!(r.ranking[0], strings(&["A"]));
    }

    #[test]
    fn corrupt_vote_aborts() {
        let votes = strings(&["A>B", "A>>B"]);
        let res = tally(&ballot(false, None), &candidates(&["A", "B"]), &votes);
        match res {
            Err(TallyError::CorruptVoteData { ballot_id, vote, .. }) => {
                assert_eq!(ballot_id, 7);
                assert_eq!(vote, "A>>B");
            }
            x => panic!("unexpected {:?}", x),
        }
        let unknown = strings(&["A>Z"]);
        assert!(matches!(
            tally(&ballot(false, None), &candidates(&["A", "B"]), &unknown),
            Err(TallyError::CorruptVoteData { .. })
        ));
    }
}
