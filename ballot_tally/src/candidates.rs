//! Candidates of a ballot plus the bar, and validation of preference strings
//! against them.

use std::collections::HashSet;

use log::debug;
use snafu::ensure;

use crate::config::*;
use crate::error::*;
use crate::preference::{Preference, MAGIC_ABSTAIN, PREFER, TIE};

/// The tokens a preference string of one ballot may use.
///
/// Invariant: monikers are unique, in ballot order, and the bar (if any)
/// is the last token.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateSet {
    ballot_id: BallotId,
    tokens: Vec<String>,
    use_bar: bool,
    mode: BallotMode,
}

impl CandidateSet {
    /// Builds the token set of a ballot, checking the candidate invariants.
    pub fn for_ballot(ballot: &Ballot, candidates: &[Candidate]) -> TallyResult<CandidateSet> {
        for c in candidates {
            ensure!(
                c.ballot_id == ballot.id,
                InvalidCandidateSnafu {
                    moniker: c.moniker.as_str(),
                    reason: format!("belongs to ballot {}, not {}", c.ballot_id, ballot.id),
                }
            );
        }
        let monikers: Vec<String> = candidates.iter().map(|c| c.moniker.clone()).collect();
        CandidateSet::from_monikers(ballot.id, &monikers, ballot.use_bar, ballot.mode())
    }

    pub fn from_monikers(
        ballot_id: BallotId,
        monikers: &[String],
        use_bar: bool,
        mode: BallotMode,
    ) -> TallyResult<CandidateSet> {
        let mut seen: HashSet<&str> = HashSet::new();
        for m in monikers {
            check_moniker(m)?;
            ensure!(
                seen.insert(m.as_str()),
                InvalidCandidateSnafu {
                    moniker: m.as_str(),
                    reason: "moniker used twice on the same ballot",
                }
            );
        }
        let mut tokens = monikers.to_vec();
        if use_bar {
            tokens.push(BAR_MONIKER.to_string());
        }
        Ok(CandidateSet {
            ballot_id,
            tokens,
            use_bar,
            mode,
        })
    }

    pub fn ballot_id(&self) -> BallotId {
        self.ballot_id
    }

    /// All the valid tokens: the monikers, then the bar if enabled.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The monikers of the real candidates.
    pub fn candidates(&self) -> &[String] {
        if self.use_bar {
            &self.tokens[..self.tokens.len() - 1]
        } else {
            &self.tokens
        }
    }

    pub fn use_bar(&self) -> bool {
        self.use_bar
    }

    pub fn mode(&self) -> BallotMode {
        self.mode
    }

    pub fn validate(&self, input: &str) -> TallyResult<Preference> {
        validate_preference_string(&self.tokens, input, self.mode)
    }
}

fn check_moniker(moniker: &str) -> TallyResult<()> {
    let reason = if moniker.is_empty() {
        Some("empty moniker")
    } else if moniker == BAR_MONIKER {
        Some("reserved for the bar")
    } else if moniker == MAGIC_ABSTAIN {
        Some("reserved for abstentions")
    } else if moniker.contains(PREFER)
        || moniker.contains(TIE)
        || moniker.chars().any(char::is_whitespace)
    {
        Some("contains a separator or whitespace")
    } else {
        None
    };
    match reason {
        Some(reason) => InvalidCandidateSnafu { moniker, reason }.fail(),
        None => Ok(()),
    }
}

/// Checks a preference string against the tokens of a ballot.
///
/// Every token must appear exactly once. Classical ballots are further
/// restricted to a "chosen ones first" shape, see [`check_classical`].
pub fn validate_preference_string(
    tokens: &[String],
    input: &str,
    mode: BallotMode,
) -> TallyResult<Preference> {
    let pref = Preference::parse(input)?;
    let known: HashSet<&str> = tokens.iter().map(|t| t.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    for token in pref.tokens() {
        ensure!(
            known.contains(token.as_str()),
            UnknownCandidateSnafu {
                moniker: token.as_str()
            }
        );
        ensure!(
            seen.insert(token.as_str()),
            DuplicateCandidateSnafu {
                moniker: token.as_str()
            }
        );
    }
    if let Some(missing) = tokens.iter().find(|t| !seen.contains(t.as_str())) {
        return MissingCandidateSnafu {
            moniker: missing.as_str(),
        }
        .fail();
    }
    if let BallotMode::Classical(max_choices) = mode {
        let has_bar = known.contains(BAR_MONIKER);
        check_classical(&pref, input, max_choices, has_bar)?;
    }
    debug!("validate_preference_string: {:?} -> {:?}", input, pref);
    Ok(pref)
}

/// The accepted shapes of a classical vote, `N` being the number of choices:
///
/// * everything tied: abstention,
/// * `chosen>rest` without bar,
/// * `chosen>_bar_>rest` or `chosen>_bar_` or `chosen=_bar_>rest` with bar,
/// * `_bar_>rest`: against all candidates,
///
/// with at most `N` chosen candidates.
fn check_classical(
    pref: &Preference,
    input: &str,
    max_choices: u32,
    has_bar: bool,
) -> TallyResult<()> {
    let groups = pref.groups();
    let is_bar_group = |g: &Vec<String>| g.len() == 1 && g[0] == BAR_MONIKER;
    let chosen: &[String] = match groups {
        [_] => return Ok(()),
        [first, _] if !has_bar => first,
        [first, _] if is_bar_group(first) => return Ok(()),
        // Bar tied with the chosen ones.
        [first, _] if first.iter().any(|t| t == BAR_MONIKER) => {
            return check_choice_count(first.len() - 1, input, max_choices);
        }
        [first, second] if is_bar_group(second) => first,
        [first, middle, _] if has_bar && is_bar_group(middle) => first,
        _ => {
            return MalformedPreferenceStringSnafu {
                input,
                reason: "a classical vote has the chosen candidates, the bar and the rest",
            }
            .fail()
        }
    };
    check_choice_count(chosen.len(), input, max_choices)
}

fn check_choice_count(n: usize, input: &str, max_choices: u32) -> TallyResult<()> {
    let max = max_choices as usize;
    ensure!(
        n <= max,
        MalformedPreferenceStringSnafu {
            input,
            reason: format!("{} candidates chosen, at most {} allowed", n, max),
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(monikers: &[&str], use_bar: bool, mode: BallotMode) -> CandidateSet {
        let ms: Vec<String> = monikers.iter().map(|s| s.to_string()).collect();
        CandidateSet::from_monikers(1, &ms, use_bar, mode).unwrap()
    }

    #[test]
    fn tokens_include_bar_last() {
        let s = set(&["1", "rot"], true, BallotMode::Preferential);
        assert_eq!(s.tokens(), &["1", "rot", "_bar_"]);
        assert_eq!(s.candidates(), &["1", "rot"]);
        let s = set(&["1", "rot"], false, BallotMode::Preferential);
        assert_eq!(s.tokens(), &["1", "rot"]);
    }

    #[test]
    fn bad_monikers() {
        for bad in [
            vec!["A", "A"],
            vec!["_bar_"],
            vec!["_abstain_"],
            vec![""],
            vec!["a>b"],
            vec!["a=b"],
            vec!["a b"],
        ] {
            let ms: Vec<String> = bad.iter().map(|s| s.to_string()).collect();
            let res = CandidateSet::from_monikers(1, &ms, true, BallotMode::Preferential);
            assert!(
                matches!(res, Err(TallyError::InvalidCandidate { .. })),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn preferential_validation() {
        let s = set(&["A", "B", "C"], true, BallotMode::Preferential);
        assert!(s.validate("A>B>_bar_>C").is_ok());
        assert!(s.validate("B>A=C>_bar_").is_ok());
        assert!(s.validate("A=B=C=_bar_").is_ok());
        assert_eq!(
            s.validate("A>B>C"),
            Err(TallyError::MissingCandidate {
                moniker: "_bar_".to_string()
            })
        );
        assert_eq!(
            s.validate("A>B>C>_bar_>D"),
            Err(TallyError::UnknownCandidate {
                moniker: "D".to_string()
            })
        );
        assert_eq!(
            s.validate("A>B=A>C>_bar_"),
            Err(TallyError::DuplicateCandidate {
                moniker: "A".to_string()
            })
        );
        assert!(matches!(
            s.validate("A>B>>C>_bar_"),
            Err(TallyError::MalformedPreferenceString { .. })
        ));
    }

    #[test]
    fn classical_with_bar() {
        let s = set(&["A", "B", "C", "D"], true, BallotMode::Classical(2));
        assert!(s.validate("A=B>_bar_>C=D").is_ok());
        assert!(s.validate("A>_bar_>B=C=D").is_ok());
        assert!(s.validate("A=_bar_>B=C=D").is_ok());
        assert!(s.validate("_bar_>A=B=C=D").is_ok());
        assert!(s.validate("A=B=C=D=_bar_").is_ok());
        // Three chosen ones ahead of the bar.
        assert!(matches!(
            s.validate("A=B=C>_bar_>D"),
            Err(TallyError::MalformedPreferenceString { .. })
        ));
        // Chosen ones ranked among themselves.
        assert!(matches!(
            s.validate("A>B>_bar_>C=D"),
            Err(TallyError::MalformedPreferenceString { .. })
        ));
        // Bar mixed into the rest.
        assert!(matches!(
            s.validate("A=B>C=D=_bar_"),
            Err(TallyError::MalformedPreferenceString { .. })
        ));
        assert!(matches!(
            s.validate("A>B=_bar_>C=D"),
            Err(TallyError::MalformedPreferenceString { .. })
        ));
    }

    #[test]
    fn classical_all_chosen() {
        let s = set(&["A", "B"], true, BallotMode::Classical(2));
        assert!(s.validate("A=B>_bar_").is_ok());
        assert!(s.validate("_bar_>A=B").is_ok());
    }

    #[test]
    fn classical_without_bar() {
        let s = set(&["A", "B", "C"], false, BallotMode::Classical(1));
        assert!(s.validate("B>A=C").is_ok());
        assert!(s.validate("A=B=C").is_ok());
        assert!(matches!(
            s.validate("A=B>C"),
            Err(TallyError::MalformedPreferenceString { .. })
        ));
        assert!(matches!(
            s.validate("A>B>C"),
            Err(TallyError::MalformedPreferenceString { .. })
        ));
    }
}
