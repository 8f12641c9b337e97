//! The preference string grammar.
//!
//! A preference is a list of rank groups separated by `>`, best first. The
//! candidates of one group are joined by `=` and are tied. `A>B=C>_bar_`
//! reads "A before B and C (equal), both before the bar".
//!
//! Stored votes are written in this grammar, so it must never change in a way
//! that breaks old votes.

use std::collections::HashMap;
use std::fmt::Display;

use snafu::ensure;

use crate::error::*;

/// Submitted instead of a preference string to abstain explicitly.
pub const MAGIC_ABSTAIN: &str = "_abstain_";

pub(crate) const PREFER: &str = ">";
pub(crate) const TIE: &str = "=";

/// A parsed preference string.
///
/// Invariant: at least one group, no group is empty, no token is empty.
/// Group order and the order inside groups are kept exactly as parsed.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Preference {
    groups: Vec<Vec<String>>,
}

impl Preference {
    /// Parses the grammar only. Candidate checks are done by
    /// [`crate::candidates::validate_preference_string`].
    pub fn parse(input: &str) -> TallyResult<Preference> {
        ensure!(
            !input.is_empty(),
            MalformedPreferenceStringSnafu {
                input,
                reason: "empty preference",
            }
        );
        let mut groups: Vec<Vec<String>> = Vec::new();
        for group in input.split(PREFER) {
            ensure!(
                !group.is_empty(),
                MalformedPreferenceStringSnafu {
                    input,
                    reason: "empty rank group",
                }
            );
            let mut tokens: Vec<String> = Vec::new();
            for token in group.split(TIE) {
                ensure!(
                    !token.is_empty(),
                    MalformedPreferenceStringSnafu {
                        input,
                        reason: "empty candidate in a tie",
                    }
                );
                ensure!(
                    !token.chars().any(char::is_whitespace),
                    MalformedPreferenceStringSnafu {
                        input,
                        reason: format!("whitespace in {:?}", token),
                    }
                );
                tokens.push(token.to_string());
            }
            groups.push(tokens);
        }
        Ok(Preference { groups })
    }

    /// Everything tied: the stored form of an abstention.
    pub fn abstain(tokens: &[String]) -> Preference {
        Preference {
            groups: vec![tokens.to_vec()],
        }
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    pub fn tokens(&self) -> impl Iterator<Item = &String> {
        self.groups.iter().flatten()
    }

    /// A single group of several tokens: the voter did not distinguish any
    /// candidates. With a single token there is nothing to distinguish, so
    /// such a vote is never an abstention.
    pub fn is_abstention(&self) -> bool {
        matches!(self.groups.as_slice(), [only] if only.len() > 1)
    }

    /// Rank of each token: the index of its group.
    pub(crate) fn group_index(&self) -> HashMap<&str, usize> {
        self.groups
            .iter()
            .enumerate()
            .flat_map(|(idx, g)| g.iter().map(move |t| (t.as_str(), idx)))
            .collect()
    }
}

impl Display for Preference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: Vec<String> = self
            .groups
            .iter()
            .map(|g| g.join(TIE))
            .collect();
        write!(f, "{}", s.join(PREFER))
    }
}
