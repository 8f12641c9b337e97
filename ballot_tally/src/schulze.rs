//! The Schulze method over rank-group preferences.

use std::ops::AddAssign;

use log::{debug, warn};

// **** Private structures ****

/// Index of a token in the candidate set.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub(crate) struct CandidateId(pub(crate) usize);

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash, Default)]
pub(crate) struct VoteCount(pub(crate) u64);

impl VoteCount {
    pub(crate) const EMPTY: VoteCount = VoteCount(0);
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

/// A square matrix of counts indexed by candidate.
#[derive(Eq, PartialEq, Debug, Clone)]
pub(crate) struct Matrix {
    size: usize,
    cells: Vec<VoteCount>,
}

impl Matrix {
    fn new(size: usize) -> Matrix {
        Matrix {
            size,
            cells: vec![VoteCount::EMPTY; size * size],
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn get(&self, a: CandidateId, b: CandidateId) -> VoteCount {
        self.cells[a.0 * self.size + b.0]
    }

    fn get_mut(&mut self, a: CandidateId, b: CandidateId) -> &mut VoteCount {
        &mut self.cells[a.0 * self.size + b.0]
    }

    fn ids(&self) -> impl Iterator<Item = CandidateId> {
        (0..self.size).map(CandidateId)
    }
}

/// Builds `d[a][b]`, the number of voters ranking `a` in a strictly better
/// group than `b`.
///
/// Each ballot gives the group index of every candidate. Ties count for
/// neither side.
pub(crate) fn pairwise_preferences(num_candidates: usize, ballots: &[Vec<usize>]) -> Matrix {
    let mut d = Matrix::new(num_candidates);
    for ranks in ballots.iter() {
        debug_assert_eq!(ranks.len(), num_candidates);
        for a in 0..num_candidates {
            for b in 0..num_candidates {
                if ranks[a] < ranks[b] {
                    *d.get_mut(CandidateId(a), CandidateId(b)) += VoteCount(1);
                }
            }
        }
    }
    d
}

/// Strength of the strongest path between every pair of candidates.
///
/// Links are weighted by winning votes: `d[a][b]` if `a` beats `b`, else 0.
pub(crate) fn strongest_paths(d: &Matrix) -> Matrix {
    let n = d.size();
    let mut p = Matrix::new(n);
    for a in d.ids() {
        for b in d.ids() {
            if a != b && d.get(a, b) > d.get(b, a) {
                *p.get_mut(a, b) = d.get(a, b);
            }
        }
    }
    for i in 0..n {
        let via = CandidateId(i);
        for a in d.ids() {
            if a == via {
                continue;
            }
            for b in d.ids() {
                if b == via || b == a {
                    continue;
                }
                let through = std::cmp::min(p.get(a, via), p.get(via, b));
                if through > p.get(a, b) {
                    *p.get_mut(a, b) = through;
                }
            }
        }
    }
    p
}

/// Splits the candidates into rank groups, best first.
///
/// `a` beats `b` when `p[a][b] > p[b][a]`. This relation is a strict
/// partial order, so every non-empty subset has unbeaten members: each
/// group is the set of unbeaten candidates among those not yet ranked.
/// Inside a group candidates keep their index order.
pub(crate) fn rank_groups(p: &Matrix) -> Vec<Vec<CandidateId>> {
    let mut remaining: Vec<CandidateId> = p.ids().collect();
    let mut groups: Vec<Vec<CandidateId>> = Vec::new();
    while !remaining.is_empty() {
        let unbeaten: Vec<CandidateId> = remaining
            .iter()
            .filter(|&&a| !remaining.iter().any(|&b| p.get(b, a) > p.get(a, b)))
            .cloned()
            .collect();
        if unbeaten.is_empty() {
            // Cannot happen with a Schulze matrix. Keep the rest tied rather
            // than loop forever.
            warn!("rank_groups: no unbeaten candidate among {:?}", remaining);
            groups.push(remaining);
            break;
        }
        remaining.retain(|cid| !unbeaten.contains(cid));
        debug!("rank_groups: next group {:?}", unbeaten);
        groups.push(unbeaten);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(groups: &[Vec<CandidateId>]) -> Vec<Vec<usize>> {
        groups
            .iter()
            .map(|g| g.iter().map(|c| c.0).collect())
            .collect()
    }

    #[test]
    fn pairwise_ignores_ties() {
        // 0 > 1 = 2
        let d = pairwise_preferences(3, &[vec![0, 1, 1]]);
        assert_eq!(d.get(CandidateId(0), CandidateId(1)), VoteCount(1));
        assert_eq!(d.get(CandidateId(0), CandidateId(2)), VoteCount(1));
        assert_eq!(d.get(CandidateId(1), CandidateId(2)), VoteCount::EMPTY);
        assert_eq!(d.get(CandidateId(2), CandidateId(1)), VoteCount::EMPTY);
    }

    #[test]
    fn condorcet_cycle_resolved_by_path_strength() {
        // Classic example: 5 voters A>B>C, 4 voters B>C>A, 2 voters C>A>B.
        // A beats B 7:4, B beats C 9:2, C beats A 6:5.
        let mut ballots = Vec::new();
        ballots.extend(std::iter::repeat(vec![0, 1, 2]).take(5));
        ballots.extend(std::iter::repeat(vec![2, 0, 1]).take(4));
        ballots.extend(std::iter::repeat(vec![1, 2, 0]).take(2));
        let d = pairwise_preferences(3, &ballots);
        assert_eq!(d.get(CandidateId(0), CandidateId(1)), VoteCount(7));
        assert_eq!(d.get(CandidateId(1), CandidateId(2)), VoteCount(9));
        assert_eq!(d.get(CandidateId(2), CandidateId(0)), VoteCount(6));
        let p = strongest_paths(&d);
        // A -> B -> C has strength min(7, 9) = 7 > 6.
        assert_eq!(p.get(CandidateId(0), CandidateId(2)), VoteCount(7));
        assert_eq!(p.get(CandidateId(2), CandidateId(0)), VoteCount(6));
        assert_eq!(ids(&rank_groups(&p)), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn no_ballots_all_tied() {
        let d = pairwise_preferences(4, &[]);
        let p = strongest_paths(&d);
        assert_eq!(ids(&rank_groups(&p)), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn symmetric_tie() {
        let d = pairwise_preferences(2, &[vec![0, 1], vec![1, 0]]);
        let p = strongest_paths(&d);
        assert_eq!(ids(&rank_groups(&p)), vec![vec![0, 1]]);
    }
}
