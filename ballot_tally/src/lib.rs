/*!
Ballot tallying for assemblies.

The crate counts ballots with the Schulze method, optionally against a "bar"
pseudo-candidate that stands for rejecting everybody. It also keeps the
register of who voted, stores votes salted and hashed, and extends the voting
period of ballots that missed their quorum.

Counting a set of stored preference strings:

```
use ballot_tally::builder::BallotBuilder;
use ballot_tally::*;
use chrono::{Duration, Utc};

let now = Utc::now();
let (ballot, candidates) = BallotBuilder::new(1, 1)
    .voting_period(now, now + Duration::days(1))?
    .use_bar(true)?
    .candidate("A", "Alice")?
    .candidate("B", "Bob")?
    .build()?;
let votes = vec!["A>B>_bar_".to_string(), "B>_bar_>A".to_string(), "A>_bar_>B".to_string()];
let report = tally(&ballot, &candidates, &votes)?;
assert_eq!(report.condensed, "A>B>_bar_");
assert_eq!(report.outcome, Outcome::Winners(vec!["A".to_string()]));

# Ok::<(), TallyError>(())
```

Running an assembly goes through [`TallyEngine`], see the [`manual`].
*/

mod candidates;
mod config;
mod crypto;
mod engine;
mod error;
mod preference;
mod quorum;
mod result_file;
mod schulze;
mod store;
mod tally;

pub mod builder;
pub mod manual;

pub use crate::candidates::{validate_preference_string, CandidateSet};
pub use crate::config::*;
pub use crate::crypto::{
    find_own_vote, generate_salt, generate_secret, is_own_vote, matches_hash, vote_hash,
};
pub use crate::engine::{Clock, SystemClock, TallyEngine};
pub use crate::error::{ErrorKind, TallyError, TallyResult};
pub use crate::preference::{Preference, MAGIC_ABSTAIN};
pub use crate::quorum::{evaluate, needs_extension, BallotState, Evaluation};
pub use crate::result_file::{BallotResultFile, ResultCandidate, ResultVote};
pub use crate::store::{MemoryStore, VoteStore};
pub use crate::tally::{count_votes, tally};
