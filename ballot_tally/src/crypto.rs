//! Salts, attendee secrets and vote hashes.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::config::StoredVote;

/// Hex encoded SHA-256 of the secret, the vote and the salt, in that order.
pub fn vote_hash(secret: &str, vote: &str, salt: &str) -> String {
    sha256::digest(format!("{}{}{}", secret, vote, salt))
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_salt(len: usize) -> String {
    random_string(len)
}

pub fn generate_secret(len: usize) -> String {
    random_string(len)
}

/// True if `hash` was made from `secret`, `vote` and `salt`.
pub fn matches_hash(secret: &str, vote: &str, salt: &str, hash: &str) -> bool {
    vote_hash(secret, vote, salt) == hash
}

/// True if `vote` was cast by the holder of `secret`.
pub fn is_own_vote(vote: &StoredVote, secret: &str) -> bool {
    matches_hash(secret, &vote.vote, &vote.salt, &vote.hash)
}

/// Finds the vote cast by the holder of `secret`, if any.
pub fn find_own_vote<'a>(votes: &'a [StoredVote], secret: &str) -> Option<&'a StoredVote> {
    votes.iter().find(|v| is_own_vote(v, secret))
}
