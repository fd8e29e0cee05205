//! Consensus evaluator — decides when a pending tag becomes part of the plan.
//!
//! A tag is finalized once at least 60% of participants voted for it and
//! fewer than 25% voted against. Finalization is one-way: a finalized tag
//! never returns to pending.
//!
//! Ratios are compared with integer cross-multiplication so 3/5 is exactly
//! 0.6 and never lands a hair under the threshold.

use crate::services::session::Vote;

/// Positive ratio needed, as `num / den` (0.6).
const POSITIVE_NUM: usize = 3;
const POSITIVE_DEN: usize = 5;
/// Negative ratio must stay strictly below `num / den` (0.25).
const NEGATIVE_NUM: usize = 1;
const NEGATIVE_DEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Transitioned from pending to finalized on this evaluation.
    Finalized,
    /// Still pending.
    Pending,
    /// Already finalized; nothing changes.
    Unchanged,
}

/// Vote tallies for one tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub positive: usize,
    pub negative: usize,
}

impl Tally {
    pub fn from_votes<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> Self {
        votes.into_iter().fold(Self::default(), |mut tally, vote| {
            if vote.value > 0 {
                tally.positive += 1;
            } else {
                tally.negative += 1;
            }
            tally
        })
    }

    /// Whether the tally clears the finalization threshold. With no
    /// participants both ratios are 0, which never clears it.
    #[must_use]
    pub fn meets_threshold(self, participant_count: usize) -> bool {
        if participant_count == 0 {
            return false;
        }
        let positive_ok = self.positive * POSITIVE_DEN >= POSITIVE_NUM * participant_count;
        let negative_ok = self.negative * NEGATIVE_DEN < NEGATIVE_NUM * participant_count;
        positive_ok && negative_ok
    }
}

/// Evaluate a tag's votes against the current participant count.
pub fn evaluate<'a>(
    votes: impl IntoIterator<Item = &'a Vote>,
    participant_count: usize,
    already_finalized: bool,
) -> Evaluation {
    if already_finalized {
        return Evaluation::Unchanged;
    }
    if Tally::from_votes(votes).meets_threshold(participant_count) {
        Evaluation::Finalized
    } else {
        Evaluation::Pending
    }
}

#[cfg(test)]
#[path = "consensus_test.rs"]
mod tests;
