//! Hand evaluation.
//!
//! A hand is scored by trying every 5-card combination of a player's hole
//! cards plus the board and keeping the best one. Each score is a category
//! (high card up to royal flush) plus a tie-break vector that is compared
//! lexicographically when categories match.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, iter};

use super::entities::{ACE, Card, Value};

const HAND_SIZE: usize = 5;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    /// Numeric rank, 0 for high card through 9 for a royal flush.
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::HighCard => "High Card",
            Self::OnePair => "One Pair",
            Self::TwoPair => "Two Pair",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "Full House",
            Self::FourOfAKind => "Four of a Kind",
            Self::StraightFlush => "Straight Flush",
            Self::RoyalFlush => "Royal Flush",
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Score of a player's best five cards.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HandResult {
    pub category: HandCategory,
    /// Card values that break ties within the category, most significant
    /// first (e.g. `[quad, kicker]` or `[high pair, low pair, kicker]`).
    pub tiebreak: Vec<Value>,
    pub name: String,
}

impl HandResult {
    fn new(category: HandCategory, tiebreak: Vec<Value>) -> Self {
        Self {
            category,
            tiebreak,
            name: category.name().to_string(),
        }
    }
}

impl PartialEq for HandResult {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for HandResult {}

impl PartialOrd for HandResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandResult {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl fmt::Display for HandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.name, self.tiebreak)
    }
}

/// Order two results: category first, then the tie-break vectors
/// element by element. Vectors that agree on their common prefix tie.
#[must_use]
pub fn compare(a: &HandResult, b: &HandResult) -> Ordering {
    a.category.cmp(&b.category).then_with(|| {
        a.tiebreak
            .iter()
            .zip(&b.tiebreak)
            .map(|(x, y)| x.cmp(y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

/// Best five-card result from two hole cards and up to five board cards.
///
/// Returns `None` when fewer than five cards are available.
#[must_use]
pub fn evaluate(hole: &[Card], board: &[Card]) -> Option<HandResult> {
    let cards: Vec<Card> = hole.iter().chain(board).copied().collect();
    if cards.len() < HAND_SIZE {
        return None;
    }
    cards
        .into_iter()
        .combinations(HAND_SIZE)
        .map(|combo| score_five(&combo))
        .max_by(compare)
}

/// Score exactly five cards.
#[must_use]
pub fn score_five(cards: &[Card]) -> HandResult {
    debug_assert_eq!(cards.len(), HAND_SIZE);

    let values: Vec<Value> = cards.iter().map(|c| c.0).sorted_unstable_by(|a, b| b.cmp(a)).collect();
    let is_flush = cards.iter().all(|c| c.1 == cards[0].1);
    let straight_high = straight_high(&values);

    // (count, value) sorted by count then value, both descending.
    let groups: Vec<(usize, Value)> = values
        .iter()
        .copied()
        .dedup_with_count()
        .sorted_unstable_by(|a, b| b.cmp(a))
        .collect();

    match (straight_high, is_flush, groups.as_slice()) {
        (Some(ACE), true, _) => HandResult::new(HandCategory::RoyalFlush, vec![ACE]),
        (Some(high), true, _) => HandResult::new(HandCategory::StraightFlush, vec![high]),
        (_, _, [(4, quad), (_, kicker)]) => {
            HandResult::new(HandCategory::FourOfAKind, vec![*quad, *kicker])
        }
        (_, _, [(3, trips), (2, pair)]) => {
            HandResult::new(HandCategory::FullHouse, vec![*trips, *pair])
        }
        (_, true, _) => HandResult::new(HandCategory::Flush, values),
        (Some(high), _, _) => HandResult::new(HandCategory::Straight, vec![high]),
        (_, _, [(3, trips), kickers @ ..]) => HandResult::new(
            HandCategory::ThreeOfAKind,
            iter::once(*trips).chain(kickers.iter().map(|(_, v)| *v)).collect(),
        ),
        (_, _, [(2, high), (2, low), (_, kicker)]) => {
            HandResult::new(HandCategory::TwoPair, vec![*high, *low, *kicker])
        }
        (_, _, [(2, pair), kickers @ ..]) => HandResult::new(
            HandCategory::OnePair,
            iter::once(*pair).chain(kickers.iter().map(|(_, v)| *v)).collect(),
        ),
        _ => HandResult::new(HandCategory::HighCard, values),
    }
}

/// High card of a straight over values sorted descending. The wheel
/// (A-2-3-4-5) plays as a five-high straight.
fn straight_high(values: &[Value]) -> Option<Value> {
    let distinct = values.iter().all_unique();
    if !distinct {
        return None;
    }
    if values[0] - values[HAND_SIZE - 1] == 4 {
        return Some(values[0]);
    }
    if values == [ACE, 5, 4, 3, 2] {
        return Some(5);
    }
    None
}
