//! Side pots and settlement.
//!
//! Pots are built from each player's total contribution to the hand. Every
//! distinct all-in level closes a tier that only players who matched it can
//! win; whatever was put in above the highest all-in forms a final tier.
//! Each tier is then paid to its best eligible hand, splitting ties with the
//! odd chips going to the first tied winner in seat order.

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::HashMap};

use super::{
    entities::{Chips, PlayerId, SeatIndex},
    functional::{HandResult, compare},
};

pub const REFUND: &str = "Refund";

/// What one player put into the pot over the whole hand.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Contribution {
    pub id: PlayerId,
    pub seat_idx: SeatIndex,
    pub total: Chips,
    pub folded: bool,
    pub all_in: bool,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SidePot {
    pub amount: Chips,
    /// Non-folded contributors who matched this tier, in seat order.
    pub eligible: Vec<PlayerId>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Payout {
    pub id: PlayerId,
    pub amount: Chips,
    pub hand: String,
}

/// Split contributions into pot tiers. `contributions` should be in seat
/// order; eligibility lists keep that order.
#[must_use]
pub fn build_side_pots(contributions: &[Contribution]) -> Vec<SidePot> {
    let bettors: Vec<&Contribution> = contributions.iter().filter(|c| c.total > 0).collect();
    if bettors.is_empty() {
        return Vec::new();
    }

    let mut levels: Vec<Chips> = bettors
        .iter()
        .filter(|c| c.all_in)
        .map(|c| c.total)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let eligible_above = |floor: Chips, inclusive: bool| -> Vec<PlayerId> {
        bettors
            .iter()
            .filter(|c| !c.folded && (if inclusive { c.total >= floor } else { c.total > floor }))
            .map(|c| c.id.clone())
            .collect()
    };

    let mut pots = Vec::with_capacity(levels.len() + 1);
    let mut processed: Chips = 0;
    for level in levels {
        let amount = bettors
            .iter()
            .map(|c| c.total.min(level) - c.total.min(processed))
            .sum();
        if amount > 0 {
            pots.push(SidePot {
                amount,
                eligible: eligible_above(level, true),
            });
        }
        processed = level;
    }

    let remaining = bettors
        .iter()
        .map(|c| c.total - c.total.min(processed))
        .sum();
    if remaining > 0 {
        pots.push(SidePot {
            amount: remaining,
            eligible: eligible_above(processed, false),
        });
    }

    pots
}

/// Pay out every pot tier. The returned payouts always add up to the sum of
/// the pot amounts.
///
/// A tier nobody eligible can win is folded into the nearest lower tier
/// that has a winner (or the nearest higher one if there is none below).
/// When no tier can be won at all, contributions are refunded.
#[must_use]
pub fn settle(
    pots: &[SidePot],
    contributions: &[Contribution],
    results: &HashMap<PlayerId, HandResult>,
) -> Vec<Payout> {
    let contenders: Vec<Vec<&PlayerId>> = pots
        .iter()
        .map(|pot| pot.eligible.iter().filter(|id| results.contains_key(*id)).collect())
        .collect();
    let awardable: Vec<usize> = (0..pots.len()).filter(|&i| !contenders[i].is_empty()).collect();

    if awardable.is_empty() {
        return contributions
            .iter()
            .filter(|c| c.total > 0)
            .map(|c| Payout {
                id: c.id.clone(),
                amount: c.total,
                hand: REFUND.to_string(),
            })
            .collect();
    }

    let mut amounts: Vec<Chips> = pots.iter().map(|pot| pot.amount).collect();
    for i in 0..pots.len() {
        if !contenders[i].is_empty() {
            continue;
        }
        let target = awardable
            .iter()
            .rev()
            .find(|&&j| j < i)
            .or_else(|| awardable.iter().find(|&&j| j > i))
            .copied();
        if let Some(j) = target {
            log::warn!("pot tier {i} has no eligible hand, merging {} into tier {j}", amounts[i]);
            amounts[j] += amounts[i];
            amounts[i] = 0;
        }
    }

    let mut payouts = Vec::new();
    for i in awardable {
        let amount = amounts[i];
        let mut best: Option<&HandResult> = None;
        let mut winners: Vec<&PlayerId> = Vec::new();
        for &id in &contenders[i] {
            let hand = &results[id];
            match best.map(|b| compare(hand, b)) {
                None | Some(Ordering::Greater) => {
                    best = Some(hand);
                    winners.clear();
                    winners.push(id);
                }
                Some(Ordering::Equal) => winners.push(id),
                Some(Ordering::Less) => {}
            }
        }
        let Some(best) = best else { continue };

        let count = winners.len() as Chips;
        let share = amount / count;
        let remainder = amount % count;
        for (n, id) in winners.into_iter().enumerate() {
            let won = share + if n == 0 { remainder } else { 0 };
            if won > 0 {
                payouts.push(Payout {
                    id: id.clone(),
                    amount: won,
                    hand: best.name.clone(),
                });
            }
        }
    }
    payouts
}
