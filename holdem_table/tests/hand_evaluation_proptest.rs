//! Property-based tests for hand evaluation using proptest
//!
//! These tests verify that the hand evaluation logic is correct
//! across a wide range of randomly generated card combinations.

use holdem_table::game::{
    entities::{ACE, Card, MIN_VALUE, Suit},
    functional::{HandCategory, compare, evaluate, score_five},
};
use proptest::prelude::*;
use std::{cmp::Ordering, collections::BTreeSet};

// Strategy to generate a valid card (deuce is 2, ace is 14)
fn card_strategy() -> impl Strategy<Value = Card> {
    (MIN_VALUE..=ACE, 0u8..=3).prop_map(|(value, suit_idx)| {
        let suit = match suit_idx {
            0 => Suit::Club,
            1 => Suit::Diamond,
            2 => Suit::Heart,
            _ => Suit::Spade,
        };
        Card(value, suit)
    })
}

// Strategy to generate a vec of unique cards (no duplicates)
fn unique_cards_strategy(n: usize) -> impl Strategy<Value = Vec<Card>> {
    prop::collection::vec(card_strategy(), n).prop_filter("Cards must be unique", |cards| {
        let set: BTreeSet<_> = cards.iter().collect();
        set.len() == cards.len()
    })
}

// 2 hole cards followed by 5 board cards
fn seven_card_hand_strategy() -> impl Strategy<Value = Vec<Card>> {
    unique_cards_strategy(7)
}

proptest! {
    #[test]
    fn test_evaluate_always_scores_seven_cards(cards in seven_card_hand_strategy()) {
        let result = evaluate(&cards[..2], &cards[2..]);
        prop_assert!(result.is_some(), "seven cards should always produce a hand");
        let result = result.unwrap();
        prop_assert!(!result.tiebreak.is_empty());
        prop_assert!(result.tiebreak.iter().all(|v| (1..=ACE).contains(v)));
    }

    #[test]
    fn test_evaluate_deterministic(cards in seven_card_hand_strategy()) {
        let first = evaluate(&cards[..2], &cards[2..]).unwrap();
        let second = evaluate(&cards[..2], &cards[2..]).unwrap();
        prop_assert_eq!(first.category, second.category);
        prop_assert_eq!(first.tiebreak, second.tiebreak);
    }

    #[test]
    fn test_evaluate_ignores_card_order(cards in seven_card_hand_strategy()) {
        let forward = evaluate(&cards[..2], &cards[2..]).unwrap();
        let mut reversed = cards.clone();
        reversed.reverse();
        let backward = evaluate(&reversed[..2], &reversed[2..]).unwrap();
        prop_assert_eq!(compare(&forward, &backward), Ordering::Equal);
    }

    #[test]
    fn test_best_hand_beats_any_five(cards in seven_card_hand_strategy()) {
        let best = evaluate(&cards[..2], &cards[2..]).unwrap();
        for start in 0..=2 {
            let five = score_five(&cards[start..start + 5]);
            prop_assert_ne!(compare(&best, &five), Ordering::Less);
        }
    }

    #[test]
    fn test_more_board_never_hurts(cards in seven_card_hand_strategy()) {
        let flop = evaluate(&cards[..2], &cards[2..5]).unwrap();
        let river = evaluate(&cards[..2], &cards[2..]).unwrap();
        prop_assert_ne!(compare(&river, &flop), Ordering::Less);
    }

    #[test]
    fn test_compare_antisymmetric(
        a in seven_card_hand_strategy(),
        b in seven_card_hand_strategy(),
    ) {
        let a = evaluate(&a[..2], &a[2..]).unwrap();
        let b = evaluate(&b[..2], &b[2..]).unwrap();
        prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
    }

    #[test]
    fn test_category_dominates_tiebreak(
        a in seven_card_hand_strategy(),
        b in seven_card_hand_strategy(),
    ) {
        let a = evaluate(&a[..2], &a[2..]).unwrap();
        let b = evaluate(&b[..2], &b[2..]).unwrap();
        if a.category != b.category {
            prop_assert_eq!(compare(&a, &b), a.category.cmp(&b.category));
        }
    }
}

#[test]
fn test_too_few_cards_is_none() {
    let hole = [Card(ACE, Suit::Spade), Card(ACE, Suit::Heart)];
    assert!(evaluate(&hole, &[]).is_none());
    assert!(evaluate(&hole, &[Card(2, Suit::Club), Card(3, Suit::Club)]).is_none());
}

#[test]
fn test_named_hands() {
    let hole = [Card(ACE, Suit::Spade), Card(13, Suit::Spade)];
    let board = [
        Card(12, Suit::Spade),
        Card(11, Suit::Spade),
        Card(10, Suit::Spade),
        Card(2, Suit::Heart),
        Card(3, Suit::Diamond),
    ];
    let royal = evaluate(&hole, &board).unwrap();
    assert_eq!(royal.category, HandCategory::RoyalFlush);
    assert_eq!(royal.name, "Royal Flush");

    let wheel = evaluate(
        &[Card(ACE, Suit::Club), Card(2, Suit::Diamond)],
        &[
            Card(3, Suit::Heart),
            Card(4, Suit::Spade),
            Card(5, Suit::Club),
            Card(9, Suit::Heart),
            Card(13, Suit::Diamond),
        ],
    )
    .unwrap();
    assert_eq!(wheel.category, HandCategory::Straight);
    assert_eq!(wheel.tiebreak[0], 5);
}
