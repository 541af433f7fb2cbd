//! Hand Evaluation Example
//!
//! Demonstrates how to use the hand evaluation functions to compare poker hands.

use holdem_table::entities::{Card, Suit};
use holdem_table::functional::{compare, evaluate, score_five};
use std::cmp::Ordering;

fn main() {
    println!("=== Poker Hand Evaluation Example ===\n");

    // Example 1: Evaluate a single hand
    println!("Example 1: Evaluating two hole cards with a full board");
    let hole = [Card(14, Suit::Heart), Card(13, Suit::Heart)];
    let board = [
        Card(12, Suit::Heart),
        Card(11, Suit::Heart),
        Card(10, Suit::Heart),
        Card(9, Suit::Spade),
        Card(2, Suit::Club),
    ];
    match evaluate(&hole, &board) {
        Some(result) => println!("Hole {hole:?} on {board:?}: {result}\n"),
        None => println!("Not enough cards\n"),
    }

    // Example 2: Compare two hands on the same board
    println!("Example 2: Comparing two hands");
    let board = [
        Card(10, Suit::Club),
        Card(9, Suit::Diamond),
        Card(2, Suit::Spade),
        Card(6, Suit::Heart),
        Card(4, Suit::Club),
    ];
    let aces = [Card(14, Suit::Spade), Card(14, Suit::Heart)];
    let kings = [Card(13, Suit::Spade), Card(13, Suit::Heart)];

    if let (Some(a), Some(b)) = (evaluate(&aces, &board), evaluate(&kings, &board)) {
        println!("Hand A: {a}");
        println!("Hand B: {b}");
        match compare(&a, &b) {
            Ordering::Greater => println!("\nWinner: Hand A"),
            Ordering::Less => println!("\nWinner: Hand B"),
            Ordering::Equal => println!("\nTie!"),
        }
    }

    // Example 3: The board plays
    println!("\n\nExample 3: Split pot when the board plays");
    let board = [
        Card(14, Suit::Spade),
        Card(13, Suit::Spade),
        Card(12, Suit::Heart),
        Card(11, Suit::Diamond),
        Card(10, Suit::Club),
    ];
    let first = evaluate(&[Card(2, Suit::Heart), Card(3, Suit::Heart)], &board);
    let second = evaluate(&[Card(4, Suit::Club), Card(5, Suit::Diamond)], &board);
    if let (Some(first), Some(second)) = (first, second) {
        println!("{first} vs {second}: {:?}", compare(&first, &second));
    }

    // Example 4: All hand types
    println!("\n\nExample 4: Examples of each hand rank");
    let examples = [
        [(14, Suit::Spade), (13, Suit::Spade), (12, Suit::Spade), (11, Suit::Spade), (10, Suit::Spade)],
        [(9, Suit::Heart), (8, Suit::Heart), (7, Suit::Heart), (6, Suit::Heart), (5, Suit::Heart)],
        [(8, Suit::Spade), (8, Suit::Heart), (8, Suit::Diamond), (8, Suit::Club), (2, Suit::Spade)],
        [(10, Suit::Spade), (10, Suit::Heart), (10, Suit::Diamond), (6, Suit::Club), (6, Suit::Spade)],
        [(13, Suit::Club), (11, Suit::Club), (8, Suit::Club), (5, Suit::Club), (3, Suit::Club)],
        [(5, Suit::Spade), (4, Suit::Heart), (3, Suit::Diamond), (2, Suit::Club), (14, Suit::Spade)],
        [(7, Suit::Spade), (7, Suit::Heart), (7, Suit::Diamond), (12, Suit::Club), (3, Suit::Spade)],
        [(12, Suit::Spade), (12, Suit::Heart), (5, Suit::Diamond), (5, Suit::Club), (2, Suit::Spade)],
        [(9, Suit::Spade), (9, Suit::Heart), (13, Suit::Diamond), (7, Suit::Club), (4, Suit::Spade)],
        [(14, Suit::Spade), (12, Suit::Heart), (10, Suit::Diamond), (7, Suit::Club), (3, Suit::Spade)],
    ];

    for layout in examples {
        let cards: Vec<Card> = layout.iter().map(|&(v, s)| Card(v, s)).collect();
        let result = score_five(&cards);
        println!("{:>16} (rank {}): {:?}", result.name, result.category.rank(), result.tiebreak);
    }

    println!("\n=== End of Hand Evaluation Example ===");
}
