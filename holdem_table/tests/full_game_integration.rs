//! Full hand flow integration tests.
//!
//! Plays complete hands through the public engine API with stacked decks,
//! firing the engine's own timers to move between streets.

use holdem_table::{
    GameEvent, GameSettings, HandEngine, LAST_STANDING,
    entities::{Action, Card, Chips, Deck, Phase, PlayerId, Suit},
};

const S: Suit = Suit::Spade;
const H: Suit = Suit::Heart;
const D: Suit = Suit::Diamond;
const C: Suit = Suit::Club;

fn id(name: &str) -> PlayerId {
    PlayerId::new(name)
}

fn table(names: &[&str]) -> HandEngine {
    let mut engine = HandEngine::new(GameSettings {
        seed: Some(11),
        ..GameSettings::default()
    });
    for name in names {
        engine.seat(id(name), (*name).into()).unwrap();
    }
    engine
}

fn deck(cards: &[(u8, Suit)]) -> Deck {
    Deck::from_cards(cards.iter().map(|&(v, s)| Card(v, s)).collect())
}

fn chips(engine: &HandEngine, name: &str) -> Chips {
    engine.player(&id(name)).unwrap().chips
}

fn to_act(engine: &HandEngine) -> PlayerId {
    let seat = engine.active_seat().unwrap();
    engine
        .players()
        .iter()
        .find(|p| p.seat_idx == seat)
        .unwrap()
        .id
        .clone()
}

/// Fire the next timer. Panics if nothing is scheduled.
fn tick(engine: &mut HandEngine) {
    let due = engine.next_deadline().expect("a timer should be pending");
    engine.fire_due(due);
}

fn run_until_turn(engine: &mut HandEngine) {
    while engine.active_seat().is_none() && engine.winners().is_none() {
        tick(engine);
    }
}

fn run_until_paid(engine: &mut HandEngine) {
    while engine.winners().is_none() {
        tick(engine);
    }
}

/// Everyone left in checks until the pots are paid.
fn check_down(engine: &mut HandEngine) {
    loop {
        run_until_turn(engine);
        if engine.winners().is_some() {
            return;
        }
        let actor = to_act(engine);
        engine.apply_action(&actor, Action::Check).unwrap();
    }
}

#[test]
fn test_three_handed_side_pots_across_two_hands() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut engine = table(&["a", "b", "c"]);

    // Hand 1: a raises, b folds, c calls and checks it down to a's aces.
    engine.set_next_deck(deck(&[
        (14, S), (14, H),
        (2, C), (7, D),
        (9, C), (8, D),
        (2, H), (5, C), (11, D), (4, S), (13, C),
    ]));
    engine.start_hand().unwrap();
    assert_eq!(engine.dealer_seat(), Some(0));
    assert_eq!(engine.small_blind_seat(), Some(1));
    assert_eq!(engine.big_blind_seat(), Some(2));
    assert_eq!(to_act(&engine), id("a"));

    engine.apply_action(&id("a"), Action::Raise(Some(100))).unwrap();
    engine.apply_action(&id("b"), Action::Fold).unwrap();
    engine.apply_action(&id("c"), Action::Call).unwrap();
    assert_eq!(engine.total_pot(), 201);

    check_down(&mut engine);
    assert_eq!(engine.board().len(), 5);
    assert_eq!(chips(&engine, "a"), 501);
    assert_eq!(chips(&engine, "b"), 399);
    assert_eq!(chips(&engine, "c"), 300);
    let winners = engine.winners().unwrap();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].hand, "One Pair");

    // The folded hand stays hidden at showdown, the contested ones don't.
    let view = engine.snapshot_for(&id("c"));
    assert_eq!(view.phase, Phase::Showdown);
    assert!(view.seats[0].cards.is_some());
    assert!(view.seats[1].cards.is_none());

    // Hand 2: b shoves, c calls all-in short, a calls. Three-way pot with a
    // side pot between a and b.
    engine.set_next_deck(deck(&[
        (2, S), (7, H),
        (13, S), (13, H),
        (14, C), (14, D),
        (3, C), (8, D), (9, H), (11, S), (4, H),
    ]));
    while engine.hand_number() < 2 {
        tick(&mut engine);
    }
    run_until_turn(&mut engine);
    assert_eq!(engine.dealer_seat(), Some(1));
    assert_eq!(engine.small_blind_seat(), Some(2));
    assert_eq!(engine.big_blind_seat(), Some(0));
    assert_eq!(to_act(&engine), id("b"));

    engine.apply_action(&id("b"), Action::AllIn).unwrap();
    assert!(!engine.available_actions(&id("c")).contains(&Action::Call));
    engine.apply_action(&id("c"), Action::AllIn).unwrap();
    engine.apply_action(&id("a"), Action::Call).unwrap();

    // Only a can still bet, so the board runs out on its own.
    assert_eq!(engine.active_seat(), None);
    run_until_paid(&mut engine);
    assert_eq!(engine.board().len(), 5);
    assert_eq!(chips(&engine, "c"), 900);
    assert_eq!(chips(&engine, "b"), 198);
    assert_eq!(chips(&engine, "a"), 102);
    assert_eq!(engine.chips_in_play(), 1200);
}

#[test]
fn test_idle_table_folds_to_big_blind() {
    let mut engine = table(&["a", "b", "c"]);
    engine.start_hand().unwrap();
    engine.drain_events();

    run_until_paid(&mut engine);
    let events = engine.drain_events();
    let timeouts = events
        .iter()
        .filter(|e| matches!(e, GameEvent::TimedOut(_)))
        .count();
    assert_eq!(timeouts, 2);

    let winners = engine.winners().unwrap();
    assert_eq!(winners[0].id, id("c"));
    assert_eq!(winners[0].hand, LAST_STANDING);
    assert_eq!(chips(&engine, "a"), 400);
    assert_eq!(chips(&engine, "b"), 399);
    assert_eq!(chips(&engine, "c"), 401);
    assert!(engine.board().is_empty());
}

#[test]
fn test_out_of_turn_and_illegal_actions_rejected() {
    use holdem_table::UserError;

    let mut engine = table(&["a", "b", "c"]);
    engine.start_hand().unwrap();
    assert_eq!(
        engine.apply_action(&id("b"), Action::Fold),
        Err(UserError::OutOfTurnAction)
    );
    assert_eq!(
        engine.apply_action(&id("a"), Action::Check),
        Err(UserError::InvalidAction)
    );
    assert_eq!(
        engine.apply_action(&id("nobody"), Action::Fold),
        Err(UserError::UserDoesNotExist)
    );

    // Nothing changed hands.
    assert_eq!(to_act(&engine), id("a"));
    assert_eq!(engine.total_pot(), 3);
}

#[test]
fn test_actions_rejected_while_cards_are_turned() {
    use holdem_table::UserError;

    let mut engine = table(&["a", "b"]);
    engine.start_hand().unwrap();
    let first = to_act(&engine);
    engine.apply_action(&first, Action::Call).unwrap();
    let second = to_act(&engine);
    engine.apply_action(&second, Action::Check).unwrap();

    assert_eq!(engine.phase(), Phase::Flop);
    assert!(engine.is_dealing());
    assert_eq!(engine.active_seat(), None);
    assert_eq!(
        engine.apply_action(&first, Action::Check),
        Err(UserError::DealingInProgress)
    );

    run_until_turn(&mut engine);
    assert!(!engine.is_dealing());
    assert_eq!(engine.board().len(), 3);
}

#[test]
fn test_waiting_with_one_player() {
    let mut engine = table(&["a"]);
    engine.start_hand().unwrap();
    assert_eq!(engine.phase(), Phase::Waiting);
    assert_eq!(engine.hand_number(), 0);
    assert!(engine.next_deadline().is_none());
}
