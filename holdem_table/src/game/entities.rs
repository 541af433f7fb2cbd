use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self},
    mem::discriminant,
};
use thiserror::Error;

use super::constants;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Heart, Suit::Diamond, Suit::Club, Suit::Spade];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card values.
pub type Value = u8;

pub const MIN_VALUE: Value = 2;
pub const ACE: Value = 14;

/// A card is a tuple of a value (deuce=2u8 ... ace=14u8) and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl Card {
    #[must_use]
    pub fn rank_label(&self) -> String {
        match self.0 {
            11 => "J".to_string(),
            12 => "Q".to_string(),
            13 => "K".to_string(),
            14 => "A".to_string(),
            v => v.to_string(),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = format!("{}/{}", self.rank_label(), self.1);
        write!(f, "{repr:>4}")
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DeckError {
    #[error("deck exhausted: wanted {wanted} cards, {remaining} left")]
    Exhausted { wanted: usize, remaining: usize },
}

/// Cards still to be dealt this hand, consumed from the front.
#[derive(Debug, Default)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A complete 52-card deck in a fresh uniform random order.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::default();
        deck.reset(rng);
        deck
    }

    /// A deck that deals `cards` in exactly the given order.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    /// Rebuild all 52 cards and shuffle them.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.clear();
        for suit in Suit::ALL {
            for value in MIN_VALUE..=ACE {
                self.cards.push(Card(value, suit));
            }
        }
        self.cards.shuffle(rng);
    }

    pub fn deal(&mut self, n: usize) -> Result<Vec<Card>, DeckError> {
        if n > self.cards.len() {
            return Err(DeckError::Exhausted {
                wanted: n,
                remaining: self.cards.len(),
            });
        }
        Ok(self.cards.drain(..n).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Type alias for whole chips. Stacks, bets, and pots are all counted in
/// the same unit as the blinds.
pub type Chips = u32;

/// Identity of a participant as assigned by the transport layer (one per
/// live connection).
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Username(String);

impl Username {
    pub fn new(s: &str) -> Self {
        let mut username: String = s
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        if let Some((idx, _)) = username.char_indices().nth(constants::MAX_NAME_LENGTH) {
            username.truncate(idx);
        }
        Self(username)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Username {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

/// Type alias for seat positions during the game.
pub type SeatIndex = usize;

/// Phases of a hand. `Waiting` is both the initial phase and the phase the
/// table falls back to whenever fewer than two players are seated.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Waiting,
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Phase {
    /// Whether players may submit actions in this phase.
    #[must_use]
    pub fn is_betting(self) -> bool {
        matches!(self, Self::PreFlop | Self::Flop | Self::Turn | Self::River)
    }

    /// The street that follows this one and how many board cards it reveals.
    /// `None` once the river is done; what follows is the showdown.
    #[must_use]
    pub fn next_street(self) -> Option<(Phase, usize)> {
        match self {
            Self::PreFlop => Some((Self::Flop, 3)),
            Self::Flop => Some((Self::Turn, 1)),
            Self::Turn => Some((Self::River, 1)),
            Self::Waiting | Self::River | Self::Showdown => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::PreFlop => "pre-flop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
        };
        write!(f, "{repr}")
    }
}

/// An action submitted by the player whose turn it is. A raise carries the
/// desired total bet for the street; anything below the minimum legal raise
/// is lifted to it, and `None` means "minimum raise".
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Action {
    AllIn,
    Call,
    Check,
    Fold,
    Raise(Option<Chips>),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::AllIn => "all-ins",
            Self::Call => "calls",
            Self::Check => "checks",
            Self::Fold => "folds",
            Self::Raise(Some(amount)) => &format!("raises to {amount}"),
            Self::Raise(None) => "min-raises",
        };
        write!(f, "{repr}")
    }
}

/// One of the options offered to the player to act.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionChoice {
    Fold,
    Check,
    Call { amount: Chips },
    Raise { min: Chips, max: Chips },
    AllIn { amount: Chips },
}

impl fmt::Display for ActionChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fold => "fold".to_string(),
            Self::Check => "check".to_string(),
            Self::Call { amount } => format!("call ({amount})"),
            Self::Raise { min, max } => format!("raise ({min}..={max})"),
            Self::AllIn { amount } => format!("all-in ({amount})"),
        };
        write!(f, "{repr}")
    }
}

// Choices compare by kind only. Amounts are recomputed when the action is
// applied, so a submitted action only has to name an offered kind.
impl Eq for ActionChoice {}

impl PartialEq for ActionChoice {
    fn eq(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other)
    }
}

/// Ordered list of the options currently offered to a player.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActionChoices(pub Vec<ActionChoice>);

impl ActionChoices {
    pub fn contains(&self, action: &Action) -> bool {
        self.0.iter().any(|choice| {
            matches!(
                (choice, action),
                (ActionChoice::Fold, Action::Fold)
                    | (ActionChoice::Check, Action::Check)
                    | (ActionChoice::Call { .. }, Action::Call)
                    | (ActionChoice::Raise { .. }, Action::Raise(_))
                    | (ActionChoice::AllIn { .. }, Action::AllIn)
            )
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionChoice> {
        self.0.iter()
    }
}

impl fmt::Display for ActionChoices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let num_options = self.0.len();
        let repr = self
            .0
            .iter()
            .enumerate()
            .map(|(i, action_choice)| {
                let repr = action_choice.to_string();
                match i {
                    0 if num_options == 1 => repr,
                    0 if num_options == 2 => format!("{repr} "),
                    0 if num_options >= 3 => format!("{repr}, "),
                    i if i == num_options - 1 && num_options != 1 => format!("or {repr}"),
                    _ => format!("{repr}, "),
                }
            })
            .collect::<String>();
        write!(f, "{repr}")
    }
}

impl<I> From<I> for ActionChoices
where
    I: IntoIterator<Item = ActionChoice>,
{
    fn from(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Label of the last thing a player did this street.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LastAction {
    AllIn,
    Call,
    Check,
    Fold,
    Raise,
}

impl fmt::Display for LastAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::AllIn => "all-in",
            Self::Call => "call",
            Self::Check => "check",
            Self::Fold => "fold",
            Self::Raise => "raise",
        };
        write!(f, "{repr}")
    }
}

/// A player occupying a seat. Chips persist across hands; everything else
/// is reset when a hand starts.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: Username,
    pub chips: Chips,
    pub cards: Vec<Card>,
    /// Chips put in on the current street.
    pub bet: Chips,
    /// Chips put in over the whole hand.
    pub total_bet: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub has_acted: bool,
    pub seat_idx: SeatIndex,
    pub last_action: Option<LastAction>,
    /// Marked when the player left mid-hand; removed at the next hand start.
    pub leaving: bool,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, name: Username, chips: Chips, seat_idx: SeatIndex) -> Self {
        Self {
            id,
            name,
            chips,
            cards: Vec::with_capacity(constants::HOLE_CARDS),
            bet: 0,
            total_bet: 0,
            folded: false,
            all_in: false,
            has_acted: false,
            seat_idx,
            last_action: None,
            leaving: false,
        }
    }

    pub fn reset(&mut self) {
        self.cards.clear();
        self.bet = 0;
        self.total_bet = 0;
        self.folded = false;
        self.all_in = false;
        self.has_acted = false;
        self.last_action = None;
    }

    /// Whether the player still has decisions to make this hand.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !self.folded && !self.all_in
    }

    /// Move up to `amount` from the stack into the current bet, returning
    /// what was actually moved.
    pub fn place_bet(&mut self, amount: Chips) -> Chips {
        let actual = amount.min(self.chips);
        self.chips -= actual;
        self.bet += actual;
        self.total_bet += actual;
        if self.chips == 0 {
            self.all_in = true;
        }
        actual
    }
}

/// Someone waiting off the felt: either queued for the next hand or busted
/// and eligible to rebuy.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Entrant {
    pub id: PlayerId,
    pub name: Username,
}

/// A share of a pot paid out at the end of a hand.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Winner {
    pub seat_idx: SeatIndex,
    pub id: PlayerId,
    pub name: Username,
    pub amount: Chips,
    pub hand: String,
}

/// Public view of a seat. Hole cards are only present when the viewer is
/// allowed to see them.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SeatView {
    pub id: PlayerId,
    pub name: Username,
    pub chips: Chips,
    pub bet: Chips,
    pub total_bet: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub seat_idx: SeatIndex,
    pub last_action: Option<LastAction>,
    pub is_dealer: bool,
    pub cards: Option<Vec<Card>>,
}

/// Everything one viewer is allowed to know about the table.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub phase: Phase,
    /// Swept pot plus the bets still in front of players.
    pub pot: Chips,
    pub board: Vec<Card>,
    pub current_bet: Chips,
    pub dealer_seat: Option<SeatIndex>,
    pub small_blind_seat: Option<SeatIndex>,
    pub big_blind_seat: Option<SeatIndex>,
    pub active_seat: Option<SeatIndex>,
    pub hand_number: u64,
    pub viewer: PlayerId,
    pub is_player: bool,
    pub is_pending: bool,
    pub is_spectator: bool,
    pub is_dealing: bool,
    pub seats: Vec<SeatView>,
    pub available_actions: ActionChoices,
    pub winners: Option<Vec<Winner>>,
    pub showdown_hands: BTreeMap<SeatIndex, String>,
    pub action_deadline: Option<DateTime<Utc>>,
    pub can_rebuy: bool,
}

impl TableSnapshot {
    /// The viewer's own seat, if seated.
    #[must_use]
    pub fn own_seat(&self) -> Option<&SeatView> {
        self.seats.iter().find(|seat| seat.id == self.viewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    // === Card Tests ===

    #[test]
    fn test_card_labels() {
        assert_eq!(Card(14, Suit::Spade).rank_label(), "A");
        assert_eq!(Card(10, Suit::Heart).rank_label(), "10");
        assert_eq!(Card(11, Suit::Club).to_string(), " J/♣");
    }

    #[test]
    fn test_card_ordering_by_value_first() {
        assert!(Card(14, Suit::Club) > Card(13, Suit::Heart));
    }

    // === Deck Tests ===

    #[test]
    fn test_deck_has_52_unique_cards() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut deck = Deck::shuffled(&mut rng);
        assert_eq!(deck.len(), 52);
        let cards = deck.deal(52).unwrap();
        let unique: HashSet<_> = cards.iter().collect();
        assert_eq!(unique.len(), 52);
        assert!(cards.iter().all(|c| (2..=14).contains(&c.0)));
        assert!(deck.is_empty());
    }

    #[test]
    fn test_deck_deals_from_front() {
        let mut deck = Deck::from_cards(vec![
            Card(2, Suit::Heart),
            Card(3, Suit::Heart),
            Card(4, Suit::Heart),
        ]);
        assert_eq!(deck.deal(2).unwrap(), vec![Card(2, Suit::Heart), Card(3, Suit::Heart)]);
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn test_deck_exhausted() {
        let mut deck = Deck::from_cards(vec![Card(2, Suit::Heart)]);
        assert_eq!(
            deck.deal(2),
            Err(DeckError::Exhausted {
                wanted: 2,
                remaining: 1
            })
        );
        // Nothing was removed by the failed deal.
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn test_deck_reset_restores_full_deck() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut deck = Deck::shuffled(&mut rng);
        deck.deal(20).unwrap();
        deck.reset(&mut rng);
        assert_eq!(deck.len(), 52);
    }

    #[test]
    fn test_same_seed_same_order() {
        let a = Deck::shuffled(&mut StdRng::seed_from_u64(42)).deal(52).unwrap();
        let b = Deck::shuffled(&mut StdRng::seed_from_u64(42)).deal(52).unwrap();
        assert_eq!(a, b);
    }

    // === Username Tests ===

    #[test]
    fn test_username_sanitized() {
        assert_eq!(Username::new("  alice smith ").as_str(), "alice_smith");
        let long = Username::new("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(long.as_str().chars().count(), constants::MAX_NAME_LENGTH);
    }

    // === Phase Tests ===

    #[test]
    fn test_phase_streets() {
        assert_eq!(Phase::PreFlop.next_street(), Some((Phase::Flop, 3)));
        assert_eq!(Phase::Flop.next_street(), Some((Phase::Turn, 1)));
        assert_eq!(Phase::Turn.next_street(), Some((Phase::River, 1)));
        assert_eq!(Phase::River.next_street(), None);
        assert!(Phase::River.is_betting());
        assert!(!Phase::Showdown.is_betting());
        assert!(!Phase::Waiting.is_betting());
    }

    // === ActionChoices Tests ===

    #[test]
    fn test_action_choices_contains_by_kind() {
        let choices = ActionChoices::from([
            ActionChoice::Fold,
            ActionChoice::Call { amount: 2 },
            ActionChoice::Raise { min: 4, max: 100 },
        ]);
        assert!(choices.contains(&Action::Fold));
        assert!(choices.contains(&Action::Call));
        assert!(choices.contains(&Action::Raise(Some(1000))));
        assert!(!choices.contains(&Action::Check));
        assert!(!choices.contains(&Action::AllIn));
    }

    #[test]
    fn test_action_choice_serializes_tagged() {
        let json = serde_json::to_string(&ActionChoice::Raise { min: 4, max: 100 }).unwrap();
        assert_eq!(json, r#"{"type":"raise","min":4,"max":100}"#);
        let json = serde_json::to_string(&ActionChoice::AllIn { amount: 1 }).unwrap();
        assert_eq!(json, r#"{"type":"allin","amount":1}"#);
    }

    // === Player Tests ===

    #[test]
    fn test_player_place_bet_caps_at_stack() {
        let mut player = Player::new("p1".into(), "alice".into(), 5, 0);
        assert_eq!(player.place_bet(8), 5);
        assert_eq!(player.chips, 0);
        assert_eq!(player.bet, 5);
        assert_eq!(player.total_bet, 5);
        assert!(player.all_in);
        assert!(!player.can_act());
    }

    #[test]
    fn test_player_reset_keeps_chips_and_seat() {
        let mut player = Player::new("p1".into(), "alice".into(), 100, 3);
        player.place_bet(10);
        player.folded = true;
        player.last_action = Some(LastAction::Fold);
        player.reset();
        assert_eq!(player.chips, 90);
        assert_eq!(player.seat_idx, 3);
        assert_eq!(player.bet, 0);
        assert!(!player.folded);
        assert!(player.last_action.is_none());
    }

    #[test]
    fn test_last_action_labels() {
        assert_eq!(LastAction::AllIn.to_string(), "all-in");
        assert_eq!(serde_json::to_string(&LastAction::AllIn).unwrap(), "\"all-in\"");
    }
}
