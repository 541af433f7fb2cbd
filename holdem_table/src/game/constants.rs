//! Table-wide limits that follow from the rules of hold'em.

/// Seats at a single table. Seat indices run `0..MAX_PLAYERS`.
pub const MAX_PLAYERS: usize = 10;

/// Hole cards dealt to each seated player.
pub const HOLE_CARDS: usize = 2;

/// Community cards on a complete board.
pub const BOARD_CARDS: usize = 5;

/// Cards in a fresh deck.
pub const DECK_SIZE: usize = 52;

/// Display names are clipped to this many characters.
pub const MAX_NAME_LENGTH: usize = 16;

// Every hand must fit in one deck.
const _: () = assert!(MAX_PLAYERS * HOLE_CARDS + BOARD_CARDS <= DECK_SIZE);
