//! Turn order and game-state types seen by both ends of the connection

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the game is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    /// The current player must play or draw
    AwaitingPlay,
    /// The current player must choose a colour for the wild card on top
    AwaitingInitialColor,
    /// The current player must stack a draw two or pick up the pending cards
    AwaitingDrawTwoResponse,
    /// The current player must challenge the wild draw four or pick up four
    AwaitingDrawFourResponse,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::AwaitingPlay => "AWAITING_PLAY",
            GameState::AwaitingInitialColor => "AWAITING_INITIAL_COLOR",
            GameState::AwaitingDrawTwoResponse => "AWAITING_DRAW_TWO_RESPONSE",
            GameState::AwaitingDrawFourResponse => "AWAITING_DRAW_FOUR_RESPONSE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    pub fn sign(self) -> isize {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }
}

/// `(current + step * direction) mod player_count`, always non-negative
pub fn advance_index(current: usize, step: usize, direction: Direction, player_count: usize) -> usize {
    if player_count == 0 {
        return 0;
    }
    let moved = current as isize + step as isize * direction.sign();
    moved.rem_euclid(player_count as isize) as usize
}

/// Public turn information broadcast with every game event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInfo {
    pub current_index: usize,
    pub direction: Direction,
    pub state: GameState,
    pub pending_draw: u32,
}
