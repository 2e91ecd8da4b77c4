//! Card model and the playability rule shared by client and server
//!
//! Cards are plain values. The only mutation a card ever sees is the one-time
//! colour choice on a wild-family card after it has been played.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of cards dealt to each player at the start of a round
pub const STARTING_HAND_SIZE: usize = 7;

/// Size of a standard deck as built by [`standard_deck`]
pub const STANDARD_DECK_SIZE: usize = 108;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardColor {
    Red,
    Yellow,
    Green,
    Blue,
}

impl CardColor {
    pub const ALL: [CardColor; 4] = [
        CardColor::Red,
        CardColor::Yellow,
        CardColor::Green,
        CardColor::Blue,
    ];
}

impl fmt::Display for CardColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardColor::Red => "Red",
            CardColor::Yellow => "Yellow",
            CardColor::Green => "Green",
            CardColor::Blue => "Blue",
        };
        f.write_str(name)
    }
}

impl FromStr for CardColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(CardColor::Red),
            "yellow" | "y" => Ok(CardColor::Yellow),
            "green" | "g" => Ok(CardColor::Green),
            "blue" | "b" => Ok(CardColor::Blue),
            other => Err(format!("unknown color '{}'", other)),
        }
    }
}

/// A single card
///
/// Colour-bearing cards carry their printed colour. Wild-family cards carry
/// the colour chosen by the player who played them, which is `None` until
/// that choice is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Card {
    Numbered { color: CardColor, number: u8 },
    Skip { color: CardColor },
    Reverse { color: CardColor },
    DrawTwo { color: CardColor },
    Wild { chosen_color: Option<CardColor> },
    WildDrawFour { chosen_color: Option<CardColor> },
}

impl Card {
    /// Effective colour: printed colour, or the chosen colour of a wild card
    pub fn color(&self) -> Option<CardColor> {
        match *self {
            Card::Numbered { color, .. }
            | Card::Skip { color }
            | Card::Reverse { color }
            | Card::DrawTwo { color } => Some(color),
            Card::Wild { chosen_color } | Card::WildDrawFour { chosen_color } => chosen_color,
        }
    }

    pub fn is_wild(&self) -> bool {
        matches!(self, Card::Wild { .. } | Card::WildDrawFour { .. })
    }

    /// Cards the next player must pick up when this card is played
    pub fn draw_amount(&self) -> u32 {
        match self {
            Card::DrawTwo { .. } => 2,
            Card::WildDrawFour { .. } => 4,
            _ => 0,
        }
    }

    /// Assigns the colour of a wild-family card
    ///
    /// Returns false, leaving the card untouched, if the card is not wild or
    /// its colour has already been chosen.
    pub fn choose_color(&mut self, color: CardColor) -> bool {
        match self {
            Card::Wild { chosen_color } | Card::WildDrawFour { chosen_color }
                if chosen_color.is_none() =>
            {
                *chosen_color = Some(color);
                true
            }
            _ => false,
        }
    }

    /// Copy of this card with any chosen colour cleared, as it sits in a deck
    pub fn reset(self) -> Card {
        match self {
            Card::Wild { .. } => Card::Wild { chosen_color: None },
            Card::WildDrawFour { .. } => Card::WildDrawFour { chosen_color: None },
            other => other,
        }
    }

    /// True if this card may be placed on top of `top`
    pub fn is_playable_on(&self, top: &Card) -> bool {
        is_playable(self, top)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Card::Numbered { color, number } => write!(f, "{} {}", color, number),
            Card::Skip { color } => write!(f, "{} Skip", color),
            Card::Reverse { color } => write!(f, "{} Reverse", color),
            Card::DrawTwo { color } => write!(f, "{} Draw Two", color),
            Card::Wild { chosen_color: None } => f.write_str("Wild"),
            Card::Wild {
                chosen_color: Some(color),
            } => write!(f, "Wild ({})", color),
            Card::WildDrawFour { chosen_color: None } => f.write_str("Wild Draw Four"),
            Card::WildDrawFour {
                chosen_color: Some(color),
            } => write!(f, "Wild Draw Four ({})", color),
        }
    }
}

/// Playability rule, checked in order:
///
/// 1. Two numbered cards match on number alone; colour is ignored.
/// 2. Two action cards of the same kind always match.
/// 3. Two colour-bearing cards match on colour. A wild card on the discard
///    pile bears the colour chosen for it.
/// 4. Anything else only accepts a wild-family candidate.
pub fn is_playable(candidate: &Card, top: &Card) -> bool {
    match (candidate, top) {
        (Card::Numbered { number: a, .. }, Card::Numbered { number: b, .. }) => a == b,
        (Card::Skip { .. }, Card::Skip { .. })
        | (Card::Reverse { .. }, Card::Reverse { .. })
        | (Card::DrawTwo { .. }, Card::DrawTwo { .. }) => true,
        _ => match (candidate.color(), top.color()) {
            (Some(a), Some(b)) if !candidate.is_wild() => a == b,
            _ => candidate.is_wild(),
        },
    }
}

/// Builds an unshuffled 108 card deck
pub fn standard_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(STANDARD_DECK_SIZE);

    for color in CardColor::ALL {
        deck.push(Card::Numbered { color, number: 0 });
        for number in 1..=9 {
            deck.push(Card::Numbered { color, number });
            deck.push(Card::Numbered { color, number });
        }
        for _ in 0..2 {
            deck.push(Card::Skip { color });
            deck.push(Card::Reverse { color });
            deck.push(Card::DrawTwo { color });
        }
    }

    for _ in 0..4 {
        deck.push(Card::Wild { chosen_color: None });
        deck.push(Card::WildDrawFour { chosen_color: None });
    }

    deck
}
