//! Terminal command parsing
//!
//! One line of user input becomes at most one packet. Names in outgoing
//! packets are left empty because the server fills in the sender itself.

use shared::{CardColor, Packet};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  ready | unready          toggle readiness for the next round
  say <text>               chat with the lobby
  play <n> [color]         play card n of your hand (wilds take a color)
  color <color>            choose the color of the wild on top
  draw                     draw a card, or take the pending penalty
  uno                      call UNO while holding one card
  challenge-uno <name>     catch a player who forgot to call UNO
  challenge                dispute a wild draw four played on you
  hand                     show your hand
  quit                     leave the server";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(Packet),
    ShowHand,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a card number")]
    InvalidCardNumber(String),
    #[error("{0}")]
    InvalidColor(String),
}

fn parse_color(word: &str) -> Result<CardColor, CommandError> {
    word.parse::<CardColor>().map_err(CommandError::InvalidColor)
}

/// Turns a line of user input into a command
///
/// Card numbers are 1-based as shown by `hand`; the packet carries the
/// 0-based index.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let packet = match word.to_ascii_lowercase().as_str() {
        "" => return Err(CommandError::Empty),
        "help" | "?" => return Ok(Command::Help),
        "hand" => return Ok(Command::ShowHand),
        "quit" | "exit" => return Ok(Command::Quit),

        "ready" | "unready" => Packet::PlayerReadyChanged {
            player_name: String::new(),
            ready: word.eq_ignore_ascii_case("ready"),
        },

        "say" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("say <text>"));
            }
            Packet::ChatMessage {
                sender_name: String::new(),
                message: rest.to_string(),
            }
        }

        "play" => {
            let mut args = rest.split_whitespace();
            let number = args.next().ok_or(CommandError::Usage("play <n> [color]"))?;
            let card_index = match number.parse::<usize>() {
                Ok(n) if n >= 1 => n - 1,
                _ => return Err(CommandError::InvalidCardNumber(number.to_string())),
            };
            let chosen_color = args.next().map(parse_color).transpose()?;
            if args.next().is_some() {
                return Err(CommandError::Usage("play <n> [color]"));
            }
            Packet::PlayCard {
                card_index,
                chosen_color,
            }
        }

        "color" | "colour" => {
            if rest.is_empty() || rest.contains(char::is_whitespace) {
                return Err(CommandError::Usage("color <color>"));
            }
            Packet::ChooseColor {
                color: parse_color(rest)?,
            }
        }

        "draw" => Packet::DrawCards,
        "uno" => Packet::CallUno,
        "challenge" => Packet::ChallengeDrawFour,

        "challenge-uno" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("challenge-uno <name>"));
            }
            Packet::ChallengeUno {
                target_name: rest.to_string(),
            }
        }

        _ => return Err(CommandError::Unknown(word.to_string())),
    };

    Ok(Command::Send(packet))
}
