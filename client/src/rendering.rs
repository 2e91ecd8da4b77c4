//! Text rendering of the client mirror and of server events for the terminal

use crate::game::ClientGameModel;
use shared::{GameState, Packet};
use std::fmt::Write;

/// Lobby line or a one-line summary of the round
pub fn render_status(model: &ClientGameModel) -> String {
    let Some(round) = model.round() else {
        let players: Vec<String> = model
            .players()
            .iter()
            .map(|name| {
                if model.is_ready(name) {
                    format!("{} (ready)", name)
                } else {
                    name.clone()
                }
            })
            .collect();
        return format!("lobby: {}", players.join(", "));
    };

    let mut status = format!("top: {}", round.top_card);
    if let Some(current) = model.current_player_name() {
        let _ = write!(status, " | to act: {}", current);
    }
    match round.turn.state {
        GameState::AwaitingPlay => {}
        GameState::AwaitingInitialColor => status.push_str(" | waiting for a color"),
        GameState::AwaitingDrawTwoResponse | GameState::AwaitingDrawFourResponse => {
            let _ = write!(status, " | pending draw {}", round.turn.pending_draw);
        }
    }

    let counts: Vec<String> = model
        .card_counts()
        .into_iter()
        .map(|(name, count)| format!("{} {}", name, count))
        .collect();
    let _ = write!(status, " | cards: {}", counts.join(", "));
    status
}

/// Numbered hand listing, marking cards that match the top card
pub fn render_hand(model: &ClientGameModel) -> String {
    if !model.in_round() {
        return "no round in progress".to_string();
    }
    if model.hand().is_empty() {
        return "your hand is empty".to_string();
    }

    let mut out = String::from("your hand:");
    for (i, card) in model.hand().iter().enumerate() {
        let marker = if model.is_card_playable(card) { "*" } else { " " };
        let _ = write!(out, "\n {} {:>2}. {}", marker, i + 1, card);
    }
    out
}

/// One line describing a server event, if it is worth showing
///
/// `model` must already have the packet applied.
pub fn describe_event(packet: &Packet, model: &ClientGameModel) -> Option<String> {
    let line = match packet {
        Packet::PlayerConnected { player_name } => format!("{} joined", player_name),
        Packet::PlayerDisconnected { player_name } => format!("{} left", player_name),
        Packet::PlayerReadyChanged { player_name, ready } => {
            if *ready {
                format!("{} is ready", player_name)
            } else {
                format!("{} is no longer ready", player_name)
            }
        }
        Packet::ChatMessage {
            sender_name,
            message,
        } => format!("<{}> {}", sender_name, message),
        Packet::GameStarted { .. } => format!(
            "round started\n{}\n{}",
            render_status(model),
            render_hand(model)
        ),
        Packet::CardPlayed {
            player_name, card, ..
        } => format!("{} played {}\n{}", player_name, card, render_status(model)),
        Packet::ColorChosen {
            player_name, color, ..
        } => format!("{} chose {}\n{}", player_name, color, render_status(model)),
        Packet::CardsDrawn {
            player_name,
            amount,
            cards,
            ..
        } => {
            if cards.is_empty() {
                format!("{} drew {} card(s)", player_name, amount)
            } else {
                let drawn: Vec<String> = cards.iter().map(ToString::to_string).collect();
                format!("you drew {}", drawn.join(", "))
            }
        }
        Packet::UnoCalled { player_name } => format!("{} called UNO!", player_name),
        Packet::DrawFourChallenged {
            challenger_name,
            offender_name,
            succeeded,
        } => {
            if *succeeded {
                format!(
                    "{} challenged {} and was right",
                    challenger_name, offender_name
                )
            } else {
                format!(
                    "{} challenged {} and was wrong",
                    challenger_name, offender_name
                )
            }
        }
        Packet::GameEnded { winner_name } => match winner_name {
            Some(winner) => format!("{} won the round!", winner),
            None => "round abandoned".to_string(),
        },
        Packet::Notice { message } => format!("server: {}", message),
        _ => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Card, CardColor, Direction, TurnInfo};

    fn round_model() -> ClientGameModel {
        let mut model = ClientGameModel::new("Bob");
        model.apply(&Packet::ConnectionAccepted {
            existing_player_names: vec!["Alice".to_string()],
            ready_player_names: vec![],
        });
        model.apply(&Packet::GameStarted {
            player_names: vec!["Alice".to_string(), "Bob".to_string()],
            hand: vec![
                Card::Numbered {
                    color: CardColor::Blue,
                    number: 3,
                },
                Card::Numbered {
                    color: CardColor::Red,
                    number: 1,
                },
            ],
            card_counts: vec![7, 2],
            top_card: Card::Numbered {
                color: CardColor::Red,
                number: 7,
            },
            turn: TurnInfo {
                current_index: 1,
                direction: Direction::Clockwise,
                state: GameState::AwaitingDrawTwoResponse,
                pending_draw: 2,
            },
        });
        model
    }

    #[test]
    fn test_lobby_status() {
        let mut model = ClientGameModel::new("Bob");
        model.apply(&Packet::ConnectionAccepted {
            existing_player_names: vec!["Alice".to_string()],
            ready_player_names: vec!["Alice".to_string()],
        });
        assert_eq!(render_status(&model), "lobby: Alice (ready), Bob");
    }

    #[test]
    fn test_round_status() {
        let status = render_status(&round_model());
        assert!(status.contains("to act: Bob"));
        assert!(status.contains("pending draw 2"));
        assert!(status.contains("Alice 7, Bob 2"));
    }

    #[test]
    fn test_hand_marks_playable_cards() {
        let hand = render_hand(&round_model());
        let lines: Vec<&str> = hand.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("    1."));
        assert!(lines[2].starts_with(" *  2."));
    }

    #[test]
    fn test_private_and_public_draws() {
        let model = round_model();
        let turn = model.turn().unwrap();
        let public = Packet::CardsDrawn {
            player_name: "Alice".to_string(),
            amount: 2,
            cards: vec![],
            turn,
        };
        assert_eq!(
            describe_event(&public, &model).unwrap(),
            "Alice drew 2 card(s)"
        );
        assert!(describe_event(&Packet::DrawCards, &model).is_none());
    }
}
