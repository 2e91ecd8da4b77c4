//! Authoritative game model and turn state machine
//!
//! One `ServerGameModel` exists per round. Every operation validates
//! completely before it touches any pile or hand, so a refused action leaves
//! the model exactly as it was.

use crate::error::GameError;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{
    advance_index, is_playable, standard_deck, Card, CardColor, Direction, GameState, TurnInfo,
    MIN_PLAYERS, STARTING_HAND_SIZE,
};

/// Cards the failed challenger of a wild draw four picks up
pub const FAILED_CHALLENGE_PENALTY: usize = 6;

/// Cards drawn by a player caught without calling UNO
pub const UNO_PENALTY: usize = 2;

/// Remembered about the last wild draw four until someone responds to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrawFourContext {
    offender_index: usize,
    had_alternative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOutcome {
    /// The card as it now lies on the discard pile
    pub card: Card,
    /// The player emptied their hand with this card
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOutcome {
    pub succeeded: bool,
    pub offender_index: usize,
    /// Whoever had to pick up cards
    pub penalized_index: usize,
    pub cards: Vec<Card>,
}

#[derive(Debug)]
pub struct ServerGameModel {
    players: Vec<String>,
    hands: Vec<Vec<Card>>,
    uno_called: Vec<bool>,
    /// Top of the draw pile is the last element
    draw_pile: Vec<Card>,
    /// Played cards below the top card
    discard_pile: Vec<Card>,
    top_card: Card,
    current_index: usize,
    direction: Direction,
    state: GameState,
    pending_draw: u32,
    draw_four: Option<DrawFourContext>,
    /// Choosing the colour of the top wild also passes the turn
    color_choice_advances: bool,
    rng: StdRng,
}

impl ServerGameModel {
    /// Starts a round with a freshly shuffled standard deck
    pub fn new(players: Vec<String>) -> Result<Self, GameError> {
        Self::with_rng(players, StdRng::from_entropy())
    }

    pub fn with_seed(players: Vec<String>, seed: u64) -> Result<Self, GameError> {
        Self::with_rng(players, StdRng::seed_from_u64(seed))
    }

    fn with_rng(players: Vec<String>, mut rng: StdRng) -> Result<Self, GameError> {
        let mut deck = standard_deck();
        deck.shuffle(&mut rng);
        Self::deal(players, deck, rng)
    }

    /// Starts a round from `deck` as given; its last element is the top
    pub fn from_deck(players: Vec<String>, deck: Vec<Card>) -> Result<Self, GameError> {
        Self::deal(players, deck, StdRng::seed_from_u64(0))
    }

    fn deal(players: Vec<String>, mut deck: Vec<Card>, rng: StdRng) -> Result<Self, GameError> {
        if players.len() < MIN_PLAYERS {
            return Err(GameError::InvalidMove(format!(
                "a round needs at least {} players",
                MIN_PLAYERS
            )));
        }
        if deck.len() <= players.len() * STARTING_HAND_SIZE {
            return Err(GameError::PilesExhausted);
        }

        let mut hands = vec![Vec::with_capacity(STARTING_HAND_SIZE); players.len()];
        for _ in 0..STARTING_HAND_SIZE {
            for hand in hands.iter_mut() {
                if let Some(card) = deck.pop() {
                    hand.push(card);
                }
            }
        }

        // A wild draw four may not start the discard pile
        let flip_position = deck
            .iter()
            .rposition(|card| !matches!(card, Card::WildDrawFour { .. }))
            .ok_or(GameError::PilesExhausted)?;
        let top_card = deck.remove(flip_position);

        let player_count = players.len();
        let mut game = Self {
            players,
            hands,
            uno_called: vec![false; player_count],
            draw_pile: deck,
            discard_pile: Vec::new(),
            top_card,
            current_index: 0,
            direction: Direction::Clockwise,
            state: GameState::AwaitingPlay,
            pending_draw: 0,
            draw_four: None,
            color_choice_advances: false,
            rng,
        };
        game.apply_starting_card();

        info!(
            "Round started with {} players, first card {}",
            player_count, game.top_card
        );
        Ok(game)
    }

    /// Builds a round in AWAITING_PLAY from explicit hands and piles
    ///
    /// `current_index` starts at 0 and direction is clockwise. The last
    /// element of `draw_pile` is drawn first.
    pub fn from_parts(
        players: Vec<String>,
        hands: Vec<Vec<Card>>,
        top_card: Card,
        draw_pile: Vec<Card>,
    ) -> Self {
        let player_count = players.len();
        Self {
            players,
            hands,
            uno_called: vec![false; player_count],
            draw_pile,
            discard_pile: Vec::new(),
            top_card,
            current_index: 0,
            direction: Direction::Clockwise,
            state: GameState::AwaitingPlay,
            pending_draw: 0,
            draw_four: None,
            color_choice_advances: false,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// The flipped card acts on the first player as if played just before them
    fn apply_starting_card(&mut self) {
        match self.top_card {
            Card::Skip { .. } => self.advance(1),
            Card::Reverse { .. } => self.direction = self.direction.reversed(),
            Card::Wild { .. } => {
                self.state = GameState::AwaitingInitialColor;
                self.color_choice_advances = false;
            }
            Card::DrawTwo { .. } => {
                self.state = GameState::AwaitingDrawTwoResponse;
                self.pending_draw = 2;
            }
            Card::Numbered { .. } | Card::WildDrawFour { .. } => {}
        }
    }

    /* Queries */

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn player_index(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|player| player == name)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_player_name(&self) -> &str {
        &self.players[self.current_index]
    }

    pub fn last_played_card(&self) -> &Card {
        &self.top_card
    }

    pub fn hand(&self, player: usize) -> Option<&[Card]> {
        self.hands.get(player).map(|hand| hand.as_slice())
    }

    pub fn card_counts(&self) -> Vec<usize> {
        self.hands.iter().map(|hand| hand.len()).collect()
    }

    pub fn is_card_playable(&self, card: &Card) -> bool {
        is_playable(card, &self.top_card)
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn pending_draw(&self) -> u32 {
        self.pending_draw
    }

    pub fn has_called_uno(&self, player: usize) -> bool {
        self.uno_called.get(player).copied().unwrap_or(false)
    }

    pub fn draw_pile_len(&self) -> usize {
        self.draw_pile.len()
    }

    /// Cards on the discard pile including the top card
    pub fn discard_pile_len(&self) -> usize {
        self.discard_pile.len() + 1
    }

    pub fn turn_info(&self) -> TurnInfo {
        TurnInfo {
            current_index: self.current_index,
            direction: self.direction,
            state: self.state,
            pending_draw: self.pending_draw,
        }
    }

    /* Mutations */

    pub fn play_card(
        &mut self,
        player: usize,
        card_index: usize,
        chosen_color: Option<CardColor>,
    ) -> Result<PlayOutcome, GameError> {
        self.check_player(player)?;
        if !matches!(
            self.state,
            GameState::AwaitingPlay | GameState::AwaitingDrawTwoResponse
        ) {
            return Err(self.wrong_state("play a card"));
        }
        self.check_turn(player)?;

        let card = *self.hands[player]
            .get(card_index)
            .ok_or(GameError::NoSuchCard(card_index))?;

        if self.state == GameState::AwaitingDrawTwoResponse
            && !matches!(card, Card::DrawTwo { .. })
        {
            return Err(GameError::InvalidMove(
                "only another draw two can be played on a pending draw two".to_string(),
            ));
        }
        if !self.is_card_playable(&card) {
            return Err(GameError::CardNotPlayable(card.to_string()));
        }
        if matches!(card, Card::WildDrawFour { .. }) && chosen_color.is_none() {
            return Err(GameError::ColorRequired);
        }
        if !card.is_wild() && chosen_color.is_some() {
            return Err(GameError::InvalidMove(format!(
                "{} does not take a color",
                card
            )));
        }

        let had_alternative = matches!(card, Card::WildDrawFour { .. })
            && self.hands[player].iter().enumerate().any(|(i, other)| {
                i != card_index
                    && !matches!(other, Card::WildDrawFour { .. })
                    && is_playable(other, &self.top_card)
            });

        let mut card = self.hands[player].remove(card_index);
        if let Some(color) = chosen_color {
            card.choose_color(color);
        }
        self.refresh_uno_flag(player);

        let previous = std::mem::replace(&mut self.top_card, card);
        self.discard_pile.push(previous);

        debug!("{} played {}", self.players[player], card);

        if self.hands[player].is_empty() {
            info!("{} has emptied their hand", self.players[player]);
            return Ok(PlayOutcome { card, won: true });
        }

        match card {
            Card::Numbered { .. } => self.advance(1),
            Card::Skip { .. } => self.advance(2),
            Card::Reverse { .. } => {
                self.direction = self.direction.reversed();
                self.advance(1);
            }
            Card::Wild { chosen_color: None } => {
                self.state = GameState::AwaitingInitialColor;
                self.color_choice_advances = true;
            }
            Card::Wild { .. } => self.advance(1),
            Card::DrawTwo { .. } => {
                self.pending_draw += 2;
                self.state = GameState::AwaitingDrawTwoResponse;
                self.advance(1);
            }
            Card::WildDrawFour { .. } => {
                self.pending_draw = 4;
                self.state = GameState::AwaitingDrawFourResponse;
                self.draw_four = Some(DrawFourContext {
                    offender_index: player,
                    had_alternative,
                });
                self.advance(1);
            }
        }

        Ok(PlayOutcome { card, won: false })
    }

    /// Sets the colour of the wild card on top of the discard pile
    pub fn choose_color(&mut self, player: usize, color: CardColor) -> Result<(), GameError> {
        self.check_player(player)?;
        if self.state != GameState::AwaitingInitialColor {
            return Err(self.wrong_state("choose a color"));
        }
        self.check_turn(player)?;

        if !self.top_card.choose_color(color) {
            return Err(GameError::InvalidMove(format!(
                "the color of {} is already chosen",
                self.top_card
            )));
        }

        self.state = GameState::AwaitingPlay;
        if self.color_choice_advances {
            self.advance(1);
        }
        self.color_choice_advances = false;
        Ok(())
    }

    /// Current player picks up cards: one on a normal turn, or the pending
    /// amount when responding to a draw card. The turn then passes.
    pub fn draw_cards(&mut self, player: usize) -> Result<Vec<Card>, GameError> {
        self.check_player(player)?;
        let amount = match self.state {
            GameState::AwaitingPlay => 1,
            GameState::AwaitingDrawTwoResponse | GameState::AwaitingDrawFourResponse => {
                self.pending_draw as usize
            }
            GameState::AwaitingInitialColor => return Err(self.wrong_state("draw cards")),
        };
        self.check_turn(player)?;

        let cards = self.take_cards(amount)?;
        self.hands[player].extend_from_slice(&cards);
        self.refresh_uno_flag(player);

        self.end_response();
        self.advance(1);
        Ok(cards)
    }

    /// Current player disputes the wild draw four played on them
    pub fn challenge_draw_four(&mut self, player: usize) -> Result<ChallengeOutcome, GameError> {
        self.check_player(player)?;
        if self.state != GameState::AwaitingDrawFourResponse {
            return Err(self.wrong_state("challenge a wild draw four"));
        }
        self.check_turn(player)?;

        let context = self.draw_four.ok_or_else(|| {
            GameError::InvalidMove("there is no wild draw four to challenge".to_string())
        })?;

        let (penalized_index, amount) = if context.had_alternative {
            (context.offender_index, self.pending_draw as usize)
        } else {
            (player, FAILED_CHALLENGE_PENALTY)
        };

        let cards = self.take_cards(amount)?;
        self.hands[penalized_index].extend_from_slice(&cards);
        self.refresh_uno_flag(penalized_index);

        self.end_response();
        self.advance(1);

        Ok(ChallengeOutcome {
            succeeded: context.had_alternative,
            offender_index: context.offender_index,
            penalized_index,
            cards,
        })
    }

    pub fn call_uno(&mut self, player: usize) -> Result<(), GameError> {
        self.check_player(player)?;
        if self.hands[player].len() != 1 {
            return Err(GameError::InvalidMove(
                "UNO can only be called while holding one card".to_string(),
            ));
        }
        if self.uno_called[player] {
            return Err(GameError::InvalidMove("UNO was already called".to_string()));
        }

        self.uno_called[player] = true;
        Ok(())
    }

    /// Catches `target` holding one card without having called UNO
    pub fn challenge_uno(&mut self, challenger: usize, target: usize) -> Result<Vec<Card>, GameError> {
        self.check_player(challenger)?;
        self.check_player(target)?;
        if challenger == target {
            return Err(GameError::InvalidMove(
                "players cannot challenge themselves".to_string(),
            ));
        }
        if self.hands[target].len() != 1 || self.uno_called[target] {
            return Err(GameError::InvalidMove(format!(
                "{} cannot be challenged for UNO",
                self.players[target]
            )));
        }

        let cards = self.take_cards(UNO_PENALTY)?;
        self.hands[target].extend_from_slice(&cards);
        self.refresh_uno_flag(target);
        Ok(cards)
    }

    /* Internals */

    fn check_player(&self, player: usize) -> Result<(), GameError> {
        if player < self.players.len() {
            Ok(())
        } else {
            Err(GameError::UnknownPlayer(format!("seat {}", player)))
        }
    }

    fn check_turn(&self, player: usize) -> Result<(), GameError> {
        if player == self.current_index {
            Ok(())
        } else {
            Err(GameError::NotYourTurn(self.players[player].clone()))
        }
    }

    fn wrong_state(&self, action: &'static str) -> GameError {
        GameError::WrongState {
            action,
            state: self.state,
        }
    }

    fn advance(&mut self, step: usize) {
        self.current_index =
            advance_index(self.current_index, step, self.direction, self.players.len());
    }

    fn end_response(&mut self) {
        self.state = GameState::AwaitingPlay;
        self.pending_draw = 0;
        self.draw_four = None;
    }

    fn refresh_uno_flag(&mut self, player: usize) {
        if self.hands[player].len() != 1 {
            self.uno_called[player] = false;
        }
    }

    /// Removes `amount` cards from the draw pile, reshuffling the discard
    /// pile (minus its top) into it when it runs out
    fn take_cards(&mut self, amount: usize) -> Result<Vec<Card>, GameError> {
        if self.draw_pile.len() + self.discard_pile.len() < amount {
            return Err(GameError::PilesExhausted);
        }

        let mut cards = Vec::with_capacity(amount);
        for _ in 0..amount {
            if self.draw_pile.is_empty() {
                self.reshuffle_discard_pile();
            }
            match self.draw_pile.pop() {
                Some(card) => cards.push(card),
                None => return Err(GameError::PilesExhausted),
            }
        }
        Ok(cards)
    }

    fn reshuffle_discard_pile(&mut self) {
        debug!(
            "Draw pile exhausted, reshuffling {} discarded cards",
            self.discard_pile.len()
        );
        self.draw_pile
            .extend(self.discard_pile.drain(..).map(Card::reset));
        self.draw_pile.shuffle(&mut self.rng);
    }
}
