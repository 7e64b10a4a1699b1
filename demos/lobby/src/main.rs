use std::sync::Arc;
use std::time::Duration;

use cardroom::prelude::*;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
enum Suit { Clubs, Diamonds, Hearts, Spades }

/// Compares by rank first, suit breaks ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct Card { rank: u8, suit: Suit }

#[derive(Debug, Serialize, Deserialize)]
struct HandDealt {
    hand: u64,
    cards: Vec<(Username, Card)>,
    winner: Username,
}

pub struct State {
    seated: Vec<Username>,
    hands_played: u64,
}

fn deck() -> Vec<Card> {
    [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades]
        .into_iter()
        .flat_map(|suit| (2..=14).map(move |rank| Card { rank, suit }))
        .collect()
}

/// Pairs each player with a card and picks the highest.
fn settle(hand: u64, players: &[Username], cards: &[Card]) -> Option<HandDealt> {
    let cards: Vec<(Username, Card)> = players.iter().cloned().zip(cards.iter().copied()).collect();
    let winner = cards.iter().max_by_key(|(_, card)| *card)?.0.clone();
    Some(HandDealt { hand, cards, winner })
}

// ---------------------------------------------------------------------------
// Game rules: one card to every seated player each step, high card wins.
// ---------------------------------------------------------------------------

struct HighCard;

impl GameRules for HighCard {
    type State = State;

    fn init(table: &Table) -> State {
        tracing::info!(table = %table.name, "high card table open");
        State { seated: Vec::new(), hands_played: 0 }
    }

    fn on_player_connected(state: &mut State, username: &Username) -> Vec<WireMessage> {
        state.seated.push(username.clone());
        vec![WireMessage::Log { message: format!("{username} takes a seat") }]
    }

    fn on_player_disconnected(state: &mut State, username: &Username) -> Vec<WireMessage> {
        state.seated.retain(|u| u != username);
        vec![WireMessage::Log { message: format!("{username} leaves the table") }]
    }

    fn step(state: &mut State) -> Result<Vec<WireMessage>, String> {
        if state.seated.len() < 2 {
            return Ok(Vec::new());
        }

        let mut cards = deck();
        cards.shuffle(&mut rand::rng());
        state.hands_played += 1;

        let Some(result) = settle(state.hands_played, &state.seated, &cards) else {
            return Ok(Vec::new());
        };
        let data = serde_json::to_vec(&result).map_err(|e| e.to_string())?;

        Ok(vec![
            WireMessage::Game { data },
            WireMessage::Log { message: format!("hand {} goes to {}", result.hand, result.winner) },
        ])
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

/// Treats the token as the username. Development only.
struct NameIsToken;

impl Authenticator for NameIsToken {
    async fn authenticate(&self, token: &str) -> Result<Username, SessionError> {
        if token.is_empty() {
            return Err(SessionError::AuthFailed("token must name a participant".into()));
        }
        Ok(Username::from(token))
    }
}

fn seed() -> (Arc<InMemoryStore>, Table) {
    let store = Arc::new(InMemoryStore::new());
    let table = store.add_table(Table::new("Main table"));
    for name in ["alice", "bob", "carol", "dave"] {
        store.add_participant(Participant::new(name));
    }
    (store, table)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info,cardroom_table=debug");

    let (store, table) = seed();
    tracing::info!(table_id = %table.id, name = %table.name, "table seeded");

    let server = CardroomServerBuilder::new()
        .bind("0.0.0.0:8080")
        .step_interval(Duration::from_secs(3))
        .build::<HighCard, _, _>(store, NameIsToken)
        .await?;

    server.run().await?;
    Ok(())
}
