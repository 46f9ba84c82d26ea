//! UI-agnostic chat log.
//!
//! The log only grows: bubbles are appended and never edited, except the
//! typing placeholder which is replaced exactly once by the reply it stands
//! for. Frontends (the terminal UI, the one-shot CLI) read it to draw.

use serde::{Deserialize, Serialize};

use crate::api::HistoryEntry;
use crate::error::ChatError;
use crate::reply::{BackendResponse, ParkingCard, StationCard};

pub const CARDS_INTRO: &str = "Voici ce que j'ai trouvé :";
pub const BEST_PRICE: &str = "Meilleur prix";

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BubbleBody {
    Text(String),
    Stations(Vec<StationCard>),
    Parkings(Vec<ParkingCard>),
    Typing,
}

impl From<BackendResponse> for BubbleBody {
    fn from(response: BackendResponse) -> Self {
        match response {
            BackendResponse::Text { text } => BubbleBody::Text(text),
            BackendResponse::Stations { stations } => BubbleBody::Stations(stations),
            BackendResponse::Parkings { parkings } => BubbleBody::Parkings(parkings),
        }
    }
}

impl From<&ChatError> for BubbleBody {
    fn from(error: &ChatError) -> Self {
        BubbleBody::Text(error.user_message())
    }
}

impl From<Result<BackendResponse, ChatError>> for BubbleBody {
    fn from(result: Result<BackendResponse, ChatError>) -> Self {
        match result {
            Ok(response) => response.into(),
            Err(error) => (&error).into(),
        }
    }
}

impl BubbleBody {
    pub fn is_cards(&self) -> bool {
        matches!(self, BubbleBody::Stations(_) | BubbleBody::Parkings(_))
    }

    /// Plain-text rendering, one entry per output line.
    pub fn plain_lines(&self) -> Vec<String> {
        match self {
            BubbleBody::Text(text) => text.lines().map(str::to_string).collect(),
            BubbleBody::Typing => vec!["...".to_string()],
            BubbleBody::Stations(stations) => {
                let mut lines = vec![CARDS_INTRO.to_string()];
                for station in stations {
                    lines.extend(station_lines(station));
                }
                lines
            }
            BubbleBody::Parkings(parkings) => {
                let mut lines = vec![CARDS_INTRO.to_string()];
                for parking in parkings {
                    lines.extend(parking_lines(parking));
                }
                lines
            }
        }
    }
}

pub fn station_lines(station: &StationCard) -> Vec<String> {
    let mut lines = Vec::new();
    if station.postal_code.is_empty() {
        lines.push(format!("⛽ {} · {}", station.name, station.distance_label()));
    } else {
        lines.push(format!(
            "⛽ {} ({}) · {}",
            station.name,
            station.postal_code,
            station.distance_label()
        ));
    }
    for price in &station.prices {
        lines.push(format!("   {} : {} €/L", price.label, price.price));
    }
    if station.best {
        lines.push(format!("   ★ {BEST_PRICE}"));
    }
    lines
}

pub fn parking_lines(parking: &ParkingCard) -> Vec<String> {
    let mut lines = vec![
        format!("🅿 {} · {}", parking.name, parking.distance_label()),
    ];
    if parking.status.is_empty() {
        lines.push(format!("   {}", parking.availability_label()));
    } else {
        lines.push(format!("   {} · {}", parking.status, parking.availability_label()));
    }
    for price in &parking.prices {
        lines.push(format!("   {} : {}", price.label, price.price));
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BubbleId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub id: BubbleId,
    pub role: Role,
    pub body: BubbleBody,
}

#[derive(Debug, Default)]
pub struct ChatLog {
    bubbles: Vec<Bubble>,
    next_id: u64,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn push_user(&mut self, text: &str) -> BubbleId {
        self.push(Role::User, BubbleBody::Text(text.to_string()))
    }

    pub fn push_typing(&mut self) -> BubbleId {
        self.push(Role::Assistant, BubbleBody::Typing)
    }

    pub fn push_assistant(&mut self, body: BubbleBody) -> BubbleId {
        self.push(Role::Assistant, body)
    }

    /// Replaces the typing placeholder `typing` with `body`, keeping its
    /// position. Returns false (and appends instead) if the placeholder is
    /// gone.
    pub fn resolve(&mut self, typing: BubbleId, body: BubbleBody) -> bool {
        let slot = self
            .bubbles
            .iter_mut()
            .find(|b| b.id == typing && b.body == BubbleBody::Typing);

        match slot {
            Some(bubble) => {
                bubble.body = body;
                true
            }
            None => {
                self.push_assistant(body);
                false
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.bubbles.iter().filter(|b| b.body == BubbleBody::Typing).count()
    }

    /// Text exchanges so far, in the `{role, content}` shape the backend
    /// accepts as history. Cards and placeholders are skipped.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.bubbles
            .iter()
            .filter_map(|b| match &b.body {
                BubbleBody::Text(text) => Some(HistoryEntry {
                    role: b.role.as_str().to_string(),
                    content: text.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, role: Role, body: BubbleBody) -> BubbleId {
        let id = BubbleId(self.next_id);
        self.next_id += 1;
        self.bubbles.push(Bubble { id, role, body });
        id
    }
}
