//! Turning the backend's JSON reply into one of the three display shapes.
//!
//! The backend may tag its reply explicitly with `type`. Untagged replies
//! are classified from their `data` array: a first record carrying an
//! `available` field means parkings, anything else means fuel stations, and
//! an empty or missing array means plain text from `response`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ChatError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendResponse {
    Text { text: String },
    Stations { stations: Vec<StationCard> },
    Parkings { parkings: Vec<ParkingCard> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEntry {
    pub label: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationCard {
    pub name: String,
    pub postal_code: String,
    pub distance_km: Option<f64>,
    /// Only the first (cheapest) station of a list is marked.
    pub best: bool,
    pub prices: Vec<PriceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkingCard {
    pub name: String,
    pub distance_km: Option<f64>,
    /// `None` when the backend has no live count for this parking.
    pub available: Option<u32>,
    pub total: u32,
    pub status: String,
    pub prices: Vec<PriceEntry>,
}

impl StationCard {
    pub fn distance_label(&self) -> String {
        distance_label(self.distance_km)
    }
}

impl ParkingCard {
    pub fn distance_label(&self) -> String {
        distance_label(self.distance_km)
    }

    pub fn availability_label(&self) -> String {
        match self.available {
            Some(available) => format!("{available}/{} places", self.total),
            None => format!("?/{} places", self.total),
        }
    }
}

pub fn distance_label(distance_km: Option<f64>) -> String {
    match distance_km {
        Some(km) => format!("{km:.1} km"),
        None => "distance inconnue".to_string(),
    }
}

/// Drops control characters (escape sequences included) so backend text
/// cannot drive the terminal. Newlines and tabs are kept.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Reply body as sent by the backend, before classification.
#[derive(Debug, Default, Deserialize)]
pub struct RawReply {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub response: Option<String>,
    pub text: Option<String>,
    pub data: Option<Value>,
    pub stations: Option<Value>,
    pub parkings: Option<Value>,
}

impl RawReply {
    pub fn from_body(body: &str) -> Result<Self, ChatError> {
        let value: Value = serde_json::from_str(body)?;
        if !value.is_object() {
            return Err(ChatError::InvalidResponse);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn classify(self) -> Result<BackendResponse, ChatError> {
        match self.kind.as_deref() {
            Some("text") => self.into_text(),
            Some("stations") | Some("prices") => {
                match non_empty_array(self.stations.as_ref())
                    .or_else(|| non_empty_array(self.data.as_ref()))
                {
                    Some(records) => {
                        Ok(BackendResponse::Stations { stations: reshape_stations(records)? })
                    }
                    None => self.into_text(),
                }
            }
            Some("parkings") => {
                match non_empty_array(self.parkings.as_ref())
                    .or_else(|| non_empty_array(self.data.as_ref()))
                {
                    Some(records) => {
                        Ok(BackendResponse::Parkings { parkings: reshape_parkings(records)? })
                    }
                    None => self.into_text(),
                }
            }
            _ => match non_empty_array(self.data.as_ref()) {
                Some(records) if looks_like_parking(&records[0]) => {
                    Ok(BackendResponse::Parkings { parkings: reshape_parkings(records)? })
                }
                Some(records) => {
                    Ok(BackendResponse::Stations { stations: reshape_stations(records)? })
                }
                None => self.into_text(),
            },
        }
    }

    fn into_text(self) -> Result<BackendResponse, ChatError> {
        self.response
            .or(self.text)
            .filter(|text| !text.trim().is_empty())
            .map(|text| BackendResponse::Text { text: sanitize(&text) })
            .ok_or(ChatError::InvalidResponse)
    }
}

/// Parses and classifies a successful reply body.
pub fn parse_reply(body: &str) -> Result<BackendResponse, ChatError> {
    RawReply::from_body(body)?.classify()
}

fn non_empty_array(value: Option<&Value>) -> Option<&[Value]> {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .filter(|records| !records.is_empty())
}

fn looks_like_parking(record: &Value) -> bool {
    record.as_object().is_some_and(|fields| fields.contains_key("available"))
}

#[derive(Deserialize)]
struct StationRecord {
    #[serde(default)]
    adresse: String,
    #[serde(default)]
    ville: String,
    #[serde(default, deserialize_with = "string_or_number")]
    cp: String,
    fuel_type: Option<String>,
    price: f64,
    distance_km: Option<f64>,
}

#[derive(Deserialize)]
struct ParkingRecord {
    #[serde(default = "unknown_parking")]
    name: String,
    distance_km: Option<f64>,
    #[serde(default)]
    available: Option<u32>,
    #[serde(default)]
    total: Option<u32>,
    #[serde(default)]
    status: String,
    pricing: Option<Map<String, Value>>,
}

fn unknown_parking() -> String {
    "Parking inconnu".to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn reshape_stations(records: &[Value]) -> Result<Vec<StationCard>, ChatError> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| -> Result<StationCard, ChatError> {
            let station: StationRecord = serde_json::from_value(record.clone())?;
            let name = match (station.adresse.trim(), station.ville.trim()) {
                ("", city) => city.to_string(),
                (address, "") => address.to_string(),
                (address, city) => format!("{address}, {city}"),
            };
            Ok(StationCard {
                name: sanitize(&name),
                postal_code: sanitize(&station.cp),
                distance_km: station.distance_km,
                best: i == 0,
                prices: vec![PriceEntry {
                    label: sanitize(station.fuel_type.as_deref().unwrap_or("Carburant")),
                    price: format!("{:.3}", station.price),
                }],
            })
        })
        .collect()
}

fn reshape_parkings(records: &[Value]) -> Result<Vec<ParkingCard>, ChatError> {
    records
        .iter()
        .map(|record| -> Result<ParkingCard, ChatError> {
            let parking: ParkingRecord = serde_json::from_value(record.clone())?;
            let prices = parking
                .pricing
                .unwrap_or_default()
                .into_iter()
                .map(|(duration, price)| PriceEntry {
                    label: sanitize(&duration),
                    price: match price {
                        Value::String(s) => sanitize(&s),
                        Value::Number(n) => format!("{:.2}€", n.as_f64().unwrap_or_default()),
                        other => other.to_string(),
                    },
                })
                .collect();
            Ok(ParkingCard {
                name: sanitize(&parking.name),
                distance_km: parking.distance_km,
                available: parking.available,
                total: parking.total.unwrap_or_default(),
                status: sanitize(&parking.status),
                prices,
            })
        })
        .collect()
}
