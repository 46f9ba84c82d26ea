pub mod api;
pub mod config;
pub mod error;
pub mod exchange;
pub mod location;
pub mod logging;
pub mod reply;
pub mod view;

// Re-export main types for convenience
pub use api::{ChatClient, ChatRequest, HealthStatus, HistoryEntry};
pub use config::Config;
pub use error::{ChatError, LocationError};
pub use exchange::{Exchange, Outcome, Submission, SubmissionState};
pub use location::{Location, LocationCell, LocationSource};
pub use reply::{BackendResponse, ParkingCard, PriceEntry, StationCard};
pub use view::{Bubble, BubbleBody, BubbleId, ChatLog, Role};
