use thiserror::Error;

/// Everything that can go wrong between sending a message and having a reply
/// to show. Every variant ends up as a text bubble, never as a crash.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("backend sent an empty or invalid reply")]
    InvalidResponse,
}

impl ChatError {
    /// Text shown in the assistant bubble for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Status { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    format!("Erreur serveur ({status})")
                } else {
                    format!("Erreur serveur ({status}) : {body}")
                }
            }
            ChatError::Transport(e) => format!("Erreur : {e}"),
            ChatError::Decode(e) => format!("Erreur : {e}"),
            ChatError::InvalidResponse => "Réponse invalide du backend.".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("no location capability configured")]
    Unavailable,
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geolocation service returned {0}")]
    Status(u16),
}
