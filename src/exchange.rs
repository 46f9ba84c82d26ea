//! One chat round trip: validate the input, show it, send it, show the reply.
//!
//! Each submission goes `Idle -> Sent -> Rendered | Errored`. The steps are
//! split so the terminal UI can run the network part in a background task
//! while the log is only touched from the UI loop.

use tracing::{debug, info, warn};

use crate::api::{ChatClient, ChatRequest};
use crate::error::ChatError;
use crate::location::LocationCell;
use crate::reply::{sanitize, BackendResponse};
use crate::view::{BubbleBody, BubbleId, ChatLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Sent,
    Rendered,
    Errored,
}

/// A message that has been shown and is waiting for its reply.
#[derive(Debug, Clone)]
pub struct Submission {
    pub typing: BubbleId,
    pub request: ChatRequest,
}

impl Submission {
    /// Performs the request. Never fails: errors are carried in the outcome.
    pub async fn deliver(self, client: &ChatClient) -> Outcome {
        let result = client.send(&self.request).await;
        if let Err(e) = &result {
            warn!(error = %e, "chat request failed");
        }
        Outcome { typing: self.typing, result }
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub typing: BubbleId,
    pub result: Result<BackendResponse, ChatError>,
}

impl Outcome {
    pub fn state(&self) -> SubmissionState {
        match self.result {
            Ok(_) => SubmissionState::Rendered,
            Err(_) => SubmissionState::Errored,
        }
    }

    /// Swaps the typing placeholder for the rendered reply or error text.
    pub fn apply(self, log: &mut ChatLog) -> SubmissionState {
        let state = self.state();
        log.resolve(self.typing, BubbleBody::from(self.result));
        state
    }
}

#[derive(Clone)]
pub struct Exchange {
    client: ChatClient,
    location: LocationCell,
    send_history: bool,
}

impl Exchange {
    pub fn new(client: ChatClient, location: LocationCell, send_history: bool) -> Self {
        Self { client, location, send_history }
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn location(&self) -> &LocationCell {
        &self.location
    }

    /// Shows the user's message and a typing placeholder, and builds the
    /// request. Blank input gives `None` and leaves the log untouched.
    pub fn begin(&self, log: &mut ChatLog, input: &str) -> Option<Submission> {
        let message = input.trim();
        if message.is_empty() {
            return None;
        }

        let history = if self.send_history { log.history() } else { Vec::new() };
        let request = ChatRequest::new(message, history, self.location.get());

        log.push_user(&sanitize(message));
        let typing = log.push_typing();

        debug!(
            state = ?SubmissionState::Sent,
            ?typing,
            history = request.history.len(),
            "submission started"
        );
        Some(Submission { typing, request })
    }

    /// Runs a whole submission in place. Used where no UI loop is running.
    pub async fn submit(&self, log: &mut ChatLog, input: &str) -> SubmissionState {
        let Some(submission) = self.begin(log, input) else {
            return SubmissionState::Idle;
        };

        let outcome = submission.deliver(&self.client).await;
        let state = outcome.apply(log);
        info!(?state, "submission finished");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;

    fn exchange(send_history: bool) -> Exchange {
        // Port 9 (discard) is never listened on in tests
        Exchange::new(ChatClient::new("http://127.0.0.1:9"), LocationCell::new(), send_history)
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let exchange = exchange(false);
        let mut log = ChatLog::new();
        assert!(exchange.begin(&mut log, "").is_none());
        assert!(exchange.begin(&mut log, "   \t\n").is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_begin_shows_user_and_placeholder() {
        let exchange = exchange(false);
        let mut log = ChatLog::new();
        let submission = exchange.begin(&mut log, "  prix gazole  ").unwrap();

        assert_eq!(submission.request.message, "prix gazole");
        assert!(submission.request.history.is_empty());
        assert_eq!(submission.request.latitude, None);
        assert_eq!(log.len(), 2);
        assert_eq!(log.bubbles()[0].body, BubbleBody::Text("prix gazole".to_string()));
        assert_eq!(log.bubbles()[1].id, submission.typing);
        assert_eq!(log.pending(), 1);
    }

    #[test]
    fn test_request_reads_location_cell() {
        let exchange = exchange(false);
        let mut log = ChatLog::new();

        let before = exchange.begin(&mut log, "a").unwrap();
        assert_eq!(before.request.longitude, None);

        exchange.location().set_if_unset(Location { lat: 48.1173, lon: -1.6778 });
        let after = exchange.begin(&mut log, "b").unwrap();
        assert_eq!(after.request.latitude, Some(48.1173));
        assert_eq!(after.request.longitude, Some(-1.6778));
    }

    #[test]
    fn test_history_only_when_enabled() {
        let mut log = ChatLog::new();
        log.push_user("bonjour");
        log.push_assistant(BubbleBody::Text("salut".to_string()));

        let without = exchange(false).begin(&mut log, "encore").unwrap();
        assert!(without.request.history.is_empty());

        let with = exchange(true).begin(&mut log, "et alors").unwrap();
        // The pending placeholder from the previous submission is not history
        assert_eq!(with.request.history.len(), 3);
        assert_eq!(with.request.history[2].content, "encore");
    }

    #[test]
    fn test_outcome_error_replaces_placeholder() {
        let exchange = exchange(false);
        let mut log = ChatLog::new();
        let submission = exchange.begin(&mut log, "hello").unwrap();

        let outcome = Outcome {
            typing: submission.typing,
            result: Err(ChatError::InvalidResponse),
        };
        assert_eq!(outcome.apply(&mut log), SubmissionState::Errored);
        assert_eq!(log.pending(), 0);
        assert_eq!(
            log.bubbles()[1].body,
            BubbleBody::Text("Réponse invalide du backend.".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_renders_error() {
        let exchange = exchange(false);
        let mut log = ChatLog::new();

        let state = exchange.submit(&mut log, "hello").await;

        assert_eq!(state, SubmissionState::Errored);
        assert_eq!(log.len(), 2);
        assert_eq!(log.pending(), 0);
        let lines = log.bubbles()[1].body.plain_lines();
        assert!(lines[0].starts_with("Erreur : "));
    }

    #[tokio::test]
    async fn test_blank_submit_stays_idle() {
        let exchange = exchange(false);
        let mut log = ChatLog::new();
        assert_eq!(exchange.submit(&mut log, "  ").await, SubmissionState::Idle);
        assert!(log.is_empty());
    }
}
