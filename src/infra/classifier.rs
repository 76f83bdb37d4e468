//! HTTP adapter for the external sentiment model.
//!
//! The model is expected to accept `POST {"text": ...}` and answer with
//! `{"score": p}` where `p` is the probability that the text is positive.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::sentiment::{ClassifierError, ClassifierState, SentimentClassifier};
use crate::config::ClassifierSettings;

#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    endpoint: Url,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: f64,
}

impl HttpClassifier {
    pub fn new(endpoint: Url, timeout: std::time::Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("scrivo/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl SentimentClassifier for HttpClassifier {
    async fn score(&self, text: &str) -> Result<f64, ClassifierError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ScoreRequest { text })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| ClassifierError::Transport(err.to_string()))?;

        let body: ScoreResponse = response
            .json()
            .await
            .map_err(|err| ClassifierError::Transport(err.to_string()))?;
        Ok(body.score)
    }
}

/// Decide once, at start-up, whether sentiment analysis is available.
pub fn classifier_state(settings: &ClassifierSettings) -> ClassifierState {
    let Some(endpoint) = settings.endpoint.clone() else {
        info!(
            target = "scrivo::infra::classifier",
            "No classifier endpoint configured; sentiment analysis disabled"
        );
        return ClassifierState::Unavailable {
            reason: "no classifier endpoint configured".to_string(),
        };
    };

    match HttpClassifier::new(endpoint.clone(), settings.timeout) {
        Ok(classifier) => {
            info!(
                target = "scrivo::infra::classifier",
                endpoint = %endpoint,
                "Sentiment classifier ready"
            );
            ClassifierState::Ready(Arc::new(classifier))
        }
        Err(err) => {
            warn!(
                target = "scrivo::infra::classifier",
                error = %err,
                "Failed to build classifier client"
            );
            ClassifierState::Unavailable {
                reason: format!("classifier client could not be built: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn missing_endpoint_is_unavailable() {
        let state = classifier_state(&ClassifierSettings {
            endpoint: None,
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(state, ClassifierState::Unavailable { .. }));
    }

    #[test]
    fn configured_endpoint_is_ready() {
        let state = classifier_state(&ClassifierSettings {
            endpoint: Some(Url::parse("http://127.0.0.1:9/score").expect("url")),
            timeout: Duration::from_millis(100),
        });
        assert!(matches!(state, ClassifierState::Ready(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let classifier = HttpClassifier::new(
            Url::parse("http://127.0.0.1:9/score").expect("url"),
            Duration::from_millis(200),
        )
        .expect("client");
        assert!(matches!(
            classifier.score("hello").await,
            Err(ClassifierError::Transport(_))
        ));
    }
}
