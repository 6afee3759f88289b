//! Push notification fan-out to the push gateway.
//!
//! One gateway message is built per device token. Batches of at most
//! [`PUSH_BATCH_SIZE`] messages are sent concurrently; the gateway's
//! per-message tickets become the [`PushResponse`] counts.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use messageai_shared::constants::PUSH_BATCH_SIZE;
use messageai_shared::protocol::{PushRequest, PushResponse};

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Debug, Clone, Serialize, PartialEq)]
struct GatewayMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
    sound: &'static str,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    data: Vec<GatewayTicket>,
}

#[derive(Debug, Deserialize)]
struct GatewayTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct PushDispatcher {
    http: reqwest::Client,
    gateway_url: String,
    access_token: Option<String>,
}

impl PushDispatcher {
    pub fn new(gateway_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            gateway_url: gateway_url.into(),
            access_token,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.push_gateway_url, config.push_access_token.clone())
    }

    pub async fn dispatch(&self, request: &PushRequest) -> Result<PushResponse, ServerError> {
        let tokens: Vec<&str> = request
            .push_tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(ServerError::BadRequest("No push tokens provided".to_string()));
        }

        let messages: Vec<GatewayMessage<'_>> = tokens
            .iter()
            .map(|&to| GatewayMessage {
                to,
                title: &request.title,
                body: &request.body,
                data: &request.data,
                sound: "default",
            })
            .collect();

        let batches = messages.chunks(PUSH_BATCH_SIZE);
        let results = join_all(batches.clone().map(|batch| self.send_batch(batch))).await;

        let mut total = PushResponse::default();
        let mut last_error = None;
        for (result, batch) in results.into_iter().zip(batches) {
            match result {
                Ok(tally) => {
                    total.sent += tally.sent;
                    total.failed += tally.failed;
                }
                Err(e) => {
                    warn!(batch = batch.len(), error = %e, "Push batch failed");
                    total.failed += batch.len();
                    last_error = Some(e);
                }
            }
        }

        if total.sent == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        info!(sent = total.sent, failed = total.failed, "Push notifications dispatched");
        Ok(total)
    }

    async fn send_batch(&self, batch: &[GatewayMessage<'_>]) -> Result<PushResponse, ServerError> {
        let mut req = self.http.post(&self.gateway_url).json(batch);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ServerError::PushGateway(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServerError::PushGateway(format!("{status}: {body}")));
        }

        let parsed: GatewayResponse = resp
            .json()
            .await
            .map_err(|e| ServerError::PushGateway(format!("Malformed gateway response: {e}")))?;
        Ok(tally(&parsed.data, batch.len()))
    }
}

/// Count tickets by status. Messages without a ticket count as failed.
fn tally(tickets: &[GatewayTicket], batch_len: usize) -> PushResponse {
    let sent = tickets.iter().filter(|t| t.status == "ok").count();
    for ticket in tickets.iter().filter(|t| t.status != "ok") {
        debug!(status = %ticket.status, message = ?ticket.message, "Push ticket rejected");
    }
    PushResponse {
        sent,
        failed: batch_len.saturating_sub(sent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(status: &str) -> GatewayTicket {
        GatewayTicket {
            status: status.to_string(),
            message: None,
        }
    }

    #[test]
    fn tickets_are_tallied() {
        let tickets = [ticket("ok"), ticket("error"), ticket("ok")];
        assert_eq!(tally(&tickets, 3), PushResponse { sent: 2, failed: 1 });
        // Missing tickets are failures.
        assert_eq!(tally(&tickets[..1], 4), PushResponse { sent: 1, failed: 3 });
    }

    #[test]
    fn gateway_message_shape() {
        let data = serde_json::json!({"conversationId": "c1"});
        let msg = GatewayMessage {
            to: "ExponentPushToken[x]",
            title: "Alice",
            body: "hi",
            data: &data,
            sound: "default",
        };
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(value["to"], "ExponentPushToken[x]");
        assert_eq!(value["data"]["conversationId"], "c1");
    }

    #[tokio::test]
    async fn blank_tokens_are_rejected() {
        let dispatcher = PushDispatcher::new("http://127.0.0.1:1/push", None);
        let req = PushRequest {
            push_tokens: vec![" ".into()],
            title: "t".into(),
            body: "b".into(),
            data: serde_json::Value::Null,
        };
        assert!(matches!(dispatcher.dispatch(&req).await, Err(ServerError::BadRequest(_))));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_an_error() {
        let dispatcher = PushDispatcher::new("http://127.0.0.1:1/push", None);
        let req = PushRequest {
            push_tokens: vec!["a".into(), "b".into()],
            title: "t".into(),
            body: "b".into(),
            data: serde_json::Value::Null,
        };
        assert!(matches!(dispatcher.dispatch(&req).await, Err(ServerError::PushGateway(_))));
    }
}
