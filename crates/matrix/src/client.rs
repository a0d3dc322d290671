use std::time::Duration;

use {
    async_trait::async_trait,
    chrono::Utc,
    reqwest::Method,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::debug,
    url::Url,
    urlencoding::encode,
};

use {
    nudge_channels::{TransmissionClient, TransmitError},
    nudge_common::types::{DeliveryReceipt, OutgoingContent},
};

use crate::{
    error::{Error, Result},
    sync::SyncResponse,
};

const CLIENT_API: &str = "_matrix/client/v3";
const HTML_FORMAT: &str = "org.matrix.custom.html";

/// Error body of a failed client-server API call.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    errcode: Option<String>,
    error: Option<String>,
    retry_after_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EventIdBody {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    user_id: String,
}

/// Thin client for the Matrix client-server API.
///
/// It only reports what the homeserver answered; retries and rate-limit
/// handling live in the delivery engine.
pub struct MatrixClient {
    http: reqwest::Client,
    base: String,
    token: Secret<String>,
}

impl MatrixClient {
    /// `request_timeout` must exceed the `/sync` long-poll timeout.
    pub fn new(homeserver: &str, token: Secret<String>, request_timeout: Duration) -> Result<Self> {
        let url = Url::parse(homeserver)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::message(format!(
                "unsupported homeserver scheme: {}",
                url.scheme()
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base: url.as_str().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{CLIENT_API}/{path}", self.base)
    }

    /// The user id the access token belongs to.
    pub async fn whoami(&self) -> Result<String> {
        let body = self
            .call(Method::GET, &self.endpoint("account/whoami"), None, &[])
            .await?;
        let who: WhoAmI = parse(body)?;
        Ok(who.user_id)
    }

    /// One `/sync` long-poll.
    pub async fn sync(&self, since: Option<&str>, timeout: Duration) -> Result<SyncResponse> {
        let timeout_ms = timeout.as_millis().to_string();
        let mut query = vec![("timeout", timeout_ms.as_str())];
        if let Some(since) = since {
            query.push(("since", since));
        }
        let body = self
            .call(Method::GET, &self.endpoint("sync"), None, &query)
            .await?;
        Ok(parse(body)?)
    }

    async fn send_event(
        &self,
        room: &str,
        txn_id: &str,
        event_type: &str,
        content: Value,
    ) -> std::result::Result<DeliveryReceipt, TransmitError> {
        let url = self.endpoint(&format!(
            "rooms/{}/send/{}/{}",
            encode(room),
            encode(event_type),
            encode(txn_id)
        ));
        let body = self.call(Method::PUT, &url, Some(content), &[]).await?;
        let sent: EventIdBody = parse(body)?;
        Ok(DeliveryReceipt {
            external_id: sent.event_id,
            server_timestamp: Utc::now(),
        })
    }

    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        query: &[(&str, &str)],
    ) -> std::result::Result<Value, TransmitError> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(self.token.expose_secret())
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!(%method, status = status.as_u16(), "matrix api call");

        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map_err(|e| TransmitError::malformed(format!("invalid response body: {e}")));
        }
        Err(server_error(status.as_u16(), &bytes))
    }
}

#[async_trait]
impl TransmissionClient for MatrixClient {
    async fn send_message(
        &self,
        room: &str,
        txn_id: &str,
        content: &OutgoingContent,
        reply_to: Option<&str>,
    ) -> std::result::Result<DeliveryReceipt, TransmitError> {
        let content = message_content(content, reply_to);
        self.send_event(room, txn_id, "m.room.message", content)
            .await
    }

    async fn send_reaction(
        &self,
        room: &str,
        txn_id: &str,
        target_event_id: &str,
        key: &str,
    ) -> std::result::Result<DeliveryReceipt, TransmitError> {
        let content = json!({
            "m.relates_to": {
                "rel_type": "m.annotation",
                "event_id": target_event_id,
                "key": key,
            }
        });
        self.send_event(room, txn_id, "m.reaction", content).await
    }

    async fn redact(
        &self,
        room: &str,
        txn_id: &str,
        event_id: &str,
        reason: Option<&str>,
    ) -> std::result::Result<(), TransmitError> {
        let url = self.endpoint(&format!(
            "rooms/{}/redact/{}/{}",
            encode(room),
            encode(event_id),
            encode(txn_id)
        ));
        let body = match reason {
            Some(reason) => json!({ "reason": reason }),
            None => json!({}),
        };
        self.call(Method::PUT, &url, Some(body), &[]).await?;
        Ok(())
    }

    async fn join_room(&self, room: &str) -> std::result::Result<(), TransmitError> {
        let url = self.endpoint(&format!("join/{}", encode(room)));
        self.call(Method::POST, &url, Some(json!({})), &[]).await?;
        Ok(())
    }

    async fn leave_room(&self, room: &str) -> std::result::Result<(), TransmitError> {
        let url = self.endpoint(&format!("rooms/{}/leave", encode(room)));
        self.call(Method::POST, &url, Some(json!({})), &[]).await?;
        Ok(())
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: Value) -> std::result::Result<T, TransmitError> {
    serde_json::from_value(body)
        .map_err(|e| TransmitError::malformed(format!("unexpected response shape: {e}")))
}

pub(crate) fn message_content(content: &OutgoingContent, reply_to: Option<&str>) -> Value {
    let msgtype = if content.notice { "m.notice" } else { "m.text" };
    let mut body = json!({
        "msgtype": msgtype,
        "body": content.body,
    });
    if let Some(html) = &content.formatted_body {
        body["format"] = json!(HTML_FORMAT);
        body["formatted_body"] = json!(html);
    }
    if let Some(event_id) = reply_to {
        body["m.relates_to"] = json!({ "m.in_reply_to": { "event_id": event_id } });
    }
    body
}

fn transport_error(e: reqwest::Error) -> TransmitError {
    if e.is_timeout() {
        TransmitError::timeout(e.to_string())
    } else if e.is_builder() || e.is_decode() {
        TransmitError::malformed(e.to_string())
    } else {
        TransmitError::transport(e.to_string())
    }
}

pub(crate) fn server_error(status: u16, bytes: &[u8]) -> TransmitError {
    let body: ErrorBody = serde_json::from_slice(bytes).unwrap_or_default();
    TransmitError::Server {
        status,
        errcode: body.errcode,
        message: body
            .error
            .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned()),
        retry_after: body.retry_after_ms.map(Duration::from_millis),
    }
}
