//! `/sync` long-polling: response shapes, conversion to [`RawEvent`]s and the
//! loop that feeds them to an [`EventHandler`].

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use {
    chrono::{DateTime, Utc},
    serde::Deserialize,
    serde_json::Value,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use nudge_channels::{EventHandler, RawEvent, raw::EVENT_MEMBER, route_event};

use crate::client::MatrixClient;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncResponse {
    pub next_batch: String,
    pub rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncRooms {
    pub join: BTreeMap<String, JoinedRoom>,
    pub invite: BTreeMap<String, InvitedRoom>,
    pub leave: BTreeMap<String, LeftRoom>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JoinedRoom {
    pub state: EventList,
    pub timeline: EventList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InvitedRoom {
    pub invite_state: EventList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeftRoom {
    pub timeline: EventList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventList {
    pub events: Vec<ClientEvent>,
}

/// A room event as served by `/sync`. Stripped invite state lacks the id
/// and the timestamp.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClientEvent {
    pub event_id: Option<String>,
    pub sender: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub state_key: Option<String>,
    pub origin_server_ts: Option<i64>,
    pub content: Value,
}

impl ClientEvent {
    fn into_raw(self, room: &str) -> RawEvent {
        let timestamp = self
            .origin_server_ts
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        RawEvent {
            external_id: self.event_id,
            room: room.to_string(),
            sender: self.sender,
            event_type: self.event_type,
            state_key: self.state_key,
            timestamp,
            content: self.content,
        }
    }
}

impl SyncResponse {
    /// Flatten into raw events, keeping the server order within each room:
    /// joined rooms (state, then timeline), pending invites, then the final
    /// timeline of rooms the bot left.
    pub fn into_raw_events(self) -> Vec<RawEvent> {
        let SyncRooms {
            join,
            invite,
            leave,
        } = self.rooms;

        let mut events = Vec::new();
        for (room, joined) in join {
            events.extend(
                joined
                    .state
                    .events
                    .into_iter()
                    .chain(joined.timeline.events)
                    .map(|e| e.into_raw(&room)),
            );
        }
        events.extend(invite_events(invite));
        for (room, left) in leave {
            events.extend(left.timeline.events.into_iter().map(|e| e.into_raw(&room)));
        }
        events
    }

    /// Only the invites addressed to the bot, as membership events.
    pub fn into_pending_invites(self) -> Vec<RawEvent> {
        invite_events(self.rooms.invite)
    }
}

fn invite_events(invites: BTreeMap<String, InvitedRoom>) -> Vec<RawEvent> {
    invites
        .into_iter()
        .flat_map(|(room, invited)| {
            invited
                .invite_state
                .events
                .into_iter()
                .filter(|e| {
                    e.event_type == EVENT_MEMBER
                        && e.content.get("membership").and_then(Value::as_str) == Some("invite")
                })
                .map(move |e| e.into_raw(&room))
        })
        .collect()
}

/// Knobs of the sync loop.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Long-poll timeout passed to the homeserver.
    pub timeout: Duration,
    /// Pause after a failed request.
    pub retry_delay: Duration,
    /// Drop timeline events of the first response; pending invites are still
    /// delivered.
    pub skip_initial_backlog: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
            skip_initial_backlog: true,
        }
    }
}

/// Handle on a running sync loop.
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop polling and wait for the event being handled to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync task ended abnormally");
        }
    }

    /// Wait until the loop ends on its own (cancellation or fatal error).
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync task ended abnormally");
        }
    }
}

/// Spawn the `/sync` loop. Events are handed to `handler` one at a time, in
/// arrival order; the next event waits for the previous callback.
pub fn start_sync(
    client: Arc<MatrixClient>,
    handler: Arc<dyn EventHandler>,
    options: SyncOptions,
) -> SyncHandle {
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        run_sync_loop(&client, handler.as_ref(), &options, &loop_cancel).await;
    });
    SyncHandle { cancel, task }
}

async fn run_sync_loop(
    client: &MatrixClient,
    handler: &dyn EventHandler,
    options: &SyncOptions,
    cancel: &CancellationToken,
) {
    info!(timeout_secs = options.timeout.as_secs(), "starting matrix sync loop");
    let mut since: Option<String> = None;

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = client.sync(since.as_deref(), options.timeout) => result,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_unauthorized() => {
                error!(error = %e, "access token rejected, stopping sync");
                break;
            },
            Err(e) => {
                warn!(error = %e, retry_secs = options.retry_delay.as_secs(), "sync failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(options.retry_delay) => continue,
                }
            },
        };

        let initial = since.is_none();
        let next_batch = response.next_batch.clone();
        let events = if initial && options.skip_initial_backlog {
            let pending = response.into_pending_invites();
            debug!(invites = pending.len(), "skipping initial backlog");
            pending
        } else {
            response.into_raw_events()
        };

        debug!(count = events.len(), "got matrix events");
        for raw in events {
            if cancel.is_cancelled() {
                break;
            }
            route_event(handler, raw).await;
        }
        since = Some(next_batch);
    }
    info!("matrix sync stopped");
}
