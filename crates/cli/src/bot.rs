//! Wires the stores, the Matrix client, the delivery engine and the
//! dispatcher together and runs the sync loop until ctrl-c.

use std::{sync::Arc, time::Duration};

use {
    anyhow::{Context, bail},
    tracing::{info, warn},
};

use {
    nudge_channels::{MessageStore, RoomDirectory, TransmissionClient},
    nudge_config::{DeliveryConfig, NudgeConfig},
    nudge_delivery::{DeliveryEngine, DeliveryPolicies, RateLimiter, RetryPolicy},
    nudge_dispatch::{ActionContext, Dispatcher, InboundGate, classifier::EventClassifier},
    nudge_matrix::{MatrixClient, SyncOptions, start_sync},
    nudge_store::{SqliteMessageStore, SqliteRoomDirectory},
};

use crate::{actions, membership::RoomMembership};

/// Slack on top of the long-poll timeout before an HTTP request gives up.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

pub async fn run(config: NudgeConfig) -> anyhow::Result<()> {
    let pool = nudge_store::connect(&config.database.url()).await?;
    info!(path = %config.database.path.display(), "database ready");
    let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(pool.clone()));
    let rooms = Arc::new(SqliteRoomDirectory::new(pool));

    let sync_timeout = Duration::from_secs(config.matrix.sync_timeout_secs);
    let client = Arc::new(MatrixClient::new(
        &config.matrix.homeserver,
        config.matrix.access_token.clone(),
        sync_timeout + REQUEST_TIMEOUT_SLACK,
    )?);

    let bot_user = client
        .whoami()
        .await
        .context("homeserver rejected the access token")?;
    if bot_user != config.matrix.user_id {
        bail!(
            "access token belongs to {bot_user}, but matrix.user_id is {}",
            config.matrix.user_id
        );
    }
    info!(user = %bot_user, homeserver = %config.matrix.homeserver, "logged in");

    let engine = DeliveryEngine::new(
        Arc::clone(&client) as Arc<dyn TransmissionClient>,
        Arc::clone(&store),
        RateLimiter::new(config.delivery.cooldown(), config.delivery.blocked_poll()),
        policies(&config.delivery),
        bot_user.as_str(),
    );
    let ctx = ActionContext::new(engine, Arc::clone(&store), bot_user.as_str());

    let registry = actions::registry(&config.bot.help_text)?;
    for (lane, name) in registry.describe() {
        info!(lane, action = name, "action registered");
    }

    let dispatcher = Dispatcher::new(
        InboundGate::new(
            bot_user.as_str(),
            Arc::clone(&store),
            Arc::clone(&rooms) as Arc<dyn RoomDirectory>,
        ),
        EventClassifier::default(),
        registry,
        Arc::new(RoomMembership::new(rooms, config.bot.leave_empty_rooms)),
        ctx,
    );

    let handle = start_sync(client, Arc::new(dispatcher), SyncOptions {
        timeout: sync_timeout,
        retry_delay: Duration::from_secs(config.matrix.sync_retry_secs),
        skip_initial_backlog: config.matrix.skip_initial_backlog,
    });

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => warn!(error = %e, "cannot listen for ctrl-c, stopping"),
        }
        cancel.cancel();
    });

    handle.finished().await;
    info!("nudge stopped");
    Ok(())
}

fn policies(delivery: &DeliveryConfig) -> DeliveryPolicies {
    DeliveryPolicies {
        sync: RetryPolicy::new(delivery.sync_retry.budget, delivery.sync_retry.delay()),
        background: RetryPolicy::new(
            delivery.background_retry.budget,
            delivery.background_retry.delay(),
        ),
    }
}
