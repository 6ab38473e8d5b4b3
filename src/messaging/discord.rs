//! Discord session and channel adapter (serenity).
//!
//! `DiscordSession` owns the gateway client and publishes the bot identity
//! once the ready event arrives. `DiscordChannel` is the resolved target
//! channel, checked for text capability before any timer is started.

use crate::config::DiscordConfig;
use crate::error::{MessagingError, Result};
use crate::messaging::traits::Messaging;
use crate::{BotIdentity, ChannelId, HistoryMessage};

use serenity::all::{
    Cache, Channel, ChannelType, Client, Context, CreateMessage, EventHandler, GatewayIntents,
    GetMessages, Http, Message, MessageFlags, Ready, ShardManager,
};
use std::sync::Arc;
use tokio::sync::watch;

/// Gateway event handler. Only the ready event matters here.
struct Handler {
    ready_tx: watch::Sender<Option<BotIdentity>>,
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let identity = BotIdentity {
            id: ready.user.id.get(),
            name: ready.user.name.clone(),
        };
        tracing::info!(
            bot_id = identity.id,
            guilds = ready.guilds.len(),
            "Logged in as {identity}"
        );
        // Reconnects fire ready again; subscribers only ever see the latest identity.
        self.ready_tx.send_replace(Some(identity));
    }
}

/// A built (not yet started) gateway client.
pub struct DiscordSession {
    client: Client,
    ready_rx: watch::Receiver<Option<BotIdentity>>,
}

impl std::fmt::Debug for DiscordSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSession").finish_non_exhaustive()
    }
}

impl DiscordSession {
    /// Build the client and validate the token over REST.
    ///
    /// An invalid token fails here rather than inside the gateway loop.
    pub async fn connect(config: &DiscordConfig) -> Result<Self> {
        let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
        let (ready_tx, ready_rx) = watch::channel(None);

        let client = Client::builder(&config.token, intents)
            .event_handler(Handler { ready_tx })
            .await
            .map_err(|error| MessagingError::Client(format!("client build failed: {error}")))?;

        let current_user = client.http.get_current_user().await.map_err(|error| {
            MessagingError::Client(format!("authentication failed: {error}"))
        })?;
        tracing::debug!(user = %current_user.name, "discord token accepted");

        Ok(Self { client, ready_rx })
    }

    pub fn http(&self) -> Arc<Http> {
        self.client.http.clone()
    }

    pub fn cache(&self) -> Arc<Cache> {
        self.client.cache.clone()
    }

    pub fn shard_manager(&self) -> Arc<ShardManager> {
        self.client.shard_manager.clone()
    }

    /// Receiver that holds `Some(identity)` once the gateway is ready.
    pub fn ready(&self) -> watch::Receiver<Option<BotIdentity>> {
        self.ready_rx.clone()
    }

    /// Run the gateway until it shuts down. Blocks for the process lifetime.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("connecting to the Discord gateway");
        self.client
            .start()
            .await
            .map_err(|error| MessagingError::Client(format!("gateway error: {error}")).into())
    }
}

/// Wait until the ready event has published the bot identity.
pub async fn wait_until_ready(
    ready: &mut watch::Receiver<Option<BotIdentity>>,
) -> Result<BotIdentity> {
    let identity = ready
        .wait_for(Option::is_some)
        .await
        .map_err(|_| MessagingError::NeverReady)?;
    identity.clone().ok_or_else(|| MessagingError::NeverReady.into())
}

/// Whether a guild channel kind accepts history reads and sends.
pub fn is_messageable_kind(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::Text
            | ChannelType::News
            | ChannelType::Voice
            | ChannelType::Stage
            | ChannelType::PublicThread
            | ChannelType::PrivateThread
            | ChannelType::NewsThread
    )
}

/// Accept guild text-capable channels and DMs. Everything else is fatal.
pub fn check_messageable(channel: &Channel, channel_id: ChannelId) -> Result<()> {
    match channel {
        Channel::Guild(guild_channel) if is_messageable_kind(guild_channel.kind) => {
            tracing::info!(
                channel_id,
                channel_name = %guild_channel.name,
                guild_id = guild_channel.guild_id.get(),
                "target channel resolved"
            );
            Ok(())
        }
        Channel::Guild(guild_channel) => Err(MessagingError::NotMessageable {
            id: channel_id,
            kind: format!("{:?}", guild_channel.kind),
        }
        .into()),
        Channel::Private(private_channel) => {
            tracing::info!(
                channel_id,
                recipient = %private_channel.recipient.name,
                "target direct message channel resolved"
            );
            Ok(())
        }
        other => Err(MessagingError::NotMessageable {
            id: channel_id,
            kind: format!("{other:?}"),
        }
        .into()),
    }
}

/// The resolved target channel.
#[derive(Clone)]
pub struct DiscordChannel {
    id: serenity::all::ChannelId,
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl std::fmt::Debug for DiscordChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannel")
            .field("id", &self.id.get())
            .finish_non_exhaustive()
    }
}

impl DiscordChannel {
    /// Look up `channel_id` and check it can be read from and posted to.
    pub async fn resolve(http: Arc<Http>, cache: Arc<Cache>, channel_id: ChannelId) -> Result<Self> {
        let id = serenity::all::ChannelId::new(channel_id);
        let channel = http
            .get_channel(id)
            .await
            .map_err(|error| MessagingError::ChannelNotFound {
                id: channel_id,
                reason: error.to_string(),
            })?;

        check_messageable(&channel, channel_id)?;

        Ok(Self { id, http, cache })
    }

    fn to_history_message(&self, message: &Message) -> HistoryMessage {
        HistoryMessage {
            author_id: message.author.id.get(),
            author_name: message.author.name.clone(),
            content: message.content_safe(&self.cache),
            created_at: chrono::DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0)
                .unwrap_or_default(),
        }
    }
}

impl Messaging for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn fetch_recent(&self, limit: u8) -> Result<Vec<HistoryMessage>> {
        let messages = self
            .id
            .messages(self.http.as_ref(), GetMessages::new().limit(limit))
            .await
            .map_err(|error| MessagingError::HistoryFetch {
                id: self.id.get(),
                reason: error.to_string(),
            })?;

        Ok(messages
            .iter()
            .map(|message| self.to_history_message(message))
            .collect())
    }

    async fn send_silent(&self, text: &str) -> Result<()> {
        let builder = CreateMessage::new()
            .content(text)
            .flags(MessageFlags::SUPPRESS_NOTIFICATIONS);

        self.id
            .send_message(self.http.as_ref(), builder)
            .await
            .map_err(|error| MessagingError::Send {
                id: self.id.get(),
                reason: error.to_string(),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_like_channels_are_messageable() {
        for kind in [
            ChannelType::Text,
            ChannelType::News,
            ChannelType::Voice,
            ChannelType::Stage,
            ChannelType::PublicThread,
            ChannelType::PrivateThread,
            ChannelType::NewsThread,
        ] {
            assert!(is_messageable_kind(kind), "{kind:?} should be messageable");
        }
    }

    #[test]
    fn containers_are_not_messageable() {
        for kind in [
            ChannelType::Category,
            ChannelType::Forum,
            ChannelType::Directory,
        ] {
            assert!(!is_messageable_kind(kind), "{kind:?} should not be messageable");
        }
    }

    fn guild_channel(kind: u8, name: &str) -> Channel {
        let guild_channel: serenity::all::GuildChannel = serde_json::from_value(serde_json::json!({
            "id": "1000",
            "type": kind,
            "guild_id": "2000",
            "name": name,
            "position": 0,
            "permission_overwrites": [],
            "nsfw": false,
            "parent_id": null,
            "last_message_id": null,
        }))
        .expect("guild channel json should deserialize");
        Channel::Guild(guild_channel)
    }

    #[test]
    fn text_channel_passes_the_capability_check() {
        check_messageable(&guild_channel(0, "general"), 1000).expect("text channel is usable");
    }

    #[test]
    fn category_and_forum_fail_the_capability_check() {
        for (kind, name) in [(4, "Category"), (15, "Forum")] {
            let error = check_messageable(&guild_channel(kind, "container"), 1000)
                .expect_err("container channels must be rejected");
            match error {
                crate::Error::Messaging(MessagingError::NotMessageable { id, kind }) => {
                    assert_eq!(id, 1000);
                    assert!(kind.contains(name), "unexpected kind {kind}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn direct_message_passes_the_capability_check() {
        let channel: Channel = serde_json::from_value(serde_json::json!({
            "id": "3000",
            "type": 1,
            "last_message_id": null,
            "recipients": [{
                "id": "7",
                "username": "alice",
                "discriminator": "0",
                "avatar": null,
            }],
        }))
        .expect("dm json should deserialize");

        assert!(matches!(channel, Channel::Private(_)));
        check_messageable(&channel, 3000).expect("direct messages are usable");
    }

    #[tokio::test]
    async fn wait_until_ready_returns_the_published_identity() {
        let (ready_tx, mut ready_rx) = watch::channel(None);
        let identity = BotIdentity {
            id: 42,
            name: "mimicbot".into(),
        };

        let publisher = {
            let identity = identity.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                ready_tx.send_replace(Some(identity));
                // Keep the sender alive until the waiter has observed the value.
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            })
        };

        let ready = wait_until_ready(&mut ready_rx).await.expect("should become ready");
        assert_eq!(ready, identity);
        publisher.await.expect("publisher should finish");
    }

    #[tokio::test]
    async fn wait_until_ready_fails_if_the_gateway_drops_first() {
        let (ready_tx, mut ready_rx) = watch::channel::<Option<BotIdentity>>(None);
        drop(ready_tx);

        let error = wait_until_ready(&mut ready_rx)
            .await
            .expect_err("closed gateway must fail");
        assert!(matches!(
            error,
            crate::Error::Messaging(MessagingError::NeverReady)
        ));
    }
}
