//! Routes chat events to the owning instance and renders command results
//! back to the acting user. The process-level error policy lives here: a
//! single booking's failure is reported and logged, never fatal.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{error, info, warn};

use booking::model::{Booking, Bracket};
use booking::store::sqlite_store::SqliteBookingStore;
use engine::{EngineError, Instance};
use gateway::{ChannelId, ChatClient, IncomingMessage, MessageId, Signal, UserId};

use crate::commands::{Command, parse};

pub type DefaultInstance = Instance<SqliteBookingStore>;

pub struct Coordinator {
    pub instances: Vec<Arc<DefaultInstance>>,
    chat: Arc<dyn ChatClient>,
    shutdown: Notify,
}

impl Coordinator {
    pub fn new(instances: Vec<Arc<DefaultInstance>>, chat: Arc<dyn ChatClient>) -> Self {
        Self {
            instances,
            chat,
            shutdown: Notify::new(),
        }
    }

    /// Resolves when a `shutdown` command has been accepted.
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }

    async fn find_booking(&self, booking_id: &str) -> Option<(Arc<DefaultInstance>, Booking)> {
        for instance in &self.instances {
            if let Some(b) = instance.registry.get(booking_id).await {
                return Some((instance.clone(), b));
            }
        }
        None
    }

    /// Entry point for reaction events from the chat transport. A reaction
    /// on an instance's request message with its bracket signal starts the
    /// whole booking creation flow.
    pub fn handle_reaction(
        self: &Arc<Self>,
        channel: ChannelId,
        message: MessageId,
        user: UserId,
        signal: Signal,
    ) {
        for instance in &self.instances {
            let settings = &instance.settings;
            if channel != settings.channels.request || message != settings.request_message {
                continue;
            }
            let bracket = if signal == settings.signals.twos {
                Bracket::TwoVsTwo
            } else if signal == settings.signals.threes {
                Bracket::ThreeVsThree
            } else {
                continue;
            };

            let instance = instance.clone();
            tokio::spawn(async move {
                if let Err(e) = instance.handle_booking_request(bracket, user).await {
                    error!(error = %e, user, "booking request flow failed");
                }
            });
            return;
        }
    }

    /// Entry point for message events from the chat transport.
    pub async fn handle_message(&self, msg: &IncomingMessage) {
        for instance in &self.instances {
            let parsed = match parse(&instance.settings.command_prefix, &msg.content) {
                Some(p) => p,
                None => continue,
            };

            match parsed {
                Ok(command) => self.dispatch(instance, command, msg).await,
                Err(line) => self.reply(msg, &line).await,
            }
            return;
        }
    }

    async fn reply(&self, msg: &IncomingMessage, line: &str) {
        let result = if msg.channel == 0 {
            self.chat.send_dm(msg.author, line).await
        } else {
            self.chat.send_channel(msg.channel, line).await
        };
        if let Err(e) = result {
            warn!(error = %e, "command reply failed");
        }
    }

    async fn dispatch(
        &self,
        matched: &Arc<DefaultInstance>,
        command: Command,
        msg: &IncomingMessage,
    ) {
        let actor = msg.author;
        let outcome: Result<Option<String>, EngineError> = match command {
            Command::Bookings => self.list_bookings(matched, actor).await,
            Command::Take { booking_id } => match self.find_booking(&booking_id).await {
                Some((owner, _)) => owner
                    .lifecycle
                    .claim(&booking_id, actor, msg.mentions.first().copied())
                    .await
                    .map(|_| None),
                None => Err(unknown_booking(&booking_id)),
            },
            Command::Done { booking_id } => match self.find_booking(&booking_id).await {
                Some((owner, _)) => owner.lifecycle.complete(&booking_id, actor).await.map(|_| None),
                None => Err(unknown_booking(&booking_id)),
            },
            Command::Refund { kind, booking_id } => match self.find_booking(&booking_id).await {
                Some((owner, _)) => owner
                    .lifecycle
                    .refund(&booking_id, actor, kind)
                    .await
                    .map(|_| None),
                None => Err(unknown_booking(&booking_id)),
            },
            Command::SetRealms { booking_id } => match self.find_booking(&booking_id).await {
                Some((owner, _)) => owner
                    .lifecycle
                    .set_payment_realms(&booking_id, actor)
                    .await
                    .map(|_| None),
                None => Err(unknown_booking(&booking_id)),
            },
            Command::Transfer { booking_id } => match msg.mentions.first() {
                Some(new_author) => match self.find_booking(&booking_id).await {
                    Some((owner, _)) => owner
                        .lifecycle
                        .transfer(&booking_id, actor, *new_author)
                        .await
                        .map(|_| None),
                    None => Err(unknown_booking(&booking_id)),
                },
                None => Err(EngineError::RequestFailed(
                    "Mention the user the booking should be transferred to".to_string(),
                )),
            },
            Command::Weights { bracket } => self.list_weights(matched, bracket, actor).await,
            Command::SetWeight { bracket, value } => {
                self.set_weight(matched, bracket, value, actor, msg).await
            }
            Command::Shutdown { force } => self.shutdown(matched, actor, force).await,
        };

        match outcome {
            Ok(Some(line)) => self.reply(msg, &line).await,
            Ok(None) => {}
            Err(
                e @ (EngineError::Cancelled | EngineError::NoVolunteers),
            ) => {
                // Already communicated inside the flow.
                info!(outcome = %e, "command flow ended early");
            }
            Err(e) => {
                if let EngineError::Internal(ref detail) = e {
                    error!(error = ?detail, "command failed unexpectedly");
                } else {
                    info!(error = %e, "command rejected");
                }
                self.reply(msg, &e.user_message()).await;
            }
        }
    }

    async fn list_bookings(
        &self,
        instance: &Arc<DefaultInstance>,
        actor: UserId,
    ) -> Result<Option<String>, EngineError> {
        ensure_manager(instance, actor)?;

        let bookings = instance.registry.list_all().await;
        if bookings.is_empty() {
            return Ok(Some("There are currently no active bookings".to_string()));
        }

        let mut lines = vec!["**Currently active bookings:**".to_string()];
        for b in bookings {
            lines.push(format!(
                "ID: ``{}`` Author: <@{}> Status: ``{}``\nBoost info: ``{}``",
                b.id,
                b.author,
                b.status,
                b.boost_summary(),
            ));
        }
        Ok(Some(lines.join("\n")))
    }

    async fn list_weights(
        &self,
        instance: &Arc<DefaultInstance>,
        bracket: Bracket,
        actor: UserId,
    ) -> Result<Option<String>, EngineError> {
        ensure_manager(instance, actor)?;

        let weights = instance.fairness.snapshot(bracket).await?;
        if weights.is_empty() {
            return Ok(Some(format!(
                "No {bracket} fairness weights have been recorded yet"
            )));
        }

        let mut entries: Vec<_> = weights.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut lines = vec![format!("Bad luck protection values for {bracket}:")];
        for (user, weight) in entries {
            lines.push(format!("<@{user}>: ``{weight:.2}``"));
        }
        Ok(Some(lines.join("\n")))
    }

    async fn set_weight(
        &self,
        instance: &Arc<DefaultInstance>,
        bracket: Bracket,
        value: f64,
        actor: UserId,
        msg: &IncomingMessage,
    ) -> Result<Option<String>, EngineError> {
        ensure_manager(instance, actor)?;
        if value < 0.0 {
            return Err(EngineError::RequestFailed(
                "Weight value cannot be negative".to_string(),
            ));
        }
        let user = msg.mentions.first().copied().ok_or_else(|| {
            EngineError::RequestFailed("Mention the user whose weight should be set".to_string())
        })?;

        instance.fairness.set_weight(bracket, user, value).await?;
        Ok(Some(format!(
            "<@{user}>'s {bracket} weight has been set to ``{value}``"
        )))
    }

    async fn shutdown(
        &self,
        instance: &Arc<DefaultInstance>,
        actor: UserId,
        force: bool,
    ) -> Result<Option<String>, EngineError> {
        ensure_manager(instance, actor)?;

        if !force {
            for inst in &self.instances {
                if inst.registry.has_uncommitted().await {
                    return Err(EngineError::RequestFailed(
                        "It is unsafe to shut down while bookings are still compiling or posted, use ``shutdown force`` to override".to_string(),
                    ));
                }
            }
        }

        info!(actor, force, "shutdown accepted");
        self.shutdown.notify_waiters();
        Ok(Some("Shutting down, all bookings are persisted".to_string()))
    }
}

fn ensure_manager(instance: &Arc<DefaultInstance>, actor: UserId) -> Result<(), EngineError> {
    if instance.settings.is_manager(actor) {
        Ok(())
    } else {
        Err(EngineError::NotAuthorized(
            "You are not authorized to do that".to_string(),
        ))
    }
}

fn unknown_booking(booking_id: &str) -> EngineError {
    EngineError::NotFound(format!("No booking was found with ID ``{booking_id}``"))
}
