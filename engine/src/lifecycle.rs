//! Lifecycle commands: ledger upload, untaken claims, completion, refunds
//! and ownership transfer. Every mutating entry point checks that the actor
//! is the booking's author or a configured manager.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use booking::model::{Booking, BookingStatus, BoostType, Bracket};
use booking::registry::BookingRegistry;
use booking::roster;
use booking::store::BookingStore;
use gateway::{ChatClient, LedgerClient, UserId};

use crate::board::UntakenBoard;
use crate::error::EngineError;
use crate::prompt::{Prompter, await_attachment, await_mention};
use crate::settings::InstanceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundKind {
    Full,
    Partial,
}

impl FromStr for RefundKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(RefundKind::Full),
            "partial" => Ok(RefundKind::Partial),
            _ => Err(EngineError::RequestFailed(
                "Booking refund amount must be 'full' or 'partial'".to_string(),
            )),
        }
    }
}

pub struct LifecycleController<S: BookingStore> {
    registry: Arc<BookingRegistry<S>>,
    chat: Arc<dyn ChatClient>,
    ledger: Arc<dyn LedgerClient>,
    board: Arc<UntakenBoard<S>>,
    settings: Arc<InstanceSettings>,
}

impl<S: BookingStore> LifecycleController<S> {
    pub fn new(
        registry: Arc<BookingRegistry<S>>,
        chat: Arc<dyn ChatClient>,
        ledger: Arc<dyn LedgerClient>,
        board: Arc<UntakenBoard<S>>,
        settings: Arc<InstanceSettings>,
    ) -> Self {
        Self {
            registry,
            chat,
            ledger,
            board,
            settings,
        }
    }

    async fn require(&self, booking_id: &str) -> Result<Booking, EngineError> {
        self.registry.get(booking_id).await.ok_or_else(|| {
            EngineError::NotFound(format!("No booking was found with ID ``{booking_id}``"))
        })
    }

    fn ensure_authorized(&self, b: &Booking, actor: UserId) -> Result<(), EngineError> {
        if b.authored_by(actor) || self.settings.is_manager(actor) {
            Ok(())
        } else {
            Err(EngineError::NotAuthorized(
                "You are not authorized to do that".to_string(),
            ))
        }
    }

    async fn author_display(&self, b: &Booking) -> String {
        self.chat
            .display_name(b.author)
            .await
            .unwrap_or_else(|_| b.author.to_string())
    }

    fn prompter<'a>(&'a self, user: UserId) -> Prompter<'a> {
        Prompter {
            chat: self.chat.as_ref(),
            user,
            cancel: self.settings.signals.cancel.clone(),
            timeout: self.settings.prompt_timeout(),
        }
    }

    async fn notify_status(&self, b: &Booking) {
        let line = format!("Booking ``{}`` has been set to ``{}``", b.id, b.status);
        if let Err(e) = self.chat.send_dm(b.author, &line).await {
            warn!(error = ?e, booking_id = %b.id, "status notification failed");
        }
    }

    /// Locate and rewrite the booking's ledger row.
    async fn ledger_update(&self, b: &Booking) -> Result<(), EngineError> {
        let display = self.author_display(b).await;
        let handle = self.ledger.find_row(&b.id).await?;
        self.ledger
            .update_row(handle, &b.ledger_fields(&display))
            .await?;
        Ok(())
    }

    /// PendingNotUploaded -> Pending: register payment realms with the
    /// author and append the booking to the external ledger. A ledger
    /// outage leaves the booking uploadable later rather than losing it.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn upload(&self, booking_id: &str) -> Result<(), EngineError> {
        let b = self.require(booking_id).await?;
        if b.status != BookingStatus::PendingNotUploaded {
            return Err(EngineError::RequestFailed(format!(
                "Booking ``{booking_id}`` is not awaiting upload"
            )));
        }

        self.collect_payment_realms(&b).await?;
        let b = self.require(booking_id).await?;

        let display = self.author_display(&b).await;
        if let Err(e) = self.ledger.append_row(&b.ledger_fields(&display)).await {
            warn!(error = ?e, booking_id = %b.id, "ledger append failed");
            let _ = self
                .chat
                .send_dm(
                    b.author,
                    "The booking ledger is currently unavailable, please contact management - your booking is safe and will be uploaded later",
                )
                .await;
            return Err(e.into());
        }

        let updated = self
            .registry
            .update(booking_id, |cur| {
                cur.advance(BookingStatus::Pending)
                    .map_err(anyhow::Error::from)
            })
            .await?;
        self.notify_status(&updated).await;

        info!(booking_id = %booking_id, "booking uploaded to ledger");
        Ok(())
    }

    async fn collect_payment_realms(&self, b: &Booking) -> Result<(), EngineError> {
        let prompter = self.prompter(b.author);
        let realms = prompter
            .ask_text(
                "the **realm(s) the gold was collected on**\nif gold was collected on multiple realms, specify all of them separated by commas\n(e.g. Draenor, Tarren Mill, Kazzak)",
            )
            .await?;

        let mut line =
            String::from("Gold realm(s) registered, do not send gold until the booking is complete\n");
        for raw in realms.split(',') {
            let realm = roster::canonical_realm(raw.trim());
            if let Some(bank) = self.settings.bank_characters.get(&realm) {
                line.push_str(&format!("send **{realm}** gold to **{bank}**\n"));
            }
        }
        line.push_str(&format!(
            "When the booking is done, type ``{}done {}`` to register the booking as complete",
            self.settings.command_prefix, b.id
        ));
        self.chat.send_dm(b.author, &line).await?;

        let realms_value = realms.clone();
        self.registry
            .update(&b.id, move |cur| {
                cur.payment_realms = Some(realms_value);
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Re-register payment realms after the fact, syncing the ledger when
    /// the booking already lives there.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn set_payment_realms(
        &self,
        booking_id: &str,
        actor: UserId,
    ) -> Result<(), EngineError> {
        let b = self.require(booking_id).await?;
        self.ensure_authorized(&b, actor)?;

        self.collect_payment_realms(&b).await?;

        let b = self.require(booking_id).await?;
        if matches!(
            b.status,
            BookingStatus::Pending | BookingStatus::PartialRefund
        ) {
            self.ledger_update(&b).await?;
        }
        Ok(())
    }

    /// Claim an untaken booking. The claimer becomes the primary booster;
    /// 3v3 claims must name a teammate up front or confirm one within the
    /// teammate window. Skips PendingNotUploaded by appending the ledger
    /// row as part of the claim.
    #[instrument(skip(self), fields(booking_id = %booking_id, claimer))]
    pub async fn claim(
        &self,
        booking_id: &str,
        claimer: UserId,
        teammate: Option<UserId>,
    ) -> Result<(), EngineError> {
        let b = self.require(booking_id).await?;
        if b.status != BookingStatus::Untaken {
            return Err(EngineError::RequestFailed(format!(
                "Booking ``{booking_id}`` is not on the untaken board"
            )));
        }

        // Secondary boosters only exist in 3v3.
        let teammate = if b.bracket == Bracket::TwoVsTwo {
            None
        } else {
            teammate
        };

        let teammate = if crate::assign::needs_teammate(b.bracket, teammate) {
            self.chat
                .send_dm(
                    claimer,
                    &format!(
                        "3v3 bookings need a teammate - **please mention yours** within {} minutes to confirm the claim",
                        self.settings.timing.teammate_pick_timeout_secs / 60
                    ),
                )
                .await?;
            match await_mention(self.chat.as_ref(), claimer, self.settings.teammate_timeout())
                .await?
            {
                Some(mate) => Some(mate),
                None => return Err(EngineError::TimedOut),
            }
        } else {
            teammate
        };

        // Append to the ledger before committing so a ledger outage leaves
        // the booking claimable instead of half-claimed.
        let mut preview = b.clone();
        preview.assignment.primary = Some(claimer);
        preview.assignment.secondary = teammate;
        preview
            .advance(BookingStatus::Pending)
            .map_err(anyhow::Error::from)?;
        let display = self.author_display(&b).await;
        self.ledger.append_row(&preview.ledger_fields(&display)).await?;

        let updated = self
            .registry
            .update(booking_id, move |cur| {
                cur.assignment.primary = Some(claimer);
                cur.assignment.secondary = teammate;
                cur.advance(BookingStatus::Pending)
                    .map_err(anyhow::Error::from)
            })
            .await?;

        let _ = self
            .chat
            .send_dm(
                updated.author,
                &format!(
                    "Your booking ``{}`` has been claimed by <@{claimer}>",
                    updated.id
                ),
            )
            .await;

        if let Err(e) = self.board.render().await {
            warn!(error = ?e, "untaken board refresh failed");
        }

        info!(booking_id = %booking_id, claimer, "untaken booking claimed");
        Ok(())
    }

    /// Pending -> Complete: collect proof of payment and the settled price,
    /// derive everybody's cut, sync the ledger, then drop the booking from
    /// the active registry.
    #[instrument(skip(self), fields(booking_id = %booking_id, actor))]
    pub async fn complete(&self, booking_id: &str, actor: UserId) -> Result<(), EngineError> {
        let b = self.require(booking_id).await?;
        self.ensure_authorized(&b, actor)?;
        if !matches!(
            b.status,
            BookingStatus::Pending | BookingStatus::PartialRefund
        ) {
            return Err(EngineError::RequestFailed(
                "Booking status must be pending to complete".to_string(),
            ));
        }

        let proof = self.collect_payment_proof(&b).await?;
        let price = self.collect_final_price(&b).await?;

        // Sync the ledger off a preview first: a ledger failure must leave
        // the booking alive and retryable.
        let mut preview = b.clone();
        preview.payment_proof = Some(proof.clone());
        preview.price = price;
        let rates = self.settings.cuts;
        preview.assignment.set_cuts(price, &rates);
        preview
            .advance(BookingStatus::Complete)
            .map_err(anyhow::Error::from)?;
        self.ledger_update(&preview).await?;

        let updated = self
            .registry
            .update(booking_id, move |cur| {
                cur.payment_proof = Some(proof);
                cur.price = price;
                cur.assignment.set_cuts(price, &rates);
                cur.advance(BookingStatus::Complete)
                    .map_err(anyhow::Error::from)
            })
            .await?;
        self.notify_status(&updated).await;

        info!(booking_id = %booking_id, price, "booking completed");
        Ok(())
    }

    async fn collect_payment_proof(&self, b: &Booking) -> Result<String, EngineError> {
        self.chat
            .send_dm(
                b.author,
                "Please upload a **screenshot of payment being sent to the bank character**,\nrequest will time out in 5 minutes",
            )
            .await?;
        match await_attachment(self.chat.as_ref(), b.author, self.settings.prompt_timeout())
            .await?
        {
            Some(url) => Ok(url),
            None => Err(EngineError::TimedOut),
        }
    }

    async fn collect_final_price(&self, b: &Booking) -> Result<i64, EngineError> {
        let prompter = self.prompter(b.author);
        let question = format!(
            "the **total boost price**,\nestimated price: **{}**g",
            booking::model::format_gold(b.ad_price_estimate)
        );

        for _ in 0..self.settings.intake_max_retries {
            let input = prompter.ask_text(&question).await?;
            let cleaned = input.replace([',', '.'], "");
            if let Ok(price) = cleaned.parse::<i64>() {
                if price > 0 {
                    return Ok(price);
                }
            }
            prompter
                .send_line("Boost price must be a positive number, please try again.")
                .await?;
        }
        Err(EngineError::RequestFailed(
            "Too many invalid responses, please start over".to_string(),
        ))
    }

    /// Full refunds terminate the booking; partial refunds re-derive a
    /// reduced price from the rating the buyer actually reached and rescale
    /// every cut proportionally, keeping the booking active.
    #[instrument(skip(self), fields(booking_id = %booking_id, actor, ?kind))]
    pub async fn refund(
        &self,
        booking_id: &str,
        actor: UserId,
        kind: RefundKind,
    ) -> Result<(), EngineError> {
        let b = self.require(booking_id).await?;
        self.ensure_authorized(&b, actor)?;
        if b.status != BookingStatus::Pending {
            return Err(EngineError::RequestFailed(
                "Booking status must be pending to refund".to_string(),
            ));
        }

        match kind {
            RefundKind::Full => {
                let mut preview = b.clone();
                preview
                    .advance(BookingStatus::Refund)
                    .map_err(anyhow::Error::from)?;
                self.ledger_update(&preview).await?;

                let updated = self
                    .registry
                    .update(booking_id, |cur| {
                        cur.advance(BookingStatus::Refund)
                            .map_err(anyhow::Error::from)
                    })
                    .await?;
                self.notify_status(&updated).await;
                info!(booking_id = %booking_id, "booking fully refunded");
                Ok(())
            }
            RefundKind::Partial => self.partial_refund(&b, actor).await,
        }
    }

    async fn partial_refund(&self, b: &Booking, actor: UserId) -> Result<(), EngineError> {
        if b.boost_type != Some(BoostType::SetRating) {
            return Err(EngineError::RequestFailed(
                "Only set rating boosts can be partially refunded".to_string(),
            ));
        }
        let (start, end) = b.buyer.rating_range().ok_or_else(|| {
            EngineError::RequestFailed(format!(
                "Booking ``{}`` has no rating range on record",
                b.id
            ))
        })?;

        let prompter = self.prompter(actor);
        let table = &self.settings.pricing;

        let current = self.ask_rating_in_range(&prompter, start, end).await?;

        // The buyer owes the delivered fraction of the climb. The reduced
        // price is that fraction of the agreed figure (the settled price if
        // there is one, else the advertised estimate), floored to whole
        // gold; the four cuts follow the same ratio.
        let delivered = if current > start {
            table.set_rating_price(b.bracket, start, current)?
        } else {
            0
        };
        let full = table.set_rating_price(b.bracket, start, end)?;

        let reference = if b.price > 0 { b.price } else { b.ad_price_estimate };
        let new_price = ((reference as i128) * (delivered as i128) / (full.max(1) as i128)) as i64;
        let factor = new_price as f64 / reference.max(1) as f64;
        let rates = self.settings.cuts;

        let updated = self
            .registry
            .update(&b.id, move |cur| {
                cur.price = new_price;
                if cur.assignment.total() > 0 {
                    cur.assignment.scale(factor);
                } else {
                    cur.assignment.set_cuts(new_price, &rates);
                }
                cur.advance(BookingStatus::PartialRefund)
                    .map_err(anyhow::Error::from)
            })
            .await?;
        self.notify_status(&updated).await;
        self.ledger_update(&updated).await?;

        info!(booking_id = %b.id, new_price, "booking partially refunded");
        Ok(())
    }

    async fn ask_rating_in_range(
        &self,
        prompter: &Prompter<'_>,
        start: i64,
        end: i64,
    ) -> Result<i64, EngineError> {
        let question = format!(
            "**the rating the buyer was at when the refund was issued** ({start}-{end})"
        );
        for _ in 0..self.settings.intake_max_retries {
            let input = prompter.ask_text(&question).await?;
            if let Ok(rating) = input.trim().parse::<i64>() {
                if (start..=end).contains(&rating) {
                    return Ok(rating);
                }
            }
            prompter
                .send_line("Unrecognized rating, please try again")
                .await?;
        }
        Err(EngineError::RequestFailed(
            "Too many invalid responses, please start over".to_string(),
        ))
    }

    /// Hand a booking to a new author.
    #[instrument(skip(self), fields(booking_id = %booking_id, actor, new_author))]
    pub async fn transfer(
        &self,
        booking_id: &str,
        actor: UserId,
        new_author: UserId,
    ) -> Result<(), EngineError> {
        let b = self.require(booking_id).await?;
        self.ensure_authorized(&b, actor)?;

        let updated = self
            .registry
            .update(booking_id, move |cur| {
                cur.author = new_author;
                Ok(())
            })
            .await?;

        let _ = self
            .chat
            .send_dm(
                new_author,
                &format!("Booking ``{}`` has been transferred to you", updated.id),
            )
            .await;

        info!(booking_id = %booking_id, new_author, "booking transferred");
        Ok(())
    }
}
