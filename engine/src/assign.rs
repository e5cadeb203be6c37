//! Posting & assignment: publish the compiled advertisement, wait out the
//! signup window, draw a booster with bad-luck protection, and chase the
//! 3v3 teammate confirmation.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use booking::model::{Booking, BookingStatus, Bracket, PostRef};
use booking::registry::BookingRegistry;
use booking::store::BookingStore;
use gateway::{ChatClient, MessageRef, UserId};

use crate::board::UntakenBoard;
use crate::error::EngineError;
use crate::fairness::{FairnessHandle, apply_big_win_feedback, weighted_draw};
use crate::prompt::await_mention;
use crate::render;
use crate::settings::InstanceSettings;

pub struct AssignmentEngine<S: BookingStore> {
    registry: Arc<BookingRegistry<S>>,
    chat: Arc<dyn ChatClient>,
    fairness: Arc<FairnessHandle>,
    board: Arc<UntakenBoard<S>>,
    settings: Arc<InstanceSettings>,
    rng: Mutex<StdRng>,
}

impl<S: BookingStore> AssignmentEngine<S> {
    pub fn new(
        registry: Arc<BookingRegistry<S>>,
        chat: Arc<dyn ChatClient>,
        fairness: Arc<FairnessHandle>,
        board: Arc<UntakenBoard<S>>,
        settings: Arc<InstanceSettings>,
    ) -> Self {
        Self::with_rng(registry, chat, fairness, board, settings, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(
        registry: Arc<BookingRegistry<S>>,
        chat: Arc<dyn ChatClient>,
        fairness: Arc<FairnessHandle>,
        board: Arc<UntakenBoard<S>>,
        settings: Arc<InstanceSettings>,
        seed: u64,
    ) -> Self {
        Self::with_rng(
            registry,
            chat,
            fairness,
            board,
            settings,
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        registry: Arc<BookingRegistry<S>>,
        chat: Arc<dyn ChatClient>,
        fairness: Arc<FairnessHandle>,
        board: Arc<UntakenBoard<S>>,
        settings: Arc<InstanceSettings>,
        rng: StdRng,
    ) -> Self {
        Self {
            registry,
            chat,
            fairness,
            board,
            settings,
            rng: Mutex::new(rng),
        }
    }

    async fn author_display(&self, b: &Booking) -> String {
        self.chat
            .display_name(b.author)
            .await
            .unwrap_or_else(|_| b.author.to_string())
    }

    /// Publish a compiled booking to its bracket's post channel and seed
    /// the signup reactions.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn publish(&self, booking_id: &str) -> Result<(), EngineError> {
        let b = self
            .registry
            .get(booking_id)
            .await
            .ok_or_else(|| not_found(booking_id))?;
        if b.status != BookingStatus::Compiling {
            return Err(EngineError::RequestFailed(format!(
                "Booking ``{booking_id}`` has already been posted"
            )));
        }

        let display = self.author_display(&b).await;
        let ad = render::post_ad(
            &b,
            &display,
            &self.settings.cuts,
            false,
            self.settings.timing.post_wait_secs,
        );
        let channel = self.settings.channels.post_for(b.bracket, b.boost_type);
        let post = self.chat.send_channel(channel, &ad).await?;

        self.chat
            .send_dm(
                b.author,
                &format!("Booking has been sent! booking ID is: ``{}``", b.id),
            )
            .await?;
        self.chat.add_signal(post, &self.settings.signals.take).await?;
        self.chat
            .add_signal(post, &self.settings.signals.schedule)
            .await?;

        self.registry
            .update(booking_id, |cur| {
                cur.post_ref = PostRef::Live(post);
                cur.advance(BookingStatus::Posted)
                    .map_err(anyhow::Error::from)
            })
            .await?;

        info!(booking_id = %b.id, channel, "booking posted");
        Ok(())
    }

    /// Wait the signup window, then settle on a booster.
    ///
    /// Volunteers reacting with the take signal are preferred; the schedule
    /// signal is the fallback pool. No reactions at all parks the booking
    /// on the untaken board and surfaces [`EngineError::NoVolunteers`],
    /// which is not a cancellation.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn pick_winner(&self, booking_id: &str) -> Result<(), EngineError> {
        {
            let b = self
                .registry
                .get(booking_id)
                .await
                .ok_or_else(|| not_found(booking_id))?;
            if b.status != BookingStatus::Posted {
                return Err(EngineError::RequestFailed(format!(
                    "Booking ``{booking_id}`` is not currently posted"
                )));
            }
        }

        let signals = &self.settings.signals;
        let mut rerolls = 0u32;

        loop {
            tokio::time::sleep(self.settings.post_wait()).await;

            // Re-read: the sweep may have expired the booking mid-window.
            let b = self
                .registry
                .get(booking_id)
                .await
                .ok_or_else(|| not_found(booking_id))?;
            let post = b.post_ref.live().ok_or_else(|| {
                EngineError::NotFound(format!(
                    "The advertisement for booking ``{booking_id}`` is gone"
                ))
            })?;

            let mut reactors = self.chat.fetch_reactors(post, &signals.take).await?;
            let mut availability = "now";
            if reactors.is_empty() {
                reactors = self.chat.fetch_reactors(post, &signals.schedule).await?;
                availability = "schedule";
            }
            if reactors.is_empty() {
                return self.mark_untaken(&b, post).await;
            }

            self.chat.clear_signals(post).await?;

            let weights = self.fairness.snapshot(b.bracket).await?;
            let winner = {
                let mut rng = self.rng.lock().await;
                weighted_draw(&mut *rng, &reactors, &weights)
            }
            .ok_or_else(|| {
                EngineError::RequestFailed("No candidates were left to draw from".to_string())
            })?;

            let display = self.author_display(&b).await;
            let channel = self.settings.channels.post_for(b.bracket, b.boost_type);
            let teammate_note = if b.bracket == Bracket::ThreeVsThree {
                format!(
                    ", **please mention your teammate** within {} minutes or the booking will be rerolled",
                    self.settings.timing.teammate_pick_timeout_secs / 60
                )
            } else {
                String::new()
            };
            self.chat
                .send_channel(
                    channel,
                    &format!(
                        "<@{winner}> was picked for {display}'s ``{}`` boost ({availability}){teammate_note}",
                        b.boost_summary()
                    ),
                )
                .await?;

            let mut secondary = None;
            if b.bracket == Bracket::ThreeVsThree {
                match await_mention(
                    self.chat.as_ref(),
                    winner,
                    self.settings.teammate_timeout(),
                )
                .await?
                {
                    Some(teammate) => {
                        secondary = Some(teammate);
                        self.chat
                            .send_channel(
                                channel,
                                &format!(
                                    "<@{teammate}> has been picked as <@{winner}>'s teammate"
                                ),
                            )
                            .await?;
                    }
                    None => {
                        rerolls += 1;
                        if rerolls > self.settings.max_teammate_rerolls {
                            warn!(
                                booking_id = %b.id,
                                rerolls,
                                "teammate reroll budget exhausted, parking as untaken"
                            );
                            return self.mark_untaken(&b, post).await;
                        }

                        let ad = render::post_ad(
                            &b,
                            &display,
                            &self.settings.cuts,
                            true,
                            self.settings.timing.post_wait_secs,
                        );
                        let new_post = self.chat.send_channel(channel, &ad).await?;
                        self.chat.add_signal(new_post, &signals.take).await?;
                        self.chat.add_signal(new_post, &signals.schedule).await?;
                        self.registry
                            .update(booking_id, |cur| {
                                cur.post_ref = PostRef::Live(new_post);
                                Ok(())
                            })
                            .await?;

                        info!(booking_id = %b.id, rerolls, "teammate pick timed out, rerolling");
                        continue;
                    }
                }
            }

            // The final price is unknown at draw time, so the fairness
            // feedback keys off the advertised estimate's booster share.
            let mut estimated_cut =
                (b.ad_price_estimate as f64 * self.settings.cuts.booster).round() as i64;
            if secondary.is_some() {
                estimated_cut /= 2;
            }

            let tuning = self.settings.fairness;
            let reactors_snapshot = reactors.clone();
            self.fairness
                .adjust(b.bracket, move |table| {
                    for user in &reactors_snapshot {
                        table.entry(*user).or_insert(1.0);
                    }
                    apply_big_win_feedback(table, &reactors_snapshot, winner, estimated_cut, &tuning)
                })
                .await?;

            self.registry
                .update(booking_id, |cur| {
                    cur.assignment.primary = Some(winner);
                    cur.assignment.secondary = secondary;
                    cur.post_ref.archive();
                    cur.advance(BookingStatus::PendingNotUploaded)
                        .map_err(anyhow::Error::from)
                })
                .await?;

            info!(booking_id = %b.id, winner, ?secondary, "booster assigned");
            return Ok(());
        }
    }

    /// Nobody signed up: clear the reactions, park the booking on the
    /// untaken board, and tell both the channel and the author.
    async fn mark_untaken(&self, b: &Booking, post: MessageRef) -> Result<(), EngineError> {
        self.chat.clear_signals(post).await?;

        let channel = self.settings.channels.post_for(b.bracket, b.boost_type);
        let teammate_hint = if b.bracket == Bracket::ThreeVsThree {
            " <mention teammate>"
        } else {
            ""
        };
        self.chat
            .send_channel(
                channel,
                &format!(
                    "No users signed up to booking ``{id}``, it has been moved to the untaken boosts board. To claim it, type ``{prefix}take {id}{teammate_hint}``",
                    id = b.id,
                    prefix = self.settings.command_prefix,
                ),
            )
            .await?;
        self.chat
            .send_dm(
                b.author,
                &format!(
                    "No users signed up to booking ``{}``, it will be moved to the untaken boosts board",
                    b.id
                ),
            )
            .await?;

        self.registry
            .update(&b.id, |cur| {
                cur.post_ref.archive();
                cur.advance(BookingStatus::Untaken)
                    .map_err(anyhow::Error::from)
            })
            .await?;

        if let Err(e) = self.board.render().await {
            warn!(error = ?e, "untaken board refresh failed");
        }

        info!(booking_id = %b.id, "booking marked untaken");
        Err(EngineError::NoVolunteers)
    }
}

fn not_found(booking_id: &str) -> EngineError {
    EngineError::NotFound(format!("No booking was found with ID ``{booking_id}``"))
}

/// Winner of a 3v3 assignment still owing a teammate mention.
pub fn needs_teammate(bracket: Bracket, secondary: Option<UserId>) -> bool {
    bracket == Bracket::ThreeVsThree && secondary.is_none()
}
