//! The intake protocol: a strictly ordered sequence of DM prompts that
//! fills in a compiling booking's buyer and boost fields.
//!
//! Invalid answers are handled where they happen by re-prompting, up to the
//! configured retry budget. An explicit cancel or an elapsed prompt deletes
//! the booking outright.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use booking::model::{Booking, BoostType, Faction, PriceRecommendation};
use booking::registry::BookingRegistry;
use booking::roster;
use booking::store::BookingStore;
use gateway::{ChatClient, ProfileLookup, ProfileResult, Reply};

use crate::error::EngineError;
use crate::prompt::Prompter;
use crate::settings::InstanceSettings;

pub struct IntakeFlow<S: BookingStore> {
    registry: Arc<BookingRegistry<S>>,
    chat: Arc<dyn ChatClient>,
    profiles: Arc<dyn ProfileLookup>,
    settings: Arc<InstanceSettings>,
}

/// Lowercase everything but the first letter, which is how free-typed
/// answers are normalized before matching ("set RATING" -> "Set rating").
fn capitalize(input: &str) -> String {
    let mut chars = input.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Strip thousands separators and parse a positive gold amount.
fn parse_positive_gold(input: &str) -> Option<i64> {
    let cleaned = input.replace([',', '.'], "");
    let value: i64 = cleaned.parse().ok()?;
    (value > 0).then_some(value)
}

impl<S: BookingStore> IntakeFlow<S> {
    pub fn new(
        registry: Arc<BookingRegistry<S>>,
        chat: Arc<dyn ChatClient>,
        profiles: Arc<dyn ProfileLookup>,
        settings: Arc<InstanceSettings>,
    ) -> Self {
        Self {
            registry,
            chat,
            profiles,
            settings,
        }
    }

    /// Run the full question sequence against the booking's author.
    ///
    /// On cancel or timeout the booking is deleted and the condition is
    /// propagated so the creation flow stops.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn run(&self, booking_id: &str) -> Result<Booking, EngineError> {
        let mut b = self
            .registry
            .get(booking_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("No booking was found with ID ``{booking_id}``")))?;

        match self.compile(&mut b).await {
            Ok(()) => {
                info!(booking_id = %b.id, "intake complete");
                Ok(b)
            }
            Err(e @ (EngineError::Cancelled | EngineError::TimedOut)) => {
                let _ = self
                    .chat
                    .send_dm(
                        b.author,
                        &format!("Booking ``{}`` has been cancelled", b.id),
                    )
                    .await;
                if let Err(remove_err) = self.registry.remove(&b.id).await {
                    warn!(error = ?remove_err, booking_id = %b.id, "failed to remove cancelled booking");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn compile(&self, b: &mut Booking) -> Result<(), EngineError> {
        self.boost_type_step(b).await?;
        self.save(b).await?;
        self.identity_step(b).await?;
        self.save(b).await?;
        self.spec_step(b).await?;
        self.save(b).await?;
        self.rating_step(b).await?;
        self.save(b).await?;
        self.estimate_step(b).await?;
        self.save(b).await?;
        self.notes_step(b).await?;
        self.save(b).await?;
        Ok(())
    }

    /// Push the locally mutated booking back through the registry so every
    /// answered step is recoverable after a restart.
    async fn save(&self, b: &Booking) -> Result<(), EngineError> {
        let snapshot = b.clone();
        self.registry
            .update(&b.id, move |cur| {
                *cur = snapshot;
                Ok(())
            })
            .await?;
        Ok(())
    }

    fn prompter<'a>(&'a self, b: &Booking) -> Prompter<'a> {
        Prompter {
            chat: self.chat.as_ref(),
            user: b.author,
            cancel: self.settings.signals.cancel.clone(),
            timeout: self.settings.prompt_timeout(),
        }
    }

    fn retry_budget_exhausted() -> EngineError {
        EngineError::RequestFailed("Too many invalid responses, please start over".to_string())
    }

    async fn boost_type_step(&self, b: &mut Booking) -> Result<(), EngineError> {
        let prompter = self.prompter(b);
        let options = BoostType::options(b.bracket);
        let listing = options
            .iter()
            .map(|t| format!("``{t}``"))
            .collect::<Vec<_>>()
            .join("\n");
        let question = format!(
            "the **boost type**, accepted responses:\n{listing}\nor react with {} to cancel the booking",
            self.settings.signals.cancel
        );

        for _ in 0..self.settings.intake_max_retries {
            let input = capitalize(&prompter.ask_text(&question).await?);
            if let Ok(boost_type) = input.parse::<BoostType>() {
                if boost_type.valid_for(b.bracket) {
                    b.boost_type = Some(boost_type);
                    return Ok(());
                }
            }
            prompter
                .send_line("Boost type not recognised, please try again.")
                .await?;
        }
        Err(Self::retry_budget_exhausted())
    }

    async fn identity_step(&self, b: &mut Booking) -> Result<(), EngineError> {
        let prompter = self.prompter(b);
        let signals = &self.settings.signals;

        for _ in 0..self.settings.intake_max_retries {
            let name_raw = prompter
                .ask_text(&format!(
                    "the **buyer's character name** (e.g. Mystikdruldk)\nor react with {} to cancel the booking",
                    signals.cancel
                ))
                .await?;
            let realm_raw = prompter
                .ask_text(&format!(
                    "the **buyer's realm** (e.g. Ravencrest)\n**if the realm name is multiple words you can use spaces**\nor react with {} to cancel the booking",
                    signals.cancel
                ))
                .await?;

            let name = roster::capwords(&name_raw);
            let realm = roster::canonical_realm(&realm_raw);
            b.buyer.name = Some(name.clone());
            b.buyer.realm = Some(realm.clone());

            if !self.settings.auto_profile_lookup {
                return self.manual_faction_and_class(b).await;
            }

            match self.profiles.lookup(&realm, &name).await {
                Ok(ProfileResult::Found(profile)) => {
                    match profile.faction.parse::<Faction>() {
                        Ok(faction) => b.buyer.faction = Some(faction),
                        Err(_) => return self.manual_faction_and_class(b).await,
                    }
                    match roster::canonical_class(&profile.class_name) {
                        Some(class_name) => b.buyer.class_name = Some(class_name.to_string()),
                        None => return self.manual_class_step(b).await,
                    }
                    return Ok(());
                }
                Ok(ProfileResult::NotFound) => {
                    let choice = prompter
                        .ask_signal(
                            &format!(
                                "**No character was found with that name-realm**, you can either input the buyer's faction and class manually ({}), re-enter the name ({}), or cancel the booking ({}).",
                                signals.manual_entry, signals.retry, signals.cancel
                            ),
                            &[signals.manual_entry.clone(), signals.retry.clone()],
                        )
                        .await?;
                    if choice == signals.retry {
                        continue;
                    }
                    return self.manual_faction_and_class(b).await;
                }
                Err(e) => {
                    warn!(error = ?e, "profile lookup unavailable, degrading to manual entry");
                    prompter
                        .send_line(
                            "**An unexpected error occurred trying to find a player with that name-realm**, please input the buyer's faction and class manually.",
                        )
                        .await?;
                    return self.manual_faction_and_class(b).await;
                }
            }
        }
        Err(Self::retry_budget_exhausted())
    }

    async fn manual_faction_and_class(&self, b: &mut Booking) -> Result<(), EngineError> {
        let prompter = self.prompter(b);
        let signals = &self.settings.signals;

        let choice = prompter
            .ask_signal(
                &format!(
                    "the **buyer's faction**: react with {} for Horde or {} for Alliance\nor react with {} to cancel the booking",
                    signals.horde, signals.alliance, signals.cancel
                ),
                &[signals.horde.clone(), signals.alliance.clone()],
            )
            .await?;
        b.buyer.faction = Some(if choice == signals.horde {
            Faction::Horde
        } else {
            Faction::Alliance
        });

        self.manual_class_step(b).await
    }

    async fn manual_class_step(&self, b: &mut Booking) -> Result<(), EngineError> {
        let prompter = self.prompter(b);
        let listing = roster::class_list()
            .map(|c| format!("``{c}``"))
            .collect::<Vec<_>>()
            .join("\n");
        let question = format!(
            "the **buyer's class**, accepted responses:\n{listing}\nor react with {} to cancel the booking",
            self.settings.signals.cancel
        );

        for _ in 0..self.settings.intake_max_retries {
            let input = prompter.ask_text(&question).await?;
            if let Some(class_name) = roster::canonical_class(&input) {
                b.buyer.class_name = Some(class_name.to_string());
                return Ok(());
            }
            prompter
                .send_line("Class not recognised, please try again.")
                .await?;
        }
        Err(Self::retry_budget_exhausted())
    }

    async fn spec_step(&self, b: &mut Booking) -> Result<(), EngineError> {
        let class_name = b.buyer.class_name.clone().ok_or_else(|| {
            EngineError::RequestFailed("Cannot get spec when class is not known".to_string())
        })?;

        let prompter = self.prompter(b);
        let listing = roster::class_specs(&class_name)
            .unwrap_or(&[])
            .iter()
            .map(|s| format!("``{s}``"))
            .collect::<Vec<_>>()
            .join("\n");
        let question = format!("the **buyer's spec**, accepted responses:\n{listing}");

        for _ in 0..self.settings.intake_max_retries {
            let input = prompter.ask_text(&question).await?;
            if let Some(spec) = roster::canonical_spec(&class_name, &input) {
                b.buyer.spec = Some(spec.to_string());
                return Ok(());
            }
            prompter
                .send_line("Spec not recognised, please try again.")
                .await?;
        }
        Err(Self::retry_budget_exhausted())
    }

    async fn rating_step(&self, b: &mut Booking) -> Result<(), EngineError> {
        let boost_type = b.boost_type.ok_or_else(|| {
            EngineError::RequestFailed(
                "Cannot get rating range when boost type is not known".to_string(),
            )
        })?;

        let prompter = self.prompter(b);
        let table = &self.settings.pricing;
        let what = if boost_type == BoostType::SetRating {
            "the **buyer's start-desired rating** (e.g. 1049-1800)"
        } else {
            "the **buyer's current rating** (e.g. 1687)"
        };
        let question = format!(
            "{what}\nor react with {} to cancel the booking",
            self.settings.signals.cancel
        );

        for _ in 0..self.settings.intake_max_retries {
            let input = prompter.ask_text(&question).await?;

            if boost_type == BoostType::SetRating {
                let parsed = input.split_once('-').and_then(|(a, c)| {
                    Some((a.trim().parse::<i64>().ok()?, c.trim().parse::<i64>().ok()?))
                });
                if let Some((start, end)) = parsed {
                    let max = table.max_set_rating();
                    if (0..=max).contains(&start) && (0..=max).contains(&end) && start < end {
                        b.buyer.rating = Some(format!("{start}-{end}"));
                        b.price_recommendation = Some(PriceRecommendation::Gold(
                            table.set_rating_price(b.bracket, start, end)?,
                        ));
                        return Ok(());
                    }
                }
            } else if let Ok(rating) = input.parse::<i64>() {
                if (0..=table.max_single_rating()).contains(&rating) {
                    b.buyer.rating = Some(rating.to_string());
                    b.price_recommendation = Some(match boost_type {
                        BoostType::OneWin => {
                            PriceRecommendation::Gold(table.one_win_price(b.bracket, rating)?)
                        }
                        BoostType::Gladiator => PriceRecommendation::SeeGladPricing,
                        _ => PriceRecommendation::Gold(table.hourly_price(b.bracket)),
                    });
                    return Ok(());
                }
            }

            prompter
                .send_line("Rating format not recognised, please check your format and try again")
                .await?;
        }
        Err(Self::retry_budget_exhausted())
    }

    async fn estimate_step(&self, b: &mut Booking) -> Result<(), EngineError> {
        let prompter = self.prompter(b);
        let recommendation = b
            .price_recommendation
            .map(|r| r.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let question = format!(
            "the **estimated price of the boost**,\nrecommended price: **{recommendation}**\nThis is not the final price, just what is shown when the booking is posted"
        );

        for _ in 0..self.settings.intake_max_retries {
            let input = prompter.ask_text(&question).await?;
            if let Some(value) = parse_positive_gold(&input) {
                b.ad_price_estimate = value;
                return Ok(());
            }
            prompter
                .send_line("Boost price must be a positive number, please try again.")
                .await?;
        }
        Err(Self::retry_budget_exhausted())
    }

    async fn notes_step(&self, b: &mut Booking) -> Result<(), EngineError> {
        let prompter = self.prompter(b);
        let signals = &self.settings.signals;
        let reply = prompter
            .ask(
                &format!(
                    "**any additional notes** about the buyer, react with {} to skip\nor react with {} to cancel the booking",
                    signals.skip, signals.cancel
                ),
                &[signals.skip.clone()],
            )
            .await?;

        b.notes = Some(match reply {
            Reply::Message(m) => m.content.trim().to_string(),
            Reply::Signal(_) => "N/A".to_string(),
        });
        Ok(())
    }
}
