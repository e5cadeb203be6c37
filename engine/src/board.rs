//! The untaken board: a standing, paginated listing of unclaimed bookings
//! per bracket.
//!
//! Rendering diffs against what was last published and only issues edit,
//! create or delete calls for pages whose content actually changed. The
//! publishing surface is rate-limited, so an unchanged board must cost
//! zero calls.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use booking::model::{Booking, Bracket};
use booking::registry::BookingRegistry;
use booking::store::BookingStore;
use gateway::{ChatClient, MessageRef};

use crate::error::EngineError;
use crate::render;
use crate::settings::InstanceSettings;

const PAGE_SIZE: usize = 10;

struct RenderedPage {
    target: MessageRef,
    content: String,
}

pub struct UntakenBoard<S: BookingStore> {
    registry: Arc<BookingRegistry<S>>,
    chat: Arc<dyn ChatClient>,
    settings: Arc<InstanceSettings>,
    rendered: Mutex<HashMap<Bracket, Vec<RenderedPage>>>,
}

impl<S: BookingStore> UntakenBoard<S> {
    pub fn new(
        registry: Arc<BookingRegistry<S>>,
        chat: Arc<dyn ChatClient>,
        settings: Arc<InstanceSettings>,
    ) -> Self {
        Self {
            registry,
            chat,
            settings,
            rendered: Mutex::new(HashMap::new()),
        }
    }

    /// Re-render both brackets' listings, diffing against the previously
    /// published pages.
    pub async fn render(&self) -> Result<(), EngineError> {
        for bracket in Bracket::ALL {
            self.render_bracket(bracket).await?;
        }
        Ok(())
    }

    async fn render_bracket(&self, bracket: Bracket) -> Result<(), EngineError> {
        let mut boosts = self.registry.untaken_for(bracket).await;
        boosts.sort_by(|a, b| {
            (a.buyer.class_name.as_deref(), a.buyer.spec.as_deref())
                .cmp(&(b.buyer.class_name.as_deref(), b.buyer.spec.as_deref()))
        });

        let pages = self.build_pages(bracket, &boosts);
        let channel = self.settings.channels.untaken_for(bracket);

        let mut rendered = self.rendered.lock().await;
        let published = rendered.entry(bracket).or_default();

        // Drop pages beyond the new page count.
        while published.len() > pages.len() {
            if let Some(stale) = published.pop() {
                info!(message = stale.target.message, "deleting stale untaken page");
                if let Err(e) = self.chat.delete_message(stale.target).await {
                    warn!(error = ?e, "tried to delete an untaken page that was not there");
                }
            }
        }

        for (i, content) in pages.iter().enumerate() {
            if let Some(existing) = published.get_mut(i) {
                if existing.content == *content {
                    debug!(page = i, "untaken page unchanged, skipping edit");
                    continue;
                }
                self.chat.edit_message(existing.target, content).await?;
                existing.content = content.clone();
                info!(page = i, "edited untaken page");
            } else {
                let target = self.chat.send_channel(channel, content).await?;
                published.push(RenderedPage {
                    target,
                    content: content.clone(),
                });
                info!(page = i, message = target.message, "created untaken page");
            }
        }

        Ok(())
    }

    /// Page strings for one bracket, grouped with a heading whenever the
    /// (class, spec) combination changes.
    fn build_pages(&self, bracket: Bracket, boosts: &[Booking]) -> Vec<String> {
        let header = format!(
            "**Untaken {bracket} boosts**\nType ``{}take <ID>{}`` to claim a boost",
            self.settings.command_prefix,
            if bracket == Bracket::ThreeVsThree {
                " <mention teammate>"
            } else {
                ""
            },
        );

        if boosts.is_empty() {
            return vec![format!(
                "{header}\n\nThere are currently no untaken boosts"
            )];
        }

        let mut pages = Vec::new();
        for (page_index, chunk) in boosts.chunks(PAGE_SIZE).enumerate() {
            let mut page = if page_index == 0 {
                header.clone()
            } else {
                format!("**Untaken {bracket} boosts (page {})**", page_index + 1)
            };

            for (n, b) in chunk.iter().enumerate() {
                let overall = page_index * PAGE_SIZE + n;
                let group = (b.buyer.spec.as_deref(), b.buyer.class_name.as_deref());
                let prev_group = overall
                    .checked_sub(1)
                    .and_then(|p| boosts.get(p))
                    .map(|p| (p.buyer.spec.as_deref(), p.buyer.class_name.as_deref()));
                if prev_group != Some(group) {
                    page.push_str(&format!(
                        "\n\n__**{} {} bookings**__",
                        group.0.unwrap_or("?"),
                        group.1.unwrap_or("?"),
                    ));
                }

                page.push_str(&format!(
                    "\n\nID: ``{id}`` Author: <@{author}>\nBoost info: ``{summary}`` {estimate}\nBuyer info: {name}-{realm}\nCreated: ``{created}``\nNotes: ``{notes}``",
                    id = b.id,
                    author = b.author,
                    summary = b.boost_summary(),
                    estimate = render::price_estimate_line(b, &self.settings.cuts),
                    name = b.buyer.name.as_deref().unwrap_or("?"),
                    realm = b.buyer.realm.as_deref().unwrap_or("?"),
                    created = render::created_stamp(b.created_at_ms),
                    notes = b.notes.as_deref().unwrap_or("N/A"),
                ));
            }

            pages.push(page);
        }

        pages
    }
}
