//! Plain-text rendering of advertisements, announcements and board entries.

use booking::model::{Booking, BoostType, CutRates, format_gold};

/// The advertisement published to a post channel.
pub fn post_ad(
    b: &Booking,
    author_display: &str,
    rates: &CutRates,
    rerolled: bool,
    post_wait_secs: u64,
) -> String {
    let title = if rerolled {
        format!("Rerolled {} booking", b.bracket)
    } else {
        format!("New {} booking", b.bracket)
    };

    let buyer = &b.buyer;
    let faction = buyer
        .faction
        .map(|f| f.to_string())
        .unwrap_or_else(|| "?".into());

    format!(
        "**{title}**\n\
         **ID:** ``{id}`` — requested by {author_display}\n\
         Buyer: ``{name}-{realm}`` {faction}\n\
         Boost type: ``{boost_type}``\n\
         Boost rating: ``{rating}``\n\
         Buyer spec: ``{spec} {class}``\n\
         Est. booster cut: {cut}\n\
         Notes: ``{notes}``\n\
         Winner will be picked in {post_wait_secs} seconds",
        id = b.id,
        name = buyer.name.as_deref().unwrap_or("?"),
        realm = buyer.realm.as_deref().unwrap_or("?"),
        boost_type = b.boost_type.map(|t| t.to_string()).unwrap_or_else(|| "?".into()),
        rating = buyer.rating.as_deref().unwrap_or("?"),
        spec = buyer.spec.as_deref().unwrap_or("?"),
        class = buyer.class_name.as_deref().unwrap_or("?"),
        cut = price_estimate_line(b, rates),
        notes = b.notes.as_deref().unwrap_or("N/A"),
    )
}

/// The booster-cut figure shown on advertisements and the untaken board.
pub fn price_estimate_line(b: &Booking, rates: &CutRates) -> String {
    if b.boost_type == Some(BoostType::Gladiator) {
        return "``See glad pricing``".to_string();
    }
    let cut = (b.ad_price_estimate as f64 * rates.booster).round() as i64;
    let mut line = format!("{}g", format_gold(cut));
    if b.boost_type == Some(BoostType::Hourly) {
        line.push_str("/hr");
    }
    format!("``{line}``")
}

/// `dd/mm HH:MM` UTC stamp for board entries.
pub fn created_stamp(created_at_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(created_at_ms as i64)
        .map(|dt| dt.format("%d/%m %H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}
