use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gateway::{MessageId, MessageRef, UserId};

pub type BookingId = String;

/// The game-mode category a boost is played in. Governs pricing tables,
/// posting channels and team size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bracket {
    TwoVsTwo,
    ThreeVsThree,
}

impl Bracket {
    pub const ALL: [Bracket; 2] = [Bracket::TwoVsTwo, Bracket::ThreeVsThree];

    /// Number of boosters fulfilling a booking in this bracket.
    pub fn team_size(self) -> usize {
        match self {
            Bracket::TwoVsTwo => 1,
            Bracket::ThreeVsThree => 2,
        }
    }
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Bracket::TwoVsTwo => "2v2",
            Bracket::ThreeVsThree => "3v3",
        };
        f.write_str(s)
    }
}

impl FromStr for Bracket {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2v2" => Ok(Bracket::TwoVsTwo),
            "3v3" => Ok(Bracket::ThreeVsThree),
            other => Err(anyhow::anyhow!("Invalid bracket value: {}", other)),
        }
    }
}

/// The service being purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoostType {
    Hourly,
    OneWin,
    SetRating,
    /// 3v3-only; priced off a separate sheet rather than the tier tables.
    Gladiator,
}

impl BoostType {
    /// Boost types a requester may pick in `bracket`.
    pub fn options(bracket: Bracket) -> &'static [BoostType] {
        match bracket {
            Bracket::TwoVsTwo => &[BoostType::Hourly, BoostType::OneWin, BoostType::SetRating],
            Bracket::ThreeVsThree => &[
                BoostType::Hourly,
                BoostType::OneWin,
                BoostType::SetRating,
                BoostType::Gladiator,
            ],
        }
    }

    pub fn valid_for(self, bracket: Bracket) -> bool {
        BoostType::options(bracket).contains(&self)
    }
}

impl fmt::Display for BoostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BoostType::Hourly => "Hourly",
            BoostType::OneWin => "1 win",
            BoostType::SetRating => "Set rating",
            BoostType::Gladiator => "Gladiator",
        };
        f.write_str(s)
    }
}

impl FromStr for BoostType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hourly" => Ok(BoostType::Hourly),
            "1 win" => Ok(BoostType::OneWin),
            "Set rating" => Ok(BoostType::SetRating),
            "Gladiator" => Ok(BoostType::Gladiator),
            other => Err(anyhow::anyhow!("Invalid boost type value: {}", other)),
        }
    }
}

/// Lifecycle of a booking. Ordinals matter: surrounding logic compares
/// progress with them, and transitions only ever move along the edges
/// checked in [`BookingStatus::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Compiling,
    Posted,
    PendingNotUploaded,
    Pending,
    Refund,
    PartialRefund,
    Complete,
    Untaken,
}

impl BookingStatus {
    pub fn ordinal(self) -> u8 {
        match self {
            BookingStatus::Compiling => 0,
            BookingStatus::Posted => 1,
            BookingStatus::PendingNotUploaded => 2,
            BookingStatus::Pending => 3,
            BookingStatus::Refund => 4,
            BookingStatus::PartialRefund => 5,
            BookingStatus::Complete => 6,
            BookingStatus::Untaken => 7,
        }
    }

    /// Whether `self -> to` is a legal move through the lifecycle graph.
    pub fn can_transition(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Compiling, Posted)
                | (Posted, PendingNotUploaded)
                | (Posted, Untaken)
                | (Untaken, Pending)
                | (PendingNotUploaded, Pending)
                | (Pending, Refund)
                | (Pending, PartialRefund)
                | (Pending, Complete)
                | (PartialRefund, Complete)
        )
    }

    /// Terminal bookings are dropped from the registry and the store.
    ///
    /// A partial refund is deliberately *not* terminal: the boost is still
    /// owed its remaining climb and can be completed later.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Refund | BookingStatus::Complete)
    }

    /// Uncommitted bookings make a shutdown unsafe: no booster has been
    /// settled on yet, so crash recovery would strand the requester mid-flow.
    pub fn is_uncommitted(self) -> bool {
        matches!(
            self,
            BookingStatus::Compiling | BookingStatus::Posted | BookingStatus::PendingNotUploaded
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Compiling => "Compiling",
            BookingStatus::Posted => "Posted",
            BookingStatus::PendingNotUploaded => "Pending (not uploaded)",
            BookingStatus::Pending => "Pending",
            BookingStatus::Refund => "Refund",
            BookingStatus::PartialRefund => "Partial refund",
            BookingStatus::Complete => "Complete",
            BookingStatus::Untaken => "Untaken",
        };
        f.write_str(s)
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Compiling" => Ok(BookingStatus::Compiling),
            "Posted" => Ok(BookingStatus::Posted),
            "Pending (not uploaded)" => Ok(BookingStatus::PendingNotUploaded),
            "Pending" => Ok(BookingStatus::Pending),
            "Refund" => Ok(BookingStatus::Refund),
            "Partial refund" => Ok(BookingStatus::PartialRefund),
            "Complete" => Ok(BookingStatus::Complete),
            "Untaken" => Ok(BookingStatus::Untaken),
            other => Err(anyhow::anyhow!("Invalid booking status value: {}", other)),
        }
    }
}

#[derive(Debug, Error)]
#[error("cannot move booking from `{from}` to `{to}`")]
pub struct TransitionError {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Horde,
    Alliance,
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Faction::Horde => "Horde",
            Faction::Alliance => "Alliance",
        };
        f.write_str(s)
    }
}

impl FromStr for Faction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Horde" => Ok(Faction::Horde),
            "Alliance" => Ok(Faction::Alliance),
            other => Err(anyhow::anyhow!("Invalid faction value: {}", other)),
        }
    }
}

/// Suggested price for the requester, produced by the pricing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceRecommendation {
    Gold(i64),
    /// Gladiator boosts are priced off a dedicated sheet.
    SeeGladPricing,
}

impl fmt::Display for PriceRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceRecommendation::Gold(n) => f.write_str(&format_gold(*n)),
            PriceRecommendation::SeeGladPricing => f.write_str("See glad pricing"),
        }
    }
}

/// Thousands-separated gold amount, e.g. `1,250,000`.
pub fn format_gold(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Who the boost is for. Filled in piecewise by the intake protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: Option<String>,
    pub realm: Option<String>,
    pub faction: Option<Faction>,
    pub class_name: Option<String>,
    pub spec: Option<String>,
    /// Either a single value ("1687") or a "start-end" pair ("1049-1800").
    pub rating: Option<String>,
}

impl Buyer {
    /// Parse a "start-end" rating pair, when present.
    pub fn rating_range(&self) -> Option<(i64, i64)> {
        let raw = self.rating.as_deref()?;
        let (a, b) = raw.split_once('-')?;
        Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
    }
}

/// Percentage split of the final price between the involved parties.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutRates {
    pub booster: f64,
    pub advertiser: f64,
    pub management: f64,
}

impl Default for CutRates {
    fn default() -> Self {
        Self {
            booster: 0.7,
            advertiser: 0.2,
            management: 0.1,
        }
    }
}

/// The boosters fulfilling a booking and everybody's gold cut.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub primary: Option<UserId>,
    /// Only ever set for 3v3 bookings.
    pub secondary: Option<UserId>,
    pub primary_cut: i64,
    pub secondary_cut: i64,
    pub advertiser_cut: i64,
    pub management_cut: i64,
}

impl Assignment {
    /// Derive all cuts from a finalized price. The booster share is split in
    /// half when a secondary booster is assigned.
    pub fn set_cuts(&mut self, price: i64, rates: &CutRates) {
        // Booster share rounds, the other two floor: as long as the rates
        // sum to at most 1 the integer cut total cannot exceed the price.
        let booster_total = (price as f64 * rates.booster).round() as i64;
        if self.secondary.is_some() {
            self.primary_cut = booster_total / 2;
            self.secondary_cut = booster_total / 2;
        } else {
            self.primary_cut = booster_total;
            self.secondary_cut = 0;
        }
        self.advertiser_cut = (price as f64 * rates.advertiser).floor() as i64;
        self.management_cut = (price as f64 * rates.management).floor() as i64;
    }

    /// Rescale every cut by `factor`, flooring to whole gold so the cut sum
    /// can never creep above the reduced price.
    pub fn scale(&mut self, factor: f64) {
        let scale = |v: i64| ((v as f64) * factor).floor() as i64;
        self.primary_cut = scale(self.primary_cut);
        self.secondary_cut = scale(self.secondary_cut);
        self.advertiser_cut = scale(self.advertiser_cut);
        self.management_cut = scale(self.management_cut);
    }

    pub fn total(&self) -> i64 {
        self.primary_cut + self.secondary_cut + self.advertiser_cut + self.management_cut
    }
}

/// Where the public advertisement currently lives.
///
/// `Live` keeps the full reference for reaction handling; once the booking
/// no longer needs live interaction the reference is archived down to a
/// bare message id (enough for a later "rebook" hint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostRef {
    None,
    Live(MessageRef),
    Archived(MessageId),
}

impl PostRef {
    pub fn live(&self) -> Option<MessageRef> {
        match self {
            PostRef::Live(r) => Some(*r),
            _ => None,
        }
    }

    pub fn archive(&mut self) {
        if let PostRef::Live(r) = *self {
            *self = PostRef::Archived(r.message);
        }
    }
}

impl Default for PostRef {
    fn default() -> Self {
        PostRef::None
    }
}

/// A single buyer request for a boost and its full lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// Name of the operating instance the booking was created under.
    pub instance: String,
    pub author: UserId,
    pub bracket: Bracket,
    pub status: BookingStatus,
    pub boost_type: Option<BoostType>,
    pub buyer: Buyer,
    pub price_recommendation: Option<PriceRecommendation>,
    /// What the advertisement shows; not the settled price.
    pub ad_price_estimate: i64,
    /// Final price, 0 until completion or refund time.
    pub price: i64,
    pub assignment: Assignment,
    pub notes: Option<String>,
    pub payment_realms: Option<String>,
    pub payment_proof: Option<String>,
    pub post_ref: PostRef,
    pub created_at_ms: u64,
}

impl Booking {
    pub fn new(instance: &str, bracket: Bracket, author: UserId, now_ms: u64) -> Self {
        Self {
            id: common::id::short_numeric_id(),
            instance: instance.to_string(),
            author,
            bracket,
            status: BookingStatus::Compiling,
            boost_type: None,
            buyer: Buyer::default(),
            price_recommendation: None,
            ad_price_estimate: 0,
            price: 0,
            assignment: Assignment::default(),
            notes: None,
            payment_realms: None,
            payment_proof: None,
            post_ref: PostRef::None,
            created_at_ms: now_ms,
        }
    }

    /// Move to `to`, enforcing the transition graph.
    pub fn advance(&mut self, to: BookingStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn authored_by(&self, user: UserId) -> bool {
        self.author == user
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    /// One-line boost summary as shown in announcements, e.g.
    /// `2v2 Set rating 1049-1800`.
    pub fn boost_summary(&self) -> String {
        format!(
            "{} {} {}",
            self.bracket,
            self.boost_type.map(|t| t.to_string()).unwrap_or_else(|| "?".into()),
            self.buyer.rating.as_deref().unwrap_or("?"),
        )
    }

    /// Positional row for the external ledger.
    pub fn ledger_fields(&self, author_display: &str) -> Vec<String> {
        let opt_user = |u: Option<UserId>| u.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into());
        vec![
            self.status.to_string(),
            self.id.clone(),
            self.payment_realms.clone().unwrap_or_else(|| "N/A".into()),
            opt_user(self.assignment.primary),
            self.assignment.primary_cut.to_string(),
            opt_user(self.assignment.secondary),
            self.assignment.secondary_cut.to_string(),
            self.author.to_string(),
            self.assignment.advertiser_cut.to_string(),
            self.price.to_string(),
            author_display.to_string(),
            self.payment_proof
                .clone()
                .unwrap_or_else(|| "Pending booking completion".into()),
        ]
    }
}
