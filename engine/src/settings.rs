//! Per-instance configuration. Every knob is data loaded from the config
//! file; unknown keys are rejected at load time.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use booking::model::{BoostType, Bracket, CutRates};
use booking::pricing::PricingTable;
use gateway::{ChannelId, MessageId, Signal, UserId};

/// The channels one operating instance posts into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSet {
    /// Channel holding the standing "react to request a boost" message.
    pub request: ChannelId,
    pub post_2v2: ChannelId,
    pub post_3v3: ChannelId,
    /// Gladiator boosts advertise separately from regular 3v3.
    pub post_glad: ChannelId,
    pub untaken_2v2: ChannelId,
    pub untaken_3v3: ChannelId,
}

impl ChannelSet {
    pub fn post_for(&self, bracket: Bracket, boost_type: Option<BoostType>) -> ChannelId {
        match bracket {
            Bracket::TwoVsTwo => self.post_2v2,
            Bracket::ThreeVsThree => {
                if boost_type == Some(BoostType::Gladiator) {
                    self.post_glad
                } else {
                    self.post_3v3
                }
            }
        }
    }

    pub fn untaken_for(&self, bracket: Bracket) -> ChannelId {
        match bracket {
            Bracket::TwoVsTwo => self.untaken_2v2,
            Bracket::ThreeVsThree => self.untaken_3v3,
        }
    }
}

/// The reaction emblems an instance listens for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SignalSet {
    pub take: Signal,
    pub schedule: Signal,
    pub cancel: Signal,
    pub skip: Signal,
    pub twos: Signal,
    pub threes: Signal,
    pub horde: Signal,
    pub alliance: Signal,
    pub manual_entry: Signal,
    pub retry: Signal,
}

impl Default for SignalSet {
    fn default() -> Self {
        Self {
            take: Signal::new("🙋"),
            schedule: Signal::new("📅"),
            cancel: Signal::new("❌"),
            skip: Signal::new("⏩"),
            twos: Signal::new("2️⃣"),
            threes: Signal::new("3️⃣"),
            horde: Signal::new("🔴"),
            alliance: Signal::new("🔵"),
            manual_entry: Signal::new("⚔️"),
            retry: Signal::new("🔁"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Timing {
    /// Default window a DM prompt waits for an answer.
    pub prompt_timeout_secs: u64,
    /// Signup window between posting an advertisement and drawing a winner.
    pub post_wait_secs: u64,
    /// How long a 3v3 winner has to mention their teammate.
    pub teammate_pick_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    /// Bookings older than this are force-expired by the sweep.
    pub retention_hours: u64,
    /// Cadence of the untaken board refresh task.
    pub board_refresh_secs: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            prompt_timeout_secs: 300,
            post_wait_secs: 600,
            teammate_pick_timeout_secs: 600,
            sweep_interval_secs: 3_600,
            retention_hours: 48,
            board_refresh_secs: 300,
        }
    }
}

/// Bad-luck-protection tuning. Both the threshold and the modifier are
/// operational guesses, so they stay configuration rather than constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FairnessTuning {
    /// Cuts above this move weights around.
    pub big_win_threshold: i64,
    /// Weight delta per gold of cut.
    pub modifier: f64,
    /// Decimal places weights are rounded to after an adjustment.
    pub weight_decimals: u32,
}

impl Default for FairnessTuning {
    fn default() -> Self {
        Self {
            big_win_threshold: 100_000,
            modifier: 0.000_000_1,
            weight_decimals: 5,
        }
    }
}

fn default_intake_max_retries() -> u32 {
    25
}

fn default_max_teammate_rerolls() -> u32 {
    10
}

fn default_command_prefix() -> String {
    "!".to_string()
}

/// One named operating instance: its channels, signals, money split,
/// pricing tables and tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSettings {
    pub name: String,
    pub channels: ChannelSet,
    /// The standing request message users react to.
    pub request_message: MessageId,
    #[serde(default)]
    pub signals: SignalSet,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub cuts: CutRates,
    #[serde(default)]
    pub fairness: FairnessTuning,
    #[serde(default)]
    pub pricing: PricingTable,
    /// Users allowed to manage any booking, not just their own.
    #[serde(default)]
    pub managers: Vec<UserId>,
    /// Try the profile API for faction/class before asking manually.
    #[serde(default)]
    pub auto_profile_lookup: bool,
    /// How many invalid answers an intake step tolerates before giving up.
    #[serde(default = "default_intake_max_retries")]
    pub intake_max_retries: u32,
    /// How many teammate-pick timeouts trigger a repost before the booking
    /// is parked on the untaken board.
    #[serde(default = "default_max_teammate_rerolls")]
    pub max_teammate_rerolls: u32,
    /// Realm -> bank character routing echoed when payment realms are
    /// registered.
    #[serde(default)]
    pub bank_characters: HashMap<String, String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl InstanceSettings {
    /// Fail fast on structurally bad configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("instance name must not be empty");
        }
        self.pricing.validate()?;

        let CutRates {
            booster,
            advertiser,
            management,
        } = self.cuts;
        let sum = booster + advertiser + management;
        if booster < 0.0 || advertiser < 0.0 || management < 0.0 || sum > 1.0 {
            anyhow::bail!(
                "cut rates must be non-negative and sum to at most 1.0 (got {sum})"
            );
        }

        Ok(())
    }

    pub fn is_manager(&self, user: UserId) -> bool {
        self.managers.contains(&user)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.prompt_timeout_secs)
    }

    pub fn post_wait(&self) -> Duration {
        Duration::from_secs(self.timing.post_wait_secs)
    }

    pub fn teammate_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.teammate_pick_timeout_secs)
    }

    pub fn retention_ms(&self) -> u64 {
        self.timing.retention_hours * 3_600 * 1_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InstanceSettings {
        serde_json::from_value(serde_json::json!({
            "name": "eu",
            "channels": {
                "request": 1,
                "post_2v2": 2,
                "post_3v3": 3,
                "post_glad": 4,
                "untaken_2v2": 5,
                "untaken_3v3": 6
            },
            "request_message": 100
        }))
        .unwrap()
    }

    #[test]
    fn defaults_fill_in_and_validate() {
        let s = sample();
        s.validate().unwrap();
        assert_eq!(s.timing.prompt_timeout_secs, 300);
        assert_eq!(s.intake_max_retries, 25);
        assert_eq!(s.command_prefix, "!");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<InstanceSettings, _> = serde_json::from_value(serde_json::json!({
            "name": "eu",
            "channels": {
                "request": 1, "post_2v2": 2, "post_3v3": 3,
                "post_glad": 4, "untaken_2v2": 5, "untaken_3v3": 6
            },
            "request_message": 100,
            "post_wait_time": 600
        }));
        assert!(res.is_err());
    }

    #[test]
    fn bad_cut_rates_fail_validation() {
        let mut s = sample();
        s.cuts.booster = 0.9;
        s.cuts.advertiser = 0.3;
        assert!(s.validate().is_err());
    }

    #[test]
    fn gladiator_posts_route_to_the_glad_channel() {
        let s = sample();
        assert_eq!(
            s.channels
                .post_for(Bracket::ThreeVsThree, Some(BoostType::Gladiator)),
            4
        );
        assert_eq!(
            s.channels
                .post_for(Bracket::ThreeVsThree, Some(BoostType::Hourly)),
            3
        );
        assert_eq!(s.channels.post_for(Bracket::TwoVsTwo, None), 2);
    }
}
