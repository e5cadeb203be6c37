#![allow(dead_code)]
//! Scripted in-memory stand-ins for the gateway traits and stores, shared
//! by the engine integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use booking::model::{Booking, BookingId, Bracket, CutRates};
use booking::pricing::PricingTable;
use booking::registry::BookingRegistry;
use booking::store::{BookingStore, FairnessStore};
use engine::assign::AssignmentEngine;
use engine::board::UntakenBoard;
use engine::fairness::FairnessHandle;
use engine::intake::IntakeFlow;
use engine::lifecycle::LifecycleController;
use engine::settings::{ChannelSet, FairnessTuning, InstanceSettings, SignalSet, Timing};
use gateway::profile::CharacterProfile;
use gateway::{
    ChannelId, ChatClient, ChatError, IncomingMessage, LedgerClient, LedgerError, MessageRef,
    ProfileError, ProfileLookup, ProfileResult, Reply, RowHandle, Signal, UserId,
};

// ---------------------------------------------------------------------------
// Chat

#[derive(Default)]
pub struct MockChat {
    next_id: AtomicU64,
    pub replies: Mutex<VecDeque<Reply>>,
    pub user_messages: Mutex<VecDeque<IncomingMessage>>,
    pub reactors: Mutex<HashMap<String, Vec<UserId>>>,
    pub dms: Mutex<Vec<(UserId, String)>>,
    pub channel_messages: Mutex<Vec<(ChannelId, String)>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub deletes: Mutex<Vec<MessageRef>>,
    pub cleared: Mutex<Vec<MessageRef>>,
}

impl MockChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn push_text(&self, content: &str) {
        self.replies.lock().await.push_back(Reply::Message(IncomingMessage {
            content: content.to_string(),
            ..Default::default()
        }));
    }

    pub async fn push_signal(&self, signal: &Signal) {
        self.replies.lock().await.push_back(Reply::Signal(signal.clone()));
    }

    pub async fn push_user_message(&self, msg: IncomingMessage) {
        self.user_messages.lock().await.push_back(msg);
    }

    pub async fn set_reactors(&self, signal: &Signal, users: Vec<UserId>) {
        self.reactors
            .lock()
            .await
            .insert(signal.as_str().to_string(), users);
    }

    pub async fn channel_sends(&self, channel: ChannelId) -> Vec<String> {
        self.channel_messages
            .lock()
            .await
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub async fn dm_texts(&self, user: UserId) -> Vec<String> {
        self.dms
            .lock()
            .await
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub async fn call_count(&self) -> usize {
        self.channel_messages.lock().await.len()
            + self.edits.lock().await.len()
            + self.deletes.lock().await.len()
    }

    fn next_message(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn send_dm(&self, user: UserId, text: &str) -> Result<MessageRef, ChatError> {
        self.dms.lock().await.push((user, text.to_string()));
        Ok(MessageRef {
            channel: 9_000_000 + user,
            message: self.next_message(),
        })
    }

    async fn send_channel(&self, channel: ChannelId, text: &str) -> Result<MessageRef, ChatError> {
        self.channel_messages.lock().await.push((channel, text.to_string()));
        Ok(MessageRef {
            channel,
            message: self.next_message(),
        })
    }

    async fn edit_message(&self, target: MessageRef, text: &str) -> Result<(), ChatError> {
        self.edits.lock().await.push((target, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, target: MessageRef) -> Result<(), ChatError> {
        self.deletes.lock().await.push(target);
        Ok(())
    }

    async fn add_signal(&self, _target: MessageRef, _signal: &Signal) -> Result<(), ChatError> {
        Ok(())
    }

    async fn clear_signals(&self, target: MessageRef) -> Result<(), ChatError> {
        self.cleared.lock().await.push(target);
        Ok(())
    }

    async fn fetch_reactors(
        &self,
        _target: MessageRef,
        signal: &Signal,
    ) -> Result<Vec<UserId>, ChatError> {
        Ok(self
            .reactors
            .lock()
            .await
            .get(signal.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn await_reply(
        &self,
        user: UserId,
        _anchor: MessageRef,
        _offered: &[Signal],
        _timeout: Duration,
    ) -> Result<Reply, ChatError> {
        match self.replies.lock().await.pop_front() {
            Some(Reply::Message(mut m)) => {
                m.author = user;
                Ok(Reply::Message(m))
            }
            Some(reply) => Ok(reply),
            None => Err(ChatError::Timeout),
        }
    }

    async fn await_user_message(
        &self,
        user: UserId,
        _timeout: Duration,
    ) -> Result<IncomingMessage, ChatError> {
        match self.user_messages.lock().await.pop_front() {
            Some(mut m) => {
                m.author = user;
                Ok(m)
            }
            None => Err(ChatError::Timeout),
        }
    }

    async fn display_name(&self, user: UserId) -> Result<String, ChatError> {
        Ok(format!("user{user}"))
    }
}

// ---------------------------------------------------------------------------
// Profile lookup

pub enum ProfileScript {
    Found(&'static str, &'static str),
    NotFound,
    Error,
}

pub struct MockProfile {
    pub script: Mutex<ProfileScript>,
}

impl MockProfile {
    pub fn found(faction: &'static str, class_name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(ProfileScript::Found(faction, class_name)),
        })
    }

    pub fn not_found() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(ProfileScript::NotFound),
        })
    }

    pub fn erroring() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(ProfileScript::Error),
        })
    }
}

#[async_trait]
impl ProfileLookup for MockProfile {
    async fn lookup(&self, _realm: &str, _name: &str) -> Result<ProfileResult, ProfileError> {
        match &*self.script.lock().await {
            ProfileScript::Found(faction, class_name) => {
                Ok(ProfileResult::Found(CharacterProfile {
                    faction: faction.to_string(),
                    class_name: class_name.to_string(),
                }))
            }
            ProfileScript::NotFound => Ok(ProfileResult::NotFound),
            ProfileScript::Error => Err(ProfileError::Status(500)),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger

#[derive(Default)]
pub struct MockLedger {
    pub appended: Mutex<Vec<Vec<String>>>,
    pub updated: Mutex<Vec<(u64, Vec<String>)>>,
    pub fail: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn append_row(&self, fields: &[String]) -> Result<(), LedgerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("mock outage".to_string()));
        }
        self.appended.lock().await.push(fields.to_vec());
        Ok(())
    }

    async fn find_row(&self, booking_id: &str) -> Result<RowHandle, LedgerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("mock outage".to_string()));
        }
        let rows = self.appended.lock().await;
        rows.iter()
            .position(|row| row.get(1).map(String::as_str) == Some(booking_id))
            .map(|i| RowHandle(i as u64))
            .ok_or_else(|| LedgerError::RowNotFound(booking_id.to_string()))
    }

    async fn update_row(&self, handle: RowHandle, fields: &[String]) -> Result<(), LedgerError> {
        self.updated.lock().await.push((handle.0, fields.to_vec()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stores

#[derive(Default)]
pub struct InMemoryBookingStore {
    pub map: Mutex<HashMap<BookingId, Booking>>,
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn load_all(&self) -> anyhow::Result<Vec<Booking>> {
        Ok(self.map.lock().await.values().cloned().collect())
    }

    async fn save(&self, booking: &Booking) -> anyhow::Result<()> {
        self.map
            .lock()
            .await
            .insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    async fn delete(&self, booking_id: &str) -> anyhow::Result<()> {
        self.map.lock().await.remove(booking_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFairnessStore {
    pub map: Mutex<HashMap<(String, String), HashMap<UserId, f64>>>,
}

#[async_trait]
impl FairnessStore for InMemoryFairnessStore {
    async fn load(
        &self,
        instance: &str,
        bracket: Bracket,
    ) -> anyhow::Result<HashMap<UserId, f64>> {
        Ok(self
            .map
            .lock()
            .await
            .get(&(instance.to_string(), bracket.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn save(
        &self,
        instance: &str,
        bracket: Bracket,
        weights: &HashMap<UserId, f64>,
    ) -> anyhow::Result<()> {
        self.map
            .lock()
            .await
            .insert((instance.to_string(), bracket.to_string()), weights.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness

pub const CH_POST_2V2: ChannelId = 2;
pub const CH_POST_3V3: ChannelId = 3;
pub const CH_POST_GLAD: ChannelId = 4;
pub const CH_UNTAKEN_2V2: ChannelId = 5;
pub const CH_UNTAKEN_3V3: ChannelId = 6;

pub fn test_settings() -> InstanceSettings {
    InstanceSettings {
        name: "eu".to_string(),
        channels: ChannelSet {
            request: 1,
            post_2v2: CH_POST_2V2,
            post_3v3: CH_POST_3V3,
            post_glad: CH_POST_GLAD,
            untaken_2v2: CH_UNTAKEN_2V2,
            untaken_3v3: CH_UNTAKEN_3V3,
        },
        request_message: 100,
        signals: SignalSet::default(),
        timing: Timing::default(),
        cuts: CutRates::default(),
        fairness: FairnessTuning::default(),
        pricing: PricingTable::default(),
        managers: vec![900],
        auto_profile_lookup: true,
        intake_max_retries: 25,
        max_teammate_rerolls: 1,
        bank_characters: HashMap::from([("Draenor".to_string(), "Bank-Draenor".to_string())]),
        command_prefix: "!".to_string(),
    }
}

pub struct Harness {
    pub settings: Arc<InstanceSettings>,
    pub chat: Arc<MockChat>,
    pub profile: Arc<MockProfile>,
    pub ledger: Arc<MockLedger>,
    pub store: Arc<InMemoryBookingStore>,
    pub fairness_store: Arc<InMemoryFairnessStore>,
    pub registry: Arc<BookingRegistry<InMemoryBookingStore>>,
    pub fairness: Arc<FairnessHandle>,
    pub board: Arc<UntakenBoard<InMemoryBookingStore>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: InstanceSettings) -> Self {
        let settings = Arc::new(settings);
        let chat = MockChat::new();
        let profile = MockProfile::found("Horde", "Druid");
        let ledger = MockLedger::new();
        let store = Arc::new(InMemoryBookingStore::default());
        let fairness_store = Arc::new(InMemoryFairnessStore::default());

        let registry = Arc::new(
            BookingRegistry::new(store.clone())
                .await
                .expect("registry init"),
        );
        let fairness = Arc::new(FairnessHandle::new(
            fairness_store.clone(),
            settings.name.clone(),
        ));
        let board = Arc::new(UntakenBoard::new(
            registry.clone(),
            chat.clone(),
            settings.clone(),
        ));

        Self {
            settings,
            chat,
            profile,
            ledger,
            store,
            fairness_store,
            registry,
            fairness,
            board,
        }
    }

    pub fn intake(&self) -> IntakeFlow<InMemoryBookingStore> {
        IntakeFlow::new(
            self.registry.clone(),
            self.chat.clone(),
            self.profile.clone(),
            self.settings.clone(),
        )
    }

    pub fn assign(&self, seed: u64) -> AssignmentEngine<InMemoryBookingStore> {
        AssignmentEngine::with_seed(
            self.registry.clone(),
            self.chat.clone(),
            self.fairness.clone(),
            self.board.clone(),
            self.settings.clone(),
            seed,
        )
    }

    pub fn lifecycle(&self) -> LifecycleController<InMemoryBookingStore> {
        LifecycleController::new(
            self.registry.clone(),
            self.chat.clone(),
            self.ledger.clone(),
            self.board.clone(),
            self.settings.clone(),
        )
    }

    pub async fn create_booking(&self, bracket: Bracket, author: UserId) -> BookingId {
        self.registry
            .create(Booking::new(&self.settings.name, bracket, author, 1_000))
            .await
            .expect("create booking")
    }
}
