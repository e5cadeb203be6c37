use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use booking::store::sqlite_store::{
    SqliteBookingStore, SqliteFairnessStore, ensure_schema,
};
use common::logger::init_logger;
use engine::Instance;
use gateway::profile::ArmoryClient;
use gateway::{
    ChatClient, ChatError, IncomingMessage, LedgerClient, LedgerError, MessageRef,
    ProfileError, ProfileLookup, ProfileResult, Reply, RowHandle, Signal, UserId,
};

use bot::config::AppConfig;
use bot::coordinator::{Coordinator, DefaultInstance};
use bot::http;

#[derive(Debug, Parser)]
#[command(name = "bookings-bot", about = "Boost booking coordinator")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

/// Placeholder chat transport.
// TODO: Replace with the real platform gateway connection; it must feed
// Coordinator::handle_reaction / handle_message from the event stream and
// implement the outbound calls. Until then every call reports the gateway
// as offline.
struct OfflineChatGateway;

fn offline<T>() -> Result<T, ChatError> {
    Err(ChatError::Transport("chat gateway not connected".to_string()))
}

#[async_trait]
impl ChatClient for OfflineChatGateway {
    async fn send_dm(&self, _user: UserId, _text: &str) -> Result<MessageRef, ChatError> {
        offline()
    }

    async fn send_channel(
        &self,
        _channel: gateway::ChannelId,
        _text: &str,
    ) -> Result<MessageRef, ChatError> {
        offline()
    }

    async fn edit_message(&self, _target: MessageRef, _text: &str) -> Result<(), ChatError> {
        offline()
    }

    async fn delete_message(&self, _target: MessageRef) -> Result<(), ChatError> {
        offline()
    }

    async fn add_signal(&self, _target: MessageRef, _signal: &Signal) -> Result<(), ChatError> {
        offline()
    }

    async fn clear_signals(&self, _target: MessageRef) -> Result<(), ChatError> {
        offline()
    }

    async fn fetch_reactors(
        &self,
        _target: MessageRef,
        _signal: &Signal,
    ) -> Result<Vec<UserId>, ChatError> {
        offline()
    }

    async fn await_reply(
        &self,
        _user: UserId,
        _anchor: MessageRef,
        _offered: &[Signal],
        _timeout: Duration,
    ) -> Result<Reply, ChatError> {
        offline()
    }

    async fn await_user_message(
        &self,
        _user: UserId,
        _timeout: Duration,
    ) -> Result<IncomingMessage, ChatError> {
        offline()
    }

    async fn display_name(&self, _user: UserId) -> Result<String, ChatError> {
        offline()
    }
}

/// Placeholder ledger client.
// TODO: Wire the spreadsheet service account client here.
struct OfflineLedger;

#[async_trait]
impl LedgerClient for OfflineLedger {
    async fn append_row(&self, _fields: &[String]) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable("ledger client not configured".to_string()))
    }

    async fn find_row(&self, _booking_id: &str) -> Result<RowHandle, LedgerError> {
        Err(LedgerError::Unavailable("ledger client not configured".to_string()))
    }

    async fn update_row(&self, _handle: RowHandle, _fields: &[String]) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable("ledger client not configured".to_string()))
    }
}

/// Used when no profile API credentials are configured; instances with
/// auto lookup enabled are rejected at config load, so this never answers
/// a real question.
struct NullProfileLookup;

#[async_trait]
impl ProfileLookup for NullProfileLookup {
    async fn lookup(&self, _realm: &str, _name: &str) -> Result<ProfileResult, ProfileError> {
        Ok(ProfileResult::NotFound)
    }
}

fn spawn_sweep_loop(instance: Arc<DefaultInstance>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(
            instance.settings.timing.sweep_interval_secs,
        ));
        loop {
            ticker.tick().await;
            match engine::sweep::sweep_once(&instance).await {
                Ok(0) => {}
                Ok(expired) => info!(instance = %instance.settings.name, expired, "expiry sweep done"),
                Err(e) => error!(error = ?e, instance = %instance.settings.name, "expiry sweep failed"),
            }
        }
    });
}

fn spawn_board_loop(instance: Arc<DefaultInstance>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(
            instance.settings.timing.board_refresh_secs,
        ));
        loop {
            ticker.tick().await;
            if let Err(e) = instance.board.render().await {
                warn!(error = %e, instance = %instance.settings.name, "untaken board refresh failed");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("bookings-bot");

    let args = Args::parse();
    let cfg = AppConfig::load(&args.config)?;

    let pool = SqlitePool::connect(&cfg.database_url).await?;
    ensure_schema(&pool).await?;

    let chat: Arc<dyn ChatClient> = Arc::new(OfflineChatGateway);
    let ledger: Arc<dyn LedgerClient> = Arc::new(OfflineLedger);
    let profiles: Arc<dyn ProfileLookup> = match &cfg.profile_api {
        Some(p) => Arc::new(ArmoryClient::new(
            p.api_base.clone(),
            p.token_url.clone(),
            p.client_id.clone(),
            p.client_secret.clone(),
        )?),
        None => Arc::new(NullProfileLookup),
    };

    let fairness_store = Arc::new(SqliteFairnessStore::from_pool(pool.clone()));

    let mut instances: Vec<Arc<DefaultInstance>> = Vec::new();
    for settings in cfg.instances.clone() {
        let store = Arc::new(SqliteBookingStore::scoped_to(pool.clone(), &settings.name));
        let instance = Instance::new(
            settings,
            store,
            fairness_store.clone(),
            chat.clone(),
            profiles.clone(),
            ledger.clone(),
        )
        .await?;
        instances.push(Arc::new(instance));
    }

    for instance in &instances {
        spawn_sweep_loop(instance.clone());
        spawn_board_loop(instance.clone());
    }

    let coordinator = Arc::new(Coordinator::new(instances, chat));

    let listener = tokio::net::TcpListener::bind(&cfg.http_listen_addr).await?;
    info!(addr = %cfg.http_listen_addr, "monitoring endpoint listening");
    let app = http::router(coordinator.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "monitoring endpoint failed");
        }
    });

    info!("bot is ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
        }
        _ = coordinator.shutdown_requested() => {
            info!("shutdown command accepted");
        }
    }

    info!("all bookings are persisted, shutting down");
    Ok(())
}
