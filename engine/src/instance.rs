//! One operating instance: its configuration plus every component wired to
//! the same registry, chat client and fairness table.

use std::sync::Arc;

use tracing::{info, instrument};

use booking::model::{Booking, Bracket};
use booking::registry::BookingRegistry;
use booking::store::{BookingStore, FairnessStore};
use gateway::{ChatClient, LedgerClient, ProfileLookup, UserId};

use crate::assign::AssignmentEngine;
use crate::board::UntakenBoard;
use crate::error::EngineError;
use crate::fairness::FairnessHandle;
use crate::intake::IntakeFlow;
use crate::lifecycle::LifecycleController;
use crate::settings::InstanceSettings;

pub struct Instance<S: BookingStore> {
    pub settings: Arc<InstanceSettings>,
    pub registry: Arc<BookingRegistry<S>>,
    pub fairness: Arc<FairnessHandle>,
    pub board: Arc<UntakenBoard<S>>,
    pub intake: IntakeFlow<S>,
    pub assign: AssignmentEngine<S>,
    pub lifecycle: LifecycleController<S>,
    pub chat: Arc<dyn ChatClient>,
}

impl<S: BookingStore> Instance<S> {
    pub async fn new(
        settings: InstanceSettings,
        store: Arc<S>,
        fairness_store: Arc<dyn FairnessStore>,
        chat: Arc<dyn ChatClient>,
        profiles: Arc<dyn ProfileLookup>,
        ledger: Arc<dyn LedgerClient>,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        let settings = Arc::new(settings);

        let registry = Arc::new(BookingRegistry::new(store).await?);
        let fairness = Arc::new(FairnessHandle::new(
            fairness_store,
            settings.name.clone(),
        ));
        let board = Arc::new(UntakenBoard::new(
            registry.clone(),
            chat.clone(),
            settings.clone(),
        ));

        let intake = IntakeFlow::new(
            registry.clone(),
            chat.clone(),
            profiles,
            settings.clone(),
        );
        let assign = AssignmentEngine::new(
            registry.clone(),
            chat.clone(),
            fairness.clone(),
            board.clone(),
            settings.clone(),
        );
        let lifecycle = LifecycleController::new(
            registry.clone(),
            chat.clone(),
            ledger,
            board.clone(),
            settings.clone(),
        );

        info!(instance = %settings.name, "instance assembled");

        Ok(Self {
            settings,
            registry,
            fairness,
            board,
            intake,
            assign,
            lifecycle,
            chat,
        })
    }

    /// The whole creation flow for one qualifying request reaction:
    /// intake, posting, winner pick, ledger upload.
    ///
    /// The expected early endings - user cancel, prompt timeout, zero
    /// volunteers - have already been communicated and settled by the time
    /// they reach here, so they end the flow quietly.
    #[instrument(skip(self), fields(instance = %self.settings.name, bracket = %bracket, author))]
    pub async fn handle_booking_request(
        &self,
        bracket: Bracket,
        author: UserId,
    ) -> Result<(), EngineError> {
        let booking = Booking::new(&self.settings.name, bracket, author, common::time::now_ms());
        let id = self.registry.create(booking).await?;
        info!(booking_id = %id, "booking created");

        let flow = async {
            self.intake.run(&id).await?;
            self.assign.publish(&id).await?;
            self.assign.pick_winner(&id).await?;
            self.lifecycle.upload(&id).await?;
            Ok(())
        };

        match flow.await {
            Err(EngineError::Cancelled | EngineError::TimedOut | EngineError::NoVolunteers) => {
                Ok(())
            }
            other => other,
        }
    }
}
