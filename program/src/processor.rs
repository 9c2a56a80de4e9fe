// Lucky Draw Engine - Instruction Processor
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::{sync::Mutex, task};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    engine::{self, ConfigurationUpdate, DrawOutcome, DrawRequest},
    error::DrawError,
    instruction::DrawInstruction,
    state::{DrawState, Winner},
    store::{StateStore, UserKey},
    utils,
    validation::validate_state,
};

/// Reply to a processed instruction, serialized as the transport body
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Response {
    State(DrawState),
    Drawn { winners: Vec<Winner>, state: DrawState },
    Saved { ok: bool },
}

/// Runs every operation as one load-transform-save cycle, serialized per user.
pub struct Processor {
    store: Arc<dyn StateStore>,
    // One lock per user key, kept for the life of the process. Grows with the number of users.
    locks: DashMap<UserKey, Arc<Mutex<()>>>,
    config: Config,
}

impl Processor {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_store(store, Config::default())
    }

    pub fn with_store(store: Arc<dyn StateStore>, config: Config) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            config,
        }
    }

    /// Processor backed by the store `config` selects
    pub fn from_config(config: Config) -> Result<Self, DrawError> {
        let store = config.open_store()?;
        Ok(Self::with_store(store, config))
    }

    /// Decode and dispatch one instruction on behalf of `caller`
    pub async fn process(
        &self,
        caller: Option<&UserKey>,
        instruction_data: &[u8],
    ) -> Result<Response, DrawError> {
        let user = caller.ok_or(DrawError::Unauthenticated)?;
        let instruction = DrawInstruction::unpack(instruction_data)?;
        info!("Instruction: {}", instruction.name());

        let result = match instruction {
            DrawInstruction::GetState {} => self.current_state(user).await.map(Response::State),
            DrawInstruction::SaveState { state } => self
                .save_state(user, state)
                .await
                .map(|_| Response::Saved { ok: true }),
            DrawInstruction::Draw {
                prize_id,
                mode,
                requested_count,
                prize_snapshot,
            } => {
                let request = DrawRequest {
                    prize_id,
                    mode,
                    requested_count,
                    prize_snapshot,
                };
                self.draw(user, &request)
                    .await
                    .map(|outcome| Response::Drawn {
                        winners: outcome.winners,
                        state: outcome.state,
                    })
            }
            DrawInstruction::ToggleMode {} => self.toggle_mode(user).await.map(Response::State),
            DrawInstruction::UpdateConfiguration { update } => self
                .update_configuration(user, &update)
                .await
                .map(Response::State),
            DrawInstruction::ResetProgress {} => {
                self.reset_progress(user).await.map(Response::State)
            }
            DrawInstruction::ResetToDefault {} => {
                self.reset_to_default(user).await.map(Response::State)
            }
            DrawInstruction::GetDefaultConfiguration {} => {
                Ok(Response::State(self.default_configuration()))
            }
        };

        if let Err(e) = &result {
            if self.config.log_rejections {
                warn!("Request from {} rejected: {}", user, e);
            }
        }
        result
    }

    /// Caller's document, created with defaults on first access
    pub async fn current_state(&self, user: &UserKey) -> Result<DrawState, DrawError> {
        let lock = self.lock_for(user);
        let _guard = lock.lock().await;
        self.load_or_create(user).await
    }

    /// Full overwrite after checking the document's invariants
    pub async fn save_state(&self, user: &UserKey, mut state: DrawState) -> Result<(), DrawError> {
        state.repoint_current_prize();
        validate_state(&state)?;

        let lock = self.lock_for(user);
        let _guard = lock.lock().await;
        self.commit(user, state).await
    }

    /// Server-side draw on the stored document
    pub async fn draw(&self, user: &UserKey, request: &DrawRequest) -> Result<DrawOutcome, DrawError> {
        let outcome = self
            .transact(user, |state| {
                let mut rng = rand::thread_rng();
                let outcome = engine::draw(state, request, &utils::draw_timestamp(), &mut rng)?;
                Ok((outcome.state.clone(), outcome))
            })
            .await?;
        debug!(
            "Drew {} winner(s) of {} for {}",
            outcome.winners.len(),
            request.prize_id,
            user
        );
        Ok(outcome)
    }

    pub async fn toggle_mode(&self, user: &UserKey) -> Result<DrawState, DrawError> {
        self.transact(user, |state| {
            let next = engine::toggle_mode(state);
            Ok((next.clone(), next))
        })
        .await
    }

    pub async fn update_configuration(
        &self,
        user: &UserKey,
        update: &ConfigurationUpdate,
    ) -> Result<DrawState, DrawError> {
        self.transact(user, |state| {
            if engine::is_structural_change(state, update)? {
                debug!("Structural configuration change for {}, resetting progress", user);
            }
            let next = engine::update_configuration(state, update)?;
            Ok((next.clone(), next))
        })
        .await
    }

    pub async fn reset_progress(&self, user: &UserKey) -> Result<DrawState, DrawError> {
        self.transact(user, |state| {
            let next = engine::reset_progress(state);
            Ok((next.clone(), next))
        })
        .await
    }

    pub async fn reset_to_default(&self, user: &UserKey) -> Result<DrawState, DrawError> {
        let lock = self.lock_for(user);
        let _guard = lock.lock().await;
        let state = engine::reset_to_default_configuration();
        self.commit(user, state.clone()).await?;
        Ok(state)
    }

    /// Built-in default document, nothing is stored
    pub fn default_configuration(&self) -> DrawState {
        engine::reset_to_default_configuration()
    }

    fn lock_for(&self, user: &UserKey) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(user.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Load, transform and save under the user's lock. Nothing is committed
    /// unless both the transition and the save succeed.
    async fn transact<T, F>(&self, user: &UserKey, op: F) -> Result<T, DrawError>
    where
        F: FnOnce(&DrawState) -> Result<(DrawState, T), DrawError>,
    {
        let lock = self.lock_for(user);
        let _guard = lock.lock().await;

        let current = self.load_or_create(user).await?;
        let (next, output) = op(&current)?;
        self.commit(user, next).await?;
        Ok(output)
    }

    async fn load_or_create(&self, user: &UserKey) -> Result<DrawState, DrawError> {
        let key = user.clone();
        self.run_blocking(move |store| store.get_or_create(&key)).await
    }

    async fn commit(&self, user: &UserKey, state: DrawState) -> Result<(), DrawError> {
        let key = user.clone();
        self.run_blocking(move |store| store.save(&key, &state))
            .await
            .map_err(|e| {
                warn!("Failed to save draw state for {}: {}", user, e);
                e
            })
    }

    /// Run a store call on the blocking pool. The file store does plain
    /// filesystem I/O and must not stall a runtime worker.
    async fn run_blocking<T, F>(&self, call: F) -> Result<T, DrawError>
    where
        F: FnOnce(&dyn StateStore) -> Result<T, DrawError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || call(store.as_ref()))
            .await
            .map_err(|e| DrawError::Storage(format!("store task failed: {}", e)))?
    }
}
