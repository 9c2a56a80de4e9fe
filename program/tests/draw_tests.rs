use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use lucky_draw::{
    config::Config,
    engine::{ConfigurationUpdate, DrawRequest},
    error::DrawError,
    instruction::{self, DrawInstruction},
    process_instruction,
    state::{default_prizes, DrawMode, DrawState, Participant, Prize, Winner},
    store::{FileStore, MemoryStore, StateStore, UserKey},
    Processor, Response,
};

// Memory store whose saves can be switched off
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl StateStore for FlakyStore {
    fn load(&self, key: &UserKey) -> Result<Option<DrawState>, DrawError> {
        self.inner.load(key)
    }

    fn save(&self, key: &UserKey, state: &DrawState) -> Result<(), DrawError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DrawError::Storage("disk unavailable".to_string()));
        }
        self.inner.save(key, state)
    }

    fn keys(&self) -> Result<Vec<UserKey>, DrawError> {
        self.inner.keys()
    }
}

// Setup a processor over a fresh in-memory store
fn setup() -> (Processor, Arc<MemoryStore>, UserKey) {
    let store = Arc::new(MemoryStore::new());
    let processor = Processor::new(Arc::clone(&store) as Arc<dyn StateStore>);
    let user = UserKey::new("operator-1").unwrap();
    (processor, store, user)
}

fn small_event() -> DrawState {
    let mut state = DrawState::default();
    state.all_participants.truncate(5);
    state.participants = state.all_participants.clone();
    state.prizes = vec![Prize::new("gold", "Gold", 1, 2)];
    state.extra_prizes = vec![Prize::new("secret", "Secret", 1, 1)];
    state.extra_mode_enabled = true;
    state.current_prize_id = Some("gold".to_string());
    state
}

fn temp_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("lucky-draw-{}", uuid::Uuid::new_v4().simple()))
}

#[tokio::test]
async fn test_unauthenticated_caller() {
    let (processor, store, _) = setup();

    let result = process_instruction(&processor, None, &instruction::get_state().unwrap()).await;

    assert_eq!(result, Err(DrawError::Unauthenticated));
    assert_eq!(DrawError::Unauthenticated.status(), 401);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_malformed_instruction() {
    let (processor, store, user) = setup();

    let empty = process_instruction(&processor, Some(&user), &[]).await;
    assert!(matches!(empty, Err(DrawError::Validation(_))));

    let garbage = process_instruction(&processor, Some(&user), &[200, 1, 2]).await;
    assert!(matches!(garbage, Err(DrawError::Validation(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_get_state_installs_default() {
    let (processor, store, user) = setup();

    let response = process_instruction(&processor, Some(&user), &instruction::get_state().unwrap())
        .await
        .unwrap();

    assert_eq!(response, Response::State(DrawState::default()));
    assert_eq!(store.load(&user).unwrap(), Some(DrawState::default()));
}

#[tokio::test]
async fn test_default_configuration_has_no_side_effect() {
    let (processor, store, user) = setup();

    let response = process_instruction(
        &processor,
        Some(&user),
        &instruction::get_default_configuration().unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response, Response::State(DrawState::default()));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_draw_persists_result() {
    let (processor, store, user) = setup();
    processor.save_state(&user, small_event()).await.unwrap();

    let response = process_instruction(
        &processor,
        Some(&user),
        &instruction::draw("gold", DrawMode::Regular).unwrap(),
    )
    .await
    .unwrap();

    let (winners, state) = match response {
        Response::Drawn { winners, state } => (winners, state),
        other => panic!("unexpected response {:?}", other),
    };
    assert_eq!(winners.len(), 2);
    assert_eq!(state.prizes[0].remaining, 0);
    assert_eq!(state.participants.len(), 3);
    assert_eq!(store.load(&user).unwrap(), Some(state));

    let again = process_instruction(
        &processor,
        Some(&user),
        &instruction::draw("gold", DrawMode::Regular).unwrap(),
    )
    .await;
    assert_eq!(again, Err(DrawError::Exhausted("gold".to_string())));
}

#[tokio::test]
async fn test_extra_draw_through_processor() {
    let (processor, _, user) = setup();
    processor.save_state(&user, small_event()).await.unwrap();
    processor
        .draw(&user, &DrawRequest::new("gold", DrawMode::Regular))
        .await
        .unwrap();

    let toggled = processor.toggle_mode(&user).await.unwrap();
    assert!(toggled.is_extra_mode);
    assert_eq!(toggled.candidate_pool(DrawMode::Extra).len(), 5);

    let outcome = processor
        .draw(&user, &DrawRequest::new("secret", DrawMode::Extra))
        .await
        .unwrap();
    assert_eq!(outcome.winners.len(), 1);
    assert!(outcome.winners[0].is_extra);
    assert_eq!(outcome.state.participants.len(), 3);
}

#[tokio::test]
async fn test_failed_save_commits_nothing() {
    let store = Arc::new(FlakyStore::default());
    let processor = Processor::new(Arc::clone(&store) as Arc<dyn StateStore>);
    let user = UserKey::new("operator-2").unwrap();
    processor.save_state(&user, small_event()).await.unwrap();

    store.failing.store(true, Ordering::SeqCst);
    let failed = processor
        .draw(&user, &DrawRequest::new("gold", DrawMode::Regular))
        .await;
    assert!(matches!(failed, Err(DrawError::Storage(_))));
    assert_eq!(store.load(&user).unwrap(), Some(small_event()));

    // Operator retries the whole draw once storage is back
    store.failing.store(false, Ordering::SeqCst);
    let outcome = processor
        .draw(&user, &DrawRequest::new("gold", DrawMode::Regular))
        .await
        .unwrap();
    assert_eq!(outcome.winners.len(), 2);
    assert_eq!(outcome.state.winners.len(), 2);
}

#[tokio::test]
async fn test_concurrent_draws_never_overdraw() {
    let (processor, store, user) = setup();
    let processor = Arc::new(processor);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let processor = Arc::clone(&processor);
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            let mut request = DrawRequest::new("p4", DrawMode::Regular);
            request.requested_count = Some(1);
            processor.draw(&user, &request).await
        }));
    }

    let mut awarded = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => awarded += outcome.winners.len(),
            Err(DrawError::Exhausted(_)) => exhausted += 1,
            Err(e) => panic!("unexpected error {:?}", e),
        }
    }

    assert_eq!(awarded, 10);
    assert_eq!(exhausted, 15);
    let state = store.load(&user).unwrap().unwrap();
    let p4 = state.prizes.iter().find(|p| p.id == "p4").unwrap();
    assert_eq!(p4.remaining, 0);
    assert_eq!(state.winners.len(), 10);
    assert_eq!(state.participants.len(), 50);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let (processor, store, alice) = setup();
    let bob = UserKey::new("operator-bob").unwrap();

    processor
        .draw(&alice, &DrawRequest::new("p1", DrawMode::Regular))
        .await
        .unwrap();

    assert_eq!(processor.current_state(&bob).await.unwrap(), DrawState::default());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_save_state_rejects_broken_document() {
    let (processor, store, user) = setup();
    let mut broken = DrawState::default();
    broken.prizes[0].remaining = broken.prizes[0].count + 1;

    let result = process_instruction(&processor, Some(&user), &instruction::save_state(broken).unwrap()).await;

    assert!(matches!(result, Err(DrawError::Validation(_))));
    assert!(store.is_empty());
}

fn single_entry_event(winner_is_extra: bool) -> DrawState {
    let alice = Participant::new("a", "Alice");
    let gold = Prize::new("gold", "Gold", 1, 2);
    DrawState {
        participants: vec![alice.clone()],
        all_participants: vec![alice.clone()],
        prizes: vec![gold.clone()],
        extra_prizes: Vec::new(),
        winners: vec![Winner {
            participant: alice,
            prize: gold,
            draw_time: "09:30:00".to_string(),
            is_extra: winner_is_extra,
        }],
        current_prize_id: Some("gold".to_string()),
        ..DrawState::default()
    }
}

#[tokio::test]
async fn test_save_state_rejects_regular_winner_in_pool() {
    let (processor, store, user) = setup();

    let result = processor.save_state(&user, single_entry_event(false)).await;
    assert!(matches!(result, Err(DrawError::Validation(_))));
    assert!(store.is_empty());

    // A later draw must not hand the same person a second regular slot
    let outcome = processor
        .draw(&user, &DrawRequest::new("p1", DrawMode::Regular))
        .await
        .unwrap();
    let first = &outcome.winners[0].participant.id;
    assert_eq!(
        outcome
            .state
            .winners
            .iter()
            .filter(|w| !w.is_extra && &w.participant.id == first)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_save_state_rejects_repeat_winner() {
    let (processor, store, user) = setup();
    let mut state = single_entry_event(true);
    state.winners.push(state.winners[0].clone());

    let result = processor.save_state(&user, state).await;

    assert!(matches!(result, Err(DrawError::Validation(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_save_state_accepts_extra_winner_in_pool() {
    let (processor, store, user) = setup();

    processor.save_state(&user, single_entry_event(true)).await.unwrap();

    let stored = store.load(&user).unwrap().unwrap();
    assert_eq!(stored.participants.len(), 1);
    assert_eq!(stored.winners.len(), 1);
}

#[tokio::test]
async fn test_save_state_repairs_dangling_selection() {
    let (processor, store, user) = setup();
    let mut state = DrawState::default();
    state.current_prize_id = Some("removed".to_string());

    let response = process_instruction(&processor, Some(&user), &instruction::save_state(state).unwrap())
        .await
        .unwrap();

    assert_eq!(response, Response::Saved { ok: true });
    let stored = store.load(&user).unwrap().unwrap();
    assert_eq!(stored.current_prize_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_reset_progress_and_default() {
    let (processor, _, user) = setup();
    let mut custom = small_event();
    custom.background_music = Some("theme.mp3".to_string());
    processor.save_state(&user, custom).await.unwrap();
    processor
        .draw(&user, &DrawRequest::new("gold", DrawMode::Regular))
        .await
        .unwrap();

    let reset = match process_instruction(&processor, Some(&user), &instruction::reset_progress().unwrap())
        .await
        .unwrap()
    {
        Response::State(state) => state,
        other => panic!("unexpected response {:?}", other),
    };
    assert!(reset.winners.is_empty());
    assert_eq!(reset.prizes[0].remaining, 2);
    assert_eq!(reset.participants.len(), 5);
    assert_eq!(reset.background_music.as_deref(), Some("theme.mp3"));

    let fresh = process_instruction(&processor, Some(&user), &instruction::reset_to_default().unwrap())
        .await
        .unwrap();
    assert_eq!(fresh, Response::State(DrawState::default()));
    assert_eq!(processor.current_state(&user).await.unwrap().prizes, default_prizes());
}

#[tokio::test]
async fn test_update_configuration_through_processor() {
    let (processor, _, user) = setup();
    processor.save_state(&user, small_event()).await.unwrap();
    processor
        .draw(&user, &DrawRequest::new("gold", DrawMode::Regular))
        .await
        .unwrap();
    let state = processor.current_state(&user).await.unwrap();

    let mut update = ConfigurationUpdate {
        prizes: state.prizes.clone(),
        extra_prizes: state.extra_prizes.clone(),
        roster: state.all_participants.iter().map(|p| p.name.clone()).collect(),
        extra_enabled: false,
        ..ConfigurationUpdate::default()
    };
    update.roster.push("Late Arrival".to_string());

    let refused = process_instruction(
        &processor,
        Some(&user),
        &instruction::update_configuration(update.clone()).unwrap(),
    )
    .await;
    assert_eq!(refused, Err(DrawError::ConfirmationRequired));
    assert_eq!(processor.current_state(&user).await.unwrap().winners.len(), 2);

    update.confirm_reset = true;
    let applied = processor.update_configuration(&user, &update).await.unwrap();
    assert!(applied.winners.is_empty());
    assert_eq!(applied.all_participants.len(), 6);
    assert_eq!(processor.current_state(&user).await.unwrap(), applied);
}

#[tokio::test]
async fn test_draw_instruction_fields_decode() {
    let mut request = DrawRequest::new("p2", DrawMode::Regular);
    request.requested_count = Some(2);
    request.prize_snapshot = Some(default_prizes()[1].clone());
    let instruction = DrawInstruction::from(request);

    let bytes = instruction.pack().unwrap();

    assert_eq!(DrawInstruction::unpack(&bytes).unwrap(), instruction);
}

#[tokio::test]
async fn test_drawn_response_shape() {
    let (processor, _, user) = setup();
    let response = process_instruction(
        &processor,
        Some(&user),
        &instruction::draw("p1", DrawMode::Regular).unwrap(),
    )
    .await
    .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["winners"].as_array().unwrap().len(), 1);
    assert_eq!(json["winners"][0]["isExtra"], false);
    assert_eq!(json["winners"][0]["prize"]["id"], "p1");
    assert!(json["winners"][0]["drawTime"].is_string());
    assert_eq!(json["state"]["currentPrizeId"], "p1");
    assert_eq!(json["state"]["prizes"][0]["remaining"], 0);
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = temp_dir();
    let config = Config {
        data_dir: Some(dir.clone()),
        ..Config::default()
    };
    let processor = Processor::from_config(config).unwrap();
    let user = UserKey::new("file_user").unwrap();

    let outcome = processor
        .draw(&user, &DrawRequest::new("p2", DrawMode::Regular))
        .await
        .unwrap();

    let store = FileStore::open(&dir).unwrap();
    assert!(store.root().join("file_user.json").exists());
    assert_eq!(store.load(&user).unwrap(), Some(outcome.state));
    assert_eq!(store.load(&UserKey::new("nobody").unwrap()).unwrap(), None);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_store_concurrent_draws() {
    let dir = temp_dir();
    let processor = Arc::new(Processor::new(Arc::new(FileStore::open(&dir).unwrap())));
    let user = UserKey::new("file_user").unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let processor = Arc::clone(&processor);
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            let mut request = DrawRequest::new("p3", DrawMode::Regular);
            request.requested_count = Some(1);
            processor.draw(&user, &request).await
        }));
    }
    let results: Vec<_> = futures_results(handles).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, DrawError::Exhausted(_))));
    let stored = FileStore::open(&dir).unwrap().load(&user).unwrap().unwrap();
    assert_eq!(stored.winners.len(), 5);
    assert!(!dir.join("file_user.json.tmp").exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

async fn futures_results<T>(handles: Vec<tokio::task::JoinHandle<T>>) -> Vec<T> {
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn test_store_summaries() {
    let (processor, store, user) = setup();
    processor.save_state(&user, small_event()).await.unwrap();
    processor
        .draw(&user, &DrawRequest::new("gold", DrawMode::Regular))
        .await
        .unwrap();
    let other = UserKey::new("another").unwrap();
    processor.current_state(&other).await.unwrap();

    assert_eq!(store.keys().unwrap(), vec![other.clone(), user.clone()]);
    let summaries = store.summaries().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].user, other);
    assert_eq!(summaries[0].prizes, 4);
    assert_eq!(summaries[0].winners, 0);
    assert_eq!(summaries[1].participants, 5);
    assert_eq!(summaries[1].prizes, 1);
    assert_eq!(summaries[1].extra_prizes, 1);
    assert_eq!(summaries[1].winners, 2);
    assert!(summaries.iter().all(|s| s.updated_at.is_some()));
}

#[test]
fn test_file_store_lists_documents() {
    let dir = temp_dir();
    let store = FileStore::open(&dir).unwrap();
    let user = UserKey::new("file_user").unwrap();
    store.save(&user, &small_event()).unwrap();
    std::fs::write(dir.join("notes.txt"), "not a document").unwrap();
    std::fs::write(dir.join("bad name.json"), "{}").unwrap();

    assert_eq!(store.keys().unwrap(), vec![user.clone()]);
    let summaries = store.summaries().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].winners, 0);
    assert!(summaries[0].updated_at.is_some());
    assert_eq!(store.updated_at(&UserKey::new("nobody").unwrap()).unwrap(), None);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_file_store_reads_older_documents() {
    let dir = temp_dir();
    let store = FileStore::open(&dir).unwrap();
    std::fs::write(
        dir.join("legacy.json"),
        r#"{"participants":[{"id":"a","name":"Ann"}],"prizes":[{"id":"p1","name":"Gold","rank":1,"count":1,"remaining":1}],"winners":[],"currentPrizeId":"p1","isExtraMode":false}"#,
    )
    .unwrap();

    let state = store.get_or_create(&UserKey::new("legacy").unwrap()).unwrap();

    assert_eq!(state.all_participants.len(), 1);
    assert!(!state.extra_mode_enabled);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_user_key_shape() {
    assert!(UserKey::new("fenix").is_ok());
    assert!(UserKey::new("team_a-01").is_ok());
    assert!(matches!(UserKey::new(""), Err(DrawError::Validation(_))));
    assert!(UserKey::new("../etc/passwd").is_err());
    assert!(UserKey::new("x".repeat(65)).is_err());
}

#[test]
fn test_error_codes() {
    assert_eq!(DrawError::NoCandidates.status(), 409);
    assert_eq!(DrawError::InvalidPrize("p".to_string()).status(), 400);
    assert_eq!(DrawError::Storage("io".to_string()).status(), 500);
    assert_eq!(DrawError::Exhausted("p".to_string()).code(), 4);
}

#[test]
fn test_default_config_uses_memory_store() {
    let config = Config::default();
    assert!(config.data_dir.is_none());
    assert!(config.log_rejections);
    assert!(config.open_store().is_ok());
}
