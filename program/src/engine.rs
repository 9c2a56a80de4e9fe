// Lucky Draw Engine - State transitions
//
// Every transition takes the current document by reference and returns the
// next one. Nothing here touches storage.
use std::collections::{HashMap, HashSet, VecDeque};

use borsh::{BorshDeserialize, BorshSerialize};
use rand::Rng;

use crate::{
    error::DrawError,
    selection::select_winners,
    state::{default_extra_prize, DrawMode, DrawState, Participant, Prize, Winner},
    utils,
    validation::{validate_participant_list, validate_prize_list},
};

/// A single draw request
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRequest {
    pub prize_id: String,
    pub mode: DrawMode,
    /// Caps the number of slots awarded by this draw
    pub requested_count: Option<u32>,
    /// Caller's view of the prize, display only
    pub prize_snapshot: Option<Prize>,
}

impl DrawRequest {
    pub fn new(prize_id: impl Into<String>, mode: DrawMode) -> Self {
        Self {
            prize_id: prize_id.into(),
            mode,
            requested_count: None,
            prize_snapshot: None,
        }
    }
}

/// Result of a committed draw
#[derive(Clone, Debug, PartialEq)]
pub struct DrawOutcome {
    /// Winners of this draw only
    pub winners: Vec<Winner>,
    pub state: DrawState,
}

/// Settings submitted by the operator
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq)]
pub struct ConfigurationUpdate {
    pub prizes: Vec<Prize>,
    pub extra_prizes: Vec<Prize>,
    /// Raw roster lines, one name per line
    pub roster: Vec<String>,
    pub extra_enabled: bool,
    pub background_image: Option<String>,
    pub background_music: Option<String>,
    pub draw_music: Option<String>,
    pub winner_sound: Option<String>,
    /// Operator agreed to wipe draw progress
    pub confirm_reset: bool,
}

/// Flip between regular and extra mode and select the first prize of the
/// newly active list.
pub fn toggle_mode(state: &DrawState) -> DrawState {
    let mut next = state.clone();
    next.is_extra_mode = !state.is_extra_mode;
    next.current_prize_id = next.first_prize_id(next.mode());
    next
}

/// Award up to `min(remaining, pool size)` slots of one prize.
///
/// The stored prize list is the only source for the decrement. On error
/// no partial draw is recorded.
pub fn draw<R: Rng + ?Sized>(
    state: &DrawState,
    request: &DrawRequest,
    draw_time: &str,
    rng: &mut R,
) -> Result<DrawOutcome, DrawError> {
    let prize_id = request.prize_id.trim();
    if prize_id.is_empty() {
        return Err(DrawError::validation("prize id is required"));
    }
    if request.mode != state.mode() {
        return Err(DrawError::validation(format!(
            "draw requested in {:?} mode while {:?} mode is active",
            request.mode,
            state.mode()
        )));
    }
    if request.requested_count == Some(0) {
        return Err(DrawError::validation("requested count must be at least 1"));
    }
    if let Some(snapshot) = &request.prize_snapshot {
        if snapshot.id != prize_id {
            return Err(DrawError::validation(format!(
                "prize snapshot {} does not match prize {}",
                snapshot.id, prize_id
            )));
        }
    }

    let mode = request.mode;
    let prize = state
        .prizes_for(mode)
        .iter()
        .find(|p| p.id == prize_id)
        .ok_or_else(|| DrawError::InvalidPrize(prize_id.to_string()))?;
    if prize.is_exhausted() {
        return Err(DrawError::Exhausted(prize_id.to_string()));
    }

    let pool = state.candidate_pool(mode);
    if pool.is_empty() {
        return Err(DrawError::NoCandidates);
    }

    let mut count = (prize.remaining as usize).min(pool.len());
    if let Some(requested) = request.requested_count {
        count = count.min(requested as usize);
    }

    let selected = select_winners(&pool, count, rng);
    let snapshot = prize.clone();
    let winners: Vec<Winner> = selected
        .into_iter()
        .map(|participant| Winner {
            participant: participant.clone(),
            prize: snapshot.clone(),
            draw_time: draw_time.to_string(),
            is_extra: mode.is_extra(),
        })
        .collect();

    let mut next = state.clone();
    let awarded = winners.len() as u32;
    if let Some(stored) = next.prizes_for_mut(mode).iter_mut().find(|p| p.id == prize_id) {
        stored.remaining = stored
            .remaining
            .checked_sub(awarded)
            .ok_or_else(|| DrawError::Exhausted(prize_id.to_string()))?;
    }

    if mode == DrawMode::Regular {
        let won: HashSet<&str> = winners.iter().map(|w| w.participant.id.as_str()).collect();
        next.participants.retain(|p| !won.contains(p.id.as_str()));
    }

    next.winners = winners.iter().cloned().chain(state.winners.iter().cloned()).collect();
    next.current_prize_id = Some(prize_id.to_string());

    Ok(DrawOutcome {
        winners,
        state: next,
    })
}

/// Roster and prize lists after input normalization
struct PreparedConfiguration {
    names: Vec<String>,
    prizes: Vec<Prize>,
    extra_prizes: Vec<Prize>,
}

fn prepare(update: &ConfigurationUpdate) -> Result<PreparedConfiguration, DrawError> {
    let names = validate_participant_list(&update.roster);

    if update.prizes.is_empty() {
        return Err(DrawError::validation("at least one regular prize is required"));
    }
    // Remaining counts are not taken from the caller, only ids and capacity matter here
    let prizes: Vec<Prize> = update.prizes.iter().map(Prize::refilled).collect();
    validate_prize_list(&prizes)?;

    let mut extra_prizes: Vec<Prize> = update.extra_prizes.iter().map(Prize::refilled).collect();
    if update.extra_enabled && extra_prizes.is_empty() {
        extra_prizes.push(default_extra_prize(utils::mint_id("ep")));
    }
    validate_prize_list(&extra_prizes)?;

    Ok(PreparedConfiguration {
        names,
        prizes,
        extra_prizes,
    })
}

fn sorted_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut names: Vec<&str> = names.collect();
    names.sort_unstable();
    names
}

fn prize_identities(prizes: &[Prize]) -> Vec<(&str, &str, u32)> {
    let mut identities: Vec<_> = prizes
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str(), p.count))
        .collect();
    identities.sort_unstable();
    identities
}

fn structural(state: &DrawState, prepared: &PreparedConfiguration) -> bool {
    let roster_changed = sorted_names(prepared.names.iter().map(String::as_str))
        != sorted_names(state.all_participants.iter().map(|p| p.name.as_str()));
    let prizes_changed = prize_identities(&prepared.prizes) != prize_identities(&state.prizes);
    let extra_changed =
        prize_identities(&prepared.extra_prizes) != prize_identities(&state.extra_prizes);

    roster_changed || prizes_changed || extra_changed
}

/// Whether applying `update` wipes draw progress
pub fn is_structural_change(state: &DrawState, update: &ConfigurationUpdate) -> Result<bool, DrawError> {
    let prepared = prepare(update)?;
    Ok(structural(state, &prepared))
}

/// Rebuild the roster from names, reusing the id and avatar of existing
/// participants with the same name. Repeated names consume existing
/// entries in order before new ids are minted.
pub fn build_roster(names: &[String], existing: &[Participant]) -> Vec<Participant> {
    let mut by_name: HashMap<&str, VecDeque<&Participant>> = HashMap::new();
    for participant in existing {
        by_name
            .entry(participant.name.as_str())
            .or_default()
            .push_back(participant);
    }

    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            match by_name.get_mut(name.as_str()).and_then(VecDeque::pop_front) {
                Some(participant) => participant.clone(),
                None => Participant {
                    id: utils::mint_id("p"),
                    name: name.clone(),
                    department: None,
                    avatar: Some(utils::default_avatar(idx)),
                },
            }
        })
        .collect()
}

/// Apply operator settings.
///
/// A changed roster or changed prize identities/capacities resets all draw
/// progress and needs `confirm_reset`. Anything else is applied in place.
pub fn update_configuration(
    state: &DrawState,
    update: &ConfigurationUpdate,
) -> Result<DrawState, DrawError> {
    let prepared = prepare(update)?;
    let roster = build_roster(&prepared.names, &state.all_participants);

    let mut next = if structural(state, &prepared) {
        if !update.confirm_reset {
            return Err(DrawError::ConfirmationRequired);
        }
        DrawState {
            participants: roster.clone(),
            all_participants: roster,
            prizes: prepared.prizes,
            extra_prizes: prepared.extra_prizes,
            winners: Vec::new(),
            current_prize_id: None,
            ..state.clone()
        }
    } else {
        DrawState {
            prizes: keep_progress(prepared.prizes, &state.prizes),
            extra_prizes: keep_progress(prepared.extra_prizes, &state.extra_prizes),
            all_participants: roster,
            ..state.clone()
        }
    };

    next.is_extra_mode = update.extra_enabled;
    next.extra_mode_enabled = update.extra_enabled;
    if update.background_image.is_some() {
        next.background_image = update.background_image.clone();
    }
    if update.background_music.is_some() {
        next.background_music = update.background_music.clone();
    }
    if update.draw_music.is_some() {
        next.draw_music = update.draw_music.clone();
    }
    if update.winner_sound.is_some() {
        next.winner_sound = update.winner_sound.clone();
    }
    next.repoint_current_prize();

    Ok(next)
}

/// Carry stored `remaining` over to the edited prize list, matched by id
fn keep_progress(edited: Vec<Prize>, stored: &[Prize]) -> Vec<Prize> {
    edited
        .into_iter()
        .map(|mut prize| {
            if let Some(old) = stored.iter().find(|p| p.id == prize.id) {
                prize.remaining = old.remaining.min(prize.count);
            }
            prize
        })
        .collect()
}

/// Refill every prize, clear winners and put the whole roster back in the
/// regular pool. Configuration and mode flags are kept.
pub fn reset_progress(state: &DrawState) -> DrawState {
    let mut next = DrawState {
        participants: state.all_participants.clone(),
        prizes: state.prizes.iter().map(Prize::refilled).collect(),
        extra_prizes: state.extra_prizes.iter().map(Prize::refilled).collect(),
        winners: Vec::new(),
        ..state.clone()
    };
    next.current_prize_id = next.first_prize_id(next.mode());
    next
}

/// Built-in default document, discarding any custom configuration
pub fn reset_to_default_configuration() -> DrawState {
    DrawState::default()
}
