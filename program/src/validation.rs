// Lucky Draw Engine - Entity validation
use std::collections::HashSet;

use crate::{
    error::DrawError,
    state::{DrawState, Prize},
};

/// Check a single prize tier
pub fn validate_prize(prize: &Prize) -> Result<(), DrawError> {
    if prize.id.trim().is_empty() {
        return Err(DrawError::validation("prize id must not be blank"));
    }
    if prize.count < 1 {
        return Err(DrawError::validation(format!(
            "prize {} must have at least one slot",
            prize.id
        )));
    }
    if prize.remaining > prize.count {
        return Err(DrawError::validation(format!(
            "prize {} has {} remaining out of {}",
            prize.id, prize.remaining, prize.count
        )));
    }
    Ok(())
}

/// Check every prize of a list and that ids are unique within it
pub fn validate_prize_list(prizes: &[Prize]) -> Result<(), DrawError> {
    let mut seen = HashSet::new();
    for prize in prizes {
        validate_prize(prize)?;
        if !seen.insert(prize.id.as_str()) {
            return Err(DrawError::validation(format!(
                "duplicate prize id {}",
                prize.id
            )));
        }
    }
    Ok(())
}

/// Normalize raw roster lines: names are trimmed and blank lines dropped.
/// Duplicate names are kept, identity is by id.
pub fn validate_participant_list<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Check the invariants a stored document must hold
pub fn validate_state(state: &DrawState) -> Result<(), DrawError> {
    validate_prize_list(&state.prizes)?;
    validate_prize_list(&state.extra_prizes)?;

    let mut roster = HashSet::new();
    for participant in &state.all_participants {
        if participant.id.is_empty() {
            return Err(DrawError::validation("participant id must not be empty"));
        }
        if !roster.insert(participant.id.as_str()) {
            return Err(DrawError::validation(format!(
                "duplicate participant id {}",
                participant.id
            )));
        }
    }

    let mut pool = HashSet::new();
    for participant in &state.participants {
        if !roster.contains(participant.id.as_str()) {
            return Err(DrawError::validation(format!(
                "participant {} is not on the roster",
                participant.id
            )));
        }
        if !pool.insert(participant.id.as_str()) {
            return Err(DrawError::validation(format!(
                "participant {} appears twice in the pool",
                participant.id
            )));
        }
    }

    let mut regular_winners = HashSet::new();
    let mut extra_winners = HashSet::new();
    for winner in &state.winners {
        let id = winner.participant.id.as_str();
        let seen = if winner.is_extra {
            &mut extra_winners
        } else {
            &mut regular_winners
        };
        if !seen.insert(id) {
            return Err(DrawError::validation(format!(
                "participant {} won twice in {} mode",
                id,
                if winner.is_extra { "extra" } else { "regular" }
            )));
        }
    }
    if let Some(participant) = state
        .participants
        .iter()
        .find(|p| regular_winners.contains(p.id.as_str()))
    {
        return Err(DrawError::validation(format!(
            "participant {} already won and cannot stay in the pool",
            participant.id
        )));
    }

    match state.current_prize_id {
        Some(_) if state.current_prize().is_none() => Err(DrawError::validation(
            "current prize is not in the active prize list",
        )),
        None if !state.active_prizes().is_empty() => {
            Err(DrawError::validation("current prize must be selected"))
        }
        _ => Ok(()),
    }
}
