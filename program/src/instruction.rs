// Lucky Draw Engine - Instructions
use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    engine::{ConfigurationUpdate, DrawRequest},
    error::DrawError,
    state::{DrawMode, DrawState, Prize},
};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum DrawInstruction {
    /// Read the caller's document, installing the default one on first access
    GetState {},

    /// Overwrite the caller's document
    SaveState {
        /// Full replacement document, validated before it is written
        state: DrawState,
    },

    /// Run one draw on the server
    Draw {
        /// Prize in the active list
        prize_id: String,
        /// Must match the active mode
        mode: DrawMode,
        /// Optional cap on awarded slots
        requested_count: Option<u32>,
        /// Caller's copy of the prize, never used for arithmetic
        prize_snapshot: Option<Prize>,
    },

    /// Switch between regular and extra mode
    ToggleMode {},

    /// Apply operator settings
    UpdateConfiguration {
        update: ConfigurationUpdate,
    },

    /// Refill every prize and clear winners
    ResetProgress {},

    /// Replace the document with the built-in default
    ResetToDefault {},

    /// Read the built-in default, no side effect
    GetDefaultConfiguration {},
}

impl DrawInstruction {
    /// Unpacks a byte buffer into a DrawInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, DrawError> {
        if input.is_empty() {
            return Err(DrawError::validation("empty instruction"));
        }
        Self::try_from_slice(input)
            .map_err(|e| DrawError::validation(format!("undecodable instruction: {}", e)))
    }

    /// Packs a DrawInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, DrawError> {
        self.try_to_vec()
            .map_err(|e| DrawError::validation(format!("unencodable instruction: {}", e)))
    }

    /// Human-readable instruction name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetState {} => "Get State",
            Self::SaveState { .. } => "Save State",
            Self::Draw { .. } => "Draw",
            Self::ToggleMode {} => "Toggle Mode",
            Self::UpdateConfiguration { .. } => "Update Configuration",
            Self::ResetProgress {} => "Reset Progress",
            Self::ResetToDefault {} => "Reset To Default",
            Self::GetDefaultConfiguration {} => "Get Default Configuration",
        }
    }
}

impl From<DrawRequest> for DrawInstruction {
    fn from(request: DrawRequest) -> Self {
        Self::Draw {
            prize_id: request.prize_id,
            mode: request.mode,
            requested_count: request.requested_count,
            prize_snapshot: request.prize_snapshot,
        }
    }
}

/// Create get_state instruction
pub fn get_state() -> Result<Vec<u8>, DrawError> {
    DrawInstruction::GetState {}.pack()
}

/// Create save_state instruction
pub fn save_state(state: DrawState) -> Result<Vec<u8>, DrawError> {
    DrawInstruction::SaveState { state }.pack()
}

/// Create draw instruction
pub fn draw(prize_id: &str, mode: DrawMode) -> Result<Vec<u8>, DrawError> {
    DrawInstruction::from(DrawRequest::new(prize_id, mode)).pack()
}

/// Create toggle_mode instruction
pub fn toggle_mode() -> Result<Vec<u8>, DrawError> {
    DrawInstruction::ToggleMode {}.pack()
}

/// Create update_configuration instruction
pub fn update_configuration(update: ConfigurationUpdate) -> Result<Vec<u8>, DrawError> {
    DrawInstruction::UpdateConfiguration { update }.pack()
}

/// Create reset_progress instruction
pub fn reset_progress() -> Result<Vec<u8>, DrawError> {
    DrawInstruction::ResetProgress {}.pack()
}

/// Create reset_to_default instruction
pub fn reset_to_default() -> Result<Vec<u8>, DrawError> {
    DrawInstruction::ResetToDefault {}.pack()
}

/// Create get_default_configuration instruction
pub fn get_default_configuration() -> Result<Vec<u8>, DrawError> {
    DrawInstruction::GetDefaultConfiguration {}.pack()
}
