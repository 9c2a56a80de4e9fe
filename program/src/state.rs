// Lucky Draw Engine - State
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which prize list and candidate pool a draw works against
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    /// Winners leave the regular pool for good
    Regular,
    /// Secret bonus round, the whole roster is eligible again
    Extra,
}

impl DrawMode {
    pub fn from_extra(is_extra: bool) -> Self {
        if is_extra {
            DrawMode::Extra
        } else {
            DrawMode::Regular
        }
    }

    pub fn is_extra(self) -> bool {
        self == DrawMode::Extra
    }
}

/// A person on the roster
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Unique within the full roster
    pub id: String,
    /// Display name, also used to re-match a re-imported roster
    pub name: String,
    /// Team or department label shown next to the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Opaque avatar reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department: None,
            avatar: None,
        }
    }
}

/// A prize tier
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Prize {
    /// Unique within its own list
    pub id: String,
    pub name: String,
    /// Display order
    pub rank: u32,
    /// Total slots, at least 1
    pub count: u32,
    /// Slots not yet awarded, never above `count`
    pub remaining: u32,
    /// Opaque image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Prize {
    /// Fresh prize with every slot available
    pub fn new(id: impl Into<String>, name: impl Into<String>, rank: u32, count: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rank,
            count,
            remaining: count,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Copy of the prize with all slots restored
    pub fn refilled(&self) -> Self {
        Self {
            remaining: self.count,
            ..self.clone()
        }
    }
}

/// One awarded slot. Holds value snapshots of the participant and prize,
/// later edits to either never reach it.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub participant: Participant,
    pub prize: Prize,
    /// Human-readable time of the draw
    pub draw_time: String,
    /// Mode that was active when the slot was awarded
    #[serde(default)]
    pub is_extra: bool,
}

/// Per-user root aggregate
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", from = "PersistedDrawState")]
pub struct DrawState {
    /// Regular-mode candidate pool, shrinks as people win
    pub participants: Vec<Participant>,
    /// Full roster
    pub all_participants: Vec<Participant>,
    /// Regular-mode prize tiers
    pub prizes: Vec<Prize>,
    /// Secret-mode prize tiers
    pub extra_prizes: Vec<Prize>,
    /// Newest first, spans both modes
    pub winners: Vec<Winner>,
    /// Selected prize in the active list
    pub current_prize_id: Option<String>,
    /// Which prize list and pool are active
    pub is_extra_mode: bool,
    /// Whether secret mode is unlocked at all
    pub extra_mode_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw_music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_sound: Option<String>,
}

/// Stored document as read from disk, where any field may be missing
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PersistedDrawState {
    participants: Vec<Participant>,
    all_participants: Option<Vec<Participant>>,
    prizes: Vec<Prize>,
    extra_prizes: Vec<Prize>,
    winners: Vec<Winner>,
    current_prize_id: Option<String>,
    is_extra_mode: Option<bool>,
    extra_mode_enabled: Option<bool>,
    background_image: Option<String>,
    background_music: Option<String>,
    draw_music: Option<String>,
    winner_sound: Option<String>,
}

impl From<PersistedDrawState> for DrawState {
    fn from(doc: PersistedDrawState) -> Self {
        let is_extra_mode = doc.is_extra_mode.unwrap_or(false);
        let all_participants = doc
            .all_participants
            .unwrap_or_else(|| doc.participants.clone());

        let mut state = DrawState {
            participants: doc.participants,
            all_participants,
            prizes: doc.prizes,
            extra_prizes: doc.extra_prizes,
            winners: doc.winners,
            current_prize_id: doc.current_prize_id,
            is_extra_mode,
            extra_mode_enabled: doc.extra_mode_enabled.unwrap_or(is_extra_mode),
            background_image: doc.background_image,
            background_music: doc.background_music,
            draw_music: doc.draw_music,
            winner_sound: doc.winner_sound,
        };
        state.repoint_current_prize();
        state
    }
}

impl Default for DrawState {
    fn default() -> Self {
        let prizes = default_prizes();
        let roster = default_roster();
        Self {
            participants: roster.clone(),
            all_participants: roster,
            current_prize_id: prizes.first().map(|p| p.id.clone()),
            prizes,
            extra_prizes: Vec::new(),
            winners: Vec::new(),
            is_extra_mode: false,
            extra_mode_enabled: false,
            background_image: None,
            background_music: None,
            draw_music: None,
            winner_sound: None,
        }
    }
}

impl DrawState {
    /// Parse a stored JSON document, filling fields older documents lack
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn mode(&self) -> DrawMode {
        DrawMode::from_extra(self.is_extra_mode)
    }

    pub fn prizes_for(&self, mode: DrawMode) -> &[Prize] {
        match mode {
            DrawMode::Regular => &self.prizes,
            DrawMode::Extra => &self.extra_prizes,
        }
    }

    pub fn prizes_for_mut(&mut self, mode: DrawMode) -> &mut Vec<Prize> {
        match mode {
            DrawMode::Regular => &mut self.prizes,
            DrawMode::Extra => &mut self.extra_prizes,
        }
    }

    pub fn active_prizes(&self) -> &[Prize] {
        self.prizes_for(self.mode())
    }

    pub fn current_prize(&self) -> Option<&Prize> {
        let id = self.current_prize_id.as_deref()?;
        self.active_prizes().iter().find(|p| p.id == id)
    }

    pub fn first_prize_id(&self, mode: DrawMode) -> Option<String> {
        self.prizes_for(mode).first().map(|p| p.id.clone())
    }

    /// Point `current_prize_id` at the first active prize if it does not
    /// reference one of them.
    pub fn repoint_current_prize(&mut self) {
        if self.current_prize().is_none() {
            self.current_prize_id = self.first_prize_id(self.mode());
        }
    }

    /// Ids of everyone who has won in the given mode since the last reset
    pub fn winner_ids(&self, mode: DrawMode) -> HashSet<&str> {
        self.winners
            .iter()
            .filter(|w| w.is_extra == mode.is_extra())
            .map(|w| w.participant.id.as_str())
            .collect()
    }

    /// Candidates for a draw in `mode`.
    ///
    /// The regular pool is stored. The extra pool is derived from the full
    /// roster minus extra-mode winners and is never stored.
    pub fn candidate_pool(&self, mode: DrawMode) -> Vec<&Participant> {
        match mode {
            DrawMode::Regular => self.participants.iter().collect(),
            DrawMode::Extra => {
                let won = self.winner_ids(DrawMode::Extra);
                self.all_participants
                    .iter()
                    .filter(|p| !won.contains(p.id.as_str()))
                    .collect()
            }
        }
    }
}

const DEFAULT_ROSTER_SIZE: usize = 60;

/// Built-in prize tiers
pub fn default_prizes() -> Vec<Prize> {
    vec![
        Prize::new("p1", "First Prize (iPhone 16 Pro Max)", 1, 1)
            .with_image("https://picsum.photos/seed/iphone/400/400"),
        Prize::new("p2", "Second Prize (iPad Air)", 2, 3)
            .with_image("https://picsum.photos/seed/ipad/400/400"),
        Prize::new("p3", "Third Prize (AirPods Pro)", 3, 5)
            .with_image("https://picsum.photos/seed/airpods/400/400"),
        Prize::new("p4", "Participation Prize (Lucky Box)", 4, 10)
            .with_image("https://picsum.photos/seed/box/400/400"),
    ]
}

/// Built-in roster
pub fn default_roster() -> Vec<Participant> {
    (0..DEFAULT_ROSTER_SIZE)
        .map(|i| Participant {
            id: format!("user-{}", i),
            name: format!("Employee {}", i + 1),
            department: None,
            avatar: Some(format!("https://picsum.photos/seed/user{}/100/100", i)),
        })
        .collect()
}

/// Secret prize seeded when the secret mode is first unlocked with no tiers
pub fn default_extra_prize(id: impl Into<String>) -> Prize {
    Prize::new(id, "Mystery Surprise Prize", 1, 1)
        .with_image("https://picsum.photos/seed/mystery/400/400")
}
