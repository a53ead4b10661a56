use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};

/// Fixed key the whole progress blob is stored under in the medium.
pub const STORAGE_KEY: &str = "trophy-journey-progress";

/// Schema version of the persisted blob. A stored blob with any other
/// version reads as empty; there is no migration path.
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum GuideError {
    #[error("decode error: {0}")]
    Decode(String),
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrophyType {
    Platinum,
    Gold,
    Silver,
    Bronze,
}

impl TrophyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platinum => "platinum",
            Self::Gold => "gold",
            Self::Silver => "silver",
            Self::Bronze => "bronze",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "platinum" => Some(Self::Platinum),
            "gold" => Some(Self::Gold),
            "silver" => Some(Self::Silver),
            "bronze" => Some(Self::Bronze),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub walkthrough: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Trophy {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub trophy_type: TrophyType,
    pub is_missable: bool,
    pub missable_context: Option<String>,
    pub guide: String,
    pub walkthrough: Option<String>,
    pub prerequisites: Option<Vec<String>>,
    pub farming_tip: Option<String>,
    pub checklist: Option<Vec<ChecklistItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameMetadata {
    pub estimated_time: String,
    pub difficulty: String,
    pub playthroughs_required: u32,
    pub missable_trophies: u32,
    pub online_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JourneyIntro {
    pub overview: String,
    pub recommended_approach: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedPhase {
    pub phase: String,
    pub description: String,
    pub trophy_ids: Vec<String>,
}

/// Read-only game definition, authored as static JSON. Consumed at
/// `initialize_game` time to seed the progress shape; never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub slug: String,
    pub title: String,
    pub platform: String,
    pub cover_image: Option<String>,
    pub metadata: GameMetadata,
    pub journey_intro: JourneyIntro,
    pub trophies: Vec<Trophy>,
    pub suggested_order: Vec<SuggestedPhase>,
}

impl Game {
    /// Decodes and validates a game definition from JSON.
    ///
    /// # Errors
    /// Returns [`GuideError::Decode`] when JSON decoding fails and
    /// [`GuideError::Validation`] when decoded content violates guide
    /// constraints.
    pub fn from_json(value: &Value) -> Result<Self, GuideError> {
        let game: Self = serde_json::from_value(value.clone())
            .map_err(|err| GuideError::Decode(format!("invalid game definition JSON: {err}")))?;
        game.validate()?;
        Ok(game)
    }

    /// Validates guide content constraints.
    ///
    /// # Errors
    /// Returns [`GuideError::Validation`] when the slug is empty, trophy or
    /// checklist-item ids collide, or the suggested order references an
    /// undeclared trophy.
    pub fn validate(&self) -> Result<(), GuideError> {
        if self.slug.trim().is_empty() {
            return Err(GuideError::Validation("slug MUST be non-empty".to_string()));
        }

        let mut trophy_ids = BTreeSet::new();
        for trophy in &self.trophies {
            if !trophy_ids.insert(trophy.id.as_str()) {
                return Err(GuideError::Validation(format!(
                    "duplicate trophy id: {}",
                    trophy.id
                )));
            }

            let mut item_ids = BTreeSet::new();
            for item in trophy.checklist.iter().flatten() {
                if !item_ids.insert(item.id.as_str()) {
                    return Err(GuideError::Validation(format!(
                        "duplicate checklist item id {} in trophy {}",
                        item.id, trophy.id
                    )));
                }
            }
        }

        for phase in &self.suggested_order {
            for trophy_id in &phase.trophy_ids {
                if !trophy_ids.contains(trophy_id.as_str()) {
                    return Err(GuideError::Validation(format!(
                        "suggested phase {} references unknown trophy id: {trophy_id}",
                        phase.phase
                    )));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrophyProgress {
    /// Explicit completion flag, independent of checklist state.
    pub completed: bool,
    pub checklist: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameProgress {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated_at: OffsetDateTime,
    pub trophies: BTreeMap<String, TrophyProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProgress {
    pub version: u32,
    pub games: BTreeMap<String, GameProgress>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            games: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistCompletion {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverallCompletion {
    pub trophies_completed: usize,
    pub total_trophies: usize,
    pub checklist_completed: usize,
    pub total_checklist: usize,
}

/// Builds the initial progress record for a game definition: one entry per
/// declared trophy, one unchecked entry per declared checklist item.
#[must_use]
pub fn seed_game_progress(game: &Game, now: OffsetDateTime) -> GameProgress {
    let mut trophies = BTreeMap::new();
    for trophy in &game.trophies {
        let mut checklist = BTreeMap::new();
        for item in trophy.checklist.iter().flatten() {
            checklist.insert(item.id.clone(), false);
        }
        trophies.insert(
            trophy.id.clone(),
            TrophyProgress {
                completed: false,
                checklist,
            },
        );
    }

    GameProgress {
        started_at: now,
        last_updated_at: now,
        trophies,
    }
}

/// Counts checked and total checklist entries for one trophy. Zeros when the
/// trophy has no record.
#[must_use]
pub fn checklist_completion(progress: &GameProgress, trophy_id: &str) -> ChecklistCompletion {
    let Some(trophy) = progress.trophies.get(trophy_id) else {
        return ChecklistCompletion::default();
    };

    ChecklistCompletion {
        completed: trophy.checklist.values().filter(|checked| **checked).count(),
        total: trophy.checklist.len(),
    }
}

/// Aggregates completion across every trophy in a game's record.
#[must_use]
pub fn overall_completion(progress: &GameProgress) -> OverallCompletion {
    let mut totals = OverallCompletion::default();
    for trophy in progress.trophies.values() {
        totals.total_trophies += 1;
        if trophy.completed {
            totals.trophies_completed += 1;
        }

        for checked in trophy.checklist.values() {
            totals.total_checklist += 1;
            if *checked {
                totals.checklist_completed += 1;
            }
        }
    }
    totals
}

/// Injected client-local key-value surface the progress blob persists to.
///
/// Implementations never raise: a broken or missing surface degrades reads
/// to `None` and writes to no-ops. `available` is a capability probe the
/// store consults once, at construction.
pub trait StorageMedium {
    fn available(&self) -> bool;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

impl<M: StorageMedium> StorageMedium for Rc<M> {
    fn available(&self) -> bool {
        M::available(self)
    }

    fn get(&self, key: &str) -> Option<String> {
        M::get(self, key)
    }

    fn set(&self, key: &str, value: &str) {
        M::set(self, key, value)
    }
}

/// In-process medium. Always available; the UI layer and a store can share
/// one via `Rc`.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryMedium {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageMedium for MemoryMedium {
    fn available(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

/// Medium for non-interactive execution contexts: never available, reads
/// nothing, stores nothing.
#[derive(Debug, Default)]
pub struct NullMedium;

impl NullMedium {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StorageMedium for NullMedium {
    fn available(&self) -> bool {
        false
    }

    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) {}
}

/// Persists and retrieves a single user's progress across all games, keyed
/// by slug, with atomic-per-call read-modify-write over the whole blob.
///
/// No operation raises. Every failure mode — unavailable medium, unknown
/// slug or trophy id, malformed stored blob — degrades to a default value
/// or a no-op; availability wins over strict signaling.
pub struct ProgressStore {
    medium: Box<dyn StorageMedium>,
    persistence_available: bool,
}

impl ProgressStore {
    #[must_use]
    pub fn new(medium: Box<dyn StorageMedium>) -> Self {
        let persistence_available = medium.available();
        Self {
            medium,
            persistence_available,
        }
    }

    #[must_use]
    pub fn persistence_available(&self) -> bool {
        self.persistence_available
    }

    /// Reads the full persisted blob. Absence, unparsable content, a
    /// version mismatch, or an unavailable medium all read as empty.
    #[must_use]
    pub fn load_all(&self) -> UserProgress {
        if !self.persistence_available {
            return UserProgress::default();
        }

        let Some(raw) = self.medium.get(STORAGE_KEY) else {
            return UserProgress::default();
        };

        match serde_json::from_str::<UserProgress>(&raw) {
            Ok(progress) if progress.version == CURRENT_VERSION => progress,
            _ => UserProgress::default(),
        }
    }

    #[must_use]
    pub fn load_game(&self, slug: &str) -> Option<GameProgress> {
        self.load_all().games.get(slug).cloned()
    }

    /// Returns the existing record for `slug` unchanged, or seeds, persists,
    /// and returns a fresh one. Calling this any number of times never
    /// resets progress.
    pub fn initialize_game(&self, slug: &str, game: &Game) -> GameProgress {
        if let Some(existing) = self.load_game(slug) {
            return existing;
        }

        let seeded = seed_game_progress(game, now_utc());
        self.save_game(slug, &seeded);
        seeded
    }

    /// Replaces `games[slug]` with the given record, always stamping
    /// `last_updated_at` to the save time regardless of the caller's value.
    /// Silently does nothing when persistence is unavailable.
    pub fn save_game(&self, slug: &str, progress: &GameProgress) {
        if !self.persistence_available {
            return;
        }

        let mut all = self.load_all();
        let mut stamped = progress.clone();
        stamped.last_updated_at = now_utc();
        all.games.insert(slug.to_string(), stamped);

        if let Ok(serialized) = serde_json::to_string(&all) {
            self.medium.set(STORAGE_KEY, &serialized);
        }
    }

    /// Flips one checklist entry and persists, returning the new state. A
    /// missing entry reads as unchecked, so the first toggle creates it as
    /// `true`. Unknown slug or trophy id returns `false` with no mutation.
    pub fn toggle_checklist_item(&self, slug: &str, trophy_id: &str, item_id: &str) -> bool {
        let Some(mut progress) = self.load_game(slug) else {
            return false;
        };
        let Some(trophy) = progress.trophies.get_mut(trophy_id) else {
            return false;
        };

        let new_value = !trophy.checklist.get(item_id).copied().unwrap_or(false);
        trophy.checklist.insert(item_id.to_string(), new_value);
        self.save_game(slug, &progress);
        new_value
    }

    /// Sets the explicit completion flag and persists. Unknown slug or
    /// trophy id is a no-op.
    pub fn set_trophy_completed(&self, slug: &str, trophy_id: &str, completed: bool) {
        let Some(mut progress) = self.load_game(slug) else {
            return;
        };
        let Some(trophy) = progress.trophies.get_mut(trophy_id) else {
            return;
        };

        trophy.completed = completed;
        self.save_game(slug, &progress);
    }

    #[must_use]
    pub fn checklist_completion(&self, slug: &str, trophy_id: &str) -> ChecklistCompletion {
        self.load_game(slug).map_or_else(ChecklistCompletion::default, |progress| {
            checklist_completion(&progress, trophy_id)
        })
    }

    #[must_use]
    pub fn overall_completion(&self, slug: &str) -> OverallCompletion {
        self.load_game(slug)
            .as_ref()
            .map_or_else(OverallCompletion::default, overall_completion)
    }
}

/// Parses an RFC 3339 timestamp and requires UTC (`Z`) offset.
///
/// # Errors
/// Returns [`GuideError::Validation`] when parsing fails or the timestamp
/// is not UTC.
pub fn parse_rfc3339_utc(value: &str) -> Result<OffsetDateTime, GuideError> {
    let parsed = OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|err| GuideError::Validation(format!("invalid RFC3339 timestamp: {err}")))?;

    if parsed.offset() != UtcOffset::UTC {
        return Err(GuideError::Validation(
            "timestamp MUST use UTC offset Z".to_string(),
        ));
    }

    Ok(parsed)
}

/// Formats a timestamp as RFC 3339 after normalizing to UTC.
///
/// # Errors
/// Returns [`GuideError::Validation`] when formatting fails.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, GuideError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| GuideError::Validation(format!("failed to format RFC3339 timestamp: {err}")))
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(UtcOffset::UTC)
}
