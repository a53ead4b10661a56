use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use trophy_journey_core::{format_rfc3339, now_utc, StorageMedium};

const MEDIUM_MIGRATION_VERSION: i64 = 1;

const SCHEMA_KV_V1: &str = r"
CREATE TABLE IF NOT EXISTS kv_entries (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
";

/// Durable client-local key-value surface backed by a single SQLite table,
/// the same shape browsers use underneath their local storage.
///
/// Construction and migration are fallible; once open, the
/// [`StorageMedium`] operations honor the port contract and never raise —
/// a failed read degrades to `None` and a failed write is dropped.
pub struct SqliteMedium {
    conn: Connection,
}

impl SqliteMedium {
    /// Opens (creating if missing) the backing database and configures it.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or the pragmas
    /// cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Applies the key-value schema and records it in the migration ledger.
    ///
    /// # Errors
    /// Returns an error when schema statements fail to apply.
    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                );",
            )
            .context("failed to ensure schema_migrations exists")?;

        self.conn
            .execute_batch(SCHEMA_KV_V1)
            .context("failed to apply kv schema")?;

        let now = format_rfc3339(now_utc()).map_err(|err| anyhow::anyhow!(err.to_string()))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![MEDIUM_MIGRATION_VERSION, now],
            )
            .context("failed to register kv schema migration")?;

        Ok(())
    }
}

impl StorageMedium for SqliteMedium {
    fn available(&self) -> bool {
        self.conn
            .query_row("SELECT COUNT(*) FROM kv_entries", [], |row| {
                row.get::<_, i64>(0)
            })
            .is_ok()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten()
    }

    fn set(&self, key: &str, value: &str) {
        let Ok(stamp) = format_rfc3339(now_utc()) else {
            return;
        };

        let _ = self.conn.execute(
            "INSERT INTO kv_entries(key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value, stamp],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use std::path::PathBuf;
    use trophy_journey_core::{
        ChecklistItem, Game, GameMetadata, JourneyIntro, ProgressStore, Trophy, TrophyType,
        STORAGE_KEY,
    };
    use ulid::Ulid;

    fn must<T>(result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("test failure: {err}"),
        }
    }

    fn fixture_medium() -> SqliteMedium {
        let medium = must(SqliteMedium::open(Path::new(":memory:")));
        must(medium.migrate());
        medium
    }

    fn temp_db_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trophy-journey-{label}-{}.sqlite3", Ulid::new()))
    }

    fn fixture_game() -> Game {
        Game {
            slug: "hollow-knight".to_string(),
            title: "Hollow Knight".to_string(),
            platform: "PS4".to_string(),
            cover_image: None,
            metadata: GameMetadata {
                estimated_time: "60 hours".to_string(),
                difficulty: "7/10".to_string(),
                playthroughs_required: 1,
                missable_trophies: 0,
                online_required: false,
            },
            journey_intro: JourneyIntro {
                overview: "fixture overview".to_string(),
                recommended_approach: "fixture approach".to_string(),
                warnings: Vec::new(),
            },
            trophies: vec![Trophy {
                id: "t-charms".to_string(),
                name: "Charmed".to_string(),
                description: "fixture".to_string(),
                trophy_type: TrophyType::Bronze,
                is_missable: false,
                missable_context: None,
                guide: "fixture guide".to_string(),
                walkthrough: None,
                prerequisites: None,
                farming_tip: None,
                checklist: Some(vec![
                    ChecklistItem {
                        id: "c-1".to_string(),
                        label: "Collect charm 1".to_string(),
                        location: None,
                        notes: None,
                        walkthrough: None,
                    },
                    ChecklistItem {
                        id: "c-2".to_string(),
                        label: "Collect charm 2".to_string(),
                        location: None,
                        notes: None,
                        walkthrough: None,
                    },
                ]),
            }],
            suggested_order: Vec::new(),
        }
    }

    #[test]
    fn set_then_get_round_trips_and_overwrites() {
        let medium = fixture_medium();

        assert_eq!(medium.get("missing"), None);

        medium.set("k", "first");
        assert_eq!(medium.get("k"), Some("first".to_string()));

        medium.set("k", "second");
        assert_eq!(medium.get("k"), Some("second".to_string()));
    }

    #[test]
    fn availability_requires_migration() {
        let medium = must(SqliteMedium::open(Path::new(":memory:")));
        assert!(!medium.available());

        // Port contract: a broken surface degrades silently.
        medium.set("k", "v");
        assert_eq!(medium.get("k"), None);

        must(medium.migrate());
        assert!(medium.available());
    }

    #[test]
    fn migrate_is_repeatable() {
        let medium = fixture_medium();
        must(medium.migrate());
        medium.set("k", "v");
        assert_eq!(medium.get("k"), Some("v".to_string()));
    }

    #[test]
    fn values_survive_reopen() {
        let db_path = temp_db_path("reopen");

        {
            let medium = must(SqliteMedium::open(&db_path));
            must(medium.migrate());
            medium.set(STORAGE_KEY, r#"{"version":1,"games":{}}"#);
        }

        let medium = must(SqliteMedium::open(&db_path));
        must(medium.migrate());
        assert_eq!(
            medium.get(STORAGE_KEY),
            Some(r#"{"version":1,"games":{}}"#.to_string())
        );

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn progress_store_session_survives_reopen() {
        let db_path = temp_db_path("session");
        let game = fixture_game();

        {
            let medium = must(SqliteMedium::open(&db_path));
            must(medium.migrate());
            let store = ProgressStore::new(Box::new(medium));
            assert!(store.persistence_available());

            store.initialize_game("hollow-knight", &game);
            assert!(store.toggle_checklist_item("hollow-knight", "t-charms", "c-1"));
            store.set_trophy_completed("hollow-knight", "t-charms", true);
        }

        let medium = must(SqliteMedium::open(&db_path));
        must(medium.migrate());
        let store = ProgressStore::new(Box::new(medium));

        let progress = match store.load_game("hollow-knight") {
            Some(value) => value,
            None => panic!("expected persisted progress after reopen"),
        };
        let trophy = match progress.trophies.get("t-charms") {
            Some(value) => value,
            None => panic!("expected trophy record after reopen"),
        };
        assert!(trophy.completed);
        assert_eq!(trophy.checklist.get("c-1"), Some(&true));
        assert_eq!(trophy.checklist.get("c-2"), Some(&false));

        let overall = store.overall_completion("hollow-knight");
        assert_eq!(overall.trophies_completed, 1);
        assert_eq!(overall.checklist_completed, 1);
        assert_eq!(overall.total_checklist, 2);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn stored_blob_is_plain_json_in_one_row() {
        let medium = fixture_medium();
        let payload = must(serde_json::to_string(&serde_json::json!({
            "version": 1,
            "games": {}
        }))
        .map_err(anyhow::Error::from));
        medium.set(STORAGE_KEY, &payload);

        let raw = match medium.get(STORAGE_KEY) {
            Some(value) => value,
            None => panic!("expected stored blob"),
        };
        let decoded: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => panic!("stored blob must stay valid JSON: {err}"),
        };
        assert_eq!(decoded["version"], serde_json::json!(1));
    }

    proptest! {
        #[test]
        fn arbitrary_values_round_trip(key in "[a-z0-9-]{1,32}", value in "\\PC*") {
            let medium = fixture_medium();
            medium.set(&key, &value);
            prop_assert_eq!(medium.get(&key), Some(value));
        }
    }
}
