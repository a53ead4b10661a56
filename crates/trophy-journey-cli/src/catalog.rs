use std::fs;
use std::path::PathBuf;

use trophy_journey_core::Game;

/// Read-only guide content loaded from a directory of `<slug>.json` files.
///
/// The catalog never raises: a missing directory, an unreadable file, or an
/// invalid definition reads as "no guide".
pub struct GuideCatalog {
    games_dir: PathBuf,
}

impl GuideCatalog {
    #[must_use]
    pub fn new(games_dir: PathBuf) -> Self {
        Self { games_dir }
    }

    #[must_use]
    pub fn game(&self, slug: &str) -> Option<Game> {
        let path = self.games_dir.join(format!("{slug}.json"));
        let body = fs::read_to_string(path).ok()?;
        let value = serde_json::from_str(&body).ok()?;
        Game::from_json(&value).ok()
    }

    /// Every valid guide in the directory, ordered by slug. Any failure
    /// along the way reads as an empty catalog.
    #[must_use]
    pub fn all_games(&self) -> Vec<Game> {
        let Ok(entries) = fs::read_dir(&self.games_dir) else {
            return Vec::new();
        };

        let mut games = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }

            let Ok(body) = fs::read_to_string(&path) else {
                return Vec::new();
            };
            let Ok(value) = serde_json::from_str(&body) else {
                return Vec::new();
            };
            let Ok(game) = Game::from_json(&value) else {
                return Vec::new();
            };
            games.push(game);
        }

        games.sort_by(|lhs, rhs| lhs.slug.cmp(&rhs.slug));
        games
    }

    #[must_use]
    pub fn game_slugs(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.games_dir) else {
            return Vec::new();
        };

        let mut slugs: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();

        slugs.sort();
        slugs
    }
}
