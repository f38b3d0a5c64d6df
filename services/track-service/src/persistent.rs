//!
//! src/persistent.rs
//!
//! Sqlite backed store for track rows, keyed by ISRC with a secondary
//! lookup on artist name. Every method is a single statement; there are
//! no transactions spanning calls
//!

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteConnectOptions, sqlite::SqliteRow,
    Pool, Row, Sqlite};

use crate::errors::ServiceError;
use crate::types::Track;

#[derive(Clone)]
pub struct TrackStore {
    pool: Pool<Sqlite>
}

fn track_from_row(r: &SqliteRow) -> Track {
    Track {
        isrc: r.get("isrc"),
        title: r.get("title"),
        artist_name: r.get("artist_name"),
        spotify_image: r.get("spotify_image"),
    }
}

/// `sqlite::memory:`, `sqlite://:memory:` and `?mode=memory` forms,
/// with or without extra query parameters
fn is_memory_url(database_url: &str) -> bool {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let (database, query) = rest.split_once('?').unwrap_or((rest, ""));

    database == ":memory:"
        || query.split('&').any(|kv| kv.eq_ignore_ascii_case("mode=memory"))
}

/// sqlite creates the file on demand but not the directories above it
fn ensure_parent_dir(file: &Path) -> Result<(), ServiceError> {
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ServiceError::Persistence(
                format!("create dir {}: {e}", parent.display())
            ))?;
        }
    }
    Ok(())
}

impl TrackStore {

    async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<(), ServiceError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tracks (
              isrc           TEXT PRIMARY KEY,
              title          TEXT NOT NULL,
              artist_name    TEXT NOT NULL,
              spotify_image  TEXT NOT NULL,
              created_at     INTEGER NOT NULL,
              updated_at     INTEGER NOT NULL
            );
            "
        ).execute(pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(artist_name);"
        ).execute(pool).await?;

        Ok(())
    }

    pub async fn init(database_url: &str, max_connections: u32) -> Result<Self, ServiceError> {
        let is_memory = is_memory_url(database_url);

        let mut opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true);

        // WAL is file-only; in-memory pools are pinned to one connection
        if !is_memory {
            ensure_parent_dir(&opts.clone().get_filename())?;
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                       .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(if is_memory {1} else {max_connections.max(1)})
            .connect_with(opts)
            .await?;

        Self::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    /// Inserts a new row. A second save for the same ISRC violates the
    /// primary key and comes back as a persistence error.
    pub async fn save(&self, track: &Track) -> Result<(), ServiceError> {
        sqlx::query(
            r"
            INSERT INTO tracks (
                isrc, title, artist_name, spotify_image, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);
            "
        )
        .bind(&track.isrc)
        .bind(&track.title)
        .bind(&track.artist_name)
        .bind(&track.spotify_image)
        .bind(Self::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_isrc(&self, isrc: &str) -> Result<Track, ServiceError> {
        let row = sqlx::query(
            r"
            SELECT isrc, title, artist_name, spotify_image
              FROM tracks WHERE isrc = ?1;
            "
        )
        .bind(isrc)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(track_from_row)
            .ok_or_else(|| ServiceError::NotFound(format!("track {isrc} not found")))
    }

    /// Exact, case-sensitive match in insertion order. No rows is not an error.
    pub async fn get_by_artist_name(&self, artist_name: &str) ->
        Result<Vec<Track>, ServiceError> {
        let rows = sqlx::query(
            r"
            SELECT isrc, title, artist_name, spotify_image
              FROM tracks
             WHERE artist_name = ?1
             ORDER BY rowid ASC;
            "
        )
        .bind(artist_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(track_from_row).collect())
    }

    pub async fn update(&self, track: &Track) -> Result<(), ServiceError> {
        let updated = sqlx::query(
            r"
            UPDATE tracks
               SET title = ?1,
                   artist_name = ?2,
                   spotify_image = ?3,
                   updated_at = ?4
             WHERE isrc = ?5;
            "
        )
        .bind(&track.title)
        .bind(&track.artist_name)
        .bind(&track.spotify_image)
        .bind(Self::now())
        .bind(&track.isrc)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(ServiceError::NotFound(format!("track {} not found", track.isrc)));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM tracks;")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> TrackStore {
        TrackStore::init("sqlite::memory:", 1).await.unwrap()
    }

    fn track(isrc: &str, title: &str, artist: &str) -> Track {
        Track {
            isrc: isrc.to_string(),
            title: title.to_string(),
            artist_name: artist.to_string(),
            spotify_image: format!("http://img/{isrc}"),
        }
    }

    #[tokio::test]
    async fn save_then_get_by_isrc() -> Result<(), ServiceError> {
        let store = memory_store().await;
        let t = track("US1234567890", "Song A", "Artist A");
        store.save(&t).await?;

        assert_eq!(store.get_by_isrc("US1234567890").await?, t);
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_isrc_is_not_found() {
        let store = memory_store().await;
        assert!(matches!(
            store.get_by_isrc("GBAYE0000000").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_save_is_persistence_error() -> Result<(), ServiceError> {
        let store = memory_store().await;
        store.save(&track("US1234567890", "Song A", "Artist A")).await?;

        let second = store.save(&track("US1234567890", "Other", "Other")).await;
        assert!(matches!(second, Err(ServiceError::Persistence(_))));
        assert_eq!(store.get_by_isrc("US1234567890").await?.title, "Song A");
        Ok(())
    }

    #[tokio::test]
    async fn artist_lookup_is_exact_and_ordered() -> Result<(), ServiceError> {
        let store = memory_store().await;
        store.save(&track("US0000000003", "Third", "Artist X")).await?;
        store.save(&track("US0000000001", "First", "Artist Y")).await?;
        store.save(&track("US0000000002", "Second", "Artist X")).await?;
        store.save(&track("US0000000004", "Fourth", "artist x")).await?;

        let found = store.get_by_artist_name("Artist X").await?;
        let titles: Vec<_> = found.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Third", "Second"]);

        assert!(store.get_by_artist_name("Nobody").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn update_overwrites_fields() -> Result<(), ServiceError> {
        let store = memory_store().await;
        store.save(&track("US1234567890", "Song A", "Artist A")).await?;

        let mut changed = track("US1234567890", "Song B", "Artist B");
        changed.spotify_image = "http://img/b".to_string();
        store.update(&changed).await?;

        assert_eq!(store.get_by_isrc("US1234567890").await?, changed);
        Ok(())
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() -> Result<(), ServiceError> {
        let store = memory_store().await;
        let res = store.update(&track("US1234567890", "Song A", "Artist A")).await;
        assert!(matches!(res, Err(ServiceError::NotFound(_))));
        assert_eq!(store.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn file_store_creates_missing_directories() -> Result<(), ServiceError> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("data").join("nested").join("tracks.db");
        let url = format!("sqlite:{}", db_path.display());

        let store = TrackStore::init(&url, 2).await?;
        store.save(&track("US1234567890", "Song A", "Artist A")).await?;

        assert!(db_path.exists());
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[test]
    fn memory_urls_are_recognized() {
        for url in [
            "sqlite::memory:",
            "sqlite://:memory:",
            "sqlite::memory:?cache=shared",
            "sqlite://tracks.db?mode=memory",
        ] {
            assert!(is_memory_url(url), "{url} should be in-memory");
        }
        for url in ["sqlite:./data/tracks.db", "sqlite://memory.db", "sqlite:tracks.db?mode=rwc"] {
            assert!(!is_memory_url(url), "{url} should be file backed");
        }
    }

    #[tokio::test]
    async fn memory_url_variants_share_one_schema() -> Result<(), ServiceError> {
        // a wide pool would give each connection its own empty database
        let store = TrackStore::init("sqlite://:memory:", 8).await?;
        store.save(&track("US1234567890", "Song A", "Artist A")).await?;
        assert_eq!(store.get_by_isrc("US1234567890").await?.title, "Song A");
        Ok(())
    }

    #[tokio::test]
    async fn file_store_survives_reopen() -> Result<(), ServiceError> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite:{}", dir.path().join("tracks.db").display());

        {
            let store = TrackStore::init(&url, 2).await?;
            store.save(&track("US1234567890", "Song A", "Artist A")).await?;
        }

        let reopened = TrackStore::init(&url, 2).await?;
        assert_eq!(reopened.get_by_isrc("US1234567890").await?.artist_name, "Artist A");
        Ok(())
    }
}
