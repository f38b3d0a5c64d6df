//!
//! src/service.rs
//!
//! Track reconciler: answers lookups from the local store and falls back
//! to the catalog on a miss, writing what the catalog returns so the next
//! lookup for the same ISRC is a store hit
//!

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::ServiceError;
use crate::fetch::Catalog;
use crate::persistent::TrackStore;
use crate::types::{Isrc, Track, TrackDetails, UpdateTrackRequest};

/// Where a get-or-create answer came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Stored(TrackDetails),
    Created(TrackDetails),
}

impl Lookup {
    pub fn into_details(self) -> TrackDetails {
        match self {
            Lookup::Stored(d) | Lookup::Created(d) => d,
        }
    }
}

#[derive(Clone)]
pub struct TrackService {
    store: TrackStore,
    catalog: Arc<dyn Catalog>,
}

impl TrackService {
    pub fn new(store: TrackStore, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    async fn lookup_or_fetch(&self, isrc: &Isrc) -> Result<Lookup, ServiceError> {
        match self.store.get_by_isrc(isrc.as_str()).await {
            Ok(track) => {
                debug!(isrc = %isrc, "track.store_hit");
                return Ok(Lookup::Stored(track.into()));
            }
            Err(ServiceError::NotFound(_)) => {
                debug!(isrc = %isrc, "track.store_miss");
            }
            Err(e) => return Err(e),
        }

        let found = self.catalog.search_by_isrc(isrc).await?;

        // the key is the requested ISRC, not whatever the catalog echoes
        let details = TrackDetails {
            isrc: isrc.to_string(),
            title: found.title,
            artist_name: found.artist_name,
            spotify_image: found.image_url,
        };

        let track = Track::from(details.clone());
        if let Err(e) = self.store.save(&track).await {
            warn!(isrc = %isrc, error = %e, "track.save_failed");
            return Err(ServiceError::Persistence(
                "failed to save track in the database".to_string()
            ));
        }

        info!(isrc = %isrc, artist = %details.artist_name, "track.created");
        Ok(Lookup::Created(details))
    }

    pub async fn get_track_details_by_isrc(&self, isrc: &Isrc) ->
        Result<TrackDetails, ServiceError> {
        self.lookup_or_fetch(isrc).await.map(Lookup::into_details)
    }

    /// Store-only search; an empty result is reported as not found
    pub async fn search_tracks_by_artist_name(&self, artist_name: &str) ->
        Result<Vec<TrackDetails>, ServiceError> {
        let tracks = self.store.get_by_artist_name(artist_name).await
            .map_err(|e| {
                warn!(artist = %artist_name, error = %e, "track.artist_query_failed");
                ServiceError::Persistence(
                    "failed to retrieve tracks from the database".to_string()
                )
            })?;

        if tracks.is_empty() {
            return Err(ServiceError::NotFound("no tracks found for the artist".to_string()));
        }

        Ok(tracks.into_iter().map(TrackDetails::from).collect())
    }

    /// Idempotent: once this succeeds for an ISRC, later calls are store hits
    pub async fn get_or_create_track_details(&self, isrc: &Isrc) ->
        Result<Lookup, ServiceError> {
        self.lookup_or_fetch(isrc).await
    }

    pub async fn update_track(&self, isrc: &Isrc, update: &UpdateTrackRequest) ->
        Result<TrackDetails, ServiceError> {
        let mut track = self.store.get_by_isrc(isrc.as_str()).await?;

        track.title = update.title.clone();
        track.artist_name = update.artist_name.clone();
        track.spotify_image = update.spotify_image.clone();

        self.store.update(&track).await?;
        info!(isrc = %isrc, "track.updated");

        Ok(track.into())
    }
}
