use std::fmt;
use serde::{Deserialize, Serialize};
use serde::de::IgnoredAny;

use crate::errors::ServiceError;

pub const ISRC_LEN: usize = 12;

// International standard recording code, e.g. US1234567890
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isrc(String);

impl Isrc {
    /// Accepts `us-abc-12-34567` style input: separators are dropped,
    /// case is folded to upper. Country code must be alphabetic.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let code: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let valid = code.len() == ISRC_LEN
            && code.chars().all(|c| c.is_ascii_alphanumeric())
            && code.chars().take(2).all(|c| c.is_ascii_alphabetic());

        if !valid {
            return Err(ServiceError::InvalidRequest(
                format!("invalid ISRC: {raw:?}")
            ));
        }
        Ok( Self(code) )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row of the `tracks` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub isrc: String,
    pub title: String,
    pub artist_name: String,
    pub spotify_image: String,
}

/// Boundary shape returned for every track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDetails {
    pub isrc: String,
    pub title: String,
    pub artist_name: String,
    pub spotify_image: String,
}

impl From<Track> for TrackDetails {
    fn from(t: Track) -> Self {
        Self {
            isrc: t.isrc,
            title: t.title,
            artist_name: t.artist_name,
            spotify_image: t.spotify_image,
        }
    }
}

impl From<TrackDetails> for Track {
    fn from(d: TrackDetails) -> Self {
        Self {
            isrc: d.isrc,
            title: d.title,
            artist_name: d.artist_name,
            spotify_image: d.spotify_image,
        }
    }
}

/// POST /track body. Only `isrc` is used; the other TrackDetails fields
/// are accepted and discarded so clients can send a full record.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTrackRequest {
    pub isrc: String,
    #[serde(default, rename = "title")]
    _title: Option<IgnoredAny>,
    #[serde(default, rename = "artist_name")]
    _artist_name: Option<IgnoredAny>,
    #[serde(default, rename = "spotify_image")]
    _spotify_image: Option<IgnoredAny>,
}

/// PUT /track/{isrc} body
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTrackRequest {
    #[serde(default)]
    pub isrc: Option<String>,
    pub title: String,
    pub artist_name: String,
    pub spotify_image: String,
}

/// Fields lifted out of the first catalog hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub title: String,
    pub artist_name: String,
    pub image_url: String,
}

/// 201 body for POST /track when the record had to be fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTrack {
    pub message: String,
    pub track: TrackDetails,
}
