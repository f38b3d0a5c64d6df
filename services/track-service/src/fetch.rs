//!
//! src/fetch.rs
//!
//! Client for the external Spotify catalog. Acquires a client-credentials
//! token at startup and resolves ISRCs to title, artist and cover art
//!

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header, redirect, RequestBuilder};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{HttpConfig, SpotifyConfig};
use crate::types::{CatalogTrack, Isrc};
use crate::ServiceError;

/// Re-acquire the token this long before Spotify says it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lookup seam between the reconciler and whatever catalog backs it
#[async_trait]
pub trait Catalog: Send + Sync {
    /// First track the catalog returns for `isrc`
    async fn search_by_isrc(&self, isrc: &Isrc) -> Result<CatalogTrack, ServiceError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder  {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, ServiceError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| ServiceError::Http(format!("build client: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct AccessToken {
    bearer: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_stale(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN >= self.expires_at
    }
}

/// Subset of GET /v1/search?type=track we read
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    tracks: Paging,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    items: Vec<FullTrack>,
}

#[derive(Debug, Deserialize)]
struct FullTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SimpleArtist>,
    album: SimpleAlbum,
}

#[derive(Debug, Deserialize)]
struct SimpleArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SimpleAlbum {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

/// Picks the first hit; there is no ranking beyond catalog order
pub fn first_track(resp: SearchResponse, isrc: &Isrc) -> Result<CatalogTrack, ServiceError> {
    let Some(track) = resp.tracks.items.into_iter().next() else {
        return Err(ServiceError::CatalogNotFound("track not found".to_string()));
    };
    let artist_name = track.artists.into_iter().next()
        .map(|a| a.name)
        .ok_or_else(|| ServiceError::CatalogIncomplete(format!("{isrc} has no artists")))?;
    let image_url = track.album.images.into_iter().next()
        .map(|i| i.url)
        .ok_or_else(|| ServiceError::CatalogIncomplete(format!("{isrc} has no album images")))?;

    Ok( CatalogTrack { title: track.name, artist_name, image_url } )
}

pub struct SpotifyClient {
    http: Client,
    cfg: SpotifyConfig,
    token: RwLock<AccessToken>,
}

impl SpotifyClient {
    /// Builds the client and authenticates. A failed token grant here is
    /// fatal to startup.
    pub async fn connect(http_config: &HttpConfig, cfg: &SpotifyConfig) ->
        Result<Self, ServiceError> {

        let http  = base_client(http_config)?;
        let token = Self::fetch_token(&http, cfg).await?;
        info!(expires_in = ?token.expires_at.saturating_duration_since(Instant::now()),
            "catalog.authenticated");

        Ok( Self {
            http,
            cfg: cfg.clone(),
            token: RwLock::new(token),
        })
    }

    fn token_request(http: &Client, cfg: &SpotifyConfig) -> RequestBuilder {
        http.post(cfg.token_url.clone())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .basic_auth(&cfg.client_id, Some(&cfg.client_secret))
    }

    async fn fetch_token(http: &Client, cfg: &SpotifyConfig) ->
        Result<AccessToken, ServiceError> {
        let requested_at = Instant::now();
        let response = Self::token_request(http, cfg).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::CatalogUnavailable(
                format!("token request returned {status}")
            ));
        }

        let token: TokenResponse = response.json().await
            .map_err(|e| ServiceError::Parse(format!("token response: {e}")))?;
        Ok( AccessToken {
            bearer: token.access_token,
            expires_at: requested_at + Duration::from_secs(token.expires_in),
        })
    }

    /// Current bearer, refreshed once if it is close to expiry
    async fn bearer(&self) -> Result<String, ServiceError> {
        {
            let token = self.token.read().await;
            if !token.is_stale(Instant::now()) {
                return Ok(token.bearer.clone());
            }
        }

        let mut token = self.token.write().await;
        // another request may have refreshed while we waited on the lock
        if token.is_stale(Instant::now()) {
            debug!("catalog.token_refresh");
            *token = Self::fetch_token(&self.http, &self.cfg).await?;
        }
        Ok(token.bearer.clone())
    }

    /// GET /v1/search?type=track&q=...&limit=&offset=
    pub fn search(&self, query: &str, limit: u32, offset: u32, bearer: &str) ->
        Result<RequestBuilder, ServiceError> {
        let url = self.cfg.api_base.join("search")
            .map_err(|e| ServiceError::Config(format!("search url: {e}")))?;
        Ok( self.http.get(url).bearer_auth(bearer).query(&[
            ("type", "track"),
            ("q", query),
            ("limit", &limit.to_string()),
            ("offset", &offset.to_string())
        ]) )
    }
}

#[async_trait]
impl Catalog for SpotifyClient {
    async fn search_by_isrc(&self, isrc: &Isrc) -> Result<CatalogTrack, ServiceError> {
        let bearer = self.bearer().await?;
        let query = format!("isrc:{isrc}");

        let response = self.search(&query, 1, 0, &bearer)?
            .send()
            .await
            .map_err(|e| ServiceError::CatalogUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(isrc = %isrc, status = %status, "catalog.search_failed");
            return Err(ServiceError::CatalogUnavailable(format!("search returned {status}")));
        }

        let body: SearchResponse = response.json().await
            .map_err(|e| ServiceError::Parse(format!("search response: {e}")))?;
        let found = first_track(body, isrc);
        debug!(isrc = %isrc, hit = found.is_ok(), "catalog.search");
        found
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn isrc() -> Isrc {
        Isrc::parse("US1234567890").unwrap()
    }

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    #[test]
    fn first_track_extracts_name_artist_and_image() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "tracks": { "items": [
                {
                    "name": "Song A",
                    "artists": [{"name": "Artist A"}, {"name": "Feature B"}],
                    "album": {"images": [{"url": "http://img/a"}, {"url": "http://img/a-small"}]}
                },
                {
                    "name": "Song A (Remaster)",
                    "artists": [{"name": "Artist A"}],
                    "album": {"images": [{"url": "http://img/b"}]}
                }
            ]}
        })).unwrap();

        let track = first_track(body, &isrc()).unwrap();
        assert_eq!(track, CatalogTrack {
            title: "Song A".into(),
            artist_name: "Artist A".into(),
            image_url: "http://img/a".into(),
        });
    }

    #[test]
    fn empty_result_is_catalog_not_found() {
        let body: SearchResponse =
            serde_json::from_str(r#"{"tracks":{"items":[],"total":0}}"#).unwrap();
        assert!(matches!(first_track(body, &isrc()), Err(ServiceError::CatalogNotFound(_))));
    }

    #[test]
    fn missing_artists_or_images_is_incomplete() {
        let no_artist: SearchResponse = serde_json::from_str(
            r#"{"tracks":{"items":[{"name":"x","artists":[],"album":{"images":[{"url":"u"}]}}]}}"#
        ).unwrap();
        assert!(matches!(
            first_track(no_artist, &isrc()),
            Err(ServiceError::CatalogIncomplete(_))
        ));

        let no_image: SearchResponse = serde_json::from_str(
            r#"{"tracks":{"items":[{"name":"x","artists":[{"name":"a"}],"album":{}}]}}"#
        ).unwrap();
        assert!(matches!(
            first_track(no_image, &isrc()),
            Err(ServiceError::CatalogIncomplete(_))
        ));
    }

    #[test]
    fn token_goes_stale_inside_margin() {
        let now = Instant::now();
        let fresh = AccessToken { bearer: "b".into(), expires_at: now + Duration::from_secs(3600) };
        let close = AccessToken { bearer: "b".into(), expires_at: now + Duration::from_secs(30) };
        assert!(!fresh.is_stale(now));
        assert!(close.is_stale(now));
    }

    /// Local stand-in for the accounts and search endpoints. The first grant
    /// is already inside the refresh margin, later grants are good for an
    /// hour. Search echoes the bearer it was called with as the title.
    async fn stub_spotify() -> (SpotifyConfig, Arc<AtomicUsize>) {
        use axum::extract::State;
        use axum::http::HeaderMap;
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use serde_json::{json, Value};

        async fn grant(State(grants): State<Arc<AtomicUsize>>) -> Json<Value> {
            let n = grants.fetch_add(1, Ordering::SeqCst) + 1;
            let expires_in = if n == 1 { 30 } else { 3600 };
            Json(json!({
                "access_token": format!("tok-{n}"),
                "token_type": "Bearer",
                "expires_in": expires_in
            }))
        }

        async fn search(headers: HeaderMap) -> Json<Value> {
            let bearer = headers.get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .unwrap_or_default()
                .to_string();
            Json(json!({ "tracks": { "items": [{
                "name": bearer,
                "artists": [{"name": "Artist A"}],
                "album": {"images": [{"url": "http://img/a"}]}
            }]}}))
        }

        let grants = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/token", post(grant))
            .route("/v1/search", get(search))
            .with_state(grants.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let cfg = SpotifyConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            token_url: format!("http://{addr}/api/token").parse().unwrap(),
            api_base: format!("http://{addr}/v1/").parse().unwrap(),
        };
        (cfg, grants)
    }

    #[tokio::test]
    async fn stale_token_is_refreshed_before_search() -> Result<(), ServiceError> {
        let (cfg, grants) = stub_spotify().await;
        let spotify = SpotifyClient::connect(&HttpConfig::default(), &cfg).await?;
        assert_eq!(grants.load(Ordering::SeqCst), 1);

        // startup token expires in 30s, inside the margin
        let track = spotify.search_by_isrc(&isrc()).await?;
        assert_eq!(track.title, "tok-2");
        assert_eq!(grants.load(Ordering::SeqCst), 2);

        // refreshed token is fresh, so no further grants
        let track = spotify.search_by_isrc(&isrc()).await?;
        assert_eq!(track.title, "tok-2");
        assert_eq!(grants.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_searches_share_one_refresh() -> Result<(), ServiceError> {
        let (cfg, grants) = stub_spotify().await;
        let spotify = SpotifyClient::connect(&HttpConfig::default(), &cfg).await?;
        let id = isrc();

        let (a, b, c, d) = tokio::join!(
            spotify.search_by_isrc(&id),
            spotify.search_by_isrc(&id),
            spotify.search_by_isrc(&id),
            spotify.search_by_isrc(&id),
        );
        for found in [a?, b?, c?, d?] {
            assert_eq!(found.title, "tok-2");
        }
        assert_eq!(grants.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn spotify_isrc_testbench() -> Result<(), ServiceError> {
        dotenvy::dotenv().ok();

        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = crate::config::load_config()?;
        let spotify = SpotifyClient::connect(&cfgs.http, &cfgs.spotify).await?;

        let track = spotify.search_by_isrc(&Isrc::parse("AUUM71900929")?).await?;
        println!("track: {track:?}");
        assert!(!track.title.is_empty());

        Ok(())
    }
}
