//!
//! src/docs.rs
//!
//! Static OpenAPI 3 description of the HTTP surface, served as json
//!

use serde_json::{json, Value};

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
    })
}

fn track_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/TrackDetails" } } }
    })
}

fn isrc_param() -> Value {
    json!({
        "name": "isrc", "in": "path", "required": true,
        "description": "ISRC code of the track",
        "schema": { "type": "string", "example": "US1234567890" }
    })
}

pub fn openapi() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Track lookup service",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Looks up track metadata by ISRC or artist, caching Spotify results in a local store."
        },
        "paths": {
            "/track/{isrc}": {
                "get": {
                    "summary": "Get track details by ISRC",
                    "description": "Reads the local store, falling back to Spotify and storing the result.",
                    "operationId": "get-track-by-isrc",
                    "parameters": [isrc_param()],
                    "responses": {
                        "200": track_response("Track details"),
                        "400": error_response("Malformed ISRC"),
                        "404": error_response("Track not found"),
                        "500": error_response("Store failure"),
                        "502": error_response("Catalog failure")
                    }
                },
                "put": {
                    "summary": "Update a track by ISRC",
                    "operationId": "update-track",
                    "parameters": [isrc_param()],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/UpdateTrack" } } }
                    },
                    "responses": {
                        "200": track_response("Updated track details"),
                        "400": error_response("Invalid request body"),
                        "404": error_response("Track not found"),
                        "500": error_response("Store failure")
                    }
                }
            },
            "/track/artist/{artistName}": {
                "get": {
                    "summary": "Search stored tracks by artist name",
                    "operationId": "search-track-by-artist",
                    "parameters": [{
                        "name": "artistName", "in": "path", "required": true,
                        "description": "Exact artist name",
                        "schema": { "type": "string" }
                    }],
                    "responses": {
                        "200": {
                            "description": "Matching tracks",
                            "content": { "application/json": { "schema": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/TrackDetails" }
                            } } }
                        },
                        "404": error_response("No tracks found for the artist")
                    }
                }
            },
            "/track": {
                "post": {
                    "summary": "Create a track",
                    "description": "Returns the stored track, or fetches it from Spotify and stores it.",
                    "operationId": "create-track",
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CreateTrack" } } }
                    },
                    "responses": {
                        "200": track_response("Existing track details"),
                        "201": {
                            "description": "Track record created",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/CreatedTrack" } } }
                        },
                        "400": error_response("Invalid request body"),
                        "404": error_response("Track not found"),
                        "500": error_response("Store failure"),
                        "502": error_response("Catalog failure")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "TrackDetails": {
                    "type": "object",
                    "required": ["isrc", "title", "artist_name", "spotify_image"],
                    "properties": {
                        "isrc": { "type": "string" },
                        "title": { "type": "string" },
                        "artist_name": { "type": "string" },
                        "spotify_image": { "type": "string", "format": "uri" }
                    }
                },
                "CreateTrack": {
                    "type": "object",
                    "required": ["isrc"],
                    "additionalProperties": false,
                    "properties": {
                        "isrc": { "type": "string" },
                        "title": { "type": "string" },
                        "artist_name": { "type": "string" },
                        "spotify_image": { "type": "string" }
                    }
                },
                "UpdateTrack": {
                    "type": "object",
                    "required": ["title", "artist_name", "spotify_image"],
                    "additionalProperties": false,
                    "properties": {
                        "isrc": { "type": "string", "description": "Must match the path if given" },
                        "title": { "type": "string" },
                        "artist_name": { "type": "string" },
                        "spotify_image": { "type": "string" }
                    }
                },
                "CreatedTrack": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "track": { "$ref": "#/components/schemas/TrackDetails" }
                    }
                },
                "Error": {
                    "type": "object",
                    "properties": { "error": { "type": "string" } }
                }
            }
        }
    })
}
