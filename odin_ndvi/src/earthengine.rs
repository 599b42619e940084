/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! client for the Earth Engine REST API (https://developers.google.com/earth-engine/reference/rest).
//! We only use `value:compute` and `maps` - everything else happens inside of the expressions

use std::{env, fs, path::{Path,PathBuf}};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode, header::{HeaderValue, ACCEPT}};
use serde::{Serialize, Deserialize, de::DeserializeOwned};
use serde_json::{json, Value as JsonValue};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tracing::{debug, info};

use crate::{
    engine::{GeoEngine, MapLayer},
    errors::{OdinNdviError, Result, engine_error},
    expr::{Expression, Image},
    region::Bounds,
    vis::VisParams,
};

pub const DEFAULT_BASE_URI: &str = "https://earthengine.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EE_SCOPES: &str = "https://www.googleapis.com/auth/earthengine https://www.googleapis.com/auth/cloud-platform";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct EarthEngineConfig {
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    pub project_id: String,
    #[serde(default)]
    pub credentials: Credentials,
}

fn default_base_uri()->String { DEFAULT_BASE_URI.to_string() }

#[derive(Deserialize,Serialize,Debug,Clone,Default)]
pub enum Credentials {
    /// service account key file from $GOOGLE_APPLICATION_CREDENTIALS
    #[default]
    ApplicationDefault,

    ServiceAccount { key_file: PathBuf },

    /// a pre-acquired OAuth2 bearer token (e.g. `gcloud auth print-access-token`)
    AccessToken { token: String },
}

/// the parts of a Google service account JSON key we need
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri()->String { DEFAULT_TOKEN_URI.to_string() }

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ComputeResponse {
    result: JsonValue,
}

#[derive(Deserialize)]
struct MapResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// what users have to check if the engine rejects our credentials
pub fn auth_remediation (project_id: &str)->String {
    format!("check that the configured credentials are valid, that the account is registered for Earth Engine and \
             has the 'Earth Engine Resource Viewer' (or higher) role in project '{project_id}', \
             and that the Earth Engine API is enabled for this project")
}

/// an authenticated Earth Engine connection. The bearer token is obtained once in `connect(..)`
pub struct EarthEngine {
    client: Client,
    config: EarthEngineConfig,
    access_token: String,
}

impl EarthEngine {

    pub async fn connect (config: EarthEngineConfig)->Result<Self> {
        let client = Client::new();

        let access_token = match &config.credentials {
            Credentials::AccessToken{token} => token.clone(),
            Credentials::ServiceAccount{key_file} => service_account_token( &client, key_file, &config.project_id).await?,
            Credentials::ApplicationDefault => {
                let key_file = env::var("GOOGLE_APPLICATION_CREDENTIALS")
                    .map_err( |_| OdinNdviError::AuthError( format!("no credentials configured and GOOGLE_APPLICATION_CREDENTIALS not set - {}", auth_remediation( &config.project_id))))?;
                service_account_token( &client, Path::new(&key_file), &config.project_id).await?
            }
        };

        info!("Earth Engine session for project {} established", config.project_id);
        Ok( EarthEngine { client, config, access_token } )
    }

    /// create a session without authentication round trip (e.g. for a token that is known to be valid)
    pub fn with_token (config: EarthEngineConfig, access_token: impl ToString)->Self {
        Self::with_client( Client::new(), config, access_token)
    }

    /// same as `with_token` but with a caller configured http client (proxies, timeouts)
    pub fn with_client (client: Client, config: EarthEngineConfig, access_token: impl ToString)->Self {
        EarthEngine { client, config, access_token: access_token.to_string() }
    }

    pub fn config (&self)->&EarthEngineConfig { &self.config }

    pub fn project_uri (&self, method: &str)->String {
        format!("{}/v1/projects/{}/{}", self.config.base_uri, self.config.project_id, method)
    }

    pub fn tile_url_template (&self, map_name: &str)->String {
        format!("{}/v1/{}/tiles/{{z}}/{{x}}/{{y}}", self.config.base_uri, map_name)
    }

    async fn post<B,R> (&self, uri: &str, body: &B)->Result<R> where B: Serialize, R: DeserializeOwned {
        debug!("POST {}", uri);
        let response = self.client.post(uri)
            .bearer_auth( &self.access_token)
            .header( ACCEPT, HeaderValue::from_str("application/json")?)
            .header( "x-goog-user-project", HeaderValue::from_str( &self.config.project_id)?)
            .json(body)
            .send()
            .await?;

        let response = check_response( response, &self.config.project_id).await?;
        Ok( response.json::<R>().await? )
    }
}

/// body of a `maps` request for a single band with a palette
pub fn map_request (expr: &Expression, band: &str, vis: &VisParams)->Result<JsonValue> {
    Ok( json!({
        "expression": expr,
        "fileFormat": "PNG",
        "bandIds": [ band ],
        "visualizationOptions": {
            "ranges": [ { "min": vis.min, "max": vis.max } ],
            "paletteColors": vis.hex_palette()?
        }
    }))
}

#[async_trait]
impl GeoEngine for EarthEngine {
    fn name (&self)->&str { "earthengine" }

    async fn compute_value (&self, expr: &Expression)->Result<JsonValue> {
        let uri = self.project_uri("value:compute");
        let response: ComputeResponse = self.post( &uri, &json!({ "expression": expr })).await?;
        Ok( response.result )
    }

    async fn create_map (&self, image: &Image, band: &str, vis: &VisParams, _bounds: &Bounds)->Result<MapLayer> {
        let uri = self.project_uri("maps");
        let body = map_request( &image.to_expression(), band, vis)?;
        let response: MapResponse = self.post( &uri, &body).await?;
        Ok( MapLayer::Tiles { url_template: self.tile_url_template( &response.name) } )
    }
}

async fn service_account_token (client: &Client, key_file: &Path, project_id: &str)->Result<String> {
    let key: ServiceAccountKey = serde_json::from_slice( &fs::read(key_file)?)?;

    let iat = Utc::now().timestamp();
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: EE_SCOPES,
        aud: &key.token_uri,
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    };
    let assertion = encode( &Header::new( Algorithm::RS256), &claims, &EncodingKey::from_rsa_pem( key.private_key.as_bytes())?)?;

    let response = client.post( &key.token_uri)
        .form( &[ ("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str()) ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let msg = response.text().await.unwrap_or_default();
        return Err( OdinNdviError::AuthError( format!("token request for {} failed ({}): {} - {}", key.client_email, status, msg, auth_remediation(project_id))))
    }

    let token: TokenResponse = response.json().await?;
    debug!("obtained access token for {}", key.client_email);
    Ok( token.access_token )
}

async fn check_response (response: Response, project_id: &str)->Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response)
    }

    let body = response.text().await.unwrap_or_default();
    let msg = error_message( &body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err( OdinNdviError::AuthError( format!("{} ({}) - {}", msg, status, auth_remediation(project_id))))
        }
        _ => Err( engine_error!("{} ({})", msg, status))
    }
}

/// extract the message of a Google API error body, falling back to the raw body
pub fn error_message (body: &str)->String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(er) => match er.error.status {
            Some(status) => format!("{}: {}", status, er.error.message),
            None => er.error.message
        }
        Err(_) => body.trim().to_string()
    }
}
