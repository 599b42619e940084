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

use axum::{Json, Router, extract::Path, http::{HeaderMap, StatusCode, header}, routing::post};
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;
use odin_ndvi::{
    Credentials, EarthEngine, EarthEngineConfig, GeoEngine, VisParams,
    earthengine::{auth_remediation, error_message, map_request, DEFAULT_BASE_URI},
    errors::OdinNdviError,
    expr::Image,
};

fn config ()->EarthEngineConfig {
    EarthEngineConfig {
        base_uri: DEFAULT_BASE_URI.to_string(),
        project_id: "ndvi-test".to_string(),
        credentials: Credentials::AccessToken { token: "ya29.test".to_string() },
    }
}

#[test]
fn test_uris () {
    let ee = EarthEngine::with_token( config(), "ya29.test");

    assert_eq!( ee.project_uri("value:compute"), "https://earthengine.googleapis.com/v1/projects/ndvi-test/value:compute");
    assert_eq!( ee.tile_url_template("projects/ndvi-test/maps/abc123"),
                "https://earthengine.googleapis.com/v1/projects/ndvi-test/maps/abc123/tiles/{z}/{x}/{y}");
}

#[test]
fn test_map_request () {
    let image = Image::constant(0.0).rename( &["scale"]);
    let body = map_request( &image.to_expression(), "scale", &VisParams::default()).unwrap();
    println!("{}", serde_json::to_string_pretty( &body).unwrap());

    assert_eq!( body["fileFormat"], "PNG");
    assert_eq!( body["bandIds"], json!(["scale"]));
    assert_eq!( body["visualizationOptions"]["ranges"], json!([{ "min": -0.05, "max": 0.05 }]));
    assert_eq!( body["visualizationOptions"]["paletteColors"], json!(["ff0000", "ffffff", "008000"]));
    assert_eq!( body["expression"]["result"], "0");

    let bad_vis = VisParams { min: 1.0, max: -1.0, palette: vec!["red".to_string()] };
    assert!( map_request( &image.to_expression(), "scale", &bad_vis).is_err());
}

#[test]
fn test_error_message () {
    let body = r#"{ "error": { "code": 403, "message": "Permission denied on project ndvi-test", "status": "PERMISSION_DENIED" } }"#;
    assert_eq!( error_message(body), "PERMISSION_DENIED: Permission denied on project ndvi-test");

    let body = r#"{ "error": { "code": 400, "message": "Band 'scale' not found" } }"#;
    assert_eq!( error_message(body), "Band 'scale' not found");

    assert_eq!( error_message(" upstream connect error \n"), "upstream connect error");
}

#[test]
fn test_auth_error () {
    let e = OdinNdviError::AuthError( format!("token expired - {}", auth_remediation("ndvi-test")));
    println!("{e}");
    assert_eq!( e.kind(), "auth");
    assert!( e.to_string().contains("ndvi-test"));
    assert!( e.to_string().contains("Earth Engine"));
}

#[test]
fn test_config_ron () {
    let cfg: EarthEngineConfig = ron::from_str( r#"EarthEngineConfig( project_id: "p1", credentials: ServiceAccount( key_file: "/tmp/key.json"))"#).unwrap();
    assert_eq!( cfg.base_uri, DEFAULT_BASE_URI);
    assert!( matches!( cfg.credentials, Credentials::ServiceAccount{..}));

    let cfg: EarthEngineConfig = ron::from_str( r#"( project_id: "p2" )"#).unwrap();
    assert!( matches!( cfg.credentials, Credentials::ApplicationDefault));
}

#[tokio::test]
async fn test_missing_key_file () {
    let cfg = EarthEngineConfig {
        credentials: Credentials::ServiceAccount { key_file: "resources/no_such_key.json".into() },
        ..config()
    };
    let res = EarthEngine::connect( cfg).await;
    assert!( res.is_err());
}

/// stand-in for the REST endpoint. The project id selects the answer
async fn fake_compute (Path((project, method)): Path<(String,String)>, headers: HeaderMap)->(StatusCode, Json<JsonValue>) {
    let google_error = |code: u16, status: &str, msg: &str| json!({ "error": { "code": code, "message": msg, "status": status } });
    match project.as_str() {
        "denied" => (StatusCode::FORBIDDEN, Json( google_error( 403, "PERMISSION_DENIED", "Earth Engine API has not been used in project denied"))),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, Json( google_error( 500, "INTERNAL", "computation timed out"))),
        _ => {
            let authorized = headers.get( header::AUTHORIZATION).and_then( |v| v.to_str().ok()) == Some("Bearer ya29.test");
            if method == "value:compute" && authorized {
                (StatusCode::OK, Json( json!({ "result": 42 })))
            } else {
                (StatusCode::BAD_REQUEST, Json( google_error( 400, "INVALID_ARGUMENT", "unexpected request")))
            }
        }
    }
}

async fn start_fake_server ()->String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route( "/v1/projects/{project}/{method}", post( fake_compute));
    tokio::spawn( async move { axum::serve( listener, router).await.unwrap() });
    format!("http://{addr}")
}

fn local_engine (base_uri: &str, project_id: &str)->EarthEngine {
    let cfg = EarthEngineConfig { base_uri: base_uri.to_string(), project_id: project_id.to_string(), ..config() };
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    EarthEngine::with_client( client, cfg, "ya29.test")
}

// run with "cargo test --test test_earthengine -- --nocapture"
#[tokio::test]
async fn test_http_errors () {
    let base_uri = start_fake_server().await;
    let expr = Image::constant(1.0).to_expression();

    let v = local_engine( &base_uri, "ok").compute_value( &expr).await.unwrap();
    assert_eq!( v, json!(42));

    let e = local_engine( &base_uri, "denied").compute_value( &expr).await.unwrap_err();
    println!("403: {e}");
    assert_eq!( e.kind(), "auth");
    assert!( e.to_string().contains("PERMISSION_DENIED: Earth Engine API has not been used"));
    assert!( e.to_string().contains( &auth_remediation("denied")));

    let e = local_engine( &base_uri, "broken").compute_value( &expr).await.unwrap_err();
    println!("500: {e}");
    assert_eq!( e.kind(), "engine");
    assert!( e.to_string().contains("INTERNAL: computation timed out"));
}
