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

use std::path::Path;
use async_trait::async_trait;
use axum::{Router, body::Body, http::{Request, StatusCode, header}};
use http_body_util::BodyExt;
use ndarray::Array2;
use serde_json::{json, Value as JsonValue};
use chrono::NaiveDate;
use tower::ServiceExt; // for oneshot
use odin_ndvi::{
    load_config, BoundaryConfig, EngineSession, GeoEngine, GridSpec, MapLayer, MemEngine, MemImage, NdviConfig,
    RegionTable, SceneCatalog, TrendConfig, VisParams, Credentials,
    errors::{OdinNdviError, Result},
    expr::{Expression, Image},
    region::Bounds,
    service::{self, NdviState, ErrorResponse},
    trend::S2_COLLECTION,
};

fn sample_table ()->RegionTable {
    RegionTable::load( &BoundaryConfig::new("resources/districts_sample.geojson")).unwrap()
}

fn mandya_catalog ()->SceneCatalog {
    let grid = GridSpec::new( 76.9, 12.6, 0.02, 20, 10);
    let mut catalog = SceneCatalog::new( grid);
    for (i,y) in (2018..=2022).enumerate() {
        let band = |v: f64| Array2::from_elem( grid.shape(), v);
        let scene = MemImage::new()
            .with_band( "B2", band(400.0))
            .with_band( "B3", band(700.0))
            .with_band( "B4", band(1000.0))
            .with_band( "B8", band(3000.0 + 100.0 * i as f64))
            .with_property( "CLOUDY_PIXEL_PERCENTAGE", 3.0);
        catalog.add_scene( S2_COLLECTION, NaiveDate::from_ymd_opt( y, 7, 1).unwrap(), scene).unwrap();
    }
    catalog
}

fn app_with (engine: impl GeoEngine + 'static)->Router {
    let state = NdviState::new( sample_table(), EngineSession::new( engine), TrendConfig::default(), VisParams::default());
    service::router( state)
}

fn app ()->Router {
    app_with( MemEngine::new( mandya_catalog()))
}

async fn get (app: Router, uri: &str)->(StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body( Body::empty()).unwrap();
    let response = app.oneshot( request).await.unwrap();
    let status = response.status();
    (status, response.into_body().collect().await.unwrap().to_bytes().to_vec())
}

async fn post_json (app: Router, uri: &str, body: JsonValue)->(StatusCode, JsonValue) {
    post_text( app, uri, body.to_string()).await
}

/// post a body that does not have to be valid JSON. The response has to be JSON anyways
async fn post_text (app: Router, uri: &str, body: String)->(StatusCode, JsonValue) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header( header::CONTENT_TYPE, "application/json")
        .body( Body::from( body))
        .unwrap();
    let response = app.oneshot( request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice( &bytes).unwrap())
}

fn json_of (bytes: &[u8])->JsonValue {
    serde_json::from_slice( bytes).unwrap()
}

// run with "cargo test --test test_service -- --nocapture"
#[tokio::test]
async fn test_lookups () {
    let (status, body) = get( app(), "/ndvi/states").await;
    assert_eq!( status, StatusCode::OK);
    assert_eq!( json_of( &body), json!(["Karnataka", "Maharashtra"]));

    let (status, body) = get( app(), "/ndvi/districts?state=Karnataka").await;
    assert_eq!( status, StatusCode::OK);
    assert_eq!( json_of( &body), json!(["Hassan", "Mandya"]));

    let (status, body) = get( app(), "/ndvi/districts?state=Kerala").await;
    assert_eq!( status, StatusCode::OK);
    assert_eq!( json_of( &body), json!([]));

    let (status, body) = get( app(), "/ndvi/districts").await;
    assert_eq!( status, StatusCode::BAD_REQUEST);
    assert_eq!( json_of( &body)["kind"], "input");
}

#[tokio::test]
async fn test_region () {
    let (status, body) = get( app(), "/ndvi/region?state=Maharashtra&district=Pune").await;
    assert_eq!( status, StatusCode::OK);
    let feature = json_of( &body);
    assert_eq!( feature["type"], "Feature");
    assert_eq!( feature["properties"]["district"], "Pune");

    let (status, body) = get( app(), "/ndvi/region?state=Karnataka&district=Pune").await;
    let err: ErrorResponse = serde_json::from_slice( &body).unwrap();
    println!("expected error: {err:?}");
    assert_eq!( status, StatusCode::BAD_REQUEST);
    assert_eq!( err.kind, "input");
}

#[tokio::test]
async fn test_years () {
    let (status, body) = get( app(), "/ndvi/years").await;
    assert_eq!( status, StatusCode::OK);

    let years: service::YearsResponse = serde_json::from_slice( &body).unwrap();
    println!("{years:?}");
    assert_eq!( years.min_year, 2015);
    assert_eq!( years.min_span, 4);
    assert_eq!( years.start_max, years.max_year - 4);
}

#[tokio::test]
async fn test_page_and_assets () {
    let (status, body) = get( app(), "/ndvi").await;
    assert_eq!( status, StatusCode::OK);
    assert!( String::from_utf8_lossy( &body).contains("cesiumContainer"));

    let (status, _) = get( app(), "/ndvi/asset/ndvi.js").await;
    assert_eq!( status, StatusCode::OK);

    let (status, _) = get( app(), "/ndvi/asset/nope.js").await;
    assert_eq!( status, StatusCode::NOT_FOUND);
}

/// the page must not keep a previous trend layer once the selection changes or a new run starts
#[tokio::test]
async fn test_script_clears_trend () {
    let (status, body) = get( app(), "/ndvi/asset/ndvi.js").await;
    assert_eq!( status, StatusCode::OK);
    let script = String::from_utf8( body).unwrap();

    for listener in [r#"stateSelect.addEventListener("change""#, r#"districtSelect.addEventListener("change""#, r#"runButton.addEventListener("click""#] {
        let start = script.find( listener).unwrap();
        let handler = &script[start..];
        let handler = &handler[..handler.find("\n});").unwrap()];
        println!("{listener}: clears trend {}", handler.contains("clearTrend();"));
        assert!( handler.contains("clearTrend();"));
    }

    // the layer is only shown after a successful request
    let run = &script[script.find( r#"runButton.addEventListener("click""#).unwrap()..];
    let (before_catch, _) = run.split_once("} catch (e) {").unwrap();
    assert!( before_catch.find("clearTrend();").unwrap() < before_catch.find("showTrend(").unwrap());
}

#[tokio::test]
async fn test_trend () {
    let app = app();
    let req = json!({ "state": "Karnataka", "district": "Mandya", "start_year": 2018, "end_year": 2022 });
    let (status, body) = post_json( app.clone(), "/ndvi/trend", req).await;
    println!("{}", serde_json::to_string_pretty( &body).unwrap());

    assert_eq!( status, StatusCode::OK);
    assert_eq!( body["has_data"], true);
    assert_eq!( body["years_used"], json!([2018, 2019, 2020, 2021, 2022]));
    assert_eq!( body["region"]["properties"]["district"], "Mandya");
    assert_eq!( body["layer"]["type"], "image");
    assert_eq!( body["vis"]["palette"], json!(["red", "white", "green"]));

    let id = body["layer"]["id"].as_str().unwrap();
    let request = Request::builder().uri( format!("/ndvi/layer/{id}")).body( Body::empty()).unwrap();
    let response = app.oneshot( request).await.unwrap();
    assert_eq!( response.status(), StatusCode::OK);
    assert_eq!( response.headers()[header::CONTENT_TYPE], "image/png");

    let (status, _) = get( app_with( MemEngine::new( mandya_catalog())), "/ndvi/layer/layer-42").await;
    assert_eq!( status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trend_input_errors () {
    let requests = [
        json!({ "state": "Karnataka", "district": "Mandya", "start_year": 2018, "end_year": 2021 }), // span too short
        json!({ "state": "Karnataka", "district": "Mandya", "start_year": 2010, "end_year": 2020 }), // too early
        json!({ "state": "Karnataka", "district": "Pune", "start_year": 2018, "end_year": 2022 }),   // wrong state
        json!({ "state": "Select State", "district": "Mandya", "start_year": 2018, "end_year": 2022 }),
        json!({ "state": "Karnataka", "district": "Mandya" }),
        json!({}),
    ];

    for req in requests {
        let (status, body) = post_json( app(), "/ndvi/trend", req.clone()).await;
        println!("{req} -> {status}: {}", body["message"]);
        assert_eq!( status, StatusCode::BAD_REQUEST);
        assert_eq!( body["kind"], "input");
    }
}

#[tokio::test]
async fn test_malformed_trend_body () {
    let bodies = [
        "{not json",
        r#"{ "state": "Karnataka", "district": "Mandya", "start_year": "2018", "end_year": 2022 }"#,
        r#"[2018, 2022]"#,
        "",
    ];

    for body in bodies {
        let (status, response) = post_text( app(), "/ndvi/trend", body.to_string()).await;
        println!("{body:?} -> {status}: {}", response["message"]);
        assert_eq!( status, StatusCode::BAD_REQUEST);
        assert_eq!( response["kind"], "input");
        assert!( response["message"].as_str().unwrap().starts_with("invalid trend request"));
    }
}

/// an engine that rejects our credentials
struct UnauthorizedEngine;

#[async_trait]
impl GeoEngine for UnauthorizedEngine {
    fn name (&self)->&str { "unauthorized" }

    async fn compute_value (&self, _expr: &Expression)->Result<JsonValue> {
        Err( OdinNdviError::AuthError("caller does not have permission".to_string()))
    }

    async fn create_map (&self, _image: &Image, _band: &str, _vis: &VisParams, _bounds: &Bounds)->Result<MapLayer> {
        Err( OdinNdviError::AuthError("caller does not have permission".to_string()))
    }
}

/// an engine that fails to create maps
struct BrokenMapEngine(MemEngine);

#[async_trait]
impl GeoEngine for BrokenMapEngine {
    fn name (&self)->&str { "broken" }

    async fn compute_value (&self, expr: &Expression)->Result<JsonValue> {
        self.0.compute_value(expr).await
    }

    async fn create_map (&self, _image: &Image, _band: &str, _vis: &VisParams, _bounds: &Bounds)->Result<MapLayer> {
        Err( OdinNdviError::EngineError("computation timed out".to_string()))
    }
}

#[tokio::test]
async fn test_engine_errors () {
    let req = json!({ "state": "Karnataka", "district": "Mandya", "start_year": 2018, "end_year": 2022 });

    let (status, body) = post_json( app_with( UnauthorizedEngine), "/ndvi/trend", req.clone()).await;
    println!("{status}: {body}");
    assert_eq!( status, StatusCode::FORBIDDEN);
    assert_eq!( body["kind"], "auth");

    let (status, body) = post_json( app_with( BrokenMapEngine( MemEngine::new( mandya_catalog()))), "/ndvi/trend", req).await;
    println!("{status}: {body}");
    assert_eq!( status, StatusCode::BAD_GATEWAY);
    assert_eq!( body["kind"], "engine");
    assert!( body["message"].as_str().unwrap().contains("timed out"));
}

#[test]
fn test_config () {
    let config: NdviConfig = load_config( Path::new("configs/ndvi_server.ron")).unwrap();
    println!("{config:#?}");

    assert_eq!( config.server.sock_addr.port(), 9010);
    assert_eq!( config.boundaries.state_attr, "State");
    assert!( matches!( config.engine.credentials, Credentials::ApplicationDefault));
    assert_eq!( config.trend, TrendConfig::default());
    assert_eq!( config.vis, VisParams::default());
}

#[test]
fn test_config_checks () {
    let config = NdviConfig::load( "configs/ndvi_server.ron").unwrap();
    assert!( config.trend.check().is_ok());

    let bad = [
        TrendConfig { min_span: -2, ..TrendConfig::default() },
        TrendConfig { min_span: 0, ..TrendConfig::default() },
        TrendConfig { min_year: 2000, ..TrendConfig::default() },
        TrendConfig { max_cloud_pct: 0.0, ..TrendConfig::default() },
        TrendConfig { max_cloud_pct: 120.0, ..TrendConfig::default() },
        TrendConfig { collection_id: " ".to_string(), ..TrendConfig::default() },
    ];
    for trend in bad {
        let e = trend.check().unwrap_err();
        println!("{trend:?} -> {e}");
        assert_eq!( e.kind(), "input");
    }

    // the same has to be caught when loading the server config
    let src = std::fs::read_to_string( "configs/ndvi_server.ron").unwrap();
    let src = src.replace("min_span: 4", "min_span: -2");
    assert!( src.contains("min_span: -2"));
    let path = std::env::temp_dir().join( format!("ndvi_server_{}.ron", std::process::id()));
    std::fs::write( &path, src).unwrap();
    let res = NdviConfig::load( &path);
    let _ = std::fs::remove_file( &path);
    assert!( res.is_err());
}
