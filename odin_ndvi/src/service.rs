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

//! the web front of the tool. Everything is served under `/ndvi`:
//!
//!    GET  /ndvi                               the page (form + Cesium map)
//!    GET  /ndvi/asset/{file}                  page scripts and styles
//!    GET  /ndvi/states                        sorted state names
//!    GET  /ndvi/districts?state=..            sorted district names of a state
//!    GET  /ndvi/region?state=..&district=..   district outline as GeoJSON Feature
//!    GET  /ndvi/years                         year input bounds
//!    POST /ndvi/trend                         run a trend request
//!    GET  /ndvi/layer/{id}                    PNG of in-memory map layers
//!
//! Failures are returned as `{kind, message}` JSON with a status that corresponds to the error kind

use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use geojson::Feature;
use lazy_static::lazy_static;
use serde::{Serialize,Deserialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, error};

use crate::{
    engine::{EngineSession, MapLayer},
    errors::{OdinNdviError, Result, invalid_input},
    region::{Bounds, RegionSelection, RegionTable},
    trend::{TrendConfig, compute_trend, render_trend},
    vis::VisParams,
};

lazy_static! {
    /// file name -> (content type, contents)
    static ref ASSETS: HashMap<&'static str, (&'static str, &'static str)> = HashMap::from([
        ("ndvi.html", ("text/html; charset=utf-8", include_str!("../assets/ndvi.html"))),
        ("ndvi.js", ("text/javascript", include_str!("../assets/ndvi.js"))),
        ("ndvi.css", ("text/css", include_str!("../assets/ndvi.css"))),
    ]);
}

#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct ServerConfig {
    pub sock_addr: SocketAddr,
}

impl ServerConfig {
    pub fn url (&self)->String {
        format!("http://{}", self.sock_addr)
    }
}

/// what handlers share. All of it is read-only once the server runs
#[derive(Clone)]
pub struct NdviState {
    pub table: Arc<RegionTable>,
    pub session: EngineSession,
    pub trend: Arc<TrendConfig>,
    pub vis: Arc<VisParams>,
}

impl NdviState {
    pub fn new (table: RegionTable, session: EngineSession, trend: TrendConfig, vis: VisParams)->Self {
        NdviState { table: Arc::new(table), session, trend: Arc::new(trend), vis: Arc::new(vis) }
    }
}

/* #region request/response types ***********************************************************************/

#[derive(Deserialize,Debug,Default)]
pub struct StateQuery {
    pub state: Option<String>,
}

#[derive(Deserialize,Debug,Default)]
pub struct RegionQuery {
    pub state: Option<String>,
    pub district: Option<String>,
}

/// all fields are optional so that missing form values are reported as input errors
#[derive(Deserialize,Serialize,Debug,Clone,Default)]
pub struct TrendRequest {
    pub state: Option<String>,
    pub district: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
pub struct YearsResponse {
    pub min_year: i32,
    pub max_year: i32,
    pub min_span: i32,
    pub start_max: i32,
}

#[derive(Serialize,Debug,Clone)]
pub struct TrendResponse {
    pub region: Feature,
    pub bounds: Bounds,
    pub center: [f64;2],
    pub layer: MapLayer,
    pub vis: VisParams,
    pub has_data: bool,
    pub years_used: Vec<i32>,
    pub years_skipped: Vec<i32>,
}

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
}

impl IntoResponse for OdinNdviError {
    fn into_response (self)->Response {
        let kind = self.kind();
        let status = match kind {
            "input" => StatusCode::BAD_REQUEST,
            "auth" => StatusCode::FORBIDDEN,
            "engine" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR
        };
        let message = self.to_string();

        match kind {
            "input" => info!("rejected request: {}", message),
            "internal" => error!("request failed: {}", message),
            _ => warn!("request failed: {}", message)
        }

        (status, Json( ErrorResponse { kind: kind.to_string(), message })).into_response()
    }
}

/* #endregion request/response types */

pub fn router (state: NdviState)->Router {
    Router::new()
        .route( "/ndvi", get( page_handler))
        .route( "/ndvi/asset/{file}", get( asset_handler))
        .route( "/ndvi/states", get( states_handler))
        .route( "/ndvi/districts", get( districts_handler))
        .route( "/ndvi/region", get( region_handler))
        .route( "/ndvi/years", get( years_handler))
        .route( "/ndvi/trend", post( trend_handler))
        .route( "/ndvi/layer/{id}", get( layer_handler))
        .layer( TraceLayer::new_for_http())
        .with_state( state)
}

pub async fn serve (config: &ServerConfig, router: Router)->Result<()> {
    let listener = tokio::net::TcpListener::bind( config.sock_addr).await?;
    info!("serving NDVI trends on {}/ndvi", config.url());
    axum::serve( listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// the trend action: validate the form values, compute the slope and create its map layer.
/// Nothing is returned unless all steps succeed
pub async fn run_trend (state: &NdviState, req: TrendRequest)->Result<TrendResponse> {
    let table = state.table.as_ref();

    let mut selection = RegionSelection::new();
    selection.select_state( table, req.state.as_deref().unwrap_or_default())?;
    selection.select_district( table, req.district.as_deref().unwrap_or_default())?;
    let region = selection.region( table)?;

    let start = req.start_year.ok_or_else( || invalid_input!("please select a start year"))?;
    let end = req.end_year.ok_or_else( || invalid_input!("please select an end year"))?;
    let years = state.trend.year_bounds().validate( start, end)?;

    info!("computing NDVI trend for {}/{} {}-{} on {}", region.state(), region.district(), start, end, state.session.engine().name());
    let result = compute_trend( &state.session, &state.trend, &region, years).await?;
    let layer = render_trend( &state.session, &result, &region, &state.vis).await?;

    let bounds = region.bounds();
    Ok( TrendResponse {
        region: region.to_feature(),
        bounds,
        center: bounds.center(),
        layer,
        vis: state.vis.as_ref().clone(),
        has_data: result.has_data(),
        years_used: result.years_used,
        years_skipped: result.years_skipped,
    })
}

/* #region handlers *************************************************************************************/

async fn page_handler ()->Response {
    asset_response( "ndvi.html")
}

async fn asset_handler (Path(file): Path<String>)->Response {
    asset_response( &file)
}

fn asset_response (file: &str)->Response {
    match ASSETS.get(file) {
        Some((content_type, contents)) => ([(header::CONTENT_TYPE, *content_type)], *contents).into_response(),
        None => (StatusCode::NOT_FOUND, "asset not found").into_response()
    }
}

async fn states_handler (State(state): State<NdviState>)->Json<Vec<String>> {
    Json( state.table.states().into_iter().map( str::to_string).collect())
}

/// an unknown state has no districts
async fn districts_handler (State(state): State<NdviState>, Query(q): Query<StateQuery>)->Result<Json<Vec<String>>> {
    let s = q.state.ok_or_else( || invalid_input!("missing 'state' parameter"))?;
    Ok( Json( state.table.districts( &s).into_iter().map( str::to_string).collect()))
}

async fn region_handler (State(state): State<NdviState>, Query(q): Query<RegionQuery>)->Result<Json<Feature>> {
    let table = state.table.as_ref();
    let mut selection = RegionSelection::new();
    selection.select_state( table, q.state.as_deref().unwrap_or_default())?;
    selection.select_district( table, q.district.as_deref().unwrap_or_default())?;
    Ok( Json( selection.region( table)?.to_feature()))
}

async fn years_handler (State(state): State<NdviState>)->Json<YearsResponse> {
    let yb = state.trend.year_bounds();
    Json( YearsResponse { min_year: yb.min_year, max_year: yb.max_year, min_span: yb.min_span, start_max: *yb.start_range().end() })
}

async fn trend_handler (State(state): State<NdviState>, payload: std::result::Result<Json<TrendRequest>, JsonRejection>)->Result<Json<TrendResponse>> {
    // body errors get the same {kind,message} response as all other input errors
    let Json(req) = payload.map_err( |e| invalid_input!("invalid trend request: {}", e.body_text()))?;
    Ok( Json( run_trend( &state, req).await?))
}

async fn layer_handler (State(state): State<NdviState>, Path(id): Path<String>)->Response {
    match state.session.engine().layer_png( &id) {
        Some(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown layer").into_response()
    }
}

/* #endregion handlers */
