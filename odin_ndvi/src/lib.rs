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

//! crate to compute and display per pixel NDVI trends of administrative districts from yearly
//! Sentinel-2 composites. The raster work is done by a remote engine (Earth Engine), this crate
//! only builds the requests, selects regions and serves the map UI

use std::{fs, path::Path};
use serde::{Serialize, Deserialize, de::DeserializeOwned};

pub mod errors;
use errors::Result;

pub mod years;
pub use years::*;

pub mod region;
pub use region::*;

pub mod expr;

pub mod vis;
pub use vis::VisParams;

pub mod engine;
pub use engine::{EngineSession, GeoEngine, MapLayer};

pub mod earthengine;
pub use earthengine::{Credentials, EarthEngine, EarthEngineConfig};

pub mod mem_engine;
pub use mem_engine::{GridSpec, MemEngine, MemImage, SceneCatalog};

pub mod trend;
pub use trend::{TrendConfig, TrendResult, compute_trend, render_trend};

pub mod service;

/// the configuration of a `ndvi_server` installation
#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct NdviConfig {
    pub server: service::ServerConfig,
    pub boundaries: BoundaryConfig,
    pub engine: EarthEngineConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub vis: VisParams,
}

impl NdviConfig {
    /// load and check a server config. Bad trend settings are rejected here, before anything is served
    pub fn load<P: AsRef<Path>> (path: P)->Result<Self> {
        let config: NdviConfig = load_config( path)?;
        config.trend.check()?;
        Ok( config )
    }
}

pub fn load_config<T,P> (path: P)->Result<T> where T: DeserializeOwned, P: AsRef<Path> {
    let contents = fs::read_to_string( path.as_ref())?;
    Ok( ron::from_str::<T>( &contents)? )
}
