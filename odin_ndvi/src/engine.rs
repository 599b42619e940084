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

use std::{fmt, sync::Arc};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Serialize,Deserialize};
use serde_json::Value as JsonValue;

use crate::{
    errors::{Result,engine_error},
    expr::{Expression, Image, ImageCollection},
    region::Bounds,
    vis::VisParams,
};

/// what a map renderer needs to display a computed raster
#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MapLayer {
    /// XYZ tiles served by the remote engine, `url_template` contains {z}, {x} and {y}
    #[serde(rename_all = "camelCase")]
    Tiles { url_template: String },

    /// a single PNG that is kept by the engine and covers `bounds`
    #[serde(rename_all = "camelCase")]
    Image { id: String, bounds: Bounds },
}

/// the remote geospatial engine seam. Implementors evaluate `expr` graphs - they are not expected
/// to do any local computation besides (de)serialization
#[async_trait]
pub trait GeoEngine: Send + Sync {
    fn name (&self)->&str;

    async fn compute_value (&self, expr: &Expression)->Result<JsonValue>;

    async fn create_map (&self, image: &Image, band: &str, vis: &VisParams, bounds: &Bounds)->Result<MapLayer>;

    async fn collection_size (&self, coll: &ImageCollection)->Result<u64> {
        let v = self.compute_value( &coll.size().to_expression()).await?;
        v.as_u64()
            .or_else( || v.as_f64().filter( |n| *n >= 0.0).map( |n| n as u64))
            .ok_or_else( || engine_error!("collection size is not a number: {}", v))
    }

    /// image data of `MapLayer::Image` layers. Engines that only produce tiles have none
    fn layer_png (&self, _id: &str)->Option<Bytes> { None }
}

/// the explicit, process wide handle for an authenticated engine. Acquired once at startup, cloned
/// into each request and dropped at shutdown. There is no re-initialization
#[derive(Clone)]
pub struct EngineSession {
    engine: Arc<dyn GeoEngine>,
}

impl EngineSession {
    pub fn new (engine: impl GeoEngine + 'static)->Self {
        EngineSession { engine: Arc::new(engine) }
    }

    pub fn engine (&self)->&dyn GeoEngine {
        self.engine.as_ref()
    }
}

impl fmt::Debug for EngineSession {
    fn fmt (&self, f: &mut fmt::Formatter<'_>)->fmt::Result {
        write!( f, "EngineSession({})", self.engine.name())
    }
}
