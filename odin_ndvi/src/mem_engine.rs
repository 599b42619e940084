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

//! an in-process `GeoEngine` that evaluates the expression graphs of this crate over an explicitly
//! populated `SceneCatalog`. All images of a catalog share one lon/lat grid, masked pixels are NaN.
//!
//! This is the reference against which we check request construction (e.g. in tests or without
//! network access). It only knows the functions we actually emit

use std::{collections::BTreeMap, sync::atomic::{AtomicU64, Ordering}};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveTime};
use dashmap::DashMap;
use ndarray::{Array2, Zip};
use regex::Regex;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use geo::{Contains, Intersects};
use geo_types::{MultiPolygon, Point};
use tracing::debug;

use crate::{
    engine::{GeoEngine, MapLayer},
    errors::{Result, engine_error, invalid_input},
    expr::{Expression, Image, Invocation, Value},
    region::{Bounds, multi_polygon_from_coordinates},
    vis::VisParams,
};

pub const TIME_START: &str = "system:time_start";

/* #region catalog **************************************************************************************/

/// regular lon/lat grid, row 0 is the northern edge
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct GridSpec {
    pub west: f64,
    pub north: f64,
    pub pixel_size: f64, // degrees
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    pub fn new (west: f64, north: f64, pixel_size: f64, width: usize, height: usize)->Self {
        GridSpec { west, north, pixel_size, width, height }
    }

    /// a grid that covers `bounds` with the given number of columns and rows
    pub fn covering (bounds: &Bounds, width: usize, height: usize)->Self {
        let pixel_size = ((bounds.east - bounds.west) / width as f64).max( (bounds.north - bounds.south) / height as f64);
        GridSpec { west: bounds.west, north: bounds.north, pixel_size, width, height }
    }

    pub fn shape (&self)->(usize,usize) { (self.height, self.width) }

    pub fn bounds (&self)->Bounds {
        Bounds {
            west: self.west,
            south: self.north - self.height as f64 * self.pixel_size,
            east: self.west + self.width as f64 * self.pixel_size,
            north: self.north,
        }
    }

    /// (lon,lat) of the pixel center
    pub fn pixel_center (&self, row: usize, col: usize)->(f64,f64) {
        ( self.west + (col as f64 + 0.5) * self.pixel_size, self.north - (row as f64 + 0.5) * self.pixel_size )
    }
}

/// evaluated image: named bands on the catalog grid plus metadata properties
#[derive(Debug,Clone,PartialEq,Default)]
pub struct MemImage {
    bands: Vec<(String,Array2<f64>)>,
    properties: BTreeMap<String,JsonValue>,
}

impl MemImage {
    pub fn new ()->Self { MemImage::default() }

    pub fn with_band (mut self, name: &str, data: Array2<f64>)->Self {
        self.bands.push( (name.to_string(), data));
        self
    }

    pub fn with_property (mut self, key: &str, v: impl Into<JsonValue>)->Self {
        self.properties.insert( key.to_string(), v.into());
        self
    }

    pub fn band_names (&self)->Vec<&str> {
        self.bands.iter().map( |(n,_)| n.as_str()).collect()
    }

    pub fn band (&self, name: &str)->Option<&Array2<f64>> {
        self.bands.iter().find( |(n,_)| n == name).map( |(_,d)| d)
    }

    pub fn n_bands (&self)->usize { self.bands.len() }

    pub fn property (&self, key: &str)->Option<&JsonValue> {
        self.properties.get(key)
    }

    fn to_json (&self)->JsonValue {
        let bands: Vec<JsonValue> = self.bands.iter().map( |(n,d)| {
            json!({ "id": n, "valid": d.iter().filter( |v| v.is_finite()).count() })
        }).collect();
        json!({ "type": "Image", "bands": bands, "properties": self.properties })
    }
}

/// the in-memory counterpart of the remote image catalog
#[derive(Debug,Clone)]
pub struct SceneCatalog {
    grid: GridSpec,
    scenes: Vec<(String,MemImage)>, // (collection id, scene)
}

impl SceneCatalog {
    pub fn new (grid: GridSpec)->Self {
        SceneCatalog { grid, scenes: Vec::new() }
    }

    pub fn grid (&self)->&GridSpec { &self.grid }

    pub fn len (&self)->usize { self.scenes.len() }

    pub fn is_empty (&self)->bool { self.scenes.is_empty() }

    /// add a scene acquired at `date` (00:00 UTC). The scene is tagged with its acquisition time
    pub fn add_scene (&mut self, collection: &str, date: NaiveDate, scene: MemImage)->Result<()> {
        let shape = self.grid.shape();
        if let Some((name,_)) = scene.bands.iter().find( |(_,d)| d.dim() != shape) {
            return Err( invalid_input!("band {} of scene {} does not match grid shape {:?}", name, date, shape))
        }

        let millis = date.and_time( NaiveTime::default()).and_utc().timestamp_millis();
        self.scenes.push( (collection.to_string(), scene.with_property( TIME_START, millis)));
        Ok(())
    }
}

/* #endregion catalog */

/* #region evaluation ***********************************************************************************/

#[derive(Debug,Clone)]
enum Obj {
    Constant(JsonValue),
    Array(Vec<Obj>),
    Geometry(MultiPolygon<f64>),
    Date(i64),
    DateRange(i64,i64),
    Filter(MemFilter),
    Reducer(MemReducer),
    Image(MemImage),
    Collection(Vec<MemImage>),
}

#[derive(Debug,Clone)]
enum MemFilter {
    Intersects(MultiPolygon<f64>),
    DateRange{ start: i64, end: i64, field: String },
    LessThan{ field: String, value: f64 },
}

#[derive(Debug,Clone,Copy)]
enum MemReducer { Median, LinearFit }

impl Obj {
    fn type_name (&self)->&'static str {
        match self {
            Obj::Constant(_) => "Constant",
            Obj::Array(_) => "Array",
            Obj::Geometry(_) => "Geometry",
            Obj::Date(_) => "Date",
            Obj::DateRange(..) => "DateRange",
            Obj::Filter(_) => "Filter",
            Obj::Reducer(_) => "Reducer",
            Obj::Image(_) => "Image",
            Obj::Collection(_) => "ImageCollection",
        }
    }
}

/// `GeoEngine` that evaluates expressions locally. Rendered map layers are kept in memory.
/// Each `create_map` call adds a new PNG and nothing is ever evicted, so a long running server
/// with this engine grows by one layer per trend request. Use it for tests and demos only
pub struct MemEngine {
    catalog: SceneCatalog,
    layers: DashMap<String,Bytes>,
    next_layer: AtomicU64,
}

impl MemEngine {
    pub fn new (catalog: SceneCatalog)->Self {
        MemEngine { catalog, layers: DashMap::new(), next_layer: AtomicU64::new(1) }
    }

    pub fn catalog (&self)->&SceneCatalog { &self.catalog }

    /// number of rendered layers held in memory
    pub fn n_layers (&self)->usize { self.layers.len() }

    pub fn evaluate_image (&self, image: &Image)->Result<MemImage> {
        let obj = self.eval( image.value())?;
        into_image( obj, "evaluate_image")
    }

    fn eval (&self, v: &Value)->Result<Obj> {
        match v {
            Value::Constant(c) => Ok( Obj::Constant( c.clone())),
            Value::Array(a) => Ok( Obj::Array( a.values.iter().map( |v| self.eval(v)).collect::<Result<Vec<Obj>>>()?)),
            Value::Invocation(inv) => self.invoke(inv)
        }
    }

    fn arg (&self, inv: &Invocation, name: &str)->Result<Obj> {
        let v = inv.arguments.get(name)
            .ok_or_else( || engine_error!("{}: missing argument '{}'", inv.function_name, name))?;
        self.eval(v)
    }

    fn invoke (&self, inv: &Invocation)->Result<Obj> {
        let f = inv.function_name.as_str();

        match f {
            "GeometryConstructors.MultiPolygon" => {
                let coords = into_constant( self.arg( inv, "coordinates")?, f)?;
                let coords: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(coords)
                    .map_err( |e| engine_error!("{}: invalid coordinates: {}", f, e))?;
                Ok( Obj::Geometry( multi_polygon_from_coordinates( &coords)))
            }

            "Date" => {
                match into_constant( self.arg( inv, "value")?, f)? {
                    JsonValue::String(s) => {
                        let date = NaiveDate::parse_from_str( &s, "%Y-%m-%d").map_err( |e| engine_error!("{}: invalid date '{}': {}", f, s, e))?;
                        Ok( Obj::Date( date.and_time( NaiveTime::default()).and_utc().timestamp_millis()))
                    }
                    JsonValue::Number(n) => Ok( Obj::Date( n.as_i64().unwrap_or_default())),
                    other => Err( engine_error!("{}: invalid date value {}", f, other))
                }
            }

            "DateRange" => {
                let start = into_date( self.arg( inv, "start")?, f)?;
                let end = into_date( self.arg( inv, "end")?, f)?;
                Ok( Obj::DateRange( start, end))
            }

            "Filter.intersects" => {
                let field = into_str( self.arg( inv, "leftField")?, f)?;
                if field != ".all" { return Err( engine_error!("{}: unsupported leftField '{}'", f, field)) }
                match self.arg( inv, "rightValue")? {
                    Obj::Geometry(g) => Ok( Obj::Filter( MemFilter::Intersects(g))),
                    other => Err( type_mismatch( f, "Geometry", &other))
                }
            }

            "Filter.dateRangeContains" => {
                let field = into_str( self.arg( inv, "rightField")?, f)?;
                match self.arg( inv, "leftValue")? {
                    Obj::DateRange(start,end) => Ok( Obj::Filter( MemFilter::DateRange{ start, end, field })),
                    other => Err( type_mismatch( f, "DateRange", &other))
                }
            }

            "Filter.lessThan" => {
                let field = into_str( self.arg( inv, "leftField")?, f)?;
                let value = into_f64( self.arg( inv, "rightValue")?, f)?;
                Ok( Obj::Filter( MemFilter::LessThan{ field, value }))
            }

            "Reducer.median" => Ok( Obj::Reducer( MemReducer::Median)),
            "Reducer.linearFit" => Ok( Obj::Reducer( MemReducer::LinearFit)),

            "ImageCollection.load" => {
                let id = into_str( self.arg( inv, "id")?, f)?;
                let images: Vec<MemImage> = self.catalog.scenes.iter()
                    .filter( |(c,_)| *c == id)
                    .map( |(_,img)| img.clone())
                    .collect();
                debug!("loaded {} scenes of {}", images.len(), id);
                Ok( Obj::Collection(images))
            }

            "ImageCollection.fromImages" => {
                match self.arg( inv, "images")? {
                    Obj::Array(objs) => {
                        let images = objs.into_iter().map( |o| into_image( o, f)).collect::<Result<Vec<MemImage>>>()?;
                        Ok( Obj::Collection(images))
                    }
                    other => Err( type_mismatch( f, "Array", &other))
                }
            }

            "Collection.filter" => {
                let images = into_collection( self.arg( inv, "collection")?, f)?;
                match self.arg( inv, "filter")? {
                    Obj::Filter(filter) => Ok( Obj::Collection( images.into_iter().filter( |img| self.matches( &filter, img)).collect())),
                    other => Err( type_mismatch( f, "Filter", &other))
                }
            }

            "Collection.size" => {
                let images = into_collection( self.arg( inv, "collection")?, f)?;
                Ok( Obj::Constant( json!( images.len())))
            }

            "ImageCollection.reduce" => {
                let images = into_collection( self.arg( inv, "collection")?, f)?;
                match self.arg( inv, "reducer")? {
                    Obj::Reducer(MemReducer::Median) => Ok( Obj::Image( self.reduce_median( &images)?)),
                    Obj::Reducer(MemReducer::LinearFit) => Ok( Obj::Image( self.reduce_linear_fit( &images)?)),
                    other => Err( type_mismatch( f, "Reducer", &other))
                }
            }

            "Image.constant" => {
                let v = into_f64( self.arg( inv, "value")?, f)?;
                Ok( Obj::Image( MemImage::new().with_band( "constant", Array2::from_elem( self.catalog.grid.shape(), v))))
            }

            "Image.toFloat" => Ok( Obj::Image( into_image( self.arg( inv, "value")?, f)?)),

            "Image.clip" => {
                let mut img = into_image( self.arg( inv, "input")?, f)?;
                match self.arg( inv, "geometry")? {
                    Obj::Geometry(g) => {
                        let inside = self.inside_mask( &g);
                        for (_,data) in img.bands.iter_mut() {
                            Zip::from( data).and( &inside).for_each( |v,&is_in| if !is_in { *v = f64::NAN });
                        }
                        Ok( Obj::Image(img))
                    }
                    other => Err( type_mismatch( f, "Geometry", &other))
                }
            }

            "Image.select" => {
                let img = into_image( self.arg( inv, "input")?, f)?;
                let names = into_str_list( self.arg( inv, "bandSelectors")?, f)?;
                let mut bands = Vec::with_capacity( names.len());
                for name in &names {
                    let data = img.band(name)
                        .ok_or_else( || engine_error!("{}: no band '{}' in {:?}", f, name, img.band_names()))?;
                    bands.push( (name.clone(), data.clone()));
                }
                Ok( Obj::Image( MemImage { bands, properties: img.properties }))
            }

            "Image.rename" => {
                let mut img = into_image( self.arg( inv, "input")?, f)?;
                let names = into_str_list( self.arg( inv, "names")?, f)?;
                if names.len() != img.bands.len() {
                    return Err( engine_error!("{}: {} names for {} bands", f, names.len(), img.bands.len()))
                }
                for ((n,_),new_name) in img.bands.iter_mut().zip( names.into_iter()) { *n = new_name }
                Ok( Obj::Image(img))
            }

            "Image.regexpRename" => {
                let mut img = into_image( self.arg( inv, "input")?, f)?;
                let regex = into_str( self.arg( inv, "regex")?, f)?;
                let replacement = into_str( self.arg( inv, "replacement")?, f)?;
                let re = Regex::new( &regex).map_err( |e| engine_error!("{}: {}", f, e))?;
                for (n,_) in img.bands.iter_mut() {
                    let renamed = re.replace( n.as_str(), replacement.as_str()).into_owned();
                    *n = renamed;
                }
                Ok( Obj::Image(img))
            }

            "Image.divide" => {
                let img1 = into_image( self.arg( inv, "image1")?, f)?;
                let img2 = into_image( self.arg( inv, "image2")?, f)?;
                binary_op( img1, &img2, f, |a,b| a / b).map( Obj::Image)
            }

            "Image.updateMask" => {
                let img = into_image( self.arg( inv, "image")?, f)?;
                let mask = into_image( self.arg( inv, "mask")?, f)?;
                binary_op( img, &mask, f, |v,m| if m.is_finite() && m != 0.0 { v } else { f64::NAN }).map( Obj::Image)
            }

            "Image.normalizedDifference" => {
                let img = into_image( self.arg( inv, "input")?, f)?;
                let names = into_str_list( self.arg( inv, "bandNames")?, f)?;
                if names.len() != 2 {
                    return Err( engine_error!("{}: need exactly 2 band names, got {:?}", f, names))
                }
                let a = img.band( &names[0]).ok_or_else( || engine_error!("{}: no band '{}'", f, names[0]))?;
                let b = img.band( &names[1]).ok_or_else( || engine_error!("{}: no band '{}'", f, names[1]))?;
                let nd = Zip::from(a).and(b).map_collect( |&a,&b| {
                    let sum = a + b;
                    if sum == 0.0 { f64::NAN } else { (a - b) / sum }
                });
                Ok( Obj::Image( MemImage { bands: vec![ ("nd".to_string(), nd) ], properties: img.properties }))
            }

            "Image.addBands" => {
                let mut dst = into_image( self.arg( inv, "dstImg")?, f)?;
                let src = into_image( self.arg( inv, "srcImg")?, f)?;
                for (name,data) in src.bands {
                    if dst.band( &name).is_some() {
                        return Err( engine_error!("{}: duplicate band name '{}'", f, name))
                    }
                    dst.bands.push( (name,data));
                }
                Ok( Obj::Image(dst))
            }

            "Element.set" => {
                let mut img = into_image( self.arg( inv, "object")?, f)?;
                let key = into_str( self.arg( inv, "key")?, f)?;
                let value = into_constant( self.arg( inv, "value")?, f)?;
                img.properties.insert( key, value);
                Ok( Obj::Image(img))
            }

            _ => Err( engine_error!("unsupported function {}", f))
        }
    }

    fn matches (&self, filter: &MemFilter, img: &MemImage)->bool {
        match filter {
            MemFilter::Intersects(g) => g.intersects( &self.catalog.grid.bounds().to_rect()),
            MemFilter::DateRange{ start, end, field } => {
                img.property(field).and_then( |v| v.as_i64()).map( |t| t >= *start && t < *end).unwrap_or(false)
            }
            MemFilter::LessThan{ field, value } => {
                img.property(field).and_then( |v| v.as_f64()).map( |v| v < *value).unwrap_or(false)
            }
        }
    }

    /// true for all grid pixels whose center lies within `geom`
    fn inside_mask (&self, geom: &MultiPolygon<f64>)->Array2<bool> {
        let grid = &self.catalog.grid;
        Array2::from_shape_fn( grid.shape(), |(row,col)| {
            let (lon,lat) = grid.pixel_center( row, col);
            geom.contains( &Point::new( lon, lat))
        })
    }

    /// per band median over the valid pixels of all images, output bands are suffixed with "_median"
    fn reduce_median (&self, images: &[MemImage])->Result<MemImage> {
        let mut result = MemImage::new();
        let Some(first) = images.first() else { return Ok(result) };
        let shape = self.catalog.grid.shape();

        for name in first.band_names() {
            let layers = images.iter()
                .map( |img| img.band(name).ok_or_else( || engine_error!("median: band '{}' missing in collection element", name)))
                .collect::<Result<Vec<&Array2<f64>>>>()?;

            let mut vals: Vec<f64> = Vec::with_capacity( layers.len());
            let data = Array2::from_shape_fn( shape, |idx| {
                vals.clear();
                vals.extend( layers.iter().map( |l| l[idx]).filter( |v| v.is_finite()));
                median( &mut vals)
            });
            result.bands.push( (format!("{}_median", name), data));
        }
        Ok(result)
    }

    /// ordinary least squares fit of band 1 (y) over band 0 (x) for each pixel. Pixels with less than
    /// two valid observations (or without x variance) are masked
    fn reduce_linear_fit (&self, images: &[MemImage])->Result<MemImage> {
        let shape = self.catalog.grid.shape();
        let mut stats: Array2<FitStats> = Array2::from_elem( shape, FitStats::default());

        for img in images {
            if img.bands.len() != 2 {
                return Err( engine_error!("linearFit: expected 2 bands (x,y), got {:?}", img.band_names()))
            }
            let (x,y) = (&img.bands[0].1, &img.bands[1].1);
            Zip::from( &mut stats).and(x).and(y).for_each( |s,&x,&y| s.add( x, y));
        }

        let scale = stats.mapv( |s| s.slope());
        let offset = Zip::from( &stats).and( &scale).map_collect( |s,&m| s.intercept(m));

        Ok( MemImage::new().with_band( "scale", scale).with_band( "offset", offset))
    }
}

#[derive(Debug,Clone,Copy,Default)]
struct FitStats { n: f64, sx: f64, sy: f64, sxx: f64, sxy: f64 }

impl FitStats {
    fn add (&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.n += 1.0;
            self.sx += x;
            self.sy += y;
            self.sxx += x * x;
            self.sxy += x * y;
        }
    }

    fn slope (&self)->f64 {
        if self.n < 2.0 { return f64::NAN }
        let denom = self.n * self.sxx - self.sx * self.sx;
        if denom.abs() < f64::EPSILON { f64::NAN } else { (self.n * self.sxy - self.sx * self.sy) / denom }
    }

    fn intercept (&self, slope: f64)->f64 {
        if slope.is_finite() { (self.sy - slope * self.sx) / self.n } else { f64::NAN }
    }
}

fn median (vals: &mut [f64])->f64 {
    let n = vals.len();
    if n == 0 { return f64::NAN }
    vals.sort_by( |a,b| a.total_cmp(b));
    if n % 2 == 1 { vals[n/2] } else { (vals[n/2 - 1] + vals[n/2]) / 2.0 }
}

/// pixelwise op with `other` either having the same number of bands or a single (broadcast) band
fn binary_op (mut img: MemImage, other: &MemImage, f: &str, op: impl Fn(f64,f64)->f64)->Result<MemImage> {
    let n = img.bands.len();
    if other.bands.len() != 1 && other.bands.len() != n {
        return Err( engine_error!("{}: band count mismatch {} vs {}", f, n, other.bands.len()))
    }
    for (i,(_,data)) in img.bands.iter_mut().enumerate() {
        let rhs = if other.bands.len() == 1 { &other.bands[0].1 } else { &other.bands[i].1 };
        Zip::from( data).and( rhs).for_each( |a,&b| *a = op( *a, b));
    }
    Ok(img)
}

fn type_mismatch (f: &str, expected: &str, got: &Obj)->crate::errors::OdinNdviError {
    engine_error!("{}: expected {}, got {}", f, expected, got.type_name())
}

fn into_image (obj: Obj, f: &str)->Result<MemImage> {
    match obj { Obj::Image(img) => Ok(img), other => Err( type_mismatch( f, "Image", &other)) }
}

fn into_collection (obj: Obj, f: &str)->Result<Vec<MemImage>> {
    match obj { Obj::Collection(c) => Ok(c), other => Err( type_mismatch( f, "ImageCollection", &other)) }
}

fn into_constant (obj: Obj, f: &str)->Result<JsonValue> {
    match obj { Obj::Constant(c) => Ok(c), other => Err( type_mismatch( f, "constant", &other)) }
}

fn into_date (obj: Obj, f: &str)->Result<i64> {
    match obj { Obj::Date(d) => Ok(d), other => Err( type_mismatch( f, "Date", &other)) }
}

fn into_str (obj: Obj, f: &str)->Result<String> {
    match into_constant( obj, f)? {
        JsonValue::String(s) => Ok(s),
        other => Err( engine_error!("{}: expected string, got {}", f, other))
    }
}

fn into_f64 (obj: Obj, f: &str)->Result<f64> {
    let c = into_constant( obj, f)?;
    c.as_f64().ok_or_else( || engine_error!("{}: expected number, got {}", f, c))
}

fn into_str_list (obj: Obj, f: &str)->Result<Vec<String>> {
    match obj {
        Obj::Array(objs) => objs.into_iter().map( |o| into_str( o, f)).collect(),
        Obj::Constant(JsonValue::Array(vs)) => vs.into_iter().map( |v| match v {
            JsonValue::String(s) => Ok(s),
            other => Err( engine_error!("{}: expected string, got {}", f, other))
        }).collect(),
        other => Err( type_mismatch( f, "Array", &other))
    }
}

fn obj_to_json (obj: &Obj)->JsonValue {
    match obj {
        Obj::Constant(c) => c.clone(),
        Obj::Array(objs) => JsonValue::Array( objs.iter().map( obj_to_json).collect()),
        Obj::Image(img) => img.to_json(),
        Obj::Collection(imgs) => json!({ "type": "ImageCollection", "features": imgs.iter().map( |i| i.to_json()).collect::<Vec<_>>() }),
        other => {
            let mut m = JsonMap::new();
            m.insert( "type".to_string(), JsonValue::String( other.type_name().to_string()));
            JsonValue::Object(m)
        }
    }
}

/* #endregion evaluation */

#[async_trait]
impl GeoEngine for MemEngine {
    fn name (&self)->&str { "mem" }

    async fn compute_value (&self, expr: &Expression)->Result<JsonValue> {
        let root = expr.root().ok_or_else( || engine_error!("expression has no result value '{}'", expr.result))?;
        let obj = self.eval(root)?;
        Ok( obj_to_json( &obj))
    }

    async fn create_map (&self, image: &Image, band: &str, vis: &VisParams, _bounds: &Bounds)->Result<MapLayer> {
        let img = self.evaluate_image(image)?;
        let data = img.band(band).ok_or_else( || engine_error!("map band '{}' not in {:?}", band, img.band_names()))?;
        let png = vis.render_png(data)?;

        let id = format!("layer-{}", self.next_layer.fetch_add( 1, Ordering::Relaxed));
        self.layers.insert( id.clone(), Bytes::from(png));
        Ok( MapLayer::Image { id, bounds: self.catalog.grid.bounds() } )
    }

    fn layer_png (&self, id: &str)->Option<Bytes> {
        self.layers.get(id).map( |e| e.value().clone())
    }
}
