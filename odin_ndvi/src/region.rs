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

//! the region selector: a two level (state -> district -> boundary) lookup that is loaded once from
//! a GeoJSON FeatureCollection, plus the view model for cascading state/district choices

use std::{collections::BTreeMap, fs, path::{Path,PathBuf}};
use serde::{Serialize,Deserialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use geo::{BoundingRect, Contains};
use geo_types::{Coord, LineString, MultiPolygon, Point, Polygon, Rect};
use geojson::{Feature, GeoJson, Geometry as GeoJsonGeometry, Value as GeoJsonValue};
use tracing::{debug, warn};

use crate::errors::{OdinNdviError, Result, invalid_input};

/// UI-only entries of the dropdowns. These are never valid selections
pub const STATE_PLACEHOLDER: &str = "Select State";
pub const DISTRICT_PLACEHOLDER: &str = "Select District";

/// where to find the boundary dataset and which feature properties hold state and district names
#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct BoundaryConfig {
    pub path: PathBuf,
    #[serde(default = "default_state_attr")]
    pub state_attr: String,
    #[serde(default = "default_district_attr")]
    pub district_attr: String,
}

fn default_state_attr()->String { "State".to_string() }
fn default_district_attr()->String { "District".to_string() }

impl BoundaryConfig {
    pub fn new (path: impl AsRef<Path>)->Self {
        BoundaryConfig { path: path.as_ref().to_path_buf(), state_attr: default_state_attr(), district_attr: default_district_attr() }
    }
}

/// lon/lat degree bounding box
#[derive(Serialize,Deserialize,Debug,Clone,Copy,PartialEq)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub fn center (&self)->[f64;2] {
        [ (self.west + self.east) / 2.0, (self.south + self.north) / 2.0 ]
    }

    pub fn to_rect (&self)->Rect<f64> {
        Rect::new( Coord{ x: self.west, y: self.south }, Coord{ x: self.east, y: self.north })
    }
}

impl From<Rect<f64>> for Bounds {
    fn from (rect: Rect<f64>)->Self {
        Bounds { west: rect.min().x, south: rect.min().y, east: rect.max().x, north: rect.max().y }
    }
}

/* #region Region ***************************************************************************************/

/// the region of interest for a trend request: all boundary polygons of one district
#[derive(Debug,Clone,PartialEq)]
pub struct Region {
    state: String,
    district: String,
    geometry: MultiPolygon<f64>,
}

impl Region {
    pub fn new (state: impl ToString, district: impl ToString, geometry: MultiPolygon<f64>)->Self {
        Region { state: state.to_string(), district: district.to_string(), geometry }
    }

    pub fn state (&self)->&str { &self.state }
    pub fn district (&self)->&str { &self.district }
    pub fn geometry (&self)->&MultiPolygon<f64> { &self.geometry }

    /// regions are never empty (see RegionTable) hence there always is a bounding box
    pub fn bounds (&self)->Bounds {
        self.geometry.bounding_rect()
            .map( Bounds::from)
            .unwrap_or( Bounds { west: 0.0, south: 0.0, east: 0.0, north: 0.0 })
    }

    pub fn contains_lon_lat (&self, lon: f64, lat: f64)->bool {
        self.geometry.contains( &Point::new( lon, lat))
    }

    /// the region outline as a GeoJSON Feature with state and district properties
    pub fn to_feature (&self)->Feature {
        let mut props = JsonMap::new();
        props.insert( "state".to_string(), JsonValue::String( self.state.clone()));
        props.insert( "district".to_string(), JsonValue::String( self.district.clone()));

        Feature {
            bbox: None,
            geometry: Some( GeoJsonGeometry::new( multi_polygon_value( &self.geometry))),
            id: None,
            properties: Some(props),
            foreign_members: None,
        }
    }
}

/* #endregion Region */

/* #region RegionTable **********************************************************************************/

/// the state -> district -> geometry lookup. Districts that appear in several features (e.g. for
/// block-wise boundary sets) are merged into one MultiPolygon
#[derive(Debug,Clone,Default)]
pub struct RegionTable {
    states: BTreeMap<String, BTreeMap<String, MultiPolygon<f64>>>,
}

impl RegionTable {

    /// this is a startup operation - if it fails the tool is unusable and callers should abort
    pub fn load (config: &BoundaryConfig)->Result<Self> {
        let path = &config.path;
        let text = fs::read_to_string(path)
            .map_err( |e| OdinNdviError::RegionLoadError( format!("cannot read {:?}: {}", path, e)))?;
        let table = Self::from_geojson( &text, &config.state_attr, &config.district_attr)
            .map_err( |e| OdinNdviError::RegionLoadError( format!("{:?}: {}", path, e)))?;

        debug!("loaded {} states with {} districts from {:?}", table.states.len(), table.n_districts(), path);
        Ok(table)
    }

    pub fn from_geojson (text: &str, state_attr: &str, district_attr: &str)->Result<Self> {
        let features = match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(_) => return Err( OdinNdviError::RegionLoadError( "boundary source is not a feature collection".to_string()))
        };
        Self::from_features( features.iter(), state_attr, district_attr)
    }

    pub fn from_features<'a> (features: impl Iterator<Item=&'a Feature>, state_attr: &str, district_attr: &str)->Result<Self> {
        let mut states: BTreeMap<String, BTreeMap<String, MultiPolygon<f64>>> = BTreeMap::new();

        for (i,f) in features.enumerate() {
            let state = f.property(state_attr).and_then( |v| v.as_str()).map( str::trim);
            let district = f.property(district_attr).and_then( |v| v.as_str()).map( str::trim);
            let polygons = f.geometry.as_ref().and_then( |g| polygons_of( &g.value));

            match (state, district, polygons) {
                (Some(state), Some(district), Some(polygons)) if !state.is_empty() && !district.is_empty() => {
                    let mp = states.entry( state.to_string()).or_default()
                        .entry( district.to_string()).or_insert_with( || MultiPolygon::new( Vec::new()));
                    mp.0.extend( polygons);
                }
                _ => warn!("ignoring boundary feature {} without {}/{} attributes or polygon geometry", i, state_attr, district_attr)
            }
        }

        if states.is_empty() {
            Err( OdinNdviError::RegionLoadError( "no usable boundary features".to_string()))
        } else {
            Ok( RegionTable { states } )
        }
    }

    /// sorted state names
    pub fn states (&self)->Vec<&str> {
        self.states.keys().map( String::as_str).collect()
    }

    /// sorted names of the districts that belong to `state` (empty if the state is unknown)
    pub fn districts (&self, state: &str)->Vec<&str> {
        self.states.get(state)
            .map( |ds| ds.keys().map( String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_district (&self, state: &str, district: &str)->bool {
        self.states.get(state).map( |ds| ds.contains_key(district)).unwrap_or(false)
    }

    pub fn region (&self, state: &str, district: &str)->Option<Region> {
        self.states.get(state)
            .and_then( |ds| ds.get(district))
            .map( |mp| Region::new( state, district, mp.clone()))
    }

    pub fn n_districts (&self)->usize {
        self.states.values().map( |ds| ds.len()).sum()
    }
}

fn polygons_of (value: &GeoJsonValue)->Option<Vec<Polygon<f64>>> {
    match value {
        GeoJsonValue::Polygon(rings) => polygon_from_rings(rings).map( |p| vec![p]),
        GeoJsonValue::MultiPolygon(polys) => {
            let polygons: Vec<Polygon<f64>> = polys.iter().filter_map( |rings| polygon_from_rings(rings)).collect();
            if polygons.is_empty() { None } else { Some(polygons) }
        }
        _ => None
    }
}

fn polygon_from_rings (rings: &[Vec<Vec<f64>>])->Option<Polygon<f64>> {
    let mut it = rings.iter().map( |ring| line_string(ring));
    let exterior = it.next()??;
    let interiors: Vec<LineString<f64>> = it.flatten().collect();
    Some( Polygon::new( exterior, interiors))
}

fn line_string (positions: &[Vec<f64>])->Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = positions.iter()
        .filter( |p| p.len() >= 2)
        .map( |p| Coord{ x: p[0], y: p[1] })
        .collect();
    if coords.len() < 3 { None } else { Some( LineString::new(coords)) }
}

fn ring_positions (ls: &LineString<f64>)->Vec<Vec<f64>> {
    ls.coords().map( |c| vec![c.x, c.y]).collect()
}

pub fn multi_polygon_value (mp: &MultiPolygon<f64>)->GeoJsonValue {
    GeoJsonValue::MultiPolygon( multi_polygon_coordinates(mp))
}

/// the nested [polygon][ring][position][lon,lat] coordinate arrays of a MultiPolygon
pub fn multi_polygon_coordinates (mp: &MultiPolygon<f64>)->Vec<Vec<Vec<Vec<f64>>>> {
    mp.0.iter().map( |poly| {
        let mut rings = vec![ ring_positions( poly.exterior()) ];
        rings.extend( poly.interiors().iter().map( ring_positions));
        rings
    }).collect()
}

/// inverse of `multi_polygon_coordinates`. Degenerate polygons are dropped
pub fn multi_polygon_from_coordinates (coords: &[Vec<Vec<Vec<f64>>>])->MultiPolygon<f64> {
    MultiPolygon::new( coords.iter().filter_map( |rings| polygon_from_rings(rings)).collect())
}

/* #endregion RegionTable */

/* #region RegionSelection ******************************************************************************/

/// the explicit view model of the cascading state/district choice.
/// Choosing a new state always resets the district
#[derive(Debug,Clone,Default,PartialEq)]
pub struct RegionSelection {
    state: Option<String>,
    district: Option<String>,
}

impl RegionSelection {
    pub fn new ()->Self { RegionSelection::default() }

    pub fn state (&self)->Option<&str> { self.state.as_deref() }
    pub fn district (&self)->Option<&str> { self.district.as_deref() }

    pub fn select_state (&mut self, table: &RegionTable, state: &str)->Result<()> {
        self.district = None;
        if state == STATE_PLACEHOLDER || state.is_empty() {
            self.state = None;
            Err( invalid_input!("please select a state"))
        } else if table.districts(state).is_empty() {
            self.state = None;
            Err( invalid_input!("unknown state '{}'", state))
        } else {
            self.state = Some(state.to_string());
            Ok(())
        }
    }

    pub fn select_district (&mut self, table: &RegionTable, district: &str)->Result<()> {
        let state = self.state.as_deref().ok_or_else( || invalid_input!("please select a state first"))?;

        if district == DISTRICT_PLACEHOLDER || district.is_empty() {
            self.district = None;
            Err( invalid_input!("please select a district"))
        } else if !table.has_district( state, district) {
            self.district = None;
            Err( invalid_input!("district '{}' does not belong to state '{}'", district, state))
        } else {
            self.district = Some(district.to_string());
            Ok(())
        }
    }

    /// the districts that can be offered for the current state choice
    pub fn district_options<'a> (&self, table: &'a RegionTable)->Vec<&'a str> {
        match &self.state {
            Some(state) => table.districts(state),
            None => Vec::new()
        }
    }

    pub fn is_complete (&self)->bool {
        self.state.is_some() && self.district.is_some()
    }

    /// no geometry is returned before both state and district are chosen
    pub fn region (&self, table: &RegionTable)->Result<Region> {
        match (&self.state, &self.district) {
            (Some(state), Some(district)) => table.region( state, district)
                .ok_or_else( || invalid_input!("no boundary for district '{}' in state '{}'", district, state)),
            (None, _) => Err( invalid_input!("please select a state")),
            (_, None) => Err( invalid_input!("please select a district")),
        }
    }
}

/* #endregion RegionSelection */
