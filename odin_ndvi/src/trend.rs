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

//! the trend requester. For each year of a `YearRange` we build a cloud filtered median composite of
//! the district, turn it into an NDVI band plus a constant time band, and let the engine compute the
//! per pixel least squares slope of NDVI over time (in NDVI units per year).
//!
//! All of this is expression building. The only engine round trips are the per year scene counts
//! (to drop years without imagery) and the final map creation

use futures::future::try_join_all;
use serde::{Serialize,Deserialize};
use tracing::{debug, info};

use crate::{
    engine::{EngineSession, MapLayer},
    errors::{Result, invalid_input},
    expr::{Filter, Geometry, Image, ImageCollection, Reducer},
    region::Region,
    vis::VisParams,
    years::{MIN_SPAN, MIN_YEAR, YearBounds, YearRange, year_dates},
};

pub const S2_COLLECTION: &str = "COPERNICUS/S2_SR_HARMONIZED";
pub const CLOUD_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";
pub const MAX_CLOUD_PCT: f64 = 5.0;

/// blue, green, red, near infrared
pub const REFLECTANCE_BANDS: [&str;4] = ["B2", "B3", "B4", "B8"];
pub const NIR_BAND: &str = "B8";
pub const RED_BAND: &str = "B4";

/// surface reflectance is stored as integer with this scale factor
pub const REFLECTANCE_SCALE: f64 = 10000.0;

pub const NDVI_BAND: &str = "NDVI";
pub const TIME_BAND: &str = "time";
pub const SLOPE_BAND: &str = "scale"; // what the linear fit reducer calls the slope
pub const YEAR_PROPERTY: &str = "year";

/// trend request policy. `collection_id` and `max_cloud_pct` default to the Sentinel-2 surface
/// reflectance catalog and the 5% scene cloud limit. Other values produce a different trend product
/// and should only be used for tests or catalog mirrors
#[derive(Deserialize,Serialize,Debug,Clone,PartialEq)]
pub struct TrendConfig {
    #[serde(default = "default_collection_id")]
    pub collection_id: String,
    #[serde(default = "default_max_cloud_pct")]
    pub max_cloud_pct: f64,
    #[serde(default = "default_min_year")]
    pub min_year: i32,
    #[serde(default = "default_min_span")]
    pub min_span: i32,
}

fn default_collection_id()->String { S2_COLLECTION.to_string() }
fn default_max_cloud_pct()->f64 { MAX_CLOUD_PCT }
fn default_min_year()->i32 { MIN_YEAR }
fn default_min_span()->i32 { MIN_SPAN }

impl Default for TrendConfig {
    fn default()->Self {
        TrendConfig {
            collection_id: default_collection_id(),
            max_cloud_pct: default_max_cloud_pct(),
            min_year: default_min_year(),
            min_span: default_min_span(),
        }
    }
}

impl TrendConfig {
    /// year input bounds as of today
    pub fn year_bounds (&self)->YearBounds {
        YearBounds::current( self.min_year, self.min_span)
    }

    /// reject configured values that would break the year range or the scene filter
    pub fn check (&self)->Result<()> {
        if self.min_year < MIN_YEAR {
            return Err( invalid_input!("configured min_year {} is before {}", self.min_year, MIN_YEAR))
        }
        if self.min_span < 1 {
            return Err( invalid_input!("configured min_span has to be at least 1, got {}", self.min_span))
        }
        if !(self.max_cloud_pct > 0.0 && self.max_cloud_pct <= 100.0) {
            return Err( invalid_input!("configured max_cloud_pct has to be in (0,100], got {}", self.max_cloud_pct))
        }
        if self.collection_id.trim().is_empty() {
            return Err( invalid_input!("configured collection_id is empty"))
        }
        Ok(())
    }
}

/// median surface reflectance of one calendar year
#[derive(Debug,Clone,PartialEq)]
pub struct YearlyComposite {
    pub year: i32,
    pub image: Image,
}

#[derive(Debug,Clone)]
pub struct TrendResult {
    pub image: Image, // single band "scale"
    pub years: YearRange,
    pub years_used: Vec<i32>,
    pub years_skipped: Vec<i32>,
}

impl TrendResult {
    /// without at least two observations there is no slope and the image is fully masked
    pub fn has_data (&self)->bool {
        self.years_used.len() >= 2
    }
}

/* #region expression building **************************************************************************/

/// all low cloud scenes of `year` that intersect `roi`
pub fn yearly_collection (config: &TrendConfig, roi: &Geometry, year: i32)->Result<ImageCollection> {
    let (start,end) = year_dates(year).ok_or_else( || invalid_input!("invalid year {}", year))?;

    Ok( ImageCollection::load( &config.collection_id)
        .filter_bounds( roi)
        .filter_date( start, end)
        .filter( Filter::less_than( CLOUD_PROPERTY, config.max_cloud_pct))
    )
}

pub fn yearly_composite (coll: &ImageCollection, roi: &Geometry, year: i32)->Image {
    coll.median()
        .clip( roi)
        .select( &REFLECTANCE_BANDS)
        .divide( REFLECTANCE_SCALE)
        .set( YEAR_PROPERTY, year)
}

pub fn ndvi (composite: &Image)->Image {
    composite.normalized_difference( NIR_BAND, RED_BAND).rename( &[NDVI_BAND])
}

/// the [time, NDVI] observation image of a composite, in the band order the linear fit expects (x,y)
pub fn time_tagged (composite: &YearlyComposite, roi: &Geometry)->Image {
    let time = Image::constant( composite.year as f64).to_float().rename( &[TIME_BAND]).clip( roi);
    ndvi( &composite.image).add_bands( &time).select( &[TIME_BAND, NDVI_BAND])
}

/// a "scale" band that is masked everywhere, for requests that can't produce a slope
pub fn no_data_slope (roi: &Geometry)->Image {
    Image::constant(0.0)
        .rename( &[SLOPE_BAND])
        .to_float()
        .update_mask( &Image::constant(0.0))
        .clip( roi)
}

pub fn trend_from_composites (composites: &[YearlyComposite], roi: &Geometry)->Image {
    if composites.len() < 2 {
        return no_data_slope(roi)
    }

    ImageCollection::from_images( composites.iter().map( |c| time_tagged( c, roi)))
        .reduce( Reducer::linear_fit())
        .select( &[SLOPE_BAND])
}

/// the slope expression under the assumption that every year of `years` has imagery. This does not
/// need an engine round trip and is what we show for dry runs
pub fn planned_trend (config: &TrendConfig, region: &Region, years: &YearRange)->Result<Image> {
    let roi = Geometry::from_multi_polygon( region.geometry());
    let composites = years.years().map( |year| {
        let coll = yearly_collection( config, &roi, year)?;
        Ok( YearlyComposite { year, image: yearly_composite( &coll, &roi, year) } )
    }).collect::<Result<Vec<YearlyComposite>>>()?;

    Ok( trend_from_composites( &composites, &roi))
}

/* #endregion expression building */

pub async fn compute_trend (session: &EngineSession, config: &TrendConfig, region: &Region, years: YearRange)->Result<TrendResult> {
    let roi = Geometry::from_multi_polygon( region.geometry());
    let engine = session.engine();

    let collections = years.years()
        .map( |year| Ok( (year, yearly_collection( config, &roi, year)?) ))
        .collect::<Result<Vec<(i32,ImageCollection)>>>()?;

    let sizes = try_join_all( collections.iter().map( |(_,coll)| engine.collection_size(coll))).await?;

    let (used, skipped): (Vec<_>,Vec<_>) = collections.into_iter().zip( sizes.into_iter()).partition( |(_,n)| *n > 0);

    let years_skipped: Vec<i32> = skipped.iter().map( |((year,_),_)| *year).collect();
    for year in &years_skipped {
        info!("no {} scenes for {}/{} in {}, skipping year", config.collection_id, region.state(), region.district(), year);
    }

    let composites: Vec<YearlyComposite> = used.into_iter().map( |((year,coll),n)| {
        debug!("{} scenes for {}", n, year);
        YearlyComposite { year, image: yearly_composite( &coll, &roi, year) }
    }).collect();
    let years_used: Vec<i32> = composites.iter().map( |c| c.year).collect();

    if years_used.len() < 2 {
        info!("only {} year(s) with imagery for {}/{}, no trend", years_used.len(), region.state(), region.district());
    }

    let image = trend_from_composites( &composites, &roi);
    Ok( TrendResult { image, years, years_used, years_skipped } )
}

pub async fn render_trend (session: &EngineSession, result: &TrendResult, region: &Region, vis: &VisParams)->Result<MapLayer> {
    session.engine().create_map( &result.image, SLOPE_BAND, vis, &region.bounds()).await
}
