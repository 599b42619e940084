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

use std::path::PathBuf;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use odin_ndvi::{
    compute_trend, render_trend, EarthEngine, EngineSession, MapLayer, NdviConfig,
    RegionSelection, RegionTable, trend::planned_trend,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "compute the NDVI trend map layer for a single district")]
struct Args {
    /// RON config file (same format as for ndvi_server)
    #[arg(short, long, default_value = "odin_ndvi/configs/ndvi_server.ron")]
    config: PathBuf,

    /// only print the (JSON) trend expression, don't contact the engine
    #[arg(long)]
    dry_run: bool,

    state: String,
    district: String,
    start_year: i32,
    end_year: i32,
}

#[tokio::main]
async fn main ()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = NdviConfig::load( &args.config)?;
    let table = RegionTable::load( &config.boundaries)?;

    let mut selection = RegionSelection::new();
    if let Err(e) = selection.select_state( &table, &args.state) {
        eprintln!("{e}, available states: {:?}", table.states());
        return Err( e.into())
    }
    if let Err(e) = selection.select_district( &table, &args.district) {
        eprintln!("{e}, districts of {}: {:?}", args.state, table.districts( &args.state));
        return Err( e.into())
    }
    let region = selection.region( &table)?;
    let years = config.trend.year_bounds().validate( args.start_year, args.end_year)?;

    if args.dry_run {
        let image = planned_trend( &config.trend, &region, &years)?;
        println!("{}", serde_json::to_string_pretty( &image.to_expression())?);
        return Ok(())
    }

    let session = EngineSession::new( EarthEngine::connect( config.engine.clone()).await?);
    let result = compute_trend( &session, &config.trend, &region, years).await?;

    println!("district:      {} / {}", region.state(), region.district());
    println!("years used:    {:?}", result.years_used);
    println!("years skipped: {:?}", result.years_skipped);
    if !result.has_data() {
        println!("not enough years with imagery, the layer is empty");
    }

    match render_trend( &session, &result, &region, &config.vis).await? {
        MapLayer::Tiles{url_template} => println!("tiles:         {url_template}"),
        MapLayer::Image{id, bounds} => println!("image layer:   {id} {bounds:?}"),
    }

    Ok(())
}
