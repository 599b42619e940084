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

use std::{net::SocketAddr, path::PathBuf};
use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use odin_ndvi::{
    EarthEngine, EngineSession, NdviConfig, RegionTable,
    service::{self, NdviState},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "web server for per district NDVI trend maps")]
struct Args {
    /// RON config file
    #[arg(short, long, default_value = "odin_ndvi/configs/ndvi_server.ron")]
    config: PathBuf,

    /// override the configured socket address
    #[arg(long)]
    sock_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main ()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::from_default_env())  // use RUST_LOG to set max level
        .init();

    let args = Args::parse();
    let mut config = NdviConfig::load( &args.config)?;
    if let Some(sock_addr) = args.sock_addr { config.server.sock_addr = sock_addr }

    // without boundaries there is nothing to select, so we don't even start to serve
    let table = RegionTable::load( &config.boundaries)?;
    info!("{} states with {} districts available", table.states().len(), table.n_districts());

    let session = EngineSession::new( EarthEngine::connect( config.engine.clone()).await?);

    let state = NdviState::new( table, session, config.trend.clone(), config.vis.clone());
    service::serve( &config.server, service::router( state)).await?;

    Ok(())
}
