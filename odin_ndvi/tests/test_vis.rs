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

use ndarray::Array2;
use odin_ndvi::{VisParams, vis::parse_color};

#[test]
fn test_default_palette () {
    let vis = VisParams::default();
    assert_eq!( vis.hex_palette().unwrap(), vec!["ff0000", "ffffff", "008000"]);

    let p = vis.palette().unwrap();
    assert_eq!( p.color_for( -0.05), [255,0,0,255]);
    assert_eq!( p.color_for( 0.0), [255,255,255,255]);
    assert_eq!( p.color_for( 0.05), [0,128,0,255]);
    assert_eq!( p.color_for( 1.0), [0,128,0,255]); // clamped
    assert_eq!( p.color_for( -0.025), [255,128,128,255]);
    assert_eq!( p.color_for( f64::NAN), [0,0,0,0]);
}

#[test]
fn test_parse_color () {
    assert_eq!( parse_color("#f00").unwrap(), [255,0,0]);
    assert_eq!( parse_color("00FF7f").unwrap(), [0,255,127]);
    assert_eq!( parse_color(" Green ").unwrap(), [0,128,0]);
    assert!( parse_color("chartreuse-ish").is_err());
    assert!( parse_color("#12345").is_err());
}

#[test]
fn test_invalid_params () {
    let vis = VisParams { min: 0.1, max: 0.1, palette: vec!["red".to_string()] };
    assert!( vis.palette().is_err());

    let vis = VisParams { min: 0.0, max: 1.0, palette: vec![] };
    assert!( vis.palette().is_err());
}

#[test]
fn test_render_png () {
    let mut grid = Array2::from_elem( (3,4), 0.05);
    grid[[1,2]] = f64::NAN;

    let png = VisParams::default().render_png( &grid).unwrap();
    let img = image::load_from_memory( &png).unwrap().to_rgba8();
    println!("rendered {}x{} PNG with {} bytes", img.width(), img.height(), png.len());

    assert_eq!( (img.width(), img.height()), (4,3));
    assert_eq!( img.get_pixel( 0, 0).0, [0,128,0,255]);
    assert_eq!( img.get_pixel( 2, 1).0[3], 0); // masked pixel is transparent
}
