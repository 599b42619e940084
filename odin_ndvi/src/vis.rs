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

use std::io::Cursor;
use serde::{Serialize,Deserialize};
use ndarray::Array2;
use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};

use crate::errors::{Result,invalid_input,op_failed};

/// visualization range and color ramp of a single band layer. Palette entries are either
/// CSS color names or (optionally '#' prefixed) 3/6 digit hex values
#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}

impl Default for VisParams {
    /// diverging red (browning) - white (no change) - green (greening) scale for NDVI slopes per year
    fn default()->Self {
        VisParams {
            min: -0.05,
            max: 0.05,
            palette: vec![ "red".to_string(), "white".to_string(), "green".to_string() ]
        }
    }
}

impl VisParams {
    pub fn palette (&self)->Result<Palette> {
        if !(self.max > self.min) {
            return Err( invalid_input!("invalid visualization range [{}, {}]", self.min, self.max))
        }
        if self.palette.is_empty() {
            return Err( invalid_input!("empty visualization palette"))
        }
        let colors = self.palette.iter().map( |c| parse_color(c)).collect::<Result<Vec<[u8;3]>>>()?;
        Ok( Palette { min: self.min, max: self.max, colors } )
    }

    /// palette as 6 digit hex strings without '#', which is what the remote map API expects
    pub fn hex_palette (&self)->Result<Vec<String>> {
        Ok( self.palette()?.colors.iter().map( |c| format!("{:02x}{:02x}{:02x}", c[0], c[1], c[2])).collect() )
    }

    /// render a single band grid (row 0 = north) into PNG bytes. Masked (NaN) pixels are transparent
    pub fn render_png (&self, grid: &Array2<f64>)->Result<Vec<u8>> {
        let palette = self.palette()?;
        let (h,w) = grid.dim();
        let (w,h) = match (u32::try_from(w), u32::try_from(h)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w,h),
            _ => return Err( op_failed!("cannot render {}x{} grid", w, h))
        };

        let img: RgbaImage = ImageBuffer::from_fn( w, h, |x,y| {
            Rgba( palette.color_for( grid[[y as usize, x as usize]]))
        });

        let mut buf = Cursor::new( Vec::new());
        img.write_to( &mut buf, ImageFormat::Png)?;
        Ok( buf.into_inner() )
    }
}

/// a parsed, linearly interpolated color ramp
#[derive(Debug,Clone,PartialEq)]
pub struct Palette {
    min: f64,
    max: f64,
    colors: Vec<[u8;3]>,
}

impl Palette {
    /// values outside of [min,max] are clamped
    pub fn color_for (&self, v: f64)->[u8;4] {
        if !v.is_finite() { return [0,0,0,0] }

        let n = self.colors.len();
        if n == 1 {
            let c = self.colors[0];
            return [c[0], c[1], c[2], 255]
        }

        let t = ((v - self.min) / (self.max - self.min)).clamp( 0.0, 1.0);
        let pos = t * (n - 1) as f64;
        let i = (pos.floor() as usize).min( n - 2);
        let frac = pos - i as f64;

        let a = self.colors[i];
        let b = self.colors[i+1];
        let lerp = |ca: u8, cb: u8| (ca as f64 + (cb as f64 - ca as f64) * frac).round() as u8;

        [ lerp(a[0],b[0]), lerp(a[1],b[1]), lerp(a[2],b[2]), 255 ]
    }
}

pub fn parse_color (spec: &str)->Result<[u8;3]> {
    let s = spec.trim().to_ascii_lowercase();
    let named = match s.as_str() {
        "black" => Some([0,0,0]),
        "white" => Some([255,255,255]),
        "red" => Some([255,0,0]),
        "green" => Some([0,128,0]),
        "lime" => Some([0,255,0]),
        "blue" => Some([0,0,255]),
        "yellow" => Some([255,255,0]),
        "orange" => Some([255,165,0]),
        "brown" => Some([165,42,42]),
        "darkgreen" => Some([0,100,0]),
        "gray" | "grey" => Some([128,128,128]),
        _ => None
    };
    if let Some(c) = named { return Ok(c) }

    let hex = s.strip_prefix('#').unwrap_or( &s);
    let digits: Vec<u8> = hex.chars()
        .map( |c| c.to_digit(16).map( |d| d as u8))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else( || invalid_input!("not a color: '{}'", spec))?;

    match digits.len() {
        3 => Ok([ digits[0] * 17, digits[1] * 17, digits[2] * 17 ]),
        6 => Ok([ digits[0] * 16 + digits[1], digits[2] * 16 + digits[3], digits[4] * 16 + digits[5] ]),
        _ => Err( invalid_input!("not a color: '{}'", spec))
    }
}
