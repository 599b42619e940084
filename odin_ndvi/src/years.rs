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

use std::ops::RangeInclusive;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Serialize,Deserialize};

use crate::errors::{Result,invalid_input};

/// earliest year for which the surface reflectance catalog has usable imagery
pub const MIN_YEAR: i32 = 2015;

/// minimum number of years between start and end so that a linear fit is meaningful
pub const MIN_SPAN: i32 = 4;

/// the admissible year interval for trend requests at a given point in time.
/// This is what the input form has to enforce
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub struct YearBounds {
    pub min_year: i32,
    pub max_year: i32, // the current year
    pub min_span: i32,
}

impl YearBounds {
    pub fn new (min_year: i32, min_span: i32, current_year: i32)->Self {
        YearBounds { min_year, max_year: current_year, min_span }
    }

    pub fn current (min_year: i32, min_span: i32)->Self {
        Self::new( min_year, min_span, Utc::now().year())
    }

    /// the values a start year input can take
    pub fn start_range (&self)->RangeInclusive<i32> {
        self.min_year ..= (self.max_year - self.min_span)
    }

    /// the values an end year input can take once `start` is chosen
    pub fn end_range (&self, start: i32)->RangeInclusive<i32> {
        (start + self.min_span) ..= self.max_year
    }

    pub fn validate (&self, start: i32, end: i32)->Result<YearRange> {
        if self.min_span < 1 {
            return Err( invalid_input!("minimum year span has to be at least 1, got {}", self.min_span))
        }
        if !self.start_range().contains(&start) {
            return Err( invalid_input!("start year {} has to be within [{}, {}]", start, self.min_year, self.max_year - self.min_span))
        }
        if !self.end_range(start).contains(&end) {
            return Err( invalid_input!("end year {} has to be within [{}, {}] for start year {}", end, start + self.min_span, self.max_year, start))
        }
        Ok( YearRange { start, end } )
    }
}

/// a validated, inclusive interval of calendar years
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub fn start (&self)->i32 { self.start }
    pub fn end (&self)->i32 { self.end }

    pub fn years (&self)->RangeInclusive<i32> { self.start ..= self.end }

    pub fn len (&self)->usize { (self.end - self.start + 1).max(0) as usize }
}

/// the [first,last] day interval of a calendar year
pub fn year_dates (year: i32)->Option<(NaiveDate,NaiveDate)> {
    Some( (NaiveDate::from_ymd_opt( year, 1, 1)?, NaiveDate::from_ymd_opt( year, 12, 31)?) )
}
