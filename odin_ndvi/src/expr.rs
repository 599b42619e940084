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

//! declarative expression graphs in the Earth Engine REST format.
//!
//! Nothing in here computes anything - the typed builders (`ImageCollection`, `Image`, `Filter`,
//! `Reducer`, `Geometry`) only assemble nested function invocations that are later evaluated
//! server side (or by the in-process `MemEngine`). Values are nested inline, i.e. an `Expression`
//! always has a single root value named "0"

use std::collections::BTreeMap;
use chrono::NaiveDate;
use serde::{Serialize,Deserialize};
use serde_json::Value as JsonValue;
use geo_types::MultiPolygon;

use crate::region::multi_polygon_coordinates;

/* #region generic value nodes **************************************************************************/

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
pub enum Value {
    #[serde(rename = "constantValue")]
    Constant(JsonValue),

    #[serde(rename = "functionInvocationValue")]
    Invocation(Invocation),

    #[serde(rename = "arrayValue")]
    Array(ArrayValue),
}

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub function_name: String,
    #[serde(default)]
    pub arguments: BTreeMap<String,Value>,
}

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
pub struct ArrayValue {
    pub values: Vec<Value>,
}

pub fn constant (v: impl Into<JsonValue>)->Value {
    Value::Constant( v.into())
}

pub fn invoke<'a> (function_name: &str, args: impl IntoIterator<Item=(&'a str, Value)>)->Value {
    Value::Invocation( Invocation {
        function_name: function_name.to_string(),
        arguments: args.into_iter().map( |(k,v)| (k.to_string(), v)).collect()
    })
}

pub fn array (values: impl IntoIterator<Item=Value>)->Value {
    Value::Array( ArrayValue { values: values.into_iter().collect() })
}

fn string_array<S: AsRef<str>> (names: &[S])->Value {
    array( names.iter().map( |s| constant( s.as_ref())))
}

/// the top level request object
#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
pub struct Expression {
    pub result: String,
    pub values: BTreeMap<String,Value>,
}

impl Expression {
    pub fn new (root: Value)->Self {
        Expression { result: "0".to_string(), values: BTreeMap::from([ ("0".to_string(), root) ]) }
    }

    pub fn root (&self)->Option<&Value> {
        self.values.get( &self.result)
    }
}

/* #endregion generic value nodes */

/* #region typed builders *******************************************************************************/

#[derive(Debug,Clone,PartialEq)]
pub struct Geometry(Value);

impl Geometry {
    pub fn from_multi_polygon (mp: &MultiPolygon<f64>)->Self {
        let coords = serde_json::to_value( multi_polygon_coordinates(mp)).unwrap_or( JsonValue::Null);
        Geometry( invoke( "GeometryConstructors.MultiPolygon", [
            ("coordinates", constant(coords)),
            ("geodesic", constant(false)),
        ]))
    }

    pub fn value (&self)->&Value { &self.0 }
}

#[derive(Debug,Clone,PartialEq)]
pub struct Filter(Value);

impl Filter {
    /// elements whose footprint intersects `geometry`
    pub fn bounds (geometry: &Geometry)->Self {
        Filter( invoke( "Filter.intersects", [
            ("leftField", constant(".all")),
            ("rightValue", geometry.0.clone()),
        ]))
    }

    /// elements acquired within [start,end)
    pub fn date (start: NaiveDate, end: NaiveDate)->Self {
        let date = |d: NaiveDate| invoke( "Date", [("value", constant( d.format("%Y-%m-%d").to_string()))]);
        Filter( invoke( "Filter.dateRangeContains", [
            ("leftValue", invoke( "DateRange", [("start", date(start)), ("end", date(end))])),
            ("rightField", constant("system:time_start")),
        ]))
    }

    /// elements with a numeric metadata property below `value`
    pub fn less_than (property: &str, value: f64)->Self {
        Filter( invoke( "Filter.lessThan", [
            ("leftField", constant(property)),
            ("rightValue", constant(value)),
        ]))
    }

    pub fn value (&self)->&Value { &self.0 }
}

#[derive(Debug,Clone,PartialEq)]
pub struct Reducer(Value);

impl Reducer {
    pub fn median ()->Self { Reducer( invoke( "Reducer.median", std::iter::empty())) }

    /// least squares fit of the 2nd input band (y) against the 1st (x). Outputs bands "scale" and "offset"
    pub fn linear_fit ()->Self { Reducer( invoke( "Reducer.linearFit", std::iter::empty())) }

    pub fn value (&self)->&Value { &self.0 }
}

#[derive(Debug,Clone,PartialEq)]
pub struct Number(Value);

impl Number {
    pub fn value (&self)->&Value { &self.0 }
    pub fn to_expression (&self)->Expression { Expression::new( self.0.clone()) }
}

#[derive(Debug,Clone,PartialEq)]
pub struct ImageCollection(Value);

impl ImageCollection {
    pub fn load (id: &str)->Self {
        ImageCollection( invoke( "ImageCollection.load", [("id", constant(id))]))
    }

    pub fn from_images (images: impl IntoIterator<Item=Image>)->Self {
        ImageCollection( invoke( "ImageCollection.fromImages", [
            ("images", array( images.into_iter().map( |img| img.0)))
        ]))
    }

    pub fn filter (&self, filter: Filter)->Self {
        ImageCollection( invoke( "Collection.filter", [
            ("collection", self.0.clone()),
            ("filter", filter.0),
        ]))
    }

    pub fn filter_bounds (&self, geometry: &Geometry)->Self { self.filter( Filter::bounds(geometry)) }

    pub fn filter_date (&self, start: NaiveDate, end: NaiveDate)->Self { self.filter( Filter::date( start, end)) }

    pub fn size (&self)->Number {
        Number( invoke( "Collection.size", [("collection", self.0.clone())]))
    }

    pub fn reduce (&self, reducer: Reducer)->Image {
        Image( invoke( "ImageCollection.reduce", [
            ("collection", self.0.clone()),
            ("reducer", reducer.0),
        ]))
    }

    /// per pixel median that keeps the original band names
    pub fn median (&self)->Image {
        self.reduce( Reducer::median()).regexp_rename( "_median$", "")
    }

    pub fn value (&self)->&Value { &self.0 }
    pub fn to_expression (&self)->Expression { Expression::new( self.0.clone()) }
}

#[derive(Debug,Clone,PartialEq)]
pub struct Image(Value);

impl Image {
    /// single band image named "constant"
    pub fn constant (v: f64)->Self {
        Image( invoke( "Image.constant", [("value", constant(v))]))
    }

    pub fn clip (&self, geometry: &Geometry)->Self {
        Image( invoke( "Image.clip", [
            ("input", self.0.clone()),
            ("geometry", geometry.0.clone()),
        ]))
    }

    pub fn select<S: AsRef<str>> (&self, bands: &[S])->Self {
        Image( invoke( "Image.select", [
            ("input", self.0.clone()),
            ("bandSelectors", string_array(bands)),
        ]))
    }

    pub fn rename<S: AsRef<str>> (&self, names: &[S])->Self {
        Image( invoke( "Image.rename", [
            ("input", self.0.clone()),
            ("names", string_array(names)),
        ]))
    }

    pub fn regexp_rename (&self, regex: &str, replacement: &str)->Self {
        Image( invoke( "Image.regexpRename", [
            ("input", self.0.clone()),
            ("regex", constant(regex)),
            ("replacement", constant(replacement)),
        ]))
    }

    pub fn divide (&self, divisor: f64)->Self {
        Image( invoke( "Image.divide", [
            ("image1", self.0.clone()),
            ("image2", Image::constant(divisor).0),
        ]))
    }

    /// `(a - b) / (a + b)` as a single band named "nd"
    pub fn normalized_difference (&self, a: &str, b: &str)->Self {
        Image( invoke( "Image.normalizedDifference", [
            ("input", self.0.clone()),
            ("bandNames", string_array( &[a, b])),
        ]))
    }

    pub fn add_bands (&self, other: &Image)->Self {
        Image( invoke( "Image.addBands", [
            ("dstImg", self.0.clone()),
            ("srcImg", other.0.clone()),
        ]))
    }

    pub fn to_float (&self)->Self {
        Image( invoke( "Image.toFloat", [("value", self.0.clone())]))
    }

    /// mask all pixels for which `mask` is zero
    pub fn update_mask (&self, mask: &Image)->Self {
        Image( invoke( "Image.updateMask", [
            ("image", self.0.clone()),
            ("mask", mask.0.clone()),
        ]))
    }

    pub fn set (&self, key: &str, v: impl Into<JsonValue>)->Self {
        Image( invoke( "Element.set", [
            ("object", self.0.clone()),
            ("key", constant(key)),
            ("value", constant(v)),
        ]))
    }

    pub fn value (&self)->&Value { &self.0 }
    pub fn to_expression (&self)->Expression { Expression::new( self.0.clone()) }
}

/* #endregion typed builders */
