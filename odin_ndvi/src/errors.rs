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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OdinNdviError>;

#[derive(Error,Debug)]
pub enum OdinNdviError {

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("JSON error {0}")]
    SerdeError( #[from] serde_json::Error),

    #[error("RON error {0}")]
    RonError( #[from] ron::error::SpannedError),

    #[error("GeoJSON error {0}")]
    GeoJsonError( #[from] geojson::Error),

    #[error("http error {0}")]
    HttpError( #[from] reqwest::Error),

    #[error("invalid header value {0}")]
    HeaderError( #[from] reqwest::header::InvalidHeaderValue),

    #[error("JWT error {0}")]
    JwtError( #[from] jsonwebtoken::errors::Error),

    #[error("image error {0}")]
    ImageError( #[from] image::ImageError),

    #[error("failed to load region table: {0}")]
    RegionLoadError(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Earth Engine authentication failed: {0}")]
    AuthError(String),

    #[error("engine error: {0}")]
    EngineError(String),

    #[error("operation failed {0}")]
    OpFailedError(String),
}

impl OdinNdviError {
    /// the user facing category of this error, used by the web service to pick status and message
    pub fn kind (&self)->&'static str {
        match self {
            OdinNdviError::InvalidInput(_) => "input",
            OdinNdviError::AuthError(_) => "auth",
            OdinNdviError::EngineError(_) | OdinNdviError::HttpError(_) => "engine",
            _ => "internal"
        }
    }
}

macro_rules! op_failed {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinNdviError::OpFailedError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use op_failed;

macro_rules! invalid_input {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinNdviError::InvalidInput( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use invalid_input;

macro_rules! engine_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinNdviError::EngineError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use engine_error;
