// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("tracker responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid response from tracker: {0}")]
    InvalidResponse(String),

    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}
