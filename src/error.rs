use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Access token creation failed ({status}). Response from the server was: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("Token response did not contain an 'access_token' field")]
    MissingToken,
    #[error("Token response was not valid JSON: {0}")]
    InvalidResponse(String),
    #[error("Unable to reach the identity endpoint")]
    Transport(#[source] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("No products found for filter: {filter}")]
    Empty { filter: String },
    #[error("Expected a single product but the catalog returned {count}")]
    Ambiguous { count: usize },
    #[error("Catalog search failed ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error("Date ranges are not supported, got {start} to {end}; search one date at a time")]
    RangeUnsupported { start: NaiveDate, end: NaiveDate },
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Download failed with status {status}")]
    Status { status: StatusCode },
    #[error("Archive extraction is not supported; download without unzip")]
    UnzipUnsupported,
    #[error("Product name '{0}' cannot be used as a file name")]
    InvalidProductName(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Tile set '{0}' is not defined in the configuration")]
    UnknownTileSet(String),
    #[error("Dataspace credentials are missing; set them in the config file or the environment")]
    MissingCredentials,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid tile code '{0}', expected a UTM zone and three letters such as 16QEJ")]
pub struct TileCodeError(pub String);

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Start date {start} is after end date {end}")]
pub struct DateRangeError {
    pub start: NaiveDate,
    pub end: NaiveDate,
}
