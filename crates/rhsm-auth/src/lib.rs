//! Access token acquisition for the subscription allocation API
//!
//! The API authenticates with short-lived bearer tokens minted from a
//! long-lived offline token. `request_access_token` performs that exchange;
//! callers cache the result for one allocation session and call it again
//! whenever they drop the cached token.

pub mod constants;
pub mod error;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use token::{TokenResponse, request_access_token};
