//! Types shared by the manifester crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
