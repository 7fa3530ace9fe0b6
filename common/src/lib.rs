//! Pricenode Common Types
//!
//! Shared types used across the pricenode workspace: currency codes,
//! per-source price observations, timestamps and validation errors.

pub mod currency;
pub mod error;
pub mod observation;
pub mod time;

pub use currency::*;
pub use error::*;
pub use observation::*;
pub use time::*;
