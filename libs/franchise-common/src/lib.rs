//! Franchise Common - Shared constants and utilities for the franchise case tracker
//!
//! # Examples
//!
//! ```
//! use franchise_common::{truncate_string, STATUS_COMPLETED};
//!
//! assert_eq!(STATUS_COMPLETED, "Completed");
//! assert_eq!(truncate_string("hello world", 5), "he...");
//! ```

pub mod constants;
pub mod utils;

pub use constants::*;
pub use utils::*;
