//! Testing utilities for store fault scenarios
//!
//! - **Faults**: refuse reads or writes on key prefixes to simulate a partial
//!   outage of the store
//!
//! # Example
//!
//! ```ignore
//! use oddjobz_storage::testing::FaultPlan;
//!
//! store.inject_faults(FaultPlan::new().fail_writes_to("activity:"));
//! ```

mod faults;

pub use faults::{Access, FaultPlan};
