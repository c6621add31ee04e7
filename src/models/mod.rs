//! Data models for the expense enricher
//!
//! This module contains the domain models organized by concern:
//! - Location: Geographic coordinates returned by geocoding
//! - Weather: Current-conditions snapshots
//! - Expense: Input and enriched expense rows
//! - Fx: Currency conversion results
//! - Profile: User-directory profiles served by the proxy

pub mod expense;
pub mod fx;
pub mod location;
pub mod profile;
pub mod weather;

// Re-export all public types for convenient access
pub use expense::{EnrichedRecord, ExpenseRecord};
pub use fx::FxConversion;
pub use location::Location;
pub use profile::UserProfile;
pub use weather::{CityWeather, CurrentConditions};
