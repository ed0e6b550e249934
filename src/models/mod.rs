//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean exactamente
//! al schema PostgreSQL con las convenciones estándar.

pub mod actor;
pub mod driver;
pub mod rest_period;
pub mod tractor;
pub mod trailer;
pub mod trip;

pub use actor::Actor;
pub use driver::{ChangeDriverStateRequest, CreateDriverRequest, Driver, DriverStatus};
pub use rest_period::RestPeriod;
pub use tractor::{CreateTractorRequest, Tractor, TractorStatus};
pub use trailer::{CreateTrailerRequest, Trailer, TrailerStatus};
pub use trip::{CreateTripRequest, Trip, TripStatus};
