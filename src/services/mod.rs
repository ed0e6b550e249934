//! Services module
//!
//! Este módulo contiene la lógica de negocio de la aplicación: el registro
//! de asignaciones, la máquina de estados del chofer, el ciclo de vida de
//! los viajes, los períodos de descanso y el barrido de licencias vencidas.

pub mod assignment_service;
pub mod driver_state_service;
pub mod fleet_service;
pub mod leave_sweep_service;
pub mod rest_period_service;
pub mod state_transitions;
pub mod trip_service;

pub use assignment_service::{AssignmentService, ResourceKind, ResourceSnapshot};
pub use driver_state_service::DriverStateService;
pub use fleet_service::FleetService;
pub use leave_sweep_service::LeaveSweepService;
pub use rest_period_service::RestPeriodService;
pub use trip_service::{TripDeletionSummary, TripService};
