//! Modelo de Trip (viaje)
//!
//! Un viaje congela los ids de chofer/tractor/batea vigentes al momento
//! de su creación y nunca se re-sincroniza si la asignación viva del
//! chofer cambia después (registro histórico).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

/// Estado del viaje - mapea al ENUM trip_status
///
/// `Disputed` es un override administrativo, no se alcanza por el flujo normal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "trip_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Open,
    Loading,
    Driving,
    Resting,
    Unloading,
    Finished,
    Disputed,
}

impl TripStatus {
    /// Un viaje terminal no acepta más escrituras del ciclo de vida
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Finished | TripStatus::Disputed)
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TripStatus::Open => "open",
            TripStatus::Loading => "loading",
            TripStatus::Driving => "driving",
            TripStatus::Resting => "resting",
            TripStatus::Unloading => "unloading",
            TripStatus::Finished => "finished",
            TripStatus::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// Trip principal - mapea exactamente a la tabla trips
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub unloaded_at: Option<DateTime<Utc>>,
    pub status: TripStatus,
    pub waybill_number: Option<String>,
    pub loaded_tons: Option<Decimal>,
    pub unloaded_tons: Option<Decimal>,
    /// Acumulador de horas de descanso: suma de todos los períodos cerrados
    pub rest_hours: Decimal,
    pub driver_id: Uuid,
    pub tractor_id: Uuid,
    pub trailer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request para crear un viaje
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTripRequest {
    pub driver_id: Uuid,
    pub tractor_id: Uuid,
    pub trailer_id: Uuid,

    #[validate(length(min = 2, max = 200))]
    pub origin: String,

    #[validate(length(min = 2, max = 200))]
    pub destination: String,

    pub departure_at: DateTime<Utc>,

    #[validate(length(max = 50))]
    pub waybill_number: Option<String>,

    pub loaded_tons: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TripStatus::Finished.is_terminal());
        assert!(TripStatus::Disputed.is_terminal());
        assert!(!TripStatus::Open.is_terminal());
        assert!(!TripStatus::Unloading.is_terminal());
    }
}
