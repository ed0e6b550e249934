//! Modelo de Driver (chofer)
//!
//! Este módulo contiene el struct Driver, su enum de estado operativo
//! y los requests para la máquina de estados. Mapea exactamente al
//! schema PostgreSQL con primary key 'id'.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

/// Estado operativo del chofer - mapea al ENUM driver_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "driver_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Available,
    Loading,
    Driving,
    Resting,
    Unloading,
    DeliveryDone,
    AnnualLeave,
    TimeOff,
    EquipmentRepair,
    Inactive,
}

impl DriverStatus {
    /// Estados de excepción: licencias, franco, reparación e inactivo.
    /// Se pueden aplicar desde casi cualquier estado (emergencias).
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            DriverStatus::AnnualLeave
                | DriverStatus::TimeOff
                | DriverStatus::EquipmentRepair
                | DriverStatus::Inactive
        )
    }

    /// Estados ligados a un viaje en curso. Al eliminar el viaje, un chofer
    /// en uno de estos estados vuelve a Available.
    pub fn is_trip_related(&self) -> bool {
        matches!(
            self,
            DriverStatus::Loading
                | DriverStatus::Driving
                | DriverStatus::Resting
                | DriverStatus::Unloading
        )
    }

    /// Los estados de excepción exigen fecha de inicio; la de fin es
    /// opcional (licencia abierta)
    pub fn requires_leave_dates(&self) -> bool {
        self.is_exception()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Available => "available",
            DriverStatus::Loading => "loading",
            DriverStatus::Driving => "driving",
            DriverStatus::Resting => "resting",
            DriverStatus::Unloading => "unloading",
            DriverStatus::DeliveryDone => "delivery_done",
            DriverStatus::AnnualLeave => "annual_leave",
            DriverStatus::TimeOff => "time_off",
            DriverStatus::EquipmentRepair => "equipment_repair",
            DriverStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver principal - mapea exactamente a la tabla drivers
///
/// Invariante: si tractor_id/trailer_id están presentes, el tractor/batea
/// referenciado apunta de vuelta a este chofer (simetría bidireccional,
/// mantenida por el AssignmentService, nunca por foreign keys).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Driver {
    pub id: Uuid,
    pub full_name: String,
    pub status: DriverStatus,
    pub tractor_id: Option<Uuid>,
    pub trailer_id: Option<Uuid>,
    pub status_reason: Option<String>,
    pub leave_start: Option<DateTime<Utc>>,
    pub leave_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}

/// Request para cambiar el estado operativo de un chofer
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangeDriverStateRequest {
    pub new_status: DriverStatus,

    #[validate(length(max = 500))]
    pub reason: Option<String>,

    // Para estados de licencia (annual_leave, time_off, equipment_repair)
    pub leave_start: Option<DateTime<Utc>>,
    pub leave_end: Option<DateTime<Utc>>,

    /// Confirmación explícita del caller; sin ella todo cambio se rechaza
    #[serde(default)]
    pub confirmed: bool,

    // Para unloading / delivery_done: toneladas descargadas
    pub unloaded_tons: Option<Decimal>,
}

/// Request para alta administrativa de un chofer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDriverRequest {
    #[validate(length(min = 2, max = 150))]
    pub full_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_states() {
        assert!(DriverStatus::AnnualLeave.is_exception());
        assert!(DriverStatus::TimeOff.is_exception());
        assert!(DriverStatus::EquipmentRepair.is_exception());
        assert!(DriverStatus::Inactive.is_exception());
        assert!(!DriverStatus::Available.is_exception());
        assert!(!DriverStatus::Driving.is_exception());
    }

    #[test]
    fn test_trip_related_states() {
        assert!(DriverStatus::Loading.is_trip_related());
        assert!(DriverStatus::Driving.is_trip_related());
        assert!(DriverStatus::Resting.is_trip_related());
        assert!(DriverStatus::Unloading.is_trip_related());
        assert!(!DriverStatus::Available.is_trip_related());
        assert!(!DriverStatus::DeliveryDone.is_trip_related());
        assert!(!DriverStatus::TimeOff.is_trip_related());
    }

    #[test]
    fn test_exception_states_require_leave_dates() {
        assert!(DriverStatus::Inactive.requires_leave_dates());
        assert!(DriverStatus::AnnualLeave.requires_leave_dates());
        assert!(!DriverStatus::Resting.requires_leave_dates());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let s = serde_json::to_string(&DriverStatus::DeliveryDone).unwrap();
        assert_eq!(s, "\"delivery_done\"");
        let parsed: DriverStatus = serde_json::from_str("\"annual_leave\"").unwrap();
        assert_eq!(parsed, DriverStatus::AnnualLeave);
    }
}
