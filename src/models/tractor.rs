//! Modelo de Tractor
//!
//! Struct Tractor y sus variantes para operaciones administrativas.
//! Mapea exactamente al schema PostgreSQL con primary key 'id'.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

/// Estado del tractor - mapea al ENUM tractor_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "tractor_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TractorStatus {
    Idle,
    Busy,
    InMaintenance,
}

impl std::fmt::Display for TractorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TractorStatus::Idle => "idle",
            TractorStatus::Busy => "busy",
            TractorStatus::InMaintenance => "in_maintenance",
        };
        f.write_str(s)
    }
}

/// Tractor principal - mapea exactamente a la tabla tractors
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tractor {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub license_plate: String,
    pub insurance: Option<String>,
    pub status: TractorStatus,
    /// Capacidad máxima de carga en toneladas
    pub max_load_tons: Option<Decimal>,
    pub driver_id: Option<Uuid>,
    pub trailer_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request para alta administrativa de un tractor
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTractorRequest {
    #[validate(length(min = 2, max = 100))]
    pub brand: String,

    #[validate(length(min = 1, max = 100))]
    pub model: String,

    #[validate(length(min = 5, max = 20))]
    pub license_plate: String,

    pub insurance: Option<String>,

    pub max_load_tons: Option<Decimal>,
}
