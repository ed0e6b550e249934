//! Modelo de Trailer (batea)
//!
//! Struct Trailer y sus variantes para operaciones administrativas.
//! Mapea exactamente al schema PostgreSQL con primary key 'id'.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

/// Estado de la batea - mapea al ENUM trailer_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "trailer_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TrailerStatus {
    Empty,
    Loaded,
    InMaintenance,
}

impl std::fmt::Display for TrailerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrailerStatus::Empty => "empty",
            TrailerStatus::Loaded => "loaded",
            TrailerStatus::InMaintenance => "in_maintenance",
        };
        f.write_str(s)
    }
}

/// Trailer principal - mapea exactamente a la tabla trailers
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trailer {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub license_plate: String,
    pub insurance: Option<String>,
    pub status: TrailerStatus,
    /// Capacidad máxima de carga en toneladas
    pub max_load_tons: Option<Decimal>,
    pub driver_id: Option<Uuid>,
    pub tractor_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request para alta administrativa de una batea
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTrailerRequest {
    #[validate(length(min = 2, max = 100))]
    pub brand: String,

    #[validate(length(min = 1, max = 100))]
    pub model: String,

    #[validate(length(min = 5, max = 20))]
    pub license_plate: String,

    pub insurance: Option<String>,

    pub max_load_tons: Option<Decimal>,
}
