//! Modelo de RestPeriod (período de descanso)
//!
//! Un intervalo de descanso obligatorio dentro de un viaje. A lo sumo
//! un período abierto por viaje a la vez.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// RestPeriod principal - mapea exactamente a la tabla rest_periods
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RestPeriod {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub rest_start: DateTime<Utc>,
    pub rest_end: Option<DateTime<Utc>>,
    /// Duración en horas, redondeada a 2 decimales, escrita al cerrar
    pub hours: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RestPeriod {
    pub fn is_open(&self) -> bool {
        self.rest_end.is_none()
    }
}
