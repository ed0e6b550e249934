//! Altas y consultas administrativas de tractores y bateas
//!
//! Operaciones de catálogo, separadas del registro de asignaciones: acá no
//! se tocan referencias cruzadas, sólo se crean y listan unidades. La
//! patente es única; un duplicado es un Conflict (la constraint UNIQUE de
//! la tabla respalda el check en caso de carrera).

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CreateTractorRequest, CreateTrailerRequest, Tractor, TractorStatus, Trailer, TrailerStatus,
};
use crate::utils::errors::{AppError, AppResult};

fn duplicate_tractor_plate(plate: &str) -> String {
    format!("Ya existe un tractor con la patente {}", plate)
}

fn duplicate_trailer_plate(plate: &str) -> String {
    format!("Ya existe una batea con la patente {}", plate)
}

/// Una inserción concurrente puede colarse entre el check de patente y el
/// INSERT; la constraint UNIQUE la detecta y acá se traduce al mismo
/// Conflict que el check. Cualquier otro error de base pasa sin tocar.
fn conflict_on_unique_violation(err: sqlx::Error, conflict_message: String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(conflict_message)
        }
        _ => AppError::Database(err),
    }
}

pub struct FleetService {
    pool: PgPool,
}

impl FleetService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Alta de un tractor, inicialmente idle y sin asignaciones
    pub async fn create_tractor(&self, request: CreateTractorRequest) -> AppResult<Tractor> {
        request.validate()?;

        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM tractors WHERE license_plate = $1)")
                .bind(&request.license_plate)
                .fetch_one(&self.pool)
                .await?;

        if exists {
            return Err(AppError::Conflict(duplicate_tractor_plate(
                &request.license_plate,
            )));
        }

        let tractor = sqlx::query_as::<_, Tractor>(
            r#"
            INSERT INTO tractors
                (id, brand, model, license_plate, insurance, status, max_load_tons,
                 active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.brand)
        .bind(&request.model)
        .bind(&request.license_plate)
        .bind(&request.insurance)
        .bind(TractorStatus::Idle)
        .bind(request.max_load_tons)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique_violation(e, duplicate_tractor_plate(&request.license_plate))
        })?;

        info!(
            "✓ Tractor {} {} creado (patente {})",
            tractor.brand, tractor.model, tractor.license_plate
        );

        Ok(tractor)
    }

    /// Alta de una batea, inicialmente empty y sin asignaciones
    pub async fn create_trailer(&self, request: CreateTrailerRequest) -> AppResult<Trailer> {
        request.validate()?;

        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM trailers WHERE license_plate = $1)")
                .bind(&request.license_plate)
                .fetch_one(&self.pool)
                .await?;

        if exists {
            return Err(AppError::Conflict(duplicate_trailer_plate(
                &request.license_plate,
            )));
        }

        let trailer = sqlx::query_as::<_, Trailer>(
            r#"
            INSERT INTO trailers
                (id, brand, model, license_plate, insurance, status, max_load_tons,
                 active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.brand)
        .bind(&request.model)
        .bind(&request.license_plate)
        .bind(&request.insurance)
        .bind(TrailerStatus::Empty)
        .bind(request.max_load_tons)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique_violation(e, duplicate_trailer_plate(&request.license_plate))
        })?;

        info!(
            "✓ Batea {} {} creada (patente {})",
            trailer.brand, trailer.model, trailer.license_plate
        );

        Ok(trailer)
    }

    pub async fn get_tractor(&self, id: Uuid) -> AppResult<Tractor> {
        sqlx::query_as::<_, Tractor>("SELECT * FROM tractors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tractor {} no encontrado", id)))
    }

    pub async fn get_trailer(&self, id: Uuid) -> AppResult<Trailer> {
        sqlx::query_as::<_, Trailer>("SELECT * FROM trailers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batea {} no encontrada", id)))
    }

    /// Tractores activos, los más nuevos primero
    pub async fn list_tractors(&self) -> AppResult<Vec<Tractor>> {
        let tractors = sqlx::query_as::<_, Tractor>(
            "SELECT * FROM tractors WHERE active = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tractors)
    }

    /// Bateas activas, las más nuevas primero
    pub async fn list_trailers(&self) -> AppResult<Vec<Trailer>> {
        let trailers = sqlx::query_as::<_, Trailer>(
            "SELECT * FROM trailers WHERE active = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(trailers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_plate_messages() {
        assert_eq!(
            duplicate_tractor_plate("AB123CD"),
            "Ya existe un tractor con la patente AB123CD"
        );
        assert_eq!(
            duplicate_trailer_plate("AE456FG"),
            "Ya existe una batea con la patente AE456FG"
        );
    }

    #[test]
    fn test_non_unique_errors_pass_through_as_database() {
        let mapped =
            conflict_on_unique_violation(sqlx::Error::RowNotFound, duplicate_tractor_plate("X"));
        assert!(matches!(mapped, AppError::Database(_)));
    }
}
