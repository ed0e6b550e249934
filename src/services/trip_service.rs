//! Trip Lifecycle Manager
//!
//! Creación de viajes (validando disponibilidad del triple chofer/tractor/
//! batea y el límite de carga) y eliminación con liberación atómica de
//! recursos. Los ids de recursos quedan congelados en el viaje al crearlo:
//! son un registro histórico y no se re-sincronizan con asignaciones
//! posteriores del chofer.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    Actor, CreateTripRequest, Driver, DriverStatus, Tractor, TractorStatus, Trailer,
    TrailerStatus, Trip, TripStatus,
};
use crate::utils::errors::{AppError, AppResult};

/// Límite operativo de carga: el mínimo entre ambas capacidades.
/// Una capacidad ausente cuenta como 0 (no se conoce, no se permite cargar).
pub fn load_limit(tractor_cap: Option<Decimal>, trailer_cap: Option<Decimal>) -> Decimal {
    let t = tractor_cap.unwrap_or(Decimal::ZERO);
    let b = trailer_cap.unwrap_or(Decimal::ZERO);
    t.min(b)
}

/// Valida las toneladas cargadas contra el límite operativo.
/// El límite es inclusivo: cargar exactamente min(capacidades) es válido.
pub fn validate_loaded_tons(
    loaded: Decimal,
    tractor_cap: Option<Decimal>,
    trailer_cap: Option<Decimal>,
) -> Result<(), String> {
    if loaded <= Decimal::ZERO {
        return Err("Las toneladas cargadas deben ser mayores a 0".to_string());
    }

    let limit = load_limit(tractor_cap, trailer_cap);
    if loaded > limit {
        return Err(format!(
            "Exceso de carga: la carga solicitada ({}t) excede el límite operativo de {}t \
             (Tractor: {}t, Batea: {}t)",
            loaded,
            limit,
            tractor_cap.unwrap_or(Decimal::ZERO),
            trailer_cap.unwrap_or(Decimal::ZERO),
        ));
    }

    Ok(())
}

/// Estado al que vuelve el chofer cuando su viaje se elimina: available
/// sólo si estaba en un estado ligado al viaje; en cualquier otro caso
/// (licencia, reparación, available) conserva el que tiene.
pub(crate) fn driver_release_status(current: DriverStatus) -> Option<DriverStatus> {
    if current.is_trip_related() {
        Some(DriverStatus::Available)
    } else {
        None
    }
}

/// Recurso liberado al eliminar un viaje
#[derive(Debug, Serialize)]
pub struct ReleasedResource {
    pub id: Uuid,
    pub label: String,
    pub new_status: String,
}

/// Resumen devuelto al caller tras eliminar un viaje
#[derive(Debug, Serialize)]
pub struct TripDeletionSummary {
    pub trip_id: Uuid,
    pub driver: Option<ReleasedResource>,
    pub tractor: Option<ReleasedResource>,
    pub trailer: Option<ReleasedResource>,
}

/// Viaje activo (no terminal) de un chofer, bloqueado dentro de la
/// transacción del caller. Compartido con la máquina de estados.
pub(crate) async fn find_active_trip_for_update(
    conn: &mut PgConnection,
    driver_id: Uuid,
) -> AppResult<Option<Trip>> {
    let trip = sqlx::query_as::<_, Trip>(
        r#"
        SELECT * FROM trips
        WHERE driver_id = $1 AND status NOT IN ($2, $3)
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(driver_id)
    .bind(TripStatus::Finished)
    .bind(TripStatus::Disputed)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(trip)
}

pub struct TripService {
    pool: PgPool,
}

impl TripService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Crear un viaje validando el triple chofer/tractor/batea.
    ///
    /// Todas las lecturas de precondición y las escrituras ocurren en una
    /// sola transacción con los tres recursos bloqueados, para que una
    /// modificación concurrente no invalide los checks ya hechos.
    pub async fn create(&self, request: CreateTripRequest) -> AppResult<Trip> {
        request.validate()?;

        // Orden de bloqueo fijo: chofer, tractor, batea
        let mut tx = self.pool.begin().await?;

        // 1. Validar chofer
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1 FOR UPDATE")
            .bind(request.driver_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Chofer {} no encontrado", request.driver_id))
            })?;

        if driver.status != DriverStatus::Available {
            return Err(AppError::Validation(format!(
                "El chofer debe estar available para iniciar un viaje. Estado actual: {}",
                driver.status
            )));
        }

        // 2. Validar tractor
        let tractor =
            sqlx::query_as::<_, Tractor>("SELECT * FROM tractors WHERE id = $1 FOR UPDATE")
                .bind(request.tractor_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Tractor {} no encontrado", request.tractor_id))
                })?;

        if tractor.status == TractorStatus::InMaintenance {
            return Err(AppError::Validation(format!(
                "El tractor con patente {} está en reparación.",
                tractor.license_plate
            )));
        }

        // 3. Validar batea
        let trailer =
            sqlx::query_as::<_, Trailer>("SELECT * FROM trailers WHERE id = $1 FOR UPDATE")
                .bind(request.trailer_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Batea {} no encontrada", request.trailer_id))
                })?;

        if trailer.status == TrailerStatus::InMaintenance {
            return Err(AppError::Validation(format!(
                "La batea con patente {} está en reparación.",
                trailer.license_plate
            )));
        }

        // 4. El chofer debe tener asignado exactamente el tractor pedido:
        //    crear un viaje nunca reasigna recursos en silencio
        if driver.tractor_id != Some(request.tractor_id) {
            return Err(AppError::Conflict(format!(
                "El tractor con patente {} no está asignado al chofer {}. Tractor actual del \
                 chofer: {}",
                tractor.license_plate,
                driver.full_name,
                driver
                    .tractor_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "ninguno".to_string())
            )));
        }

        // 5. Ídem con la batea
        if driver.trailer_id != Some(request.trailer_id) {
            return Err(AppError::Conflict(format!(
                "La batea con patente {} no está asignada al chofer {}. Batea actual del \
                 chofer: {}",
                trailer.license_plate,
                driver.full_name,
                driver
                    .trailer_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "ninguna".to_string())
            )));
        }

        // 6. Si el tractor tiene batea propia asignada, debe coincidir
        if let Some(linked) = tractor.trailer_id {
            if linked != request.trailer_id {
                return Err(AppError::Conflict(format!(
                    "El tractor con patente {} tiene asignada una batea diferente ({})",
                    tractor.license_plate, linked
                )));
            }
        }

        // 7. Límite de carga operativo
        if let Some(loaded) = request.loaded_tons {
            validate_loaded_tons(loaded, tractor.max_load_tons, trailer.max_load_tons)
                .map_err(AppError::Validation)?;
        }

        // 8. Persistir el viaje y marcar los recursos en uso
        let now = Utc::now();
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            INSERT INTO trips
                (id, origin, destination, departure_at, status, waybill_number,
                 loaded_tons, rest_hours, driver_id, tractor_id, trailer_id,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.origin)
        .bind(&request.destination)
        .bind(request.departure_at)
        .bind(TripStatus::Open)
        .bind(&request.waybill_number)
        .bind(request.loaded_tons)
        .bind(request.driver_id)
        .bind(request.tractor_id)
        .bind(request.trailer_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE tractors SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(request.tractor_id)
            .bind(TractorStatus::Busy)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE trailers SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(request.trailer_id)
            .bind(TrailerStatus::Loaded)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "✓ Viaje {} creado: {} → {} (chofer {}, tractor {}, batea {})",
            trip.id,
            trip.origin,
            trip.destination,
            driver.full_name,
            tractor.license_plate,
            trailer.license_plate
        );

        Ok(trip)
    }

    /// Eliminar un viaje liberando sus recursos en una sola transacción:
    /// tractor a idle y batea a empty incondicionalmente; el chofer vuelve
    /// a available sólo si estaba en un estado ligado al viaje.
    pub async fn delete(&self, trip_id: Uuid, actor: &Actor) -> AppResult<TripDeletionSummary> {
        info!(
            "[DELETE] Iniciando eliminación de viaje {} por {} ({})",
            trip_id, actor.display_name, actor.role
        );

        let mut tx = self.pool.begin().await?;

        // Mismo orden de bloqueo que la máquina de estados (chofer antes que
        // viaje): el id del chofer se lee sin bloquear la fila del viaje
        let peeked: Option<(Uuid,)> =
            sqlx::query_as("SELECT driver_id FROM trips WHERE id = $1")
                .bind(trip_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (driver_id,) = match peeked {
            Some(row) => row,
            None => {
                warn!("[DELETE] Viaje {} no encontrado", trip_id);
                return Err(AppError::NotFound(format!(
                    "El viaje con ID {} no existe",
                    trip_id
                )));
            }
        };

        // Los recursos del viaje pueden haber sido dados de baja
        // administrativamente; se tolera su ausencia.
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1 FOR UPDATE")
            .bind(driver_id)
            .fetch_optional(&mut *tx)
            .await?;

        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1 FOR UPDATE")
            .bind(trip_id)
            .fetch_optional(&mut *tx)
            .await?;

        // Pudo desaparecer entre la lectura inicial y el lock
        let trip = match trip {
            Some(t) => t,
            None => {
                warn!("[DELETE] Viaje {} no encontrado", trip_id);
                return Err(AppError::NotFound(format!(
                    "El viaje con ID {} no existe",
                    trip_id
                )));
            }
        };

        let now = Utc::now();

        let tractor =
            sqlx::query_as::<_, Tractor>("SELECT * FROM tractors WHERE id = $1 FOR UPDATE")
                .bind(trip.tractor_id)
                .fetch_optional(&mut *tx)
                .await?;

        let trailer =
            sqlx::query_as::<_, Trailer>("SELECT * FROM trailers WHERE id = $1 FOR UPDATE")
                .bind(trip.trailer_id)
                .fetch_optional(&mut *tx)
                .await?;

        let released_tractor = if let Some(ref t) = tractor {
            sqlx::query("UPDATE tractors SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(t.id)
                .bind(TractorStatus::Idle)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            info!("✓ Tractor {} liberado (estado: idle)", t.license_plate);
            Some(ReleasedResource {
                id: t.id,
                label: t.license_plate.clone(),
                new_status: TractorStatus::Idle.to_string(),
            })
        } else {
            None
        };

        let released_trailer = if let Some(ref b) = trailer {
            sqlx::query("UPDATE trailers SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(b.id)
                .bind(TrailerStatus::Empty)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            info!("✓ Batea {} liberada (estado: empty)", b.license_plate);
            Some(ReleasedResource {
                id: b.id,
                label: b.license_plate.clone(),
                new_status: TrailerStatus::Empty.to_string(),
            })
        } else {
            None
        };

        let released_driver = if let Some(ref d) = driver {
            let new_status = match driver_release_status(d.status) {
                Some(released) => {
                    sqlx::query(
                        "UPDATE drivers SET status = $2, status_changed_at = $3 WHERE id = $1",
                    )
                    .bind(d.id)
                    .bind(released)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    info!(
                        "✓ Chofer {} liberado (estado: {}, anterior: {})",
                        d.full_name, released, d.status
                    );
                    released
                }
                None => {
                    info!("Chofer {} mantiene su estado: {}", d.full_name, d.status);
                    d.status
                }
            };
            Some(ReleasedResource {
                id: d.id,
                label: d.full_name.clone(),
                new_status: new_status.to_string(),
            })
        } else {
            None
        };

        // El acumulador vive en el viaje: sus períodos se van con él
        sqlx::query("DELETE FROM rest_periods WHERE trip_id = $1")
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "[AUDITORÍA] {} (ID: {}, rol: {}) eliminó viaje {} - Recursos liberados: chofer={}, \
             tractor={}, batea={}",
            actor.display_name,
            actor.id,
            actor.role,
            trip_id,
            driver.as_ref().map(|d| d.full_name.as_str()).unwrap_or("N/A"),
            tractor.as_ref().map(|t| t.license_plate.as_str()).unwrap_or("N/A"),
            trailer.as_ref().map(|b| b.license_plate.as_str()).unwrap_or("N/A"),
        );

        Ok(TripDeletionSummary {
            trip_id,
            driver: released_driver,
            tractor: released_tractor,
            trailer: released_trailer,
        })
    }

    pub async fn get(&self, trip_id: Uuid) -> AppResult<Trip> {
        sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Viaje {} no encontrado", trip_id)))
    }

    pub async fn list(&self) -> AppResult<Vec<Trip>> {
        let trips =
            sqlx::query_as::<_, Trip>("SELECT * FROM trips ORDER BY departure_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(trips)
    }

    /// Viaje activo (no terminal) de un chofer, o None
    pub async fn active_trip_for_driver(&self, driver_id: Uuid) -> AppResult<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            SELECT * FROM trips
            WHERE driver_id = $1 AND status NOT IN ($2, $3)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .bind(TripStatus::Finished)
        .bind(TripStatus::Disputed)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_load_limit_takes_minimum() {
        assert_eq!(load_limit(Some(dec("30")), Some(dec("25"))), dec("25"));
        assert_eq!(load_limit(Some(dec("20")), Some(dec("28"))), dec("20"));
    }

    #[test]
    fn test_load_limit_missing_capacity_counts_as_zero() {
        assert_eq!(load_limit(None, Some(dec("25"))), Decimal::ZERO);
        assert_eq!(load_limit(Some(dec("30")), None), Decimal::ZERO);
        assert_eq!(load_limit(None, None), Decimal::ZERO);
    }

    #[test]
    fn test_loaded_tons_at_exact_limit_is_valid() {
        // El límite es inclusivo
        assert!(validate_loaded_tons(dec("25"), Some(dec("30")), Some(dec("25"))).is_ok());
    }

    #[test]
    fn test_loaded_tons_just_over_limit_fails_naming_both_capacities() {
        let err =
            validate_loaded_tons(dec("25.01"), Some(dec("30")), Some(dec("25"))).unwrap_err();
        assert!(err.contains("25.01t"), "mensaje: {err}");
        assert!(err.contains("límite operativo de 25t"), "mensaje: {err}");
        assert!(err.contains("Tractor: 30t"), "mensaje: {err}");
        assert!(err.contains("Batea: 25t"), "mensaje: {err}");
    }

    #[test]
    fn test_loaded_tons_must_be_positive() {
        assert!(validate_loaded_tons(Decimal::ZERO, Some(dec("30")), Some(dec("25"))).is_err());
        assert!(validate_loaded_tons(dec("-1"), Some(dec("30")), Some(dec("25"))).is_err());
    }

    #[test]
    fn test_loaded_tons_without_capacities_always_fails() {
        let err = validate_loaded_tons(dec("0.5"), None, None).unwrap_err();
        assert!(err.contains("límite operativo de 0t"));
    }

    #[test]
    fn test_driver_released_from_trip_related_states() {
        for status in [
            DriverStatus::Loading,
            DriverStatus::Driving,
            DriverStatus::Resting,
            DriverStatus::Unloading,
        ] {
            assert_eq!(driver_release_status(status), Some(DriverStatus::Available));
        }
    }

    #[test]
    fn test_driver_keeps_non_trip_states_on_release() {
        for status in [
            DriverStatus::Available,
            DriverStatus::DeliveryDone,
            DriverStatus::AnnualLeave,
            DriverStatus::TimeOff,
            DriverStatus::EquipmentRepair,
            DriverStatus::Inactive,
        ] {
            assert_eq!(driver_release_status(status), None);
        }
    }
}
