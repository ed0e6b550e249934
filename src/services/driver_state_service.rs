//! Driver State Machine
//!
//! Orquesta los cambios de estado del chofer: valida la transición contra
//! la tabla y sus precondiciones contextuales, dispara los efectos sobre
//! períodos de descanso y viaje, y persiste todo en una única transacción.
//! El viaje activo y el chofer se bloquean al inicio (FOR UPDATE) para que
//! dos requests concurrentes sobre el mismo chofer se serialicen.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    ChangeDriverStateRequest, CreateDriverRequest, Driver, DriverStatus, TractorStatus,
    TrailerStatus, Trip, TripStatus,
};
use crate::services::rest_period_service;
use crate::services::state_transitions::{validate_transition, TransitionContext};
use crate::services::trip_service::find_active_trip_for_update;
use crate::utils::errors::{AppError, AppResult};

/// Reglas de fechas para estados de excepción: inicio obligatorio,
/// fin opcional pero nunca anterior al inicio
pub fn validate_leave_dates(
    status: DriverStatus,
    leave_start: Option<DateTime<Utc>>,
    leave_end: Option<DateTime<Utc>>,
) -> Result<(), String> {
    if !status.requires_leave_dates() {
        return Ok(());
    }

    let start = match leave_start {
        Some(s) => s,
        None => return Err("La fecha de inicio es obligatoria para este estado".to_string()),
    };

    if let Some(end) = leave_end {
        if end < start {
            return Err(
                "La fecha de fin no puede ser anterior a la fecha de inicio".to_string(),
            );
        }
    }

    Ok(())
}

/// Única ruta de escritura del estado del chofer. La usan tanto la máquina
/// de estados (request de usuario) como el barrido de licencias vencidas
/// (transición de sistema, sin flag de confirmación).
pub(crate) async fn apply_status_update(
    conn: &mut PgConnection,
    driver_id: Uuid,
    status: DriverStatus,
    reason: Option<&str>,
    leave_start: Option<DateTime<Utc>>,
    leave_end: Option<DateTime<Utc>>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE drivers
        SET status = $2, status_reason = $3, leave_start = $4, leave_end = $5,
            status_changed_at = $6
        WHERE id = $1
        "#,
    )
    .bind(driver_id)
    .bind(status)
    .bind(reason)
    .bind(leave_start)
    .bind(leave_end)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub struct DriverStateService {
    pool: PgPool,
}

impl DriverStateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cambiar el estado operativo de un chofer.
    ///
    /// Pedir el estado que ya tiene es siempre un Conflict, nunca un no-op
    /// silencioso. Todo cambio exige `confirmed: true` del caller.
    pub async fn change_state(
        &self,
        driver_id: Uuid,
        request: ChangeDriverStateRequest,
    ) -> AppResult<Driver> {
        request.validate()?;
        let new_status = request.new_status;

        let mut tx = self.pool.begin().await?;

        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1 FOR UPDATE")
            .bind(driver_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chofer {} no encontrado", driver_id)))?;

        if driver.status == new_status {
            return Err(AppError::Conflict(
                "El estado es el mismo que ya tiene".to_string(),
            ));
        }

        // Confirmación explícita para CUALQUIER cambio de estado
        if !request.confirmed {
            return Err(AppError::Validation(
                "Se requiere confirmación para cambiar de estado. Debes confirmar \
                 explícitamente este cambio."
                    .to_string(),
            ));
        }

        // Precondiciones contextuales, leídas dentro de esta misma
        // transacción (el viaje activo queda bloqueado)
        let active_trip = find_active_trip_for_update(&mut *tx, driver_id).await?;
        let has_completed_rest = match &active_trip {
            Some(trip) => rest_period_service::has_completed_rest(&mut *tx, trip.id).await?,
            None => false,
        };

        let ctx = TransitionContext {
            has_active_trip: active_trip.is_some(),
            has_completed_rest,
        };
        validate_transition(driver.status, new_status, &ctx).map_err(AppError::Validation)?;
        validate_leave_dates(new_status, request.leave_start, request.leave_end)
            .map_err(AppError::Validation)?;

        // --- Efectos según el estado destino ---
        let mut final_status = new_status;

        match new_status {
            DriverStatus::Resting => {
                if let Some(trip) = &active_trip {
                    rest_period_service::open_period(&mut *tx, trip.id).await?;
                    info!("✓ Viaje {}: nuevo período de descanso iniciado", trip.id);
                }
            }
            DriverStatus::Driving if driver.status == DriverStatus::Resting => {
                if let Some(trip) = &active_trip {
                    rest_period_service::close_period(&mut *tx, trip.id).await?;
                    info!(
                        "✓ Viaje {}: período de descanso finalizado y horas acumuladas",
                        trip.id
                    );
                }
            }
            DriverStatus::Unloading => match (&active_trip, request.unloaded_tons) {
                (Some(trip), Some(tons)) => {
                    sqlx::query(
                        "UPDATE trips SET unloaded_tons = $2, updated_at = $3 WHERE id = $1",
                    )
                    .bind(trip.id)
                    .bind(tons)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                    info!("✓ Viaje {}: {} toneladas registradas", trip.id, tons);
                }
                (None, Some(_)) => {
                    return Err(AppError::Validation(
                        "No hay un viaje activo para registrar toneladas".to_string(),
                    ));
                }
                _ => {}
            },
            DriverStatus::DeliveryDone => {
                let trip = active_trip.as_ref().ok_or_else(|| {
                    AppError::Validation(
                        "No puedes finalizar la entrega sin tener un viaje activo".to_string(),
                    )
                })?;

                let tons = match request.unloaded_tons {
                    Some(t) if t > rust_decimal::Decimal::ZERO => t,
                    _ => {
                        return Err(AppError::Validation(
                            "Debes proporcionar las toneladas descargadas (mayor a 0)"
                                .to_string(),
                        ))
                    }
                };

                finish_trip(&mut *tx, trip, tons).await?;

                // El chofer queda disponible, manteniendo tractor y batea asignados
                final_status = DriverStatus::Available;
                info!(
                    "✓ Chofer {} ahora available (mantiene tractor y batea asignados)",
                    driver.full_name
                );
            }
            _ => {}
        }

        // Fechas de licencia sólo para estados de excepción; el resto las limpia
        let (leave_start, leave_end) = if new_status.is_exception() {
            (request.leave_start, request.leave_end)
        } else {
            (None, None)
        };

        apply_status_update(
            &mut *tx,
            driver_id,
            final_status,
            request.reason.as_deref(),
            leave_start,
            leave_end,
        )
        .await?;

        // Espejar el estado del viaje en curso (delivery_done ya lo finalizó)
        if new_status != DriverStatus::DeliveryDone {
            if let Some(trip) = &active_trip {
                let mirrored = match new_status {
                    DriverStatus::Loading => Some(TripStatus::Loading),
                    DriverStatus::Driving => Some(TripStatus::Driving),
                    DriverStatus::Resting => Some(TripStatus::Resting),
                    DriverStatus::Unloading => Some(TripStatus::Unloading),
                    _ => None,
                };

                if let Some(trip_status) = mirrored {
                    sqlx::query("UPDATE trips SET status = $2, updated_at = $3 WHERE id = $1")
                        .bind(trip.id)
                        .bind(trip_status)
                        .bind(Utc::now())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        info!(
            "✓ Chofer {}: {} → {}",
            driver.full_name, driver.status, final_status
        );

        self.get(driver_id).await
    }

    pub async fn get(&self, driver_id: Uuid) -> AppResult<Driver> {
        sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1")
            .bind(driver_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chofer {} no encontrado", driver_id)))
    }

    pub async fn list(&self, status: Option<DriverStatus>) -> AppResult<Vec<Driver>> {
        let drivers = match status {
            Some(s) => {
                sqlx::query_as::<_, Driver>(
                    "SELECT * FROM drivers WHERE status = $1 ORDER BY full_name ASC",
                )
                .bind(s)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Driver>("SELECT * FROM drivers ORDER BY full_name ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(drivers)
    }

    /// Alta administrativa de un chofer, inicialmente available
    pub async fn create(&self, request: CreateDriverRequest) -> AppResult<Driver> {
        request.validate()?;

        let driver = sqlx::query_as::<_, Driver>(
            r#"
            INSERT INTO drivers (id, full_name, status, created_at, status_changed_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.full_name)
        .bind(DriverStatus::Available)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!("✓ Chofer {} creado ({})", driver.full_name, driver.id);

        Ok(driver)
    }
}

/// Finalizar el viaje activo: toneladas, fecha de descarga y estado
/// finished; el tractor vuelve a idle y la batea a empty, ambos
/// manteniendo su asignación al chofer.
async fn finish_trip(
    conn: &mut PgConnection,
    trip: &Trip,
    unloaded_tons: rust_decimal::Decimal,
) -> AppResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE trips
        SET unloaded_tons = $2, unloaded_at = $3, status = $4, updated_at = $3
        WHERE id = $1
        "#,
    )
    .bind(trip.id)
    .bind(unloaded_tons)
    .bind(now)
    .bind(TripStatus::Finished)
    .execute(&mut *conn)
    .await?;

    info!(
        "✓ Viaje {}: {} toneladas, fecha de descarga registrada, estado finished",
        trip.id, unloaded_tons
    );

    sqlx::query("UPDATE tractors SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(trip.tractor_id)
        .bind(TractorStatus::Idle)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE trailers SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(trip.trailer_id)
        .bind(TrailerStatus::Empty)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    info!(
        "✓ Tractor {} ahora idle y batea {} ahora empty (mantienen asignación al chofer)",
        trip.tractor_id, trip.trailer_id
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_leave_dates_required_for_exception_states() {
        let err = validate_leave_dates(DriverStatus::AnnualLeave, None, None).unwrap_err();
        assert!(err.contains("fecha de inicio es obligatoria"));

        let err = validate_leave_dates(DriverStatus::TimeOff, None, Some(Utc::now())).unwrap_err();
        assert!(err.contains("fecha de inicio es obligatoria"));
    }

    #[test]
    fn test_leave_end_may_be_open() {
        assert!(validate_leave_dates(DriverStatus::TimeOff, Some(Utc::now()), None).is_ok());
    }

    #[test]
    fn test_leave_end_before_start_is_rejected() {
        let start = Utc::now();
        let end = start - Duration::days(1);
        let err =
            validate_leave_dates(DriverStatus::AnnualLeave, Some(start), Some(end)).unwrap_err();
        assert!(err.contains("no puede ser anterior"));
    }

    #[test]
    fn test_leave_end_equal_to_start_is_valid() {
        let start = Utc::now();
        assert!(
            validate_leave_dates(DriverStatus::EquipmentRepair, Some(start), Some(start)).is_ok()
        );
    }

    #[test]
    fn test_non_exception_states_ignore_dates() {
        assert!(validate_leave_dates(DriverStatus::Driving, None, None).is_ok());
        assert!(validate_leave_dates(DriverStatus::Available, None, None).is_ok());
    }
}
