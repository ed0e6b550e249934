//! Rest Period Tracker
//!
//! Apertura y cierre de períodos de descanso ligados a un viaje, más el
//! acumulador de horas cacheado en el viaje. Las funciones operan sobre
//! `&mut PgConnection` para componerse dentro de la transacción del caller
//! (la máquina de estados del chofer abre/cierra períodos en la misma
//! unidad atómica que el cambio de estado).

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::RestPeriod;
use crate::utils::errors::{AppError, AppResult};

/// Horas entre dos instantes, redondeadas a 2 decimales
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let millis = (end - start).num_milliseconds();
    let hours = Decimal::from(millis) / Decimal::from(3_600_000_i64);
    hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Crear un nuevo período cuando el chofer comienza a descansar.
///
/// Si quedó un período abierto (estado defectuoso), se cierra primero
/// automáticamente y se deja constancia en el log.
pub async fn open_period(conn: &mut PgConnection, trip_id: Uuid) -> AppResult<RestPeriod> {
    let open = find_open_period(&mut *conn, trip_id).await?;

    if open.is_some() {
        warn!(
            "Ya existe un período de descanso abierto para el viaje {}. Cerrándolo automáticamente.",
            trip_id
        );
        close_period(&mut *conn, trip_id).await?;
    }

    let period = sqlx::query_as::<_, RestPeriod>(
        r#"
        INSERT INTO rest_periods (id, trip_id, rest_start, created_at, updated_at)
        VALUES ($1, $2, $3, $3, $3)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(trip_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    info!(
        "✓ Período de descanso {} iniciado para viaje {}",
        period.id, trip_id
    );

    Ok(period)
}

/// Finalizar el período abierto del viaje y actualizar el acumulador.
///
/// Devuelve las horas calculadas del período cerrado.
pub async fn close_period(conn: &mut PgConnection, trip_id: Uuid) -> AppResult<Decimal> {
    let open = find_open_period(&mut *conn, trip_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "No hay período de descanso abierto para el viaje {}",
                trip_id
            ))
        })?;

    let now = Utc::now();
    let hours = hours_between(open.rest_start, now);

    sqlx::query(
        r#"
        UPDATE rest_periods
        SET rest_end = $2, hours = $3, updated_at = $2
        WHERE id = $1
        "#,
    )
    .bind(open.id)
    .bind(now)
    .bind(hours)
    .execute(&mut *conn)
    .await?;

    info!(
        "✓ Período de descanso {} finalizado: {} horas",
        open.id, hours
    );

    recompute_trip_rest_hours(&mut *conn, trip_id).await?;

    Ok(hours)
}

/// Recalcular y persistir el acumulador del viaje como la suma de las
/// horas de todos sus períodos cerrados
pub async fn recompute_trip_rest_hours(
    conn: &mut PgConnection,
    trip_id: Uuid,
) -> AppResult<Decimal> {
    let (total,): (Decimal,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(hours), 0)
        FROM rest_periods
        WHERE trip_id = $1 AND rest_end IS NOT NULL
        "#,
    )
    .bind(trip_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE trips SET rest_hours = $2, updated_at = $3 WHERE id = $1")
        .bind(trip_id)
        .bind(total)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    info!("✓ Viaje {}: horas acumuladas actualizadas a {}", trip_id, total);

    Ok(total)
}

/// true si el viaje tiene al menos un período de descanso cerrado.
/// Es la precondición que consume la transición driving → unloading.
pub async fn has_completed_rest(conn: &mut PgConnection, trip_id: Uuid) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM rest_periods WHERE trip_id = $1 AND rest_end IS NOT NULL)",
    )
    .bind(trip_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

async fn find_open_period(
    conn: &mut PgConnection,
    trip_id: Uuid,
) -> AppResult<Option<RestPeriod>> {
    let period = sqlx::query_as::<_, RestPeriod>(
        r#"
        SELECT * FROM rest_periods
        WHERE trip_id = $1 AND rest_end IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(trip_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(period)
}

/// Acceso de sólo lectura para consumidores fuera de una transacción
pub struct RestPeriodService {
    pool: PgPool,
}

impl RestPeriodService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Todos los períodos de un viaje, en orden de creación
    pub async fn periods_for_trip(&self, trip_id: Uuid) -> AppResult<Vec<RestPeriod>> {
        let periods = sqlx::query_as::<_, RestPeriod>(
            "SELECT * FROM rest_periods WHERE trip_id = $1 ORDER BY created_at ASC",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(periods)
    }

    pub async fn has_completed_rest(&self, trip_id: Uuid) -> AppResult<bool> {
        let mut conn = self.pool.acquire().await?;
        has_completed_rest(&mut conn, trip_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_hours_between_exact() {
        let start = Utc::now();
        let end = start + Duration::hours(8);
        assert_eq!(hours_between(start, end), dec("8.00"));
    }

    #[test]
    fn test_hours_between_rounds_to_two_decimals() {
        let start = Utc::now();
        // 90 minutos = 1.5 horas
        assert_eq!(hours_between(start, start + Duration::minutes(90)), dec("1.5"));
        // 100 minutos = 1.666... → 1.67
        assert_eq!(hours_between(start, start + Duration::minutes(100)), dec("1.67"));
        // 1 minuto = 0.0166... → 0.02
        assert_eq!(hours_between(start, start + Duration::minutes(1)), dec("0.02"));
    }

    #[test]
    fn test_hours_between_zero() {
        let start = Utc::now();
        assert_eq!(hours_between(start, start), Decimal::ZERO);
    }

    #[test]
    fn test_hours_between_within_tolerance() {
        // Propiedad del acumulador: duración almacenada ≈ Δ real (±0.01)
        let start = Utc::now();
        let delta = Duration::minutes(347) + Duration::seconds(21);
        let stored = hours_between(start, start + delta);
        let real = Decimal::from(delta.num_milliseconds()) / Decimal::from(3_600_000_i64);
        assert!((stored - real).abs() <= dec("0.01"));
    }
}
