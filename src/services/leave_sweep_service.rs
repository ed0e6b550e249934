//! Expiry Sweep
//!
//! Barrido periódico de licencias vencidas: choferes en annual_leave o
//! time_off cuya fecha de fin ya pasó vuelven forzosamente a available.
//! Es una transición iniciada por el sistema, por eso no pasa por el flag
//! de confirmación, pero escribe por la misma ruta de actualización de
//! estado que la máquina de estados. Es una función común: `main` la
//! dispara en un intervalo y los tests pueden invocarla directamente.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::models::{Driver, DriverStatus};
use crate::services::driver_state_service::apply_status_update;
use crate::utils::errors::AppResult;

/// Razón registrada en la transición automática
fn auto_reason(previous: DriverStatus) -> String {
    format!("Cambio automático: {} finalizado", previous)
}

/// Predicado de vencimiento: sólo las licencias (annual_leave, time_off)
/// con fecha de fin ya alcanzada vencen. Una licencia abierta (sin fin)
/// nunca vence sola.
fn is_leave_expired(
    status: DriverStatus,
    leave_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if !matches!(status, DriverStatus::AnnualLeave | DriverStatus::TimeOff) {
        return false;
    }

    match leave_end {
        Some(end) => end <= now,
        None => false,
    }
}

pub struct LeaveSweepService {
    pool: PgPool,
}

impl LeaveSweepService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Forzar a available los choferes con licencia vencida.
    ///
    /// Devuelve la cantidad de choferes transicionados. Las filas se
    /// bloquean (FOR UPDATE) para serializar contra cambios interactivos
    /// sobre el mismo chofer; ambos caminos convergen en available, por lo
    /// que last-writer-wins es aceptable.
    pub async fn sweep_expired_leaves(&self) -> AppResult<u64> {
        info!("🔍 Iniciando verificación de licencias vencidas...");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Candidatos: toda licencia con fecha de fin. El predicado de
        // vencimiento corre en Rust sobre las filas ya bloqueadas.
        let candidates = sqlx::query_as::<_, Driver>(
            r#"
            SELECT * FROM drivers
            WHERE status IN ($1, $2)
              AND leave_end IS NOT NULL
            FOR UPDATE
            "#,
        )
        .bind(DriverStatus::AnnualLeave)
        .bind(DriverStatus::TimeOff)
        .fetch_all(&mut *tx)
        .await?;

        let expired: Vec<&Driver> = candidates
            .iter()
            .filter(|d| is_leave_expired(d.status, d.leave_end, now))
            .collect();

        if expired.is_empty() {
            info!("✓ No hay licencias vencidas para actualizar");
            return Ok(0);
        }

        info!("Encontrados {} chofer(es) con licencia vencida", expired.len());

        for driver in &expired {
            let reason = auto_reason(driver.status);
            apply_status_update(
                &mut *tx,
                driver.id,
                DriverStatus::Available,
                Some(&reason),
                None,
                None,
            )
            .await?;

            info!(
                "✅ Chofer {} ({}): {} → available",
                driver.full_name, driver.id, driver.status
            );
            debug!(
                "   Razón anterior: {:?}, fecha fin: {:?}",
                driver.status_reason, driver.leave_end
            );
        }

        tx.commit().await?;

        info!(
            "✓ Actualización completa: {} chofer(es) ahora available",
            expired.len()
        );

        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn test_leave_ended_in_the_past_is_expired() {
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        assert!(is_leave_expired(DriverStatus::AnnualLeave, Some(yesterday), now));
        assert!(is_leave_expired(DriverStatus::TimeOff, Some(yesterday), now));
    }

    #[test]
    fn test_leave_ending_exactly_now_is_expired() {
        let now = Utc::now();
        assert!(is_leave_expired(DriverStatus::TimeOff, Some(now), now));
    }

    #[test]
    fn test_leave_ending_tomorrow_is_untouched() {
        let now = Utc::now();
        let tomorrow = now + Duration::days(1);
        assert!(!is_leave_expired(DriverStatus::AnnualLeave, Some(tomorrow), now));
        assert!(!is_leave_expired(DriverStatus::TimeOff, Some(tomorrow), now));
    }

    #[test]
    fn test_open_ended_leave_never_expires() {
        assert!(!is_leave_expired(DriverStatus::AnnualLeave, None, Utc::now()));
    }

    #[test]
    fn test_only_leave_states_expire() {
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        assert!(!is_leave_expired(DriverStatus::EquipmentRepair, Some(yesterday), now));
        assert!(!is_leave_expired(DriverStatus::Inactive, Some(yesterday), now));
        assert!(!is_leave_expired(DriverStatus::Available, Some(yesterday), now));
    }

    #[test]
    fn test_auto_reason_names_previous_status() {
        assert_eq!(
            auto_reason(DriverStatus::TimeOff),
            "Cambio automático: time_off finalizado"
        );
        assert_eq!(
            auto_reason(DriverStatus::AnnualLeave),
            "Cambio automático: annual_leave finalizado"
        );
    }
}
