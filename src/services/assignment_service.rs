//! Resource Assignment Registry
//!
//! Mantiene los vínculos bidireccionales chofer↔tractor, chofer↔batea y
//! tractor↔batea con a lo sumo un dueño por recurso. Toda mutación de
//! referencias cruzadas pasa por acá, dentro de una única transacción:
//! las lecturas de precondición (existencia, dueño actual) se toman en la
//! misma transacción que las escrituras para que una asignación
//! concurrente no se cuele entre el check y el write.
//!
//! Reasignar sin desasignar primero es un Conflict: el paso explícito
//! unassign-luego-assign evita el robo silencioso de recursos.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{Driver, Tractor, TractorStatus, Trailer};
use crate::utils::errors::{AppError, AppResult};

/// Tipo de recurso asignable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Driver,
    Tractor,
    Trailer,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Driver => "driver",
            ResourceKind::Tractor => "tractor",
            ResourceKind::Trailer => "trailer",
        };
        f.write_str(s)
    }
}

/// Snapshot del recurso actualizado que se devuelve al caller
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceSnapshot {
    Driver(Driver),
    Tractor(Tractor),
    Trailer(Trailer),
}

/// Columnas de referencia cruzada para un par (kind, counterpart).
/// Devuelve (tabla_a, columna_a→b, tabla_b, columna_b→a).
fn link_columns(
    kind: ResourceKind,
    counterpart: ResourceKind,
) -> Result<(&'static str, &'static str, &'static str, &'static str), String> {
    use ResourceKind::*;
    match (kind, counterpart) {
        (Driver, Tractor) => Ok(("drivers", "tractor_id", "tractors", "driver_id")),
        (Driver, Trailer) => Ok(("drivers", "trailer_id", "trailers", "driver_id")),
        (Tractor, Driver) => Ok(("tractors", "driver_id", "drivers", "tractor_id")),
        (Tractor, Trailer) => Ok(("tractors", "trailer_id", "trailers", "tractor_id")),
        (Trailer, Driver) => Ok(("trailers", "driver_id", "drivers", "trailer_id")),
        (Trailer, Tractor) => Ok(("trailers", "tractor_id", "tractors", "trailer_id")),
        (a, b) => Err(format!("Par de recursos inválido: {} ↔ {}", a, b)),
    }
}

/// Motivo puro de rechazo de un alta de vínculo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkRejection {
    /// El vínculo pedido ya existe tal cual
    AlreadyLinked,
    /// El dueño ya tiene otro counterpart vinculado
    HolderBusy(Uuid),
    /// El counterpart pertenece a otro dueño
    CounterpartTaken(Uuid),
}

/// Regla de propiedad única del registro, separada del SQL: un dueño tiene
/// a lo sumo un counterpart y viceversa, nunca se roba en silencio y
/// repetir un vínculo existente también se rechaza. Un vínculo a medias
/// (el counterpart ya apunta al dueño pero no al revés) se permite para
/// poder repararlo.
pub(crate) fn validate_new_link(
    holder_id: Uuid,
    holder_link: Option<Uuid>,
    counterpart_id: Uuid,
    counterpart_link: Option<Uuid>,
) -> Result<(), LinkRejection> {
    match holder_link {
        Some(current) if current == counterpart_id => {
            return Err(LinkRejection::AlreadyLinked);
        }
        Some(current) => return Err(LinkRejection::HolderBusy(current)),
        None => {}
    }

    if let Some(owner) = counterpart_link {
        if owner != holder_id {
            return Err(LinkRejection::CounterpartTaken(owner));
        }
    }

    Ok(())
}

pub struct AssignmentService {
    pool: PgPool,
}

impl AssignmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Comando genérico de asignación. Despacha al par tipado y devuelve
    /// el snapshot del recurso referido por `kind`.
    pub async fn assign(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        counterpart_kind: ResourceKind,
        counterpart_id: Uuid,
    ) -> AppResult<ResourceSnapshot> {
        use ResourceKind::*;
        match (kind, counterpart_kind) {
            (Driver, Tractor) => {
                self.assign_tractor_to_driver(resource_id, counterpart_id).await?;
            }
            (Tractor, Driver) => {
                self.assign_tractor_to_driver(counterpart_id, resource_id).await?;
            }
            (Driver, Trailer) => {
                self.assign_trailer_to_driver(resource_id, counterpart_id).await?;
            }
            (Trailer, Driver) => {
                self.assign_trailer_to_driver(counterpart_id, resource_id).await?;
            }
            (Tractor, Trailer) => {
                self.assign_trailer_to_tractor(resource_id, counterpart_id).await?;
            }
            (Trailer, Tractor) => {
                self.assign_trailer_to_tractor(counterpart_id, resource_id).await?;
            }
            (a, b) => {
                return Err(AppError::Validation(format!(
                    "Par de recursos inválido: {} ↔ {}",
                    a, b
                )))
            }
        }
        self.fetch_snapshot(kind, resource_id).await
    }

    /// Comando genérico de desasignación. Limpia las referencias de ambos
    /// lados; si no hay vínculo es un no-op idempotente (nunca falla por un
    /// vínculo inexistente, sólo por un recurso inexistente).
    pub async fn unassign(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        counterpart_kind: ResourceKind,
    ) -> AppResult<ResourceSnapshot> {
        let (table_a, col_ab, table_b, col_ba) =
            link_columns(kind, counterpart_kind).map_err(AppError::Validation)?;

        let mut tx = self.pool.begin().await?;

        let row: Option<(Option<Uuid>,)> = sqlx::query_as(&format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            col_ab, table_a
        ))
        .bind(resource_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (linked,) = row.ok_or_else(|| {
            AppError::NotFound(format!("{} {} no encontrado", kind, resource_id))
        })?;

        if let Some(counterpart_id) = linked {
            sqlx::query(&format!(
                "UPDATE {} SET {} = NULL WHERE id = $1",
                table_b, col_ba
            ))
            .bind(counterpart_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(&format!(
                "UPDATE {} SET {} = NULL WHERE id = $1",
                table_a, col_ab
            ))
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;

            info!(
                "✓ Vínculo {} {} ↔ {} {} eliminado",
                kind, resource_id, counterpart_kind, counterpart_id
            );
        }

        tx.commit().await?;

        self.fetch_snapshot(kind, resource_id).await
    }

    /// Asignar un tractor a un chofer (y el chofer al tractor)
    ///
    /// Si el tractor estaba idle pasa a busy; cualquier otro estado se
    /// conserva (un tractor en mantenimiento puede pre-asignarse).
    pub async fn assign_tractor_to_driver(
        &self,
        driver_id: Uuid,
        tractor_id: Uuid,
    ) -> AppResult<Driver> {
        // Orden de bloqueo fijo en todo el servicio: chofer, tractor, batea
        let mut tx = self.pool.begin().await?;

        let driver = lock_driver(&mut tx, driver_id).await?;
        let tractor = lock_tractor(&mut tx, tractor_id).await?;

        validate_new_link(driver_id, driver.tractor_id, tractor_id, tractor.driver_id).map_err(
            |rejection| {
                AppError::Conflict(match rejection {
                    LinkRejection::AlreadyLinked => format!(
                        "El tractor {} ya está asignado al chofer {}",
                        tractor.license_plate, driver.full_name
                    ),
                    LinkRejection::HolderBusy(current) => format!(
                        "El chofer {} ya tiene asignado otro tractor ({}). Desasignalo primero.",
                        driver.full_name, current
                    ),
                    LinkRejection::CounterpartTaken(holder) => format!(
                        "El tractor {} ya está asignado a otro chofer ({}). Desasignalo primero.",
                        tractor.license_plate, holder
                    ),
                })
            },
        )?;

        let new_status = if tractor.status == TractorStatus::Idle {
            TractorStatus::Busy
        } else {
            tractor.status
        };

        sqlx::query(
            "UPDATE tractors SET driver_id = $2, status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(tractor_id)
        .bind(driver_id)
        .bind(new_status)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE drivers SET tractor_id = $2 WHERE id = $1")
            .bind(driver_id)
            .bind(tractor_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "✓ Tractor {} asignado al chofer {} (estado: {})",
            tractor.license_plate, driver.full_name, new_status
        );

        self.find_driver(driver_id).await
    }

    /// Asignar una batea a un chofer (y el chofer a la batea)
    pub async fn assign_trailer_to_driver(
        &self,
        driver_id: Uuid,
        trailer_id: Uuid,
    ) -> AppResult<Driver> {
        let mut tx = self.pool.begin().await?;

        let driver = lock_driver(&mut tx, driver_id).await?;
        let trailer = lock_trailer(&mut tx, trailer_id).await?;

        validate_new_link(driver_id, driver.trailer_id, trailer_id, trailer.driver_id).map_err(
            |rejection| {
                AppError::Conflict(match rejection {
                    LinkRejection::AlreadyLinked => format!(
                        "La batea {} ya está asignada al chofer {}",
                        trailer.license_plate, driver.full_name
                    ),
                    LinkRejection::HolderBusy(current) => format!(
                        "El chofer {} ya tiene asignada otra batea ({}). Desasignala primero.",
                        driver.full_name, current
                    ),
                    LinkRejection::CounterpartTaken(holder) => format!(
                        "La batea {} ya está asignada a otro chofer ({}). Desasignala primero.",
                        trailer.license_plate, holder
                    ),
                })
            },
        )?;

        sqlx::query("UPDATE trailers SET driver_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(trailer_id)
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE drivers SET trailer_id = $2 WHERE id = $1")
            .bind(driver_id)
            .bind(trailer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "✓ Batea {} asignada al chofer {}",
            trailer.license_plate, driver.full_name
        );

        self.find_driver(driver_id).await
    }

    /// Asignar una batea a un tractor (y el tractor a la batea)
    pub async fn assign_trailer_to_tractor(
        &self,
        tractor_id: Uuid,
        trailer_id: Uuid,
    ) -> AppResult<Tractor> {
        let mut tx = self.pool.begin().await?;

        let tractor = lock_tractor(&mut tx, tractor_id).await?;
        let trailer = lock_trailer(&mut tx, trailer_id).await?;

        validate_new_link(tractor_id, tractor.trailer_id, trailer_id, trailer.tractor_id).map_err(
            |rejection| {
                AppError::Conflict(match rejection {
                    LinkRejection::AlreadyLinked => format!(
                        "La batea {} ya está asignada al tractor {}",
                        trailer.license_plate, tractor.license_plate
                    ),
                    LinkRejection::HolderBusy(current) => format!(
                        "El tractor {} ya tiene asignada otra batea ({}). Desasignala primero.",
                        tractor.license_plate, current
                    ),
                    LinkRejection::CounterpartTaken(holder) => format!(
                        "La batea {} ya está asignada a otro tractor ({}). Desasignala primero.",
                        trailer.license_plate, holder
                    ),
                })
            },
        )?;

        sqlx::query("UPDATE trailers SET tractor_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(trailer_id)
            .bind(tractor_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE tractors SET trailer_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(tractor_id)
            .bind(trailer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "✓ Batea {} asignada al tractor {}",
            trailer.license_plate, tractor.license_plate
        );

        self.find_tractor(tractor_id).await
    }

    async fn fetch_snapshot(&self, kind: ResourceKind, id: Uuid) -> AppResult<ResourceSnapshot> {
        let snapshot = match kind {
            ResourceKind::Driver => ResourceSnapshot::Driver(self.find_driver(id).await?),
            ResourceKind::Tractor => ResourceSnapshot::Tractor(self.find_tractor(id).await?),
            ResourceKind::Trailer => ResourceSnapshot::Trailer(self.find_trailer(id).await?),
        };
        Ok(snapshot)
    }

    async fn find_driver(&self, id: Uuid) -> AppResult<Driver> {
        sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chofer {} no encontrado", id)))
    }

    async fn find_tractor(&self, id: Uuid) -> AppResult<Tractor> {
        sqlx::query_as::<_, Tractor>("SELECT * FROM tractors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tractor {} no encontrado", id)))
    }

    async fn find_trailer(&self, id: Uuid) -> AppResult<Trailer> {
        sqlx::query_as::<_, Trailer>("SELECT * FROM trailers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batea {} no encontrada", id)))
    }
}

async fn lock_driver(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> AppResult<Driver> {
    sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chofer {} no encontrado", id)))
}

async fn lock_tractor(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> AppResult<Tractor> {
    sqlx::query_as::<_, Tractor>("SELECT * FROM tractors WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tractor {} no encontrado", id)))
}

async fn lock_trailer(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> AppResult<Trailer> {
    sqlx::query_as::<_, Trailer>("SELECT * FROM trailers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batea {} no encontrada", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_columns_all_valid_pairs() {
        assert_eq!(
            link_columns(ResourceKind::Driver, ResourceKind::Tractor).unwrap(),
            ("drivers", "tractor_id", "tractors", "driver_id")
        );
        assert_eq!(
            link_columns(ResourceKind::Trailer, ResourceKind::Tractor).unwrap(),
            ("trailers", "tractor_id", "tractors", "trailer_id")
        );
        assert_eq!(
            link_columns(ResourceKind::Tractor, ResourceKind::Trailer).unwrap(),
            ("tractors", "trailer_id", "trailers", "tractor_id")
        );
    }

    #[test]
    fn test_link_columns_rejects_same_kind() {
        assert!(link_columns(ResourceKind::Driver, ResourceKind::Driver).is_err());
        assert!(link_columns(ResourceKind::Tractor, ResourceKind::Tractor).is_err());
        assert!(link_columns(ResourceKind::Trailer, ResourceKind::Trailer).is_err());
    }

    #[test]
    fn test_link_columns_are_mirrored() {
        // La columna a→b de un sentido es la b→a del sentido inverso
        let (ta, cab, tb, cba) =
            link_columns(ResourceKind::Driver, ResourceKind::Trailer).unwrap();
        let (tb2, cba2, ta2, cab2) =
            link_columns(ResourceKind::Trailer, ResourceKind::Driver).unwrap();
        assert_eq!((ta, cab), (ta2, cab2));
        assert_eq!((tb, cba), (tb2, cba2));
    }

    #[test]
    fn test_new_link_allows_free_pair() {
        let holder = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        assert_eq!(validate_new_link(holder, None, counterpart, None), Ok(()));
    }

    #[test]
    fn test_new_link_rejects_identical_existing_link() {
        let holder = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        assert_eq!(
            validate_new_link(holder, Some(counterpart), counterpart, Some(holder)),
            Err(LinkRejection::AlreadyLinked)
        );
    }

    #[test]
    fn test_new_link_rejects_busy_holder() {
        // Un dueño con counterpart vinculado no recibe otro sin desasignar
        let holder = Uuid::new_v4();
        let current = Uuid::new_v4();
        let requested = Uuid::new_v4();
        assert_eq!(
            validate_new_link(holder, Some(current), requested, None),
            Err(LinkRejection::HolderBusy(current))
        );
    }

    #[test]
    fn test_new_link_rejects_taken_counterpart() {
        // Propiedad única: el counterpart de otro dueño no se roba
        let holder = Uuid::new_v4();
        let other_owner = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        assert_eq!(
            validate_new_link(holder, None, counterpart, Some(other_owner)),
            Err(LinkRejection::CounterpartTaken(other_owner))
        );
    }

    #[test]
    fn test_new_link_allows_repairing_one_sided_link() {
        // El counterpart ya apunta al dueño pero el dueño no: se repara
        let holder = Uuid::new_v4();
        let counterpart = Uuid::new_v4();
        assert_eq!(
            validate_new_link(holder, None, counterpart, Some(holder)),
            Ok(())
        );
    }

    #[test]
    fn test_resource_kind_serde() {
        let k: ResourceKind = serde_json::from_str("\"trailer\"").unwrap();
        assert_eq!(k, ResourceKind::Trailer);
        assert_eq!(serde_json::to_string(&ResourceKind::Driver).unwrap(), "\"driver\"");
    }
}
