//! Tabla de transiciones de estado del chofer
//!
//! Validación pura de la secuencia operativa, separada del acceso a base
//! de datos para poder testearla sin Postgres. El flujo normal estricto es:
//!
//! available → loading → driving → resting → driving → unloading
//!   → delivery_done → available

use crate::models::DriverStatus;

/// Precondiciones contextuales que la tabla necesita, ya resueltas por el
/// caller dentro de su misma transacción (lectura check-then-act segura).
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    /// El chofer tiene un viaje no finalizado asignado
    pub has_active_trip: bool,
    /// El viaje activo tiene al menos un período de descanso cerrado
    pub has_completed_rest: bool,
}

/// Valida que el cambio `current` → `requested` respete la secuencia
/// operativa y sus precondiciones. Devuelve el mensaje exacto de la
/// precondición incumplida.
pub fn validate_transition(
    current: DriverStatus,
    requested: DriverStatus,
    ctx: &TransitionContext,
) -> Result<(), String> {
    use DriverStatus::*;

    // Restricción especial: un chofer en viaje no puede tomarse licencia,
    // debe completar el viaje o descansar primero
    if current == Driving && (requested == TimeOff || requested == AnnualLeave) {
        return Err(
            "No puedes pasar de driving a time_off o annual_leave. Debes completar el viaje \
             primero (resting → unloading → delivery_done → available)."
                .to_string(),
        );
    }

    // Estados de excepción alcanzables desde cualquier estado (emergencias)
    if requested.is_exception() {
        return Ok(());
    }

    // Caso especial: available → loading sólo con viaje asignado
    if current == Available && requested == Loading {
        if !ctx.has_active_trip {
            return Err(
                "No puedes cambiar a loading sin un viaje asignado. El administrador debe \
                 asignarte un viaje primero."
                    .to_string(),
            );
        }
        return Ok(());
    }

    // Caso especial: driving → unloading sólo si ya cerró un descanso
    if current == Driving && requested == Unloading {
        if !ctx.has_active_trip {
            return Err(
                "No hay un viaje activo para este chofer. Debe crearse un viaje primero."
                    .to_string(),
            );
        }
        if !ctx.has_completed_rest {
            return Err(
                "Debes marcar resting antes de poder descargar. El sistema necesita registrar \
                 tus horas de descanso."
                    .to_string(),
            );
        }
        return Ok(());
    }

    let allowed: &[DriverStatus] = match current {
        Available => &[Loading],
        // Puede cancelar antes de salir
        Loading => &[Driving, Available],
        // resting es el camino obligatorio; unloading ya se resolvió arriba
        Driving => &[Resting, Unloading],
        Resting => &[Driving],
        Unloading => &[DeliveryDone, Driving, Available],
        DeliveryDone => &[Available],
        AnnualLeave | TimeOff | EquipmentRepair | Inactive => &[Available],
    };

    if allowed.contains(&requested) {
        return Ok(());
    }

    Err(rejection_message(current, requested))
}

/// Mensaje descriptivo según el estado actual
fn rejection_message(current: DriverStatus, requested: DriverStatus) -> String {
    use DriverStatus::*;

    match current {
        Available => {
            "Desde available sólo puedes pasar a loading cuando se te asigne un viaje.".to_string()
        }
        Loading => "Desde loading debes pasar a driving para iniciar el viaje, o volver a \
                    available si se cancela."
            .to_string(),
        Driving => "Desde driving debes pasar a resting para registrar tu período de descanso \
                    obligatorio."
            .to_string(),
        Resting => "Desde resting debes volver a driving para continuar el viaje.".to_string(),
        Unloading => "Desde unloading debes pasar a delivery_done con las toneladas descargadas, \
                      o puedes volver a driving/available."
            .to_string(),
        DeliveryDone => "Desde delivery_done se pasa automáticamente a available.".to_string(),
        _ => format!("No puedes cambiar de \"{}\" a \"{}\".", current, requested),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DriverStatus::*;

    fn ctx(trip: bool, rest: bool) -> TransitionContext {
        TransitionContext {
            has_active_trip: trip,
            has_completed_rest: rest,
        }
    }

    #[test]
    fn test_available_to_loading_requires_trip() {
        let err = validate_transition(Available, Loading, &ctx(false, false)).unwrap_err();
        assert!(err.contains("sin un viaje asignado"));

        assert!(validate_transition(Available, Loading, &ctx(true, false)).is_ok());
    }

    #[test]
    fn test_loading_can_cancel_back_to_available() {
        assert!(validate_transition(Loading, Available, &ctx(true, false)).is_ok());
        assert!(validate_transition(Loading, Driving, &ctx(true, false)).is_ok());
        assert!(validate_transition(Loading, Unloading, &ctx(true, false)).is_err());
    }

    #[test]
    fn test_driving_to_unloading_requires_closed_rest() {
        let err = validate_transition(Driving, Unloading, &ctx(true, false)).unwrap_err();
        assert!(err.contains("resting antes de poder descargar"));

        assert!(validate_transition(Driving, Unloading, &ctx(true, true)).is_ok());
    }

    #[test]
    fn test_driving_to_unloading_without_trip() {
        let err = validate_transition(Driving, Unloading, &ctx(false, false)).unwrap_err();
        assert!(err.contains("No hay un viaje activo"));
    }

    #[test]
    fn test_rest_cycle() {
        assert!(validate_transition(Driving, Resting, &ctx(true, false)).is_ok());
        assert!(validate_transition(Resting, Driving, &ctx(true, false)).is_ok());
        assert!(validate_transition(Resting, Unloading, &ctx(true, true)).is_err());
    }

    #[test]
    fn test_unloading_outcomes() {
        assert!(validate_transition(Unloading, DeliveryDone, &ctx(true, true)).is_ok());
        assert!(validate_transition(Unloading, Driving, &ctx(true, true)).is_ok());
        assert!(validate_transition(Unloading, Available, &ctx(true, true)).is_ok());
        assert!(validate_transition(Unloading, Resting, &ctx(true, true)).is_err());
    }

    #[test]
    fn test_delivery_done_only_to_available() {
        assert!(validate_transition(DeliveryDone, Available, &ctx(false, false)).is_ok());
        assert!(validate_transition(DeliveryDone, Loading, &ctx(true, false)).is_err());
    }

    #[test]
    fn test_exception_states_from_anywhere() {
        for current in [Available, Loading, Resting, Unloading, DeliveryDone, Inactive] {
            assert!(
                validate_transition(current, EquipmentRepair, &ctx(false, false)).is_ok(),
                "equipment_repair debería ser alcanzable desde {current}"
            );
            assert!(validate_transition(current, Inactive, &ctx(false, false)).is_ok());
        }
        // resting → annual_leave también es válido (excepción)
        assert!(validate_transition(Resting, AnnualLeave, &ctx(true, false)).is_ok());
    }

    #[test]
    fn test_driving_cannot_take_leave() {
        let err = validate_transition(Driving, TimeOff, &ctx(true, true)).unwrap_err();
        assert!(err.contains("Debes completar el viaje"));
        assert!(validate_transition(Driving, AnnualLeave, &ctx(true, true)).is_err());
        // pero equipment_repair e inactive sí se permiten desde driving
        assert!(validate_transition(Driving, EquipmentRepair, &ctx(true, false)).is_ok());
        assert!(validate_transition(Driving, Inactive, &ctx(true, false)).is_ok());
    }

    #[test]
    fn test_leave_states_return_to_available() {
        for current in [AnnualLeave, TimeOff, EquipmentRepair, Inactive] {
            assert!(validate_transition(current, Available, &ctx(false, false)).is_ok());
            assert!(validate_transition(current, Loading, &ctx(true, false)).is_err());
        }
    }

    #[test]
    fn test_rejection_messages_are_descriptive() {
        let err = validate_transition(Available, Driving, &ctx(true, false)).unwrap_err();
        assert!(err.contains("available"));
        let err = validate_transition(Resting, Available, &ctx(true, false)).unwrap_err();
        assert!(err.contains("resting"));
    }
}
