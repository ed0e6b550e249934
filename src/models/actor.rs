//! Identidad opaca del caller
//!
//! La capa de autenticación/autorización (externa a este núcleo) ya decidió
//! si el caller puede ejecutar la acción; acá sólo se usa para auditoría.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub display_name: String,
    pub role: String,
}

impl Actor {
    pub fn new(id: Uuid, display_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: role.into(),
        }
    }
}
