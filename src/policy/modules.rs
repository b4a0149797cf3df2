use std::collections::BTreeMap;

use super::Role;

/// Front-end modules whose visibility depends on the role.
pub const MODULES: [&str; 12] = [
    "academic-tracking",
    "nee-control",
    "tercera-matricula",
    "control-parcial",
    "control-final",
    "top-promedios",
    "consulta-estudiante",
    "consulta-docente",
    "distribucion-docente",
    "reportes",
    "config",
    "admin-panel",
];

fn allowed(role: Role, module: &str) -> bool {
    match role {
        Role::Admin => true,
        Role::Decano => !matches!(module, "config" | "admin-panel"),
        Role::Coordinador => !matches!(module, "config" | "admin-panel" | "distribucion-docente"),
        Role::Usuario => matches!(
            module,
            "top-promedios" | "consulta-estudiante" | "consulta-docente"
        ),
    }
}

/// Module visibility map for a role.
pub fn module_access(role: Role) -> BTreeMap<&'static str, bool> {
    MODULES.iter().map(|m| (*m, allowed(role, m))).collect()
}
