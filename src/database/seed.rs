//! Rows every fresh installation starts with.

pub const ROLES: [&str; 4] = ["admin", "decano", "coordinador", "usuario"];

/// (code, name)
pub const FACULTIES: [(&str, &str); 5] = [
    ("ADM", "Facultad de Ciencias Administrativas"),
    ("ING", "Facultad de Ingeniería"),
    ("MED", "Facultad de Ciencias Médicas"),
    ("EDU", "Facultad de Filosofía, Letras y Ciencias de la Educación"),
    ("JUR", "Facultad de Jurisprudencia"),
];

/// (code, faculty code, name)
pub const CAREERS: [(&str, &str, &str); 6] = [
    ("ADM", "ADM", "Administración de Empresas"),
    ("CON", "ADM", "Contaduría Pública"),
    ("SIS", "ING", "Ingeniería en Sistemas"),
    ("IND", "ING", "Ingeniería Industrial"),
    ("MED", "MED", "Medicina"),
    ("ENF", "MED", "Enfermería"),
];

/// Role id (1-based position in [`ROLES`]) and faculty of the seeded administrator.
pub const ADMIN_ROLE_ID: i32 = 1;
pub const ADMIN_FACULTY: &str = "ADM";
