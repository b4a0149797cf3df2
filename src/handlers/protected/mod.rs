// handlers/protected/mod.rs - Protected handlers (session token required)
//
// Security Level: Session token + policy decision per handler
// Route Prefix: /api/*, /usuarios, /files, /upload, /download, /delete,
//               /plantillas, /correo-autoridad, /send-email
// Middleware: session_auth_middleware (token → Identity)
//
// Each handler starts with `policy::enforce`. When a request names a target
// faculty, its existence is checked first so an unknown code is a 404 for
// every caller.

pub mod authority;
pub mod catalogs;
pub mod email;
pub mod files;
pub mod session;
pub mod templates;
pub mod users;
pub mod utils;
