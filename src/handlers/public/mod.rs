// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Route Prefix: /auth/*
// Middleware: None
//
// Credentials are never checked locally: the institutional UG API decides,
// and a signed session token is issued for registered, active users.

pub mod ug;

pub use ug::login as ug_login;
