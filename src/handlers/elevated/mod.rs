// handlers/elevated/mod.rs - Elevated handlers (admin only)
//
// Security Level: Session token + `InspectStorage` capability
// Route Prefix: /debug/*

pub mod storage;
