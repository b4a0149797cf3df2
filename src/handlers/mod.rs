// handlers/mod.rs - three handler tiers
//
// Public (no session) → Protected (session token) → Elevated (admin-only diagnostics)
//
// Every protected handler receives the verified `Identity` injected by the
// session middleware and asks `policy::enforce` before touching a store.
pub mod public;    // Tier 1: No authentication required (/auth/*)
pub mod protected; // Tier 2: Session token required
pub mod elevated;  // Tier 3: Admin-only diagnostics (/debug/*)
