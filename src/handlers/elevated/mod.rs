// handlers/elevated/mod.rs - Elevated handlers (workspace admin required)
//
// Human-only endpoints behind `AdminUser`: the caller must hold the admin or
// superadmin role in their workspace. Agents never reach these routes.
//
// Route Prefix: /api/admin/*

pub mod members;

pub use members::list_members;
