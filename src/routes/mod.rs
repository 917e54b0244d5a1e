/// Router Module Index
///
/// Splits the HTTP surface by access level. Each module's routes are merged into one
/// router in `create_router`; paths shared across modules (e.g. `GET /camps` and
/// `POST /camps`) resolve by method.

/// Routes accessible to anyone.
pub mod public;

/// Routes that require a verified bearer token.
pub mod authenticated;

/// Routes that require a verified bearer token belonging to an admin.
pub mod admin;
