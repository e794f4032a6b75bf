/// Router Module Index
///
/// Routes split by how much the caller has to prove before the handler runs.

/// Routes open to anonymous callers: health, login, registration, refresh.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware.
pub mod authenticated;

/// Role and permission administration. Authenticated, then gated on `permission:assign`.
pub mod admin;
