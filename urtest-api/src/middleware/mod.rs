/// Middleware for the urtest server
///
/// - `security`: security response headers
/// - `session`: session cookie resolution and the login guard

pub mod security;
pub mod session;
