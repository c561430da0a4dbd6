pub mod context;
pub mod jwt;

// Re-export public items
pub use context::{AuthContext, Scope};
pub use jwt::{Claims, JwtKeys};
