pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod policy;
pub mod roles;
pub mod tokens;

pub use claims::Claims;
pub use config::TokenConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use guards::ensure_role;
pub use policy::{AccessTable, RouteAccess};
pub use roles::Role;
pub use tokens::{IssuedAccessToken, TokenPair, TokenService, TokenSubject};
