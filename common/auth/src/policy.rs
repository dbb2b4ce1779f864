use std::collections::HashMap;

use axum::http::{HeaderMap, Method};

use crate::error::AuthResult;
use crate::guards::ensure_role;
use crate::roles::Role;
use crate::tokens::TokenService;
use crate::AuthContext;

/// Access rule declared for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// No token required.
    Public,
    /// Any valid access token.
    Authenticated,
    /// Valid access token whose role is in the list.
    Roles(&'static [Role]),
}

impl RouteAccess {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            RouteAccess::Roles(roles) => roles,
            _ => &[],
        }
    }
}

/// Per-route access metadata keyed by method and route pattern
/// (e.g. `PATCH /user/:id/role`).
///
/// Routes missing from the table require authentication.
#[derive(Debug, Clone, Default)]
pub struct AccessTable {
    rules: HashMap<Method, HashMap<&'static str, RouteAccess>>,
}

impl AccessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, method: Method, path: &'static str, access: RouteAccess) -> Self {
        self.rules.entry(method).or_default().insert(path, access);
        self
    }

    pub fn public(self, method: Method, path: &'static str) -> Self {
        self.rule(method, path, RouteAccess::Public)
    }

    pub fn authenticated(self, method: Method, path: &'static str) -> Self {
        self.rule(method, path, RouteAccess::Authenticated)
    }

    pub fn roles(self, method: Method, path: &'static str, roles: &'static [Role]) -> Self {
        self.rule(method, path, RouteAccess::Roles(roles))
    }

    pub fn lookup(&self, method: &Method, path: &str) -> RouteAccess {
        self.rules
            .get(method)
            .and_then(|paths| paths.get(path))
            .copied()
            .unwrap_or(RouteAccess::Authenticated)
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Method, &'static str, RouteAccess)> + '_ {
        self.rules
            .iter()
            .flat_map(|(method, paths)| paths.iter().map(move |(path, access)| (method, *path, *access)))
    }

    /// Run the guard chain for one request: authenticate unless the route is
    /// public, then enforce the route's allow-list.
    pub fn authorize(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        tokens: &TokenService,
    ) -> AuthResult<Option<AuthContext>> {
        let access = self.lookup(method, path);
        if access == RouteAccess::Public {
            return Ok(None);
        }

        let context = AuthContext::from_headers(headers, tokens)?;
        ensure_role(Some(&context), access.allowed_roles())?;
        Ok(Some(context))
    }
}
