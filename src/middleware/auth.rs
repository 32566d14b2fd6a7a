use axum::response::{Response, IntoResponse};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use serde::Serialize;
use crate::auth::jwt::verify_token;

pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_CLERK: &str = "clerk";

// The session context for the authenticated warehouse user. Resolved once
// here; handlers ask this extension instead of re-parsing the token.
#[derive(Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: String,
    pub username: String,
}

impl AuthContext {
    /// Managers administer merchants, orders, users and resolutions.
    pub fn is_manager(&self) -> bool {
        self.role == ROLE_MANAGER
    }

    /// Receiving at the dock is clerk work; managers can also do it.
    pub fn can_record_deliveries(&self) -> bool {
        self.role == ROLE_MANAGER || self.role == ROLE_CLERK
    }
}

#[derive(Serialize)]
struct ErrorBody { error: String, code: &'static str }

pub async fn require_auth(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let auth_header = match req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok()) {
        Some(h) => h,
        None => return unauthorized("Missing bearer token"),
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return unauthorized("Authorization header must be 'Bearer <token>'"),
    };

    let secret = match std::env::var("JWT_SECRET") {
        Ok(s) => s,
        Err(_) => return unauthorized("Server auth misconfiguration"),
    };

    let claims = match verify_token(token, &secret) {
        Ok(c) => c,
        Err(_) => return unauthorized("Session token rejected"),
    };

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        role: claims.role,
        username: claims.username,
    });

    next.run(req).await
}

fn unauthorized(msg: &str) -> Response {
    let body = axum::Json(ErrorBody { error: msg.to_string(), code: "unauthorized" });
    (StatusCode::UNAUTHORIZED, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: &str) -> AuthContext {
        AuthContext { user_id: 1, role: role.to_string(), username: "pat".to_string() }
    }

    #[test]
    fn clerks_record_deliveries_but_do_not_administer() {
        let clerk = ctx(ROLE_CLERK);
        assert!(clerk.can_record_deliveries());
        assert!(!clerk.is_manager());
    }

    #[test]
    fn managers_do_both() {
        let manager = ctx(ROLE_MANAGER);
        assert!(manager.can_record_deliveries());
        assert!(manager.is_manager());
    }

    #[test]
    fn unknown_roles_do_neither() {
        let other = ctx("auditor");
        assert!(!other.can_record_deliveries());
        assert!(!other.is_manager());
    }
}
