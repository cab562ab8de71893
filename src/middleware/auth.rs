use crate::models::user::UserRole;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Claims issued by the surrounding auth layer. The core trusts them without
/// re-validating credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
    pub full_name: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> crate::error::Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| crate::error::Error::Unauthorized("Invalid subject claim".to_string()))
    }

    pub fn user_role(&self) -> UserRole {
        match self.role.as_deref() {
            Some(r) if r.eq_ignore_ascii_case("COUNSELLOR") => UserRole::Counsellor,
            Some(r) if r.eq_ignore_ascii_case("ADMIN") => UserRole::Admin,
            _ => UserRole::Student,
        }
    }

    pub fn display_name(&self) -> String {
        self.full_name.clone().unwrap_or_else(|| "Unknown".to_string())
    }
}

fn unauthorized(reason: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": reason }))).into_response()
}

fn decode_claims(req: &Request) -> Result<Claims, Response> {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return Err(unauthorized("missing_authorization"));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(unauthorized("bad_authorization"));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(unauthorized("unsupported_scheme"));
    };

    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => Ok(data.claims),
        Err(_) => Err(unauthorized("invalid_token")),
    }
}

async fn require_roles(mut req: Request, next: Next, allowed: &[UserRole]) -> Response {
    let claims = match decode_claims(&req) {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if !allowed.contains(&claims.user_role()) {
        return (StatusCode::FORBIDDEN, Json(json!({"error":"forbidden"}))).into_response();
    }
    req.extensions_mut().insert(claims);
    next.run(req).await
}

pub async fn require_student(req: Request, next: Next) -> Response {
    require_roles(req, next, &[UserRole::Student]).await
}

pub async fn require_student_or_counsellor(req: Request, next: Next) -> Response {
    require_roles(req, next, &[UserRole::Student, UserRole::Counsellor]).await
}

pub async fn require_counsellor(req: Request, next: Next) -> Response {
    require_roles(req, next, &[UserRole::Counsellor]).await
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    require_roles(req, next, &[UserRole::Admin]).await
}

pub async fn require_authenticated(mut req: Request, next: Next) -> Response {
    let claims = match decode_claims(&req) {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    req.extensions_mut().insert(claims);
    next.run(req).await
}
