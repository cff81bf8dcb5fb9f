use actix_web::error::ErrorUnauthorized;
use actix_web::{Error, HttpRequest};
use uuid::Uuid;

use super::jwt::validate_token;
use super::model::{Caller, Claims};

/// Extract token from Authorization header
fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(str::to_string))
}

/// Validate token from HttpRequest and return claims
pub fn validate_request_token(req: &HttpRequest) -> Result<Claims, Error> {
    let token =
        extract_token(req).ok_or_else(|| ErrorUnauthorized("Missing authorization token"))?;

    let claims = validate_token(&token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        ErrorUnauthorized("Invalid or expired token")
    })?;

    if claims.token_type != "access" {
        return Err(ErrorUnauthorized("Invalid token type"));
    }

    Ok(claims)
}

/// Resolve the calling user's identity and role from the bearer token.
pub fn caller_from_request(req: &HttpRequest) -> Result<Caller, Error> {
    let claims = validate_request_token(req)?;
    let id = Uuid::parse_str(&claims.sub).map_err(|_| {
        log::warn!("Token subject is not a user id: {}", claims.sub);
        ErrorUnauthorized("Invalid token subject")
    })?;
    Ok(Caller::new(id, claims.role))
}
