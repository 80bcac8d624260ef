use crate::models::auth::{Claims, ErrorResponse};
use crate::AppState;
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Json, Response},
    Extension,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use std::sync::Arc;

pub type AuthRejection = (StatusCode, Json<ErrorResponse>);

pub async fn auth_middleware(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let claims = authenticate(&headers, &state.config.jwt_secret)?;

    // Handlers read the caller from the request extensions
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Validates the `Authorization: Bearer <token>` header.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Claims, AuthRejection> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header format"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization header format. Expected 'Bearer <token>'"))?;

    authenticate_token(token, secret)
}

/// Same check for transports that cannot send headers (the WebSocket feed).
pub fn authenticate_token(token: &str, secret: &str) -> Result<Claims, AuthRejection> {
    verify_jwt_token(token.trim(), secret).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        unauthorized("Invalid or expired token")
    })
}

pub fn verify_jwt_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

fn unauthorized(message: &str) -> AuthRejection {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::auth::{Claims, UserType};
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub fn claims(user_id: &str, user_type: UserType) -> Claims {
        let now = chrono::Utc::now().timestamp() as usize;
        Claims {
            sub: user_id.to_string(),
            name: format!("User {}", user_id),
            user_type,
            exp: now + 3600,
            iat: now,
        }
    }

    pub fn token_for(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::auth::UserType;
    use axum::http::HeaderValue;

    const SECRET: &str = "test_secret";

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        headers
    }

    #[test]
    fn test_token_round_trip() {
        let issued = claims("agent-7", UserType::Expert);
        let token = token_for(&issued, SECRET);

        let verified = authenticate(&bearer(&token), SECRET).unwrap();
        assert_eq!(verified.sub, "agent-7");
        assert_eq!(verified.user_type, UserType::Expert);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired_tokens() {
        let token = token_for(&claims("u1", UserType::Buyer), SECRET);
        assert!(verify_jwt_token(&token, "other_secret").is_err());

        let mut expired = claims("u1", UserType::Buyer);
        expired.iat -= 7200;
        expired.exp = expired.iat + 60;
        let token = token_for(&expired, SECRET);
        let (status, _) = authenticate(&bearer(&token), SECRET).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_rejects_missing_or_malformed_header() {
        let (status, body) = authenticate(&HeaderMap::new(), SECRET).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.0.message, "Missing Authorization header");

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Token abc"));
        assert!(authenticate(&headers, SECRET).is_err());
    }
}
