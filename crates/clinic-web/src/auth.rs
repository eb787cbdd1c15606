//! 用户认证和授权

use crate::error::ApiError;
use crate::state::AppState;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use clinic_core::{ClinicError, Result, Role};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户ID
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
}

/// 已认证的当前用户，由认证中间件写入请求扩展
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// 要求当前用户具有指定角色
    pub fn require(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(ClinicError::Permission("Akses ditolak".to_string()))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError(ClinicError::Unauthorized("Token tidak ditemukan".to_string())))
    }
}

/// 认证服务：签发/验证令牌，哈希/校验密码
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(jwt_secret: &str, token_ttl_hours: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_ttl: Duration::hours(token_ttl_hours as i64),
        }
    }

    /// 签发 HS256 令牌
    pub fn issue_token(&self, user_id: Uuid, email: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ClinicError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// 验证令牌签名与有效期
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Rejected token: {}", e);
                ClinicError::Unauthorized("Token tidak valid".to_string())
            })
    }

    /// 以随机盐生成 Argon2 PHC 字符串
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ClinicError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| ClinicError::Internal(format!("Stored password hash is invalid: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ClinicError::Internal(format!("Failed to verify password: {}", e))),
        }
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 认证中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ClinicError::Unauthorized("Token tidak ditemukan".to_string()))?;

    let claims = state.auth.verify_token(token)?;
    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}

async fn require_roles(
    allowed: &[Role],
    request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let role = request.extensions().get::<AuthUser>().map(|user| user.role);

    match role {
        Some(role) if allowed.contains(&role) => Ok(next.run(request).await),
        Some(role) => {
            warn!("Role {} denied for {}", role, request.uri().path());
            Err(ClinicError::Permission("Akses ditolak".to_string()).into())
        }
        None => Err(ClinicError::Unauthorized("Token tidak ditemukan".to_string()).into()),
    }
}

pub async fn require_admin(request: Request, next: Next) -> std::result::Result<Response, ApiError> {
    require_roles(&[Role::Admin], request, next).await
}

pub async fn require_doctor_or_admin(
    request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    require_roles(&[Role::Doctor, Role::Admin], request, next).await
}

pub async fn require_patient(request: Request, next: Next) -> std::result::Result<Response, ApiError> {
    require_roles(&[Role::Patient], request, next).await
}
