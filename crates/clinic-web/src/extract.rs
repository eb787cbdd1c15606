//! 请求体提取与边界验证

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use clinic_core::{ClinicError, Result};
use serde::de::DeserializeOwned;

/// 请求体在进入业务逻辑之前的验证
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 反序列化并验证 JSON 请求体，失败统一返回 400 `{ message }`
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ClinicError::Validation(rejection.body_text()))?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// 必填文本字段
pub fn require_text(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(ClinicError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}
