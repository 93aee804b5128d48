//! JWT Token 处理
//!
//! 提供 JWT Token 的生成和验证功能

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use loyalty_shared::config::AuthConfig;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JWT 配置
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// 签名密钥
    pub secret: String,
    /// Token 过期时间（秒）
    pub expires_in_secs: i64,
    /// Token 签发者
    pub issuer: String,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            expires_in_secs: config.token_ttl_secs,
            issuer: config.issuer.clone(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

/// 调用方角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Business,
    Customer,
}

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 商家 id 或顾客 id
    pub sub: String,
    pub role: Role,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
}

/// 已认证的调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn business(id: i64) -> Self {
        Self {
            id,
            role: Role::Business,
        }
    }

    pub fn customer(id: i64) -> Self {
        Self {
            id,
            role: Role::Customer,
        }
    }

    /// 要求商家身份，返回商家 id
    pub fn business_id(&self) -> Result<i64, ApiError> {
        match self.role {
            Role::Business => Ok(self.id),
            Role::Customer => Err(ApiError::Service(
                loyalty_management::LoyaltyError::Forbidden("需要商家身份".into()),
            )),
        }
    }

    /// 要求顾客身份，返回顾客 id
    pub fn customer_id(&self) -> Result<i64, ApiError> {
        match self.role {
            Role::Customer => Ok(self.id),
            Role::Business => Err(ApiError::Service(
                loyalty_management::LoyaltyError::Forbidden("需要顾客身份".into()),
            )),
        }
    }
}

impl TryFrom<&Claims> for Principal {
    type Error = ApiError;

    fn try_from(claims: &Claims) -> Result<Self, Self::Error> {
        let id: i64 = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("Token 主体无效".to_string()))?;
        if id <= 0 {
            return Err(ApiError::Unauthorized("Token 主体无效".to_string()));
        }
        Ok(Self {
            id,
            role: claims.role,
        })
    }
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    /// 创建 JWT 管理器
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 生成 JWT Token，返回 (token, 过期时间戳)
    pub fn generate_token(&self, principal: Principal) -> Result<(String, i64), ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.expires_in_secs);

        let claims = Claims {
            sub: principal.id.to_string(),
            role: principal.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("JWT 生成失败: {}", e)))?;

        Ok((token, exp.timestamp()))
    }

    /// 验证并解析 JWT Token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token 已过期".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    ApiError::Unauthorized("无效的 Token".to_string())
                }
                _ => ApiError::Unauthorized(format!("Token 验证失败: {}", e)),
            },
        )?;

        Ok(token_data.claims)
    }

    /// 验证 Token 并解析出调用方
    pub fn authenticate(&self, token: &str) -> Result<Principal, ApiError> {
        let claims = self.verify_token(token)?;
        Principal::try_from(&claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_token() {
        let manager = JwtManager::new(JwtConfig::default());

        let (token, exp) = manager.generate_token(Principal::customer(7)).unwrap();
        assert!(exp > Utc::now().timestamp());

        let claims = manager.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, Role::Customer);

        let principal = manager.authenticate(&token).unwrap();
        assert_eq!(principal, Principal::customer(7));
    }

    #[test]
    fn test_invalid_token() {
        let manager = JwtManager::new(JwtConfig::default());
        let result = manager.verify_token("invalid.token.here");
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let issuer_a = JwtManager::new(JwtConfig {
            issuer: "a".into(),
            ..JwtConfig::default()
        });
        let issuer_b = JwtManager::new(JwtConfig {
            issuer: "b".into(),
            ..JwtConfig::default()
        });

        let (token, _) = issuer_a.generate_token(Principal::business(1)).unwrap();
        assert!(issuer_b.verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // jsonwebtoken 默认有 60 秒的时钟偏差容忍
        let manager = JwtManager::new(JwtConfig {
            expires_in_secs: -120,
            ..JwtConfig::default()
        });
        let (token, _) = manager.generate_token(Principal::business(1)).unwrap();
        assert!(matches!(
            manager.verify_token(&token),
            Err(ApiError::Unauthorized(msg)) if msg.contains("过期")
        ));
    }

    #[test]
    fn test_role_guards() {
        assert_eq!(Principal::business(3).business_id().unwrap(), 3);
        assert!(Principal::business(3).customer_id().is_err());
        assert_eq!(Principal::customer(4).customer_id().unwrap(), 4);
        assert!(Principal::customer(4).business_id().is_err());
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let claims = Claims {
            sub: "alice".into(),
            role: Role::Customer,
            iat: 0,
            exp: 0,
            iss: "x".into(),
        };
        assert!(Principal::try_from(&claims).is_err());
    }
}
