//! Autenticación: hash de contraseñas (argon2), tokens firmados (JWT HS256)
//! y el extractor `AuthUser` para los handlers.

use crate::config::AppConfig;
use crate::db::{usuarios, Database};
use crate::error::{ApiError, ApiResult};
use crate::models::{Role, Usuario};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: Role,
    pub docente_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

/// Usuario autenticado de la petición en curso.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub docente_id: Option<i64>,
}

impl AuthUser {
    /// `Forbidden` si el rol no está entre los permitidos.
    pub fn requiere(&self, roles: &[Role]) -> ApiResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("role {} is not allowed to perform this action", self.role)))
        }
    }

    pub fn requiere_privilegiado(&self) -> ApiResult<()> {
        self.requiere(&Role::PRIVILEGIADOS)
    }
}

impl From<&Usuario> for AuthUser {
    fn from(u: &Usuario) -> Self {
        AuthUser { id: u.id, username: u.username.clone(), role: u.role, docente_id: u.docente_id }
    }
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

pub fn emitir_token(usuario: &Usuario, config: &AppConfig) -> ApiResult<String> {
    let iat = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: usuario.id,
        username: usuario.username.clone(),
        role: usuario.role,
        docente_id: usuario.docente_id,
        iat,
        exp: iat + config.token_ttl_horas * 3600,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(config.jwt_secret.as_bytes()))
        .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))
}

pub fn validar_token(token: &str, config: &AppConfig) -> ApiResult<AuthUser> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(config.jwt_secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::Unauthorized("token has expired".to_string()),
            _ => ApiError::Unauthorized(format!("invalid token: {}", e)),
        })?;
    let c = data.claims;
    Ok(AuthUser { id: c.sub, username: c.username, role: c.role, docente_id: c.docente_id })
}

/// Relee el usuario del token: el rol y el docente vigentes son los de la tabla,
/// no los del momento del login.
pub fn usuario_vigente(db: &Database, token_user: &AuthUser) -> ApiResult<AuthUser> {
    let conn = db.lock()?;
    match usuarios::obtener(&conn, token_user.id)? {
        Some(u) if u.activo => Ok(AuthUser::from(&u)),
        Some(_) => Err(ApiError::Unauthorized("user is inactive".to_string())),
        None => Err(ApiError::Unauthorized("user no longer exists".to_string())),
    }
}

/// Extrae el token del header `Authorization: Bearer <token>`.
fn extract_bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let (config, db) = match (req.app_data::<web::Data<AppConfig>>(), req.app_data::<web::Data<Database>>()) {
            (Some(c), Some(d)) => (c, d),
            _ => return ready(Err(ApiError::Internal("AppConfig or Database is not registered".to_string()))),
        };
        let result = match extract_bearer_token(req) {
            Some(token) => validar_token(token, config).and_then(|u| usuario_vigente(db, &u)),
            None => Err(ApiError::Unauthorized("missing or invalid bearer token".to_string())),
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usuario(role: Role) -> Usuario {
        Usuario {
            id: 7,
            username: "mgarcia".to_string(),
            role,
            docente_id: Some(3),
            activo: true,
            created_at: crate::models::ahora(),
        }
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("clave-segura").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("clave-segura", &hash));
        assert!(!verify_password("otra", &hash));
        assert!(!verify_password("clave-segura", "no-es-un-hash"));
    }

    #[test]
    fn test_token_roundtrip() {
        let cfg = AppConfig::default();
        let token = emitir_token(&usuario(Role::Docente), &cfg).unwrap();
        let user = validar_token(&token, &cfg).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.role, Role::Docente);
        assert_eq!(user.docente_id, Some(3));
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let cfg = AppConfig::default();
        let token = emitir_token(&usuario(Role::Admin), &cfg).unwrap();
        let otro = AppConfig { jwt_secret: "otro-secreto".to_string(), ..AppConfig::default() };
        assert!(matches!(validar_token(&token, &otro), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_usuario_vigente_usa_la_fila_actual() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        let u = usuarios::crear(&conn, "direc", "hash", Role::Director, None).unwrap();
        drop(conn);
        let del_token = AuthUser::from(&u);
        assert_eq!(usuario_vigente(&db, &del_token).unwrap().role, Role::Director);

        let conn = db.lock().unwrap();
        usuarios::actualizar(&conn, u.id, Role::Docente, None, true).unwrap();
        drop(conn);
        assert_eq!(usuario_vigente(&db, &del_token).unwrap().role, Role::Docente);

        let conn = db.lock().unwrap();
        usuarios::actualizar(&conn, u.id, Role::Docente, None, false).unwrap();
        drop(conn);
        assert!(matches!(usuario_vigente(&db, &del_token), Err(ApiError::Unauthorized(_))));

        let conn = db.lock().unwrap();
        usuarios::eliminar(&conn, u.id).unwrap();
        drop(conn);
        assert!(matches!(usuario_vigente(&db, &del_token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_requiere_roles() {
        let u = AuthUser::from(&usuario(Role::Docente));
        assert!(u.requiere(&[Role::Docente]).is_ok());
        assert!(matches!(u.requiere_privilegiado(), Err(ApiError::Forbidden(_))));
    }
}
