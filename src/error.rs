//! Errores de la API y su traducción a respuestas HTTP.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use std::sync::OnceLock;

/// Si es `true`, los errores internos incluyen el detalle en la respuesta.
static MODO_DESARROLLO: OnceLock<bool> = OnceLock::new();

/// Fija el modo de exposición de errores. Sólo la primera llamada tiene efecto.
pub fn set_modo_desarrollo(activo: bool) {
    let _ = MODO_DESARROLLO.set(activo);
}

fn modo_desarrollo() -> bool {
    MODO_DESARROLLO.get().copied().unwrap_or(false)
}

/// Un problema concreto de validación (campo + mensaje).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Issue { path: path.into(), message: message.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<Issue>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(entidad: &str, id: i64) -> Self {
        ApiError::NotFound(format!("{} {} not found", entidad, id))
    }

    pub fn campo(path: &str, message: &str) -> Self {
        ApiError::Validation(vec![Issue::new(path, message)])
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detalle = msg.clone().unwrap_or_else(|| "constraint violation".to_string());
                if detalle.contains("UNIQUE") {
                    ApiError::Conflict(format!("duplicate value: {}", detalle))
                } else {
                    ApiError::Conflict(format!("record is referenced by other data: {}", detalle))
                }
            }
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound("record not found".to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Internal(format!("json: {}", e))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation(issues) => json!({"error": "validation failed", "issues": issues}),
            ApiError::Internal(detalle) => {
                tracing::error!(error = %detalle, "internal error");
                if modo_desarrollo() {
                    json!({"error": "internal server error", "detail": detalle})
                } else {
                    json!({"error": "internal server error"})
                }
            }
            other => json!({"error": other.to_string()}),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Acumula problemas de validación y los convierte en `ApiError::Validation`.
#[derive(Debug, Default)]
pub struct Issues(Vec<Issue>);

impl Issues {
    pub fn new() -> Self {
        Issues(Vec::new())
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(Issue::new(path, message));
    }

    pub fn requerido(&mut self, path: &str, valor: &str) {
        if valor.trim().is_empty() {
            self.push(path, "is required");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.0.is_empty() { Ok(()) } else { Err(ApiError::Validation(self.0)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation(vec![]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_issues_finish() {
        let mut issues = Issues::new();
        assert!(issues.is_empty());
        issues.requerido("cedula", "   ");
        issues.requerido("nombres", "Ana");
        match issues.finish() {
            Err(ApiError::Validation(v)) => {
                assert_eq!(v.len(), 1);
                assert_eq!(v[0].path, "cedula");
            }
            other => panic!("se esperaba Validation, obtenido {:?}", other),
        }
    }

    #[test]
    fn test_constraint_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (x TEXT UNIQUE)", []).unwrap();
        conn.execute("INSERT INTO t (x) VALUES ('a')", []).unwrap();
        let err = conn.execute("INSERT INTO t (x) VALUES ('a')", []).unwrap_err();
        assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
    }
}
