use crate::api_json::{LoginRequest, LoginResponse};
use crate::auth::{emitir_token, verify_password, AuthUser};
use crate::config::AppConfig;
use crate::db::{usuarios, Database};
use crate::error::{ApiError, ApiResult};
use actix_web::{web, HttpResponse};

/// POST /login
/// Devuelve un token firmado si las credenciales son válidas y el usuario está activo.
pub async fn login_handler(
    db: web::Data<Database>,
    config: web::Data<AppConfig>,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let req = body.into_inner();
    let encontrado = {
        let conn = db.lock()?;
        usuarios::credenciales(&conn, &req.username)?
    };
    // mismo mensaje para usuario inexistente y contraseña incorrecta
    let invalidas = || ApiError::Unauthorized("invalid username or password".to_string());
    let (usuario, hash) = encontrado.ok_or_else(invalidas)?;
    if !usuario.activo || !verify_password(&req.password, &hash) {
        tracing::warn!(username = %req.username, "failed login");
        return Err(invalidas());
    }
    let token = emitir_token(&usuario, &config)?;
    tracing::info!(username = %usuario.username, role = %usuario.role, "login");
    Ok(HttpResponse::Ok().json(LoginResponse { token, user: usuario }))
}

/// GET /me
pub async fn me_handler(db: web::Data<Database>, user: AuthUser) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    let usuario = usuarios::obtener(&conn, user.id)?
        .ok_or_else(|| ApiError::Unauthorized("user no longer exists".to_string()))?;
    Ok(HttpResponse::Ok().json(usuario))
}
