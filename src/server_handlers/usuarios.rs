use crate::api_json::{ResetPasswordRequest, UsuarioCreate, UsuarioUpdate};
use crate::auth::{hash_password, AuthUser};
use crate::db::{auditoria, usuarios, Database};
use crate::error::{ApiError, ApiResult};
use crate::models::Role;
use crate::server_handlers::{autor, Referencias};
use actix_web::{web, HttpResponse};
use rusqlite::Connection;
use serde_json::json;

const ENTIDAD: &str = "USUARIO";

fn validar_docente(conn: &Connection, role: Role, docente_id: Option<i64>) -> ApiResult<()> {
    if role == Role::Docente && docente_id.is_none() {
        return Err(ApiError::campo("docenteId", "is required for role DOCENTE"));
    }
    Referencias::new(conn).docente("docenteId", docente_id)?.finish()
}

pub async fn listar_handler(db: web::Data<Database>, user: AuthUser) -> ApiResult<HttpResponse> {
    user.requiere(&[Role::Admin])?;
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(usuarios::listar(&conn)?))
}

pub async fn crear_handler(db: web::Data<Database>, user: AuthUser, body: web::Json<UsuarioCreate>) -> ApiResult<HttpResponse> {
    user.requiere(&[Role::Admin])?;
    let req = body.into_inner();
    req.validar()?;
    let hash = hash_password(&req.password)?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    validar_docente(&tx, req.role, req.docente_id)?;
    let u = usuarios::crear(&tx, &req.username, &hash, req.role, req.docente_id)?;
    auditoria::registrar(&tx, autor(&user), "CREATE_USER", ENTIDAD, Some(u.id), &json!(u))?;
    tx.commit()?;
    Ok(HttpResponse::Created().json(u))
}

pub async fn actualizar_handler(
    db: web::Data<Database>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<UsuarioUpdate>,
) -> ApiResult<HttpResponse> {
    user.requiere(&[Role::Admin])?;
    let id = path.into_inner();
    let req = body.into_inner();
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    validar_docente(&tx, req.role, req.docente_id)?;
    let u = usuarios::actualizar(&tx, id, req.role, req.docente_id, req.activo)?;
    auditoria::registrar(&tx, autor(&user), "UPDATE_USER", ENTIDAD, Some(id), &json!(u))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(u))
}

/// DELETE /users/{id}
/// Un administrador no puede eliminar su propia cuenta.
pub async fn eliminar_handler(db: web::Data<Database>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    user.requiere(&[Role::Admin])?;
    let id = path.into_inner();
    if id == user.id {
        return Err(ApiError::Conflict("cannot delete your own account".to_string()));
    }
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let u = usuarios::eliminar(&tx, id)?;
    auditoria::registrar(&tx, autor(&user), "DELETE_USER", ENTIDAD, Some(id), &json!({"username": u.username}))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(u))
}

/// POST /users/{id}/reset-password
pub async fn reset_password_handler(
    db: web::Data<Database>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<ResetPasswordRequest>,
) -> ApiResult<HttpResponse> {
    user.requiere(&[Role::Admin])?;
    let id = path.into_inner();
    body.validar()?;
    let hash = hash_password(&body.password)?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    usuarios::cambiar_password(&tx, id, &hash)?;
    // nunca se audita la contraseña, sólo el hecho
    auditoria::registrar(&tx, autor(&user), "RESET_PASSWORD", ENTIDAD, Some(id), &json!({}))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(json!({"status": "ok"})))
}
