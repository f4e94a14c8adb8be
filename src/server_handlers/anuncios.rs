use crate::api_json::{AnuncioInput, NotificacionInput};
use crate::auth::AuthUser;
use crate::db::{anuncios, auditoria, usuarios, Database};
use crate::error::{ApiError, ApiResult};
use crate::server_handlers::autor;
use actix_web::{web, HttpResponse};
use serde_json::json;

const LIMITE_LISTADO: i64 = 50;

/// GET /announcements
pub async fn listar_anuncios_handler(db: web::Data<Database>, _user: AuthUser) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(anuncios::listar_anuncios(&conn, LIMITE_LISTADO)?))
}

/// POST /announcements
pub async fn crear_anuncio_handler(
    db: web::Data<Database>,
    user: AuthUser,
    body: web::Json<AnuncioInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    body.validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let a = anuncios::crear_anuncio(&tx, &body.titulo, &body.contenido, Some(user.id))?;
    auditoria::registrar(&tx, autor(&user), "CREATE_ANNOUNCEMENT", "ANUNCIO", Some(a.id), &json!({"titulo": a.titulo}))?;
    tx.commit()?;
    Ok(HttpResponse::Created().json(a))
}

/// GET /notifications
/// Sólo las del usuario autenticado.
pub async fn listar_notificaciones_handler(db: web::Data<Database>, user: AuthUser) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(anuncios::listar_notificaciones(&conn, user.id, LIMITE_LISTADO)?))
}

/// POST /notifications
pub async fn crear_notificacion_handler(
    db: web::Data<Database>,
    user: AuthUser,
    body: web::Json<NotificacionInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let req = body.into_inner();
    if req.mensaje.trim().is_empty() {
        return Err(ApiError::campo("mensaje", "is required"));
    }
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    if usuarios::obtener(&tx, req.usuario_id)?.is_none() {
        return Err(ApiError::campo("usuarioId", &format!("user {} does not exist", req.usuario_id)));
    }
    let n = anuncios::crear_notificacion(&tx, req.usuario_id, req.mensaje.trim())?;
    auditoria::registrar(
        &tx,
        autor(&user),
        "CREATE_NOTIFICATION",
        "NOTIFICACION",
        Some(n.id),
        &json!({"usuarioId": n.usuario_id}),
    )?;
    tx.commit()?;
    Ok(HttpResponse::Created().json(n))
}
