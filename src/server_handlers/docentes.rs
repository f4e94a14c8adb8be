use crate::api_json::DocenteInput;
use crate::auth::AuthUser;
use crate::db::{auditoria, docentes, Database};
use crate::error::ApiResult;
use crate::server_handlers::autor;
use actix_web::{web, HttpResponse};
use serde_json::json;

const ENTIDAD: &str = "DOCENTE";

pub async fn listar_handler(db: web::Data<Database>, _user: AuthUser) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(docentes::listar(&conn)?))
}

pub async fn obtener_handler(db: web::Data<Database>, _user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(docentes::requerir(&conn, path.into_inner())?))
}

pub async fn crear_handler(db: web::Data<Database>, user: AuthUser, body: web::Json<DocenteInput>) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let datos = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let d = docentes::crear(&tx, &datos)?;
    auditoria::registrar(&tx, autor(&user), "CREATE_TEACHER", ENTIDAD, Some(d.id), &json!(d))?;
    tx.commit()?;
    Ok(HttpResponse::Created().json(d))
}

pub async fn actualizar_handler(
    db: web::Data<Database>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<DocenteInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let id = path.into_inner();
    let datos = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let d = docentes::actualizar(&tx, id, &datos)?;
    auditoria::registrar(&tx, autor(&user), "UPDATE_TEACHER", ENTIDAD, Some(id), &json!(d))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(d))
}

pub async fn eliminar_handler(db: web::Data<Database>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let id = path.into_inner();
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let d = docentes::eliminar(&tx, id)?;
    auditoria::registrar(&tx, autor(&user), "DELETE_TEACHER", ENTIDAD, Some(id), &json!({"cedula": d.cedula}))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(d))
}
