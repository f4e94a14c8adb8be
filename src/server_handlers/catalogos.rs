//! Handlers compartidos por `/grade-levels`, `/sections` y `/years`.
//! Cada scope registra su `TipoCatalogo` como `app_data`.

use crate::api_json::CatalogoInput;
use crate::auth::AuthUser;
use crate::db::catalogos::{self, TipoCatalogo};
use crate::db::{auditoria, Database};
use crate::error::ApiResult;
use crate::server_handlers::autor;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Sufijo de las acciones de auditoría (`CREATE_GRADE_LEVEL`, ...).
fn recurso(tipo: TipoCatalogo) -> &'static str {
    match tipo {
        TipoCatalogo::Grado => "GRADE_LEVEL",
        TipoCatalogo::Seccion => "SECTION",
        TipoCatalogo::AnioEscolar => "YEAR",
    }
}

pub async fn listar_handler(
    db: web::Data<Database>,
    tipo: web::Data<TipoCatalogo>,
    _user: AuthUser,
) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(catalogos::listar(&conn, **tipo)?))
}

pub async fn crear_handler(
    db: web::Data<Database>,
    tipo: web::Data<TipoCatalogo>,
    user: AuthUser,
    body: web::Json<CatalogoInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let tipo = **tipo;
    let nombre = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let c = catalogos::crear(&tx, tipo, &nombre)?;
    let accion = format!("CREATE_{}", recurso(tipo));
    auditoria::registrar(&tx, autor(&user), &accion, tipo.entidad(), Some(c.id), &json!(c))?;
    tx.commit()?;
    Ok(HttpResponse::Created().json(c))
}

pub async fn actualizar_handler(
    db: web::Data<Database>,
    tipo: web::Data<TipoCatalogo>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<CatalogoInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let tipo = **tipo;
    let id = path.into_inner();
    let nombre = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let c = catalogos::actualizar(&tx, tipo, id, &nombre)?;
    let accion = format!("UPDATE_{}", recurso(tipo));
    auditoria::registrar(&tx, autor(&user), &accion, tipo.entidad(), Some(id), &json!(c))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(c))
}

/// 409 si algún estudiante, materia o calificación sigue apuntando al registro.
pub async fn eliminar_handler(
    db: web::Data<Database>,
    tipo: web::Data<TipoCatalogo>,
    user: AuthUser,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let tipo = **tipo;
    let id = path.into_inner();
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let c = catalogos::eliminar(&tx, tipo, id)?;
    let accion = format!("DELETE_{}", recurso(tipo));
    auditoria::registrar(&tx, autor(&user), &accion, tipo.entidad(), Some(id), &json!(c))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(c))
}
