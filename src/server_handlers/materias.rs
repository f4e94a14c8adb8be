use crate::api_json::{MateriaInput, MateriasQuery};
use crate::auth::AuthUser;
use crate::db::catalogos::TipoCatalogo;
use crate::db::materias::{self, DatosMateria, FiltroMaterias};
use crate::db::{auditoria, Database};
use crate::error::ApiResult;
use crate::server_handlers::{autor, Referencias};
use actix_web::{web, HttpResponse};
use rusqlite::Connection;
use serde_json::json;

const ENTIDAD: &str = "MATERIA";

fn validar_referencias(conn: &Connection, datos: &DatosMateria) -> ApiResult<()> {
    Referencias::new(conn)
        .catalogo("gradoId", TipoCatalogo::Grado, Some(datos.grado_id))?
        .catalogo("seccionId", TipoCatalogo::Seccion, datos.seccion_id)?
        .docente("docenteId", datos.docente_id)?
        .finish()
}

/// GET /subjects?gradoId=&seccionId=&docenteId=
pub async fn listar_handler(
    db: web::Data<Database>,
    _user: AuthUser,
    query: web::Query<MateriasQuery>,
) -> ApiResult<HttpResponse> {
    let q = query.into_inner();
    let filtro = FiltroMaterias { grado_id: q.grado_id, seccion_id: q.seccion_id, docente_id: q.docente_id };
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(materias::listar(&conn, &filtro)?))
}

pub async fn obtener_handler(db: web::Data<Database>, _user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(materias::requerir(&conn, path.into_inner())?))
}

pub async fn crear_handler(db: web::Data<Database>, user: AuthUser, body: web::Json<MateriaInput>) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let datos = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    validar_referencias(&tx, &datos)?;
    let m = materias::crear(&tx, &datos)?;
    auditoria::registrar(&tx, autor(&user), "CREATE_SUBJECT", ENTIDAD, Some(m.id), &json!(m))?;
    tx.commit()?;
    Ok(HttpResponse::Created().json(m))
}

pub async fn actualizar_handler(
    db: web::Data<Database>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<MateriaInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let id = path.into_inner();
    let datos = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    validar_referencias(&tx, &datos)?;
    let m = materias::actualizar(&tx, id, &datos)?;
    auditoria::registrar(&tx, autor(&user), "UPDATE_SUBJECT", ENTIDAD, Some(id), &json!(m))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(m))
}

/// DELETE /subjects/{id}
/// 409 si la materia ya tiene calificaciones.
pub async fn eliminar_handler(db: web::Data<Database>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let id = path.into_inner();
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let m = materias::eliminar(&tx, id)?;
    auditoria::registrar(&tx, autor(&user), "DELETE_SUBJECT", ENTIDAD, Some(id), &json!({"nombre": m.nombre}))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(m))
}
