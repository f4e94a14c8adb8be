use crate::api_json::{BulkPromoteRequest, EstudianteInput, EstudiantesQuery, ImportQuery, PromoteRequest};
use crate::auth::AuthUser;
use crate::db::auditoria;
use crate::db::catalogos::TipoCatalogo;
use crate::db::estudiantes::{self, Destino, FiltroEstudiantes};
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::excel;
use crate::server_handlers::{autor, Referencias};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use rusqlite::Connection;
use serde_json::json;

const ENTIDAD: &str = "ESTUDIANTE";

fn validar_destino(conn: &Connection, destino: Destino, grado_path: &str, seccion_path: &str) -> ApiResult<()> {
    if let Destino::Grado { grado_id, seccion_id } = destino {
        Referencias::new(conn)
            .catalogo(grado_path, TipoCatalogo::Grado, Some(grado_id))?
            .catalogo(seccion_path, TipoCatalogo::Seccion, seccion_id)?
            .finish()?;
    }
    Ok(())
}

/// GET /students?gradoId=&seccionId=&estado=&q=
pub async fn listar_handler(
    db: web::Data<Database>,
    _user: AuthUser,
    query: web::Query<EstudiantesQuery>,
) -> ApiResult<HttpResponse> {
    let q = query.into_inner();
    let filtro = FiltroEstudiantes { grado_id: q.grado_id, seccion_id: q.seccion_id, estado: q.estado, q: q.q };
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(estudiantes::listar(&conn, &filtro)?))
}

/// GET /students/{id}
pub async fn obtener_handler(db: web::Data<Database>, _user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(estudiantes::requerir_vigente(&conn, path.into_inner())?))
}

/// POST /students
pub async fn crear_handler(
    db: web::Data<Database>,
    user: AuthUser,
    body: web::Json<EstudianteInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let datos = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    Referencias::new(&tx)
        .catalogo("gradoId", TipoCatalogo::Grado, datos.grado_id)?
        .catalogo("seccionId", TipoCatalogo::Seccion, datos.seccion_id)?
        .finish()?;
    let e = estudiantes::crear(&tx, &datos)?;
    auditoria::registrar(&tx, autor(&user), "CREATE_STUDENT", ENTIDAD, Some(e.id), &json!(e))?;
    tx.commit()?;
    Ok(HttpResponse::Created().json(e))
}

/// PUT /students/{id}
pub async fn actualizar_handler(
    db: web::Data<Database>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<EstudianteInput>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let id = path.into_inner();
    let datos = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    Referencias::new(&tx)
        .catalogo("gradoId", TipoCatalogo::Grado, datos.grado_id)?
        .catalogo("seccionId", TipoCatalogo::Seccion, datos.seccion_id)?
        .finish()?;
    let e = estudiantes::actualizar(&tx, id, &datos)?;
    auditoria::registrar(&tx, autor(&user), "UPDATE_STUDENT", ENTIDAD, Some(id), &json!(e))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(e))
}

/// DELETE /students/{id}
/// Borrado lógico: las calificaciones se conservan pero el estudiante deja de
/// aparecer en listados y reportes.
pub async fn eliminar_handler(db: web::Data<Database>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let id = path.into_inner();
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let e = estudiantes::eliminar(&tx, id)?;
    auditoria::registrar(&tx, autor(&user), "DELETE_STUDENT", ENTIDAD, Some(id), &json!({"cedula": e.cedula}))?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(e))
}

/// POST /students/{id}/promote
pub async fn promover_handler(
    db: web::Data<Database>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<PromoteRequest>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let id = path.into_inner();
    let destino = body.destino()?;
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    validar_destino(&tx, destino, "gradoId", "seccionId")?;
    let antes = estudiantes::requerir_vigente(&tx, id)?;
    let e = estudiantes::promover(&tx, id, destino)?;
    auditoria::registrar(
        &tx,
        autor(&user),
        "PROMOTE_STUDENT",
        ENTIDAD,
        Some(id),
        &json!({
            "desde": {"gradoId": antes.grado_id, "seccionId": antes.seccion_id},
            "hacia": {"gradoId": e.grado_id, "seccionId": e.seccion_id},
            "estado": e.estado,
        }),
    )?;
    tx.commit()?;
    Ok(HttpResponse::Ok().json(e))
}

/// POST /students/promote
/// Promueve en bloque a los estudiantes activos de un grado (y sección).
pub async fn promover_lote_handler(
    db: web::Data<Database>,
    user: AuthUser,
    body: web::Json<BulkPromoteRequest>,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let req = body.into_inner();
    let destino = req.destino()?;
    let mut conn = db.lock()?;
    Referencias::new(&conn)
        .catalogo("fromGradoId", TipoCatalogo::Grado, Some(req.from_grado_id))?
        .catalogo("fromSeccionId", TipoCatalogo::Seccion, req.from_seccion_id)?
        .finish()?;
    validar_destino(&conn, destino, "toGradoId", "toSeccionId")?;

    let tx = conn.transaction()?;
    let ids = estudiantes::ids_activos_de(&tx, req.from_grado_id, req.from_seccion_id)?;
    for id in &ids {
        estudiantes::promover(&tx, *id, destino)?;
        auditoria::registrar(
            &tx,
            autor(&user),
            "PROMOTE_STUDENT",
            ENTIDAD,
            Some(*id),
            &json!({
                "desde": {"gradoId": req.from_grado_id, "seccionId": req.from_seccion_id},
                "hacia": {"gradoId": req.to_grado_id, "seccionId": req.to_seccion_id},
                "graduar": req.graduar,
            }),
        )?;
    }
    tx.commit()?;
    tracing::info!(promovidos = ids.len(), grado = req.from_grado_id, "bulk promote");
    Ok(HttpResponse::Ok().json(json!({"promovidos": ids.len(), "ids": ids})))
}

/// POST /students/import?gradoId=&seccionId=
/// Recibe un XLSX por multipart (primer archivo) y hace upsert por cédula.
pub async fn importar_handler(
    db: web::Data<Database>,
    user: AuthUser,
    query: web::Query<ImportQuery>,
    mut payload: Multipart,
) -> ApiResult<HttpResponse> {
    user.requiere_privilegiado()?;
    let mut contenido: Option<Vec<u8>> = None;
    while let Some(field_res) = payload.next().await {
        let mut field = field_res.map_err(|e| ApiError::BadRequest(format!("multipart field error: {}", e)))?;
        let filename = field.content_disposition().get_filename().map(|s| s.to_string());
        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("upload stream error: {}", e)))?;
            bytes.extend_from_slice(&chunk);
        }
        if contenido.is_none() && (filename.is_some() || !bytes.is_empty()) {
            tracing::debug!(filename = ?filename, size = bytes.len(), "import upload received");
            contenido = Some(bytes);
        }
    }
    let contenido = contenido.ok_or_else(|| ApiError::campo("file", "an XLSX file is required"))?;

    let filas = excel::read_first_sheet(contenido)
        .map_err(|e| ApiError::campo("file", &format!("could not read spreadsheet: {}", e)))?;
    let (validas, errores) = excel::interpretar_filas(&filas)?;

    let mut conn = db.lock()?;
    Referencias::new(&conn)
        .catalogo("gradoId", TipoCatalogo::Grado, query.grado_id)?
        .catalogo("seccionId", TipoCatalogo::Seccion, query.seccion_id)?
        .finish()?;
    let resumen = excel::importar(&mut conn, &user, &validas, errores, query.grado_id, query.seccion_id)?;
    Ok(HttpResponse::Ok().json(resumen))
}
