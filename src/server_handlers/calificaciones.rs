use crate::api_json::{CalificacionesQuery, LockRequest, SyncRequest};
use crate::auth::AuthUser;
use crate::calculo;
use crate::db::calificaciones::{self, FiltroCalificaciones};
use crate::db::Database;
use crate::error::ApiResult;
use crate::models::{Calificacion, Role};
use actix_web::{web, HttpResponse};
use serde::Serialize;

/// Calificación con los promedios ya calculados, tal como la consume el frontend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalificacionDetalle {
    #[serde(flatten)]
    pub calificacion: Calificacion,
    pub promedios: [Option<f64>; 3],
    pub definitiva: Option<f64>,
    pub aprobado: Option<bool>,
}

impl From<Calificacion> for CalificacionDetalle {
    fn from(calificacion: Calificacion) -> Self {
        let promedios = calculo::promedios_lapsos(calificacion.lapsos());
        let definitiva = calculo::definitiva(&promedios);
        CalificacionDetalle { calificacion, promedios, definitiva, aprobado: calculo::aprobado(definitiva) }
    }
}

/// GET /grades?studentId=&materiaId=&anioId=
pub async fn listar_handler(
    db: web::Data<Database>,
    _user: AuthUser,
    query: web::Query<CalificacionesQuery>,
) -> ApiResult<HttpResponse> {
    let q = query.into_inner();
    let filtro = FiltroCalificaciones { student_id: q.student_id, materia_id: q.materia_id, anio_id: q.anio_id };
    let conn = db.lock()?;
    let items: Vec<CalificacionDetalle> =
        calificaciones::listar(&conn, &filtro)?.into_iter().map(CalificacionDetalle::from).collect();
    Ok(HttpResponse::Ok().json(items))
}

/// GET /grades/{id}
pub async fn obtener_handler(db: web::Data<Database>, _user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    let c = calificaciones::requerir(&conn, path.into_inner())?;
    Ok(HttpResponse::Ok().json(CalificacionDetalle::from(c)))
}

/// POST /grades/sync
/// Reemplaza las evaluaciones de los lapsos enviados; los omitidos no se tocan.
pub async fn sincronizar_handler(
    db: web::Data<Database>,
    user: AuthUser,
    body: web::Json<SyncRequest>,
) -> ApiResult<HttpResponse> {
    user.requiere(&[Role::Admin, Role::Director, Role::ControlEstudios, Role::Docente])?;
    let sync = body.into_inner().validar()?;
    let mut conn = db.lock()?;
    let c = calificaciones::sincronizar(&mut conn, &user, &sync)?;
    Ok(HttpResponse::Ok().json(CalificacionDetalle::from(c)))
}

/// PUT /grades/{id}/lock
pub async fn bloqueo_handler(
    db: web::Data<Database>,
    user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<LockRequest>,
) -> ApiResult<HttpResponse> {
    let mut conn = db.lock()?;
    let c = calificaciones::cambiar_bloqueo(&mut conn, &user, path.into_inner(), body.is_locked)?;
    Ok(HttpResponse::Ok().json(CalificacionDetalle::from(c)))
}
