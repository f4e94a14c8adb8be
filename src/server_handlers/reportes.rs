use crate::api_json::{ActaQuery, BoletinQuery};
use crate::auth::AuthUser;
use crate::db::Database;
use crate::error::ApiResult;
use crate::reportes::{self, xlsx};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};

/// GET /reports/boletin?studentId=&anioId=
pub async fn boletin_handler(
    db: web::Data<Database>,
    _user: AuthUser,
    query: web::Query<BoletinQuery>,
) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    let boletin = reportes::boletin(&conn, query.student_id, query.anio_id)?;
    Ok(HttpResponse::Ok().json(boletin))
}

/// GET /reports/acta?gradoId=&seccionId=&anioId=  o  ?studentId=&anioId=
pub async fn acta_handler(db: web::Data<Database>, _user: AuthUser, query: web::Query<ActaQuery>) -> ApiResult<HttpResponse> {
    let alcance = query.alcance()?;
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(reportes::acta(&conn, alcance)?))
}

/// GET /reports/export-xlsx
/// Misma consulta que el acta; responde el libro como descarga.
pub async fn export_xlsx_handler(
    db: web::Data<Database>,
    _user: AuthUser,
    query: web::Query<ActaQuery>,
) -> ApiResult<HttpResponse> {
    let alcance = query.alcance()?;
    let acta = {
        let conn = db.lock()?;
        reportes::acta(&conn, alcance)?
    };
    let bytes = xlsx::acta_a_xlsx(&acta)?;
    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(xlsx::nombre_archivo(&acta))],
    };
    Ok(HttpResponse::Ok()
        .content_type(xlsx::XLSX_CONTENT_TYPE)
        .insert_header(disposition)
        .body(bytes))
}
