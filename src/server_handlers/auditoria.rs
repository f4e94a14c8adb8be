use crate::api_json::AuditQuery;
use crate::auth::AuthUser;
use crate::db::{auditoria, Database};
use crate::error::ApiResult;
use crate::models::Role;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// GET /audit-logs?action=&startDate=&endDate=&limit=&offset=
/// Responde `{total, items}` con los registros más recientes primero.
pub async fn consultar_handler(
    db: web::Data<Database>,
    user: AuthUser,
    query: web::Query<AuditQuery>,
) -> ApiResult<HttpResponse> {
    user.requiere(&[Role::Admin, Role::Director])?;
    let filtro = query.into_inner().filtro()?;
    let conn = db.lock()?;
    let (total, items) = auditoria::consultar(&conn, &filtro)?;
    Ok(HttpResponse::Ok().json(json!({
        "total": total,
        "limit": filtro.limit,
        "offset": filtro.offset,
        "items": items,
    })))
}
