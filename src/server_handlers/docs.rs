use crate::auth::AuthUser;
use crate::db::{docentes, estudiantes, materias, usuarios, Database};
use crate::error::ApiResult;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub async fn help_handler() -> impl Responder {
    let sync_example = json!({
        "studentId": 12,
        "materiaId": 4,
        "anioId": 1,
        "lapso1": [
            {"descripcion": "Prueba corta", "ponderacion": 40, "nota": 18},
            {"descripcion": "Examen", "ponderacion": 60, "nota": 12}
        ],
        "lapso2": []
    });

    let help = json!({
        "description": "API de Boletín360. Todas las rutas salvo POST /login y GET /help requieren 'Authorization: Bearer <token>'.",
        "login_example": {"username": "admin", "password": "********"},
        "sync_example": sync_example,
        "note": "En POST /grades/sync un lapso ausente no se modifica; un arreglo vacío borra sus evaluaciones. La definitiva promedia sólo los lapsos con notas.",
        "resources": [
            "/students", "/teachers", "/subjects", "/grade-levels", "/sections", "/years",
            "/grades", "/users", "/announcements", "/notifications", "/audit-logs",
            "/reports/boletin", "/reports/acta", "/reports/export-xlsx", "/stats"
        ],
        "roles": ["ADMIN", "DIRECTOR", "CONTROL_ESTUDIOS", "DOCENTE"]
    });

    HttpResponse::Ok().json(help)
}

/// GET /stats
/// Conteos para el tablero principal.
pub async fn stats_handler(db: web::Data<Database>, _user: AuthUser) -> ApiResult<HttpResponse> {
    let conn = db.lock()?;
    Ok(HttpResponse::Ok().json(json!({
        "estudiantes": estudiantes::contar_vigentes(&conn)?,
        "docentes": docentes::contar(&conn)?,
        "materias": materias::contar(&conn)?,
        "usuarios": usuarios::contar(&conn)?,
    })))
}
