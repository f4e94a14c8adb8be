use crate::auth::hash_password;
use crate::config::AppConfig;
use crate::db::catalogos::TipoCatalogo;
use crate::db::{auditoria, usuarios, Database};
use crate::error::{set_modo_desarrollo, ApiError, ApiResult, Issue};
use crate::models::Role;
use crate::server_handlers::{
    anuncios, auditoria as auditoria_handlers, auth, calificaciones, catalogos, docentes, docs, estudiantes,
    materias, reportes, usuarios as usuarios_handlers,
};
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use serde_json::json;
use std::io;

fn catalogo_scope(path: &str, tipo: TipoCatalogo) -> actix_web::Scope {
    web::scope(path)
        .app_data(web::Data::new(tipo))
        .route("", web::get().to(catalogos::listar_handler))
        .route("", web::post().to(catalogos::crear_handler))
        .route("/{id}", web::put().to(catalogos::actualizar_handler))
        .route("/{id}", web::delete().to(catalogos::eliminar_handler))
}

/// Registra todas las rutas de la API. Requiere `web::Data<Database>` y
/// `web::Data<AppConfig>` en la aplicación.
pub fn configurar_rutas(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(vec![Issue::new("body", err.to_string())]).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::Validation(vec![Issue::new("query", err.to_string())]).into()
    }))
    .route("/help", web::get().to(docs::help_handler))
    .route("/login", web::post().to(auth::login_handler))
    .route("/me", web::get().to(auth::me_handler))
    .route("/stats", web::get().to(docs::stats_handler))
    // estudiantes: las rutas fijas van antes de /students/{id}
    .route("/students", web::get().to(estudiantes::listar_handler))
    .route("/students", web::post().to(estudiantes::crear_handler))
    .route("/students/promote", web::post().to(estudiantes::promover_lote_handler))
    .route("/students/import", web::post().to(estudiantes::importar_handler))
    .route("/students/{id}", web::get().to(estudiantes::obtener_handler))
    .route("/students/{id}", web::put().to(estudiantes::actualizar_handler))
    .route("/students/{id}", web::delete().to(estudiantes::eliminar_handler))
    .route("/students/{id}/promote", web::post().to(estudiantes::promover_handler))
    .route("/teachers", web::get().to(docentes::listar_handler))
    .route("/teachers", web::post().to(docentes::crear_handler))
    .route("/teachers/{id}", web::get().to(docentes::obtener_handler))
    .route("/teachers/{id}", web::put().to(docentes::actualizar_handler))
    .route("/teachers/{id}", web::delete().to(docentes::eliminar_handler))
    .route("/subjects", web::get().to(materias::listar_handler))
    .route("/subjects", web::post().to(materias::crear_handler))
    .route("/subjects/{id}", web::get().to(materias::obtener_handler))
    .route("/subjects/{id}", web::put().to(materias::actualizar_handler))
    .route("/subjects/{id}", web::delete().to(materias::eliminar_handler))
    .service(catalogo_scope("/grade-levels", TipoCatalogo::Grado))
    .service(catalogo_scope("/sections", TipoCatalogo::Seccion))
    .service(catalogo_scope("/years", TipoCatalogo::AnioEscolar))
    .route("/grades", web::get().to(calificaciones::listar_handler))
    .route("/grades/sync", web::post().to(calificaciones::sincronizar_handler))
    .route("/grades/{id}", web::get().to(calificaciones::obtener_handler))
    .route("/grades/{id}/lock", web::put().to(calificaciones::bloqueo_handler))
    .route("/users", web::get().to(usuarios_handlers::listar_handler))
    .route("/users", web::post().to(usuarios_handlers::crear_handler))
    .route("/users/{id}", web::put().to(usuarios_handlers::actualizar_handler))
    .route("/users/{id}", web::delete().to(usuarios_handlers::eliminar_handler))
    .route("/users/{id}/reset-password", web::post().to(usuarios_handlers::reset_password_handler))
    .route("/announcements", web::get().to(anuncios::listar_anuncios_handler))
    .route("/announcements", web::post().to(anuncios::crear_anuncio_handler))
    .route("/notifications", web::get().to(anuncios::listar_notificaciones_handler))
    .route("/notifications", web::post().to(anuncios::crear_notificacion_handler))
    .route("/audit-logs", web::get().to(auditoria_handlers::consultar_handler))
    .route("/reports/boletin", web::get().to(reportes::boletin_handler))
    .route("/reports/acta", web::get().to(reportes::acta_handler))
    .route("/reports/export-xlsx", web::get().to(reportes::export_xlsx_handler));
}

/// Crea el administrador inicial si no hay usuarios y hay contraseña configurada.
/// Devuelve `true` si lo creó.
pub fn sembrar_admin(db: &Database, config: &AppConfig) -> ApiResult<bool> {
    let Some(password) = config.admin_password.as_deref() else {
        return Ok(false);
    };
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    if usuarios::contar(&tx)? > 0 {
        return Ok(false);
    }
    let hash = hash_password(password)?;
    let u = usuarios::crear(&tx, &config.admin_username, &hash, Role::Admin, None)?;
    auditoria::registrar(
        &tx,
        auditoria::Autor { usuario_id: None, username: "system" },
        "CREATE_USER",
        "USUARIO",
        Some(u.id),
        &json!({"username": u.username, "role": u.role, "seed": true}),
    )?;
    tx.commit()?;
    tracing::info!(username = %u.username, "seeded initial admin user");
    Ok(true)
}

fn cors(config: &AppConfig) -> Cors {
    let base = match &config.cors_origin {
        Some(origin) => Cors::default().allowed_origin(origin),
        None => Cors::default().allow_any_origin(),
    };
    base.allow_any_method().allow_any_header().max_age(3600)
}

/// Ejecuta el servidor HTTP hasta que se detenga.
pub async fn run_server(config: AppConfig) -> io::Result<()> {
    set_modo_desarrollo(config.es_desarrollo());
    let db_path = config.db_path();
    let db = Database::open(db_path.as_deref()).map_err(|e| io::Error::other(format!("database: {}", e)))?;
    tracing::info!(db = %config.db_url, modo = ?config.modo, "database ready");
    if config.admin_password.is_none() {
        tracing::warn!("BOLETIN_ADMIN_PASSWORD not set; no admin user will be seeded");
    }
    sembrar_admin(&db, &config).map_err(|e| io::Error::other(format!("seeding admin: {}", e)))?;

    let db = web::Data::new(db);
    let bind = config.bind.clone();
    let config = web::Data::new(config);
    tracing::info!(%bind, "starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors(&config))
            .app_data(db.clone())
            .app_data(config.clone())
            .configure(configurar_rutas)
    })
    .bind(bind)?
    .run()
    .await
}
