use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use boletin360::config::AppConfig;
use boletin360::db::Database;
use boletin360::reportes::xlsx::XLSX_CONTENT_TYPE;
use boletin360::server::{configurar_rutas, sembrar_admin};
use serde_json::{json, Value};
use std::io::Cursor;

fn preparar() -> (web::Data<Database>, web::Data<AppConfig>) {
    let config = AppConfig { admin_password: Some("secreto-admin".to_string()), ..AppConfig::default() };
    let db = Database::in_memory().unwrap();
    assert!(sembrar_admin(&db, &config).unwrap());
    (web::Data::new(db), web::Data::new(config))
}

macro_rules! get {
    ($uri:expr, $token:expr $(,)?) => {
        test::TestRequest::get()
            .uri($uri)
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .to_request()
    };
}

macro_rules! post {
    ($uri:expr, $token:expr, $body:expr $(,)?) => {
        test::TestRequest::post()
            .uri($uri)
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json($body)
            .to_request()
    };
}

macro_rules! put {
    ($uri:expr, $token:expr, $body:expr $(,)?) => {
        test::TestRequest::put()
            .uri($uri)
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json($body)
            .to_request()
    };
}

macro_rules! delete {
    ($uri:expr, $token:expr $(,)?) => {
        test::TestRequest::delete()
            .uri($uri)
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .to_request()
    };
}

macro_rules! login_req {
    ($username:expr, $password:expr $(,)?) => {
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"username": $username, "password": $password}))
            .to_request()
    };
}

const LIMITE: &str = "limite-de-prueba";

/// Libro XLSX con encabezado Cédula/Apellidos/Nombres y una fila por estudiante.
fn planilla(filas: &[[&str; 3]]) -> Vec<u8> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book.new_sheet("Estudiantes").unwrap();
    for (c, titulo) in ["Cédula", "Apellidos", "Nombres"].iter().enumerate() {
        sheet.get_cell_mut((c as u32 + 1, 1u32)).set_value(*titulo);
    }
    for (r, fila) in filas.iter().enumerate() {
        for (c, valor) in fila.iter().enumerate() {
            sheet.get_cell_mut((c as u32 + 1, r as u32 + 2)).set_value(*valor);
        }
    }
    let mut buf = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buf).unwrap();
    buf.into_inner()
}

fn multipart(archivo: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", LIMITE).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"estudiantes.xlsx\"\r\n");
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", XLSX_CONTENT_TYPE).as_bytes());
    body.extend_from_slice(archivo);
    body.extend_from_slice(format!("\r\n--{}--\r\n", LIMITE).as_bytes());
    body
}

#[actix_web::test]
async fn test_login_and_me() {
    let (db, config) = preparar();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;

    let resp = test::call_service(&app, login_req!("admin", "incorrecta")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["role"], "ADMIN");

    let me: Value = test::call_and_read_body_json(&app, get!("/me", &token)).await;
    assert_eq!(me["username"], "admin");

    let sin_token = test::TestRequest::get().uri("/students").to_request();
    assert_eq!(test::call_service(&app, sin_token).await.status(), StatusCode::UNAUTHORIZED);
    let basura = get!("/students", "no-es-un-jwt");
    assert_eq!(test::call_service(&app, basura).await.status(), StatusCode::UNAUTHORIZED);

    let help = test::TestRequest::get().uri("/help").to_request();
    assert_eq!(test::call_service(&app, help).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_grade_workflow_over_http() {
    let (db, config) = preparar();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;
    let login: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let admin = login["token"].as_str().unwrap().to_string();

    let grado: Value = test::call_and_read_body_json(&app, post!("/grade-levels", &admin, json!({"nombre": "1er Año"}))).await;
    let seccion: Value = test::call_and_read_body_json(&app, post!("/sections", &admin, json!({"nombre": "A"}))).await;
    let anio: Value = test::call_and_read_body_json(&app, post!("/years", &admin, json!({"nombre": "2024-2025"}))).await;
    let docente: Value = test::call_and_read_body_json(
        &app,
        post!("/teachers", &admin, json!({"nombres": "María", "apellidos": "García", "cedula": "V-9000"})),
    )
    .await;
    let materia: Value = test::call_and_read_body_json(
        &app,
        post!("/subjects", &admin, json!({"nombre": "Matemática", "gradoId": grado["id"], "docenteId": docente["id"]})),
    )
    .await;
    let estudiante: Value = test::call_and_read_body_json(
        &app,
        post!(
            "/students",
            &admin,
            json!({"nombres": "Ana", "apellidos": "Pérez", "cedula": "V-1", "gradoId": grado["id"], "seccionId": seccion["id"]}),
        ),
    )
    .await;

    // referencias inexistentes se rechazan con 400
    let resp = test::call_service(
        &app,
        post!("/students", &admin, json!({"nombres": "X", "apellidos": "Y", "cedula": "V-77", "gradoId": 999})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let usuario_docente = test::call_service(
        &app,
        post!(
            "/users",
            &admin,
            json!({"username": "mgarcia", "password": "clave-docente", "role": "DOCENTE", "docenteId": docente["id"]}),
        ),
    )
    .await;
    assert_eq!(usuario_docente.status(), StatusCode::CREATED);
    let login_docente: Value = test::call_and_read_body_json(&app, login_req!("mgarcia", "clave-docente")).await;
    let profe = login_docente["token"].as_str().unwrap().to_string();

    // un docente no administra estudiantes
    let resp = test::call_service(&app, post!("/students", &profe, json!({"nombres": "X", "apellidos": "Y", "cedula": "V-5"}))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let sync = json!({
        "studentId": estudiante["id"],
        "materiaId": materia["id"],
        "anioId": anio["id"],
        "lapso1": [
            {"descripcion": "Prueba corta", "ponderacion": 40, "nota": 18},
            {"descripcion": "Examen", "ponderacion": 60, "nota": 12}
        ]
    });
    let cal: Value = test::call_and_read_body_json(&app, post!("/grades/sync", &profe, sync.clone())).await;
    assert!((cal["promedios"][0].as_f64().unwrap() - 14.4).abs() < 1e-9);
    assert!((cal["definitiva"].as_f64().unwrap() - 14.4).abs() < 1e-9);
    assert_eq!(cal["aprobado"], true);

    let duplicada = json!({
        "studentId": estudiante["id"], "materiaId": materia["id"], "anioId": anio["id"],
        "lapso2": [{"descripcion": "Taller", "ponderacion": 50, "nota": 10}, {"descripcion": " taller ", "ponderacion": 50, "nota": 25}]
    });
    let resp = test::call_service(&app, post!("/grades/sync", &profe, duplicada)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["issues"].as_array().unwrap().len(), 2);

    let lock_uri = format!("/grades/{}/lock", cal["id"]);
    let resp = test::call_service(&app, put!(&lock_uri, &profe, json!({"isLocked": true}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, post!("/grades/sync", &profe, sync.clone())).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = test::call_service(&app, put!(&lock_uri, &profe, json!({"isLocked": false}))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = test::call_service(&app, post!("/grades/sync", &admin, sync)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let boletin: Value = test::call_and_read_body_json(
        &app,
        get!(&format!("/reports/boletin?studentId={}&anioId={}", estudiante["id"], anio["id"]), &admin),
    )
    .await;
    assert_eq!(boletin["materias"][0]["isLocked"], true);

    let export = test::call_service(
        &app,
        get!(
            &format!("/reports/export-xlsx?gradoId={}&seccionId={}&anioId={}", grado["id"], seccion["id"], anio["id"]),
            &admin,
        ),
    )
    .await;
    assert_eq!(export.status(), StatusCode::OK);
    assert_eq!(export.headers().get("content-type").unwrap(), XLSX_CONTENT_TYPE);
    let bytes = test::read_body(export).await;
    assert!(bytes.starts_with(b"PK"), "xlsx is a zip container");

    // borrado lógico: desaparece de listados y reportes
    let resp = test::call_service(&app, delete!(&format!("/students/{}", estudiante["id"]), &admin)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let lista: Value = test::call_and_read_body_json(&app, get!("/students", &admin)).await;
    assert!(lista.as_array().unwrap().is_empty());
    let resp = test::call_service(
        &app,
        get!(&format!("/reports/boletin?studentId={}&anioId={}", estudiante["id"], anio["id"]), &admin),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // la materia con calificaciones no se puede borrar
    let resp = test::call_service(&app, delete!(&format!("/subjects/{}", materia["id"]), &admin)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_audit_log_filters_and_permissions() {
    let (db, config) = preparar();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;
    let login: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let admin = login["token"].as_str().unwrap().to_string();

    test::call_service(&app, post!("/grade-levels", &admin, json!({"nombre": "1er Año"}))).await;
    test::call_service(&app, post!("/sections", &admin, json!({"nombre": "A"}))).await;
    test::call_service(&app, post!("/sections", &admin, json!({"nombre": "B"}))).await;

    let res: Value = test::call_and_read_body_json(&app, get!("/audit-logs?action=create_section", &admin)).await;
    assert_eq!(res["total"], 2);
    assert_eq!(res["items"][0]["detalles"]["nombre"], "B");

    let res: Value = test::call_and_read_body_json(&app, get!("/audit-logs?limit=1", &admin)).await;
    assert_eq!(res["items"].as_array().unwrap().len(), 1);
    // seed del admin + tres catálogos
    assert_eq!(res["total"], 4);

    let res: Value = test::call_and_read_body_json(&app, get!("/audit-logs?endDate=2000-01-01", &admin)).await;
    assert_eq!(res["total"], 0);

    let resp = test::call_service(&app, get!("/audit-logs?startDate=ayer", &admin)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    test::call_service(
        &app,
        post!("/users", &admin, json!({"username": "control", "password": "clave-control", "role": "CONTROL_ESTUDIOS"})),
    )
    .await;
    let login_control: Value = test::call_and_read_body_json(&app, login_req!("control", "clave-control")).await;
    let control = login_control["token"].as_str().unwrap().to_string();
    let resp = test::call_service(&app, get!("/audit-logs", &control)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_deleted_or_demoted_user_loses_access() {
    let (db, config) = preparar();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;
    let login: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let admin = login["token"].as_str().unwrap().to_string();

    let mut tokens = Vec::new();
    let mut ids = Vec::new();
    for username in ["direc1", "direc2", "direc3"] {
        let u: Value = test::call_and_read_body_json(
            &app,
            post!("/users", &admin, json!({"username": username, "password": "clave-director", "role": "DIRECTOR"})),
        )
        .await;
        let l: Value = test::call_and_read_body_json(&app, login_req!(username, "clave-director")).await;
        tokens.push(l["token"].as_str().unwrap().to_string());
        ids.push(u["id"].clone());
    }
    for token in &tokens {
        assert_eq!(test::call_service(&app, get!("/audit-logs", token)).await.status(), StatusCode::OK);
    }

    // eliminado: el token viejo deja de valer
    let resp = test::call_service(&app, delete!(&format!("/users/{}", ids[0]), &admin)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::call_service(&app, get!("/audit-logs", &tokens[0])).await.status(), StatusCode::UNAUTHORIZED);
    let resp = test::call_service(&app, post!("/grade-levels", &tokens[0], json!({"nombre": "5to Año"}))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // degradado: manda el rol actual
    let resp = test::call_service(&app, put!(&format!("/users/{}", ids[1]), &admin, json!({"role": "CONTROL_ESTUDIOS"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::call_service(&app, get!("/audit-logs", &tokens[1])).await.status(), StatusCode::FORBIDDEN);

    // desactivado
    let resp = test::call_service(
        &app,
        put!(&format!("/users/{}", ids[2]), &admin, json!({"role": "DIRECTOR", "activo": false})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::call_service(&app, get!("/audit-logs", &tokens[2])).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_reset_password_is_audited() {
    let (db, config) = preparar();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;
    let login: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let admin = login["token"].as_str().unwrap().to_string();

    let u: Value = test::call_and_read_body_json(
        &app,
        post!("/users", &admin, json!({"username": "control", "password": "clave-vieja", "role": "CONTROL_ESTUDIOS"})),
    )
    .await;
    let resp = test::call_service(
        &app,
        post!(&format!("/users/{}/reset-password", u["id"]), &admin, json!({"password": "clave-nueva"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(test::call_service(&app, login_req!("control", "clave-vieja")).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(test::call_service(&app, login_req!("control", "clave-nueva")).await.status(), StatusCode::OK);

    let res: Value = test::call_and_read_body_json(&app, get!("/audit-logs?action=reset_password", &admin)).await;
    assert_eq!(res["total"], 1);
    assert_eq!(res["items"][0]["entidadId"], u["id"]);
    assert_eq!(res["items"][0]["username"], "admin");
    assert!(!res["items"][0]["detalles"].to_string().contains("clave-nueva"));
}

#[actix_web::test]
async fn test_bulk_promote_and_graduate() {
    let (db, config) = preparar();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;
    let login: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let admin = login["token"].as_str().unwrap().to_string();

    let primero: Value = test::call_and_read_body_json(&app, post!("/grade-levels", &admin, json!({"nombre": "1er Año"}))).await;
    let segundo: Value = test::call_and_read_body_json(&app, post!("/grade-levels", &admin, json!({"nombre": "2do Año"}))).await;
    let mut ids = Vec::new();
    for cedula in ["V-1", "V-2"] {
        let e: Value = test::call_and_read_body_json(
            &app,
            post!("/students", &admin, json!({"nombres": "Ana", "apellidos": "Pérez", "cedula": cedula, "gradoId": primero["id"]})),
        )
        .await;
        ids.push(e["id"].clone());
    }

    let res: Value = test::call_and_read_body_json(
        &app,
        post!("/students/promote", &admin, json!({"fromGradoId": primero["id"], "toGradoId": segundo["id"]})),
    )
    .await;
    assert_eq!(res["promovidos"], 2);
    let lista: Value = test::call_and_read_body_json(&app, get!(&format!("/students?gradoId={}", segundo["id"]), &admin)).await;
    assert_eq!(lista.as_array().unwrap().len(), 2);

    let audit: Value = test::call_and_read_body_json(&app, get!("/audit-logs?action=promote_student", &admin)).await;
    assert_eq!(audit["total"], 2);

    let resp = test::call_service(&app, post!("/students/promote", &admin, json!({"fromGradoId": segundo["id"]}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let g: Value = test::call_and_read_body_json(
        &app,
        post!(&format!("/students/{}/promote", ids[0]), &admin, json!({"graduar": true})),
    )
    .await;
    assert_eq!(g["estado"], "GRADUADO");
    let audit: Value = test::call_and_read_body_json(&app, get!("/audit-logs?action=promote_student", &admin)).await;
    assert_eq!(audit["total"], 3);
}

#[actix_web::test]
async fn test_import_students_from_xlsx() {
    let (db, config) = preparar();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;
    let login: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let admin = login["token"].as_str().unwrap().to_string();

    let grado: Value = test::call_and_read_body_json(&app, post!("/grade-levels", &admin, json!({"nombre": "1er Año"}))).await;
    test::call_service(
        &app,
        post!("/students", &admin, json!({"nombres": "Ana", "apellidos": "Pérez", "cedula": "V-1", "gradoId": grado["id"]})),
    )
    .await;

    let libro = planilla(&[["V-1", "Pérez Rojas", "Ana"], ["V-2", "Salas", "Luis"], ["V-2", "Salas", "Luis"], ["V-3", "", "Eva"]]);
    let req = test::TestRequest::post()
        .uri("/students/import")
        .insert_header(("Authorization", format!("Bearer {}", admin)))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={}", LIMITE)))
        .set_payload(multipart(&libro))
        .to_request();
    let resumen: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resumen["creados"], 1);
    assert_eq!(resumen["actualizados"], 1);
    let filas_con_error: Vec<i64> =
        resumen["errores"].as_array().unwrap().iter().map(|e| e["fila"].as_i64().unwrap()).collect();
    assert_eq!(filas_con_error, vec![4, 5]);

    // sin gradoId en la query, el existente conserva su grado
    let lista: Value = test::call_and_read_body_json(&app, get!(&format!("/students?gradoId={}", grado["id"]), &admin)).await;
    assert_eq!(lista.as_array().unwrap().len(), 1);
    assert_eq!(lista[0]["apellidos"], "Pérez Rojas");

    let audit: Value = test::call_and_read_body_json(&app, get!("/audit-logs?action=import_students", &admin)).await;
    assert_eq!(audit["total"], 1);

    let sin_archivo = test::TestRequest::post()
        .uri("/students/import")
        .insert_header(("Authorization", format!("Bearer {}", admin)))
        .insert_header(("Content-Type", format!("multipart/form-data; boundary={}", LIMITE)))
        .set_payload(format!("--{}--\r\n", LIMITE))
        .to_request();
    assert_eq!(test::call_service(&app, sin_archivo).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_write_is_rolled_back_when_audit_fails() {
    let (db, config) = preparar();
    let store = db.clone();
    let app = test::init_service(App::new().app_data(db).app_data(config).configure(configurar_rutas)).await;
    let login: Value = test::call_and_read_body_json(&app, login_req!("admin", "secreto-admin")).await;
    let admin = login["token"].as_str().unwrap().to_string();

    store
        .lock()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER auditoria_caida BEFORE INSERT ON audit_logs BEGIN SELECT RAISE(ABORT, 'audit unavailable'); END;",
        )
        .unwrap();
    let resp = test::call_service(&app, post!("/grade-levels", &admin, json!({"nombre": "1er Año"}))).await;
    assert!(!resp.status().is_success());
    let resp = test::call_service(
        &app,
        post!("/students", &admin, json!({"nombres": "Ana", "apellidos": "Pérez", "cedula": "V-1"})),
    )
    .await;
    assert!(!resp.status().is_success());
    store.lock().unwrap().execute_batch("DROP TRIGGER auditoria_caida;").unwrap();

    let grados: Value = test::call_and_read_body_json(&app, get!("/grade-levels", &admin)).await;
    assert!(grados.as_array().unwrap().is_empty());
    let lista: Value = test::call_and_read_body_json(&app, get!("/students", &admin)).await;
    assert!(lista.as_array().unwrap().is_empty());
}
