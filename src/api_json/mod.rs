//! Cuerpos y parámetros de las peticiones JSON, con su validación.
//!
//! Cada `*Input` se deserializa con serde y luego `validar()` acumula todos los
//! problemas encontrados en una única respuesta 400 (`ApiError::Validation`).
//!
//! # Ejemplo de sincronización de notas
//! ```json
//! {
//!   "studentId": 12,
//!   "materiaId": 4,
//!   "anioId": 1,
//!   "lapso1": [
//!     {"descripcion": "Prueba corta", "ponderacion": 40, "nota": 18},
//!     {"descripcion": "Examen", "ponderacion": 60, "nota": 12}
//!   ],
//!   "lapso2": []
//! }
//! ```
//! `lapso2: []` borra las evaluaciones del segundo lapso; `lapso3` ausente no se toca.

use crate::calculo::{NOTA_MAXIMA, PONDERACION_MAXIMA};
use crate::db::calificaciones::Sincronizacion;
use crate::db::docentes::DatosDocente;
use crate::db::estudiantes::{DatosEstudiante, Destino};
use crate::db::materias::DatosMateria;
use crate::error::{ApiError, ApiResult, Issues};
use crate::models::{EstadoDocente, EstadoEstudiante, Evaluacion, Role};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const AUDIT_LIMIT_DEFAULT: i64 = 50;
pub const AUDIT_LIMIT_MAX: i64 = 500;

fn limpiar(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validar_fecha(issues: &mut Issues, path: &str, valor: &Option<String>) {
    if let Some(f) = valor {
        if NaiveDate::parse_from_str(f.trim(), "%Y-%m-%d").is_err() {
            issues.push(path, "must be a date in YYYY-MM-DD format");
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: crate::models::Usuario,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstudianteInput {
    pub nombres: String,
    pub apellidos: String,
    pub cedula: String,
    pub fecha_nacimiento: Option<String>,
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub estado: Option<EstadoEstudiante>,
}

impl EstudianteInput {
    pub fn validar(self) -> ApiResult<DatosEstudiante> {
        let mut issues = Issues::new();
        issues.requerido("nombres", &self.nombres);
        issues.requerido("apellidos", &self.apellidos);
        issues.requerido("cedula", &self.cedula);
        let fecha_nacimiento = limpiar(self.fecha_nacimiento);
        validar_fecha(&mut issues, "fechaNacimiento", &fecha_nacimiento);
        issues.finish()?;
        Ok(DatosEstudiante {
            nombres: self.nombres,
            apellidos: self.apellidos,
            cedula: self.cedula,
            fecha_nacimiento,
            grado_id: self.grado_id,
            seccion_id: self.seccion_id,
            estado: self.estado.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocenteInput {
    pub nombres: String,
    pub apellidos: String,
    pub cedula: String,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub estado: Option<EstadoDocente>,
}

impl DocenteInput {
    pub fn validar(self) -> ApiResult<DatosDocente> {
        let mut issues = Issues::new();
        issues.requerido("nombres", &self.nombres);
        issues.requerido("apellidos", &self.apellidos);
        issues.requerido("cedula", &self.cedula);
        let email = limpiar(self.email);
        if let Some(e) = &email {
            if !e.contains('@') {
                issues.push("email", "must be a valid email address");
            }
        }
        issues.finish()?;
        Ok(DatosDocente {
            nombres: self.nombres,
            apellidos: self.apellidos,
            cedula: self.cedula,
            email,
            telefono: limpiar(self.telefono),
            estado: self.estado.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MateriaInput {
    pub nombre: String,
    pub docente_id: Option<i64>,
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
}

impl MateriaInput {
    pub fn validar(self) -> ApiResult<DatosMateria> {
        let mut issues = Issues::new();
        issues.requerido("nombre", &self.nombre);
        if self.grado_id.is_none() {
            issues.push("gradoId", "is required");
        }
        issues.finish()?;
        Ok(DatosMateria {
            nombre: self.nombre,
            docente_id: self.docente_id,
            grado_id: self.grado_id.unwrap_or_default(),
            seccion_id: self.seccion_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogoInput {
    pub nombre: String,
}

impl CatalogoInput {
    pub fn validar(self) -> ApiResult<String> {
        let mut issues = Issues::new();
        issues.requerido("nombre", &self.nombre);
        issues.finish()?;
        Ok(self.nombre.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub student_id: i64,
    pub materia_id: i64,
    #[serde(alias = "añoId")]
    pub anio_id: i64,
    #[serde(default)]
    pub lapso1: Option<Vec<Evaluacion>>,
    #[serde(default)]
    pub lapso2: Option<Vec<Evaluacion>>,
    #[serde(default)]
    pub lapso3: Option<Vec<Evaluacion>>,
}

/// Valida las evaluaciones de un lapso: rangos de nota y ponderación y
/// descripciones únicas (sin distinguir mayúsculas ni espacios extremos).
fn validar_lapso(issues: &mut Issues, nombre: &str, evaluaciones: &[Evaluacion]) {
    let mut vistas: HashSet<String> = HashSet::new();
    for (i, ev) in evaluaciones.iter().enumerate() {
        let path = format!("{}[{}]", nombre, i);
        let clave = ev.descripcion.trim().to_lowercase();
        if clave.is_empty() {
            issues.push(format!("{}.descripcion", path), "is required");
        } else if !vistas.insert(clave) {
            issues.push(format!("{}.descripcion", path), "duplicate description within the lapso");
        }
        if !ev.nota.is_finite() || ev.nota < 0.0 || ev.nota > NOTA_MAXIMA {
            issues.push(format!("{}.nota", path), format!("must be between 0 and {}", NOTA_MAXIMA));
        }
        if !ev.ponderacion.is_finite() || ev.ponderacion < 0.0 || ev.ponderacion > PONDERACION_MAXIMA {
            issues.push(format!("{}.ponderacion", path), format!("must be between 0 and {}", PONDERACION_MAXIMA));
        }
    }
}

impl SyncRequest {
    pub fn validar(self) -> ApiResult<Sincronizacion> {
        let mut issues = Issues::new();
        let lapsos = [self.lapso1, self.lapso2, self.lapso3];
        for (i, lapso) in lapsos.iter().enumerate() {
            if let Some(evs) = lapso {
                validar_lapso(&mut issues, &format!("lapso{}", i + 1), evs);
            }
        }
        issues.finish()?;
        Ok(Sincronizacion {
            student_id: self.student_id,
            materia_id: self.materia_id,
            anio_id: self.anio_id,
            lapsos,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    pub is_locked: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    #[serde(default)]
    pub graduar: bool,
}

impl PromoteRequest {
    pub fn destino(&self) -> ApiResult<Destino> {
        match (self.graduar, self.grado_id) {
            (true, _) => Ok(Destino::Graduar),
            (false, Some(grado_id)) => Ok(Destino::Grado { grado_id, seccion_id: self.seccion_id }),
            (false, None) => Err(ApiError::campo("gradoId", "is required unless graduar is true")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPromoteRequest {
    pub from_grado_id: i64,
    pub from_seccion_id: Option<i64>,
    pub to_grado_id: Option<i64>,
    pub to_seccion_id: Option<i64>,
    #[serde(default)]
    pub graduar: bool,
}

impl BulkPromoteRequest {
    pub fn destino(&self) -> ApiResult<Destino> {
        PromoteRequest { grado_id: self.to_grado_id, seccion_id: self.to_seccion_id, graduar: self.graduar }
            .destino()
            .map_err(|_| ApiError::campo("toGradoId", "is required unless graduar is true"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsuarioCreate {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub docente_id: Option<i64>,
}

fn validar_password(issues: &mut Issues, path: &str, password: &str) {
    if password.chars().count() < PASSWORD_MIN_LEN {
        issues.push(path, format!("must have at least {} characters", PASSWORD_MIN_LEN));
    }
}

impl UsuarioCreate {
    pub fn validar(&self) -> ApiResult<()> {
        let mut issues = Issues::new();
        issues.requerido("username", &self.username);
        validar_password(&mut issues, "password", &self.password);
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsuarioUpdate {
    pub role: Role,
    pub docente_id: Option<i64>,
    #[serde(default = "default_true")]
    pub activo: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn validar(&self) -> ApiResult<()> {
        let mut issues = Issues::new();
        validar_password(&mut issues, "password", &self.password);
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct AnuncioInput {
    pub titulo: String,
    pub contenido: String,
}

impl AnuncioInput {
    pub fn validar(&self) -> ApiResult<()> {
        let mut issues = Issues::new();
        issues.requerido("titulo", &self.titulo);
        issues.requerido("contenido", &self.contenido);
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificacionInput {
    pub usuario_id: i64,
    pub mensaje: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EstudiantesQuery {
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub estado: Option<EstadoEstudiante>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MateriasQuery {
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub docente_id: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CalificacionesQuery {
    pub student_id: Option<i64>,
    pub materia_id: Option<i64>,
    #[serde(alias = "añoId")]
    pub anio_id: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub action: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Convierte una fecha de filtro (`YYYY-MM-DD` o RFC 3339) en una cota RFC 3339.
/// Una fecha sin hora como cota final incluye el día completo.
fn cota_fecha(valor: &str, es_fin: bool) -> Option<String> {
    let v = valor.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        let utc = dt.with_timezone(&Utc);
        // la cota final es exclusiva; un instante exacto se incluye sumando 1 ms
        let utc = if es_fin { utc + Duration::milliseconds(1) } else { utc };
        return Some(utc.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    let fecha = NaiveDate::parse_from_str(v, "%Y-%m-%d").ok()?;
    let fecha = if es_fin { fecha.succ_opt()? } else { fecha };
    let inicio = fecha.and_hms_opt(0, 0, 0)?.and_utc();
    Some(inicio.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl AuditQuery {
    pub fn filtro(self) -> ApiResult<crate::db::auditoria::FiltroAuditoria> {
        let mut issues = Issues::new();
        let desde = match limpiar(self.start_date) {
            Some(s) => cota_fecha(&s, false).or_else(|| {
                issues.push("startDate", "must be YYYY-MM-DD or RFC 3339");
                None
            }),
            None => None,
        };
        let hasta = match limpiar(self.end_date) {
            Some(s) => cota_fecha(&s, true).or_else(|| {
                issues.push("endDate", "must be YYYY-MM-DD or RFC 3339");
                None
            }),
            None => None,
        };
        if self.limit.is_some_and(|l| l < 1) {
            issues.push("limit", "must be positive");
        }
        if self.offset.is_some_and(|o| o < 0) {
            issues.push("offset", "must not be negative");
        }
        issues.finish()?;
        Ok(crate::db::auditoria::FiltroAuditoria {
            accion: limpiar(self.action),
            desde,
            hasta,
            limit: self.limit.unwrap_or(AUDIT_LIMIT_DEFAULT).min(AUDIT_LIMIT_MAX),
            offset: self.offset.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoletinQuery {
    pub student_id: i64,
    #[serde(alias = "añoId")]
    pub anio_id: i64,
}

/// Alcance del acta: una sección completa o un único estudiante (constancia).
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActaQuery {
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub student_id: Option<i64>,
    #[serde(alias = "añoId")]
    pub anio_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlcanceActa {
    Seccion { grado_id: i64, seccion_id: i64, anio_id: i64 },
    Estudiante { student_id: i64, anio_id: i64 },
}

impl ActaQuery {
    pub fn alcance(&self) -> ApiResult<AlcanceActa> {
        let anio_id = self.anio_id.ok_or_else(|| ApiError::campo("anioId", "is required"))?;
        if let Some(student_id) = self.student_id {
            return Ok(AlcanceActa::Estudiante { student_id, anio_id });
        }
        match (self.grado_id, self.seccion_id) {
            (Some(grado_id), Some(seccion_id)) => Ok(AlcanceActa::Seccion { grado_id, seccion_id, anio_id }),
            _ => Err(ApiError::campo("gradoId", "gradoId and seccionId are required unless studentId is given")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportQuery {
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
}
