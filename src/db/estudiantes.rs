use crate::error::{ApiError, ApiResult};
use crate::models::{ahora, EstadoEstudiante, Estudiante};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const COLUMNAS: &str = "id, nombres, apellidos, cedula, fecha_nacimiento, grado_id, seccion_id, estado, created_at, updated_at, deleted_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Estudiante> {
    Ok(Estudiante {
        id: row.get(0)?,
        nombres: row.get(1)?,
        apellidos: row.get(2)?,
        cedula: row.get(3)?,
        fecha_nacimiento: row.get(4)?,
        grado_id: row.get(5)?,
        seccion_id: row.get(6)?,
        estado: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        deleted_at: row.get(10)?,
    })
}

/// Datos editables de un estudiante (entrada de crear/actualizar).
#[derive(Debug, Clone)]
pub struct DatosEstudiante {
    pub nombres: String,
    pub apellidos: String,
    pub cedula: String,
    pub fecha_nacimiento: Option<String>,
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub estado: EstadoEstudiante,
}

#[derive(Debug, Clone, Default)]
pub struct FiltroEstudiantes {
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub estado: Option<EstadoEstudiante>,
    /// Búsqueda por nombre, apellido o cédula.
    pub q: Option<String>,
}

/// Lista estudiantes no eliminados, ordenados por apellidos y nombres.
pub fn listar(conn: &Connection, filtro: &FiltroEstudiantes) -> ApiResult<Vec<Estudiante>> {
    let mut sql = format!("SELECT {} FROM estudiantes WHERE deleted_at IS NULL", COLUMNAS);
    let mut args: Vec<Value> = Vec::new();
    if let Some(g) = filtro.grado_id {
        args.push(Value::Integer(g));
        sql.push_str(&format!(" AND grado_id = ?{}", args.len()));
    }
    if let Some(s) = filtro.seccion_id {
        args.push(Value::Integer(s));
        sql.push_str(&format!(" AND seccion_id = ?{}", args.len()));
    }
    if let Some(e) = filtro.estado {
        args.push(Value::Text(e.as_str().to_string()));
        sql.push_str(&format!(" AND estado = ?{}", args.len()));
    }
    if let Some(q) = filtro.q.as_ref().map(|q| q.trim()).filter(|q| !q.is_empty()) {
        args.push(Value::Text(format!("%{}%", q.to_lowercase())));
        let n = args.len();
        sql.push_str(&format!(
            " AND (lower(nombres) LIKE ?{n} OR lower(apellidos) LIKE ?{n} OR lower(cedula) LIKE ?{n})"
        ));
    }
    sql.push_str(" ORDER BY apellidos, nombres");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), map_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Busca un estudiante por id, incluidos los eliminados lógicamente.
pub fn obtener(conn: &Connection, id: i64) -> ApiResult<Option<Estudiante>> {
    let sql = format!("SELECT {} FROM estudiantes WHERE id = ?1", COLUMNAS);
    Ok(conn.query_row(&sql, params![id], map_row).optional()?)
}

/// Estudiante activo en el sistema (no eliminado); si no, `NotFound`.
pub fn requerir_vigente(conn: &Connection, id: i64) -> ApiResult<Estudiante> {
    match obtener(conn, id)? {
        Some(e) if e.deleted_at.is_none() => Ok(e),
        _ => Err(ApiError::not_found("student", id)),
    }
}

pub fn buscar_por_cedula(conn: &Connection, cedula: &str) -> ApiResult<Option<Estudiante>> {
    let sql = format!("SELECT {} FROM estudiantes WHERE cedula = ?1", COLUMNAS);
    Ok(conn.query_row(&sql, params![cedula.trim()], map_row).optional()?)
}

pub fn crear(conn: &Connection, datos: &DatosEstudiante) -> ApiResult<Estudiante> {
    let ts = ahora();
    conn.execute(
        "INSERT INTO estudiantes (nombres, apellidos, cedula, fecha_nacimiento, grado_id, seccion_id, estado, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            datos.nombres.trim(),
            datos.apellidos.trim(),
            datos.cedula.trim(),
            datos.fecha_nacimiento,
            datos.grado_id,
            datos.seccion_id,
            datos.estado,
            ts,
        ],
    )?;
    requerir_vigente(conn, conn.last_insert_rowid())
}

pub fn actualizar(conn: &Connection, id: i64, datos: &DatosEstudiante) -> ApiResult<Estudiante> {
    requerir_vigente(conn, id)?;
    conn.execute(
        "UPDATE estudiantes SET nombres = ?1, apellidos = ?2, cedula = ?3, fecha_nacimiento = ?4,
                grado_id = ?5, seccion_id = ?6, estado = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            datos.nombres.trim(),
            datos.apellidos.trim(),
            datos.cedula.trim(),
            datos.fecha_nacimiento,
            datos.grado_id,
            datos.seccion_id,
            datos.estado,
            ahora(),
            id,
        ],
    )?;
    requerir_vigente(conn, id)
}

/// Borrado lógico: marca `deleted_at`. Las calificaciones históricas se conservan.
pub fn eliminar(conn: &Connection, id: i64) -> ApiResult<Estudiante> {
    let estudiante = requerir_vigente(conn, id)?;
    let ts = ahora();
    conn.execute("UPDATE estudiantes SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2", params![ts, id])?;
    Ok(Estudiante { deleted_at: Some(ts.clone()), updated_at: ts, ..estudiante })
}

/// Destino de una promoción: nuevo grado/sección o egreso.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Destino {
    Grado { grado_id: i64, seccion_id: Option<i64> },
    Graduar,
}

pub fn promover(conn: &Connection, id: i64, destino: Destino) -> ApiResult<Estudiante> {
    requerir_vigente(conn, id)?;
    match destino {
        Destino::Grado { grado_id, seccion_id } => {
            conn.execute(
                "UPDATE estudiantes SET grado_id = ?1, seccion_id = COALESCE(?2, seccion_id), updated_at = ?3 WHERE id = ?4",
                params![grado_id, seccion_id, ahora(), id],
            )?;
        }
        Destino::Graduar => {
            conn.execute(
                "UPDATE estudiantes SET estado = ?1, updated_at = ?2 WHERE id = ?3",
                params![EstadoEstudiante::Graduado, ahora(), id],
            )?;
        }
    }
    requerir_vigente(conn, id)
}

/// Ids de los estudiantes activos y vigentes de un grado (y opcionalmente una sección).
pub fn ids_activos_de(conn: &Connection, grado_id: i64, seccion_id: Option<i64>) -> ApiResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM estudiantes
         WHERE deleted_at IS NULL AND estado = 'ACTIVO' AND grado_id = ?1
           AND (?2 IS NULL OR seccion_id = ?2)
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![grado_id, seccion_id], |row| row.get::<_, i64>(0))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn contar_vigentes(conn: &Connection) -> ApiResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM estudiantes WHERE deleted_at IS NULL", [], |r| r.get(0))?)
}
