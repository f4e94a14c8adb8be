use crate::error::{ApiError, ApiResult};
use crate::models::{ahora, Docente, EstadoDocente};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNAS: &str = "id, nombres, apellidos, cedula, email, telefono, estado, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Docente> {
    Ok(Docente {
        id: row.get(0)?,
        nombres: row.get(1)?,
        apellidos: row.get(2)?,
        cedula: row.get(3)?,
        email: row.get(4)?,
        telefono: row.get(5)?,
        estado: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[derive(Debug, Clone)]
pub struct DatosDocente {
    pub nombres: String,
    pub apellidos: String,
    pub cedula: String,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub estado: EstadoDocente,
}

pub fn listar(conn: &Connection) -> ApiResult<Vec<Docente>> {
    let sql = format!("SELECT {} FROM docentes ORDER BY apellidos, nombres", COLUMNAS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn obtener(conn: &Connection, id: i64) -> ApiResult<Option<Docente>> {
    let sql = format!("SELECT {} FROM docentes WHERE id = ?1", COLUMNAS);
    Ok(conn.query_row(&sql, params![id], map_row).optional()?)
}

pub fn requerir(conn: &Connection, id: i64) -> ApiResult<Docente> {
    obtener(conn, id)?.ok_or_else(|| ApiError::not_found("teacher", id))
}

pub fn crear(conn: &Connection, datos: &DatosDocente) -> ApiResult<Docente> {
    let ts = ahora();
    conn.execute(
        "INSERT INTO docentes (nombres, apellidos, cedula, email, telefono, estado, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            datos.nombres.trim(),
            datos.apellidos.trim(),
            datos.cedula.trim(),
            datos.email,
            datos.telefono,
            datos.estado,
            ts,
        ],
    )?;
    requerir(conn, conn.last_insert_rowid())
}

pub fn actualizar(conn: &Connection, id: i64, datos: &DatosDocente) -> ApiResult<Docente> {
    let n = conn.execute(
        "UPDATE docentes SET nombres = ?1, apellidos = ?2, cedula = ?3, email = ?4, telefono = ?5, estado = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            datos.nombres.trim(),
            datos.apellidos.trim(),
            datos.cedula.trim(),
            datos.email,
            datos.telefono,
            datos.estado,
            ahora(),
            id,
        ],
    )?;
    if n == 0 {
        return Err(ApiError::not_found("teacher", id));
    }
    requerir(conn, id)
}

/// Borrado físico. Materias y usuarios vinculados quedan sin docente (ON DELETE SET NULL).
pub fn eliminar(conn: &Connection, id: i64) -> ApiResult<Docente> {
    let docente = requerir(conn, id)?;
    conn.execute("DELETE FROM docentes WHERE id = ?1", params![id])?;
    Ok(docente)
}

pub fn contar(conn: &Connection) -> ApiResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM docentes", [], |r| r.get(0))?)
}
