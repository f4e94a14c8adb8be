use crate::error::{ApiError, ApiResult};
use crate::models::Materia;
use rusqlite::{params, Connection, OptionalExtension, Row};

fn map_row(row: &Row<'_>) -> rusqlite::Result<Materia> {
    Ok(Materia {
        id: row.get(0)?,
        nombre: row.get(1)?,
        docente_id: row.get(2)?,
        grado_id: row.get(3)?,
        seccion_id: row.get(4)?,
    })
}

#[derive(Debug, Clone)]
pub struct DatosMateria {
    pub nombre: String,
    pub docente_id: Option<i64>,
    pub grado_id: i64,
    pub seccion_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct FiltroMaterias {
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub docente_id: Option<i64>,
}

/// Lista materias. Con `seccion_id`, incluye también las materias comunes a
/// todas las secciones del grado (`seccion_id` nulo).
pub fn listar(conn: &Connection, filtro: &FiltroMaterias) -> ApiResult<Vec<Materia>> {
    let mut stmt = conn.prepare(
        "SELECT id, nombre, docente_id, grado_id, seccion_id FROM materias
         WHERE (?1 IS NULL OR grado_id = ?1)
           AND (?2 IS NULL OR seccion_id IS NULL OR seccion_id = ?2)
           AND (?3 IS NULL OR docente_id = ?3)
         ORDER BY nombre, id",
    )?;
    let rows = stmt.query_map(params![filtro.grado_id, filtro.seccion_id, filtro.docente_id], map_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn obtener(conn: &Connection, id: i64) -> ApiResult<Option<Materia>> {
    Ok(conn
        .query_row("SELECT id, nombre, docente_id, grado_id, seccion_id FROM materias WHERE id = ?1", params![id], map_row)
        .optional()?)
}

pub fn requerir(conn: &Connection, id: i64) -> ApiResult<Materia> {
    obtener(conn, id)?.ok_or_else(|| ApiError::not_found("subject", id))
}

pub fn crear(conn: &Connection, datos: &DatosMateria) -> ApiResult<Materia> {
    conn.execute(
        "INSERT INTO materias (nombre, docente_id, grado_id, seccion_id) VALUES (?1, ?2, ?3, ?4)",
        params![datos.nombre.trim(), datos.docente_id, datos.grado_id, datos.seccion_id],
    )?;
    requerir(conn, conn.last_insert_rowid())
}

pub fn actualizar(conn: &Connection, id: i64, datos: &DatosMateria) -> ApiResult<Materia> {
    let n = conn.execute(
        "UPDATE materias SET nombre = ?1, docente_id = ?2, grado_id = ?3, seccion_id = ?4 WHERE id = ?5",
        params![datos.nombre.trim(), datos.docente_id, datos.grado_id, datos.seccion_id, id],
    )?;
    if n == 0 {
        return Err(ApiError::not_found("subject", id));
    }
    requerir(conn, id)
}

/// Falla con `Conflict` si la materia ya tiene calificaciones registradas.
pub fn eliminar(conn: &Connection, id: i64) -> ApiResult<Materia> {
    let materia = requerir(conn, id)?;
    conn.execute("DELETE FROM materias WHERE id = ?1", params![id])?;
    Ok(materia)
}

/// Materias que aparecen en el boletín de un estudiante: las de su grado y
/// sección más cualquiera con calificación registrada en ese año.
pub fn de_estudiante(
    conn: &Connection,
    estudiante_id: i64,
    grado_id: Option<i64>,
    seccion_id: Option<i64>,
    anio_id: i64,
) -> ApiResult<Vec<Materia>> {
    let mut stmt = conn.prepare(
        "SELECT id, nombre, docente_id, grado_id, seccion_id FROM materias
         WHERE (grado_id = ?1 AND (seccion_id IS NULL OR seccion_id = ?2))
            OR id IN (SELECT materia_id FROM calificaciones WHERE estudiante_id = ?3 AND anio_id = ?4)
         ORDER BY nombre, id",
    )?;
    let rows = stmt.query_map(params![grado_id, seccion_id, estudiante_id, anio_id], map_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn contar(conn: &Connection) -> ApiResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM materias", [], |r| r.get(0))?)
}
