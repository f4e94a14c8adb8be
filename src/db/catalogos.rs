use crate::error::{ApiError, ApiResult};
use crate::models::Catalogo;
use rusqlite::{params, Connection, OptionalExtension};

/// Las tres tablas de catálogo que sólo guardan un nombre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoCatalogo {
    Grado,
    Seccion,
    AnioEscolar,
}

impl TipoCatalogo {
    fn tabla(&self) -> &'static str {
        match self {
            TipoCatalogo::Grado => "grados",
            TipoCatalogo::Seccion => "secciones",
            TipoCatalogo::AnioEscolar => "anios_escolares",
        }
    }

    /// Nombre de la entidad usado en mensajes y en la auditoría.
    pub fn entidad(&self) -> &'static str {
        match self {
            TipoCatalogo::Grado => "GRADO",
            TipoCatalogo::Seccion => "SECCION",
            TipoCatalogo::AnioEscolar => "ANIO_ESCOLAR",
        }
    }
}

pub fn listar(conn: &Connection, tipo: TipoCatalogo) -> ApiResult<Vec<Catalogo>> {
    let sql = format!("SELECT id, nombre FROM {} ORDER BY nombre", tipo.tabla());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(Catalogo { id: row.get(0)?, nombre: row.get(1)? }))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn obtener(conn: &Connection, tipo: TipoCatalogo, id: i64) -> ApiResult<Option<Catalogo>> {
    let sql = format!("SELECT id, nombre FROM {} WHERE id = ?1", tipo.tabla());
    let found = conn
        .query_row(&sql, params![id], |row| Ok(Catalogo { id: row.get(0)?, nombre: row.get(1)? }))
        .optional()?;
    Ok(found)
}

/// Igual que `obtener`, pero un id inexistente es `NotFound`.
pub fn requerir(conn: &Connection, tipo: TipoCatalogo, id: i64) -> ApiResult<Catalogo> {
    obtener(conn, tipo, id)?.ok_or_else(|| ApiError::not_found(tipo.entidad(), id))
}

pub fn crear(conn: &Connection, tipo: TipoCatalogo, nombre: &str) -> ApiResult<Catalogo> {
    let sql = format!("INSERT INTO {} (nombre) VALUES (?1)", tipo.tabla());
    conn.execute(&sql, params![nombre.trim()])?;
    Ok(Catalogo { id: conn.last_insert_rowid(), nombre: nombre.trim().to_string() })
}

pub fn actualizar(conn: &Connection, tipo: TipoCatalogo, id: i64, nombre: &str) -> ApiResult<Catalogo> {
    let sql = format!("UPDATE {} SET nombre = ?1 WHERE id = ?2", tipo.tabla());
    let n = conn.execute(&sql, params![nombre.trim(), id])?;
    if n == 0 {
        return Err(ApiError::not_found(tipo.entidad(), id));
    }
    Ok(Catalogo { id, nombre: nombre.trim().to_string() })
}

/// Borrado físico. Si otra tabla referencia el registro, sqlite lo rechaza y
/// el error se traduce en `Conflict`.
pub fn eliminar(conn: &Connection, tipo: TipoCatalogo, id: i64) -> ApiResult<Catalogo> {
    let existente = requerir(conn, tipo, id)?;
    let sql = format!("DELETE FROM {} WHERE id = ?1", tipo.tabla());
    conn.execute(&sql, params![id])?;
    Ok(existente)
}
