use crate::error::{ApiError, ApiResult};
use crate::models::{ahora, Role, Usuario};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn map_row(row: &Row<'_>) -> rusqlite::Result<Usuario> {
    Ok(Usuario {
        id: row.get(0)?,
        username: row.get(1)?,
        role: row.get(2)?,
        docente_id: row.get(3)?,
        activo: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const COLUMNAS: &str = "id, username, role, docente_id, activo, created_at";

pub fn listar(conn: &Connection) -> ApiResult<Vec<Usuario>> {
    let sql = format!("SELECT {} FROM usuarios ORDER BY username", COLUMNAS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn obtener(conn: &Connection, id: i64) -> ApiResult<Option<Usuario>> {
    let sql = format!("SELECT {} FROM usuarios WHERE id = ?1", COLUMNAS);
    Ok(conn.query_row(&sql, params![id], map_row).optional()?)
}

pub fn requerir(conn: &Connection, id: i64) -> ApiResult<Usuario> {
    obtener(conn, id)?.ok_or_else(|| ApiError::not_found("user", id))
}

/// Usuario y hash de su contraseña, para el login.
pub fn credenciales(conn: &Connection, username: &str) -> ApiResult<Option<(Usuario, String)>> {
    let sql = format!("SELECT {}, password_hash FROM usuarios WHERE username = ?1", COLUMNAS);
    Ok(conn
        .query_row(&sql, params![username.trim()], |row| Ok((map_row(row)?, row.get::<_, String>(6)?)))
        .optional()?)
}

pub fn crear(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    role: Role,
    docente_id: Option<i64>,
) -> ApiResult<Usuario> {
    conn.execute(
        "INSERT INTO usuarios (username, password_hash, role, docente_id, activo, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![username.trim(), password_hash, role, docente_id, ahora()],
    )?;
    requerir(conn, conn.last_insert_rowid())
}

pub fn actualizar(conn: &Connection, id: i64, role: Role, docente_id: Option<i64>, activo: bool) -> ApiResult<Usuario> {
    let n = conn.execute(
        "UPDATE usuarios SET role = ?1, docente_id = ?2, activo = ?3 WHERE id = ?4",
        params![role, docente_id, activo, id],
    )?;
    if n == 0 {
        return Err(ApiError::not_found("user", id));
    }
    requerir(conn, id)
}

pub fn cambiar_password(conn: &Connection, id: i64, password_hash: &str) -> ApiResult<()> {
    let n = conn.execute("UPDATE usuarios SET password_hash = ?1 WHERE id = ?2", params![password_hash, id])?;
    if n == 0 {
        return Err(ApiError::not_found("user", id));
    }
    Ok(())
}

pub fn eliminar(conn: &Connection, id: i64) -> ApiResult<Usuario> {
    let usuario = requerir(conn, id)?;
    conn.execute("DELETE FROM usuarios WHERE id = ?1", params![id])?;
    Ok(usuario)
}

pub fn contar(conn: &Connection) -> ApiResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM usuarios", [], |r| r.get(0))?)
}
