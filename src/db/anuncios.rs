use crate::error::ApiResult;
use crate::models::{ahora, Anuncio, Notificacion};
use rusqlite::{params, Connection};

pub fn listar_anuncios(conn: &Connection, limit: i64) -> ApiResult<Vec<Anuncio>> {
    let mut stmt = conn.prepare(
        "SELECT id, titulo, contenido, autor_id, created_at FROM anuncios ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(Anuncio {
            id: row.get(0)?,
            titulo: row.get(1)?,
            contenido: row.get(2)?,
            autor_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn crear_anuncio(conn: &Connection, titulo: &str, contenido: &str, autor_id: Option<i64>) -> ApiResult<Anuncio> {
    let ts = ahora();
    conn.execute(
        "INSERT INTO anuncios (titulo, contenido, autor_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![titulo.trim(), contenido, autor_id, ts],
    )?;
    Ok(Anuncio {
        id: conn.last_insert_rowid(),
        titulo: titulo.trim().to_string(),
        contenido: contenido.to_string(),
        autor_id,
        created_at: ts,
    })
}

pub fn listar_notificaciones(conn: &Connection, usuario_id: i64, limit: i64) -> ApiResult<Vec<Notificacion>> {
    let mut stmt = conn.prepare(
        "SELECT id, usuario_id, mensaje, created_at FROM notificaciones WHERE usuario_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![usuario_id, limit], |row| {
        Ok(Notificacion { id: row.get(0)?, usuario_id: row.get(1)?, mensaje: row.get(2)?, created_at: row.get(3)? })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn crear_notificacion(conn: &Connection, usuario_id: i64, mensaje: &str) -> ApiResult<Notificacion> {
    let ts = ahora();
    conn.execute(
        "INSERT INTO notificaciones (usuario_id, mensaje, created_at) VALUES (?1, ?2, ?3)",
        params![usuario_id, mensaje, ts],
    )?;
    Ok(Notificacion { id: conn.last_insert_rowid(), usuario_id, mensaje: mensaje.to_string(), created_at: ts })
}
