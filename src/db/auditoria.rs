//! Registro de auditoría append-only: no existe operación de actualización ni
//! de borrado sobre `audit_logs`.

use crate::error::ApiResult;
use crate::models::{ahora, RegistroAuditoria};
use rusqlite::{params, Connection};
use serde_json::Value as JsonValue;

/// Quién ejecutó la acción.
#[derive(Debug, Clone, Copy)]
pub struct Autor<'a> {
    pub usuario_id: Option<i64>,
    pub username: &'a str,
}

/// Filtros de consulta ya normalizados. Las fechas son cotas RFC 3339:
/// `desde` inclusiva y `hasta` exclusiva.
#[derive(Debug, Clone, Default)]
pub struct FiltroAuditoria {
    pub accion: Option<String>,
    pub desde: Option<String>,
    pub hasta: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub fn registrar(
    conn: &Connection,
    autor: Autor<'_>,
    accion: &str,
    entidad: &str,
    entidad_id: Option<i64>,
    detalles: &JsonValue,
) -> ApiResult<i64> {
    conn.execute(
        "INSERT INTO audit_logs (usuario_id, username, accion, entidad, entidad_id, detalles, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![autor.usuario_id, autor.username, accion, entidad, entidad_id, detalles.to_string(), ahora()],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(id, accion, entidad, entidad_id, usuario = autor.username, "audit");
    Ok(id)
}

/// `%` y `_` del filtro se buscan literalmente.
fn escapar_like(texto: &str) -> String {
    let mut out = String::with_capacity(texto.len());
    for c in texto.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Devuelve `(total, página)`; la página viene ordenada de más reciente a más antigua.
pub fn consultar(conn: &Connection, filtro: &FiltroAuditoria) -> ApiResult<(i64, Vec<RegistroAuditoria>)> {
    let accion_like = filtro
        .accion
        .as_ref()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|a| format!("%{}%", escapar_like(&a.to_uppercase())));
    let condicion = "(?1 IS NULL OR upper(accion) LIKE ?1 ESCAPE '\\')
           AND (?2 IS NULL OR created_at >= ?2)
           AND (?3 IS NULL OR created_at < ?3)";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM audit_logs WHERE {}", condicion),
        params![accion_like, filtro.desde, filtro.hasta],
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT id, usuario_id, username, accion, entidad, entidad_id, detalles, created_at
         FROM audit_logs WHERE {} ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5",
        condicion
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![accion_like, filtro.desde, filtro.hasta, filtro.limit, filtro.offset],
        |row| {
            let detalles: String = row.get(6)?;
            Ok(RegistroAuditoria {
                id: row.get(0)?,
                usuario_id: row.get(1)?,
                username: row.get(2)?,
                accion: row.get(3)?,
                entidad: row.get(4)?,
                entidad_id: row.get(5)?,
                detalles: serde_json::from_str(&detalles).unwrap_or(JsonValue::String(detalles)),
                created_at: row.get(7)?,
            })
        },
    )?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok((total, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapar_like() {
        assert_eq!(escapar_like("UPDATE_GRADES"), "UPDATE\\_GRADES");
        assert_eq!(escapar_like("100%"), "100\\%");
        assert_eq!(escapar_like("LOCK"), "LOCK");
    }
}
