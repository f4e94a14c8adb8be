//! Persistencia en SQLite.
//!
//! Submódulos:
//! - `catalogos`: grados, secciones y años escolares
//! - `estudiantes`: CRUD con borrado lógico, promoción e importación
//! - `docentes`, `materias`, `usuarios`
//! - `calificaciones`: lectura, sincronización por lapso y bloqueo
//! - `auditoria`: registro append-only y consultas filtradas
//! - `anuncios`: anuncios y notificaciones

pub mod anuncios;
pub mod auditoria;
pub mod calificaciones;
pub mod catalogos;
pub mod docentes;
pub mod estudiantes;
pub mod materias;
pub mod usuarios;

use crate::error::{ApiError, ApiResult};
use rusqlite::Connection;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ESQUEMA: &str = "
CREATE TABLE IF NOT EXISTS docentes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombres TEXT NOT NULL,
    apellidos TEXT NOT NULL,
    cedula TEXT NOT NULL UNIQUE,
    email TEXT,
    telefono TEXT,
    estado TEXT NOT NULL DEFAULT 'ACTIVO',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS usuarios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    docente_id INTEGER REFERENCES docentes(id) ON DELETE SET NULL,
    activo INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS grados (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS secciones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS anios_escolares (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS estudiantes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombres TEXT NOT NULL,
    apellidos TEXT NOT NULL,
    cedula TEXT NOT NULL UNIQUE,
    fecha_nacimiento TEXT,
    grado_id INTEGER REFERENCES grados(id),
    seccion_id INTEGER REFERENCES secciones(id),
    estado TEXT NOT NULL DEFAULT 'ACTIVO',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS materias (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL,
    docente_id INTEGER REFERENCES docentes(id) ON DELETE SET NULL,
    grado_id INTEGER NOT NULL REFERENCES grados(id),
    seccion_id INTEGER REFERENCES secciones(id)
);

CREATE TABLE IF NOT EXISTS calificaciones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    estudiante_id INTEGER NOT NULL REFERENCES estudiantes(id),
    materia_id INTEGER NOT NULL REFERENCES materias(id),
    anio_id INTEGER NOT NULL REFERENCES anios_escolares(id),
    is_locked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (estudiante_id, materia_id, anio_id)
);

CREATE TABLE IF NOT EXISTS evaluaciones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    calificacion_id INTEGER NOT NULL REFERENCES calificaciones(id) ON DELETE CASCADE,
    lapso INTEGER NOT NULL CHECK (lapso BETWEEN 1 AND 3),
    descripcion TEXT NOT NULL,
    ponderacion REAL NOT NULL,
    nota REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evaluaciones_lapso ON evaluaciones (calificacion_id, lapso);

CREATE TABLE IF NOT EXISTS anuncios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    titulo TEXT NOT NULL,
    contenido TEXT NOT NULL,
    autor_id INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notificaciones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    usuario_id INTEGER NOT NULL REFERENCES usuarios(id) ON DELETE CASCADE,
    mensaje TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    usuario_id INTEGER,
    username TEXT NOT NULL,
    accion TEXT NOT NULL,
    entidad TEXT NOT NULL,
    entidad_id INTEGER,
    detalles TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_created ON audit_logs (created_at);
";

/// Conexión sqlite compartida entre los handlers (una sola conexión detrás de un Mutex).
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Abre (o crea) la base en `path`; `None` usa una base en memoria.
    pub fn open(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let conn = match path {
            Some(p) => {
                if let Some(dir) = p.parent() {
                    if !dir.as_os_str().is_empty() && !dir.exists() {
                        fs::create_dir_all(dir)?;
                    }
                }
                Connection::open(p)?
            }
            None => Connection::open_in_memory()?,
        };
        init_schema(&conn)?;
        Ok(Database { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self, Box<dyn Error>> {
        Self::open(None)
    }

    pub fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ApiError::Internal("database mutex poisoned".to_string()))
    }
}

/// Crea las tablas si no existen y activa las claves foráneas.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(ESQUEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        init_schema(&conn).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'calificaciones'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }
}
