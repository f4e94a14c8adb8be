pub mod anuncios;
pub mod auditoria;
pub mod auth;
pub mod calificaciones;
pub mod catalogos;
pub mod docentes;
pub mod docs;
pub mod estudiantes;
pub mod materias;
pub mod reportes;
pub mod usuarios;

use crate::auth::AuthUser;
use crate::db::auditoria::Autor;
use crate::db::catalogos::{self as db_catalogos, TipoCatalogo};
use crate::db::docentes as db_docentes;
use crate::error::{ApiResult, Issues};
use rusqlite::Connection;

pub(crate) fn autor(user: &AuthUser) -> Autor<'_> {
    Autor { usuario_id: Some(user.id), username: &user.username }
}

/// Comprueba que los ids referenciados existan; cada id inexistente es un problema de validación.
pub(crate) struct Referencias<'c> {
    conn: &'c Connection,
    issues: Issues,
}

impl<'c> Referencias<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Referencias { conn, issues: Issues::new() }
    }

    pub fn catalogo(mut self, path: &str, tipo: TipoCatalogo, id: Option<i64>) -> ApiResult<Self> {
        if let Some(id) = id {
            if db_catalogos::obtener(self.conn, tipo, id)?.is_none() {
                self.issues.push(path, format!("{} {} does not exist", tipo.entidad().to_lowercase(), id));
            }
        }
        Ok(self)
    }

    pub fn docente(mut self, path: &str, id: Option<i64>) -> ApiResult<Self> {
        if let Some(id) = id {
            if db_docentes::obtener(self.conn, id)?.is_none() {
                self.issues.push(path, format!("teacher {} does not exist", id));
            }
        }
        Ok(self)
    }

    pub fn finish(self) -> ApiResult<()> {
        self.issues.finish()
    }
}
