use crate::auth::AuthUser;
use crate::db::auditoria::{self, Autor};
use crate::db::catalogos::{self, TipoCatalogo};
use crate::db::{estudiantes, materias};
use crate::error::{ApiError, ApiResult};
use crate::models::{ahora, Calificacion, Evaluacion, Materia};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;

/// Petición de sincronización ya validada. Un lapso en `None` no se toca;
/// `Some(vec![])` borra todas sus evaluaciones.
#[derive(Debug, Clone)]
pub struct Sincronizacion {
    pub student_id: i64,
    pub materia_id: i64,
    pub anio_id: i64,
    pub lapsos: [Option<Vec<Evaluacion>>; 3],
}

#[derive(Debug, Clone, Default)]
pub struct FiltroCalificaciones {
    pub student_id: Option<i64>,
    pub materia_id: Option<i64>,
    pub anio_id: Option<i64>,
}

struct Cabecera {
    id: i64,
    student_id: i64,
    materia_id: i64,
    anio_id: i64,
    is_locked: bool,
    created_at: String,
    updated_at: String,
}

const COLUMNAS: &str = "id, estudiante_id, materia_id, anio_id, is_locked, created_at, updated_at";

fn map_cabecera(row: &Row<'_>) -> rusqlite::Result<Cabecera> {
    Ok(Cabecera {
        id: row.get(0)?,
        student_id: row.get(1)?,
        materia_id: row.get(2)?,
        anio_id: row.get(3)?,
        is_locked: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn cargar_evaluaciones(conn: &Connection, cab: Cabecera) -> ApiResult<Calificacion> {
    let mut stmt = conn.prepare(
        "SELECT id, lapso, descripcion, ponderacion, nota FROM evaluaciones WHERE calificacion_id = ?1 ORDER BY lapso, id",
    )?;
    let rows = stmt.query_map(params![cab.id], |row| {
        let lapso: i64 = row.get(1)?;
        let ev = Evaluacion { id: row.get(0)?, descripcion: row.get(2)?, ponderacion: row.get(3)?, nota: row.get(4)? };
        Ok((lapso, ev))
    })?;
    let mut lapsos: [Vec<Evaluacion>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for r in rows {
        let (lapso, ev) = r?;
        if (1..=3).contains(&lapso) {
            lapsos[(lapso - 1) as usize].push(ev);
        }
    }
    let [lapso1, lapso2, lapso3] = lapsos;
    Ok(Calificacion {
        id: cab.id,
        student_id: cab.student_id,
        materia_id: cab.materia_id,
        anio_id: cab.anio_id,
        is_locked: cab.is_locked,
        lapso1,
        lapso2,
        lapso3,
        created_at: cab.created_at,
        updated_at: cab.updated_at,
    })
}

pub fn obtener(conn: &Connection, id: i64) -> ApiResult<Option<Calificacion>> {
    let sql = format!("SELECT {} FROM calificaciones WHERE id = ?1", COLUMNAS);
    match conn.query_row(&sql, params![id], map_cabecera).optional()? {
        Some(cab) => Ok(Some(cargar_evaluaciones(conn, cab)?)),
        None => Ok(None),
    }
}

pub fn requerir(conn: &Connection, id: i64) -> ApiResult<Calificacion> {
    obtener(conn, id)?.ok_or_else(|| ApiError::not_found("grade record", id))
}

pub fn buscar(conn: &Connection, student_id: i64, materia_id: i64, anio_id: i64) -> ApiResult<Option<Calificacion>> {
    let sql = format!(
        "SELECT {} FROM calificaciones WHERE estudiante_id = ?1 AND materia_id = ?2 AND anio_id = ?3",
        COLUMNAS
    );
    match conn.query_row(&sql, params![student_id, materia_id, anio_id], map_cabecera).optional()? {
        Some(cab) => Ok(Some(cargar_evaluaciones(conn, cab)?)),
        None => Ok(None),
    }
}

/// Lista calificaciones. No excluye estudiantes eliminados: los registros
/// históricos siguen siendo consultables por id de estudiante.
pub fn listar(conn: &Connection, filtro: &FiltroCalificaciones) -> ApiResult<Vec<Calificacion>> {
    let sql = format!(
        "SELECT {} FROM calificaciones
         WHERE (?1 IS NULL OR estudiante_id = ?1) AND (?2 IS NULL OR materia_id = ?2) AND (?3 IS NULL OR anio_id = ?3)
         ORDER BY anio_id, estudiante_id, materia_id",
        COLUMNAS
    );
    let cabeceras: Vec<Cabecera> = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![filtro.student_id, filtro.materia_id, filtro.anio_id], map_cabecera)?;
        let mut v = Vec::new();
        for r in rows {
            v.push(r?);
        }
        v
    };
    cabeceras.into_iter().map(|cab| cargar_evaluaciones(conn, cab)).collect()
}

/// Un docente sólo escribe sobre materias asignadas al docente vinculado a su usuario.
fn verificar_asignacion(actor: &AuthUser, materia: &Materia) -> ApiResult<()> {
    if actor.role.es_privilegiado() {
        return Ok(());
    }
    match (actor.docente_id, materia.docente_id) {
        (Some(a), Some(b)) if a == b => Ok(()),
        _ => Err(ApiError::Forbidden(format!("subject {} is not assigned to this teacher", materia.id))),
    }
}

/// Inserta o reemplaza las evaluaciones de los lapsos presentes dentro de una
/// transacción (borrar-e-insertar por lapso) y registra la auditoría.
pub fn sincronizar(conn: &mut Connection, actor: &AuthUser, sync: &Sincronizacion) -> ApiResult<Calificacion> {
    let tx = conn.transaction()?;

    estudiantes::requerir_vigente(&tx, sync.student_id)?;
    let materia = materias::requerir(&tx, sync.materia_id)?;
    catalogos::requerir(&tx, TipoCatalogo::AnioEscolar, sync.anio_id)?;
    verificar_asignacion(actor, &materia)?;

    let existente: Option<(i64, bool)> = tx
        .query_row(
            "SELECT id, is_locked FROM calificaciones WHERE estudiante_id = ?1 AND materia_id = ?2 AND anio_id = ?3",
            params![sync.student_id, sync.materia_id, sync.anio_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let ts = ahora();
    let calificacion_id = match existente {
        Some((id, is_locked)) => {
            if !crate::calculo::puede_editar(actor.role, is_locked) {
                return Err(ApiError::Forbidden("grade record is locked".to_string()));
            }
            tx.execute("UPDATE calificaciones SET updated_at = ?1 WHERE id = ?2", params![ts, id])?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO calificaciones (estudiante_id, materia_id, anio_id, is_locked, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)",
                params![sync.student_id, sync.materia_id, sync.anio_id, ts],
            )?;
            tx.last_insert_rowid()
        }
    };

    let mut reemplazados: Vec<i64> = Vec::new();
    for (idx, lapso) in sync.lapsos.iter().enumerate() {
        let Some(evaluaciones) = lapso else { continue };
        let numero = idx as i64 + 1;
        tx.execute(
            "DELETE FROM evaluaciones WHERE calificacion_id = ?1 AND lapso = ?2",
            params![calificacion_id, numero],
        )?;
        for ev in evaluaciones {
            tx.execute(
                "INSERT INTO evaluaciones (calificacion_id, lapso, descripcion, ponderacion, nota) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![calificacion_id, numero, ev.descripcion.trim(), ev.ponderacion, ev.nota],
            )?;
        }
        reemplazados.push(numero);
    }

    auditoria::registrar(
        &tx,
        Autor { usuario_id: Some(actor.id), username: &actor.username },
        "UPDATE_GRADES",
        "CALIFICACION",
        Some(calificacion_id),
        &json!({
            "studentId": sync.student_id,
            "materiaId": sync.materia_id,
            "anioId": sync.anio_id,
            "lapsos": reemplazados,
        }),
    )?;

    let resultado = requerir(&tx, calificacion_id)?;
    tx.commit()?;
    Ok(resultado)
}

/// Cambia el bloqueo. Los roles privilegiados bloquean y desbloquean; un
/// docente asignado sólo puede bloquear.
pub fn cambiar_bloqueo(conn: &mut Connection, actor: &AuthUser, id: i64, bloquear: bool) -> ApiResult<Calificacion> {
    let tx = conn.transaction()?;
    let actual = requerir(&tx, id)?;
    let materia = materias::requerir(&tx, actual.materia_id)?;
    verificar_asignacion(actor, &materia)?;
    if !bloquear && !actor.role.es_privilegiado() {
        return Err(ApiError::Forbidden("only ADMIN, DIRECTOR or CONTROL_ESTUDIOS can unlock grades".to_string()));
    }

    if actual.is_locked != bloquear {
        tx.execute(
            "UPDATE calificaciones SET is_locked = ?1, updated_at = ?2 WHERE id = ?3",
            params![bloquear, ahora(), id],
        )?;
        auditoria::registrar(
            &tx,
            Autor { usuario_id: Some(actor.id), username: &actor.username },
            if bloquear { "LOCK_GRADES" } else { "UNLOCK_GRADES" },
            "CALIFICACION",
            Some(id),
            &json!({"isLocked": bloquear}),
        )?;
    }

    let resultado = requerir(&tx, id)?;
    tx.commit()?;
    Ok(resultado)
}
