//! Boletín, acta/constancia y exportación XLSX. No calculan nada propio: sólo
//! reúnen datos y aplican `calculo` a cada calificación.

pub mod xlsx;

use crate::api_json::AlcanceActa;
use crate::calculo::{aprobado, definitiva, promedio_general, promedios_lapsos};
use crate::db::catalogos::{self, TipoCatalogo};
use crate::db::estudiantes::{self, FiltroEstudiantes};
use crate::db::{calificaciones, materias};
use crate::error::ApiResult;
use crate::models::{Catalogo, Estudiante, Materia};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstudianteResumen {
    pub id: i64,
    pub cedula: String,
    pub nombres: String,
    pub apellidos: String,
}

impl From<&Estudiante> for EstudianteResumen {
    fn from(e: &Estudiante) -> Self {
        EstudianteResumen { id: e.id, cedula: e.cedula.clone(), nombres: e.nombres.clone(), apellidos: e.apellidos.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilaBoletin {
    pub materia_id: i64,
    pub materia: String,
    pub promedios: [Option<f64>; 3],
    pub definitiva: Option<f64>,
    pub aprobado: Option<bool>,
    pub is_locked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Boletin {
    pub estudiante: EstudianteResumen,
    pub grado: Option<Catalogo>,
    pub seccion: Option<Catalogo>,
    pub anio: Catalogo,
    pub materias: Vec<FilaBoletin>,
    pub promedio_general: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnaActa {
    pub materia_id: i64,
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilaActa {
    pub estudiante: EstudianteResumen,
    /// Definitivas en el mismo orden que `Acta::materias`.
    pub definitivas: Vec<Option<f64>>,
    pub promedio: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acta {
    pub anio: Catalogo,
    pub grado: Option<Catalogo>,
    pub seccion: Option<Catalogo>,
    pub materias: Vec<ColumnaActa>,
    pub filas: Vec<FilaActa>,
}

fn catalogo_opcional(conn: &Connection, tipo: TipoCatalogo, id: Option<i64>) -> ApiResult<Option<Catalogo>> {
    match id {
        Some(id) => catalogos::obtener(conn, tipo, id),
        None => Ok(None),
    }
}

fn fila_boletin(conn: &Connection, estudiante_id: i64, materia: &Materia, anio_id: i64) -> ApiResult<FilaBoletin> {
    let calificacion = calificaciones::buscar(conn, estudiante_id, materia.id, anio_id)?;
    let (promedios, is_locked) = match &calificacion {
        Some(c) => (promedios_lapsos(c.lapsos()), c.is_locked),
        None => ([None, None, None], false),
    };
    let def = definitiva(&promedios);
    Ok(FilaBoletin {
        materia_id: materia.id,
        materia: materia.nombre.clone(),
        promedios,
        definitiva: def,
        aprobado: aprobado(def),
        is_locked,
    })
}

/// Boletín de un estudiante vigente para un año escolar.
pub fn boletin(conn: &Connection, student_id: i64, anio_id: i64) -> ApiResult<Boletin> {
    let estudiante = estudiantes::requerir_vigente(conn, student_id)?;
    let anio = catalogos::requerir(conn, TipoCatalogo::AnioEscolar, anio_id)?;
    let lista = materias::de_estudiante(conn, student_id, estudiante.grado_id, estudiante.seccion_id, anio_id)?;

    let mut filas = Vec::with_capacity(lista.len());
    for m in &lista {
        filas.push(fila_boletin(conn, student_id, m, anio_id)?);
    }
    let definitivas: Vec<Option<f64>> = filas.iter().map(|f| f.definitiva).collect();

    Ok(Boletin {
        estudiante: EstudianteResumen::from(&estudiante),
        grado: catalogo_opcional(conn, TipoCatalogo::Grado, estudiante.grado_id)?,
        seccion: catalogo_opcional(conn, TipoCatalogo::Seccion, estudiante.seccion_id)?,
        anio,
        promedio_general: promedio_general(&definitivas),
        materias: filas,
    })
}

fn definitiva_de(conn: &Connection, student_id: i64, materia_id: i64, anio_id: i64) -> ApiResult<Option<f64>> {
    Ok(calificaciones::buscar(conn, student_id, materia_id, anio_id)?
        .and_then(|c| definitiva(&promedios_lapsos(c.lapsos()))))
}

/// Acta de una sección o constancia de un único estudiante.
pub fn acta(conn: &Connection, alcance: AlcanceActa) -> ApiResult<Acta> {
    let (anio_id, grado_id, seccion_id, lista_estudiantes, lista_materias) = match alcance {
        AlcanceActa::Seccion { grado_id, seccion_id, anio_id } => {
            catalogos::requerir(conn, TipoCatalogo::Grado, grado_id)?;
            catalogos::requerir(conn, TipoCatalogo::Seccion, seccion_id)?;
            let filtro = FiltroEstudiantes { grado_id: Some(grado_id), seccion_id: Some(seccion_id), ..Default::default() };
            let lista = estudiantes::listar(conn, &filtro)?;
            let filtro_m = materias::FiltroMaterias { grado_id: Some(grado_id), seccion_id: Some(seccion_id), docente_id: None };
            let mats = materias::listar(conn, &filtro_m)?;
            (anio_id, Some(grado_id), Some(seccion_id), lista, mats)
        }
        AlcanceActa::Estudiante { student_id, anio_id } => {
            let e = estudiantes::requerir_vigente(conn, student_id)?;
            let mats = materias::de_estudiante(conn, e.id, e.grado_id, e.seccion_id, anio_id)?;
            (anio_id, e.grado_id, e.seccion_id, vec![e], mats)
        }
    };
    let anio = catalogos::requerir(conn, TipoCatalogo::AnioEscolar, anio_id)?;

    let mut filas = Vec::with_capacity(lista_estudiantes.len());
    for e in &lista_estudiantes {
        let mut definitivas = Vec::with_capacity(lista_materias.len());
        for m in &lista_materias {
            definitivas.push(definitiva_de(conn, e.id, m.id, anio_id)?);
        }
        filas.push(FilaActa { estudiante: EstudianteResumen::from(e), promedio: promedio_general(&definitivas), definitivas });
    }

    Ok(Acta {
        anio,
        grado: catalogo_opcional(conn, TipoCatalogo::Grado, grado_id)?,
        seccion: catalogo_opcional(conn, TipoCatalogo::Seccion, seccion_id)?,
        materias: lista_materias.iter().map(|m| ColumnaActa { materia_id: m.id, nombre: m.nombre.clone() }).collect(),
        filas,
    })
}
