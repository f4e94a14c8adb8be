use crate::auth::AuthUser;
use crate::db::auditoria::{self, Autor};
use crate::db::catalogos::{self, TipoCatalogo};
use crate::db::estudiantes::{self, DatosEstudiante};
use crate::error::{ApiError, ApiResult};
use crate::excel::io::normalize_header;
use crate::models::EstadoEstudiante;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;

/// Fila de la planilla ya interpretada (número de fila 1-based del libro).
#[derive(Debug, Clone, PartialEq)]
pub struct FilaImportacion {
    pub fila: usize,
    pub cedula: String,
    pub nombres: String,
    pub apellidos: String,
    pub fecha_nacimiento: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorFila {
    pub fila: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResumenImportacion {
    pub creados: usize,
    pub actualizados: usize,
    pub errores: Vec<ErrorFila>,
}

struct Columnas {
    cedula: usize,
    nombres: usize,
    apellidos: usize,
    fecha: Option<usize>,
}

fn ubicar_columnas(encabezado: &[String]) -> Result<Columnas, String> {
    let buscar = |nombres: &[&str]| encabezado.iter().position(|h| nombres.contains(&normalize_header(h).as_str()));
    let cedula = buscar(&["cedula", "ci"]).ok_or("missing column 'cedula'")?;
    let nombres = buscar(&["nombres", "nombre"]).ok_or("missing column 'nombres'")?;
    let apellidos = buscar(&["apellidos", "apellido"]).ok_or("missing column 'apellidos'")?;
    let fecha = buscar(&["fechanacimiento", "fechadenacimiento"]);
    Ok(Columnas { cedula, nombres, apellidos, fecha })
}

/// Interpreta las filas de la primera hoja. La primera fila es el encabezado;
/// las filas vacías se ignoran y las incompletas se reportan como error.
pub fn interpretar_filas(filas: &[Vec<String>]) -> ApiResult<(Vec<FilaImportacion>, Vec<ErrorFila>)> {
    let Some((encabezado, datos)) = filas.split_first() else {
        return Err(ApiError::campo("file", "the spreadsheet is empty"));
    };
    let cols = ubicar_columnas(encabezado).map_err(|e| ApiError::campo("file", &e))?;
    let celda = |fila: &Vec<String>, idx: usize| fila.get(idx).map(|s| s.trim().to_string()).unwrap_or_default();

    let mut validas = Vec::new();
    let mut errores = Vec::new();
    for (i, fila) in datos.iter().enumerate() {
        let numero = i + 2;
        if fila.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cedula = celda(fila, cols.cedula);
        let nombres = celda(fila, cols.nombres);
        let apellidos = celda(fila, cols.apellidos);
        if cedula.is_empty() || nombres.is_empty() || apellidos.is_empty() {
            errores.push(ErrorFila { fila: numero, error: "cedula, nombres and apellidos are required".to_string() });
            continue;
        }
        let fecha_nacimiento = cols.fecha.map(|c| celda(fila, c)).filter(|f| !f.is_empty());
        if let Some(f) = &fecha_nacimiento {
            if NaiveDate::parse_from_str(f, "%Y-%m-%d").is_err() {
                errores.push(ErrorFila { fila: numero, error: format!("invalid fecha_nacimiento '{}'", f) });
                continue;
            }
        }
        validas.push(FilaImportacion { fila: numero, cedula, nombres, apellidos, fecha_nacimiento });
    }
    Ok((validas, errores))
}

/// Crea o actualiza (por cédula) cada fila en el grado y sección dados, en
/// una sola transacción. Sin grado o sección, los estudiantes existentes
/// conservan los suyos. Una cédula repetida en la hoja se reporta como error.
pub fn importar(
    conn: &mut Connection,
    actor: &AuthUser,
    filas: &[FilaImportacion],
    errores_previos: Vec<ErrorFila>,
    grado_id: Option<i64>,
    seccion_id: Option<i64>,
) -> ApiResult<ResumenImportacion> {
    let tx = conn.transaction()?;
    if let Some(g) = grado_id {
        catalogos::requerir(&tx, TipoCatalogo::Grado, g)?;
    }
    if let Some(s) = seccion_id {
        catalogos::requerir(&tx, TipoCatalogo::Seccion, s)?;
    }

    let mut resumen = ResumenImportacion { errores: errores_previos, ..Default::default() };
    let mut vistas = HashSet::new();
    for f in filas {
        if !vistas.insert(f.cedula.as_str()) {
            resumen.errores.push(ErrorFila { fila: f.fila, error: format!("cedula {} is repeated in the sheet", f.cedula) });
            continue;
        }
        let mut datos = DatosEstudiante {
            nombres: f.nombres.clone(),
            apellidos: f.apellidos.clone(),
            cedula: f.cedula.clone(),
            fecha_nacimiento: f.fecha_nacimiento.clone(),
            grado_id,
            seccion_id,
            estado: EstadoEstudiante::Activo,
        };
        match estudiantes::buscar_por_cedula(&tx, &f.cedula)? {
            Some(e) if e.deleted_at.is_some() => {
                resumen.errores.push(ErrorFila { fila: f.fila, error: format!("student {} was deleted", f.cedula) });
            }
            Some(e) => {
                datos.estado = e.estado;
                datos.grado_id = grado_id.or(e.grado_id);
                datos.seccion_id = seccion_id.or(e.seccion_id);
                if datos.fecha_nacimiento.is_none() {
                    datos.fecha_nacimiento = e.fecha_nacimiento.clone();
                }
                estudiantes::actualizar(&tx, e.id, &datos)?;
                resumen.actualizados += 1;
            }
            None => {
                estudiantes::crear(&tx, &datos)?;
                resumen.creados += 1;
            }
        }
    }
    resumen.errores.sort_by_key(|e| e.fila);

    auditoria::registrar(
        &tx,
        Autor { usuario_id: Some(actor.id), username: &actor.username },
        "IMPORT_STUDENTS",
        "ESTUDIANTE",
        None,
        &json!({
            "creados": resumen.creados,
            "actualizados": resumen.actualizados,
            "errores": resumen.errores.len(),
            "gradoId": grado_id,
            "seccionId": seccion_id,
        }),
    )?;
    tx.commit()?;
    Ok(resumen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fila(celdas: &[&str]) -> Vec<String> {
        celdas.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_interpretar_filas() {
        let filas = vec![
            fila(&["Cédula", "Apellidos", "Nombres", "Fecha Nacimiento"]),
            fila(&["V-1", "Pérez", "Ana", "2010-05-04"]),
            fila(&["", "", "", ""]),
            fila(&["V-2", "", "Luis", ""]),
            fila(&["V-3", "Rojas", "Eva", "04/05/2010"]),
        ];
        let (validas, errores) = interpretar_filas(&filas).unwrap();
        assert_eq!(validas.len(), 1);
        assert_eq!(validas[0].apellidos, "Pérez");
        assert_eq!(validas[0].fecha_nacimiento.as_deref(), Some("2010-05-04"));
        let filas_con_error: Vec<usize> = errores.iter().map(|e| e.fila).collect();
        assert_eq!(filas_con_error, vec![4, 5]);
    }

    #[test]
    fn test_encabezado_incompleto() {
        let filas = vec![fila(&["cedula", "nombres"])];
        assert!(matches!(interpretar_filas(&filas), Err(ApiError::Validation(_))));
    }
}
