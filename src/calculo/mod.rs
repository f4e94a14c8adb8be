//! Aritmética de calificaciones: promedio ponderado por lapso, nota definitiva
//! y la regla de bloqueo.
//!
//! La definitiva es la media de los lapsos que tienen promedio (se divide por
//! la cantidad de lapsos presentes, no por 3). Todas las vistas usan esta
//! misma regla.

use crate::models::{Evaluacion, Role};

/// Nota mínima aprobatoria en la escala 0-20.
pub const NOTA_APROBATORIA: f64 = 10.0;
pub const NOTA_MAXIMA: f64 = 20.0;
pub const PONDERACION_MAXIMA: f64 = 100.0;

/// `Σ(nota·ponderación) / Σ(ponderación)`; `None` si la lista está vacía o la
/// ponderación total es 0.
pub fn promedio_lapso(evaluaciones: &[Evaluacion]) -> Option<f64> {
    let total_ponderacion: f64 = evaluaciones.iter().map(|e| e.ponderacion).sum();
    if evaluaciones.is_empty() || total_ponderacion <= 0.0 {
        return None;
    }
    let suma: f64 = evaluaciones.iter().map(|e| e.nota * e.ponderacion).sum();
    Some(suma / total_ponderacion)
}

/// Los tres promedios de lapso de una calificación.
pub fn promedios_lapsos(lapsos: [&[Evaluacion]; 3]) -> [Option<f64>; 3] {
    [promedio_lapso(lapsos[0]), promedio_lapso(lapsos[1]), promedio_lapso(lapsos[2])]
}

/// Media aritmética de los valores presentes; `None` si no hay ninguno.
fn media_presentes(valores: &[Option<f64>]) -> Option<f64> {
    let presentes: Vec<f64> = valores.iter().filter_map(|v| *v).collect();
    if presentes.is_empty() {
        None
    } else {
        Some(presentes.iter().sum::<f64>() / presentes.len() as f64)
    }
}

/// Nota definitiva a partir de los promedios de lapso disponibles.
pub fn definitiva(promedios: &[Option<f64>; 3]) -> Option<f64> {
    media_presentes(promedios)
}

/// Promedio general de un estudiante: media de sus definitivas presentes.
pub fn promedio_general(definitivas: &[Option<f64>]) -> Option<f64> {
    media_presentes(definitivas)
}

pub fn aprobado(definitiva: Option<f64>) -> Option<bool> {
    definitiva.map(|d| d >= NOTA_APROBATORIA)
}

/// Representación de una nota para mostrar: dos decimales o "-".
pub fn formatear_nota(nota: Option<f64>) -> String {
    match nota {
        Some(n) => format!("{:.2}", n),
        None => "-".to_string(),
    }
}

/// Un libro de calificaciones bloqueado sólo puede ser editado por roles privilegiados.
pub fn puede_editar(role: Role, is_locked: bool) -> bool {
    !is_locked || role.es_privilegiado()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(nota: f64, ponderacion: f64) -> Evaluacion {
        Evaluacion { id: 0, descripcion: format!("ev-{}-{}", nota, ponderacion), ponderacion, nota }
    }

    #[test]
    fn test_promedio_lapso_ponderado() {
        let evs = vec![ev(18.0, 40.0), ev(12.0, 60.0)];
        let p = promedio_lapso(&evs).unwrap();
        assert!((p - 14.4).abs() < 1e-9);
    }

    #[test]
    fn test_promedio_lapso_sin_ponderacion() {
        assert_eq!(promedio_lapso(&[]), None);
        assert_eq!(promedio_lapso(&[ev(15.0, 0.0), ev(10.0, 0.0)]), None);
    }

    #[test]
    fn test_promedio_no_normaliza_a_cien() {
        // ponderaciones que no suman 100 se normalizan por su total
        let p = promedio_lapso(&[ev(20.0, 10.0), ev(10.0, 10.0)]).unwrap();
        assert!((p - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_definitiva_divide_por_lapsos_presentes() {
        assert_eq!(definitiva(&[Some(12.0), None, Some(18.0)]), Some(15.0));
        assert_eq!(definitiva(&[Some(12.0), Some(15.0), Some(18.0)]), Some(15.0));
        assert_eq!(definitiva(&[None, None, None]), None);
    }

    #[test]
    fn test_aprobado_y_formato() {
        assert_eq!(aprobado(Some(10.0)), Some(true));
        assert_eq!(aprobado(Some(9.99)), Some(false));
        assert_eq!(aprobado(None), None);
        assert_eq!(formatear_nota(Some(14.4)), "14.40");
        assert_eq!(formatear_nota(None), "-");
    }

    #[test]
    fn test_puede_editar() {
        assert!(puede_editar(Role::Docente, false));
        assert!(!puede_editar(Role::Docente, true));
        for r in Role::PRIVILEGIADOS {
            assert!(puede_editar(r, true));
        }
    }
}
