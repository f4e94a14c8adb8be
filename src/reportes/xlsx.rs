use crate::error::{ApiError, ApiResult};
use crate::reportes::Acta;
use std::io::Cursor;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const HOJA_ACTA: &str = "Acta";

/// Escribe el acta en un libro XLSX: fila 1 de encabezados (Cédula, Apellidos,
/// Nombres, una columna por materia, Promedio) y una fila por estudiante.
/// Las notas ausentes quedan como celda vacía.
pub fn acta_a_xlsx(acta: &Acta) -> ApiResult<Vec<u8>> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book
        .new_sheet(HOJA_ACTA)
        .map_err(|e| ApiError::Internal(format!("xlsx: {}", e)))?;

    let mut encabezados: Vec<String> = vec!["Cédula".to_string(), "Apellidos".to_string(), "Nombres".to_string()];
    encabezados.extend(acta.materias.iter().map(|m| m.nombre.clone()));
    encabezados.push("Promedio".to_string());

    for (i, titulo) in encabezados.iter().enumerate() {
        let cell = sheet.get_cell_mut((i as u32 + 1, 1u32));
        cell.set_value(titulo.as_str());
        cell.get_style_mut().get_font_mut().set_bold(true);
    }

    for (r, fila) in acta.filas.iter().enumerate() {
        let row = r as u32 + 2;
        sheet.get_cell_mut((1u32, row)).set_value(fila.estudiante.cedula.as_str());
        sheet.get_cell_mut((2u32, row)).set_value(fila.estudiante.apellidos.as_str());
        sheet.get_cell_mut((3u32, row)).set_value(fila.estudiante.nombres.as_str());
        let notas = fila.definitivas.iter().chain(std::iter::once(&fila.promedio));
        for (c, nota) in notas.enumerate() {
            if let Some(n) = nota {
                // dos decimales, igual que en el boletín
                let redondeada = (n * 100.0).round() / 100.0;
                sheet.get_cell_mut((c as u32 + 4, row)).set_value_number(redondeada);
            }
        }
    }

    let mut buf = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buf)
        .map_err(|e| ApiError::Internal(format!("xlsx write failed: {}", e)))?;
    Ok(buf.into_inner())
}

/// Nombre de archivo sugerido para la descarga.
pub fn nombre_archivo(acta: &Acta) -> String {
    let mut partes = vec!["acta".to_string()];
    if let Some(g) = &acta.grado {
        partes.push(g.nombre.clone());
    }
    if let Some(s) = &acta.seccion {
        partes.push(s.nombre.clone());
    }
    partes.push(acta.anio.nombre.clone());
    let base: String = partes
        .join("_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{}.xlsx", base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Catalogo;
    use crate::reportes::{ColumnaActa, EstudianteResumen, FilaActa};
    use calamine::{open_workbook_auto_from_rs, Data, Reader};

    fn acta_ejemplo() -> Acta {
        Acta {
            anio: Catalogo { id: 1, nombre: "2024-2025".to_string() },
            grado: Some(Catalogo { id: 1, nombre: "1er Año".to_string() }),
            seccion: Some(Catalogo { id: 1, nombre: "A".to_string() }),
            materias: vec![
                ColumnaActa { materia_id: 1, nombre: "Matemática".to_string() },
                ColumnaActa { materia_id: 2, nombre: "Castellano".to_string() },
            ],
            filas: vec![FilaActa {
                estudiante: EstudianteResumen {
                    id: 1,
                    cedula: "V-30111222".to_string(),
                    nombres: "Ana".to_string(),
                    apellidos: "Pérez".to_string(),
                },
                definitivas: vec![Some(14.4), None],
                promedio: Some(14.4),
            }],
        }
    }

    #[test]
    fn test_acta_a_xlsx_contenido() {
        let bytes = acta_a_xlsx(&acta_ejemplo()).unwrap();
        let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).expect("xlsx legible");
        let range = wb.worksheet_range(HOJA_ACTA).expect("hoja Acta");
        let rows: Vec<&[Data]> = range.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Data::String("Cédula".to_string()));
        assert_eq!(rows[0][3], Data::String("Matemática".to_string()));
        assert_eq!(rows[0][5], Data::String("Promedio".to_string()));
        assert_eq!(rows[1][0], Data::String("V-30111222".to_string()));
        assert_eq!(rows[1][3], Data::Float(14.4));
        assert_eq!(rows[1][4], Data::Empty);
    }

    #[test]
    fn test_nombre_archivo() {
        assert_eq!(nombre_archivo(&acta_ejemplo()), "acta_1er_A_o_A_2024-2025.xlsx");
    }
}
