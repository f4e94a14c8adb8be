use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// Convierte una celda de calamine a String (versión genérica para celdas)
pub fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if (f.floor() - f).abs() < f64::EPSILON {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Int(i) => format!("{}", i),
        Data::Bool(b) => format!("{}", b),
        Data::Empty => String::new(),
        Data::Error(_) => String::new(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => d.date().format("%Y-%m-%d").to_string(),
            None => dt.to_string(),
        },
        Data::DateTimeIso(s) => s.chars().take(10).collect(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Normaliza encabezados: minúsculas, sin espacios, guiones ni acentos.
pub fn normalize_header(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

/// Lee la primera hoja de un libro en memoria como filas de texto.
pub fn read_first_sheet(bytes: Vec<u8>) -> Result<Vec<Vec<String>>, Box<dyn std::error::Error>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let names = workbook.sheet_names().to_owned();
    let Some(first) = names.first() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(first)?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for r in range.rows() {
        rows.push(r.iter().map(cell_to_string).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Cédula "), "cedula");
        assert_eq!(normalize_header("Fecha_Nacimiento"), "fechanacimiento");
        assert_eq!(normalize_header("fecha de nacimiento"), "fechadenacimiento");
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Float(30111222.0)), "30111222");
        assert_eq!(cell_to_string(&Data::Float(14.5)), "14.5");
        assert_eq!(cell_to_string(&Data::String("  Ana ".to_string())), "Ana");
        assert_eq!(cell_to_string(&Data::DateTimeIso("2010-05-04T00:00:00".to_string())), "2010-05-04");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
