//! Lectura de planillas Excel.
//!
//! Submódulos:
//! - `io`: helpers de celdas y lectura de la primera hoja con calamine
//! - `estudiantes`: importación masiva de estudiantes por cédula

/// Helpers de IO y utilidades para parsing de Excel
pub mod io;

/// Importación de estudiantes: `interpretar_filas` + `importar`
pub mod estudiantes;

pub use estudiantes::{importar, interpretar_filas, ResumenImportacion};
pub use io::read_first_sheet;
