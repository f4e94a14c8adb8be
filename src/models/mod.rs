// Estructuras de datos principales

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct ValorDesconocido(pub String);

/// Implementa `as_str`, `FromStr`, `Display` y la conversión a/desde TEXT de sqlite
/// para un enum de valores fijos en mayúsculas.
macro_rules! enum_texto {
    ($tipo:ident { $($variante:ident => $texto:literal),+ $(,)? }) => {
        impl $tipo {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($tipo::$variante => $texto,)+
                }
            }
        }

        impl FromStr for $tipo {
            type Err = ValorDesconocido;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($texto => Ok($tipo::$variante),)+
                    other => Err(ValorDesconocido(other.to_string())),
                }
            }
        }

        impl std::fmt::Display for $tipo {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $tipo {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $tipo {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Director,
    ControlEstudios,
    Docente,
}

enum_texto!(Role {
    Admin => "ADMIN",
    Director => "DIRECTOR",
    ControlEstudios => "CONTROL_ESTUDIOS",
    Docente => "DOCENTE",
});

impl Role {
    /// Roles que pueden editar calificaciones bloqueadas y administrar registros.
    pub const PRIVILEGIADOS: [Role; 3] = [Role::Admin, Role::ControlEstudios, Role::Director];

    pub fn es_privilegiado(&self) -> bool {
        Role::PRIVILEGIADOS.contains(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoEstudiante {
    #[default]
    Activo,
    Retirado,
    Graduado,
    Inactivo,
}

enum_texto!(EstadoEstudiante {
    Activo => "ACTIVO",
    Retirado => "RETIRADO",
    Graduado => "GRADUADO",
    Inactivo => "INACTIVO",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoDocente {
    #[default]
    Activo,
    Inactivo,
}

enum_texto!(EstadoDocente {
    Activo => "ACTIVO",
    Inactivo => "INACTIVO",
});

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Estudiante {
    pub id: i64,
    pub nombres: String,
    pub apellidos: String,
    pub cedula: String,
    pub fecha_nacimiento: Option<String>,
    pub grado_id: Option<i64>,
    pub seccion_id: Option<i64>,
    pub estado: EstadoEstudiante,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Docente {
    pub id: i64,
    pub nombres: String,
    pub apellidos: String,
    pub cedula: String,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub estado: EstadoDocente,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Materia {
    pub id: i64,
    pub nombre: String,
    pub docente_id: Option<i64>,
    pub grado_id: i64,
    /// `None` significa que la materia aplica a todas las secciones del grado.
    pub seccion_id: Option<i64>,
}

/// Entidad de catálogo (grado, sección o año escolar): sólo nombre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalogo {
    pub id: i64,
    pub nombre: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluacion {
    #[serde(default, skip_deserializing)]
    pub id: i64,
    pub descripcion: String,
    pub ponderacion: f64,
    pub nota: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calificacion {
    pub id: i64,
    pub student_id: i64,
    pub materia_id: i64,
    pub anio_id: i64,
    pub is_locked: bool,
    pub lapso1: Vec<Evaluacion>,
    pub lapso2: Vec<Evaluacion>,
    pub lapso3: Vec<Evaluacion>,
    pub created_at: String,
    pub updated_at: String,
}

impl Calificacion {
    pub fn lapsos(&self) -> [&[Evaluacion]; 3] {
        [&self.lapso1, &self.lapso2, &self.lapso3]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usuario {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub docente_id: Option<i64>,
    pub activo: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anuncio {
    pub id: i64,
    pub titulo: String,
    pub contenido: String,
    pub autor_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notificacion {
    pub id: i64,
    pub usuario_id: i64,
    pub mensaje: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistroAuditoria {
    pub id: i64,
    pub usuario_id: Option<i64>,
    pub username: String,
    pub accion: String,
    pub entidad: String,
    pub entidad_id: Option<i64>,
    pub detalles: serde_json::Value,
    pub created_at: String,
}

/// Marca de tiempo uniforme (RFC 3339, UTC, milisegundos) para que el orden
/// lexicográfico de TEXT coincida con el cronológico.
pub fn ahora() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_privileges() {
        assert_eq!("control_estudios".parse::<Role>(), Ok(Role::ControlEstudios));
        assert!("ALUMNO".parse::<Role>().is_err());
        assert!(Role::Director.es_privilegiado());
        assert!(!Role::Docente.es_privilegiado());
        assert_eq!(serde_json::to_string(&Role::ControlEstudios).unwrap(), "\"CONTROL_ESTUDIOS\"");
    }

    #[test]
    fn test_estado_estudiante_roundtrip_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let v: EstadoEstudiante = conn
            .query_row("SELECT ?1", [EstadoEstudiante::Graduado], |r| r.get(0))
            .unwrap();
        assert_eq!(v, EstadoEstudiante::Graduado);
    }
}
