// Biblioteca raíz del crate `boletin360`.
// Reexporta los módulos del backend de calificaciones y la función
// `run_server` que levanta la API.
pub mod api_json;
pub mod auth;
pub mod calculo;
pub mod config;
pub mod db;
pub mod error;
pub mod excel;
pub mod models;
pub mod reportes;
pub mod server;
pub mod server_handlers;

/// Ejecuta el servidor HTTP (reexport para facilitar uso desde `main`)
pub use server::run_server;
