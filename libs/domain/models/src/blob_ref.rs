// [libs/domain/models/src/blob_ref.rs]
/*!
 * =================================================================
 * APARATO: BLOB HANDLE MODEL (V2.1)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIFICACIÓN OPACA DE PAYLOADS BINARIOS
 *
 * VISION:
 * Un 'BlobRef' es la única moneda de intercambio entre el Ledger
 * relacional y la bóveda de objetos. El esquema del handle decide
 * qué backend lo resuelve; el contenido es opaco para el dominio.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Handle opaco con esquema, serializado como String URI-like.
///
/// Esquemas reconocidos:
/// - `blob:<path>`   ruta en la bóveda de objetos remota.
/// - `stream:<url>`  URL transitoria de descarga directa.
/// - `mem:<name>`    buffer en proceso (diagnóstico y tests).
/// - `file:<path>`   archivo local (modo local-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlobRef {
    Blob(String),
    Stream(String),
    Mem(String),
    File(String),
}

impl BlobRef {
    /// Carga útil del handle sin el esquema.
    pub fn payload(&self) -> &str {
        match self {
            BlobRef::Blob(path) => path,
            BlobRef::Stream(url) => url,
            BlobRef::Mem(name) => name,
            BlobRef::File(path) => path,
        }
    }

    /// Nombre de archivo terminal del handle (último segmento de ruta).
    pub fn terminal_name(&self) -> &str {
        self.payload().rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobRef::Blob(path) => write!(formatter, "blob:{}", path),
            BlobRef::Stream(url) => write!(formatter, "stream:{}", url),
            BlobRef::Mem(name) => write!(formatter, "mem:{}", name),
            BlobRef::File(path) => write!(formatter, "file:{}", path),
        }
    }
}

impl FromStr for BlobRef {
    type Err = String;

    fn from_str(raw_handle: &str) -> Result<Self, Self::Err> {
        let (scheme, payload) = raw_handle
            .split_once(':')
            .ok_or_else(|| format!("HANDLE_SCHEME_VOID: '{}'", raw_handle))?;

        if payload.is_empty() {
            return Err(format!("HANDLE_PAYLOAD_VOID: '{}'", raw_handle));
        }

        match scheme {
            "blob" => Ok(BlobRef::Blob(payload.to_string())),
            "stream" => Ok(BlobRef::Stream(payload.to_string())),
            "mem" => Ok(BlobRef::Mem(payload.to_string())),
            "file" => Ok(BlobRef::File(payload.to_string())),
            unknown => Err(format!("HANDLE_SCHEME_UNKNOWN: '{}'", unknown)),
        }
    }
}

impl TryFrom<String> for BlobRef {
    type Error = String;

    fn try_from(raw_handle: String) -> Result<Self, Self::Error> {
        raw_handle.parse()
    }
}

impl From<BlobRef> for String {
    fn from(handle: BlobRef) -> Self {
        handle.to_string()
    }
}
