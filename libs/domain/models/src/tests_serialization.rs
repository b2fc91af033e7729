// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V3.1 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: EVIDENCIA DE PARIDAD (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON CON LOS CLIENTES
 *
 * VISION:
 * 1. WIRE PARITY: Los clientes móviles serializan camelCase; cualquier
 *    deriva de nombres rompe la ingesta silenciosamente. Este aparato
 *    congela el contrato.
 * 2. HANDLE INTEGRITY: El esquema de BlobRef decide el backend que
 *    resuelve el payload; un roundtrip con pérdida corrompería el
 *    ledger de versiones.
 * =================================================================
 */
