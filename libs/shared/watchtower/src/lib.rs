// [libs/shared/watchtower/src/lib.rs]
/*!
 * =================================================================
 * APARATO: WATCHTOWER OBSERVER (V3.0)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: GESTIÓN DE TELEMETRÍA, TRAZADO Y CAPTURA DE PÁNICOS
 *
 * VISION:
 * 1. DUAL MODE: Logs interactivos en desarrollo, tramas JSON planas
 *    en producción para ingesta estructurada.
 * 2. PANIC SHIELD: Hook global que preserva el rastro de cualquier
 *    colapso en daemons secundarios (ciclos de entrenamiento, relés
 *    de sincronía) antes de la defunción del proceso.
 * =================================================================
 */

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};
use tracing::{error, info};
use std::panic;

/// Inicializa el sistema de trazas del agregador con blindaje de pánicos.
///
/// # Comportamiento:
/// - Desarrollo: Logs compactos con resaltado para el operador.
/// - Producción: Estructura JSON plana para la ingesta de plataforma.
pub fn init_tracing(service_nominal_identifier: &str) {
    // 1. FILTRO DINÁMICO: Priorizamos nuestro dominio y silenciamos
    // el ruido de infraestructura (Tower, Hyper, libSQL).
    let environmental_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            format!(
                "{}={level},synapse_infra_db={level},synapse_infra_blobstore={level},\
                 synapse_core_trainer={level},tower_http=warn,hyper=warn,libsql=error",
                service_nominal_identifier,
                level = if cfg!(debug_assertions) { "debug" } else { "info" }
            )
            .into()
        });

    let is_production_strata = !cfg!(debug_assertions);

    // 2. ARQUITECTURA DE SUSCRIPCIÓN (Dual Mode)
    if is_production_strata {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().compact().with_target(false))
            .init();
    }

    // 3. PANIC SHIELD (Global Hook)
    // Un ciclo de entrenamiento que colapsa en un hilo de Rayon debe dejar
    // rastro estructurado, no un stderr mudo.
    let service_id_snapshot = service_nominal_identifier.to_string();

    panic::set_hook(Box::new(move |panic_metadata| {
        let panic_location = panic_metadata
            .location()
            .map(|location| format!("{}:{}:{}", location.file(), location.line(), location.column()))
            .unwrap_or_else(|| "UNKNOWN_STRATA_COORDINATES".to_string());

        let panic_payload_message = panic_metadata
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_metadata.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("UNDEFINED_COLLAPSE_PAYLOAD");

        error!(
            target: "panic_monitor",
            service = %service_id_snapshot,
            location = %panic_location,
            "🔥 [CRITICAL_PANIC]: Thread terminated abruptly. Analysis: {}",
            panic_payload_message
        );
    }));

    info!(
        "👁️  [WATCHTOWER_ONLINE]: Observability strata levelized for [{}]. Panic Shield ACTIVE.",
        service_nominal_identifier
    );
}
