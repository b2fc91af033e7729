// [tests/mirror/libs/infra/db/ingest_atomicity.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE ATOMICIDAD DE INGESTA (V3.0)
 * CLASIFICACIÓN: EVIDENCIA DE PERSISTENCIA (ESTRATO L3-MIRROR)
 * RESPONSABILIDAD: AUDITORÍA DE LOTES ATÓMICOS E IDEMPOTENCIA
 *
 * El ledger debe comportarse como un semáforo atómico: un lote entero
 * se compromete o se revierte; re-emitir el mismo lote produce un
 * estado bit-perfecto idéntico al de una sola emisión.
 * =================================================================
 */

use synapse_domain_models::{DeviceInteraction, InteractionFeedback};
use synapse_infra_db::{InteractionRepository, SqlClient, StoreError};

fn sample_interaction(id: &str, rating: Option<i64>) -> DeviceInteraction {
    DeviceInteraction {
        id: id.into(),
        device_id: "device-alpha".into(),
        timestamp: "2026-07-30T10:00:00Z".into(),
        user_message: format!("mensaje de prueba {}", id),
        ai_response: "respuesta".into(),
        detected_intent: "greet".into(),
        confidence_score: 0.88,
        app_version: Some("2.1.0".into()),
        model_version: Some("1.0.0".into()),
        os_version: Some("17.4".into()),
        feedback: rating.map(|value| InteractionFeedback { rating: value, comment: Some("ok".into()) }),
    }
}

async fn memory_client(label: &str) -> SqlClient {
    SqlClient::connect(&format!("file:{}?mode=memory&cache=shared", label))
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.")
}

async fn count_rows(client: &SqlClient, table: &str) -> i64 {
    let connection = client.get_connection().expect("connection");
    let mut rows = connection
        .query(&format!("SELECT COUNT(*) FROM {}", table), ())
        .await
        .expect("count query");
    rows.next().await.expect("row").expect("some").get::<i64>(0).expect("value")
}

#[tokio::test]
async fn certify_batch_commit_and_idempotent_resubmission() {
    let client = memory_client("mem_ingest_idem").await;
    let repository = InteractionRepository::new(client.clone());

    let batch = vec![
        sample_interaction("a-1", Some(5)),
        sample_interaction("a-2", None),
        sample_interaction("a-3", Some(2)),
    ];

    let first_commit = repository.upsert_interactions(&batch).await.expect("first commit");
    assert_eq!(first_commit, 3);
    assert_eq!(count_rows(&client, "interactions").await, 3);
    assert_eq!(count_rows(&client, "feedback").await, 2);

    // Re-emisión del mismo lote: upsert por id, jamás duplicado.
    repository.upsert_interactions(&batch).await.expect("second commit");
    assert_eq!(count_rows(&client, "interactions").await, 3);
    assert_eq!(count_rows(&client, "feedback").await, 2);

    // La baliza de sincronía debe quedar izada tras el commit.
    assert!(client.beacon().is_dirty());
}

#[tokio::test]
async fn certify_invalid_row_rolls_back_the_whole_batch() {
    let client = memory_client("mem_ingest_atomic").await;
    let repository = InteractionRepository::new(client.clone());

    let mut poisoned_batch = vec![
        sample_interaction("b-1", None),
        sample_interaction("b-2", None),
    ];
    poisoned_batch[1].confidence_score = 2.5;

    match repository.upsert_interactions(&poisoned_batch).await {
        Err(StoreError::Invariant(_)) => {}
        other => panic!("expected Invariant rejection, got {:?}", other.map(|_| ())),
    }

    // Atomicidad: ninguna fila del lote envenenado debe persistir.
    assert_eq!(count_rows(&client, "interactions").await, 0);
}

#[tokio::test]
async fn certify_empty_batch_is_accepted_without_rows() {
    let client = memory_client("mem_ingest_empty").await;
    let repository = InteractionRepository::new(client.clone());

    let persisted = repository.upsert_interactions(&[]).await.expect("empty batch");
    assert_eq!(persisted, 0);
    assert_eq!(count_rows(&client, "interactions").await, 0);
}

#[tokio::test]
async fn certify_training_corpus_left_joins_feedback() {
    let client = memory_client("mem_ingest_corpus").await;
    let repository = InteractionRepository::new(client.clone());

    repository
        .upsert_interactions(&[
            sample_interaction("c-1", Some(4)),
            sample_interaction("c-2", None),
        ])
        .await
        .expect("commit");

    let corpus = repository.load_training_corpus().await.expect("corpus");
    assert_eq!(corpus.len(), 2);

    let rated = corpus.iter().find(|row| row.id == "c-1").expect("c-1");
    assert!(rated.has_positive_feedback());
    let unrated = corpus.iter().find(|row| row.id == "c-2").expect("c-2");
    assert!(unrated.feedback.is_none());
}

#[tokio::test]
async fn certify_standalone_feedback_upsert_demands_existing_interaction() {
    let client = memory_client("mem_ingest_feedback").await;
    let repository = InteractionRepository::new(client.clone());

    match repository.upsert_feedback("fantasma", 5, None).await {
        Err(StoreError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }

    repository
        .upsert_interactions(&[sample_interaction("d-1", None)])
        .await
        .expect("commit");

    repository.upsert_feedback("d-1", 3, Some("regular".into())).await.expect("upsert");
    // Upsert repetido: actualiza, no duplica.
    repository.upsert_feedback("d-1", 5, Some("mejoró".into())).await.expect("re-upsert");
    assert_eq!(count_rows(&client, "feedback").await, 1);

    // Rating fuera de la escala cerrada: invariante.
    assert!(matches!(
        repository.upsert_feedback("d-1", 9, None).await,
        Err(StoreError::Invariant(_))
    ));
}
