use std::{env, sync::Once};

use docintake::{
    classification::{DocumentType, KnownType},
    config,
    retrieval::{EmbeddingClient, embedding_client_from_config},
    service::{IntakeApi, IntakeService},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("EMBEDDING_PROVIDER", "openai");
        set_default_env("CLASSIFICATION_MODEL", "gpt-4o-mini");
        config::init_config();
    });
}

#[tokio::test]
#[ignore = "Requires OPENAI_API_KEY and network access"]
async fn live_contract_is_classified_and_summarized() {
    init_config_once();
    let service = IntakeService::from_config(config::get_config()).expect("service");
    service
        .upload(
            "acordo.txt",
            "CONTRATO DE PRESTAÇÃO DE SERVIÇOS. CLÁUSULA PRIMEIRA – DO OBJETO: manutenção predial. \
             CLÁUSULA SEGUNDA – DA VIGÊNCIA: 12 (doze) meses a contar de 01/03/2025."
                .as_bytes()
                .to_vec(),
        )
        .await
        .expect("upload");

    let classifications = service.classify_all().await.expect("classification");
    let contrato = DocumentType::from(KnownType::Contrato);
    assert_eq!(classifications[0].document_type, contrato);

    service.confirm_all().await;
    let summaries = service.summarize_type(&contrato).await.expect("summary");
    assert!(!summaries[0].summary.trim().is_empty());
}

#[tokio::test]
#[ignore = "Requires OPENAI_API_KEY and network access"]
async fn live_openai_embedding_roundtrip() {
    init_config_once();
    let client = embedding_client_from_config(config::get_config()).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["docintake live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert!(!vectors[0].is_empty(), "embedding must not be empty");
}
