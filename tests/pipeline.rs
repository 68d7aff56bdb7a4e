use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docintake::{
    chunking::BpeTokenizer,
    classification::{DocumentType, KnownType},
    completion::{CompletionClient, CompletionError, CompletionRequest},
    config::{Config, EmbeddingProvider},
    retrieval::HashingEmbeddingClient,
    service::{IntakeApi, IntakeService},
    session::ChatScope,
};
use docx_rs::{Docx, Paragraph, Run};
use zip::{ZipWriter, write::SimpleFileOptions};

fn contract_docx() -> Vec<u8> {
    let paragraph = |text: &str| Paragraph::new().add_run(Run::new().add_text(text));
    let mut cursor = Cursor::new(Vec::new());
    Docx::new()
        .add_paragraph(paragraph("CONTRATO DE PRESTAÇÃO DE SERVIÇOS Nº 7/2024"))
        .add_paragraph(paragraph("A vigência é de 12 meses a partir da assinatura."))
        .build()
        .pack(&mut cursor)
        .expect("pack docx");
    cursor.into_inner()
}

/// Completion model that answers by request shape and records every request.
#[derive(Default)]
struct ScriptedModel {
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let prompt = request.prompt_text();
        let reply = match request.max_output_tokens {
            Some(20) if prompt.contains("PRESTAÇÃO DE SERVIÇOS") => "Contrato",
            Some(20) => "Ofício",
            Some(1000) => "Resumo parcial do trecho.",
            Some(1500) => "**Objeto:** prestação de serviços\n**Vigência:** 12 meses",
            _ if prompt.contains("prazos críticos") => {
                "- Vigência: 12 meses a partir da assinatura\n- Pagamento: não especificado\n- Observação sem data"
            }
            _ => "A vigência é de 12 meses.",
        };
        self.requests
            .lock()
            .expect("requests lock")
            .push(request);
        Ok(reply.to_string())
    }
}

fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish archive").into_inner()
}

fn service() -> (IntakeService, Arc<ScriptedModel>) {
    let config = Config {
        embedding_provider: EmbeddingProvider::Hashing,
        ..Config::default()
    };
    let model = Arc::new(ScriptedModel::default());
    let tokenizer = BpeTokenizer::for_model(&config.tokenizer_model).expect("tokenizer");
    let service = IntakeService::with_clients(
        &config,
        model.clone(),
        Arc::new(tokenizer),
        Arc::new(HashingEmbeddingClient::new(config.embedding_dimension)),
    );
    (service, model)
}

#[tokio::test]
async fn bundle_flows_from_upload_to_chat() {
    let (service, model) = service();
    let contract = contract_docx();
    let bundle = zip_archive(&[
        ("contrato.docx", contract.as_slice()),
        ("Edital_anexo_I.txt", "Instruções aos licitantes".as_bytes()),
        ("notas/oficio.txt", "Encaminhamos, para conhecimento, o relatório.".as_bytes()),
        ("__MACOSX/._contrato.docx", b"junk".as_slice()),
        ("planilha.csv", b"a,b".as_slice()),
    ]);

    let outcome = service.upload("lote.zip", bundle).await.expect("upload");
    assert_eq!(
        outcome.added,
        vec!["contrato.docx", "Edital_anexo_I.txt", "notas/oficio.txt"]
    );

    let classifications = service.classify_all().await.expect("classify");
    let types: Vec<_> = classifications
        .iter()
        .map(|classification| classification.document_type.clone())
        .collect();
    assert_eq!(
        types,
        vec![
            DocumentType::from(KnownType::Contrato),
            DocumentType::PROCUREMENT_NOTICE,
            DocumentType::from(KnownType::Oficio),
        ]
    );
    // The procurement-notice filename never reaches the model.
    assert_eq!(model.calls(), 2);

    service.confirm_all().await;
    let groups = service.groups().await;
    assert_eq!(groups.len(), 3);
    assert_eq!(
        groups[&DocumentType::from(KnownType::Contrato)],
        vec!["contrato.docx"]
    );

    let contrato = DocumentType::from(KnownType::Contrato);
    let summaries = service.summarize_type(&contrato).await.expect("summaries");
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].summary.contains("**Vigência:** 12 meses"));

    let deadlines = service
        .deadlines_for_type(&contrato)
        .await
        .expect("deadlines");
    assert_eq!(
        deadlines[0].deadlines,
        vec!["Vigência: 12 meses a partir da assinatura"]
    );

    let calls_before_repeat = model.calls();
    service.summarize_type(&contrato).await.expect("summaries");
    service.deadlines_for_type(&contrato).await.expect("deadlines");
    assert_eq!(model.calls(), calls_before_repeat);

    let answer = service
        .ask(ChatScope::Document("contrato.docx".into()), "Qual a vigência?")
        .await
        .expect("answer");
    assert_eq!(answer.answer, "A vigência é de 12 meses.");
    let follow_up = service
        .ask(ChatScope::Document("contrato.docx".into()), "E o pagamento?")
        .await
        .expect("answer");
    assert!(!follow_up.answer.is_empty());

    let history = service
        .chat_history(ChatScope::Document("contrato.docx".into()))
        .await
        .expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].question, "E o pagamento?");
    assert!(
        service
            .chat_history(ChatScope::All)
            .await
            .expect("history")
            .is_empty()
    );

    let metrics = service.metrics_snapshot();
    assert_eq!(metrics.documents_uploaded, 3);
    assert_eq!(metrics.summaries, 1);
    assert_eq!(metrics.deadline_extractions, 1);
    assert_eq!(metrics.chat_questions, 2);
    assert_eq!(metrics.cache_hits, 2);
}

#[tokio::test]
async fn clearing_the_session_forgets_everything() {
    let (service, _) = service();
    service
        .upload("oficio.txt", b"Prezados, segue resposta.".to_vec())
        .await
        .expect("upload");
    service.classify_all().await.expect("classify");

    service.clear().await;

    assert!(service.list_documents().await.is_empty());
    assert!(service.groups().await.is_empty());
    assert!(service.classify_all().await.expect("classify").is_empty());
}
