//! Prompt registry for summaries and deadline extraction.
//!
//! Templates are Portuguese because the documents (and the users reading the output) are.

use crate::classification::{DocumentType, KnownType};

const CONTRATO_TEMPLATE: &str = r#"
Você é um assistente especializado em contratos de projetos públicos e concessões. Gere um resumo técnico e padronizado com base no conteúdo abaixo.

Comece com um breve parágrafo explicando o objetivo do contrato (máximo 5 linhas).

Depois, siga esta estrutura:

1. **Partes envolvidas**
   - Identifique contratante, contratada e representantes.

2. **Objetivo do contrato**
   - Função principal do contrato e contexto no projeto.

3. **Prazos e datas importantes**
   - Datas de assinatura, vigência, prazos de execução e renovação.

4. **Valores e obrigações**
   - Valores acordados, forma de pagamento, obrigações de cada parte.

5. **Cláusulas adicionais relevantes**
   - Confidencialidade, penalidades, foro, rescisão, etc.

Se o documento for extenso, resuma entre 15 a 30 linhas. Caso seja curto, mantenha a objetividade.
"#;

const RELATORIO_TEMPLATE: &str = r#"
Você é um assistente especializado em relatórios técnicos. Gere um resumo estruturado baseado no conteúdo abaixo.

Comece com um breve parágrafo contextualizando o relatório (máximo 5 linhas).

Depois, siga esta estrutura:

1. **Tema abordado**
2. **Período e escopo da análise**
3. **Principais resultados e indicadores**
4. **Conclusões e recomendações**
5. **Pontos críticos ou destaques**

Destaque sempre datas, métricas ou alertas relevantes para a gestão.

Se o documento for extenso, resuma entre 15 a 30 linhas. Caso seja curto, mantenha a objetividade.
"#;

const OFICIO_TEMPLATE: &str = r#"
Você é um assistente especializado em comunicações formais. Gere um resumo de ofício com base no conteúdo abaixo.

Comece com um parágrafo explicando o contexto do ofício (máximo 5 linhas).

Depois, siga esta estrutura:

1. **Remetente e destinatário**
2. **Motivo do ofício**
3. **Solicitação ou encaminhamento feito**
4. **Prazos, datas e providências esperadas**
5. **Observações adicionais relevantes**

Se o documento for extenso, resuma entre 15 a 30 linhas. Caso seja curto, mantenha a objetividade.
"#;

const ATA_TEMPLATE: &str = r#"
Você é um assistente especializado em atas de reunião. Gere um resumo com base no conteúdo abaixo.

Comece com uma breve introdução da reunião (máximo 5 linhas).

Depois, siga esta estrutura:

1. **Data e local**
2. **Participantes**
3. **Temas discutidos**
4. **Decisões tomadas**
5. **Encaminhamentos e prazos definidos**

Destaque informações úteis para o acompanhamento do projeto.

Se o documento for extenso, resuma entre 15 a 30 linhas. Caso seja curto, mantenha a objetividade.
"#;

const PROPOSTA_TEMPLATE: &str = r#"
Você é um assistente especializado em propostas de serviços. Gere um resumo estruturado com base no conteúdo abaixo.

Comece com um parágrafo geral sobre a proposta (máximo 5 linhas).

Depois, siga esta estrutura:

1. **Proponente e destinatário**
2. **Serviços ou produtos oferecidos**
3. **Condições comerciais e valores**
4. **Prazos de execução e validade da proposta**
5. **Observações importantes ou exigências do contratante**

Mantenha linguagem clara, formal e voltada para tomada de decisão.

Se o documento for extenso, resuma entre 15 a 30 linhas. Caso seja curto, mantenha a objetividade.
"#;

const EDITAL_TEMPLATE: &str = r#"
Você é um assistente especializado em análise de editais de licitação. Gere um resumo técnico e estruturado com base no conteúdo abaixo.

📌 **Objetivo geral**
- Inicie com um parágrafo breve (máximo 5 linhas) explicando o propósito do edital, incluindo contexto, instituição responsável e finalidade da contratação.

📌 **Instruções obrigatórias para cada seção**
- Cada tópico do resumo deve ter **no mínimo 4 a 6 frases**, contendo detalhes, exemplos e explicações adicionais, não apenas uma frase curta.
- Quando houver menção a **datas, valores, prazos ou números** no documento, eles devem ser **explicitamente listados no resumo**, mesmo que estejam no corpo do edital.
- **Se não houver nenhuma data específica, omita o tópico "Prazos e datas importantes" ou substitua por um parágrafo explicativo sobre prazos gerais mencionados no documento.**
- Use **títulos e numeração exata** conforme o modelo abaixo.
- O tom deve ser claro, objetivo e técnico, sem omitir informações relevantes.

📌 **Formatação**
- Cada tópico deve começar com o número e o título em **negrito** (ex.: 1. **Objeto da licitação**).
- Dentro de cada seção:
  - Se houver múltiplos elementos ou informações distintas → apresente em lista com marcadores.
  - Se for uma única informação ou explicação curta → escreva em texto corrido, sem lista.
  - SEMPRE detalhar ao máximo as informações (Ex.: Se tem um formulário, descreva sobre o que deve ser preenchido. Se houver algum requisito, descreva sobre o que deve ser feito e assim por diante)
  - FOCAR SEMPRE em exigências de seleção e exigências de qualificação (técnica, jurídica, econômico-financeira, fiscal, trabalhista...) porque é o principal. Se não tiver é só não mencionar.

---

**Modelo a seguir:**

1. **Objeto da licitação**
   - Descrever detalhadamente o escopo, atividades, entregas previstas, áreas de atuação e qualquer especificação técnica mencionada.

2. **Exigências de seleção**
   - Listar de forma completa todos os requisitos para participação (documentos, formulários, condições, prazos de inscrição, restrições e exceções).

3. **Exigências de qualificação**
   - Detalhar as exigências técnicas, jurídicas, econômico-financeiras, fiscais e trabalhistas necessárias para habilitação, incluindo formatos aceitos e comprovações exigidas.

4. **Critérios de julgamento**
   - Explicar claramente como as propostas serão avaliadas (método adotado, pesos de cada critério, combinações de técnica e preço, requisitos mínimos).

5. **Prazos e datas importantes**
   - Listar **todas** as datas exatas encontradas no texto, por exemplo:
     - Publicação: 10/08/2025
   - Se não houver datas específicas, omitir este tópico ou substituir por breve parágrafo com informações gerais sobre prazos.

6. **Observações relevantes**
   - Apontar cláusulas restritivas, exigências específicas, garantias, penalidades, exigências de sistema (e.g., eSourcing, UNGM), além de quaisquer condições especiais do processo.

---

O resumo deve ter entre **25 e 40 linhas**, conter todos os detalhes encontrados no documento e seguir rigorosamente a estrutura acima. Caso necessário (se as descrições forem muito longas), adicione mais de 40 linhas."#;

const DEFAULT_TEMPLATE: &str = r#"
Você é um assistente especializado em análise documental. Gere um resumo formal e objetivo com base no conteúdo abaixo.

Comece com um parágrafo breve explicando o que é o documento (máximo 5 linhas).

Depois, destaque os seguintes pontos:

1. **Objetivo do documento**
2. **Informações relevantes para o projeto (prazos, valores, partes envolvidas)**
3. **Pontos críticos ou destaques**

Evite interpretações subjetivas. Seja claro, direto e útil para a gestão.

Se o documento for extenso, resuma entre 20 a 40 linhas. Caso seja curto, mantenha a objetividade.
"#;

const DEADLINE_INSTRUCTIONS: &str = r#"
Você é um assistente especializado em apoiar equipes de gestão de projetos a identificar prazos críticos em documentos jurídicos e administrativos (contratos, atas, termos, minutas, ofícios etc.).

A seguir, você receberá um trecho de documento. Seu papel é extrair **no máximo 10 prazos ou datas realmente úteis para a equipe contratada** — que precisa planejar e executar suas obrigações com base nesses documentos.

⚠️ Extraia **somente os prazos ou datas claramente escritos no texto**. Se um prazo não estiver explícito (ex: apenas mencionado como “ver Cláusula X” ou “não especificado”), **ignore completamente**.

Inclua prazos como:
- assinatura, início ou fim de vigência;
- entregas, respostas, notificações ou recursos com data ou prazo claro;
- datas específicas para ações obrigatórias (ex: “até 10 dias úteis após...”);
- qualquer data ou prazo que, se perdido, prejudicaria o andamento do projeto.

Formato de saída:
- [Evento ou obrigação]: [data ou prazo]
Exemplos:
- Assinatura do contrato: 22/03/2023
- Entrega do plano de trabalho: até 30 dias após a assinatura
- Pagamento mensal: até o 10º dia útil de cada mês
- Comunicação de prorrogação: no mínimo 90 dias antes do fim do contrato

❌ Não inclua:
- prazos genéricos (“durante a vigência”, “a definir”, “não especificado”);
- menções a cláusulas (“ver cláusula X”);
- prazos redundantes ou repetitivos;
- Valores monetários, como preços, custos, valores em reais (R$), dólares, euros, etc;
- Qualquer número que represente quantia financeira;
- texto jurídico sem impacto prático.

Por exemplo, NÃO inclua estas linhas:
- Novo valor mensal do contrato: R$ 11.112,12
- Valor anual do contrato após reajuste: R$ 133.345,41

Se não houver nenhum prazo claro, escreva:
"#;

/// Line the model answers with when a chunk carries no usable deadline.
pub const NO_DEADLINE_SENTINEL: &str =
    "**Nenhum prazo relevante identificado para a gestão do projeto.**";

/// Type-specific summary template, falling back to the generic one.
pub fn template_for(document_type: &DocumentType) -> &'static str {
    match document_type.known() {
        Some(KnownType::Contrato) => CONTRATO_TEMPLATE,
        Some(KnownType::Relatorio) => RELATORIO_TEMPLATE,
        Some(KnownType::Oficio) => OFICIO_TEMPLATE,
        Some(KnownType::Ata) => ATA_TEMPLATE,
        Some(KnownType::Proposta) => PROPOSTA_TEMPLATE,
        Some(KnownType::EditalDeLicitacao) => EDITAL_TEMPLATE,
        _ => DEFAULT_TEMPLATE,
    }
}

/// Per-chunk "detailed structured summary" prompt.
pub fn partial_summary_prompt(chunk: &str) -> String {
    format!(
        "Você é um assistente técnico especializado em análise detalhada de documentos. \
Faça um resumo completo e detalhado do conteúdo abaixo, destacando todas as informações \
relevantes, sem omitir pontos importantes. Estruture o texto em tópicos claros.\n\n\
Texto:\n\"\"\"\n{chunk}\n\"\"\""
    )
}

/// Final prompt when the whole document fit in one chunk.
pub fn single_final_prompt(template: &str, partial: &str) -> String {
    format!(
        "{template}\n\nConteúdo resumido:\n\"\"\"\n{partial}\n\"\"\"\n\n\
Gere um resumo final detalhado e estruturado, seguindo o modelo acima, com ao menos 20 linhas."
    )
}

/// Final prompt synthesizing several partial summaries.
pub fn combined_final_prompt(template: &str, partials: &[String]) -> String {
    let joined = partials.join("\n");
    format!(
        "Você é um assistente técnico. Com base nos resumos parciais abaixo, gere um \
**resumo final detalhado e padronizado**, estruturado, sem repetições, seguindo este modelo:\n\n\
{template}\n\nResumos parciais:\n\"\"\"\n{joined}\n\"\"\"\n\n\
Gere um resumo final detalhado e estruturado, com ao menos 20 linhas."
    )
}

/// Deadline-extraction prompt for one chunk.
pub fn deadline_prompt(chunk: &str) -> String {
    format!("{DEADLINE_INSTRUCTIONS}{NO_DEADLINE_SENTINEL}\n\nTexto:\n\"\"\"{chunk}\"\"\"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_follow_document_type() {
        assert!(template_for(&KnownType::Contrato.into()).contains("contratante, contratada"));
        assert!(template_for(&DocumentType::PROCUREMENT_NOTICE).contains("editais de licitação"));
        assert_eq!(template_for(&KnownType::Minuta.into()), DEFAULT_TEMPLATE);
        assert_eq!(
            template_for(&DocumentType::Custom("Nota Técnica".into())),
            DEFAULT_TEMPLATE
        );
    }

    #[test]
    fn final_prompts_embed_template_and_partials() {
        let single = single_final_prompt("MODELO", "parcial");
        assert!(single.starts_with("MODELO"));
        assert!(single.contains("Conteúdo resumido:\n\"\"\"\nparcial\n\"\"\""));

        let combined = combined_final_prompt("MODELO", &["um".into(), "dois".into()]);
        assert!(combined.contains("seguindo este modelo:\n\nMODELO"));
        assert!(combined.contains("\"\"\"\num\ndois\n\"\"\""));
    }

    #[test]
    fn deadline_prompt_embeds_chunk_once() {
        let prompt = deadline_prompt("CLAUSULA QUINTA");
        assert_eq!(prompt.matches("CLAUSULA QUINTA").count(), 1);
        assert!(prompt.contains(NO_DEADLINE_SENTINEL));
    }
}
