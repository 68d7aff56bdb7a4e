//! Document-type vocabulary and the normalization that maps free text onto it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Filename fragments that identify sections of a procurement notice.
const PROCUREMENT_FILENAME_KEYWORDS: [&str; 11] = [
    "edital",
    "licit",
    "instrucoes",
    "instruc",
    "lista de requerimentos",
    "criterio",
    "formulario",
    "modelo de acordo",
    "secao",
    "condicoes gerais",
    "questionario",
];

/// Closed vocabulary of document types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KnownType {
    /// Contrato.
    Contrato,
    /// Termo Aditivo.
    TermoAditivo,
    /// Relatório.
    Relatorio,
    /// Ofício.
    Oficio,
    /// Ata.
    Ata,
    /// Proposta.
    Proposta,
    /// Minuta.
    Minuta,
    /// Termo de Apostilamento.
    TermoDeApostilamento,
    /// Edital de Licitação.
    EditalDeLicitacao,
    /// Termo de Referência.
    TermoDeReferencia,
    /// Outro.
    Outro,
}

impl KnownType {
    /// Vocabulary in presentation order.
    pub const ALL: [KnownType; 11] = [
        KnownType::Contrato,
        KnownType::TermoAditivo,
        KnownType::Relatorio,
        KnownType::Oficio,
        KnownType::Ata,
        KnownType::Proposta,
        KnownType::Minuta,
        KnownType::TermoDeApostilamento,
        KnownType::EditalDeLicitacao,
        KnownType::TermoDeReferencia,
        KnownType::Outro,
    ];

    // Multi-word labels first so "termo aditivo ao contrato" is not read as a contract.
    const MATCH_PRIORITY: [KnownType; 11] = [
        KnownType::EditalDeLicitacao,
        KnownType::TermoDeApostilamento,
        KnownType::TermoDeReferencia,
        KnownType::TermoAditivo,
        KnownType::Contrato,
        KnownType::Relatorio,
        KnownType::Oficio,
        KnownType::Minuta,
        KnownType::Proposta,
        KnownType::Ata,
        KnownType::Outro,
    ];

    /// Canonical display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Contrato => "Contrato",
            Self::TermoAditivo => "Termo Aditivo",
            Self::Relatorio => "Relatório",
            Self::Oficio => "Ofício",
            Self::Ata => "Ata",
            Self::Proposta => "Proposta",
            Self::Minuta => "Minuta",
            Self::TermoDeApostilamento => "Termo de Apostilamento",
            Self::EditalDeLicitacao => "Edital de Licitação",
            Self::TermoDeReferencia => "Termo de Referência",
            Self::Outro => "Outro",
        }
    }

    fn needle(self) -> &'static str {
        match self {
            Self::Contrato => "contrato",
            Self::TermoAditivo => "termo aditivo",
            Self::Relatorio => "relatorio",
            Self::Oficio => "oficio",
            Self::Ata => "ata",
            Self::Proposta => "proposta",
            Self::Minuta => "minuta",
            Self::TermoDeApostilamento => "termo de apostilamento",
            Self::EditalDeLicitacao => "edital de licitacao",
            Self::TermoDeReferencia => "termo de referencia",
            Self::Outro => "outro",
        }
    }

    fn find_in(normalized: &str) -> Option<Self> {
        Self::MATCH_PRIORITY
            .into_iter()
            .find(|known| contains_phrase(normalized, known.needle()))
    }
}

/// Canonical document type, or a model-proposed label outside the vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentType {
    /// Member of the fixed vocabulary.
    Known(KnownType),
    /// Title-cased free-text label.
    Custom(String),
}

impl DocumentType {
    /// Procurement notices, also assigned by filename.
    pub const PROCUREMENT_NOTICE: DocumentType = DocumentType::Known(KnownType::EditalDeLicitacao);

    /// Display label.
    pub fn label(&self) -> &str {
        match self {
            Self::Known(known) => known.label(),
            Self::Custom(label) => label,
        }
    }

    /// The vocabulary member, if any.
    pub fn known(&self) -> Option<KnownType> {
        match self {
            Self::Known(known) => Some(*known),
            Self::Custom(_) => None,
        }
    }

    /// Map free text (a model answer or a label) onto a document type.
    ///
    /// Idempotent: normalizing a returned label yields the same type.
    pub fn normalize(raw: &str) -> Self {
        let normalized = normalize_text(raw);
        if let Some(known) = KnownType::find_in(&normalized) {
            return Self::Known(known);
        }
        let label = title_case(strip_decorations(raw));
        if label.is_empty() {
            Self::Known(KnownType::Outro)
        } else {
            Self::Custom(label)
        }
    }

    /// [`DocumentType::normalize`], with the procurement-notice filename check taking precedence.
    pub fn normalize_for_file(raw: &str, filename: Option<&str>) -> Self {
        if filename.is_some_and(is_procurement_notice_part) {
            return Self::PROCUREMENT_NOTICE;
        }
        Self::normalize(raw)
    }
}

impl From<KnownType> for DocumentType {
    fn from(known: KnownType) -> Self {
        Self::Known(known)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DocumentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for DocumentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::normalize(&raw))
    }
}

/// Strip diacritics, collapse whitespace, lowercase and trim.
pub fn normalize_text(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether a filename names a section of a procurement notice.
///
/// Such files are often named after the section ("Formulário 3", "Seção II") rather than
/// carrying self-describing content, so the filename wins over any model answer.
pub fn is_procurement_notice_part(filename: &str) -> bool {
    let normalized = normalize_text(filename);
    PROCUREMENT_FILENAME_KEYWORDS
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

/// Whole-word phrase match; a trailing plural `s` is accepted.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let mut rest = haystack[start + needle.len()..].chars();
        let after_ok = match rest.next() {
            None => true,
            Some('s') => rest.next().is_none_or(|c| !c.is_alphanumeric()),
            Some(c) => !c.is_alphanumeric(),
        };
        before_ok && after_ok
    })
}

fn strip_decorations(raw: &str) -> &str {
    raw.trim().trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '*' | '.' | ':' | '`' | '“' | '”')
    })
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            let Some(first) = chars.next() else {
                return String::new();
            };
            let mut upper = first.to_uppercase();
            let head = match (upper.next(), upper.next()) {
                (Some(single), None) => single,
                _ => first,
            };
            std::iter::once(head)
                .chain(chars.flat_map(char::to_lowercase))
                .collect()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
