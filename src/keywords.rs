//! Enriquecimiento de nodos en la ingesta: palabras clave, referencias
//! legales y los flags que consumen las reglas de boost del ranking.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{ChunkMetadata, NodeType};
use crate::normalize::normalize;

static LAW_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blei\s+(?:complementar\s+)?n\s*[º°o.]?\s*\d+(?:[./]\d+)*")
        .expect("regex de referencia a ley válida")
});
static ZONE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bzot\s*\d+(?:\.\d+)?").expect("regex de referencia a ZOT válida")
});
static ANNEX_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\banexo\s*\d+(?:\.\d+)?").expect("regex de referencia a anexo válida")
});
static ARTICLE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bart\.?\s*\d+").expect("regex de referencia a artículo válida")
});

/// Frases que marcan un fragmento como relevante para las consultas de
/// parámetros urbanísticos.
pub const DEFAULT_IMPORTANT_KEYWORDS: &[&str] = &[
    "certificação em sustentabilidade ambiental",
    "4º distrito",
    "quarto distrito",
    "zot 8.2",
    "estudo de impacto de vizinhança",
    "regime urbanístico",
    "altura máxima",
    "coeficiente de aproveitamento",
    "taxa de ocupação",
    "recuo",
    "edificação",
    "empreendimento",
    "outorga onerosa",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub important_keywords: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            important_keywords: DEFAULT_IMPORTANT_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Resultado de analizar el texto completo de un nodo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub keywords: Vec<String>,
    pub references: Vec<String>,
    pub has_certification: bool,
    pub is_special_zone: bool,
    pub has_important_keywords: bool,
}

/// Analizador de palabras clave con las frases importantes ya normalizadas.
#[derive(Debug, Clone)]
pub struct Enricher {
    important: Vec<(String, String)>,
}

impl Enricher {
    pub fn new(config: &KeywordConfig) -> Self {
        let important = config
            .important_keywords
            .iter()
            .map(|k| (k.clone(), normalize(k)))
            .filter(|(_, key)| !key.is_empty())
            .collect();
        Self { important }
    }

    pub fn enrich(&self, text: &str) -> Enrichment {
        let normalized = normalize(text);

        let mut keywords: Vec<String> = self
            .important
            .iter()
            .filter(|(_, key)| normalized.contains(key.as_str()))
            .map(|(phrase, _)| phrase.clone())
            .collect();
        let has_important_keywords = !keywords.is_empty();

        let laws = find_all(&LAW_REFERENCE, text);
        let annexes = find_all(&ANNEX_REFERENCE, text);
        keywords.extend(laws.iter().cloned());
        keywords.extend(find_all(&ZONE_REFERENCE, text));
        keywords.extend(annexes.iter().cloned());
        dedup_in_order(&mut keywords);

        let mut references = find_all(&ARTICLE_REFERENCE, text);
        references.extend(laws);
        references.extend(annexes);
        dedup_in_order(&mut references);

        Enrichment {
            keywords,
            references,
            has_certification: mentions_certification(&normalized),
            is_special_zone: mentions_special_zone(&normalized),
            has_important_keywords,
        }
    }

    /// Metadatos de candidato para un texto ya enriquecido.
    pub fn metadata(
        &self,
        text: &str,
        article_number: Option<u32>,
        node_type: Option<NodeType>,
        document_type: Option<&str>,
    ) -> ChunkMetadata {
        let enrichment = self.enrich(text);
        ChunkMetadata {
            is_special_zone: enrichment.is_special_zone,
            is_certification: enrichment.has_certification,
            article_number,
            has_important_keywords: enrichment.has_important_keywords,
            node_type,
            document_type: document_type.map(str::to_string),
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(&KeywordConfig::default())
    }
}

fn mentions_certification(normalized: &str) -> bool {
    normalized.contains("CERTIFICACAO")
        && (normalized.contains("SUSTENTABILIDADE") || normalized.contains("AMBIENTAL"))
}

fn mentions_special_zone(normalized: &str) -> bool {
    normalized.contains("4º DISTRITO")
        || normalized.contains("4° DISTRITO")
        || normalized.contains("QUARTO DISTRITO")
        || (normalized.contains("ZOT 8.2") && normalized.contains("DISTRITO"))
}

fn find_all(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().trim().to_string()).collect()
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.to_lowercase()));
}

#[cfg(test)]
mod tests {
    use super::*;

    const ART_81_III: &str = "III -- os acréscimos definidos em regulamento para projetos que obtenham \
        Certificação em Sustentabilidade Ambiental, conforme o Anexo 9 e a Lei Complementar nº 434, \
        em até 20% da altura máxima;";

    #[test]
    fn detects_certification_and_keywords() {
        let enrichment = Enricher::default().enrich(ART_81_III);
        assert!(enrichment.has_certification);
        assert!(enrichment.has_important_keywords);
        assert!(!enrichment.is_special_zone);
        assert!(enrichment
            .keywords
            .contains(&"certificação em sustentabilidade ambiental".to_string()));
        assert!(enrichment.keywords.contains(&"altura máxima".to_string()));
        assert!(enrichment.keywords.contains(&"Anexo 9".to_string()));
        assert!(enrichment.keywords.contains(&"Lei Complementar nº 434".to_string()));
    }

    #[test]
    fn detects_fourth_district() {
        let text = "Art. 74. Os empreendimentos localizados na ZOT 8.2 -- 4º Distrito, descritos no Anexo 13.4";
        let enrichment = Enricher::default().enrich(text);
        assert!(enrichment.is_special_zone);
        assert!(enrichment.keywords.contains(&"ZOT 8.2".to_string()));
        assert_eq!(enrichment.references, vec!["Art. 74", "Anexo 13.4"]);
    }

    #[test]
    fn plain_text_has_no_flags() {
        let enrichment = Enricher::default().enrich("Esta lei entra em vigor na data de sua publicação.");
        assert_eq!(enrichment, Enrichment::default());
    }

    #[test]
    fn metadata_carries_structural_fields() {
        let meta = Enricher::default().metadata(
            "Certificação ambiental obrigatória",
            Some(81),
            Some(NodeType::Inciso),
            Some("LUOS"),
        );
        assert!(meta.is_certification);
        assert_eq!(meta.article_number, Some(81));
        assert_eq!(meta.node_type, Some(NodeType::Inciso));
        assert_eq!(meta.document_type.as_deref(), Some("LUOS"));
    }
}
