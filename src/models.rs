//! Modelos de dominio (nodos estructurales, registros de salida y candidatos
//! de ranking).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Niveles de la jerarquía de un texto legal, del más general al más
/// específico. El orden de las variantes es el orden jerárquico.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Part,
    Title,
    Chapter,
    Section,
    Subsection,
    Article,
    Paragraph,
    Inciso,
    Alinea,
}

impl NodeType {
    /// Posición en la jerarquía (0 = Parte).
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Prioridad de desempate en el ranking: el contenido de tipo artículo
    /// va antes que el texto genérico.
    pub fn tie_priority(node_type: Option<NodeType>) -> u8 {
        match node_type {
            Some(NodeType::Article) => 0,
            _ => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeType::Part => "Parte",
            NodeType::Title => "Título",
            NodeType::Chapter => "Capítulo",
            NodeType::Section => "Seção",
            NodeType::Subsection => "Subseção",
            NodeType::Article => "Art.",
            NodeType::Paragraph => "§",
            NodeType::Inciso => "Inciso",
            NodeType::Alinea => "Alínea",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Índice estable de un nodo dentro del arena de su documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Nodo estructural de un documento legal. Inmutable una vez terminado el
/// parseo; `parent_id` es una referencia de búsqueda, no de propiedad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: NodeId,
    pub document_type: String,
    pub node_type: NodeType,
    /// Numeral romano, entero o letra, tal como aparece en el texto.
    pub number: String,
    pub title: Option<String>,
    /// Líneas propias del nodo, marcador incluido.
    pub content: String,
    /// Texto del nodo sin el marcador.
    pub article_text: String,
    /// Fijado en los artículos y copiado por valor en sus descendientes.
    pub article_number: Option<u32>,
    pub parent_id: Option<NodeId>,
    pub sequence_index: u32,
    pub level: u8,
    pub document_position: u64,
}

/// Referencia al padre por (tipo, número), sin punteros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub node_type: NodeType,
    pub number: String,
}

/// Metadatos del fragmento usados por las reglas de boost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    #[serde(default)]
    pub is_special_zone: bool,
    #[serde(default)]
    pub is_certification: bool,
    #[serde(default)]
    pub article_number: Option<u32>,
    #[serde(default)]
    pub has_important_keywords: bool,
    #[serde(default)]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub document_type: Option<String>,
}

/// Registro de salida de la ingesta, consumido por el pipeline externo de
/// embeddings y persistencia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub document_type: String,
    pub node_type: NodeType,
    pub number: String,
    pub title: Option<String>,
    pub article_number: Option<u32>,
    pub full_content: String,
    pub article_text: String,
    pub keywords: Vec<String>,
    pub references: Vec<String>,
    pub metadata: ChunkMetadata,
    pub parent: Option<ParentRef>,
    pub sequence_index: u32,
    pub level: u8,
    pub document_position: u64,
}

/// Candidato de similitud suministrado por el buscador vectorial externo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default, alias = "chunk_metadata")]
    pub chunk_metadata: ChunkMetadata,
    #[serde(alias = "similarity", alias = "base_similarity")]
    pub base_similarity: f64,
}

/// Regla de boost que decidió la puntuación de un candidato.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostKind {
    SpecialZone,
    Certification,
    ArticleReference,
    ImportantKeywords,
}

impl BoostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BoostKind::SpecialZone => "special_zone",
            BoostKind::Certification => "certification",
            BoostKind::ArticleReference => "article_reference",
            BoostKind::ImportantKeywords => "important_keywords",
        }
    }
}

/// Candidato ya puntuado y ordenado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub candidate: CandidateRecord,
    pub contextual_score: f64,
    /// Posición final, empezando en 1.
    pub rank: usize,
    pub applied_boost: Option<BoostKind>,
}

/// Entidades extraídas de una consulta. Efímeras, por consulta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedQueryEntities {
    pub neighborhood: Option<String>,
    pub zone: Option<String>,
    pub article_number: Option<u32>,
    pub keywords: BTreeSet<String>,
}
