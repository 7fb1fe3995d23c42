//! Corpus indexado: documentos parseados (un arena de nodos por documento)
//! agrupados en una generación inmutable.
//!
//! Una re-ingesta produce un `Corpus` nuevo con otro identificador de
//! generación; los nodos nunca se modifican in situ.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::keywords::Enricher;
use crate::models::{
    CandidateRecord, ChunkMetadata, DocumentNode, NodeId, NodeRecord, NodeType, ParentRef,
};
use crate::parser::ParseWarning;

/// Dos artículos con el mismo número dentro de un documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArticleConflict {
    pub article_number: u32,
    pub kept: NodeId,
    pub discarded: NodeId,
}

/// Resultado del parseo de una norma: nodos en pre-orden más diagnósticos.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document_type: String,
    /// Texto anterior al primer marcador (raíz implícita).
    pub preamble: Option<String>,
    nodes: Vec<DocumentNode>,
    children: Vec<Vec<NodeId>>,
    article_index: BTreeMap<u32, NodeId>,
    pub counts: BTreeMap<NodeType, usize>,
    pub warnings: Vec<ParseWarning>,
    pub conflicts: Vec<ArticleConflict>,
}

impl ParsedDocument {
    pub(crate) fn from_parts(
        document_type: String,
        preamble: Option<String>,
        nodes: Vec<DocumentNode>,
        article_index: BTreeMap<u32, NodeId>,
        counts: BTreeMap<NodeType, usize>,
        warnings: Vec<ParseWarning>,
        conflicts: Vec<ArticleConflict>,
    ) -> Self {
        let mut children = vec![Vec::new(); nodes.len()];
        for node in &nodes {
            if let Some(parent) = node.parent_id {
                children[parent.index()].push(node.id);
            }
        }

        Self {
            document_type,
            preamble,
            nodes,
            children,
            article_index,
            counts,
            warnings,
            conflicts,
        }
    }

    /// Todos los nodos en orden de documento (pre-orden).
    pub fn nodes(&self) -> &[DocumentNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(id.index())
    }

    pub fn count(&self, node_type: NodeType) -> usize {
        self.counts.get(&node_type).copied().unwrap_or(0)
    }

    pub fn parent(&self, id: NodeId) -> Option<&DocumentNode> {
        self.node(id)
            .and_then(|n| n.parent_id)
            .and_then(|p| self.node(p))
    }

    pub fn children(&self, id: NodeId) -> Vec<&DocumentNode> {
        self.children
            .get(id.index())
            .map(|ids| ids.iter().map(|c| &self.nodes[c.index()]).collect())
            .unwrap_or_default()
    }

    /// Cadena de ancestros desde la raíz hasta el padre del nodo.
    pub fn ancestors(&self, id: NodeId) -> Vec<&DocumentNode> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node.id);
        }
        chain.reverse();
        chain
    }

    /// Artículo vigente para un número, según la política de duplicados.
    pub fn article(&self, number: u32) -> Option<&DocumentNode> {
        self.article_index.get(&number).and_then(|id| self.node(*id))
    }

    /// Artículos en orden de documento, repetidos incluidos.
    pub fn articles(&self) -> impl Iterator<Item = &DocumentNode> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Article)
    }

    /// Texto del nodo y de todo su subárbol, en orden de documento.
    pub fn full_content(&self, id: NodeId) -> String {
        self.subtree(id)
            .iter()
            .map(|n| n.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// El subárbol de un nodo es contiguo en el pre-orden: termina en el
    /// primer nodo posterior de nivel igual o superior.
    fn subtree(&self, id: NodeId) -> &[DocumentNode] {
        let start = id.index();
        let Some(root) = self.nodes.get(start) else {
            return &[];
        };
        let end = self.nodes[start + 1..]
            .iter()
            .position(|n| n.level <= root.level)
            .map(|offset| start + 1 + offset)
            .unwrap_or(self.nodes.len());
        &self.nodes[start..end]
    }

    fn discarded_ids(&self) -> HashSet<NodeId> {
        let mut discarded = HashSet::new();
        for conflict in &self.conflicts {
            discarded.extend(self.subtree(conflict.discarded).iter().map(|n| n.id));
        }
        discarded
    }

    /// Registros de salida para el pipeline de embeddings. Los subárboles
    /// descartados por la política de duplicados no se exportan.
    pub fn records(&self, enricher: &Enricher) -> Vec<NodeRecord> {
        let discarded = self.discarded_ids();
        self.nodes
            .iter()
            .filter(|n| !discarded.contains(&n.id))
            .map(|node| {
                let full_content = self.full_content(node.id);
                let enrichment = enricher.enrich(&full_content);
                let parent = self.parent(node.id).map(|p| ParentRef {
                    node_type: p.node_type,
                    number: p.number.clone(),
                });
                NodeRecord {
                    document_type: node.document_type.clone(),
                    node_type: node.node_type,
                    number: node.number.clone(),
                    title: node.title.clone(),
                    article_number: node.article_number,
                    metadata: ChunkMetadata {
                        is_special_zone: enrichment.is_special_zone,
                        is_certification: enrichment.has_certification,
                        article_number: node.article_number,
                        has_important_keywords: enrichment.has_important_keywords,
                        node_type: Some(node.node_type),
                        document_type: Some(node.document_type.clone()),
                    },
                    keywords: enrichment.keywords,
                    references: enrichment.references,
                    full_content,
                    article_text: node.article_text.clone(),
                    parent,
                    sequence_index: node.sequence_index,
                    level: node.level,
                    document_position: node.document_position,
                }
            })
            .collect()
    }
}

/// Resumen serializable de un documento.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_type: String,
    pub counts: BTreeMap<NodeType, usize>,
    pub warnings: Vec<ParseWarning>,
    pub conflicts: Vec<ArticleConflict>,
    pub has_preamble: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusSummary {
    pub generation: Uuid,
    pub built_at: DateTime<Utc>,
    pub documents: Vec<DocumentSummary>,
}

/// Generación inmutable de documentos indexados.
#[derive(Debug, Clone)]
pub struct Corpus {
    generation: Uuid,
    built_at: DateTime<Utc>,
    documents: BTreeMap<String, ParsedDocument>,
    enricher: Enricher,
}

impl Corpus {
    pub fn new(documents: Vec<ParsedDocument>, enricher: Enricher) -> Self {
        let mut by_type = BTreeMap::new();
        for document in documents {
            let document_type = document.document_type.clone();
            if by_type.insert(document_type.clone(), document).is_some() {
                warn!(%document_type, "Documento repetido en la ingesta, se conserva el último");
            }
        }

        let corpus = Self {
            generation: Uuid::new_v4(),
            built_at: Utc::now(),
            documents: by_type,
            enricher,
        };
        info!(
            generation = %corpus.generation,
            documents = corpus.documents.len(),
            "Nueva generación del corpus"
        );
        corpus
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Enricher::default())
    }

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &ParsedDocument> {
        self.documents.values()
    }

    pub fn document(&self, document_type: &str) -> Option<&ParsedDocument> {
        self.documents.get(document_type)
    }

    pub fn article(&self, document_type: &str, number: u32) -> Option<&DocumentNode> {
        self.document(document_type)?.article(number)
    }

    pub fn ancestors(&self, document_type: &str, id: NodeId) -> Vec<&DocumentNode> {
        self.document(document_type)
            .map(|d| d.ancestors(id))
            .unwrap_or_default()
    }

    pub fn children(&self, document_type: &str, id: NodeId) -> Vec<&DocumentNode> {
        self.document(document_type)
            .map(|d| d.children(id))
            .unwrap_or_default()
    }

    pub fn full_content(&self, document_type: &str, id: NodeId) -> Option<String> {
        let document = self.document(document_type)?;
        document.node(id)?;
        Some(document.full_content(id))
    }

    /// Registros de todos los documentos, en orden de tipo y de documento.
    pub fn records(&self) -> Vec<NodeRecord> {
        self.documents
            .values()
            .flat_map(|d| d.records(&self.enricher))
            .collect()
    }

    /// Candidato de ranking construido a partir de un nodo del corpus.
    pub fn candidate(
        &self,
        document_type: &str,
        id: NodeId,
        base_similarity: f64,
    ) -> Option<CandidateRecord> {
        let document = self.document(document_type)?;
        let node = document.node(id)?;
        let content = document.full_content(id);
        let chunk_metadata = self.enricher.metadata(
            &content,
            node.article_number,
            Some(node.node_type),
            Some(document_type),
        );
        Some(CandidateRecord {
            id: Some(format!("{document_type}:{}", node.document_position)),
            content,
            chunk_metadata,
            base_similarity,
        })
    }

    /// Identificadores `TIPO@generación`, huella del corpus para la caché.
    pub fn document_ids(&self) -> Vec<String> {
        self.documents
            .keys()
            .map(|t| format!("{t}@{}", self.generation))
            .collect()
    }

    pub fn summary(&self) -> CorpusSummary {
        CorpusSummary {
            generation: self.generation,
            built_at: self.built_at,
            documents: self
                .documents
                .values()
                .map(|d| DocumentSummary {
                    document_type: d.document_type.clone(),
                    counts: d.counts.clone(),
                    warnings: d.warnings.clone(),
                    conflicts: d.conflicts.clone(),
                    has_preamble: d.preamble.is_some(),
                })
                .collect(),
        }
    }
}
