//! Parser jerárquico de textos legales.
//!
//! Convierte el texto plano de una norma en un árbol de nodos
//! (Parte → Título → Capítulo → Seção → Subseção → Art. → § → Inciso →
//! Alínea) guardado en un arena. El contexto jerárquico actual es un valor
//! explícito (`ParserState`) que se pasa por el recorrido, de modo que cada
//! documento se parsea de forma independiente y varios pueden parsearse en
//! paralelo.
//!
//! La clasificación de cada línea sigue un orden fijo de prioridad, de lo
//! más específico a lo más general: alínea > inciso (sólo dentro de un
//! artículo abierto) > parágrafo > artículo > subseção > seção > capítulo >
//! título > parte.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::corpus::{ArticleConflict, ParsedDocument};
use crate::error::ConfigError;
use crate::models::{DocumentNode, NodeId, NodeType};
use crate::normalize::normalize;

static ALINEA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z])\)\s*(.*)$").expect("regex de alínea válida")
});
static INCISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([IVXLCDM]+)\s*(?:[-–—]+|\.\s*[-–—]*)\s*(.*)$").expect("regex de inciso válida")
});
static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^§\s*(\d+)\s*[º°ª]?\s*\.?\s*[-–—]*\s*(.*)$").expect("regex de parágrafo válida")
});
static SINGLE_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^par[áa]grafo\s+[úu]nico\s*[.:]?\s*[-–—]*\s*(.*)$")
        .expect("regex de parágrafo único válida")
});
static ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Art\.|ART\.|Artigo\b|ARTIGO\b|Art\b|ART\b)\s*(.*)$")
        .expect("regex de artículo válida")
});
static ARTICLE_NUMERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(?:[º°ª]|o\b)?\s*[.\-–—:]*\s*(.*)$").expect("regex de numeral válida")
});
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(SUBSECAO|SECAO|CAPITULO|TITULO|PARTE)\s+([IVXLCDM]+|\d+|UNICO|UNICA)\b")
        .expect("regex de encabezado válida")
});
/// Mismo marcador sobre el texto original, para recortar el título sin
/// perder acentos ni separadores pegados al numeral.
static HEADING_REST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:SUBSE[CÇ][AÃ]O|SE[CÇ][AÃ]O|CAP[IÍ]TULO|T[IÍ]TULO|PARTE)\s+(?:[IVXLCDM]+|\d+|[UÚ]NIC[OA])\b(.*)$",
    )
    .expect("regex de título de encabezado válida")
});
static LEADING_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s\-–—.:]+").expect("regex de separadores válida")
});

/// Qué artículo se conserva cuando un documento repite un número.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    #[default]
    KeepFirst,
    KeepLast,
}

impl FromStr for DuplicatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep-first" | "keep_first" | "first" => Ok(Self::KeepFirst),
            "keep-last" | "keep_last" | "last" => Ok(Self::KeepLast),
            other => Err(ConfigError::UnknownDuplicatePolicy(other.to_string())),
        }
    }
}

/// Configuración del parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Número esperado de artículos por `document_type`.
    pub expected_articles: BTreeMap<String, usize>,
    pub duplicate_policy: DuplicatePolicy,
}

impl ParserConfig {
    pub fn with_expected(mut self, document_type: &str, articles: usize) -> Self {
        self.expected_articles
            .insert(document_type.to_string(), articles);
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Diagnóstico no fatal del parseo. Se acumula junto a los nodos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    #[error("línea {line}: marcador de artículo con numeral ilegible: '{marker}'")]
    UnparsableArticleNumber { line: usize, marker: String },

    #[error("línea {line}: parágrafo fuera de cualquier artículo")]
    OrphanParagraph { line: usize },

    #[error("{document_type}: se esperaban {expected} artículos y se encontraron {found}")]
    ArticleCountMismatch {
        document_type: String,
        expected: usize,
        found: usize,
    },

    #[error("{document_type}: Art. {article_number} repetido (posiciones {first_position} y {duplicate_position})")]
    DuplicateArticle {
        document_type: String,
        article_number: u32,
        first_position: u64,
        duplicate_position: u64,
    },
}

/// Clasificación de una línea no vacía.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Alinea { letter: String, rest: String },
    Inciso { numeral: String, rest: String },
    Paragraph { number: String, rest: String },
    Article { number: u32, raw: String, rest: String },
    UnparsableArticle,
    Heading { node_type: NodeType, number: String, title: Option<String> },
    Text,
}

fn classify(line: &str, in_article: bool) -> LineKind {
    if in_article {
        if let Some(caps) = ALINEA.captures(line) {
            return LineKind::Alinea {
                letter: caps[1].to_string(),
                rest: caps[2].trim().to_string(),
            };
        }
        if let Some(caps) = INCISO.captures(line) {
            return LineKind::Inciso {
                numeral: caps[1].to_string(),
                rest: caps[2].trim().to_string(),
            };
        }
    }

    if let Some(caps) = PARAGRAPH.captures(line) {
        return LineKind::Paragraph {
            number: caps[1].to_string(),
            rest: caps[2].trim().to_string(),
        };
    }
    if let Some(caps) = SINGLE_PARAGRAPH.captures(line) {
        return LineKind::Paragraph {
            number: "único".to_string(),
            rest: caps[1].trim().to_string(),
        };
    }

    if let Some(caps) = ARTICLE.captures(line) {
        let after_marker = caps[1].trim();
        let parsed = ARTICLE_NUMERAL.captures(after_marker).and_then(|n| {
            let number = n[1].parse::<u32>().ok()?;
            Some(LineKind::Article {
                number,
                raw: n[1].to_string(),
                rest: n[2].trim().to_string(),
            })
        });
        return parsed.unwrap_or(LineKind::UnparsableArticle);
    }

    let normalized = normalize(line);
    if let Some(caps) = HEADING.captures(&normalized) {
        let node_type = match &caps[1] {
            "SUBSECAO" => NodeType::Subsection,
            "SECAO" => NodeType::Section,
            "CAPITULO" => NodeType::Chapter,
            "TITULO" => NodeType::Title,
            _ => NodeType::Part,
        };
        return LineKind::Heading {
            node_type,
            number: caps[2].to_string(),
            title: heading_title(line),
        };
    }

    LineKind::Text
}

/// Título de un encabezado tomado del texto original: todo lo que sigue a
/// la palabra clave y al numeral.
fn heading_title(line: &str) -> Option<String> {
    let caps = HEADING_REST.captures(line)?;
    let rest = caps.get(1).map_or("", |m| m.as_str());
    let title = LEADING_SEPARATORS.replace(rest, "");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Contexto jerárquico abierto durante el recorrido de un documento.
#[derive(Debug, Default)]
struct ParserState {
    /// Nodo abierto por nivel jerárquico (índice = `NodeType::rank`).
    open: [Option<NodeId>; 9],
    next_position: u64,
    sibling_counters: HashMap<Option<NodeId>, u32>,
    last_node: Option<NodeId>,
    /// Encabezado sin título en línea, a la espera de la línea siguiente.
    pending_title: Option<NodeId>,
}

impl ParserState {
    fn open_node(&self, node_type: NodeType) -> Option<NodeId> {
        self.open[node_type.rank()]
    }

    fn in_article(&self) -> bool {
        self.open_node(NodeType::Article).is_some()
    }

    /// Padre de un nodo nuevo según su tipo.
    fn parent_for(&self, node_type: NodeType) -> Option<NodeId> {
        match node_type {
            NodeType::Paragraph => self.open_node(NodeType::Article),
            NodeType::Inciso => self
                .open_node(NodeType::Paragraph)
                .or(self.open_node(NodeType::Article)),
            NodeType::Alinea => self
                .open_node(NodeType::Inciso)
                .or(self.open_node(NodeType::Paragraph))
                .or(self.open_node(NodeType::Article)),
            // Encabezados y artículos cuelgan del encabezado abierto más
            // profundo por encima de ellos.
            _ => self.open[..node_type.rank()].iter().rev().find_map(|id| *id),
        }
    }

    /// Cierra el nivel indicado y todos los inferiores.
    fn close_from(&mut self, node_type: NodeType) {
        for slot in &mut self.open[node_type.rank()..] {
            *slot = None;
        }
    }

    fn next_sequence(&mut self, parent: Option<NodeId>) -> u32 {
        let counter = self.sibling_counters.entry(parent).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }
}

/// Acumulador del documento en construcción.
struct DocumentBuilder<'a> {
    document_type: &'a str,
    nodes: Vec<DocumentNode>,
    preamble: Vec<String>,
    warnings: Vec<ParseWarning>,
    state: ParserState,
}

struct NewNode {
    node_type: NodeType,
    number: String,
    title: Option<String>,
    line: String,
    text: String,
    article_number: Option<u32>,
}

impl<'a> DocumentBuilder<'a> {
    fn new(document_type: &'a str) -> Self {
        Self {
            document_type,
            nodes: Vec::new(),
            preamble: Vec::new(),
            warnings: Vec::new(),
            state: ParserState::default(),
        }
    }

    fn push_node(&mut self, new: NewNode) -> NodeId {
        let parent_id = self.state.parent_for(new.node_type);
        self.state.close_from(new.node_type);

        let parent = parent_id.map(|p| &self.nodes[p.index()]);
        let level = parent.map(|p| p.level + 1).unwrap_or(1);
        // Los descendientes de un artículo heredan su número por copia.
        let article_number = new
            .article_number
            .or_else(|| parent.and_then(|p| p.article_number));

        let id = NodeId(self.nodes.len() as u32);
        let sequence_index = self.state.next_sequence(parent_id);
        let document_position = self.state.next_position;
        self.state.next_position += 1;

        self.nodes.push(DocumentNode {
            id,
            document_type: self.document_type.to_string(),
            node_type: new.node_type,
            number: new.number,
            title: new.title,
            content: new.line,
            article_text: new.text,
            article_number,
            parent_id,
            sequence_index,
            level,
            document_position,
        });

        self.state.open[new.node_type.rank()] = Some(id);
        self.state.last_node = Some(id);
        id
    }

    fn push_text(&mut self, line: &str) {
        if let Some(id) = self.state.pending_title.take() {
            let node = &mut self.nodes[id.index()];
            node.title = Some(line.to_string());
            node.article_text = line.to_string();
            node.content.push('\n');
            node.content.push_str(line);
            return;
        }

        match self.state.last_node {
            Some(id) => {
                let node = &mut self.nodes[id.index()];
                node.content.push('\n');
                node.content.push_str(line);
                if !node.article_text.is_empty() {
                    node.article_text.push('\n');
                }
                node.article_text.push_str(line);
            }
            None => self.preamble.push(line.to_string()),
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) {
        let kind = classify(line, self.state.in_article());
        if kind != LineKind::Text {
            self.state.pending_title = None;
        }

        match kind {
            LineKind::Alinea { letter, rest } => {
                self.push_node(NewNode {
                    node_type: NodeType::Alinea,
                    number: letter,
                    title: None,
                    line: line.to_string(),
                    text: rest,
                    article_number: None,
                });
            }
            LineKind::Inciso { numeral, rest } => {
                self.push_node(NewNode {
                    node_type: NodeType::Inciso,
                    number: numeral,
                    title: None,
                    line: line.to_string(),
                    text: rest,
                    article_number: None,
                });
            }
            LineKind::Paragraph { number, rest } => {
                if !self.state.in_article() {
                    self.warnings.push(ParseWarning::OrphanParagraph { line: line_no });
                    self.push_text(line);
                    return;
                }
                self.push_node(NewNode {
                    node_type: NodeType::Paragraph,
                    number,
                    title: None,
                    line: line.to_string(),
                    text: rest,
                    article_number: None,
                });
            }
            LineKind::Article { number, raw, rest } => {
                self.push_node(NewNode {
                    node_type: NodeType::Article,
                    number: raw,
                    title: None,
                    line: line.to_string(),
                    text: rest,
                    article_number: Some(number),
                });
            }
            LineKind::UnparsableArticle => {
                warn!(
                    document_type = self.document_type,
                    line = line_no,
                    "Marcador de artículo con numeral ilegible, se trata como texto"
                );
                self.warnings.push(ParseWarning::UnparsableArticleNumber {
                    line: line_no,
                    marker: line.chars().take(40).collect(),
                });
                self.push_text(line);
            }
            LineKind::Heading {
                node_type,
                number,
                title,
            } => {
                let has_title = title.is_some();
                let id = self.push_node(NewNode {
                    node_type,
                    number,
                    text: title.clone().unwrap_or_default(),
                    title,
                    line: line.to_string(),
                    article_number: None,
                });
                if !has_title {
                    self.state.pending_title = Some(id);
                }
            }
            LineKind::Text => self.push_text(line),
        }
    }

    fn finish(mut self, config: &ParserConfig) -> ParsedDocument {
        let mut counts: BTreeMap<NodeType, usize> = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.node_type).or_insert(0) += 1;
        }

        let (article_index, conflicts) =
            index_articles(&self.nodes, config.duplicate_policy);
        for conflict in &conflicts {
            let (first, duplicate) = ordered_positions(&self.nodes, conflict);
            self.warnings.push(ParseWarning::DuplicateArticle {
                document_type: self.document_type.to_string(),
                article_number: conflict.article_number,
                first_position: first,
                duplicate_position: duplicate,
            });
        }

        if let Some(&expected) = config.expected_articles.get(self.document_type) {
            let found = article_index.len();
            if found != expected {
                warn!(
                    document_type = self.document_type,
                    expected, found, "Número de artículos distinto del esperado"
                );
                self.warnings.push(ParseWarning::ArticleCountMismatch {
                    document_type: self.document_type.to_string(),
                    expected,
                    found,
                });
            }
        }

        let preamble = (!self.preamble.is_empty()).then(|| self.preamble.join("\n"));

        ParsedDocument::from_parts(
            self.document_type.to_string(),
            preamble,
            self.nodes,
            article_index,
            counts,
            self.warnings,
            conflicts,
        )
    }
}

/// Índice número → artículo según la política, junto con los conflictos.
fn index_articles(
    nodes: &[DocumentNode],
    policy: DuplicatePolicy,
) -> (BTreeMap<u32, NodeId>, Vec<ArticleConflict>) {
    let mut index: BTreeMap<u32, NodeId> = BTreeMap::new();
    let mut conflicts = Vec::new();

    let articles = nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Article);
    for node in articles {
        let Some(number) = node.article_number else {
            continue;
        };
        match index.get(&number).copied() {
            None => {
                index.insert(number, node.id);
            }
            Some(existing) => {
                let (kept, discarded) = match policy {
                    DuplicatePolicy::KeepFirst => (existing, node.id),
                    DuplicatePolicy::KeepLast => (node.id, existing),
                };
                index.insert(number, kept);
                conflicts.push(ArticleConflict {
                    article_number: number,
                    kept,
                    discarded,
                });
            }
        }
    }

    (index, conflicts)
}

fn ordered_positions(nodes: &[DocumentNode], conflict: &ArticleConflict) -> (u64, u64) {
    let a = nodes[conflict.kept.index()].document_position;
    let b = nodes[conflict.discarded.index()].document_position;
    (a.min(b), a.max(b))
}

/// Parsea una norma completa. Nunca falla: los problemas quedan como
/// avisos en el documento resultante.
pub fn parse_document(document_type: &str, text: &str, config: &ParserConfig) -> ParsedDocument {
    let mut builder = DocumentBuilder::new(document_type);
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        builder.feed(index + 1, line);
    }

    let document = builder.finish(config);
    info!(
        document_type,
        nodes = document.nodes().len(),
        articles = document.count(NodeType::Article),
        warnings = document.warnings.len(),
        "Documento parseado"
    );
    if !document.conflicts.is_empty() {
        debug!(document_type, conflicts = ?document.conflicts, "Artículos repetidos");
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "PARTE I - Disposições\nTítulo I - Geral\nArt. 1º Texto.\n§ 1º Detalhe.\nArt. 2º Outro texto.";

    fn parse(text: &str) -> ParsedDocument {
        parse_document("PDUS", text, &ParserConfig::default())
    }

    #[test]
    fn sample_statute_builds_expected_tree() {
        let doc = parse(SAMPLE);

        assert_eq!(doc.count(NodeType::Part), 1);
        assert_eq!(doc.count(NodeType::Title), 1);
        assert_eq!(doc.count(NodeType::Article), 2);
        assert_eq!(doc.count(NodeType::Paragraph), 1);

        let art1 = doc.article(1).unwrap();
        let art2 = doc.article(2).unwrap();
        assert_eq!(art1.sequence_index, 0);
        assert_eq!(art2.sequence_index, 1);
        assert_eq!(art1.parent_id, art2.parent_id);

        let paragraph = doc
            .nodes()
            .iter()
            .find(|n| n.node_type == NodeType::Paragraph)
            .unwrap();
        assert_eq!(paragraph.parent_id, Some(art1.id));
        assert_eq!(paragraph.article_number, Some(1));
        assert_eq!(paragraph.number, "1");

        let chain: Vec<NodeType> = doc
            .ancestors(paragraph.id)
            .iter()
            .map(|n| n.node_type)
            .chain(std::iter::once(paragraph.node_type))
            .collect();
        assert_eq!(
            chain,
            vec![NodeType::Part, NodeType::Title, NodeType::Article, NodeType::Paragraph]
        );
        assert_eq!(paragraph.level, 4);
    }

    #[test]
    fn heading_titles_come_from_original_text() {
        let doc = parse(SAMPLE);
        let part = &doc.nodes()[0];
        assert_eq!(part.node_type, NodeType::Part);
        assert_eq!(part.number, "I");
        assert_eq!(part.title.as_deref(), Some("Disposições"));
        assert_eq!(doc.nodes()[1].title.as_deref(), Some("Geral"));
    }

    #[test]
    fn inline_title_glued_to_numeral() {
        let doc = parse("TÍTULO I-Geral\nEste título trata de disposições.\nArt. 1º Texto.");
        let title = &doc.nodes()[0];
        assert_eq!(title.node_type, NodeType::Title);
        assert_eq!(title.number, "I");
        assert_eq!(title.title.as_deref(), Some("Geral"));
        assert!(title.content.contains("Este título trata de disposições."));
        assert_eq!(doc.count(NodeType::Article), 1);
    }

    #[test]
    fn heading_without_inline_title_takes_next_line() {
        let doc = parse("TÍTULO II\nDO ZONEAMENTO\nArt. 9º As zonas são definidas no Anexo 1.");
        let title = &doc.nodes()[0];
        assert_eq!(title.node_type, NodeType::Title);
        assert_eq!(title.title.as_deref(), Some("DO ZONEAMENTO"));
        assert_eq!(doc.article(9).unwrap().parent_id, Some(title.id));
    }

    #[test]
    fn incisos_and_alineas_nest_inside_article() {
        let text = "Art. 81. Os limites de altura máxima são estabelecidos no Anexo 9:\n\
                    I -- programa de habitação social;\n\
                    II -- sistema de pontuação:\n\
                    a) edificação sustentável;\n\
                    b) fruição pública;\n\
                    § 1º -- Para os fins do inciso III:\n\
                    I -- análise técnica;";
        let doc = parse(text);
        let art = doc.article(81).unwrap();

        let children: Vec<(NodeType, &str)> = doc
            .children(art.id)
            .iter()
            .map(|n| (n.node_type, n.number.as_str()))
            .collect();
        assert_eq!(
            children,
            vec![
                (NodeType::Inciso, "I"),
                (NodeType::Inciso, "II"),
                (NodeType::Paragraph, "1"),
            ]
        );

        let inciso_ii = doc.children(art.id)[1];
        let alineas: Vec<&str> = doc
            .children(inciso_ii.id)
            .iter()
            .map(|n| n.number.as_str())
            .collect();
        assert_eq!(alineas, vec!["a", "b"]);

        let paragraph = doc.children(art.id)[2];
        let nested = doc.children(paragraph.id);
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].node_type, NodeType::Inciso);
        assert!(doc.nodes().iter().skip(1).all(|n| n.article_number == Some(81)));
    }

    #[test]
    fn roman_numeral_outside_article_is_not_an_inciso() {
        let doc = parse("I - Introdução geral\nPARTE II - Do Planejamento\nArt. 3º Texto.");
        assert_eq!(doc.count(NodeType::Inciso), 0);
        assert_eq!(doc.count(NodeType::Part), 1);
        assert_eq!(doc.preamble.as_deref(), Some("I - Introdução geral"));
    }

    #[test]
    fn single_paragraph_is_recognised() {
        let doc = parse("Art. 5º Texto.\nParágrafo único. Disposição complementar.");
        let paragraph = &doc.nodes()[1];
        assert_eq!(paragraph.node_type, NodeType::Paragraph);
        assert_eq!(paragraph.number, "único");
        assert_eq!(paragraph.article_text, "Disposição complementar.");
    }

    #[test]
    fn higher_heading_closes_lower_contexts() {
        let text = "TÍTULO I - A\nCAPÍTULO I - B\nSEÇÃO I - C\nArt. 1º x.\nCAPÍTULO II - D\nArt. 2º y.\nTÍTULO II - E\nArt. 3º z.";
        let doc = parse(text);
        let art2 = doc.article(2).unwrap();
        let chapter2 = doc.parent(art2.id).unwrap();
        assert_eq!((chapter2.node_type, chapter2.number.as_str()), (NodeType::Chapter, "II"));
        assert_eq!(chapter2.sequence_index, 1);

        let art3 = doc.article(3).unwrap();
        let title2 = doc.parent(art3.id).unwrap();
        assert_eq!((title2.node_type, title2.number.as_str()), (NodeType::Title, "II"));
        assert_eq!(art3.level, 2);
    }

    #[test]
    fn unparsable_article_number_is_a_warning() {
        let doc = parse("Art. 1º Texto.\nArt. XIV revogado.\nArt. 2º Outro.");
        assert_eq!(doc.count(NodeType::Article), 2);
        assert!(matches!(
            doc.warnings.as_slice(),
            [ParseWarning::UnparsableArticleNumber { line: 2, .. }]
        ));
        assert!(doc.article(1).unwrap().content.contains("Art. XIV revogado."));
    }

    #[test]
    fn orphan_paragraph_is_reported() {
        let doc = parse("§ 1º Solto.\nArt. 1º Texto.");
        assert_eq!(doc.count(NodeType::Paragraph), 0);
        assert_eq!(doc.warnings, vec![ParseWarning::OrphanParagraph { line: 1 }]);
        assert_eq!(doc.preamble.as_deref(), Some("§ 1º Solto."));
    }

    #[test]
    fn article_count_mismatch_is_reported_with_nodes() {
        let config = ParserConfig::default().with_expected("PDUS", 217);
        let doc = parse_document("PDUS", SAMPLE, &config);
        assert_eq!(doc.count(NodeType::Article), 2);
        assert!(doc.warnings.contains(&ParseWarning::ArticleCountMismatch {
            document_type: "PDUS".to_string(),
            expected: 217,
            found: 2,
        }));

        let matching = ParserConfig::default().with_expected("PDUS", 2);
        assert!(parse_document("PDUS", SAMPLE, &matching).warnings.is_empty());
    }

    #[test]
    fn duplicate_articles_follow_policy() {
        let text = "Art. 7º Primeiro.\nArt. 7º Segundo.";

        let first = parse_document("LUOS", text, &ParserConfig::default());
        assert_eq!(first.conflicts.len(), 1);
        assert_eq!(first.article(7).unwrap().article_text, "Primeiro.");

        let last = parse_document(
            "LUOS",
            text,
            &ParserConfig::default().with_policy(DuplicatePolicy::KeepLast),
        );
        assert_eq!(last.article(7).unwrap().article_text, "Segundo.");
        assert!(last.warnings.iter().any(|w| matches!(
            w,
            ParseWarning::DuplicateArticle { article_number: 7, first_position: 0, duplicate_position: 1, .. }
        )));
    }

    #[test]
    fn article_full_content_round_trips_markers() {
        let text = "TÍTULO I - Geral\nArt. 1º Um.\n§ 1º Detalhe.\nArt. 2º Dois.\nI - item;\nArt. 3º Três.";
        let doc = parse(text);
        let joined: String = doc
            .articles()
            .map(|a| doc.full_content(a.id))
            .collect::<Vec<_>>()
            .join("\n");
        for marker in ["Art. 1º", "Art. 2º", "Art. 3º"] {
            assert_eq!(joined.matches(marker).count(), 1, "{marker}");
        }
        assert!(joined.contains("§ 1º Detalhe."));
        assert!(!joined.contains("TÍTULO"));
    }

    #[test]
    fn duplicate_policy_parses_from_str() {
        assert_eq!("keep-last".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::KeepLast));
        assert_eq!(" KEEP-FIRST ".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::KeepFirst));
        assert!("newest".parse::<DuplicatePolicy>().is_err());
    }

    #[test]
    fn classify_priority_prefers_most_specific() {
        assert!(matches!(classify("a) alínea", true), LineKind::Alinea { .. }));
        assert_eq!(classify("a) alínea", false), LineKind::Text);
        assert!(matches!(classify("IV -- item", true), LineKind::Inciso { .. }));
        assert_eq!(classify("IV -- item", false), LineKind::Text);
        assert!(matches!(
            classify("PARTE IV - Título", true),
            LineKind::Heading { node_type: NodeType::Part, .. }
        ));
        assert!(matches!(
            classify("SUBSEÇÃO II", false),
            LineKind::Heading { node_type: NodeType::Subsection, .. }
        ));
        assert!(matches!(classify("Art. 10. Texto", true), LineKind::Article { number: 10, .. }));
        assert_eq!(classify("parte do território", false), LineKind::Text);
    }
}
