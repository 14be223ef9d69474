//! XSD Schema Builder: XML-Dokumente → [`SchemaNode`]-Baum.
//!
//! Rekursiver Abstieg über das XML-Dokument: für jedes Schema-Konstrukt
//! wird die passende Payload-Variante instanziiert, Attribute kopiert,
//! Kinder in Dokumentreihenfolge rekursiv aufgebaut.
//!
//! Zwei Einstiegspunkte:
//! - [`parse_xsd_file`] — Datei-Parse mit transitiver Auflösung von
//!   xs:include/xs:import/xs:redefine/xs:override und Provenienz-Stempel
//!   auf jedem erzeugten Knoten (siehe [`includes`]).
//! - [`parse_xsd`] — String-Parse ohne Dateikontext: Direktiven bleiben
//!   als Knoten erhalten, werden aber nicht verfolgt; es wird keine
//!   Provenienz gestempelt.
//!
//! Dazu [`detect_xsd_version`]: voller Baum-Scan nach XSD-1.1-Konstrukten.

mod includes;

use std::fmt;
use std::path::Path;

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::{Error, Result};
use crate::node::{
    AttributeUseKind, ContentModel, FacetKind, FormDefault, MaxOccurs, NodePayload, NodeType,
    OpenContentMode, SchemaNode, XPathExpr,
};

/// XML Schema Namespace.
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// DoS-Schutz: maximale Größe eines einzelnen XSD-Dokuments.
pub(crate) const MAX_XSD_SIZE: usize = 4 * 1024 * 1024;

// ============================================================================
// Öffentliche Einstiegspunkte
// ============================================================================

/// Parsed ein XSD-Dokument aus einem String.
///
/// Direktiven (xs:include usw.) bleiben als Knoten im Baum, werden aber
/// mangels Dateikontext nicht verfolgt; Provenienz wird nicht gestempelt.
pub fn parse_xsd(content: &str) -> Result<SchemaNode> {
    if content.len() > MAX_XSD_SIZE {
        return Err(Error::DocumentTooLarge {
            size: content.len(),
            max: MAX_XSD_SIZE,
        });
    }
    let doc = parse_document(content)?;
    let root = doc.root_element();
    let schema = build_schema_root(&root)?;
    apply_annotation(&root, &schema);
    for child in element_children(root) {
        if child.tag_name().name() == "annotation" {
            continue;
        }
        if let Some(node) = build_node(&child)? {
            schema.add_child(&node);
        }
    }
    Ok(schema)
}

/// Parsed eine XSD-Datei samt aller transitiv eingebundenen Dateien zu
/// einem zusammengeführten Baum mit Provenienz-Metadaten.
///
/// Relative schemaLocation-Werte werden gegen das Verzeichnis der jeweils
/// einbindenden Datei aufgelöst; absolute URLs werden unverändert
/// durchgereicht (nicht geladen). Zirkuläre Include-Ketten schlagen fehl.
pub fn parse_xsd_file(path: &Path) -> Result<SchemaNode> {
    includes::parse_with_includes(path)
}

/// Effektive XSD-Version eines Baums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XsdVersion {
    V10,
    V11,
}

impl fmt::Display for XsdVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V10 => f.write_str("1.0"),
            Self::V11 => f.write_str("1.1"),
        }
    }
}

/// Ermittelt die effektive XSD-Version durch einen vollen Tiefensuche-Scan.
///
/// "1.1" sobald irgendwo im Baum (beliebig tief) ein assert, override,
/// openContent, alternative oder ein assertion-Facet vorkommt, sonst "1.0".
pub fn detect_xsd_version(schema: &SchemaNode) -> XsdVersion {
    if has_v11_construct(schema) {
        XsdVersion::V11
    } else {
        XsdVersion::V10
    }
}

fn has_v11_construct(node: &SchemaNode) -> bool {
    match node.node_type() {
        NodeType::Assert
        | NodeType::Override
        | NodeType::OpenContent
        | NodeType::Alternative => return true,
        NodeType::Facet => {
            if node.facet_kind() == Some(FacetKind::Assertion) {
                return true;
            }
        }
        _ => {}
    }
    node.children().iter().any(has_v11_construct)
}

// ============================================================================
// Dokument-Gerüst
// ============================================================================

/// Parsed den XML-Text. DTDs werden toleriert (manche Schemas tragen
/// eine DOCTYPE-Zeile).
pub(crate) fn parse_document(content: &str) -> Result<Document<'_>> {
    let opts = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    Document::parse_with_options(content, opts)
        .map_err(|e| Error::XmlParseError(e.to_string()))
}

/// Liest eine Schema-Datei mit Größen-Guard.
pub(crate) fn read_schema_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("cannot read schema '{}': {e}", path.display()))
    })?;
    if content.len() > MAX_XSD_SIZE {
        return Err(Error::DocumentTooLarge {
            size: content.len(),
            max: MAX_XSD_SIZE,
        });
    }
    Ok(content)
}

/// Wurzel muss xs:schema sein.
pub(crate) fn ensure_schema_root(root: &Node) -> Result<()> {
    if root.tag_name().name() != "schema" || root.tag_name().namespace() != Some(XS_NS) {
        return Err(Error::XsdParseError(
            "root element must be xs:schema".to_string(),
        ));
    }
    Ok(())
}

/// Baut die Schema-Wurzel aus dem xs:schema-Element.
pub(crate) fn build_schema_root(root: &Node) -> Result<SchemaNode> {
    ensure_schema_root(root)?;
    let payload = NodePayload::Schema {
        main_schema_path: None,
        target_namespace: root.attribute("targetNamespace").map(str::to_owned),
        element_form_default: root
            .attribute("elementFormDefault")
            .map(FormDefault::from_attr)
            .unwrap_or_default(),
        attribute_form_default: root
            .attribute("attributeFormDefault")
            .map(FormDefault::from_attr)
            .unwrap_or_default(),
    };
    Ok(SchemaNode::new("schema", payload))
}

/// Element-Kinder im XS-Namespace, in Dokumentreihenfolge.
fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().namespace() == Some(XS_NS))
}

// ============================================================================
// Knoten-Konstruktion (rekursiver Abstieg)
// ============================================================================

/// Baut einen Knoten aus einem XS-Element. Unbekannte Elemente werden
/// übersprungen (None).
pub(crate) fn build_node(elem: &Node) -> Result<Option<SchemaNode>> {
    if elem.tag_name().namespace() != Some(XS_NS) {
        return Ok(None);
    }
    let tag = elem.tag_name().name();

    // Facets zuerst: 14 Elementnamen, eine Variante.
    if let Some(kind) = FacetKind::from_tag(tag) {
        let value = match kind {
            FacetKind::Assertion => elem.attribute("test").unwrap_or("").to_string(),
            _ => elem.attribute("value").unwrap_or("").to_string(),
        };
        let node = SchemaNode::facet(kind, value);
        apply_annotation(elem, &node);
        return Ok(Some(node));
    }

    let node = match tag {
        "element" => build_element(elem),
        "attribute" => build_attribute(elem),
        "complexType" => return build_complex_type(elem).map(Some),
        "simpleType" => SchemaNode::simple_type(name_attr(elem)),
        "sequence" => SchemaNode::sequence(),
        "choice" => SchemaNode::choice(),
        "all" => SchemaNode::all(),
        "group" => SchemaNode::new(
            name_attr(elem),
            NodePayload::Group {
                ref_name: elem.attribute("ref").map(str::to_owned),
            },
        ),
        "attributeGroup" => SchemaNode::new(
            name_attr(elem),
            NodePayload::AttributeGroup {
                ref_name: elem.attribute("ref").map(str::to_owned),
            },
        ),
        "any" => SchemaNode::new(
            "any",
            NodePayload::Any {
                namespace: elem.attribute("namespace").map(str::to_owned),
                process_contents: elem.attribute("processContents").map(str::to_owned),
            },
        ),
        "anyAttribute" => SchemaNode::new(
            "anyAttribute",
            NodePayload::AnyAttribute {
                namespace: elem.attribute("namespace").map(str::to_owned),
                process_contents: elem.attribute("processContents").map(str::to_owned),
            },
        ),
        "include" => SchemaNode::include(location_attr(elem, "include")?),
        "import" => SchemaNode::import(
            elem.attribute("schemaLocation").map(str::to_owned),
            elem.attribute("namespace").map(str::to_owned),
        ),
        "redefine" => SchemaNode::new(
            "redefine",
            NodePayload::Redefine {
                schema_location: location_attr(elem, "redefine")?,
            },
        ),
        "override" => SchemaNode::new(
            "override",
            NodePayload::Override {
                schema_location: location_attr(elem, "override")?,
            },
        ),
        "restriction" => SchemaNode::new(
            "restriction",
            NodePayload::Restriction {
                base: elem.attribute("base").map(str::to_owned),
            },
        ),
        "extension" => SchemaNode::new(
            "extension",
            NodePayload::Extension {
                base: elem.attribute("base").map(str::to_owned),
            },
        ),
        "list" => SchemaNode::new(
            "list",
            NodePayload::List {
                item_type: elem.attribute("itemType").map(str::to_owned),
            },
        ),
        "union" => SchemaNode::new(
            "union",
            NodePayload::Union {
                member_types: elem
                    .attribute("memberTypes")
                    .map(|v| v.split_whitespace().map(str::to_owned).collect())
                    .unwrap_or_default(),
            },
        ),
        "key" => SchemaNode::new(name_attr(elem), NodePayload::Key),
        "keyref" => SchemaNode::new(
            name_attr(elem),
            NodePayload::Keyref {
                refer: elem.attribute("refer").map(str::to_owned),
            },
        ),
        "unique" => SchemaNode::new(name_attr(elem), NodePayload::Unique),
        "selector" => SchemaNode::new(
            "selector",
            NodePayload::Selector {
                xpath: xpath_attr(elem, "selector")?,
            },
        ),
        "field" => SchemaNode::new(
            "field",
            NodePayload::Field {
                xpath: xpath_attr(elem, "field")?,
            },
        ),
        "assert" => SchemaNode::new(
            "assert",
            NodePayload::Assert {
                test: elem.attribute("test").map(str::to_owned),
            },
        ),
        "alternative" => SchemaNode::new(
            "alternative",
            NodePayload::Alternative {
                test: elem.attribute("test").map(str::to_owned),
                type_attribute: elem.attribute("type").map(str::to_owned),
            },
        ),
        "openContent" => SchemaNode::new(
            "openContent",
            NodePayload::OpenContent {
                mode: elem
                    .attribute("mode")
                    .map(OpenContentMode::from_attr)
                    .unwrap_or_default(),
            },
        ),
        // annotation wird vom Elternknoten übernommen; alles andere
        // (notation, Fremd-Namespaces) wird strukturell ignoriert.
        _ => {
            log::debug!("skipping unsupported schema element xs:{tag}");
            return Ok(None);
        }
    };

    parse_occurs(elem, &node)?;
    apply_annotation(elem, &node);
    build_children_into(elem, &node)?;
    Ok(Some(node))
}

fn build_element(elem: &Node) -> SchemaNode {
    SchemaNode::new(
        name_attr(elem),
        NodePayload::Element {
            type_name: elem.attribute("type").map(str::to_owned),
            ref_name: elem.attribute("ref").map(str::to_owned),
            nillable: elem.attribute("nillable") == Some("true"),
            default_value: elem.attribute("default").map(str::to_owned),
            fixed_value: elem.attribute("fixed").map(str::to_owned),
        },
    )
}

fn build_attribute(elem: &Node) -> SchemaNode {
    SchemaNode::new(
        name_attr(elem),
        NodePayload::Attribute {
            type_name: elem.attribute("type").map(str::to_owned),
            use_kind: elem
                .attribute("use")
                .map(AttributeUseKind::from_attr)
                .unwrap_or_default(),
            default_value: elem.attribute("default").map(str::to_owned),
            fixed_value: elem.attribute("fixed").map(str::to_owned),
        },
    )
}

/// ComplexType: simpleContent/complexContent-Wrapper werden ausgepackt,
/// der Wrapper selbst wird in der Payload gemerkt, damit die
/// Serialisierung ihn wieder herstellt.
fn build_complex_type(elem: &Node) -> Result<SchemaNode> {
    let mut mixed = elem.attribute("mixed") == Some("true");
    let mut content_model = None;
    for child in element_children(*elem) {
        match child.tag_name().name() {
            "simpleContent" => content_model = Some(ContentModel::SimpleContent),
            "complexContent" => {
                content_model = Some(ContentModel::ComplexContent);
                // mixed darf auch am Wrapper stehen
                if child.attribute("mixed") == Some("true") {
                    mixed = true;
                }
            }
            _ => {}
        }
    }

    let node = SchemaNode::new(
        name_attr(elem),
        NodePayload::ComplexType {
            mixed,
            abstract_: elem.attribute("abstract") == Some("true"),
            content_model,
        },
    );
    apply_annotation(elem, &node);

    for child in element_children(*elem) {
        match child.tag_name().name() {
            "annotation" => {}
            "simpleContent" | "complexContent" => {
                // Derivation (restriction/extension) direkt unter den Typ
                build_children_into(&child, &node)?;
            }
            _ => {
                if let Some(built) = build_node(&child)? {
                    node.add_child(&built);
                }
            }
        }
    }
    Ok(node)
}

/// Baut alle Element-Kinder von `elem` und hängt sie an `node`.
fn build_children_into(elem: &Node, node: &SchemaNode) -> Result<()> {
    for child in element_children(*elem) {
        if child.tag_name().name() == "annotation" {
            continue;
        }
        if let Some(built) = build_node(&child)? {
            node.add_child(&built);
        }
    }
    Ok(())
}

// ============================================================================
// Attribut-Hilfen
// ============================================================================

fn name_attr(elem: &Node) -> String {
    elem.attribute("name").unwrap_or("").to_string()
}

/// schemaLocation ist für include/redefine/override Pflicht.
fn location_attr(elem: &Node, directive: &str) -> Result<String> {
    elem.attribute("schemaLocation")
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::XsdParseError(format!("xs:{directive} requires a schemaLocation attribute"))
        })
}

fn xpath_attr(elem: &Node, kind: &str) -> Result<XPathExpr> {
    let raw = elem.attribute("xpath").ok_or_else(|| {
        Error::XsdParseError(format!("xs:{kind} requires an xpath attribute"))
    })?;
    XPathExpr::new(raw)
}

/// minOccurs/maxOccurs aus den Attributen übernehmen.
/// maxOccurs="unbounded" wird auf den Sentinel abgebildet.
fn parse_occurs(elem: &Node, node: &SchemaNode) -> Result<()> {
    if let Some(v) = elem.attribute("minOccurs") {
        let min = v
            .parse::<usize>()
            .map_err(|_| Error::XsdParseError(format!("invalid minOccurs value '{v}'")))?;
        node.set_min_occurs(min);
    }
    if let Some(v) = elem.attribute("maxOccurs") {
        let max = if v == "unbounded" {
            MaxOccurs::Unbounded
        } else {
            MaxOccurs::Bounded(v.parse::<usize>().map_err(|_| {
                Error::XsdParseError(format!("invalid maxOccurs value '{v}'"))
            })?)
        };
        node.set_max_occurs(max);
    }
    Ok(())
}

/// Übernimmt xs:annotation-Inhalte (documentation/appinfo) auf den Knoten.
pub(crate) fn apply_annotation(elem: &Node, node: &SchemaNode) {
    let mut documentation = String::new();
    let mut appinfo = String::new();
    for ann in element_children(*elem).filter(|n| n.tag_name().name() == "annotation") {
        for part in element_children(ann) {
            match part.tag_name().name() {
                "documentation" => documentation.push_str(&text_content(&part)),
                "appinfo" => appinfo.push_str(&text_content(&part)),
                _ => {}
            }
        }
    }
    if !documentation.is_empty() {
        node.set_documentation(Some(&documentation));
    }
    if !appinfo.is_empty() {
        node.set_appinfo(Some(&appinfo));
    }
}

/// Gesamter Textinhalt eines Elements (alle Text-Nachfahren konkateniert).
fn text_content(node: &Node) -> String {
    node.descendants()
        .filter(|d| d.is_text())
        .filter_map(|d| d.text())
        .collect()
}

/// True für die vier Einbindungs-Direktiven.
pub(crate) fn is_directive(node_type: NodeType) -> bool {
    matches!(
        node_type,
        NodeType::Include | NodeType::Import | NodeType::Redefine | NodeType::Override
    )
}
