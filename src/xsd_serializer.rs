//! Schema-Baum → XSD-Serialisierung (strukturelle Inverse des Builders).
//!
//! Läuft den Baum in Kindreihenfolge ab und emittiert das äquivalente
//! xs:-Markup, pretty-printed mit 2 Spaces Einzug. Erhalten bleiben:
//! Deklarationen, Kompositoren mit Kindern in Originalreihenfolge,
//! Facets in Parse-Reihenfolge, documentation/appinfo als
//! Annotation-Blöcke auf Knoten- und Typ-Ebene, Identity-Constraints
//! mit Selector und Fields.
//!
//! Drei APIs:
//! - [`schema_to_string`] — gibt das XSD als String zurück (Convenience).
//! - [`schema_to_writer`] — streamt direkt in `impl Write`.
//! - [`schema_to_files`] — Multi-File-Modus: partitioniert die
//!   Top-Level-Kinder nach `source_info.source_file` und schreibt jede
//!   Partition als eigene Datei; die Hauptdatei verbindet sie über
//!   xs:include-Direktiven.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::node::{AttributeUseKind, ContentModel, FacetKind, MaxOccurs, NodeType, SchemaNode};
use crate::xsd::is_directive;
use crate::{FastHashMap, FastHashSet, FastIndexMap};

/// Serialisiert einen Schema-Baum als XSD-String.
pub fn schema_to_string(schema: &SchemaNode) -> Result<String> {
    let mut buf = Vec::new();
    schema_to_writer(schema, &mut buf)?;
    String::from_utf8(buf).map_err(|_| Error::SerializeError("output is not valid UTF-8".into()))
}

/// Serialisiert einen Schema-Baum direkt in einen Writer.
pub fn schema_to_writer(schema: &SchemaNode, writer: impl Write) -> Result<()> {
    ensure_schema(schema)?;
    let mut ser = XsdWriter::new(writer, 2);
    ser.write_schema_document(schema, &schema.children(), &[], None)
}

/// Multi-File-Modus: schreibt die Hauptdatei plus eine Datei pro
/// eingebundener Quelle unter `target_dir`.
///
/// Partitionierung ausschließlich über Provenienz: Knoten ohne
/// `source_info` zählen zum Hauptdokument. Jede Nicht-Haupt-Partition
/// landet unter ihrer ursprünglichen relativen schemaLocation; für
/// Partitionen, die keine Direktive im Baum abdeckt, wird in der
/// Hauptdatei ein xs:include synthetisiert. Gibt die geschriebenen
/// Pfade zurück, Hauptdatei zuerst.
pub fn schema_to_files(schema: &SchemaNode, target_dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_schema(schema)?;

    let main_file_name = schema
        .main_schema_path()
        .and_then(|p| p.file_name().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("schema.xsd"));
    let main_key = schema
        .main_schema_path()
        .unwrap_or_else(|| main_file_name.clone());

    // Partitionen in Erst-Auftretens-Reihenfolge, Hauptdokument zuerst.
    let mut partitions: FastIndexMap<PathBuf, Vec<SchemaNode>> = FastIndexMap::default();
    partitions.insert(main_key.clone(), Vec::new());
    for child in schema.children() {
        let key = child
            .source_info()
            .map(|si| si.source_file().to_path_buf())
            .unwrap_or_else(|| main_key.clone());
        partitions.entry(key).or_default().push(child);
    }

    // Direktiven im Baum decken Partitionen ab; Imports liefern den
    // targetNamespace ihrer Partitionsdatei.
    let mut directive_locations: FastHashSet<String> = FastHashSet::default();
    let mut import_namespaces: FastHashMap<String, String> = FastHashMap::default();
    for child in schema.children() {
        if is_directive(child.node_type())
            && let Some(location) = child.schema_location()
        {
            if child.node_type() == NodeType::Import
                && let Some(ns) = child.namespace()
            {
                import_namespaces.insert(location.clone(), ns);
            }
            directive_locations.insert(location);
        }
    }

    std::fs::create_dir_all(target_dir)
        .map_err(|e| Error::IoError(format!("cannot create '{}': {e}", target_dir.display())))?;

    let mut written = Vec::new();
    let mut synthetic_includes: Vec<String> = Vec::new();

    for (file, nodes) in partitions.iter().filter(|(key, _)| **key != main_key) {
        let location = nodes
            .iter()
            .find_map(|n| {
                n.source_info()
                    .and_then(|si| si.schema_location().map(str::to_owned))
            })
            .or_else(|| {
                file.file_name()
                    .map(|f| f.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "included.xsd".to_string());

        let out_path = target_dir.join(&location);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("cannot create '{}': {e}", parent.display()))
            })?;
        }

        let tns_override = import_namespaces.get(&location).map(String::as_str);
        let mut buf = Vec::new();
        let mut ser = XsdWriter::new(&mut buf, 2);
        ser.write_schema_document(schema, nodes, &[], tns_override)?;
        std::fs::write(&out_path, &buf)
            .map_err(|e| Error::IoError(format!("cannot write '{}': {e}", out_path.display())))?;

        if !directive_locations.contains(&location) {
            synthetic_includes.push(location);
        }
        written.push(out_path);
    }

    let main_nodes = partitions.get(&main_key).cloned().unwrap_or_default();
    let out_main = target_dir.join(&main_file_name);
    let mut buf = Vec::new();
    let mut ser = XsdWriter::new(&mut buf, 2);
    ser.write_schema_document(schema, &main_nodes, &synthetic_includes, None)?;
    std::fs::write(&out_main, &buf)
        .map_err(|e| Error::IoError(format!("cannot write '{}': {e}", out_main.display())))?;
    written.insert(0, out_main);

    Ok(written)
}

fn ensure_schema(node: &SchemaNode) -> Result<()> {
    if node.node_type() != NodeType::Schema {
        return Err(Error::SerializeError(
            "root node must be a schema".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Freie Hilfsfunktionen
// ============================================================================

/// io::Error → Error Konvertierung.
fn io_err(e: std::io::Error) -> Error {
    Error::IoError(e.to_string())
}

/// Schreibt einen String als Bytes in den Writer.
#[inline]
fn w(writer: &mut impl Write, s: &str) -> Result<()> {
    writer.write_all(s.as_bytes()).map_err(io_err)
}

/// XML-Escaping mit memchr3: sucht drei Zeichen gleichzeitig, Blöcke
/// ohne Escape-Zeichen werden in einem Stück geschrieben.
fn write_escaped_memchr3(
    w: &mut impl Write,
    s: &str,
    needle: [u8; 3],
    replacement: [&[u8]; 3],
) -> Result<()> {
    let bytes = s.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        match memchr::memchr3(needle[0], needle[1], needle[2], &bytes[start..]) {
            Some(offset) => {
                let pos = start + offset;
                if start < pos {
                    w.write_all(&bytes[start..pos]).map_err(io_err)?;
                }
                let idx = needle.iter().position(|&n| n == bytes[pos]).unwrap();
                w.write_all(replacement[idx]).map_err(io_err)?;
                start = pos + 1;
            }
            None => {
                w.write_all(&bytes[start..]).map_err(io_err)?;
                break;
            }
        }
    }
    Ok(())
}

/// Escaping fuer Text-Inhalt: & < > werden ersetzt.
fn write_escaped_text(w: &mut impl Write, s: &str) -> Result<()> {
    write_escaped_memchr3(w, s, [b'&', b'<', b'>'], [b"&amp;", b"&lt;", b"&gt;"])
}

/// Escaping fuer Attribut-Werte: & < " werden ersetzt.
fn write_escaped_attr(w: &mut impl Write, s: &str) -> Result<()> {
    write_escaped_memchr3(w, s, [b'&', b'<', b'"'], [b"&amp;", b"&lt;", b"&quot;"])
}

// ============================================================================
// XsdWriter
// ============================================================================

/// Streaming-Serializer mit Einrueckung.
struct XsdWriter<W: Write> {
    writer: W,
    indent: usize,
    depth: usize,
}

impl<W: Write> XsdWriter<W> {
    fn new(writer: W, indent: usize) -> Self {
        Self {
            writer,
            indent,
            depth: 0,
        }
    }

    fn write_indent(&mut self) -> Result<()> {
        for _ in 0..self.depth * self.indent {
            w(&mut self.writer, " ")?;
        }
        Ok(())
    }

    /// Schreibt ein komplettes xs:schema-Dokument mit den übergebenen
    /// Top-Level-Knoten.
    ///
    /// `synthetic_includes` werden als zusätzliche xs:include-Direktiven
    /// vor den Knoten emittiert (Multi-File-Modus); `tns_override`
    /// ersetzt den targetNamespace der Wurzel (Import-Partitionen).
    fn write_schema_document(
        &mut self,
        schema: &SchemaNode,
        children: &[SchemaNode],
        synthetic_includes: &[String],
        tns_override: Option<&str>,
    ) -> Result<()> {
        w(&mut self.writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        w(
            &mut self.writer,
            "<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\"",
        )?;

        let tns = tns_override
            .map(str::to_owned)
            .or_else(|| schema.target_namespace());
        if let Some(tns) = &tns {
            self.attr("targetNamespace", tns)?;
            self.attr("xmlns", tns)?;
        }
        if let Some(form) = schema.element_form_default()
            && form == crate::node::FormDefault::Qualified
        {
            self.attr("elementFormDefault", form.as_str())?;
        }
        if let Some(form) = schema.attribute_form_default()
            && form == crate::node::FormDefault::Qualified
        {
            self.attr("attributeFormDefault", form.as_str())?;
        }

        if children.is_empty()
            && synthetic_includes.is_empty()
            && schema.documentation().is_none()
            && schema.appinfo().is_none()
        {
            w(&mut self.writer, "/>\n")?;
            return Ok(());
        }

        w(&mut self.writer, ">\n")?;
        self.depth = 1;

        if schema.documentation().is_some() || schema.appinfo().is_some() {
            self.write_annotation(schema)?;
        }
        for location in synthetic_includes {
            self.write_indent()?;
            w(&mut self.writer, "<xs:include schemaLocation=\"")?;
            write_escaped_attr(&mut self.writer, location)?;
            w(&mut self.writer, "\"/>\n")?;
        }
        for child in children {
            self.write_node(child)?;
        }

        self.depth = 0;
        w(&mut self.writer, "</xs:schema>\n")
    }

    /// Emittiert einen Knoten samt Teilbaum.
    fn write_node(&mut self, node: &SchemaNode) -> Result<()> {
        let tag = tag_for(node)?;
        self.write_indent()?;
        w(&mut self.writer, "<xs:")?;
        w(&mut self.writer, tag)?;
        self.write_attributes(node)?;

        let has_annotation = node.documentation().is_some() || node.appinfo().is_some();
        let children = node.children();
        if !has_annotation && children.is_empty() {
            return w(&mut self.writer, "/>\n");
        }

        w(&mut self.writer, ">\n")?;
        self.depth += 1;

        if has_annotation {
            self.write_annotation(node)?;
        }

        // ComplexType: beim Parsen gemerkten simpleContent/complexContent-
        // Wrapper wiederherstellen; Derivations-Kinder wandern hinein.
        if node.node_type() == NodeType::ComplexType
            && let Some(model) = node.content_model()
        {
            let wrapper = match model {
                ContentModel::SimpleContent => "simpleContent",
                ContentModel::ComplexContent => "complexContent",
            };
            let (inner, outer): (Vec<_>, Vec<_>) = children.into_iter().partition(|c| {
                matches!(c.node_type(), NodeType::Restriction | NodeType::Extension)
            });
            self.write_indent()?;
            w(&mut self.writer, "<xs:")?;
            w(&mut self.writer, wrapper)?;
            w(&mut self.writer, ">\n")?;
            self.depth += 1;
            for child in &inner {
                self.write_node(child)?;
            }
            self.depth -= 1;
            self.write_indent()?;
            w(&mut self.writer, "</xs:")?;
            w(&mut self.writer, wrapper)?;
            w(&mut self.writer, ">\n")?;
            for child in &outer {
                self.write_node(child)?;
            }
        } else {
            for child in &children {
                self.write_node(child)?;
            }
        }

        self.depth -= 1;
        self.write_indent()?;
        w(&mut self.writer, "</xs:")?;
        w(&mut self.writer, tag)?;
        w(&mut self.writer, ">\n")
    }

    /// Annotation-Block aus documentation/appinfo des Knotens.
    fn write_annotation(&mut self, node: &SchemaNode) -> Result<()> {
        self.write_indent()?;
        w(&mut self.writer, "<xs:annotation>\n")?;
        self.depth += 1;
        if let Some(doc) = node.documentation() {
            self.write_indent()?;
            w(&mut self.writer, "<xs:documentation>")?;
            write_escaped_text(&mut self.writer, &doc)?;
            w(&mut self.writer, "</xs:documentation>\n")?;
        }
        if let Some(appinfo) = node.appinfo() {
            self.write_indent()?;
            w(&mut self.writer, "<xs:appinfo>")?;
            write_escaped_text(&mut self.writer, &appinfo)?;
            w(&mut self.writer, "</xs:appinfo>\n")?;
        }
        self.depth -= 1;
        self.write_indent()?;
        w(&mut self.writer, "</xs:annotation>\n")
    }

    fn attr(&mut self, name: &str, value: &str) -> Result<()> {
        w(&mut self.writer, " ")?;
        w(&mut self.writer, name)?;
        w(&mut self.writer, "=\"")?;
        write_escaped_attr(&mut self.writer, value)?;
        w(&mut self.writer, "\"")
    }

    fn attr_opt(&mut self, name: &str, value: Option<String>) -> Result<()> {
        if let Some(value) = value {
            self.attr(name, &value)?;
        }
        Ok(())
    }

    /// name-Attribut nur wenn nicht leer.
    fn attr_name(&mut self, node: &SchemaNode) -> Result<()> {
        let name = node.name();
        if !name.is_empty() {
            self.attr("name", &name)?;
        }
        Ok(())
    }

    /// minOccurs/maxOccurs nur bei Abweichung vom Default 1/1.
    fn write_occurs(&mut self, node: &SchemaNode) -> Result<()> {
        if node.min_occurs() != 1 {
            self.attr("minOccurs", &node.min_occurs().to_string())?;
        }
        if node.max_occurs() != MaxOccurs::Bounded(1) {
            self.attr("maxOccurs", &node.max_occurs().to_string())?;
        }
        Ok(())
    }

    /// Varianten-spezifische Attribute.
    fn write_attributes(&mut self, node: &SchemaNode) -> Result<()> {
        match node.node_type() {
            NodeType::Schema => {}
            NodeType::Element => {
                if let Some(ref_name) = node.ref_name() {
                    self.attr("ref", &ref_name)?;
                } else {
                    self.attr_name(node)?;
                }
                self.attr_opt("type", node.type_name())?;
                self.write_occurs(node)?;
                if node.nillable() {
                    self.attr("nillable", "true")?;
                }
                self.attr_opt("default", node.default_value())?;
                self.attr_opt("fixed", node.fixed_value())?;
            }
            NodeType::Attribute => {
                self.attr_name(node)?;
                self.attr_opt("type", node.type_name())?;
                if let Some(use_kind) = node.use_kind()
                    && use_kind != AttributeUseKind::Optional
                {
                    self.attr("use", use_kind.as_str())?;
                }
                self.attr_opt("default", node.default_value())?;
                self.attr_opt("fixed", node.fixed_value())?;
            }
            NodeType::ComplexType => {
                self.attr_name(node)?;
                if node.mixed() {
                    self.attr("mixed", "true")?;
                }
                if node.is_abstract() {
                    self.attr("abstract", "true")?;
                }
            }
            NodeType::SimpleType => self.attr_name(node)?,
            NodeType::Sequence | NodeType::Choice | NodeType::All => self.write_occurs(node)?,
            NodeType::Group | NodeType::AttributeGroup => {
                if let Some(ref_name) = node.ref_name() {
                    self.attr("ref", &ref_name)?;
                } else {
                    self.attr_name(node)?;
                }
                if node.node_type() == NodeType::Group {
                    self.write_occurs(node)?;
                }
            }
            NodeType::Any => {
                self.attr_opt("namespace", node.namespace())?;
                self.attr_opt("processContents", node.process_contents())?;
                self.write_occurs(node)?;
            }
            NodeType::AnyAttribute => {
                self.attr_opt("namespace", node.namespace())?;
                self.attr_opt("processContents", node.process_contents())?;
            }
            NodeType::Include | NodeType::Redefine | NodeType::Override => {
                self.attr_opt("schemaLocation", node.schema_location())?;
            }
            NodeType::Import => {
                self.attr_opt("namespace", node.namespace())?;
                self.attr_opt("schemaLocation", node.schema_location())?;
            }
            NodeType::Restriction | NodeType::Extension => {
                self.attr_opt("base", node.base())?;
            }
            NodeType::Facet => {
                let value = node.facet_value().unwrap_or_default();
                if node.facet_kind() == Some(FacetKind::Assertion) {
                    self.attr("test", &value)?;
                } else {
                    self.attr("value", &value)?;
                }
            }
            NodeType::List => self.attr_opt("itemType", node.item_type())?,
            NodeType::Union => {
                let members = node.member_types();
                if !members.is_empty() {
                    self.attr("memberTypes", &members.join(" "))?;
                }
            }
            NodeType::Key | NodeType::Unique => self.attr_name(node)?,
            NodeType::Keyref => {
                self.attr_name(node)?;
                self.attr_opt("refer", node.refer())?;
            }
            NodeType::Selector | NodeType::Field => {
                if let Some(xpath) = node.xpath() {
                    self.attr("xpath", xpath.value())?;
                }
            }
            NodeType::Assert => self.attr_opt("test", node.test())?,
            NodeType::Alternative => {
                self.attr_opt("test", node.test())?;
                self.attr_opt("type", node.type_attribute())?;
            }
            NodeType::OpenContent => {
                if let Some(mode) = node.open_content_mode() {
                    self.attr("mode", mode.as_str())?;
                }
            }
        }
        Ok(())
    }
}

/// Elementname im XS-Namespace pro Variante.
fn tag_for(node: &SchemaNode) -> Result<&'static str> {
    Ok(match node.node_type() {
        NodeType::Schema => {
            return Err(Error::SerializeError(
                "schema node nested below the root".to_string(),
            ));
        }
        NodeType::Element => "element",
        NodeType::Attribute => "attribute",
        NodeType::ComplexType => "complexType",
        NodeType::SimpleType => "simpleType",
        NodeType::Sequence => "sequence",
        NodeType::Choice => "choice",
        NodeType::All => "all",
        NodeType::Group => "group",
        NodeType::AttributeGroup => "attributeGroup",
        NodeType::Any => "any",
        NodeType::AnyAttribute => "anyAttribute",
        NodeType::Include => "include",
        NodeType::Import => "import",
        NodeType::Redefine => "redefine",
        NodeType::Override => "override",
        NodeType::Restriction => "restriction",
        NodeType::Extension => "extension",
        NodeType::Facet => node
            .facet_kind()
            .map(FacetKind::tag)
            .unwrap_or("enumeration"),
        NodeType::List => "list",
        NodeType::Union => "union",
        NodeType::Key => "key",
        NodeType::Keyref => "keyref",
        NodeType::Unique => "unique",
        NodeType::Selector => "selector",
        NodeType::Field => "field",
        NodeType::Assert => "assert",
        NodeType::Alternative => "alternative",
        NodeType::OpenContent => "openContent",
    })
}
