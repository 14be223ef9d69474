//! Auflösung von xs:include/xs:import/xs:redefine/xs:override.
//!
//! Zieht alle transitiv eingebundenen Dateien in einen einzigen Baum:
//! die Top-Level-Kinder jeder Datei werden in Dokumentreihenfolge in die
//! Kindliste der Schema-Wurzel geflacht, die Direktiven-Knoten selbst
//! bleiben an ihrer Position erhalten. Jeder erzeugte Knoten (samt
//! Nachfahren) wird mit [`IncludeSourceInfo`] gestempelt, damit der
//! Multi-File-Serializer die ursprüngliche Dateiaufteilung allein aus
//! der Provenienz rekonstruieren kann.
//!
//! Zyklen-Politik:
//! - Eine bereits vollständig geladene Datei wird still übersprungen
//!   (wiederholte identische Includes, Diamant-Layouts).
//! - Eine Datei, die sich noch auf dem Auflösungs-Stack befindet, ist
//!   ein echter Zyklus und lässt den Parse fehlschlagen.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use roxmltree::Node;

use crate::FastHashSet;
use crate::error::{Error, Result};
use crate::node::{NodeType, SchemaNode};
use crate::source_info::IncludeSourceInfo;

use super::{
    XS_NS, apply_annotation, build_node, build_schema_root, ensure_schema_root, is_directive,
    parse_document, read_schema_file,
};

/// Datei-Parse mit transitiver Include-Auflösung.
pub(super) fn parse_with_includes(path: &Path) -> Result<SchemaNode> {
    let mut resolver = IncludeResolver::new();
    resolver.parse_main(path)
}

/// Zustand der rekursiven Auflösung.
struct IncludeResolver {
    /// Vollständig geladene Dateien (kanonische Pfade).
    loaded: FastHashSet<PathBuf>,
    /// Dateien, deren Auflösung gerade läuft; Stack für Zyklen-Erkennung.
    in_progress: Vec<PathBuf>,
}

impl IncludeResolver {
    fn new() -> Self {
        Self {
            loaded: FastHashSet::default(),
            in_progress: Vec::new(),
        }
    }

    fn parse_main(&mut self, path: &Path) -> Result<SchemaNode> {
        let canonical = canonicalize(path)?;
        let content = read_schema_file(&canonical)?;
        let doc = parse_document(&content)?;
        let root = doc.root_element();

        let schema = build_schema_root(&root)?;
        schema.set_main_schema_path(Some(canonical.clone()));
        apply_annotation(&root, &schema);

        let stamp = IncludeSourceInfo::for_main_schema(&canonical);
        self.in_progress.push(canonical.clone());
        let merged = self.merge_document(&root, &schema, &canonical, &stamp);
        self.in_progress.pop();
        merged?;
        self.loaded.insert(canonical);
        Ok(schema)
    }

    /// Flacht die Top-Level-Kinder eines Dokuments in die Schema-Wurzel
    /// und verfolgt dabei angetroffene Direktiven.
    fn merge_document(
        &mut self,
        root: &Node,
        schema: &SchemaNode,
        file: &Path,
        stamp: &IncludeSourceInfo,
    ) -> Result<()> {
        for child in root
            .children()
            .filter(|n| n.is_element() && n.tag_name().namespace() == Some(XS_NS))
        {
            if child.tag_name().name() == "annotation" {
                // Dokument-Annotation liegt bereits auf der Schema-Wurzel
                continue;
            }
            let Some(node) = build_node(&child)? else {
                continue;
            };
            stamp_subtree(&node, stamp);
            schema.add_child(&node);
            if is_directive(node.node_type()) {
                self.resolve_directive(&node, file, schema)?;
            }
        }
        Ok(())
    }

    /// Verfolgt eine Direktive: Ziel-Datei auflösen, parsen, mergen.
    fn resolve_directive(
        &mut self,
        directive: &SchemaNode,
        including_file: &Path,
        schema: &SchemaNode,
    ) -> Result<()> {
        let Some(location) = directive.schema_location() else {
            // xs:import ohne schemaLocation ist zulässig
            return Ok(());
        };

        // Absolute URLs werden unverändert durchgereicht, nicht geladen.
        if location.contains("://") {
            warn!("schemaLocation '{location}' is an absolute URL, target not fetched");
            return Ok(());
        }

        let base = including_file.parent().unwrap_or(Path::new("."));
        let resolved = if Path::new(&location).is_absolute() {
            PathBuf::from(&location)
        } else {
            base.join(&location)
        };
        if !resolved.exists() {
            return Err(Error::SchemaNotFound {
                location,
                base: base.display().to_string(),
            });
        }
        let canonical = canonicalize(&resolved)?;

        if self.in_progress.contains(&canonical) {
            return Err(Error::CircularInclude(canonical.display().to_string()));
        }
        if self.loaded.contains(&canonical) {
            debug!(
                "schema '{}' already merged, skipping repeated include",
                canonical.display()
            );
            return Ok(());
        }

        let content = read_schema_file(&canonical)?;
        let doc = parse_document(&content)?;
        let root = doc.root_element();
        ensure_schema_root(&root)?;

        // xs:import darf auf einen fremden Namespace zeigen; eine Abweichung
        // zwischen namespace-Attribut und targetNamespace wird toleriert
        // und nur protokolliert.
        if directive.node_type() == NodeType::Import {
            let target_ns = root.attribute("targetNamespace").unwrap_or("");
            if let Some(expected) = directive.namespace()
                && expected != target_ns
            {
                warn!(
                    "import namespace '{expected}' does not match targetNamespace '{target_ns}' of '{}'",
                    canonical.display()
                );
            }
        }

        debug!(
            "merging '{}' pulled in via xs:{}",
            canonical.display(),
            directive.name()
        );
        let stamp = IncludeSourceInfo::for_included_schema(&canonical, &location, Some(directive));

        self.in_progress.push(canonical.clone());
        let merged = self.merge_document(&root, schema, &canonical, &stamp);
        self.in_progress.pop();
        merged?;
        self.loaded.insert(canonical);
        Ok(())
    }
}

/// Stempelt einen Knoten samt aller Nachfahren mit derselben Herkunft.
fn stamp_subtree(node: &SchemaNode, stamp: &IncludeSourceInfo) {
    node.set_source_info(Some(stamp.clone()));
    for child in node.children() {
        stamp_subtree(&child, stamp);
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| {
        Error::IoError(format!(
            "cannot resolve schema path '{}': {e}",
            path.display()
        ))
    })
}
