//! Provenienz-Metadaten: welche physische Datei hat einen Knoten erzeugt.
//!
//! Jeder Knoten, der beim Aufbau des zusammengeführten Baums entsteht,
//! trägt ein [`IncludeSourceInfo`]. Der Multi-File-Serializer gruppiert
//! Top-Level-Knoten später ausschließlich anhand dieser Metadaten wieder
//! in ihre Ursprungsdateien.

use std::path::{Path, PathBuf};

use crate::node::{NodeId, SchemaNode};

/// Herkunft eines Knotens: Hauptdokument oder eingebundene Datei.
///
/// Ersetzt das Paar sich gegenseitig ausschließender Booleans
/// (`isMainSchema`/`isFromInclude`) durch einen geschlossenen Enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceOrigin {
    /// Knoten stammt aus dem ursprünglich angeforderten Dokument.
    MainSchema,
    /// Knoten wurde über xs:include/xs:import/xs:redefine/xs:override
    /// aus einer anderen Datei eingezogen.
    Include,
}

/// Unveränderliches Wertobjekt: Datei-Herkunft eines Schema-Knotens.
///
/// Zwei Instanzen sind genau dann gleich, wenn alle vier Felder gleich
/// sind; Hash ist damit konsistent (derived).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeSourceInfo {
    /// Absoluter Pfad des physischen Dokuments, das den Knoten definiert.
    source_file: PathBuf,
    /// Hauptdokument oder Include.
    origin: SourceOrigin,
    /// Der literale schemaLocation-Wert, über den die Datei eingezogen
    /// wurde (None für das Hauptdokument).
    schema_location: Option<String>,
    /// Id des include/import-Knotens, der die Datei eingezogen hat
    /// (None für das Hauptdokument oder wenn nicht verfügbar).
    include_node_id: Option<NodeId>,
}

impl IncludeSourceInfo {
    /// Herkunft für Knoten aus dem Hauptdokument.
    ///
    /// `is_main_schema()` ist true, alle Include-Felder sind None.
    pub fn for_main_schema(path: impl Into<PathBuf>) -> Self {
        Self {
            source_file: path.into(),
            origin: SourceOrigin::MainSchema,
            schema_location: None,
            include_node_id: None,
        }
    }

    /// Herkunft für Knoten aus einer eingebundenen Datei.
    ///
    /// `include_node` ist die Direktive, die die Datei eingezogen hat;
    /// ihre Id wird übernommen, falls vorhanden.
    pub fn for_included_schema(
        path: impl Into<PathBuf>,
        location: impl Into<String>,
        include_node: Option<&SchemaNode>,
    ) -> Self {
        Self {
            source_file: path.into(),
            origin: SourceOrigin::Include,
            schema_location: Some(location.into()),
            include_node_id: include_node.map(SchemaNode::id),
        }
    }

    /// True wenn der Knoten aus dem Hauptdokument stammt.
    pub fn is_main_schema(&self) -> bool {
        self.origin == SourceOrigin::MainSchema
    }

    /// True wenn der Knoten über eine Direktive eingezogen wurde.
    pub fn is_from_include(&self) -> bool {
        self.origin == SourceOrigin::Include
    }

    /// Pfad des physischen Dokuments.
    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Der literale schemaLocation-Wert (None für das Hauptdokument).
    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }

    /// Id der verantwortlichen Direktive (None für das Hauptdokument).
    pub fn include_node_id(&self) -> Option<NodeId> {
        self.include_node_id
    }

    /// Kopie mit ausgetauschtem Dateipfad; der Empfänger bleibt unverändert.
    #[must_use]
    pub fn with_source_file(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            source_file: path.into(),
            ..self.clone()
        }
    }

    /// Kopie, die den Knoten dem Hauptdokument unter `path` zuordnet.
    ///
    /// Include-Felder werden geleert; der Empfänger bleibt unverändert.
    #[must_use]
    pub fn move_to_main_schema(&self, path: impl Into<PathBuf>) -> Self {
        Self::for_main_schema(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(info: &IncludeSourceInfo) -> u64 {
        let mut h = DefaultHasher::new();
        info.hash(&mut h);
        h.finish()
    }

    #[test]
    fn main_schema_factory() {
        let info = IncludeSourceInfo::for_main_schema("/tmp/main.xsd");
        assert!(info.is_main_schema());
        assert!(!info.is_from_include());
        assert_eq!(info.schema_location(), None);
        assert_eq!(info.include_node_id(), None);
    }

    #[test]
    fn included_schema_factory_without_node() {
        let info = IncludeSourceInfo::for_included_schema("/tmp/types.xsd", "types.xsd", None);
        assert!(info.is_from_include());
        assert_eq!(info.schema_location(), Some("types.xsd"));
        assert_eq!(info.include_node_id(), None);
    }

    /// Gleiche Felder ⇒ gleich und hash-gleich.
    #[test]
    fn equality_and_hash_consistent() {
        let a = IncludeSourceInfo::for_main_schema("/tmp/main.xsd");
        let b = IncludeSourceInfo::for_main_schema("/tmp/main.xsd");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    /// Main vs. Include auf demselben Pfad sind nie gleich.
    #[test]
    fn origin_distinguishes() {
        let main = IncludeSourceInfo::for_main_schema("/tmp/a.xsd");
        let inc = IncludeSourceInfo::for_included_schema("/tmp/a.xsd", "a.xsd", None);
        assert_ne!(main, inc);
    }

    /// with_source_file ist eine reine Funktion.
    #[test]
    fn with_source_file_does_not_mutate() {
        let orig = IncludeSourceInfo::for_included_schema("/tmp/a.xsd", "a.xsd", None);
        let moved = orig.with_source_file("/tmp/b.xsd");
        assert_eq!(orig.source_file(), Path::new("/tmp/a.xsd"));
        assert_eq!(moved.source_file(), Path::new("/tmp/b.xsd"));
        assert_eq!(moved.schema_location(), Some("a.xsd"));
    }

    #[test]
    fn move_to_main_schema_clears_include_fields() {
        let orig = IncludeSourceInfo::for_included_schema("/tmp/a.xsd", "a.xsd", None);
        let moved = orig.move_to_main_schema("/tmp/merged.xsd");
        assert!(moved.is_main_schema());
        assert_eq!(moved.schema_location(), None);
        assert_eq!(moved.include_node_id(), None);
        assert!(orig.is_from_include());
    }
}
