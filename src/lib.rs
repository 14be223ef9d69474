//! xstree – veränderliches, beobachtbares Objektmodell für XML Schema (XSD).
//!
//! Parsed ein Schema samt aller transitiv eingebundenen Dateien
//! (xs:include/xs:import/xs:redefine/xs:override) zu einem einzigen Baum,
//! merkt sich pro Knoten die physische Ursprungsdatei und serialisiert
//! den Baum zurück zu XSD-Text: als Einzeldokument oder wieder
//! aufgeteilt auf das ursprüngliche Multi-File-Layout.
//!
//! # Beispiel
//!
//! ```
//! use xstree::{parse_xsd, schema_to_string, NodeType};
//!
//! let schema = parse_xsd(r#"<?xml version="1.0" encoding="UTF-8"?>
//! <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!   <xs:element name="greeting" type="xs:string"/>
//! </xs:schema>"#).unwrap();
//!
//! let greeting = &schema.children()[0];
//! assert_eq!(greeting.node_type(), NodeType::Element);
//! assert_eq!(greeting.name(), "greeting");
//!
//! // Mutationen sind beobachtbar ...
//! greeting.subscribe(Box::new(|event| {
//!     println!("changed: {}", event.property());
//! }));
//! greeting.set_name("salutation");
//!
//! // ... und der Baum serialisiert zurück zu XSD
//! let xml = schema_to_string(&schema).unwrap();
//! assert!(xml.contains("salutation"));
//! ```

pub mod error;
pub mod listener;
pub mod node;
pub mod source_info;
pub mod xsd;
pub mod xsd_serializer;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent; für interne
/// Datenstrukturen). Nutzt hashbrown direkt.
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// HashSet mit ahash.
pub(crate) type FastHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Knotenmodell
pub use node::{
    AttributeUseKind, ContentModel, FacetKind, FormDefault, MaxOccurs, NodeId, NodePayload,
    NodeType, OpenContentMode, SchemaNode, XPathExpr,
};

// Public API: Provenienz
pub use source_info::{IncludeSourceInfo, SourceOrigin};

// Public API: Änderungs-Benachrichtigung
pub use listener::{ChangeEvent, ListenerFn, ListenerId};

// Public API: Builder + Serializer
pub use xsd::{XS_NS, XsdVersion, detect_xsd_version, parse_xsd, parse_xsd_file};
pub use xsd_serializer::{schema_to_files, schema_to_string, schema_to_writer};
