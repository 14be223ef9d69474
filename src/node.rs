//! Knotenmodell: ein veränderlicher, beobachtbarer XSD-Baum.
//!
//! Jedes XSD-Konstrukt ist ein [`SchemaNode`]: ein billig klonbares Handle
//! (`Rc<RefCell<...>>`) auf die eigentlichen Knotendaten. Gemeinsame Felder
//! (id, name, parent, children, documentation, occurs, source_info) liegen
//! in einem Struct; konstrukt-spezifische Daten in einem geschlossenen
//! Payload-Enum mit einer Variante pro Konstrukt.
//!
//! Eigentum und Rückverweise:
//! - `children` besitzen ihre Knoten (Rc im Vec).
//! - `parent` ist ein nicht-besitzender Weak-Verweis; ein entfernter
//!   Knoten hat parent=None. Keine Rc-Zyklen.
//!
//! Das Modell ist single-threaded; nur der Id-Zähler ist atomar, damit
//! Ids prozessweit eindeutig bleiben und nie wiederverwendet werden.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::listener::{ChangeEvent, ListenerFn, ListenerId, ListenerList};
use crate::source_info::IncludeSourceInfo;

/// Prozessweit eindeutige Knoten-Id.
pub type NodeId = u64;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Vergibt die nächste Knoten-Id. Ids werden nie wiederverwendet.
fn next_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// Wertetypen
// ============================================================================

/// maxOccurs-Constraint (XSD 1.0 Part 1 §3.9.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxOccurs {
    /// Endliche Obergrenze.
    Bounded(usize),
    /// maxOccurs="unbounded".
    Unbounded,
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Bounded(1)
    }
}

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Form-Default für Elemente und Attribute (elementFormDefault /
/// attributeFormDefault am xs:schema).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormDefault {
    #[default]
    Unqualified,
    Qualified,
}

impl FormDefault {
    /// Attributwert wie er im Dokument steht.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unqualified => "unqualified",
            Self::Qualified => "qualified",
        }
    }

    pub(crate) fn from_attr(value: &str) -> Self {
        if value == "qualified" {
            Self::Qualified
        } else {
            Self::Unqualified
        }
    }
}

/// use-Attribut einer Attribut-Deklaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeUseKind {
    #[default]
    Optional,
    Required,
    Prohibited,
}

impl AttributeUseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optional => "optional",
            Self::Required => "required",
            Self::Prohibited => "prohibited",
        }
    }

    pub(crate) fn from_attr(value: &str) -> Self {
        match value {
            "required" => Self::Required,
            "prohibited" => Self::Prohibited,
            _ => Self::Optional,
        }
    }
}

/// mode-Attribut von xs:openContent (XSD 1.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenContentMode {
    None,
    #[default]
    Interleave,
    Suffix,
}

impl OpenContentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Interleave => "interleave",
            Self::Suffix => "suffix",
        }
    }

    pub(crate) fn from_attr(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "suffix" => Self::Suffix,
            _ => Self::Interleave,
        }
    }
}

/// Inhaltsmodell-Wrapper eines ComplexType: xs:simpleContent oder
/// xs:complexContent. None wenn das Kompositor-Modell direkt im Typ steht.
///
/// Wird beim Parsen gemerkt, damit die Serialisierung den gleichen
/// Wrapper wieder emittiert (strukturelle Inverse).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentModel {
    SimpleContent,
    ComplexContent,
}

/// Art eines Facets (XSD 1.0 Part 2 §4.3, XSD 1.1 assertion/explicitTimezone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    Length,
    MinLength,
    MaxLength,
    Pattern,
    Enumeration,
    WhiteSpace,
    MinInclusive,
    MinExclusive,
    MaxInclusive,
    MaxExclusive,
    TotalDigits,
    FractionDigits,
    /// XSD 1.1 xs:assertion Facet; der Wert ist der test-Ausdruck.
    Assertion,
    /// XSD 1.1 xs:explicitTimezone.
    ExplicitTimezone,
}

impl FacetKind {
    /// Elementname des Facets im XS-Namespace.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Pattern => "pattern",
            Self::Enumeration => "enumeration",
            Self::WhiteSpace => "whiteSpace",
            Self::MinInclusive => "minInclusive",
            Self::MinExclusive => "minExclusive",
            Self::MaxInclusive => "maxInclusive",
            Self::MaxExclusive => "maxExclusive",
            Self::TotalDigits => "totalDigits",
            Self::FractionDigits => "fractionDigits",
            Self::Assertion => "assertion",
            Self::ExplicitTimezone => "explicitTimezone",
        }
    }

    /// Inverse von [`FacetKind::tag`]; None für unbekannte Elementnamen.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "length" => Self::Length,
            "minLength" => Self::MinLength,
            "maxLength" => Self::MaxLength,
            "pattern" => Self::Pattern,
            "enumeration" => Self::Enumeration,
            "whiteSpace" => Self::WhiteSpace,
            "minInclusive" => Self::MinInclusive,
            "minExclusive" => Self::MinExclusive,
            "maxInclusive" => Self::MaxInclusive,
            "maxExclusive" => Self::MaxExclusive,
            "totalDigits" => Self::TotalDigits,
            "fractionDigits" => Self::FractionDigits,
            "assertion" => Self::Assertion,
            "explicitTimezone" => Self::ExplicitTimezone,
            _ => return None,
        })
    }
}

/// XPath-Ausdruck eines Selectors oder Fields.
///
/// Wertobjekt mit struktureller Gleichheit: zwei Ausdrücke sind gleich,
/// wenn ihr Text gleich ist; Hash ist damit konsistent (derived).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XPathExpr {
    value: String,
}

impl XPathExpr {
    /// Erstellt einen Ausdruck. Ein leerer (oder nur aus Whitespace
    /// bestehender) Ausdruck schlägt sofort fehl, nicht erst bei der
    /// ersten Verwendung.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::MissingXPath);
        }
        Ok(Self { value })
    }

    /// Der Ausdruckstext.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for XPathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ============================================================================
// NodeType + NodePayload
// ============================================================================

/// Diskriminator eines Knotens, unveränderlich ab Konstruktion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Schema,
    Element,
    Attribute,
    ComplexType,
    SimpleType,
    Sequence,
    Choice,
    All,
    Group,
    AttributeGroup,
    Any,
    AnyAttribute,
    Include,
    Import,
    Redefine,
    Override,
    Restriction,
    Extension,
    Facet,
    List,
    Union,
    Key,
    Keyref,
    Unique,
    Selector,
    Field,
    Assert,
    Alternative,
    OpenContent,
}

/// Konstrukt-spezifische Daten, eine Variante pro XSD-Konstrukt.
#[derive(Debug, Clone)]
pub enum NodePayload {
    /// Wurzel eines geparsten Dokuments.
    Schema {
        /// Pfad des Hauptdokuments (None bei String-Parse oder
        /// programmatisch gebauten Bäumen).
        main_schema_path: Option<PathBuf>,
        target_namespace: Option<String>,
        element_form_default: FormDefault,
        attribute_form_default: FormDefault,
    },
    Element {
        type_name: Option<String>,
        ref_name: Option<String>,
        nillable: bool,
        default_value: Option<String>,
        fixed_value: Option<String>,
    },
    Attribute {
        type_name: Option<String>,
        use_kind: AttributeUseKind,
        default_value: Option<String>,
        fixed_value: Option<String>,
    },
    ComplexType {
        mixed: bool,
        abstract_: bool,
        /// simpleContent/complexContent-Wrapper, falls vorhanden.
        content_model: Option<ContentModel>,
    },
    SimpleType,
    Sequence,
    Choice,
    /// Kompositor mit festem Namen "all".
    All,
    Group {
        ref_name: Option<String>,
    },
    AttributeGroup {
        ref_name: Option<String>,
    },
    Any {
        namespace: Option<String>,
        process_contents: Option<String>,
    },
    AnyAttribute {
        namespace: Option<String>,
        process_contents: Option<String>,
    },
    Include {
        schema_location: String,
    },
    Import {
        schema_location: Option<String>,
        namespace: Option<String>,
    },
    Redefine {
        schema_location: String,
    },
    Override {
        schema_location: String,
    },
    Restriction {
        base: Option<String>,
    },
    Extension {
        base: Option<String>,
    },
    Facet {
        kind: FacetKind,
        value: String,
    },
    /// Ableitung mit festem Namen "list".
    List {
        item_type: Option<String>,
    },
    Union {
        /// memberTypes in Dokumentreihenfolge.
        member_types: Vec<String>,
    },
    Key,
    Keyref {
        refer: Option<String>,
    },
    Unique,
    Selector {
        xpath: XPathExpr,
    },
    Field {
        xpath: XPathExpr,
    },
    Assert {
        test: Option<String>,
    },
    Alternative {
        test: Option<String>,
        type_attribute: Option<String>,
    },
    OpenContent {
        mode: OpenContentMode,
    },
}

impl NodePayload {
    /// Diskriminator der Variante.
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Schema { .. } => NodeType::Schema,
            Self::Element { .. } => NodeType::Element,
            Self::Attribute { .. } => NodeType::Attribute,
            Self::ComplexType { .. } => NodeType::ComplexType,
            Self::SimpleType => NodeType::SimpleType,
            Self::Sequence => NodeType::Sequence,
            Self::Choice => NodeType::Choice,
            Self::All => NodeType::All,
            Self::Group { .. } => NodeType::Group,
            Self::AttributeGroup { .. } => NodeType::AttributeGroup,
            Self::Any { .. } => NodeType::Any,
            Self::AnyAttribute { .. } => NodeType::AnyAttribute,
            Self::Include { .. } => NodeType::Include,
            Self::Import { .. } => NodeType::Import,
            Self::Redefine { .. } => NodeType::Redefine,
            Self::Override { .. } => NodeType::Override,
            Self::Restriction { .. } => NodeType::Restriction,
            Self::Extension { .. } => NodeType::Extension,
            Self::Facet { .. } => NodeType::Facet,
            Self::List { .. } => NodeType::List,
            Self::Union { .. } => NodeType::Union,
            Self::Key => NodeType::Key,
            Self::Keyref { .. } => NodeType::Keyref,
            Self::Unique => NodeType::Unique,
            Self::Selector { .. } => NodeType::Selector,
            Self::Field { .. } => NodeType::Field,
            Self::Assert { .. } => NodeType::Assert,
            Self::Alternative { .. } => NodeType::Alternative,
            Self::OpenContent { .. } => NodeType::OpenContent,
        }
    }
}

// ============================================================================
// NodeData + SchemaNode
// ============================================================================

/// Die eigentlichen Knotendaten hinter dem Handle.
struct NodeData {
    id: NodeId,
    name: String,
    payload: NodePayload,
    parent: Option<Weak<RefCell<NodeData>>>,
    children: Vec<SchemaNode>,
    documentation: Option<String>,
    appinfo: Option<String>,
    min_occurs: usize,
    max_occurs: MaxOccurs,
    source_info: Option<IncludeSourceInfo>,
    listeners: ListenerList,
}

/// Handle auf einen Knoten des Schema-Baums.
///
/// Clone teilt den Knoten (Rc); eine unabhängige Kopie liefert
/// [`SchemaNode::deep_copy`]. Gleichheit ist Handle-Identität.
#[derive(Clone)]
pub struct SchemaNode {
    data: Rc<RefCell<NodeData>>,
}

impl SchemaNode {
    /// Erstellt einen Knoten mit Namen und Payload.
    pub fn new(name: impl Into<String>, payload: NodePayload) -> Self {
        Self {
            data: Rc::new(RefCell::new(NodeData {
                id: next_node_id(),
                name: name.into(),
                payload,
                parent: None,
                children: Vec::new(),
                documentation: None,
                appinfo: None,
                min_occurs: 1,
                max_occurs: MaxOccurs::default(),
                source_info: None,
                listeners: ListenerList::new(),
            })),
        }
    }

    // ------------------------------------------------------------------
    // Convenience-Konstruktoren für häufige Varianten
    // ------------------------------------------------------------------

    /// Leere Schema-Wurzel ohne Dateipfad.
    pub fn schema() -> Self {
        Self::new(
            "",
            NodePayload::Schema {
                main_schema_path: None,
                target_namespace: None,
                element_form_default: FormDefault::default(),
                attribute_form_default: FormDefault::default(),
            },
        )
    }

    /// Element-Deklaration.
    pub fn element(name: impl Into<String>) -> Self {
        Self::new(
            name,
            NodePayload::Element {
                type_name: None,
                ref_name: None,
                nillable: false,
                default_value: None,
                fixed_value: None,
            },
        )
    }

    /// Attribut-Deklaration.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::new(
            name,
            NodePayload::Attribute {
                type_name: None,
                use_kind: AttributeUseKind::default(),
                default_value: None,
                fixed_value: None,
            },
        )
    }

    /// Complex-Type-Definition.
    pub fn complex_type(name: impl Into<String>) -> Self {
        Self::new(
            name,
            NodePayload::ComplexType {
                mixed: false,
                abstract_: false,
                content_model: None,
            },
        )
    }

    /// Simple-Type-Definition.
    pub fn simple_type(name: impl Into<String>) -> Self {
        Self::new(name, NodePayload::SimpleType)
    }

    pub fn sequence() -> Self {
        Self::new("sequence", NodePayload::Sequence)
    }

    pub fn choice() -> Self {
        Self::new("choice", NodePayload::Choice)
    }

    pub fn all() -> Self {
        Self::new("all", NodePayload::All)
    }

    /// xs:include-Direktive.
    pub fn include(schema_location: impl Into<String>) -> Self {
        Self::new(
            "include",
            NodePayload::Include {
                schema_location: schema_location.into(),
            },
        )
    }

    /// xs:import-Direktive.
    pub fn import(schema_location: Option<String>, namespace: Option<String>) -> Self {
        Self::new(
            "import",
            NodePayload::Import {
                schema_location,
                namespace,
            },
        )
    }

    /// Facet mit Art und Wert.
    pub fn facet(kind: FacetKind, value: impl Into<String>) -> Self {
        Self::new(
            kind.tag(),
            NodePayload::Facet {
                kind,
                value: value.into(),
            },
        )
    }

    /// Selector eines Identity-Constraints. Schlägt bei leerem XPath
    /// sofort fehl.
    pub fn selector(xpath: impl Into<String>) -> Result<Self> {
        Ok(Self::new(
            "selector",
            NodePayload::Selector {
                xpath: XPathExpr::new(xpath)?,
            },
        ))
    }

    /// Field eines Identity-Constraints. Schlägt bei leerem XPath
    /// sofort fehl.
    pub fn field(xpath: impl Into<String>) -> Result<Self> {
        Ok(Self::new(
            "field",
            NodePayload::Field {
                xpath: XPathExpr::new(xpath)?,
            },
        ))
    }

    // ------------------------------------------------------------------
    // Gemeinsame Lese-Accessoren
    // ------------------------------------------------------------------

    /// Prozessweit eindeutige, unveränderliche Id.
    pub fn id(&self) -> NodeId {
        self.data.borrow().id
    }

    /// Diskriminator, fixiert bei Konstruktion.
    pub fn node_type(&self) -> NodeType {
        self.data.borrow().payload.node_type()
    }

    /// True für Varianten mit festem Namen ("all", "list").
    pub fn has_fixed_name(&self) -> bool {
        matches!(self.node_type(), NodeType::All | NodeType::List)
    }

    /// Name des Knotens. Varianten mit festem Namen melden immer ihre
    /// Konstante, unabhängig vom gespeicherten Wert.
    pub fn name(&self) -> String {
        match self.node_type() {
            NodeType::All => "all".to_string(),
            NodeType::List => "list".to_string(),
            _ => self.data.borrow().name.clone(),
        }
    }

    /// Elternknoten, None für eine Baumwurzel oder entfernte Knoten.
    pub fn parent(&self) -> Option<SchemaNode> {
        let weak = self.data.borrow().parent.clone()?;
        weak.upgrade().map(|data| SchemaNode { data })
    }

    /// Kinder in Einfügereihenfolge (Handles, keine Kopien).
    pub fn children(&self) -> Vec<SchemaNode> {
        self.data.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.data.borrow().children.len()
    }

    pub fn documentation(&self) -> Option<String> {
        self.data.borrow().documentation.clone()
    }

    pub fn appinfo(&self) -> Option<String> {
        self.data.borrow().appinfo.clone()
    }

    pub fn min_occurs(&self) -> usize {
        self.data.borrow().min_occurs
    }

    pub fn max_occurs(&self) -> MaxOccurs {
        self.data.borrow().max_occurs
    }

    pub fn source_info(&self) -> Option<IncludeSourceInfo> {
        self.data.borrow().source_info.clone()
    }

    /// Dateipfad aus der Provenienz, falls vorhanden.
    pub fn source_file(&self) -> Option<PathBuf> {
        self.data
            .borrow()
            .source_info
            .as_ref()
            .map(|si| si.source_file().to_path_buf())
    }

    // ------------------------------------------------------------------
    // Gemeinsame Mutatoren (feuern Property-Events)
    // ------------------------------------------------------------------

    /// Setzt den Namen. No-op für Varianten mit festem Namen.
    pub fn set_name(&self, name: impl Into<String>) {
        if self.has_fixed_name() {
            return;
        }
        let new = name.into();
        let old = {
            let mut data = self.data.borrow_mut();
            if data.name == new {
                return;
            }
            std::mem::replace(&mut data.name, new.clone())
        };
        self.fire_property("name", Some(old), Some(new));
    }

    pub fn set_documentation(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            if data.documentation == new {
                return;
            }
            std::mem::replace(&mut data.documentation, new.clone())
        };
        self.fire_property("documentation", old, new);
    }

    pub fn set_appinfo(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            if data.appinfo == new {
                return;
            }
            std::mem::replace(&mut data.appinfo, new.clone())
        };
        self.fire_property("appinfo", old, new);
    }

    pub fn set_min_occurs(&self, value: usize) {
        let old = {
            let mut data = self.data.borrow_mut();
            if data.min_occurs == value {
                return;
            }
            std::mem::replace(&mut data.min_occurs, value)
        };
        self.fire_property("minOccurs", Some(old.to_string()), Some(value.to_string()));
    }

    pub fn set_max_occurs(&self, value: MaxOccurs) {
        let old = {
            let mut data = self.data.borrow_mut();
            if data.max_occurs == value {
                return;
            }
            std::mem::replace(&mut data.max_occurs, value)
        };
        self.fire_property("maxOccurs", Some(old.to_string()), Some(value.to_string()));
    }

    pub fn set_source_info(&self, info: Option<IncludeSourceInfo>) {
        let old = {
            let mut data = self.data.borrow_mut();
            if data.source_info == info {
                return;
            }
            std::mem::replace(&mut data.source_info, info.clone())
        };
        self.fire_property(
            "sourceInfo",
            old.map(|si| si.source_file().display().to_string()),
            info.map(|si| si.source_file().display().to_string()),
        );
    }

    // ------------------------------------------------------------------
    // Struktur: Kinder verwalten
    // ------------------------------------------------------------------

    /// Hängt ein Kind ans Ende. Ein bereits eingehängtes Kind wird vorher
    /// aus seinem alten Elternknoten gelöst (höchstens ein Besitzer).
    pub fn add_child(&self, child: &SchemaNode) {
        self.insert_child(self.child_count(), child);
    }

    /// Fügt ein Kind an Position `index` ein (geklemmt auf die Listenlänge).
    pub fn insert_child(&self, index: usize, child: &SchemaNode) {
        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(child);
        }
        {
            let mut data = self.data.borrow_mut();
            let index = index.min(data.children.len());
            data.children.insert(index, child.clone());
        }
        child.data.borrow_mut().parent = Some(Rc::downgrade(&self.data));
        self.fire_children();
    }

    /// Entfernt ein Kind (Handle-Identität). Der entfernte Knoten hat
    /// danach parent=None. Gibt false zurück, wenn der Knoten kein Kind
    /// dieses Knotens ist.
    pub fn remove_child(&self, child: &SchemaNode) -> bool {
        let removed = {
            let mut data = self.data.borrow_mut();
            let before = data.children.len();
            data.children.retain(|c| !Rc::ptr_eq(&c.data, &child.data));
            data.children.len() != before
        };
        if removed {
            child.data.borrow_mut().parent = None;
            self.fire_children();
        }
        removed
    }

    // ------------------------------------------------------------------
    // Listener
    // ------------------------------------------------------------------

    /// Registriert einen Callback für Änderungen an diesem Knoten.
    pub fn subscribe(&self, callback: ListenerFn) -> ListenerId {
        self.data.borrow().listeners.subscribe(callback)
    }

    /// Meldet einen Callback ab; er erhält keine weiteren Events.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.data.borrow().listeners.unsubscribe(id)
    }

    fn fire_property(&self, property: &'static str, old: Option<String>, new: Option<String>) {
        // Listener-Liste herausklonen, damit die Zustellung ohne
        // geborgten Knoten läuft.
        let listeners = self.data.borrow().listeners.clone();
        listeners.dispatch(&ChangeEvent::Property { property, old, new });
    }

    fn fire_children(&self) {
        let listeners = self.data.borrow().listeners.clone();
        listeners.dispatch(&ChangeEvent::Children);
    }

    // ------------------------------------------------------------------
    // Deep Copy
    // ------------------------------------------------------------------

    /// Vollständig unabhängige Kopie des Teilbaums.
    ///
    /// Alle Knoten erhalten frische Ids, Kinder werden rekursiv kopiert
    /// und an die Kopie gehängt, Listener werden nicht übernommen. Nur
    /// die Wurzel der Kopie erhält `suffix` an den Namen, und nur wenn
    /// die Variante einen veränderlichen Namen hat; Nachfahren behalten
    /// ihre Namen unverändert.
    pub fn deep_copy(&self, suffix: &str) -> SchemaNode {
        self.copy_subtree(suffix, true)
    }

    fn copy_subtree(&self, suffix: &str, is_root: bool) -> SchemaNode {
        let (name, payload, documentation, appinfo, min_occurs, max_occurs, source_info, children) = {
            let data = self.data.borrow();
            (
                data.name.clone(),
                data.payload.clone(),
                data.documentation.clone(),
                data.appinfo.clone(),
                data.min_occurs,
                data.max_occurs,
                data.source_info.clone(),
                data.children.clone(),
            )
        };

        let name = if is_root && !self.has_fixed_name() {
            format!("{name}{suffix}")
        } else {
            name
        };

        let copy = SchemaNode::new(name, payload);
        {
            let mut data = copy.data.borrow_mut();
            data.documentation = documentation;
            data.appinfo = appinfo;
            data.min_occurs = min_occurs;
            data.max_occurs = max_occurs;
            data.source_info = source_info;
        }
        for child in children {
            copy.add_child(&child.copy_subtree("", false));
        }
        copy
    }

    // ------------------------------------------------------------------
    // Payload-Accessoren
    // ------------------------------------------------------------------

    /// schemaLocation einer Direktive (include/import/redefine/override).
    pub fn schema_location(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Include { schema_location }
            | NodePayload::Redefine { schema_location }
            | NodePayload::Override { schema_location } => Some(schema_location.clone()),
            NodePayload::Import {
                schema_location, ..
            } => schema_location.clone(),
            _ => None,
        }
    }

    pub fn set_schema_location(&self, location: impl Into<String>) {
        let new = location.into();
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Include { schema_location }
                | NodePayload::Redefine { schema_location }
                | NodePayload::Override { schema_location } => {
                    if *schema_location == new {
                        return;
                    }
                    Some(std::mem::replace(schema_location, new.clone()))
                }
                NodePayload::Import {
                    schema_location, ..
                } => {
                    if schema_location.as_deref() == Some(&new) {
                        return;
                    }
                    std::mem::replace(schema_location, Some(new.clone()))
                }
                _ => return,
            }
        };
        self.fire_property("schemaLocation", old, Some(new));
    }

    /// namespace-Attribut eines xs:import oder xs:any/xs:anyAttribute.
    pub fn namespace(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Import { namespace, .. }
            | NodePayload::Any { namespace, .. }
            | NodePayload::AnyAttribute { namespace, .. } => namespace.clone(),
            _ => None,
        }
    }

    /// targetNamespace der Schema-Wurzel.
    pub fn target_namespace(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Schema {
                target_namespace, ..
            } => target_namespace.clone(),
            _ => None,
        }
    }

    pub fn set_target_namespace(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Schema {
                    target_namespace, ..
                } => {
                    if *target_namespace == new {
                        return;
                    }
                    std::mem::replace(target_namespace, new.clone())
                }
                _ => return,
            }
        };
        self.fire_property("targetNamespace", old, new);
    }

    /// Pfad des Hauptdokuments (nur Schema-Wurzel).
    pub fn main_schema_path(&self) -> Option<PathBuf> {
        match &self.data.borrow().payload {
            NodePayload::Schema {
                main_schema_path, ..
            } => main_schema_path.clone(),
            _ => None,
        }
    }

    pub(crate) fn set_main_schema_path(&self, path: Option<PathBuf>) {
        if let NodePayload::Schema {
            main_schema_path, ..
        } = &mut self.data.borrow_mut().payload
        {
            *main_schema_path = path;
        }
    }

    pub fn element_form_default(&self) -> Option<FormDefault> {
        match &self.data.borrow().payload {
            NodePayload::Schema {
                element_form_default,
                ..
            } => Some(*element_form_default),
            _ => None,
        }
    }

    pub fn attribute_form_default(&self) -> Option<FormDefault> {
        match &self.data.borrow().payload {
            NodePayload::Schema {
                attribute_form_default,
                ..
            } => Some(*attribute_form_default),
            _ => None,
        }
    }

    /// type-Attribut einer Element- oder Attribut-Deklaration.
    pub fn type_name(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Element { type_name, .. }
            | NodePayload::Attribute { type_name, .. } => type_name.clone(),
            _ => None,
        }
    }

    pub fn set_type_name(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Element { type_name, .. }
                | NodePayload::Attribute { type_name, .. } => {
                    if *type_name == new {
                        return;
                    }
                    std::mem::replace(type_name, new.clone())
                }
                _ => return,
            }
        };
        self.fire_property("type", old, new);
    }

    /// ref-Attribut (Element, Group, AttributeGroup).
    pub fn ref_name(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Element { ref_name, .. }
            | NodePayload::Group { ref_name }
            | NodePayload::AttributeGroup { ref_name } => ref_name.clone(),
            _ => None,
        }
    }

    /// base-Attribut einer Restriction oder Extension.
    pub fn base(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Restriction { base } | NodePayload::Extension { base } => base.clone(),
            _ => None,
        }
    }

    pub fn set_base(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Restriction { base } | NodePayload::Extension { base } => {
                    if *base == new {
                        return;
                    }
                    std::mem::replace(base, new.clone())
                }
                _ => return,
            }
        };
        self.fire_property("base", old, new);
    }

    /// refer-Attribut eines xs:keyref.
    pub fn refer(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Keyref { refer } => refer.clone(),
            _ => None,
        }
    }

    pub fn set_refer(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Keyref { refer } => {
                    if *refer == new {
                        return;
                    }
                    std::mem::replace(refer, new.clone())
                }
                _ => return,
            }
        };
        self.fire_property("refer", old, new);
    }

    /// itemType eines xs:list.
    pub fn item_type(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::List { item_type } => item_type.clone(),
            _ => None,
        }
    }

    pub fn set_item_type(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::List { item_type } => {
                    if *item_type == new {
                        return;
                    }
                    std::mem::replace(item_type, new.clone())
                }
                _ => return,
            }
        };
        self.fire_property("itemType", old, new);
    }

    /// memberTypes eines xs:union, in Dokumentreihenfolge.
    pub fn member_types(&self) -> Vec<String> {
        match &self.data.borrow().payload {
            NodePayload::Union { member_types } => member_types.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_member_types(&self, value: Vec<String>) {
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Union { member_types } => {
                    if *member_types == value {
                        return;
                    }
                    std::mem::replace(member_types, value.clone())
                }
                _ => return,
            }
        };
        self.fire_property(
            "memberTypes",
            Some(old.join(" ")),
            Some(value.join(" ")),
        );
    }

    /// Art eines Facet-Knotens.
    pub fn facet_kind(&self) -> Option<FacetKind> {
        match &self.data.borrow().payload {
            NodePayload::Facet { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Wert eines Facet-Knotens.
    pub fn facet_value(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Facet { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn set_facet_value(&self, value: impl Into<String>) {
        let new = value.into();
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Facet { value, .. } => {
                    if *value == new {
                        return;
                    }
                    std::mem::replace(value, new.clone())
                }
                _ => return,
            }
        };
        self.fire_property("value", Some(old), Some(new));
    }

    /// test-Ausdruck eines xs:assert oder xs:alternative.
    pub fn test(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Assert { test } | NodePayload::Alternative { test, .. } => test.clone(),
            _ => None,
        }
    }

    pub fn set_test(&self, value: Option<&str>) {
        let new = value.map(str::to_owned);
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::Assert { test } | NodePayload::Alternative { test, .. } => {
                    if *test == new {
                        return;
                    }
                    std::mem::replace(test, new.clone())
                }
                _ => return,
            }
        };
        self.fire_property("test", old, new);
    }

    /// type-Attribut eines xs:alternative.
    pub fn type_attribute(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Alternative { type_attribute, .. } => type_attribute.clone(),
            _ => None,
        }
    }

    /// XPath-Ausdruck eines Selectors oder Fields.
    pub fn xpath(&self) -> Option<XPathExpr> {
        match &self.data.borrow().payload {
            NodePayload::Selector { xpath } | NodePayload::Field { xpath } => Some(xpath.clone()),
            _ => None,
        }
    }

    /// mixed-Flag eines ComplexType.
    pub fn mixed(&self) -> bool {
        match &self.data.borrow().payload {
            NodePayload::ComplexType { mixed, .. } => *mixed,
            _ => false,
        }
    }

    pub fn set_mixed(&self, value: bool) {
        let old = {
            let mut data = self.data.borrow_mut();
            match &mut data.payload {
                NodePayload::ComplexType { mixed, .. } => {
                    if *mixed == value {
                        return;
                    }
                    std::mem::replace(mixed, value)
                }
                _ => return,
            }
        };
        self.fire_property("mixed", Some(old.to_string()), Some(value.to_string()));
    }

    /// abstract-Flag eines ComplexType.
    pub fn is_abstract(&self) -> bool {
        match &self.data.borrow().payload {
            NodePayload::ComplexType { abstract_, .. } => *abstract_,
            _ => false,
        }
    }

    /// simpleContent/complexContent-Wrapper eines ComplexType.
    pub fn content_model(&self) -> Option<ContentModel> {
        match &self.data.borrow().payload {
            NodePayload::ComplexType { content_model, .. } => *content_model,
            _ => None,
        }
    }

    pub fn nillable(&self) -> bool {
        match &self.data.borrow().payload {
            NodePayload::Element { nillable, .. } => *nillable,
            _ => false,
        }
    }

    pub fn default_value(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Element { default_value, .. }
            | NodePayload::Attribute { default_value, .. } => default_value.clone(),
            _ => None,
        }
    }

    pub fn fixed_value(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Element { fixed_value, .. }
            | NodePayload::Attribute { fixed_value, .. } => fixed_value.clone(),
            _ => None,
        }
    }

    pub fn use_kind(&self) -> Option<AttributeUseKind> {
        match &self.data.borrow().payload {
            NodePayload::Attribute { use_kind, .. } => Some(*use_kind),
            _ => None,
        }
    }

    pub fn process_contents(&self) -> Option<String> {
        match &self.data.borrow().payload {
            NodePayload::Any {
                process_contents, ..
            }
            | NodePayload::AnyAttribute {
                process_contents, ..
            } => process_contents.clone(),
            _ => None,
        }
    }

    pub fn open_content_mode(&self) -> Option<OpenContentMode> {
        match &self.data.borrow().payload {
            NodePayload::OpenContent { mode } => Some(*mode),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Identity-Constraint-Navigation
    // ------------------------------------------------------------------

    /// Selector-Kind eines key/keyref/unique. Ein strukturell fehlender
    /// Selector wird toleriert und liefert None.
    pub fn selector_child(&self) -> Option<SchemaNode> {
        self.data
            .borrow()
            .children
            .iter()
            .find(|c| c.node_type() == NodeType::Selector)
            .cloned()
    }

    /// Field-Kinder eines key/keyref/unique, in Dokumentreihenfolge.
    pub fn field_children(&self) -> Vec<SchemaNode> {
        self.data
            .borrow()
            .children
            .iter()
            .filter(|c| c.node_type() == NodeType::Field)
            .cloned()
            .collect()
    }
}

/// Handle-Identität: zwei Handles sind gleich, wenn sie denselben Knoten
/// teilen. Strukturelle Gleichheit liegt auf den Wertetypen
/// ([`XPathExpr`], [`crate::IncludeSourceInfo`]).
impl PartialEq for SchemaNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for SchemaNode {}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        write!(
            f,
            "SchemaNode {{ id: {}, type: {:?}, name: {:?}, children: {} }}",
            data.id,
            data.payload.node_type(),
            data.name,
            data.children.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ChangeEvent;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = SchemaNode::element("a");
        let b = SchemaNode::element("b");
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn node_type_fixed_at_construction() {
        let n = SchemaNode::complex_type("T");
        assert_eq!(n.node_type(), NodeType::ComplexType);
    }

    /// "all" und "list" melden ihre Konstante, set_name ist no-op.
    #[test]
    fn fixed_names() {
        let all = SchemaNode::all();
        assert_eq!(all.name(), "all");
        all.set_name("something");
        assert_eq!(all.name(), "all");

        let list = SchemaNode::new("", NodePayload::List { item_type: None });
        assert_eq!(list.name(), "list");
    }

    #[test]
    fn add_child_sets_parent() {
        let parent = SchemaNode::sequence();
        let child = SchemaNode::element("item");
        parent.add_child(&child);
        assert_eq!(parent.child_count(), 1);
        assert_eq!(child.parent().unwrap(), parent);
    }

    #[test]
    fn remove_child_clears_parent() {
        let parent = SchemaNode::sequence();
        let child = SchemaNode::element("item");
        parent.add_child(&child);
        assert!(parent.remove_child(&child));
        assert_eq!(parent.child_count(), 0);
        assert!(child.parent().is_none());
        // nochmal entfernen: false
        assert!(!parent.remove_child(&child));
    }

    /// Ein Kind hat höchstens einen Besitzer: erneutes add_child hängt um.
    #[test]
    fn add_child_reparents() {
        let a = SchemaNode::sequence();
        let b = SchemaNode::sequence();
        let child = SchemaNode::element("item");
        a.add_child(&child);
        b.add_child(&child);
        assert_eq!(a.child_count(), 0);
        assert_eq!(b.child_count(), 1);
        assert_eq!(child.parent().unwrap(), b);
    }

    #[test]
    fn insert_child_keeps_order() {
        let seq = SchemaNode::sequence();
        let a = SchemaNode::element("a");
        let c = SchemaNode::element("c");
        let b = SchemaNode::element("b");
        seq.add_child(&a);
        seq.add_child(&c);
        seq.insert_child(1, &b);
        let names: Vec<String> = seq.children().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn occurs_defaults() {
        let n = SchemaNode::element("e");
        assert_eq!(n.min_occurs(), 1);
        assert_eq!(n.max_occurs(), MaxOccurs::Bounded(1));
        assert_eq!(MaxOccurs::Unbounded.to_string(), "unbounded");
    }

    #[test]
    fn property_event_on_set_name() {
        let n = SchemaNode::element("old");
        let events = Rc::new(RefCell::new(Vec::new()));
        {
            let events = events.clone();
            n.subscribe(Box::new(move |e| events.borrow_mut().push(e.clone())));
        }
        n.set_name("new");
        let seen = events.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            ChangeEvent::Property {
                property: "name",
                old: Some("old".to_string()),
                new: Some("new".to_string()),
            }
        );
    }

    /// Setter ohne Wertänderung feuern kein Event.
    #[test]
    fn no_event_when_value_unchanged() {
        let n = SchemaNode::element("same");
        let count = Rc::new(RefCell::new(0));
        {
            let count = count.clone();
            n.subscribe(Box::new(move |_| *count.borrow_mut() += 1));
        }
        n.set_name("same");
        n.set_documentation(None);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn unsubscribed_listener_gets_nothing() {
        let n = SchemaNode::element("e");
        let count = Rc::new(RefCell::new(0));
        let id = {
            let count = count.clone();
            n.subscribe(Box::new(move |_| *count.borrow_mut() += 1))
        };
        n.set_name("x");
        assert!(n.unsubscribe(id));
        n.set_name("y");
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn children_event_on_structure_change() {
        let parent = SchemaNode::sequence();
        let events = Rc::new(RefCell::new(Vec::new()));
        {
            let events = events.clone();
            parent.subscribe(Box::new(move |e| events.borrow_mut().push(e.clone())));
        }
        let child = SchemaNode::element("e");
        parent.add_child(&child);
        parent.remove_child(&child);
        assert_eq!(
            *events.borrow(),
            vec![ChangeEvent::Children, ChangeEvent::Children]
        );
    }

    #[test]
    fn deep_copy_is_independent() {
        let original = SchemaNode::complex_type("Address");
        let seq = SchemaNode::sequence();
        let street = SchemaNode::element("street");
        seq.add_child(&street);
        original.add_child(&seq);
        original.set_documentation(Some("postal address"));

        let copy = original.deep_copy("_Copy");
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.name(), "Address_Copy");
        assert_eq!(copy.documentation().as_deref(), Some("postal address"));
        assert_eq!(copy.child_count(), 1);

        // Mutation der Kopie ändert das Original nicht
        copy.set_name("Mutated");
        copy.children()[0].children()[0].set_name("renamed");
        assert_eq!(original.name(), "Address");
        assert_eq!(
            original.children()[0].children()[0].name(),
            "street"
        );
    }

    /// Nur die Wurzel der Kopie erhält das Suffix.
    #[test]
    fn deep_copy_suffix_only_on_root() {
        let outer = SchemaNode::element("outer");
        let inner = SchemaNode::element("inner");
        outer.add_child(&inner);
        let copy = outer.deep_copy("_2");
        assert_eq!(copy.name(), "outer_2");
        assert_eq!(copy.children()[0].name(), "inner");
    }

    /// Varianten mit festem Namen ignorieren das Suffix vollständig.
    #[test]
    fn deep_copy_fixed_name_ignores_suffix() {
        let all = SchemaNode::all();
        let copy = all.deep_copy("_9");
        assert_eq!(copy.name(), "all");
        assert_ne!(copy.id(), all.id());
    }

    #[test]
    fn deep_copy_fresh_ids_throughout() {
        let root = SchemaNode::sequence();
        let child = SchemaNode::element("x");
        root.add_child(&child);
        let copy = root.deep_copy("");
        assert_ne!(copy.id(), root.id());
        assert_ne!(copy.children()[0].id(), child.id());
        assert_eq!(copy.children()[0].parent().unwrap(), copy);
    }

    #[test]
    fn selector_requires_nonempty_xpath() {
        assert!(matches!(
            SchemaNode::selector(""),
            Err(Error::MissingXPath)
        ));
        assert!(matches!(SchemaNode::field("   "), Err(Error::MissingXPath)));
        assert!(SchemaNode::selector(".//item").is_ok());
    }

    #[test]
    fn xpath_structural_equality() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = XPathExpr::new("@id").unwrap();
        let b = XPathExpr::new("@id").unwrap();
        assert_eq!(a, b);
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
        assert_ne!(a, XPathExpr::new("@name").unwrap());
    }

    /// Fehlender Selector wird toleriert: Accessor liefert None.
    #[test]
    fn missing_selector_is_none() {
        let keyref = SchemaNode::new("ref", NodePayload::Keyref { refer: None });
        assert!(keyref.selector_child().is_none());
        assert!(keyref.field_children().is_empty());
    }

    #[test]
    fn identity_constraint_navigation() {
        let key = SchemaNode::new("pk", NodePayload::Key);
        key.add_child(&SchemaNode::selector(".//row").unwrap());
        key.add_child(&SchemaNode::field("@id").unwrap());
        key.add_child(&SchemaNode::field("@version").unwrap());
        assert_eq!(
            key.selector_child().unwrap().xpath().unwrap().value(),
            ".//row"
        );
        assert_eq!(key.field_children().len(), 2);
    }

    #[test]
    fn facet_kind_tag_roundtrip() {
        for kind in [
            FacetKind::Length,
            FacetKind::Pattern,
            FacetKind::Enumeration,
            FacetKind::MinInclusive,
            FacetKind::MaxExclusive,
            FacetKind::Assertion,
        ] {
            assert_eq!(FacetKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(FacetKind::from_tag("sequence"), None);
    }

    #[test]
    fn handle_equality_is_identity() {
        let a = SchemaNode::element("same");
        let b = SchemaNode::element("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
