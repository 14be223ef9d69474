//! Round-Trip-Tests: parse(serialize(tree)) muss einen äquivalenten Baum
//! rekonstruieren (Serialisierung als strukturelle Inverse des Builders).

use xstree::{
    ContentModel, FacetKind, MaxOccurs, NodePayload, NodeType, SchemaNode, detect_xsd_version,
    parse_xsd, schema_to_string,
};

fn roundtrip(schema: &SchemaNode) -> SchemaNode {
    let xml = schema_to_string(schema).unwrap();
    parse_xsd(&xml).unwrap_or_else(|e| panic!("reparse failed: {e}\n{xml}"))
}

fn find_by_name(schema: &SchemaNode, name: &str) -> SchemaNode {
    schema
        .children()
        .into_iter()
        .find(|c| c.name() == name)
        .unwrap_or_else(|| panic!("node '{name}' not found"))
}

/// Dokumentation eines Typs übersteht den Round-Trip unverändert.
#[test]
fn documentation_roundtrip() {
    let schema = SchemaNode::schema();
    let ty = SchemaNode::complex_type("Documented");
    ty.set_documentation(Some("Line one with <markup> & ampersand."));
    ty.add_child(&SchemaNode::sequence());
    schema.add_child(&ty);

    let reparsed = roundtrip(&schema);
    let ty2 = find_by_name(&reparsed, "Documented");
    assert_eq!(
        ty2.documentation().as_deref(),
        Some("Line one with <markup> & ampersand.")
    );
}

#[test]
fn appinfo_roundtrip_at_node_and_type_level() {
    let schema = SchemaNode::schema();
    let ty = SchemaNode::complex_type("T");
    ty.set_appinfo(Some("render=wide"));
    let seq = SchemaNode::sequence();
    let elem = SchemaNode::element("e");
    elem.set_documentation(Some("element docs"));
    seq.add_child(&elem);
    ty.add_child(&seq);
    schema.add_child(&ty);

    let reparsed = roundtrip(&schema);
    let ty2 = find_by_name(&reparsed, "T");
    assert_eq!(ty2.appinfo().as_deref(), Some("render=wide"));
    let elem2 = &ty2.children()[0].children()[0];
    assert_eq!(elem2.documentation().as_deref(), Some("element docs"));
}

/// Facets behalten Reihenfolge und Werte.
#[test]
fn facet_order_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Zip">
    <xs:restriction base="xs:string">
      <xs:minLength value="5"/>
      <xs:pattern value="[0-9]+"/>
      <xs:enumeration value="01067"/>
      <xs:enumeration value="99998"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#,
    )
    .unwrap();

    let reparsed = roundtrip(&schema);
    let restriction = &find_by_name(&reparsed, "Zip").children()[0];
    assert_eq!(restriction.base().as_deref(), Some("xs:string"));
    let facets: Vec<(FacetKind, String)> = restriction
        .children()
        .iter()
        .map(|c| (c.facet_kind().unwrap(), c.facet_value().unwrap()))
        .collect();
    assert_eq!(
        facets,
        vec![
            (FacetKind::MinLength, "5".to_string()),
            (FacetKind::Pattern, "[0-9]+".to_string()),
            (FacetKind::Enumeration, "01067".to_string()),
            (FacetKind::Enumeration, "99998".to_string()),
        ]
    );
}

#[test]
fn occurs_roundtrip() {
    let schema = SchemaNode::schema();
    let ty = SchemaNode::complex_type("T");
    let seq = SchemaNode::sequence();
    let many = SchemaNode::element("many");
    many.set_min_occurs(0);
    many.set_max_occurs(MaxOccurs::Unbounded);
    let bounded = SchemaNode::element("bounded");
    bounded.set_max_occurs(MaxOccurs::Bounded(5));
    seq.add_child(&many);
    seq.add_child(&bounded);
    ty.add_child(&seq);
    schema.add_child(&ty);

    let reparsed = roundtrip(&schema);
    let seq2 = &find_by_name(&reparsed, "T").children()[0];
    assert_eq!(seq2.children()[0].min_occurs(), 0);
    assert_eq!(seq2.children()[0].max_occurs(), MaxOccurs::Unbounded);
    assert_eq!(seq2.children()[1].min_occurs(), 1);
    assert_eq!(seq2.children()[1].max_occurs(), MaxOccurs::Bounded(5));
}

/// Kompositoren (sequence/choice/all) mit Kindern in Originalreihenfolge.
#[test]
fn compositor_order_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="T">
    <xs:choice>
      <xs:element name="b" type="xs:string"/>
      <xs:element name="a" type="xs:string"/>
      <xs:sequence>
        <xs:element name="c" type="xs:int"/>
      </xs:sequence>
    </xs:choice>
  </xs:complexType>
  <xs:complexType name="U">
    <xs:all>
      <xs:element name="x" type="xs:string"/>
    </xs:all>
  </xs:complexType>
</xs:schema>"#,
    )
    .unwrap();

    let reparsed = roundtrip(&schema);
    let choice = &find_by_name(&reparsed, "T").children()[0];
    assert_eq!(choice.node_type(), NodeType::Choice);
    let kinds: Vec<NodeType> = choice.children().iter().map(|c| c.node_type()).collect();
    assert_eq!(
        kinds,
        vec![NodeType::Element, NodeType::Element, NodeType::Sequence]
    );
    assert_eq!(choice.children()[0].name(), "b");
    assert_eq!(choice.children()[1].name(), "a");

    let all = &find_by_name(&reparsed, "U").children()[0];
    assert_eq!(all.node_type(), NodeType::All);
    assert_eq!(all.name(), "all");
}

#[test]
fn identity_constraint_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="db">
    <xs:key name="pk"><xs:selector xpath=".//row"/><xs:field xpath="@id"/></xs:key>
    <xs:keyref name="fk" refer="pk"><xs:selector xpath=".//link"/><xs:field xpath="@target"/></xs:keyref>
    <xs:unique name="uq"><xs:selector xpath=".//row"/><xs:field xpath="@code"/><xs:field xpath="@lang"/></xs:unique>
  </xs:element>
</xs:schema>"#,
    )
    .unwrap();

    let reparsed = roundtrip(&schema);
    let db = find_by_name(&reparsed, "db");
    let kinds: Vec<NodeType> = db.children().iter().map(|c| c.node_type()).collect();
    assert_eq!(kinds, vec![NodeType::Key, NodeType::Keyref, NodeType::Unique]);

    let keyref = &db.children()[1];
    assert_eq!(keyref.refer().as_deref(), Some("pk"));
    assert_eq!(
        keyref.selector_child().unwrap().xpath().unwrap().value(),
        ".//link"
    );
    let unique = &db.children()[2];
    assert_eq!(unique.field_children().len(), 2);
    assert_eq!(
        unique.field_children()[1].xpath().unwrap().value(),
        "@lang"
    );
}

#[test]
fn list_and_union_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Ints"><xs:list itemType="xs:int"/></xs:simpleType>
  <xs:simpleType name="Either"><xs:union memberTypes="xs:date xs:int xs:string"/></xs:simpleType>
</xs:schema>"#,
    )
    .unwrap();

    let reparsed = roundtrip(&schema);
    let list = &find_by_name(&reparsed, "Ints").children()[0];
    assert_eq!(list.item_type().as_deref(), Some("xs:int"));
    let union = &find_by_name(&reparsed, "Either").children()[0];
    assert_eq!(union.member_types(), vec!["xs:date", "xs:int", "xs:string"]);
}

/// complexContent/simpleContent-Wrapper überstehen den Round-Trip.
#[test]
fn content_model_wrapper_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Derived">
    <xs:complexContent>
      <xs:extension base="Base">
        <xs:sequence><xs:element name="extra" type="xs:string"/></xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:complexType name="Measured">
    <xs:simpleContent>
      <xs:extension base="xs:decimal">
        <xs:attribute name="unit" type="xs:string" use="required"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>
</xs:schema>"#,
    )
    .unwrap();

    let reparsed = roundtrip(&schema);
    let derived = find_by_name(&reparsed, "Derived");
    assert_eq!(derived.content_model(), Some(ContentModel::ComplexContent));
    let ext = &derived.children()[0];
    assert_eq!(ext.node_type(), NodeType::Extension);
    assert_eq!(ext.base().as_deref(), Some("Base"));

    let measured = find_by_name(&reparsed, "Measured");
    assert_eq!(measured.content_model(), Some(ContentModel::SimpleContent));
    let attr = &measured.children()[0].children()[0];
    assert_eq!(attr.node_type(), NodeType::Attribute);
    assert_eq!(attr.name(), "unit");
}

/// XSD-1.1-Konstrukte bleiben erhalten; Versions-Erkennung stabil.
#[test]
fn version_detection_survives_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Range">
    <xs:sequence/>
    <xs:assert test="@min le @max"/>
  </xs:complexType>
</xs:schema>"#,
    )
    .unwrap();
    assert_eq!(detect_xsd_version(&schema).to_string(), "1.1");

    let reparsed = roundtrip(&schema);
    assert_eq!(detect_xsd_version(&reparsed).to_string(), "1.1");
    let assert_node = &find_by_name(&reparsed, "Range").children()[1];
    assert_eq!(assert_node.node_type(), NodeType::Assert);
    assert_eq!(assert_node.test().as_deref(), Some("@min le @max"));
}

#[test]
fn v10_schema_stays_v10_after_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Limited">
    <xs:restriction base="xs:int">
      <xs:minInclusive value="0"/>
      <xs:maxExclusive value="10"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#,
    )
    .unwrap();
    let reparsed = roundtrip(&schema);
    assert_eq!(detect_xsd_version(&reparsed).to_string(), "1.0");
}

/// Schema-Attribute (targetNamespace, formDefaults) bleiben erhalten.
#[test]
fn schema_attributes_roundtrip() {
    let schema = parse_xsd(
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="http://example.org/x"
           elementFormDefault="qualified">
  <xs:element name="root" type="xs:string"/>
</xs:schema>"#,
    )
    .unwrap();
    let reparsed = roundtrip(&schema);
    assert_eq!(
        reparsed.target_namespace().as_deref(),
        Some("http://example.org/x")
    );
    assert_eq!(
        reparsed.element_form_default(),
        Some(xstree::FormDefault::Qualified)
    );
}

/// Programmatisch gebaute Bäume mit Direktiven-Knoten serialisieren sauber.
#[test]
fn programmatic_directives_roundtrip() {
    let schema = SchemaNode::schema();
    schema.add_child(&SchemaNode::include("types.xsd"));
    schema.add_child(&SchemaNode::import(
        Some("other.xsd".to_string()),
        Some("http://example.org/other".to_string()),
    ));
    let redefine = SchemaNode::new(
        "redefine",
        NodePayload::Redefine {
            schema_location: "base.xsd".to_string(),
        },
    );
    redefine.add_child(&SchemaNode::simple_type("Code"));
    schema.add_child(&redefine);

    let reparsed = roundtrip(&schema);
    let kinds: Vec<NodeType> = reparsed.children().iter().map(|c| c.node_type()).collect();
    assert_eq!(
        kinds,
        vec![NodeType::Include, NodeType::Import, NodeType::Redefine]
    );
    assert_eq!(
        reparsed.children()[2].children()[0].name(),
        "Code"
    );
}
