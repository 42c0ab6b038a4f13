use std::fs;
use std::path::Path;

use csdlgen_edm::{ingest_document, link, BuildOptions, DocumentStore, EdmError, Primitive, TypeGraph};
use csdlgen_convert::{generate, ConvertError, ConvertOptions, HandlerOutput};

const SERVICE_ROOT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:Reference Uri="http://redfish.dmtf.org/schemas/v1/Chassis_v1.xml">
    <edmx:Include Namespace="Chassis.v1_0_0"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="ServiceRoot.v1_0_0">
      <EntityType Name="ServiceRoot">
        <Property Name="Id" Type="Edm.String"/>
        <NavigationProperty Name="Chassis" Type="Collection(Chassis.v1_0_0.Chassis)"/>
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

const CHASSIS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Chassis.v1_0_0">
      <EnumType Name="State">
        <Member Name="On"/>
        <Member Name="Off"/>
      </EnumType>
      <ComplexType Name="Location"/>
      <EntityType Name="Power">
        <Property Name="Watts" Type="Edm.Decimal"/>
        <NavigationProperty Name="Chassis" Type="Chassis.v1_0_0.Chassis">
          <Annotation Term="OData.AutoExpand"/>
        </NavigationProperty>
      </EntityType>
      <EntityType Name="Chassis">
        <Property Name="Name" Type="Edm.String"/>
        <Property Name="Slots" Type="Edm.Int32"/>
        <Property Name="Present" Type="Edm.Boolean"/>
        <Property Name="Since" Type="Edm.DateTimeOffset"/>
        <Property Name="State" Type="Chassis.v1_0_0.State"/>
        <Property Name="Location" Type="Chassis.v1_0_0.Location"/>
        <Property Name="Tags" Type="Collection(Edm.String)"/>
        <Property Name="Type" Type="Edm.Int64"/>
        <NavigationProperty Name="Power" Type="Chassis.v1_0_0.Power">
          <Annotation Term="OData.AutoExpand"/>
        </NavigationProperty>
        <NavigationProperty Name="Parent" Type="Chassis.v1_0_0.Chassis"/>
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

fn corpus(dir: &Path, files: &[(&str, &str)]) -> TypeGraph {
    for (name, text) in files {
        fs::write(dir.join(name), text).expect("write fixture");
    }
    let store = DocumentStore::new(dir);
    let options = BuildOptions::default();
    let parts = files
        .iter()
        .map(|(name, _)| ingest_document(&store, &options, &dir.join(name)).expect("ingest"))
        .collect::<Vec<_>>();
    link(parts, "ServiceRoot")
}

fn generated(options: &ConvertOptions) -> HandlerOutput {
    let dir = tempfile::tempdir().unwrap();
    let graph = corpus(
        dir.path(),
        &[("Chassis_v1.xml", CHASSIS), ("ServiceRoot_v1.xml", SERVICE_ROOT)],
    );
    generate(&graph, options).unwrap()
}

#[test]
fn one_handler_per_route() {
    let output = generated(&ConvertOptions::default());
    let code = &output.contents;

    assert_eq!(output.handlers, 3);
    assert!(code.contains(
        "pub fn get_service_root<S: JsonSource>(source: &S, _request: &crate::proto::redfish_v1::GetServiceRootFilterSpec) -> Result<crate::proto::service_root::ServiceRoot, S::Error> {"
    ));
    assert!(code.contains("let value0 = source.request_uri(\"/redfish/v1\")?;"));
    assert!(code.contains("pub fn get_service_root_chassis_power<S: JsonSource>"));
}

#[test]
fn keyed_routes_take_the_uri_from_the_request() {
    let output = generated(&ConvertOptions::default());
    let code = &output.contents;
    assert!(code.contains(
        "pub fn get_service_root_chassis<S: JsonSource>(source: &S, request: &crate::proto::redfish_v1::GetServiceRootChassisFilterSpec) -> Result<crate::proto::chassis::Chassis, S::Error> {"
    ));
    assert!(code.contains(
        "    let uri = request\n        .chassis_id\n        .as_ref()\n        .map(|reference| reference.id.as_str())\n        .ok_or_else(|| source.missing_key(\"ChassisId\"))?;\n    let value0 = source.request_uri(uri)?;\n"
    ));
    assert!(code.contains("source.missing_key(\"PowerId\")"));
}

#[test]
fn converters_are_emitted_once_even_through_inline_cycles() {
    let output = generated(&ConvertOptions::default());
    let code = &output.contents;
    assert_eq!(output.converters, 3);
    assert_eq!(code.matches("fn chassis_chassis_from_json(value0: &Value)").count(), 1);
    assert_eq!(code.matches("fn chassis_power_from_json(value0: &Value)").count(), 1);
    // Power inlines its chassis back through the shared converter.
    assert!(code.contains("value1.is_object().then(|| chassis_chassis_from_json(value1))"));
}

#[test]
fn mutually_inlined_messages_assign_through_into() {
    let output = generated(&ConvertOptions::default());
    let code = &output.contents;
    // Chassis and Power embed each other, so prost boxes both fields.
    assert!(code.contains(
        "if let Some(item) = value1.is_object().then(|| chassis_power_from_json(value1)) {\n                    message.power = Some(item.into());"
    ));
    assert!(code.contains(
        "if let Some(item) = value1.is_object().then(|| chassis_chassis_from_json(value1)) {\n                    message.chassis = Some(item.into());"
    ));
    assert!(!code.contains("= Some(item);"));
}

#[test]
fn leaves_convert_by_type() {
    let output = generated(&ConvertOptions::default());
    let code = &output.contents;

    assert!(code.contains("if let Some(item) = value1.as_str().map(str::to_string) {\n                    message.name = item;"));
    assert!(code.contains("value1.as_i64().and_then(|n| i32::try_from(n).ok())"));
    assert!(code.contains("value1.as_bool()"));
    assert!(code.contains("value1.as_f64()"));
    assert!(code.contains("message.r#type = item;"));
    assert!(code.contains(
        "value1.as_str().and_then(|s| crate::proto::chassis::State::from_str_name(&format!(\"State_{s}\"))).map(|e| e as i32)"
    ));
    assert!(code.contains("// Location: open type `Location`, not decomposed"));
    assert!(code.contains("for value2 in items2 {"));
    assert!(code.contains("message.tags.push(item);"));
    assert!(code.contains("value1.is_object().then(|| navigation_reference_from_json(value1))"));
    assert!(code.contains("message.parent = Some(item.into());"));
    assert!(code.contains("value2.is_object().then(|| navigation_reference_from_json(value2))"));
    assert!(code.contains("message.chassis.push(item);"));
}

#[test]
fn time_fields_are_flagged_not_guessed() {
    let output = generated(&ConvertOptions::default());
    assert!(output
        .contents
        .contains("// Since: UNIMPLEMENTED Edm.DateTimeOffset conversion, field left unset"));
    assert_eq!(output.placeholders.len(), 1);
    let placeholder = &output.placeholders[0];
    assert_eq!(placeholder.primitive, Primitive::Time);
    assert_eq!(
        placeholder.to_string(),
        "Chassis.v1_0_0.Chassis.Since: Edm.DateTimeOffset conversion not implemented"
    );
}

#[test]
fn proto_module_is_configurable() {
    let options = ConvertOptions {
        proto_module: "pb".to_string(),
        ..ConvertOptions::default()
    };
    let output = generated(&options);
    assert!(output
        .contents
        .contains("pub fn navigation_reference_from_json(value: &Value) -> pb::NavigationReference {"));
    assert!(!output.contents.contains("crate::proto"));
}

#[test]
fn missing_root_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let graph = corpus(dir.path(), &[("Chassis_v1.xml", CHASSIS)]);
    let err = generate(&graph, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::Edm(EdmError::NoUniqueRoot { .. })));
}
