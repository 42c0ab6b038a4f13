//! Rust identifiers for prost-generated code.
//!
//! prost-build names fields with `to_snake_case`, messages and enums with
//! `to_upper_camel_case`, and nests packages as snake_case modules; the
//! helpers here follow the same rules so generated handlers line up with
//! whatever prost emitted for our protos.

use heck::{ToSnakeCase, ToUpperCamelCase};

const RAW_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "false", "final", "fn", "for", "if", "impl", "in", "let", "loop",
    "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers.
const SUFFIXED_KEYWORDS: &[&str] = &["crate", "extern", "self", "super"];

fn escape(ident: String) -> String {
    if SUFFIXED_KEYWORDS.contains(&ident.as_str()) {
        format!("{ident}_")
    } else if RAW_KEYWORDS.contains(&ident.as_str()) {
        format!("r#{ident}")
    } else {
        ident
    }
}

/// Struct field name for a proto field.
pub fn field_ident(name: &str) -> String {
    escape(name.to_snake_case())
}

/// Message or enum type name.
pub fn type_ident(name: &str) -> String {
    let ident = name.to_upper_camel_case();
    if ident == "Self" {
        "Self_".to_string()
    } else {
        ident
    }
}

/// Module generated for a proto package.
pub fn module_ident(package: &str) -> String {
    package
        .split('.')
        .map(|segment| escape(segment.to_snake_case()))
        .collect::<Vec<_>>()
        .join("::")
}

/// Name of a plain snake_case function, no escaping needed after a prefix
/// or suffix is attached.
pub fn snake(name: &str) -> String {
    name.to_snake_case()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_follow_prost_snake_case() {
        assert_eq!(field_ident("Id"), "id");
        assert_eq!(field_ident("ChassisId"), "chassis_id");
        assert_eq!(field_ident("PowerState"), "power_state");
        assert_eq!(field_ident("expand"), "expand");
    }

    #[test]
    fn keywords_are_escaped() {
        assert_eq!(field_ident("Type"), "r#type");
        assert_eq!(field_ident("Match"), "r#match");
        assert_eq!(field_ident("Self"), "self_");
        assert_eq!(type_ident("self"), "Self_");
        assert_eq!(module_ident("Crate"), "crate_");
    }

    #[test]
    fn types_and_modules() {
        assert_eq!(type_ident("Get_ServiceRoot_Chassis_FilterSpec"), "GetServiceRootChassisFilterSpec");
        assert_eq!(type_ident("ChassisType"), "ChassisType");
        assert_eq!(module_ident("redfish_v1"), "redfish_v1");
        assert_eq!(module_ident("ServiceRoot"), "service_root");
    }
}
