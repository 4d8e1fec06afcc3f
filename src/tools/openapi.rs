use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::platform::{ConnectionSecurityScheme, OpenApiAuth, OpenApiFunction, ToolDefinition};

#[derive(Debug, Error)]
pub enum ToolSpecError {
    #[error("failed to read API description {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse API description {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid API description: {0}")]
    InvalidDocument(String),

    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("external references are not supported: {0}")]
    ExternalReference(String),

    #[error("circular reference: {0}")]
    CircularReference(String),

    #[error("no connection given for tool '{0}'")]
    MissingConnection(String),
}

/// Non-agent capability reached through the platform's OpenAPI tool support
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTool {
    pub name: String,
    pub description: String,
    /// Fully dereferenced API description
    pub spec: Value,
    pub connection_id: String,
}

impl ExternalTool {
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::Openapi {
            openapi: OpenApiFunction {
                name: self.name.clone(),
                description: self.description.clone(),
                spec: self.spec.clone(),
                auth: OpenApiAuth::Connection {
                    security_scheme: ConnectionSecurityScheme {
                        connection_id: self.connection_id.clone(),
                    },
                },
            },
        }]
    }
}

/// Read an API description from disk
pub fn load_api_document(path: impl AsRef<Path>) -> Result<Value, ToolSpecError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ToolSpecError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ToolSpecError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Validate and dereference an API description and bind it to a connection.
///
/// No remote call is made; the tool only takes effect once its definitions
/// are passed to agent creation.
pub fn bind_external_tool(
    document: &Value,
    name: &str,
    connection_id: &str,
    description: &str,
) -> Result<ExternalTool, ToolSpecError> {
    validate_document(document)?;
    if connection_id.trim().is_empty() {
        return Err(ToolSpecError::MissingConnection(name.to_string()));
    }

    Ok(ExternalTool {
        name: name.to_string(),
        description: description.to_string(),
        spec: dereference(document)?,
        connection_id: connection_id.to_string(),
    })
}

fn validate_document(document: &Value) -> Result<(), ToolSpecError> {
    let object = document
        .as_object()
        .ok_or_else(|| ToolSpecError::InvalidDocument("document is not a JSON object".into()))?;

    if !object.contains_key("openapi") && !object.contains_key("swagger") {
        return Err(ToolSpecError::InvalidDocument(
            "missing 'openapi' version field".into(),
        ));
    }
    if !object.get("paths").map(Value::is_object).unwrap_or(false) {
        return Err(ToolSpecError::InvalidDocument("missing 'paths' object".into()));
    }
    Ok(())
}

/// Inline every local `$ref` of the document
pub fn dereference(document: &Value) -> Result<Value, ToolSpecError> {
    let mut chain = Vec::new();
    resolve(document, document, &mut chain)
}

fn resolve(root: &Value, node: &Value, chain: &mut Vec<String>) -> Result<Value, ToolSpecError> {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref") {
                let reference = reference.as_str().ok_or_else(|| {
                    ToolSpecError::InvalidDocument(format!("$ref must be a string, got {}", reference))
                })?;
                return resolve_reference(root, reference, chain);
            }

            let mut resolved = Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve(root, value, chain)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(root, item, chain))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    root: &Value,
    reference: &str,
    chain: &mut Vec<String>,
) -> Result<Value, ToolSpecError> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| ToolSpecError::ExternalReference(reference.to_string()))?;

    if chain.iter().any(|seen| seen == reference) {
        return Err(ToolSpecError::CircularReference(reference.to_string()));
    }

    let target = root
        .pointer(pointer)
        .ok_or_else(|| ToolSpecError::UnresolvedReference(reference.to_string()))?;

    chain.push(reference.to_string());
    let resolved = resolve(root, target, chain);
    chain.pop();
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn image_api() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Image API", "version": "1.0"},
            "paths": {
                "/images/generations": {
                    "post": {
                        "operationId": "generateImage",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ImageRequest"}
                                }
                            }
                        },
                        "responses": {
                            "200": {"$ref": "#/components/responses/ImageResponse"}
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "ImageRequest": {
                        "type": "object",
                        "properties": {
                            "prompt": {"type": "string"},
                            "size": {"$ref": "#/components/schemas/Size"}
                        }
                    },
                    "Size": {"type": "string", "enum": ["1024x1024", "1792x1024"]}
                },
                "responses": {
                    "ImageResponse": {"description": "Generated image URLs"}
                }
            }
        })
    }

    fn contains_ref(value: &Value) -> bool {
        match value {
            Value::Object(map) => map.contains_key("$ref") || map.values().any(contains_ref),
            Value::Array(items) => items.iter().any(contains_ref),
            _ => false,
        }
    }

    #[test]
    fn test_bind_dereferences_all_references() {
        let tool = bind_external_tool(&image_api(), "generate_image", "conn-1", "Images").unwrap();

        assert!(!contains_ref(&tool.spec));
        let schema = &tool.spec["paths"]["/images/generations"]["post"]["requestBody"]["content"]
            ["application/json"]["schema"];
        assert_eq!(schema["properties"]["size"]["enum"][0], "1024x1024");
        assert_eq!(tool.connection_id, "conn-1");
    }

    #[test]
    fn test_definitions_carry_connection_auth() {
        let tool = bind_external_tool(&image_api(), "generate_image", "conn-1", "Images").unwrap();
        let definitions = tool.definitions();

        assert_eq!(definitions.len(), 1);
        match &definitions[0] {
            ToolDefinition::Openapi { openapi } => {
                assert_eq!(openapi.name, "generate_image");
                assert_eq!(
                    openapi.auth,
                    OpenApiAuth::Connection {
                        security_scheme: ConnectionSecurityScheme {
                            connection_id: "conn-1".into()
                        }
                    }
                );
            }
            other => panic!("unexpected definition: {:?}", other),
        }
    }

    #[test]
    fn test_dangling_reference_is_rejected() {
        let mut document = image_api();
        document["components"]["schemas"]
            .as_object_mut()
            .unwrap()
            .remove("Size");

        match bind_external_tool(&document, "generate_image", "conn-1", "Images") {
            Err(ToolSpecError::UnresolvedReference(reference)) => {
                assert_eq!(reference, "#/components/schemas/Size")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_external_reference_is_rejected() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {"/x": {"$ref": "other.json#/paths/~1x"}}
        });
        let result = dereference(&document);
        assert!(matches!(result, Err(ToolSpecError::ExternalReference(_))));
    }

    #[test]
    fn test_circular_reference_is_rejected() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {},
            "components": {"schemas": {
                "Node": {"type": "object", "properties": {"next": {"$ref": "#/components/schemas/Node"}}}
            }},
            "x-root": {"$ref": "#/components/schemas/Node"}
        });
        let result = dereference(&document);
        assert!(matches!(result, Err(ToolSpecError::CircularReference(_))));
    }

    #[test]
    fn test_shared_reference_is_not_circular() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {},
            "components": {"schemas": {"Id": {"type": "string"}}},
            "x-a": {"$ref": "#/components/schemas/Id"},
            "x-b": [{"$ref": "#/components/schemas/Id"}]
        });
        let resolved = dereference(&document).unwrap();
        assert_eq!(resolved["x-a"]["type"], "string");
        assert_eq!(resolved["x-b"][0]["type"], "string");
    }

    #[test]
    fn test_escaped_pointer_segments() {
        let document = json!({
            "openapi": "3.0.0",
            "paths": {"/images": {"get": {"description": "list"}}},
            "x-alias": {"$ref": "#/paths/~1images/get"}
        });
        let resolved = dereference(&document).unwrap();
        assert_eq!(resolved["x-alias"]["description"], "list");
    }

    #[test]
    fn test_rejects_non_api_documents() {
        let result = bind_external_tool(&json!({"paths": {}}), "t", "c", "d");
        assert!(matches!(result, Err(ToolSpecError::InvalidDocument(_))));

        let result = bind_external_tool(&json!({"openapi": "3.0.0"}), "t", "c", "d");
        assert!(matches!(result, Err(ToolSpecError::InvalidDocument(_))));

        let result = bind_external_tool(&json!([1, 2]), "t", "c", "d");
        assert!(matches!(result, Err(ToolSpecError::InvalidDocument(_))));
    }

    #[test]
    fn test_requires_connection() {
        let result = bind_external_tool(&image_api(), "generate_image", " ", "Images");
        assert!(matches!(result, Err(ToolSpecError::MissingConnection(_))));
    }

    #[test]
    fn test_load_api_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spec.json");
        std::fs::write(&path, image_api().to_string()).unwrap();
        assert_eq!(load_api_document(&path).unwrap(), image_api());

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_api_document(&path), Err(ToolSpecError::Parse { .. })));

        let missing = load_api_document(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ToolSpecError::Io { .. })));
    }
}
