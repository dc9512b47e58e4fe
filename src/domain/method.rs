// RPC method identity and naming helpers.

use serde::{Deserialize, Serialize};

/// Rendered type of the first parameter every RPC handler takes.
pub const CONTEXT_TYPE: &str = "context.Context";

/// Number of leading path segments identifying the IDL module that owns a
/// generated package (`host/org/repo`).
pub const GENERATED_PATH_SEGMENTS: usize = 3;

/// An RPC method declared in an IDL file, or discovered as a boundary call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RpcMethod {
    /// Owning service name (or the generated path when no service claims it)
    pub service: String,
    /// Package path of the IDL-generated code
    pub generated_path: String,
    pub name: String,
    pub input_type: String,
    pub output_type: String,
}

impl RpcMethod {
    pub fn new(
        service: impl Into<String>,
        generated_path: impl Into<String>,
        name: impl Into<String>,
        input_type: impl Into<String>,
        output_type: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            generated_path: generated_path.into(),
            name: name.into(),
            input_type: input_type.into(),
            output_type: output_type.into(),
        }
    }

    /// Lowercased `name.input.output`, used for map lookup and deduplication.
    pub fn canonical_key(&self) -> String {
        canonical_key(&self.name, &self.input_type, &self.output_type)
    }

    pub fn generated_path_prefix(&self) -> String {
        generated_path_prefix(&self.generated_path)
    }

    /// Pointer type of the request message as the call graph renders it.
    pub fn qualified_input(&self) -> String {
        format!("*{}.{}", self.generated_path, self.input_type)
    }

    /// Pointer type of the response message as the call graph renders it.
    pub fn qualified_output(&self) -> String {
        format!("*{}.{}", self.generated_path, self.output_type)
    }

    pub fn display_name(&self) -> String {
        format!("{}.{}", self.service, self.name)
    }
}

pub fn canonical_key(name: &str, input_type: &str, output_type: &str) -> String {
    format!("{}.{}.{}", name, input_type, output_type).to_lowercase()
}

/// `github.com/acme/protos/gen/go/payments` -> `github.com/acme/protos`.
pub fn generated_path_prefix(path: &str) -> String {
    path.split('/')
        .take(GENERATED_PATH_SEGMENTS)
        .collect::<Vec<_>>()
        .join("/")
}

/// `*github.com/acme/protos/gen/payments.ChargeRequest` -> `ChargeRequest`.
pub fn strip_package_path(type_repr: &str) -> &str {
    type_repr.rsplit('.').next().unwrap_or(type_repr)
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge() -> RpcMethod {
        RpcMethod::new(
            "payments",
            "github.com/acme/protos/gen/payments",
            "Charge",
            "ChargeRequest",
            "ChargeResponse",
        )
    }

    #[test]
    fn test_canonical_key_is_lowercase() {
        assert_eq!(charge().canonical_key(), "charge.chargerequest.chargeresponse");
    }

    #[test]
    fn test_generated_path_prefix() {
        assert_eq!(
            generated_path_prefix("github.com/acme/protos/gen/payments"),
            "github.com/acme/protos"
        );
        assert_eq!(generated_path_prefix("example.com/protos"), "example.com/protos");
        assert_eq!(charge().generated_path_prefix(), "github.com/acme/protos");
    }

    #[test]
    fn test_qualified_types() {
        let m = charge();
        assert_eq!(m.qualified_input(), "*github.com/acme/protos/gen/payments.ChargeRequest");
        assert_eq!(m.qualified_output(), "*github.com/acme/protos/gen/payments.ChargeResponse");
    }

    #[test]
    fn test_strip_package_path() {
        assert_eq!(
            strip_package_path("*github.com/acme/protos/gen/payments.ChargeRequest"),
            "ChargeRequest"
        );
        assert_eq!(strip_package_path("error"), "error");
    }

    #[test]
    fn test_is_exported() {
        assert!(is_exported("Charge"));
        assert!(!is_exported("charge"));
        assert!(!is_exported(""));
    }
}
