/// Proto Catalog Provider.
///
/// Reads the `.proto` files of a directory with the pure-Rust parser from
/// `protobuf-parse` and lists the RPC methods their services declare.
/// When imports cannot be resolved (e.g. `google/api/annotations.proto`
/// outside the proto repository) the declarations are read unlinked.

use std::fs;
use std::path::{Path, PathBuf};

use protobuf::descriptor::FileDescriptorProto;
use protobuf_support::lexer::parser_language::ParserLanguage;
use protobuf_support::lexer::token::Token;
use protobuf_support::lexer::tokenizer::{Tokenizer, TokenizerResult};
use tracing::{debug, warn};

use crate::domain::method::RpcMethod;
use crate::error::{Result, TraceError};
use crate::ports::CatalogProvider;

#[derive(Debug, Clone, Default)]
pub struct ProtoCatalogProvider {
    /// Extra import roots, e.g. the root of the proto repository
    include_roots: Vec<PathBuf>,
}

impl ProtoCatalogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.include_roots.push(root.into());
        self
    }
}

impl CatalogProvider for ProtoCatalogProvider {
    fn methods(&self, service_name: &str, proto_dir: &Path) -> Result<Vec<RpcMethod>> {
        let catalog_err = |reason: String| TraceError::Catalog {
            path: proto_dir.display().to_string(),
            reason,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(proto_dir).map_err(|e| catalog_err(e.to_string()))? {
            let path = entry.map_err(|e| catalog_err(e.to_string()))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "proto") {
                files.push(path);
            }
        }
        if files.is_empty() {
            debug!(dir = %proto_dir.display(), "no proto files");
            return Ok(Vec::new());
        }
        files.sort();

        let mut parser = protobuf_parse::Parser::new();
        parser.pure().include(proto_dir);
        for root in &self.include_roots {
            parser.include(root);
        }
        parser.inputs(&files);

        let methods: Vec<RpcMethod> = match parser.parse_and_typecheck() {
            Ok(parsed) => {
                let input_names: Vec<String> = files
                    .iter()
                    .filter_map(|f| f.file_name().map(|n| n.to_string_lossy().to_string()))
                    .collect();
                parsed
                    .file_descriptors
                    .iter()
                    // Imported dependencies are descriptors too; keep the inputs only.
                    .filter(|fd| input_names.iter().any(|n| fd.name().ends_with(n.as_str())))
                    .flat_map(|fd| file_methods(service_name, fd))
                    .collect()
            }
            Err(link_error) => {
                let mut methods = Vec::new();
                for file in &files {
                    let content = fs::read_to_string(file).map_err(|e| catalog_err(e.to_string()))?;
                    let file_err = |e: &dyn std::fmt::Display| catalog_err(format!("{}: {}", file.display(), e));
                    // Full syntax check; only link failures fall through.
                    protobuf_parse::pure::parse_dependencies(&content).map_err(|e| file_err(&e))?;
                    let unlinked = read_unlinked(&content).map_err(|e| file_err(&e))?;
                    methods.extend(unlinked.methods(service_name));
                }
                warn!(
                    dir = %proto_dir.display(),
                    error = %format!("{:#}", link_error),
                    "proto imports do not resolve, reading declarations unlinked"
                );
                methods
            }
        };
        debug!(service = service_name, methods = methods.len(), "parsed proto catalog");
        Ok(methods)
    }
}

fn file_methods(service_name: &str, file: &FileDescriptorProto) -> Vec<RpcMethod> {
    let generated_path = file
        .options
        .as_ref()
        .and_then(|o| o.go_package.as_deref())
        .map(go_import_path)
        .unwrap_or_default();
    file.service
        .iter()
        .flat_map(|svc| svc.method.iter())
        .map(|m| {
            RpcMethod::new(
                service_name,
                generated_path,
                m.name(),
                message_name(m.input_type()),
                message_name(m.output_type()),
            )
        })
        .collect()
}

/// Declarations of one file that need no import resolution.
#[derive(Debug, Default)]
struct UnlinkedFile {
    go_package: Option<String>,
    /// `(name, input type, output type)` as written
    rpcs: Vec<(String, String, String)>,
}

impl UnlinkedFile {
    fn methods(&self, service_name: &str) -> Vec<RpcMethod> {
        let generated_path = self.go_package.as_deref().map(go_import_path).unwrap_or_default();
        self.rpcs
            .iter()
            .map(|(name, input, output)| {
                RpcMethod::new(
                    service_name,
                    generated_path,
                    name.as_str(),
                    message_name(input),
                    message_name(output),
                )
            })
            .collect()
    }
}

/// Token-level read of `option go_package` and the `rpc` lines of every
/// top-level `service`. Option bodies and messages are skipped by brace depth.
fn read_unlinked(content: &str) -> TokenizerResult<UnlinkedFile> {
    let mut tokens = Tokenizer::new(content, ParserLanguage::Proto);
    let mut file = UnlinkedFile::default();
    let mut depth = 0usize;
    while !tokens.syntax_eof()? {
        match tokens.next_some()? {
            Token::Symbol('{') => depth += 1,
            Token::Symbol('}') => depth = depth.saturating_sub(1),
            Token::Ident(word) if depth == 0 && word == "option" => {
                if tokens.next_ident_if_eq("go_package")? {
                    tokens.next_symbol_expect_eq('=', "option")?;
                    file.go_package = Some(tokens.next_str_lit()?.decode_utf8()?);
                }
            }
            Token::Ident(word) if depth == 0 && word == "service" => {
                tokens.next_ident()?;
                tokens.next_symbol_expect_eq('{', "service")?;
                read_service_body(&mut tokens, &mut file.rpcs)?;
            }
            _ => {}
        }
    }
    Ok(file)
}

fn read_service_body(
    tokens: &mut Tokenizer<'_>,
    rpcs: &mut Vec<(String, String, String)>,
) -> TokenizerResult<()> {
    let mut depth = 1usize;
    while depth > 0 {
        match tokens.next_some()? {
            Token::Symbol('{') => depth += 1,
            Token::Symbol('}') => depth -= 1,
            Token::Ident(word) if depth == 1 && word == "rpc" => {
                let name = tokens.next_ident()?;
                let input = read_rpc_type(tokens)?;
                tokens.next_ident_expect_eq("returns")?;
                let output = read_rpc_type(tokens)?;
                rpcs.push((name, input, output));
            }
            _ => {}
        }
    }
    Ok(())
}

/// `( [stream] [.]pkg.Type )` -> `[.]pkg.Type`
fn read_rpc_type(tokens: &mut Tokenizer<'_>) -> TokenizerResult<String> {
    tokens.next_symbol_expect_eq('(', "rpc")?;
    tokens.next_ident_if_eq("stream")?;
    let mut type_name = String::new();
    while !tokens.next_symbol_if_eq(')')? {
        type_name.push_str(&tokens.next_some()?.format());
    }
    Ok(type_name)
}

/// `github.com/acme/protos/gen/payments;payments` -> `github.com/acme/protos/gen/payments`.
pub fn go_import_path(go_package: &str) -> &str {
    go_package.split(';').next().unwrap_or(go_package)
}

/// `.acme.payments.ChargeRequest` -> `ChargeRequest`.
pub fn message_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}
