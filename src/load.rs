//! Declaration files (JSON) → `Universe`.
use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{parse_type_expr, FieldDecl, MethodDecl, TypeDecl, TypeExpr, Universe};

// ————————————————————————————————————————————————————————————————————————————
// FILE FORMAT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclFile {
    package: String,
    /// qualifier → import path
    #[serde(default)]
    imports: IndexMap<String, String>,
    #[serde(default)]
    types: IndexMap<String, DeclSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclSpec {
    #[serde(rename = "type")]
    underlying: Option<String>,
    fields: Option<Vec<FieldSpec>>,
    #[serde(default)]
    methods: Vec<MethodSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    /// absent for embedded fields
    name: Option<String>,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MethodSpec {
    name: String,
    #[serde(default)]
    pointer_receiver: bool,
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    results: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// DECODING
// ————————————————————————————————————————————————————————————————————————————

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(file: &str, src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        Error::decl(file, format!("at JSON path {path} → {}", err.into_inner()))
    })
}

/// Parses one declaration file. `file` only labels errors.
pub fn parse_decl_file(file: &str, src: &str) -> Result<Universe> {
    let decl_file: DeclFile = from_str_with_path(file, src)?;
    let mut universe = Universe::new(decl_file.package);
    universe.imports = decl_file.imports;

    for (name, spec) in decl_file.types {
        let type_expr = |text: &str| {
            parse_type_expr(text).map_err(|err| Error::decl(file, format!("type `{name}`: {err}")))
        };
        let underlying = match (&spec.underlying, &spec.fields) {
            (Some(text), None) => type_expr(text)?,
            (None, Some(fields)) => {
                let fields = fields
                    .iter()
                    .map(|field| {
                        let ty = type_expr(&field.ty)?;
                        let (field_name, embedded) = match &field.name {
                            Some(field_name) => (field_name.clone(), false),
                            None => {
                                let base = FieldDecl::embedded_name(&ty).ok_or_else(|| {
                                    Error::decl(file, format!("type `{name}`: `{ty}` cannot be an embedded field"))
                                })?;
                                (base, true)
                            }
                        };
                        Ok(FieldDecl { name: field_name, ty, embedded })
                    })
                    .collect::<Result<Vec<_>>>()?;
                TypeExpr::Struct(fields)
            }
            _ => return Err(Error::decl(file, format!("type `{name}`: exactly one of `type` or `fields` is required"))),
        };
        let methods = spec
            .methods
            .iter()
            .map(|m| {
                Ok(MethodDecl {
                    name: m.name.clone(),
                    pointer_receiver: m.pointer_receiver,
                    params: m.params.iter().map(|p| type_expr(p)).collect::<Result<_>>()?,
                    results: m.results.iter().map(|r| type_expr(r)).collect::<Result<_>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        universe.insert(TypeDecl { name, underlying, methods });
    }
    Ok(universe)
}

/// Folds `other` into `into`. Packages must agree; type names must not clash.
fn merge(into: &mut Universe, other: Universe, file: &str) -> Result<()> {
    if into.package != other.package {
        return Err(Error::decl(
            file,
            format!("package `{}` does not match `{}` declared by earlier files", other.package, into.package),
        ));
    }
    for (qualifier, path) in other.imports {
        match into.imports.get(&qualifier) {
            Some(existing) if *existing != path => {
                return Err(Error::decl(
                    file,
                    format!("import `{qualifier}` maps to `{path}` here but to `{existing}` elsewhere"),
                ));
            }
            _ => {
                into.imports.insert(qualifier, path);
            }
        }
    }
    for (name, decl) in other.decls {
        if into.decls.contains_key(&name) {
            return Err(Error::decl(file, format!("type `{name}` is declared more than once")));
        }
        into.insert(decl);
    }
    Ok(())
}

/// Reads and merges every file into one universe, in the given order.
pub fn load_universe<P: AsRef<Path>>(paths: &[P]) -> Result<Universe> {
    let mut merged: Option<Universe> = None;
    for path in paths {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        let file = path.display().to_string();
        let universe = parse_decl_file(&file, &source)?;
        tracing::debug!(file = %file, types = universe.decls.len(), "declaration file loaded");
        match merged.as_mut() {
            None => merged = Some(universe),
            Some(into) => merge(into, universe, &file)?,
        }
    }
    merged.ok_or_else(|| Error::decl("<input>", "no declaration files given"))
}

// ------------------------------- Tests ------------------------------------ //
