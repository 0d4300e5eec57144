//! Shared fixtures for the integration suites.

#![allow(dead_code)]

pub mod parser;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pasta_core::config::Config;
use pasta_core::error::UnitError;
use pasta_core::project::{BuildOutcome, Project};
use pasta_core::semantic::{DeclId, Declaration, NameOccurrence, SymbolTable, UnitId, UnitSymbols};
use pasta_core::syntax::ast::SyntaxTree;
use pasta_core::syntax::loader::TreeLoader;

/// Pascal sources held in memory, parsed on every load.
#[derive(Debug, Default)]
pub struct Sources {
    files: Vec<PathBuf>,
    texts: HashMap<PathBuf, String>,
    trees: HashMap<PathBuf, SyntaxTree>,
}

impl Sources {
    pub fn new(units: &[(&str, &str)]) -> Self {
        let mut sources = Self::default();
        for (path, text) in units {
            sources.add(path, text);
        }
        sources
    }

    pub fn add(&mut self, path: &str, text: &str) {
        let path = PathBuf::from(path);
        self.files.push(path.clone());
        self.texts.insert(path, text.to_string());
    }

    /// Serves `tree` as is, bypassing the reader.
    pub fn add_tree(&mut self, tree: SyntaxTree) {
        self.files.push(tree.path.clone());
        self.trees.insert(tree.path.clone(), tree);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn parse(&self, path: &str) -> SyntaxTree {
        let path = Path::new(path);
        parser::parse(path, &self.texts[path])
    }
}

impl TreeLoader for Sources {
    fn load(&self, path: &Path) -> Result<SyntaxTree, UnitError> {
        if let Some(tree) = self.trees.get(path) {
            return Ok(tree.clone());
        }
        match self.texts.get(path) {
            Some(text) => Ok(parser::parse(path, text)),
            None => Err(UnitError::NotFound {
                path: path.to_path_buf(),
            }),
        }
    }
}

pub fn build(units: &[(&str, &str)]) -> BuildOutcome {
    build_with(Config::default(), &Sources::new(units))
}

pub fn build_with(config: Config, sources: &Sources) -> BuildOutcome {
    Project::new(config).build(sources.paths(), sources)
}

/// Builds and asserts that every unit made it into the table.
pub fn table(units: &[(&str, &str)]) -> SymbolTable {
    let outcome = build(units);
    assert!(
        outcome.failures.is_empty(),
        "unexpected failures: {:?}",
        outcome.failures
    );
    outcome.table
}

pub fn unit<'t>(table: &'t SymbolTable, name: &str) -> &'t UnitSymbols {
    table
        .unit_by_name(name)
        .unwrap_or_else(|| panic!("unit {name} not in table"))
}

pub fn unit_id(table: &SymbolTable, name: &str) -> UnitId {
    unit(table, name).id
}

/// Occurrences of `name` in `unit`, interface layer first, each layer in
/// the order the builder met them.
pub fn occurrences<'t>(table: &'t SymbolTable, unit_name: &str, name: &str) -> Vec<&'t NameOccurrence> {
    unit(table, unit_name)
        .occurrences()
        .filter(|o| o.name.eq_ignore_ascii_case(name))
        .collect()
}

/// Declaration the last occurrence of `name` in `unit` is bound to.
pub fn resolved<'t>(table: &'t SymbolTable, unit_name: &str, name: &str) -> Option<&'t Declaration> {
    occurrences(table, unit_name, name)
        .last()
        .unwrap_or_else(|| panic!("no occurrence of {name} in {unit_name}"))
        .declaration()
        .map(|d| table.declaration(d))
}

/// The declaration named `qualified` in `unit`, searching both layers.
pub fn declared<'t>(table: &'t SymbolTable, unit_name: &str, qualified: &str) -> &'t Declaration {
    table.declaration(declared_id(table, unit_name, qualified))
}

pub fn declared_id(table: &SymbolTable, unit_name: &str, qualified: &str) -> DeclId {
    unit(table, unit_name)
        .declarations()
        .find(|(_, d)| d.qualified_name().eq_ignore_ascii_case(qualified) && !d.is_specialized_declaration())
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("{qualified} not declared in {unit_name}"))
}

/// Names of the dependency units, sorted, for snapshots.
pub fn dependency_names(table: &SymbolTable, ids: Option<&std::collections::BTreeSet<UnitId>>) -> Vec<String> {
    let mut names: Vec<String> = ids
        .into_iter()
        .flatten()
        .filter_map(|id| table.unit(*id).map(|u| u.name.clone()))
        .collect();
    names.sort();
    names
}
