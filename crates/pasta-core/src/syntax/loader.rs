//! Sources of syntax trees.
//!
//! Trees are requested again for every build pass and dropped as soon as the
//! pass is done with them, so a loader must be able to reproduce a tree on
//! demand.

use std::path::{Path, PathBuf};

use crate::error::UnitError;

use super::ast::{SyntaxTree, UnitKind};

/// What the build needs to know about a unit before any pass runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader {
    pub path: PathBuf,
    pub name: String,
    pub kind: UnitKind,
    pub interface_uses: Vec<String>,
    pub implementation_uses: Vec<String>,
}

impl UnitHeader {
    pub fn from_tree(tree: &SyntaxTree) -> Result<Self, UnitError> {
        let unit = &tree.unit;
        if unit.name.is_empty() {
            return Err(UnitError::MissingHeader {
                path: tree.path.clone(),
            });
        }
        let uses = |section: &Option<crate::syntax::ast::Section>| -> Vec<String> {
            section
                .iter()
                .filter_map(|s| s.uses.as_ref())
                .flat_map(|u| u.items.iter().map(|i| i.name.text()))
                .collect()
        };
        Ok(Self {
            path: tree.path.clone(),
            name: unit.name.text(),
            kind: unit.kind,
            interface_uses: uses(&unit.interface),
            implementation_uses: uses(&unit.implementation),
        })
    }
}

pub trait TreeLoader: Sync {
    fn load(&self, path: &Path) -> Result<SyntaxTree, UnitError>;

    fn header(&self, path: &Path) -> Result<UnitHeader, UnitError> {
        let tree = self.load(path)?;
        UnitHeader::from_tree(&tree)
    }
}

/// Reads trees serialized as JSON by the external parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTreeLoader;

impl TreeLoader for JsonTreeLoader {
    fn load(&self, path: &Path) -> Result<SyntaxTree, UnitError> {
        let content = std::fs::read_to_string(path).map_err(|e| UnitError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut tree: SyntaxTree =
            serde_json::from_str(&content).map_err(|e| UnitError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        tree.path = path.to_path_buf();
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::{DottedName, Ident, SourceUnit};
    use crate::syntax::location::TextRange;
    use std::fs;

    fn tree(name: &str) -> SyntaxTree {
        let parts = if name.is_empty() {
            Vec::new()
        } else {
            vec![Ident::new(name, TextRange::on_line(1, 6, name.len() as u32))]
        };
        SyntaxTree {
            path: PathBuf::from("ignored.pas"),
            unit: SourceUnit {
                kind: UnitKind::Unit,
                name: DottedName {
                    parts,
                    range: TextRange::on_line(1, 6, name.len() as u32),
                },
                interface: None,
                implementation: None,
                initialization: None,
                finalization: None,
                main: None,
                range: TextRange::on_line(1, 1, 20),
            },
        }
    }

    #[test]
    fn loads_tree_and_takes_path_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Alpha.json");
        fs::write(&path, serde_json::to_string(&tree("Alpha")).unwrap()).unwrap();

        let loaded = JsonTreeLoader.load(&path).unwrap();

        assert_eq!(loaded.path, path);
        assert_eq!(loaded.unit.name.text(), "Alpha");
    }

    #[test]
    fn header_rejects_unit_without_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.json");
        fs::write(&path, serde_json::to_string(&tree("")).unwrap()).unwrap();

        let err = JsonTreeLoader.header(&path).unwrap_err();

        assert!(matches!(err, UnitError::MissingHeader { .. }));
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Garbage.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonTreeLoader.load(&path).unwrap_err();

        assert!(matches!(err, UnitError::Decode { .. }));
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonTreeLoader
            .load(&dir.path().join("Nope.json"))
            .unwrap_err();

        assert!(matches!(err, UnitError::Io { .. }));
    }
}
