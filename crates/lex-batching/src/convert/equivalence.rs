//! Declared type equivalences used when comparing two schemas.
//!
//! Comparing the schema a model was trained on with the schema of a table fed
//! to it at prediction time needs a notion of "same type" that is looser than
//! `==` for collections: a list column written by one producer may be read
//! back as a generic collection by another. Rather than special-casing names,
//! the accepted pairs are listed in a [`TypeEquivalence`] table.

use crate::error::{BatchingError, Result};
use crate::table::{CellType, Schema};
use std::collections::HashSet;

/// Outer shape of a [`CellType`], ignoring element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Int,
    Long,
    Double,
    Boolean,
    String,
    List,
    Set,
    Collection,
}

impl TypeFamily {
    pub fn of(cell_type: &CellType) -> Self {
        match cell_type {
            CellType::Int => TypeFamily::Int,
            CellType::Long => TypeFamily::Long,
            CellType::Double => TypeFamily::Double,
            CellType::Boolean => TypeFamily::Boolean,
            CellType::String => TypeFamily::String,
            CellType::List(_) => TypeFamily::List,
            CellType::Set(_) => TypeFamily::Set,
            CellType::Collection(_) => TypeFamily::Collection,
        }
    }
}

/// Symmetric table of type families treated as interchangeable.
///
/// Equivalence is not transitive: `List ≡ Collection` and
/// `Set ≡ Collection` do not make `List ≡ Set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEquivalence {
    pairs: HashSet<(TypeFamily, TypeFamily)>,
}

impl Default for TypeEquivalence {
    fn default() -> Self {
        Self::strict()
            .with(TypeFamily::List, TypeFamily::Collection)
            .with(TypeFamily::Set, TypeFamily::Collection)
    }
}

impl TypeEquivalence {
    /// Only identical types are equivalent.
    pub fn strict() -> Self {
        Self {
            pairs: HashSet::new(),
        }
    }

    /// Declare two families interchangeable.
    #[must_use]
    pub fn with(mut self, a: TypeFamily, b: TypeFamily) -> Self {
        self.pairs.insert((a, b));
        self.pairs.insert((b, a));
        self
    }

    fn families_match(&self, a: TypeFamily, b: TypeFamily) -> bool {
        a == b || self.pairs.contains(&(a, b))
    }

    /// Are two declared types equivalent? Element types are compared recursively.
    pub fn equivalent(&self, expected: &CellType, actual: &CellType) -> bool {
        if !self.families_match(TypeFamily::of(expected), TypeFamily::of(actual)) {
            return false;
        }
        match (expected.element_type(), actual.element_type()) {
            (Some(e), Some(a)) => self.equivalent(e, a),
            (None, None) => true,
            _ => false,
        }
    }

    /// Check that each named column exists in `actual` with a type equivalent
    /// to its type in `expected`.
    pub fn validate_columns<'c>(
        &self,
        expected: &Schema,
        actual: &Schema,
        columns: impl IntoIterator<Item = &'c str>,
    ) -> Result<()> {
        for name in columns {
            let (_, want) = expected.require(name)?;
            let (_, have) = actual.require(name)?;
            if !self.equivalent(&want.cell_type, &have.cell_type) {
                return Err(BatchingError::SchemaMismatch {
                    column: name.to_string(),
                    expected: want.cell_type.to_string(),
                    actual: have.cell_type.to_string(),
                });
            }
        }
        Ok(())
    }
}
