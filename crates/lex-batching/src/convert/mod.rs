//! Cell converter registry.
//!
//! Maps a column's declared [`CellType`] and a destination [`Target`] to a
//! [`Converter`]. Scalar conversions are registered functions; collection
//! types are resolved structurally from their element type and flattened.

mod equivalence;

pub use equivalence::{TypeEquivalence, TypeFamily};

use crate::table::{Cell, CellType};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Destination of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A scalar or a flat vector of `f64`.
    Number,
    /// A string, used for label lookup.
    Text,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Number => f.write_str("Number"),
            Target::Text => f.write_str("Text"),
        }
    }
}

/// Output of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
    Scalar(f64),
    Vector(Vec<f64>),
    Text(String),
}

impl Converted {
    /// Number of numeric values this output contributes to a feature vector.
    pub fn width(&self) -> usize {
        match self {
            Converted::Scalar(_) => 1,
            Converted::Vector(values) => values.len(),
            Converted::Text(_) => 0,
        }
    }
}

/// A scalar conversion. `None` means the runtime value has the wrong shape.
pub type ScalarFn = fn(&Cell) -> Option<Converted>;

/// Why a single cell could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub enum CellFault {
    Missing,
    WrongShape { found: &'static str },
    UnsupportedElement { element: String, collection: String },
}

/// Why no converter exists for a declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupFailure {
    NoConverter,
    UnsupportedElement { element: CellType },
}

/// A resolved conversion for one declared type.
#[derive(Debug, Clone)]
pub enum Converter {
    Scalar {
        source: CellType,
        convert: ScalarFn,
    },
    Collection {
        collection: CellType,
        element: Box<Converter>,
    },
}

impl Converter {
    pub fn source_type(&self) -> &CellType {
        match self {
            Converter::Scalar { source, .. } => source,
            Converter::Collection { collection, .. } => collection,
        }
    }

    /// Convert one cell.
    pub fn convert(&self, cell: &Cell) -> Result<Converted, CellFault> {
        if cell.is_missing() {
            return Err(CellFault::Missing);
        }
        match self {
            Converter::Scalar { convert, .. } => convert(cell).ok_or(CellFault::WrongShape {
                found: cell.type_name(),
            }),
            Converter::Collection {
                collection,
                element,
            } => {
                let Cell::Collection(items) = cell else {
                    return Err(CellFault::WrongShape {
                        found: cell.type_name(),
                    });
                };
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match element.convert(item) {
                        Ok(Converted::Scalar(v)) => values.push(v),
                        Ok(Converted::Vector(vs)) => values.extend(vs),
                        Err(CellFault::Missing) => return Err(CellFault::Missing),
                        Ok(Converted::Text(_))
                        | Err(CellFault::WrongShape { .. })
                        | Err(CellFault::UnsupportedElement { .. }) => {
                            return Err(CellFault::UnsupportedElement {
                                element: item.type_name().to_string(),
                                collection: collection.to_string(),
                            });
                        }
                    }
                }
                Ok(Converted::Vector(values))
            }
        }
    }
}

/// Registry of scalar converters keyed by `(source type, target)`.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    scalars: HashMap<(CellType, Target), ScalarFn>,
}

static DEFAULT_REGISTRY: Lazy<ConverterRegistry> = Lazy::new(ConverterRegistry::with_defaults);

impl ConverterRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            scalars: HashMap::new(),
        }
    }

    /// Registry with numeric conversions for numbers and booleans and text
    /// conversions for every scalar type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for source in [CellType::Int, CellType::Long, CellType::Double, CellType::Boolean] {
            registry.register(source, Target::Number, to_number);
        }
        for source in [
            CellType::Int,
            CellType::Long,
            CellType::Double,
            CellType::Boolean,
            CellType::String,
        ] {
            registry.register(source, Target::Text, to_text);
        }
        registry
    }

    /// Shared instance of [`ConverterRegistry::with_defaults`].
    pub fn global() -> &'static ConverterRegistry {
        &DEFAULT_REGISTRY
    }

    /// Register (or replace) a scalar conversion.
    pub fn register(&mut self, source: CellType, target: Target, convert: ScalarFn) {
        self.scalars.insert((source, target), convert);
    }

    /// Resolve a converter, or `None` if the type is not convertible.
    pub fn converter_for(&self, source: &CellType, target: Target) -> Option<Converter> {
        self.resolve(source, target).ok()
    }

    /// Resolve a converter, reporting why resolution failed.
    pub fn resolve(&self, source: &CellType, target: Target) -> Result<Converter, LookupFailure> {
        if let Some(convert) = self.scalars.get(&(source.clone(), target)) {
            return Ok(Converter::Scalar {
                source: source.clone(),
                convert: *convert,
            });
        }

        let Some(element_type) = source.element_type() else {
            return Err(LookupFailure::NoConverter);
        };
        if target != Target::Number {
            return Err(LookupFailure::NoConverter);
        }

        match self.resolve(element_type, Target::Number) {
            Ok(element) => Ok(Converter::Collection {
                collection: source.clone(),
                element: Box::new(element),
            }),
            Err(LookupFailure::NoConverter) => Err(LookupFailure::UnsupportedElement {
                element: element_type.clone(),
            }),
            Err(nested) => Err(nested),
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn to_number(cell: &Cell) -> Option<Converted> {
    let value = match cell {
        Cell::Int(v) => f64::from(*v),
        Cell::Long(v) => *v as f64,
        Cell::Double(v) => *v,
        Cell::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    Some(Converted::Scalar(value))
}

fn to_text(cell: &Cell) -> Option<Converted> {
    let text = match cell {
        Cell::Int(v) => v.to_string(),
        Cell::Long(v) => v.to_string(),
        Cell::Double(v) => v.to_string(),
        Cell::Boolean(b) => b.to_string(),
        Cell::String(s) => s.clone(),
        _ => return None,
    };
    Some(Converted::Text(text))
}
