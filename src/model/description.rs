//! Model self-description and the immutable port binding table built from it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{Causality, ScalarType};
use crate::error::{Result, SimError};

/// Causality tag as declared by a model, including tags the controller ignores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredCausality {
    Parameter,
    CalculatedParameter,
    Input,
    Output,
    Local,
    Independent,
}

impl DeclaredCausality {
    fn bound(self) -> Option<Causality> {
        match self {
            DeclaredCausality::Parameter => Some(Causality::Parameter),
            DeclaredCausality::Input => Some(Causality::Input),
            DeclaredCausality::Output => Some(Causality::Output),
            _ => None,
        }
    }
}

/// One scalar variable of a model self-description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    /// Native variable name.
    pub name: String,
    pub causality: DeclaredCausality,
    /// Declared scalar type; variables without one cannot be bound.
    #[serde(rename = "type", default)]
    pub scalar_type: Option<ScalarType>,
}

impl VariableSpec {
    pub fn new(name: &str, causality: DeclaredCausality, scalar_type: ScalarType) -> Self {
        Self {
            name: name.to_string(),
            causality,
            scalar_type: Some(scalar_type),
        }
    }
}

/// A model's declaration of its variables.
///
/// # Examples
///
/// ```
/// use oltc_sim::model::{Causality, ModelDescription};
///
/// let desc = ModelDescription::from_toml_str(r#"
/// model_name = "Ctrl"
///
/// [[variables]]
/// name = "grid.u1"
/// causality = "input"
/// type = "Real"
/// "#).unwrap();
///
/// let table = desc.variable_table();
/// assert_eq!(table.native(Causality::Input, "grid_u1"), Some("grid.u1"));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDescription {
    pub model_name: String,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
}

impl ModelDescription {
    /// Parses a description from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Description` if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SimError::Description(format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a description from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Description` if the TOML is invalid.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SimError::Description(e.to_string()))
    }

    /// Builds the port binding table from the declared variables.
    ///
    /// Only parameters, inputs, and outputs are kept. Native names containing
    /// `.` are bound under an alias with `.` replaced by `_`.
    pub fn variable_table(&self) -> VariableTable {
        let mut aliases: BTreeMap<Causality, BTreeMap<String, String>> = BTreeMap::new();
        let mut types: BTreeMap<Causality, BTreeMap<String, ScalarType>> = BTreeMap::new();

        for var in &self.variables {
            let Some(category) = var.causality.bound() else {
                continue;
            };
            let Some(scalar_type) = var.scalar_type else {
                continue;
            };
            let alias = var.name.replace('.', "_");
            aliases
                .entry(category)
                .or_default()
                .insert(alias, var.name.clone());
            types
                .entry(category)
                .or_default()
                .insert(var.name.clone(), scalar_type);
        }

        VariableTable::from_parts(aliases, types)
    }
}

/// Two-level lookup of model variables: category → alias → native name, and
/// category → native name → declared type.
///
/// Built once and read-only afterwards. Every category is present, possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableTable {
    aliases: BTreeMap<Causality, BTreeMap<String, String>>,
    types: BTreeMap<Causality, BTreeMap<String, ScalarType>>,
}

impl VariableTable {
    /// Builds a table from explicit mappings, filling in missing categories.
    pub fn from_parts(
        mut aliases: BTreeMap<Causality, BTreeMap<String, String>>,
        mut types: BTreeMap<Causality, BTreeMap<String, ScalarType>>,
    ) -> Self {
        for category in Causality::ALL {
            aliases.entry(category).or_default();
            types.entry(category).or_default();
        }
        Self { aliases, types }
    }

    /// Native name bound to `alias` in `category`.
    pub fn native(&self, category: Causality, alias: &str) -> Option<&str> {
        self.aliases
            .get(&category)
            .and_then(|m| m.get(alias))
            .map(String::as_str)
    }

    /// Declared type of the native variable `native` in `category`.
    pub fn declared_type(&self, category: Causality, native: &str) -> Option<ScalarType> {
        self.types.get(&category).and_then(|m| m.get(native)).copied()
    }

    /// Aliases bound in `category`, in sorted order.
    pub fn aliases(&self, category: Causality) -> impl Iterator<Item = &str> {
        self.aliases
            .get(&category)
            .into_iter()
            .flat_map(|m| m.keys().map(String::as_str))
    }
}
