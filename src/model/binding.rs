use super::description::VariableTable;
use super::{Causality, ModelFault, ScalarType, ScalarValue, SteppedModel};
use crate::error::{Result, SimError};

/// Resolves port aliases to native variables and dispatches typed get/set
/// calls according to each variable's declared type.
#[derive(Debug, Clone)]
pub struct VariableBinding {
    table: VariableTable,
}

impl VariableBinding {
    pub fn new(table: VariableTable) -> Self {
        Self { table }
    }

    /// Returns the native name and declared type bound to `alias`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::UnknownVariable` if the alias is not bound in `category`.
    pub fn resolve(&self, category: Causality, alias: &str) -> Result<(&str, ScalarType)> {
        let unknown = || SimError::UnknownVariable {
            category,
            alias: alias.to_string(),
        };
        let native = self.table.native(category, alias).ok_or_else(unknown)?;
        let scalar_type = self
            .table
            .declared_type(category, native)
            .ok_or_else(unknown)?;
        Ok((native, scalar_type))
    }

    /// Writes `value` to the variable bound to `alias`.
    ///
    /// Integers widen into `Real` ports and integral reals narrow into
    /// `Integer` ports; any other tag mismatch is rejected.
    ///
    /// # Errors
    ///
    /// `UnknownVariable` for an unbound alias, `ModelIo` for a type mismatch
    /// or a model-reported failure.
    pub fn set<M: SteppedModel + ?Sized>(
        &self,
        model: &mut M,
        category: Causality,
        alias: &str,
        value: &ScalarValue,
    ) -> Result<()> {
        let (native, declared) = self.resolve(category, alias)?;
        let io_error = |source: ModelFault| SimError::ModelIo {
            alias: alias.to_string(),
            native: native.to_string(),
            source,
        };

        let outcome = match (declared, value) {
            (ScalarType::Real, ScalarValue::Real(v)) => model.set_real(native, *v),
            (ScalarType::Real, ScalarValue::Integer(v)) => model.set_real(native, *v as f64),
            (ScalarType::Integer, ScalarValue::Integer(v)) => model.set_integer(native, *v),
            (ScalarType::Integer, ScalarValue::Real(v)) if v.is_finite() && v.fract() == 0.0 => {
                model.set_integer(native, *v as i64)
            }
            (ScalarType::Boolean, ScalarValue::Boolean(v)) => model.set_boolean(native, *v),
            (ScalarType::String, ScalarValue::String(v)) => model.set_string(native, v),
            (declared, value) => Err(ModelFault::error(format!(
                "cannot write {} value {value} to {declared} variable",
                value.scalar_type()
            ))),
        };
        outcome.map_err(io_error)
    }

    /// Reads the variable bound to `alias` as a value of its declared type.
    ///
    /// # Errors
    ///
    /// `UnknownVariable` for an unbound alias, `ModelIo` if the model rejects the read.
    pub fn get<M: SteppedModel + ?Sized>(
        &self,
        model: &M,
        category: Causality,
        alias: &str,
    ) -> Result<ScalarValue> {
        let (native, declared) = self.resolve(category, alias)?;
        let outcome = match declared {
            ScalarType::Real => model.get_real(native).map(ScalarValue::Real),
            ScalarType::Integer => model.get_integer(native).map(ScalarValue::Integer),
            ScalarType::Boolean => model.get_boolean(native).map(ScalarValue::Boolean),
            ScalarType::String => model.get_string(native).map(ScalarValue::String),
        };
        outcome.map_err(|source| SimError::ModelIo {
            alias: alias.to_string(),
            native: native.to_string(),
            source,
        })
    }
}
