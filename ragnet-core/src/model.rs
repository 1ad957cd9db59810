use crate::error::RagNetError;
use crate::ops::Ops;
use crate::tensor::Tensor;
use crate::types::Numeric;
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Parameter, dimension and gradient registry of a layer.
///
/// Parameters and dimensions are *declared* when the model is built, possibly
/// without a value, and *set* later (typically by the layer's initializer).
/// Reading a declared-but-unset slot is an error, which is how use-before-init
/// is reported.
///
/// Gradients live behind an `RwLock` so that the backward closures returned by
/// a forward pass, which only borrow the model, can accumulate into them.
pub struct Model<T: Numeric> {
    name: String,
    ops: Arc<dyn Ops<T>>,
    params: BTreeMap<String, Option<Tensor<T>>>,
    dims: BTreeMap<String, Option<usize>>,
    grads: RwLock<BTreeMap<String, Tensor<T>>>,
}

impl<T: Numeric> Model<T> {
    /// Creates a model declaring the given parameters (all unset) and
    /// dimensions (set or unset).
    pub fn new(
        name: &str,
        ops: Arc<dyn Ops<T>>,
        params: &[&str],
        dims: &[(&str, Option<usize>)],
    ) -> Self {
        debug!(
            "Model '{}': created on '{}' ops with params {:?} and dims {:?}",
            name,
            ops.name(),
            params,
            dims
        );
        Model {
            name: name.to_string(),
            ops,
            params: params.iter().map(|p| (p.to_string(), None)).collect(),
            dims: dims.iter().map(|(d, v)| (d.to_string(), *v)).collect(),
            grads: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ops(&self) -> &dyn Ops<T> {
        self.ops.as_ref()
    }

    // --- Parameters ---

    /// Names of all declared parameters, set or not.
    pub fn param_names(&self) -> Vec<&str> {
        self.params.keys().map(String::as_str).collect()
    }

    /// `true` when the parameter is declared and holds a value.
    pub fn has_param(&self, name: &str) -> bool {
        matches!(self.params.get(name), Some(Some(_)))
    }

    /// # Errors
    /// `ParameterNotDeclared` for unknown names, `ParameterNotSet` when the
    /// parameter was declared but never allocated.
    pub fn get_param(&self, name: &str) -> Result<&Tensor<T>, RagNetError> {
        match self.params.get(name) {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(RagNetError::ParameterNotSet {
                model: self.name.clone(),
                name: name.to_string(),
            }),
            None => Err(RagNetError::ParameterNotDeclared {
                model: self.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Stores a parameter value, declaring the slot if needed.
    pub fn set_param(&mut self, name: &str, value: Tensor<T>) {
        trace!(
            "Model '{}': set param '{}' with shape {:?}",
            self.name,
            name,
            value.shape()
        );
        self.params.insert(name.to_string(), Some(value));
    }

    // --- Dimensions ---

    /// `true` when the dimension is declared and holds a value.
    pub fn has_dim(&self, name: &str) -> bool {
        matches!(self.dims.get(name), Some(Some(_)))
    }

    /// # Errors
    /// `DimensionNotDeclared` for unknown names, `DimensionNotSet` when unset.
    pub fn get_dim(&self, name: &str) -> Result<usize, RagNetError> {
        match self.dims.get(name) {
            Some(Some(value)) => Ok(*value),
            Some(None) => Err(RagNetError::DimensionNotSet {
                model: self.name.clone(),
                name: name.to_string(),
            }),
            None => Err(RagNetError::DimensionNotDeclared {
                model: self.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Sets a dimension. Setting it again to the same value is a no-op.
    ///
    /// # Errors
    /// `DimensionNotDeclared` for unknown names, `DimensionConflict` when the
    /// dimension already holds a different value.
    pub fn set_dim(&mut self, name: &str, value: usize) -> Result<(), RagNetError> {
        let slot = self
            .dims
            .get_mut(name)
            .ok_or_else(|| RagNetError::DimensionNotDeclared {
                model: self.name.clone(),
                name: name.to_string(),
            })?;
        match *slot {
            Some(current) if current != value => Err(RagNetError::DimensionConflict {
                model: self.name.clone(),
                name: name.to_string(),
                current,
                requested: value,
            }),
            _ => {
                debug!("Model '{}': dim '{}' = {}", self.name, name, value);
                *slot = Some(value);
                Ok(())
            }
        }
    }

    // --- Gradients ---

    fn read_grads(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Tensor<T>>>, RagNetError> {
        self.grads.read().map_err(|e| RagNetError::LockError {
            lock_type: "read".to_string(),
            reason: format!("Gradient store of model '{}' is poisoned: {}", self.name, e),
        })
    }

    fn write_grads(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Tensor<T>>>, RagNetError> {
        self.grads.write().map_err(|e| RagNetError::LockError {
            lock_type: "write".to_string(),
            reason: format!("Gradient store of model '{}' is poisoned: {}", self.name, e),
        })
    }

    /// Adds `grad` into the accumulator of parameter `name`.
    ///
    /// Accumulation is additive: two calls before [`Model::zero_grads`] leave
    /// the sum of both gradients.
    ///
    /// # Errors
    /// `ParameterNotDeclared` for unknown names, `GradientShapeMismatch` when
    /// `grad` disagrees with the stored accumulator or the parameter's shape.
    pub fn inc_grad(&self, name: &str, grad: &Tensor<T>) -> Result<(), RagNetError> {
        let expected_shape = match self.params.get(name) {
            Some(Some(param)) => Some(param.shape().to_vec()),
            Some(None) => {
                warn!(
                    "Model '{}': accumulating gradient for unset parameter '{}'",
                    self.name, name
                );
                None
            }
            None => {
                return Err(RagNetError::ParameterNotDeclared {
                    model: self.name.clone(),
                    name: name.to_string(),
                })
            }
        };
        if let Some(expected) = expected_shape {
            if expected != grad.shape() {
                return Err(RagNetError::GradientShapeMismatch {
                    name: name.to_string(),
                    expected,
                    actual: grad.shape().to_vec(),
                });
            }
        }

        let mut grads = self.write_grads()?;
        match grads.get_mut(name) {
            Some(existing) => {
                if existing.shape() != grad.shape() {
                    return Err(RagNetError::GradientShapeMismatch {
                        name: name.to_string(),
                        expected: existing.shape().to_vec(),
                        actual: grad.shape().to_vec(),
                    });
                }
                self.ops.add_assign(existing, grad)?;
            }
            None => {
                grads.insert(name.to_string(), grad.clone());
            }
        }
        trace!("Model '{}': accumulated gradient for '{}'", self.name, name);
        Ok(())
    }

    /// Returns a copy of the accumulated gradient of `name`, if any.
    pub fn get_grad(&self, name: &str) -> Result<Option<Tensor<T>>, RagNetError> {
        Ok(self.read_grads()?.get(name).cloned())
    }

    pub fn has_grad(&self, name: &str) -> Result<bool, RagNetError> {
        Ok(self.read_grads()?.contains_key(name))
    }

    /// Clears every gradient accumulator, as an optimizer does after a step.
    pub fn zero_grads(&self) -> Result<(), RagNetError> {
        debug!("Model '{}': zero_grads() called", self.name);
        self.write_grads()?.clear();
        Ok(())
    }
}

impl<T: Numeric> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: BTreeMap<&str, Option<&[usize]>> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_ref().map(Tensor::shape)))
            .collect();
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("ops", &self.ops.name())
            .field("params", &params)
            .field("dims", &self.dims)
            .finish()
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
