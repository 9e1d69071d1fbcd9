//! Form generation and validation.
//!
//! A [`FormBinder`] is created per component selection. It turns the
//! component's parameter schema and the dataset manifest into an ordered list
//! of input controls, owns the current values, and validates every edit
//! against the parameter it targets. Switching components means building a
//! new binder; nothing carries over.

use crate::catalog::ComponentDescriptor;
use crate::error::{Result, VizError};
use crate::introspect::{compare_labels, ColumnManifest};
use crate::schema::{ParameterKind, ParameterSpec, Value, NONE_OPTION};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rendering strategy of a single input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "lowercase")]
pub enum Control {
    Select { options: Vec<String> },
    Number { initial: Option<f64> },
    Text { initial: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputControl {
    pub key: String,
    pub label: String,
    pub kind: ParameterKind,
    pub required: bool,
    #[serde(flatten)]
    pub control: Control,
}

impl InputControl {
    pub fn options(&self) -> &[String] {
        match &self.control {
            Control::Select { options } => options,
            _ => &[],
        }
    }
}

/// Inputs of one component, in declared parameter order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormModel {
    pub component: String,
    pub inputs: Vec<InputControl>,
}

impl FormModel {
    pub fn labels(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.label.as_str()).collect()
    }

    pub fn input(&self, key: &str) -> Option<&InputControl> {
        self.inputs.iter().find(|i| i.key == key)
    }
}

/// Snapshot of form values; unset optional parameters map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormValues(BTreeMap<String, Option<Value>>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<Value>) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).and_then(Option::as_ref)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Selected column name for a column-bound parameter.
    pub fn column(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_number)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// Literal flags are the text "true"/"false".
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Text(s)) if s.eq_ignore_ascii_case("true"))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

/// Live form for one component against one manifest.
#[derive(Debug)]
pub struct FormBinder {
    descriptor: Arc<ComponentDescriptor>,
    manifest: Arc<ColumnManifest>,
    model: FormModel,
    state: BTreeMap<String, Option<Value>>,
}

impl FormBinder {
    /// Generate the form. Every parameter gets exactly one control and one
    /// state entry, in declared order.
    pub fn bind(descriptor: Arc<ComponentDescriptor>, manifest: Arc<ColumnManifest>) -> Self {
        let mut inputs = Vec::with_capacity(descriptor.parameters.len());
        let mut state = BTreeMap::new();

        for param in &descriptor.parameters {
            let control = build_control(param, &manifest);
            let initial = initial_value(param, &control);
            state.insert(param.key.clone(), initial);
            inputs.push(InputControl {
                key: param.key.clone(),
                label: param.label.clone(),
                kind: param.kind,
                required: param.required,
                control,
            });
        }

        tracing::debug!(
            component = %descriptor.name,
            inputs = inputs.len(),
            dataset = %manifest.dataset,
            "form bound"
        );

        let model = FormModel {
            component: descriptor.name.clone(),
            inputs,
        };

        Self {
            descriptor,
            manifest,
            model,
            state,
        }
    }

    pub fn model(&self) -> &FormModel {
        &self.model
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn manifest(&self) -> &Arc<ColumnManifest> {
        &self.manifest
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.state.get(key).and_then(Option::as_ref)
    }

    /// Validate and store a value. `None` or `"(none)"` clears the input.
    /// On error the previous value is kept.
    pub fn set_value(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        let param = self
            .descriptor
            .parameter(key)
            .ok_or_else(|| VizError::validation(key, format!("'{}' has no such parameter", self.descriptor.name)))?;
        let input = self
            .model
            .input(key)
            .ok_or_else(|| VizError::validation(key, "no input control"))?;

        let value = value.filter(|v| !v.is_none_option());
        let coerced = match value {
            None if param.required => {
                return Err(VizError::validation(key, "a value is required"));
            }
            None => None,
            Some(v) => Some(coerce(param, input, &self.manifest, v)?),
        };

        tracing::debug!(key, value = ?coerced, "form value set");
        self.state.insert(key.to_string(), coerced);
        Ok(())
    }

    /// Keys of required parameters that are currently unset, in form order.
    pub fn missing_required(&self) -> Vec<String> {
        self.descriptor
            .parameters
            .iter()
            .filter(|p| p.required && self.value(&p.key).is_none())
            .map(|p| p.key.clone())
            .collect()
    }

    pub fn snapshot(&self) -> Result<FormValues> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(VizError::IncompleteForm { missing });
        }
        Ok(FormValues(self.state.clone()))
    }
}

/// Options for column-bound selects: matching columns, sorted, with the
/// "(none)" sentinel first when the parameter is optional.
pub fn column_options(param: &ParameterSpec, manifest: &ColumnManifest) -> Vec<String> {
    let mut names: Vec<&str> = manifest
        .columns
        .iter()
        .filter(|c| param.column_type_filter.accepts(c.inferred_type))
        .map(|c| c.name.as_str())
        .collect();
    names.sort_by(|a, b| compare_labels(a, b));

    let mut options = Vec::with_capacity(names.len() + 1);
    if !param.required {
        options.push(NONE_OPTION.to_string());
    }
    options.extend(names.into_iter().map(String::from));
    options
}

fn build_control(param: &ParameterSpec, manifest: &ColumnManifest) -> Control {
    if param.selects_columns() {
        return Control::Select {
            options: column_options(param, manifest),
        };
    }
    if !param.choices.is_empty() {
        let mut options = Vec::with_capacity(param.choices.len() + 1);
        if !param.required {
            options.push(NONE_OPTION.to_string());
        }
        options.extend(param.choices.iter().cloned());
        return Control::Select { options };
    }
    let numeric_literal = matches!(param.default, Some(Value::Number(_)));
    match param.kind {
        ParameterKind::Size => Control::Number {
            initial: param.default.as_ref().and_then(Value::as_number),
        },
        ParameterKind::Literal if numeric_literal => Control::Number {
            initial: param.default.as_ref().and_then(Value::as_number),
        },
        _ => Control::Text {
            initial: param.default.as_ref().map(|v| v.to_string()),
        },
    }
}

fn initial_value(param: &ParameterSpec, control: &Control) -> Option<Value> {
    let default = param.default.clone()?;
    match control {
        // A select default must be one of its options.
        Control::Select { options } => {
            let text = default.to_string();
            (text != NONE_OPTION && options.contains(&text)).then_some(Value::Text(text))
        }
        Control::Number { .. } => default.as_number().map(Value::Number),
        Control::Text { .. } => Some(default),
    }
}

fn coerce(param: &ParameterSpec, input: &InputControl, manifest: &ColumnManifest, value: Value) -> Result<Value> {
    let key = param.key.as_str();
    match &input.control {
        Control::Select { options } if param.selects_columns() => {
            let name = value
                .as_text()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            let column = manifest
                .get(&name)
                .ok_or_else(|| VizError::validation(key, format!("column '{}' is not in the dataset", name)))?;
            if !options.contains(&name) {
                return Err(VizError::validation(
                    key,
                    format!("column '{}' has type {:?}, which this input does not accept", name, column.inferred_type),
                ));
            }
            Ok(Value::Text(name))
        }
        Control::Select { options } => {
            let text = value.to_string();
            if options.contains(&text) {
                Ok(Value::Text(text))
            } else {
                Err(VizError::validation(
                    key,
                    format!("'{}' is not one of: {}", text, param.choices.join(", ")),
                ))
            }
        }
        Control::Number { .. } => {
            let number = value
                .as_number()
                .ok_or_else(|| VizError::validation(key, format!("'{}' is not a number", value)))?;
            if !number.is_finite() {
                return Err(VizError::validation(key, "value must be finite"));
            }
            if param.kind == ParameterKind::Size && number < 0.0 {
                return Err(VizError::validation(key, "size must not be negative"));
            }
            Ok(Value::Number(number))
        }
        Control::Text { .. } => Ok(value),
    }
}
