//! Processing steps and the process document they are stored in.
//!
//! A process file is an ordered list of `{type, parameters}` entries. Each
//! entry is compiled into an [`Operation`], a closed set of kinds with typed
//! parameter records. Kinds this crate does not implement (including the
//! legacy `add_border` and `set_thickness`) type as
//! [`Operation::Unsupported`]; [`Process::compile`] rejects them at their
//! position in the sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{LithoError, OperationRef, Result};

pub const GRAYSCALE: &str = "grayscale";
pub const SET_LITHOPHANE_PARAMETERS: &str = "set_lithophane_parameters";

/// Default sampling density
pub const DEFAULT_RESOLUTION_PX_PER_MM: f32 = 10.0;

fn default_resolution() -> f32 {
    DEFAULT_RESOLUTION_PX_PER_MM
}

/// How a crop region is fitted onto the target grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Stretch the crop to fill the grid
    #[default]
    Exact,
    /// Fit the crop inside the grid keeping its aspect ratio, pad the rest thin
    Pad,
}

/// Parameters of the `grayscale` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrayscaleParameters {
    #[serde(default)]
    pub invert: bool,
}

/// Parameters of the `set_lithophane_parameters` step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LithophaneParameters {
    pub width_mm: f32,
    pub height_mm: f32,
    pub min_thickness_mm: f32,
    pub max_thickness_mm: f32,
    #[serde(default = "default_resolution", alias = "pixels_per_mm")]
    pub resolution_px_per_mm: f32,
    #[serde(default)]
    pub blur_mm: f32,
    #[serde(default, alias = "angle")]
    pub build_angle_deg: f32,
    #[serde(default)]
    pub crop_mode: CropMode,
    /// Older process files stored the invert flag here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
}

impl LithophaneParameters {
    pub fn new(width_mm: f32, height_mm: f32, min_thickness_mm: f32, max_thickness_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
            min_thickness_mm,
            max_thickness_mm,
            resolution_px_per_mm: DEFAULT_RESOLUTION_PX_PER_MM,
            blur_mm: 0.0,
            build_angle_deg: 0.0,
            crop_mode: CropMode::Exact,
            invert: None,
        }
    }

    pub fn with_resolution(mut self, px_per_mm: f32) -> Self {
        self.resolution_px_per_mm = px_per_mm;
        self
    }

    pub fn with_blur(mut self, blur_mm: f32) -> Self {
        self.blur_mm = blur_mm;
        self
    }

    pub fn with_build_angle(mut self, degrees: f32) -> Self {
        self.build_angle_deg = degrees;
        self
    }

    pub fn with_crop_mode(mut self, mode: CropMode) -> Self {
        self.crop_mode = mode;
        self
    }

    /// Check every value against its documented range
    pub fn validate(&self) -> Result<()> {
        positive("width_mm", self.width_mm)?;
        positive("height_mm", self.height_mm)?;
        positive("resolution_px_per_mm", self.resolution_px_per_mm)?;
        positive("min_thickness_mm", self.min_thickness_mm)?;
        positive("max_thickness_mm", self.max_thickness_mm)?;
        if self.max_thickness_mm <= self.min_thickness_mm {
            return Err(LithoError::invalid_parameter(format!(
                "max_thickness_mm ({}) must exceed min_thickness_mm ({})",
                self.max_thickness_mm, self.min_thickness_mm
            )));
        }
        if !(self.blur_mm.is_finite() && self.blur_mm >= 0.0) {
            return Err(LithoError::invalid_parameter(format!(
                "blur_mm must be >= 0, got {}",
                self.blur_mm
            )));
        }
        if !(0.0..90.0).contains(&self.build_angle_deg) {
            return Err(LithoError::invalid_parameter(format!(
                "build_angle_deg must be in [0, 90), got {}",
                self.build_angle_deg
            )));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LithoError::invalid_parameter(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

/// One step of a processing sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Grayscale(GrayscaleParameters),
    SetLithophaneParameters(LithophaneParameters),
    /// A step this crate does not implement; applying it is an error
    Unsupported { kind: String, parameters: Value },
}

impl Operation {
    /// The `type` string this step is stored under
    pub fn kind(&self) -> &str {
        match self {
            Operation::Grayscale(_) => GRAYSCALE,
            Operation::SetLithophaneParameters(_) => SET_LITHOPHANE_PARAMETERS,
            Operation::Unsupported { kind, .. } => kind,
        }
    }

    /// Decode a stored entry, typing its parameters
    ///
    /// Unknown kinds decode successfully to [`Operation::Unsupported`];
    /// malformed parameters of a known kind are an `InvalidParameter` error
    /// naming the step.
    pub fn from_raw(index: usize, raw: &RawOperation) -> Result<Self> {
        let op_ref = OperationRef::new(index, raw.kind.clone());
        let params = match &raw.parameters {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let bad_params = |e: serde_json::Error| {
            LithoError::invalid_parameter(e.to_string()).in_operation(&op_ref)
        };

        match raw.kind.as_str() {
            GRAYSCALE => serde_json::from_value(params)
                .map(Operation::Grayscale)
                .map_err(bad_params),
            SET_LITHOPHANE_PARAMETERS => serde_json::from_value(params)
                .map(Operation::SetLithophaneParameters)
                .map_err(bad_params),
            other => Ok(Operation::Unsupported {
                kind: other.to_string(),
                parameters: raw.parameters.clone(),
            }),
        }
    }

    /// Encode back into the stored `{type, parameters}` form
    pub fn to_raw(&self) -> RawOperation {
        let parameters = match self {
            Operation::Grayscale(p) => serde_json::to_value(p),
            Operation::SetLithophaneParameters(p) => serde_json::to_value(p),
            Operation::Unsupported { parameters, .. } => Ok(parameters.clone()),
        }
        .unwrap_or(Value::Null);
        RawOperation {
            kind: self.kind().to_string(),
            parameters,
        }
    }
}

/// A step as stored in a process file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOperation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Value,
}

fn default_process_name() -> String {
    "Untitled Process".to_string()
}

/// A named, ordered list of processing steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    #[serde(default = "default_process_name")]
    pub name: String,
    #[serde(default)]
    pub operations: Vec<RawOperation>,
}

impl Default for Process {
    fn default() -> Self {
        Self::new(default_process_name())
    }
}

impl Process {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn push(&mut self, operation: &Operation) {
        self.operations.push(operation.to_raw());
    }

    /// Remove the step at `index`; out-of-range indices are ignored
    pub fn remove(&mut self, index: usize) {
        if index < self.operations.len() {
            self.operations.remove(index);
        }
    }

    /// Move a step to a new position; out-of-range indices are ignored
    pub fn move_operation(&mut self, from: usize, to: usize) {
        let len = self.operations.len();
        if from < len && to < len {
            let op = self.operations.remove(from);
            self.operations.insert(to, op);
        }
    }

    /// Type and check every stored step in order
    ///
    /// The first step that is malformed, out of range or of an unsupported
    /// kind ends compilation with an error naming that step.
    pub fn compile(&self) -> Result<Vec<Operation>> {
        self.operations
            .iter()
            .enumerate()
            .map(|(i, raw)| match Operation::from_raw(i, raw)? {
                Operation::Unsupported { kind, .. } => Err(LithoError::UnsupportedOperation {
                    operation: OperationRef::new(i, kind),
                }),
                Operation::SetLithophaneParameters(p) => {
                    let op_ref = OperationRef::new(i, SET_LITHOPHANE_PARAMETERS);
                    p.validate().map_err(|e| e.in_operation(&op_ref))?;
                    Ok(Operation::SetLithophaneParameters(p))
                }
                op => Ok(op),
            })
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LithoError::invalid_data("parsing process document", e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LithoError::invalid_data("encoding process document", e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LithoError::io(format!("reading {}", path.display()), e))?;
        Self::from_json(&contents)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| LithoError::io(format!("writing {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(kind: &str, parameters: Value) -> RawOperation {
        RawOperation {
            kind: kind.to_string(),
            parameters,
        }
    }

    #[test]
    fn test_defaults_applied() {
        let op = Operation::from_raw(
            0,
            &raw(
                SET_LITHOPHANE_PARAMETERS,
                json!({"width_mm": 100.0, "height_mm": 80.0,
                       "min_thickness_mm": 0.8, "max_thickness_mm": 5.0}),
            ),
        )
        .unwrap();

        let Operation::SetLithophaneParameters(p) = op else {
            panic!("expected lithophane parameters, got {op:?}");
        };
        assert_eq!(p.resolution_px_per_mm, 10.0);
        assert_eq!(p.blur_mm, 0.0);
        assert_eq!(p.build_angle_deg, 0.0);
        assert_eq!(p.crop_mode, CropMode::Exact);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_legacy_aliases() {
        let op = Operation::from_raw(
            0,
            &raw(
                SET_LITHOPHANE_PARAMETERS,
                json!({"width_mm": 50.0, "height_mm": 50.0, "min_thickness_mm": 0.4,
                       "max_thickness_mm": 2.0, "pixels_per_mm": 2.0, "angle": 15.0,
                       "crop_mode": "pad", "invert": true}),
            ),
        )
        .unwrap();

        let Operation::SetLithophaneParameters(p) = op else {
            panic!("expected lithophane parameters");
        };
        assert_eq!(p.resolution_px_per_mm, 2.0);
        assert_eq!(p.build_angle_deg, 15.0);
        assert_eq!(p.crop_mode, CropMode::Pad);
        assert_eq!(p.invert, Some(true));
    }

    #[test]
    fn test_grayscale_without_parameters() {
        let op = Operation::from_raw(0, &raw(GRAYSCALE, Value::Null)).unwrap();
        assert_eq!(op, Operation::Grayscale(GrayscaleParameters { invert: false }));
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let op = Operation::from_raw(2, &raw("add_border", json!({"width_mm": 3}))).unwrap();
        assert_eq!(op.kind(), "add_border");
        assert!(matches!(op, Operation::Unsupported { .. }));
    }

    #[test]
    fn test_malformed_parameters_name_step() {
        let err = Operation::from_raw(
            4,
            &raw(SET_LITHOPHANE_PARAMETERS, json!({"width_mm": "wide"})),
        )
        .unwrap_err();
        assert!(matches!(err, LithoError::InvalidParameter { .. }));
        assert_eq!(err.operation().map(|op| op.index), Some(4));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = Operation::from_raw(0, &raw(GRAYSCALE, json!({"invert": true, "gamma": 2})));
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let base = LithophaneParameters::new(100.0, 100.0, 0.8, 5.0);
        assert!(base.validate().is_ok());
        assert!(LithophaneParameters::new(0.0, 100.0, 0.8, 5.0).validate().is_err());
        assert!(LithophaneParameters::new(100.0, 100.0, 2.0, 2.0).validate().is_err());
        assert!(base.with_resolution(-1.0).validate().is_err());
        assert!(base.with_blur(-0.5).validate().is_err());
        assert!(base.with_build_angle(90.0).validate().is_err());
        assert!(base.with_build_angle(89.9).validate().is_ok());
        assert!(LithophaneParameters::new(f32::NAN, 100.0, 0.8, 5.0).validate().is_err());
    }

    #[test]
    fn test_process_json_roundtrip() {
        let mut process = Process::new("Portrait");
        process.push(&Operation::Grayscale(GrayscaleParameters { invert: true }));
        process.push(&Operation::SetLithophaneParameters(
            LithophaneParameters::new(100.0, 75.0, 0.8, 3.2).with_blur(0.2),
        ));

        let json = process.to_json().unwrap();
        let loaded = Process::from_json(&json).unwrap();
        assert_eq!(loaded, process);

        let ops = loaded.compile().unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].kind(), SET_LITHOPHANE_PARAMETERS);
    }

    #[test]
    fn test_process_reorder() {
        let mut process = Process::default();
        assert_eq!(process.name, "Untitled Process");
        process.push(&Operation::Grayscale(GrayscaleParameters::default()));
        process.push(&Operation::Unsupported {
            kind: "set_thickness".to_string(),
            parameters: Value::Null,
        });
        process.move_operation(1, 0);
        assert_eq!(process.operations[0].kind, "set_thickness");
        process.move_operation(0, 5);
        process.remove(7);
        assert_eq!(process.operations.len(), 2);
        process.remove(0);
        assert_eq!(process.operations[0].kind, GRAYSCALE);
    }

    #[test]
    fn test_compile_stops_at_first_unsupported() {
        let process = Process {
            name: "legacy".to_string(),
            operations: vec![
                raw("add_border", json!({"width_mm": 3})),
                raw(SET_LITHOPHANE_PARAMETERS, json!({"width_mm": "wide"})),
            ],
        };
        match process.compile() {
            Err(LithoError::UnsupportedOperation { operation }) => {
                assert_eq!(operation, OperationRef::new(0, "add_border"));
            }
            other => panic!("expected UnsupportedOperation, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_stops_at_first_out_of_range_step() {
        let process = Process {
            name: "legacy".to_string(),
            operations: vec![
                raw(GRAYSCALE, Value::Null),
                raw(
                    SET_LITHOPHANE_PARAMETERS,
                    json!({"width_mm": 50.0, "height_mm": 50.0,
                           "min_thickness_mm": 3.0, "max_thickness_mm": 1.0}),
                ),
                raw("set_thickness", Value::Null),
            ],
        };
        let err = process.compile().unwrap_err();
        assert!(matches!(err, LithoError::InvalidParameter { .. }));
        assert_eq!(err.operation().map(|op| op.index), Some(1));
    }

    #[test]
    fn test_process_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("process.json");
        let mut process = Process::new("Saved");
        process.push(&Operation::Grayscale(GrayscaleParameters { invert: false }));
        process.save(&path).unwrap();
        assert_eq!(Process::load(&path).unwrap(), process);
    }
}
