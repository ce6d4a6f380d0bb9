use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor as OrtTensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use super::{ModelBackend, Tensor};

/// ONNX Runtime session for one exported model.
///
/// Running a session needs exclusive access, so calls are serialized
/// through a mutex; recognition requests are one at a time anyway.
pub struct OnnxBackend {
    name: String,
    session: Mutex<Session>,
}

impl OnnxBackend {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| format!("cannot load {}: {e}", path.display()))?;
        let name = format!(
            "onnx/{}",
            path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
        );
        info!("{name} session ready ({})", path.display());
        Ok(Self {
            name,
            session: Mutex::new(session),
        })
    }
}

impl ModelBackend for OnnxBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, input: Tensor) -> Result<Tensor, String> {
        let value = OrtTensor::from_array((input.shape, input.data.into_boxed_slice()))
            .map_err(|e| format!("input tensor: {e}"))?;
        let mut session = self.session.lock().map_err(|_| "session lock poisoned".to_string())?;
        let outputs = session
            .run(ort::inputs![value])
            .map_err(|e| format!("run: {e}"))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("output tensor: {e}"))?;
        Ok(Tensor {
            shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
            data: data.to_vec(),
        })
    }
}
