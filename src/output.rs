//! Per-step data file output.
//!
//! The sink consumes a DOF tensor and a filename pattern with a step-index
//! substitution and writes one flat text file per call: one
//! `(multi-index..., value)` row per degree of freedom. It never mutates the
//! field and is not performance sensitive.
use crate::tensor::Tensor;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct OutputManager {
    /// Filename pattern; `{}` is replaced by the step index.
    pattern: String,
}

impl OutputManager {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into() }
    }

    /// Writes the field for the given step, returning the path written.
    pub fn to_file(&self, u: &Tensor, step: usize) -> io::Result<PathBuf> {
        let path = PathBuf::from(self.pattern.replacen("{}", &step.to_string(), 1));
        let mut file = BufWriter::new(File::create(&path)?);

        let shape = u.shape().to_vec();
        let mut index = vec![0usize; shape.len()];
        for &value in u.as_slice() {
            for i in &index {
                write!(file, "{} ", i)?;
            }
            writeln!(file, "{}", value)?;

            // advance the row-major multi-index
            for axis in (0..shape.len()).rev() {
                index[axis] += 1;
                if index[axis] < shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }

        file.flush()?;
        log::debug!("wrote field snapshot to {}", path.display());
        Ok(path)
    }
}
