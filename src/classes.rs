//! Class names and label colours.
//!
//! A classes file holds one class per line as `name,r,g,b`. The line order is
//! the class index used by label tensors, predictions and colour masks alike.
//! Blank lines and `#` comments are ignored, and a leading header line (one
//! whose colour fields are not numbers) is skipped.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassInfoError {
    #[error("Unable to read classes file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Line {line}: expected `name,r,g,b`, got `{content}`")]
    Malformed { line: usize, content: String },

    #[error("Line {line}: invalid colour channel `{value}`")]
    Channel { line: usize, value: String },

    #[error("No classes defined")]
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassInfo {
    names: Vec<String>,
    colors: Vec<[u8; 3]>,
}

impl ClassInfo {
    pub fn from_entries<S: Into<String>>(
        entries: impl IntoIterator<Item = (S, [u8; 3])>,
    ) -> Result<Self, ClassInfoError> {
        let (names, colors): (Vec<String>, Vec<[u8; 3]>) = entries
            .into_iter()
            .map(|(name, color)| (name.into(), color))
            .unzip();

        if names.is_empty() {
            return Err(ClassInfoError::Empty);
        }

        Ok(Self { names, colors })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassInfoError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ClassInfoError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ClassInfoError> {
        let mut entries = Vec::new();
        let mut seen_line = false;

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let first = !seen_line;
            seen_line = true;

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let (name, r, g, b) = match fields.as_slice() {
                &[name, r, g, b] => (name, r, g, b),
                _ => {
                    return Err(ClassInfoError::Malformed {
                        line: index + 1,
                        content: line.to_string(),
                    });
                }
            };

            if first && [r, g, b].iter().all(|v| v.parse::<i64>().is_err()) {
                continue;
            }

            let channel = |value: &str| {
                value.parse::<u8>().map_err(|_| ClassInfoError::Channel {
                    line: index + 1,
                    value: value.to_string(),
                })
            };

            entries.push((name.to_string(), [channel(r)?, channel(g)?, channel(b)?]));
        }

        Self::from_entries(entries)
    }

    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    pub fn name(&self, class: usize) -> Option<&str> {
        self.names.get(class).map(String::as_str)
    }

    /// Class index of a label pixel.
    ///
    /// Colours missing from the table (anti-aliased or resampled edges) go to
    /// the nearest table colour.
    pub fn class_of_color(&self, rgb: [u8; 3]) -> usize {
        if let Some(class) = self.colors.iter().position(|c| *c == rgb) {
            return class;
        }

        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(_, color)| {
                color
                    .iter()
                    .zip(rgb)
                    .map(|(&a, b)| (a as i32 - b as i32).pow(2))
                    .sum::<i32>()
            })
            .map(|(class, _)| class)
            .unwrap_or(0)
    }
}
