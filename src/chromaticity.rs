//! Color temperature to CIE 1931 xy lookup.
//!
//! The table is read once from a tab-delimited file whose header names the
//! `CCT`, `x (black body)` and `y (black body)` columns. Both bias offsets are
//! folded into every entry at load time.

use crate::error::{EmptyTableError, LoadError};
use std::path::Path;
use tracing::debug;

const CCT_COLUMN: &str = "CCT";
const X_COLUMN: &str = "x (black body)";
const Y_COLUMN: &str = "y (black body)";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromaticityEntry {
    pub kelvin: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ChromaticityTable {
    // Ascending by kelvin.
    entries: Vec<ChromaticityEntry>,
}

impl ChromaticityTable {
    pub fn from_entries(mut entries: Vec<ChromaticityEntry>) -> Self {
        entries.sort_by(|a, b| a.kelvin.total_cmp(&b.kelvin));
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>, x_bias: f64, y_bias: f64) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&text, x_bias, y_bias)?;
        debug!(path = %path.display(), entries = table.len(), "Chromaticity table loaded");
        Ok(table)
    }

    pub fn parse(text: &str, x_bias: f64, y_bias: f64) -> Result<Self, LoadError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines.next().ok_or(LoadError::NoRows)?;
        let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
        let position = |name: &'static str| {
            columns
                .iter()
                .position(|column| *column == name)
                .ok_or(LoadError::MissingColumn(name))
        };
        let cct = position(CCT_COLUMN)?;
        let x = position(X_COLUMN)?;
        let y = position(Y_COLUMN)?;

        let mut entries = Vec::new();
        for (line, row) in lines {
            let fields: Vec<&str> = row.split('\t').collect();
            let field = |index: usize, column: &'static str| -> Result<f64, LoadError> {
                let raw = fields.get(index).copied().unwrap_or("").trim();
                raw.parse::<f64>().map_err(|_| LoadError::Malformed {
                    line,
                    column,
                    value: raw.to_string(),
                })
            };
            entries.push(ChromaticityEntry {
                kelvin: field(cct, CCT_COLUMN)?,
                x: field(x, X_COLUMN)? + x_bias,
                y: field(y, Y_COLUMN)? + y_bias,
            });
        }

        if entries.is_empty() {
            return Err(LoadError::NoRows);
        }
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[ChromaticityEntry] {
        &self.entries
    }

    /// Returns the xy pair of the entry closest to `desired_kelvin`.
    ///
    /// On equal distance the lower temperature wins.
    pub fn nearest(&self, desired_kelvin: f64) -> Result<(f64, f64), EmptyTableError> {
        let mut best: Option<(&ChromaticityEntry, f64)> = None;
        for entry in &self.entries {
            let distance = (entry.kelvin - desired_kelvin).abs();
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((entry, distance)),
            }
        }
        best.map(|(entry, _)| (entry.x, entry.y))
            .ok_or(EmptyTableError)
    }
}
