//! Data
//!
//! Owned columnar data container used throughout the package.
//! Rows are identified positionally and every operation preserves row order.
use crate::errors::UpliftError;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// A single column of values.
///
/// Feature and prediction columns are `Float`; categorical columns such as
/// the treatment assignment and the suggested-treatment output are `Str`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Column,
}

/// Ordered table of named columns.
///
/// Column order is insertion order. All columns have the same length, which
/// is the row count of the frame. There is no index; row identity is the row
/// position, and filtering keeps the surviving rows in their original order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    columns: Vec<Series>,
}

impl DataFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        DataFrame { columns: Vec::new() }
    }

    /// Number of rows in the frame. Zero when the frame has no columns.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |s| s.values.len())
    }

    /// Number of columns in the frame.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.iter().any(|s| s.name == name)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|s| s.name == name).map(|s| &s.values)
    }

    /// Get a float column by name.
    ///
    /// * `name` - The name of the column to get.
    pub fn float_column(&self, name: &str) -> Result<&[f64], UpliftError> {
        match self.column(name) {
            None => Err(UpliftError::MissingColumn(name.to_string())),
            Some(Column::Float(v)) => Ok(v),
            Some(Column::Str(_)) => {
                Err(UpliftError::ColumnType(name.to_string(), "float".to_string()))
            }
        }
    }

    /// Get a string column by name.
    ///
    /// * `name` - The name of the column to get.
    pub fn str_column(&self, name: &str) -> Result<&[String], UpliftError> {
        match self.column(name) {
            None => Err(UpliftError::MissingColumn(name.to_string())),
            Some(Column::Str(v)) => Ok(v),
            Some(Column::Float(_)) => {
                Err(UpliftError::ColumnType(name.to_string(), "str".to_string()))
            }
        }
    }

    /// Set a column. Replaces the column in place (keeping its position) when
    /// the name already exists, appends it otherwise.
    ///
    /// Fails with `LengthMismatch` if the new column's length disagrees with
    /// the frame's row count. The first column of an empty frame fixes the
    /// row count.
    pub fn set_column(&mut self, name: &str, values: Column) -> Result<(), UpliftError> {
        if !self.is_empty() && values.len() != self.n_rows() {
            return Err(UpliftError::LengthMismatch(
                name.to_string(),
                values.len(),
                self.n_rows(),
            ));
        }
        match self.columns.iter_mut().find(|s| s.name == name) {
            Some(series) => series.values = values,
            None => self.columns.push(Series {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Remove a column by name, returning its values if it was present.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|s| s.name == name)?;
        Some(self.columns.remove(pos).values)
    }

    /// Keep the rows where the mask is true, preserving row order.
    pub fn filter(&self, mask: &[bool]) -> Result<DataFrame, UpliftError> {
        if mask.len() != self.n_rows() {
            return Err(UpliftError::LengthMismatch(
                "mask".to_string(),
                mask.len(),
                self.n_rows(),
            ));
        }
        let columns = self
            .columns
            .iter()
            .map(|s| {
                let values = match &s.values {
                    Column::Float(v) => Column::Float(
                        v.iter().zip(mask).filter(|(_, &m)| m).map(|(x, _)| *x).collect(),
                    ),
                    Column::Str(v) => Column::Str(
                        v.iter()
                            .zip(mask)
                            .filter(|(_, &m)| m)
                            .map(|(x, _)| x.clone())
                            .collect(),
                    ),
                };
                Series {
                    name: s.name.clone(),
                    values,
                }
            })
            .collect();
        Ok(DataFrame { columns })
    }

    /// Distinct values of a string column, in first-seen row order.
    pub fn unique_str(&self, name: &str) -> Result<Vec<String>, UpliftError> {
        let values = self.str_column(name)?;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut unique = Vec::new();
        for v in values {
            if seen.insert(v.as_str()) {
                unique.push(v.clone());
            }
        }
        Ok(unique)
    }
}
