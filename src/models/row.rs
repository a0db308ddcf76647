//! Query result containers.
//!
//! `query()` materializes results as `Rows`, an owned ordered sequence of
//! string-keyed `Row` maps. The coercion helpers exist because backends
//! frequently return numeric columns as text (JSON path extraction, text
//! protocol reads); they convert in place by column name.

use crate::error::{DbError, DbResult};
use crate::models::value::SqlValue;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// One result row: an order-irrelevant mapping from column name to value.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Row(pub HashMap<String, SqlValue>);

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Look up a column value.
    pub fn get(&self, key: &str) -> Option<&SqlValue> {
        self.0.get(key)
    }

    /// Look up a column value, failing if the column is absent.
    pub fn column(&self, key: &str) -> DbResult<&SqlValue> {
        self.0
            .get(key)
            .ok_or_else(|| DbError::decode(format!("Column not found: {}", key)))
    }

    /// Checked text accessor.
    pub fn get_str(&self, key: &str) -> DbResult<&str> {
        self.column(key)?.as_str()
    }

    /// Checked integer accessor.
    pub fn get_i64(&self, key: &str) -> DbResult<i64> {
        self.column(key)?.as_i64()
    }

    /// Checked float accessor.
    pub fn get_f64(&self, key: &str) -> DbResult<f64> {
        self.column(key)?.as_f64()
    }

    /// Checked boolean accessor.
    pub fn get_bool(&self, key: &str) -> DbResult<bool> {
        self.column(key)?.as_bool()
    }

    /// Convert text values at the given keys to integers, in place.
    ///
    /// Parse failures are swallowed and leave the original value unchanged.
    /// This is an intentionally permissive boundary for convenience reads
    /// of text-typed numeric output.
    pub fn to_i64(&mut self, keys: &[&str]) -> &mut Self {
        for key in keys {
            if let Some(SqlValue::Text(s)) = self.0.get(*key) {
                if let Ok(n) = s.parse::<i64>() {
                    self.0.insert((*key).to_string(), SqlValue::Int(n));
                }
            }
        }
        self
    }

    /// Convert text values at the given keys to floats, in place.
    ///
    /// Parse failures are swallowed, same boundary as [`Row::to_i64`].
    pub fn to_f64(&mut self, keys: &[&str]) -> &mut Self {
        for key in keys {
            if let Some(SqlValue::Text(s)) = self.0.get(*key) {
                if let Ok(f) = s.parse::<f64>() {
                    self.0.insert((*key).to_string(), SqlValue::Float(f));
                }
            }
        }
        self
    }

    /// Convert integer-ish text values at the given keys to booleans
    /// (zero is false, anything else true), in place. Unparseable text
    /// becomes false, matching the permissive coercion boundary.
    pub fn int_to_bool(&mut self, keys: &[&str]) -> &mut Self {
        for key in keys {
            if let Some(SqlValue::Text(s)) = self.0.get(*key) {
                let n = s.parse::<i64>().unwrap_or(0);
                self.0.insert((*key).to_string(), SqlValue::Bool(n != 0));
            }
        }
        self
    }

    /// Base64-encode text values at the given keys, in place.
    pub fn base64_encode(&mut self, keys: &[&str]) -> &mut Self {
        for key in keys {
            if let Some(SqlValue::Text(s)) = self.0.get(*key) {
                let encoded = STANDARD.encode(s.as_bytes());
                self.0.insert((*key).to_string(), SqlValue::Text(encoded));
            }
        }
        self
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An owned, ordered result set. Ownership transfers fully to the caller,
/// there is no shared state with the pool.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Rows(pub Vec<Row>);

impl Rows {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Apply [`Row::to_i64`] to every row.
    pub fn to_i64(&mut self, keys: &[&str]) -> &mut Self {
        for row in &mut self.0 {
            row.to_i64(keys);
        }
        self
    }

    /// Apply [`Row::to_f64`] to every row.
    pub fn to_f64(&mut self, keys: &[&str]) -> &mut Self {
        for row in &mut self.0 {
            row.to_f64(keys);
        }
        self
    }

    /// Apply [`Row::int_to_bool`] to every row.
    pub fn int_to_bool(&mut self, keys: &[&str]) -> &mut Self {
        for row in &mut self.0 {
            row.int_to_bool(keys);
        }
        self
    }

    /// Apply [`Row::base64_encode`] to every row.
    pub fn base64_encode(&mut self, keys: &[&str]) -> &mut Self {
        for row in &mut self.0 {
            row.base64_encode(keys);
        }
        self
    }

    /// Shuffle the rows into a random order, in place.
    pub fn shuffle(&mut self) -> &mut Self {
        if self.0.len() >= 2 {
            self.0.shuffle(&mut rand::thread_rng());
        }
        self
    }

    /// Render the result set as a JSON array.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Deref for Rows {
    type Target = Vec<Row>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Rows {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Row> for Rows {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
