//! Categorical domains inferred from the loaded table.
//!
//! A domain is the sorted set of distinct values a column takes, each paired
//! with a canonical label usable as a symbolic identifier. Domains are built
//! once per run, before the record schema, and passed around explicitly.

use super::schema::columns;
use crate::error::LedgerError;
use anyhow::{Context as _, Result};
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Turns a raw categorical value into an identifier matching `[A-Z_][A-Z0-9_]*`.
///
/// A leading digit is escaped with `_`, each run of non-alphanumeric
/// characters collapses to one `_`, and letters are upper-cased.
pub fn canonical_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len() + 1);
    if raw.starts_with(|c: char| c.is_ascii_digit()) {
        label.push('_');
    }

    let mut in_run = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_uppercase());
            in_run = false;
        } else if !in_run {
            label.push('_');
            in_run = true;
        }
    }

    if label.is_empty() {
        label.push('_');
    }
    label
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainMember {
    pub label: String,
    pub value: String,
}

/// Two distinct values that produced the same label. `kept` owns the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCollision {
    pub label: String,
    pub kept: String,
    pub shadowed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoricalDomain {
    column: String,
    members: Vec<DomainMember>,
    #[serde(skip)]
    by_label: HashMap<String, usize>,
    collisions: Vec<LabelCollision>,
}

impl CategoricalDomain {
    /// Builds the domain from raw column values; nulls are ignored.
    ///
    /// Values are visited in sorted order. When a later value maps to a label
    /// already taken, it replaces the earlier value in place and the pair is
    /// recorded as a collision.
    pub fn from_values<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = values
            .into_iter()
            .flatten()
            .map(|v| v.as_ref().to_owned())
            .collect();

        let mut members: Vec<DomainMember> = Vec::with_capacity(distinct.len());
        let mut by_label: HashMap<String, usize> = HashMap::with_capacity(distinct.len());
        let mut collisions = Vec::new();

        for value in distinct {
            let label = canonical_label(&value);
            match by_label.get(&label).and_then(|&idx| members.get_mut(idx)) {
                Some(existing) => {
                    tracing::warn!(
                        column,
                        label = %label,
                        kept = %value,
                        shadowed = %existing.value,
                        "Categorical label collision"
                    );
                    collisions.push(LabelCollision {
                        label,
                        kept: value.clone(),
                        shadowed: std::mem::replace(&mut existing.value, value),
                    });
                }
                None => {
                    by_label.insert(label.clone(), members.len());
                    members.push(DomainMember { label, value });
                }
            }
        }

        Self {
            column: column.to_owned(),
            members,
            by_label,
            collisions,
        }
    }

    /// Infers the domain of `column` in `df`. Non-string columns are cast to
    /// their string form first.
    ///
    /// # Errors
    ///
    /// Returns error if the column is missing or cannot be cast to strings
    pub fn infer(df: &DataFrame, column: &str) -> Result<Self> {
        let col = df
            .column(column)
            .ok()
            .ok_or_else(|| LedgerError::MissingColumn {
                column: column.to_owned(),
            })?;
        let as_text = col
            .as_materialized_series()
            .cast(&DataType::String)
            .with_context(|| format!("Failed to read '{column}' as text"))?;
        Ok(Self::from_values(column, as_text.str()?.into_iter()))
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn members(&self) -> &[DomainMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn collisions(&self) -> &[LabelCollision] {
        &self.collisions
    }

    pub fn value_for(&self, label: &str) -> Option<&str> {
        self.by_label
            .get(label)
            .and_then(|&idx| self.members.get(idx))
            .map(|m| m.value.as_str())
    }

    /// Label of `value`, only if `value` is the member that owns it.
    pub fn label_for(&self, value: &str) -> Option<&str> {
        let label = canonical_label(value);
        self.by_label
            .get(&label)
            .and_then(|&idx| self.members.get(idx))
            .filter(|m| m.value == value)
            .map(|m| m.label.as_str())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.label_for(value).is_some()
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.value.as_str())
    }

    /// Checks membership, explaining why a value was rejected.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ShadowedByCollision`] when the value lost its label to
    /// another value, [`LedgerError::OutsideDomain`] otherwise
    pub fn validate(&self, value: &str) -> std::result::Result<(), LedgerError> {
        if self.contains(value) {
            return Ok(());
        }
        if let Some(c) = self.collisions.iter().find(|c| c.shadowed == value) {
            return Err(LedgerError::ShadowedByCollision {
                column: self.column.clone(),
                label: c.label.clone(),
                value: value.to_owned(),
                kept: c.kept.clone(),
            });
        }
        Err(LedgerError::OutsideDomain {
            column: self.column.clone(),
            value: value.to_owned(),
        })
    }
}

/// The three categorical domains the salary schema depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainSet {
    pub sex: CategoricalDomain,
    pub designation: CategoricalDomain,
    pub unit: CategoricalDomain,
}

impl DomainSet {
    /// # Errors
    ///
    /// Returns error if any categorical column is missing or unreadable
    pub fn infer(df: &DataFrame) -> Result<Self> {
        let set = Self {
            sex: CategoricalDomain::infer(df, columns::SEX)?,
            designation: CategoricalDomain::infer(df, columns::DESIGNATION)?,
            unit: CategoricalDomain::infer(df, columns::UNIT)?,
        };
        for domain in set.iter() {
            tracing::debug!(
                column = domain.column(),
                members = domain.len(),
                collisions = domain.collisions().len(),
                "Inferred categorical domain"
            );
        }
        Ok(set)
    }

    pub fn get(&self, column: &str) -> Option<&CategoricalDomain> {
        self.iter().find(|d| d.column() == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoricalDomain> {
        [&self.sex, &self.designation, &self.unit].into_iter()
    }
}
