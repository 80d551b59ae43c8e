//! Filter expression evaluation for in-memory documents.
//!
//! Implements the core [`FilterVisitor`] over plain BSON values, so the
//! memory backend can execute the same queries a database backend would
//! translate natively.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, datetime::DateTime};

use docbind_core::{
    error::{DocbindError, DocbindResult},
    query::{CmpOp, Filter, FilterVisitor},
};

/// Type-erased, comparable view of BSON values.
///
/// Normalizes all numeric types to f64 so mixed-width comparisons behave
/// the way queries expect.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(array) => Comparable::Array(
                array
                    .iter()
                    .map(Comparable::from)
                    .collect(),
            ),
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            // Binary values (uuids included) compare by their raw bytes.
            Bson::Binary(binary) => Comparable::Array(
                binary
                    .bytes
                    .iter()
                    .map(|byte| Comparable::Number(*byte as f64))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Walks a dotted field path into a BSON document.
pub(crate) fn lookup_field<'a>(document: &'a Bson, field: &str) -> Option<&'a Bson> {
    let mut current = document;
    for segment in field.split('.') {
        current = current.as_document()?.get(segment)?;
    }
    Some(current)
}

/// Evaluates filter expressions against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Bson,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> Self {
        Self { document }
    }

    pub fn matches(&mut self, filter: &Filter) -> DocbindResult<bool> {
        self.visit_filter(filter)
    }

    /// Filters an iterator of documents down to those matching `filter`.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Bson>,
        filter: &Filter,
    ) -> DocbindResult<Vec<Bson>> {
        Ok(documents
            .into_iter()
            .filter(|document| {
                DocumentEvaluator::new(document)
                    .matches(filter)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

impl<'a> FilterVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocbindError;

    fn visit_all(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        for filter in filters {
            if !self.visit_filter(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_any(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        for filter in filters {
            if self.visit_filter(filter)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_filter(filter)?)
    }

    fn visit_exists(&mut self, field: &str, exists: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup_field(self.document, field).is_some() == exists)
    }

    fn visit_cmp(
        &mut self,
        field: &str,
        op: &CmpOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup_field(self.document, field) else {
            return Ok(false);
        };

        match op {
            CmpOp::Eq => Ok(Comparable::from(field_value) == Comparable::from(value)),
            CmpOp::Ne => Ok(Comparable::from(field_value) != Comparable::from(value)),
            CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte => {
                match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => Ok(match op {
                        CmpOp::Gt => ordering == Ordering::Greater,
                        CmpOp::Gte => ordering != Ordering::Less,
                        CmpOp::Lt => ordering == Ordering::Less,
                        CmpOp::Lte => ordering != Ordering::Greater,
                        _ => false,
                    }),
                    None => Ok(false),
                }
            }
            CmpOp::In => match value {
                Bson::Array(candidates) => Ok(candidates
                    .iter()
                    .any(|candidate| {
                        Comparable::from(field_value) == Comparable::from(candidate)
                    })),
                _ => Err(DocbindError::Backend(
                    "In operator requires an array value".to_string(),
                )),
            },
            CmpOp::Nin => match value {
                Bson::Array(candidates) => Ok(!candidates
                    .iter()
                    .any(|candidate| {
                        Comparable::from(field_value) == Comparable::from(candidate)
                    })),
                _ => Err(DocbindError::Backend(
                    "Nin operator requires an array value".to_string(),
                )),
            },
        }
    }
}
