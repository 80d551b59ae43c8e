//! Filter translation into MongoDB query documents.
//!
//! Implements the core [`FilterVisitor`] to turn the abstract filter AST
//! into native BSON filter documents executed by the MongoDB query engine.

use bson::{Bson, Document, doc};

use docbind_core::{
    error::DocbindError,
    query::{CmpOp, Filter, FilterVisitor},
};

/// Translates filter expressions into MongoDB filter documents.
pub(crate) struct MongoFilterTranslator;

impl FilterVisitor for MongoFilterTranslator {
    type Output = Document;
    type Error = DocbindError;

    fn visit_all(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": filters
                .iter()
                .map(|filter| self.visit_filter(filter))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_any(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": filters
                .iter()
                .map(|filter| self.visit_filter(filter))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        // $nor is the general-purpose negation; $not only exists as a
        // field-level operator.
        Ok(doc! {
            "$nor": [self.visit_filter(filter)?],
        })
    }

    fn visit_exists(&mut self, field: &str, exists: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": exists },
        })
    }

    fn visit_cmp(
        &mut self,
        field: &str,
        op: &CmpOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let operator = match op {
            CmpOp::Eq => "$eq",
            CmpOp::Ne => "$ne",
            CmpOp::Gt => "$gt",
            CmpOp::Gte => "$gte",
            CmpOp::Lt => "$lt",
            CmpOp::Lte => "$lte",
            CmpOp::In => "$in",
            CmpOp::Nin => "$nin",
        };

        if matches!(op, CmpOp::In | CmpOp::Nin) && !matches!(value, Bson::Array(_)) {
            return Err(DocbindError::Backend(format!(
                "{operator} requires an array value"
            )));
        }

        Ok(doc! {
            field: { operator: value },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(filter: Filter) -> Document {
        MongoFilterTranslator.visit_filter(&filter).unwrap()
    }

    #[test]
    fn comparisons_map_to_field_operators() {
        assert_eq!(
            translate(Filter::eq("name", "ada")),
            doc! { "name": { "$eq": "ada" } }
        );
        assert_eq!(
            translate(Filter::gt("age", 30)),
            doc! { "age": { "$gt": 30 } }
        );
    }

    #[test]
    fn combinators_map_to_logical_operators() {
        assert_eq!(
            translate(Filter::eq("a", 1).and(Filter::eq("b", 2))),
            doc! { "$and": [
                { "a": { "$eq": 1 } },
                { "b": { "$eq": 2 } },
            ]}
        );
        assert_eq!(
            translate(Filter::eq("a", 1).not()),
            doc! { "$nor": [ { "a": { "$eq": 1 } } ] }
        );
    }

    #[test]
    fn existence_maps_to_exists() {
        assert_eq!(
            translate(Filter::missing("ghost")),
            doc! { "ghost": { "$exists": false } }
        );
    }

    #[test]
    fn membership_requires_arrays() {
        assert_eq!(
            translate(Filter::within("role", vec!["admin", "owner"])),
            doc! { "role": { "$in": ["admin", "owner"] } }
        );
        assert!(
            MongoFilterTranslator
                .visit_filter(&Filter::within("role", "admin"))
                .is_err()
        );
    }
}
