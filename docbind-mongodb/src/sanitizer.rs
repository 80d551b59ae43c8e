//! BSON value sanitization for MongoDB key restrictions.
//!
//! MongoDB restricts field names from containing dots (`.`), dollar signs
//! (`$`) and null bytes, all of which are legal in arbitrary documents. The
//! sanitizer escapes those characters on the way in and restores them on the
//! way out, so round-tripped documents are byte-identical to what the caller
//! stored.

use bson::Bson;

pub(crate) struct ValueSanitizer;

impl ValueSanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Recursively sanitizes a BSON value: keys, strings, and nested
    /// structure.
    pub(crate) fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::String(s) => Bson::String(Self::sanitize_string(s)),
            Bson::Array(array) => Bson::Array(
                array
                    .iter()
                    .map(Self::sanitize_value)
                    .collect(),
            ),
            Bson::Document(document) => Bson::Document(
                document
                    .iter()
                    .map(|(key, value)| {
                        (Self::sanitize_string(key), Self::sanitize_value(value))
                    })
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub(crate) fn sanitize_string(input: &str) -> String {
        let mut sanitized = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter() {
            sanitized = sanitized.replace(*target, *replacement);
        }
        sanitized
    }

    /// The inverse of [`sanitize_value`](Self::sanitize_value).
    pub(crate) fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::String(s) => Bson::String(Self::restore_string(s)),
            Bson::Array(array) => Bson::Array(
                array
                    .iter()
                    .map(Self::restore_value)
                    .collect(),
            ),
            Bson::Document(document) => Bson::Document(
                document
                    .iter()
                    .map(|(key, value)| {
                        (Self::restore_string(key), Self::restore_value(value))
                    })
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub(crate) fn restore_string(input: &str) -> String {
        let mut restored = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter().rev() {
            restored = restored.replace(*replacement, *target);
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn reserved_characters_round_trip() {
        let original = Bson::Document(doc! {
            "price.usd": { "$amount": "1.50" },
        });

        let sanitized = ValueSanitizer::sanitize_value(&original);
        assert_eq!(
            sanitized,
            Bson::Document(doc! {
                "price__dot__usd": { "__dollar__amount": "1__dot__50" },
            })
        );

        assert_eq!(ValueSanitizer::restore_value(&sanitized), original);
    }

    #[test]
    fn plain_values_pass_through() {
        let value = Bson::Document(doc! { "name": "ada", "age": 36 });
        assert_eq!(ValueSanitizer::sanitize_value(&value), value);
    }
}
