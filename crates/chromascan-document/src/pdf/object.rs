// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small helpers over `lopdf` objects: reference resolution, typed accessors
// and stream payload extraction.

use chromascan_core::error::{ChromascanError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Upper bound on reference chains (`1 0 R` pointing at another reference).
const MAX_REFERENCE_CHAIN: usize = 16;

/// Follow references until a direct object is reached.
///
/// Returns the id of the last reference followed, if any, so callers can
/// identify shared objects.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<(Option<ObjectId>, &'a Object)> {
    let mut current = object;
    let mut id = None;
    for _ in 0..MAX_REFERENCE_CHAIN {
        match current {
            Object::Reference(ref_id) => {
                id = Some(*ref_id);
                current = doc.get_object(*ref_id).map_err(|err| {
                    ChromascanError::Pdf(format!("cannot resolve {} {} R: {}", ref_id.0, ref_id.1, err))
                })?;
            }
            direct => return Ok((id, direct)),
        }
    }
    Err(ChromascanError::malformed(
        "reference",
        "reference chain too long",
    ))
}

/// Look up `key` in `dict` and resolve it. Missing keys yield `None`.
pub fn lookup<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Result<Option<&'a Object>> {
    match dict.get(key) {
        Ok(object) => resolve(doc, object).map(|(_, direct)| Some(direct)),
        Err(_) => Ok(None),
    }
}

/// Look up `key` and require it to be a dictionary (or a stream's dictionary).
pub fn lookup_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Result<Option<&'a Dictionary>> {
    match lookup(doc, dict, key)? {
        None | Some(Object::Null) => Ok(None),
        Some(Object::Dictionary(inner)) => Ok(Some(inner)),
        Some(Object::Stream(stream)) => Ok(Some(&stream.dict)),
        Some(other) => Err(ChromascanError::malformed(
            "dictionary entry",
            format!(
                "/{} should be a dictionary, found {}",
                String::from_utf8_lossy(key),
                kind_name(other)
            ),
        )),
    }
}

/// Numeric value of an integer or real object.
pub fn as_number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

/// Integer value of `key`, accepting reals with an integral value.
pub fn lookup_integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<Option<i64>> {
    Ok(lookup(doc, dict, key)?.and_then(|object| match object {
        Object::Integer(value) => Some(*value),
        Object::Real(value) if value.fract() == 0.0 => Some(*value as i64),
        _ => None,
    }))
}

/// Array of numbers stored under `key`.
pub fn lookup_numbers(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<Option<Vec<f64>>> {
    match lookup(doc, dict, key)? {
        None | Some(Object::Null) => Ok(None),
        Some(object) => numbers(doc, object).map(Some),
    }
}

/// Interpret `object` as an array of numbers.
pub fn numbers(doc: &Document, object: &Object) -> Result<Vec<f64>> {
    let Object::Array(items) = object else {
        return Err(ChromascanError::malformed(
            "number array",
            format!("expected array, found {}", kind_name(object)),
        ));
    };
    items
        .iter()
        .map(|item| {
            let (_, direct) = resolve(doc, item)?;
            as_number(direct).ok_or_else(|| {
                ChromascanError::malformed(
                    "number array",
                    format!("expected number, found {}", kind_name(direct)),
                )
            })
        })
        .collect()
}

/// Name stored under `key`, if present and a name.
pub fn lookup_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Result<Option<&'a [u8]>> {
    Ok(lookup(doc, dict, key)?.and_then(|object| match object {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }))
}

/// Filter names applied to a stream, outermost first.
pub fn filter_names(doc: &Document, dict: &Dictionary) -> Result<Vec<Vec<u8>>> {
    match lookup(doc, dict, b"Filter")? {
        None | Some(Object::Null) => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![name.clone()]),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| match resolve(doc, item)? {
                (_, Object::Name(name)) => Ok(name.clone()),
                (_, other) => Err(ChromascanError::malformed(
                    "filter",
                    format!("expected name, found {}", kind_name(other)),
                )),
            })
            .collect(),
        Some(other) => Err(ChromascanError::malformed(
            "filter",
            format!("expected name or array, found {}", kind_name(other)),
        )),
    }
}

/// Decoded payload of a stream. Unfiltered streams are returned as-is.
pub fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|err| ChromascanError::Pdf(format!("cannot decode stream: {}", err)))
}

/// Human-readable name of an object's variant, for error messages.
pub fn kind_name(object: &Object) -> &'static str {
    match object {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn resolves_reference_chains() {
        let mut doc = Document::with_version("1.5");
        let target = doc.add_object(Object::Integer(7));
        let hop = doc.add_object(Object::Reference(target));

        let start = Object::Reference(hop);
        let (id, direct) = resolve(&doc, &start).unwrap();
        assert_eq!(id, Some(target));
        assert!(matches!(direct, Object::Integer(7)));
    }

    #[test]
    fn dangling_reference_is_an_error() {
        let doc = Document::with_version("1.5");
        assert!(resolve(&doc, &Object::Reference((99, 0))).is_err());
    }

    #[test]
    fn typed_lookups() {
        let mut doc = Document::with_version("1.5");
        let decode = doc.add_object(Object::Array(vec![Object::Integer(0), Object::Real(0.5)]));
        let dict = dictionary! {
            "Width" => 4i64,
            "Decode" => decode,
            "Filter" => vec![Object::Name(b"ASCIIHexDecode".to_vec()), Object::Name(b"FlateDecode".to_vec())],
            "Subtype" => "Image",
        };

        assert_eq!(lookup_integer(&doc, &dict, b"Width").unwrap(), Some(4));
        assert_eq!(lookup_numbers(&doc, &dict, b"Decode").unwrap(), Some(vec![0.0, 0.5]));
        assert_eq!(lookup_name(&doc, &dict, b"Subtype").unwrap(), Some(&b"Image"[..]));
        assert_eq!(
            filter_names(&doc, &dict).unwrap(),
            vec![b"ASCIIHexDecode".to_vec(), b"FlateDecode".to_vec()]
        );
        assert!(lookup(&doc, &dict, b"Missing").unwrap().is_none());
    }

    #[test]
    fn unfiltered_stream_is_returned_verbatim() {
        let stream = Stream::new(Dictionary::new(), b"0 0 m".to_vec());
        assert_eq!(stream_bytes(&stream).unwrap(), b"0 0 m");
    }
}
