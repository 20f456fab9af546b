//! Response classifier for the worker line protocol
//!
//! Every line the worker prints is either status chatter (`#` prefix or blank)
//! or a record: a leading keyword naming the record kind followed by
//! whitespace-separated `key=value` fields. A key may repeat, in which case its
//! values form a sequence in the order they appeared:
//!
//! ```text
//! rsp hnd=1 end=5 uuid=1800 hnd=6 end=20 uuid=1801
//! done
//! ntfy hnd=0x002a d=0102ff
//! err code=0x0a msg=attribute_not_found
//! ```
//!
//! Values are opaque strings here; typed accessors on [`Record`] interpret them
//! for the component that consumes the record.

mod record;

#[cfg(test)]
mod tests;

pub use record::{parse_hex_u16, parse_number, Record, Tag};

use crate::error::{Error, Result};

/// Classifies one raw line from the worker.
///
/// Returns `Ok(None)` for lines that carry no record (blank lines and `#`
/// status output). Fails with [`Error::Protocol`] for anything unparseable.
pub fn classify(line: &str) -> Result<Option<Record>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let keyword = tokens
        .next()
        .ok_or_else(|| Error::Protocol("empty record".into()))?;
    let tag = Tag::from_keyword(keyword)
        .ok_or_else(|| Error::Protocol(format!("unknown record type {:?}", keyword)))?;

    let mut record = Record::new(tag);
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| Error::Protocol(format!("malformed field {:?} in {:?}", token, line)))?;
        if key.is_empty() {
            return Err(Error::Protocol(format!("field without a name in {:?}", line)));
        }
        record.push(key, value);
    }

    Ok(Some(record))
}
