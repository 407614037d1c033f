//! Payload codec adapter (§4.4).
//!
//! Grounded on the distilled source's `xero_serialization.py`: MessagePack
//! handles the native scalar/container types, and a small encode/decode
//! hook pair tags non-native types (`datetime`, `timedelta`, exceptions)
//! with a `"__type__"` string key in an otherwise ordinary map.
//!
//! [`Payload`] is the value type every RPC method argument, keyword
//! argument, reply, and emission is built from. It is deliberately not
//! `rmpv::Value` directly: the extension types need their own variants
//! so callers get `Payload::DateTime(..)` back out instead of a bare map.

use bytes::Bytes;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Timelike};
use rmpv::Value;

use super::error::{CodecError, RemoteException};

const TYPE_KEY: &str = "__type__";
const TYPE_DATETIME: &str = "datetime";
const TYPE_TIMEDELTA: &str = "timedelta";
const TYPE_EXCEPTION: &str = "exception";

/// Application-level value the RPC runtime encodes and decodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Absence of a value.
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer, used when a value overflows `i64`.
    Uint(u64),
    /// Floating point.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque byte string.
    Bin(Bytes),
    /// Ordered sequence.
    Array(Vec<Payload>),
    /// String-keyed or arbitrary-keyed mapping, preserving insertion order.
    Map(Vec<(Payload, Payload)>),
    /// Naive (timezone-less) date and time, matching Python's `datetime`.
    DateTime(NaiveDateTime),
    /// Signed duration, matching Python's `timedelta`.
    TimeDelta(ChronoDuration),
    /// A handler exception, as delivered in an `EXCEPTION` frame.
    Exception(RemoteException),
}

impl Payload {
    /// Build a `Map` payload from `(&str, Payload)` pairs; convenience for
    /// constructing keyword-argument dictionaries.
    #[must_use]
    pub fn map(entries: impl IntoIterator<Item = (impl Into<String>, Payload)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Payload::Str(k.into()), v))
                .collect(),
        )
    }

    /// Build an `Array` payload.
    #[must_use]
    pub fn array(items: impl IntoIterator<Item = Payload>) -> Self {
        Self::Array(items.into_iter().collect())
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Str(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Str(s)
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Int(v)
    }
}

impl From<bool> for Payload {
    fn from(v: bool) -> Self {
        Payload::Bool(v)
    }
}

/// Encode a [`Payload`] into MessagePack bytes.
///
/// Values the codec natively supports round-trip unchanged; `DateTime`,
/// `TimeDelta`, and `Exception` are encoded via the `"__type__"`-tagged
/// map hook.
#[must_use]
pub fn encode(payload: &Payload) -> Bytes {
    let value = to_native(payload);
    let mut buf = Vec::new();
    // rmpv's Value writer never fails on a Vec<u8> sink.
    rmpv::encode::write_value(&mut buf, &value).expect("encoding to an in-memory buffer");
    Bytes::from(buf)
}

/// Decode MessagePack bytes into a [`Payload`].
///
/// Any map carrying a recognized `"__type__"` tag is reconstructed into
/// the matching extension variant. A map with an unrecognized tag is a
/// [`CodecError::UnknownTag`]; a map with no tag passes through as an
/// ordinary [`Payload::Map`].
pub fn decode(bytes: &[u8]) -> Result<Payload, CodecError> {
    let mut cursor = bytes;
    let value =
        rmpv::decode::read_value(&mut cursor).map_err(|e| CodecError::Malformed(e.to_string()))?;
    from_native(value)
}

fn to_native(payload: &Payload) -> Value {
    match payload {
        Payload::Nil => Value::Nil,
        Payload::Bool(b) => Value::Boolean(*b),
        Payload::Int(i) => Value::from(*i),
        Payload::Uint(u) => Value::from(*u),
        Payload::Float(f) => Value::F64(*f),
        Payload::Str(s) => Value::String(s.as_str().into()),
        Payload::Bin(b) => Value::Binary(b.to_vec()),
        Payload::Array(items) => Value::Array(items.iter().map(to_native).collect()),
        Payload::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (to_native(k), to_native(v)))
                .collect(),
        ),
        Payload::DateTime(dt) => Value::Map(vec![
            (tag_key(), Value::from(TYPE_DATETIME)),
            (Value::from("year"), Value::from(dt.year() as i64)),
            (Value::from("month"), Value::from(i64::from(dt.month()))),
            (Value::from("day"), Value::from(i64::from(dt.day()))),
            (Value::from("hour"), Value::from(i64::from(dt.hour()))),
            (Value::from("minute"), Value::from(i64::from(dt.minute()))),
            (Value::from("second"), Value::from(i64::from(dt.second()))),
            (
                Value::from("microsecond"),
                Value::from(i64::from(dt.timestamp_subsec_micros())),
            ),
        ]),
        Payload::TimeDelta(d) => {
            let (days, seconds, microseconds) = split_timedelta(*d);
            Value::Map(vec![
                (tag_key(), Value::from(TYPE_TIMEDELTA)),
                (Value::from("days"), Value::from(days)),
                (Value::from("seconds"), Value::from(seconds)),
                (Value::from("microseconds"), Value::from(microseconds)),
            ])
        }
        Payload::Exception(e) => Value::Map(vec![
            (tag_key(), Value::from(TYPE_EXCEPTION)),
            (Value::from("class"), Value::from(e.class.as_str())),
            (Value::from("message"), Value::from(e.message.as_str())),
            (Value::from("traceback"), Value::from(e.traceback.as_str())),
        ]),
    }
}

fn tag_key() -> Value {
    Value::from(TYPE_KEY)
}

fn from_native(value: Value) -> Result<Payload, CodecError> {
    match value {
        Value::Nil => Ok(Payload::Nil),
        Value::Boolean(b) => Ok(Payload::Bool(b)),
        Value::Integer(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Payload::Int(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Payload::Uint(u))
            } else {
                Err(CodecError::Malformed("integer out of range".to_string()))
            }
        }
        Value::F32(f) => Ok(Payload::Float(f64::from(f))),
        Value::F64(f) => Ok(Payload::Float(f)),
        Value::String(s) => Ok(Payload::Str(
            s.into_str()
                .ok_or_else(|| CodecError::Malformed("non-UTF-8 string".to_string()))?,
        )),
        Value::Binary(b) => Ok(Payload::Bin(Bytes::from(b))),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(from_native(item)?);
            }
            Ok(Payload::Array(out))
        }
        Value::Map(entries) => decode_map(entries),
        Value::Ext(_, _) => Err(CodecError::Malformed("unsupported msgpack ext type".to_string())),
    }
}

fn decode_map(entries: Vec<(Value, Value)>) -> Result<Payload, CodecError> {
    let tag = entries.iter().find_map(|(k, v)| {
        if k.as_str() == Some(TYPE_KEY) {
            v.as_str().map(str::to_string)
        } else {
            None
        }
    });

    let Some(tag) = tag else {
        let mut out = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            out.push((from_native(k)?, from_native(v)?));
        }
        return Ok(Payload::Map(out));
    };

    let field_i64 = |name: &'static str| -> Result<i64, CodecError> {
        entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(name))
            .and_then(|(_, v)| v.as_i64())
            .ok_or(CodecError::MissingField(
                match tag.as_str() {
                    TYPE_DATETIME => "datetime",
                    TYPE_TIMEDELTA => "timedelta",
                    _ => "extension",
                },
                name,
            ))
    };
    let field_str = |name: &'static str, default: Option<&str>| -> Result<String, CodecError> {
        match entries.iter().find(|(k, _)| k.as_str() == Some(name)) {
            Some((_, v)) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| CodecError::InvalidField("exception", format!("{name} must be a string"))),
            None => default.map(str::to_string).ok_or(CodecError::MissingField("exception", name)),
        }
    };

    match tag.as_str() {
        TYPE_DATETIME => {
            let year = field_i64("year")?;
            let date = NaiveDate::from_ymd_opt(
                year as i32,
                field_i64("month")? as u32,
                field_i64("day")? as u32,
            )
            .ok_or_else(|| CodecError::InvalidField("datetime", "invalid date".to_string()))?;
            let time = date
                .and_hms_micro_opt(
                    field_i64("hour")? as u32,
                    field_i64("minute")? as u32,
                    field_i64("second")? as u32,
                    field_i64("microsecond")? as u32,
                )
                .ok_or_else(|| CodecError::InvalidField("datetime", "invalid time".to_string()))?;
            Ok(Payload::DateTime(time))
        }
        TYPE_TIMEDELTA => {
            let days = field_i64("days")?;
            let seconds = field_i64("seconds")?;
            let microseconds = field_i64("microseconds")?;
            Ok(Payload::TimeDelta(
                ChronoDuration::days(days)
                    + ChronoDuration::seconds(seconds)
                    + ChronoDuration::microseconds(microseconds),
            ))
        }
        TYPE_EXCEPTION => Ok(Payload::Exception(RemoteException {
            class: field_str("class", Some("Exception"))?,
            message: field_str("message", None)?,
            traceback: field_str("traceback", Some(""))?,
        })),
        other => Err(CodecError::UnknownTag(other.to_string())),
    }
}

/// Decompose a duration the way Python's `timedelta` normalizes its
/// constructor arguments: `0 <= seconds < 86_400`, `0 <= microseconds <
/// 1_000_000`, with `days` absorbing the (possibly negative) remainder.
fn split_timedelta(d: ChronoDuration) -> (i64, i64, i64) {
    let total_micros = d.num_microseconds().unwrap_or_else(|| d.num_milliseconds() * 1000);
    const MICROS_PER_DAY: i64 = 86_400_000_000;
    let days = total_micros.div_euclid(MICROS_PER_DAY);
    let rem = total_micros.rem_euclid(MICROS_PER_DAY);
    let seconds = rem / 1_000_000;
    let microseconds = rem % 1_000_000;
    (days, seconds, microseconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(p: Payload) -> Payload {
        decode(&encode(&p)).expect("decode of our own encoding must succeed")
    }

    #[test]
    fn scalars_roundtrip() {
        assert_eq!(roundtrip(Payload::Nil), Payload::Nil);
        assert_eq!(roundtrip(Payload::Bool(true)), Payload::Bool(true));
        assert_eq!(roundtrip(Payload::Int(-42)), Payload::Int(-42));
        assert_eq!(roundtrip(Payload::Uint(u64::MAX)), Payload::Uint(u64::MAX));
        assert_eq!(roundtrip(Payload::Float(1.5)), Payload::Float(1.5));
        assert_eq!(
            roundtrip(Payload::Str("uno".to_string())),
            Payload::Str("uno".to_string())
        );
        assert_eq!(
            roundtrip(Payload::Bin(Bytes::from_static(b"raw"))),
            Payload::Bin(Bytes::from_static(b"raw"))
        );
    }

    #[test]
    fn containers_roundtrip() {
        let arr = Payload::array([Payload::from(1i64), Payload::from("two"), Payload::Bool(false)]);
        assert_eq!(roundtrip(arr.clone()), arr);

        let map = Payload::map([("equal", Payload::Bool(false)), ("count", Payload::from(3i64))]);
        assert_eq!(roundtrip(map.clone()), map);
    }

    #[test]
    fn datetime_roundtrips() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_micro_opt(9, 26, 53, 589_793)
            .unwrap();
        assert_eq!(roundtrip(Payload::DateTime(dt)), Payload::DateTime(dt));
    }

    #[test]
    fn timedelta_roundtrips() {
        let d = ChronoDuration::days(2) + ChronoDuration::seconds(5) + ChronoDuration::microseconds(7);
        assert_eq!(roundtrip(Payload::TimeDelta(d)), Payload::TimeDelta(d));

        let negative = ChronoDuration::seconds(-1);
        let back = roundtrip(Payload::TimeDelta(negative));
        // Python normalizes timedelta(seconds=-1) to days=-1, seconds=86399.
        assert_eq!(back, Payload::TimeDelta(ChronoDuration::seconds(-1)));
    }

    #[test]
    fn exception_roundtrips() {
        let exc = RemoteException {
            class: "ValueError".to_string(),
            message: "boom".to_string(),
            traceback: "Traceback (most recent call last): ...".to_string(),
        };
        assert_eq!(
            roundtrip(Payload::Exception(exc.clone())),
            Payload::Exception(exc)
        );
    }

    #[test]
    fn unrecognized_type_tag_errors() {
        let tagged = Value::Map(vec![(Value::from(TYPE_KEY), Value::from("widget"))]);
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &tagged).unwrap();
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, CodecError::UnknownTag(tag) if tag == "widget"));
    }

    #[test]
    fn untagged_map_passes_through() {
        let map = Payload::map([("a", Payload::from(1i64))]);
        assert_eq!(roundtrip(map.clone()), map);
    }
}
