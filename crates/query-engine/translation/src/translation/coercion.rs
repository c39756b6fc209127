//! Conversion between logical values and the wire representation of a dialect.
//!
//! Every value bound to a statement goes through [`encode`], and every value
//! fetched from a row goes through [`decode`]. Dates and datetimes travel as
//! text; datetimes keep only as many fractional second digits as the dialect
//! stores, truncated toward zero.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use query_engine_metadata::metadata::{Capabilities, ScalarType};
use query_engine_models::Value;
use query_engine_sql::sql::execution_plan::OutputColumn;
use query_engine_sql::sql::string::WireValue;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_INPUT_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A value that cannot be represented as the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeConversionError {
    #[error("cannot convert a {found} value to {expected}")]
    Mismatch {
        expected: ScalarType,
        found: &'static str,
    },
    #[error("{value} is out of range for {scalar_type}")]
    OutOfRange {
        scalar_type: ScalarType,
        value: String,
    },
    #[error("malformed {scalar_type} value '{value}'")]
    Malformed {
        scalar_type: ScalarType,
        value: String,
    },
    #[error("row has {found} values, but {expected} columns were selected")]
    RowWidth { expected: usize, found: usize },
}

/// Convert a logical value to the wire representation of a type.
pub fn encode(
    capabilities: &Capabilities,
    scalar_type: ScalarType,
    value: &Value,
) -> Result<WireValue, TypeConversionError> {
    let mismatch = || TypeConversionError::Mismatch {
        expected: scalar_type,
        found: value.kind(),
    };

    if value.is_null() {
        return Ok(WireValue::Null);
    }

    match scalar_type {
        ScalarType::Boolean => {
            let b = match value {
                Value::Bool(b) => *b,
                Value::Int(0) => false,
                Value::Int(1) => true,
                Value::Int(i) => {
                    return Err(TypeConversionError::OutOfRange {
                        scalar_type,
                        value: i.to_string(),
                    })
                }
                _ => return Err(mismatch()),
            };
            if capabilities.native_boolean {
                Ok(WireValue::Bool(b))
            } else {
                Ok(WireValue::Integer(i64::from(b)))
            }
        }
        ScalarType::Integer => match value {
            Value::Int(i) => Ok(WireValue::Integer(*i)),
            Value::Float(f) => float_to_integer(*f).map(WireValue::Integer),
            Value::String(s) => parse_integer(s).map(WireValue::Integer),
            _ => Err(mismatch()),
        },
        ScalarType::Float => match value {
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Ok(WireValue::Real(*i as f64)),
            Value::Float(f) if f.is_finite() => Ok(WireValue::Real(*f)),
            Value::Float(f) => Err(TypeConversionError::OutOfRange {
                scalar_type,
                value: f.to_string(),
            }),
            _ => Err(mismatch()),
        },
        ScalarType::String | ScalarType::Clob => match value {
            Value::String(s) => Ok(WireValue::Text(s.clone())),
            _ => Err(mismatch()),
        },
        ScalarType::Binary => match value {
            Value::Binary(bytes) => Ok(WireValue::Blob(bytes.clone())),
            Value::String(s) => Ok(WireValue::Blob(s.as_bytes().to_vec())),
            _ => Err(mismatch()),
        },
        ScalarType::Date => {
            let date = match value {
                Value::Date(date) => *date,
                Value::DateTime(datetime) => datetime.date(),
                Value::String(s) => parse_date(s)?,
                _ => return Err(mismatch()),
            };
            Ok(WireValue::Text(date.format(DATE_FORMAT).to_string()))
        }
        ScalarType::DateTime => {
            let datetime = match value {
                Value::DateTime(datetime) => *datetime,
                Value::Date(date) => date.and_time(chrono::NaiveTime::MIN),
                Value::String(s) => parse_datetime(s)?,
                _ => return Err(mismatch()),
            };
            Ok(WireValue::Text(format_datetime(
                truncate_datetime(datetime, capabilities.timestamp_precision),
                capabilities.timestamp_precision,
            )))
        }
    }
}

/// Convert a wire value fetched from the database to a logical value of a type.
pub fn decode(
    capabilities: &Capabilities,
    scalar_type: ScalarType,
    wire: WireValue,
) -> Result<Value, TypeConversionError> {
    let mismatch = |found: &'static str| TypeConversionError::Mismatch {
        expected: scalar_type,
        found,
    };

    if wire == WireValue::Null {
        return Ok(Value::Null);
    }

    match scalar_type {
        ScalarType::Boolean => match wire {
            WireValue::Bool(b) => Ok(Value::Bool(b)),
            WireValue::Integer(0) => Ok(Value::Bool(false)),
            WireValue::Integer(1) => Ok(Value::Bool(true)),
            WireValue::Integer(i) => Err(TypeConversionError::OutOfRange {
                scalar_type,
                value: i.to_string(),
            }),
            other => Err(mismatch(wire_kind(&other))),
        },
        ScalarType::Integer => match wire {
            WireValue::Integer(i) => Ok(Value::Int(i)),
            WireValue::Real(f) => float_to_integer(f).map(Value::Int),
            WireValue::Text(s) => parse_integer(&s).map(Value::Int),
            other => Err(mismatch(wire_kind(&other))),
        },
        ScalarType::Float => match wire {
            WireValue::Real(f) => Ok(Value::Float(f)),
            #[allow(clippy::cast_precision_loss)]
            WireValue::Integer(i) => Ok(Value::Float(i as f64)),
            WireValue::Text(s) => {
                s.trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| TypeConversionError::Malformed {
                        scalar_type,
                        value: s.clone(),
                    })
            }
            other => Err(mismatch(wire_kind(&other))),
        },
        ScalarType::String | ScalarType::Clob => match wire {
            WireValue::Text(s) => Ok(Value::String(s)),
            WireValue::Integer(i) => Ok(Value::String(i.to_string())),
            WireValue::Real(f) => Ok(Value::String(f.to_string())),
            WireValue::Blob(bytes) => String::from_utf8(bytes).map(Value::String).map_err(|err| {
                TypeConversionError::Malformed {
                    scalar_type,
                    value: format!("{} bytes", err.into_bytes().len()),
                }
            }),
            other => Err(mismatch(wire_kind(&other))),
        },
        ScalarType::Binary => match wire {
            WireValue::Blob(bytes) => Ok(Value::Binary(bytes)),
            WireValue::Text(s) => Ok(Value::Binary(s.into_bytes())),
            other => Err(mismatch(wire_kind(&other))),
        },
        ScalarType::Date => match wire {
            WireValue::Text(s) => parse_date(&s)
                .or_else(|_| parse_datetime(&s).map(|datetime| datetime.date()))
                .map(Value::Date),
            other => Err(mismatch(wire_kind(&other))),
        },
        ScalarType::DateTime => match wire {
            WireValue::Text(s) => parse_datetime(&s).map(|datetime| {
                Value::DateTime(truncate_datetime(
                    datetime,
                    capabilities.timestamp_precision,
                ))
            }),
            other => Err(mismatch(wire_kind(&other))),
        },
    }
}

/// Decode a value whose logical type is unknown, keeping the kind it has on the wire.
pub fn decode_untyped(wire: WireValue) -> Value {
    match wire {
        WireValue::Null => Value::Null,
        WireValue::Bool(b) => Value::Bool(b),
        WireValue::Integer(i) => Value::Int(i),
        WireValue::Real(f) => Value::Float(f),
        WireValue::Text(s) => Value::String(s),
        WireValue::Blob(bytes) => Value::Binary(bytes),
    }
}

/// Decode a fetched row into named logical values, following the compiled statement's columns.
pub fn decode_row(
    capabilities: &Capabilities,
    columns: &[OutputColumn],
    row: Vec<WireValue>,
) -> Result<IndexMap<String, Value>, TypeConversionError> {
    if row.len() != columns.len() {
        return Err(TypeConversionError::RowWidth {
            expected: columns.len(),
            found: row.len(),
        });
    }
    columns
        .iter()
        .zip(row)
        .map(|(column, wire)| {
            let value = match column.scalar_type {
                Some(scalar_type) => decode(capabilities, scalar_type, wire)?,
                None => decode_untyped(wire),
            };
            Ok((column.name.clone(), value))
        })
        .collect()
}

/// Drop fractional second digits beyond `precision`, rounding toward zero.
pub fn truncate_datetime(datetime: NaiveDateTime, precision: u8) -> NaiveDateTime {
    let precision = u32::from(precision.min(9));
    let unit = 10u32.pow(9 - precision);
    let nanos = datetime.nanosecond();
    datetime
        .with_nanosecond(nanos - nanos % unit)
        .unwrap_or(datetime)
}

fn format_datetime(datetime: NaiveDateTime, precision: u8) -> String {
    let mut text = datetime.format(DATETIME_FORMAT).to_string();
    let nanos = datetime.nanosecond() % 1_000_000_000;
    if nanos != 0 && precision > 0 {
        let digits = usize::from(precision.min(9));
        let fraction = format!("{nanos:09}");
        text.push('.');
        text.push_str(&fraction[..digits]);
    }
    text
}

fn parse_date(s: &str) -> Result<NaiveDate, TypeConversionError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| TypeConversionError::Malformed {
        scalar_type: ScalarType::Date,
        value: s.to_string(),
    })
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, TypeConversionError> {
    let trimmed = s.trim();
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
        .ok_or_else(|| TypeConversionError::Malformed {
            scalar_type: ScalarType::DateTime,
            value: s.to_string(),
        })
}

fn parse_integer(s: &str) -> Result<i64, TypeConversionError> {
    s.trim().parse::<i64>().map_err(|err| match err.kind() {
        std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
            TypeConversionError::OutOfRange {
                scalar_type: ScalarType::Integer,
                value: s.to_string(),
            }
        }
        _ => TypeConversionError::Malformed {
            scalar_type: ScalarType::Integer,
            value: s.to_string(),
        },
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_integer(f: f64) -> Result<i64, TypeConversionError> {
    // i64::MAX is not representable as f64; 2^63 is the first value out of range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !f.is_finite() || f >= LIMIT || f < -LIMIT {
        return Err(TypeConversionError::OutOfRange {
            scalar_type: ScalarType::Integer,
            value: f.to_string(),
        });
    }
    if f.fract() != 0.0 {
        return Err(TypeConversionError::Mismatch {
            expected: ScalarType::Integer,
            found: "float",
        });
    }
    Ok(f as i64)
}

fn wire_kind(wire: &WireValue) -> &'static str {
    match wire {
        WireValue::Null => "null",
        WireValue::Bool(_) => "boolean",
        WireValue::Integer(_) => "integer",
        WireValue::Real(_) => "float",
        WireValue::Text(_) => "text",
        WireValue::Blob(_) => "blob",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_metadata::metadata::DialectName;

    fn caps(dialect: DialectName) -> Capabilities {
        Capabilities::for_dialect(dialect)
    }

    fn datetime(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    #[test]
    fn datetimes_are_truncated_toward_zero() {
        let value = Value::DateTime(datetime("2007-03-18 10:55:23.999999999"));
        assert_eq!(
            encode(&caps(DialectName::Sqlite), ScalarType::DateTime, &value),
            Ok(WireValue::Text("2007-03-18 10:55:23.999".to_string()))
        );
        assert_eq!(
            encode(&caps(DialectName::Oracle), ScalarType::DateTime, &value),
            Ok(WireValue::Text("2007-03-18 10:55:23.999999".to_string()))
        );
    }

    #[test]
    fn whole_second_datetimes_have_no_fraction() {
        let value = Value::String("2007-03-18T10:55:23".to_string());
        assert_eq!(
            encode(&caps(DialectName::Sqlite), ScalarType::DateTime, &value),
            Ok(WireValue::Text("2007-03-18 10:55:23".to_string()))
        );
    }

    #[test]
    fn encode_decode_encode_is_idempotent() {
        let values = [
            (ScalarType::DateTime, Value::DateTime(datetime("1999-12-31 23:59:59.123456789"))),
            (ScalarType::DateTime, Value::DateTime(datetime("1969-07-20 20:17:40.5"))),
            (ScalarType::Date, Value::String("2007-03-18".to_string())),
            (ScalarType::Boolean, Value::Bool(true)),
            (ScalarType::Integer, Value::Int(i64::MIN)),
            (ScalarType::Float, Value::Float(-0.25)),
            (ScalarType::Clob, Value::String("First Article Body".to_string())),
            (ScalarType::Binary, Value::Binary(vec![0, 159, 146, 150])),
        ];
        for dialect in enum_iterator::all::<DialectName>() {
            let capabilities = caps(dialect);
            for (scalar_type, value) in &values {
                let once = encode(&capabilities, *scalar_type, value).unwrap();
                let decoded = decode(&capabilities, *scalar_type, once.clone()).unwrap();
                let twice = encode(&capabilities, *scalar_type, &decoded).unwrap();
                assert_eq!(once, twice, "{dialect} {scalar_type}");
            }
        }
    }

    #[test]
    fn booleans_follow_the_dialect() {
        assert_eq!(
            encode(&caps(DialectName::Oracle), ScalarType::Boolean, &Value::Bool(true)),
            Ok(WireValue::Integer(1))
        );
        assert_eq!(
            encode(&caps(DialectName::Postgres), ScalarType::Boolean, &Value::Bool(true)),
            Ok(WireValue::Bool(true))
        );
        assert_eq!(
            decode(&caps(DialectName::Sqlite), ScalarType::Boolean, WireValue::Integer(0)),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn conversion_errors() {
        let sqlite = caps(DialectName::Sqlite);
        assert!(matches!(
            encode(&sqlite, ScalarType::Integer, &Value::Float(1e20)),
            Err(TypeConversionError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode(&sqlite, ScalarType::Integer, &Value::String("99999999999999999999".into())),
            Err(TypeConversionError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode(&sqlite, ScalarType::Float, &Value::Float(f64::NAN)),
            Err(TypeConversionError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode(&sqlite, ScalarType::Date, &Value::String("18/03/2007".into())),
            Err(TypeConversionError::Malformed { .. })
        ));
        assert_eq!(
            encode(&sqlite, ScalarType::String, &Value::Int(1)),
            Err(TypeConversionError::Mismatch {
                expected: ScalarType::String,
                found: "integer"
            })
        );
        assert!(matches!(
            decode(&sqlite, ScalarType::DateTime, WireValue::Text("yesterday".into())),
            Err(TypeConversionError::Malformed { .. })
        ));
    }

    #[test]
    fn nulls_pass_through_every_type() {
        let sqlite = caps(DialectName::Sqlite);
        assert_eq!(
            encode(&sqlite, ScalarType::DateTime, &Value::Null),
            Ok(WireValue::Null)
        );
        assert_eq!(
            decode(&sqlite, ScalarType::Integer, WireValue::Null),
            Ok(Value::Null)
        );
    }

    #[test]
    fn rows_are_decoded_by_column_type() {
        let columns = vec![
            OutputColumn {
                name: "max".to_string(),
                scalar_type: Some(ScalarType::DateTime),
            },
            OutputColumn {
                name: "n".to_string(),
                scalar_type: None,
            },
        ];
        let row = decode_row(
            &caps(DialectName::Sqlite),
            &columns,
            vec![
                WireValue::Text("2007-03-18 10:55:23".to_string()),
                WireValue::Integer(3),
            ],
        )
        .unwrap();
        assert_eq!(row["max"], Value::DateTime(datetime("2007-03-18 10:55:23.0")));
        assert_eq!(row["n"], Value::Int(3));

        assert_eq!(
            decode_row(&caps(DialectName::Sqlite), &columns, vec![WireValue::Null]),
            Err(TypeConversionError::RowWidth {
                expected: 2,
                found: 1
            })
        );
    }
}
