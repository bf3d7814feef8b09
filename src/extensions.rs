/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! This module contains the extension values (decimal, datetime, ipaddr) and
//! the small registry of extension functions the evaluator dispatches to.

use crate::ast::{Type, Value};
use crate::evaluator::{EvaluationError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use smol_str::SmolStr;
use thiserror::Error;

/// Number of digits after the decimal point in a `Decimal`
const NUM_DIGITS: u32 = 4;

/// Fixed-point decimal value with four digits of precision, backed by an
/// `i64` holding the value scaled by `10^4`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Decimal {
    value: i64,
}

/// Error constructing a `Decimal`
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DecimalError {
    /// The string does not have the form `-?[0-9]+\.[0-9]+`
    #[error("`{0}` is not a well-formed decimal value")]
    FailedParse(String),
    /// More than [`NUM_DIGITS`] digits after the decimal point
    #[error("`{0}` uses more than {NUM_DIGITS} digits after the decimal point")]
    TooManyDigits(String),
    /// The value does not fit in the fixed-point representation
    #[error("overflow while parsing decimal value `{0}`")]
    Overflow(String),
}

impl Decimal {
    /// The underlying scaled integer.
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl std::str::FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (l, r) = s
            .split_once('.')
            .ok_or_else(|| DecimalError::FailedParse(s.into()))?;
        if r.is_empty() || !r.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecimalError::FailedParse(s.into()));
        }
        let len = u32::try_from(r.len()).map_err(|_| DecimalError::TooManyDigits(s.into()))?;
        if len > NUM_DIGITS {
            return Err(DecimalError::TooManyDigits(s.into()));
        }
        // the left component carries the sign; "-0.5" has l == "-0"
        let l = l
            .parse::<i64>()
            .map_err(|_| DecimalError::FailedParse(s.into()))?;
        let r = r
            .parse::<i64>()
            .map_err(|_| DecimalError::FailedParse(s.into()))?;
        let scaled_l = l
            .checked_mul(i64::pow(10, NUM_DIGITS))
            .ok_or_else(|| DecimalError::Overflow(s.into()))?;
        let scaled_r = r
            .checked_mul(i64::pow(10, NUM_DIGITS - len))
            .ok_or_else(|| DecimalError::Overflow(s.into()))?;
        let value = if s.starts_with('-') {
            scaled_l.checked_sub(scaled_r)
        } else {
            scaled_l.checked_add(scaled_r)
        }
        .ok_or_else(|| DecimalError::Overflow(s.into()))?;
        Ok(Self { value })
    }
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.value < 0 { "-" } else { "" };
        let abs = self.value.unsigned_abs();
        let int = abs / u64::pow(10, NUM_DIGITS);
        let frac = format!("{:04}", abs % u64::pow(10, NUM_DIGITS));
        // canonical form keeps at least one fractional digit
        let frac = frac.trim_end_matches('0');
        let frac = if frac.is_empty() { "0" } else { frac };
        write!(f, "{sign}{int}.{frac}")
    }
}

/// A point in time, measured in milliseconds since the Unix epoch,
/// normalized to UTC.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Datetime {
    val: i64,
}

/// Error constructing a `Datetime`
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("`{0}` is not a well-formed datetime value")]
pub struct DatetimeError(String);

impl Datetime {
    /// Milliseconds since the Unix epoch.
    pub fn millis(&self) -> i64 {
        self.val
    }

    /// This datetime as a chrono UTC timestamp, for SQL binding.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.val)
    }
}

impl From<DateTime<Utc>> for Datetime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            val: dt.timestamp_millis(),
        }
    }
}

impl std::str::FromStr for Datetime {
    type Err = DatetimeError;

    /// Accepted forms, always normalized to UTC:
    ///   - `YYYY-MM-DD`
    ///   - `YYYY-MM-DDThh:mm:ssZ`
    ///   - `YYYY-MM-DDThh:mm:ss.SSSZ`
    ///   - `YYYY-MM-DDThh:mm:ss(+|-)hhmm`
    ///   - `YYYY-MM-DDThh:mm:ss.SSS(+|-)hhmm`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let dt = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| DatetimeError(s.into()))?;
            return Ok(Self {
                val: dt.and_utc().timestamp_millis(),
            });
        }
        for fmt in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S%.3fZ"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self {
                    val: dt.and_utc().timestamp_millis(),
                });
            }
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.3f%z"] {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(Self {
                    val: dt.timestamp_millis(),
                });
            }
        }
        Err(DatetimeError(s.into()))
    }
}

impl std::fmt::Display for Datetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_utc() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "datetime({})", self.val),
        }
    }
}

/// An IP address or subnet, v4 or v6.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct IpAddr {
    addr: std::net::IpAddr,
    prefix: Option<u8>,
}

/// Error constructing an `IpAddr`
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("`{0}` is not a well-formed ip address")]
pub struct IpAddrError(String);

impl std::str::FromStr for IpAddr {
    type Err = IpAddrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (addr, prefix) = match s.split_once('/') {
            None => (s, None),
            Some((addr, prefix)) => {
                let prefix = prefix.parse::<u8>().map_err(|_| IpAddrError(s.into()))?;
                (addr, Some(prefix))
            }
        };
        let addr = addr
            .parse::<std::net::IpAddr>()
            .map_err(|_| IpAddrError(s.into()))?;
        let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
        if matches!(prefix, Some(p) if p > max_prefix) {
            return Err(IpAddrError(s.into()));
        }
        Ok(Self { addr, prefix })
    }
}

impl std::fmt::Display for IpAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.prefix {
            Some(p) => write!(f, "{}/{}", self.addr, p),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// An extension value carried by a [`Value`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExtValue {
    /// A fixed-point decimal
    Decimal(Decimal),
    /// A UTC timestamp
    Datetime(Datetime),
    /// An IP address or subnet
    IpAddr(IpAddr),
}

impl ExtValue {
    /// The runtime type of this extension value, for diagnostics.
    pub fn type_of(&self) -> Type {
        match self {
            Self::Decimal(_) => Type::Extension(SmolStr::new_static("decimal")),
            Self::Datetime(_) => Type::Extension(SmolStr::new_static("datetime")),
            Self::IpAddr(_) => Type::Extension(SmolStr::new_static("ipaddr")),
        }
    }
}

impl std::fmt::Display for ExtValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decimal(d) => write!(f, "decimal(\"{}\")", d),
            Self::Datetime(d) => write!(f, "datetime(\"{}\")", d),
            Self::IpAddr(ip) => write!(f, "ip(\"{}\")", ip),
        }
    }
}

fn constructor_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a SmolStr> {
    match args {
        [arg] => arg.get_as_string(),
        _ => Err(EvaluationError::wrong_num_arguments(
            SmolStr::new(name),
            1,
            args.len(),
        )),
    }
}

fn decimal_comparison_args(name: &str, args: &[Value]) -> Result<(Decimal, Decimal)> {
    match args {
        [lhs, rhs] => Ok((*lhs.get_as_decimal()?, *rhs.get_as_decimal()?)),
        _ => Err(EvaluationError::wrong_num_arguments(
            SmolStr::new(name),
            2,
            args.len(),
        )),
    }
}

/// Apply the extension function `name` to fully evaluated arguments.
///
/// The caller is responsible for rejecting arguments that still contain
/// unknowns; see the evaluator's handling of extension calls.
pub fn call(name: &str, args: &[Value]) -> Result<Value> {
    let parse_err = |e: &dyn std::fmt::Display| {
        EvaluationError::failed_extension_function_application(SmolStr::new(name), e.to_string())
    };
    match name {
        "decimal" => {
            let arg = constructor_arg(name, args)?;
            let d = arg
                .parse::<Decimal>()
                .map_err(|e| parse_err(&e))?;
            Ok(Value::from(ExtValue::Decimal(d)))
        }
        "datetime" => {
            let arg = constructor_arg(name, args)?;
            let d = arg
                .parse::<Datetime>()
                .map_err(|e| parse_err(&e))?;
            Ok(Value::from(ExtValue::Datetime(d)))
        }
        "ip" => {
            let arg = constructor_arg(name, args)?;
            let ip = arg.parse::<IpAddr>().map_err(|e| parse_err(&e))?;
            Ok(Value::from(ExtValue::IpAddr(ip)))
        }
        "lessThan" => {
            let (lhs, rhs) = decimal_comparison_args(name, args)?;
            Ok(Value::from(lhs < rhs))
        }
        "lessThanOrEqual" => {
            let (lhs, rhs) = decimal_comparison_args(name, args)?;
            Ok(Value::from(lhs <= rhs))
        }
        "greaterThan" => {
            let (lhs, rhs) = decimal_comparison_args(name, args)?;
            Ok(Value::from(lhs > rhs))
        }
        "greaterThanOrEqual" => {
            let (lhs, rhs) = decimal_comparison_args(name, args)?;
            Ok(Value::from(lhs >= rhs))
        }
        _ => Err(EvaluationError::unknown_extension_function(SmolStr::new(
            name,
        ))),
    }
}
