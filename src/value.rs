//! The tagged scalar threaded through the expression evaluator: every
//! intermediate result is either an integer or a real, and the tag is
//! preserved explicitly rather than relying on an implicit numeric tower.

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
}

impl Value {
    pub fn is_real(self) -> bool {
        matches!(self, Value::Real(_))
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Integer(i) => i as f64,
            Value::Real(r) => r,
        }
    }

    /// `int`: rounds a real to the nearest integer (half-away-from-zero); a
    /// no-op on integers.
    pub fn to_int(self) -> Value {
        match self {
            Value::Integer(i) => Value::Integer(i),
            Value::Real(r) => Value::Integer(r.round() as i64),
        }
    }

    fn require_int(self, line: u32, op: &str) -> Result<i64> {
        match self {
            Value::Integer(i) => Ok(i),
            Value::Real(_) => Err(Error::type_error(
                line,
                format!("'{}' requires integer operands", op),
            )),
        }
    }

    pub fn bitor(self, rhs: Value, line: u32) -> Result<Value> {
        Ok(Value::Integer(
            self.require_int(line, "|")? | rhs.require_int(line, "|")?,
        ))
    }

    pub fn bitxor(self, rhs: Value, line: u32) -> Result<Value> {
        Ok(Value::Integer(
            self.require_int(line, "^")? ^ rhs.require_int(line, "^")?,
        ))
    }

    pub fn bitand(self, rhs: Value, line: u32) -> Result<Value> {
        Ok(Value::Integer(
            self.require_int(line, "&")? & rhs.require_int(line, "&")?,
        ))
    }

    pub fn shl(self, rhs: Value, line: u32) -> Result<Value> {
        let a = self.require_int(line, "<<")?;
        let b = rhs.require_int(line, "<<")?;
        if b < 0 {
            return Err(Error::type_error(line, "negative shift count"));
        }
        Ok(Value::Integer(if b >= 64 { 0 } else { a << b }))
    }

    pub fn shr(self, rhs: Value, line: u32) -> Result<Value> {
        let a = self.require_int(line, ">>")?;
        let b = rhs.require_int(line, ">>")?;
        if b < 0 {
            return Err(Error::type_error(line, "negative shift count"));
        }
        Ok(Value::Integer(if b >= 64 { a >> 63 } else { a >> b }))
    }

    pub fn add(self, rhs: Value) -> Value {
        match (self, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a + b),
            _ => Value::Real(self.as_f64() + rhs.as_f64()),
        }
    }

    pub fn sub(self, rhs: Value) -> Value {
        match (self, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a - b),
            _ => Value::Real(self.as_f64() - rhs.as_f64()),
        }
    }

    pub fn neg(self) -> Value {
        match self {
            Value::Integer(i) => Value::Integer(-i),
            Value::Real(r) => Value::Real(-r),
        }
    }

    pub fn mul(self, rhs: Value) -> Value {
        match (self, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a * b),
            _ => Value::Real(self.as_f64() * rhs.as_f64()),
        }
    }

    /// `/` is always true division.
    pub fn div(self, rhs: Value) -> Value {
        Value::Real(self.as_f64() / rhs.as_f64())
    }

    /// `//` is integer floor division; mixed or real operands are a type
    /// error.
    pub fn floor_div(self, rhs: Value, line: u32) -> Result<Value> {
        let a = self.require_int(line, "//")?;
        let b = rhs.require_int(line, "//")?;
        if b == 0 {
            return Err(Error::type_error(line, "division by zero"));
        }
        let q = a / b;
        let r = a % b;
        let floored = if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q };
        Ok(Value::Integer(floored))
    }

    pub fn bitnot(self, line: u32) -> Result<Value> {
        Ok(Value::Integer(!self.require_int(line, "~")?))
    }

    /// `**`: real if either operand is real or the exponent is negative;
    /// integer otherwise. A `NaN` result (fractional power of a negative
    /// base) is reported as an invalid/complex expression.
    pub fn pow(self, rhs: Value, line: u32) -> Result<Value> {
        let rhs_negative = match rhs {
            Value::Integer(i) => i < 0,
            Value::Real(r) => r < 0.0,
        };

        if !self.is_real() && !rhs.is_real() && !rhs_negative {
            let base = self.require_int(line, "**")?;
            let exp = rhs.require_int(line, "**")? as u32;
            return Ok(Value::Integer(base.wrapping_pow(exp)));
        }

        let result = self.as_f64().powf(rhs.as_f64());
        if result.is_nan() {
            return Err(Error::type_error(line, "invalid expression"));
        }
        Ok(Value::Real(result))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn floor_div_rounds_toward_negative_infinity() {
        assert_eq!(
            Value::Integer(-7).floor_div(Value::Integer(2), 1).unwrap(),
            Value::Integer(-4)
        );
        assert_eq!(
            Value::Integer(7).floor_div(Value::Integer(2), 1).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn pow_promotes_to_real_on_negative_exponent() {
        assert_eq!(
            Value::Integer(2).pow(Value::Integer(-1), 1).unwrap(),
            Value::Real(0.5)
        );
    }

    #[test]
    fn pow_rejects_complex_result() {
        let base = Value::Integer(-1);
        let exp = Value::Integer(1).div(Value::Integer(2));
        assert!(base.pow(exp, 1).is_err());
    }

    #[test]
    fn shift_rejects_negative_count() {
        assert!(Value::Integer(1).shl(Value::Integer(-1), 1).is_err());
    }

    #[test]
    fn bitwise_rejects_real_operand() {
        assert!(Value::Real(1.0).bitor(Value::Integer(1), 1).is_err());
    }
}
