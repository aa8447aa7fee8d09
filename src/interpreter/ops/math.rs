//! Arithmetic, comparison and logic
//!
//! Integer arithmetic is checked: a result outside `i64` raises `overflow`
//! rather than wrapping. Mixing an integer with a decimal gives a decimal.
//! Pairs combine element-wise with pairs and scale by numbers.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::ErrorId;
use crate::interpreter::natives::{Call, NativeTable};
use crate::interpreter::unwind::Eval;
use crate::memory::value::Value;
use std::cmp::Ordering;

pub const NATIVES: NativeTable = &[
    ("add", "value1 [number! pair! char!] value2 [number! pair! char!]", native_add),
    ("subtract", "value1 [number! pair! char!] value2 [number! pair! char!]", native_subtract),
    ("multiply", "value1 [number! pair!] value2 [number! pair!]", native_multiply),
    ("divide", "value1 [number! pair!] value2 [number! pair!]", native_divide),
    ("remainder", "value1 [number!] value2 [number!]", native_remainder),
    ("negate", "value [number! pair!]", native_negate),
    ("abs", "value [number! pair!]", native_abs),
    ("min", "value1 [any-value!] value2 [any-value!]", native_min),
    ("max", "value1 [any-value!] value2 [any-value!]", native_max),
    ("even?", "value [integer!]", native_even),
    ("odd?", "value [integer!]", native_odd),
    ("zero?", "value [number! pair!]", native_zero),
    ("equal?", "value1 [any-type!] value2 [any-type!]", native_equal),
    ("strict-equal?", "value1 [any-type!] value2 [any-type!]", native_strict_equal),
    ("lesser?", "value1 [any-value!] value2 [any-value!]", native_lesser),
    ("greater?", "value1 [any-value!] value2 [any-value!]", native_greater),
];

/// Infix operators; the left operand is the first parameter
pub const INFIX: NativeTable = &[
    ("+", "value1 [number! pair! char!] value2 [number! pair! char!]", native_add),
    ("-", "value1 [number! pair! char!] value2 [number! pair! char!]", native_subtract),
    ("*", "value1 [number! pair!] value2 [number! pair!]", native_multiply),
    ("/", "value1 [number! pair!] value2 [number! pair!]", native_divide),
    ("//", "value1 [number!] value2 [number!]", native_remainder),
    ("=", "value1 [any-type!] value2 [any-type!]", native_equal),
    ("==", "value1 [any-type!] value2 [any-type!]", native_strict_equal),
    ("<>", "value1 [any-type!] value2 [any-type!]", native_not_equal),
    ("<", "value1 [any-value!] value2 [any-value!]", native_lesser),
    (">", "value1 [any-value!] value2 [any-value!]", native_greater),
    ("<=", "value1 [any-value!] value2 [any-value!]", native_lesser_or_equal),
    (">=", "value1 [any-value!] value2 [any-value!]", native_greater_or_equal),
    ("and", "value1 [any-value!] value2 [any-value!]", native_and),
    ("or", "value1 [any-value!] value2 [any-value!]", native_or),
    ("xor", "value1 [any-value!] value2 [any-value!]", native_xor),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

impl Op {
    fn checked(self, a: i64, b: i64) -> Option<i64> {
        match self {
            Op::Add => a.checked_add(b),
            Op::Subtract => a.checked_sub(b),
            Op::Multiply => a.checked_mul(b),
            Op::Divide => a.checked_div(b),
            Op::Remainder => (b != 0).then(|| a.wrapping_rem(b)),
        }
    }

    fn float(self, a: f64, b: f64) -> f64 {
        match self {
            Op::Add => a + b,
            Op::Subtract => a - b,
            Op::Multiply => a * b,
            Op::Divide => a / b,
            Op::Remainder => a % b,
        }
    }

    fn divides(self) -> bool {
        matches!(self, Op::Divide | Op::Remainder)
    }
}

impl Interpreter {
    fn arithmetic(&mut self, op: Op, a: Value, b: Value) -> Eval {
        let zero = match b {
            Value::Integer(0) => true,
            Value::Decimal(d) => d == 0.0,
            Value::Pair(x, y) => x == 0 || y == 0,
            _ => false,
        };
        if op.divides() && zero {
            return Err(self.error(ErrorId::ZeroDivide, &[]));
        }
        match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => {
                if op == Op::Divide && x.wrapping_rem(y) != 0 {
                    return Ok(Value::Decimal(x as f64 / y as f64));
                }
                match op.checked(x, y) {
                    Some(n) => Ok(Value::Integer(n)),
                    None => Err(self.error(ErrorId::Overflow, &[])),
                }
            }
            (Value::Integer(_) | Value::Decimal(_), Value::Integer(_) | Value::Decimal(_)) => {
                let (x, y) = (a.as_decimal().unwrap_or(0.0), b.as_decimal().unwrap_or(0.0));
                let result = op.float(x, y);
                if result.is_finite() {
                    Ok(Value::Decimal(result))
                } else {
                    Err(self.error(ErrorId::Overflow, &[]))
                }
            }
            (Value::Pair(x1, y1), Value::Pair(x2, y2)) => {
                let x = self.pair_axis(op, x1, x2)?;
                let y = self.pair_axis(op, y1, y2)?;
                Ok(Value::Pair(x, y))
            }
            (Value::Pair(x1, y1), Value::Integer(n)) => {
                let n = i32::try_from(n).map_err(|_| self.error(ErrorId::Overflow, &[]))?;
                let x = self.pair_axis(op, x1, n)?;
                let y = self.pair_axis(op, y1, n)?;
                Ok(Value::Pair(x, y))
            }
            (Value::Char(c), Value::Integer(n)) if matches!(op, Op::Add | Op::Subtract) => {
                let code = op.checked(c as i64, n);
                match code.and_then(|code| u32::try_from(code).ok()).and_then(char::from_u32) {
                    Some(c) => Ok(Value::Char(c)),
                    None => Err(self.error(ErrorId::Overflow, &[])),
                }
            }
            (Value::Char(x), Value::Char(y)) if op == Op::Subtract => Ok(Value::Integer(x as i64 - y as i64)),
            _ => Err(self.error(ErrorId::InvalidArg, &[b])),
        }
    }

    fn pair_axis(&mut self, op: Op, a: i32, b: i32) -> Eval<i32> {
        op.checked(a as i64, b as i64)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| self.error(ErrorId::Overflow, &[]))
    }

    /// Ordering for `<`, `>`, `min`, `max`; incomparable values are an error
    fn ordering(&mut self, a: Value, b: Value) -> Eval<Ordering> {
        match self.compare_values(&a, &b, false) {
            Some(ordering) => Ok(ordering),
            None => Err(self.error(ErrorId::InvalidArg, &[b])),
        }
    }
}

fn native_add(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.arithmetic(Op::Add, call.arg(0), call.arg(1))
}

fn native_subtract(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.arithmetic(Op::Subtract, call.arg(0), call.arg(1))
}

fn native_multiply(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.arithmetic(Op::Multiply, call.arg(0), call.arg(1))
}

fn native_divide(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.arithmetic(Op::Divide, call.arg(0), call.arg(1))
}

fn native_remainder(interp: &mut Interpreter, call: &Call) -> Eval {
    interp.arithmetic(Op::Remainder, call.arg(0), call.arg(1))
}

fn native_negate(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.arg(0) {
        Value::Integer(n) => n
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| interp.error(ErrorId::Overflow, &[])),
        Value::Decimal(d) => Ok(Value::Decimal(-d)),
        Value::Pair(x, y) => match (x.checked_neg(), y.checked_neg()) {
            (Some(x), Some(y)) => Ok(Value::Pair(x, y)),
            _ => Err(interp.error(ErrorId::Overflow, &[])),
        },
        other => Err(interp.error(ErrorId::InvalidArg, &[other])),
    }
}

fn native_abs(interp: &mut Interpreter, call: &Call) -> Eval {
    match call.arg(0) {
        Value::Integer(n) => n
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| interp.error(ErrorId::Overflow, &[])),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        Value::Pair(x, y) => match (x.checked_abs(), y.checked_abs()) {
            (Some(x), Some(y)) => Ok(Value::Pair(x, y)),
            _ => Err(interp.error(ErrorId::Overflow, &[])),
        },
        other => Err(interp.error(ErrorId::InvalidArg, &[other])),
    }
}

fn native_min(interp: &mut Interpreter, call: &Call) -> Eval {
    let (a, b) = (call.arg(0), call.arg(1));
    Ok(if interp.ordering(a, b)? == Ordering::Greater { b } else { a })
}

fn native_max(interp: &mut Interpreter, call: &Call) -> Eval {
    let (a, b) = (call.arg(0), call.arg(1));
    Ok(if interp.ordering(a, b)? == Ordering::Less { b } else { a })
}

fn native_even(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(call.int(interp, 0)? % 2 == 0))
}

fn native_odd(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(call.int(interp, 0)? % 2 != 0))
}

fn native_zero(_: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(match call.arg(0) {
        Value::Integer(n) => n == 0,
        Value::Decimal(d) => d == 0.0,
        Value::Pair(x, y) => x == 0 && y == 0,
        _ => false,
    }))
}

fn native_equal(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(interp.values_equal(&call.arg(0), &call.arg(1), false)))
}

fn native_strict_equal(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(interp.values_equal(&call.arg(0), &call.arg(1), true)))
}

fn native_not_equal(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(!interp.values_equal(&call.arg(0), &call.arg(1), false)))
}

fn native_lesser(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(interp.ordering(call.arg(0), call.arg(1))? == Ordering::Less))
}

fn native_greater(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(interp.ordering(call.arg(0), call.arg(1))? == Ordering::Greater))
}

fn native_lesser_or_equal(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(interp.ordering(call.arg(0), call.arg(1))? != Ordering::Greater))
}

fn native_greater_or_equal(interp: &mut Interpreter, call: &Call) -> Eval {
    Ok(Value::Logic(interp.ordering(call.arg(0), call.arg(1))? != Ordering::Less))
}

/// Two integers combine bitwise; any other pair by truthiness
fn logic_op(_: &mut Interpreter, call: &Call, bits: fn(i64, i64) -> i64, truth: fn(bool, bool) -> bool) -> Eval {
    match (call.arg(0), call.arg(1)) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(bits(a, b))),
        (a, b) => Ok(Value::Logic(truth(a.is_truthy(), b.is_truthy()))),
    }
}

fn native_and(interp: &mut Interpreter, call: &Call) -> Eval {
    logic_op(interp, call, |a, b| a & b, |a, b| a && b)
}

fn native_or(interp: &mut Interpreter, call: &Call) -> Eval {
    logic_op(interp, call, |a, b| a | b, |a, b| a || b)
}

fn native_xor(interp: &mut Interpreter, call: &Call) -> Eval {
    logic_op(interp, call, |a, b| a ^ b, |a, b| a != b)
}

#[cfg(test)]
mod tests {
    use crate::interpreter::engine::Interpreter;

    fn eval(source: &str) -> String {
        let mut interp = Interpreter::new();
        match interp.eval_molded(source) {
            Ok(text) => text,
            Err(failure) => format!("failed: {}", failure.report().map(|r| r.id.clone()).unwrap_or_default()),
        }
    }

    #[test]
    fn test_infix_is_left_to_right() {
        assert_eq!(eval("1 + 2 * 3"), "9");
        assert_eq!(eval("2 * 3 + 1"), "7");
        assert_eq!(eval("10 - 2 - 3"), "5");
        assert_eq!(eval("1 + (2 * 3)"), "7");
    }

    #[test]
    fn test_division() {
        assert_eq!(eval("6 / 3"), "2");
        assert_eq!(eval("7 / 2"), "3.5");
        assert_eq!(eval("7 // 2"), "1");
        assert_eq!(eval("1 / 0"), "failed: zero-divide");
        assert_eq!(eval("1.0 / 0"), "failed: zero-divide");
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert_eq!(eval("9223372036854775807 + 1"), "failed: overflow");
        assert_eq!(eval("negate -9223372036854775807 - 1"), "failed: overflow");
        assert_eq!(eval("-9223372036854775807 - 1 / -1"), "failed: overflow");
        assert_eq!(eval("-9223372036854775807 - 1 // -1"), "0");
        assert_eq!(eval("-9223372036854775807 - 1 / 2"), "-4611686018427387904");
    }

    #[test]
    fn test_mixed_and_pairs() {
        assert_eq!(eval("1 + 0.5"), "1.5");
        assert_eq!(eval("10x20 + 1x2"), "11x22");
        assert_eq!(eval("2x3 * 2"), "4x6");
        assert_eq!(eval("#\"a\" + 1"), "#\"b\"");
    }

    #[test]
    fn test_comparison() {
        assert_eq!(eval("1 < 2"), "true");
        assert_eq!(eval("\"abc\" = \"ABC\""), "true");
        assert_eq!(eval("\"abc\" == \"ABC\""), "false");
        assert_eq!(eval("1 = 1.0"), "true");
        assert_eq!(eval("max 3 9"), "9");
        assert_eq!(eval("1 < \"a\""), "failed: invalid-arg");
    }

    #[test]
    fn test_cyclic_blocks_compare() {
        let source = "a: copy [1] append/only a a b: copy [1] append/only b b";
        assert_eq!(eval(&format!("{} equal? a b", source)), "true");
        assert_eq!(eval(&format!("{} append b 2 equal? a b", source)), "false");
        assert_eq!(eval(&format!("{} a < b", source)), "false");
    }

    #[test]
    fn test_logic_ops() {
        assert_eq!(eval("true and false"), "false");
        assert_eq!(eval("none or 1"), "true");
        assert_eq!(eval("6 and 3"), "2");
        assert_eq!(eval("true xor true"), "false");
        assert_eq!(eval("none and 1"), "false");
        assert_eq!(eval("1 xor false"), "true");
    }
}
