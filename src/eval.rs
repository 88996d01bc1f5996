//! Operator-precedence expression evaluator. A straight recursive-descent
//! precedence climb over the token stream; expressions carry a `Value` type
//! tag through every reduction and raise type errors mid-expression, so it
//! drives directly off the shared `Cursor` instead of building an
//! intermediate parse tree.
//!
//! Precedence, lowest to highest: `or(|) xor(^) and(&) shift(<< >>) add(+ -)
//! mul(* / //) unary(+ - ~ int) power(**)`, with `unary` binding to the power
//! base (so `-2**2` is `(-2)**2`) and `**` right-associative.

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::symtab::{Symbol, SymbolTable};
use crate::token::{IdentSuffix, Op, TokenKind};
use crate::value::Value;
use crate::Options;

fn resolve_ident(
    name: &str,
    suffix: IdentSuffix,
    symtab: &SymbolTable,
    line: u32,
) -> Result<Value> {
    let symbol = symtab
        .lookup(name)
        .ok_or_else(|| Error::resolution(line, format!("undefined symbol '{}'", name)))?;

    match suffix {
        IdentSuffix::None => Ok(match symbol {
            Symbol::Integer(i) => Value::Integer(i),
            Symbol::Real(r) => Value::Real(r),
            Symbol::Delay { start, .. } => Value::Integer(start as i64),
        }),
        IdentSuffix::Caret => match symbol {
            Symbol::Delay { start, length } => {
                Ok(Value::Integer(start as i64 + (length / 2) as i64))
            }
            _ => Err(Error::type_error(
                line,
                format!("'{}^' is only valid on a delay region", name),
            )),
        },
        IdentSuffix::Hash => match symbol {
            Symbol::Delay { start, length } => Ok(Value::Integer(start as i64 + length as i64)),
            _ => Err(Error::type_error(
                line,
                format!("'{}#' is only valid on a delay region", name),
            )),
        },
    }
}

fn parse_atom(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let line = cursor.line();
    let token = cursor.advance();
    match token.kind {
        TokenKind::Integer(i) => {
            if options.spinreals && (i == 1 || i == 2) {
                Ok(Value::Real(i as f64))
            } else {
                Ok(Value::Integer(i))
            }
        }
        TokenKind::Float(f) => Ok(Value::Real(f)),
        TokenKind::Ident(name, suffix) => resolve_ident(&name, suffix, symtab, line),
        TokenKind::Op(Op::LParen) => {
            let value = parse_or(cursor, symtab, options)?;
            match cursor.peek().kind {
                TokenKind::Op(Op::RParen) => {
                    cursor.advance();
                    Ok(value)
                }
                _ => Err(Error::syntax(cursor.line(), "missing ')'")),
            }
        }
        other => Err(Error::syntax(
            line,
            format!("unexpected token in expression: {:?}", other),
        )),
    }
}

fn parse_unary(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    match &cursor.peek().kind {
        TokenKind::Op(Op::Plus) => {
            cursor.advance();
            parse_unary(cursor, symtab, options)
        }
        TokenKind::Op(Op::Minus) => {
            cursor.advance();
            Ok(parse_unary(cursor, symtab, options)?.neg())
        }
        TokenKind::Op(Op::Tilde) => {
            let line = cursor.line();
            cursor.advance();
            parse_unary(cursor, symtab, options)?.bitnot(line)
        }
        TokenKind::Ident(name, IdentSuffix::None) if name == "INT" => {
            cursor.advance();
            Ok(parse_unary(cursor, symtab, options)?.to_int())
        }
        _ => parse_atom(cursor, symtab, options),
    }
}

/// Handles `**`, right-associative, binding tighter than any binary operator
/// to its right and with `parse_unary` as its base so a leading unary
/// operator binds to the base before `**` is applied.
fn parse_pow(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let base = parse_unary(cursor, symtab, options)?;
    if let TokenKind::Op(Op::Pow) = cursor.peek().kind {
        let line = cursor.line();
        cursor.advance();
        let rhs = parse_pow(cursor, symtab, options)?;
        base.pow(rhs, line)
    } else {
        Ok(base)
    }
}

fn parse_mul(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let mut lhs = parse_pow(cursor, symtab, options)?;
    loop {
        let op = match cursor.peek().kind {
            TokenKind::Op(op @ Op::Star) | TokenKind::Op(op @ Op::Slash) | TokenKind::Op(op @ Op::SlashSlash) => op,
            _ => break,
        };
        let line = cursor.line();
        cursor.advance();
        let rhs = parse_pow(cursor, symtab, options)?;
        lhs = match op {
            Op::Star => lhs.mul(rhs),
            Op::Slash => lhs.div(rhs),
            Op::SlashSlash => lhs.floor_div(rhs, line)?,
            _ => unreachable!(),
        };
    }
    Ok(lhs)
}

fn parse_add(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let mut lhs = parse_mul(cursor, symtab, options)?;
    loop {
        let op = match cursor.peek().kind {
            TokenKind::Op(op @ Op::Plus) | TokenKind::Op(op @ Op::Minus) => op,
            _ => break,
        };
        cursor.advance();
        let rhs = parse_mul(cursor, symtab, options)?;
        lhs = if op == Op::Plus { lhs.add(rhs) } else { lhs.sub(rhs) };
    }
    Ok(lhs)
}

fn parse_shift(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let mut lhs = parse_add(cursor, symtab, options)?;
    loop {
        let op = match cursor.peek().kind {
            TokenKind::Op(op @ Op::Shl) | TokenKind::Op(op @ Op::Shr) => op,
            _ => break,
        };
        let line = cursor.line();
        cursor.advance();
        let rhs = parse_add(cursor, symtab, options)?;
        lhs = if op == Op::Shl {
            lhs.shl(rhs, line)?
        } else {
            lhs.shr(rhs, line)?
        };
    }
    Ok(lhs)
}

fn parse_and(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let mut lhs = parse_shift(cursor, symtab, options)?;
    while matches!(cursor.peek().kind, TokenKind::Op(Op::Amp)) {
        let line = cursor.line();
        cursor.advance();
        let rhs = parse_shift(cursor, symtab, options)?;
        lhs = lhs.bitand(rhs, line)?;
    }
    Ok(lhs)
}

fn parse_xor(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let mut lhs = parse_and(cursor, symtab, options)?;
    while matches!(cursor.peek().kind, TokenKind::Op(Op::Caret)) {
        let line = cursor.line();
        cursor.advance();
        let rhs = parse_and(cursor, symtab, options)?;
        lhs = lhs.bitxor(rhs, line)?;
    }
    Ok(lhs)
}

fn parse_or(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    let mut lhs = parse_xor(cursor, symtab, options)?;
    while matches!(cursor.peek().kind, TokenKind::Op(Op::Pipe)) {
        let line = cursor.line();
        cursor.advance();
        let rhs = parse_xor(cursor, symtab, options)?;
        lhs = lhs.bitor(rhs, line)?;
    }
    Ok(lhs)
}

/// Parses one full expression from the cursor, stopping naturally at the next
/// `,`/EOL since none of the precedence levels recognize those as operators.
pub fn parse_expression(cursor: &mut Cursor, symtab: &SymbolTable, options: &Options) -> Result<Value> {
    parse_or(cursor, symtab, options)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::lex;

    fn eval(src: &str) -> Result<Value> {
        eval_with(src, &Options::default())
    }

    fn eval_with(src: &str, options: &Options) -> Result<Value> {
        let tokens = lex(src).unwrap();
        let mut cursor = Cursor::new(&tokens);
        let symtab = SymbolTable::new();
        parse_expression(&mut cursor, &symtab, options)
    }

    #[test]
    fn precedence_matches_or_through_pow() {
        assert_eq!(
            eval("1<<23|2**22|1<<19|2**15|1<<7").unwrap(),
            Value::Integer(0xC88080)
        );
    }

    #[test]
    fn unary_binds_to_power_base() {
        assert_eq!(eval("-2**2").unwrap(), Value::Integer(4));
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(eval("2**3**2").unwrap(), Value::Integer(2i64.pow(9)));
    }

    #[test]
    fn division_is_always_real() {
        assert_eq!(eval("1/2").unwrap(), Value::Real(0.5));
    }

    #[test]
    fn floor_division_is_integer_only() {
        assert_eq!(eval("7//2").unwrap(), Value::Integer(3));
        assert_eq!(eval("-7//2").unwrap(), Value::Integer(-4));
        assert!(eval("7.0//2").is_err());
    }

    #[test]
    fn complex_power_is_rejected() {
        assert!(eval("(-1)**(1/2)").is_err());
    }

    #[test]
    fn case_insensitive_predefined_lookup() {
        assert_eq!(eval("POT0").unwrap(), eval("pot0").unwrap());
    }

    #[test]
    fn spinreals_retags_one_and_two_literals() {
        let mut opts = Options::default();
        opts.spinreals = true;
        assert_eq!(eval_with("1", &opts).unwrap(), Value::Real(1.0));
        assert_eq!(eval_with("-1", &opts).unwrap(), Value::Real(-1.0));
        assert_eq!(eval_with("2", &opts).unwrap(), Value::Real(2.0));
        assert_eq!(eval_with("3", &opts).unwrap(), Value::Integer(3));
    }

    #[test]
    fn int_rounds_to_nearest() {
        assert_eq!(eval("int 1.6").unwrap(), Value::Integer(2));
        assert_eq!(eval("int 1.4").unwrap(), Value::Integer(1));
    }
}
