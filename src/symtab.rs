//! Symbol table: a case-folded map from name to integer, real, or
//! delay-region, plus the disjoint target (label) namespace used for jump
//! destinations.

use crate::error::{Error, Result};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Symbol {
    Integer(i64),
    Real(f64),
    Delay { start: u32, length: u32 },
}

pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    targets: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        let mut table = SymbolTable {
            symbols: HashMap::new(),
            targets: HashMap::new(),
        };
        table.seed_predefined();
        table
    }

    fn seed_predefined(&mut self) {
        let regs: &[(&str, i64)] = &[
            ("SIN0_RATE", 0x00),
            ("SIN0_RANGE", 0x01),
            ("SIN1_RATE", 0x02),
            ("SIN1_RANGE", 0x03),
            ("RMP0_RATE", 0x04),
            ("RMP0_RANGE", 0x05),
            ("RMP1_RATE", 0x06),
            ("RMP1_RANGE", 0x07),
            ("POT0", 0x10),
            ("POT1", 0x11),
            ("POT2", 0x12),
            ("ADCL", 0x14),
            ("ADCR", 0x15),
            ("DACL", 0x16),
            ("DACR", 0x17),
            ("ADDR_PTR", 0x18),
            ("SIN0", 0),
            ("SIN1", 1),
            ("RMP0", 2),
            ("RMP1", 3),
            ("RDA", 0),
            ("SOF", 2),
            ("RDAL", 3),
            ("SIN", 0x01),
            ("COS", 0x01),
            ("REG", 0x02),
            ("COMPC", 0x04),
            ("COMPA", 0x08),
            ("RPTR2", 0x10),
            ("NA", 0x20),
            ("NEG", 0x01),
            ("GEZ", 0x02),
            ("ZRO", 0x04),
            ("ZRC", 0x08),
            ("RUN", 0x10),
        ];
        for &(name, value) in regs {
            self.symbols.insert(name.to_string(), Symbol::Integer(value));
        }
        for i in 0..32 {
            self.symbols
                .insert(format!("REG{}", i), Symbol::Integer(0x20 + i));
        }
    }

    /// Binds `name` to a fresh symbol. Redefinition is allowed (returns a
    /// warning message instead of a value); colliding with an existing target
    /// name is a hard error.
    pub fn define(&mut self, name: &str, symbol: Symbol, line: u32) -> Result<Option<String>> {
        if self.targets.contains_key(name) {
            return Err(Error::resolution(
                line,
                format!("'{}' is already bound as a target", name),
            ));
        }
        let redefined = self.symbols.insert(name.to_string(), symbol).is_some();
        Ok(if redefined {
            Some(format!("redefinition of symbol '{}'", name))
        } else {
            None
        })
    }

    pub fn define_delay(&mut self, name: &str, start: u32, length: u32, line: u32) -> Result<()> {
        self.define(name, Symbol::Delay { start, length }, line)?;
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    pub fn define_target(&mut self, name: &str, address: u32, line: u32) -> Result<()> {
        if self.symbols.contains_key(name) {
            return Err(Error::resolution(
                line,
                format!("'{}' is already bound as a symbol", name),
            ));
        }
        if self.targets.insert(name.to_string(), address).is_some() {
            return Err(Error::resolution(
                line,
                format!("target '{}' is already defined", name),
            ));
        }
        Ok(())
    }

    pub fn lookup_target(&self, name: &str) -> Option<u32> {
        self.targets.get(name).copied()
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn predefined_lookup_is_case_folded_before_insertion() {
        let table = SymbolTable::new();
        assert_eq!(table.lookup("POT0"), Some(Symbol::Integer(0x10)));
        assert_eq!(table.lookup("REG5"), Some(Symbol::Integer(0x25)));
    }

    #[test]
    fn symbol_target_namespaces_are_disjoint() {
        let mut table = SymbolTable::new();
        table.define("FOO", Symbol::Integer(1), 1).unwrap();
        assert!(table.define_target("FOO", 0, 2).is_err());

        let mut table = SymbolTable::new();
        table.define_target("BAR", 0, 1).unwrap();
        assert!(table.define("BAR", Symbol::Integer(1), 2).is_err());
    }

    #[test]
    fn redefinition_is_allowed_and_flagged() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("X", Symbol::Integer(1), 1).unwrap(), None);
        assert!(table.define("X", Symbol::Integer(2), 2).unwrap().is_some());
        assert_eq!(table.lookup("X"), Some(Symbol::Integer(2)));
    }
}
