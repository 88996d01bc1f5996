//! The assembler driver: walks the token stream one logical statement at a
//! time, binding labels and targets, emitting instruction words, and
//! resolving deferred `skp`/`jmp` fix-ups once the source is exhausted.

use crate::cursor::Cursor;
use crate::encode::{self, Fixed, FieldKind};
use crate::error::{Error, Result, Warning};
use crate::eval;
use crate::symtab::{Symbol, SymbolTable};
use crate::token::{IdentSuffix, Token, TokenKind};
use crate::value::Value;
use crate::{Assembly, Options, PROGRAM_SIZE};

const DELAY_CEILING: u32 = 32768;

struct Fixup {
    instr_addr: usize,
    target_name: String,
    line: u32,
}

enum Offset {
    Immediate(Value),
    Deferred(String),
}

struct Driver<'a> {
    cursor: Cursor<'a>,
    symtab: SymbolTable,
    options: &'a Options,
    program: Vec<u32>,
    warnings: Vec<Warning>,
    pending_targets: Vec<String>,
    fixups: Vec<Fixup>,
    delay_cursor: u32,
}

pub fn assemble_tokens(tokens: &[Token], options: &Options) -> Result<Assembly> {
    let mut driver = Driver {
        cursor: Cursor::new(tokens),
        symtab: SymbolTable::new(),
        options,
        program: Vec::with_capacity(PROGRAM_SIZE),
        warnings: Vec::new(),
        pending_targets: Vec::new(),
        fixups: Vec::new(),
        delay_cursor: 0,
    };
    driver.run()?;
    driver.finish()
}

impl<'a> Driver<'a> {
    fn run(&mut self) -> Result<()> {
        self.cursor.skip_eols();
        while !self.cursor.at_eof() {
            self.statement()?;
            self.cursor.skip_eols();
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Assembly> {
        for fixup in std::mem::take(&mut self.fixups) {
            let target_addr = self.symtab.lookup_target(&fixup.target_name).ok_or_else(|| {
                Error::resolution(fixup.line, format!("undefined target '{}'", fixup.target_name))
            })?;
            let offset = target_addr as i64 - fixup.instr_addr as i64 - 1;
            if offset <= 0 {
                return Err(Error::range(
                    fixup.line,
                    format!("target '{}' does not follow SKP", fixup.target_name),
                ));
            }
            if offset > 63 {
                return Err(Error::range(
                    fixup.line,
                    format!("target '{}' is too large a skip", fixup.target_name),
                ));
            }
            let word = self.program[fixup.instr_addr];
            let patched = (word & !(0x3F << 21)) | ((offset as u32 & 0x3F) << 21);
            self.program[fixup.instr_addr] = patched;
        }

        if self.program.len() < PROGRAM_SIZE {
            if self.options.explicit_nop_fill {
                while self.program.len() < PROGRAM_SIZE {
                    self.program.push(encode::encode_skp(0, 0, encode::OP_SKP));
                }
            } else {
                let first_empty = self.program.len() as u32;
                let n = 127 - first_empty;
                self.program.push(encode::encode_skp(0, n, encode::OP_SKP));
                while self.program.len() < PROGRAM_SIZE {
                    self.program.push(encode::encode_skp(0, 0, encode::OP_SKP));
                }
            }
        }

        Ok(Assembly {
            program: self.program,
            warnings: self.warnings,
        })
    }

    fn statement(&mut self) -> Result<()> {
        let line = self.cursor.line();
        match self.cursor.peek().kind.clone() {
            TokenKind::Label(name) => {
                self.cursor.advance();
                self.pending_targets.push(name);
            }
            TokenKind::Ident(name, IdentSuffix::None) if name == "EQU" => {
                self.cursor.advance();
                self.define_symbol_statement(line)?;
            }
            TokenKind::Ident(name, IdentSuffix::None) if name == "MEM" => {
                self.cursor.advance();
                self.mem_statement(line)?;
            }
            TokenKind::Ident(name, IdentSuffix::None)
                if matches!(&self.cursor.peek_at(1).kind, TokenKind::Ident(kw, IdentSuffix::None) if kw == "EQU") =>
            {
                self.cursor.advance();
                self.cursor.advance();
                self.define_symbol(&name, line)?;
            }
            TokenKind::Ident(name, IdentSuffix::None) => {
                self.cursor.advance();
                self.instruction_statement(&name, line)?;
            }
            other => {
                return Err(Error::syntax(line, format!("unexpected statement start: {:?}", other)));
            }
        }
        Ok(())
    }

    fn define_symbol_statement(&mut self, line: u32) -> Result<()> {
        let name = match self.cursor.advance().kind {
            TokenKind::Ident(name, IdentSuffix::None) => name,
            other => return Err(Error::syntax(line, format!("expected name after EQU, found {:?}", other))),
        };
        self.define_symbol(&name, line)
    }

    fn define_symbol(&mut self, name: &str, line: u32) -> Result<()> {
        let value = eval::parse_expression(&mut self.cursor, &self.symtab, self.options)?;
        let symbol = match value {
            Value::Integer(i) => Symbol::Integer(i),
            Value::Real(r) => Symbol::Real(r),
        };
        if let Some(message) = self.symtab.define(name, symbol, line)? {
            self.warnings.push(Warning { line, message });
        }
        self.expect_eol(line)
    }

    fn mem_statement(&mut self, line: u32) -> Result<()> {
        let name = match self.cursor.advance().kind {
            TokenKind::Ident(name, IdentSuffix::None) => name,
            other => return Err(Error::syntax(line, format!("expected name after MEM, found {:?}", other))),
        };
        let value = eval::parse_expression(&mut self.cursor, &self.symtab, self.options)?;
        let length = match value {
            Value::Integer(i) if i >= 0 => i as u32,
            Value::Integer(_) => return Err(Error::type_error(line, "MEM length must be non-negative")),
            Value::Real(_) => return Err(Error::type_error(line, "MEM length must be an integer")),
        };
        let start = self.delay_cursor;
        let new_cursor = start + length + 1;
        if new_cursor > DELAY_CEILING {
            return Err(Error::range(line, "Delay exhausted"));
        }
        self.delay_cursor = new_cursor;
        self.symtab.define_delay(&name, start, length, line)?;
        self.expect_eol(line)
    }

    fn expect_eol(&mut self, line: u32) -> Result<()> {
        if self.cursor.at_eol_or_eof() {
            Ok(())
        } else {
            Err(Error::syntax(line, "too many operands"))
        }
    }

    fn parse_operands(&mut self, max: usize) -> Result<Vec<Value>> {
        let mut operands = Vec::new();
        if self.cursor.at_eol_or_eof() {
            return Ok(operands);
        }
        loop {
            if operands.len() >= max {
                return Err(Error::syntax(self.cursor.line(), "too many operands"));
            }
            operands.push(eval::parse_expression(&mut self.cursor, &self.symtab, self.options)?);
            match self.cursor.peek().kind {
                TokenKind::ArgSep => {
                    self.cursor.advance();
                }
                _ => break,
            }
        }
        self.expect_eol(self.cursor.line())?;
        Ok(operands)
    }

    fn operand(operands: &[Value], index: usize, line: u32, name: &str) -> Result<Value> {
        operands
            .get(index)
            .copied()
            .ok_or_else(|| Error::syntax(line, format!("missing operand '{}'", name)))
    }

    /// Parses the trailing offset operand of `skp`/`jmp`: a bare identifier
    /// that is not (yet) a bound symbol is read as a deferred target name
    /// rather than evaluated.
    fn parse_skp_offset(&mut self) -> Result<Offset> {
        if let TokenKind::Ident(name, IdentSuffix::None) = self.cursor.peek().kind.clone() {
            let next_is_terminal = matches!(
                self.cursor.peek_at(1).kind,
                TokenKind::ArgSep | TokenKind::Eol | TokenKind::Eof
            );
            if next_is_terminal && self.symtab.lookup(&name).is_none() {
                self.cursor.advance();
                return Ok(Offset::Deferred(name));
            }
        }
        let value = eval::parse_expression(&mut self.cursor, &self.symtab, self.options)?;
        Ok(Offset::Immediate(value))
    }

    /// Binds any labels queued ahead of this instruction to its address and
    /// returns that address.
    fn bind_pending_targets(&mut self, line: u32) -> Result<usize> {
        let addr = self.program.len();
        if addr >= PROGRAM_SIZE {
            return Err(Error::range(line, "instruction count exceeds 128"));
        }
        for name in std::mem::take(&mut self.pending_targets) {
            self.symtab.define_target(&name, addr as u32, line)?;
        }
        Ok(addr)
    }

    fn emit(&mut self, word: u32) {
        self.program.push(word);
    }

    fn field(&mut self, value: Value, kind: FieldKind, name: &str, line: u32) -> Result<u32> {
        let (field, warning) = encode::coerce_field(value, kind, self.options, name, line)?;
        if let Some(message) = warning {
            self.warnings.push(Warning { line, message });
        }
        Ok(field)
    }

    fn instruction_statement(&mut self, mnemonic: &str, line: u32) -> Result<()> {
        match mnemonic {
            "SKP" => self.skp_statement(line, false),
            "JMP" => self.skp_statement(line, true),
            "NOP" => {
                self.expect_eol(line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_skp(0, 0, encode::OP_SKP));
                Ok(())
            }
            "CHO" => self.cho_statement(line),
            "RAW" => {
                let operands = self.parse_operands(1)?;
                let value = Self::operand(&operands, 0, line, "VAL")?;
                let word = self.field(value, FieldKind::Uint(32), "VAL", line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_raw(word));
                Ok(())
            }
            _ => self.alu_statement(mnemonic, line),
        }
    }

    fn skp_statement(&mut self, line: u32, is_jmp: bool) -> Result<()> {
        let cond = if is_jmp {
            Value::Integer(0)
        } else {
            let value = eval::parse_expression(&mut self.cursor, &self.symtab, self.options)?;
            if !matches!(self.cursor.peek().kind, TokenKind::ArgSep) {
                return Err(Error::syntax(line, "missing operand 'OFF'"));
            }
            self.cursor.advance();
            value
        };
        let offset = self.parse_skp_offset()?;
        self.expect_eol(line)?;

        let cond_field = self.field(cond, FieldKind::Uint(5), "COND", line)?;
        let addr = self.bind_pending_targets(line)?;

        match offset {
            Offset::Immediate(value) => {
                let off_field = self.field(value, FieldKind::Uint(6), "OFF", line)?;
                self.emit(encode::encode_skp(cond_field, off_field, encode::OP_SKP));
            }
            Offset::Deferred(target_name) => {
                self.emit(encode::encode_skp(cond_field, 0, encode::OP_SKP));
                self.fixups.push(Fixup {
                    instr_addr: addr,
                    target_name,
                    line,
                });
            }
        }
        Ok(())
    }

    fn cho_statement(&mut self, line: u32) -> Result<()> {
        let operands = self.parse_operands(4)?;
        if operands.len() < 2 {
            return Err(Error::syntax(line, "missing operand 'LFO'"));
        }
        let type_value = operands[0];
        let lfo_value = operands[1];
        let is_rdal = matches!(type_value, Value::Integer(3));
        let flags_value = if operands.len() >= 3 {
            operands[2]
        } else if is_rdal {
            Value::Integer(0x02)
        } else {
            return Err(Error::syntax(line, "missing operand 'FLAGS'"));
        };
        let addr_value = if operands.len() == 4 { operands[3] } else { Value::Integer(0) };

        let type_field = self.field(type_value, FieldKind::Uint(2), "TYPE", line)?;
        let lfo_field = self.field(lfo_value, FieldKind::Uint(2), "LFO", line)?;
        let flags_field = self.field(flags_value, FieldKind::Uint(6), "FLAGS", line)?;
        let addr_field = self.field(addr_value, FieldKind::Fixed(Fixed::S_15), "ADDR", line)?;

        self.bind_pending_targets(line)?;
        self.emit(encode::encode_cho(type_field, flags_field, lfo_field, addr_field));
        Ok(())
    }

    fn alu_statement(&mut self, mnemonic: &str, line: u32) -> Result<()> {
        match mnemonic {
            "RDA" => self.addr_mult(line, encode::OP_RDA),
            "WRA" => self.addr_mult(line, encode::OP_WRA),
            "WRAP" => self.addr_mult(line, encode::OP_WRAP),
            "RMPA" => {
                let operands = self.parse_operands(1)?;
                let mult = Self::operand(&operands, 0, line, "MULT")?;
                let mult_field = self.field(mult, FieldKind::Fixed(Fixed::S1_9), "MULT", line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_addr_mult(0, mult_field, encode::OP_RMPA));
                Ok(())
            }
            "RDAX" => self.reg_mult(line, encode::OP_RDAX),
            "RDFX" => self.reg_mult(line, encode::OP_RDFX),
            "WRAX" => self.reg_mult(line, encode::OP_WRAX),
            "WRHX" => self.reg_mult(line, encode::OP_WRHX),
            "WRLX" => self.reg_mult(line, encode::OP_WRLX),
            "MAXX" => self.reg_mult(line, encode::OP_MAXX),
            // ldax shares RDFX's opcode (0x05), not RDAX's (0x04).
            "LDAX" => {
                let operands = self.parse_operands(1)?;
                let reg = Self::operand(&operands, 0, line, "REG")?;
                self.emit_reg_mult(reg, Value::Integer(0), line, encode::OP_RDFX)
            }
            "MULX" => {
                let operands = self.parse_operands(1)?;
                let reg = Self::operand(&operands, 0, line, "REG")?;
                let reg_field = self.field(reg, FieldKind::Uint(6), "REG", line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_reg(reg_field, encode::OP_MULX));
                Ok(())
            }
            "LOG" => self.mult_offset(line, Fixed::S4_6, encode::OP_LOG),
            "EXP" => self.mult_offset(line, Fixed::S4_6, encode::OP_EXP),
            "SOF" => self.mult_offset(line, Fixed::S_10, encode::OP_SOF),
            "AND" => self.mask(line, encode::OP_AND),
            "CLR" => {
                self.expect_eol(line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_mask(0, encode::OP_AND));
                Ok(())
            }
            "OR" => self.mask(line, encode::OP_OR),
            "XOR" => self.mask(line, encode::OP_XOR),
            "NOT" => {
                self.expect_eol(line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_mask(0xFFFFFF, encode::OP_XOR));
                Ok(())
            }
            "ABSA" => {
                self.expect_eol(line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_reg_mult(0, 0, encode::OP_MAXX));
                Ok(())
            }
            "WLDS" => {
                let operands = self.parse_operands(3)?;
                let lfo = Self::operand(&operands, 0, line, "LFO")?;
                let freq = Self::operand(&operands, 1, line, "FREQ")?;
                let amp = Self::operand(&operands, 2, line, "AMP")?;
                let lfo_field = self.field(lfo, FieldKind::Uint(2), "LFO", line)?;
                let freq_field = self.field(freq, FieldKind::Uint(9), "FREQ", line)?;
                let amp_field = self.field(amp, FieldKind::Uint(15), "AMP", line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_wlds(lfo_field & 0x1, freq_field, amp_field));
                Ok(())
            }
            "WLDR" => {
                let operands = self.parse_operands(3)?;
                let lfo = Self::operand(&operands, 0, line, "LFO")?;
                let freq = Self::operand(&operands, 1, line, "FREQ")?;
                let amp = Self::operand(&operands, 2, line, "AMP")?;
                let lfo_field = self.field(lfo, FieldKind::Uint(2), "LFO", line)?;
                let freq_field = self.field(freq, FieldKind::Uint(16), "FREQ", line)?;
                let amp_field = self.field(amp, FieldKind::Uint(8), "AMP", line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_wldr(lfo_field & 0x1, freq_field, amp_field));
                Ok(())
            }
            "JAM" => {
                let operands = self.parse_operands(1)?;
                let lfo = Self::operand(&operands, 0, line, "LFO")?;
                let lfo_field = self.field(lfo, FieldKind::Uint(2), "LFO", line)?;
                self.bind_pending_targets(line)?;
                self.emit(encode::encode_jam(lfo_field & 0x1));
                Ok(())
            }
            other => Err(Error::syntax(line, format!("unknown mnemonic '{}'", other))),
        }
    }

    fn addr_mult(&mut self, line: u32, opcode: u32) -> Result<()> {
        let operands = self.parse_operands(2)?;
        let addr = Self::operand(&operands, 0, line, "ADDR")?;
        let mult = Self::operand(&operands, 1, line, "MULT")?;
        let addr_field = self.field(addr, FieldKind::Uint(15), "ADDR", line)?;
        let mult_field = self.field(mult, FieldKind::Fixed(Fixed::S1_9), "MULT", line)?;
        self.bind_pending_targets(line)?;
        self.emit(encode::encode_addr_mult(addr_field, mult_field, opcode));
        Ok(())
    }

    fn reg_mult(&mut self, line: u32, opcode: u32) -> Result<()> {
        let operands = self.parse_operands(2)?;
        let reg = Self::operand(&operands, 0, line, "REG")?;
        let mult = Self::operand(&operands, 1, line, "MULT")?;
        self.emit_reg_mult(reg, mult, line, opcode)
    }

    fn emit_reg_mult(&mut self, reg: Value, mult: Value, line: u32, opcode: u32) -> Result<()> {
        let reg_field = self.field(reg, FieldKind::Uint(6), "REG", line)?;
        let mult_field = self.field(mult, FieldKind::Fixed(Fixed::S1_14), "MULT", line)?;
        self.bind_pending_targets(line)?;
        self.emit(encode::encode_reg_mult(reg_field, mult_field, opcode));
        Ok(())
    }

    fn mult_offset(&mut self, line: u32, offset_format: Fixed, opcode: u32) -> Result<()> {
        let operands = self.parse_operands(2)?;
        let mult = Self::operand(&operands, 0, line, "MULT")?;
        let offset = Self::operand(&operands, 1, line, "OFF")?;
        let mult_field = self.field(mult, FieldKind::Fixed(Fixed::S1_14), "MULT", line)?;
        let offset_field = self.field(offset, FieldKind::Fixed(offset_format), "OFF", line)?;
        self.bind_pending_targets(line)?;
        self.emit(encode::encode_mult_offset(mult_field, offset_field, opcode));
        Ok(())
    }

    fn mask(&mut self, line: u32, opcode: u32) -> Result<()> {
        let operands = self.parse_operands(1)?;
        let val = Self::operand(&operands, 0, line, "VAL")?;
        let val_field = self.field(val, FieldKind::Fixed(Fixed::S_23), "VAL", line)?;
        self.bind_pending_targets(line)?;
        self.emit(encode::encode_mask(val_field, opcode));
        Ok(())
    }
}
