//! A minimal in-memory scanner (`SPEC_FULL.md` §9.7): source text to a
//! top-level array of cells, recursing into nested `[...]`/`(...)`.
//!
//! Grounded on the teacher's `parse.rs` tokenizer shape (character-class
//! dispatch over a cursor) but radically narrowed: this crate's native
//! library only ever needs integers, decimals, words and their set/get/lit
//! variants, block/group delimiters, text literals, and the small set of
//! path shapes §8's scenarios exercise (`action/refinement`,
//! `word/field`, `word/(group)`). A general Rebol-family scanner (escaped
//! strings, radix literals, tuples, dates, bitsets, ...) is out of scope.

use crate::{
    array::{ArrayFlags, Arrays},
    binding::Binding,
    cell::{Cell, CellData},
    error::{ExecError, RunResult},
    symbol::SymbolTable,
};

struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    symbols: &'a mut SymbolTable,
    arrays: &'a mut Arrays,
    texts: &'a mut crate::text::Texts,
}

/// Scans `source` into a freshly-allocated top-level array of cells.
///
/// # Errors
/// Returns [`ExecError::User`] on unbalanced brackets or an unterminated
/// string literal.
pub fn scan(symbols: &mut SymbolTable, arrays: &mut Arrays, texts: &mut crate::text::Texts, source: &str) -> RunResult<crate::ids::ArrayId> {
    let mut scanner = Scanner { chars: source.chars().collect(), pos: 0, symbols, arrays, texts };
    let cells = scanner.scan_sequence(None)?;
    Ok(scanner.arrays.alloc(cells, ArrayFlags::empty()))
}

impl Scanner<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ',' => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Reads cells until `terminator` (`']'` or `')'`) or end of input.
    /// `None` means "top level", where end-of-input is the only terminator.
    fn scan_sequence(&mut self, terminator: Option<char>) -> RunResult<Vec<Cell>> {
        let mut cells = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    if terminator.is_some() {
                        return Err(ExecError::User("unbalanced brackets: missing closing delimiter".into()));
                    }
                    return Ok(cells);
                }
                Some(c) if Some(c) == terminator => {
                    self.bump();
                    return Ok(cells);
                }
                Some(']') | Some(')') => {
                    return Err(ExecError::User("unbalanced brackets: unexpected closing delimiter".into()));
                }
                _ => cells.push(self.scan_one()?),
            }
        }
    }

    fn scan_one(&mut self) -> RunResult<Cell> {
        match self.peek() {
            Some('[') => {
                self.bump();
                let inner = self.scan_sequence(Some(']'))?;
                let id = self.arrays.alloc(inner, ArrayFlags::empty());
                Ok(Cell::inert(CellData::Block(id)))
            }
            Some('(') => {
                self.bump();
                let inner = self.scan_sequence(Some(')'))?;
                let id = self.arrays.alloc(inner, ArrayFlags::empty());
                Ok(Cell::inert(CellData::Group(id)))
            }
            Some('"') => self.scan_string(),
            Some(c) if c.is_ascii_digit() => self.scan_word_or_path(),
            Some(c) if (c == '-' || c == '+') && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.scan_word_or_path(),
            Some(_) => self.scan_word_or_path(),
            None => unreachable!("scan_one called at end of input"),
        }
    }

    fn scan_string(&mut self) -> RunResult<Cell> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(ExecError::User("unterminated string literal".into())),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(other) => s.push(other),
                    None => return Err(ExecError::User("unterminated string literal".into())),
                },
                Some(c) => s.push(c),
            }
        }
        let id = self.texts.alloc(s);
        Ok(Cell::inert(CellData::Text(id)))
    }

    fn is_delimiter(c: char) -> bool {
        c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')' | '"' | ';' | '/' | ':' | ',')
    }

    /// Reads one bare token's raw text (stopping at any delimiter,
    /// including `/` and `:`, which are handled by the caller).
    fn read_bare(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if Self::is_delimiter(c) {
                break;
            }
            s.push(c);
            self.bump();
        }
        s
    }

    /// Classifies one path segment: either a parenthesized group, or a bare
    /// word/number token (after stripping a leading `'` lit-word marker).
    fn scan_segment(&mut self) -> RunResult<Cell> {
        if self.peek() == Some('(') {
            self.bump();
            let inner = self.scan_sequence(Some(')'))?;
            let id = self.arrays.alloc(inner, ArrayFlags::empty());
            return Ok(Cell::inert(CellData::Group(id)));
        }
        if self.peek() == Some('\'') {
            self.bump();
            let text = self.read_bare();
            let sym = self.symbols.intern(&text);
            return Ok(Cell::new(CellData::SymWord(sym), Binding::Unbound));
        }
        if self.peek() == Some(':') {
            self.bump();
            let text = self.read_bare();
            let sym = self.symbols.intern(&text);
            return Ok(Cell::new(CellData::GetWord(sym), Binding::Unbound));
        }
        let text = self.read_bare();
        Ok(self.classify_bare(&text))
    }

    fn classify_bare(&mut self, text: &str) -> Cell {
        if let Ok(i) = text.parse::<i64>() {
            return Cell::integer(i);
        }
        if let Ok(d) = text.parse::<f64>()
            && text.contains('.')
        {
            return Cell::decimal(d);
        }
        let sym = self.symbols.intern(text);
        Cell::new(CellData::Word(sym), Binding::Unbound)
    }

    /// Reads a word, number, or path (a run of segments joined by `/`,
    /// optionally prefixed with `:` for a get-path or suffixed with `:` for
    /// a set-path). A single segment with no `/` collapses back to a plain
    /// word/number/set-word/get-word/lit-word cell.
    fn scan_word_or_path(&mut self) -> RunResult<Cell> {
        let leading_colon = self.peek() == Some(':') && self.peek_at(1).is_some_and(|c| !Self::is_delimiter(c) || c == '\'');
        if leading_colon {
            self.bump();
        }
        let mut segments = vec![self.scan_segment()?];
        while self.peek() == Some('/') {
            self.bump();
            segments.push(self.scan_segment()?);
        }
        let trailing_colon = self.peek() == Some(':');
        if trailing_colon {
            self.bump();
        }

        if segments.len() == 1 && !leading_colon {
            let seg = segments.pop().unwrap();
            if trailing_colon {
                return Ok(match seg.data() {
                    CellData::Word(sym) => Cell::new(CellData::SetWord(*sym), Binding::Unbound),
                    _ => seg,
                });
            }
            return Ok(seg);
        }

        let id = self.arrays.alloc(segments, ArrayFlags::empty());
        if trailing_colon {
            Ok(Cell::inert(CellData::SetPath(id)))
        } else if leading_colon {
            Ok(Cell::inert(CellData::GetPath(id)))
        } else {
            Ok(Cell::inert(CellData::Path(id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::text::Texts;

    fn scan_str(src: &str) -> (SymbolTable, Arrays, Texts, crate::ids::ArrayId) {
        let mut symbols = SymbolTable::new();
        let mut arrays = Arrays::new();
        let mut texts = Texts::new();
        let id = scan(&mut symbols, &mut arrays, &mut texts, src).unwrap();
        (symbols, arrays, texts, id)
    }

    #[test]
    fn scans_integers_and_words() {
        let (symbols, arrays, _texts, id) = scan_str("add 1 2");
        let cells = &arrays.get(id).cells;
        assert_eq!(cells.len(), 3);
        assert_eq!(symbols.spelling(cells[0].data().word_symbol().unwrap()), "add");
        assert_eq!(*cells[1].data(), CellData::Integer(1));
        assert_eq!(*cells[2].data(), CellData::Integer(2));
    }

    #[test]
    fn scans_nested_blocks_and_set_words() {
        let (_symbols, arrays, _texts, id) = scan_str("x: [1 2 3]");
        let cells = &arrays.get(id).cells;
        assert!(matches!(cells[0].data(), CellData::SetWord(_)));
        let CellData::Block(inner) = cells[1].data() else { panic!("expected block") };
        assert_eq!(arrays.get(*inner).cells.len(), 3);
    }

    #[test]
    fn scans_a_two_segment_path() {
        let (symbols, arrays, _texts, id) = scan_str("catch/name [1] 'x");
        let cells = &arrays.get(id).cells;
        let CellData::Path(path) = cells[0].data() else { panic!("expected path") };
        let segs = &arrays.get(*path).cells;
        assert_eq!(segs.len(), 2);
        assert_eq!(symbols.spelling(segs[0].data().word_symbol().unwrap()), "catch");
        assert_eq!(symbols.spelling(segs[1].data().word_symbol().unwrap()), "name");
    }

    #[test]
    fn scans_a_group_valued_set_path() {
        let (_symbols, arrays, _texts, id) = scan_str("foo/(print \"x\" 1): 99");
        let cells = &arrays.get(id).cells;
        let CellData::SetPath(path) = cells[0].data() else { panic!("expected set-path") };
        let segs = &arrays.get(*path).cells;
        assert_eq!(segs.len(), 2);
        assert!(matches!(segs[1].data(), CellData::Group(_)));
        assert_eq!(*cells[1].data(), CellData::Integer(99));
    }
}
