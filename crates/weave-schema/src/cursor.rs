/// Character iterator over schema source with byte-offset positions.
pub(crate) struct Cursor<'src> {
    source: &'src str,
    pos: u32,
    chars: std::str::Chars<'src>,
}

impl<'src> Cursor<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            chars: source.chars(),
        }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    pub(crate) fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next()
    }

    pub(crate) fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Byte offset of the next character.
    pub(crate) fn pos(&self) -> u32 {
        self.pos
    }

    pub(crate) fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.advance();
        }
    }

    /// Source text between two byte offsets taken from [`pos`](Self::pos).
    pub(crate) fn slice(&self, start: u32, end: u32) -> &'src str {
        &self.source[start as usize..end as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_byte_offsets() {
        let mut cursor = Cursor::new("é1");
        assert_eq!(cursor.advance(), Some('é'));
        assert_eq!(cursor.pos(), 2);
        assert_eq!(cursor.peek(), Some('1'));
        assert_eq!(cursor.peek_next(), None);
    }

    #[test]
    fn eat_while_stops_at_mismatch() {
        let mut cursor = Cursor::new("abc def");
        cursor.eat_while(char::is_alphabetic);
        assert_eq!(cursor.slice(0, cursor.pos()), "abc");
        assert_eq!(cursor.peek(), Some(' '));
    }
}
