// src/gps/fields.rs
//! Comma-separated field cursor

/// Iterator over the delimited fields of one sentence.
///
/// Yields `(index, field)` pairs left to right, including empty fields
/// between adjacent delimiters. All state lives in the cursor, so separate
/// sentences (or separate passes over the same one) never interfere.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    text: &'a str,
    pos: usize,
    index: usize,
    delimiter: u8,
    done: bool,
}

impl<'a> Fields<'a> {
    pub fn new(text: &'a str, delimiter: u8) -> Self {
        debug_assert!(delimiter.is_ascii(), "delimiter must be a single ASCII byte");
        Self {
            text,
            pos: 0,
            index: 0,
            delimiter,
            done: false,
        }
    }

}

impl<'a> Iterator for Fields<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.pos..];
        let field = match rest.bytes().position(|b| b == self.delimiter) {
            Some(end) => {
                self.pos += end + 1;
                &rest[..end]
            }
            None => {
                self.pos = self.text.len();
                self.done = true;
                rest
            }
        };

        let index = self.index;
        self.index += 1;
        Some((index, field))
    }
}
