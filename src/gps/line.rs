// src/gps/line.rs
//! Assembles received bytes into sentence lines

/// Longest line kept; NMEA-0183 allows 82 characters, some receivers emit more
pub const MAX_SENTENCE_LEN: usize = 128;

#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: String,
    in_sentence: bool,
    overflows: usize,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(MAX_SENTENCE_LEN),
            ..Default::default()
        }
    }

    /// Feed one byte; returns a complete line (starting with `$`, without
    /// the line ending) once its `\n` arrives.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'$' => {
                // a new start marker always restarts the line
                self.buf.clear();
                self.buf.push('$');
                self.in_sentence = true;
                None
            }
            b'\n' => {
                let complete = self.in_sentence && !self.buf.is_empty();
                self.in_sentence = false;
                if complete {
                    let fresh = String::with_capacity(MAX_SENTENCE_LEN);
                    Some(std::mem::replace(&mut self.buf, fresh))
                } else {
                    self.buf.clear();
                    None
                }
            }
            b'\r' => None,
            _ if !self.in_sentence => None,
            b if b.is_ascii() && !b.is_ascii_control() => {
                if self.buf.len() >= MAX_SENTENCE_LEN {
                    self.overflows += 1;
                    self.abort();
                } else {
                    self.buf.push(b as char);
                }
                None
            }
            _ => {
                self.abort();
                None
            }
        }
    }

    /// Lines thrown away for exceeding [`MAX_SENTENCE_LEN`]
    pub fn overflows(&self) -> usize {
        self.overflows
    }

    fn abort(&mut self) {
        self.buf.clear();
        self.in_sentence = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut LineAssembler, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|&b| assembler.push(b)).collect()
    }

    #[test]
    fn test_splits_lines() {
        let mut asm = LineAssembler::new();
        let lines = feed(&mut asm, b"$GPGGA,1*47\r\n$GPRMC,2\n");
        assert_eq!(lines, vec!["$GPGGA,1*47", "$GPRMC,2"]);
    }

    #[test]
    fn test_skips_noise_before_start() {
        let mut asm = LineAssembler::new();
        let lines = feed(&mut asm, b"garbage,,\n12$GPGGA,3\r\n");
        assert_eq!(lines, vec!["$GPGGA,3"]);
    }

    #[test]
    fn test_restart_on_new_dollar() {
        let mut asm = LineAssembler::new();
        let lines = feed(&mut asm, b"$GPGG$GPRMC,4\n");
        assert_eq!(lines, vec!["$GPRMC,4"]);
    }

    #[test]
    fn test_drops_overlong_line() {
        let mut asm = LineAssembler::new();
        let mut input = b"$".to_vec();
        input.extend(std::iter::repeat(b'A').take(MAX_SENTENCE_LEN + 10));
        input.extend_from_slice(b"\n$GPGGA,5\n");

        let lines = feed(&mut asm, &input);
        assert_eq!(lines, vec!["$GPGGA,5"]);
        assert_eq!(asm.overflows(), 1);
    }

    #[test]
    fn test_binary_byte_aborts_line() {
        let mut asm = LineAssembler::new();
        let lines = feed(&mut asm, b"$GPGGA,\xb5\x62,6\n$GPRMC,7\n");
        assert_eq!(lines, vec!["$GPRMC,7"]);
    }
}
