/// Indentation-aware line buffer for generated Rust.
#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Write `text` (usually ending in `{`) and indent what follows.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedent, then write `text` (usually `}`).
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests_and_keeps_blank_lines_unindented() {
        let mut w = CodeWriter::new();
        w.open("fn f() {");
        w.line("let x = 1;");
        w.blank();
        w.open("if x == 1 {");
        w.line("return;");
        w.close("}");
        w.close("}");
        assert_eq!(
            w.finish(),
            "fn f() {\n    let x = 1;\n\n    if x == 1 {\n        return;\n    }\n}\n"
        );
    }
}
