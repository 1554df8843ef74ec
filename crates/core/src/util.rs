//! Column conversions between editor (UTF-16) and document (byte) coordinates.

use crate::model::SourceText;

pub fn utf16_col_to_byte_col(src: &SourceText, line: usize, utf16_col: usize) -> usize {
    let mut curr_utf16 = 0;
    let mut curr_byte = 0;

    for c in src.line_text(line).chars() {
        if curr_utf16 >= utf16_col {
            break;
        }
        curr_utf16 += c.len_utf16();
        curr_byte += c.len_utf8();
    }
    curr_byte
}

pub fn byte_col_to_utf16_col(src: &SourceText, line: usize, byte_col: usize) -> usize {
    let text = src.line_text(line);
    let end = byte_col.min(text.len());
    text.char_indices()
        .take_while(|(i, _)| *i < end)
        .map(|(_, c)| c.len_utf16())
        .sum()
}
