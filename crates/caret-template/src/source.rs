/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Line and column arithmetic over template source.

/// 1-based (line, column) of a byte offset. Columns count characters.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut end = offset.min(source.len());
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    let before = &source[..end];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Character offset of a 1-based (line, column), clamped to the source.
pub fn line_col_to_char_offset(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    let mut current = 1;
    let mut chars = source.chars().peekable();
    while current < line {
        match chars.next() {
            Some('\n') => {
                current += 1;
                offset += 1;
            }
            Some(_) => offset += 1,
            None => return offset,
        }
    }
    let mut col = 1;
    while col < column {
        match chars.next() {
            Some('\n') | None => break,
            Some(_) => {
                offset += 1;
                col += 1;
            }
        }
    }
    offset
}
