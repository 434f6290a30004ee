//! Annotated dumps of encoded messages.
//!
//! Output is a three-column table of offset, hex bytes and a description of
//! what those bytes mean. Truncated or corrupt input is rendered as far as it
//! can be and marked, never rejected.

use std::fmt::Write;

use crate::protocol::headers::{request_table, response_table, HeaderTable, CUSTOM_HEADER};
use crate::protocol::status::{decode_status, reason};
use crate::protocol::types::{Method, METHOD_MASK, METHOD_SHIFT, STATUS_MASK, VERSION_SHIFT};
use crate::protocol::varint::read_uvarint;

const HEX_COLUMN_WIDTH: usize = 49;
const BYTES_PER_LINE: usize = 16;
const MAX_DUMP_BYTES: usize = 128;
const PREVIEW_CHARS: usize = 60;

/// Render an annotated table of an encoded request.
pub fn debug_request(data: &[u8]) -> String {
    let Some(&first) = data.first() else {
        return "(empty)\n".to_string();
    };

    let mut dump = Dump::new(data, request_table());
    let method_code = (first >> METHOD_SHIFT) & METHOD_MASK;
    let method = Method::from_code(method_code)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| format!("INVALID({method_code})"));
    dump.row(
        1,
        &format!("First byte (version={}, method={method})", first >> VERSION_SHIFT),
    );

    dump.string_field("Host");
    dump.string_field("Path");
    dump.headers();
    dump.body();
    dump.finish()
}

/// Render an annotated table of an encoded response.
pub fn debug_response(data: &[u8]) -> String {
    let Some(&first) = data.first() else {
        return "(empty)\n".to_string();
    };

    let mut dump = Dump::new(data, response_table());
    let status = decode_status(first & STATUS_MASK);
    dump.row(
        1,
        &format!(
            "First byte (version={}, status={status} {})",
            first >> VERSION_SHIFT,
            reason(status)
        ),
    );

    dump.headers();
    dump.body();
    dump.finish()
}

struct Dump<'a> {
    data: &'a [u8],
    offset: usize,
    table: &'static HeaderTable,
    out: String,
}

impl<'a> Dump<'a> {
    fn new(data: &'a [u8], table: &'static HeaderTable) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "OFFSET  {:<HEX_COLUMN_WIDTH$}DESCRIPTION", "BYTES");
        Self {
            data,
            offset: 0,
            table,
            out,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Emit a row covering the next `len` bytes and advance past them.
    fn row(&mut self, len: usize, description: &str) {
        let len = len.min(self.remaining());
        let bytes = &self.data[self.offset..self.offset + len];
        let shown = &bytes[..bytes.len().min(MAX_DUMP_BYTES)];

        let mut lines = shown.chunks(BYTES_PER_LINE);
        let first = lines.next().map(hex).unwrap_or_default();
        let _ = writeln!(
            self.out,
            "0x{:04x}  {:<HEX_COLUMN_WIDTH$}{description}",
            self.offset, first
        );
        for line in lines {
            let _ = writeln!(self.out, "        {}", hex(line));
        }
        if bytes.len() > shown.len() {
            let _ = writeln!(
                self.out,
                "        ... {} bytes total, {} shown",
                bytes.len(),
                shown.len()
            );
        }

        self.offset += len;
    }

    /// Read and annotate a varint. `None` when it cannot be decoded.
    fn varint(&mut self, label: &str) -> Option<u64> {
        match read_uvarint(self.data, self.offset) {
            Ok((value, n)) => {
                self.row(n, &format!("{label} (varint: {value})"));
                Some(value)
            }
            Err(e) => {
                let remaining = self.remaining();
                self.row(remaining, &format!("{label}: {e}"));
                None
            }
        }
    }

    /// Length-prefixed text field; returns false if the dump cannot continue.
    fn string_field(&mut self, label: &str) -> bool {
        let Some(len) = self.varint(&format!("{label} length")) else {
            return false;
        };
        let available = self.remaining();
        let take = usize::try_from(len).unwrap_or(usize::MAX).min(available);
        let text = preview(&self.data[self.offset..self.offset + take]);
        if (take as u64) < len {
            self.row(take, &format!("{label}: {text} [truncated, {len} declared]"));
            return false;
        }
        self.row(take, &format!("{label}: {text}"));
        true
    }

    fn headers(&mut self) {
        self.out.push('\n');
        let Some(len) = self.varint("Headers length") else {
            return;
        };
        let end = self
            .offset
            .saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
            .min(self.data.len());

        while self.offset < end {
            let id = self.data[self.offset];
            if id == CUSTOM_HEADER {
                self.row(1, "Custom header");
                if !self.string_field("  Name") || !self.string_field("  Value") {
                    return;
                }
                continue;
            }

            match self.table.entry(id) {
                Some(entry) if entry.is_complete_pair() => {
                    self.row(1, &format!("Header {id:#04x}: {}: {}", entry.name, entry.value));
                }
                Some(entry) => {
                    self.row(1, &format!("Header {id:#04x}: {} (name only)", entry.name));
                    if !self.string_field("  Value") {
                        return;
                    }
                }
                None => {
                    let rest = end - self.offset;
                    self.row(rest, &format!("Unknown header ID {id:#04x}"));
                    return;
                }
            }
        }
    }

    fn body(&mut self) {
        self.out.push('\n');
        let Some(len) = self.varint("Body length") else {
            return;
        };
        if len == 0 {
            return;
        }
        let take = usize::try_from(len).unwrap_or(usize::MAX).min(self.remaining());
        let note = if (take as u64) < len {
            format!("Body ({take} of {len} bytes)")
        } else {
            format!("Body ({len} bytes)")
        };
        self.row(take, &note);
    }

    fn finish(mut self) -> String {
        let _ = writeln!(
            self.out,
            "\nSummary: parsed {} / {} bytes",
            self.offset,
            self.data.len()
        );
        self.out
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn preview(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut:?}...")
    } else {
        format!("{text:?}")
    }
}
