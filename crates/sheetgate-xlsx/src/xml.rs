//! Small quick-xml helpers shared by the readers and writers

use std::io::BufRead;
use std::str::FromStr;

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;

/// Create a reader for one archive part
pub(crate) fn part_reader<R: BufRead>(reader: R, trim: bool) -> Reader<R> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.trim_text(trim);
    xml_reader
}

/// Unescaped value of an attribute
pub(crate) fn attr_string(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Attribute parsed into `T`
pub(crate) fn attr_parse<T: FromStr>(e: &BytesStart<'_>, key: &[u8]) -> Option<T> {
    attr_string(e, key).and_then(|v| v.trim().parse().ok())
}

/// Boolean attribute (`1`/`true`); absent means `false`
pub(crate) fn attr_bool(e: &BytesStart<'_>, key: &[u8]) -> bool {
    attr_string(e, key).map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Escape text content
pub(crate) fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters are not representable in XML 1.0; use Excel's escape form.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {
                out.push_str(&format!("_x{:04X}_", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Decode Excel's `_xHHHH_` escape sequences
///
/// - `_x000D_` = CR
/// - `_x000A_` = LF
/// - `_x0009_` = Tab
/// - `_x005F_` = a literal underscore
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_excel_escapes() {
        assert_eq!(decode_excel_escapes("Line1_x000D_Line2"), "Line1\rLine2");
        assert_eq!(decode_excel_escapes("Col1_x0009_Col2"), "Col1\tCol2");
        assert_eq!(decode_excel_escapes("a_x005F_b"), "a_b");
        assert_eq!(decode_excel_escapes("_x000d__x000a_"), "\r\n");
        assert_eq!(decode_excel_escapes("plain text"), "plain text");
    }

    #[test]
    fn test_decode_excel_escapes_partial_sequence() {
        assert_eq!(decode_excel_escapes("_x00"), "_x00");
        assert_eq!(decode_excel_escapes("_xZZZZ_"), "_xZZZZ_");
        assert_eq!(decode_excel_escapes("_x0041"), "_x0041");
        assert_eq!(decode_excel_escapes("값_x0041_"), "값A");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell_x0007_");
        assert_eq!(escape_xml("tab\tok"), "tab\tok");
    }
}
