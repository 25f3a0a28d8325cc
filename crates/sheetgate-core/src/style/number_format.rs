//! Number format types

/// Number format for cell display
///
/// Formats are compared by their format string when styles cross workbooks, since
/// custom format ids are local to one `styles.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    /// General format (default)
    #[default]
    General,

    /// Built-in format by ID
    BuiltIn(u32),

    /// Custom format string
    Custom(String),
}

impl NumberFormat {
    /// 14 - short date
    pub const ID_DATE_SHORT: u32 = 14;
    /// 22 - date and time
    pub const ID_DATETIME: u32 = 22;
    /// 49 - text
    pub const ID_TEXT: u32 = 49;

    /// Create a number format from a format string, folding known built-ins back to their id
    pub fn from_string<S: Into<String>>(format: S) -> Self {
        let format = format.into();
        if format.eq_ignore_ascii_case("general") {
            return NumberFormat::General;
        }
        match Self::builtin_id_for(&format) {
            Some(id) => NumberFormat::BuiltIn(id),
            None => NumberFormat::Custom(format),
        }
    }

    /// Create a built-in format by ID
    pub fn from_id(id: u32) -> Self {
        if id == 0 {
            NumberFormat::General
        } else {
            NumberFormat::BuiltIn(id)
        }
    }

    /// Get the format string
    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::BuiltIn(id) => Self::builtin_format_string(*id),
            NumberFormat::Custom(s) => s,
        }
    }

    fn builtin_format_string(id: u32) -> &'static str {
        match id {
            1 => "0",
            2 => "0.00",
            3 => "#,##0",
            4 => "#,##0.00",
            9 => "0%",
            10 => "0.00%",
            11 => "0.00E+00",
            12 => "# ?/?",
            13 => "# ??/??",
            14 => "mm-dd-yy",
            15 => "d-mmm-yy",
            16 => "d-mmm",
            17 => "mmm-yy",
            18 => "h:mm AM/PM",
            19 => "h:mm:ss AM/PM",
            20 => "h:mm",
            21 => "h:mm:ss",
            22 => "m/d/yy h:mm",
            37 => "#,##0 ;(#,##0)",
            38 => "#,##0 ;[Red](#,##0)",
            39 => "#,##0.00;(#,##0.00)",
            40 => "#,##0.00;[Red](#,##0.00)",
            45 => "mm:ss",
            46 => "[h]:mm:ss",
            47 => "mmss.0",
            48 => "##0.0E+0",
            49 => "@",
            _ => "General",
        }
    }

    fn builtin_id_for(format: &str) -> Option<u32> {
        (1..=49).find(|&id| {
            let builtin = Self::builtin_format_string(id);
            builtin != "General" && builtin == format
        })
    }

    /// Check if this is a date/time format
    ///
    /// Quoted literals, backslash escapes, `_`/`*` padding and bracketed sections
    /// such as `[Red]` or `[$-409]` are ignored; elapsed-time brackets like `[h]` count.
    pub fn is_date_format(&self) -> bool {
        match self {
            NumberFormat::General => false,
            NumberFormat::BuiltIn(id) => matches!(id, 14..=22 | 45..=47),
            NumberFormat::Custom(s) => is_date_pattern(s),
        }
    }
}

fn is_date_pattern(format: &str) -> bool {
    // Only the first section decides; later sections cover negatives and text.
    let mut chars = format.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '\\' | '_' | '*' => {
                chars.next();
            }
            ';' => return false,
            '[' => {
                let mut section = String::new();
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    section.push(inner.to_ascii_lowercase());
                }
                if !section.is_empty() && section.chars().all(|ch| matches!(ch, 'h' | 'm' | 's')) {
                    return true;
                }
            }
            'y' | 'Y' | 'd' | 'D' | 'm' | 'M' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_date_ids() {
        assert!(NumberFormat::BuiltIn(14).is_date_format());
        assert!(NumberFormat::BuiltIn(22).is_date_format());
        assert!(NumberFormat::BuiltIn(46).is_date_format());
        assert!(!NumberFormat::BuiltIn(4).is_date_format());
        assert!(!NumberFormat::General.is_date_format());
    }

    #[test]
    fn test_custom_date_detection() {
        assert!(NumberFormat::Custom("yyyy-mm-dd".into()).is_date_format());
        assert!(NumberFormat::Custom("[$-409]d/m/yyyy h:mm".into()).is_date_format());
        assert!(NumberFormat::Custom("[h]:mm".into()).is_date_format());

        assert!(!NumberFormat::Custom("[Red]0.00".into()).is_date_format());
        assert!(!NumberFormat::Custom("0.00\" days\"".into()).is_date_format());
        assert!(!NumberFormat::Custom("#,##0_);\\(#,##0\\)".into()).is_date_format());
        assert!(!NumberFormat::Custom("@".into()).is_date_format());
    }

    #[test]
    fn test_from_string_folds_builtins() {
        assert_eq!(NumberFormat::from_string("0.00"), NumberFormat::BuiltIn(2));
        assert_eq!(NumberFormat::from_string("General"), NumberFormat::General);
        assert_eq!(
            NumberFormat::from_string("yyyy-mm-dd"),
            NumberFormat::Custom("yyyy-mm-dd".into())
        );
        assert_eq!(NumberFormat::from_id(14).format_string(), "mm-dd-yy");
    }
}
