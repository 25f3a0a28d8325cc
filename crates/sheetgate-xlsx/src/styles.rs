//! XLSX styles (styles.xml) read/write helpers
//!
//! The workbook keeps one [`StylePool`]; pool index `n` is written as cellXfs
//! index `n`, and read back the same way, so no per-sheet remapping is needed.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};

use crate::error::{XlsxError, XlsxResult};
use crate::xml::{attr_parse, attr_string, escape_xml};
use sheetgate_core::style::{
    Alignment, BorderEdge, BorderLineStyle, BorderStyle, Color, DiagonalDirection, FillStyle,
    FontStyle, FontVerticalAlign, HorizontalAlignment, NumberFormat, PatternType, Protection,
    Style, StylePool, Underline, VerticalAlignment,
};

/// First id available for custom number formats
const FIRST_CUSTOM_NUMFMT_ID: u32 = 164;

// === Name tables ===

const PATTERN_NAMES: &[(PatternType, &str)] = &[
    (PatternType::None, "none"),
    (PatternType::Solid, "solid"),
    (PatternType::MediumGray, "mediumGray"),
    (PatternType::DarkGray, "darkGray"),
    (PatternType::LightGray, "lightGray"),
    (PatternType::DarkHorizontal, "darkHorizontal"),
    (PatternType::DarkVertical, "darkVertical"),
    (PatternType::DarkDown, "darkDown"),
    (PatternType::DarkUp, "darkUp"),
    (PatternType::DarkGrid, "darkGrid"),
    (PatternType::DarkTrellis, "darkTrellis"),
    (PatternType::LightHorizontal, "lightHorizontal"),
    (PatternType::LightVertical, "lightVertical"),
    (PatternType::LightDown, "lightDown"),
    (PatternType::LightUp, "lightUp"),
    (PatternType::LightGrid, "lightGrid"),
    (PatternType::LightTrellis, "lightTrellis"),
    (PatternType::Gray125, "gray125"),
    (PatternType::Gray0625, "gray0625"),
];

const BORDER_NAMES: &[(BorderLineStyle, &str)] = &[
    (BorderLineStyle::Thin, "thin"),
    (BorderLineStyle::Medium, "medium"),
    (BorderLineStyle::Thick, "thick"),
    (BorderLineStyle::Dashed, "dashed"),
    (BorderLineStyle::Dotted, "dotted"),
    (BorderLineStyle::Double, "double"),
    (BorderLineStyle::Hair, "hair"),
    (BorderLineStyle::MediumDashed, "mediumDashed"),
    (BorderLineStyle::DashDot, "dashDot"),
    (BorderLineStyle::MediumDashDot, "mediumDashDot"),
    (BorderLineStyle::DashDotDot, "dashDotDot"),
    (BorderLineStyle::MediumDashDotDot, "mediumDashDotDot"),
    (BorderLineStyle::SlantDashDot, "slantDashDot"),
];

const HORIZONTAL_NAMES: &[(HorizontalAlignment, &str)] = &[
    (HorizontalAlignment::General, "general"),
    (HorizontalAlignment::Left, "left"),
    (HorizontalAlignment::Center, "center"),
    (HorizontalAlignment::Right, "right"),
    (HorizontalAlignment::Fill, "fill"),
    (HorizontalAlignment::Justify, "justify"),
    (HorizontalAlignment::CenterContinuous, "centerContinuous"),
    (HorizontalAlignment::Distributed, "distributed"),
];

const VERTICAL_NAMES: &[(VerticalAlignment, &str)] = &[
    (VerticalAlignment::Top, "top"),
    (VerticalAlignment::Center, "center"),
    (VerticalAlignment::Bottom, "bottom"),
    (VerticalAlignment::Justify, "justify"),
    (VerticalAlignment::Distributed, "distributed"),
];

const UNDERLINE_NAMES: &[(Underline, &str)] = &[
    (Underline::None, "none"),
    (Underline::Single, "single"),
    (Underline::Double, "double"),
    (Underline::SingleAccounting, "singleAccounting"),
    (Underline::DoubleAccounting, "doubleAccounting"),
];

fn name_of<T: PartialEq + Copy>(table: &[(T, &'static str)], value: T) -> Option<&'static str> {
    table.iter().find(|(v, _)| *v == value).map(|(_, n)| *n)
}

fn value_of<T: Copy>(table: &[(T, &'static str)], name: &str) -> Option<T> {
    table.iter().find(|(_, n)| *n == name).map(|(v, _)| *v)
}

// === Writing ===

/// Component ids of one cellXfs entry
#[derive(Debug, Clone, Copy)]
struct XfIds {
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    num_fmt_id: u32,
}

/// Interns a component into its table, returning the component's id
fn intern<T: Clone + Eq + std::hash::Hash>(
    table: &mut Vec<T>,
    ids: &mut HashMap<T, usize>,
    value: &T,
) -> usize {
    if let Some(&id) = ids.get(value) {
        return id;
    }
    let id = table.len();
    table.push(value.clone());
    ids.insert(value.clone(), id);
    id
}

/// Render `xl/styles.xml` for a style pool
pub(crate) fn styles_xml(pool: &StylePool) -> String {
    let mut fonts: Vec<FontStyle> = Vec::new();
    let mut font_ids: HashMap<FontStyle, usize> = HashMap::new();
    intern(&mut fonts, &mut font_ids, &FontStyle::default());

    // The first two fills are reserved: none and gray125.
    let mut fills: Vec<FillStyle> = vec![
        FillStyle::None,
        FillStyle::Pattern {
            pattern: PatternType::Gray125,
            foreground: Color::Auto,
            background: Color::Auto,
        },
    ];
    let mut fill_ids: HashMap<FillStyle, usize> = fills
        .iter()
        .enumerate()
        .map(|(i, f)| (f.clone(), i))
        .collect();

    let mut borders: Vec<BorderStyle> = Vec::new();
    let mut border_ids: HashMap<BorderStyle, usize> = HashMap::new();
    intern(&mut borders, &mut border_ids, &BorderStyle::default());

    let mut numfmts: Vec<(u32, String)> = Vec::new();
    let mut numfmt_ids: HashMap<String, u32> = HashMap::new();

    let resolved: Vec<(XfIds, &Style)> = pool
        .iter()
        .map(|(_, style)| {
            let num_fmt_id = match &style.number_format {
                NumberFormat::General => 0,
                NumberFormat::BuiltIn(id) => *id,
                NumberFormat::Custom(code) => *numfmt_ids.entry(code.clone()).or_insert_with(|| {
                    let id = FIRST_CUSTOM_NUMFMT_ID + numfmts.len() as u32;
                    numfmts.push((id, code.clone()));
                    id
                }),
            };
            let ids = XfIds {
                font_id: intern(&mut fonts, &mut font_ids, &style.font),
                fill_id: intern(&mut fills, &mut fill_ids, &style.fill),
                border_id: intern(&mut borders, &mut border_ids, &style.border),
                num_fmt_id,
            };
            (ids, style)
        })
        .collect();

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );

    if !numfmts.is_empty() {
        xml.push_str(&format!("\n  <numFmts count=\"{}\">", numfmts.len()));
        for (id, code) in &numfmts {
            xml.push_str(&format!(
                "\n    <numFmt numFmtId=\"{}\" formatCode=\"{}\"/>",
                id,
                escape_xml(code)
            ));
        }
        xml.push_str("\n  </numFmts>");
    }

    xml.push_str(&format!("\n  <fonts count=\"{}\">", fonts.len()));
    for font in &fonts {
        xml.push_str("\n    ");
        xml.push_str(&write_font(font));
    }
    xml.push_str("\n  </fonts>");

    xml.push_str(&format!("\n  <fills count=\"{}\">", fills.len()));
    for fill in &fills {
        xml.push_str("\n    ");
        xml.push_str(&write_fill(fill));
    }
    xml.push_str("\n  </fills>");

    xml.push_str(&format!("\n  <borders count=\"{}\">", borders.len()));
    for border in &borders {
        xml.push_str("\n    ");
        xml.push_str(&write_border(border));
    }
    xml.push_str("\n  </borders>");

    xml.push_str(
        r#"
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>"#,
    );

    xml.push_str(&format!("\n  <cellXfs count=\"{}\">", resolved.len()));
    for (ids, style) in &resolved {
        xml.push_str("\n    ");
        xml.push_str(&write_xf(style, *ids));
    }
    xml.push_str("\n  </cellXfs>");

    xml.push_str(
        r#"
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>
  <dxfs count="0"/>
  <tableStyles count="0" defaultTableStyle="TableStyleMedium9" defaultPivotStyle="PivotStyleLight16"/>
</styleSheet>"#,
    );
    xml
}

/// Color attributes (`rgb`, `theme`/`tint` or `indexed`)
fn color_attrs(color: &Color) -> String {
    match color {
        Color::Auto => " auto=\"1\"".to_string(),
        Color::Indexed(i) => format!(" indexed=\"{}\"", i),
        Color::Theme { index, tint: 0 } => format!(" theme=\"{}\"", index),
        Color::Theme { index, .. } => {
            format!(" theme=\"{}\" tint=\"{}\"", index, color.tint_value())
        }
        _ => format!(" rgb=\"{}\"", color.to_argb_hex().unwrap_or_default()),
    }
}

fn write_font(font: &FontStyle) -> String {
    let mut s = String::from("<font>");
    if font.bold {
        s.push_str("<b/>");
    }
    if font.italic {
        s.push_str("<i/>");
    }
    if font.strikethrough {
        s.push_str("<strike/>");
    }
    match font.underline {
        Underline::None => {}
        Underline::Single => s.push_str("<u/>"),
        other => s.push_str(&format!(
            "<u val=\"{}\"/>",
            name_of(UNDERLINE_NAMES, other).unwrap_or("single")
        )),
    }
    match font.vertical_align {
        FontVerticalAlign::Baseline => {}
        FontVerticalAlign::Superscript => s.push_str("<vertAlign val=\"superscript\"/>"),
        FontVerticalAlign::Subscript => s.push_str("<vertAlign val=\"subscript\"/>"),
    }
    s.push_str(&format!("<sz val=\"{}\"/>", font.size));
    if !font.color.is_auto() {
        s.push_str(&format!("<color{}/>", color_attrs(&font.color)));
    }
    s.push_str(&format!("<name val=\"{}\"/>", escape_xml(&font.name)));
    s.push_str("</font>");
    s
}

fn write_fill(fill: &FillStyle) -> String {
    match fill {
        FillStyle::None => "<fill><patternFill patternType=\"none\"/></fill>".to_string(),
        FillStyle::Solid { color } => format!(
            "<fill><patternFill patternType=\"solid\"><fgColor{}/><bgColor indexed=\"64\"/></patternFill></fill>",
            color_attrs(color)
        ),
        FillStyle::Pattern {
            pattern,
            foreground,
            background,
        } => format!(
            "<fill><patternFill patternType=\"{}\"><fgColor{}/><bgColor{}/></patternFill></fill>",
            name_of(PATTERN_NAMES, *pattern).unwrap_or("none"),
            color_attrs(foreground),
            color_attrs(background)
        ),
    }
}

fn write_border_edge(tag: &str, edge: &Option<BorderEdge>) -> String {
    match edge.and_then(|e| name_of(BORDER_NAMES, e.style).map(|name| (name, e.color))) {
        Some((name, color)) => format!(
            "<{tag} style=\"{name}\"><color{}/></{tag}>",
            color_attrs(&color)
        ),
        None => format!("<{tag}/>"),
    }
}

fn write_border(border: &BorderStyle) -> String {
    let attrs = match border.diagonal_direction {
        DiagonalDirection::None => "",
        DiagonalDirection::Down => " diagonalDown=\"1\"",
        DiagonalDirection::Up => " diagonalUp=\"1\"",
        DiagonalDirection::Both => " diagonalDown=\"1\" diagonalUp=\"1\"",
    };

    let mut s = format!("<border{}>", attrs);
    s.push_str(&write_border_edge("left", &border.left));
    s.push_str(&write_border_edge("right", &border.right));
    s.push_str(&write_border_edge("top", &border.top));
    s.push_str(&write_border_edge("bottom", &border.bottom));
    s.push_str(&write_border_edge("diagonal", &border.diagonal));
    s.push_str("</border>");
    s
}

fn write_alignment(al: &Alignment) -> Option<String> {
    if al.is_default() {
        return None;
    }
    let default = Alignment::default();

    let mut s = String::from("<alignment");
    if al.horizontal != default.horizontal {
        if let Some(name) = name_of(HORIZONTAL_NAMES, al.horizontal) {
            s.push_str(&format!(" horizontal=\"{}\"", name));
        }
    }
    if al.vertical != default.vertical {
        if let Some(name) = name_of(VERTICAL_NAMES, al.vertical) {
            s.push_str(&format!(" vertical=\"{}\"", name));
        }
    }
    if al.wrap_text {
        s.push_str(" wrapText=\"1\"");
    }
    if al.shrink_to_fit {
        s.push_str(" shrinkToFit=\"1\"");
    }
    if al.indent != 0 {
        s.push_str(&format!(" indent=\"{}\"", al.indent));
    }
    if al.rotation != 0 {
        s.push_str(&format!(" textRotation=\"{}\"", al.rotation));
    }
    s.push_str("/>");
    Some(s)
}

fn write_protection(p: &Protection) -> Option<String> {
    if *p == Protection::default() {
        return None;
    }
    Some(format!(
        "<protection locked=\"{}\" hidden=\"{}\"/>",
        u8::from(p.locked),
        u8::from(p.hidden)
    ))
}

fn write_xf(style: &Style, ids: XfIds) -> String {
    let mut attrs = String::new();
    if ids.num_fmt_id != 0 {
        attrs.push_str(" applyNumberFormat=\"1\"");
    }
    if ids.font_id != 0 {
        attrs.push_str(" applyFont=\"1\"");
    }
    if ids.fill_id != 0 {
        attrs.push_str(" applyFill=\"1\"");
    }
    if ids.border_id != 0 {
        attrs.push_str(" applyBorder=\"1\"");
    }

    let alignment = write_alignment(&style.alignment);
    let protection = write_protection(&style.protection);
    if alignment.is_some() {
        attrs.push_str(" applyAlignment=\"1\"");
    }
    if protection.is_some() {
        attrs.push_str(" applyProtection=\"1\"");
    }

    let mut s = format!(
        "<xf numFmtId=\"{}\" fontId=\"{}\" fillId=\"{}\" borderId=\"{}\" xfId=\"0\"{}",
        ids.num_fmt_id, ids.font_id, ids.fill_id, ids.border_id, attrs
    );
    if alignment.is_none() && protection.is_none() {
        s.push_str("/>");
        return s;
    }

    s.push('>');
    s.push_str(&alignment.unwrap_or_default());
    s.push_str(&protection.unwrap_or_default());
    s.push_str("</xf>");
    s
}

// === Reading ===

/// Which top-level list of styles.xml is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Section {
    #[default]
    Other,
    Fonts,
    Fills,
    Borders,
    CellXfs,
}

#[derive(Debug, Default)]
struct FillParts {
    pattern: Option<PatternType>,
    foreground: Color,
    background: Color,
}

impl FillParts {
    fn finish(self) -> FillStyle {
        match self.pattern.unwrap_or(PatternType::None) {
            PatternType::None | PatternType::Gray125 => FillStyle::None,
            PatternType::Solid => FillStyle::Solid {
                color: self.foreground,
            },
            pattern => FillStyle::Pattern {
                pattern,
                foreground: self.foreground,
                background: self.background,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
    Diagonal,
}

impl Edge {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"left" | b"start" => Some(Edge::Left),
            b"right" | b"end" => Some(Edge::Right),
            b"top" => Some(Edge::Top),
            b"bottom" => Some(Edge::Bottom),
            b"diagonal" => Some(Edge::Diagonal),
            _ => None,
        }
    }

    fn slot(self, border: &mut BorderStyle) -> &mut Option<BorderEdge> {
        match self {
            Edge::Left => &mut border.left,
            Edge::Right => &mut border.right,
            Edge::Top => &mut border.top,
            Edge::Bottom => &mut border.bottom,
            Edge::Diagonal => &mut border.diagonal,
        }
    }
}

/// Incremental state while walking styles.xml
#[derive(Debug, Default)]
struct StylesParser {
    numfmts: HashMap<u32, NumberFormat>,
    fonts: Vec<FontStyle>,
    fills: Vec<FillStyle>,
    borders: Vec<BorderStyle>,
    cell_xfs: Vec<Style>,

    section: Section,
    font: Option<FontStyle>,
    fill: Option<FillParts>,
    border: Option<BorderStyle>,
    edge: Option<Edge>,
    xf: Option<Style>,
}

impl StylesParser {
    fn start(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"fonts" => self.section = Section::Fonts,
            b"fills" => self.section = Section::Fills,
            b"borders" => self.section = Section::Borders,
            b"cellXfs" => self.section = Section::CellXfs,
            b"cellStyleXfs" | b"dxfs" | b"colors" => self.section = Section::Other,

            b"numFmt" => {
                if let (Some(id), Some(code)) =
                    (attr_parse::<u32>(e, b"numFmtId"), attr_string(e, b"formatCode"))
                {
                    self.numfmts.insert(id, NumberFormat::from_string(code));
                }
            }

            b"font" if self.section == Section::Fonts => self.font = Some(FontStyle::default()),
            b"b" | b"i" | b"strike" | b"u" | b"sz" | b"name" | b"vertAlign" => self.font_child(e),

            b"fill" if self.section == Section::Fills => self.fill = Some(FillParts::default()),
            b"patternFill" => {
                if let Some(fill) = self.fill.as_mut() {
                    fill.pattern = attr_string(e, b"patternType")
                        .and_then(|v| value_of(PATTERN_NAMES, &v))
                        .or(Some(PatternType::None));
                }
            }
            b"fgColor" => {
                if let Some(fill) = self.fill.as_mut() {
                    fill.foreground = parse_color_attrs(e);
                }
            }
            b"bgColor" => {
                if let Some(fill) = self.fill.as_mut() {
                    fill.background = parse_color_attrs(e);
                }
            }

            b"border" if self.section == Section::Borders => {
                let up = attr_string(e, b"diagonalUp").as_deref() == Some("1");
                let down = attr_string(e, b"diagonalDown").as_deref() == Some("1");
                self.border = Some(BorderStyle {
                    diagonal_direction: match (up, down) {
                        (true, true) => DiagonalDirection::Both,
                        (true, false) => DiagonalDirection::Up,
                        (false, true) => DiagonalDirection::Down,
                        (false, false) => DiagonalDirection::None,
                    },
                    ..BorderStyle::default()
                });
            }
            tag if self.border.is_some() && Edge::from_tag(tag).is_some() => {
                self.edge = Edge::from_tag(tag);
                let line = attr_string(e, b"style").and_then(|v| value_of(BORDER_NAMES, &v));
                if let (Some(border), Some(edge), Some(line)) =
                    (self.border.as_mut(), self.edge, line)
                {
                    *edge.slot(border) = Some(BorderEdge::new(line, Color::Auto));
                }
            }

            b"color" => {
                let color = parse_color_attrs(e);
                if let Some(font) = self.font.as_mut() {
                    font.color = color;
                } else if let (Some(border), Some(edge)) = (self.border.as_mut(), self.edge) {
                    if let Some(existing) = edge.slot(border).as_mut() {
                        existing.color = color;
                    }
                }
            }

            b"xf" if self.section == Section::CellXfs => self.xf = Some(self.resolve_xf(e)),
            b"alignment" => {
                if let Some(xf) = self.xf.as_mut() {
                    xf.alignment = parse_alignment(e);
                }
            }
            b"protection" => {
                if let Some(xf) = self.xf.as_mut() {
                    if let Some(locked) = attr_string(e, b"locked") {
                        xf.protection.locked = locked == "1" || locked == "true";
                    }
                    if let Some(hidden) = attr_string(e, b"hidden") {
                        xf.protection.hidden = hidden == "1" || hidden == "true";
                    }
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"fonts" | b"fills" | b"borders" | b"cellXfs" => self.section = Section::Other,
            b"font" => {
                if let Some(font) = self.font.take() {
                    self.fonts.push(font);
                }
            }
            b"fill" => {
                if let Some(fill) = self.fill.take() {
                    self.fills.push(fill.finish());
                }
            }
            b"border" => {
                if let Some(border) = self.border.take() {
                    self.borders.push(border);
                }
                self.edge = None;
            }
            tag if Edge::from_tag(tag).is_some() => self.edge = None,
            b"xf" => {
                if let Some(xf) = self.xf.take() {
                    self.cell_xfs.push(xf);
                }
            }
            _ => {}
        }
    }

    fn font_child(&mut self, e: &BytesStart<'_>) {
        let Some(font) = self.font.as_mut() else {
            return;
        };
        let val = attr_string(e, b"val");
        let on = val.as_deref().map_or(true, |v| v != "0" && v != "false");
        match e.name().as_ref() {
            b"b" => font.bold = on,
            b"i" => font.italic = on,
            b"strike" => font.strikethrough = on,
            b"u" => {
                font.underline = val
                    .as_deref()
                    .and_then(|v| value_of(UNDERLINE_NAMES, v))
                    .unwrap_or(Underline::Single)
            }
            b"sz" => {
                if let Some(size) = val.and_then(|v| v.parse::<f64>().ok()) {
                    font.size = size;
                }
            }
            b"name" => {
                if let Some(name) = val {
                    font.name = name;
                }
            }
            b"vertAlign" => {
                font.vertical_align = match val.as_deref() {
                    Some("superscript") => FontVerticalAlign::Superscript,
                    Some("subscript") => FontVerticalAlign::Subscript,
                    _ => FontVerticalAlign::Baseline,
                }
            }
            _ => {}
        }
    }

    fn resolve_xf(&self, e: &BytesStart<'_>) -> Style {
        let id = |key: &[u8]| attr_parse::<usize>(e, key).unwrap_or(0);
        let num_fmt_id = attr_parse::<u32>(e, b"numFmtId").unwrap_or(0);

        Style {
            font: self.fonts.get(id(b"fontId")).cloned().unwrap_or_default(),
            fill: self.fills.get(id(b"fillId")).cloned().unwrap_or_default(),
            border: self.borders.get(id(b"borderId")).cloned().unwrap_or_default(),
            number_format: self
                .numfmts
                .get(&num_fmt_id)
                .cloned()
                .unwrap_or_else(|| NumberFormat::from_id(num_fmt_id)),
            ..Style::default()
        }
    }
}

fn parse_alignment(e: &BytesStart<'_>) -> Alignment {
    let mut align = Alignment::default();
    for attr in e.attributes().flatten() {
        let Ok(val) = attr.unescape_value() else {
            continue;
        };
        match attr.key.as_ref() {
            b"horizontal" => {
                if let Some(h) = value_of(HORIZONTAL_NAMES, &val) {
                    align.horizontal = h;
                }
            }
            b"vertical" => {
                if let Some(v) = value_of(VERTICAL_NAMES, &val) {
                    align.vertical = v;
                }
            }
            b"wrapText" => align.wrap_text = val == "1" || val == "true",
            b"shrinkToFit" => align.shrink_to_fit = val == "1" || val == "true",
            b"indent" => align.indent = val.parse().unwrap_or(0),
            b"textRotation" => align.rotation = val.parse().unwrap_or(0),
            _ => {}
        }
    }
    align
}

/// Parse a color element; priority is rgb, then theme, then indexed
fn parse_color_attrs(e: &BytesStart<'_>) -> Color {
    if let Some(color) = attr_string(e, b"rgb").and_then(|rgb| Color::from_hex(&rgb)) {
        return color;
    }
    if let Some(index) = attr_parse::<u8>(e, b"theme") {
        return Color::theme(index, attr_parse::<f64>(e, b"tint").unwrap_or(0.0));
    }
    match attr_parse::<u8>(e, b"indexed") {
        // 64 is the system foreground, i.e. automatic
        Some(64) | None => Color::Auto,
        Some(i) => Color::Indexed(i),
    }
}

/// Read the cellXfs table of `xl/styles.xml`, fully resolved
///
/// Index `n` of the result is the style referenced by `s="n"` on a cell.
pub(crate) fn read_styles_xml<R: BufRead>(reader: R) -> XlsxResult<Vec<Style>> {
    let mut xml_reader = crate::xml::part_reader(reader, true);
    let mut buf = Vec::new();
    let mut parser = StylesParser::default();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::DocType(_)) => return Err(XlsxError::ForbiddenXml("xl/styles.xml".into())),
            Ok(Event::Start(e)) => parser.start(&e),
            Ok(Event::Empty(e)) => {
                parser.start(&e);
                parser.end(e.name().as_ref());
            }
            Ok(Event::End(e)) => parser.end(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    if parser.cell_xfs.is_empty() {
        parser.cell_xfs.push(Style::default());
    }
    Ok(parser.cell_xfs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn roundtrip(pool: &StylePool) -> Vec<Style> {
        let xml = styles_xml(pool);
        read_styles_xml(Cursor::new(xml.into_bytes())).unwrap()
    }

    #[test]
    fn test_default_pool_roundtrip() {
        let styles = roundtrip(&StylePool::new());
        assert_eq!(styles, vec![Style::default()]);
    }

    #[test]
    fn test_every_property_survives() {
        let mut style = Style::new()
            .bold(true)
            .italic(true)
            .number_format("yyyy-mm-dd")
            .horizontal_alignment(HorizontalAlignment::Center)
            .wrap_text(true)
            .with_fill(FillStyle::solid(Color::argb(0xFF, 0xFF, 0xC7, 0xCE)));
        style.font.name = "Malgun Gothic".into();
        style.font.size = 9.5;
        style.font.color = Color::theme(1, 0.5);
        style.font.underline = Underline::Double;
        style.border = BorderStyle::all(BorderLineStyle::Thin, Color::Indexed(8));
        style.border.diagonal = Some(BorderEdge::new(BorderLineStyle::Dashed, Color::argb(0xFF, 1, 2, 3)));
        style.border.diagonal_direction = DiagonalDirection::Both;
        style.alignment.indent = 2;
        style.protection.locked = false;

        let mut pool = StylePool::new();
        let index = pool.get_or_insert(style.clone());
        pool.get_or_insert(Style::new().number_format("0.000"));

        let styles = roundtrip(&pool);
        assert_eq!(styles.len(), 3);
        assert_eq!(styles[index as usize], style);
        assert_eq!(styles[2].number_format, NumberFormat::Custom("0.000".into()));
    }

    #[test]
    fn test_pattern_fill_and_builtin_format() {
        let style = Style {
            fill: FillStyle::Pattern {
                pattern: PatternType::LightGrid,
                foreground: Color::Indexed(10),
                background: Color::argb(0xFF, 0xFF, 0xFF, 0xFF),
            },
            number_format: NumberFormat::BuiltIn(14),
            ..Style::default()
        };
        let mut pool = StylePool::new();
        pool.get_or_insert(style.clone());

        let styles = roundtrip(&pool);
        assert_eq!(styles[1], style);
        assert!(styles[1].number_format.is_date_format());
    }

    #[test]
    fn test_doctype_rejected() {
        let xml = r#"<?xml version="1.0"?><!DOCTYPE x [<!ENTITY e SYSTEM "file:///etc/passwd">]><styleSheet/>"#;
        let err = read_styles_xml(Cursor::new(xml.as_bytes())).unwrap_err();
        assert!(matches!(err, XlsxError::ForbiddenXml(_)));
    }
}
