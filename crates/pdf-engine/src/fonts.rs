//! PDF font resources mapped onto `fontdue` faces.
//!
//! Embedded TrueType and OpenType programs are used directly. Anything else
//! (standard 14 fonts, bare CFF, Type 1, Type 3) is drawn with the bundled
//! DejaVu Sans, picking glyphs by Unicode value.

use crate::objects::{number, resolve, resolve_dict, stream_bytes};
use fontdue::{Font, FontSettings};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;
use std::sync::OnceLock;

/// DejaVu Sans, used for text whose font program is not embedded.
pub static FALLBACK_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// Widths are in thousandths of text space units.
const DEFAULT_WIDTH: f32 = 1000.0;
const MAX_RANGE: u32 = 0x1_0000;

pub(crate) fn fallback_face() -> Option<&'static Font> {
    static FACE: OnceLock<Option<Font>> = OnceLock::new();
    FACE.get_or_init(|| match Font::from_bytes(FALLBACK_FONT, FontSettings::default()) {
        Ok(font) => Some(font),
        Err(err) => {
            tracing::error!(err, "bundled fallback font failed to parse");
            None
        }
    })
    .as_ref()
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Glyph<'a> {
    pub face: &'a Font,
    pub index: u16,
}

#[derive(Debug, Default)]
enum Widths {
    #[default]
    None,
    Simple { first: u32, widths: Vec<f32>, missing: Option<f32> },
    Composite { default: f32, widths: HashMap<u32, f32> },
}

pub(crate) struct PdfFont {
    face: Option<Font>,
    composite: bool,
    encoding: Vec<Option<char>>,
    to_unicode: HashMap<u32, char>,
    cid_to_gid: Option<Vec<u16>>,
    widths: Widths,
}

impl std::fmt::Debug for PdfFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfFont")
            .field("embedded", &self.face.is_some())
            .field("composite", &self.composite)
            .field("to_unicode", &self.to_unicode.len())
            .finish_non_exhaustive()
    }
}

impl PdfFont {
    pub(crate) fn load(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = dict.get(b"Subtype").and_then(Object::as_name).unwrap_or_default();
        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_stream().ok())
            .and_then(|stream| stream_bytes(stream).ok())
            .map(|data| parse_to_unicode(&data))
            .unwrap_or_default();

        if subtype == b"Type0" {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|fonts| resolve(doc, fonts))
                .and_then(|fonts| fonts.as_array().ok())
                .and_then(|fonts| fonts.first())
                .and_then(|font| resolve_dict(doc, font));

            return Self {
                face: descendant.and_then(|font| embedded_face(doc, font)),
                composite: true,
                encoding: Vec::new(),
                to_unicode,
                cid_to_gid: descendant.and_then(|font| cid_to_gid(doc, font)),
                widths: descendant.map(|font| composite_widths(doc, font)).unwrap_or_default(),
            };
        }

        Self {
            face: embedded_face(doc, dict),
            composite: false,
            encoding: simple_encoding(doc, dict),
            to_unicode,
            cid_to_gid: None,
            widths: simple_widths(doc, dict),
        }
    }

    /// Splits a shown string into character codes. Composite fonts are read
    /// as two-byte codes.
    pub(crate) fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.composite {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |code, byte| (code << 8) | u32::from(*byte)))
                .collect()
        } else {
            bytes.iter().map(|byte| u32::from(*byte)).collect()
        }
    }

    /// Word spacing applies to the single-byte code 32 only.
    pub(crate) fn is_space(&self, code: u32) -> bool {
        !self.composite && code == 32
    }

    pub(crate) fn glyph(&self, code: u32) -> Option<Glyph<'_>> {
        if let Some(face) = &self.face {
            let index = if self.composite {
                match &self.cid_to_gid {
                    Some(map) => map.get(code as usize).copied().unwrap_or(0),
                    None => u16::try_from(code).unwrap_or(0),
                }
            } else {
                self.unicode(code)
                    .map(|ch| face.lookup_glyph_index(ch))
                    .filter(|index| *index != 0)
                    .or_else(|| char::from_u32(0xF000 + code).map(|ch| face.lookup_glyph_index(ch)))
                    .unwrap_or(0)
            };
            if index != 0 && index < face.glyph_count() {
                return Some(Glyph { face, index });
            }
        }

        let face = fallback_face()?;
        let ch = self.unicode(code)?;
        let index = face.lookup_glyph_index(ch);
        (index != 0).then_some(Glyph { face, index })
    }

    /// Horizontal advance of `code` in thousandths of text space units.
    pub(crate) fn advance(&self, code: u32, glyph: Option<&Glyph<'_>>) -> f32 {
        let declared = match &self.widths {
            Widths::Simple { first, widths, missing } => code
                .checked_sub(*first)
                .and_then(|offset| widths.get(offset as usize).copied())
                .or(*missing),
            Widths::Composite { default, widths } => {
                Some(widths.get(&code).copied().unwrap_or(*default))
            }
            Widths::None => None,
        };

        declared
            .or_else(|| {
                glyph.map(|glyph| glyph.face.metrics_indexed(glyph.index, 1000.0).advance_width)
            })
            .unwrap_or(DEFAULT_WIDTH / 2.0)
    }

    fn unicode(&self, code: u32) -> Option<char> {
        self.to_unicode
            .get(&code)
            .copied()
            .or_else(|| self.encoding.get(code as usize).copied().flatten())
    }
}

fn descriptor<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    resolve_dict(doc, font.get(b"FontDescriptor").ok()?)
}

fn embedded_face(doc: &Document, font: &Dictionary) -> Option<Font> {
    let descriptor = descriptor(doc, font)?;
    let program = [b"FontFile2".as_slice(), b"FontFile3".as_slice()]
        .into_iter()
        .find_map(|key| descriptor.get(key).ok())
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_stream().ok())?;

    if let Ok(subtype) = program.dict.get(b"Subtype").and_then(Object::as_name) {
        if subtype != b"OpenType" {
            return None;
        }
    }

    let bytes = stream_bytes(program).ok()?;
    match Font::from_bytes(bytes, FontSettings::default()) {
        Ok(face) => Some(face),
        Err(err) => {
            tracing::debug!(err, "embedded font program not usable, falling back");
            None
        }
    }
}

fn cid_to_gid(doc: &Document, font: &Dictionary) -> Option<Vec<u16>> {
    let stream = resolve(doc, font.get(b"CIDToGIDMap").ok()?)?.as_stream().ok()?;
    let bytes = stream_bytes(stream).ok()?;
    Some(bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect())
}

fn simple_widths(doc: &Document, font: &Dictionary) -> Widths {
    let missing = descriptor(doc, font)
        .and_then(|descriptor| descriptor.get(b"MissingWidth").ok())
        .and_then(number);
    let first = font.get(b"FirstChar").ok().and_then(number);
    let widths = font
        .get(b"Widths")
        .ok()
        .and_then(|widths| resolve(doc, widths))
        .and_then(|widths| widths.as_array().ok());

    match (first, widths) {
        (Some(first), Some(widths)) => Widths::Simple {
            first: first.max(0.0) as u32,
            widths: widths
                .iter()
                .map(|width| resolve(doc, width).and_then(number).unwrap_or(0.0))
                .collect(),
            missing,
        },
        _ => missing.map_or(Widths::None, |missing| Widths::Simple {
            first: 0,
            widths: Vec::new(),
            missing: Some(missing),
        }),
    }
}

fn composite_widths(doc: &Document, font: &Dictionary) -> Widths {
    let default = font.get(b"DW").ok().and_then(number).unwrap_or(DEFAULT_WIDTH);
    let mut widths = HashMap::new();
    let items = font
        .get(b"W")
        .ok()
        .and_then(|items| resolve(doc, items))
        .and_then(|items| items.as_array().ok())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let value = |index: usize| items.get(index).and_then(|item| resolve(doc, item));
    let mut index = 0;
    while let Some(first) = value(index).and_then(number) {
        let first = first.max(0.0) as u32;
        match value(index + 1) {
            Some(Object::Array(run)) => {
                for (offset, width) in run.iter().enumerate() {
                    if let Some(width) = resolve(doc, width).and_then(number) {
                        widths.insert(first + offset as u32, width);
                    }
                }
                index += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (number(last), value(index + 2).and_then(number))
                else {
                    break;
                };
                let last = (last.max(0.0) as u32).min(first.saturating_add(MAX_RANGE));
                for code in first..=last {
                    widths.insert(code, width);
                }
                index += 3;
            }
            None => break,
        }
    }

    Widths::Composite { default, widths }
}

fn simple_encoding(doc: &Document, font: &Dictionary) -> Vec<Option<char>> {
    let mut table: Vec<Option<char>> = (0..=255u8).map(win_ansi).collect();

    let differences = font
        .get(b"Encoding")
        .ok()
        .and_then(|encoding| resolve_dict(doc, encoding))
        .and_then(|encoding| encoding.get(b"Differences").ok())
        .and_then(|differences| resolve(doc, differences))
        .and_then(|differences| differences.as_array().ok());

    let mut code = 0usize;
    for item in differences.into_iter().flatten() {
        match item {
            Object::Integer(start) => code = (*start).clamp(0, 255) as usize,
            Object::Name(name) => {
                if let Some(slot) = table.get_mut(code) {
                    *slot = glyph_name_char(name).or(*slot);
                }
                code += 1;
            }
            _ => {}
        }
    }
    table
}

fn win_ansi(byte: u8) -> Option<char> {
    const HIGH: [Option<char>; 32] = [
        Some('€'), None, Some('‚'), Some('ƒ'),
        Some('„'), Some('…'), Some('†'), Some('‡'),
        Some('ˆ'), Some('‰'), Some('Š'), Some('‹'),
        Some('Œ'), None, Some('Ž'), None,
        None, Some('‘'), Some('’'), Some('“'),
        Some('”'), Some('•'), Some('–'), Some('—'),
        Some('˜'), Some('™'), Some('š'), Some('›'),
        Some('œ'), None, Some('ž'), Some('Ÿ'),
    ];
    match byte {
        0x20..=0x7e | 0xa0..=0xff => Some(char::from(byte)),
        0x80..=0x9f => HIGH[usize::from(byte - 0x80)],
        _ => None,
    }
}

fn glyph_name_char(name: &[u8]) -> Option<char> {
    let name = std::str::from_utf8(name).ok()?;
    let name = name.split('.').next().unwrap_or(name);

    if let [single] = name.as_bytes() {
        return Some(char::from(*single)).filter(char::is_ascii_alphabetic);
    }
    if let Some(hex) = name.strip_prefix("uni").or_else(|| name.strip_prefix('u')) {
        if let Some(ch) = u32::from_str_radix(hex.get(..4.min(hex.len()))?, 16)
            .ok()
            .and_then(char::from_u32)
        {
            return Some(ch);
        }
    }

    let ch = match name {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "asciicircum" => '^',
        "underscore" => '_',
        "grave" => '`',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "asciitilde" => '~',
        "bullet" => '•',
        "endash" => '–',
        "emdash" => '—',
        "quoteleft" => '‘',
        "quoteright" => '’',
        "quotedblleft" => '“',
        "quotedblright" => '”',
        "ellipsis" => '…',
        "degree" => '°',
        "fi" => 'ﬁ',
        "fl" => 'ﬂ',
        _ => return None,
    };
    Some(ch)
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

fn cmap_tokens(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < data.len() {
        match data[index] {
            b'<' => {
                let end = data[index..].iter().position(|byte| *byte == b'>').map(|p| index + p);
                let Some(end) = end else { break };
                let digits: Vec<u8> = data[index + 1..end]
                    .iter()
                    .filter(|byte| byte.is_ascii_hexdigit())
                    .copied()
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .map(|pair| {
                        let text = std::str::from_utf8(pair).unwrap_or("0");
                        u8::from_str_radix(&format!("{text:0<2}"), 16).unwrap_or(0)
                    })
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
                index = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::Open);
                index += 1;
            }
            b']' => {
                tokens.push(CMapToken::Close);
                index += 1;
            }
            byte if byte.is_ascii_alphabetic() => {
                let end = data[index..]
                    .iter()
                    .position(|byte| !byte.is_ascii_alphanumeric())
                    .map_or(data.len(), |p| index + p);
                tokens.push(CMapToken::Word(String::from_utf8_lossy(&data[index..end]).into()));
                index = end;
            }
            _ => index += 1,
        }
    }
    tokens
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |code, byte| (code << 8) | u32::from(*byte))
}

fn first_char(utf16: &[u8]) -> Option<char> {
    let units = utf16.chunks(2).map(|pair| code_of(pair) as u16);
    char::decode_utf16(units).next()?.ok()
}

/// Reads `bfchar` and `bfrange` sections of a ToUnicode CMap, keeping the
/// first character of each mapping.
pub(crate) fn parse_to_unicode(data: &[u8]) -> HashMap<u32, char> {
    use CMapToken::{Close, Hex, Open, Word};

    let tokens = cmap_tokens(data);
    let mut map = HashMap::new();
    let mut index = 0;

    while index < tokens.len() {
        match &tokens[index] {
            Word(word) if word == "beginbfchar" => {
                index += 1;
                while let (Some(Hex(source)), Some(Hex(target))) =
                    (tokens.get(index), tokens.get(index + 1))
                {
                    if let Some(ch) = first_char(target) {
                        map.insert(code_of(source), ch);
                    }
                    index += 2;
                }
            }
            Word(word) if word == "beginbfrange" => {
                index += 1;
                while let (Some(Hex(low)), Some(Hex(high))) =
                    (tokens.get(index), tokens.get(index + 1))
                {
                    let (low, high) = (code_of(low), code_of(high));
                    let high = high.min(low.saturating_add(MAX_RANGE));
                    match tokens.get(index + 2) {
                        Some(Hex(target)) => {
                            if let Some(start) = first_char(target) {
                                for (offset, code) in (low..=high).enumerate() {
                                    if let Some(ch) = char::from_u32(start as u32 + offset as u32) {
                                        map.insert(code, ch);
                                    }
                                }
                            }
                            index += 3;
                        }
                        Some(Open) => {
                            index += 3;
                            let mut code = low;
                            while let Some(Hex(target)) = tokens.get(index) {
                                if let Some(ch) = first_char(target) {
                                    map.insert(code, ch);
                                }
                                code += 1;
                                index += 1;
                            }
                            if matches!(tokens.get(index), Some(Close)) {
                                index += 1;
                            }
                        }
                        _ => break,
                    }
                }
            }
            _ => index += 1,
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    #[test]
    fn to_unicode_reads_chars_and_ranges() {
        let cmap = b"begincmap\n2 beginbfchar\n<0003> <0020>\n<0024> <0041>\nendbfchar\n\
            1 beginbfrange\n<0044> <0046> <0061>\nendbfrange\n\
            1 beginbfrange\n<0050> <0051> [<005A> <0059>]\nendbfrange\nendcmap";

        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03), Some(&' '));
        assert_eq!(map.get(&0x24), Some(&'A'));
        assert_eq!(map.get(&0x46), Some(&'c'));
        assert_eq!(map.get(&0x51), Some(&'Y'));
    }

    #[test]
    fn differences_override_win_ansi() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => dictionary! {
                "Differences" => vec![
                    Object::Integer(65),
                    Object::Name(b"bullet".to_vec()),
                    Object::Name(b"uni263A".to_vec()),
                ],
            },
        };

        let font = PdfFont::load(&doc, &font);
        assert_eq!(font.unicode(65), Some('•'));
        assert_eq!(font.unicode(66), Some('☺'));
        assert_eq!(font.unicode(0x93), Some('“'));
        assert_eq!(font.codes(b"AB"), vec![65, 66]);
    }

    #[test]
    fn standard_font_falls_back_to_bundled_face() {
        let doc = Document::with_version("1.5");
        let font = PdfFont::load(
            &doc,
            &dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" },
        );

        let glyph = font.glyph(u32::from(b'H')).expect("fallback glyph");
        assert!(font.advance(u32::from(b'H'), Some(&glyph)) > 500.0);
        assert!(font.glyph(0x01).is_none());
    }

    #[test]
    fn composite_widths_read_both_forms() {
        let doc = Document::with_version("1.5");
        let descendant = dictionary! {
            "DW" => 500_i64,
            "W" => vec![
                Object::Integer(1), Object::Array(vec![Object::Integer(250), Object::Integer(300)]),
                Object::Integer(10), Object::Integer(12), Object::Integer(700),
            ],
        };

        let Widths::Composite { default, widths } = composite_widths(&doc, &descendant) else {
            panic!("composite widths expected");
        };
        assert_eq!(default, 500.0);
        assert_eq!(widths.get(&2), Some(&300.0));
        assert_eq!(widths.get(&11), Some(&700.0));
        assert_eq!(widths.get(&5), None);
    }
}
