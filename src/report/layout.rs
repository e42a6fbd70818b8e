// Page layout for the PDF report.
//
// A small flowing canvas over lopdf: a cursor goes down the current page and
// a new page starts when the next block does not fit. Text uses the standard
// Times fonts with WinAnsi encoding, so no font file is embedded.

use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

// A4, in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 28.35;
/// One millimetre in points.
pub const MM: f32 = 2.8346;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum FontStyle {
    Regular,
    Bold,
}

impl FontStyle {
    fn resource_name(&self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Bold => "F2",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Align {
    Left,
    Center,
    Right,
}

// *** Font metrics ***

// Advance widths of the WinAnsi codes 32 to 126, in thousandths of the font size.
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // ' ' to '/'
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // '0' to '?'
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // '@' to 'O'
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 'P' to '_'
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // '`' to 'o'
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, // 'p' to '~'
];

const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

/// The unaccented letter drawn with the same width as an accented one.
fn base_letter(c: char) -> char {
    match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'Ç' => 'C',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'Ñ' => 'N',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'Ý' => 'Y',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

fn glyph_width(code: u8, style: FontStyle) -> u16 {
    let table = match style {
        FontStyle::Regular => &TIMES_ROMAN_WIDTHS,
        FontStyle::Bold => &TIMES_BOLD_WIDTHS,
    };
    let code = match code {
        0xC0..=0xFF => base_letter(code as char) as u32,
        c => c as u32,
    };
    match code {
        32..=126 => table[(code - 32) as usize],
        _ => 500,
    }
}

/// Encodes text for a WinAnsi font. Characters outside the encoding become '?'.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{20ac}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}

/// The width of `text` in points.
pub fn text_width(text: &str, style: FontStyle, size: f32) -> f32 {
    let units: u32 = encode_win_ansi(text)
        .into_iter()
        .map(|b| glyph_width(b, style) as u32)
        .sum();
    units as f32 * size / 1000.0
}

/// Greedy word wrapping. A word wider than `max_width` gets a line of its own.
pub fn wrap_text(text: &str, style: FontStyle, size: f32, max_width: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if text_width(&candidate, style, size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// 1234567 -> "1,234,567"
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut res = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            res.push(',');
        }
        res.push(c);
    }
    res
}

// *** Canvas ***

fn real(v: f32) -> Object {
    v.into()
}

/// A cell of a table row.
pub struct Cell<'a> {
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub text: &'a str,
    pub style: FontStyle,
    pub size: f32,
    pub align: Align,
    pub fill: Option<[f32; 3]>,
    pub border: bool,
}

pub struct PdfCanvas {
    pages: Vec<Vec<Operation>>,
    images: Vec<(String, RgbImage)>,
    // Distance from the top edge of the current page.
    y: f32,
}

impl Default for PdfCanvas {
    fn default() -> Self {
        PdfCanvas::new()
    }
}

impl PdfCanvas {
    pub fn new() -> PdfCanvas {
        PdfCanvas {
            pages: Vec::new(),
            images: Vec::new(),
            y: MARGIN,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn content_width(&self) -> f32 {
        PAGE_WIDTH - 2.0 * MARGIN
    }

    pub fn cursor(&self) -> f32 {
        self.y
    }

    pub fn add_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = MARGIN;
    }

    pub fn ln(&mut self, height: f32) {
        self.y += height;
    }

    /// Starts a new page unless `height` still fits above the bottom margin.
    /// Returns true when a page was added.
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if self.pages.is_empty() || self.y + height > PAGE_HEIGHT - MARGIN {
            self.add_page();
            return true;
        }
        false
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.add_page();
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn text_at(&mut self, x: f32, baseline: f32, text: &str, style: FontStyle, size: f32) {
        let bytes = encode_win_ansi(text);
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![style.resource_name().into(), real(size)],
        ));
        ops.push(Operation::new(
            "Td",
            vec![real(x), real(PAGE_HEIGHT - baseline)],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(bytes, StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    fn aligned_x(x: f32, width: f32, text_w: f32, align: Align) -> f32 {
        match align {
            Align::Left => x,
            Align::Center => x + (width - text_w) / 2.0,
            Align::Right => x + width - text_w,
        }
    }

    /// One line of text across the content width. Moves the cursor below it.
    pub fn text_line(&mut self, text: &str, style: FontStyle, size: f32, align: Align) {
        let line_height = size * 1.4;
        self.ensure_space(line_height);
        let w = text_width(text, style, size);
        let x = PdfCanvas::aligned_x(MARGIN, self.content_width(), w, align);
        let baseline = self.y + size;
        self.text_at(x, baseline, text, style, size);
        self.y += line_height;
    }

    /// Wrapped, left-aligned text. Returns the number of lines.
    pub fn paragraph(&mut self, text: &str, style: FontStyle, size: f32) -> usize {
        let lines = wrap_text(text, style, size, self.content_width());
        for line in lines.iter() {
            self.text_line(line, style, size, Align::Left);
        }
        lines.len()
    }

    /// Draws a cell at the cursor height. The cursor does not move.
    pub fn cell(&mut self, cell: &Cell) {
        let top = self.y;
        let padding = MM;
        let rect = vec![
            real(cell.x),
            real(PAGE_HEIGHT - top - cell.height),
            real(cell.width),
            real(cell.height),
        ];
        {
            let ops = self.ops();
            if let Some([r, g, b]) = cell.fill {
                ops.push(Operation::new("rg", vec![real(r), real(g), real(b)]));
            }
            if cell.border {
                ops.push(Operation::new("RG", vec![real(0.0), real(0.0), real(0.0)]));
                ops.push(Operation::new("w", vec![real(0.5)]));
            }
            let paint = match (cell.fill.is_some(), cell.border) {
                (true, true) => Some("B"),
                (true, false) => Some("f"),
                (false, true) => Some("S"),
                (false, false) => None,
            };
            if let Some(paint) = paint {
                ops.push(Operation::new("re", rect));
                ops.push(Operation::new(paint, vec![]));
            }
            ops.push(Operation::new("g", vec![real(0.0)]));
        }
        let text_w = text_width(cell.text, cell.style, cell.size);
        let x = PdfCanvas::aligned_x(
            cell.x + padding,
            cell.width - 2.0 * padding,
            text_w,
            cell.align,
        );
        let baseline = top + cell.height / 2.0 + cell.size * 0.35;
        self.text_at(x, baseline, cell.text, cell.style, cell.size);
    }

    /// Registers an image and returns the name to place it with.
    pub fn add_image(&mut self, img: RgbImage) -> String {
        let name = format!("Im{}", self.images.len() + 1);
        self.images.push((name.clone(), img));
        name
    }

    /// Draws a registered image with its top-left corner at (x, cursor),
    /// then moves the cursor below it.
    pub fn place_image(&mut self, name: &str, x: f32, width: f32, height: f32) {
        self.ensure_space(height);
        let bottom = PAGE_HEIGHT - self.y - height;
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(width),
                real(0.0),
                real(0.0),
                real(height),
                real(x),
                real(bottom),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
        ops.push(Operation::new("Q", vec![]));
        self.y += height;
    }

    /// Assembles the pages into a document.
    pub fn into_document(self, title: &str) -> Result<Document, lopdf::Error> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Bold",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut xobjects = Dictionary::new();
        for (name, img) in self.images {
            let (width, height) = img.dimensions();
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                img.into_raw(),
            );
            let image_id = doc.add_object(stream);
            xobjects.set(name, image_id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
            "XObject" => xobjects,
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in self.pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(encode_win_ansi(title), StringFormat::Literal),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        Ok(doc)
    }
}
