use fixed::types::I32F32;
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};

use crate::assets::ImageData;
use crate::canvas::{Command, Overlay};
use crate::error::Result;
use crate::font::StandardFont;
use crate::types::{Color, Pt};

/// Serializes an overlay as a single-page PDF whose MediaBox is the overlay's
/// page size. Fonts are standard-14 Type1 with WinAnsi encoding, so nothing
/// is embedded except images.
pub fn overlay_to_pdf(overlay: &Overlay) -> Result<Vec<u8>> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let fonts = used_fonts(&overlay.commands);
    let mut font_dict = Dictionary::new();
    for (idx, font) in fonts.iter().enumerate() {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        font_dict.set(font_resource_name(idx), font_id);
    }

    let mut xobject_dict = Dictionary::new();
    for (name, image) in &overlay.images {
        let smask_id = image
            .alpha
            .as_ref()
            .map(|alpha| doc.add_object(smask_stream(image, alpha)));
        let image_id = doc.add_object(image_stream(image, smask_id));
        xobject_dict.set(name.as_str(), image_id);
    }

    let mut resources = Dictionary::new();
    if !font_dict.is_empty() {
        resources.set("Font", font_dict);
    }
    if !xobject_dict.is_empty() {
        resources.set("XObject", xobject_dict);
    }

    let content = render_content(&overlay.commands, &fonts).into_bytes();
    let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
    let size = overlay.page_size;
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            size.width.to_f32().into(),
            size.height.to_f32().into(),
        ],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, LoObject::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn font_resource_name(idx: usize) -> String {
    format!("F{}", idx + 1)
}

/// Fonts in order of first use.
fn used_fonts(commands: &[Command]) -> Vec<StandardFont> {
    let mut fonts = Vec::new();
    for cmd in commands {
        if let Command::SetFont(font, _) = cmd {
            if !fonts.contains(font) {
                fonts.push(*font);
            }
        }
    }
    if fonts.is_empty() && commands.iter().any(|c| matches!(c, Command::DrawString { .. })) {
        fonts.push(StandardFont::Helvetica);
    }
    fonts
}

fn image_stream(image: &ImageData, smask_id: Option<lopdf::ObjectId>) -> LoStream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => 8,
    };
    if let Some(filter) = image.filter {
        dict.set("Filter", filter);
    }
    if let Some(id) = smask_id {
        dict.set("SMask", id);
    }
    LoStream::new(dict, image.data.clone())
}

fn smask_stream(image: &ImageData, alpha: &[u8]) -> LoStream {
    LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha.to_vec(),
    )
}

fn render_content(commands: &[Command], fonts: &[StandardFont]) -> String {
    let mut out = String::new();
    let mut current_font = StandardFont::Helvetica;
    let mut current_font_size = Pt::from_f32(12.0);
    // Mirrors the canvas: a restore brings back the font in effect at the save.
    let mut font_stack: Vec<(StandardFont, Pt)> = Vec::new();

    for cmd in commands {
        match cmd {
            Command::SaveState => {
                font_stack.push((current_font, current_font_size));
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some((font, size)) = font_stack.pop() {
                    current_font = font;
                    current_font_size = size;
                }
                out.push_str("Q\n");
            }
            Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFont(font, size) => {
                current_font = *font;
                current_font_size = *size;
            }
            Command::ClipRect(rect) => {
                out.push_str(&format!(
                    "{} {} {} {} re\nW\nn\n",
                    fmt_pt(rect.x),
                    fmt_pt(rect.y),
                    fmt_pt(rect.width),
                    fmt_pt(rect.height)
                ));
            }
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::Stroke => out.push_str("S\n"),
            Command::StrokeRect(rect) => {
                out.push_str(&format!(
                    "{} {} {} {} re\nS\n",
                    fmt_pt(rect.x),
                    fmt_pt(rect.y),
                    fmt_pt(rect.width),
                    fmt_pt(rect.height)
                ));
            }
            Command::DrawString { x, y, text } => {
                let Some(idx) = fonts.iter().position(|f| *f == current_font) else {
                    continue;
                };
                let encoded = encode_winansi_pdf_string(text);
                if encoded.replaced > 0 {
                    log::debug!(
                        "{} character(s) in {:?} are not WinAnsi and were replaced",
                        encoded.replaced,
                        text
                    );
                }
                out.push_str("BT\n");
                out.push_str(&format!(
                    "/{} {} Tf\n",
                    font_resource_name(idx),
                    fmt_pt(current_font_size)
                ));
                out.push_str(&format!("{} {} Td\n", fmt_pt(*x), fmt_pt(*y)));
                out.push_str(&format!("({}) Tj\n", encoded.text));
                out.push_str("ET\n");
            }
            Command::DrawImage { rect, resource_id } => {
                out.push_str("q\n");
                out.push_str(&format!(
                    "{} 0 0 {} {} {} cm\n",
                    fmt_pt(rect.width),
                    fmt_pt(rect.height),
                    fmt_pt(rect.x),
                    fmt_pt(rect.y)
                ));
                out.push_str(&format!("/{} Do\n", resource_id));
                out.push_str("Q\n");
            }
        }
    }
    out
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

/// Escaped PDF literal-string body in WinAnsi (cp1252). Unmappable
/// characters become `?`.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }

    WinAnsiEncoded { text: out, replaced }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let frac = format!("{:03}", frac_part);
    format!("{}{}.{}", sign, int_part, frac.trim_end_matches('0'))
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn color_to_pdf_fill(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}
