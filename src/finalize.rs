use std::path::Path;

use lopdf::{
    Dictionary, Document as LoDocument, Object as LoObject, ObjectId as LoObjectId,
    Stream as LoStream, dictionary,
};

use crate::canvas::Overlay;
use crate::error::{ReportFillError, Result, lopdf_err};
use crate::pdf::overlay_to_pdf;
use crate::types::{Pt, Size};

const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
// Bounded walks up the page tree; malformed trees can loop.
const MAX_TREE_DEPTH: usize = 32;

/// What happened to one template page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Nothing was drawn; the template page is emitted as-is.
    NoOverlay,
    Merged,
    /// The overlay could not be serialized or merged; the template page is
    /// emitted unchanged.
    MergeFailed(String),
}

/// Visible area of a template page in its own user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub origin_x: Pt,
    pub origin_y: Pt,
    pub size: Size,
}

/// Parses template bytes, refusing encrypted documents.
pub fn load_template(bytes: &[u8]) -> Result<LoDocument> {
    let doc = LoDocument::load_mem(bytes).map_err(lopdf_err)?;
    if doc.is_encrypted() {
        return Err(ReportFillError::Pdf("template PDF is encrypted".to_string()));
    }
    Ok(doc)
}

/// CropBox, else MediaBox, looked up through the page tree since both are
/// inheritable. Falls back to US Letter.
pub fn page_geometry(doc: &LoDocument, page_id: LoObjectId) -> PageGeometry {
    let [x0, y0, x1, y1] = inherited_box(doc, page_id, b"CropBox")
        .or_else(|| inherited_box(doc, page_id, b"MediaBox"))
        .unwrap_or(DEFAULT_PAGE_BOX);
    PageGeometry {
        origin_x: Pt::from_f32(x0.min(x1)),
        origin_y: Pt::from_f32(y0.min(y1)),
        size: Size::new((x1 - x0).abs(), (y1 - y0).abs()),
    }
}

fn inherited_box(doc: &LoDocument, page_id: LoObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(rect) = node.get(key).ok().and_then(|obj| box_values(doc, obj)) {
            return Some(rect);
        }
        let parent = node.get(b"Parent").and_then(LoObject::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn box_values(doc: &LoDocument, obj: &LoObject) -> Option<[f32; 4]> {
    let obj = match obj {
        LoObject::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0f32; 4];
    for (slot, value) in out.iter_mut().zip(arr) {
        *slot = value.as_float().ok()?;
    }
    Some(out)
}

fn page_box(page: &Dictionary) -> Vec<LoObject> {
    if let Ok(arr) = page.get(b"MediaBox").and_then(LoObject::as_array) {
        return arr.clone();
    }
    DEFAULT_PAGE_BOX.iter().map(|v| (*v).into()).collect()
}

/// The page's Resources, or the nearest ancestor's, since Resources is
/// inheritable. Copying the result onto the page keeps inherited fonts
/// reachable once the page carries its own dictionary.
fn page_resources_object(doc: &LoDocument, page: &Dictionary) -> LoObject {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        match node.get(b"Resources") {
            Ok(LoObject::Reference(id)) => {
                if let Ok(obj) = doc.get_object(*id) {
                    return obj.clone();
                }
            }
            Ok(LoObject::Dictionary(d)) => return LoObject::Dictionary(d.clone()),
            _ => {}
        }
        let Some(parent) = node
            .get(b"Parent")
            .and_then(LoObject::as_reference)
            .ok()
            .and_then(|id| doc.get_dictionary(id).ok())
        else {
            break;
        };
        node = parent;
    }
    LoObject::Dictionary(Dictionary::new())
}

fn page_resources_dict(page: &Dictionary, doc: &LoDocument) -> Dictionary {
    match page_resources_object(doc, page) {
        LoObject::Dictionary(d) => d,
        _ => Dictionary::new(),
    }
}

fn page_xobject_dict(resources: &Dictionary, doc: &LoDocument) -> Dictionary {
    match resources.get(b"XObject") {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

fn page_content_refs(page: &Dictionary) -> Result<Vec<LoObject>> {
    match page.get(b"Contents") {
        Ok(LoObject::Reference(id)) => Ok(vec![LoObject::Reference(*id)]),
        Ok(LoObject::Array(items)) => Ok(items.clone()),
        Err(_) => Ok(Vec::new()),
        Ok(_) => Err(ReportFillError::Pdf(
            "page /Contents is neither a reference nor an array".to_string(),
        )),
    }
}

/// Stamps the single page of `overlay_pdf` on top of the template page as a
/// Form XObject. The template's own content is wrapped in `q`/`Q` so any
/// graphics state it leaves behind cannot leak into the overlay.
///
/// Every fallible step runs before the page dictionary is touched, so on
/// error the page is exactly as it was. Objects imported before the failure
/// are unreachable and dropped by [`finish_document`].
pub fn merge_overlay_onto_page(
    template: &mut LoDocument,
    page_id: LoObjectId,
    overlay_pdf: &[u8],
    form_name: &str,
    geometry: &PageGeometry,
) -> Result<()> {
    let mut overlay = LoDocument::load_mem(overlay_pdf).map_err(lopdf_err)?;
    if overlay.is_encrypted() {
        return Err(ReportFillError::Pdf("overlay PDF is encrypted".to_string()));
    }
    overlay.renumber_objects_with(template.max_id + 1);
    let overlay_page_id = overlay
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| ReportFillError::Pdf("overlay PDF has no pages".to_string()))?;
    let overlay_page = overlay.get_dictionary(overlay_page_id).map_err(lopdf_err)?.clone();
    let overlay_content = overlay.get_page_content(overlay_page_id).map_err(lopdf_err)?;
    let bbox = page_box(&overlay_page);
    let overlay_resources = page_resources_object(&overlay, &overlay_page);

    let page_dict = template.get_dictionary(page_id).map_err(lopdf_err)?.clone();
    let mut contents = page_content_refs(&page_dict)?;
    let mut resources = page_resources_dict(&page_dict, template);
    let mut xobjects = page_xobject_dict(&resources, template);

    if overlay.max_id > template.max_id {
        template.max_id = overlay.max_id;
    }
    template.objects.extend(overlay.objects);

    let form_id = template.add_object(LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => LoObject::Array(bbox),
            "Resources" => overlay_resources,
        },
        overlay_content,
    ));
    xobjects.set(form_name.as_bytes().to_vec(), LoObject::Reference(form_id));
    resources.set("XObject", LoObject::Dictionary(xobjects));

    let open_id = template.add_object(LoStream::new(dictionary! {}, b"q\n".to_vec()));
    let stamp = format!(
        "\nQ\nq 1 0 0 1 {} {} cm /{} Do Q\n",
        geometry.origin_x.to_f32(),
        geometry.origin_y.to_f32(),
        form_name
    );
    let stamp_id = template.add_object(LoStream::new(dictionary! {}, stamp.into_bytes()));
    contents.insert(0, LoObject::Reference(open_id));
    contents.push(LoObject::Reference(stamp_id));

    let page_mut = template.get_dictionary_mut(page_id).map_err(lopdf_err)?;
    page_mut.set("Resources", LoObject::Dictionary(resources));
    page_mut.set("Contents", LoObject::Array(contents));
    Ok(())
}

/// Runs one page through the merge state machine. Failures are logged and
/// reported, never raised.
pub fn composite_page(
    template: &mut LoDocument,
    page_id: LoObjectId,
    page_number: u32,
    overlay: &Overlay,
    geometry: &PageGeometry,
) -> PageOutcome {
    if !overlay.has_content() {
        log::debug!("page {page_number}: nothing drawn, template page kept");
        return PageOutcome::NoOverlay;
    }
    let form_name = format!("RFOverlay{page_number}");
    let merged = overlay_to_pdf(overlay).and_then(|bytes| {
        merge_overlay_onto_page(template, page_id, &bytes, &form_name, geometry)
    });
    match merged {
        Ok(()) => {
            log::debug!("page {page_number}: overlay merged");
            PageOutcome::Merged
        }
        Err(err) => {
            log::warn!("page {page_number}: overlay merge failed, keeping template page: {err}");
            PageOutcome::MergeFailed(err.to_string())
        }
    }
}

/// Drops unreachable objects and serializes the document.
pub fn finish_document(mut doc: LoDocument) -> Result<Vec<u8>> {
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// The only write to the destination; nothing touches `path` before the
/// whole document exists in memory.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::font::StandardFont;

    pub(crate) fn make_pdf(page_texts: &[&str], media_box: [i64; 4]) -> Vec<u8> {
        build_pdf(page_texts, media_box, false)
    }

    /// Same document with `/Resources` only on the `/Pages` node.
    pub(crate) fn make_pdf_with_inherited_resources(page_texts: &[&str]) -> Vec<u8> {
        build_pdf(page_texts, [0, 0, 612, 792], true)
    }

    fn build_pdf(page_texts: &[&str], media_box: [i64; 4], inherit_resources: bool) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<LoObject> = Vec::new();
        for text in page_texts {
            let content = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", text).into_bytes();
            let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if !inherit_resources {
                page.set("Resources", resources_id);
            }
            let page_id = doc.add_object(page);
            kids.push(page_id.into());
        }
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_texts.len() as i64,
            "MediaBox" => media_box.iter().map(|v| (*v).into()).collect::<Vec<LoObject>>(),
        };
        if inherit_resources {
            pages.set("Resources", resources_id);
        }
        doc.objects.insert(pages_id, LoObject::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    pub(crate) fn make_single_page_pdf(text: &str) -> Vec<u8> {
        make_pdf(&[text], [0, 0, 612, 792])
    }

    fn page_id(doc: &LoDocument, number: u32) -> LoObjectId {
        doc.get_pages()[&number]
    }

    fn content_of(doc: &LoDocument, number: u32) -> String {
        let content = doc.get_page_content(page_id(doc, number)).expect("content");
        String::from_utf8_lossy(&content).into_owned()
    }

    fn text_overlay(size: Size, text: &str) -> Overlay {
        let mut canvas = Canvas::new(size);
        canvas.set_font(StandardFont::Helvetica, Pt::from_f32(9.0));
        canvas.draw_string(Pt::from_f32(61.2), Pt::from_f32(741.4), text);
        canvas.finish()
    }

    #[test]
    fn geometry_is_inherited_from_the_page_tree() {
        let doc = load_template(&make_pdf(&["A"], [0, 0, 595, 842])).expect("load");
        let geometry = page_geometry(&doc, page_id(&doc, 1));
        assert_eq!(geometry.size, Size::new(595.0, 842.0));
        assert_eq!(geometry.origin_x, Pt::ZERO);
    }

    #[test]
    fn geometry_prefers_crop_box_and_keeps_its_origin() {
        let mut doc = load_template(&make_single_page_pdf("A")).expect("load");
        let id = page_id(&doc, 1);
        doc.get_dictionary_mut(id).expect("page").set(
            "CropBox",
            vec![10.into(), 20.into(), 310.into(), 420.into()],
        );
        let geometry = page_geometry(&doc, id);
        assert_eq!(geometry.size, Size::new(300.0, 400.0));
        assert_eq!(geometry.origin_x, Pt::from_f32(10.0));
        assert_eq!(geometry.origin_y, Pt::from_f32(20.0));
    }

    #[test]
    fn merged_page_draws_template_then_overlay() {
        let mut doc = load_template(&make_single_page_pdf("TEMPLATE")).expect("load");
        let id = page_id(&doc, 1);
        let geometry = page_geometry(&doc, id);
        let outcome = composite_page(&mut doc, id, 1, &text_overlay(geometry.size, "John Doe"), &geometry);
        assert_eq!(outcome, PageOutcome::Merged);

        let out = load_template(&finish_document(doc).expect("finish")).expect("reload");
        let content = content_of(&out, 1);
        let template_at = content.find("(TEMPLATE) Tj").expect("template text kept");
        let stamp_at = content.find("/RFOverlay1 Do").expect("overlay stamped");
        assert!(content.starts_with("q\n"));
        assert!(template_at < stamp_at);

        let page = out.get_dictionary(page_id(&out, 1)).expect("page");
        let resources = page.get(b"Resources").and_then(LoObject::as_dict).expect("resources");
        let xobjects = resources.get(b"XObject").and_then(LoObject::as_dict).expect("xobjects");
        let form_id = xobjects
            .get(b"RFOverlay1")
            .and_then(LoObject::as_reference)
            .expect("form ref");
        let form = out.get_object(form_id).and_then(LoObject::as_stream).expect("form");
        let form_content = form.decompressed_content().unwrap_or_else(|_| form.content.clone());
        assert!(String::from_utf8_lossy(&form_content).contains("(John Doe) Tj"));
        assert!(resources.get(b"Font").is_ok());
    }

    #[test]
    fn merge_keeps_fonts_inherited_from_the_page_tree() {
        let mut doc = load_template(&make_pdf_with_inherited_resources(&["TEMPLATE"])).expect("load");
        let id = page_id(&doc, 1);
        let geometry = page_geometry(&doc, id);
        let outcome = composite_page(&mut doc, id, 1, &text_overlay(geometry.size, "John Doe"), &geometry);
        assert_eq!(outcome, PageOutcome::Merged);

        let out = load_template(&finish_document(doc).expect("finish")).expect("reload");
        let page = out.get_dictionary(page_id(&out, 1)).expect("page");
        let resources = page.get(b"Resources").and_then(LoObject::as_dict).expect("resources");
        assert!(resources.get(b"XObject").is_ok());
        let fonts = resources.get(b"Font").and_then(LoObject::as_dict).expect("inherited fonts");
        let font_id = fonts.get(b"F1").and_then(LoObject::as_reference).expect("F1");
        let font = out.get_dictionary(font_id).expect("font dict");
        assert_eq!(
            font.get(b"BaseFont").and_then(LoObject::as_name).expect("name"),
            b"Helvetica"
        );
    }

    #[test]
    fn pages_without_overlay_keep_identical_content() {
        let mut doc = load_template(&make_pdf(&["ONE", "TWO"], [0, 0, 612, 792])).expect("load");
        let before = content_of(&doc, 2);
        let empty = Canvas::new(Size::letter()).finish();
        let id2 = page_id(&doc, 2);
        let geometry = page_geometry(&doc, id2);
        assert_eq!(composite_page(&mut doc, id2, 2, &empty, &geometry), PageOutcome::NoOverlay);
        let id1 = page_id(&doc, 1);
        let outcome = composite_page(&mut doc, id1, 1, &text_overlay(geometry.size, "x"), &geometry);
        assert_eq!(outcome, PageOutcome::Merged);

        let out = load_template(&finish_document(doc).expect("finish")).expect("reload");
        assert_eq!(out.get_pages().len(), 2);
        assert_eq!(content_of(&out, 2), before);
    }

    #[test]
    fn corrupt_overlay_leaves_page_untouched() {
        let mut doc = load_template(&make_single_page_pdf("TEMPLATE")).expect("load");
        let id = page_id(&doc, 1);
        let before = format!("{:?}", doc.get_dictionary(id).expect("page"));
        let geometry = page_geometry(&doc, id);
        let err = merge_overlay_onto_page(&mut doc, id, b"this is not a pdf", "RFOverlay1", &geometry)
            .expect_err("must fail");
        assert!(matches!(err, ReportFillError::Pdf(_)));
        assert_eq!(format!("{:?}", doc.get_dictionary(id).expect("page")), before);

        let out = load_template(&finish_document(doc).expect("finish")).expect("reload");
        assert_eq!(content_of(&out, 1), "BT /F1 18 Tf 72 720 Td (TEMPLATE) Tj ET");
    }

    #[test]
    fn output_is_written_once_with_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("output_pdf.pdf");
        write_output(&path, b"%PDF-1.7\n").expect("write");
        assert_eq!(std::fs::read(&path).expect("read"), b"%PDF-1.7\n");
    }

    #[test]
    fn encrypted_or_garbage_templates_are_rejected() {
        let err = load_template(b"garbage").expect_err("garbage");
        assert!(matches!(err, ReportFillError::Pdf(_)));
    }
}
