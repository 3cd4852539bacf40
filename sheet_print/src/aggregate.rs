//! Concatenate exported PDFs into one A4 document.
//!
//! Each input contributes its first page. The page content is wrapped in a
//! Form XObject and drawn onto a fresh A4 page, stretched so the source
//! MediaBox covers the whole target page.

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::error::{DriveError, Result};

/// ISO A4 width in points.
pub const A4_WIDTH: f32 = 595.28;

/// ISO A4 height in points.
pub const A4_HEIGHT: f32 = 841.89;

/// Upper bound on page tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 32;

const XOBJECT_NAME: &str = "P0";

/// Outcome of a concatenation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregateReport {
    /// Pages written to the output document.
    pub pages: usize,
    /// Inputs that did not exist when aggregation ran, in input order.
    pub missing: Vec<PathBuf>,
    /// False when there was nothing to import and no document was written.
    pub written: bool,
}

/// Import the first page of every existing input, in order, into a new A4
/// document at `output`.
///
/// Missing inputs are skipped and listed in the report; they never fail the
/// call. An input that exists but is not a readable PDF does.
pub fn concatenate<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<AggregateReport> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    let mut missing = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        if !input.exists() {
            warn!(path = %input.display(), "Aggregation input no longer exists, skipping");
            missing.push(input.to_path_buf());
            continue;
        }
        let page_id = import_first_page(&mut doc, input, pages_id)?;
        debug!(path = %input.display(), page = kids.len() + 1, "Imported page");
        kids.push(page_id.into());
    }

    if kids.is_empty() {
        return Ok(AggregateReport {
            pages: 0,
            missing,
            written: false,
        });
    }

    let pages = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    // Drops the imported catalogs and page trees
    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DriveError::PdfWriteError {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;
    fs::write(output, buffer)?;

    Ok(AggregateReport {
        pages,
        missing,
        written: true,
    })
}

/// Merge `path`'s objects into `doc` and append an A4 page drawing its first
/// page. Returns the new page's id.
fn import_first_page(doc: &mut Document, path: &Path, parent: ObjectId) -> Result<ObjectId> {
    let pdf_error = |source: lopdf::Error| DriveError::PdfError {
        path: path.to_path_buf(),
        source,
    };

    let mut source = Document::load(path).map_err(pdf_error)?;
    source.renumber_objects_with(doc.max_id + 1);

    let source_page = source
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| DriveError::EmptyPdf(path.to_path_buf()))?;

    let media_box = media_box(&source, source_page);
    let resources = inherited_attribute(&source, source_page, b"Resources")
        .unwrap_or_else(|| Object::Dictionary(Dictionary::new()));
    let content = source.get_page_content(source_page).map_err(pdf_error)?;

    let max_id = source.max_id;
    doc.objects.extend(source.objects);
    doc.max_id = max_id;

    let [x0, y0, x1, y1] = media_box;
    let xobject_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![real(x0), real(y0), real(x1), real(y1)],
            "Resources" => resources,
        },
        content,
    ));

    let (width, height) = (x1 - x0, y1 - y0);
    let scale_x = A4_WIDTH / width;
    let scale_y = A4_HEIGHT / height;
    let placement = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(scale_x),
                    Object::Integer(0),
                    Object::Integer(0),
                    real(scale_y),
                    real(-x0 * scale_x),
                    real(-y0 * scale_y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(XOBJECT_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let placement = placement.encode().map_err(pdf_error)?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, placement));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "MediaBox" => a4_box(),
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                XOBJECT_NAME => xobject_id,
            },
        },
        "Contents" => content_id,
    }))
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn a4_box() -> Vec<Object> {
    vec![
        Object::Integer(0),
        Object::Integer(0),
        real(A4_WIDTH),
        real(A4_HEIGHT),
    ]
}

/// Effective MediaBox of a page as `[x0, y0, x1, y1]`, A4 when absent or
/// malformed.
fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let fallback = [0.0, 0.0, A4_WIDTH, A4_HEIGHT];

    let Some(Object::Array(values)) =
        inherited_attribute(doc, page_id, b"MediaBox").map(|o| resolve(doc, o))
    else {
        return fallback;
    };
    if values.len() != 4 {
        return fallback;
    }

    let mut rect = [0.0f32; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        match number(&resolve(doc, value)) {
            Some(n) => *slot = n,
            None => return fallback,
        }
    }

    // Normalise corner order
    let [a, b, c, d] = rect;
    let normalised = [a.min(c), b.min(d), a.max(c), b.max(d)];
    if normalised[2] - normalised[0] <= 0.0 || normalised[3] - normalised[1] <= 0.0 {
        return fallback;
    }
    normalised
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve(doc: &Document, object: Object) -> Object {
    match object {
        Object::Reference(id) => doc.get_object(id).cloned().unwrap_or(Object::Null),
        other => other,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}
