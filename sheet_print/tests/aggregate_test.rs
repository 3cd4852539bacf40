//! Tests for PDF concatenation.

mod common;

use lopdf::Document;
use sheet_print::aggregate::{concatenate, A4_HEIGHT, A4_WIDTH};

use common::{assert_close, page_geometry, placement_matrices, write_pdf, write_pdf_with_box};

#[test]
fn keeps_order_and_reports_missing_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("A.pdf");
    let b = dir.path().join("B.pdf");
    let c = dir.path().join("C.pdf");
    write_pdf(&a, 612, 792, "page A");
    write_pdf(&c, 300, 400, "page C");
    let output = dir.path().join("combined.pdf");

    let report = concatenate(&[&a, &b, &c], &output).unwrap();

    assert!(report.written);
    assert_eq!(report.pages, 2);
    assert_eq!(report.missing, vec![b.clone()]);
    assert_eq!(report.missing[0].file_name().unwrap(), "B.pdf");

    let doc = Document::load(&output).unwrap();
    let geometry = page_geometry(&doc);
    assert_eq!(geometry.len(), 2);

    // Page order follows input order: A's form first, then C's.
    let (_, first_form) = geometry[0];
    let (_, second_form) = geometry[1];
    assert_close(first_form[2], 612.0);
    assert_close(first_form[3], 792.0);
    assert_close(second_form[2], 300.0);
    assert_close(second_form[3], 400.0);
}

#[test]
fn every_page_is_a4_regardless_of_source_size() {
    let dir = tempfile::tempdir().unwrap();
    let boxes: [[i64; 4]; 5] = [
        [0, 0, 612, 792],
        [0, 0, 300, 400],
        [0, 0, 1190, 842],
        [100, 50, 400, 450],
        [-20, 30, 580, 830],
    ];
    let inputs: Vec<_> = boxes
        .iter()
        .enumerate()
        .map(|(i, media_box)| {
            let path = dir.path().join(format!("{}.pdf", i));
            write_pdf_with_box(&path, *media_box, "sized");
            path
        })
        .collect();
    let output = dir.path().join("combined.pdf");

    let report = concatenate(&inputs, &output).unwrap();
    assert_eq!(report.pages, boxes.len());
    assert!(report.missing.is_empty());

    let doc = Document::load(&output).unwrap();
    let geometry = page_geometry(&doc);
    let matrices = placement_matrices(&doc);
    assert_eq!(geometry.len(), boxes.len());
    assert_eq!(matrices.len(), boxes.len());

    for ((source, (media_box, form_box)), matrix) in boxes.iter().zip(geometry).zip(matrices) {
        assert_close(media_box[0], 0.0);
        assert_close(media_box[1], 0.0);
        assert_close(media_box[2], A4_WIDTH as f64);
        assert_close(media_box[3], A4_HEIGHT as f64);

        let [x0, y0, x1, y1] = source.map(|v| v as f64);
        for (actual, expected) in form_box.iter().zip([x0, y0, x1, y1]) {
            assert_close(*actual, expected);
        }

        let sx = A4_WIDTH as f64 / (x1 - x0);
        let sy = A4_HEIGHT as f64 / (y1 - y0);
        let expected = [sx, 0.0, 0.0, sy, -x0 * sx, -y0 * sy];
        for (actual, expected) in matrix.iter().zip(expected) {
            assert_close(*actual, expected);
        }

        // The source box lands exactly on the A4 page
        assert_close(x0 * matrix[0] + matrix[4], 0.0);
        assert_close(y0 * matrix[3] + matrix[5], 0.0);
        assert_close(x1 * matrix[0] + matrix[4], A4_WIDTH as f64);
        assert_close(y1 * matrix[3] + matrix[5], A4_HEIGHT as f64);
    }
}

#[test]
fn imported_form_carries_inherited_resources() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    write_pdf(&input, 612, 792, "fonts");
    let output = dir.path().join("combined.pdf");

    concatenate(&[&input], &output).unwrap();

    let doc = Document::load(&output).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let page = doc.get_dictionary(page_id).unwrap();
    let xobject_id = page
        .get(b"Resources")
        .and_then(|r| r.as_dict())
        .and_then(|r| r.get(b"XObject"))
        .and_then(|x| x.as_dict())
        .and_then(|x| x.get(b"P0"))
        .and_then(|p| p.as_reference())
        .unwrap();
    let form = doc.get_object(xobject_id).unwrap().as_stream().unwrap();

    let resources = match form.dict.get(b"Resources").unwrap() {
        lopdf::Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        lopdf::Object::Dictionary(dict) => dict,
        other => panic!("unexpected resources: {:?}", other),
    };
    assert!(resources.get(b"Font").is_ok());
}

#[test]
fn all_inputs_missing_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("combined.pdf");
    let inputs = [dir.path().join("x.pdf"), dir.path().join("y.pdf")];

    let report = concatenate(&inputs, &output).unwrap();

    assert!(!report.written);
    assert_eq!(report.pages, 0);
    assert_eq!(report.missing.len(), 2);
    assert!(!output.exists());
}
