//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;

use chrono::{Duration, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object};
use serde_json::{json, Value};
use sheet_print::models::{ClientSecrets, SPREADSHEET_MIME_TYPE};
use sheet_print::{Authenticator, DriveClient, Endpoints, TokenStore, Tokens};

pub const ACCESS_TOKEN: &str = "test-access-token";

pub fn secrets(server_url: &str) -> ClientSecrets {
    ClientSecrets {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        auth_uri: format!("{}/auth", server_url),
        token_uri: format!("{}/token", server_url),
        redirect_uris: vec!["http://localhost".to_string()],
    }
}

pub fn valid_tokens() -> Tokens {
    Tokens {
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: "test-refresh-token".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

/// Drive client pointed at a mock server, authenticated with a fresh token.
pub fn drive_client(server_url: &str, token_dir: &Path) -> DriveClient {
    let auth = Authenticator::with_tokens(
        &secrets(server_url),
        TokenStore::new(token_dir.join("token.json")),
        valid_tokens(),
    )
    .unwrap();
    DriveClient::with_endpoints(
        auth,
        Endpoints {
            drive_api: server_url.to_string(),
            docs: server_url.to_string(),
        },
    )
}

pub fn file_json(id: &str, name: &str, mime: &str, parents: &[&str], trashed: bool) -> Value {
    json!({
        "id": id,
        "name": name,
        "mimeType": mime,
        "parents": parents,
        "trashed": trashed,
    })
}

pub fn sheet_json(id: &str, name: &str, parent: &str) -> Value {
    file_json(id, name, SPREADSHEET_MIME_TYPE, &[parent], false)
}

/// A one-page PDF with the given MediaBox size and a line of text.
///
/// Resources sit on the page tree node so importers must resolve them
/// through inheritance.
pub fn pdf_bytes(width: i64, height: i64, marker: &str) -> Vec<u8> {
    pdf_bytes_with_box([0, 0, width, height], marker)
}

/// Like [`pdf_bytes`] with an arbitrary `[x0, y0, x1, y1]` MediaBox.
pub fn pdf_bytes_with_box(media_box: [i64; 4], marker: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![10.into(), 10.into()]),
            Operation::new("Tj", vec![Object::string_literal(marker)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(lopdf::Stream::new(
        dictionary! {},
        content.encode().unwrap(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => media_box.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn write_pdf(path: &Path, width: i64, height: i64, marker: &str) {
    std::fs::write(path, pdf_bytes(width, height, marker)).unwrap();
}

pub fn write_pdf_with_box(path: &Path, media_box: [i64; 4], marker: &str) {
    std::fs::write(path, pdf_bytes_with_box(media_box, marker)).unwrap();
}

pub fn number(object: &Object) -> f64 {
    match object {
        Object::Integer(value) => *value as f64,
        Object::Real(value) => *value as f64,
        other => panic!("not a number: {:?}", other),
    }
}

/// Four numbers of a PDF rectangle array.
pub fn rect(object: &Object) -> [f64; 4] {
    let values = object.as_array().unwrap();
    assert_eq!(values.len(), 4);
    [
        number(&values[0]),
        number(&values[1]),
        number(&values[2]),
        number(&values[3]),
    ]
}

/// MediaBox of each page and BBox of the form it draws, in page order.
pub fn page_geometry(doc: &Document) -> Vec<([f64; 4], [f64; 4])> {
    doc.get_pages()
        .values()
        .map(|page_id| {
            let page = doc.get_dictionary(*page_id).unwrap();
            let media_box = rect(page.get(b"MediaBox").unwrap());
            let xobject_id = page
                .get(b"Resources")
                .unwrap()
                .as_dict()
                .unwrap()
                .get(b"XObject")
                .unwrap()
                .as_dict()
                .unwrap()
                .get(b"P0")
                .unwrap()
                .as_reference()
                .unwrap();
            let form = doc.get_object(xobject_id).unwrap().as_stream().unwrap();
            (media_box, rect(form.dict.get(b"BBox").unwrap()))
        })
        .collect()
}

/// Operands of the `cm` operator in each page's content stream, in page order.
pub fn placement_matrices(doc: &Document) -> Vec<[f64; 6]> {
    doc.get_pages()
        .values()
        .map(|page_id| {
            let content = Content::decode(&doc.get_page_content(*page_id).unwrap()).unwrap();
            let cm = content
                .operations
                .iter()
                .find(|op| op.operator == "cm")
                .expect("page content has no cm operator");
            assert_eq!(cm.operands.len(), 6);
            let mut matrix = [0.0; 6];
            for (slot, operand) in matrix.iter_mut().zip(&cm.operands) {
                *slot = number(operand);
            }
            matrix
        })
        .collect()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {}, got {}",
        expected,
        actual
    );
}
