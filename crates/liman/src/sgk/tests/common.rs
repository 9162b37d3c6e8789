use axum::response::Response;
use chrono::{NaiveDate, TimeZone, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde_json::Value;
use std::sync::Arc;

use crate::memory::MemoryPersonnel;
use crate::sgk::{
    DocumentStatus, Employee, EmployeeDocument, EmployeeId, ParsedRow, PeriodCode, TcKimlik,
    TenantId, HIRE_NOTIFICATION,
};

pub(super) const FIRST_NAMES: [&str; 8] = [
    "Ali", "Ayşe", "Mehmet", "Fatma", "Mustafa", "Zeynep", "Hüseyin", "Elif",
];
pub(super) const LAST_NAMES: [&str; 6] = ["Yılmaz", "Kaya", "Demir", "Şahin", "Çelik", "Öztürk"];

pub(super) fn tenant() -> TenantId {
    TenantId("liman-a".into())
}

pub(super) fn period(raw: &str) -> PeriodCode {
    raw.parse().expect("valid period")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn tc(index: usize) -> TcKimlik {
    TcKimlik::parse(&format!("{}", 10_000_000_000u64 + index as u64 * 7919)).expect("11 digits")
}

pub(super) fn employee_id(index: usize) -> EmployeeId {
    EmployeeId(format!("emp-{index:03}"))
}

pub(super) fn first_name(index: usize) -> &'static str {
    FIRST_NAMES[index % FIRST_NAMES.len()]
}

pub(super) fn last_name(index: usize) -> &'static str {
    LAST_NAMES[index % LAST_NAMES.len()]
}

pub(super) fn employee(index: usize) -> Employee {
    Employee {
        id: employee_id(index),
        tenant_id: tenant(),
        full_name: format!("{} {}", first_name(index), last_name(index)),
        nationality: Some("TR".into()),
        tc_kimlik: Some(tc(index)),
        passport_no: None,
        active: true,
        sgk_last_check_period: None,
        sgk_is_active_last_period: None,
    }
}

/// Personnel store holding employees `0..count` of the test tenant.
pub(super) fn roster(count: usize) -> Arc<MemoryPersonnel> {
    let personnel = MemoryPersonnel::default();
    for index in 0..count {
        personnel.insert_employee(employee(index)).expect("seed employee");
    }
    Arc::new(personnel)
}

pub(super) fn parsed_row(index: usize, row: usize) -> ParsedRow {
    ParsedRow {
        tc_no: tc(index),
        passport_no: None,
        full_name_raw: format!("{} {}", first_name(index), last_name(index)).to_uppercase(),
        source_row_index: row,
    }
}

pub(super) fn hire_document(
    index: usize,
    status: Option<DocumentStatus>,
    uploaded: NaiveDate,
) -> EmployeeDocument {
    EmployeeDocument {
        id: index as u64 + 500,
        employee_id: employee_id(index),
        document_type: HIRE_NOTIFICATION.into(),
        status,
        uploaded_at: Utc.from_utc_datetime(&uploaded.and_hms_opt(10, 0, 0).expect("valid time")),
        version: 1,
        is_latest_version: true,
        previous_version_id: None,
    }
}

fn utf16(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn cell(operations: &mut Vec<Operation>, x: i64, y: i64, text: &str) {
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new("Tf", vec!["F1".into(), 9.into()]));
    operations.push(Operation::new(
        "Tm",
        vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
    ));
    operations.push(Operation::new("Tj", vec![utf16(text)]));
    operations.push(Operation::new("ET", vec![]));
}

/// A service list laid out as a table: header on the first page only, thirty rows per page.
pub(super) fn service_list_pdf(employees: &[usize]) -> Vec<u8> {
    let mut pages = Vec::new();
    for (page_index, chunk) in employees.chunks(30).enumerate() {
        let mut operations = Vec::new();
        let mut y = 780;
        if page_index == 0 {
            cell(&mut operations, 40, y, "4/a HİZMET LİSTESİ");
            y -= 30;
            for (x, label) in [(40, "Sıra"), (90, "T.C. Kimlik No"), (220, "Adı"), (330, "Soyadı")] {
                cell(&mut operations, x, y, label);
            }
            y -= 20;
        }
        for (offset, index) in chunk.iter().enumerate() {
            let row = page_index * 30 + offset + 1;
            cell(&mut operations, 40, y, &row.to_string());
            cell(&mut operations, 90, y, tc(*index).as_str());
            cell(&mut operations, 220, y, first_name(*index));
            cell(&mut operations, 330, y, last_name(*index));
            y -= 18;
        }
        pages.push(operations);
    }
    pdf_from_pages(pages)
}

/// Free-text lines with no table header, one identity per line.
pub(super) fn plain_lines_pdf(lines: &[String]) -> Vec<u8> {
    let mut operations = Vec::new();
    let mut y = 780;
    for line in lines {
        cell(&mut operations, 40, y, line);
        y -= 16;
    }
    pdf_from_pages(vec![operations])
}

pub(super) fn pdf_from_pages(pages: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let encoded = content.encode().expect("content encodes");
        let content_id = document.add_object(Stream::new(dictionary! {}, encoded));
        let page_id: ObjectId = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document.save_to(&mut bytes).expect("pdf serializes");
    bytes
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
