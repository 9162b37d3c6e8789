use std::sync::Arc;

use super::common::*;
use crate::deadline::Deadline;
use crate::sgk::{
    ComplianceStatus, DocumentStatus, ParseStrategy, SgkIngestService, SgkUpload,
};

fn upload(bytes: Vec<u8>) -> SgkUpload {
    SgkUpload {
        tenant_id: tenant(),
        period_code: period("202510"),
        uploaded_by: "ik@liman.example".to_string(),
        bytes,
        reference_date: Some(date(2025, 11, 5)),
    }
}

#[tokio::test]
async fn same_pdf_twice_gives_same_counts_and_two_audit_rows() {
    let personnel = roster(48);
    let service = SgkIngestService::new(personnel.clone(), 60);
    let listed: Vec<usize> = (0..45).collect();
    let pdf = service_list_pdf(&listed);

    let first = service
        .ingest(upload(pdf.clone()), Deadline::none())
        .await
        .expect("first ingest");
    assert_eq!(first.strategy, ParseStrategy::Table);
    assert_eq!(first.pages, 2);
    assert_eq!(first.report.rows_parsed, 45);
    assert_eq!(
        (first.report.matched_count, first.report.missing_count, first.report.extra_count),
        (45, 3, 0)
    );
    let memberships = personnel.memberships().expect("readable");

    let second = service
        .ingest(upload(pdf), Deadline::none())
        .await
        .expect("second ingest");
    assert_eq!(
        (second.report.matched_count, second.report.missing_count, second.report.extra_count),
        (45, 3, 0)
    );
    assert_eq!(second.checksum, first.checksum);
    assert_eq!(personnel.memberships().expect("readable"), memberships);
    assert_eq!(personnel.period_checks().expect("readable").len(), 2);
}

#[tokio::test]
async fn statuses_follow_the_new_period() {
    let personnel = roster(3);
    personnel
        .insert_document(hire_document(2, Some(DocumentStatus::Pending), date(2025, 10, 20)))
        .expect("seed document");
    let service = SgkIngestService::new(personnel.clone(), 60);

    let outcome = service
        .ingest(upload(service_list_pdf(&[0])), Deadline::none())
        .await
        .expect("ingested");

    let status_of = |index: usize| {
        outcome
            .statuses
            .iter()
            .find(|status| status.employee_id == employee_id(index))
            .map(|status| status.status)
    };
    assert_eq!(outcome.statuses.len(), 3);
    assert_eq!(status_of(0), Some(ComplianceStatus::Tam));
    assert_eq!(status_of(1), Some(ComplianceStatus::Eksik));
    assert_eq!(status_of(2), Some(ComplianceStatus::OnayBekliyor));
}

#[tokio::test]
async fn names_are_normalized_from_the_table() {
    let personnel = roster(2);
    let service = SgkIngestService::new(personnel, 60);
    let outcome = service
        .ingest(upload(service_list_pdf(&[0, 1, 77])), Deadline::none())
        .await
        .expect("ingested");

    assert_eq!(outcome.report.extra_count, 1);
    assert_eq!(outcome.report.extra[0].full_name_raw, "ZEYNEP ÖZTÜRK");
    assert_eq!(outcome.report.matched[0].full_name, "Ali Yılmaz");
}

#[tokio::test]
async fn headerless_lists_fall_back_to_line_scanning() {
    let personnel = roster(3);
    let service = SgkIngestService::new(personnel, 60);
    let lines = vec![
        format!("1 {} Ali Yılmaz 30", tc(0)),
        format!("2 Ayşe Kaya {} 30", tc(1)),
        "Toplam 2 sigortalı".to_string(),
    ];

    let outcome = service
        .ingest(upload(plain_lines_pdf(&lines)), Deadline::none())
        .await
        .expect("ingested");

    assert_eq!(outcome.strategy, ParseStrategy::Lines);
    assert_eq!(outcome.report.matched_count, 2);
    assert_eq!(outcome.report.missing_count, 1);
}

#[tokio::test]
async fn unreadable_upload_writes_nothing() {
    let personnel = roster(5);
    let service = SgkIngestService::new(personnel.clone(), 60);

    let outcome = service
        .ingest(upload(b"<html>not a pdf</html>".to_vec()), Deadline::none())
        .await
        .expect("reported, not raised");

    assert!(outcome.report.pdf_unreadable);
    assert_eq!(outcome.report.rows_parsed, 0);
    assert_eq!(outcome.report.period_check_id, None);
    assert!(outcome.statuses.is_empty());
    assert!(personnel.memberships().expect("readable").is_empty());
    assert!(personnel.period_checks().expect("readable").is_empty());
}

#[tokio::test]
async fn readable_pdf_without_identities_marks_nobody_missing() {
    let personnel = roster(5);
    let service = SgkIngestService::new(personnel.clone(), 60);

    let outcome = service
        .ingest(
            upload(plain_lines_pdf(&["Bu dönem bildirim yapılmamıştır".to_string()])),
            Deadline::none(),
        )
        .await
        .expect("ingested");

    assert!(!outcome.report.pdf_unreadable);
    assert_eq!(outcome.strategy, ParseStrategy::Nothing);
    assert_eq!(outcome.report.missing_count, 0);
    assert!(personnel.memberships().expect("readable").is_empty());
}

#[tokio::test]
async fn storage_key_is_derived_from_the_checksum() {
    let service = SgkIngestService::new(Arc::new(crate::memory::MemoryPersonnel::default()), 60);
    let pdf = service_list_pdf(&[0]);
    let expected = crate::sgk::service::checksum(&pdf);

    let outcome = service
        .ingest(upload(pdf), Deadline::none())
        .await
        .expect("ingested");
    assert_eq!(outcome.checksum, expected);
    assert_eq!(outcome.storage_key, format!("sgk/liman-a/202510/{expected}.pdf"));
}
