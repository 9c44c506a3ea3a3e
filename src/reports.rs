use crate::model::{DataForm, SchoolRow, Teacher, User};
use crate::pdf::{PdfDocument, MARGIN_LEFT};
use crate::roster::{csv_quote, COL_BOARD, COL_LOCATION, COL_SCHOOL_NAME, COL_SUB_LOCATION};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOf<T> {
    pub rows: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total: usize,
}

/// 1-based pages; a page past the end is clamped to the last one.
pub fn paginate<T: Clone>(rows: &[T], page: usize, page_size: usize) -> PageOf<T> {
    let page_size = page_size.max(1);
    let total = rows.len();
    let page_count = total.div_ceil(page_size).max(1);
    let page = page.clamp(1, page_count);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total);
    PageOf {
        rows: rows.get(start..end).map(|s| s.to_vec()).unwrap_or_default(),
        page,
        page_size,
        page_count,
        total,
    }
}

pub fn school_data_csv(rows: &[SchoolRow]) -> String {
    let mut csv = format!(
        "SN,{},{},{},{},UID\n",
        COL_BOARD, COL_LOCATION, COL_SUB_LOCATION, COL_SCHOOL_NAME
    );
    for r in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            r.sn,
            csv_quote(&r.board),
            csv_quote(&r.location),
            csv_quote(&r.sub_location),
            csv_quote(&r.school_name),
            csv_quote(&r.uid)
        ));
    }
    csv
}

const COLS: [f32; 6] = [MARGIN_LEFT, 75.0, 165.0, 250.0, 335.0, 470.0];

pub fn render_school_report(
    rows: &[SchoolRow],
    title: &str,
    generated_at: Option<&str>,
    page_break_y: f32,
) -> PdfDocument {
    let mut doc = PdfDocument::new(page_break_y);
    doc.heading(title);
    if let Some(at) = generated_at {
        doc.line(&format!("Generated {}", at));
    }
    doc.line(&format!("{} schools", rows.len()));
    doc.advance(6.0);

    let header = ["SN", "Board", "Location", "Sub location", "School", "UID"];
    let header_cells = COLS.iter().copied().zip(header).collect::<Vec<_>>();
    doc.row(&header_cells, true);
    for r in rows {
        // Repeat the header at the top of every page.
        if doc.at_break() {
            doc.new_page();
            doc.row(&header_cells, true);
        }
        let sn = r.sn.to_string();
        let cells = [
            sn.as_str(),
            r.board.as_str(),
            r.location.as_str(),
            r.sub_location.as_str(),
            r.school_name.as_str(),
            r.uid.as_str(),
        ];
        doc.row(&COLS.iter().copied().zip(cells).collect::<Vec<_>>(), false);
    }
    doc
}

fn teacher_lines(doc: &mut PdfDocument, title: &str, teachers: &[Teacher]) {
    doc.section(title);
    if teachers.is_empty() {
        doc.line("None recorded");
        return;
    }
    for (i, t) in teachers.iter().enumerate() {
        let mut parts = vec![t.name.trim()];
        for extra in [&t.subject, &t.contact_no, &t.email] {
            if !extra.trim().is_empty() {
                parts.push(extra.trim());
            }
        }
        doc.line(&format!("{}. {}", i + 1, parts.join(" | ")));
    }
}

/// One school-visit report. `owner` is the submitting user when it still
/// exists.
pub fn render_data_form(
    form: &DataForm,
    owner: Option<&User>,
    generated_at: Option<&str>,
    page_break_y: f32,
) -> PdfDocument {
    let mut doc = PdfDocument::new(page_break_y);
    let sd = &form.school_details;
    doc.heading(&format!("School Visit Report: {}", sd.school_name));
    doc.field(
        "Submitted by",
        &owner
            .map(|u| format!("{} <{}>", u.username, u.email))
            .unwrap_or_default(),
    );
    doc.field("Submitted at", &form.submitted_at);
    if let Some(at) = generated_at {
        doc.field("Generated", at);
    }
    doc.field("Region", &form.selected_region);
    doc.field("Board", &form.selected_board);

    doc.section("School details");
    doc.field("School", &sd.school_name);
    doc.field("Address", &sd.school_address);
    doc.field("Visit date", &sd.date);
    doc.field("Students", &sd.no_of_students.to_string());
    doc.field("Topic covered", &sd.topic_covered);
    doc.field("Remark", &sd.visit_remark);

    let p = &form.principal_info;
    doc.section("Principal");
    doc.field("Name", &p.name);
    doc.field("Contact", &p.contact_no);
    doc.field("Email", &p.email);
    doc.field("Date of birth", &p.dob);
    doc.field("Anniversary", &p.doa);

    teacher_lines(&mut doc, "Graduation teachers", &form.graduation_teachers);
    teacher_lines(&mut doc, "PGT teachers", &form.pgt_teachers);

    doc.section("Strength");
    let cols = [(MARGIN_LEFT, "Stream"), (210.0, "Class 12"), (330.0, "Coaching")];
    doc.row(&cols, true);
    for (name, count) in form.strengths.rows() {
        let in12 = count.in12.to_string();
        let coaching = count.coaching.to_string();
        doc.row(
            &[
                (MARGIN_LEFT, name),
                (210.0, in12.as_str()),
                (330.0, coaching.as_str()),
            ],
            false,
        );
    }

    doc.section("Documents");
    if form.document_urls.is_empty() {
        doc.line("None attached");
    }
    for url in &form.document_urls {
        doc.line(url);
    }
    doc
}
