use crate::calc::LetterGrade;
use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    pub title: String,
    pub issuer_name: String,
    pub footer_note: String,
}

impl Default for CertificateTemplate {
    fn default() -> Self {
        Self {
            title: "Certificate of Completion".to_string(),
            issuer_name: "Course Team".to_string(),
            footer_note: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDocument {
    pub title: String,
    pub issuer_name: String,
    pub student_name: String,
    pub course_name: String,
    pub grade: LetterGrade,
    pub completion_date: String,
    pub display_date: String,
    pub verification_code: String,
    pub text: String,
    pub html: String,
}

/// Short, stable code a reader can use to check a printed certificate against the
/// workspace.
pub fn verification_code(
    student_name: &str,
    course_name: &str,
    grade: LetterGrade,
    completion_date: NaiveDate,
) -> String {
    let iso_date = completion_date.format("%Y-%m-%d").to_string();
    let mut hasher = Sha256::new();
    for part in [student_name, course_name, grade.as_str(), iso_date.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_ascii_uppercase()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Pure formatting. Callers only get here after completion was confirmed.
pub fn render_certificate(
    template: &CertificateTemplate,
    student_name: &str,
    course_name: &str,
    grade: LetterGrade,
    completion_date: NaiveDate,
) -> CertificateDocument {
    let student_name = student_name.trim();
    let course_name = course_name.trim();
    let iso_date = completion_date.format("%Y-%m-%d").to_string();
    let display_date = completion_date.format("%B %-d, %Y").to_string();
    let code = verification_code(student_name, course_name, grade, completion_date);

    let mut text = format!(
        "{}\n\nThis certifies that\n\n{}\n\nhas completed\n\n{}\n\nwith a grade of {} on {}.\n\n{}\nVerification: {}\n",
        template.title, student_name, course_name, grade, display_date, template.issuer_name, code
    );
    if !template.footer_note.is_empty() {
        text.push('\n');
        text.push_str(&template.footer_note);
        text.push('\n');
    }

    let footer = if template.footer_note.is_empty() {
        String::new()
    } else {
        format!(
            "\n    <p class=\"footer\">{}</p>",
            escape_html(&template.footer_note)
        )
    };
    let html = format!(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>{title}</title></head>
  <body class="certificate">
    <h1>{title}</h1>
    <p>This certifies that</p>
    <h2 class="student">{student}</h2>
    <p>has completed</p>
    <h3 class="course">{course}</h3>
    <p>with a grade of <strong class="grade">{grade}</strong> on <time datetime="{iso}">{date}</time>.</p>
    <p class="issuer">{issuer}</p>
    <p class="verification">Verification: <code>{code}</code></p>{footer}
  </body>
</html>
"#,
        title = escape_html(&template.title),
        student = escape_html(student_name),
        course = escape_html(course_name),
        grade = escape_html(grade.as_str()),
        iso = iso_date,
        date = display_date,
        issuer = escape_html(&template.issuer_name),
        code = code,
        footer = footer,
    );

    CertificateDocument {
        title: template.title.clone(),
        issuer_name: template.issuer_name.clone(),
        student_name: student_name.to_string(),
        course_name: course_name.to_string(),
        grade,
        completion_date: iso_date,
        display_date,
        verification_code: code,
        text,
        html,
    }
}
