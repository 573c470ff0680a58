use crate::locale::Language;
use crate::workflow::approval::ApprovedDocument;

fn document_title(language: Language) -> &'static str {
    match language {
        Language::En => "Understanding Your Heart Care",
        Language::Es => "Comprender su atención cardíaca",
        Language::Fr => "Comprendre vos soins cardiaques",
    }
}

fn review_line(language: Language, clinician: &str, date: &str) -> String {
    match language {
        Language::En => format!("Reviewed and approved by {} on {}.", clinician, date),
        Language::Es => format!("Revisado y aprobado por {} el {}.", clinician, date),
        Language::Fr => format!("Relu et approuvé par {} le {}.", clinician, date),
    }
}

/// Patient-facing Markdown. Uses each section's effective content.
pub fn render_approved_document(doc: &ApprovedDocument) -> String {
    let mut out = format!("# {}\n", document_title(doc.language()));
    for section in doc.sections() {
        out.push_str(&format!(
            "\n## {}\n\n{}\n",
            section.title.trim(),
            section.effective_content().trim()
        ));
    }
    let date = doc.approved_at().split('T').next().unwrap_or(doc.approved_at());
    out.push_str("\n---\n\n");
    out.push_str(&review_line(doc.language(), doc.approved_by(), date));
    out.push('\n');
    out
}
