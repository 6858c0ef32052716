//! Generated human-readable narrative.

use serde::Serialize;

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// http://hl7.org/fhir/valueset-narrative-status.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeStatus {
    Generated,
    Extensions,
    Additional,
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Narrative {
    pub status: NarrativeStatus,
    pub div: String,
}

/// Build a machine-generated narrative from text paragraphs.
///
/// Empty paragraphs are skipped. Every line of the remaining paragraphs becomes its own `<p>`
/// element, in order.
pub fn narrative<I, S>(paragraphs: I) -> Narrative
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut div = format!("<div xmlns=\"{XHTML_NAMESPACE}\">");
    for paragraph in paragraphs {
        let paragraph = paragraph.as_ref();
        if paragraph.is_empty() {
            continue;
        }
        for line in paragraph.lines() {
            div.push_str("<p>");
            push_escaped(&mut div, line);
            div.push_str("</p>");
        }
    }
    div.push_str("</div>");

    Narrative {
        status: NarrativeStatus::Generated,
        div,
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
