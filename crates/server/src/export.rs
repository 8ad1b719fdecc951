//! Labelcopy document rendering.
//!
//! Renders the finished field map through a Tera template into the plain
//! text file that goes out via `sendDocument`. Fields keep the canonical
//! order; anything never filled in renders as a dash so the recipient sees
//! what is still missing.

use greenroom_core::collab::{CollabError, DocumentExporter, ExportedDocument};
use greenroom_core::fields::{FieldMap, LABELCOPY_FIELDS};
use tera::{Context, Tera};

const TEMPLATE_NAME: &str = "labelcopy.txt";
const TEMPLATE: &str = "\
{{ title }}
{{ rule }}

{% for row in rows -%}
{{ row.label }}: {{ row.value }}
{% endfor %}\
";

pub struct TeraExporter {
    tera: Tera,
}

#[derive(serde::Serialize)]
struct Row {
    label: &'static str,
    value: String,
}

impl TeraExporter {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self { tera })
    }
}

impl DocumentExporter for TeraExporter {
    fn render(&self, title: &str, fields: &FieldMap) -> Result<ExportedDocument, CollabError> {
        let rows: Vec<Row> = LABELCOPY_FIELDS
            .iter()
            .copied()
            .map(|label| Row {
                label,
                value: fields.get(label).cloned().unwrap_or_else(|| "—".to_string()),
            })
            .collect();

        let mut context = Context::new();
        context.insert("title", title);
        context.insert("rule", &"=".repeat(title.chars().count().max(1)));
        context.insert("rows", &rows);

        let body = self
            .tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| CollabError::payload("export", error.to_string()))?;

        Ok(ExportedDocument {
            filename: format!("{}.txt", title.replace(' ', "_")),
            bytes: body.into_bytes(),
        })
    }
}
