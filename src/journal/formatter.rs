//! Turns journal details into human readable lines.
//!
//! A line is a sequence of typed spans so the same detail can be rendered
//! as plain text or as Markdown. Multi-valued custom field details are
//! merged per journal into at most one "added" and one "deleted" line per
//! field.

use super::models::{DetailProperty, Journal, JournalDetail};
use crate::contact::{
    Attachment, ChangeRendering, ContactField, CustomField, ReferenceKind,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Resolves ids of referenced entities to display names.
pub trait ReferenceLookup {
    /// Returns Ok(None) when the referenced entity no longer exists.
    fn reference_name(&self, kind: ReferenceKind, id: i64) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Plain,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Label(String),
    Text(String),
    Value(String),
    Deleted(String),
    Link { text: String, href: String },
    DownloadLink { href: String },
    DiffLink { href: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLine(pub Vec<Span>);

impl DetailLine {
    pub fn spans(&self) -> &[Span] {
        &self.0
    }

    pub fn render(&self, style: LineStyle) -> String {
        let mut out = String::new();
        for span in &self.0 {
            match style {
                LineStyle::Plain => match span {
                    Span::Label(s) | Span::Text(s) | Span::Value(s) | Span::Deleted(s) => {
                        out.push_str(s)
                    }
                    Span::Link { text, .. } => out.push_str(text),
                    Span::DownloadLink { .. } | Span::DiffLink { .. } => {}
                },
                LineStyle::Markdown => match span {
                    Span::Label(s) => out.push_str(&format!("**{}**", escape_markdown(s))),
                    Span::Text(s) => out.push_str(s),
                    Span::Value(s) if s.is_empty() => {}
                    Span::Value(s) => out.push_str(&format!("*{}*", escape_markdown(s))),
                    Span::Deleted(s) if s.is_empty() => {}
                    Span::Deleted(s) => out.push_str(&format!("~~{}~~", escape_markdown(s))),
                    Span::Link { text, href } => {
                        out.push_str(&format!("[{}]({})", escape_markdown(text), href))
                    }
                    Span::DownloadLink { href } => out.push_str(&format!(" [download]({})", href)),
                    Span::DiffLink { href } => out.push_str(&format!(" ([diff]({}))", href)),
                },
            }
        }
        out
    }
}

impl fmt::Display for DetailLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(LineStyle::Plain))
    }
}

fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']' | '~' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit site-relative links; absolute links use `base_url`.
    pub only_path: bool,
    pub base_url: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            only_path: true,
            base_url: String::new(),
        }
    }
}

/// A detail as rendered: a stored detail, or a merged multi-value one.
struct DetailView<'d> {
    journal_id: i64,
    detail_id: Option<i64>,
    property: DetailProperty,
    prop_key: &'d str,
    old: Vec<String>,
    new: Vec<String>,
}

impl<'d> From<&'d JournalDetail> for DetailView<'d> {
    fn from(detail: &'d JournalDetail) -> Self {
        Self {
            journal_id: detail.journal_id,
            detail_id: Some(detail.id),
            property: detail.property,
            prop_key: &detail.prop_key,
            old: detail.old_value.iter().cloned().collect(),
            new: detail.value.iter().cloned().collect(),
        }
    }
}

/// Renders the journals of one contact. Reference names are cached for the
/// lifetime of the formatter.
pub struct JournalFormatter<'a> {
    lookup: &'a dyn ReferenceLookup,
    custom_fields: HashMap<i64, CustomField>,
    attachments: HashMap<i64, Attachment>,
    options: RenderOptions,
    reference_cache: HashMap<(ReferenceKind, i64), Option<String>>,
}

impl<'a> JournalFormatter<'a> {
    pub fn new(
        lookup: &'a dyn ReferenceLookup,
        custom_fields: &[CustomField],
        attachments: &[Attachment],
        options: RenderOptions,
    ) -> Self {
        Self {
            lookup,
            custom_fields: custom_fields.iter().map(|f| (f.id, f.clone())).collect(),
            attachments: attachments.iter().map(|a| (a.id, a.clone())).collect(),
            options,
            reference_cache: HashMap::new(),
        }
    }

    /// Lines for every detail of `journal`, multi-valued fields merged last.
    pub fn details_to_lines(&mut self, journal: &Journal) -> Result<Vec<DetailLine>> {
        let mut lines = Vec::with_capacity(journal.details.len());
        let mut merged: Vec<(&str, Vec<String>, Vec<String>)> = Vec::new();

        for detail in &journal.details {
            let multiple = detail
                .custom_field_id()
                .and_then(|id| self.custom_fields.get(&id))
                .map_or(false, |f| f.multiple);
            if !multiple {
                lines.push(self.show_detail(&DetailView::from(detail))?);
                continue;
            }

            let index = match merged.iter().position(|(key, _, _)| *key == detail.prop_key) {
                Some(i) => i,
                None => {
                    merged.push((&detail.prop_key, vec![], vec![]));
                    merged.len() - 1
                }
            };
            let (_, added, deleted) = &mut merged[index];
            added.extend(detail.value.iter().cloned());
            deleted.extend(detail.old_value.iter().cloned());
        }

        for (key, added, deleted) in merged {
            for (old, new) in [(vec![], added), (deleted, vec![])] {
                if old.is_empty() && new.is_empty() {
                    continue;
                }
                lines.push(self.show_detail(&DetailView {
                    journal_id: journal.id,
                    detail_id: None,
                    property: DetailProperty::CustomField,
                    prop_key: key,
                    old,
                    new,
                })?);
            }
        }
        Ok(lines)
    }

    /// Renders a journal's details as strings in the given style.
    pub fn format_journal(&mut self, journal: &Journal, style: LineStyle) -> Result<Vec<String>> {
        Ok(self
            .details_to_lines(journal)?
            .iter()
            .map(|line| line.render(style))
            .collect())
    }

    fn show_detail(&mut self, detail: &DetailView) -> Result<DetailLine> {
        let mut rendering = ChangeRendering::Plain;
        let mut multiple = false;

        let (label, old, new) = match detail.property {
            DetailProperty::Attribute => match ContactField::from_column(detail.prop_key) {
                Some(field) => match field.reference() {
                    Some(kind) => (
                        field.label().to_string(),
                        self.resolve_references(kind, &detail.old)?,
                        self.resolve_references(kind, &detail.new)?,
                    ),
                    None => (
                        field.label().to_string(),
                        detail.old.iter().map(|v| field.display_value(v)).collect(),
                        detail.new.iter().map(|v| field.display_value(v)).collect(),
                    ),
                },
                None => (
                    detail.prop_key.to_string(),
                    detail.old.clone(),
                    detail.new.clone(),
                ),
            },
            DetailProperty::CustomField => {
                let field = detail
                    .prop_key
                    .parse::<i64>()
                    .ok()
                    .and_then(|id| self.custom_fields.get(&id));
                match field {
                    Some(field) => {
                        rendering = field.format.change_rendering();
                        multiple = field.multiple;
                        (
                            field.name.clone(),
                            detail.old.iter().map(|v| field.format_value(v)).collect(),
                            detail.new.iter().map(|v| field.format_value(v)).collect(),
                        )
                    }
                    None => (
                        detail.prop_key.to_string(),
                        detail.old.clone(),
                        detail.new.clone(),
                    ),
                }
            }
            DetailProperty::Attachment => (
                "File".to_string(),
                detail.old.clone(),
                detail.new.clone(),
            ),
        };

        let mut spans = vec![Span::Label(label)];
        match rendering {
            ChangeRendering::NoDetail => {
                spans.push(Span::Text(" updated".to_string()));
                return Ok(DetailLine(spans));
            }
            ChangeRendering::DiffOnly => {
                spans.push(Span::Text(" updated".to_string()));
                spans.push(Span::DiffLink {
                    href: self.diff_url(detail.journal_id, detail.detail_id),
                });
                return Ok(DetailLine(spans));
            }
            ChangeRendering::Plain => {}
        }

        if !detail.new.is_empty() {
            if detail.property == DetailProperty::Attachment {
                spans.push(Span::Text(" ".to_string()));
                spans.extend(self.attachment_spans(&detail.new[0]));
                spans.push(Span::Text(" added".to_string()));
            } else if !detail.old.is_empty() {
                spans.push(Span::Text(" changed from ".to_string()));
                spans.push(Span::Value(old.join(", ")));
                spans.push(Span::Text(" to ".to_string()));
                spans.push(Span::Value(new.join(", ")));
            } else if multiple {
                spans.push(Span::Text(" ".to_string()));
                spans.push(Span::Value(new.join(", ")));
                spans.push(Span::Text(" added".to_string()));
            } else {
                spans.push(Span::Text(" set to ".to_string()));
                spans.push(Span::Value(new.join(", ")));
            }
        } else if !detail.old.is_empty() {
            spans.push(Span::Text(" deleted (".to_string()));
            spans.push(Span::Deleted(old.join(", ")));
            spans.push(Span::Text(")".to_string()));
        } else {
            spans.push(Span::Text(" updated".to_string()));
        }
        Ok(DetailLine(spans))
    }

    fn resolve_references(&mut self, kind: ReferenceKind, raw: &[String]) -> Result<Vec<String>> {
        raw.iter()
            .map(|value| {
                let Ok(id) = value.parse::<i64>() else {
                    return Ok(String::new());
                };
                let name = match self.reference_cache.get(&(kind, id)) {
                    Some(cached) => cached.clone(),
                    None => {
                        let name = self.lookup.reference_name(kind, id)?;
                        self.reference_cache.insert((kind, id), name.clone());
                        name
                    }
                };
                Ok(name.unwrap_or_default())
            })
            .collect()
    }

    fn attachment_spans(&self, raw_id: &str) -> Vec<Span> {
        let attachment = raw_id
            .parse::<i64>()
            .ok()
            .and_then(|id| self.attachments.get(&id));
        let Some(attachment) = attachment else {
            return vec![Span::Value(raw_id.to_string())];
        };

        let mut spans = vec![Span::Link {
            text: attachment.filename.clone(),
            href: self.url(&format!(
                "/attachments/{}/{}",
                attachment.id, attachment.filename
            )),
        }];
        if self.options.only_path {
            spans.push(Span::DownloadLink {
                href: format!(
                    "/attachments/download/{}/{}",
                    attachment.id, attachment.filename
                ),
            });
        }
        spans
    }

    fn diff_url(&self, journal_id: i64, detail_id: Option<i64>) -> String {
        match detail_id {
            Some(detail_id) => self.url(&format!(
                "/journals/{}/diff?detail_id={}",
                journal_id, detail_id
            )),
            None => self.url(&format!("/journals/{}/diff", journal_id)),
        }
    }

    fn url(&self, path: &str) -> String {
        if self.options.only_path {
            path.to_string()
        } else {
            format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
        }
    }
}
