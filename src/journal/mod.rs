pub mod formatter;
mod journal_store;
pub mod models;
pub mod pending;
pub mod visibility;

pub use formatter::{
    DetailLine, JournalFormatter, LineStyle, ReferenceLookup, RenderOptions, Span,
};
pub use journal_store::JournalStore;
pub use models::{DetailProperty, Journal, JournalDetail};
pub use pending::{DetailDraft, JournalDraft, PendingEdit};
pub use visibility::{filter_visible, ViewerContext};
