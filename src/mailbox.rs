use serde::Serialize;

/// Read-only view of a remote message as returned by a metadata fetch.
///
/// Missing headers are empty strings and an unknown size is 0, so filters
/// never have to deal with absent fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailSummary {
    pub id: String,
    pub thread_id: String,
    pub labels: Vec<String>,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Raw `Date` header, not guaranteed to parse.
    pub date: String,
    pub size: u64,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error: {0}")]
    Api(String),
}

/// Remote mailbox operations needed by the cleaner.
///
/// `trash` and `permanently_delete` are best effort per message: a single
/// failing id is skipped and the returned count reflects only the messages
/// that were actually processed. An `Err` means the whole call failed.
pub trait MailboxClient {
    /// Search with `query` (empty means everything), following pagination
    /// until `max_results` summaries are collected or pages run out.
    fn list_candidates(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailSummary>, MailboxError>;

    fn trash(&self, ids: &[String]) -> Result<usize, MailboxError>;

    fn permanently_delete(&self, ids: &[String]) -> Result<usize, MailboxError>;

    fn list_labels(&self) -> Result<Vec<Label>, MailboxError>;
}
