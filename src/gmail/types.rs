use crate::mailbox::{EmailSummary, Label};
use serde::Deserialize;

// users.messages.list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: u64,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

// users.messages.get (format=metadata)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub size_estimate: u64,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Message {
    /// Header lookup is case-insensitive; the first occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        })
    }

    pub fn into_summary(self) -> EmailSummary {
        let header = |name: &str| self.header(name).unwrap_or_default().to_string();
        let from = header("From");
        let to = header("To");
        let subject = header("Subject");
        let date = header("Date");

        EmailSummary {
            id: self.id,
            thread_id: self.thread_id.unwrap_or_default(),
            labels: self.label_ids,
            from,
            to,
            subject,
            date,
            size: self.size_estimate,
            snippet: self.snippet,
        }
    }
}

// users.labels.list
#[derive(Debug, Deserialize)]
pub struct LabelListResponse {
    #[serde(default)]
    pub labels: Vec<GmailLabel>,
}

#[derive(Debug, Deserialize)]
pub struct GmailLabel {
    pub id: String,
    pub name: String,
}

impl From<GmailLabel> for Label {
    fn from(label: GmailLabel) -> Self {
        Label {
            id: label.id,
            name: label.name,
        }
    }
}

// Error envelope returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_message_list() {
        let data = json!({
            "messages": [
                {"id": "m1", "threadId": "t1"},
                {"id": "m2", "threadId": "t2"}
            ],
            "nextPageToken": "page-2",
            "resultSizeEstimate": 2
        });
        let resp: MessageListResponse = serde_json::from_value(data).unwrap();
        assert_eq!(resp.messages.len(), 2);
        assert_eq!(resp.messages[1].id, "m2");
        assert_eq!(resp.next_page_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn test_deserialize_empty_message_list() {
        let resp: MessageListResponse =
            serde_json::from_value(json!({"resultSizeEstimate": 0})).unwrap();
        assert!(resp.messages.is_empty());
        assert!(resp.next_page_token.is_none());
    }

    #[test]
    fn test_message_into_summary() {
        let data = json!({
            "id": "m1",
            "threadId": "t1",
            "labelIds": ["INBOX", "UNREAD", "CATEGORY_PROMOTIONS"],
            "snippet": "Big sale today",
            "sizeEstimate": 4096,
            "payload": {
                "headers": [
                    {"name": "From", "value": "Shop <deals@shop.example>"},
                    {"name": "to", "value": "me@example.com"},
                    {"name": "Subject", "value": "Sale"},
                    {"name": "Date", "value": "Mon, 15 Jan 2024 10:30:00 +0000"}
                ]
            }
        });
        let message: Message = serde_json::from_value(data).unwrap();
        let summary = message.into_summary();
        assert_eq!(summary.id, "m1");
        assert_eq!(summary.thread_id, "t1");
        assert_eq!(summary.labels.len(), 3);
        assert_eq!(summary.from, "Shop <deals@shop.example>");
        assert_eq!(summary.to, "me@example.com");
        assert_eq!(summary.subject, "Sale");
        assert_eq!(summary.date, "Mon, 15 Jan 2024 10:30:00 +0000");
        assert_eq!(summary.size, 4096);
        assert_eq!(summary.snippet, "Big sale today");
    }

    #[test]
    fn test_message_missing_fields_default_to_empty() {
        let message: Message = serde_json::from_value(json!({"id": "m9"})).unwrap();
        let summary = message.into_summary();
        assert_eq!(summary.from, "");
        assert_eq!(summary.subject, "");
        assert_eq!(summary.date, "");
        assert_eq!(summary.size, 0);
        assert!(summary.labels.is_empty());
    }

    #[test]
    fn test_deserialize_labels() {
        let data = json!({
            "labels": [
                {"id": "INBOX", "name": "INBOX", "type": "system"},
                {"id": "Label_1", "name": "Receipts", "type": "user"}
            ]
        });
        let resp: LabelListResponse = serde_json::from_value(data).unwrap();
        let labels: Vec<Label> = resp.labels.into_iter().map(Label::from).collect();
        assert_eq!(labels[1].id, "Label_1");
        assert_eq!(labels[1].name, "Receipts");
    }

    #[test]
    fn test_deserialize_api_error() {
        let data = json!({"error": {"code": 404, "message": "Requested entity was not found."}});
        let resp: ApiErrorResponse = serde_json::from_value(data).unwrap();
        assert!(resp.error.message.contains("not found"));
    }
}
