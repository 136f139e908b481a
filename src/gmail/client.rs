use serde::de::DeserializeOwned;
use std::process::Command;
use std::time::Duration;

use super::types::*;
use crate::config::GmailConfig;
use crate::mailbox::{EmailSummary, Label, MailboxClient, MailboxError};

/// Headers requested with `format=metadata`; everything the filters look at.
const METADATA_HEADERS: &[&str] = &["From", "To", "Subject", "Date"];

/// Upper bound Gmail accepts for `maxResults` on users.messages.list.
const MAX_PAGE_SIZE: usize = 500;

pub struct GmailClient {
    agent: ureq::Agent,
    user_url: String,
    token: String,
    include_spam_trash: bool,
}

/// Run the configured shell command and return its stdout as the access token.
pub fn run_token_command(cmd: &str) -> Result<String, MailboxError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .map_err(|e| MailboxError::Config(format!("failed to execute token command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MailboxError::Config(format!(
            "token command exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let token = String::from_utf8(output.stdout).map_err(|e| {
        MailboxError::Config(format!("token command output is not valid UTF-8: {}", e))
    })?;
    let token = token.trim().to_string();

    if token.is_empty() {
        return Err(MailboxError::Config(
            "token command printed an empty token".to_string(),
        ));
    }

    Ok(token)
}

impl GmailClient {
    pub fn connect(config: &GmailConfig) -> Result<Self, MailboxError> {
        log_info!("[Gmail] Obtaining access token for user '{}'", config.user_id);
        let token = run_token_command(&config.token_command)?;
        Ok(Self::with_token(config, token))
    }

    pub fn with_token(config: &GmailConfig, token: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();

        GmailClient {
            agent,
            user_url: format!("{}/users/{}", config.api_url, config.user_id),
            token,
            include_spam_trash: config.include_spam_trash,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.user_url, path)
    }

    fn execute(&self, request: ureq::Request) -> Result<ureq::Response, MailboxError> {
        let method = request.method().to_string();
        let url = request.url().to_string();
        log_debug!("[Gmail] {} {}", method, url);

        let request = request.set("Authorization", &format!("Bearer {}", self.token));
        // POST without a body still needs Content-Length: 0.
        let result = if method == "POST" {
            request.send_bytes(&[])
        } else {
            request.call()
        };

        match result {
            Ok(resp) => {
                log_debug!("[Gmail] Got {} response", resp.status());
                Ok(resp)
            }
            Err(ureq::Error::Status(401, _)) => Err(MailboxError::Http(
                "Authentication failed (401 Unauthorized)".to_string(),
            )),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorResponse>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or_else(|_| {
                        if body.is_empty() {
                            "(empty response)".to_string()
                        } else {
                            truncate_str(&body, 200).to_string()
                        }
                    });
                log_error!("[Gmail] HTTP error {} for {} {}: {}", code, method, url, message);
                Err(MailboxError::Api(format!("HTTP {} error: {}", code, message)))
            }
            Err(e) => {
                log_error!("[Gmail] Connection error: {}", e);
                Err(MailboxError::Http(e.to_string()))
            }
        }
    }

    fn fetch_json<T: DeserializeOwned>(&self, request: ureq::Request) -> Result<T, MailboxError> {
        let response = self.execute(request)?;
        let body = response
            .into_string()
            .map_err(|e| MailboxError::Parse(format!("Failed to read response: {}", e)))?;

        log_debug!(
            "[Gmail] Response body ({} bytes): {}",
            body.len(),
            truncate_str(&body, 1000)
        );

        serde_json::from_str(&body)
            .map_err(|e| MailboxError::Parse(format!("Failed to parse response: {}", e)))
    }

    fn list_message_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>, MailboxError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < max_results {
            let page_size = MAX_PAGE_SIZE.min(max_results - ids.len());
            let mut request = self
                .agent
                .get(&self.url("messages"))
                .query("maxResults", &page_size.to_string())
                .query("includeSpamTrash", &self.include_spam_trash.to_string());
            if !query.is_empty() {
                request = request.query("q", query);
            }
            if let Some(ref token) = page_token {
                request = request.query("pageToken", token);
            }

            let page: MessageListResponse = self.fetch_json(request)?;
            log_info!(
                "[Gmail] messages.list returned {} id(s) (estimate: {})",
                page.messages.len(),
                page.result_size_estimate
            );

            if page.messages.is_empty() {
                break;
            }

            let remaining = max_results - ids.len();
            ids.extend(page.messages.into_iter().take(remaining).map(|m| m.id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    fn get_metadata(&self, id: &str) -> Result<Message, MailboxError> {
        let mut request = self
            .agent
            .get(&self.url(&format!("messages/{}", id)))
            .query("format", "metadata");
        for header in METADATA_HEADERS {
            request = request.query("metadataHeaders", header);
        }
        self.fetch_json(request)
    }

    /// Apply `op` to every id, skipping failures. Returns the success count.
    fn for_each_message<F>(&self, ids: &[String], action: &str, op: F) -> usize
    where
        F: Fn(&str) -> Result<(), MailboxError>,
    {
        let mut succeeded = 0;
        for id in ids {
            match op(id) {
                Ok(()) => succeeded += 1,
                Err(e) => log_warn!("[Gmail] Failed to {} message {}: {}", action, id, e),
            }
        }
        log_info!(
            "[Gmail] {} {}/{} message(s)",
            action,
            succeeded,
            ids.len()
        );
        succeeded
    }
}

impl MailboxClient for GmailClient {
    fn list_candidates(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailSummary>, MailboxError> {
        log_info!(
            "[Gmail] Searching messages (query: '{}', max: {})",
            query,
            max_results
        );

        let ids = self.list_message_ids(query, max_results)?;
        let mut summaries = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.get_metadata(id) {
                Ok(message) => summaries.push(message.into_summary()),
                Err(e) => log_warn!("[Gmail] Skipping message {}: {}", id, e),
            }
        }

        log_info!(
            "[Gmail] Fetched metadata for {}/{} message(s)",
            summaries.len(),
            ids.len()
        );
        Ok(summaries)
    }

    fn trash(&self, ids: &[String]) -> Result<usize, MailboxError> {
        Ok(self.for_each_message(ids, "trash", |id| {
            let request = self.agent.post(&self.url(&format!("messages/{}/trash", id)));
            self.execute(request).map(|_| ())
        }))
    }

    fn permanently_delete(&self, ids: &[String]) -> Result<usize, MailboxError> {
        Ok(self.for_each_message(ids, "delete", |id| {
            let request = self.agent.delete(&self.url(&format!("messages/{}", id)));
            self.execute(request).map(|_| ())
        }))
    }

    fn list_labels(&self) -> Result<Vec<Label>, MailboxError> {
        log_info!("[Gmail] Fetching labels");
        let response: LabelListResponse = self.fetch_json(self.agent.get(&self.url("labels")))?;
        log_info!("[Gmail] labels.list returned {} label(s)", response.labels.len());
        Ok(response.labels.into_iter().map(Label::from).collect())
    }
}

fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        // Find a valid UTF-8 boundary
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GmailConfig {
        GmailConfig {
            api_url: "http://127.0.0.1:1/gmail/v1".to_string(),
            user_id: "me".to_string(),
            token_command: "echo token".to_string(),
            include_spam_trash: false,
        }
    }

    #[test]
    fn test_run_token_command_trims_output() {
        assert_eq!(run_token_command("printf 'abc123\\n'").unwrap(), "abc123");
    }

    #[test]
    fn test_run_token_command_failure_is_config_error() {
        assert!(matches!(
            run_token_command("exit 3"),
            Err(MailboxError::Config(_))
        ));
    }

    #[test]
    fn test_run_token_command_empty_output_is_config_error() {
        assert!(matches!(
            run_token_command("true"),
            Err(MailboxError::Config(msg)) if msg.contains("empty")
        ));
    }

    #[test]
    fn test_urls_are_scoped_to_user() {
        let client = GmailClient::with_token(&config(), "t".to_string());
        assert_eq!(
            client.url("messages/abc/trash"),
            "http://127.0.0.1:1/gmail/v1/users/me/messages/abc/trash"
        );
    }

    #[test]
    fn test_truncate_str_respects_char_boundary() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("héllo", 2), "h");
    }
}
