use crate::filters::Filter;
use crate::format::format_size;
use crate::mailbox::{EmailSummary, Label, MailboxClient, MailboxError};
use serde::Serialize;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

/// Number of matches shown in a dry-run preview.
pub const PREVIEW_LIMIT: usize = 10;

/// Search ceiling used when gathering statistics.
pub const STATISTICS_CEILING: usize = 1000;

const TOP_ENTRIES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct CleanerSettings {
    pub batch_size: usize,
    /// Requests per second; batches are spaced `1 / rate_limit` seconds apart.
    pub rate_limit: u32,
}

impl Default for CleanerSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            rate_limit: 10,
        }
    }
}

impl CleanerSettings {
    fn batch_pause(&self) -> Option<Duration> {
        if self.rate_limit == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / f64::from(self.rate_limit)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    pub found: usize,
    pub processed: usize,
    pub total_size: u64,
    pub dry_run: bool,
    pub permanent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    #[serde(flatten)]
    pub result: CleanupResult,
    /// First matches, filled only for dry runs.
    pub preview: Vec<EmailSummary>,
    /// Matches beyond the preview.
    pub not_previewed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_emails: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub label_distribution: Vec<Tally>,
    pub top_sender_domains: Vec<Tally>,
}

/// Two-phase selection (server search, then exact local re-check) and
/// batched trash/delete on top of a [`MailboxClient`].
pub struct Cleaner<C: MailboxClient> {
    client: C,
    settings: CleanerSettings,
}

impl<C: MailboxClient> Cleaner<C> {
    pub fn new(client: C, settings: CleanerSettings) -> Self {
        let settings = CleanerSettings {
            batch_size: settings.batch_size.max(1),
            ..settings
        };
        Cleaner { client, settings }
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn find_emails(
        &self,
        filter: Option<&Filter>,
        max_results: usize,
    ) -> Result<Vec<EmailSummary>, MailboxError> {
        let query = filter.map(Filter::query_fragment).unwrap_or_default();
        log_info!("[Cleaner] Searching for emails with query: '{}'", query);

        let candidates = self.client.list_candidates(&query, max_results)?;
        let Some(filter) = filter else {
            return Ok(candidates);
        };

        let total = candidates.len();
        let matched: Vec<EmailSummary> = candidates
            .into_iter()
            .filter(|email| filter.matches(email))
            .collect();

        log_info!(
            "[Cleaner] {} of {} candidate(s) passed local filtering",
            matched.len(),
            total
        );
        Ok(matched)
    }

    pub fn clean_emails(
        &self,
        filter: Option<&Filter>,
        max_emails: usize,
        dry_run: bool,
        permanent: bool,
    ) -> Result<CleanupReport, MailboxError> {
        let emails = self.find_emails(filter, max_emails)?;

        let mut result = CleanupResult {
            found: emails.len(),
            processed: 0,
            total_size: emails.iter().map(|e| e.size).sum(),
            dry_run,
            permanent,
        };

        if emails.is_empty() {
            log_info!("[Cleaner] No emails found matching the criteria");
            return Ok(CleanupReport {
                result,
                preview: Vec::new(),
                not_previewed: 0,
            });
        }

        log_info!(
            "[Cleaner] Found {} email(s), {}",
            result.found,
            format_size(result.total_size)
        );

        if dry_run {
            let preview: Vec<EmailSummary> = emails.iter().take(PREVIEW_LIMIT).cloned().collect();
            let not_previewed = emails.len() - preview.len();
            return Ok(CleanupReport {
                result,
                preview,
                not_previewed,
            });
        }

        let ids: Vec<String> = emails.into_iter().map(|e| e.id).collect();
        result.processed = self.process_batches(&ids, permanent);

        log_info!(
            "[Cleaner] {} {}/{} email(s)",
            if permanent { "Permanently deleted" } else { "Trashed" },
            result.processed,
            result.found
        );

        Ok(CleanupReport {
            result,
            preview: Vec::new(),
            not_previewed: 0,
        })
    }

    fn process_batches(&self, ids: &[String], permanent: bool) -> usize {
        let batches: Vec<&[String]> = ids.chunks(self.settings.batch_size).collect();
        let pause = self.settings.batch_pause();
        let mut processed = 0;

        for (index, batch) in batches.iter().enumerate() {
            if index > 0 {
                if let Some(pause) = pause {
                    thread::sleep(pause);
                }
            }

            let outcome = if permanent {
                self.client.permanently_delete(batch)
            } else {
                self.client.trash(batch)
            };

            match outcome {
                Ok(count) => {
                    log_debug!(
                        "[Cleaner] Batch {}/{}: {}/{} processed",
                        index + 1,
                        batches.len(),
                        count,
                        batch.len()
                    );
                    processed += count;
                }
                Err(e) => {
                    log_warn!(
                        "[Cleaner] Batch {}/{} of {} message(s) failed: {}",
                        index + 1,
                        batches.len(),
                        batch.len(),
                        e
                    );
                }
            }
        }

        processed
    }

    pub fn preview_labels(&self) -> Result<Vec<Label>, MailboxError> {
        self.client.list_labels()
    }

    pub fn get_statistics(&self, filter: Option<&Filter>) -> Result<Statistics, MailboxError> {
        let emails = self.find_emails(filter, STATISTICS_CEILING)?;
        let total_size: u64 = emails.iter().map(|e| e.size).sum();

        let label_distribution = top_counts(emails.iter().flat_map(|e| e.labels.iter().cloned()));
        let top_sender_domains = top_counts(emails.iter().filter_map(|e| sender_domain(&e.from)));

        Ok(Statistics {
            total_emails: emails.len(),
            total_size,
            total_size_formatted: format_size(total_size),
            label_distribution,
            top_sender_domains,
        })
    }
}

/// Domain part of a `From` value: text after the last `@`, cut at `>`.
/// Case is kept as written.
fn sender_domain(from: &str) -> Option<String> {
    let (_, after) = from.rsplit_once('@')?;
    let domain = after.split('>').next().unwrap_or_default().trim();
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

/// Frequency table sorted by descending count. Ties keep first-seen order.
fn top_counts<I: IntoIterator<Item = String>>(items: I) -> Vec<Tally> {
    let mut tallies: Vec<Tally> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for item in items {
        match positions.get(&item) {
            Some(&pos) => tallies[pos].count += 1,
            None => {
                positions.insert(item.clone(), tallies.len());
                tallies.push(Tally {
                    name: item,
                    count: 1,
                });
            }
        }
    }

    tallies.sort_by(|a, b| b.count.cmp(&a.count));
    tallies.truncate(TOP_ENTRIES);
    tallies
}
