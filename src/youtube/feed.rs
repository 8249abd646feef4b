use anyhow::{Result, bail};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::warn;

use crate::util::time;

/// Raw entries considered per poll. Feeds list newest first, so five
/// covers any realistic burst of uploads between polls.
const MAX_ENTRIES: usize = 5;

/// One video as the channel feed reports it. Timestamps are already in
/// canonical UTC form.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub video_id: String,
    pub title: String,
    pub published: String,
    pub updated: String,
}

/// Per-channel activity source. The production implementation polls
/// the public Atom feed; tests substitute canned entries.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self, channel_id: &str) -> Result<Vec<FeedEntry>>;
}

pub struct FeedClient {
    http: reqwest::Client,
}

impl FeedClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch_feed(&self, channel_id: &str) -> Result<Vec<FeedEntry>> {
        let url = format!(
            "https://www.youtube.com/feeds/videos.xml?channel_id={}",
            channel_id
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            bail!(
                "feed request for {} failed with status {}",
                channel_id,
                response.status()
            );
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            bail!("feed for {} returned an empty body", channel_id);
        }
        parse_feed(&body)
    }
}

#[derive(Default)]
struct DraftEntry {
    video_id: String,
    title: String,
    published: String,
    updated: String,
}

/// Pull the first few entries out of a YouTube Atom document. Entries
/// with malformed timestamps are dropped with a warning but still
/// count toward the cap.
fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut seen = 0usize;
    let mut draft: Option<DraftEntry> = None;
    let mut current_tag: Vec<u8> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"entry" {
                    draft = Some(DraftEntry::default());
                } else if draft.is_some() {
                    current_tag = name;
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(d) = draft.as_mut() {
                    let text = e.unescape()?.into_owned();
                    assign_field(d, &current_tag, text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(d) = draft.as_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    assign_field(d, &current_tag, text);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"entry" {
                    if let Some(d) = draft.take() {
                        match (
                            time::canonicalize(&d.published),
                            time::canonicalize(&d.updated),
                        ) {
                            (Some(published), Some(updated)) if !d.video_id.is_empty() => {
                                entries.push(FeedEntry {
                                    video_id: d.video_id,
                                    title: d.title,
                                    published,
                                    updated,
                                });
                            }
                            _ => {
                                warn!("Skipping malformed feed entry (id: \"{}\")", d.video_id);
                            }
                        }
                    }
                    seen += 1;
                    if seen >= MAX_ENTRIES {
                        break;
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!(
                "feed XML parse error at position {}: {}",
                reader.buffer_position(),
                e
            ),
            _ => {}
        }
    }

    Ok(entries)
}

fn assign_field(draft: &mut DraftEntry, tag: &[u8], text: String) {
    match tag {
        b"yt:videoId" => draft.video_id = text,
        b"title" => draft.title = text,
        b"published" => draft.published = text,
        b"updated" => draft.updated = text,
        _ => {}
    }
}
