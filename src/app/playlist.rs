use serde::{Deserialize, Serialize};

/// One playable item parsed from an M3U playlist. `source_url` is the
/// identity key for favorites, history and resume lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub(crate) title: String,
    pub(crate) group: String,
    pub(crate) logo_url: String,
    pub(crate) source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Playlist {
    pub(crate) name: String,
    pub(crate) entries: Vec<Entry>,
}

impl Playlist {
    pub(crate) fn new(name: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub(crate) fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

const DEFAULT_GROUP: &str = "Uncategorized";
const DEFAULT_TITLE: &str = "Untitled";

/// Parse raw M3U text into entries, in input order.
///
/// Lenient by design: a `#EXTINF:` line with no following URL is silently
/// replaced by the next one, a URL line with no preceding `#EXTINF:` is
/// ignored, and malformed input degrades to an empty result rather than an
/// error.
pub(crate) fn parse(text: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut pending: Option<Entry> = None;

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(meta) = line.strip_prefix("#EXTINF:") {
            pending = Some(Entry {
                title: extinf_title(meta),
                group: quoted_attr(meta, "group-title")
                    .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
                logo_url: quoted_attr(meta, "tvg-logo").unwrap_or_default(),
                source_url: String::new(),
            });
        } else if !line.starts_with('#')
            && let Some(mut entry) = pending.take()
        {
            entry.source_url = line.to_string();
            entries.push(entry);
        }
    }

    entries
}

fn quoted_attr(meta: &str, key: &str) -> Option<String> {
    let marker = format!("{key}=\"");
    let start = meta.find(&marker)? + marker.len();
    let rest = &meta[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn extinf_title(meta: &str) -> String {
    let title = match meta.find(',') {
        Some(pos) => meta[pos + 1..].trim(),
        None => "",
    };
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

pub(crate) fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hrs = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hrs > 0 {
        format!("{hrs}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_url_pairs_in_order() {
        let raw = concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg-logo=\"http://x/a.png\" group-title=\"News\",Channel A\n",
            "http://x/a.m3u8\n",
            "#EXTINF:-1 group-title=\"Sports\",Channel B\n",
            "http://x/b.mp4\n",
        );
        let entries = parse(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Channel A");
        assert_eq!(entries[0].group, "News");
        assert_eq!(entries[0].logo_url, "http://x/a.png");
        assert_eq!(entries[0].source_url, "http://x/a.m3u8");
        assert_eq!(entries[1].title, "Channel B");
        assert_eq!(entries[1].logo_url, "");
        assert_eq!(entries[1].source_url, "http://x/b.mp4");
    }

    #[test]
    fn bare_metadata_line_gets_defaults() {
        let entries = parse("#EXTINF:\nhttp://x/only.ts\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Untitled");
        assert_eq!(entries[0].group, "Uncategorized");
        assert_eq!(entries[0].logo_url, "");
    }

    #[test]
    fn url_without_metadata_is_ignored() {
        let entries = parse("http://x/orphan.ts\n#EXTINF:-1,Real\nhttp://x/real.ts\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_url, "http://x/real.ts");
    }

    #[test]
    fn unclosed_metadata_is_replaced_by_the_next_one() {
        let raw = "#EXTINF:-1,Dropped\n#EXTINF:-1,Kept\nhttp://x/kept.ts\n";
        let entries = parse(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Kept");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let raw = "\n# a comment\n#EXTINF:-1,One\n\nhttp://x/1.ts\n# trailing\n";
        let entries = parse(raw);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn parse_is_restartable() {
        assert_eq!(parse("garbage with no markers").len(), 0);
        assert_eq!(parse("#EXTINF:-1,A\nhttp://x/a\n").len(), 1);
    }

    #[test]
    fn title_keeps_embedded_commas() {
        let entries = parse("#EXTINF:-1 group-title=\"Film\",Fast, Very Fast\nhttp://x/f\n");
        assert_eq!(entries[0].title, "Fast, Very Fast");
    }

    #[test]
    fn format_duration_switches_to_hours() {
        assert_eq!(format_duration(65.2), "1:05");
        assert_eq!(format_duration(3725.0), "1:02:05");
        assert_eq!(format_duration(-3.0), "0:00");
    }
}
