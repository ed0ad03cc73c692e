//! RSS feeds and the sitemap.

use std::fmt::Display;
use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::entities::{article, product};
use crate::error::AppError;

pub const FEED_SIZE: u64 = 5;
const PRODUCT_SUMMARY_CHARS: usize = 10;
const ARTICLE_SUMMARY_CHARS: usize = 200;

pub struct Channel<'a> {
    pub title: &'a str,
    pub link: String,
    pub description: &'a str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

/// First `limit` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub fn product_item(base: &str, found: &product::Model) -> FeedItem {
    FeedItem {
        title: found.name.clone(),
        link: format!("{base}/shop/products/{}/", found.id),
        description: truncate_chars(&found.description, PRODUCT_SUMMARY_CHARS),
        pub_date: Some(found.created_at),
    }
}

pub fn article_item(base: &str, found: &article::Model) -> FeedItem {
    FeedItem {
        title: found.title.clone(),
        link: format!("{base}/articles/{}/", found.id),
        description: truncate_chars(&found.content, ARTICLE_SUMMARY_CHARS),
        pub_date: found.pub_date,
    }
}

pub fn product_entry(base: &str, found: &product::Model) -> SitemapEntry {
    SitemapEntry {
        loc: format!("{base}/shop/products/{}/", found.id),
        lastmod: Some(found.created_at),
        changefreq: "always",
        priority: "0.9",
    }
}

pub fn article_entry(base: &str, found: &article::Model) -> SitemapEntry {
    SitemapEntry {
        loc: format!("{base}/articles/{}/", found.id),
        lastmod: found.pub_date,
        changefreq: "never",
        priority: "0.5",
    }
}

fn xml_error(err: impl Display) -> AppError {
    AppError::Internal(format!("xml: {err}"))
}

struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn new() -> Result<Self, AppError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        Ok(XmlOut { writer })
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), AppError> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer
            .write_event(Event::Start(start))
            .map_err(xml_error)
    }

    fn close(&mut self, name: &str) -> Result<(), AppError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), AppError> {
        self.open(name, &[])?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
        self.close(name)
    }

    fn finish(self) -> Result<String, AppError> {
        String::from_utf8(self.writer.into_inner().into_inner()).map_err(xml_error)
    }
}

pub fn render_rss(channel: &Channel<'_>, items: &[FeedItem]) -> Result<String, AppError> {
    let mut out = XmlOut::new()?;
    out.open("rss", &[("version", "2.0")])?;
    out.open("channel", &[])?;
    out.leaf("title", channel.title)?;
    out.leaf("link", &channel.link)?;
    out.leaf("description", channel.description)?;
    for item in items {
        out.open("item", &[])?;
        out.leaf("title", &item.title)?;
        out.leaf("link", &item.link)?;
        out.leaf("description", &item.description)?;
        out.leaf("guid", &item.link)?;
        if let Some(date) = item.pub_date {
            out.leaf("pubDate", &date.to_rfc2822())?;
        }
        out.close("item")?;
    }
    out.close("channel")?;
    out.close("rss")?;
    out.finish()
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> Result<String, AppError> {
    let mut out = XmlOut::new()?;
    out.open(
        "urlset",
        &[("xmlns", "http://www.sitemaps.org/schemas/sitemap/0.9")],
    )?;
    for entry in entries {
        out.open("url", &[])?;
        out.leaf("loc", &entry.loc)?;
        if let Some(date) = entry.lastmod {
            out.leaf("lastmod", &date.format("%Y-%m-%d").to_string())?;
        }
        out.leaf("changefreq", entry.changefreq)?;
        out.leaf("priority", entry.priority)?;
        out.close("url")?;
    }
    out.close("urlset")?;
    out.finish()
}
