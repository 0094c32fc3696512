use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::models::{Locale, WatchEntry};
use crate::storage::QueryResult;

const TITLE_HEADER: &str = "Title";
const PRICE_HEADER: &str = "Price";
const DISCOUNT_HEADER: &str = "Discount";
const PLATFORM_HEADER: &str = "Platform";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    #[default]
    Plain,
    Table,
}

impl Layout {
    pub fn from_table_flag(table: bool) -> Self {
        if table {
            Layout::Table
        } else {
            Layout::Plain
        }
    }
}

struct Widths {
    title: usize,
    price: usize,
    discount: usize,
    platform: usize,
}

impl Widths {
    fn of(result: &QueryResult) -> Self {
        let longest = |values: &mut dyn Iterator<Item = usize>, header: &str| {
            values.max().unwrap_or(0).max(header.chars().count())
        };
        Self {
            title: result.max_title_len.max(TITLE_HEADER.len()),
            price: result.max_price_len.max(PRICE_HEADER.len()),
            discount: longest(
                &mut result.items.iter().map(|i| i.discount_display.chars().count()),
                DISCOUNT_HEADER,
            ),
            platform: longest(
                &mut result.items.iter().map(|i| i.platform.chars().count()),
                PLATFORM_HEADER,
            ),
        }
    }

    fn rule(&self) -> String {
        [self.title, self.price, self.discount, self.platform]
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    }
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}

fn row(cells: [&str; 4], widths: &Widths, layout: Layout) -> String {
    let padded = [
        pad(cells[0], widths.title),
        pad(cells[1], widths.price),
        pad(cells[2], widths.discount),
        pad(cells[3], widths.platform),
    ];
    match layout {
        Layout::Plain => padded.join("  ").trim_end().to_string(),
        Layout::Table => format!(" {} ", padded.join(" | ")),
    }
}

/// Header line with the filter description, then one aligned row per item.
pub fn render<W: Write>(out: &mut W, heading: &str, result: &QueryResult, layout: Layout) -> Result<()> {
    writeln!(out, "{} ({})", heading, Local::now().format("%Y-%m-%d"))?;
    if result.is_empty() {
        writeln!(out, "No titles found.")?;
        return Ok(());
    }
    writeln!(out, "{}", result.description)?;
    writeln!(out)?;

    let widths = Widths::of(result);
    writeln!(
        out,
        "{}",
        row([TITLE_HEADER, PRICE_HEADER, DISCOUNT_HEADER, PLATFORM_HEADER], &widths, layout)
    )?;
    if layout == Layout::Table {
        writeln!(out, "{}", widths.rule())?;
    }
    for item in &result.items {
        let cells = [
            item.title.as_str(),
            item.price_display.as_str(),
            item.discount_display.as_str(),
            item.platform.as_str(),
        ];
        writeln!(out, "{}", row(cells, &widths, layout))?;
    }
    Ok(())
}

/// `<deal>.<lang>.<country>.txt`, with path separators in the deal name replaced.
pub fn text_file_name(deal: &str, locale: &Locale) -> String {
    let deal: String = deal
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    format!("{}.{}.{}.txt", deal, locale.language, locale.country)
}

pub fn save_text(dir: &Path, deal: &str, locale: &Locale, result: &QueryResult, layout: Layout) -> Result<PathBuf> {
    let path = dir.join(text_file_name(deal, locale));
    let mut writer = BufWriter::new(File::create(&path)?);
    render(&mut writer, deal, result, layout)?;
    writer.flush()?;
    info!("Saved {} titles to {}", result.items.len(), path.display());
    Ok(path)
}

/// Watchlist rows, numbered from 1 and aligned on the longest title.
pub fn render_watchlist<W: Write>(out: &mut W, entries: &[WatchEntry]) -> Result<()> {
    if entries.is_empty() {
        writeln!(out, "The watchlist is empty.")?;
        return Ok(());
    }
    let width = entries.iter().map(|e| e.title.chars().count()).max().unwrap_or(0);
    let digits = entries.len().to_string().len();
    for (n, entry) in entries.iter().enumerate() {
        writeln!(
            out,
            "{:>digits$}. {}  {}  {}",
            n + 1,
            pad(&entry.title, width),
            entry.locale,
            entry.title_id,
            digits = digits
        )?;
    }
    Ok(())
}
