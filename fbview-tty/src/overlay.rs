//! Modal text windows drawn over the console: the document outline and a
//! full-text page search. Both hand back the page the user picked.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use tracing::{debug, warn};

use fbview_core::{DocumentBackend, Key, OutlineItem};

use crate::keyboard::KeySource;
use crate::keys::{TermEvent, BACKSPACE, ENTER, ESCAPE, TAB};

const EVENT_POLL: Duration = Duration::from_millis(100);
const MAX_INDENT: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ListEntry {
    label: String,
    page_index: usize,
}

/// A scrolling, bordered selection list.
struct ListWindow {
    title: String,
    empty_message: &'static str,
    entries: Vec<ListEntry>,
    selected: usize,
    scroll_offset: usize,
}

enum ListInput {
    Pending,
    Selected(usize),
    Cancelled,
}

impl ListWindow {
    fn new(title: String, empty_message: &'static str, entries: Vec<ListEntry>) -> Self {
        Self {
            title,
            empty_message,
            entries,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.entries.is_empty() {
            return;
        }
        let last = self.entries.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.entries.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.entries.len().saturating_sub(viewport_height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + viewport_height {
            self.scroll_offset = self.selected + 1 - viewport_height;
        }
    }

    fn handle_key(&mut self, key: Key, page_rows: usize) -> ListInput {
        let page = page_rows.max(1) as isize;
        match key {
            Key::Char('j') | Key::Down => self.move_selection(1),
            Key::Char('k') | Key::Up => self.move_selection(-1),
            Key::PageDown | Key::Ctrl('f') => self.move_selection(page),
            Key::PageUp | Key::Ctrl('b') => self.move_selection(-page),
            Key::Char('g') | Key::Home => self.selected = 0,
            Key::Char('G') | Key::End => self.move_selection(isize::MAX / 2),
            ENTER => {
                return match self.entries.get(self.selected) {
                    Some(entry) => ListInput::Selected(entry.page_index),
                    None => ListInput::Cancelled,
                }
            }
            ESCAPE | TAB | Key::Char('q') => return ListInput::Cancelled,
            _ => {}
        }
        ListInput::Pending
    }

    /// Rows available for entries in a terminal of `rows` lines.
    fn content_rows(rows: u16) -> usize {
        usize::from(rows).saturating_sub(6).max(1)
    }

    fn draw(&mut self, out: &mut impl Write, (cols, rows): (u16, u16)) -> Result<()> {
        if cols < 20 || rows < 8 {
            return Ok(());
        }
        let max_inner_width = usize::from(cols) - 6;
        let widest = if self.entries.is_empty() {
            self.empty_message.len() + 2
        } else {
            self.entries
                .iter()
                .map(|entry| entry.label.chars().count() + 2)
                .max()
                .unwrap_or(0)
        };
        let inner_width = widest
            .max(self.title.chars().count())
            .clamp(20.min(max_inner_width), max_inner_width);

        let total = self.entries.len().max(1);
        let content_height = total.min(Self::content_rows(rows));
        self.ensure_visible(content_height);

        let window_height = content_height + 4;
        let start_col = ((usize::from(cols) - (inner_width + 2)) / 2) as u16;
        let start_row = (usize::from(rows).saturating_sub(window_height) / 2) as u16;
        let border = format!("+{}+", "-".repeat(inner_width));

        let mut lines = Vec::with_capacity(window_height);
        lines.push(border.clone());
        let title: String = self.title.chars().take(inner_width).collect();
        lines.push(format!("|{title: ^inner_width$}|"));
        lines.push(format!("|{}|", "-".repeat(inner_width)));
        if self.entries.is_empty() {
            let message = truncate_with_ellipsis(format!("  {}", self.empty_message), inner_width);
            lines.push(format!("|{message}|"));
        } else {
            let visible = self
                .entries
                .iter()
                .enumerate()
                .skip(self.scroll_offset)
                .take(content_height);
            for (idx, entry) in visible {
                let marker = if idx == self.selected { '>' } else { ' ' };
                let text = truncate_with_ellipsis(format!("{marker} {}", entry.label), inner_width);
                lines.push(format!("|{text}|"));
            }
        }
        lines.push(border);

        crossterm::queue!(out, Clear(ClearType::All))?;
        for (offset, line) in lines.iter().enumerate() {
            print_inverted(out, start_col, start_row.saturating_add(offset as u16), line)?;
        }
        out.flush()?;
        Ok(())
    }

    fn run(
        &mut self,
        keys: &mut dyn KeySource,
        out: &mut impl Write,
        mut size: (u16, u16),
    ) -> Result<Option<usize>> {
        self.draw(out, size)?;
        loop {
            let Some(event) = keys.next_event(EVENT_POLL)? else {
                continue;
            };
            let key = match event {
                TermEvent::Key(key) => key,
                TermEvent::Resize(cols, rows) => {
                    size = (cols, rows);
                    self.draw(out, size)?;
                    continue;
                }
            };
            match self.handle_key(key, Self::content_rows(size.1)) {
                ListInput::Pending => self.draw(out, size)?,
                ListInput::Selected(page) => return Ok(Some(page)),
                ListInput::Cancelled => return Ok(None),
            }
        }
    }
}

fn print_inverted(out: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::queue!(
        out,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

/// Cuts `text` to `width` characters with a trailing `...` and pads it with
/// spaces to exactly `width`.
pub fn truncate_with_ellipsis(text: String, width: usize) -> String {
    let len = text.chars().count();
    let mut text = if len > width {
        if width <= 3 {
            text.chars().take(width).collect()
        } else {
            let mut cut: String = text.chars().take(width - 3).collect();
            cut.push_str("...");
            cut
        }
    } else {
        text
    };
    let len = text.chars().count();
    if len < width {
        text.push_str(&" ".repeat(width - len));
    }
    text
}

/// The document outline, opened on the entry for the current page.
pub struct OutlineView {
    window: ListWindow,
}

impl OutlineView {
    pub fn new(outline: &[OutlineItem], current_page: usize) -> Self {
        let entries: Vec<ListEntry> = outline
            .iter()
            .map(|item| ListEntry {
                label: format!(
                    "{}{} (p{})",
                    "  ".repeat(item.depth.min(MAX_INDENT)),
                    item.title,
                    item.page_index + 1
                ),
                page_index: item.page_index,
            })
            .collect();
        let selected = outline
            .iter()
            .rposition(|item| item.page_index <= current_page)
            .unwrap_or(0);
        let mut window = ListWindow::new(
            "Table of Contents".to_owned(),
            "No table of contents available",
            entries,
        );
        window.selected = selected;
        Self { window }
    }

    /// Shows the outline until the user picks an entry (its 0-based page) or
    /// backs out.
    pub fn run(
        &mut self,
        keys: &mut dyn KeySource,
        out: &mut impl Write,
        size: (u16, u16),
    ) -> Result<Option<usize>> {
        self.window.run(keys, out, size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub page_index: usize,
    pub snippet: String,
}

/// Case-insensitive search over the text of every page. Each matching line
/// is one hit. Pages whose text cannot be extracted are skipped.
pub fn search_pages(backend: &dyn DocumentBackend, query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut hits = Vec::new();
    for page_index in 0..backend.info().page_count {
        let text = match backend.page_text(page_index) {
            Ok(text) => text,
            Err(err) => {
                warn!(page_index, %err, "skipping page without text");
                continue;
            }
        };
        for line in text.lines() {
            if line.to_lowercase().contains(&needle) {
                hits.push(SearchHit {
                    page_index,
                    snippet: line.split_whitespace().collect::<Vec<_>>().join(" "),
                });
            }
        }
    }
    debug!(query, hits = hits.len(), "search finished");
    hits
}

/// Prompts for a query, then lists the matching pages.
#[derive(Default)]
pub struct SearchView {
    query: String,
}

impl SearchView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    fn draw_prompt(&self, out: &mut impl Write, (_, rows): (u16, u16)) -> Result<()> {
        print_inverted(out, 0, rows.saturating_sub(1), &format!("/{}", self.query))?;
        crossterm::queue!(out, cursor::Show)?;
        out.flush()?;
        Ok(())
    }

    /// Returns `false` when the prompt was abandoned.
    fn read_query(
        &mut self,
        keys: &mut dyn KeySource,
        out: &mut impl Write,
        size: &mut (u16, u16),
    ) -> Result<bool> {
        self.draw_prompt(out, *size)?;
        let submitted = loop {
            let Some(event) = keys.next_event(EVENT_POLL)? else {
                continue;
            };
            match event {
                TermEvent::Resize(cols, rows) => *size = (cols, rows),
                TermEvent::Key(ENTER) => break true,
                TermEvent::Key(ESCAPE) => break false,
                TermEvent::Key(BACKSPACE) => {
                    self.query.pop();
                }
                TermEvent::Key(Key::Char(c)) if !c.is_control() => self.query.push(c),
                _ => continue,
            }
            self.draw_prompt(out, *size)?;
        };
        crossterm::queue!(out, cursor::Hide)?;
        Ok(submitted && !self.query.trim().is_empty())
    }

    pub fn run(
        &mut self,
        backend: &dyn DocumentBackend,
        keys: &mut dyn KeySource,
        out: &mut impl Write,
        mut size: (u16, u16),
    ) -> Result<Option<usize>> {
        if !self.read_query(keys, out, &mut size)? {
            return Ok(None);
        }
        let entries = search_pages(backend, &self.query)
            .into_iter()
            .map(|hit| ListEntry {
                label: format!("p{}: {}", hit.page_index + 1, hit.snippet),
                page_index: hit.page_index,
            })
            .collect();
        let mut window = ListWindow::new(format!("Search: {}", self.query), "No matches", entries);
        window.run(keys, out, size)
    }
}
