/// Droplet utilization table
///
/// Six fixed-width columns (Name, Size, CPU, Memory, Load 5m, File Storage).
/// CPU, Memory and File Storage cells hold the value on one line and a
/// progress bar on the next. The whole table is rebuilt on every draw.

use chrono::{DateTime, Local};
use colored::Colorize;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Row, Table, Widget},
};
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

use crate::core::metrics::MetricSnapshot;
use crate::utils::{parse_percentage, progress_bar, BAR_WIDTH, COLUMNS, NOT_AVAILABLE};

const ROW_HEIGHT: u16 = 2;
const COLUMN_SPACING: u16 = 1;

/// Value on the first line, bar on the second when the value carries a percentage
fn metric_cell(value: Option<&str>, absent: &str) -> Cell<'static> {
    match value {
        Some(text) => {
            let mut lines = vec![Line::from(text.to_string())];
            if let Some(pct) = parse_percentage(text) {
                lines.push(Line::from(Span::styled(
                    progress_bar(pct, BAR_WIDTH),
                    Style::default().fg(Color::Cyan),
                )));
            }
            Cell::from(Text::from(lines))
        }
        None => Cell::from(absent.to_string()),
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn snapshot_row(snapshot: &MetricSnapshot) -> Row<'static> {
    Row::new(vec![
        Cell::from(Span::styled(snapshot.name.clone(), bold())),
        Cell::from(Span::styled(snapshot.size.clone(), bold())),
        metric_cell(snapshot.cpu.as_deref(), NOT_AVAILABLE),
        metric_cell(snapshot.memory.as_deref(), NOT_AVAILABLE),
        Cell::from(Span::styled(
            snapshot.load_5.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            Style::default().fg(Color::Yellow),
        )),
        metric_cell(snapshot.filesystem.as_deref(), ""),
    ])
    .height(ROW_HEIGHT)
}

fn table_area(rows: usize) -> Rect {
    let columns: u16 = COLUMNS.iter().map(|(_, width)| *width as u16).sum();
    let width = columns + COLUMN_SPACING * (COLUMNS.len() as u16 - 1) + 2;
    // borders, header, header margin
    let height = 4 + ROW_HEIGHT * rows as u16;
    Rect::new(0, 0, width, height)
}

/// Draw the table into an off-screen buffer sized to fit it exactly
fn render_buffer(snapshots: &[MetricSnapshot]) -> Buffer {
    let header = Row::new(COLUMNS.iter().map(|(name, _)| Cell::from(*name)))
        .style(bold())
        .bottom_margin(1);

    let rows: Vec<Row> = snapshots.iter().map(snapshot_row).collect();

    let table = Table::new(
        rows,
        COLUMNS.iter().map(|(_, width)| Constraint::Length(*width as u16)),
    )
    .header(header)
    .column_spacing(COLUMN_SPACING)
    .block(Block::default().borders(Borders::ALL));

    let area = table_area(snapshots.len());
    let mut buffer = Buffer::empty(area);
    table.render(area, &mut buffer);
    buffer
}

fn paint(text: &str, style: (Color, bool), color: bool) -> String {
    if !color {
        return text.to_string();
    }
    let (fg, is_bold) = style;
    let mut painted = match fg {
        Color::Cyan => text.cyan(),
        Color::Yellow => text.yellow(),
        _ => text.normal(),
    };
    if is_bold {
        painted = painted.bold();
    }
    painted.to_string()
}

/// Serialize a buffer line by line, merging runs of equal style
fn buffer_to_string(buffer: &Buffer, color: bool) -> String {
    let area = buffer.area;
    let mut out = String::new();

    for y in area.top()..area.bottom() {
        let mut run = String::new();
        let mut run_style = (Color::Reset, false);
        // Cells covered by a wide glyph to their left
        let mut skip = 0;

        for x in area.left()..area.right() {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            let cell = buffer.get(x, y);
            let symbol = cell.symbol();
            skip = symbol.width().saturating_sub(1);

            let style = (cell.fg, cell.modifier.contains(Modifier::BOLD));
            if style != run_style && !run.is_empty() {
                out.push_str(&paint(&run, run_style, color));
                run.clear();
            }
            run_style = style;
            run.push_str(symbol);
        }

        out.push_str(&paint(&run, run_style, color));
        out.push('\n');
    }

    out
}

/// Build the full table; zero snapshots yields the header alone
pub fn render_table(snapshots: &[MetricSnapshot], color: bool) -> String {
    buffer_to_string(&render_buffer(snapshots), color)
}

/// Footer under the table
pub fn status_line(at: DateTime<Local>, hosts: usize) -> String {
    format!(
        "Updated {} · {} droplet{}",
        at.format("%Y-%m-%d %H:%M:%S"),
        hosts,
        if hosts == 1 { "" } else { "s" }
    )
}

/// Writes the table to a terminal (or any writer), redrawing from scratch
pub struct TableRenderer<W: Write> {
    writer: W,
    clear_screen: bool,
    color: bool,
}

impl TableRenderer<io::Stdout> {
    pub fn stdout(clear_screen: bool, color: bool) -> Self {
        Self::new(io::stdout(), clear_screen, color)
    }
}

impl<W: Write> TableRenderer<W> {
    pub fn new(writer: W, clear_screen: bool, color: bool) -> Self {
        Self {
            writer,
            clear_screen,
            color,
        }
    }

    pub fn draw(&mut self, snapshots: &[MetricSnapshot], at: DateTime<Local>) -> io::Result<()> {
        if self.clear_screen {
            execute!(self.writer, Clear(ClearType::All), MoveTo(0, 0))?;
        }

        let table = render_table(snapshots, self.color);
        self.writer.write_all(table.as_bytes())?;
        writeln!(self.writer, "{}", status_line(at, snapshots.len()))?;
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
