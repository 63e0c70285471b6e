//! Department board screen.
//!
//! Layout units map onto terminal cells at 10 units per column and 20 units
//! per row, so a 200×200 card occupies 20 columns by 10 rows. The same
//! mapping converts mouse cells back into pointer positions.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use board_core::formatting::{format_oee, format_units, status_label, truncate};
use board_core::models::{DepartmentAggregate, MachineId, MachineStats, MachineStatus, Position};
use board_core::notifications::Notice;
use board_runtime::layout::{CardGeometry, Surface};
use board_runtime::Board;

use crate::themes::Theme;

pub const UNITS_PER_COLUMN: f64 = 10.0;
pub const UNITS_PER_ROW: f64 = 20.0;

const HEADER_HEIGHT: u16 = 4;
const FOOTER_HEIGHT: u16 = 2;

// ── View data ─────────────────────────────────────────────────────────────────

/// One card as it should be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: MachineId,
    pub name: String,
    /// Displayed status (live overlay first).
    pub status: MachineStatus,
    /// Drafted position in layout units.
    pub position: Position,
    pub stats: Option<MachineStats>,
    pub focused: bool,
    pub dragging: bool,
}

/// What the bottom line shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Footer {
    Help,
    Notice(Notice),
    /// Name prompt for a new machine, with the text typed so far.
    AddPrompt(String),
    /// Awaiting `y` to delete the named machine.
    ConfirmDelete(String),
}

/// Everything needed to draw the board screen.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardViewData {
    pub department: String,
    pub aggregate: DepartmentAggregate,
    pub edit_mode: bool,
    pub saving: bool,
    pub geometry: CardGeometry,
    pub cards: Vec<CardView>,
    pub footer: Footer,
}

impl BoardViewData {
    /// Collect view data from a loaded board.
    pub fn from_board(board: &Board, focused: Option<MachineId>, footer: Footer) -> Self {
        let dragging = board.layout().drag().map(|d| d.machine_id);
        let cards = board
            .machines()
            .iter()
            .map(|m| CardView {
                id: m.id,
                name: m.name.clone(),
                status: board.roster().displayed_status_of(m),
                position: board.position(m.id).unwrap_or_else(|| m.stored_position()),
                stats: board.card_stats(m.id).copied(),
                focused: focused == Some(m.id),
                dragging: dragging == Some(m.id),
            })
            .collect();

        Self {
            department: board
                .department_name()
                .unwrap_or(board.department_id())
                .to_string(),
            aggregate: board.aggregate(),
            edit_mode: board.is_edit_mode(),
            saving: board.layout().is_saving(),
            geometry: board.config().geometry,
            cards,
            footer,
        }
    }
}

// ── Geometry ──────────────────────────────────────────────────────────────────

/// Split the screen into header, layout surface and footer.
pub fn screen_areas(area: Rect) -> (Rect, Rect, Rect) {
    let [header, surface, footer] = Layout::vertical([
        Constraint::Length(HEADER_HEIGHT),
        Constraint::Min(0),
        Constraint::Length(FOOTER_HEIGHT),
    ])
    .areas(area);
    (header, surface, footer)
}

/// The layout surface, in layout units, covered by `area`.
pub fn surface_for(area: Rect) -> Surface {
    Surface {
        left: f64::from(area.x) * UNITS_PER_COLUMN,
        top: f64::from(area.y) * UNITS_PER_ROW,
        width: f64::from(area.width) * UNITS_PER_COLUMN,
        height: f64::from(area.height) * UNITS_PER_ROW,
    }
}

/// Pointer position of a terminal cell.
pub fn pointer_at(column: u16, row: u16) -> Position {
    Position::new(
        f64::from(column) * UNITS_PER_COLUMN,
        f64::from(row) * UNITS_PER_ROW,
    )
}

/// Cells a card occupies inside `area`, clipped to it.
pub fn card_rect(position: Position, geometry: CardGeometry, area: Rect) -> Rect {
    let col = (position.x / UNITS_PER_COLUMN).round().max(0.0) as u16;
    let row = (position.y / UNITS_PER_ROW).round().max(0.0) as u16;
    let width = (geometry.footprint / UNITS_PER_COLUMN).round() as u16;
    let height = (geometry.footprint / UNITS_PER_ROW).round() as u16;

    let rect = Rect {
        x: area.x.saturating_add(col),
        y: area.y.saturating_add(row),
        width,
        height,
    };
    rect.intersection(area)
}

/// `true` when the cell lies inside `rect`.
pub fn cell_in(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x
        && column < rect.x.saturating_add(rect.width)
        && row >= rect.y
        && row < rect.y.saturating_add(rect.height)
}

/// Topmost card under a cell. Later cards are drawn over earlier ones.
pub fn card_at(data: &BoardViewData, area: Rect, column: u16, row: u16) -> Option<MachineId> {
    data.cards
        .iter()
        .rev()
        .find(|c| cell_in(card_rect(c.position, data.geometry, area), column, row))
        .map(|c| c.id)
}

/// Cut `text` to at most `max_cols` display columns.
fn fit_width(text: &str, max_cols: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > max_cols {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

// ── Rendering ─────────────────────────────────────────────────────────────────

pub fn header_lines<'a>(data: &BoardViewData, theme: &Theme) -> Vec<Line<'a>> {
    let agg = &data.aggregate;
    let mode = if data.saving {
        Line::from(Span::styled(" SAVING LAYOUT… ", theme.edit_banner))
    } else if data.edit_mode {
        Line::from(Span::styled(
            " EDIT MODE  drag cards · s save · c cancel · d delete ",
            theme.edit_banner,
        ))
    } else {
        Line::from(Span::styled(
            "click a card to open it · e edit layout",
            theme.dim,
        ))
    };

    vec![
        Line::from(vec![
            Span::styled("MACHINE BOARD ", theme.header),
            Span::styled(format!("[ {} ]", truncate(&data.department, 40)), theme.label),
        ]),
        Line::from(Span::styled("=".repeat(60), theme.separator)),
        Line::from(vec![
            Span::styled("Units (24h): ", theme.label),
            Span::styled(format_units(agg.total_units), theme.value),
            Span::styled("   Avg OEE: ", theme.label),
            Span::styled(format_oee(agg.avg_oee), theme.oee_style(agg.avg_oee)),
            Span::styled("   Running: ", theme.label),
            Span::styled(agg.running_machine_count.to_string(), theme.status_running),
            Span::styled("   Stopped: ", theme.label),
            Span::styled(agg.stopped_machine_count.to_string(), theme.status_stoppage),
        ]),
        mode,
    ]
}

fn card_lines<'a>(card: &CardView, theme: &Theme) -> Vec<Line<'a>> {
    let mut lines = vec![Line::from(Span::styled(
        status_label(card.status),
        theme.status_style(card.status),
    ))];
    match &card.stats {
        Some(s) => {
            lines.push(Line::from(vec![
                Span::styled("Units ", theme.label),
                Span::styled(format_units(s.total_units_produced), theme.value),
            ]));
            lines.push(Line::from(vec![
                Span::styled("OEE   ", theme.label),
                Span::styled(format_oee(s.oee), theme.oee_style(s.oee)),
            ]));
        }
        None => lines.push(Line::from(Span::styled("no stats", theme.dim))),
    }
    lines
}

fn render_card(frame: &mut Frame, rect: Rect, card: &CardView, theme: &Theme) {
    if rect.width < 3 || rect.height < 2 {
        return;
    }
    let border = if card.dragging {
        theme.card_dragging
    } else if card.focused {
        theme.card_focused
    } else {
        theme.card_border
    };
    let title = fit_width(&card.name, usize::from(rect.width.saturating_sub(2)));

    let paragraph = Paragraph::new(Text::from(card_lines(card, theme))).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(Span::styled(title, theme.text)),
    );
    frame.render_widget(Clear, rect);
    frame.render_widget(paragraph, rect);
}

fn footer_lines<'a>(footer: &Footer, theme: &Theme) -> Vec<Line<'a>> {
    let first = match footer {
        Footer::Help => Line::from(""),
        Footer::Notice(n) => Line::from(Span::styled(n.message.clone(), theme.notice_style(n.level))),
        Footer::AddPrompt(text) => Line::from(vec![
            Span::styled("New machine name: ", theme.label),
            Span::styled(format!("{text}▏"), theme.value),
        ]),
        Footer::ConfirmDelete(name) => Line::from(Span::styled(
            format!("Delete \"{name}\"? This cannot be undone. [y/N]"),
            theme.warning,
        )),
    };
    vec![
        first,
        Line::from(Span::styled(
            "e edit · s save · c cancel · a add · d delete · Tab focus · Enter open · b back · q quit",
            theme.dim,
        )),
    ]
}

/// Draw the whole board screen.
pub fn render_board_view(frame: &mut Frame, area: Rect, data: &BoardViewData, theme: &Theme) {
    let (header, surface, footer) = screen_areas(area);

    frame.render_widget(Paragraph::new(Text::from(header_lines(data, theme))), header);

    let block = Block::default()
        .borders(Borders::NONE)
        .style(theme.text);
    frame.render_widget(block, surface);
    if data.cards.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No machines in this department", theme.dim)),
            surface,
        );
    }
    for card in &data.cards {
        let rect = card_rect(card.position, data.geometry, surface);
        render_card(frame, rect, card, theme);
    }

    frame.render_widget(Paragraph::new(Text::from(footer_lines(&data.footer, theme))), footer);
}

/// Shown while the snapshot is being fetched.
pub fn render_loading(frame: &mut Frame, area: Rect, department: &str, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(format!("Loading department {department}…"), theme.info)),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    let paragraph = Paragraph::new(Text::from(text)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Machine Board "),
    );
    frame.render_widget(paragraph, area);
}

/// Terminal state after a failed snapshot load.
pub fn render_load_failed(frame: &mut Frame, area: Rect, department: &str, reason: &str, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(format!("Department {department} could not be loaded"), theme.error)),
        Line::from(Span::styled(reason.to_string(), theme.dim)),
        Line::from(""),
        Line::from(Span::styled("Press 'b' for the department list, 'q' to exit", theme.dim)),
    ];
    let paragraph = Paragraph::new(Text::from(text)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Machine Board "),
    );
    frame.render_widget(paragraph, area);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
