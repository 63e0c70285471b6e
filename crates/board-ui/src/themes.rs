use ratatui::style::{Color, Modifier, Style};

use board_core::models::MachineStatus;
use board_core::notifications::NoticeLevel;

/// Terminal background type detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundType {
    Dark,
    Light,
    Unknown,
}

/// Detect terminal background type from the `COLORFGBG` environment variable.
///
/// The variable has the format `"foreground;background"`. Background values
/// 0–6 are considered dark; 7–15 are considered light. If the variable is
/// absent or unparseable, `BackgroundType::Dark` is returned.
pub fn detect_background() -> BackgroundType {
    if let Ok(val) = std::env::var("COLORFGBG") {
        if let Some(bg) = val.split(';').next_back() {
            if let Ok(bg_num) = bg.parse::<u8>() {
                return if bg_num <= 6 {
                    BackgroundType::Dark
                } else {
                    BackgroundType::Light
                };
            }
        }
    }
    BackgroundType::Dark
}

/// Every style the board view draws with.
#[derive(Debug, Clone)]
pub struct Theme {
    // ── Header ───────────────────────────────────────────────────────────────
    pub header: Style,
    pub separator: Style,

    // ── Text ─────────────────────────────────────────────────────────────────
    pub text: Style,
    pub dim: Style,
    pub label: Style,
    pub value: Style,

    // ── Status ───────────────────────────────────────────────────────────────
    pub info: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,

    // ── Machine status ───────────────────────────────────────────────────────
    pub status_running: Style,
    pub status_stoppage: Style,
    /// Stopped while the counter still advances.
    pub status_stopped_producing: Style,
    pub status_inactive: Style,

    // ── Cards ────────────────────────────────────────────────────────────────
    pub card_border: Style,
    /// Border of the card that has keyboard focus.
    pub card_focused: Style,
    /// Border of the card following the pointer.
    pub card_dragging: Style,
    pub edit_banner: Style,

    // ── Notifications ────────────────────────────────────────────────────────
    pub notification_success: Style,
    pub notification_error: Style,
}

impl Theme {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Dark-background terminal theme (default).
    pub fn dark() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            separator: Style::default().fg(Color::DarkGray),

            text: Style::default().fg(Color::White),
            dim: Style::default().fg(Color::DarkGray),
            label: Style::default().fg(Color::Gray),
            value: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),

            info: Style::default().fg(Color::Cyan),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),

            status_running: Style::default().fg(Color::Green),
            status_stoppage: Style::default().fg(Color::Red),
            status_stopped_producing: Style::default().fg(Color::Yellow),
            status_inactive: Style::default().fg(Color::DarkGray),

            card_border: Style::default().fg(Color::Gray),
            card_focused: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            card_dragging: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            edit_banner: Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),

            notification_success: Style::default().fg(Color::Green),
            notification_error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        }
    }

    /// Light-background terminal theme.
    ///
    /// Uses dark colours for text so content stays legible on a light canvas.
    pub fn light() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            separator: Style::default().fg(Color::Gray),

            text: Style::default().fg(Color::Black),
            dim: Style::default().fg(Color::Gray),
            label: Style::default().fg(Color::DarkGray),
            value: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),

            info: Style::default().fg(Color::Blue),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),

            status_running: Style::default().fg(Color::Green),
            status_stoppage: Style::default().fg(Color::Red),
            status_stopped_producing: Style::default().fg(Color::Magenta),
            status_inactive: Style::default().fg(Color::Gray),

            card_border: Style::default().fg(Color::DarkGray),
            card_focused: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            card_dragging: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            edit_banner: Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),

            notification_success: Style::default().fg(Color::Green),
            notification_error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        }
    }

    /// Choose a theme automatically based on the detected terminal background.
    pub fn auto_detect() -> Self {
        match detect_background() {
            BackgroundType::Light => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Construct a theme by name. Falls back to `auto_detect` for unknown
    /// names, including `"auto"`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            "dark" => Self::dark(),
            _ => Self::auto_detect(),
        }
    }

    // ── Style helpers ────────────────────────────────────────────────────────

    pub fn status_style(&self, status: MachineStatus) -> Style {
        match status {
            MachineStatus::Running => self.status_running,
            MachineStatus::Stoppage => self.status_stoppage,
            MachineStatus::StoppedYetProducing => self.status_stopped_producing,
            MachineStatus::Inactive => self.status_inactive,
        }
    }

    /// Style for an OEE percentage.
    ///
    /// * `≥ 85 %`    → `success`
    /// * `60–85 %`   → `warning`
    /// * `< 60 %`    → `error`
    pub fn oee_style(&self, oee: f64) -> Style {
        if oee >= 85.0 {
            self.success
        } else if oee >= 60.0 {
            self.warning
        } else {
            self.error
        }
    }

    pub fn notice_style(&self, level: NoticeLevel) -> Style {
        match level {
            NoticeLevel::Success => self.notification_success,
            NoticeLevel::Error => self.notification_error,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
