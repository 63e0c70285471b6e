//! Terminal application hosting the board.
//!
//! [`App`] owns the theme, keyboard focus and any open prompt. It drives the
//! event loop: each tick it drains the board's inbox, redraws, and maps one
//! terminal event onto a board operation.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Frame, Terminal};

use board_core::models::{MachineDraft, MachineId};
use board_core::notifications::NoticeLog;
use board_runtime::{Board, DeleteConfirmation, LoadState, Navigation};

use crate::board_view::{self, BoardViewData, Footer};
use crate::themes::Theme;

/// How long a notice stays in the footer.
const NOTICE_TTL_SECS: i64 = 5;

/// Leave raw mode and the alternate screen.
///
/// Used on the normal exit path and by hosts that cancel [`App::run`].
pub fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)
}

/// Outcome of one input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Quit,
    Navigate(Navigation),
}

#[derive(Debug)]
enum InputMode {
    Normal,
    /// Typing the name of a new machine.
    AddMachine(String),
    /// Waiting for `y` to confirm.
    ConfirmDelete(DeleteConfirmation),
}

pub struct App {
    pub theme: Theme,
    notices: Arc<NoticeLog>,
    focused: Option<MachineId>,
    input: InputMode,
}

impl App {
    pub fn new(theme_name: &str, notices: Arc<NoticeLog>) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
            notices,
            focused: None,
            input: InputMode::Normal,
        }
    }

    pub fn focused(&self) -> Option<MachineId> {
        self.focused
    }

    pub fn is_prompting(&self) -> bool {
        !matches!(self.input, InputMode::Normal)
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Run the board until the user quits or asks to navigate away.
    ///
    /// Returns the navigation request, or `None` on quit.
    pub async fn run(mut self, board: &mut Board) -> io::Result<Option<Navigation>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(100);
        let mut screen = Rect::default();

        let result = loop {
            board.try_process();
            terminal.draw(|frame| {
                screen = frame.area();
                self.render(frame, board);
            })?;

            if event::poll(tick_rate)? {
                let control = match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(board, key),
                    Event::Mouse(mouse) => self.handle_mouse(board, mouse, screen),
                    _ => None,
                };
                match control {
                    Some(Control::Quit) => break Ok(None),
                    Some(Control::Navigate(nav)) => break Ok(Some(nav)),
                    None => {}
                }
            }

            // Let spawned board work make progress between polls.
            tokio::task::yield_now().await;
        };

        restore_terminal()?;
        terminal.show_cursor()?;

        result
    }

    fn render(&self, frame: &mut Frame, board: &Board) {
        let area = frame.area();
        match board.load_state() {
            LoadState::Loading => board_view::render_loading(frame, area, board.department_id(), &self.theme),
            LoadState::Failed(reason) => {
                board_view::render_load_failed(frame, area, board.department_id(), reason, &self.theme)
            }
            LoadState::Ready => {
                let data = self.view_data(board);
                board_view::render_board_view(frame, area, &data, &self.theme);
            }
        }
    }

    /// Snapshot the board for drawing.
    pub fn view_data(&self, board: &Board) -> BoardViewData {
        let footer = match &self.input {
            InputMode::AddMachine(text) => Footer::AddPrompt(text.clone()),
            InputMode::ConfirmDelete(c) => Footer::ConfirmDelete(c.machine_name().to_string()),
            InputMode::Normal => self
                .notices
                .latest_fresh(chrono::Utc::now(), chrono::Duration::seconds(NOTICE_TTL_SECS))
                .map(Footer::Notice)
                .unwrap_or(Footer::Help),
        };
        BoardViewData::from_board(board, self.focused, footer)
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, board: &mut Board, key: KeyEvent) -> Option<Control> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Control::Quit);
        }

        match std::mem::replace(&mut self.input, InputMode::Normal) {
            InputMode::AddMachine(text) => {
                self.handle_prompt_key(board, key, text);
                None
            }
            InputMode::ConfirmDelete(confirmation) => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    board.delete_machine(confirmation);
                } else {
                    tracing::debug!(machine_id = %confirmation.machine_id(), "deletion cancelled");
                }
                None
            }
            InputMode::Normal => self.handle_normal_key(board, key),
        }
    }

    fn handle_prompt_key(&mut self, board: &mut Board, key: KeyEvent, mut text: String) {
        match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter => {
                if let Err(e) = board.add_machine(MachineDraft::named(text.trim())) {
                    tracing::debug!(error = %e, "add machine rejected");
                }
            }
            KeyCode::Backspace => {
                text.pop();
                self.input = InputMode::AddMachine(text);
            }
            KeyCode::Char(c) => {
                text.push(c);
                self.input = InputMode::AddMachine(text);
            }
            _ => self.input = InputMode::AddMachine(text),
        }
    }

    fn handle_normal_key(&mut self, board: &mut Board, key: KeyEvent) -> Option<Control> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Some(Control::Quit),
            KeyCode::Char('b') => return Some(Control::Navigate(board.back())),
            _ => {}
        }
        if board.load_state() != &LoadState::Ready {
            return None;
        }

        match key.code {
            KeyCode::Char('e') => {
                let on = board.toggle_edit_mode();
                tracing::debug!(edit_mode = on, "edit mode toggled");
            }
            KeyCode::Char('s') => {
                if let Err(e) = board.save_layout() {
                    tracing::debug!(error = %e, "layout save rejected");
                }
            }
            KeyCode::Char('c') => board.cancel_layout(),
            KeyCode::Char('a') => self.input = InputMode::AddMachine(String::new()),
            KeyCode::Char('d') => {
                if let Some(id) = self.focused {
                    if let Ok(confirmation) = board.confirm_delete(id) {
                        self.input = InputMode::ConfirmDelete(confirmation);
                    }
                }
            }
            KeyCode::Tab => self.focus_next(board),
            KeyCode::Esc => self.focused = None,
            KeyCode::Enter => {
                return self
                    .focused
                    .and_then(|id| board.click_machine(id))
                    .map(Control::Navigate);
            }
            _ => {}
        }
        None
    }

    /// Map a mouse event on `screen` onto the pointer operations.
    pub fn handle_mouse(&mut self, board: &mut Board, mouse: MouseEvent, screen: Rect) -> Option<Control> {
        if board.load_state() != &LoadState::Ready || self.is_prompting() {
            return None;
        }
        let (_, surface_area, _) = board_view::screen_areas(screen);
        let surface = board_view::surface_for(surface_area);
        let pointer = board_view::pointer_at(mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let data = BoardViewData::from_board(board, self.focused, Footer::Help);
                let id = board_view::card_at(&data, surface_area, mouse.column, mouse.row)?;
                self.focused = Some(id);
                board.pointer_down(id, pointer, &surface).map(Control::Navigate)
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if board_view::cell_in(surface_area, mouse.column, mouse.row) {
                    board.pointer_move(pointer, &surface);
                } else {
                    board.pointer_leave();
                }
                None
            }
            MouseEventKind::Up(MouseButton::Left) => {
                board.pointer_up();
                None
            }
            _ => None,
        }
    }

    /// Move keyboard focus to the next card in roster order.
    fn focus_next(&mut self, board: &Board) {
        let ids = board.roster().ids();
        let next = match self.focused.and_then(|f| ids.iter().position(|id| *id == f)) {
            Some(i) => ids.get((i + 1) % ids.len()).copied(),
            None => ids.first().copied(),
        };
        self.focused = next;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use board_core::models::{
        Department, Machine, MachineStats, MachineStatus, Position, StatsWindow,
    };
    use board_core::notifications::NoticeLevel;
    use board_core::{BoardError, Result};
    use board_runtime::data::api::BoardApi;
    use board_runtime::BoardConfig;
    use crossterm::event::KeyEventState;

    /// Backend with two machines and no stats.
    struct StubApi;

    #[async_trait]
    impl BoardApi for StubApi {
        async fn get_department(&self, department_id: &str) -> Result<Department> {
            let machine = |id: u64, x: f64| Machine {
                id: MachineId(id),
                name: format!("Press {id}"),
                description: None,
                status: MachineStatus::Running,
                position: Some(Position::new(x, 20.0)),
            };
            Ok(Department {
                id: department_id.to_string(),
                name: "Stamping".into(),
                description: None,
                machines: vec![machine(1, 10.0), machine(2, 300.0)],
            })
        }

        async fn get_machine_stats(&self, machine_id: MachineId, _window: StatsWindow) -> Result<MachineStats> {
            Err(BoardError::fetch(format!("stats for machine {machine_id}"), "HTTP 503"))
        }

        async fn create_machine(&self, _department_id: &str, draft: &MachineDraft) -> Result<Machine> {
            Ok(Machine {
                id: MachineId(50),
                name: draft.name.clone(),
                description: None,
                status: draft.status,
                position: None,
            })
        }

        async fn delete_machine(&self, _machine_id: MachineId) -> Result<()> {
            Ok(())
        }

        async fn update_machine_position(&self, _machine_id: MachineId, _position: Position) -> Result<()> {
            Ok(())
        }
    }

    async fn setup() -> (App, Board, Arc<NoticeLog>) {
        let notices = Arc::new(NoticeLog::default());
        let mut board = Board::new("7", Arc::new(StubApi), notices.clone(), BoardConfig::default());
        board.load_snapshot().await.unwrap();
        board.settle().await;
        (App::new("dark", notices.clone()), board, notices)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    const SCREEN: Rect = Rect {
        x: 0,
        y: 0,
        width: 100,
        height: 40,
    };

    // ── Keys ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_quit_keys() {
        let (mut app, mut board, _) = setup().await;
        assert_eq!(app.handle_key(&mut board, key(KeyCode::Char('q'))), Some(Control::Quit));

        let ctrl_c = KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..key(KeyCode::Char('c'))
        };
        assert_eq!(app.handle_key(&mut board, ctrl_c), Some(Control::Quit));
    }

    #[tokio::test]
    async fn test_edit_mode_and_cancel_keys() {
        let (mut app, mut board, _) = setup().await;
        app.handle_key(&mut board, key(KeyCode::Char('e')));
        assert!(board.is_edit_mode());
        app.handle_key(&mut board, key(KeyCode::Char('c')));
        assert!(!board.is_edit_mode());
    }

    #[tokio::test]
    async fn test_tab_cycles_focus_and_enter_opens() {
        let (mut app, mut board, _) = setup().await;
        app.handle_key(&mut board, key(KeyCode::Tab));
        assert_eq!(app.focused(), Some(MachineId(1)));
        app.handle_key(&mut board, key(KeyCode::Tab));
        assert_eq!(app.focused(), Some(MachineId(2)));
        app.handle_key(&mut board, key(KeyCode::Tab));
        assert_eq!(app.focused(), Some(MachineId(1)));

        assert_eq!(
            app.handle_key(&mut board, key(KeyCode::Enter)),
            Some(Control::Navigate(Navigation::MachineDetail(MachineId(1))))
        );
        assert_eq!(
            app.handle_key(&mut board, key(KeyCode::Char('b'))),
            Some(Control::Navigate(Navigation::DepartmentList))
        );
    }

    #[tokio::test]
    async fn test_add_prompt_creates_machine() {
        let (mut app, mut board, notices) = setup().await;
        app.handle_key(&mut board, key(KeyCode::Char('a')));
        assert!(app.is_prompting());
        for c in "Lathe".chars() {
            app.handle_key(&mut board, key(KeyCode::Char(c)));
        }
        app.handle_key(&mut board, key(KeyCode::Backspace));
        assert_eq!(app.view_data(&board).footer, Footer::AddPrompt("Lath".into()));

        app.handle_key(&mut board, key(KeyCode::Enter));
        assert!(!app.is_prompting());
        board.settle().await;

        assert!(board.roster().contains(MachineId(50)));
        assert_eq!(board.roster().get(MachineId(50)).unwrap().name, "Lath");
        assert_eq!(notices.latest().unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_add_prompt_escape_cancels() {
        let (mut app, mut board, _) = setup().await;
        app.handle_key(&mut board, key(KeyCode::Char('a')));
        app.handle_key(&mut board, key(KeyCode::Char('x')));
        app.handle_key(&mut board, key(KeyCode::Esc));
        assert!(!app.is_prompting());
        assert_eq!(board.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let (mut app, mut board, _) = setup().await;
        app.handle_key(&mut board, key(KeyCode::Char('e')));
        app.handle_key(&mut board, key(KeyCode::Tab));

        app.handle_key(&mut board, key(KeyCode::Char('d')));
        assert_eq!(app.view_data(&board).footer, Footer::ConfirmDelete("Press 1".into()));
        app.handle_key(&mut board, key(KeyCode::Char('n')));
        board.settle().await;
        assert!(board.roster().contains(MachineId(1)));

        app.handle_key(&mut board, key(KeyCode::Char('d')));
        app.handle_key(&mut board, key(KeyCode::Char('y')));
        board.settle().await;
        assert!(!board.roster().contains(MachineId(1)));
    }

    #[tokio::test]
    async fn test_delete_outside_edit_mode_reports_error() {
        let (mut app, mut board, notices) = setup().await;
        app.handle_key(&mut board, key(KeyCode::Tab));
        app.handle_key(&mut board, key(KeyCode::Char('d')));
        assert!(!app.is_prompting());
        assert_eq!(notices.count(NoticeLevel::Error), 1);
        assert!(matches!(app.view_data(&board).footer, Footer::Notice(_)));
    }

    // ── Mouse ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_click_outside_edit_mode_navigates() {
        let (mut app, mut board, _) = setup().await;
        // Surface starts on row 4; machine 1 sits at column 1, row 5.
        let control = app.handle_mouse(
            &mut board,
            mouse(MouseEventKind::Down(MouseButton::Left), 3, 7),
            SCREEN,
        );
        assert_eq!(control, Some(Control::Navigate(Navigation::MachineDetail(MachineId(1)))));
        assert_eq!(app.focused(), Some(MachineId(1)));
    }

    #[tokio::test]
    async fn test_click_on_empty_surface_does_nothing() {
        let (mut app, mut board, _) = setup().await;
        let control = app.handle_mouse(
            &mut board,
            mouse(MouseEventKind::Down(MouseButton::Left), 90, 35),
            SCREEN,
        );
        assert_eq!(control, None);
        assert_eq!(app.focused(), None);
    }

    #[tokio::test]
    async fn test_mouse_drag_moves_and_saves() {
        let (mut app, mut board, _) = setup().await;
        board.set_edit_mode(true);

        app.handle_mouse(&mut board, mouse(MouseEventKind::Down(MouseButton::Left), 1, 5), SCREEN);
        assert!(board.layout().drag().is_some());

        app.handle_mouse(&mut board, mouse(MouseEventKind::Drag(MouseButton::Left), 11, 10), SCREEN);
        assert_eq!(board.position(MachineId(1)), Some(Position::new(110.0, 120.0)));

        app.handle_mouse(&mut board, mouse(MouseEventKind::Up(MouseButton::Left), 11, 10), SCREEN);
        assert!(board.layout().drag().is_none());
        board.settle().await;
        assert_eq!(
            board.roster().get(MachineId(1)).unwrap().position,
            Some(Position::new(110.0, 120.0))
        );
    }

    #[tokio::test]
    async fn test_drag_off_surface_ends_drag() {
        let (mut app, mut board, _) = setup().await;
        board.set_edit_mode(true);
        app.handle_mouse(&mut board, mouse(MouseEventKind::Down(MouseButton::Left), 1, 5), SCREEN);
        // Row 1 is in the header, outside the surface.
        app.handle_mouse(&mut board, mouse(MouseEventKind::Drag(MouseButton::Left), 5, 1), SCREEN);
        assert!(board.layout().drag().is_none());
    }
}
