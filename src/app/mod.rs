use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::config::themes::Palette;
use crate::config::AppConfig;
use crate::identity::UserId;
use crate::storage::StorageHandle;
use crate::ui;

pub mod drag;
pub mod save;
pub mod state;

pub use drag::{DragSource, DropOutcome};
pub use save::{SaveEvent, SaveStatus};
pub use state::{AppState, EditorOptions, Field};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    ToggleField,
    AddLink,
    OpenPicker,
    Activate,
    RemoveLink,
    Grab,
    Save,
    Reload,
}

pub struct App {
    pub config: Arc<AppConfig>,
    storage: StorageHandle,
    user_id: UserId,
    state: AppState,
    palette: Palette,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, storage: StorageHandle, user_id: UserId) -> Result<Self> {
        let options = EditorOptions::from(&*config);
        let mut state = AppState::load(Arc::new(storage.clone()), user_id.clone(), options)
            .context("loading links for the editor")?;
        state.profile = storage
            .get_profile(&user_id)
            .context("loading profile for the preview")?;
        if state.store().is_empty() {
            state.set_status_message(Some("Press 'a' to add your first link"));
        }
        let palette = Palette::for_theme(config.theme);
        Ok(Self {
            config,
            storage,
            user_id,
            state,
            palette,
            should_quit: false,
            tick_rate: Duration::from_millis(100),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        let mouse = self.config.editor.mouse;
        let mut terminal = setup_terminal(mouse)?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal, mouse)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            if self.state.take_redraw() {
                let mut layout = None;
                terminal
                    .draw(|frame| layout = Some(ui::draw_app(frame, &self.state, &self.palette)))
                    .context("rendering frame")?;
                if let Some(layout) = layout {
                    self.state.set_layout(layout);
                }
            }

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key)?,
                    Event::Mouse(mouse) => self.handle_mouse(mouse)?,
                    Event::Paste(text) => self.state.paste_link(&text)?,
                    _ => {}
                }
                self.state.request_redraw();
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.state.on_tick();
                last_tick = Instant::now();
            }
        }
        if self.state.has_unsaved_changes() {
            tracing::warn!("exiting with unsaved link changes");
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }
        if self.state.picker().is_some() {
            return self.handle_picker_key(key);
        }
        if self.state.input().is_some() {
            return self.handle_input_key(key);
        }
        if self.state.is_dragging() {
            return self.handle_drag_key(key);
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Tab | KeyCode::BackTab => Some(Action::ToggleField),
            KeyCode::Char('a') if plain => Some(Action::AddLink),
            KeyCode::Char('p') if plain => Some(Action::OpenPicker),
            KeyCode::Enter => Some(Action::Activate),
            KeyCode::Char('d') if plain => Some(Action::RemoveLink),
            KeyCode::Char(' ') => Some(Action::Grab),
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Save)
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Reload)
            }
            _ => None,
        };

        match action {
            Some(action) => self.handle_action(action),
            None => Ok(()),
        }
    }

    fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::ToggleField => self.state.toggle_field(),
            Action::AddLink => {
                self.state.add_link();
                self.state.begin_link_input();
                self.state
                    .set_status_message(Some("Type the URL, Enter when done"));
            }
            Action::OpenPicker => self.state.open_platform_picker(),
            Action::Activate => match self.state.field() {
                Field::Platform => self.state.open_platform_picker(),
                Field::Link => self.state.begin_link_input(),
            },
            Action::RemoveLink => {
                if let Some(removed) = self.state.remove_selected()? {
                    self.state.set_status_message(Some(format!(
                        "Removed {} link",
                        removed.platform.label()
                    )));
                }
            }
            Action::Grab => match self.state.toggle_grab()? {
                None => self.state.set_status_message(Some(
                    "Moving link: j/k to choose a spot, Space to drop, Esc to cancel",
                )),
                Some(outcome) => self.report_drop(outcome),
            },
            Action::Save => {
                self.state.save()?;
            }
            Action::Reload => self.reload(),
        }
        Ok(())
    }

    fn handle_picker_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.picker_move(1),
            KeyCode::Char('k') | KeyCode::Up => self.state.picker_move(-1),
            KeyCode::Enter => self.state.picker_confirm()?,
            KeyCode::Esc => self.state.picker_cancel(),
            _ => {}
        }
        Ok(())
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Result<()> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Tab => self.state.close_link_input(),
            KeyCode::Char('u') if ctrl => self.state.edit_link(|input| input.clear())?,
            KeyCode::Char('s') if ctrl => {
                self.state.save()?;
            }
            KeyCode::Char(ch) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.state.edit_link(|input| input.insert_char(ch))?
            }
            KeyCode::Backspace => self.state.edit_link(|input| input.backspace())?,
            KeyCode::Delete => self.state.edit_link(|input| input.delete())?,
            KeyCode::Left if ctrl => self.state.edit_link(|input| input.move_segment_left())?,
            KeyCode::Right if ctrl => self.state.edit_link(|input| input.move_segment_right())?,
            KeyCode::Left => self.state.edit_link(|input| input.move_left())?,
            KeyCode::Right => self.state.edit_link(|input| input.move_right())?,
            KeyCode::Home => self.state.edit_link(|input| input.move_home())?,
            KeyCode::End => self.state.edit_link(|input| input.move_end())?,
            _ => {}
        }
        Ok(())
    }

    fn handle_drag_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('j' | 'J') | KeyCode::Down => self.state.drag_step(1),
            KeyCode::Char('k' | 'K') | KeyCode::Up => self.state.drag_step(-1),
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(outcome) = self.state.toggle_grab()? {
                    self.report_drop(outcome);
                }
            }
            KeyCode::Esc => {
                let outcome = self.state.cancel_drag();
                self.report_drop(outcome);
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        if self.state.picker().is_some() {
            return Ok(());
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.state.pointer_down(mouse.column, mouse.row)
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.state.pointer_moved(mouse.column, mouse.row)
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(outcome) = self.state.pointer_up(mouse.column, mouse.row)? {
                    self.report_drop(outcome);
                }
            }
            MouseEventKind::ScrollDown if !self.state.is_dragging() => {
                self.state.move_selection(1)
            }
            MouseEventKind::ScrollUp if !self.state.is_dragging() => {
                self.state.move_selection(-1)
            }
            _ => {}
        }
        Ok(())
    }

    fn report_drop(&mut self, outcome: DropOutcome) {
        let message = match outcome {
            DropOutcome::Reordered { from, to } => {
                format!("Moved link #{} to position {}", from + 1, to + 1)
            }
            DropOutcome::Unchanged => "Order unchanged".to_string(),
            DropOutcome::Cancelled => "Move cancelled".to_string(),
        };
        self.state.set_status_message(Some(message));
    }

    fn reload(&mut self) {
        let result = self.state.reload().and_then(|()| {
            self.state.profile = self.storage.get_profile(&self.user_id)?;
            Ok(())
        });
        match result {
            Ok(()) => self.state.set_status_message(Some("Reloaded saved links")),
            Err(err) => {
                tracing::error!(?err, "failed to reload links from storage");
                self.state
                    .set_status_message(Some("Failed to reload links, see logs"));
            }
        }
    }
}

fn setup_terminal(mouse: bool) -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("switching to alternate screen")?;
    if mouse {
        execute!(stdout, EnableMouseCapture).context("enabling mouse capture")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal backend")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>, mouse: bool) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    if mouse {
        execute!(terminal.backend_mut(), DisableMouseCapture).ok();
    }
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )
    .context("restoring screen state")?;
    Ok(())
}
