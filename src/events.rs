use crate::app::{App, Focus, InputMode};
use crate::auth::AuthStatus;
use crate::ui;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::prelude::*;
use std::time::{Duration, Instant};

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut last_spinner_tick = Instant::now();
    let spinner_interval = Duration::from_millis(80);

    loop {
        // Tick spinner while anything is in flight
        if app.is_busy() && last_spinner_tick.elapsed() >= spinner_interval {
            app.tick_spinner();
            last_spinner_tick = Instant::now();
        }

        // Drain background results (non-blocking)
        app.poll_auth();
        app.poll_fetches();

        // Clear status messages after 5 seconds
        app.clear_expired_status();

        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events with short timeout for responsive UI
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key)? {
                    return Ok(());
                }
            }
        }
    }
}

/// Returns `true` when the app should quit
pub fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => return Ok(true),
        KeyCode::F(1) => {
            app.input_mode = match app.input_mode {
                InputMode::Help => InputMode::Normal,
                InputMode::Normal => InputMode::Help,
            };
            return Ok(false);
        }
        _ => {}
    }

    if app.input_mode == InputMode::Help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            app.input_mode = InputMode::Normal;
        }
        return Ok(false);
    }

    if !app.is_authenticated() {
        return Ok(handle_login_key(app, key));
    }

    if ctrl && key.code == KeyCode::Char('l') {
        app.sign_out();
        return Ok(false);
    }

    match key.code {
        KeyCode::Tab => app.focus_next(),
        KeyCode::BackTab => app.focus_prev(),
        _ => match app.focus {
            Focus::Level(_) => handle_level_key(app, key),
            Focus::Assets => return Ok(handle_assets_key(app, key)),
        },
    }
    Ok(false)
}

fn handle_login_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Enter if app.auth_status() != AuthStatus::Exchanging => app.begin_sign_in(),
        _ => {}
    }
    false
}

fn handle_level_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Down => app.dropdown_next(),
        KeyCode::Up => app.dropdown_prev(),
        KeyCode::Enter => app.commit_highlighted(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Esc => app.clear_query(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.clear_status();
            app.type_char(c);
        }
        _ => {}
    }
}

fn handle_assets_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => app.asset_next(),
        KeyCode::Char('k') | KeyCode::Up => app.asset_prev(),
        KeyCode::Char('o') | KeyCode::Enter => app.open_selected_asset(),
        KeyCode::Char('y') => app.copy_selected_asset(),
        KeyCode::Char('O') => app.open_release_page(),
        KeyCode::Char('?') => app.input_mode = InputMode::Help,
        _ => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::Level;
    use crate::config::Config;
    use crate::persist::MemoryStore;

    fn signed_in() -> App {
        let mut app = App::new(Config::default(), Box::new(MemoryStore::new())).unwrap();
        app.state.session.auth_token = Some("gho_test".into());
        app.start(None);
        app
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE)).unwrap()
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = signed_in();
        assert!(handle_key(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)).unwrap());
    }

    #[test]
    fn test_q_is_typed_into_query() {
        let mut app = signed_in();
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.state.cascade.query_user, "q");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.state.cascade.query_user, "");
    }

    #[test]
    fn test_help_toggle() {
        let mut app = signed_in();
        press(&mut app, KeyCode::F(1));
        assert_eq!(app.input_mode, InputMode::Help);
        // Typing is swallowed while help is open
        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.state.cascade.query_user, "");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_login_screen_ignores_typing() {
        let mut app = App::new(Config::default(), Box::new(MemoryStore::new())).unwrap();
        app.start(None);
        assert!(!press(&mut app, KeyCode::Char('a')));
        assert_eq!(app.state.cascade.query_user, "");
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn test_ctrl_l_signs_out() {
        let mut app = signed_in();
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL)).unwrap();
        assert!(!app.is_authenticated());
    }

    #[test]
    fn test_tab_stays_on_only_visible_level() {
        let mut app = signed_in();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Level(Level::User));
    }
}
