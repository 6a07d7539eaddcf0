use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

const HELP_TEXT: &str = r#"
SEARCH
  type          Edit the focused query
  Backspace     Delete last character
  Esc           Clear the focused query
  ↑/↓           Move dropdown highlight
  Enter         Commit highlighted entry
  Tab           Next field
  Shift+Tab     Previous field

ASSETS
  j/k ↑/↓       Move up/down
  o / Enter     Open download link
  y             Copy download link
  O             Open release page

SESSION
  Ctrl+l        Sign out
  F1            Toggle help
  Ctrl+c        Quit
  q             Quit (login / assets)
"#;

pub fn draw_popup(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.config.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.parse_color(&theme.border_active)))
        .title(" Help - Press F1 or Esc to close ");

    let inner = super::centered_rect(50, 26, area);
    f.render_widget(Clear, inner);

    let paragraph = Paragraph::new(HELP_TEXT).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, inner);
}
