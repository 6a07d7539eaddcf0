use super::{centered_rect, styled_block};
use crate::app::App;
use crate::auth::AuthStatus;
use ratatui::prelude::*;
use ratatui::widgets::{Clear, Paragraph, Wrap};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.config.theme;
    let muted = Style::default().fg(theme.parse_color(&theme.text_muted));

    let lines = match app.auth_status() {
        AuthStatus::Exchanging => vec![
            Line::from(format!("{} Exchanging authorization code...", app.spinner_char())),
            Line::from(""),
            Line::from(Span::styled("Waiting for the token relay to answer", muted)),
        ],
        _ => {
            let mut lines = vec![
                Line::from(Span::styled(
                    "Sign in with GitHub",
                    Style::default()
                        .fg(theme.parse_color(&theme.highlight))
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from("Press Enter to open the authorization page in your browser."),
            ];
            if app.callback_listening {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("Listening for the redirect on {}", app.config.github.redirect_uri),
                    muted,
                )));
            }
            lines
        }
    };

    let popup = centered_rect(60, 9, area);
    f.render_widget(Clear, popup);
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(styled_block("GitHub", true, theme));
    f.render_widget(paragraph, popup);
}
