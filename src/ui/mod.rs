mod assets;
mod cascade;
mod help;
mod login;

use crate::app::{App, Focus, InputMode};
use crate::github::Candidate;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    // Main vertical layout: header (3) + content + status bar (1)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Breadcrumb
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Status/help bar
        ])
        .split(size);

    draw_header(f, app, chunks[0]);

    if app.is_authenticated() {
        draw_finder(f, app, chunks[1]);
    } else {
        login::draw(f, app, chunks[1]);
    }

    draw_status_bar(f, app, chunks[2]);

    if app.input_mode == InputMode::Help {
        help::draw_popup(f, app, size);
    }
}

fn draw_finder(f: &mut Frame, app: &mut App, area: Rect) {
    // Left: drill-down inputs, right: assets of the committed release
    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    cascade::draw(f, app, content[0]);
    assets::draw(f, app, content[1]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.config.theme;
    let state = app.cascade_state();
    let muted = Style::default().fg(theme.parse_color(&theme.text_muted));
    let strong = Style::default()
        .fg(theme.parse_color(&theme.highlight))
        .add_modifier(Modifier::BOLD);

    let mut spans = vec![Span::styled(" release-finder ", strong)];
    if app.is_authenticated() {
        let crumbs: Vec<&str> = [
            state.committed_user.as_deref(),
            state.committed_repo.as_deref(),
            state.asset_view().map(|r| r.display_name()),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !crumbs.is_empty() {
            spans.push(Span::styled("│ ", muted));
            spans.push(Span::styled(
                crumbs.join(" / "),
                Style::default().fg(theme.parse_color(&theme.text)),
            ));
        }
    } else {
        spans.push(Span::styled("│ not signed in", muted));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.parse_color(&theme.border)));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let style = if app.status_is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let content = if let Some(msg) = &app.status_message {
        msg.clone()
    } else if !app.is_authenticated() {
        "Enter:sign in  F1:help  q:quit".into()
    } else {
        match (app.input_mode, app.focus) {
            (InputMode::Help, _) => "Esc:close help".into(),
            (InputMode::Normal, Focus::Level(_)) => {
                "type:search  ↑/↓:select  Enter:commit  Tab:next  Esc:clear  ^L:sign out  F1:help  ^C:quit".into()
            }
            (InputMode::Normal, Focus::Assets) => {
                "j/k:nav  o:download  y:copy link  O:release page  Tab:next  F1:help  q:quit".into()
            }
        }
    };

    let paragraph = Paragraph::new(content).style(style);
    f.render_widget(paragraph, area);
}

// Helper: create a centered rect
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

// Helper: styled block with focus indicator
pub fn styled_block<'a>(title: &'a str, focused: bool, theme: &'a crate::config::Theme) -> Block<'a> {
    let border_color = if focused {
        theme.parse_color(&theme.border_active)
    } else {
        theme.parse_color(&theme.border)
    };

    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {title} "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::github::{GithubRelease, ReleaseAsset};
    use crate::persist::MemoryStore;
    use ratatui::backend::TestBackend;

    fn render(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_centered_rect_clamps_to_area() {
        let area = Rect::new(0, 0, 20, 10);
        assert_eq!(centered_rect(10, 4, area), Rect::new(5, 3, 10, 4));
        assert_eq!(centered_rect(50, 40, area), Rect::new(0, 0, 20, 10));
    }

    #[test]
    fn test_login_screen_renders() {
        let mut app = App::new(Config::default(), Box::new(MemoryStore::new())).unwrap();
        app.start(None);
        let screen = render(&mut app);
        assert!(screen.contains("Sign in with GitHub"));
    }

    #[test]
    fn test_release_hint_depends_on_listing() {
        let mut app = App::new(Config::default(), Box::new(MemoryStore::new())).unwrap();
        app.state.session.auth_token = Some("gho".into());
        app.start(None);

        // Repository query edited after a commit: releases were cleared, not fetched
        let state = &mut app.state.cascade;
        state.committed_user = Some("o".into());
        state.committed_repo = Some("r".into());
        state.query_repo = "r2".into();
        state.step = crate::cascade::Step::Version;
        app.focus = Focus::Level(crate::cascade::Level::Release);

        let screen = render(&mut app);
        assert!(screen.contains("Commit a repository to list its releases"));
        assert!(!screen.contains("has no releases"));

        app.state.cascade.releases_listed = true;
        let screen = render(&mut app);
        assert!(screen.contains("This repository has no releases"));
    }

    #[test]
    fn test_assets_render_after_commit() {
        let mut app = App::new(Config::default(), Box::new(MemoryStore::new())).unwrap();
        app.state.session.auth_token = Some("gho".into());
        app.start(None);

        let release = GithubRelease {
            id: 1,
            name: Some("First".into()),
            tag_name: "v1".into(),
            published_at: None,
            html_url: "https://github.com/o/r/releases/tag/v1".into(),
            body: Some("Fixed things".into()),
            prerelease: true,
            draft: false,
            assets: vec![ReleaseAsset {
                id: 9,
                name: "tool-linux.tar.gz".into(),
                browser_download_url: "https://github.com/o/r/releases/download/v1/tool-linux.tar.gz".into(),
                size: 2048,
                download_count: 12,
                content_type: None,
            }],
        };
        let state = &mut app.state.cascade;
        state.committed_user = Some("o".into());
        state.committed_repo = Some("r".into());
        state.step = crate::cascade::Step::Version;
        state.releases = vec![release.clone()];
        state.selected_release = Some(release);

        let screen = render(&mut app);
        assert!(screen.contains("tool-linux.tar.gz"));
        assert!(screen.contains("2.0 KB"));
        assert!(screen.contains("o / r / First"));
    }
}
