use super::styled_block;
use crate::app::{App, Focus};
use crate::cascade::{CascadeState, Level};
use crate::config::Theme;
use crate::github::Candidate;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph};

fn level_title(level: Level) -> &'static str {
    match level {
        Level::User => "User",
        Level::Repo => "Repository",
        Level::Release => "Release",
    }
}

fn is_committed(state: &CascadeState, level: Level) -> bool {
    match level {
        Level::User => state.committed_user.is_some(),
        Level::Repo => state.committed_repo.is_some(),
        Level::Release => state.selected_release.is_some(),
    }
}

pub fn draw(f: &mut Frame, app: &mut App, area: Rect) {
    let levels = app.cascade_state().visible_levels();

    let mut constraints: Vec<Constraint> = levels.iter().map(|_| Constraint::Length(3)).collect();
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (i, level) in levels.iter().enumerate() {
        draw_input(f, app, *level, chunks[i]);
    }
    draw_dropdown(f, app, chunks[levels.len()]);
}

fn draw_input(f: &mut Frame, app: &App, level: Level, area: Rect) {
    let state = app.cascade_state();
    let theme = &app.config.theme;
    let focused = app.focus == Focus::Level(level);

    let mut title = level_title(level).to_string();
    if state.is_loading(level) {
        title = format!("{title} {}", app.spinner_char());
    } else if is_committed(state, level) {
        title = format!("{title} ✓");
    }

    let query = state.query(level);
    let text_style = Style::default().fg(theme.parse_color(&theme.text));
    let paragraph = Paragraph::new(Span::styled(query.to_string(), text_style))
        .block(styled_block(&title, focused, theme));
    f.render_widget(paragraph, area);

    if focused {
        f.set_cursor_position(Position::new(
            area.x + 1 + query.chars().count() as u16,
            area.y + 1,
        ));
    }
}

fn draw_dropdown(f: &mut Frame, app: &mut App, area: Rect) {
    let Some(level) = app.focused_level() else {
        let block = styled_block("Matches", false, &app.config.theme);
        f.render_widget(block, area);
        return;
    };

    let theme = &app.config.theme;
    let state = app.cascade_state();
    let items = candidate_items(state, level, theme);
    let title = format!("{} matches ({})", level_title(level), items.len());

    if items.is_empty() {
        let hint = empty_hint(state, level, app.cascade.min_user_query_len);
        let paragraph = Paragraph::new(hint)
            .style(Style::default().fg(theme.parse_color(&theme.text_muted)))
            .block(styled_block(&title, true, theme));
        f.render_widget(paragraph, area);
        return;
    }

    let list = List::new(items)
        .block(styled_block(&title, true, theme))
        .highlight_style(
            Style::default()
                .bg(theme.parse_color(&theme.selected_bg))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("› ");

    f.render_stateful_widget(list, area, &mut app.dropdown_state);
}

fn empty_hint(state: &CascadeState, level: Level, min_user_query_len: usize) -> String {
    if state.is_loading(level) {
        return "Loading...".into();
    }
    match level {
        Level::User if state.query_user.chars().count() < min_user_query_len => {
            format!("Type at least {min_user_query_len} characters of a GitHub login")
        }
        Level::Release if !state.releases_listed => "Commit a repository to list its releases".into(),
        Level::Release if state.releases.is_empty() => "This repository has no releases".into(),
        _ => "No matches".into(),
    }
}

fn candidate_items(state: &CascadeState, level: Level, theme: &Theme) -> Vec<ListItem<'static>> {
    let muted = Style::default().fg(theme.parse_color(&theme.text_muted));
    let text = Style::default().fg(theme.parse_color(&theme.text));
    let accent = Style::default().fg(theme.parse_color(&theme.highlight));

    match level {
        Level::User => state
            .visible_users()
            .into_iter()
            .map(|u| ListItem::new(Span::styled(u.login.clone(), text)))
            .collect(),
        Level::Repo => state
            .visible_repos()
            .into_iter()
            .map(|r| {
                let mut spans = vec![Span::styled(r.name.clone(), text)];
                if r.stargazers_count > 0 {
                    spans.push(Span::styled(format!("  ★ {}", r.stargazers_count), accent));
                }
                if let Some(desc) = r.description.as_deref().filter(|d| !d.is_empty()) {
                    spans.push(Span::styled(format!("  {desc}"), muted));
                }
                ListItem::new(Line::from(spans))
            })
            .collect(),
        Level::Release => state
            .visible_releases()
            .into_iter()
            .map(|r| {
                let mut spans = vec![Span::styled(r.display_name().to_string(), text)];
                if r.display_name() != r.tag_name {
                    spans.push(Span::styled(format!("  {}", r.tag_name), muted));
                }
                if r.prerelease {
                    spans.push(Span::styled("  pre-release", Style::default().fg(Color::Yellow)));
                }
                if r.draft {
                    spans.push(Span::styled("  draft", Style::default().fg(Color::Magenta)));
                }
                if let Some(published) = r.published_at {
                    spans.push(Span::styled(format!("  {}", published.format("%Y-%m-%d")), muted));
                }
                ListItem::new(Line::from(spans))
            })
            .collect(),
    }
}
