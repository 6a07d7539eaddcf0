use super::styled_block;
use crate::app::{App, Focus};
use crate::github::{Candidate, GithubRelease};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph, Wrap};

pub fn draw(f: &mut Frame, app: &mut App, area: Rect) {
    let Some(release) = app.cascade_state().asset_view().cloned() else {
        draw_placeholder(f, app, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),      // Release header
            Constraint::Percentage(50), // Assets
            Constraint::Min(0),         // Notes
        ])
        .split(area);

    draw_release_header(f, app, &release, chunks[0]);
    draw_asset_list(f, app, &release, chunks[1]);
    draw_notes(f, app, &release, chunks[2]);
}

fn draw_placeholder(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.config.theme;
    let hint = match app.cascade_state().step {
        crate::cascade::Step::Version => "Pick a release to see its downloads",
        _ => "Pick a user, then a repository, then a release",
    };
    let paragraph = Paragraph::new(hint)
        .style(Style::default().fg(theme.parse_color(&theme.text_muted)))
        .block(styled_block("Assets", false, theme))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_release_header(f: &mut Frame, app: &App, release: &GithubRelease, area: Rect) {
    let theme = &app.config.theme;
    let muted = Style::default().fg(theme.parse_color(&theme.text_muted));

    let mut first = vec![Span::styled(
        release.display_name().to_string(),
        Style::default()
            .fg(theme.parse_color(&theme.highlight))
            .add_modifier(Modifier::BOLD),
    )];
    first.push(Span::styled(format!("  {}", release.tag_name), muted));
    if let Some(published) = release.published_at {
        first.push(Span::styled(format!("  {}", published.format("%Y-%m-%d %H:%M")), muted));
    }

    let lines = vec![Line::from(first), Line::from(Span::styled(release.html_url.clone(), muted))];
    let paragraph = Paragraph::new(lines).block(styled_block("Release", false, theme));
    f.render_widget(paragraph, area);
}

fn draw_asset_list(f: &mut Frame, app: &mut App, release: &GithubRelease, area: Rect) {
    let theme = &app.config.theme;
    let focused = app.focus == Focus::Assets;
    let title = format!("Assets ({})", release.assets.len());

    if release.assets.is_empty() {
        let paragraph = Paragraph::new("This release has no downloadable assets")
            .style(Style::default().fg(theme.parse_color(&theme.text_muted)))
            .block(styled_block(&title, focused, theme));
        f.render_widget(paragraph, area);
        return;
    }

    let text = Style::default().fg(theme.parse_color(&theme.text));
    let muted = Style::default().fg(theme.parse_color(&theme.text_muted));
    let items: Vec<ListItem> = release
        .assets
        .iter()
        .map(|a| {
            ListItem::new(Line::from(vec![
                Span::styled(a.name.clone(), text),
                Span::styled(format!("  {}", a.size_label()), muted),
                Span::styled(format!("  {}↓", a.download_count), muted),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(styled_block(&title, focused, theme))
        .highlight_style(Style::default().bg(theme.parse_color(&theme.selected_bg)));

    f.render_stateful_widget(list, area, &mut app.asset_list_state);
}

fn draw_notes(f: &mut Frame, app: &App, release: &GithubRelease, area: Rect) {
    let theme = &app.config.theme;
    let body = release.body.as_deref().map(str::trim).unwrap_or_default();
    let width = area.width.saturating_sub(2).max(1) as usize;

    let lines: Vec<Line> = if body.is_empty() {
        vec![Line::from(Span::styled(
            "No release notes",
            Style::default().fg(theme.parse_color(&theme.text_muted)),
        ))]
    } else {
        body.lines()
            .flat_map(|line| {
                if line.trim().is_empty() {
                    vec![String::new()]
                } else {
                    textwrap::wrap(line, width).into_iter().map(|l| l.into_owned()).collect()
                }
            })
            .map(Line::from)
            .collect()
    };

    let paragraph = Paragraph::new(lines)
        .style(Style::default().fg(theme.parse_color(&theme.text)))
        .block(styled_block("Notes", false, theme));
    f.render_widget(paragraph, area);
}
