//! TUI rendering for Mistake or Not using ratatui.

mod input;
mod theme;

pub use input::{
    Command, InputPump, Verdict, apply_command, command_for, format_period, handle_events,
    longer_reorder, shorter_reorder,
};
pub use theme::{Palette, palette, styles};

use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph, Wrap},
};

use mistake_engine::{App, ItemId, PrefetchState, RankingSource, SessionView};

pub const TITLE: &str = "Mistake or Not?";
pub const TAGLINE: &str = "You be the judge – was it made by mistake or on purpose?";

/// Everything one running-session frame shows.
#[derive(Debug, Clone)]
pub struct Scene {
    pub view: SessionView,
    pub asset_url: Option<String>,
    pub prefetch: Option<(ItemId, PrefetchState)>,
    pub reorder_period: Duration,
    pub syncing: bool,
}

impl Scene {
    #[must_use]
    pub fn from_app<S: RankingSource>(app: &App<S>) -> Self {
        let view = app.view();
        Self {
            asset_url: app.asset_url(&view.current).map(String::from),
            prefetch: app.prefetch_status(),
            reorder_period: app.reorder_period(),
            syncing: app.is_syncing(),
            view,
        }
    }
}

/// What the shell is showing.
#[derive(Debug, Clone)]
pub enum Screen {
    /// Manifest still loading.
    Loading,
    /// Session could not start.
    Unavailable(String),
    Session(Box<Scene>),
}

/// Main draw function
pub fn draw(frame: &mut Frame, screen: &Screen) {
    let palette = palette();
    let bg_block = Block::default().style(Style::default().bg(palette.bg_dark));
    frame.render_widget(bg_block, frame.area());

    let [header, body, footer] = Layout::vertical([
        Constraint::Length(3), // Title + tagline
        Constraint::Min(5),    // Item
        Constraint::Length(1), // Key hints
    ])
    .margin(1)
    .areas(frame.area());

    draw_header(frame, header, &palette);
    match screen {
        Screen::Loading => draw_placeholder(frame, body, "Loading images...", &palette, false),
        Screen::Unavailable(reason) => draw_placeholder(frame, body, reason, &palette, true),
        Screen::Session(scene) => draw_scene(frame, body, scene, &palette),
    }
    draw_footer(frame, footer, screen, &palette);
}

fn draw_header(frame: &mut Frame, area: Rect, palette: &Palette) {
    let lines = vec![
        Line::from(Span::styled(TITLE, styles::title(palette))),
        Line::from(Span::styled(TAGLINE, styles::muted(palette))),
    ];
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        area,
    );
}

fn draw_placeholder(frame: &mut Frame, area: Rect, text: &str, palette: &Palette, error: bool) {
    let color = if error { palette.error } else { palette.text_muted };
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.bg_border));
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color))))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block),
        area,
    );
}

fn draw_scene(frame: &mut Frame, area: Rect, scene: &Scene, palette: &Palette) {
    let view = &scene.view;
    let border = if view.is_animating() {
        palette.primary
    } else {
        palette.bg_border
    };
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
        .title(Line::from(format!(" Score: {} ", view.score)))
        .title(
            Line::from(format!(" {}/{} ", view.cursor + 1, view.catalog_len))
                .alignment(Alignment::Right),
        );

    let mut lines = vec![
        Line::from(Span::styled(
            view.current.as_str(),
            Style::default().fg(palette.text_primary),
        )),
        Line::from(Span::styled(
            scene.asset_url.as_deref().unwrap_or("(no asset URL)"),
            styles::muted(palette),
        )),
        Line::from(prefetch_span(scene, palette)),
        Line::from(""),
    ];

    match &view.feedback {
        Some(feedback) => {
            let mut spans = vec![Span::styled(
                feedback.as_str(),
                Style::default().fg(if view.badge.is_some() {
                    palette.success
                } else {
                    palette.warning
                }),
            )];
            if let Some(badge) = &view.badge {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(format!(" {badge} "), styles::badge(palette)));
            }
            lines.push(Line::from(spans));
        }
        None => lines.push(Line::from(Span::styled(
            "Was this made by mistake?",
            Style::default().fg(palette.text_primary),
        ))),
    }

    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block),
        area,
    );
}

fn prefetch_span<'a>(scene: &Scene, palette: &Palette) -> Span<'a> {
    let Some((item, state)) = &scene.prefetch else {
        return Span::raw("");
    };
    let (label, color) = match state {
        PrefetchState::Pending => ("loading", palette.text_muted),
        PrefetchState::Ready(_) => ("ready", palette.success),
        PrefetchState::Failed => ("unavailable", palette.warning),
    };
    Span::styled(format!("next: {item} ({label})"), Style::default().fg(color))
}

fn draw_footer(frame: &mut Frame, area: Rect, screen: &Screen, palette: &Palette) {
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(key, styles::key_hint(palette)),
            Span::styled(label, styles::muted(palette)),
        ]
    };

    let mut spans = Vec::new();
    if let Screen::Session(scene) = screen {
        spans.extend(hint("m", " Mistake  "));
        spans.extend(hint("n", " Not a Mistake  "));
        spans.extend(hint("+/-", " "));
        let sync = if scene.syncing {
            format!("reorder every {}  ", format_period(scene.reorder_period))
        } else {
            "reorder off  ".to_string()
        };
        spans.push(Span::styled(sync, styles::muted(palette)));
    }
    spans.extend(hint("q", " quit"));

    frame.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use mistake_engine::Phase;
    use ratatui::{Terminal, backend::TestBackend};

    fn render(screen: &Screen) -> String {
        let mut terminal = Terminal::new(TestBackend::new(90, 16)).unwrap();
        terminal.draw(|frame| draw(frame, screen)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn scene(phase: Phase, feedback: Option<&str>, badge: Option<&str>) -> Screen {
        Screen::Session(Box::new(Scene {
            view: SessionView {
                current: ItemId::new("b.png").unwrap(),
                cursor: 1,
                catalog_len: 3,
                score: 40,
                phase,
                feedback: feedback.map(String::from),
                badge: badge.map(String::from),
            },
            asset_url: Some("http://localhost:3000/images/b.png".to_string()),
            prefetch: Some((
                ItemId::new("c.png").unwrap(),
                PrefetchState::Ready(Arc::from(&[1_u8][..])),
            )),
            reorder_period: Duration::from_secs(24 * 3600),
            syncing: true,
        }))
    }

    #[test]
    fn loading_placeholder() {
        let out = render(&Screen::Loading);
        assert!(out.contains(TITLE));
        assert!(out.contains("You be the judge"));
        assert!(out.contains("Loading images..."));
        assert!(!out.contains("Mistake  "));
    }

    #[test]
    fn unavailable_placeholder_shows_reason() {
        let out = render(&Screen::Unavailable("catalog has no items".to_string()));
        assert!(out.contains("catalog has no items"));
        assert!(out.contains("quit"));
    }

    #[test]
    fn idle_scene() {
        let out = render(&scene(Phase::Idle, None, None));
        assert!(out.contains("Score: 40"));
        assert!(out.contains("2/3"));
        assert!(out.contains("b.png"));
        assert!(out.contains("http://localhost:3000/images/b.png"));
        assert!(out.contains("next: c.png (ready)"));
        assert!(out.contains("Was this made by mistake?"));
        assert!(out.contains("reorder every 24h"));
    }

    #[test]
    fn feedback_scene_shows_badge() {
        let out = render(&scene(
            Phase::Deciding,
            Some("Awesome! You earned 20 points!"),
            Some("+20"),
        ));
        assert!(out.contains("Awesome! You earned 20 points!"));
        assert!(out.contains("+20"));
        assert!(!out.contains("Was this made by mistake?"));
    }
}
