//! Key handling and rendering wired to a live session.

use std::time::Duration;

use mistake_tui::{Command, Scene, Screen, Verdict, apply_command, draw};
use ratatui::{Terminal, backend::TestBackend};

use crate::common::{app_at, config_for, start_backend, tick_until};

const HOUR: Duration = Duration::from_secs(3600);

fn render(screen: &Screen) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 16)).expect("test backend");
    terminal
        .draw(|frame| draw(frame, screen))
        .expect("draw succeeds");
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

#[tokio::test]
async fn both_buttons_submit_a_judgment() {
    let server = start_backend(&["a.png", "b.png", "c.png"]).await;
    let config = config_for(
        &server,
        "p_correct = 1.0\ntransition_delay_ms = 50\nreorder_period_hours = 1",
    );
    let mut app = app_at(&config, 0).await;

    assert!(!apply_command(&mut app, Command::Judge(Verdict::Mistake)));
    assert!(tick_until(&mut app, |app| app.view().cursor == 1).await);
    assert!(!apply_command(&mut app, Command::Judge(Verdict::NotAMistake)));
    assert!(tick_until(&mut app, |app| app.view().cursor == 2).await);
    assert_eq!(app.view().score, 40);

    assert!(apply_command(&mut app, Command::Quit));
    app.shutdown();
}

#[tokio::test]
async fn reorder_interval_steps_in_hours_with_a_floor() {
    let server = start_backend(&["a.png"]).await;
    let config = config_for(&server, "reorder_period_hours = 2");
    let mut app = app_at(&config, 0).await;
    assert_eq!(app.reorder_period(), 2 * HOUR);

    apply_command(&mut app, Command::LongerReorder);
    assert_eq!(app.reorder_period(), 3 * HOUR);

    for _ in 0..5 {
        apply_command(&mut app, Command::ShorterReorder);
    }
    assert_eq!(app.reorder_period(), HOUR);
    assert!(app.is_syncing());
    app.shutdown();
}

#[tokio::test]
async fn sub_hour_reorder_period_is_never_lengthened_by_minus() {
    let server = start_backend(&["a.png"]).await;
    let config = config_for(&server, "reorder_period_hours = 0.25");
    let mut app = app_at(&config, 0).await;
    assert_eq!(app.reorder_period(), Duration::from_secs(900));
    let frame = render(&Screen::Session(Box::new(Scene::from_app(&app))));
    assert!(frame.contains("reorder every 15m"));

    apply_command(&mut app, Command::ShorterReorder);
    assert_eq!(app.reorder_period(), Duration::from_secs(900));

    apply_command(&mut app, Command::LongerReorder);
    assert_eq!(app.reorder_period(), HOUR);
    app.shutdown();
}

#[tokio::test]
async fn scene_renders_the_live_session() {
    let server = start_backend(&["a.png", "b.png"]).await;
    let config = config_for(
        &server,
        "p_correct = 1.0\ntransition_delay_ms = 5000\nreorder_period_hours = 24",
    );
    let mut app = app_at(&config, 0).await;

    let idle = render(&Screen::Session(Box::new(Scene::from_app(&app))));
    assert!(idle.contains("Score: 0"));
    assert!(idle.contains("a.png"));
    assert!(idle.contains(&format!("{}/images/a.png", server.uri())));
    assert!(idle.contains("reorder every 24h"));

    app.decide();
    let deciding = render(&Screen::Session(Box::new(Scene::from_app(&app))));
    assert!(deciding.contains("Awesome! You earned 20 points!"));
    assert!(deciding.contains("+20"));
    assert!(deciding.contains("next: b.png"));
    app.shutdown();
}
