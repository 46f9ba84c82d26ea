use fuelbot::view::{BEST_PRICE, CARDS_INTRO};
use fuelbot::{BubbleBody, ParkingCard, Role, StationCard};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;

/// Splits a line on `**` markers, bolding every other segment. An unclosed
/// marker is kept as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let segments: Vec<&str> = text.split("**").collect();
    // An even count means the last marker was never closed
    let balanced = segments.len() % 2 == 1;

    let mut spans = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;
        if i % 2 == 1 && (balanced || !last) {
            spans.push(Span::styled(
                segment.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else if i % 2 == 1 {
            spans.push(Span::raw(format!("**{segment}")));
        } else if !segment.is_empty() {
            spans.push(Span::raw(segment.to_string()));
        }
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let location = match app.location {
        Some(location) => format!("📍 {location}"),
        None => "📍 localisation…".to_string(),
    };

    let title = Line::from(vec![
        Span::styled(" ⛽ FuelBot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.backend_url), Style::default().fg(Color::Gray)),
        Span::styled(location, Style::default().fg(Color::Green)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" envoyer ", label_style),
        Span::styled(" F1-F4 ", key_style),
        Span::styled(" suggestions ", label_style),
        Span::styled(" ↑/↓ ", key_style),
        Span::styled(" défiler ", label_style),
        Span::styled(" Ctrl+Fin ", key_style),
        Span::styled(" bas ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quitter ", label_style),
    ];

    let pending = app.log.pending();
    if pending > 0 {
        hints.push(Span::styled(
            format!(" {pending} en attente "),
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ));
    }

    let footer = Paragraph::new(Line::from(hints)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Conversation ");

    let lines = if app.log.is_empty() {
        welcome_lines(&app.suggestions)
    } else {
        chat_lines(app)
    };

    // Inner size minus borders
    let inner_width = area.width.saturating_sub(2).max(1);
    let inner_height = area.height.saturating_sub(2);

    let text = Text::from(lines);

    // Rows after word wrapping, counted by the same wrapper that draws them
    let total_rows = Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(inner_width);
    app.max_scroll = u16::try_from(total_rows)
        .unwrap_or(u16::MAX)
        .saturating_sub(inner_height);
    app.chat_scroll = if app.follow_bottom {
        app.max_scroll
    } else {
        app.chat_scroll.min(app.max_scroll)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn welcome_lines(suggestions: &[String]) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled("👋 Bonjour !", Style::default().bold())),
        Line::from(Span::styled(
            "Posez-moi une question sur les prix du carburant ou les parkings.",
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
    ];

    for (i, suggestion) in suggestions.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" F{} ", i + 1),
                Style::default().bg(Color::DarkGray).fg(Color::White),
            ),
            Span::raw(format!(" {suggestion}")),
        ]));
    }

    lines
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    for bubble in app.log.bubbles() {
        match bubble.role {
            Role::User => lines.push(Line::from(Span::styled(
                "Vous :",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))),
            Role::Assistant => lines.push(Line::from(Span::styled(
                "FuelBot :",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))),
        }

        match &bubble.body {
            BubbleBody::Text(text) if bubble.role == Role::User => {
                lines.extend(text.lines().map(|l| Line::from(l.to_string())));
            }
            BubbleBody::Text(text) => {
                lines.extend(text.lines().map(parse_markdown_line));
            }
            BubbleBody::Stations(stations) => {
                lines.push(Line::from(CARDS_INTRO));
                for station in stations {
                    lines.extend(station_card(station));
                }
            }
            BubbleBody::Parkings(parkings) => {
                lines.push(Line::from(CARDS_INTRO));
                for parking in parkings {
                    lines.extend(parking_card(parking));
                }
            }
            BubbleBody::Typing => {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("FuelBot écrit{dots}"),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                )));
            }
        }

        lines.push(Line::default());
    }

    lines
}

fn station_card(station: &StationCard) -> Vec<Line<'static>> {
    let mut header = vec![
        Span::raw("  ⛽ "),
        Span::styled(station.name.clone(), Style::default().bold()),
    ];
    if !station.postal_code.is_empty() {
        header.push(Span::styled(
            format!(" ({})", station.postal_code),
            Style::default().fg(Color::Gray),
        ));
    }
    header.push(Span::styled(
        format!("  {}", station.distance_label()),
        Style::default().fg(Color::Blue),
    ));

    let mut lines = vec![Line::from(header)];
    for price in &station.prices {
        lines.push(Line::from(vec![
            Span::raw(format!("     {} ", price.label)),
            Span::styled(
                format!("{} €/L", price.price),
                Style::default().fg(Color::Green).bold(),
            ),
        ]));
    }
    if station.best {
        lines.push(Line::from(Span::styled(
            format!("     ★ {BEST_PRICE}"),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )));
    }
    lines
}

fn parking_card(parking: &ParkingCard) -> Vec<Line<'static>> {
    let availability_color = match parking.available {
        None => Color::Gray,
        Some(0) => Color::Red,
        Some(1..=9) => Color::LightRed,
        Some(10..=49) => Color::Yellow,
        Some(_) => Color::Green,
    };
    let distance = format!("  {}", parking.distance_label());

    let mut lines = vec![
        Line::from(vec![
            Span::raw("  🅿 "),
            Span::styled(parking.name.clone(), Style::default().bold()),
            Span::styled(distance, Style::default().fg(Color::Blue)),
        ]),
        Line::from(vec![
            Span::raw("     "),
            Span::styled(
                parking.availability_label(),
                Style::default().fg(availability_color).bold(),
            ),
            Span::raw(format!("  {}", parking.status)),
        ]),
    ];

    if !parking.prices.is_empty() {
        let tiers: Vec<String> = parking
            .prices
            .iter()
            .map(|p| format!("{} {}", p.label, p.price))
            .collect();
        lines.push(Line::from(Span::styled(
            format!("     {}", tiers.join(" · ")),
            Style::default().fg(Color::Gray),
        )));
    }
    lines
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Votre message ");

    // Horizontal scrolling keeps the cursor visible; inner width excludes borders
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelbot::reply::parse_reply;
    use fuelbot::{BackendResponse, ChatClient, Config, Exchange, LocationCell, Outcome};
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    fn app() -> App {
        let client = ChatClient::new("http://127.0.0.1:9");
        App::new(&Config::new(), Exchange::new(client, LocationCell::new(), false))
    }

    /// Draws one frame and returns the screen as text rows.
    fn screen(app: &mut App, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..height)
            .map(|y| (0..width).map(|x| buffer[(x, y)].symbol()).collect::<String>())
            .collect()
    }

    /// Submits `question` and answers it with `reply`.
    fn answer(app: &mut App, question: &str, reply: BackendResponse) {
        app.input = question.to_string();
        let submission = app.submit_input().unwrap();
        app.receive_reply(Outcome { typing: submission.typing, result: Ok(reply) });
    }

    #[test]
    fn test_long_reply_end_is_visible() {
        let mut app = app();
        let mut text: Vec<String> = (0..6)
            .map(|i| format!("xxxxxxxxxxxxxxx yyyyyyyyyyyyyyy zzzzzzzzzzzzzz{i}"))
            .collect();
        text.push("ENDMARK".to_string());
        answer(&mut app, "question", BackendResponse::Text { text: text.join("\n") });

        let rows = screen(&mut app, 32, 14);
        assert!(rows.iter().any(|row| row.contains("zzzzzzzzzzzzzz5")), "{rows:#?}");
        assert!(rows.iter().any(|row| row.contains("ENDMARK")), "{rows:#?}");
        assert_eq!(app.chat_scroll, app.max_scroll);
    }

    #[test]
    fn test_scrolling_reaches_wrapped_rows() {
        let mut app = app();
        let line = "mot ".repeat(40);
        let text = [line.as_str(); 3].join("\n");
        answer(&mut app, "question", BackendResponse::Text { text });
        screen(&mut app, 32, 14);
        let bottom = app.max_scroll;
        assert!(bottom > 0);

        app.scroll_up(u16::MAX);
        screen(&mut app, 32, 14);
        assert_eq!(app.chat_scroll, 0);

        app.scroll_down(u16::MAX);
        let rows = screen(&mut app, 32, 14);
        assert_eq!(app.chat_scroll, bottom);
        assert!(app.follow_bottom);
        // The blank row closing the last bubble is the last row inside the pane
        assert!(rows[8].trim_matches(|c| c == ' ' || c == '│').is_empty(), "{rows:#?}");
    }

    #[test]
    fn test_station_cards_mark_one_best_price() {
        let mut app = app();
        let reply = parse_reply(
            &json!({
                "data": [
                    {"adresse": "A", "ville": "Rennes", "cp": "35000",
                     "fuel_type": "SP95", "price": 1.7, "distance_km": 1.2},
                    {"adresse": "B", "ville": "Rennes", "cp": "35000",
                     "fuel_type": "SP95", "price": 1.75}
                ]
            })
            .to_string(),
        )
        .unwrap();
        answer(&mut app, "sp95", reply);

        let rows = screen(&mut app, 60, 30);
        assert_eq!(rows.iter().filter(|row| row.contains(BEST_PRICE)).count(), 1);
        assert_eq!(rows.iter().filter(|row| row.contains(CARDS_INTRO)).count(), 1);
        assert!(rows.iter().any(|row| row.contains("1.700 €/L")));
        assert!(rows.iter().any(|row| row.contains("1.750 €/L")));
        assert!(rows.iter().any(|row| row.contains("distance inconnue")));

        // The marker belongs to the first card
        let best = rows.iter().position(|row| row.contains(BEST_PRICE)).unwrap();
        let second = rows.iter().position(|row| row.contains("B, Rennes")).unwrap();
        assert!(best < second);
    }

    #[test]
    fn test_parking_tiers_keep_backend_order() {
        let mut app = app();
        let reply = parse_reply(
            &json!({
                "data": [{
                    "name": "Colombier", "available": null, "total": 1000,
                    "status": "ouvert",
                    "pricing": {"30min": "0.9€", "1h": "1.8€", "15min": 0.5}
                }]
            })
            .to_string(),
        )
        .unwrap();
        answer(&mut app, "parkings", reply);

        let rows = screen(&mut app, 60, 30);
        let tiers = rows.iter().find(|row| row.contains("30min")).unwrap();
        let order: Vec<usize> = ["30min 0.9€", "1h 1.8€", "15min 0.50€"]
            .iter()
            .map(|tier| tiers.find(tier).unwrap())
            .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{tiers}");
        assert!(rows.iter().any(|row| row.contains("?/1000 places")));
    }

    #[test]
    fn test_typing_placeholder_replaced_by_reply() {
        let mut app = app();
        app.input = "bonjour".to_string();
        let submission = app.submit_input().unwrap();

        let rows = screen(&mut app, 120, 20);
        assert!(rows.iter().any(|row| row.contains("FuelBot écrit")));
        assert!(rows.iter().any(|row| row.contains("1 en attente")));

        app.receive_reply(Outcome {
            typing: submission.typing,
            result: Ok(BackendResponse::Text { text: "Bonjour, que cherchez-vous ?".to_string() }),
        });
        let rows = screen(&mut app, 120, 20);
        assert!(!rows.iter().any(|row| row.contains("écrit")));
        assert!(!rows.iter().any(|row| row.contains("en attente")));
        assert!(rows.iter().any(|row| row.contains("Bonjour, que cherchez-vous ?")));
    }

    fn span_texts(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("le **moins cher** est ici");
        assert_eq!(span_texts(&line), ["le ", "moins cher", " est ici"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markdown_unclosed_marker_is_literal() {
        let line = parse_markdown_line("prix **1.899");
        assert_eq!(span_texts(&line), ["prix ", "**1.899"]);
    }

    #[test]
    fn test_markdown_plain() {
        let line = parse_markdown_line("bonjour");
        assert_eq!(span_texts(&line), ["bonjour"]);
        assert!(parse_markdown_line("").spans.is_empty());
    }
}
